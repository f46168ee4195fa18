//! Result summarizer + refinement advisor (component E): facet building,
//! a one-sentence natural-language summary, and a capped set of
//! query-refinement hints.
//!
//! Grounded in `original_source/src/memory/result_summarizer.py`
//! (`ResultSummarizer`) and `original_source/src/memory/
//! refinement_advisor.py` (`RefinementAdvisor`).

use std::collections::BTreeMap;
use std::path::Path;

use crate::search::SearchResultItem;

const TOP_FILES: usize = 5;
const TOP_DIRECTORIES: usize = 5;
const MAX_HINTS: usize = 3;
const TOO_MANY_THRESHOLD: usize = 50;
const TOO_FEW_THRESHOLD: usize = 3;
const MANY_FILES_THRESHOLD: usize = 10;
const MANY_DIRECTORIES_THRESHOLD: usize = 3;
const DIRECTORY_SKEW_FRACTION: f64 = 0.5;

#[derive(Debug, Clone, Default)]
pub struct SearchFacets {
    pub languages: BTreeMap<String, usize>,
    pub unit_types: BTreeMap<String, usize>,
    pub files: BTreeMap<String, usize>,
    pub directories: BTreeMap<String, usize>,
    pub projects: BTreeMap<String, usize>,
}

fn top_n(counts: BTreeMap<String, usize>, n: usize) -> BTreeMap<String, usize> {
    let mut pairs: Vec<(String, usize)> = counts.into_iter().collect();
    pairs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    pairs.truncate(n);
    pairs.into_iter().collect()
}

/// Build facets over a result set. `include_projects` should be true for
/// cross-project searches; the projects facet is otherwise left empty.
pub fn build_facets(results: &[SearchResultItem], include_projects: bool) -> SearchFacets {
    let mut languages: BTreeMap<String, usize> = BTreeMap::new();
    let mut unit_types: BTreeMap<String, usize> = BTreeMap::new();
    let mut files: BTreeMap<String, usize> = BTreeMap::new();
    let mut directories: BTreeMap<String, usize> = BTreeMap::new();
    let mut projects: BTreeMap<String, usize> = BTreeMap::new();

    for result in results {
        *languages.entry(result.language.clone()).or_insert(0) += 1;
        *unit_types.entry(result.unit_type.clone()).or_insert(0) += 1;

        if !result.file_path.is_empty() {
            *files.entry(result.file_path.clone()).or_insert(0) += 1;
            if let Some(dir) = Path::new(&result.file_path).parent() {
                let dir_str = dir.to_string_lossy().to_string();
                if !dir_str.is_empty() {
                    *directories.entry(dir_str).or_insert(0) += 1;
                }
            }
        }

        if include_projects {
            if let Some(project) = &result.project_name {
                *projects.entry(project.clone()).or_insert(0) += 1;
            }
        }
    }

    SearchFacets {
        languages,
        unit_types,
        files: top_n(files, TOP_FILES),
        directories: top_n(directories, TOP_DIRECTORIES),
        projects: if include_projects { projects } else { BTreeMap::new() },
    }
}

fn format_unit_types(types: &BTreeMap<String, usize>) -> String {
    fn pluralize(unit_type: &str, count: usize) -> String {
        if unit_type == "class" {
            if count > 1 { "classes".to_string() } else { "class".to_string() }
        } else if count > 1 {
            format!("{unit_type}s")
        } else {
            unit_type.to_string()
        }
    }

    if types.is_empty() {
        return "items".to_string();
    }
    let mut entries: Vec<(&String, &usize)> = types.iter().collect();
    entries.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

    if entries.len() == 1 {
        let (unit_type, count) = entries[0];
        return pluralize(unit_type, *count);
    }

    let top: Vec<String> = entries
        .iter()
        .take(2)
        .map(|(unit_type, count)| format!("{count} {}", pluralize(unit_type, **count)))
        .collect();

    if entries.len() > 2 {
        format!("{}, and {}", top[0], top[1])
    } else {
        format!("{} and {}", top[0], top[1])
    }
}

/// One-sentence template: `"Found N <unit-type-phrase> across M files
/// [in L / across L1 and L2 / across L1, L2 and K other language(s)]
/// [in P projects]"`.
pub fn summarize(results: &[SearchResultItem], facets: &SearchFacets) -> String {
    let count = results.len();
    if count == 0 {
        return "No results found - try broadening your query or checking the project is indexed"
            .to_string();
    }

    let file_summary = match facets.files.len() {
        0 => "unknown location".to_string(),
        1 => "1 file".to_string(),
        n => format!("{n} files"),
    };

    let lang_summary = match facets.languages.len() {
        0 => String::new(),
        1 => {
            let lang = facets.languages.keys().next().unwrap();
            format!(" in {}", title_case(lang))
        }
        2 => {
            let langs: Vec<&String> = facets.languages.keys().collect();
            format!(" across {} and {}", langs[0], langs[1])
        }
        n => {
            let top: Vec<&String> = facets.languages.keys().take(2).collect();
            format!(" across {}, {} and {} other language(s)", top[0], top[1], n - 2)
        }
    };

    let unit_summary = format_unit_types(&facets.unit_types);
    let mut summary = format!("Found {count} {unit_summary} across {file_summary}{lang_summary}");

    if facets.projects.len() > 1 {
        summary.push_str(&format!(" in {} projects", facets.projects.len()));
    }

    summary
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn looks_like_identifier(term: &str) -> bool {
    term.starts_with(|c: char| c.is_uppercase())
        || term.contains('_')
        || term.starts_with('_')
}

/// Fixed rule set, capped at `MAX_HINTS`.
pub fn refinement_hints(
    results: &[SearchResultItem],
    facets: &SearchFacets,
    query: &str,
    search_mode_is_keyword: bool,
) -> Vec<String> {
    let mut hints = Vec::new();
    let count = results.len();

    if count >= TOO_MANY_THRESHOLD {
        hints.push(
            "Too many results. Try adding a file_pattern filter to narrow down (e.g. file_pattern='*/auth/*')"
                .to_string(),
        );
        if facets.languages.len() > 1 {
            if let Some((lang, n)) = facets.languages.iter().max_by_key(|(_, n)| **n) {
                hints.push(format!("Filter by language: language='{lang}' to focus on {n} results"));
            }
        }
    } else if count > 0 && count < TOO_FEW_THRESHOLD {
        hints.push("Few results found. Try broadening your query or removing filters".to_string());
        if !search_mode_is_keyword {
            hints.push("Try hybrid search mode for better recall: mode=hybrid".to_string());
        }
    } else if facets.files.len() > MANY_FILES_THRESHOLD {
        if let Some((top_file, _)) = facets.files.iter().max_by_key(|(_, n)| **n) {
            if let Some(dir) = Path::new(top_file).parent() {
                let dir_str = dir.to_string_lossy();
                if !dir_str.is_empty() {
                    hints.push(format!(
                        "Results are scattered. Try file_pattern='{dir_str}/*' to focus on the main directory"
                    ));
                }
            }
        }
    } else if facets.directories.len() >= MANY_DIRECTORIES_THRESHOLD {
        if let Some((top_dir, top_count)) = facets.directories.iter().max_by_key(|(_, n)| **n) {
            if (*top_count as f64) / (count as f64) > DIRECTORY_SKEW_FRACTION {
                hints.push(format!(
                    "Most results ({top_count}/{count}) are in '{top_dir}'. Try file_pattern='{top_dir}/*' to focus there"
                ));
            }
        }
    }

    if hints.len() < MAX_HINTS && facets.unit_types.len() > 1 {
        let functions = facets.unit_types.get("function").copied().unwrap_or(0);
        let classes = facets.unit_types.get("class").copied().unwrap_or(0);
        if functions > classes {
            hints.push("Add 'function' to your query to focus on functions only".to_string());
        } else if classes > functions {
            hints.push("Add 'class' to your query to focus on classes only".to_string());
        }
    }

    if hints.len() < MAX_HINTS && query.split_whitespace().count() < 3 {
        hints.push(
            "Try adding more context to your query (e.g. 'user authentication' -> 'JWT user authentication logic')"
                .to_string(),
        );
    }

    if hints.len() < MAX_HINTS
        && !search_mode_is_keyword
        && query.split_whitespace().any(looks_like_identifier)
    {
        hints.push("Searching for specific names? Try mode=keyword for exact matching".to_string());
    }

    hints.truncate(MAX_HINTS);
    hints
}
