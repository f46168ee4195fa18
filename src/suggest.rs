//! Query suggester: intent templates, domain presets, and project
//! suggestions derived from what's actually indexed.
//!
//! Grounded in `original_source/src/memory/query_suggester.py`
//! (`QuerySuggester`). Project scoping is simplified relative to the
//! original: the cache has no per-unit project tag (see DESIGN.md), so
//! `indexed_stats` runs over the whole cache and `project_name` is
//! carried through the response for display only.

use std::collections::{BTreeMap, HashSet};

use crate::cache::PersistedState;
use crate::types::UnitType;

const MAX_INTENT_TEMPLATES: usize = 3;
const MAX_PROJECT_SUGGESTIONS: usize = 2;
const MAX_DOMAIN_SUGGESTIONS: usize = 2;
const MAX_GENERAL_SUGGESTIONS: usize = 2;
const TOP_CLASSES_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestionCategory {
    Template,
    Project,
    Domain,
    General,
}

impl SuggestionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Template => "template",
            Self::Project => "project",
            Self::Domain => "domain",
            Self::General => "general",
        }
    }
}

#[derive(Debug, Clone)]
pub struct QuerySuggestion {
    pub query: String,
    pub category: SuggestionCategory,
    pub description: String,
}

fn suggestion(query: &str, category: SuggestionCategory, description: impl Into<String>) -> QuerySuggestion {
    QuerySuggestion { query: query.to_string(), category, description: description.into() }
}

#[derive(Debug, Clone, Default)]
pub struct IndexedStats {
    pub total_files: usize,
    pub total_units: usize,
    pub languages: BTreeMap<String, usize>,
    pub top_classes: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SuggestQueryResponse {
    pub suggestions: Vec<QuerySuggestion>,
    pub indexed_stats: IndexedStats,
    pub project_name: Option<String>,
}

impl SuggestQueryResponse {
    pub fn total_suggestions(&self) -> usize {
        self.suggestions.len()
    }
}

fn intent_templates(intent: &str) -> &'static [&'static str] {
    match intent {
        "implementation" => &[
            "user authentication logic",
            "database connection handling",
            "API request validation",
            "error handling middleware",
            "data validation functions",
        ],
        "debugging" => &[
            "error handling in API",
            "exception logging",
            "retry logic",
            "validation failures",
            "error recovery mechanisms",
        ],
        "learning" => &[
            "how does pagination work",
            "authentication flow",
            "request processing pipeline",
            "data transformation logic",
            "caching strategy",
        ],
        "exploration" => &[
            "all REST endpoints",
            "database models",
            "utility functions",
            "middleware components",
            "service layer",
        ],
        "refactoring" => &[
            "duplicate error handlers",
            "similar validation functions",
            "repeated database queries",
            "common patterns",
            "code complexity hotspots",
        ],
        _ => &[],
    }
}

fn domain_presets(domain: &str) -> Vec<QuerySuggestion> {
    match domain {
        "auth" => vec![
            suggestion("JWT token validation", SuggestionCategory::Domain, "Find authentication token validation code"),
            suggestion("password hashing logic", SuggestionCategory::Domain, "Find password encryption and verification"),
            suggestion("session management", SuggestionCategory::Domain, "Find session creation and validation"),
        ],
        "database" => vec![
            suggestion("SQL query construction", SuggestionCategory::Domain, "Find database query building code"),
            suggestion("ORM models", SuggestionCategory::Domain, "Find database model definitions"),
            suggestion("database migrations", SuggestionCategory::Domain, "Find schema migration code"),
        ],
        "api" => vec![
            suggestion("request validation", SuggestionCategory::Domain, "Find API request validation logic"),
            suggestion("response formatting", SuggestionCategory::Domain, "Find API response construction"),
            suggestion("middleware", SuggestionCategory::Domain, "Find API middleware functions"),
        ],
        "error" => vec![
            suggestion("exception handlers", SuggestionCategory::Domain, "Find error handling code"),
            suggestion("error logging", SuggestionCategory::Domain, "Find error logging mechanisms"),
            suggestion("retry logic", SuggestionCategory::Domain, "Find retry and recovery code"),
        ],
        _ => Vec::new(),
    }
}

fn general_suggestions() -> Vec<QuerySuggestion> {
    vec![
        suggestion("most complex functions", SuggestionCategory::General, "Find functions with high complexity"),
        suggestion("entry points and main functions", SuggestionCategory::General, "Find application entry points"),
        suggestion("configuration loading", SuggestionCategory::General, "Find configuration initialization code"),
        suggestion("utility and helper functions", SuggestionCategory::General, "Find common utility code"),
    ]
}

/// Detect a domain from free-text context first, falling back to the
/// names of the most common indexed classes.
fn detect_domain(context: Option<&str>, stats: &IndexedStats) -> Option<&'static str> {
    if let Some(context) = context {
        let lower = context.to_lowercase();
        if ["auth", "login", "password", "token"].iter().any(|w| lower.contains(w)) {
            return Some("auth");
        }
        if ["database", "sql", "query", "db"].iter().any(|w| lower.contains(w)) {
            return Some("database");
        }
        if ["api", "endpoint", "route", "rest"].iter().any(|w| lower.contains(w)) {
            return Some("api");
        }
        if ["error", "exception", "catch", "try"].iter().any(|w| lower.contains(w)) {
            return Some("error");
        }
    }

    if !stats.top_classes.is_empty() {
        let classes = stats.top_classes.join(" ").to_lowercase();
        if ["auth", "user", "session"].iter().any(|w| classes.contains(w)) {
            return Some("auth");
        }
        if ["repository", "model", "entity"].iter().any(|w| classes.contains(w)) {
            return Some("database");
        }
        if ["controller", "handler", "endpoint"].iter().any(|w| classes.contains(w)) {
            return Some("api");
        }
    }

    None
}

fn project_suggestions(stats: &IndexedStats) -> Vec<QuerySuggestion> {
    let mut out = Vec::new();

    if let Some(class_name) = stats.top_classes.first() {
        out.push(suggestion(
            &format!("{class_name} implementation"),
            SuggestionCategory::Project,
            "Based on a commonly used class in this project",
        ));
    }

    if let Some((lang, _)) = stats.languages.iter().max_by_key(|(_, n)| **n) {
        out.push(suggestion(
            &format!("{lang} utility functions"),
            SuggestionCategory::Project,
            format!("Explore {lang} helpers in this project"),
        ));
    }

    out
}

/// Derive stats from the current cache + file index: file/unit counts,
/// a per-language histogram, and the ten most common class names.
pub fn indexed_stats(state: &PersistedState) -> IndexedStats {
    let mut languages: BTreeMap<String, usize> = BTreeMap::new();
    let mut class_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut total_units = 0;
    let mut files: HashSet<&str> = HashSet::new();

    for record in state.file_index.values() {
        let Some(entry) = state.cache.get(&record.file_hash) else { continue };
        files.insert(record.file_path.as_str());
        for unit in &entry.units {
            total_units += 1;
            *languages.entry(unit.language.to_string()).or_insert(0) += 1;
            if unit.unit_type == UnitType::Class {
                *class_counts.entry(unit.name.clone()).or_insert(0) += 1;
            }
        }
    }

    let mut top_classes: Vec<(String, usize)> = class_counts.into_iter().collect();
    top_classes.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    top_classes.truncate(TOP_CLASSES_LIMIT);

    IndexedStats {
        total_files: files.len(),
        total_units,
        languages,
        top_classes: top_classes.into_iter().map(|(name, _)| name).collect(),
    }
}

/// Generate up to `max_suggestions` suggestions: intent templates (if
/// `intent` is recognized), project-specific picks from what's indexed,
/// domain presets (detected from `context` or the indexed classes), then
/// general discovery suggestions.
pub fn suggest_queries(
    state: &PersistedState,
    project_name: Option<&str>,
    intent: Option<&str>,
    context: Option<&str>,
    max_suggestions: usize,
) -> SuggestQueryResponse {
    let stats = indexed_stats(state);
    let mut suggestions = Vec::new();

    if let Some(intent) = intent {
        for template in intent_templates(intent).iter().take(MAX_INTENT_TEMPLATES) {
            suggestions.push(suggestion(template, SuggestionCategory::Template, format!("Common {intent} pattern")));
        }
    }

    suggestions.extend(project_suggestions(&stats).into_iter().take(MAX_PROJECT_SUGGESTIONS));

    if let Some(domain) = detect_domain(context, &stats) {
        suggestions.extend(domain_presets(domain).into_iter().take(MAX_DOMAIN_SUGGESTIONS));
    }

    suggestions.extend(general_suggestions().into_iter().take(MAX_GENERAL_SUGGESTIONS));
    suggestions.truncate(max_suggestions);

    SuggestQueryResponse { suggestions, indexed_stats: stats, project_name: project_name.map(String::from) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheEntry;
    use crate::types::{FileRecord, Language, SemanticUnit};

    fn unit(unit_type: UnitType, name: &str, language: Language, file_path: &str) -> SemanticUnit {
        SemanticUnit::new(unit_type, name, language, file_path, 1, 2, 0, 10, "body")
    }

    fn state_with(units_by_file: Vec<(&str, Vec<SemanticUnit>)>) -> PersistedState {
        let mut state = PersistedState::default();
        for (file_path, units) in units_by_file {
            let file_hash = format!("hash-{file_path}");
            let language = units.first().map(|u| u.language).unwrap_or(Language::Unknown);
            let unit_ids: Vec<String> =
                units.iter().enumerate().map(|(i, u)| u.stable_id(i as u32)).collect();
            state.cache.insert(file_hash.clone(), CacheEntry { language, units: units.clone() });
            state.file_index.insert(
                file_path.to_string(),
                FileRecord {
                    file_path: file_path.to_string(),
                    file_hash,
                    language,
                    last_indexed_at: 0,
                    unit_names: units.iter().map(|u| u.name.clone()).collect(),
                    unit_ids,
                },
            );
        }
        state
    }

    #[test]
    fn intent_suggestions_include_template_category() {
        let state = PersistedState::default();
        let response = suggest_queries(&state, None, Some("implementation"), None, 5);
        assert!(response.total_suggestions() > 0);
        assert!(response.suggestions.len() <= 5);
        assert!(response.suggestions.iter().any(|s| s.category == SuggestionCategory::Template));
    }

    #[test]
    fn debugging_intent_mentions_error_or_exception() {
        let state = PersistedState::default();
        let response = suggest_queries(&state, None, Some("debugging"), None, 8);
        assert!(response
            .suggestions
            .iter()
            .any(|s| s.query.to_lowercase().contains("error") || s.query.to_lowercase().contains("exception")));
    }

    #[test]
    fn project_suggestion_surfaces_top_class() {
        let state = state_with(vec![
            ("/app/user.py", vec![unit(UnitType::Class, "UserRepository", Language::Python, "/app/user.py")]),
            ("/app/user2.py", vec![unit(UnitType::Class, "UserRepository", Language::Python, "/app/user2.py")]),
            ("/app/payment.py", vec![unit(UnitType::Function, "process_payment", Language::Python, "/app/payment.py")]),
        ]);
        let response = suggest_queries(&state, Some("test-project"), None, None, 8);
        let project: Vec<&QuerySuggestion> =
            response.suggestions.iter().filter(|s| s.category == SuggestionCategory::Project).collect();
        assert!(!project.is_empty());
        assert!(project.iter().any(|s| s.query.contains("UserRepository")));
    }

    #[test]
    fn domain_detected_from_context() {
        let state = PersistedState::default();
        let response = suggest_queries(&state, None, None, Some("I need to implement authentication"), 8);
        let domain: Vec<&QuerySuggestion> =
            response.suggestions.iter().filter(|s| s.category == SuggestionCategory::Domain).collect();
        assert!(domain.iter().any(|s| {
            let q = s.query.to_lowercase();
            q.contains("auth") || q.contains("token") || q.contains("password")
        }));
    }

    #[test]
    fn domain_detected_from_repository_classes() {
        let state = state_with(vec![
            ("/a.py", vec![unit(UnitType::Class, "ProductRepository", Language::Python, "/a.py")]),
            ("/b.py", vec![unit(UnitType::Class, "OrderRepository", Language::Python, "/b.py")]),
            ("/c.py", vec![unit(UnitType::Class, "InventoryRepository", Language::Python, "/c.py")]),
        ]);
        let stats = indexed_stats(&state);
        assert_eq!(detect_domain(None, &stats), Some("database"));
    }

    #[test]
    fn indexed_stats_counts_files_units_and_languages() {
        let state = state_with(vec![
            ("/app/auth.py", vec![unit(UnitType::Function, "validate_token", Language::Python, "/app/auth.py")]),
            ("/app/user.py", vec![unit(UnitType::Class, "User", Language::Python, "/app/user.py")]),
            ("/client/api.ts", vec![unit(UnitType::Function, "fetchUser", Language::Typescript, "/client/api.ts")]),
        ]);
        let stats = indexed_stats(&state);
        assert_eq!(stats.total_files, 3);
        assert_eq!(stats.total_units, 3);
        assert_eq!(stats.languages["python"], 2);
        assert_eq!(stats.languages["typescript"], 1);
    }

    #[test]
    fn general_suggestions_always_present() {
        let state = PersistedState::default();
        let response = suggest_queries(&state, None, None, None, 8);
        assert!(response.suggestions.iter().any(|s| s.category == SuggestionCategory::General));
    }

    #[test]
    fn max_suggestions_is_respected() {
        let state = PersistedState::default();
        let response = suggest_queries(&state, None, Some("implementation"), None, 3);
        assert!(response.total_suggestions() <= 3);
    }
}
