//! Library of templated expression patterns
//!
//! Patterns are read once from a JSON document grouped by category:
//!
//! ```json
//! { "algebraic": [ { "name": "quadratic", "pattern": "x**2 + {b}*x + {c}",
//!                    "description": "Quadratic: x² + bx + c", "commonness": 95 } ] }
//! ```
//!
//! and never mutated afterwards. Matching is case- and whitespace-insensitive
//! with tiered similarity:
//!
//! | condition                              | similarity |
//! |----------------------------------------|------------|
//! | name starts with fragment              | 1.0        |
//! | fragment inside name                   | 0.8        |
//! | template starts with fragment          | 0.6        |
//! | fragment inside template               | 0.4        |
//! | fragment only inside description       | 0.0        |
//!
//! Anything else is excluded. A missing or malformed catalog degrades to an
//! empty store (no pattern suggestions) rather than failing start-up.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use super::provider::{ProviderError, SuggestionProvider};
use super::suggestion::{Suggestion, SuggestionType};

const BUILTIN_PATTERNS: &str = include_str!("../../data/patterns.json");

const DEFAULT_COMMONNESS: i64 = 50;

/// Why a pattern catalog could not be loaded
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("pattern catalog not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("pattern catalog {} could not be read: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("pattern catalog {} is malformed: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// An expression template with `{placeholder}` slots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pub name: String,
    pub template: String,
    pub description: String,
    pub category: String,
    /// Author-assigned popularity in `[0, 100]`
    pub commonness: u8,
}

/// On-disk shape of one catalog item
#[derive(Debug, Deserialize)]
struct RawPattern {
    name: String,
    pattern: String,
    #[serde(default)]
    description: String,
    category: Option<String>,
    commonness: Option<i64>,
}

/// A pattern that matched a fragment, with its similarity tier
#[derive(Debug, Clone, Copy)]
pub struct PatternMatch<'a> {
    pub pattern: &'a Pattern,
    pub similarity: f64,
}

/// Immutable pattern catalog
#[derive(Debug, Clone, Default)]
pub struct PatternStore {
    by_category: BTreeMap<String, Vec<Pattern>>,
}

impl PatternStore {
    /// Empty catalog: no pattern suggestions
    pub fn empty() -> Self {
        Self::default()
    }

    /// Catalog compiled into the binary
    pub fn builtin() -> Self {
        match Self::from_json_str(BUILTIN_PATTERNS) {
            Ok(store) => store,
            Err(e) => {
                warn!("Bundled pattern catalog is malformed: {}", e);
                Self::empty()
            }
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let raw: BTreeMap<String, Vec<RawPattern>> = serde_json::from_str(json)?;

        let by_category = raw
            .into_iter()
            .map(|(group, items)| {
                let patterns = items
                    .into_iter()
                    .map(|item| Pattern {
                        name: item.name,
                        template: item.pattern,
                        description: item.description,
                        category: item.category.unwrap_or_else(|| group.clone()),
                        commonness: item.commonness.unwrap_or(DEFAULT_COMMONNESS).clamp(0, 100) as u8,
                    })
                    .collect();
                (group, patterns)
            })
            .collect();

        Ok(Self { by_category })
    }

    /// Load a catalog file
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let text = fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                CatalogError::Missing(path.to_path_buf())
            } else {
                CatalogError::Unreadable { path: path.to_path_buf(), source }
            }
        })?;

        Self::from_json_str(&text).map_err(|source| CatalogError::Malformed {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load a catalog file, degrading to an empty catalog on any failure
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::load(path) {
            Ok(store) => {
                debug!("Loaded {} patterns from {:?}", store.len(), path);
                store
            }
            Err(e) => {
                warn!("{}. Pattern suggestions disabled.", e);
                Self::empty()
            }
        }
    }

    /// Group keys of the catalog document
    pub fn categories(&self) -> Vec<&str> {
        self.by_category.keys().map(String::as_str).collect()
    }

    pub fn patterns_in(&self, category: &str) -> &[Pattern] {
        self.by_category.get(category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pattern> {
        self.by_category.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.by_category.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Patterns matching `fragment`, by similarity then commonness (descending)
    ///
    /// Ties keep catalog order.
    pub fn find_matching(&self, fragment: &str) -> Vec<PatternMatch<'_>> {
        let needle = normalize(fragment);
        if needle.is_empty() {
            return Vec::new();
        }

        let mut matches: Vec<PatternMatch<'_>> = self
            .iter()
            .filter_map(|pattern| {
                similarity(&needle, pattern).map(|similarity| PatternMatch { pattern, similarity })
            })
            .collect();

        matches.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| b.pattern.commonness.cmp(&a.pattern.commonness))
        });

        matches
    }
}

/// Lowercase with all whitespace removed
fn normalize(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).flat_map(char::to_lowercase).collect()
}

/// Similarity tier of a normalized fragment, or `None` when excluded
fn similarity(needle: &str, pattern: &Pattern) -> Option<f64> {
    let name = normalize(&pattern.name);
    let template = normalize(&pattern.template);

    if name.starts_with(needle) {
        Some(1.0)
    } else if name.contains(needle) {
        Some(0.8)
    } else if template.starts_with(needle) {
        Some(0.6)
    } else if template.contains(needle) {
        Some(0.4)
    } else if normalize(&pattern.description).contains(needle) {
        Some(0.0)
    } else {
        None
    }
}

/// `commonness*0.5 + (similarity*100)*0.5`
pub fn pattern_score(similarity: f64, commonness: u8) -> f64 {
    f64::from(commonness) * 0.5 + (similarity * 100.0) * 0.5
}

/// Manager-facing provider over a [`PatternStore`]
#[derive(Debug, Clone)]
pub struct PatternProvider {
    store: Arc<PatternStore>,
}

impl PatternProvider {
    pub fn new(store: Arc<PatternStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &PatternStore {
        &self.store
    }

    pub fn suggestions(&self, fragment: &str) -> Vec<Suggestion> {
        self.store
            .find_matching(fragment)
            .into_iter()
            .map(|m| {
                Suggestion::new(
                    m.pattern.template.clone(),
                    SuggestionType::Pattern,
                    pattern_score(m.similarity, m.pattern.commonness),
                )
                .with_label(m.pattern.template.clone())
                .with_description(m.pattern.description.clone())
                .with_category(m.pattern.category.clone())
            })
            .collect()
    }
}

impl SuggestionProvider for PatternProvider {
    fn name(&self) -> &'static str {
        "patterns"
    }

    fn suggest(&self, fragment: &str) -> Result<Vec<Suggestion>, ProviderError> {
        Ok(self.suggestions(fragment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use indoc::indoc;

    const SMALL_CATALOG: &str = indoc! {r#"
        {
          "algebraic": [
            {"name": "quadratic", "pattern": "x**2 + {b}*x + {c}",
             "description": "Quadratic: x² + bx + c", "category": "algebra", "commonness": 95},
            {"name": "linear", "pattern": "{m}*x + {b}",
             "description": "Linear: mx + b", "commonness": 98}
          ],
          "trigonometric": [
            {"name": "sine_function", "pattern": "{a}*sin({b}*x + {c})",
             "description": "Sine wave", "commonness": 95},
            {"name": "trig_rational", "pattern": "sin(x)/cos(x)",
             "description": "Tangent ratio", "commonness": 80},
            {"name": "sine_sum", "pattern": "sin(x) + sin({a}*x)",
             "description": "Sine sum", "commonness": 170}
          ]
        }
    "#};

    fn store() -> PatternStore {
        PatternStore::from_json_str(SMALL_CATALOG).unwrap()
    }

    #[test]
    fn test_loads_grouped_catalog() {
        let store = store();
        assert_eq!(store.len(), 5);
        assert_eq!(store.categories(), vec!["algebraic", "trigonometric"]);
        // item-level category wins, group key otherwise
        assert_eq!(store.patterns_in("algebraic")[0].category, "algebra");
        assert_eq!(store.patterns_in("algebraic")[1].category, "algebraic");
        // commonness is clamped
        assert_eq!(store.patterns_in("trigonometric")[2].commonness, 100);
        assert!(store.patterns_in("missing").is_empty());
    }

    #[test]
    fn test_similarity_tiers() {
        let store = store();
        let quad = &store.patterns_in("algebraic")[0];

        assert_eq!(similarity("quad", quad), Some(1.0));
        assert_eq!(similarity("atic", quad), Some(0.8));
        assert_eq!(similarity("x**2", quad), Some(0.6));
        assert_eq!(similarity("{b}*x", quad), Some(0.4));
        assert_eq!(similarity("bx+c", quad), Some(0.0));
        assert_eq!(similarity("zzz", quad), None);
    }

    #[test]
    fn test_matching_is_whitespace_and_case_insensitive() {
        let store = store();
        let matches = store.find_matching("X ** 2 +");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].pattern.name, "quadratic");
        assert_eq!(matches[0].similarity, 0.6);
    }

    #[test]
    fn test_ordering_by_similarity_then_commonness() {
        let store = store();
        let matches = store.find_matching("sin");
        let names: Vec<&str> = matches.iter().map(|m| m.pattern.name.as_str()).collect();
        // "sine_function" and "sine_sum" match by name prefix; "trig_rational" by template prefix
        assert_eq!(names, vec!["sine_sum", "sine_function", "trig_rational"]);
    }

    #[test]
    fn test_empty_fragment_matches_nothing() {
        assert!(store().find_matching("   ").is_empty());
    }

    #[test]
    fn test_pattern_score() {
        assert!((pattern_score(1.0, 95) - 97.5).abs() < 1e-9);
        assert!((pattern_score(0.0, 80) - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_provider_builds_pattern_suggestions() {
        let provider = PatternProvider::new(Arc::new(store()));
        let suggestions = provider.suggestions("quad");
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].text, "x**2 + {b}*x + {c}");
        assert_eq!(suggestions[0].kind(), SuggestionType::Pattern);
        assert_eq!(suggestions[0].description.as_deref(), Some("Quadratic: x² + bx + c"));
    }

    #[test]
    fn test_builtin_catalog() {
        let store = PatternStore::builtin();
        assert_eq!(store.len(), 50);
        assert_eq!(
            store.categories(),
            vec!["algebraic", "calculus", "exponential_logarithmic", "statistics", "trigonometric"]
        );
        assert!(store.categories().iter().all(|c| store.patterns_in(c).len() == 10));

        let labels: BTreeSet<&str> = store.iter().map(|p| p.category.as_str()).collect();
        assert_eq!(
            labels.into_iter().collect::<Vec<_>>(),
            vec!["algebra", "calculus", "exponential", "logarithmic", "statistics", "trigonometry"]
        );
        let exp_log = store.patterns_in("exponential_logarithmic");
        assert_eq!(exp_log.iter().filter(|p| p.category == "exponential").count(), 5);
        assert!(store.iter().all(|p| p.commonness <= 100));
    }

    #[test]
    fn test_missing_file_degrades_to_empty() {
        let path = Path::new("/nonexistent/patterns.json");
        assert!(matches!(PatternStore::load(path), Err(CatalogError::Missing(_))));
        assert!(PatternStore::load_or_empty(path).is_empty());
    }
}
