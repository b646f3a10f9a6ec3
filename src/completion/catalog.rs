//! Static function and constant catalog
//!
//! The catalog is built once into an immutable [`Catalog`] and shared by
//! reference; queries are a pure function of that data and the fragment.
//!
//! Scoring:
//! - similarity: prefix match 1.0, substring match 0.6, otherwise excluded
//! - reference score: `base_frequency*0.4 + base_recency*0.3 + (similarity*100)*0.3`
//!
//! Functions carry higher base weights than constants (20/20 vs 10/10).

use once_cell::sync::Lazy;
use std::sync::Arc;

use super::provider::{ProviderError, SuggestionProvider};
use super::suggestion::{Suggestion, SuggestionType};

pub const FUNCTION_BASE_FREQUENCY: f64 = 20.0;
pub const FUNCTION_BASE_RECENCY: f64 = 20.0;
pub const CONSTANT_BASE_FREQUENCY: f64 = 10.0;
pub const CONSTANT_BASE_RECENCY: f64 = 10.0;

/// (name, description, category)
const FUNCTIONS: &[(&str, &str, &str)] = &[
    ("add", "addition", "arithmetic"),
    ("sub", "subtraction", "arithmetic"),
    ("mul", "multiplication", "arithmetic"),
    ("div", "division", "arithmetic"),
    ("pow", "power", "powers"),
    ("sqrt", "square root", "roots"),
    ("cbrt", "cube root", "roots"),
    ("exp", "exponential", "exponentials"),
    ("log", "logarithm base 10", "logarithms"),
    ("ln", "natural logarithm", "logarithms"),
    ("sin", "sine", "trigonometry"),
    ("cos", "cosine", "trigonometry"),
    ("tan", "tangent", "trigonometry"),
    ("cot", "cotangent", "trigonometry"),
    ("sec", "secant", "trigonometry"),
    ("csc", "cosecant", "trigonometry"),
    ("asin", "inverse sine", "trigonometry"),
    ("acos", "inverse cosine", "trigonometry"),
    ("atan", "inverse tangent", "trigonometry"),
    ("sinh", "hyperbolic sine", "trigonometry"),
    ("cosh", "hyperbolic cosine", "trigonometry"),
    ("tanh", "hyperbolic tangent", "trigonometry"),
    ("asinh", "inverse hyperbolic sine", "trigonometry"),
    ("acosh", "inverse hyperbolic cosine", "trigonometry"),
    ("atanh", "inverse hyperbolic tangent", "trigonometry"),
    ("abs", "absolute value", "algebra"),
    ("floor", "floor", "rounding"),
    ("ceil", "ceiling", "rounding"),
    ("round", "round", "rounding"),
    ("mean", "mean", "statistics"),
    ("sum", "sum", "statistics"),
    ("min", "minimum", "statistics"),
    ("max", "maximum", "statistics"),
    ("gamma", "gamma function", "special"),
    ("factorial", "factorial", "special"),
];

const CONSTANTS: &[(&str, &str)] = &[
    ("pi", "pi"),
    ("e", "e"),
    ("tau", "tau"),
    ("phi", "golden ratio"),
    ("oo", "infinity"),
];

/// A catalog entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub name: String,
    pub description: String,
    pub category: Option<String>,
}

/// Immutable function/constant tables
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub functions: Vec<CatalogEntry>,
    pub constants: Vec<CatalogEntry>,
}

static BUILTIN: Lazy<Arc<Catalog>> = Lazy::new(|| {
    Arc::new(Catalog {
        functions: FUNCTIONS
            .iter()
            .map(|(name, description, category)| CatalogEntry {
                name: name.to_string(),
                description: description.to_string(),
                category: Some(category.to_string()),
            })
            .collect(),
        constants: CONSTANTS
            .iter()
            .map(|(name, description)| CatalogEntry {
                name: name.to_string(),
                description: description.to_string(),
                category: Some("constants".to_string()),
            })
            .collect(),
    })
});

impl Catalog {
    /// Shared handle to the built-in calculator catalog
    pub fn builtin() -> Arc<Catalog> {
        Arc::clone(&BUILTIN)
    }
}

/// Similarity of `fragment` against a catalog name (0.0, 0.6 or 1.0)
pub fn name_similarity(fragment: &str, name: &str) -> f64 {
    let fragment = fragment.to_lowercase();
    let name = name.to_lowercase();
    if fragment.is_empty() || name.is_empty() {
        return 0.0;
    }
    if name.starts_with(&fragment) {
        1.0
    } else if name.contains(&fragment) {
        0.6
    } else {
        0.0
    }
}

pub fn reference_score(similarity: f64, base_frequency: f64, base_recency: f64) -> f64 {
    base_frequency * 0.4 + base_recency * 0.3 + (similarity * 100.0) * 0.3
}

/// Provider over the function and constant catalog
#[derive(Debug, Clone)]
pub struct CatalogProvider {
    catalog: Arc<Catalog>,
}

impl CatalogProvider {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Function and constant suggestions for `fragment`
    ///
    /// Functions come first, then constants, each in catalog order.
    pub fn suggestions(&self, fragment: &str) -> Vec<Suggestion> {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            return Vec::new();
        }

        let functions = self.catalog.functions.iter().filter_map(|entry| {
            let similarity = name_similarity(fragment, &entry.name);
            (similarity > 0.0).then(|| {
                let score = reference_score(similarity, FUNCTION_BASE_FREQUENCY, FUNCTION_BASE_RECENCY);
                build(entry, SuggestionType::Function, score, format!("{}(x)", entry.name))
            })
        });

        let constants = self.catalog.constants.iter().filter_map(|entry| {
            let similarity = name_similarity(fragment, &entry.name);
            (similarity > 0.0).then(|| {
                let score = reference_score(similarity, CONSTANT_BASE_FREQUENCY, CONSTANT_BASE_RECENCY);
                build(entry, SuggestionType::Constant, score, entry.name.clone())
            })
        });

        functions.chain(constants).collect()
    }
}

fn build(entry: &CatalogEntry, kind: SuggestionType, score: f64, label: String) -> Suggestion {
    let mut suggestion = Suggestion::new(entry.name.clone(), kind, score)
        .with_label(label)
        .with_description(entry.description.clone());
    if let Some(ref category) = entry.category {
        suggestion = suggestion.with_category(category.clone());
    }
    suggestion
}

impl Default for CatalogProvider {
    fn default() -> Self {
        Self::new(Catalog::builtin())
    }
}

impl SuggestionProvider for CatalogProvider {
    fn name(&self) -> &'static str {
        "catalog"
    }

    fn suggest(&self, fragment: &str) -> Result<Vec<Suggestion>, ProviderError> {
        Ok(self.suggestions(fragment))
    }
}
