//! Suggestion value object shared by every provider and the ranker
//!
//! A `Suggestion` is created fresh for every query and discarded once the
//! ranked list has been delivered. Its `kind` is fixed at construction; only
//! `score` and `usage_count` change afterwards, and only through the ranking
//! rules in [`super::ranking`] and the acceptance hook of the manager.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of suggestion sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionType {
    Function,
    Variable,
    Constant,
    History,
    Pattern,
}

impl SuggestionType {
    /// Fixed tie-break bonus applied during ranking
    ///
    /// Terse, high-value completions (constants, functions) are favored over
    /// longer templates and recalled expressions.
    pub fn priority_bonus(self) -> f64 {
        match self {
            SuggestionType::Constant => 8.0,
            SuggestionType::Function => 5.0,
            SuggestionType::Pattern => 3.0,
            SuggestionType::History => 2.0,
            SuggestionType::Variable => 1.0,
        }
    }

    /// Badge text shown next to a suggestion
    pub fn name(self) -> &'static str {
        match self {
            SuggestionType::Function => "function",
            SuggestionType::Variable => "variable",
            SuggestionType::Constant => "constant",
            SuggestionType::History => "history",
            SuggestionType::Pattern => "pattern",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            SuggestionType::Function => "ƒ",
            SuggestionType::Variable => "𝑥",
            SuggestionType::Constant => "π",
            SuggestionType::History => "↺",
            SuggestionType::Pattern => "⬚",
        }
    }

    /// Badge background color (hex RGB)
    pub fn badge_color(self) -> &'static str {
        match self {
            SuggestionType::Function => "#0A84FF",
            SuggestionType::Variable => "#30D158",
            SuggestionType::Constant => "#BF5AF2",
            SuggestionType::History => "#FF9F0A",
            SuggestionType::Pattern => "#64D2FF",
        }
    }
}

impl fmt::Display for SuggestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single ranked completion candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Completion value; identity key for deduplication
    pub text: String,
    #[serde(rename = "type")]
    kind: SuggestionType,
    /// Accumulates through the ranking stages
    pub score: f64,
    /// Display string (falls back to `text`)
    pub label: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub usage_count: u32,
}

impl Suggestion {
    pub fn new(text: impl Into<String>, kind: SuggestionType, score: f64) -> Self {
        Self {
            text: text.into(),
            kind,
            score,
            label: None,
            description: None,
            category: None,
            usage_count: 0,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_usage_count(mut self, usage_count: u32) -> Self {
        self.usage_count = usage_count;
        self
    }

    /// Source of this suggestion; immutable after construction
    pub fn kind(&self) -> SuggestionType {
        self.kind
    }

    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.text)
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn icon(&self) -> &'static str {
        self.kind.icon()
    }

    pub fn badge_color(&self) -> &'static str {
        self.kind.badge_color()
    }

    /// Number of whitespace-separated words in `text`
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

impl fmt::Display for Suggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Suggestion({:?}, {}, score={:.1})",
            self.text, self.kind, self.score
        )
    }
}
