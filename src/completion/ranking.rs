//! Merging and ranking of provider results
//!
//! Ranking algorithm (applied in order):
//! 1. Concatenate provider outputs in provider order
//! 2. Deduplicate by text, keeping the highest-scoring instance at the
//!    position where the text was first discovered
//! 3. Adjust each survivor's score:
//!    - prefix boost when the text starts with the full input
//!    - variable boost when a Variable names a defined session variable
//!    - usage boost `min(15, 5 * ln(usage_count + 1))`
//!    - length penalty `(word_count - 3) * 2` past three words
//!    - type-priority bonus (see [`SuggestionType::priority_bonus`])
//! 4. Stable sort by score, best first
//! 5. Truncate to `max_results`

use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

use super::suggestion::{Suggestion, SuggestionType};

/// Criteria for ranking merged suggestions
#[derive(Debug, Clone)]
pub struct RankingCriteria {
    /// Bonus when the text starts with the full input (default: 20.0)
    pub prefix_boost: f64,

    /// Bonus for variables defined in the session (default: 10.0)
    pub variable_boost: f64,

    /// Multiplier of the logarithmic usage boost (default: 5.0)
    pub usage_boost_scale: f64,

    /// Upper bound of the usage boost (default: 15.0)
    pub usage_boost_cap: f64,

    /// Words allowed before the length penalty applies (default: 3)
    pub word_allowance: usize,

    /// Penalty per extra word (default: 2.0)
    pub word_penalty: f64,

    /// Maximum results to return (default: 10)
    pub max_results: usize,
}

impl Default for RankingCriteria {
    fn default() -> Self {
        Self {
            prefix_boost: 20.0,
            variable_boost: 10.0,
            usage_boost_scale: 5.0,
            usage_boost_cap: 15.0,
            word_allowance: 3,
            word_penalty: 2.0,
            max_results: 10,
        }
    }
}

impl RankingCriteria {
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn usage_boost(&self, usage_count: u32) -> f64 {
        if usage_count == 0 {
            return 0.0;
        }
        (self.usage_boost_scale * (usage_count as f64 + 1.0).ln()).min(self.usage_boost_cap)
    }

    pub fn length_penalty(&self, word_count: usize) -> f64 {
        if word_count > self.word_allowance {
            (word_count - self.word_allowance) as f64 * self.word_penalty
        } else {
            0.0
        }
    }
}

/// Session state the adjustments depend on
#[derive(Debug, Clone, Copy)]
pub struct RankingContext<'a> {
    /// The full text in the input buffer
    pub input: &'a str,
    /// Variables defined in the calculation session
    pub variables: &'a BTreeMap<String, String>,
}

/// Concatenate provider outputs and keep the best instance per text
///
/// A later duplicate replaces the kept one only when its score is strictly
/// greater; the survivor keeps the first-discovery position.
pub fn merge(batches: Vec<Vec<Suggestion>>) -> Vec<Suggestion> {
    let mut merged: Vec<Suggestion> = Vec::new();
    let mut positions: FxHashMap<String, usize> = FxHashMap::default();

    for suggestion in batches.into_iter().flatten() {
        match positions.get(&suggestion.text) {
            Some(&index) => {
                if suggestion.score > merged[index].score {
                    merged[index] = suggestion;
                }
            }
            None => {
                positions.insert(suggestion.text.clone(), merged.len());
                merged.push(suggestion);
            }
        }
    }

    merged
}

/// Apply every score adjustment to one suggestion
pub fn adjust(suggestion: &mut Suggestion, context: &RankingContext<'_>, criteria: &RankingCriteria) {
    let input = context.input.to_lowercase();
    if !input.is_empty() && suggestion.text.to_lowercase().starts_with(&input) {
        suggestion.score += criteria.prefix_boost;
    }

    if suggestion.kind() == SuggestionType::Variable && context.variables.contains_key(&suggestion.text) {
        suggestion.score += criteria.variable_boost;
    }

    suggestion.score += criteria.usage_boost(suggestion.usage_count);
    suggestion.score -= criteria.length_penalty(suggestion.word_count());
    suggestion.score += suggestion.kind().priority_bonus();
}

/// Merge, adjust, sort and truncate provider outputs
///
/// # Arguments
/// * `batches` - Provider outputs in provider order
/// * `context` - Input text and session variables
/// * `criteria` - Ranking criteria
///
/// # Returns
/// Ranked suggestions (best first), limited to `max_results`
pub fn rank_suggestions(
    batches: Vec<Vec<Suggestion>>,
    context: &RankingContext<'_>,
    criteria: &RankingCriteria,
) -> Vec<Suggestion> {
    let mut suggestions = merge(batches);

    for suggestion in &mut suggestions {
        adjust(suggestion, context, criteria);
    }

    // sort_by is stable: equal scores keep discovery order
    suggestions.sort_by(|a, b| b.score.total_cmp(&a.score));
    suggestions.truncate(criteria.max_results);

    suggestions
}
