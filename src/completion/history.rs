//! Usage-aware suggestions from previously used expressions
//!
//! The History Provider owns the session-wide usage table: one
//! [`UsageRecord`] per expression, created on first use and updated on every
//! subsequent use. Candidates are the table's expressions plus anything the
//! attached [`HistorySource`] reports.
//!
//! Scoring of a candidate against a fragment:
//!
//! - similarity: prefix 100; substring `min(95, 100 - (index/len)*20)`;
//!   otherwise the configured [`TextSimilarity`] backend. Candidates below
//!   the minimum similarity (default 40) are dropped.
//! - frequency: `100 * ln(c+1) / ln(M+1)`, or a neutral 50 when no
//!   expression has been used more than once
//! - recency: `100 * e^(-hours/24)`, 0 for never-used expressions
//! - combined: `similarity*0.3 + frequency*0.4 + recency*0.3`
//!
//! # Thread Safety
//!
//! The table sits behind `Arc<RwLock<UsageTable>>`. Queries take the read
//! lock; `record_usage`, `prune` and `restore` are the only writers.

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, trace};

use super::clock::SharedClock;
use super::provider::{ProviderError, SuggestionProvider};
use super::similarity::TextSimilarity;
use super::suggestion::{Suggestion, SuggestionType};
use crate::session::HistorySource;

pub const DEFAULT_MIN_SIMILARITY: f64 = 40.0;
pub const DEFAULT_MAX_RESULTS: usize = 5;
const RECENCY_DECAY_HOURS: f64 = 24.0;
const SECONDS_PER_DAY: f64 = 86_400.0;

/// Usage statistics for one expression
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UsageRecord {
    pub count: u64,
    /// Unix seconds of the last use
    pub last_used: Option<f64>,
}

/// Expression to usage record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsageTable {
    records: FxHashMap<String, UsageRecord>,
}

pub type SharedUsageTable = Arc<RwLock<UsageTable>>;

impl UsageTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the count and stamp `now`
    pub fn record(&mut self, expression: &str, now: f64) -> UsageRecord {
        let record = self.records.entry(expression.to_string()).or_default();
        record.count += 1;
        record.last_used = Some(now);
        *record
    }

    pub fn insert(&mut self, expression: impl Into<String>, record: UsageRecord) {
        self.records.insert(expression.into(), record);
    }

    pub fn get(&self, expression: &str) -> Option<&UsageRecord> {
        self.records.get(expression)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &UsageRecord)> {
        self.records.iter()
    }

    /// Highest usage count across all expressions (0 when empty)
    pub fn max_count(&self) -> u64 {
        self.records.values().map(|r| r.count).max().unwrap_or(0)
    }

    /// Drop records last used before `cutoff`; returns how many were removed
    pub fn retain_since(&mut self, cutoff: f64) -> usize {
        let before = self.records.len();
        self.records
            .retain(|_, record| record.last_used.is_some_and(|t| t >= cutoff));
        before - self.records.len()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// `100 * ln(c+1) / ln(M+1)`, neutral 50 when `M <= 1`
pub fn frequency_score(count: u64, max_count: u64) -> f64 {
    if max_count <= 1 {
        return 50.0;
    }
    let score = 100.0 * ((count as f64) + 1.0).ln() / ((max_count as f64) + 1.0).ln();
    score.clamp(0.0, 100.0)
}

/// `100 * e^(-hours/24)` since `last_used`; 0 when never used
pub fn recency_score(last_used: Option<f64>, now: f64) -> f64 {
    match last_used {
        Some(last_used) => {
            let hours = (now - last_used).max(0.0) / 3600.0;
            100.0 * (-hours / RECENCY_DECAY_HOURS).exp()
        }
        None => 0.0,
    }
}

pub fn combined_score(similarity: f64, frequency: f64, recency: f64) -> f64 {
    similarity * 0.3 + frequency * 0.4 + recency * 0.3
}

/// Suggestions drawn from the user's own calculations
#[derive(Clone)]
pub struct HistoryProvider {
    table: SharedUsageTable,
    source: Option<Arc<dyn HistorySource>>,
    similarity: Arc<dyn TextSimilarity>,
    clock: SharedClock,
    min_similarity: f64,
    max_results: usize,
}

impl std::fmt::Debug for HistoryProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryProvider")
            .field("tracked", &self.table.read().len())
            .field("has_source", &self.source.is_some())
            .field("similarity", &self.similarity.name())
            .field("min_similarity", &self.min_similarity)
            .field("max_results", &self.max_results)
            .finish()
    }
}

impl HistoryProvider {
    pub fn new(similarity: Arc<dyn TextSimilarity>, clock: SharedClock) -> Self {
        Self {
            table: Arc::new(RwLock::new(UsageTable::new())),
            source: None,
            similarity,
            clock,
            min_similarity: DEFAULT_MIN_SIMILARITY,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    pub fn with_history_source(mut self, source: Arc<dyn HistorySource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_limits(mut self, min_similarity: f64, max_results: usize) -> Self {
        self.min_similarity = min_similarity;
        self.max_results = max_results;
        self
    }

    /// Handle to the shared usage table
    pub fn table(&self) -> SharedUsageTable {
        Arc::clone(&self.table)
    }

    /// Copy of the current usage table
    pub fn snapshot(&self) -> UsageTable {
        self.table.read().clone()
    }

    /// Replace the usage table wholesale
    pub fn restore(&self, table: UsageTable) {
        *self.table.write() = table;
    }

    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    /// Record that `expression` was used; the only mutation path for usage
    pub fn record_usage(&self, expression: &str) {
        let expression = expression.trim();
        if expression.is_empty() {
            return;
        }
        let now = self.clock.now();
        let record = self.table.write().record(expression, now);
        debug!("Recorded usage of {:?} (count {})", expression, record.count);
    }

    /// The `n` most used expressions, most recent first on equal counts
    pub fn get_top(&self, n: usize) -> Vec<(String, UsageRecord)> {
        let mut entries: Vec<(String, UsageRecord)> = self
            .table
            .read()
            .iter()
            .map(|(expression, record)| (expression.clone(), *record))
            .collect();

        entries.sort_by(|(expr_a, a), (expr_b, b)| {
            b.count
                .cmp(&a.count)
                .then_with(|| b.last_used.unwrap_or(0.0).total_cmp(&a.last_used.unwrap_or(0.0)))
                .then_with(|| expr_a.cmp(expr_b))
        });
        entries.truncate(n);
        entries
    }

    /// Remove records not used within the last `older_than_days` days
    pub fn prune(&self, older_than_days: f64) -> usize {
        let cutoff = self.clock.now() - older_than_days * SECONDS_PER_DAY;
        let removed = self.table.write().retain_since(cutoff);
        if removed > 0 {
            debug!("Pruned {} history entries older than {} days", removed, older_than_days);
        }
        removed
    }

    /// Similarity of `fragment` against `candidate` in `[0, 100]`
    pub fn similarity_score(&self, fragment: &str, candidate: &str) -> f64 {
        let fragment = fragment.to_lowercase();
        let candidate = candidate.to_lowercase();
        if fragment.is_empty() || candidate.is_empty() {
            return 0.0;
        }

        if candidate.starts_with(&fragment) {
            return 100.0;
        }

        if let Some(byte_idx) = candidate.find(&fragment) {
            let index = candidate[..byte_idx].chars().count() as f64;
            let len = candidate.chars().count() as f64;
            return (100.0 - (index / len) * 20.0).min(95.0);
        }

        self.similarity.score(&fragment, &candidate)
    }

    pub fn frequency_score(&self, expression: &str) -> f64 {
        let table = self.table.read();
        let count = table.get(expression).map_or(0, |r| r.count);
        frequency_score(count, table.max_count())
    }

    pub fn recency_score(&self, expression: &str) -> f64 {
        let last_used = self.table.read().get(expression).and_then(|r| r.last_used);
        recency_score(last_used, self.clock.now())
    }

    /// History suggestions for `fragment`, best first
    pub fn suggestions(&self, fragment: &str) -> Vec<Suggestion> {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            return Vec::new();
        }

        let now = self.clock.now();
        let table = self.table.read();
        let max_count = table.max_count();

        let mut candidates: Vec<String> = table.iter().map(|(expression, _)| expression.clone()).collect();
        if let Some(ref source) = self.source {
            let known: FxHashSet<String> = candidates.iter().cloned().collect();
            candidates.extend(
                source
                    .records()
                    .into_iter()
                    .map(|record| record.expression.trim().to_string())
                    .filter(|expression| !expression.is_empty() && !known.contains(expression)),
            );
        }
        candidates.sort();
        candidates.dedup();

        let mut suggestions: Vec<Suggestion> = candidates
            .into_iter()
            .filter_map(|expression| {
                let similarity = self.similarity_score(fragment, &expression);
                if similarity < self.min_similarity {
                    trace!("History candidate {:?} below similarity gate ({:.1})", expression, similarity);
                    return None;
                }

                let record = table.get(&expression).copied().unwrap_or_default();
                let score = combined_score(
                    similarity,
                    frequency_score(record.count, max_count),
                    recency_score(record.last_used, now),
                );

                let description = if record.count > 0 {
                    format!("used {} time{}", record.count, if record.count == 1 { "" } else { "s" })
                } else {
                    "from history".to_string()
                };

                Some(
                    Suggestion::new(expression.clone(), SuggestionType::History, score)
                        .with_label(expression)
                        .with_description(description)
                        .with_category("history"),
                )
            })
            .collect();

        suggestions.sort_by(|a, b| b.score.total_cmp(&a.score));
        suggestions.truncate(self.max_results);
        suggestions
    }
}

impl SuggestionProvider for HistoryProvider {
    fn name(&self) -> &'static str {
        "history"
    }

    fn suggest(&self, fragment: &str) -> Result<Vec<Suggestion>, ProviderError> {
        Ok(self.suggestions(fragment))
    }
}
