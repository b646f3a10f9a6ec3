//! Fuzzy text similarity capability
//!
//! History matching first tries exact prefix and substring checks; only when
//! both fail does it ask a [`TextSimilarity`] backend for an approximate
//! score. Two backends exist:
//!
//! - [`FuzzySimilarity`]: token-set and partial-ratio measures built on
//!   `strsim`'s normalized Levenshtein distance (max of the two)
//! - [`OverlapSimilarity`]: cheap character-overlap heuristic
//!
//! The backend is chosen once when the engine is built, never per call.

use std::collections::BTreeSet;
use std::sync::Arc;

/// Approximate similarity between a typed fragment and a candidate string
pub trait TextSimilarity: Send + Sync + std::fmt::Debug {
    /// Score in `[0, 100]`
    fn score(&self, fragment: &str, candidate: &str) -> f64;

    fn name(&self) -> &'static str;
}

/// Select the similarity backend for this engine instance
pub fn select_backend(fuzzy_matching: bool) -> Arc<dyn TextSimilarity> {
    if fuzzy_matching {
        Arc::new(FuzzySimilarity)
    } else {
        Arc::new(OverlapSimilarity)
    }
}

/// Library-backed approximate matching
#[derive(Debug, Clone, Copy, Default)]
pub struct FuzzySimilarity;

impl TextSimilarity for FuzzySimilarity {
    fn score(&self, fragment: &str, candidate: &str) -> f64 {
        let a = normalize(fragment);
        let b = normalize(candidate);
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        token_set_ratio(&a, &b).max(partial_ratio(&a, &b)).clamp(0.0, 100.0)
    }

    fn name(&self) -> &'static str {
        "fuzzy"
    }
}

/// Character-overlap fallback: `(overlapping_chars / len(fragment)) * 70`
#[derive(Debug, Clone, Copy, Default)]
pub struct OverlapSimilarity;

impl TextSimilarity for OverlapSimilarity {
    fn score(&self, fragment: &str, candidate: &str) -> f64 {
        let fragment = fragment.to_lowercase();
        let candidate = candidate.to_lowercase();
        let total = fragment.chars().count();
        if total == 0 || candidate.is_empty() {
            return 0.0;
        }
        let overlapping = fragment.chars().filter(|c| candidate.contains(*c)).count();
        (overlapping as f64 / total as f64) * 70.0
    }

    fn name(&self) -> &'static str {
        "overlap"
    }
}

/// Lowercase and replace every non-alphanumeric char with a space
fn normalize(text: &str) -> String {
    let replaced: String = text
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { ' ' })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn ratio(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b) * 100.0
}

/// Compare the sorted intersection of word sets against each side's remainder
fn token_set_ratio(a: &str, b: &str) -> f64 {
    let words_a: BTreeSet<&str> = a.split_whitespace().collect();
    let words_b: BTreeSet<&str> = b.split_whitespace().collect();

    let intersection: Vec<&str> = words_a.intersection(&words_b).copied().collect();
    let only_a: Vec<&str> = words_a.difference(&words_b).copied().collect();
    let only_b: Vec<&str> = words_b.difference(&words_a).copied().collect();

    let base = intersection.join(" ");
    let combined_a = join_nonempty(&base, &only_a.join(" "));
    let combined_b = join_nonempty(&base, &only_b.join(" "));

    let mut best = ratio(&combined_a, &combined_b);
    if !base.is_empty() {
        best = best.max(ratio(&base, &combined_a)).max(ratio(&base, &combined_b));
    }
    best
}

fn join_nonempty(left: &str, right: &str) -> String {
    match (left.is_empty(), right.is_empty()) {
        (true, _) => right.to_string(),
        (_, true) => left.to_string(),
        _ => format!("{} {}", left, right),
    }
}

/// Best ratio of the shorter string against every equally long window of the longer one
fn partial_ratio(a: &str, b: &str) -> f64 {
    let (short, long) = if a.chars().count() <= b.chars().count() { (a, b) } else { (b, a) };
    let long_chars: Vec<char> = long.chars().collect();
    let window = short.chars().count();

    if window == long_chars.len() {
        return ratio(short, long);
    }

    let mut best: f64 = 0.0;
    for start in 0..=(long_chars.len() - window) {
        let slice: String = long_chars[start..start + window].iter().collect();
        best = best.max(ratio(short, &slice));
        if best >= 100.0 {
            break;
        }
    }
    best
}
