//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use indoc::indoc;

use calc_autocomplete::completion::{
    AutocompleteManager, FixedClock, ManualScheduler, PatternStore, SuggestionReceiver,
};
use calc_autocomplete::config::AutocompleteConfig;
use calc_autocomplete::session::InMemorySession;

pub const NOW: f64 = 1_700_000_000.0;

/// Small pattern catalog with one template per interesting tier
pub const TEST_PATTERNS: &str = indoc! {r#"
    {
      "algebraic": [
        {"name": "quadratic", "pattern": "x**2 + {b}*x + {c}",
         "description": "Quadratic: x² + bx + c", "commonness": 95},
        {"name": "logistic", "pattern": "log",
         "description": "Plain log template", "commonness": 94}
      ],
      "trigonometric": [
        {"name": "pythagorean", "pattern": "sin(x)**2 + cos(x)**2",
         "description": "Pythagorean identity", "commonness": 90}
      ]
    }
"#};

pub struct Fixture {
    pub manager: Arc<AutocompleteManager>,
    pub receiver: SuggestionReceiver,
    pub scheduler: Arc<ManualScheduler>,
    pub clock: Arc<FixedClock>,
    pub session: Arc<InMemorySession>,
}

pub fn fixture() -> Fixture {
    fixture_with(AutocompleteConfig::default(), PatternStore::builtin())
}

pub fn fixture_with(config: AutocompleteConfig, patterns: PatternStore) -> Fixture {
    let scheduler = Arc::new(ManualScheduler::new());
    let clock = Arc::new(FixedClock::new(NOW));
    let session = Arc::new(InMemorySession::new());

    let (manager, receiver) = AutocompleteManager::builder(config)
        .scheduler(scheduler.clone())
        .clock(clock.clone())
        .session(session.clone())
        .pattern_store(patterns)
        .build()
        .expect("manager should build with an explicit scheduler");

    Fixture { manager, receiver, scheduler, clock, session }
}

pub fn test_patterns() -> PatternStore {
    PatternStore::from_json_str(TEST_PATTERNS).expect("test patterns should parse")
}

pub fn texts(suggestions: &[calc_autocomplete::Suggestion]) -> Vec<&str> {
    suggestions.iter().map(|s| s.text.as_str()).collect()
}
