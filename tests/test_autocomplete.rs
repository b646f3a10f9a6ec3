/// Integration tests for the autocomplete pipeline
///
/// Tests verify:
/// - Threshold fast path and empty queries
/// - Provider scoring as seen through the manager
/// - Dedup of texts reported by several providers
/// - Provider isolation (errors and panics)
/// - Deterministic ordering under a frozen clock

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use calc_autocomplete::completion::{
    AutocompleteManager, Catalog, FixedClock, ManualScheduler, PatternStore, ProviderError,
    SuggestionProvider,
};
use calc_autocomplete::config::AutocompleteConfig;
use calc_autocomplete::session::{InMemorySession, LogLineHistory};
use calc_autocomplete::{Suggestion, SuggestionType};

use common::{fixture, fixture_with, test_patterns, texts};

/// Provider returning a fixed list and counting its invocations
struct StubProvider {
    name: &'static str,
    suggestions: Vec<Suggestion>,
    calls: AtomicUsize,
}

impl StubProvider {
    fn new(name: &'static str, suggestions: Vec<Suggestion>) -> Arc<Self> {
        Arc::new(Self { name, suggestions, calls: AtomicUsize::new(0) })
    }
}

impl SuggestionProvider for StubProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn suggest(&self, _fragment: &str) -> Result<Vec<Suggestion>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.suggestions.clone())
    }
}

struct FailingProvider;

impl SuggestionProvider for FailingProvider {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn suggest(&self, _fragment: &str) -> Result<Vec<Suggestion>, ProviderError> {
        Err(ProviderError::Failed { provider: "failing", message: "index unavailable".to_string() })
    }
}

struct PanickingProvider;

impl SuggestionProvider for PanickingProvider {
    fn name(&self) -> &'static str {
        "panicking"
    }

    fn suggest(&self, _fragment: &str) -> Result<Vec<Suggestion>, ProviderError> {
        panic!("provider bug");
    }
}

/// Manager with no built-in catalog or patterns, only the given providers
fn isolated_manager(providers: Vec<Arc<dyn SuggestionProvider>>) -> Arc<AutocompleteManager> {
    let mut builder = AutocompleteManager::builder(AutocompleteConfig::default())
        .scheduler(Arc::new(ManualScheduler::new()))
        .clock(Arc::new(FixedClock::new(common::NOW)))
        .catalog(Arc::new(Catalog::default()))
        .pattern_store(PatternStore::empty());
    for provider in providers {
        builder = builder.provider(provider);
    }
    builder.build().unwrap().0
}

#[test]
fn test_empty_query_returns_nothing() {
    let mut fx = fixture();
    assert!(fx.manager.query("").is_empty());

    fx.manager.on_text_changed("");
    assert_eq!(fx.receiver.try_recv().unwrap(), Vec::<Suggestion>::new());
}

#[test]
fn test_below_threshold_invokes_no_provider() {
    let stub = StubProvider::new("stub", vec![Suggestion::new("xy", SuggestionType::Function, 1.0)]);
    let manager = isolated_manager(vec![stub.clone()]);

    assert!(manager.query("x").is_empty());
    assert!(manager.query("é").is_empty());
    assert_eq!(stub.calls.load(Ordering::SeqCst), 0);

    assert_eq!(texts(&manager.query("xy")), vec!["xy"]);
    assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_repeated_expression_suggested_from_history() {
    let fx = fixture();
    for _ in 0..3 {
        fx.manager.record_usage("sin(x)+cos(x)");
    }
    fx.manager.record_usage("tan(x)");

    assert!((fx.manager.history().frequency_score("sin(x)+cos(x)") - 100.0).abs() < 1e-9);

    let results = fx.manager.query("sin");
    let recalled = results
        .iter()
        .find(|s| s.text == "sin(x)+cos(x)")
        .expect("history expression should be suggested");
    assert_eq!(recalled.kind(), SuggestionType::History);
    assert_eq!(recalled.usage_count, 0);
    assert_eq!(recalled.description.as_deref(), Some("used 3 times"));
}

#[test]
fn test_history_usage_not_boosted_twice() {
    let fx = fixture_with(AutocompleteConfig::default(), PatternStore::empty());
    for _ in 0..3 {
        fx.manager.record_usage("sin(x)+cos(x)");
    }

    let provider_score = fx
        .manager
        .history()
        .suggestions("sin")
        .into_iter()
        .find(|s| s.text == "sin(x)+cos(x)")
        .unwrap()
        .score;
    assert!((provider_score - 100.0).abs() < 1e-9);

    let ranked = fx.manager.query("sin");
    let recalled = ranked.iter().find(|s| s.text == "sin(x)+cos(x)").unwrap();
    // provider score, prefix boost 20, history bonus 2; no usage boost
    assert!((recalled.score - (provider_score + 20.0 + 2.0)).abs() < 1e-9);
    assert_eq!(ranked[0].text, "sin(x)+cos(x)");
}

#[test]
fn test_accepted_history_gains_session_boost_only() {
    let fx = fixture_with(AutocompleteConfig::default(), PatternStore::empty());
    for _ in 0..3 {
        fx.manager.record_usage("sin(x)+cos(x)");
    }

    let mut recalled = fx
        .manager
        .query("sin")
        .into_iter()
        .find(|s| s.text == "sin(x)+cos(x)")
        .unwrap();
    fx.manager.on_suggestion_accepted(&mut recalled);
    assert_eq!(recalled.usage_count, 1);

    let ranked = fx.manager.query("sin");
    let boosted = ranked.iter().find(|s| s.text == "sin(x)+cos(x)").unwrap();
    assert_eq!(boosted.usage_count, 1);
    // four recorded uses keep frequency and recency at 100; the one acceptance adds 5*ln(2)
    assert!((boosted.score - (122.0 + 5.0 * 2f64.ln())).abs() < 1e-9);
}

#[test]
fn test_constant_from_catalog() {
    let fx = fixture_with(AutocompleteConfig::default(), PatternStore::empty());
    let results = fx.manager.query("pi");

    let pi = results.iter().find(|s| s.text == "pi").expect("pi should be suggested");
    assert_eq!(pi.kind(), SuggestionType::Constant);
    // reference 37, prefix boost 20, constant bonus 8
    assert!((pi.score - 65.0).abs() < 1e-9);
    assert_eq!(results[0].text, "pi");
}

#[test]
fn test_duplicate_text_keeps_best_provider_score() {
    let catalog_like = StubProvider::new("low", vec![Suggestion::new("log", SuggestionType::Function, 12.0)]);
    let pattern_like = StubProvider::new("high", vec![Suggestion::new("log", SuggestionType::Pattern, 47.0)]);
    let manager = isolated_manager(vec![catalog_like, pattern_like]);

    let results = manager.query("lo");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].kind(), SuggestionType::Pattern);
    // 47 survives dedup, then prefix boost 20 and pattern bonus 3
    assert!((results[0].score - 70.0).abs() < 1e-9);
}

#[test]
fn test_failing_providers_do_not_block_others() {
    let good = StubProvider::new("good", vec![Suggestion::new("sqrt", SuggestionType::Function, 44.0)]);
    let manager = isolated_manager(vec![
        Arc::new(FailingProvider),
        Arc::new(PanickingProvider),
        good.clone(),
    ]);

    let results = manager.query("sq");
    assert_eq!(texts(&results), vec!["sqrt"]);
    assert_eq!(good.calls.load(Ordering::SeqCst), 1);

    // the panicking provider is queried again on the next search
    assert_eq!(texts(&manager.query("sqr")), vec!["sqrt"]);
}

#[test]
fn test_session_variable_boost() {
    let session = Arc::new(InMemorySession::with_variables([("sx", "3")]));
    let stub = StubProvider::new(
        "vars",
        vec![
            Suggestion::new("sy", SuggestionType::Variable, 50.0),
            Suggestion::new("sx", SuggestionType::Variable, 50.0),
        ],
    );
    let (manager, _rx) = AutocompleteManager::builder(AutocompleteConfig::default())
        .scheduler(Arc::new(ManualScheduler::new()))
        .catalog(Arc::new(Catalog::default()))
        .pattern_store(PatternStore::empty())
        .session(session)
        .provider(stub)
        .build()
        .unwrap();

    let results = manager.query("qq");
    assert_eq!(texts(&results), vec!["sx", "sy"]);
    assert_eq!(results[0].score, 61.0);
    assert_eq!(results[1].score, 51.0);
}

#[test]
fn test_results_are_deterministic() {
    let fx = fixture();
    fx.manager.record_usage("cos(x)**2");
    fx.manager.record_usage("cos(2*x)");
    fx.manager.record_usage("cos(2*x)");

    let first = fx.manager.query("cos");
    let second = fx.manager.query("cos");
    assert_eq!(first, second);
    assert!(first.len() <= 10);
    assert!(first.windows(2).all(|w| w[0].score >= w[1].score));
}

#[test]
fn test_cursor_selects_token() {
    let fx = fixture_with(AutocompleteConfig::default(), PatternStore::empty());
    let results = fx.manager.query_at("sqrt(2) + co", Some(1));
    assert!(results.iter().any(|s| s.text == "sqrt"));
    assert!(!results.iter().any(|s| s.text == "cos"));

    let tail = fx.manager.query("sqrt(2) + co");
    assert!(tail.iter().any(|s| s.text == "cos"));
}

#[test]
fn test_pattern_suggestions_from_catalog() {
    let fx = fixture_with(AutocompleteConfig::default(), test_patterns());
    let results = fx.manager.query("quad");

    let quadratic = results
        .iter()
        .find(|s| s.kind() == SuggestionType::Pattern)
        .expect("quadratic template should be suggested");
    assert_eq!(quadratic.text, "x**2 + {b}*x + {c}");
    assert_eq!(quadratic.category.as_deref(), Some("algebraic"));
    // 95*0.5 + 50, five words cost 4, pattern bonus 3
    assert!((quadratic.score - 96.5).abs() < 1e-9);
}

#[test]
fn test_mid_expression_patterns_match_current_token() {
    let fx = fixture_with(AutocompleteConfig::default(), test_patterns());

    // only "lo" reaches the providers; the pattern "log" outscores the function
    let results = fx.manager.query("x**2 + lo");
    assert_eq!(texts(&results), vec!["log", "floor"]);
    assert_eq!(results[0].kind(), SuggestionType::Pattern);
    // 94*0.5 + 50 with pattern bonus 3; no prefix boost against the full input
    assert!((results[0].score - 100.0).abs() < 1e-9);

    // a trailing operator falls back to the last token "2", a template substring
    let results = fx.manager.query("x**2 +");
    assert_eq!(texts(&results), vec!["x**2 + {b}*x + {c}", "sin(x)**2 + cos(x)**2"]);
    // 95*0.5 + 20, prefix boost 20, five words cost 4, pattern bonus 3
    assert!((results[0].score - 86.5).abs() < 1e-9);
    assert!((results[1].score - 68.0).abs() < 1e-9);
}

#[test]
fn test_missing_pattern_file_degrades_to_empty() {
    let config = AutocompleteConfig {
        patterns_path: Some("/nonexistent/patterns.json".into()),
        ..AutocompleteConfig::default()
    };
    let (manager, _rx) = AutocompleteManager::builder(config)
        .scheduler(Arc::new(ManualScheduler::new()))
        .build()
        .unwrap();

    assert!(manager.patterns().is_empty());
    let results = manager.query("sin");
    assert!(results.iter().all(|s| s.kind() != SuggestionType::Pattern));
    assert!(results.iter().any(|s| s.text == "sin"));
}

#[test]
fn test_history_panel_lines_feed_suggestions() {
    let history = Arc::new(LogLineHistory::new([
        "simplify: tan(x)*cos(x) => sin(x)",
        "diff: x**3, x => 3*x**2",
    ]));
    let (manager, _rx) = AutocompleteManager::builder(AutocompleteConfig::default())
        .scheduler(Arc::new(ManualScheduler::new()))
        .pattern_store(PatternStore::empty())
        .history_source(history)
        .build()
        .unwrap();

    let results = manager.query("tan");
    let recalled: Vec<&Suggestion> = results.iter().filter(|s| s.kind() == SuggestionType::History).collect();
    assert_eq!(recalled.len(), 1);
    assert_eq!(recalled[0].text, "tan(x)*cos(x)");
    assert_eq!(recalled[0].description.as_deref(), Some("from history"));
    assert_eq!(recalled[0].usage_count, 0);
}

#[test]
fn test_accepted_suggestion_gains_usage_boost() {
    let fx = fixture_with(AutocompleteConfig::default(), PatternStore::empty());
    let before = fx.manager.query("ta");
    let mut tanh = before.iter().find(|s| s.text == "tanh").cloned().unwrap();
    let tan_score = before.iter().find(|s| s.text == "tan").unwrap().score;
    assert_eq!(tanh.score, tan_score);

    fx.manager.on_suggestion_accepted(&mut tanh);

    let after = fx.manager.query("ta");
    let boosted = after.iter().find(|s| s.text == "tanh").unwrap();
    assert_eq!(boosted.usage_count, 1);
    assert!(boosted.score > tan_score);
    assert_eq!(after[0].text, "tanh");
}
