//! Autocomplete Manager
//!
//! Drives the per-keystroke state machine and owns the providers:
//!
//! - **Idle** → `on_text_changed` with fewer than `min_chars_trigger` chars
//!   emits `[]` immediately and cancels any pending search
//! - **Pending** → otherwise the debounce timer is (re)started with the
//!   latest text; earlier pending searches never run
//! - **Searching** → when the timer fires, the current token is fanned out
//!   to the catalog, history and pattern providers, merged, ranked and
//!   emitted on the results channel
//!
//! Every keystroke bumps a generation number. A fired search whose
//! generation is no longer current is dropped, and the check-then-emit step
//! holds the state lock, so a superseded search can never overwrite newer
//! results.

use anyhow::{Context, Result};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, trace};

use super::catalog::{Catalog, CatalogProvider};
use super::clock::{SharedClock, SystemClock};
use super::debounce::{Debouncer, Scheduler, TokioScheduler};
use super::history::{HistoryProvider, UsageRecord};
use super::patterns::{PatternProvider, PatternStore};
use super::persistence::{self, LearningDataStatus};
use super::provider::{ProviderError, SuggestionProvider};
use super::ranking::{RankingContext, RankingCriteria, rank_suggestions};
use super::similarity::select_backend;
use super::suggestion::{Suggestion, SuggestionType};
use super::tokenizer::current_token;
use crate::config::AutocompleteConfig;
use crate::metrics::{TimingGuard, metrics};
use crate::session::{CalculationSession, HistorySource};

const VARIABLE_CHIP_SCORE: f64 = 80.0;

pub type SuggestionReceiver = mpsc::UnboundedReceiver<Vec<Suggestion>>;

#[derive(Debug, Default)]
struct InputState {
    current_input: String,
    pending_text: String,
    generation: u64,
}

/// Builder for [`AutocompleteManager`]
pub struct AutocompleteBuilder {
    config: AutocompleteConfig,
    catalog: Option<Arc<Catalog>>,
    patterns: Option<PatternStore>,
    session: Option<Arc<dyn CalculationSession>>,
    history_source: Option<Arc<dyn HistorySource>>,
    clock: Option<SharedClock>,
    scheduler: Option<Arc<dyn Scheduler>>,
    extra_providers: Vec<Arc<dyn SuggestionProvider>>,
}

impl AutocompleteBuilder {
    pub fn new(config: AutocompleteConfig) -> Self {
        Self {
            config,
            catalog: None,
            patterns: None,
            session: None,
            history_source: None,
            clock: None,
            scheduler: None,
            extra_providers: Vec::new(),
        }
    }

    pub fn catalog(mut self, catalog: Arc<Catalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Use `store` instead of loading `patterns_path` or the bundled catalog
    pub fn pattern_store(mut self, store: PatternStore) -> Self {
        self.patterns = Some(store);
        self
    }

    pub fn session(mut self, session: Arc<dyn CalculationSession>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn history_source(mut self, source: Arc<dyn HistorySource>) -> Self {
        self.history_source = Some(source);
        self
    }

    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Append a provider queried after the built-in three
    pub fn provider(mut self, provider: Arc<dyn SuggestionProvider>) -> Self {
        self.extra_providers.push(provider);
        self
    }

    /// Build the manager and the receiving end of its results channel
    ///
    /// Without an explicit scheduler the manager debounces on the tokio
    /// runtime of the calling task.
    pub fn build(self) -> Result<(Arc<AutocompleteManager>, SuggestionReceiver)> {
        let scheduler: Arc<dyn Scheduler> = match self.scheduler {
            Some(scheduler) => scheduler,
            None => Arc::new(
                TokioScheduler::current().context("no tokio runtime available for debouncing; supply a scheduler")?,
            ),
        };

        let patterns = match (self.patterns, &self.config.patterns_path) {
            (Some(store), _) => store,
            (None, Some(path)) => PatternStore::load_or_empty(path),
            (None, None) => PatternStore::builtin(),
        };

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let similarity = select_backend(self.config.fuzzy_matching);
        debug!("Using {} similarity backend", similarity.name());

        let mut history = HistoryProvider::new(similarity, clock)
            .with_limits(self.config.min_history_similarity, self.config.history_max_results);
        if let Some(source) = self.history_source {
            history = history.with_history_source(source);
        }

        let catalog = Arc::new(CatalogProvider::new(self.catalog.unwrap_or_else(Catalog::builtin)));
        let history = Arc::new(history);
        let patterns = Arc::new(PatternProvider::new(Arc::new(patterns)));

        let mut providers: Vec<Arc<dyn SuggestionProvider>> = vec![
            catalog.clone() as Arc<dyn SuggestionProvider>,
            history.clone() as Arc<dyn SuggestionProvider>,
            patterns.clone() as Arc<dyn SuggestionProvider>,
        ];
        providers.extend(self.extra_providers);

        let (results, receiver) = mpsc::unbounded_channel();
        let criteria = RankingCriteria::default().with_max_results(self.config.max_results);
        let debouncer = Debouncer::new(scheduler, self.config.debounce_delay());

        let manager = AutocompleteManager {
            config: self.config,
            catalog,
            history,
            patterns,
            providers,
            session: self.session,
            accepted: RwLock::new(FxHashMap::default()),
            criteria,
            state: Mutex::new(InputState::default()),
            debouncer,
            results,
        };

        Ok((Arc::new(manager), receiver))
    }
}

/// Coordinates providers, ranking and debouncing for one input box
pub struct AutocompleteManager {
    config: AutocompleteConfig,
    catalog: Arc<CatalogProvider>,
    history: Arc<HistoryProvider>,
    patterns: Arc<PatternProvider>,
    providers: Vec<Arc<dyn SuggestionProvider>>,
    session: Option<Arc<dyn CalculationSession>>,
    /// Session-local accepted counts by suggestion text
    accepted: RwLock<FxHashMap<String, u32>>,
    criteria: RankingCriteria,
    state: Mutex<InputState>,
    debouncer: Debouncer,
    results: mpsc::UnboundedSender<Vec<Suggestion>>,
}

impl std::fmt::Debug for AutocompleteManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let providers: Vec<&str> = self.providers.iter().map(|p| p.name()).collect();
        f.debug_struct("AutocompleteManager")
            .field("config", &self.config)
            .field("providers", &providers)
            .field("history", &self.history)
            .field("debouncer", &self.debouncer)
            .finish()
    }
}

impl AutocompleteManager {
    pub fn builder(config: AutocompleteConfig) -> AutocompleteBuilder {
        AutocompleteBuilder::new(config)
    }

    pub fn config(&self) -> &AutocompleteConfig {
        &self.config
    }

    pub fn catalog(&self) -> &CatalogProvider {
        &self.catalog
    }

    pub fn history(&self) -> &HistoryProvider {
        &self.history
    }

    pub fn patterns(&self) -> &PatternStore {
        self.patterns.store()
    }

    pub fn current_input(&self) -> String {
        self.state.lock().current_input.clone()
    }

    pub fn is_search_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    fn below_threshold(&self, text: &str) -> bool {
        text.chars().count() < self.config.min_chars_trigger
    }

    /// Handle a change of the input buffer; results arrive on the channel
    pub fn on_text_changed(self: &Arc<Self>, text: &str) {
        let mut state = self.state.lock();
        state.current_input = text.to_string();
        state.generation += 1;

        if self.below_threshold(text) {
            state.pending_text.clear();
            if self.debouncer.cancel() {
                metrics().record_superseded();
            }
            metrics().record_below_threshold();
            self.emit(Vec::new());
            return;
        }

        state.pending_text = text.to_string();
        let generation = state.generation;
        let manager = Arc::downgrade(self);

        let superseded = self.debouncer.submit(move || {
            if let Some(manager) = manager.upgrade() {
                manager.run_pending(generation);
            }
        });
        if superseded {
            trace!("Debounce restarted for {:?}", text);
            metrics().record_superseded();
        }
    }

    fn run_pending(&self, generation: u64) {
        let text = {
            let state = self.state.lock();
            if state.generation != generation {
                trace!("Skipping superseded search (generation {})", generation);
                return;
            }
            state.pending_text.clone()
        };

        let results = self.search(&text, None);

        let state = self.state.lock();
        if state.generation != generation {
            trace!("Discarding results of superseded search for {:?}", text);
            return;
        }
        self.emit(results);
    }

    fn emit(&self, suggestions: Vec<Suggestion>) {
        if self.results.send(suggestions).is_err() {
            debug!("Suggestion receiver dropped; results discarded");
        }
    }

    /// Synchronous search of the whole input, bypassing the debouncer
    pub fn query(&self, text: &str) -> Vec<Suggestion> {
        self.query_at(text, None)
    }

    /// Synchronous search of the token under `cursor` (a char index)
    pub fn query_at(&self, text: &str, cursor: Option<usize>) -> Vec<Suggestion> {
        if self.below_threshold(text) {
            metrics().record_below_threshold();
            return Vec::new();
        }
        self.search(text, cursor)
    }

    fn search(&self, text: &str, cursor: Option<usize>) -> Vec<Suggestion> {
        let _timer = TimingGuard::new("search");
        metrics().record_search();

        let token = current_token(text, cursor);
        if token.is_empty() {
            debug!("No token to complete in {:?}", text);
            return Vec::new();
        }

        let mut batches = self.fan_out(&token);
        self.apply_accepted_counts(&mut batches);

        let variables = self.variables();
        let context = RankingContext { input: text, variables: &variables };
        let ranked = {
            let _timer = TimingGuard::new("merge_rank");
            rank_suggestions(batches, &context, &self.criteria)
        };

        debug!("Search for token {:?} produced {} suggestions", token, ranked.len());
        ranked
    }

    /// Query every provider, containing errors and panics per provider
    fn fan_out(&self, token: &str) -> Vec<Vec<Suggestion>> {
        self.providers
            .iter()
            .map(|provider| {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| provider.suggest(token)))
                    .unwrap_or_else(|payload| {
                        Err(ProviderError::Panicked {
                            provider: provider.name(),
                            message: panic_message(payload.as_ref()),
                        })
                    });

                match outcome {
                    Ok(suggestions) => {
                        trace!("Provider {} returned {} suggestions", provider.name(), suggestions.len());
                        suggestions
                    }
                    Err(e) => {
                        error!("{}", e);
                        metrics().record_provider_failure();
                        Vec::new()
                    }
                }
            })
            .collect()
    }

    fn apply_accepted_counts(&self, batches: &mut [Vec<Suggestion>]) {
        let accepted = self.accepted.read();
        if accepted.is_empty() {
            return;
        }
        for suggestion in batches.iter_mut().flatten() {
            if let Some(&count) = accepted.get(&suggestion.text) {
                suggestion.usage_count = suggestion.usage_count.max(count);
            }
        }
    }

    fn variables(&self) -> BTreeMap<String, String> {
        self.session
            .as_ref()
            .map(|session| session.list_variables())
            .unwrap_or_default()
    }

    /// Feedback hook for a suggestion the user picked
    pub fn on_suggestion_accepted(&self, suggestion: &mut Suggestion) {
        if matches!(suggestion.kind(), SuggestionType::History | SuggestionType::Pattern) {
            self.history.record_usage(&suggestion.text);
        }

        suggestion.usage_count = suggestion.usage_count.saturating_add(1);
        let mut accepted = self.accepted.write();
        let count = accepted.entry(suggestion.text.clone()).or_insert(0);
        *count = (*count).max(suggestion.usage_count);

        metrics().record_accepted();
        debug!("Accepted {}", suggestion);
    }

    /// One Variable suggestion per session variable, for variable chips
    pub fn get_variable_suggestions(&self) -> Vec<Suggestion> {
        self.variables()
            .into_iter()
            .map(|(name, value)| {
                let description = format!("{} = {}", name, value);
                Suggestion::new(name, SuggestionType::Variable, VARIABLE_CHIP_SCORE)
                    .with_description(description)
                    .with_category("variable")
            })
            .collect()
    }

    pub fn record_usage(&self, expression: &str) {
        self.history.record_usage(expression);
    }

    pub fn get_top(&self, n: usize) -> Vec<(String, UsageRecord)> {
        self.history.get_top(n)
    }

    pub fn prune(&self, older_than_days: f64) -> usize {
        self.history.prune(older_than_days)
    }

    /// Prune with the configured retention window
    pub fn prune_expired(&self) -> usize {
        self.prune(f64::from(self.config.retention_days))
    }

    /// Reset the input state and drop any pending search
    pub fn clear_cache(&self) {
        let mut state = self.state.lock();
        state.current_input.clear();
        state.pending_text.clear();
        state.generation += 1;
        self.debouncer.cancel();
    }

    pub fn save_learning_data(&self, path: &Path) -> Result<()> {
        persistence::save_learning_data(path, &self.history.snapshot())
    }

    /// Restore usage data; a missing file leaves the table untouched
    pub fn load_learning_data(&self, path: &Path) -> LearningDataStatus {
        let (table, status) = persistence::load_learning_data(path);
        if let Some(table) = table {
            self.history.restore(table);
        }
        status
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::clock::FixedClock;
    use crate::completion::debounce::ManualScheduler;
    use crate::session::InMemorySession;
    use std::time::Duration;

    fn manager() -> (Arc<AutocompleteManager>, SuggestionReceiver, Arc<ManualScheduler>) {
        manager_with(PatternStore::empty())
    }

    fn manager_with(patterns: PatternStore) -> (Arc<AutocompleteManager>, SuggestionReceiver, Arc<ManualScheduler>) {
        let scheduler = Arc::new(ManualScheduler::new());
        let (manager, rx) = AutocompleteManager::builder(AutocompleteConfig::default())
            .scheduler(scheduler.clone())
            .clock(Arc::new(FixedClock::new(1_700_000_000.0)))
            .session(Arc::new(InMemorySession::with_variables([("rate", "0.05")])))
            .pattern_store(patterns)
            .build()
            .unwrap();
        (manager, rx, scheduler)
    }

    #[test]
    fn test_short_input_emits_empty_immediately() {
        let (manager, mut rx, scheduler) = manager();
        manager.on_text_changed("s");
        assert_eq!(rx.try_recv().unwrap(), Vec::<Suggestion>::new());
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_debounced_search_emits_once() {
        let (manager, mut rx, scheduler) = manager();
        manager.on_text_changed("si");
        manager.on_text_changed("sin");
        assert!(rx.try_recv().is_err());

        scheduler.advance(Duration::from_millis(150));
        let results = rx.try_recv().unwrap();
        // reference 44, prefix boost 20, function bonus 5
        assert_eq!(results[0].text, "sin");
        assert!((results[0].score - 69.0).abs() < 1e-9);
        assert!(results.len() <= 10);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_bundled_patterns_crowd_out_catalog() {
        let (manager, _rx, _) = manager_with(PatternStore::builtin());
        let results = manager.query("sin");

        // every bundled "sin..." template outscores the bare function
        assert_eq!(results.len(), 10);
        assert!(results.iter().all(|s| s.kind() == SuggestionType::Pattern));
        assert!(!results.iter().any(|s| s.text == "sin"));
        assert!(results[9].score > 69.0);
    }

    #[test]
    fn test_clear_cache_drops_pending_search() {
        let (manager, mut rx, scheduler) = manager();
        manager.on_text_changed("cos");
        manager.clear_cache();
        scheduler.advance(Duration::from_secs(1));
        assert!(rx.try_recv().is_err());
        assert_eq!(manager.current_input(), "");
    }

    #[test]
    fn test_variable_chips() {
        let (manager, _rx, _) = manager();
        let chips = manager.get_variable_suggestions();
        assert_eq!(chips.len(), 1);
        assert_eq!(chips[0].text, "rate");
        assert_eq!(chips[0].score, 80.0);
        assert_eq!(chips[0].description.as_deref(), Some("rate = 0.05"));
    }

    #[test]
    fn test_accepting_history_records_usage() {
        let (manager, _rx, _) = manager();
        let mut suggestion = Suggestion::new("x**2 + 1", SuggestionType::Pattern, 50.0);
        manager.on_suggestion_accepted(&mut suggestion);
        assert_eq!(suggestion.usage_count, 1);
        assert_eq!(manager.get_top(1)[0].0, "x**2 + 1");

        let mut function = Suggestion::new("sqrt", SuggestionType::Function, 44.0);
        manager.on_suggestion_accepted(&mut function);
        assert_eq!(manager.get_top(5).len(), 1);

        let sqrt = manager.query("sqr").into_iter().find(|s| s.text == "sqrt").unwrap();
        assert_eq!(sqrt.usage_count, 1);
    }

    #[test]
    fn test_panic_message_payloads() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let owned: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(owned.as_ref()), "bang");
    }
}
