//! Autocomplete suggestions for calculator expressions
//!
//! This module provides:
//! - Current-token extraction from the input buffer
//! - Catalog suggestions for built-in functions and constants
//! - Template suggestions from a pattern catalog grouped by category
//! - History suggestions scored by similarity, frequency and recency
//! - Merge, dedup and ranking of provider outputs
//! - Keystroke debouncing with cancellable scheduled tasks
//! - Learning-data persistence for usage statistics

pub mod suggestion;
pub mod tokenizer;
pub mod similarity;
pub mod clock;
pub mod provider;
pub mod catalog;
pub mod patterns;
pub mod history;
pub mod ranking;
pub mod debounce;
pub mod persistence;
pub mod manager;

pub use suggestion::{Suggestion, SuggestionType};
pub use tokenizer::{Token, current_token, tokenize};
pub use similarity::{FuzzySimilarity, OverlapSimilarity, TextSimilarity, select_backend};
pub use clock::{Clock, FixedClock, SharedClock, SystemClock};
pub use provider::{ProviderError, SuggestionProvider};
pub use catalog::{Catalog, CatalogEntry, CatalogProvider};
pub use patterns::{CatalogError, Pattern, PatternMatch, PatternProvider, PatternStore};
pub use history::{HistoryProvider, SharedUsageTable, UsageRecord, UsageTable};
pub use ranking::{RankingContext, RankingCriteria, rank_suggestions};
pub use debounce::{Debouncer, ManualScheduler, Scheduler, TaskHandle, TokioScheduler};
pub use persistence::{LearningData, LearningDataStatus, load_learning_data, save_learning_data};
pub use manager::{AutocompleteBuilder, AutocompleteManager, SuggestionReceiver};
