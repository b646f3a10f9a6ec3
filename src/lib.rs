pub mod completion;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod session;

pub use completion::{AutocompleteManager, Suggestion, SuggestionType};
pub use config::AutocompleteConfig;
