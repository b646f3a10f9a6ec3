//! Provider seam between the manager and its suggestion sources

use super::suggestion::Suggestion;
use thiserror::Error;

/// Failure raised by a provider during a query
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider '{provider}' failed: {message}")]
    Failed { provider: &'static str, message: String },

    #[error("provider '{provider}' panicked: {message}")]
    Panicked { provider: &'static str, message: String },
}

/// A source of suggestions for a token
///
/// Implementations must stay synchronous and in-memory: they are invoked on
/// every debounced keystroke.
pub trait SuggestionProvider: Send + Sync {
    /// Short stable name used in logs and metrics
    fn name(&self) -> &'static str;

    /// Ordered suggestions for `fragment`, best first
    fn suggest(&self, fragment: &str) -> Result<Vec<Suggestion>, ProviderError>;
}
