//! Error types for the Heimdall domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; the orchestration loop only
//! surfaces the top-level [`Error`] when a session cannot continue.

use thiserror::Error;

/// The top-level error type for all Heimdall operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Memory errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Decision errors ---
    #[error("Decision error: {0}")]
    Decision(#[from] DecisionError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Violations of the session log's ordering rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("tool outcome for '{tool_name}' has no pending call")]
    OrphanOutcome { tool_name: String },

    #[error("tool outcome for '{got}' does not match pending call to '{expected}'")]
    OutcomeMismatch { expected: String, got: String },

    #[error("call to '{pending}' is still awaiting its outcome")]
    CallPending { pending: String },
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool already registered: {0}")]
    Duplicate(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

/// Why the decision step could not produce a usable [`crate::Decision`].
#[derive(Debug, Clone, Error)]
pub enum DecisionError {
    #[error("malformed decision: {0}")]
    Malformed(String),

    #[error("reasoning backend failed: {0}")]
    Backend(#[from] ProviderError),
}

/// Failures of the search and page-fetch capabilities.
#[derive(Debug, Clone, Error)]
pub enum SearchError {
    #[error("request failed: {0}")]
    Network(String),

    #[error("unexpected status {status}")]
    Status { status: u16 },

    #[error("could not parse response: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn malformed_decision_keeps_prefix() {
        let err = DecisionError::Malformed("unknown tool 'nmap'".into());
        assert_eq!(err.to_string(), "malformed decision: unknown tool 'nmap'");
    }

    #[test]
    fn memory_error_names_both_tools() {
        let err = MemoryError::OutcomeMismatch {
            expected: "console".into(),
            got: "web_search".into(),
        };
        let text = err.to_string();
        assert!(text.contains("console"));
        assert!(text.contains("web_search"));
    }

    #[test]
    fn provider_failure_converts_into_decision_error() {
        let err: DecisionError = ProviderError::Timeout("30s".into()).into();
        assert!(matches!(err, DecisionError::Backend(_)));
    }
}
