//! Error types for the Sleuth domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.
//!
//! Fetch failures are deliberately absent: the content fetcher reports them
//! as data (`FetchOutcome::Failed`) so they can be filtered, never raised.

use thiserror::Error;

/// The top-level error type for all Sleuth operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Reasoning engine errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Action dispatch errors ---
    #[error("Action error: {0}")]
    Action(#[from] ActionError),

    // --- Persistence errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Search provider errors ---
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    // --- Social platform errors ---
    #[error("Social platform error: {0}")]
    Social(#[from] SocialError),

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
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Errors raised while turning an engine invocation into an executed action.
///
/// None of these are fatal to the tool-call loop: each is rendered into an
/// action-result message so the engine can correct itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Malformed invocation of {action}: {reason}")]
    MalformedInvocation { action: String, reason: String },

    #[error("Action {action} failed: {reason}")]
    ExecutionFailed { action: String, reason: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

#[derive(Debug, Clone, Error)]
pub enum SearchError {
    #[error("Search provider not configured: {0}")]
    NotConfigured(String),

    #[error("Search request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SocialError {
    #[error("Social client not configured: {0}")]
    NotConfigured(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limited, window resets in {reset_after_secs}s")]
    RateLimited { reset_after_secs: u64 },

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Invalid handle: {0:?}")]
    InvalidHandle(String),

    #[error("API request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),
}
