use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Failures reaching a post source. Only ever skip the source for the current cycle.
#[derive(Error, Debug, Clone)]
pub enum SourceError {
    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("Rate limit exceeded. Retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    #[error("Forbidden access to resource: {resource}")]
    Forbidden { resource: String },

    #[error("Subreddit not found: {subreddit}")]
    SubredditNotFound { subreddit: String },

    #[error("Invalid OAuth token")]
    InvalidToken,

    #[error("Request timeout")]
    RequestTimeout,

    #[error("Invalid API response: {details}")]
    InvalidResponse { details: String },

    #[error("Server error: {status_code}")]
    ServerError { status_code: u16 },
}

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Delivery failed via {channel}: {reason}")]
    DeliveryFailed { channel: String, reason: String },

    #[error("Notification channel rejected message with status {status_code}")]
    Rejected { status_code: u16 },

    #[error("Digest unavailable: {reason}")]
    DigestUnavailable { reason: String },
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Failed to load seen ids from {path}: {source}")]
    SeenIdsLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to save seen ids to {path}: {source}")]
    SeenIdsSave {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to append to ledger {path}: {source}")]
    LedgerAppend {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read ledger {path}: {source}")]
    LedgerRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Configuration validation failed: {reason}")]
    ValidationFailed { reason: String },

    #[error("Configuration parsing error: {0}")]
    Parse(#[from] toml::de::Error),
}
