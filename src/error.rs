//! Error types for Lead Assist.

/// Top-level error type for the qualification engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Record Store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Transport Gateway errors.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Invalid phone number: {0:?}")]
    InvalidPhone(String),

    #[error("Send to {phone} failed: {reason}")]
    SendFailed { phone: String, reason: String },

    #[error("Transport unavailable: {0}")]
    Unavailable(String),
}

/// Result type alias for the engine.
pub type Result<T> = std::result::Result<T, Error>;
