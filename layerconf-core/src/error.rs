use serde_json::Value;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("config key '{key}' must be set in the global tree or given a default")]
    MissingRequired { key: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("global value for config key '{key}' not valid: {source}")]
    MalformedGlobalValue { key: String, source: Box<Error> },

    /// Failure raised by a custom entry's parser, passed through verbatim.
    #[error(transparent)]
    Custom(#[from] anyhow::Error),

    #[error("unknown config key '{key}'")]
    UnknownKey { key: String },

    #[error("storage error: {0}")]
    Storage(String),
}

/// Built-in constraint failures. Custom-entry failures never take this
/// shape; they surface as [`Error::Custom`] instead.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("expected \"{key}={value}\" to be a \"{expected}\"")]
    TypeMismatch {
        key: String,
        value: Value,
        expected: &'static str,
    },

    #[error("expected \"{key}={value}\" to be one of: {}", .members.join(", "))]
    EnumMismatch {
        key: String,
        value: Value,
        members: Vec<String>,
    },

    #[error("expected \"{key}={value}\" to be greater than {min}")]
    BelowMinimum { key: String, value: f64, min: f64 },

    #[error("expected \"{key}={value}\" to be lower than {max}")]
    AboveMaximum { key: String, value: f64, max: f64 },
}
