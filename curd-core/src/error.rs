//! Error types for curd-core

use thiserror::Error;

/// The main error type for statement building and execution
#[derive(Error, Debug)]
pub enum Error {
    /// Database connection or execution error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Row binding / serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid builder configuration, surfaced before any I/O
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// A result column has no matching settable field on the destination
    #[error("structure is missing field '{field}'")]
    MissingField { field: String },

    /// A driver column could not be converted into a parameter value
    #[error("Decode error for column '{column}': {message}")]
    Decode { column: String, message: String },
}

/// Convenience Result type for curd-core operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a new configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a new missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Create a new decode error
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }
}
