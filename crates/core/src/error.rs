//! Error types shared by every CineRec crate
//!
//! Only conditions that abort a request or a run are errors. Insufficient
//! overlap between two users and cold-start users are regular outcomes and
//! are modelled as `Option` / flags by the engine.

use thiserror::Error;

/// Result type alias for CineRec operations
pub type Result<T> = std::result::Result<T, RecommenderError>;

#[derive(Debug, Error)]
pub enum RecommenderError {
    /// Unknown user or item id
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u32 },

    /// A setting is outside its accepted range
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
        key: Option<String>,
    },

    /// Input table violates its schema
    #[error("Invalid data in {source_name} at line {line}: {message}")]
    DataValidation {
        source_name: String,
        line: u64,
        message: String,
    },

    #[error("Failed to read {path}: {message}")]
    Io { path: String, message: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

impl RecommenderError {
    pub fn not_found_user(id: u32) -> Self {
        Self::NotFound { entity: "user", id }
    }

    pub fn not_found_item(id: u32) -> Self {
        Self::NotFound { entity: "item", id }
    }

    /// Build an `InvalidConfiguration` error tagged with the offending setting
    pub fn invalid_config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_invalid_configuration(&self) -> bool {
        matches!(self, Self::InvalidConfiguration { .. })
    }
}
