pub mod config;
pub mod record;
pub use config::{AugmentConfig, Config, FieldSchema, LoggingConfig, StreamConfig};
pub use record::Record;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StreamHubError {
    /// the filter text (or one of its sub-expressions) cannot be parsed
    #[error("{reason}: '{expr}'")]
    Syntax { reason: String, expr: String },
    /// a referenced field is missing from the record or has the wrong type
    #[error("field '{field}': {reason}")]
    FieldType { field: String, reason: String },
    #[error("invalid record: {0}")]
    InvalidRecord(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Other(String),
}

impl StreamHubError {
    pub fn syntax(reason: impl Into<String>, expr: impl Into<String>) -> Self {
        Self::Syntax { reason: reason.into(), expr: expr.into() }
    }

    pub fn field_type(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::FieldType { field: field.into(), reason: reason.into() }
    }

    pub fn is_syntax(&self) -> bool {
        matches!(self, Self::Syntax { .. })
    }

    pub fn is_field_type(&self) -> bool {
        matches!(self, Self::FieldType { .. })
    }
}

pub type Result<T> = std::result::Result<T, StreamHubError>;
