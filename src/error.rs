use thiserror::Error;

use crate::pipeline::storage::StoreError;

/// Fatal pipeline errors. Row- and edge-level problems are never raised
/// through this type; they are collected into the run reports instead.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Graph store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Graph store error: {0}")]
    Store(#[from] StoreError),

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required column '{column}' in {table} extract")]
    MissingColumn { table: String, column: String },
}

pub type Result<T> = std::result::Result<T, PipelineError>;
