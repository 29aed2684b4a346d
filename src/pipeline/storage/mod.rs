// Graph store boundary and its two backends

pub mod in_memory;
pub mod sqlite;
pub mod traits;

pub use in_memory::InMemoryGraphStore;
pub use sqlite::SqliteGraphStore;
pub use traits::{
    ClaimAttachment, DuplicateEdge, EdgeBatchOutcome, GraphStore, NodeBatchOutcome,
    StoredClaimCost,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unreachable: {0}")]
    Unavailable(String),

    #[error("batch write rejected: {0}")]
    Write(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("property encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store task failed: {0}")]
    Task(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
