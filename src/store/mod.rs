pub mod backend;
pub mod filter;
pub mod memory;
pub mod models;
pub mod rest;
pub mod schema;
pub mod sqlite;

pub use backend::{insert_as, insert_one, select_as, RowStore};
pub use filter::{Filter, Query};

/// Errors surfaced by any row-store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to decode {table} row: {source}")]
    Decode {
        table: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("{table} write rejected: {reason}")]
    Rejected { table: String, reason: String },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
