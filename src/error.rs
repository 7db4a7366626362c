//! Typed error channel for the store.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown table `{0}`")]
    UnknownTable(String),

    #[error("unknown column `{column}` in table `{table}`")]
    UnknownColumn { table: String, column: String },

    #[error("invalid identifier `{0}`")]
    InvalidIdentifier(String),

    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("table `{table}`: candidate has no usable key in column `{column}`")]
    MissingKey { table: String, column: String },

    #[error("table `{table}` expects a {expected} candidate")]
    KindMismatch {
        table: String,
        expected: &'static str,
    },

    #[error(transparent)]
    Sql(#[from] rusqlite::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result alias used by the public sqlmirror API.
pub type Result<T> = std::result::Result<T, StoreError>;
