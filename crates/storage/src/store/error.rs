#![forbid(unsafe_code)]

use ol_core::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("config: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("table {table} has no column {column}")]
    MissingColumn { table: String, column: String },
    #[error("unknown id {0}")]
    UnknownId(i64),
    #[error("records {left} and {right} are not in the same list")]
    ScopeMismatch { left: i64, right: i64 },
}
