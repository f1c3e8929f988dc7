// Loading reference data from files into the hospital database.
pub mod csv;

use crate::db::ExecutorError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] ::csv::Error),
    #[error("missing column '{0}' in CSV header")]
    MissingColumn(String),
    #[error("database pool error: {0}")]
    PoolError(#[from] r2d2::Error),
    #[error("database error: {0}")]
    DatabaseError(#[from] duckdb::Error),
    #[error("schema error: {0}")]
    SchemaError(#[from] ExecutorError),
}
