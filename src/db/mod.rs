pub mod bootstrap;
pub mod db_pool;
pub mod executor;
pub mod interaction_log;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("database pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error(transparent)]
    Query(#[from] duckdb::Error),
    #[error("could not read result column: {0}")]
    Arrow(#[from] duckdb::arrow::error::ArrowError),
    #[error("database task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
