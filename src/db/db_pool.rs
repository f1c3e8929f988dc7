use crate::config::DatabaseConfig;
use crate::db::executor::DEFAULT_MAX_ROWS;
use crate::db::ExecutorError;
use duckdb::Connection;
use r2d2::ManageConnection;
use std::sync::Mutex;
use tracing::info;

pub type DbPool = r2d2::Pool<DuckDBConnectionManager>;

/// Hands out clones of one root connection, so every pooled connection sees
/// the same database. This matters for `:memory:`, where opening a fresh
/// connection would create a fresh, empty database.
pub struct DuckDBConnectionManager {
    connection_string: String,
    root: Mutex<Connection>,
}

impl DuckDBConnectionManager {
    pub fn new(connection_string: &str) -> Result<Self, duckdb::Error> {
        let root = if connection_string.is_empty() || connection_string == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(connection_string)?
        };

        Ok(Self {
            connection_string: connection_string.to_string(),
            root: Mutex::new(root),
        })
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }
}

impl ManageConnection for DuckDBConnectionManager {
    type Connection = Connection;
    type Error = duckdb::Error;

    fn connect(&self) -> Result<Self::Connection, Self::Error> {
        let root = self.root.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        root.try_clone()
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.execute("SELECT 1", [])?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

pub fn build_pool(config: &DatabaseConfig) -> Result<DbPool, ExecutorError> {
    let manager = DuckDBConnectionManager::new(&config.connection_string)?;
    info!(
        "Opening DuckDB at '{}' with pool size {}",
        manager.connection_string(),
        config.pool_size
    );

    let pool = r2d2::Pool::builder()
        .max_size(config.pool_size.max(1) as u32)
        .build(manager)?;
    Ok(pool)
}

/// Small pool over a private in-memory database.
pub fn in_memory_pool() -> Result<DbPool, ExecutorError> {
    build_pool(&DatabaseConfig {
        connection_string: ":memory:".to_string(),
        pool_size: 2,
        max_rows: DEFAULT_MAX_ROWS,
    })
}
