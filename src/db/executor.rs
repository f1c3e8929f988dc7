use crate::db::db_pool::DbPool;
use crate::db::ExecutorError;
use crate::nlq::outcome::{CellValue, QueryOutcome, RowSet};
use async_trait::async_trait;
use duckdb::arrow::array::Array;
use duckdb::arrow::datatypes::DataType;
use duckdb::arrow::error::ArrowError;
use duckdb::arrow::util::display::array_value_to_string;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Runs one statement and reports rows or the database's error text.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn run(&self, sql: &str) -> QueryOutcome;
}

/// Describes the tables the model may query, for templates using `{schema}`.
#[async_trait]
pub trait SchemaProvider: Send + Sync {
    async fn describe(&self) -> Result<String, ExecutorError>;
}

pub struct StaticSchema(pub String);

#[async_trait]
impl SchemaProvider for StaticSchema {
    async fn describe(&self) -> Result<String, ExecutorError> {
        Ok(self.0.clone())
    }
}

const SCHEMA_QUERY: &str = "
    SELECT c.table_name, t.table_type, c.column_name, c.data_type
    FROM information_schema.columns c
    JOIN information_schema.tables t
      ON t.table_schema = c.table_schema AND t.table_name = c.table_name
    WHERE c.table_schema = 'main' AND c.table_name <> 'historial_consultas'
    ORDER BY c.table_name, c.ordinal_position
";

pub const DEFAULT_MAX_ROWS: usize = 200;

#[derive(Clone)]
pub struct DuckDbExecutor {
    pool: DbPool,
    max_rows: usize,
}

impl DuckDbExecutor {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            max_rows: DEFAULT_MAX_ROWS,
        }
    }

    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// True when a pooled connection can run a trivial query.
    pub async fn ping(&self) -> bool {
        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || -> Result<(), ExecutorError> {
            let conn = pool.get()?;
            conn.execute("SELECT 1", [])?;
            Ok(())
        })
        .await;

        match result {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!("Database ping failed: {}", e);
                false
            }
            Err(e) => {
                error!("Database ping task failed: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl QueryExecutor for DuckDbExecutor {
    async fn run(&self, sql: &str) -> QueryOutcome {
        let pool = self.pool.clone();
        let sql = sql.to_string();
        let max_rows = self.max_rows;
        let start = Instant::now();

        let result = tokio::task::spawn_blocking(move || fetch_rows(&pool, &sql, max_rows))
            .await
            .map_err(ExecutorError::from)
            .and_then(|rows| rows);

        match result {
            Ok(rows) => {
                info!(
                    "Query executed successfully. Row count: {}, Execution time: {}ms",
                    rows.len(),
                    start.elapsed().as_millis()
                );
                QueryOutcome::Rows(rows)
            }
            Err(e) => {
                warn!("Query execution failed: {}", e);
                QueryOutcome::ExecutionError(e.to_string())
            }
        }
    }
}

#[async_trait]
impl SchemaProvider for DuckDbExecutor {
    async fn describe(&self) -> Result<String, ExecutorError> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<String, ExecutorError> {
            let conn = pool.get()?;
            let mut stmt = conn.prepare(SCHEMA_QUERY)?;
            let columns = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?;

            let mut relations: BTreeMap<String, (bool, Vec<String>)> = BTreeMap::new();
            for column in columns {
                let (table, table_type, name, data_type) = column?;
                let entry = relations
                    .entry(table)
                    .or_insert_with(|| (table_type == "VIEW", Vec::new()));
                entry.1.push(format!("{} {}", name, data_type));
            }

            let lines: Vec<String> = relations
                .into_iter()
                .map(|(table, (is_view, columns))| {
                    let kind = if is_view { "view" } else { "table" };
                    format!("- {} {} ({})", kind, table, columns.join(", "))
                })
                .collect();
            debug!("Described {} relations", lines.len());
            Ok(lines.join("\n"))
        })
        .await?
    }
}

fn fetch_rows(pool: &DbPool, sql: &str, max_rows: usize) -> Result<RowSet, ExecutorError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(sql)?;
    let arrow = stmt.query_arrow([])?;

    let columns: Vec<String> = arrow
        .get_schema()
        .fields()
        .iter()
        .map(|field| field.name().clone())
        .collect();

    let mut rows = Vec::new();
    'batches: for batch in arrow {
        for row_idx in 0..batch.num_rows() {
            if rows.len() == max_rows {
                warn!("Result truncated to {} rows", max_rows);
                break 'batches;
            }
            let row = batch
                .columns()
                .iter()
                .map(|array| cell_value(array.as_ref(), row_idx))
                .collect::<Result<Vec<_>, _>>()?;
            rows.push(row);
        }
    }

    Ok(RowSet::new(columns, rows))
}

fn cell_value(array: &dyn Array, row: usize) -> Result<CellValue, ArrowError> {
    if array.is_null(row) {
        return Ok(CellValue::Null);
    }

    let text = array_value_to_string(array, row)?;
    let value = match array.data_type() {
        DataType::Boolean => CellValue::Bool(text == "true"),
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => match text.parse::<i64>() {
            Ok(i) => CellValue::Integer(i),
            Err(_) => CellValue::Text(text),
        },
        DataType::Float16
        | DataType::Float32
        | DataType::Float64
        | DataType::Decimal128(_, _)
        | DataType::Decimal256(_, _) => match text.parse::<f64>() {
            Ok(f) => CellValue::Float(f),
            Err(_) => CellValue::Text(text),
        },
        _ => CellValue::Text(text),
    };
    Ok(value)
}
