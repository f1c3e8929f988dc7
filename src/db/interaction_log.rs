use crate::db::db_pool::DbPool;
use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use duckdb::params;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

pub const HISTORY_DDL: &str = "
CREATE TABLE IF NOT EXISTS historial_consultas (
    pregunta VARCHAR,
    respuesta VARCHAR,
    fecha TIMESTAMP,
    usuario_id VARCHAR
);
";

const MAX_QUESTION_CHARS: usize = 2000;
const MAX_ANSWER_CHARS: usize = 10000;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("history database error: {0}")]
    Database(#[from] duckdb::Error),
    #[error("invalid timestamp in history: {0}")]
    Timestamp(#[from] chrono::ParseError),
    #[error("history task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InteractionRecord {
    pub pregunta: String,
    pub respuesta: String,
    pub fecha: NaiveDateTime,
    pub usuario_id: Option<String>,
}

/// Append-only record of questions and the answers given.
#[async_trait]
pub trait InteractionLog: Send + Sync {
    async fn record(
        &self,
        user_id: Option<&str>,
        question: &str,
        answer: &str,
    ) -> Result<(), HistoryError>;

    /// Newest first.
    async fn recent(&self, limit: usize) -> Result<Vec<InteractionRecord>, HistoryError>;
}

/// Writes a record and swallows any failure; history never fails a request.
pub async fn log_interaction(
    log: &dyn InteractionLog,
    user_id: Option<&str>,
    question: &str,
    answer: &str,
) {
    if let Err(e) = log.record(user_id, question, answer).await {
        warn!("Could not save interaction history: {}", e);
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[derive(Clone)]
pub struct DuckDbInteractionLog {
    pool: DbPool,
}

impl DuckDbInteractionLog {
    pub fn new(pool: DbPool) -> Result<Self, HistoryError> {
        pool.get()?.execute_batch(HISTORY_DDL)?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl InteractionLog for DuckDbInteractionLog {
    async fn record(
        &self,
        user_id: Option<&str>,
        question: &str,
        answer: &str,
    ) -> Result<(), HistoryError> {
        let pool = self.pool.clone();
        let pregunta = truncate_chars(question, MAX_QUESTION_CHARS);
        let respuesta = truncate_chars(answer, MAX_ANSWER_CHARS);
        let usuario_id = user_id.filter(|id| !id.trim().is_empty()).map(str::to_string);
        let fecha = Local::now().naive_local().format(TIMESTAMP_FORMAT).to_string();

        tokio::task::spawn_blocking(move || -> Result<(), HistoryError> {
            let conn = pool.get()?;
            conn.execute(
                "INSERT INTO historial_consultas (pregunta, respuesta, fecha, usuario_id)
                 VALUES (?, ?, CAST(? AS TIMESTAMP), ?)",
                params![pregunta, respuesta, fecha, usuario_id],
            )?;
            Ok(())
        })
        .await??;

        debug!("Interaction saved to history");
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<InteractionRecord>, HistoryError> {
        let pool = self.pool.clone();
        let limit = limit as i64;

        tokio::task::spawn_blocking(move || -> Result<Vec<InteractionRecord>, HistoryError> {
            let conn = pool.get()?;
            let mut stmt = conn.prepare(
                "SELECT pregunta, respuesta, strftime(fecha, '%Y-%m-%d %H:%M:%S.%f'), usuario_id
                 FROM historial_consultas
                 ORDER BY fecha DESC, rowid DESC
                 LIMIT ?",
            )?;
            let rows = stmt.query_map(params![limit], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })?;

            let mut records = Vec::new();
            for row in rows {
                let (pregunta, respuesta, fecha, usuario_id) = row?;
                records.push(InteractionRecord {
                    pregunta,
                    respuesta,
                    fecha: NaiveDateTime::parse_from_str(&fecha, TIMESTAMP_FORMAT)?,
                    usuario_id,
                });
            }
            Ok(records)
        })
        .await?
    }
}
