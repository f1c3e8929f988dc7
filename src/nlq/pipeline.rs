use crate::db::executor::{QueryExecutor, SchemaProvider};
use crate::llm::{CompletionService, LlmError};
use crate::nlq::extract::{contains_select, extract_sql};
use crate::nlq::guard::SqlGuard;
use crate::nlq::interpret::{classify, to_display_form, Classification};
use crate::nlq::outcome::QueryOutcome;
use crate::nlq::prompts::PromptCatalog;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStatus {
    Answered,
    ServiceUnavailable,
    InvalidQuery,
    ExecutionError,
    NoData,
    Unexpected,
}

/// What the caller gets back: the user-facing answer plus diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerPackage {
    pub answer: String,
    pub sql: String,
    pub raw_data: String,
    pub error: Option<String>,
    pub status: AnswerStatus,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("completion service unavailable")]
    ServiceUnavailable,
    #[error("generated text is not a valid query: {0}")]
    InvalidGeneratedQuery(String),
    #[error("query execution failed: {0}")]
    QueryExecution(String),
    #[error("query returned no rows")]
    NoMatchingData,
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl From<LlmError> for PipelineError {
    fn from(e: LlmError) -> Self {
        PipelineError::Unexpected(e.to_string())
    }
}

impl PipelineError {
    fn status(&self) -> AnswerStatus {
        match self {
            PipelineError::ServiceUnavailable => AnswerStatus::ServiceUnavailable,
            PipelineError::InvalidGeneratedQuery(_) => AnswerStatus::InvalidQuery,
            PipelineError::QueryExecution(_) => AnswerStatus::ExecutionError,
            PipelineError::NoMatchingData => AnswerStatus::NoData,
            PipelineError::Unexpected(_) => AnswerStatus::Unexpected,
        }
    }
}

// Diagnostics gathered as the request advances.
#[derive(Default)]
struct Trace {
    sql: String,
    raw_data: String,
}

/// Runs one question through generation, extraction, the guard, execution
/// and answer composition. Failures exit early with a canned message plus
/// diagnostics, so `answer` never returns an error.
pub struct QueryPipeline {
    completion: Arc<dyn CompletionService>,
    executor: Arc<dyn QueryExecutor>,
    schema: Option<Arc<dyn SchemaProvider>>,
    catalog: PromptCatalog,
    guard: Option<SqlGuard>,
    sql_temperature: f32,
    answer_temperature: f32,
}

impl QueryPipeline {
    pub fn new(
        completion: Arc<dyn CompletionService>,
        executor: Arc<dyn QueryExecutor>,
        catalog: PromptCatalog,
    ) -> Self {
        Self {
            completion,
            executor,
            schema: None,
            catalog,
            guard: None,
            sql_temperature: 0.1,
            answer_temperature: 0.5,
        }
    }

    pub fn with_schema(mut self, schema: Arc<dyn SchemaProvider>) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_guard(mut self, guard: SqlGuard) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn with_temperatures(mut self, sql: f32, answer: f32) -> Self {
        self.sql_temperature = sql;
        self.answer_temperature = answer;
        self
    }

    pub async fn answer(&self, question: &str) -> AnswerPackage {
        info!("Answering question: {}", question);
        let mut trace = Trace::default();

        match self.run(question, &mut trace).await {
            Ok(answer) => {
                info!("Answer composed");
                AnswerPackage {
                    answer,
                    sql: trace.sql,
                    raw_data: trace.raw_data,
                    error: None,
                    status: AnswerStatus::Answered,
                }
            }
            Err(err) => {
                let status = err.status();
                match &err {
                    PipelineError::NoMatchingData => info!("No rows for question"),
                    PipelineError::Unexpected(_) => error!("Pipeline failed: {}", err),
                    _ => warn!("Pipeline short-circuited: {}", err),
                }
                AnswerPackage {
                    answer: self.canned_message(&err, question),
                    sql: trace.sql,
                    raw_data: trace.raw_data,
                    error: match err {
                        PipelineError::NoMatchingData => None,
                        other => Some(other.to_string()),
                    },
                    status,
                }
            }
        }
    }

    async fn run(&self, question: &str, trace: &mut Trace) -> Result<String, PipelineError> {
        if !self.completion.is_available().await {
            return Err(PipelineError::ServiceUnavailable);
        }

        let schema = self.schema_context().await?;
        let prompt = self.catalog.sql_prompt(question, &schema);
        debug!("SQL prompt: {}", prompt);

        let raw = self.completion.complete(&prompt, self.sql_temperature).await?;
        let sql = extract_sql(&raw);
        trace.sql = sql.clone();

        if sql.is_empty() || !contains_select(&sql) {
            trace.raw_data = "[]".to_string();
            return Err(PipelineError::InvalidGeneratedQuery(
                "no SELECT statement found".to_string(),
            ));
        }
        if let Some(guard) = &self.guard {
            guard.check(&sql).map_err(|violation| {
                trace.raw_data = "[]".to_string();
                PipelineError::InvalidGeneratedQuery(violation.to_string())
            })?;
        }

        info!("Executing SQL: {}", sql);
        let outcome = self.executor.run(&sql).await;
        trace.raw_data = outcome.to_literal();

        let rows = match (classify(&outcome), outcome) {
            (_, QueryOutcome::ExecutionError(message)) => {
                return Err(PipelineError::QueryExecution(message));
            }
            (Classification::Empty, _) => return Err(PipelineError::NoMatchingData),
            (Classification::NonEmpty, QueryOutcome::Rows(rows)) => rows,
        };

        let display = to_display_form(&rows);
        let prompt = self.catalog.answer_prompt(question, &display);
        debug!("Answer prompt: {}", prompt);

        let answer = self
            .completion
            .complete(&prompt, self.answer_temperature)
            .await?;
        Ok(answer)
    }

    async fn schema_context(&self) -> Result<String, PipelineError> {
        if !self.catalog.wants_schema() {
            return Ok(String::new());
        }
        match &self.schema {
            Some(provider) => provider
                .describe()
                .await
                .map_err(|e| PipelineError::Unexpected(format!("schema introspection failed: {}", e))),
            None => {
                warn!("SQL template asks for {{schema}} but no schema source is configured");
                Ok(String::new())
            }
        }
    }

    fn canned_message(&self, err: &PipelineError, question: &str) -> String {
        let messages = &self.catalog.messages;
        match err {
            PipelineError::ServiceUnavailable => messages.service_unavailable.clone(),
            PipelineError::InvalidGeneratedQuery(_) => messages.invalid_query.clone(),
            PipelineError::QueryExecution(_) => messages.execution_error.clone(),
            PipelineError::NoMatchingData => self.catalog.no_data_message(question),
            PipelineError::Unexpected(_) => messages.unexpected.clone(),
        }
    }
}
