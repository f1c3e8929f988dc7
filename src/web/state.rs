use crate::config::AppConfig;
use crate::db::db_pool::DbPool;
use crate::db::executor::{DuckDbExecutor, SchemaProvider, StaticSchema};
use crate::db::interaction_log::{DuckDbInteractionLog, HistoryError, InteractionLog};
use crate::llm::CompletionService;
use crate::nlq::guard::SqlGuard;
use crate::nlq::QueryPipeline;
use std::sync::Arc;
use tracing::info;

/// Shared application state for the web server
pub struct AppState {
    pub config: AppConfig,
    pub pipeline: QueryPipeline,
    pub completion: Arc<dyn CompletionService>,
    pub database: DuckDbExecutor,
    pub history: Option<Arc<dyn InteractionLog>>,
    pub startup_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        db_pool: DbPool,
        completion: Arc<dyn CompletionService>,
    ) -> Result<Self, HistoryError> {
        let database =
            DuckDbExecutor::new(db_pool.clone()).with_max_rows(config.database.max_rows);

        let schema: Arc<dyn SchemaProvider> = match &config.prompts.schema_context {
            Some(context) => Arc::new(StaticSchema(context.clone())),
            None => Arc::new(database.clone()),
        };

        let pipeline = QueryPipeline::new(
            completion.clone(),
            Arc::new(database.clone()),
            config.prompts.clone(),
        )
        .with_schema(schema)
        .with_guard(SqlGuard::new(&config.guard))
        .with_temperatures(config.llm.sql_temperature, config.llm.answer_temperature);

        let history: Option<Arc<dyn InteractionLog>> = if config.history.enabled {
            Some(Arc::new(DuckDbInteractionLog::new(db_pool)?))
        } else {
            info!("Interaction history is disabled");
            None
        };

        Ok(Self {
            config,
            pipeline,
            completion,
            database,
            history,
            startup_time: chrono::Utc::now(),
        })
    }
}
