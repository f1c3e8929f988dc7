use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

use crate::db::interaction_log::{log_interaction, InteractionRecord};
use crate::nlq::AnswerPackage;
use crate::web::state::AppState;

const DEFAULT_HISTORY_LIMIT: usize = 100;
const MAX_HISTORY_LIMIT: usize = 1000;

#[derive(Debug, Deserialize, Clone)]
pub struct AskRequest {
    pub question: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: String,
    pub uptime_seconds: i64,
    pub llm_backend: String,
    pub llm_available: bool,
    pub database_reachable: bool,
    pub history_enabled: bool,
}

// Question answering
pub async fn ask(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AskRequest>,
) -> Result<Json<AnswerPackage>, (StatusCode, String)> {
    let question = payload.question.trim();
    if question.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Question must not be empty".to_string()));
    }

    let start_time = Instant::now();
    let package = state.pipeline.answer(question).await;
    info!(
        status = ?package.status,
        "Question answered in {}ms",
        start_time.elapsed().as_millis()
    );

    if let Some(history) = &state.history {
        log_interaction(
            history.as_ref(),
            payload.user_id.as_deref(),
            question,
            &package.answer,
        )
        .await;
    }

    Ok(Json(package))
}

// Interaction history, newest first
pub async fn history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<InteractionRecord>>, (StatusCode, String)> {
    let Some(history) = &state.history else {
        return Err((StatusCode::NOT_FOUND, "History is disabled".to_string()));
    };

    let limit = params
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT);
    debug!("Fetching {} history entries", limit);

    let records = history.recent(limit).await.map_err(|e| {
        error!("Failed to read history: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to read history".to_string(),
        )
    })?;
    Ok(Json(records))
}

// System status
pub async fn system_status(State(state): State<Arc<AppState>>) -> Json<SystemStatus> {
    let now = chrono::Utc::now();
    let uptime = now.signed_duration_since(state.startup_time).num_seconds();

    let (llm_available, database_reachable) =
        tokio::join!(state.completion.is_available(), state.database.ping());

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
        llm_backend: state.config.llm.backend.clone(),
        llm_available,
        database_reachable,
        history_enabled: state.history.is_some(),
    })
}

#[cfg(test)]
mod tests {
    use crate::config::AppConfig;
    use crate::db::db_pool::in_memory_pool;
    use crate::db::executor::DuckDbExecutor;
    use crate::db::interaction_log::{DuckDbInteractionLog, InteractionLog};
    use crate::nlq::outcome::{CellValue, QueryOutcome, RowSet};
    use crate::nlq::pipeline::testing::{ScriptedCompletion, ScriptedExecutor};
    use crate::nlq::prompts::PromptCatalog;
    use crate::nlq::QueryPipeline;
    use crate::web::app;
    use crate::web::state::AppState;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    struct Harness {
        router: Router,
        completion: Arc<ScriptedCompletion>,
        history: Option<Arc<DuckDbInteractionLog>>,
    }

    fn harness(replies: &[&str], with_history: bool) -> Harness {
        let pool = in_memory_pool().unwrap();
        let completion = ScriptedCompletion::replying(replies);
        let executor = ScriptedExecutor::new(QueryOutcome::Rows(RowSet::new(
            vec!["nombre_referencia".into(), "numero_anexo".into()],
            vec![vec![CellValue::Text("Farmacia Central".into()), CellValue::Integer(4410)]],
        )));
        let history = with_history.then(|| Arc::new(DuckDbInteractionLog::new(pool.clone()).unwrap()));

        let state = AppState {
            config: AppConfig::default(),
            pipeline: QueryPipeline::new(completion.clone(), executor, PromptCatalog::default()),
            completion: completion.clone(),
            database: DuckDbExecutor::new(pool),
            history: history.clone().map(|h| h as Arc<dyn InteractionLog>),
            startup_time: chrono::Utc::now(),
        };

        Harness {
            router: app(Arc::new(state)),
            completion,
            history,
        }
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn ask(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/ask")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_ask_returns_answer_package_and_logs() {
        let h = harness(
            &[
                "SELECT nombre_referencia, numero_anexo FROM directorio_telefonico",
                "El anexo de Farmacia Central es 4410.",
            ],
            true,
        );
        let (status, body) = send(
            h.router.clone(),
            ask(json!({"question": "  ¿Anexo de farmacia?  ", "user_id": "u-7"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], "El anexo de Farmacia Central es 4410.");
        assert_eq!(body["status"], "answered");
        assert_eq!(body["raw_data"], "[('Farmacia Central', 4410)]");
        assert!(body["error"].is_null());

        let records = h.history.unwrap().recent(10).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].pregunta, "¿Anexo de farmacia?");
        assert_eq!(records[0].usuario_id.as_deref(), Some("u-7"));
    }

    #[tokio::test]
    async fn test_failed_answers_are_still_200() {
        let h = harness(&["no sé"], true);
        let (status, body) = send(h.router, ask(json!({"question": "hola"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "invalid_query");
        assert_eq!(body["answer"], "No pude generar una consulta válida para tu pregunta.");
    }

    #[tokio::test]
    async fn test_blank_question_is_rejected() {
        let h = harness(&[], true);
        let (status, _) = send(h.router, ask(json!({"question": "   "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(h.completion.availability_checks(), 0);
    }

    #[tokio::test]
    async fn test_missing_question_field() {
        let h = harness(&[], false);
        let (status, _) = send(h.router, ask(json!({"pregunta": "x"}))).await;
        assert!(status.is_client_error());
    }

    #[tokio::test]
    async fn test_history_endpoint() {
        let h = harness(&[], true);
        let log = h.history.clone().unwrap();
        log.record(None, "uno", "a").await.unwrap();
        log.record(None, "dos", "b").await.unwrap();

        let (status, body) = send(h.router, get("/api/history?limit=1")).await;
        assert_eq!(status, StatusCode::OK);
        let entries = body.as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["pregunta"], "dos");
    }

    #[tokio::test]
    async fn test_history_disabled() {
        let h = harness(&[], false);
        let (status, _) = send(h.router, get("/api/history")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_status_reports_dependencies() {
        let h = harness(&[], true);
        let (status, body) = send(h.router, get("/api/status")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["llm_backend"], "ollama");
        assert_eq!(body["llm_available"], true);
        assert_eq!(body["database_reachable"], true);
        assert_eq!(body["history_enabled"], true);
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }
}
