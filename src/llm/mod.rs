pub mod providers;

use crate::config::LlmConfig;
use async_trait::async_trait;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM connection error: {0}")]
    ConnectionError(String),
    #[error("LLM response error: {0}")]
    ResponseError(String),
    #[error("LLM configuration error: {0}")]
    ConfigError(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() || e.is_request() {
            LlmError::ConnectionError(e.to_string())
        } else {
            LlmError::ResponseError(e.to_string())
        }
    }
}

/// Opaque text-completion boundary: a prompt in, a completion out.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn is_available(&self) -> bool;

    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String, LlmError>;
}

/// Selects the configured backend and times every completion.
pub struct LlmManager {
    backend: String,
    provider: Box<dyn CompletionService>,
}

impl LlmManager {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let provider: Box<dyn CompletionService> = match config.backend.as_str() {
            "remote" => Box::new(providers::remote::RemoteLlmProvider::new(config)?),
            "ollama" => Box::new(providers::ollama::OllamaProvider::new(config)?),
            _ => {
                return Err(LlmError::ConfigError(format!(
                    "Unsupported LLM backend: {}",
                    config.backend
                )))
            }
        };

        Ok(Self {
            backend: config.backend.clone(),
            provider,
        })
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }
}

#[async_trait]
impl CompletionService for LlmManager {
    async fn is_available(&self) -> bool {
        let available = self.provider.is_available().await;
        if !available {
            warn!("LLM backend '{}' is not available", self.backend);
        }
        available
    }

    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String, LlmError> {
        let start = Instant::now();
        let result = self.provider.complete(prompt, temperature).await;
        debug!(
            backend = %self.backend,
            elapsed_ms = start.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "Completion finished"
        );
        result
    }
}
