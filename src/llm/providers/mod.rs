pub mod ollama;
pub mod remote;

use crate::config::LlmConfig;
use crate::llm::LlmError;
use std::time::Duration;

fn http_client(config: &LlmConfig) -> Result<reqwest::Client, LlmError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| LlmError::ConfigError(e.to_string()))
}
