use crate::config::LlmConfig;
use crate::llm::{CompletionService, LlmError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// OpenAI-compatible chat completions endpoint.
pub struct RemoteLlmProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct PromptRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    max_tokens: usize,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct PromptResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

impl RemoteLlmProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_url = config.api_url.clone().ok_or_else(|| {
            LlmError::ConfigError("API URL is required for remote LLM provider".to_string())
        })?;

        let api_key = config.api_key.clone().ok_or_else(|| {
            LlmError::ConfigError("API key is required for remote LLM provider".to_string())
        })?;

        Ok(Self {
            client: super::http_client(config)?,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl CompletionService for RemoteLlmProvider {
    async fn is_available(&self) -> bool {
        let models = self
            .client
            .get(format!("{}/models", self.api_url))
            .bearer_auth(&self.api_key)
            .send()
            .await;
        if matches!(&models, Ok(response) if response.status().is_success()) {
            return true;
        }

        // Some gateways do not expose /models; any non-5xx answer means it is up.
        match self.client.get(&self.api_url).send().await {
            Ok(response) => !response.status().is_server_error(),
            Err(e) => {
                warn!("Remote LLM endpoint {} is not reachable: {}", self.api_url, e);
                false
            }
        }
    }

    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String, LlmError> {
        info!("Sending request to remote LLM with model: {}", self.model);
        debug!("Prompt: {}", prompt);

        let request = PromptRequest {
            model: &self.model,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            temperature,
            max_tokens: 2000,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(LlmError::ResponseError(format!(
                "API responded with status code: {}",
                response.status()
            )));
        }

        let prompt_response: PromptResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ResponseError(e.to_string()))?;

        let content = prompt_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| LlmError::ResponseError("No choices in response".to_string()))?;

        debug!("Raw completion from remote LLM: {}", content);
        Ok(content)
    }
}
