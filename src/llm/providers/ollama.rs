use crate::config::LlmConfig;
use crate::llm::{CompletionService, LlmError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

#[derive(Serialize, Debug)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize, Debug)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Deserialize, Debug)]
struct OllamaResponse {
    response: String,
}

#[derive(Deserialize, Debug)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Deserialize, Debug)]
struct ModelTag {
    name: String,
}

impl OllamaProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let configured = config.api_url.as_deref().unwrap_or(DEFAULT_OLLAMA_URL);
        // Older configs point straight at the generate endpoint.
        let base_url = configured
            .trim_end_matches('/')
            .trim_end_matches("/api/generate")
            .to_string();

        Ok(Self {
            client: super::http_client(config)?,
            base_url,
            model: config.model.clone(),
        })
    }

    fn has_model(&self, tags: &TagsResponse) -> bool {
        tags.models.iter().any(|tag| {
            tag.name == self.model
                || (!self.model.contains(':') && tag.name == format!("{}:latest", self.model))
        })
    }
}

#[async_trait]
impl CompletionService for OllamaProvider {
    async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        let response = match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                warn!("Ollama tags endpoint responded with {}", response.status());
                return false;
            }
            Err(e) => {
                warn!("Ollama is not reachable at {}: {}", self.base_url, e);
                return false;
            }
        };

        match response.json::<TagsResponse>().await {
            Ok(tags) if self.has_model(&tags) => true,
            Ok(_) => {
                warn!("Ollama is running but model '{}' is not installed", self.model);
                false
            }
            Err(e) => {
                warn!("Could not read Ollama model list: {}", e);
                false
            }
        }
    }

    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String, LlmError> {
        info!("Sending request to Ollama with model: {}", self.model);
        debug!("Prompt: {}", prompt);

        let request = OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: OllamaOptions { temperature },
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = match response.text().await {
                Ok(body) => format!(" - Response body: {}", body),
                Err(_) => String::new(),
            };

            error!("Ollama API responded with status code: {}{}", status, error_body);
            return Err(LlmError::ResponseError(format!(
                "Ollama API responded with status code: {}{}",
                status, error_body
            )));
        }

        let response_text = response
            .text()
            .await
            .map_err(|e| LlmError::ResponseError(format!("Failed to read response body: {}", e)))?;

        let ollama_response: OllamaResponse = serde_json::from_str(&response_text).map_err(|e| {
            error!("Failed to parse Ollama response: {} - Response was: {}", e, response_text);
            LlmError::ResponseError(format!("Failed to parse Ollama response: {}", e))
        })?;

        debug!("Raw completion from Ollama: {}", ollama_response.response);
        Ok(ollama_response.response)
    }
}
