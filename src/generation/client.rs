//! HTTP generation client (OpenAI-compatible chat completions)

use super::GenerationService;
use crate::config::GenerationConfig;
use crate::error::{InsightError, Result};
use crate::metrics::METRICS;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const SYSTEM_PROMPT: &str = "You are an analytics assistant for a live ops team. \
Answer from the provided context only and call out gaps explicitly.";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Generation client over an OpenAI-compatible chat completions endpoint
#[derive(Debug)]
pub struct HttpGenerationClient {
    http: Client,
    config: GenerationConfig,
    api_key: Secret<String>,
}

impl HttpGenerationClient {
    /// Build from configuration; the API key comes from the environment
    /// variable named in `config.api_key_env` and never appears in logs.
    pub fn from_config(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            InsightError::Configuration(format!(
                "generation enabled but {} is not set",
                config.api_key_env
            ))
        })?;
        Self::with_key(config.clone(), Secret::new(api_key))
    }

    /// Build with an explicit key (tests use this)
    pub fn with_key(config: GenerationConfig, api_key: Secret<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| InsightError::Generation(e.to_string()))?;

        Ok(Self {
            http,
            config,
            api_key,
        })
    }
}

#[async_trait]
impl GenerationService for HttpGenerationClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        debug!(model = %self.config.model, "Calling generation service");

        let response = self
            .http
            .post(&self.config.api_url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                METRICS
                    .generation_requests
                    .with_label_values(&["error"])
                    .inc();
                InsightError::Generation(format!("request failed: {}", e))
            })?;

        if !response.status().is_success() {
            METRICS
                .generation_requests
                .with_label_values(&["error"])
                .inc();
            let status = response.status();
            error!(%status, "Generation service returned an error");
            return Err(InsightError::Generation(format!(
                "upstream status {}",
                status
            )));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            METRICS
                .generation_requests
                .with_label_values(&["error"])
                .inc();
            InsightError::Generation(format!("invalid response: {}", e))
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| InsightError::Generation("empty choices".to_string()))?;

        METRICS
            .generation_requests
            .with_label_values(&["success"])
            .inc();

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: String) -> GenerationConfig {
        GenerationConfig {
            enabled: true,
            api_url: url,
            ..GenerationConfig::default()
        }
    }

    #[tokio::test]
    async fn test_generate_parses_chat_response() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"choices": [{"message": {"role": "assistant", "content": "BOGO lifted revenue 12%."}}]}"#,
            )
            .create_async()
            .await;

        let client = HttpGenerationClient::with_key(
            config(format!("{}/v1/chat/completions", server.url())),
            Secret::new("test-key".to_string()),
        )
        .unwrap();

        let answer = client.generate("How did BOGO do?").await.unwrap();
        assert_eq!(answer, "BOGO lifted revenue 12%.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_upstream_error_is_generation_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let client = HttpGenerationClient::with_key(
            config(format!("{}/v1/chat/completions", server.url())),
            Secret::new("test-key".to_string()),
        )
        .unwrap();

        let err = client.generate("anything").await.unwrap_err();
        assert!(matches!(err, InsightError::Generation(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_missing_key_is_configuration_error() {
        let config = GenerationConfig {
            api_key_env: "DEFINITELY_NOT_SET_12345".to_string(),
            ..GenerationConfig::default()
        };
        let err = HttpGenerationClient::from_config(&config).unwrap_err();
        assert!(err.is_fatal());
    }
}
