pub mod dto;

use std::env;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::AppError;

const GEMINI_MODEL: &str = "gemini-1.5-flash";

#[derive(Clone, Debug)]
pub struct GeminiConfig {
    pub api_key: String,
}

impl GeminiConfig {
    /// Returns `None` when GEMINI_API_KEY is absent. The server still starts;
    /// only the chat endpoint fails in that case.
    pub fn new_from_env() -> Option<Self> {
        let api_key = env::var("GEMINI_API_KEY").ok()?;
        Some(Self { api_key })
    }
}

#[async_trait]
pub trait GenerativeClient: Send + Sync {
    /// Forwards a single user-role turn and returns the generated text
    /// unmodified. No conversation history is kept on either side.
    async fn generate(&self, message: &str) -> Result<String, AppError>;
}

pub struct GeminiHttpClient {
    client: Client,
    config: GeminiConfig,
}

impl GeminiHttpClient {
    pub fn new(config: GeminiConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .build()
            .map_err(|e| AppError::Upstream(format!("Failed to build http client: {}", e)))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl GenerativeClient for GeminiHttpClient {
    async fn generate(&self, message: &str) -> Result<String, AppError> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            GEMINI_MODEL
        );

        let request_body = dto::GenerateContentRequest {
            contents: vec![dto::Content {
                role: "user".to_string(),
                parts: vec![dto::Part {
                    text: message.to_string(),
                }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Gemini request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "Gemini API error {}: {}",
                status, body
            )));
        }

        let parsed: dto::GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to parse Gemini response: {}", e)))?;

        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| AppError::Upstream("Gemini response contained no candidates".to_string()))
    }
}

/// Canned client for tests. Echoes a fixed reply without touching the network.
pub struct CannedGenerativeClient {
    pub reply: String,
}

#[async_trait]
impl GenerativeClient for CannedGenerativeClient {
    async fn generate(&self, _message: &str) -> Result<String, AppError> {
        Ok(self.reply.clone())
    }
}
