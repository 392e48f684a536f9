use crate::error::InsightError;
use crate::llm::prompts::SYSTEM_PROMPT_ANALYST;
use crate::llm::types::InsightRequest;
use crate::llm::{InsightConfig, InsightGenerator};
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const APP_REFERER: &str = "https://financial-analyzer.app";
const APP_TITLE: &str = "Financial Statement Analyzer";

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Option<Vec<ChatChoice>>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Chat-completions client for OpenRouter.
#[derive(Clone)]
pub struct OpenRouterClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f64,
    timeout: Duration,
}

impl OpenRouterClient {
    pub fn new(api_key: String, config: &InsightConfig) -> Result<Self, InsightError> {
        let timeout = config.timeout();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| InsightError::Unavailable(format!("HTTP client setup failed: {}", e)))?;
        Ok(Self {
            client,
            api_key,
            base_url: OPENROUTER_URL.to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn complete(&self, system_prompt: &str, prompt: &str) -> Result<String, InsightError> {
        let payload = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let res = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", APP_REFERER)
            .header("X-Title", APP_TITLE)
            .json(&payload)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = res.status();
        if !status.is_success() {
            let error_text = res.text().await.unwrap_or_default();
            return Err(InsightError::Service(format!(
                "OpenRouter API error (status {}): {}",
                status, error_text
            )));
        }

        let body: ChatResponse = res.json().await.map_err(|e| self.transport_error(e))?;
        body.choices
            .ok_or_else(|| InsightError::Service("No choices returned".to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| InsightError::Service("Empty choices list".to_string()))?
            .message
            .content
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| InsightError::Service("Model returned no text content".to_string()))
    }

    fn transport_error(&self, e: reqwest::Error) -> InsightError {
        if e.is_timeout() {
            InsightError::Timeout(self.timeout)
        } else if e.is_connect() {
            InsightError::Unavailable(e.to_string())
        } else {
            InsightError::Service(e.to_string())
        }
    }
}

impl InsightGenerator for OpenRouterClient {
    fn name(&self) -> &str {
        "openrouter"
    }

    fn generate<'a>(
        &'a self,
        request: &'a InsightRequest,
    ) -> BoxFuture<'a, Result<String, InsightError>> {
        self.complete(SYSTEM_PROMPT_ANALYST, &request.prompt).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_shape() {
        let payload = ChatRequest {
            model: "m",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            max_tokens: 10,
            temperature: 0.2,
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["max_tokens"], 10);
    }

    #[test]
    fn test_response_without_choices_parses() {
        let body: ChatResponse = serde_json::from_str(r#"{"error": "quota"}"#).unwrap();
        assert!(body.choices.is_none());
    }
}
