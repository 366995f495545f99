use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::{system_prompt, user_prompt, NarrativeSummarizer, SummarizerError};
use crate::config::SummarizerConfig;
use crate::report::Report;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Chat Completions client for OpenAI and compatible endpoints.
pub struct OpenAiSummarizer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    brand: String,
}

impl OpenAiSummarizer {
    pub fn new(
        client: reqwest::Client,
        config: &SummarizerConfig,
        api_key: String,
        brand: &str,
    ) -> Self {
        info!(
            "Initialized OpenAI summarizer with model {} at {}",
            config.model, config.api_endpoint
        );

        Self {
            client,
            endpoint: config.api_endpoint.clone(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            brand: brand.to_string(),
        }
    }

    fn request<'a>(&'a self, report: &Report) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt(&self.brand),
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt(report),
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

#[async_trait]
impl NarrativeSummarizer for OpenAiSummarizer {
    fn name(&self) -> &'static str {
        "OpenAI"
    }

    async fn summarize(&self, report: &Report) -> Result<String, SummarizerError> {
        let request = self.request(report);
        debug!(
            "Requesting narrative from {} ({} chars of prompt)",
            self.model,
            request.messages.iter().map(|m| m.content.len()).sum::<usize>()
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| SummarizerError::Request(e.to_string()))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| SummarizerError::Request(e.to_string()))?;

        if !status.is_success() {
            error!(
                "Summarizer request failed with status {}: {}",
                status, response_text
            );
            let message = serde_json::from_str::<ErrorResponse>(&response_text)
                .map(|body| body.error.message)
                .unwrap_or(response_text);
            return Err(SummarizerError::Api {
                status: status.as_u16(),
                message,
            });
        }

        parse_content(&response_text)
    }
}

fn parse_content(body: &str) -> Result<String, SummarizerError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| SummarizerError::InvalidResponse(e.to_string()))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| SummarizerError::InvalidResponse("no choices in response".to_string()))
}
