//! LLM explanation client for the DDoS flow analyzer.
//!
//! This module turns one flagged window at a time into natural-language
//! commentary by calling an OpenAI-compatible chat completions API. It is
//! an optional post-processing consumer of flagged entries; failures here
//! never abort an analysis run.

use std::time::Duration;

use log::warn;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::sleep;

use crate::core::detector::FlaggedWindow;
use crate::models::LlmConfig;

/// Errors that can occur while requesting an explanation
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("API returned status {0}")]
    StatusError(u16),
    #[error("API response contained no completion")]
    EmptyResponse,
    #[error("no API key configured")]
    MissingApiKey,
    #[error("request failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// Chat-completions client with bounded retry and backoff
pub struct LlmClient {
    client: Client,
    config: LlmConfig,
}

impl LlmClient {
    /// Create a new explanation client.
    ///
    /// The per-request timeout comes from the configuration; retries and
    /// backoff are handled by [`explain`](Self::explain).
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        if config.api_key.is_empty() {
            return Err(LlmError::MissingApiKey);
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    /// Request natural-language commentary for one flagged window.
    ///
    /// # Returns
    ///
    /// * `Ok(String)` with the model's commentary
    /// * `Err(LlmError)` once the bounded attempts are exhausted
    pub async fn explain(&self, window: &FlaggedWindow) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: "You are a network security analyst. Explain briefly, \
                              in plain language, why the described traffic window \
                              was flagged as possible denial-of-service activity."
                        .to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: build_prompt(window),
                },
            ],
            temperature: 0.2,
        };

        let mut last_error = String::new();
        for attempt in 1..=self.config.max_attempts {
            match self.send(&request).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    warn!(
                        "explanation attempt {}/{} failed: {}",
                        attempt, self.config.max_attempts, e
                    );
                    last_error = e.to_string();
                }
            }
            if attempt < self.config.max_attempts {
                let backoff = self.config.backoff_ms * 2u64.pow(attempt - 1);
                sleep(Duration::from_millis(backoff)).await;
            }
        }

        Err(LlmError::RetriesExhausted {
            attempts: self.config.max_attempts,
            last: last_error,
        })
    }

    async fn send(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let response = self
            .client
            .post(&self.config.api_url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::StatusError(status.as_u16()));
        }

        let body: ChatResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(LlmError::EmptyResponse)
    }
}

/// Summarize one flagged window for the explanation prompt
fn build_prompt(window: &FlaggedWindow) -> String {
    let mut prompt = format!(
        "Source {} was flagged with risk score {}.\n\
         Requests in window: {} ({:.1} per minute).\n\
         Distinct paths: {}, distinct user agents: {}.\n",
        window.source,
        window.risk_score,
        window.total_requests,
        window.request_frequency,
        window.unique_paths,
        window.unique_user_agents,
    );
    if !window.labels.is_empty() {
        prompt.push_str(&format!(
            "Ground-truth labels: {}.\n",
            window.labels.join(", ")
        ));
    }
    prompt.push_str("Indicators:\n");
    for indicator in &window.indicators {
        prompt.push_str(&format!("- {}\n", indicator));
    }
    prompt
}
