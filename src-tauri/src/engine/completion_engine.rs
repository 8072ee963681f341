use async_trait::async_trait;
use log::{debug, error, info};
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::configuration::settings::Settings;

const MAX_ERROR_BODY_CHARS: usize = 500;

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("{}", describe_network(.message, .timed_out))]
    Network { message: String, timed_out: bool },
    #[error("The completion endpoint returned an unexpected response: {0}")]
    MalformedResponse(String),
    #[error("{}", describe_http(.status, .body))]
    Http { status: u16, body: String },
    #[error("The API endpoint `{0}` is not a valid URL. Please check settings.")]
    InvalidEndpoint(String),
}

impl CompletionError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, CompletionError::Network { timed_out: true, .. })
    }
}

fn describe_network(message: &str, timed_out: &bool) -> String {
    if *timed_out {
        format!("The completion request timed out: {}", message)
    } else {
        format!("Failed to connect to the completion endpoint: {}", message)
    }
}

fn describe_http(status: &u16, body: &str) -> String {
    match *status {
        429 => "Rate limit exceeded. Please try again later.".to_string(),
        _ if body.is_empty() => format!("The API returned status code {}", status),
        _ => format!("The API returned status code {}\n{}", status, body),
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: String,
    pub content: String,
}

#[derive(Serialize, Debug)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
}

#[derive(Deserialize, Debug)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize, Debug)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Anything that can turn a prompt into completion text.
#[async_trait]
pub trait Completer: Send + Sync {
    async fn complete(&self, prompt: &str, settings: &Settings) -> Result<String, CompletionError>;
}

/// Single-shot client for OpenAI-compatible chat completion endpoints.
#[derive(Clone)]
pub struct CompletionClient {
    client: Client,
}

impl CompletionClient {
    pub fn new() -> Result<Self, CompletionError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| CompletionError::Network {
                message: format!("failed to create client: {}", e),
                timed_out: false,
            })?;
        Ok(Self { client })
    }
}

pub fn build_messages(prompt: &str, settings: &Settings) -> Vec<Message> {
    let mut messages = Vec::with_capacity(2);
    if !settings.system_prompt.trim().is_empty() {
        messages.push(Message {
            role: "system".to_string(),
            content: settings.system_prompt.clone(),
        });
    }
    messages.push(Message {
        role: "user".to_string(),
        content: prompt.to_string(),
    });
    messages
}

#[async_trait]
impl Completer for CompletionClient {
    async fn complete(&self, prompt: &str, settings: &Settings) -> Result<String, CompletionError> {
        if settings.api_key.trim().is_empty() {
            return Err(CompletionError::Auth(
                "no API key is configured. Please add one in settings.".to_string(),
            ));
        }
        let endpoint = Url::parse(settings.api_endpoint.trim())
            .map_err(|_| CompletionError::InvalidEndpoint(settings.api_endpoint.clone()))?;

        let request = ChatCompletionRequest {
            model: &settings.model,
            messages: build_messages(prompt, settings),
        };

        debug!("Sending completion request to {} with model {}", endpoint, settings.model);
        let response = self
            .client
            .post(endpoint)
            .bearer_auth(settings.api_key.trim())
            .timeout(settings.request_timeout())
            .json(&request)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            error!("Completion endpoint rejected credentials with {}", status);
            return Err(CompletionError::Auth(
                "the endpoint rejected the API key. Please check your API key.".to_string(),
            ));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Completion failed with status {}: {}", status, body);
            return Err(CompletionError::Http {
                status: status.as_u16(),
                body: truncate(&body, MAX_ERROR_BODY_CHARS),
            });
        }

        let body = response.text().await.map_err(network_error)?;
        let content = parse_completion(&body)?;
        info!("Received completion of {} characters", content.len());
        Ok(content)
    }
}

fn network_error(err: reqwest::Error) -> CompletionError {
    error!("Completion request error: {}", err);
    CompletionError::Network {
        message: err.to_string(),
        timed_out: err.is_timeout(),
    }
}

/// Extracts the first choice's text from a chat completion payload.
pub fn parse_completion(body: &str) -> Result<String, CompletionError> {
    let parsed: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|e| CompletionError::MalformedResponse(e.to_string()))?;

    let first = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| CompletionError::MalformedResponse("no choices returned".to_string()))?;

    first
        .message
        .and_then(|message| message.content)
        .ok_or_else(|| {
            CompletionError::MalformedResponse("first choice has no message content".to_string())
        })
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => format!("{}…", &text[..index]),
        None => text.to_string(),
    }
}
