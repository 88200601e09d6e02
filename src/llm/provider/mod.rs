//! Provider implementations and factory
//!
//! Submodules implement specific vendors (Gemini, OpenAI-compatible, Ollama).
//! Each one only translates between the neutral history and its wire shape;
//! status classification and transport live here.

pub mod gemini;
pub mod ollama;
pub mod openai;

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use tracing::debug;

use crate::core::config::{ProviderKind, ProviderSettings};
use crate::core::ProviderError;
use crate::llm::retry::parse_retry_after;
use crate::llm::traits::Provider;

use self::gemini::GeminiProvider;
use self::ollama::OllamaClient;
use self::openai::OpenAiProvider;

/// Create a provider from its settings
pub fn create_provider(settings: &ProviderSettings) -> Result<Arc<dyn Provider>, ProviderError> {
    let provider: Arc<dyn Provider> = match settings.kind {
        ProviderKind::Gemini => Arc::new(GeminiProvider::from_settings(settings)?),
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::from_settings(settings)?),
        ProviderKind::Ollama => Arc::new(OllamaClient::from_settings(settings)?),
    };
    Ok(provider)
}

pub(crate) fn http_client(timeout: Duration) -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(ProviderError::Http)
}

/// Send a JSON request and decode the JSON body, classifying failures
pub(crate) async fn send_json(
    request: RequestBuilder,
    timeout: Duration,
) -> Result<Value, ProviderError> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            ProviderError::Timeout(timeout)
        } else {
            ProviderError::Http(e)
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        let body = response.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), body = %truncate_for_log(&body), "provider error response");
        return Err(ProviderError::from_status(
            status.as_u16(),
            error_message(&body),
            retry_after,
        ));
    }

    let text = response.text().await.map_err(|e| {
        if e.is_timeout() {
            ProviderError::Timeout(timeout)
        } else {
            ProviderError::Http(e)
        }
    })?;
    serde_json::from_str(&text)
        .map_err(|e| ProviderError::Decode(format!("invalid JSON response: {}", e)))
}

/// Pull `error.message` out of a JSON error body, or fall back to the raw text
pub(crate) fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error").and_then(|e| match e {
                Value::String(s) => Some(s.clone()),
                other => other.get("message").and_then(Value::as_str).map(str::to_string),
            })
        })
        .unwrap_or_else(|| truncate_for_log(body))
}

fn truncate_for_log(body: &str) -> String {
    const LIMIT: usize = 500;
    match body.char_indices().nth(LIMIT) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}
