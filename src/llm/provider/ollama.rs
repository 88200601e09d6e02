//! Ollama client implementation
//!
//! Non-streaming `/api/chat` with tool calling. Ollama matches tool results
//! by position rather than by id, so it tolerates loosely paired histories.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::core::config::ProviderSettings;
use crate::core::{ProviderError, ToolCall, ToolDefinition, Turn};
use crate::llm::provider::{http_client, send_json};
use crate::llm::traits::{GenerateOptions, ModelRequest, ModelTurn, Provider, TokenUsage};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Ollama API client
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

/// Ollama chat request
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolDefinition]>,
    options: OllamaOptions,
    stream: bool,
}

/// Ollama message format
#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OllamaToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_name: Option<String>,
}

/// Ollama tool call format
#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaToolCall {
    function: OllamaFunction,
}

/// Ollama function in tool call
#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaFunction {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

/// Ollama generation options
#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

/// Ollama chat response (non-streaming)
#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: OllamaMessage,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

impl OllamaClient {
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self, ProviderError> {
        let timeout = Duration::from_secs(settings.timeout_secs);
        Ok(Self {
            client: http_client(timeout)?,
            base_url: settings
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: settings.model.clone(),
            timeout,
        })
    }

    /// Convert a neutral turn to Ollama format
    fn to_ollama_message(turn: &Turn) -> OllamaMessage {
        match turn {
            Turn::User { text } => OllamaMessage {
                role: "user".to_string(),
                content: text.clone(),
                tool_calls: None,
                tool_name: None,
            },
            Turn::Assistant { text, tool_calls } => OllamaMessage {
                role: "assistant".to_string(),
                content: text.clone().unwrap_or_default(),
                tool_calls: (!tool_calls.is_empty()).then(|| {
                    tool_calls
                        .iter()
                        .map(|tc| OllamaToolCall {
                            function: OllamaFunction {
                                name: tc.name.clone(),
                                arguments: tc.arguments.clone(),
                            },
                        })
                        .collect()
                }),
                tool_name: None,
            },
            Turn::Tool { name, result, .. } => OllamaMessage {
                role: "tool".to_string(),
                content: result.to_value().to_string(),
                tool_calls: None,
                tool_name: Some(name.clone()),
            },
        }
    }

    fn build_request<'a>(&'a self, request: &ModelRequest<'a>) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(request.turns.len() + 1);
        if !request.system_prompt.is_empty() {
            messages.push(OllamaMessage {
                role: "system".to_string(),
                content: request.system_prompt.to_string(),
                tool_calls: None,
                tool_name: None,
            });
        }
        messages.extend(request.turns.iter().map(Self::to_ollama_message));

        ChatRequest {
            model: &self.model,
            messages,
            tools: (!request.tools.is_empty()).then_some(request.tools),
            options: options_for(request.options),
            stream: false,
        }
    }

    /// Convert an Ollama response to a neutral turn. Ollama has no call ids,
    /// so positional ones are assigned here.
    fn to_model_turn(response: ChatResponse) -> ModelTurn {
        let tool_calls = response
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(i, tc)| {
                let arguments = match tc.function.arguments {
                    serde_json::Value::Null => serde_json::json!({}),
                    other => other,
                };
                ToolCall::new(format!("call_{}", i), tc.function.name, arguments)
            })
            .collect();

        let usage = match (response.prompt_eval_count, response.eval_count) {
            (Some(prompt), Some(completion)) => Some(TokenUsage::new(prompt, completion)),
            _ => None,
        };

        let content = response.message.content;
        ModelTurn {
            text: (!content.is_empty()).then_some(content),
            tool_calls,
            usage,
        }
    }
}

fn options_for(options: &GenerateOptions) -> OllamaOptions {
    OllamaOptions {
        temperature: options.temperature,
        num_predict: options.max_output_tokens,
    }
}

#[async_trait]
impl Provider for OllamaClient {
    fn name(&self) -> &str {
        "ollama"
    }

    fn requires_strict_pairing(&self) -> bool {
        false
    }

    async fn generate(&self, request: &ModelRequest<'_>) -> Result<ModelTurn, ProviderError> {
        let body = self.build_request(request);
        let http = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body);
        let value = send_json(http, self.timeout).await?;
        let response: ChatResponse = serde_json::from_value(value)
            .map_err(|e| ProviderError::Decode(format!("unexpected Ollama response: {}", e)))?;
        Ok(Self::to_model_turn(response))
    }
}
