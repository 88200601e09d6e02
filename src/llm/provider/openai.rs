//! OpenAI-compatible chat completions provider
//!
//! Also serves OpenRouter and other endpoints that speak the same protocol
//! (set `base_url`). Tool call arguments travel as JSON-encoded strings.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};

use crate::core::config::ProviderSettings;
use crate::core::{ProviderError, ToolCall, ToolDefinition, Turn};
use crate::llm::provider::{http_client, send_json};
use crate::llm::traits::{GenerateOptions, ModelRequest, ModelTurn, Provider, TokenUsage};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl OpenAiProvider {
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self, ProviderError> {
        let api_key = settings.resolved_api_key().ok_or_else(|| {
            ProviderError::NotConfigured("OPENAI_API_KEY is not set".to_string())
        })?;
        let timeout = Duration::from_secs(settings.timeout_secs);
        Ok(Self {
            client: http_client(timeout)?,
            base_url: settings
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key,
            model: settings.model.clone(),
            timeout,
        })
    }
}

/// Build the chat completions request body
pub fn encode_request(
    model: &str,
    system_prompt: &str,
    turns: &[Turn],
    tools: &[ToolDefinition],
    options: &GenerateOptions,
) -> Value {
    let mut messages = Vec::with_capacity(turns.len() + 1);
    if !system_prompt.is_empty() {
        messages.push(json!({"role": "system", "content": system_prompt}));
    }
    for turn in turns {
        messages.push(encode_turn(turn));
    }

    let mut body = json!({
        "model": model,
        "messages": messages,
        "temperature": options.temperature,
        "max_tokens": options.max_output_tokens,
    });
    if !tools.is_empty() {
        body["tools"] = json!(tools);
        body["tool_choice"] = json!("auto");
    }
    body
}

fn encode_turn(turn: &Turn) -> Value {
    match turn {
        Turn::User { text } => json!({"role": "user", "content": text}),
        Turn::Assistant { text, tool_calls } => {
            let mut message = json!({"role": "assistant", "content": text});
            if !tool_calls.is_empty() {
                let calls: Vec<Value> = tool_calls
                    .iter()
                    .map(|call| {
                        json!({
                            "id": call.id,
                            "type": "function",
                            "function": {
                                "name": call.name,
                                "arguments": call.arguments.to_string(),
                            }
                        })
                    })
                    .collect();
                message["tool_calls"] = Value::Array(calls);
            }
            message
        }
        Turn::Tool {
            call_id, result, ..
        } => json!({
            "role": "tool",
            "tool_call_id": call_id,
            "content": result.to_value().to_string(),
        }),
    }
}

/// Decode a chat completions response body
pub fn decode_response(body: &Value) -> Result<ModelTurn, ProviderError> {
    let message = body
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .ok_or_else(|| ProviderError::Decode("response has no choices".to_string()))?;

    let text = message
        .get("content")
        .and_then(Value::as_str)
        .map(str::to_string);

    let tool_calls = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .map(|calls| {
            calls
                .iter()
                .enumerate()
                .filter_map(|(i, call)| {
                    let function = call.get("function")?;
                    let name = function.get("name")?.as_str()?.to_string();
                    let id = call
                        .get("id")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("call_{}", i));
                    Some(ToolCall::new(id, name, parse_arguments(function.get("arguments"))))
                })
                .collect()
        })
        .unwrap_or_default();

    let usage = body.get("usage").map(|u| {
        TokenUsage::new(
            u.get("prompt_tokens").and_then(Value::as_u64).unwrap_or(0) as u32,
            u.get("completion_tokens").and_then(Value::as_u64).unwrap_or(0) as u32,
        )
    });

    Ok(ModelTurn {
        text,
        tool_calls,
        usage,
    })
}

/// Arguments arrive as a JSON string; some compatible servers send an object
fn parse_arguments(raw: Option<&Value>) -> Value {
    match raw {
        Some(Value::String(s)) if s.trim().is_empty() => Value::Object(Map::new()),
        Some(Value::String(s)) => {
            serde_json::from_str(s).unwrap_or_else(|_| Value::Object(Map::new()))
        }
        Some(obj @ Value::Object(_)) => obj.clone(),
        _ => Value::Object(Map::new()),
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, request: &ModelRequest<'_>) -> Result<ModelTurn, ProviderError> {
        let body = encode_request(
            &self.model,
            request.system_prompt,
            request.turns,
            request.tools,
            request.options,
        );
        let http = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body);
        let response = send_json(http, self.timeout).await?;
        decode_response(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ToolResult;

    #[test]
    fn test_encode_pairs_calls_and_results() {
        let call = ToolCall::new("tc-1", "navigate", json!({"url": "example.com"}));
        let turns = vec![
            Turn::user("Task: open example.com"),
            Turn::assistant(None, vec![call.clone()]),
            Turn::tool(&call, ToolResult::ok().with("url", "https://example.com/")),
        ];
        let body = encode_request(
            "gpt-4o",
            "be brief",
            &turns,
            &crate::tools::tool_definitions(),
            &GenerateOptions::default(),
        );

        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[2]["tool_calls"][0]["id"], "tc-1");
        assert_eq!(
            messages[2]["tool_calls"][0]["function"]["arguments"],
            r#"{"url":"example.com"}"#
        );
        assert_eq!(messages[3]["role"], "tool");
        assert_eq!(messages[3]["tool_call_id"], "tc-1");
        assert!(messages[3]["content"].as_str().unwrap().contains("\"success\":true"));
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["max_tokens"], 500);
    }

    #[test]
    fn test_decode_tool_calls() {
        let body = json!({
            "choices": [{"message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [
                    {"id": "call_abc", "type": "function",
                     "function": {"name": "click", "arguments": "{\"selector\":\"[3]\"}"}},
                    {"id": "call_def", "type": "function",
                     "function": {"name": "get_page_content", "arguments": ""}}
                ]
            }}],
            "usage": {"prompt_tokens": 120, "completion_tokens": 30}
        });
        let turn = decode_response(&body).unwrap();
        assert!(turn.text.is_none());
        assert_eq!(turn.tool_calls.len(), 2);
        assert_eq!(turn.tool_calls[0].get_string("selector").as_deref(), Some("[3]"));
        assert_eq!(turn.tool_calls[1].arguments, json!({}));
        assert_eq!(turn.usage.unwrap().total_tokens, 150);
    }

    #[test]
    fn test_decode_without_choices() {
        let err = decode_response(&json!({"choices": []})).unwrap_err();
        assert!(matches!(err, ProviderError::Decode(_)));
    }
}
