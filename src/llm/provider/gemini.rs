//! Google Gemini provider
//!
//! Talks to the Generative Language API (`models/{model}:generateContent`).
//! Gemini pairs `functionResponse` parts with `functionCall` parts by
//! position within adjacent contents, so consecutive same-role turns are
//! merged into one content.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};

use crate::core::config::ProviderSettings;
use crate::core::{ProviderError, ToolCall, ToolDefinition, Turn};
use crate::llm::provider::{http_client, send_json};
use crate::llm::traits::{GenerateOptions, ModelRequest, ModelTurn, Provider, TokenUsage};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl GeminiProvider {
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self, ProviderError> {
        let api_key = settings.resolved_api_key().ok_or_else(|| {
            ProviderError::NotConfigured("GOOGLE_API_KEY is not set".to_string())
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
            model: settings.model.trim_start_matches("models/").to_string(),
            timeout,
        })
    }
}

/// Build the `generateContent` request body
pub fn encode_request(
    system_prompt: &str,
    turns: &[Turn],
    tools: &[ToolDefinition],
    options: &GenerateOptions,
) -> Value {
    let mut contents: Vec<Value> = Vec::with_capacity(turns.len());
    for turn in turns {
        let (role, parts) = encode_turn(turn);
        if parts.is_empty() {
            continue;
        }
        match contents.last_mut() {
            Some(last) if last["role"] == role => {
                if let Some(existing) = last["parts"].as_array_mut() {
                    existing.extend(parts);
                }
            }
            _ => contents.push(json!({"role": role, "parts": parts})),
        }
    }

    let mut body = json!({
        "contents": contents,
        "generationConfig": {
            "temperature": options.temperature,
            "maxOutputTokens": options.max_output_tokens,
        },
    });
    if !system_prompt.is_empty() {
        body["systemInstruction"] = json!({"parts": [{"text": system_prompt}]});
    }
    if !tools.is_empty() {
        let declarations: Vec<Value> = tools.iter().map(encode_declaration).collect();
        body["tools"] = json!([{"functionDeclarations": declarations}]);
    }
    body
}

fn encode_turn(turn: &Turn) -> (&'static str, Vec<Value>) {
    match turn {
        Turn::User { text } => ("user", vec![json!({"text": text})]),
        Turn::Assistant { text, tool_calls } => {
            let mut parts = Vec::with_capacity(tool_calls.len() + 1);
            if let Some(text) = text.as_deref().filter(|t| !t.is_empty()) {
                parts.push(json!({"text": text}));
            }
            for call in tool_calls {
                parts.push(json!({
                    "functionCall": {"name": call.name, "args": call.arguments}
                }));
            }
            ("model", parts)
        }
        Turn::Tool { name, result, .. } => (
            "user",
            vec![json!({
                "functionResponse": {"name": name, "response": result.to_value()}
            })],
        ),
    }
}

fn encode_declaration(tool: &ToolDefinition) -> Value {
    let mut declaration = json!({
        "name": tool.function.name,
        "description": tool.function.description,
    });
    let has_properties = tool
        .function
        .parameters
        .get("properties")
        .and_then(Value::as_object)
        .is_some_and(|p| !p.is_empty());
    if has_properties {
        declaration["parameters"] = convert_schema(&tool.function.parameters);
    }
    declaration
}

/// Gemini wants OpenAPI-style upper-case type names and rejects empty `required`
fn convert_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, value) in map {
                match (key.as_str(), value) {
                    ("type", Value::String(t)) => {
                        out.insert(key.clone(), Value::String(t.to_uppercase()));
                    }
                    ("required", Value::Array(items)) if items.is_empty() => {}
                    ("additionalProperties", _) => {}
                    _ => {
                        out.insert(key.clone(), convert_schema(value));
                    }
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(convert_schema).collect()),
        other => other.clone(),
    }
}

/// Decode a `generateContent` response body
pub fn decode_response(body: &Value) -> Result<ModelTurn, ProviderError> {
    let candidate = body
        .get("candidates")
        .and_then(|c| c.get(0))
        .ok_or_else(|| {
            let reason = body
                .pointer("/promptFeedback/blockReason")
                .and_then(Value::as_str)
                .unwrap_or("no candidates");
            ProviderError::Decode(format!("Gemini returned no candidates: {}", reason))
        })?;

    let usage = body.get("usageMetadata").map(|u| {
        TokenUsage::new(
            u.get("promptTokenCount").and_then(Value::as_u64).unwrap_or(0) as u32,
            u.get("candidatesTokenCount").and_then(Value::as_u64).unwrap_or(0) as u32,
        )
    });

    let Some(parts) = candidate
        .pointer("/content/parts")
        .and_then(Value::as_array)
    else {
        return Ok(ModelTurn {
            usage,
            ..ModelTurn::default()
        });
    };

    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for part in parts {
        if let Some(t) = part.get("text").and_then(Value::as_str) {
            // Reasoning summaries are not part of the answer
            if part.get("thought").and_then(Value::as_bool) != Some(true) {
                text.push_str(t);
            }
        }
        if let Some(call) = part.get("functionCall") {
            let Some(name) = call.get("name").and_then(Value::as_str) else {
                continue;
            };
            let arguments = match call.get("args") {
                Some(args @ Value::Object(_)) => args.clone(),
                _ => Value::Object(Map::new()),
            };
            let id = call
                .get("id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("call_{}", tool_calls.len()));
            tool_calls.push(ToolCall::new(id, name, arguments));
        }
    }

    Ok(ModelTurn {
        text: (!text.is_empty()).then_some(text),
        tool_calls,
        usage,
    })
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, request: &ModelRequest<'_>) -> Result<ModelTurn, ProviderError> {
        let body = encode_request(
            request.system_prompt,
            request.turns,
            request.tools,
            request.options,
        );
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let http = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body);
        let response = send_json(http, self.timeout).await?;
        decode_response(&response)
    }
}
