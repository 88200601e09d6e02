//! Provider trait for abstracting model backends
//!
//! Enables swapping between Gemini, OpenAI-compatible endpoints and Ollama.

use async_trait::async_trait;

use crate::core::{ProviderError, ToolCall, ToolDefinition, Turn};

/// Token usage information
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Options for generation
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Temperature for sampling (0.0 - 2.0)
    pub temperature: f32,
    /// Maximum tokens to generate
    pub max_output_tokens: u32,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            temperature: 0.4,
            max_output_tokens: 500,
        }
    }
}

/// One fully prepared request, in the neutral history format
#[derive(Debug, Clone)]
pub struct ModelRequest<'a> {
    pub system_prompt: &'a str,
    pub turns: &'a [Turn],
    pub tools: &'a [ToolDefinition],
    pub options: &'a GenerateOptions,
}

/// One model turn, decoded into the neutral format
#[derive(Debug, Clone, Default)]
pub struct ModelTurn {
    /// Text content, if the model produced any
    pub text: Option<String>,
    /// Tool calls in the order the model made them
    pub tool_calls: Vec<ToolCall>,
    /// Token usage information
    pub usage: Option<TokenUsage>,
}

impl ModelTurn {
    /// Neither text nor tool calls
    pub fn is_empty(&self) -> bool {
        self.tool_calls.is_empty() && self.text.as_deref().map_or(true, |t| t.trim().is_empty())
    }
}

/// Trait for model backends
#[async_trait]
pub trait Provider: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &str;

    /// Whether the vendor rejects histories where a tool call has no result
    /// (or a result has no call). Strict providers get the full sanitizer.
    fn requires_strict_pairing(&self) -> bool {
        true
    }

    /// Run one model turn
    async fn generate(&self, request: &ModelRequest<'_>) -> Result<ModelTurn, ProviderError>;
}
