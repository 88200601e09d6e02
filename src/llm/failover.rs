//! Provider adapter with sticky failover
//!
//! Wraps a primary and an optional secondary [`Provider`]. Each call
//! sanitizes the history for the active provider, retries transient errors,
//! and re-ids returned tool calls into the session namespace. Once the
//! primary has failed, every later call goes to the secondary.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::agent::conversation::History;
use crate::agent::sanitizer::{sanitize, truncate};
use crate::core::config::{Config, RetryConfig};
use crate::core::{ProviderError, ToolDefinition};
use crate::llm::provider::create_provider;
use crate::llm::retry::call_with_retry;
use crate::llm::traits::{GenerateOptions, ModelRequest, ModelTurn, Provider};

pub struct ProviderAdapter {
    primary: Arc<dyn Provider>,
    secondary: Option<Arc<dyn Provider>>,
    failed_over: bool,
    retry: RetryConfig,
    history_window: usize,
    next_call_id: u64,
}

impl ProviderAdapter {
    pub fn new(
        primary: Arc<dyn Provider>,
        secondary: Option<Arc<dyn Provider>>,
        retry: RetryConfig,
        history_window: usize,
    ) -> Self {
        Self {
            primary,
            secondary,
            failed_over: false,
            retry,
            history_window,
            next_call_id: 0,
        }
    }

    /// Build both providers from configuration. A secondary that cannot be
    /// built is skipped with a warning; a broken primary is an error.
    pub fn from_config(config: &Config) -> Result<Self, ProviderError> {
        let primary = create_provider(&config.providers.primary)?;
        let secondary = match &config.providers.secondary {
            Some(settings) => match create_provider(settings) {
                Ok(provider) => Some(provider),
                Err(e) => {
                    warn!(provider = %settings.kind, error = %e, "secondary provider unavailable");
                    None
                }
            },
            None => None,
        };
        Ok(Self::new(
            primary,
            secondary,
            config.retry.clone(),
            config.agent.history_window,
        ))
    }

    /// Name of the provider the next call will use
    pub fn active_name(&self) -> &str {
        self.active().name()
    }

    /// Whether the session has switched to the secondary
    pub fn has_failed_over(&self) -> bool {
        self.failed_over
    }

    fn active(&self) -> &Arc<dyn Provider> {
        match (&self.secondary, self.failed_over) {
            (Some(secondary), true) => secondary,
            _ => &self.primary,
        }
    }

    /// Obtain one model turn for `history`
    pub async fn generate(
        &mut self,
        history: &History,
        tools: &[ToolDefinition],
        system_prompt: &str,
        options: &GenerateOptions,
    ) -> Result<ModelTurn, ProviderError> {
        let provider = Arc::clone(self.active());
        let result = self
            .generate_with(&provider, history, tools, system_prompt, options)
            .await;

        let turn = match result {
            Ok(turn) => turn,
            Err(err) if !self.failed_over && self.secondary.is_some() => {
                self.failed_over = true;
                let secondary = Arc::clone(self.active());
                warn!(
                    from = provider.name(),
                    to = secondary.name(),
                    category = err.category(),
                    error = %err,
                    "primary provider failed, switching for the rest of the session"
                );
                self.generate_with(&secondary, history, tools, system_prompt, options)
                    .await?
            }
            Err(err) => return Err(err),
        };

        Ok(self.assign_ids(turn))
    }

    async fn generate_with(
        &self,
        provider: &Arc<dyn Provider>,
        history: &History,
        tools: &[ToolDefinition],
        system_prompt: &str,
        options: &GenerateOptions,
    ) -> Result<ModelTurn, ProviderError> {
        let turns = if provider.requires_strict_pairing() {
            let sanitized = sanitize(history.turns(), self.history_window);
            if sanitized.dropped_results + sanitized.dropped_calls > 0 {
                info!(
                    provider = provider.name(),
                    dropped_results = sanitized.dropped_results,
                    dropped_calls = sanitized.dropped_calls,
                    "sanitized history before encoding"
                );
            }
            sanitized.turns
        } else {
            truncate(history.turns(), self.history_window)
        };

        debug!(provider = provider.name(), turns = turns.len(), "generate");
        let request = ModelRequest {
            system_prompt,
            turns: &turns,
            tools,
            options,
        };
        call_with_retry(&self.retry, provider.name(), || provider.generate(&request)).await
    }

    /// Replace vendor call ids with session-unique neutral ones
    fn assign_ids(&mut self, mut turn: ModelTurn) -> ModelTurn {
        for call in &mut turn.tool_calls {
            self.next_call_id += 1;
            call.id = format!("tc-{}", self.next_call_id);
        }
        turn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ToolCall, Turn};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct Scripted {
        name: &'static str,
        replies: Mutex<VecDeque<Result<ModelTurn, ProviderError>>>,
        calls: Mutex<usize>,
    }

    impl Scripted {
        fn new(name: &'static str, replies: Vec<Result<ModelTurn, ProviderError>>) -> Arc<Self> {
            Arc::new(Self {
                name,
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl Provider for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        async fn generate(&self, _request: &ModelRequest<'_>) -> Result<ModelTurn, ProviderError> {
            *self.calls.lock().unwrap() += 1;
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::from_status(503, "script exhausted", None)))
        }
    }

    fn text(t: &str) -> Result<ModelTurn, ProviderError> {
        Ok(ModelTurn {
            text: Some(t.to_string()),
            ..Default::default()
        })
    }

    fn no_wait() -> RetryConfig {
        RetryConfig {
            max_retries: 2,
            base_delay_ms: 0,
            max_delay_ms: 0,
            jitter_factor: 0.0,
        }
    }

    fn history() -> History {
        History::new("Task: test")
    }

    #[tokio::test]
    async fn test_sticky_failover() {
        let primary = Scripted::new("primary", vec![]);
        let secondary = Scripted::new(
            "secondary",
            vec![
                text("one"),
                Err(ProviderError::Auth("flaky".into())),
                text("three"),
            ],
        );
        let mut adapter = ProviderAdapter::new(
            primary.clone(),
            Some(secondary.clone()),
            no_wait(),
            12,
        );
        let opts = GenerateOptions::default();

        let first = adapter.generate(&history(), &[], "sys", &opts).await.unwrap();
        assert_eq!(first.text.as_deref(), Some("one"));
        assert!(adapter.has_failed_over());
        assert_eq!(adapter.active_name(), "secondary");
        assert_eq!(primary.calls(), 3);

        assert!(adapter.generate(&history(), &[], "sys", &opts).await.is_err());
        let third = adapter.generate(&history(), &[], "sys", &opts).await.unwrap();
        assert_eq!(third.text.as_deref(), Some("three"));
        assert_eq!(primary.calls(), 3);
        assert_eq!(adapter.active_name(), "secondary");
    }

    #[tokio::test]
    async fn test_error_propagates_without_secondary() {
        let primary = Scripted::new("primary", vec![Err(ProviderError::Auth("nope".into()))]);
        let mut adapter = ProviderAdapter::new(primary.clone(), None, no_wait(), 12);
        let err = adapter
            .generate(&history(), &[], "sys", &GenerateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Auth(_)));
        assert_eq!(primary.calls(), 1);
        assert!(!adapter.has_failed_over());
    }

    #[tokio::test]
    async fn test_call_ids_are_neutral_and_unique() {
        let reply = |id: &str| {
            Ok(ModelTurn {
                tool_calls: vec![
                    ToolCall::new(id, "get_page_content", json!({})),
                    ToolCall::new(id, "go_back", json!({})),
                ],
                ..Default::default()
            })
        };
        let primary = Scripted::new("primary", vec![reply("call_x"), reply("call_x")]);
        let mut adapter = ProviderAdapter::new(primary, None, no_wait(), 12);
        let opts = GenerateOptions::default();

        let a = adapter.generate(&history(), &[], "", &opts).await.unwrap();
        let b = adapter.generate(&history(), &[], "", &opts).await.unwrap();
        let ids: Vec<_> = a
            .tool_calls
            .iter()
            .chain(b.tool_calls.iter())
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(ids, vec!["tc-1", "tc-2", "tc-3", "tc-4"]);
    }

    #[tokio::test]
    async fn test_strict_provider_sees_sanitized_history() {
        struct Inspect(Mutex<Vec<Turn>>);

        #[async_trait]
        impl Provider for Inspect {
            fn name(&self) -> &str {
                "inspect"
            }
            async fn generate(
                &self,
                request: &ModelRequest<'_>,
            ) -> Result<ModelTurn, ProviderError> {
                *self.0.lock().unwrap() = request.turns.to_vec();
                Ok(ModelTurn::default())
            }
        }

        let mut history = history();
        let orphan = ToolCall::new("foreign-1", "click", json!({"selector": "[1]"}));
        history.push(Turn::tool(&orphan, crate::core::ToolResult::ok()));

        let inspect = Arc::new(Inspect(Mutex::new(Vec::new())));
        let mut adapter = ProviderAdapter::new(inspect.clone(), None, no_wait(), 12);
        adapter
            .generate(&history, &[], "", &GenerateOptions::default())
            .await
            .unwrap();
        let seen = inspect.0.lock().unwrap().clone();
        assert_eq!(seen, vec![Turn::user("Task: test")]);
    }
}
