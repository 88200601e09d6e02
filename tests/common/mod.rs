//! Shared fixtures: a scripted model provider and an in-memory browser

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use webpilot::agent::{Agent, ControlHandle};
use webpilot::core::config::RetryConfig;
use webpilot::core::{Config, ProviderError, Result, ToolCall, ToolResult, Turn};
use webpilot::llm::{ModelRequest, ModelTurn, Provider, ProviderAdapter};
use webpilot::tools::browser::snapshot::{DomNode, ElementTag, PageTree};
use webpilot::tools::browser::BrowserDriver;
use webpilot::tools::schema::ScrollDirection;
use webpilot::tools::{ToolDispatcher, Unattended};

/// Something a scripted provider can do to the control channel mid-call
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Interference {
    Stop,
    Pause,
}

/// Plays back canned turns and records every request it receives
pub struct ScriptedProvider {
    name: String,
    strict: bool,
    script: Mutex<VecDeque<std::result::Result<ModelTurn, ProviderError>>>,
    /// Returned once the script runs out
    fallback: Option<ModelTurn>,
    requests: Mutex<Vec<Vec<Turn>>>,
    control: Mutex<Option<(ControlHandle, usize, Interference)>>,
}

impl ScriptedProvider {
    pub fn new(
        name: &str,
        script: Vec<std::result::Result<ModelTurn, ProviderError>>,
    ) -> Self {
        Self {
            name: name.to_string(),
            strict: true,
            script: Mutex::new(script.into()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
            control: Mutex::new(None),
        }
    }

    pub fn with_fallback(mut self, turn: ModelTurn) -> Self {
        self.fallback = Some(turn);
        self
    }

    /// On call number `at` (1-based), act on `control` before answering
    pub fn interfere(&self, control: ControlHandle, at: usize, action: Interference) {
        *self.control.lock().unwrap() = Some((control, at, action));
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn request(&self, index: usize) -> Vec<Turn> {
        self.requests.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn requires_strict_pairing(&self) -> bool {
        self.strict
    }

    async fn generate(
        &self,
        request: &ModelRequest<'_>,
    ) -> std::result::Result<ModelTurn, ProviderError> {
        let call_number = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.turns.to_vec());
            requests.len()
        };

        if let Some((control, at, action)) = self.control.lock().unwrap().as_ref() {
            if *at == call_number {
                match action {
                    Interference::Stop => control.stop(),
                    Interference::Pause => control.pause(),
                };
            }
        }

        match self.script.lock().unwrap().pop_front() {
            Some(next) => next,
            None => self
                .fallback
                .clone()
                .ok_or_else(|| ProviderError::InvalidRequest("script exhausted".to_string())),
        }
    }
}

/// A model turn with one or more tool calls
pub fn calls(calls: &[(&str, Value)]) -> ModelTurn {
    ModelTurn {
        text: None,
        tool_calls: calls
            .iter()
            .enumerate()
            .map(|(i, (name, args))| ToolCall::new(format!("vendor-{}", i), *name, args.clone()))
            .collect(),
        usage: None,
    }
}

pub fn call(name: &str, args: Value) -> ModelTurn {
    calls(&[(name, args)])
}

/// Text plus a single call, as models often narrate before acting
pub fn thought_and_call(thought: &str, name: &str, args: Value) -> ModelTurn {
    let mut turn = call(name, args);
    turn.text = Some(thought.to_string());
    turn
}

pub fn text(text: &str) -> ModelTurn {
    ModelTurn {
        text: Some(text.to_string()),
        ..ModelTurn::default()
    }
}

/// A browser holding one page per URL
pub struct MemoryBrowser {
    pages: HashMap<String, DomNode>,
    current: Mutex<PageTree>,
    tags: Mutex<HashMap<u32, u64>>,
    actions: Mutex<Vec<String>>,
    alive: AtomicBool,
}

impl MemoryBrowser {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            current: Mutex::new(PageTree::new("about:blank", DomNode::new("body"))),
            tags: Mutex::new(HashMap::new()),
            actions: Mutex::new(Vec::new()),
            alive: AtomicBool::new(true),
        }
    }

    pub fn with_page(mut self, url: &str, root: DomNode) -> Self {
        self.pages.insert(url.to_string(), root);
        self
    }

    pub fn kill(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    pub fn actions(&self) -> Vec<String> {
        self.actions.lock().unwrap().clone()
    }

    fn record(&self, action: String) -> Result<ToolResult> {
        self.actions.lock().unwrap().push(action);
        Ok(ToolResult::ok())
    }

    /// `[N]` resolves through the latest tags to the element's tag and text
    fn describe(&self, selector: &str) -> Option<String> {
        let id: u32 = selector.strip_prefix('[')?.strip_suffix(']')?.parse().ok()?;
        let handle = *self.tags.lock().unwrap().get(&id)?;
        let page = self.current.lock().unwrap();
        find(&page.root, handle).map(|node| format!("{}:{}", node.tag, node.text))
    }
}

fn find(node: &DomNode, handle: u64) -> Option<&DomNode> {
    if node.handle == handle {
        return Some(node);
    }
    node.children.iter().find_map(|child| find(child, handle))
}

#[async_trait]
impl BrowserDriver for MemoryBrowser {
    async fn navigate(&self, url: &str) -> Result<ToolResult> {
        let root = self
            .pages
            .get(url)
            .cloned()
            .unwrap_or_else(|| DomNode::new("body"));
        *self.current.lock().unwrap() = PageTree::new(url, root);
        self.tags.lock().unwrap().clear();
        self.record(format!("navigate {}", url))
            .map(|r| r.with("url", url))
    }

    async fn click(&self, selector: &str) -> Result<ToolResult> {
        match self.describe(selector) {
            Some(target) => self.record(format!("click {}", target)),
            None => Ok(ToolResult::failure(format!(
                "Element not found: {}",
                selector
            ))),
        }
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<ToolResult> {
        self.record(format!("type {} {}", selector, text))
    }

    async fn fill(&self, selector: &str, text: &str) -> Result<ToolResult> {
        self.record(format!("fill {} {}", selector, text))
    }

    async fn press_key(&self, key: &str) -> Result<ToolResult> {
        self.record(format!("press {}", key))
    }

    async fn scroll(&self, direction: ScrollDirection) -> Result<ToolResult> {
        self.record(format!("scroll {}", direction.as_str()))
    }

    async fn wait(&self, seconds: f64) -> Result<ToolResult> {
        self.record(format!("wait {}", seconds))
    }

    async fn go_back(&self) -> Result<ToolResult> {
        self.record("back".to_string())
    }

    async fn hover(&self, selector: &str) -> Result<ToolResult> {
        self.record(format!("hover {}", selector))
    }

    async fn capture_page(&self) -> Result<PageTree> {
        Ok(self.current.lock().unwrap().clone())
    }

    async fn tag_elements(&self, tags: &[ElementTag]) -> Result<()> {
        let mut map = self.tags.lock().unwrap();
        map.clear();
        map.extend(tags.iter().map(|t| (t.stable_id, t.handle)));
        Ok(())
    }

    async fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

/// The example.com landing page with a Login link
pub fn login_page() -> DomNode {
    DomNode::new("body")
        .child(DomNode::new("h1").text("Example Domain"))
        .child(DomNode::new("a").attr("href", "/login").text("Login"))
}

/// Defaults with every delay cut to the bone
pub fn fast_config() -> Config {
    let mut config = Config::default();
    config.providers.secondary = None;
    config.retry = RetryConfig {
        max_retries: 0,
        base_delay_ms: 1,
        max_delay_ms: 1,
        jitter_factor: 0.0,
    };
    config.agent.provider_error_delay_ms = 1;
    config
}

pub fn build_agent(
    config: &Config,
    primary: Arc<ScriptedProvider>,
    secondary: Option<Arc<ScriptedProvider>>,
    browser: Arc<MemoryBrowser>,
) -> Agent {
    let adapter = ProviderAdapter::new(
        primary,
        secondary.map(|s| s as Arc<dyn Provider>),
        config.retry.clone(),
        config.agent.history_window,
    );
    let tools = ToolDispatcher::from_config(browser, Arc::new(Unattended), config);
    Agent::new(config, adapter, tools)
}

/// Result turns in a recorded request
pub fn tool_results(turns: &[Turn]) -> Vec<(String, ToolResult)> {
    turns
        .iter()
        .filter_map(|t| match t {
            Turn::Tool { name, result, .. } => Some((name.clone(), result.clone())),
            _ => None,
        })
        .collect()
}
