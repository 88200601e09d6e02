//! Browser driver backed by the agent-browser CLI
//!
//! Every capability shells out to `agent-browser --session <name> ...`.
//! Page capture and id tagging go through `eval` with the scripts below.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tracing::debug;

use crate::core::config::BrowserConfig;
use crate::core::{PilotError, Result, ToolResult};
use crate::tools::browser::driver::BrowserDriver;
use crate::tools::browser::snapshot::{ElementTag, PageTree};
use crate::tools::schema::ScrollDirection;

/// Attribute carrying the id shown to the model
pub const ID_ATTRIBUTE: &str = "data-r-id";
/// Attribute carrying the capture handle
const HANDLE_ATTRIBUTE: &str = "data-r-node";

/// Serializes the rendered page into a `PageTree`, stamping handles as it goes.
/// Nesting stops at 50 levels to stay under serde_json's recursion limit.
const CAPTURE_JS: &str = r#"
(() => {
  const SKIP = new Set(['SCRIPT','STYLE','NOSCRIPT','SVG','LINK','META','TEMPLATE','HEAD']);
  const ATTRS = ['role','type','aria-label','title','placeholder','alt','href','contenteditable','name'];
  let handle = 0;
  let budget = 6000;

  function ownText(el) {
    let t = '';
    for (const n of el.childNodes) {
      if (n.nodeType === Node.TEXT_NODE) t += ' ' + n.textContent;
    }
    return t.trim();
  }

  function capture(el, depth) {
    handle += 1;
    budget -= 1;
    el.setAttribute('data-r-node', String(handle));
    const r = el.getBoundingClientRect();
    const s = getComputedStyle(el);
    const attributes = {};
    for (const a of ATTRS) {
      if (el.hasAttribute(a)) attributes[a] = el.getAttribute(a);
    }
    const node = {
      handle,
      tag: el.tagName.toLowerCase(),
      attributes,
      rect: { x: r.x, y: r.y, width: r.width, height: r.height },
      style: {
        display: s.display,
        visibility: s.visibility,
        opacity: parseFloat(s.opacity),
        cursor: s.cursor
      },
      has_click_handler: typeof el.onclick === 'function' || el.hasAttribute('onclick'),
      text: ownText(el),
      children: []
    };
    if (depth < 50) {
      for (const child of el.children) {
        if (budget <= 0) break;
        if (SKIP.has(child.tagName.toUpperCase())) continue;
        node.children.push(capture(child, depth + 1));
      }
    }
    return node;
  }

  document.querySelectorAll('[data-r-node]').forEach(e => e.removeAttribute('data-r-node'));
  return JSON.stringify({
    url: location.href,
    scroll_y: window.scrollY,
    viewport: { width: window.innerWidth, height: window.innerHeight },
    root: capture(document.body, 0)
  });
})()
"#;

/// Executor for browser automation via agent-browser CLI
pub struct AgentBrowserDriver {
    /// Session name for isolation
    session_name: String,
    /// Whether to run in headed mode
    headed: bool,
    timeout: Duration,
    navigation_settle: Duration,
    action_settle: Duration,
}

impl AgentBrowserDriver {
    pub fn new(config: &BrowserConfig) -> Self {
        Self {
            session_name: config.session_name.clone(),
            headed: config.headed,
            timeout: Duration::from_millis(config.timeout_ms),
            navigation_settle: Duration::from_millis(config.navigation_settle_ms),
            action_settle: Duration::from_millis(config.action_settle_ms),
        }
    }

    /// Check if agent-browser is installed
    pub async fn is_available() -> bool {
        Command::new("agent-browser")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Run an agent-browser command
    async fn run_command(&self, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new("agent-browser");
        cmd.args(["--session", &self.session_name]);

        if self.headed {
            cmd.arg("--headed");
        }

        cmd.args(args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        debug!(command = ?args.first(), "agent-browser");

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                PilotError::browser(format!(
                    "agent-browser {} timed out after {:?}",
                    args.first().copied().unwrap_or_default(),
                    self.timeout
                ))
            })?
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    PilotError::AgentBrowserNotFound
                } else {
                    PilotError::browser(format!("Failed to run agent-browser: {}", e))
                }
            })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(PilotError::browser(format!(
                "agent-browser command failed: {}",
                stderr.trim()
            )))
        }
    }

    async fn eval(&self, script: &str) -> Result<String> {
        let output = self.run_command(&["eval", script]).await?;
        Ok(extract_eval_payload(&output))
    }

    /// URL of the page the session is on
    pub async fn current_url(&self) -> Result<String> {
        self.run_command(&["get", "url"])
            .await
            .map(|s| s.trim().to_string())
    }

    /// Close the browser session
    pub async fn close(&self) -> Result<()> {
        self.run_command(&["close"]).await.map(|_| ())
    }
}

impl Default for AgentBrowserDriver {
    fn default() -> Self {
        Self::new(&BrowserConfig::default())
    }
}

/// Translate `[N]` snapshot ids into attribute selectors; anything else
/// (CSS, `text=...`) passes through untouched
pub fn resolve_selector(selector: &str) -> String {
    let trimmed = selector.trim();
    if let Some(inner) = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        if !inner.is_empty() && inner.chars().all(|c| c.is_ascii_digit()) {
            return format!("[{}=\"{}\"]", ID_ATTRIBUTE, inner);
        }
    }
    trimmed.to_string()
}

/// `eval` prints either the raw value or a JSON-encoded string, depending on
/// the agent-browser version; unwrap one level of string quoting
pub fn extract_eval_payload(output: &str) -> String {
    let trimmed = output.trim();
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::String(inner)) => inner,
        Ok(Value::Object(map)) => match map.get("data").and_then(|d| d.get("result")) {
            Some(Value::String(inner)) => inner.clone(),
            Some(other) => other.to_string(),
            None => trimmed.to_string(),
        },
        _ => trimmed.to_string(),
    }
}

fn tagging_script(tags: &[ElementTag]) -> String {
    let pairs: Vec<Value> = tags
        .iter()
        .map(|t| serde_json::json!([t.handle, t.stable_id]))
        .collect();
    format!(
        "(() => {{ document.querySelectorAll('[{id}]').forEach(e => e.removeAttribute('{id}')); \
         let n = 0; for (const [h, id] of {pairs}) {{ \
         const el = document.querySelector('[{handle}=\"' + h + '\"]'); \
         if (el) {{ el.setAttribute('{id}', String(id)); n += 1; }} }} return n; }})()",
        id = ID_ATTRIBUTE,
        handle = HANDLE_ATTRIBUTE,
        pairs = Value::Array(pairs),
    )
}

#[async_trait]
impl BrowserDriver for AgentBrowserDriver {
    async fn navigate(&self, url: &str) -> Result<ToolResult> {
        self.run_command(&["open", url]).await?;
        tokio::time::sleep(self.navigation_settle).await;
        let landed = self.current_url().await.unwrap_or_else(|_| url.to_string());
        Ok(ToolResult::ok().with("url", landed))
    }

    async fn click(&self, selector: &str) -> Result<ToolResult> {
        self.run_command(&["click", &resolve_selector(selector)]).await?;
        tokio::time::sleep(self.action_settle).await;
        Ok(ToolResult::ok().with("message", format!("Clicked {}", selector)))
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<ToolResult> {
        self.run_command(&["type", &resolve_selector(selector), text])
            .await?;
        tokio::time::sleep(self.action_settle).await;
        Ok(ToolResult::ok().with("message", format!("Typed into {}", selector)))
    }

    async fn fill(&self, selector: &str, text: &str) -> Result<ToolResult> {
        self.run_command(&["fill", &resolve_selector(selector), text])
            .await?;
        tokio::time::sleep(self.action_settle).await;
        Ok(ToolResult::ok().with("message", format!("Filled {}", selector)))
    }

    async fn press_key(&self, key: &str) -> Result<ToolResult> {
        self.run_command(&["press", key]).await?;
        tokio::time::sleep(self.action_settle).await;
        Ok(ToolResult::ok().with("message", format!("Pressed {}", key)))
    }

    async fn scroll(&self, direction: ScrollDirection) -> Result<ToolResult> {
        match direction {
            ScrollDirection::Up | ScrollDirection::Down => {
                self.run_command(&["scroll", direction.as_str(), "600"]).await?;
            }
            ScrollDirection::Top => {
                self.eval("window.scrollTo(0, 0)").await?;
            }
            ScrollDirection::Bottom => {
                self.eval("window.scrollTo(0, document.body.scrollHeight)")
                    .await?;
            }
        }
        tokio::time::sleep(self.action_settle).await;
        Ok(ToolResult::ok().with("message", format!("Scrolled {}", direction.as_str())))
    }

    async fn wait(&self, seconds: f64) -> Result<ToolResult> {
        tokio::time::sleep(Duration::from_secs_f64(seconds.max(0.0))).await;
        Ok(ToolResult::ok().with("message", format!("Waited {}s", seconds)))
    }

    async fn go_back(&self) -> Result<ToolResult> {
        self.run_command(&["back"]).await?;
        tokio::time::sleep(self.navigation_settle).await;
        let url = self.current_url().await.unwrap_or_default();
        Ok(ToolResult::ok().with("url", url))
    }

    async fn hover(&self, selector: &str) -> Result<ToolResult> {
        self.run_command(&["hover", &resolve_selector(selector)]).await?;
        Ok(ToolResult::ok().with("message", format!("Hovered {}", selector)))
    }

    async fn capture_page(&self) -> Result<PageTree> {
        let payload = self.eval(CAPTURE_JS).await?;
        serde_json::from_str(&payload)
            .map_err(|e| PilotError::browser(format!("Could not read page capture: {}", e)))
    }

    async fn tag_elements(&self, tags: &[ElementTag]) -> Result<()> {
        self.eval(&tagging_script(tags)).await.map(|_| ())
    }

    async fn is_alive(&self) -> bool {
        self.current_url().await.is_ok()
    }
}
