//! Browser driver collaborator
//!
//! The capabilities the dispatcher needs from a live browser page. Every
//! action returns a `{success, ...}` [`ToolResult`]; an `Err` means the
//! capability itself blew up and is converted to a failed result by the
//! dispatcher.

use async_trait::async_trait;

use crate::core::{Result, ToolResult};
use crate::tools::browser::snapshot::{ElementTag, PageTree};
use crate::tools::schema::ScrollDirection;

#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Load `url` (already normalized to carry a scheme)
    async fn navigate(&self, url: &str) -> Result<ToolResult>;

    /// Click the element matched by `selector`
    async fn click(&self, selector: &str) -> Result<ToolResult>;

    /// Type `text` into the element, keystroke by keystroke
    async fn type_text(&self, selector: &str, text: &str) -> Result<ToolResult>;

    /// Replace the element's value with `text`
    async fn fill(&self, selector: &str, text: &str) -> Result<ToolResult>;

    async fn press_key(&self, key: &str) -> Result<ToolResult>;

    async fn scroll(&self, direction: ScrollDirection) -> Result<ToolResult>;

    async fn wait(&self, seconds: f64) -> Result<ToolResult>;

    async fn go_back(&self) -> Result<ToolResult>;

    async fn hover(&self, selector: &str) -> Result<ToolResult>;

    /// Serialize the rendered page for the snapshot builder
    async fn capture_page(&self) -> Result<PageTree>;

    /// Clear ids from the previous snapshot and write the new ones onto the
    /// page, so `[N]` selectors resolve to the element that was labelled N
    async fn tag_elements(&self, tags: &[ElementTag]) -> Result<()>;

    /// Whether the page is still open and responsive
    async fn is_alive(&self) -> bool;
}
