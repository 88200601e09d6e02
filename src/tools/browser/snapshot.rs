//! Page snapshot builder
//!
//! Turns a serialized render tree ([`PageTree`]) into a bounded, indented text
//! report where every interactive element carries a small integer id. The
//! build is a pure function of the page and a [`SnapshotConfig`]; ids start at
//! 1 on every build and mean nothing once the next snapshot is taken.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::core::config::SnapshotConfig;

/// Rendered page as captured by a browser driver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageTree {
    pub url: String,
    #[serde(default)]
    pub scroll_y: f64,
    #[serde(default)]
    pub viewport: Viewport,
    pub root: DomNode,
}

impl PageTree {
    /// Build a tree and number node handles in document order, starting at 1
    pub fn new(url: impl Into<String>, root: DomNode) -> Self {
        let mut tree = Self {
            url: url.into(),
            scroll_y: 0.0,
            viewport: Viewport::default(),
            root,
        };
        let mut next = 1;
        number_handles(&mut tree.root, &mut next);
        tree
    }

    pub fn with_scroll(mut self, scroll_y: f64) -> Self {
        self.scroll_y = scroll_y;
        self
    }
}

fn number_handles(node: &mut DomNode, next: &mut u64) {
    node.handle = *next;
    *next += 1;
    for child in &mut node.children {
        number_handles(child, next);
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 900.0,
        }
    }
}

/// Bounding box relative to the viewport's top-left corner
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

/// The computed style properties the builder looks at
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComputedStyle {
    pub display: String,
    pub visibility: String,
    pub opacity: f64,
    pub cursor: String,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: "block".to_string(),
            visibility: "visible".to_string(),
            opacity: 1.0,
            cursor: "auto".to_string(),
        }
    }
}

impl ComputedStyle {
    fn is_hidden(&self) -> bool {
        self.display == "none" || self.visibility == "hidden" || self.opacity < 0.01
    }
}

/// One element of the render tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomNode {
    /// Driver-assigned handle used to write ids back onto the page
    #[serde(default)]
    pub handle: u64,
    pub tag: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub rect: Rect,
    #[serde(default)]
    pub style: ComputedStyle,
    /// Whether a click listener is attached
    #[serde(default)]
    pub has_click_handler: bool,
    /// Text of the element's own text nodes, not its descendants'
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub children: Vec<DomNode>,
}

impl DomNode {
    /// A visible element with a default-sized box
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            handle: 0,
            tag: tag.into(),
            attributes: BTreeMap::new(),
            rect: Rect::new(0.0, 0.0, 120.0, 24.0),
            style: ComputedStyle::default(),
            has_click_handler: false,
            text: String::new(),
            children: Vec::new(),
        }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    pub fn rect(mut self, rect: Rect) -> Self {
        self.rect = rect;
        self
    }

    pub fn style(mut self, style: ComputedStyle) -> Self {
        self.style = style;
        self
    }

    pub fn clickable(mut self) -> Self {
        self.has_click_handler = true;
        self
    }

    pub fn child(mut self, child: DomNode) -> Self {
        self.children.push(child);
        self
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// How the model can interact with an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    Button,
    Link,
    Input,
    Select,
    Option,
    None,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::Button => "button",
            InteractionKind::Link => "link",
            InteractionKind::Input => "input",
            InteractionKind::Select => "select",
            InteractionKind::Option => "option",
            InteractionKind::None => "none",
        }
    }

    pub fn is_interactive(&self) -> bool {
        !matches!(self, InteractionKind::None)
    }
}

/// One line of the snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotElement {
    /// Present only for interactive elements
    pub stable_id: Option<u32>,
    pub handle: u64,
    pub tag: String,
    pub kind: InteractionKind,
    pub text: String,
    pub label: Option<String>,
    pub image_alt: Option<String>,
    /// Nearby text attached to icon-only controls
    pub context_hint: Option<String>,
    pub depth: usize,
}

/// Pairs a page handle with the id it was given in a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementTag {
    pub handle: u64,
    pub stable_id: u32,
}

/// Result of one build
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub url: String,
    pub scroll_y: f64,
    pub elements: Vec<SnapshotElement>,
    /// Elements that did not fit under the item cap
    pub truncated: usize,
    #[serde(skip)]
    indent: bool,
}

const EMPTY_PAGE: &str =
    "Page seems empty (scripts may still be loading). Wait, then call get_page_content again.";

impl Snapshot {
    /// Interactive elements in id order
    pub fn interactive(&self) -> impl Iterator<Item = &SnapshotElement> {
        self.elements.iter().filter(|e| e.stable_id.is_some())
    }

    /// Look up an element by the id shown to the model
    pub fn find(&self, stable_id: u32) -> Option<&SnapshotElement> {
        self.elements
            .iter()
            .find(|e| e.stable_id == Some(stable_id))
    }

    /// Handle/id pairs to write back onto the page
    pub fn assignments(&self) -> Vec<ElementTag> {
        self.elements
            .iter()
            .filter_map(|e| {
                e.stable_id.map(|stable_id| ElementTag {
                    handle: e.handle,
                    stable_id,
                })
            })
            .collect()
    }

    /// Text report for the model
    pub fn render(&self) -> String {
        let mut out = format!("URL: {}\nSCROLL: {}\n\n", self.url, self.scroll_y.round() as i64);

        if self.elements.is_empty() {
            out.push_str(EMPTY_PAGE);
            return out;
        }

        for element in &self.elements {
            if self.indent {
                out.push_str(&"  ".repeat(element.depth));
            }
            if let Some(id) = element.stable_id {
                let _ = write!(out, "[{}] ", id);
            }
            let _ = write!(out, "<{}>", element.tag);
            if element.kind.is_interactive() && element.kind.as_str() != element.tag {
                let _ = write!(out, " {}", element.kind.as_str());
            }
            if !element.text.is_empty() {
                let _ = write!(out, " \"{}\"", element.text);
            }
            if let Some(label) = &element.label {
                let _ = write!(out, " [Label: {}]", label);
            }
            if let Some(alt) = &element.image_alt {
                let _ = write!(out, " [Img: {}]", alt);
            }
            if let Some(hint) = &element.context_hint {
                let _ = write!(out, " (context: {})", hint);
            }
            out.push('\n');
        }

        if self.truncated > 0 {
            let _ = writeln!(out, "... {} more elements not shown", self.truncated);
        }
        out
    }
}

/// Collapse whitespace runs and cut to `max_chars`
pub fn clean_text(raw: &str, max_chars: usize) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    match collapsed.char_indices().nth(max_chars) {
        Some((cut, _)) => collapsed[..cut].trim_end().to_string(),
        None => collapsed,
    }
}

/// Text with no letters or digits (icons, arrows, "×") says nothing on its own
fn is_generic(text: &str) -> bool {
    !text.chars().any(char::is_alphanumeric)
}

/// Geometry and style visibility check
pub fn is_visible(node: &DomNode, viewport: &Viewport, config: &SnapshotConfig) -> bool {
    let rect = &node.rect;
    if rect.width < 1.0 || rect.height < 1.0 {
        return false;
    }
    if rect.bottom() < -config.margin_above || rect.y > viewport.height + config.margin_below {
        return false;
    }
    // Off-canvas horizontally, like skip links parked at left: -9999px
    if rect.x + rect.width < 0.0 || rect.x > viewport.width {
        return false;
    }
    !node.style.is_hidden()
}

/// Tag-, role- and cursor-based interactivity heuristic.
///
/// `cursor: pointer` is inherited, so it only counts when the parent does
/// not already have it.
pub fn classify(node: &DomNode, parent: Option<&DomNode>) -> InteractionKind {
    let tag = node.tag.to_ascii_lowercase();
    match tag.as_str() {
        "a" => return InteractionKind::Link,
        "button" | "summary" => return InteractionKind::Button,
        "textarea" => return InteractionKind::Input,
        "select" => return InteractionKind::Select,
        "option" => return InteractionKind::Option,
        "input" => {
            let input_type = node.attribute("type").unwrap_or("text").to_ascii_lowercase();
            return match input_type.as_str() {
                "hidden" => InteractionKind::None,
                "submit" | "button" | "reset" | "image" => InteractionKind::Button,
                _ => InteractionKind::Input,
            };
        }
        _ => {}
    }

    if let Some(role) = node.attribute("role") {
        match role.to_ascii_lowercase().as_str() {
            "button" | "menuitem" | "tab" | "checkbox" | "radio" | "switch" => {
                return InteractionKind::Button
            }
            "link" => return InteractionKind::Link,
            "textbox" | "searchbox" | "spinbutton" => return InteractionKind::Input,
            "combobox" | "listbox" => return InteractionKind::Select,
            "option" | "menuitemradio" | "menuitemcheckbox" | "treeitem" => {
                return InteractionKind::Option
            }
            _ => {}
        }
    }

    if matches!(node.attribute("contenteditable"), Some("" | "true")) {
        return InteractionKind::Input;
    }

    let inherited_pointer = parent.is_some_and(|p| p.style.cursor == "pointer");
    if node.has_click_handler || (node.style.cursor == "pointer" && !inherited_pointer) {
        return InteractionKind::Button;
    }

    InteractionKind::None
}

/// Recursion guard for raw DOM nesting; `max_depth` bounds the printed depth
const MAX_TREE_LEVEL: usize = 256;

/// Builds snapshots from page trees
#[derive(Debug, Clone, Default)]
pub struct SnapshotBuilder {
    config: SnapshotConfig,
}

struct Walk {
    elements: Vec<SnapshotElement>,
    next_id: u32,
    truncated: usize,
}

impl SnapshotBuilder {
    pub fn new(config: SnapshotConfig) -> Self {
        Self { config }
    }

    /// Single pass over the tree
    pub fn build(&self, page: &PageTree) -> Snapshot {
        let mut walk = Walk {
            elements: Vec::new(),
            next_id: 1,
            truncated: 0,
        };
        let mut ancestors = Vec::new();
        self.visit(&page.root, 0, 0, &page.viewport, &mut ancestors, &mut walk);

        Snapshot {
            url: page.url.clone(),
            scroll_y: page.scroll_y,
            elements: walk.elements,
            truncated: walk.truncated,
            indent: self.config.indent,
        }
    }

    fn visit<'a>(
        &self,
        node: &'a DomNode,
        level: usize,
        depth: usize,
        viewport: &Viewport,
        ancestors: &mut Vec<&'a DomNode>,
        walk: &mut Walk,
    ) {
        if depth > self.config.max_depth
            || level > MAX_TREE_LEVEL
            || !is_visible(node, viewport, &self.config)
        {
            return;
        }

        let cfg = &self.config;
        let kind = classify(node, ancestors.last().copied());
        let text = clean_text(&node.text, cfg.max_text_len);
        let label = ["aria-label", "title", "placeholder"]
            .iter()
            .find_map(|name| node.attribute(name))
            .map(|raw| clean_text(raw, cfg.max_text_len))
            .filter(|l| !l.is_empty());
        let is_img = node.tag.eq_ignore_ascii_case("img");

        let should_show = kind.is_interactive()
            || text.chars().count() > 1
            || label.as_ref().is_some_and(|l| l.chars().count() > 1)
            || is_img;

        if should_show {
            if walk.elements.len() >= cfg.max_items {
                walk.truncated += 1;
            } else {
                let stable_id = kind.is_interactive().then(|| {
                    let id = walk.next_id;
                    walk.next_id += 1;
                    id
                });
                let needs_context = kind.is_interactive()
                    && is_generic(&text)
                    && label.as_deref().map_or(true, is_generic);
                let context_hint = if needs_context {
                    self.backfill(ancestors, &text)
                } else {
                    None
                };
                let image_alt = if is_img {
                    node.attribute("alt")
                        .map(|alt| clean_text(alt, cfg.max_text_len))
                        .filter(|alt| !alt.is_empty())
                } else {
                    None
                };

                walk.elements.push(SnapshotElement {
                    stable_id,
                    handle: node.handle,
                    tag: node.tag.to_ascii_lowercase(),
                    kind,
                    text,
                    label,
                    image_alt,
                    context_hint,
                    depth,
                });
            }
        }

        // Containers that print nothing do not add a nesting level.
        let child_depth = if should_show { depth + 1 } else { depth };
        ancestors.push(node);
        for child in &node.children {
            self.visit(child, level + 1, child_depth, viewport, ancestors, walk);
        }
        ancestors.pop();
    }

    /// Nearest ancestor text run, minus the element's own text
    fn backfill(&self, ancestors: &[&DomNode], own_text: &str) -> Option<String> {
        let budget = self.config.max_text_len * 4;
        ancestors
            .iter()
            .rev()
            .take(self.config.ancestor_climb)
            .find_map(|ancestor| {
                let mut raw = String::new();
                collect_text(ancestor, budget, &mut raw);
                let mut full = clean_text(&raw, budget);
                if !own_text.is_empty() {
                    full = full.replacen(own_text, " ", 1);
                }
                let hint = clean_text(&full, self.config.max_text_len);
                (hint.chars().count() > 2 && !is_generic(&hint)).then_some(hint)
            })
    }
}

fn collect_text(node: &DomNode, budget: usize, out: &mut String) {
    if out.len() >= budget || node.style.is_hidden() {
        return;
    }
    if !node.text.trim().is_empty() {
        out.push(' ');
        out.push_str(node.text.trim());
    }
    for child in &node.children {
        collect_text(child, budget, out);
    }
}
