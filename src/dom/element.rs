use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tags whose subtrees never contribute interactable elements or text
const SKIPPED_TAGS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Tags that can be the target of a `<label for=...>`
const LABELABLE_TAGS: [&str; 5] = ["input", "select", "textarea", "button", "meter"];

/// Represents a DOM element node as captured from the page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElementNode {
    /// HTML tag name (e.g., "div", "button", "input")
    pub tag_name: String,

    /// Element attributes (e.g., id, class, href, etc.)
    #[serde(default)]
    pub attributes: HashMap<String, String>,

    /// Text owned directly by the element (not its descendants)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,

    /// Child elements, in document order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ElementNode>,

    /// Whether the element is rendered (non-zero box, not hidden by style)
    #[serde(default)]
    pub is_visible: bool,

    /// Whether the element is interactive (clickable, input, etc.)
    #[serde(default)]
    pub is_interactive: bool,

    /// Bounding box relative to the viewport, as reported by the page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
}

/// Bounding box coordinates for an element
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ElementNode {
    /// Create a new ElementNode
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            attributes: HashMap::new(),
            text_content: None,
            children: Vec::new(),
            is_visible: false,
            is_interactive: false,
            bounding_box: None,
        }
    }

    /// Builder method: add a single attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_attribute(key, value);
        self
    }

    /// Builder method: set text content
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text_content = Some(text.into());
        self
    }

    /// Builder method: set children
    pub fn with_children(mut self, children: Vec<ElementNode>) -> Self {
        self.children = children;
        self
    }

    /// Builder method: append a child
    pub fn with_child(mut self, child: ElementNode) -> Self {
        self.children.push(child);
        self
    }

    /// Builder method: set visibility
    pub fn with_visibility(mut self, visible: bool) -> Self {
        self.is_visible = visible;
        self
    }

    /// Builder method: set bounding box
    pub fn with_bounding_box(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.bounding_box = Some(BoundingBox { x, y, width, height });
        self
    }

    /// Add a single attribute
    pub fn add_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Get attribute value by key
    pub fn get_attribute(&self, key: &str) -> Option<&String> {
        self.attributes.get(key)
    }

    /// Get element ID
    pub fn id(&self) -> Option<&String> {
        self.attributes.get("id").filter(|id| !id.is_empty())
    }

    /// Check if element is a specific tag
    pub fn is_tag(&self, tag: &str) -> bool {
        self.tag_name.eq_ignore_ascii_case(tag)
    }

    /// Lower-cased `type` attribute of an input
    pub fn input_type(&self) -> Option<String> {
        self.get_attribute("type").map(|t| t.to_ascii_lowercase())
    }

    pub fn is_file_input(&self) -> bool {
        self.is_tag("input") && self.input_type().as_deref() == Some("file")
    }

    pub fn is_radio(&self) -> bool {
        self.is_tag("input") && self.input_type().as_deref() == Some("radio")
    }

    /// Whether a `<label>` can be associated with this element
    pub fn is_labelable(&self) -> bool {
        LABELABLE_TAGS.iter().any(|&tag| self.is_tag(tag))
            && !(self.is_tag("input") && self.input_type().as_deref() == Some("hidden"))
    }

    /// Whether the subtree should be ignored entirely
    pub fn is_skipped(&self) -> bool {
        SKIPPED_TAGS.iter().any(|&tag| self.is_tag(tag))
    }

    pub fn is_disabled(&self) -> bool {
        self.attributes.contains_key("disabled")
            || self
                .get_attribute("aria-disabled")
                .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }

    /// Determine if this element should be considered interactive
    pub fn compute_interactivity(&mut self) {
        let interactive_tags = ["button", "a", "input", "select", "textarea", "label", "summary"];

        let tag_is_interactive = interactive_tags.iter().any(|&tag| self.is_tag(tag));

        // Inline event handlers (onclick, onmousedown, ...)
        let has_event_handler = self.attributes.keys().any(|k| k.starts_with("on"));

        let has_clickable_role = self.get_attribute("role").is_some_and(|r| {
            ["button", "link", "tab", "menuitem", "checkbox", "radio", "option"].contains(&r.as_str())
        });

        let is_editable = self
            .get_attribute("contenteditable")
            .is_some_and(|v| v.is_empty() || v == "true");

        let is_hidden_input = self.is_tag("input") && self.input_type().as_deref() == Some("hidden");

        self.is_interactive =
            (tag_is_interactive || has_event_handler || has_clickable_role || is_editable)
                && !is_hidden_input;
    }

    /// Text of the element and all of its descendants, whitespace-normalized
    pub fn inner_text(&self) -> String {
        let mut parts = Vec::new();
        self.collect_text(&mut parts);
        normalize_text(&parts.join(" "))
    }

    fn collect_text<'a>(&'a self, parts: &mut Vec<&'a str>) {
        if self.is_skipped() {
            return;
        }
        if let Some(text) = &self.text_content {
            parts.push(text);
        }
        for child in &self.children {
            child.collect_text(parts);
        }
    }

    /// Depth-first search of this subtree for the first node matching `pred`.
    /// Returns the node and its child-position path relative to `self`.
    pub fn find_descendant(&self, pred: &dyn Fn(&ElementNode) -> bool) -> Option<(&ElementNode, Vec<usize>)> {
        for (i, child) in self.children.iter().enumerate() {
            if child.is_skipped() {
                continue;
            }
            if pred(child) {
                return Some((child, vec![i]));
            }
            if let Some((found, mut path)) = child.find_descendant(pred) {
                path.insert(0, i);
                return Some((found, path));
            }
        }
        None
    }
}

impl BoundingBox {
    /// Create a new BoundingBox
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Check if the bounding box is visible (has non-zero dimensions)
    pub fn is_visible(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    /// Whether the box intersects the vertical window `[-expansion, viewport_height + expansion]`
    pub fn is_within_window(&self, viewport_height: f64, expansion: f64) -> bool {
        self.y + self.height >= -expansion && self.y <= viewport_height + expansion
    }
}

/// Collapse runs of whitespace and trim
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize label text for matching: collapsed whitespace, trailing `:` and `*` removed
pub fn normalize_label(text: &str) -> String {
    normalize_text(text)
        .trim_end_matches(|c: char| c == ':' || c == '*' || c.is_whitespace())
        .to_string()
}

/// Truncate on a char boundary, appending "..." when shortened
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_node_creation() {
        let element = ElementNode::new("button")
            .with_attribute("id", "test-id")
            .with_text("Click me")
            .with_visibility(true);

        assert_eq!(element.tag_name, "button");
        assert_eq!(element.id(), Some(&"test-id".to_string()));
        assert_eq!(element.text_content, Some("Click me".to_string()));
        assert!(element.is_visible);
    }

    #[test]
    fn test_compute_interactivity() {
        let mut button = ElementNode::new("button");
        button.compute_interactivity();
        assert!(button.is_interactive);

        let mut div = ElementNode::new("div");
        div.compute_interactivity();
        assert!(!div.is_interactive);

        let mut clickable_div = ElementNode::new("div").with_attribute("onclick", "alert('hi')");
        clickable_div.compute_interactivity();
        assert!(clickable_div.is_interactive);

        let mut role_radio = ElementNode::new("div").with_attribute("role", "radio");
        role_radio.compute_interactivity();
        assert!(role_radio.is_interactive);

        let mut hidden = ElementNode::new("input").with_attribute("type", "hidden");
        hidden.compute_interactivity();
        assert!(!hidden.is_interactive);
    }

    #[test]
    fn test_inner_text_skips_scripts() {
        let node = ElementNode::new("label")
            .with_text("  Your")
            .with_child(ElementNode::new("span").with_text("Name\n"))
            .with_child(ElementNode::new("script").with_text("var x = 1;"));

        assert_eq!(node.inner_text(), "Your Name");
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("  Full   name * "), "Full name");
        assert_eq!(normalize_label("Email:"), "Email");
        assert_eq!(normalize_label("Plain"), "Plain");
    }

    #[test]
    fn test_find_descendant_returns_path() {
        let node = ElementNode::new("div")
            .with_child(ElementNode::new("span"))
            .with_child(
                ElementNode::new("div")
                    .with_child(ElementNode::new("input").with_attribute("type", "file")),
            );

        let (found, path) = node.find_descendant(&|n| n.is_file_input()).unwrap();
        assert!(found.is_file_input());
        assert_eq!(path, vec![1, 0]);
    }

    #[test]
    fn test_disabled_detection() {
        assert!(ElementNode::new("button").with_attribute("disabled", "").is_disabled());
        assert!(ElementNode::new("div").with_attribute("aria-disabled", "true").is_disabled());
        assert!(!ElementNode::new("button").is_disabled());
    }

    #[test]
    fn test_bounding_box_window() {
        let bbox = BoundingBox::new(0.0, 1200.0, 100.0, 20.0);
        assert!(bbox.is_visible());
        assert!(!bbox.is_within_window(800.0, 0.0));
        assert!(bbox.is_within_window(800.0, 500.0));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo wörld", 8), "héllo...");
        assert_eq!(truncate("short", 10), "short");
    }

    #[test]
    fn test_serialization() {
        let element = ElementNode::new("button").with_text("Click").with_visibility(true);

        let json = serde_json::to_string(&element).unwrap();
        let deserialized: ElementNode = serde_json::from_str(&json).unwrap();

        assert_eq!(element, deserialized);
    }
}
