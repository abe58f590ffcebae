use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Information needed to locate an element and reason about it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElementDescriptor {
    /// CSS selector for the element
    pub css_selector: String,

    /// Element's tag name
    pub tag_name: String,

    /// Element's ID attribute (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Attributes relevant to the decision maker (type, name, role, value, ...)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, String>,

    /// Element's text content (truncated for display)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Normalized text of the associated `<label>`, aria-label or aria-labelledby
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Normalized label of the enclosing group (fieldset legend, radiogroup)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_label: Option<String>,

    /// File input associated with this control (itself, a descendant or a sibling)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_input: Option<Box<ElementDescriptor>>,
}

impl ElementDescriptor {
    /// Create a new ElementDescriptor with CSS selector
    pub fn new(css_selector: impl Into<String>, tag_name: impl Into<String>) -> Self {
        Self {
            css_selector: css_selector.into(),
            tag_name: tag_name.into(),
            id: None,
            attributes: HashMap::new(),
            text: None,
            label: None,
            group_label: None,
            file_input: None,
        }
    }

    /// Builder method: set ID
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Builder method: set text content
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Builder method: set label text
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Builder method: set group label text
    pub fn with_group_label(mut self, label: impl Into<String>) -> Self {
        self.group_label = Some(label.into());
        self
    }

    /// Builder method: add an attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Builder method: attach the associated file input
    pub fn with_file_input(mut self, file_input: ElementDescriptor) -> Self {
        self.file_input = Some(Box::new(file_input));
        self
    }

    /// The file input to use for uploads, distinct from the visible control when
    /// the control is e.g. a styled button
    pub fn file_upload_element(&self) -> Option<&ElementDescriptor> {
        self.file_input.as_deref()
    }

    pub fn is_tag(&self, tag: &str) -> bool {
        self.tag_name.eq_ignore_ascii_case(tag)
    }

    pub fn is_radio(&self) -> bool {
        self.is_tag("input")
            && self
                .attributes
                .get("type")
                .is_some_and(|t| t.eq_ignore_ascii_case("radio"))
            || self.attributes.get("role").is_some_and(|r| r == "radio")
    }

    /// Text the element presents to a user: its label, else its own text
    pub fn display_text(&self) -> Option<&str> {
        self.label.as_deref().or(self.text.as_deref())
    }
}

/// Map of element indices to their descriptors.
/// Uses IndexMap to preserve document order.
#[derive(Debug, Clone, Default)]
pub struct SelectorMap {
    map: IndexMap<usize, ElementDescriptor>,

    /// Next available index
    next_index: usize,
}

impl SelectorMap {
    /// Create a new empty SelectorMap
    pub fn new() -> Self {
        Self {
            map: IndexMap::new(),
            next_index: 0,
        }
    }

    /// Register a new element and return its assigned index
    pub fn register(&mut self, descriptor: ElementDescriptor) -> usize {
        let index = self.next_index;
        self.map.insert(index, descriptor);
        self.next_index += 1;
        index
    }

    /// Get descriptor by index
    pub fn get(&self, index: usize) -> Option<&ElementDescriptor> {
        self.map.get(&index)
    }

    /// Get the number of registered elements
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Check if the map is empty
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterate over all (index, descriptor) pairs in document order
    pub fn iter(&self) -> impl Iterator<Item = (&usize, &ElementDescriptor)> {
        self.map.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_descriptor() {
        let descriptor = ElementDescriptor::new("#my-button", "button")
            .with_id("my-button")
            .with_text("Click me");

        assert_eq!(descriptor.css_selector, "#my-button");
        assert_eq!(descriptor.tag_name, "button");
        assert_eq!(descriptor.id, Some("my-button".to_string()));
        assert_eq!(descriptor.display_text(), Some("Click me"));
    }

    #[test]
    fn test_label_takes_precedence_in_display_text() {
        let descriptor = ElementDescriptor::new("#name", "input")
            .with_text("ignored")
            .with_label("Name");
        assert_eq!(descriptor.display_text(), Some("Name"));
    }

    #[test]
    fn test_file_upload_element() {
        let hidden = ElementDescriptor::new("body > div:nth-child(1) > input:nth-child(2)", "input")
            .with_attribute("type", "file");
        let button = ElementDescriptor::new("#upload", "button").with_file_input(hidden.clone());

        assert_eq!(button.file_upload_element(), Some(&hidden));
        assert!(ElementDescriptor::new("#x", "button").file_upload_element().is_none());
    }

    #[test]
    fn test_radio_detection() {
        let radio = ElementDescriptor::new("#a", "input").with_attribute("type", "radio");
        let aria = ElementDescriptor::new("#b", "div").with_attribute("role", "radio");
        let text = ElementDescriptor::new("#c", "input").with_attribute("type", "text");
        assert!(radio.is_radio());
        assert!(aria.is_radio());
        assert!(!text.is_radio());
    }

    #[test]
    fn test_selector_map_register() {
        let mut map = SelectorMap::new();

        let idx1 = map.register(ElementDescriptor::new("#btn1", "button"));
        let idx2 = map.register(ElementDescriptor::new("#btn2", "button"));

        assert_eq!(idx1, 0);
        assert_eq!(idx2, 1);
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(1).map(|d| d.css_selector.as_str()), Some("#btn2"));
        assert!(map.get(2).is_none());
    }

    #[test]
    fn test_selector_map_iteration_preserves_order() {
        let mut map = SelectorMap::new();

        map.register(ElementDescriptor::new("#one", "div"));
        map.register(ElementDescriptor::new("#two", "div"));
        map.register(ElementDescriptor::new("#three", "div"));

        let entries: Vec<_> = map.iter().map(|(i, d)| (*i, d.css_selector.as_str())).collect();
        assert_eq!(entries, vec![(0, "#one"), (1, "#two"), (2, "#three")]);
    }

    #[test]
    fn test_descriptor_serialization() {
        let descriptor = ElementDescriptor::new("#test", "input")
            .with_id("test")
            .with_label("Email")
            .with_file_input(ElementDescriptor::new("#file", "input"));

        let json = serde_json::to_string(&descriptor).unwrap();
        let deserialized: ElementDescriptor = serde_json::from_str(&json).unwrap();

        assert_eq!(descriptor, deserialized);
    }
}
