use crate::dom::element::{ElementNode, normalize_label, truncate};
use crate::dom::selector_map::{ElementDescriptor, SelectorMap};
use crate::dom::snapshot::PageSnapshot;
use crate::error::{AgentError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Attributes copied onto descriptors and shown to the decision maker
const KEPT_ATTRIBUTES: [&str; 11] = [
    "type",
    "name",
    "role",
    "placeholder",
    "href",
    "value",
    "checked",
    "aria-checked",
    "aria-expanded",
    "title",
    "alt",
];

/// Handle to an indexed element, valid only for the index generation it was
/// issued under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle {
    pub index: usize,
    pub generation: u64,
}

impl ElementHandle {
    pub fn new(index: usize, generation: u64) -> Self {
        Self { index, generation }
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]@{}", self.index, self.generation)
    }
}

/// Options controlling which elements are indexed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct IndexOptions {
    /// Pixels above and below the viewport still considered in view; -1 indexes the whole page
    pub viewport_expansion: i64,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            viewport_expansion: 500,
        }
    }
}

/// Per-step snapshot mapping integer handles to interactable page elements
#[derive(Debug, Clone)]
pub struct ElementIndex {
    generation: u64,

    url: String,

    title: String,

    /// Map of indices to element descriptors
    pub selector_map: SelectorMap,
}

/// Per-subtree context inherited while walking the tree
#[derive(Clone, Default)]
struct Scope {
    wrapping_label: Option<String>,
    group_label: Option<String>,
}

struct Walker<'a> {
    label_for: HashMap<&'a str, String>,
    text_by_id: HashMap<&'a str, String>,
    id_counts: HashMap<&'a str, usize>,
    viewport_height: f64,
    options: IndexOptions,
    registered: Vec<ElementDescriptor>,
}

impl ElementIndex {
    /// Build a fresh index from a page snapshot.
    ///
    /// Fails with [`AgentError::StaleIndex`] when the page is mid-navigation or
    /// detached; callers rebuild from a new snapshot rather than retrying.
    pub fn build(snapshot: PageSnapshot, generation: u64, options: &IndexOptions) -> Result<Self> {
        if !snapshot.ready_state.is_settled() {
            return Err(AgentError::StaleIndex(format!(
                "page {} is {:?}",
                snapshot.url, snapshot.ready_state
            )));
        }

        let PageSnapshot {
            url,
            title,
            viewport,
            mut root,
            ..
        } = snapshot;

        mark_interactivity(&mut root);

        let registered = {
            let mut walker = Walker::new(&root, viewport.height, *options);
            let root_path = root.tag_name.to_ascii_lowercase();
            walker.walk(
                &root,
                std::slice::from_ref(&root),
                0,
                &root_path,
                &mut Vec::new(),
                &Scope::default(),
            );
            walker.registered
        };

        let mut selector_map = SelectorMap::new();
        for descriptor in registered {
            selector_map.register(descriptor);
        }

        log::debug!(
            "Built element index generation {} for {} with {} elements",
            generation,
            url,
            selector_map.len()
        );

        Ok(Self {
            generation,
            url,
            title,
            selector_map,
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Number of indexed elements
    pub fn len(&self) -> usize {
        self.selector_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selector_map.is_empty()
    }

    /// Handle for an index under this generation
    pub fn handle(&self, index: usize) -> ElementHandle {
        ElementHandle::new(index, self.generation)
    }

    /// Resolve a handle, checking the generation before the lookup
    pub fn resolve(&self, handle: ElementHandle) -> Result<&ElementDescriptor> {
        if handle.generation != self.generation {
            return Err(AgentError::StaleHandle {
                handle,
                current: self.generation,
            });
        }
        self.selector_map
            .get(handle.index)
            .ok_or_else(|| AgentError::ElementNotFound(format!("No element with index {}", handle.index)))
    }

    /// Iterate over (handle, descriptor) pairs in document order
    pub fn iter(&self) -> impl Iterator<Item = (ElementHandle, &ElementDescriptor)> {
        self.selector_map
            .iter()
            .map(|(idx, d)| (ElementHandle::new(*idx, self.generation), d))
    }

    /// Find the element whose label matches `text`: exact match first, then a
    /// case-insensitive substring match. More than one match at the deciding
    /// tier fails with [`AgentError::AmbiguousLabel`].
    pub fn find_by_label_text(&self, text: &str) -> Result<(ElementHandle, &ElementDescriptor)> {
        let candidates: Vec<_> = self
            .iter()
            .filter_map(|(handle, d)| d.label.as_deref().map(|label| ((handle, d), label)))
            .collect();

        match_text(&candidates, text)?
            .ok_or_else(|| AgentError::ElementNotFound(format!("No element labeled '{}'", text)))
    }

    /// Render the index as one line per element for the decision prompt
    pub fn describe(&self) -> String {
        self.selector_map
            .iter()
            .map(|(idx, d)| format!("[{}]{}", idx, describe_descriptor(d)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Exact-then-substring text matching shared by label and radio lookups.
///
/// Returns `Ok(None)` when nothing matches at either tier.
pub fn match_text<T: Clone>(candidates: &[(T, &str)], query: &str) -> Result<Option<T>> {
    let wanted = normalize_label(query);

    let exact: Vec<_> = candidates.iter().filter(|(_, text)| *text == wanted).collect();
    if let Some(found) = pick_single(&exact, &wanted)? {
        return Ok(Some(found));
    }

    let lowered = wanted.to_lowercase();
    let partial: Vec<_> = candidates
        .iter()
        .filter(|(_, text)| text.to_lowercase().contains(&lowered))
        .collect();
    pick_single(&partial, &wanted)
}

fn pick_single<T: Clone>(matches: &[&(T, &str)], wanted: &str) -> Result<Option<T>> {
    match matches {
        [] => Ok(None),
        [(value, _)] => Ok(Some(value.clone())),
        many => Err(AgentError::AmbiguousLabel {
            label: wanted.to_string(),
            candidates: many.iter().map(|(_, text)| text.to_string()).collect(),
        }),
    }
}

fn describe_descriptor(d: &ElementDescriptor) -> String {
    let mut out = format!("<{}", d.tag_name);
    for key in KEPT_ATTRIBUTES {
        if let Some(value) = d.attributes.get(key) {
            out.push_str(&format!(" {}=\"{}\"", key, truncate(value, 40)));
        }
    }
    if let Some(label) = &d.label {
        out.push_str(&format!(" label=\"{}\"", label));
    }
    if let Some(group) = &d.group_label {
        out.push_str(&format!(" group=\"{}\"", group));
    }
    if d.file_input.is_some() {
        out.push_str(" upload");
    }
    match &d.text {
        Some(text) => out.push_str(&format!(">{}</{}>", text, d.tag_name)),
        None => out.push_str(" />"),
    }
    out
}

fn mark_interactivity(node: &mut ElementNode) {
    node.compute_interactivity();
    for child in &mut node.children {
        mark_interactivity(child);
    }
}

fn child_path(parent_path: &str, child: &ElementNode, position: usize) -> String {
    format!(
        "{} > {}:nth-child({})",
        parent_path,
        child.tag_name.to_ascii_lowercase(),
        position + 1
    )
}

fn is_css_identifier(id: &str) -> bool {
    let mut chars = id.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl<'a> Walker<'a> {
    fn new(root: &'a ElementNode, viewport_height: f64, options: IndexOptions) -> Self {
        let mut walker = Self {
            label_for: HashMap::new(),
            text_by_id: HashMap::new(),
            id_counts: HashMap::new(),
            viewport_height,
            options,
            registered: Vec::new(),
        };
        walker.collect_ids(root);
        walker
    }

    fn collect_ids(&mut self, node: &'a ElementNode) {
        if node.is_skipped() {
            return;
        }
        if let Some(id) = node.id() {
            *self.id_counts.entry(id.as_str()).or_insert(0) += 1;
            self.text_by_id.insert(id.as_str(), node.inner_text());
        }
        if node.is_tag("label") {
            if let Some(target) = node.get_attribute("for").filter(|t| !t.is_empty()) {
                self.label_for
                    .entry(target.as_str())
                    .or_insert_with(|| normalize_label(&node.inner_text()));
            }
        }
        for child in &node.children {
            self.collect_ids(child);
        }
    }

    fn walk(
        &mut self,
        node: &'a ElementNode,
        siblings: &'a [ElementNode],
        position: usize,
        css_path: &str,
        path: &mut Vec<usize>,
        scope: &Scope,
    ) {
        if node.is_skipped() {
            return;
        }

        if self.is_indexable(node) {
            let descriptor = self.describe(node, siblings, position, css_path, path, scope);
            self.registered.push(descriptor);
        }

        let inner = self.child_scope(node, scope);
        for (i, child) in node.children.iter().enumerate() {
            let child_css = child_path(css_path, child, i);
            path.push(i);
            self.walk(child, &node.children, i, &child_css, path, &inner);
            path.pop();
        }
    }

    fn is_indexable(&self, node: &ElementNode) -> bool {
        if !node.is_interactive || !node.is_visible || node.is_disabled() {
            return false;
        }
        if self.options.viewport_expansion < 0 {
            return true;
        }
        node.bounding_box.is_none_or(|bbox| {
            bbox.is_visible()
                && bbox.is_within_window(self.viewport_height, self.options.viewport_expansion as f64)
        })
    }

    fn child_scope(&self, node: &ElementNode, scope: &Scope) -> Scope {
        let mut inner = scope.clone();
        if node.is_tag("label") {
            inner.wrapping_label = Some(normalize_label(&node.inner_text()));
        }
        if node.is_tag("fieldset") {
            if let Some((legend, _)) = node.find_descendant(&|n| n.is_tag("legend")) {
                inner.group_label = Some(normalize_label(&legend.inner_text()));
            }
        }
        if node.get_attribute("role").is_some_and(|r| r == "radiogroup") {
            if let Some(label) = self.aria_label(node) {
                inner.group_label = Some(label);
            }
        }
        inner
    }

    /// Accessible name from aria-labelledby, then aria-label
    fn aria_label(&self, node: &ElementNode) -> Option<String> {
        if let Some(ids) = node.get_attribute("aria-labelledby") {
            let text: Vec<_> = ids
                .split_whitespace()
                .filter_map(|id| self.text_by_id.get(id))
                .map(String::as_str)
                .collect();
            if !text.is_empty() {
                return Some(normalize_label(&text.join(" ")));
            }
        }
        node.get_attribute("aria-label")
            .map(|l| normalize_label(l))
            .filter(|l| !l.is_empty())
    }

    fn label_of(&self, node: &ElementNode, scope: &Scope) -> Option<String> {
        if let Some(label) = self.aria_label(node) {
            return Some(label);
        }
        if !node.is_labelable() {
            return None;
        }
        node.id()
            .and_then(|id| self.label_for.get(id.as_str()).cloned())
            .or_else(|| scope.wrapping_label.clone())
            .filter(|l| !l.is_empty())
    }

    fn selector_for(&self, node: &ElementNode, css_path: &str) -> String {
        match node.id() {
            Some(id) if is_css_identifier(id) && self.id_counts.get(id.as_str()) == Some(&1) => {
                format!("#{}", id)
            }
            _ => css_path.to_string(),
        }
    }

    fn bare_descriptor(&self, node: &ElementNode, css_path: &str) -> ElementDescriptor {
        let mut descriptor = ElementDescriptor::new(self.selector_for(node, css_path), node.tag_name.to_ascii_lowercase());
        if let Some(id) = node.id() {
            descriptor = descriptor.with_id(id);
        }
        for key in KEPT_ATTRIBUTES {
            if let Some(value) = node.get_attribute(key) {
                descriptor = descriptor.with_attribute(key, value);
            }
        }
        descriptor
    }

    fn describe(
        &self,
        node: &ElementNode,
        siblings: &[ElementNode],
        position: usize,
        css_path: &str,
        path: &[usize],
        scope: &Scope,
    ) -> ElementDescriptor {
        let mut descriptor = self.bare_descriptor(node, css_path);

        let text = node.inner_text();
        if !text.is_empty() {
            descriptor = descriptor.with_text(truncate(&text, 100));
        }
        if let Some(label) = self.label_of(node, scope) {
            descriptor = descriptor.with_label(label);
        }
        if let Some(group) = &scope.group_label {
            descriptor = descriptor.with_group_label(group.clone());
        }
        if let Some(file_input) = self.file_input_for(node, siblings, position, css_path, path) {
            descriptor = descriptor.with_file_input(file_input);
        }
        descriptor
    }

    /// The file input for a control: the control itself, a descendant, or a
    /// sibling (or a sibling's descendant), in that order
    fn file_input_for(
        &self,
        node: &ElementNode,
        siblings: &[ElementNode],
        position: usize,
        css_path: &str,
        path: &[usize],
    ) -> Option<ElementDescriptor> {
        if node.is_file_input() {
            return Some(self.bare_descriptor(node, css_path));
        }

        if let Some((found, rel)) = node.find_descendant(&|n| n.is_file_input()) {
            return Some(self.bare_descriptor(found, &descend_css(node, css_path, &rel)));
        }

        // Siblings only exist below the root
        if path.is_empty() {
            return None;
        }
        let parent_css = css_path.rsplit_once(" > ").map(|(p, _)| p)?;

        for (i, sibling) in siblings.iter().enumerate() {
            if i == position || sibling.is_skipped() {
                continue;
            }
            let sibling_css = child_path(parent_css, sibling, i);
            if sibling.is_file_input() {
                return Some(self.bare_descriptor(sibling, &sibling_css));
            }
            if let Some((found, rel)) = sibling.find_descendant(&|n| n.is_file_input()) {
                return Some(self.bare_descriptor(found, &descend_css(sibling, &sibling_css, &rel)));
            }
        }
        None
    }
}

/// CSS path of the node reached from `start` by following child positions
fn descend_css(start: &ElementNode, start_css: &str, rel: &[usize]) -> String {
    let mut css = start_css.to_string();
    let mut node = start;
    for &i in rel {
        match node.children.get(i) {
            Some(child) => {
                css = child_path(&css, child, i);
                node = child;
            }
            None => break,
        }
    }
    css
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::snapshot::ReadyState;

    fn visible(tag: &str) -> ElementNode {
        ElementNode::new(tag)
            .with_visibility(true)
            .with_bounding_box(0.0, 10.0, 100.0, 20.0)
    }

    fn form_page() -> PageSnapshot {
        let root = visible("body")
            .with_child(
                visible("form")
                    .with_child(visible("label").with_attribute("for", "name").with_text("Name:"))
                    .with_child(visible("input").with_attribute("id", "name").with_attribute("type", "text"))
                    .with_child(
                        visible("label")
                            .with_text("Full name")
                            .with_child(visible("input").with_attribute("type", "text")),
                    )
                    .with_child(visible("button").with_attribute("id", "submit").with_text("Send")),
            )
            .with_child(ElementNode::new("script").with_text("console.log(1)"));
        PageSnapshot::new("https://example.com/form", root)
    }

    #[test]
    fn test_build_indexes_interactable_elements() {
        let index = ElementIndex::build(form_page(), 1, &IndexOptions::default()).unwrap();

        // label(for), input#name, wrapping label, nested input, button
        assert_eq!(index.len(), 5);
        assert_eq!(index.generation(), 1);
        assert_eq!(index.url(), "https://example.com/form");

        let handles: Vec<_> = index.iter().map(|(h, _)| h).collect();
        assert_eq!(handles, (0..5).map(|i| ElementHandle::new(i, 1)).collect::<Vec<_>>());
        assert!(index.iter().all(|(_, d)| d.tag_name != "script"));
    }

    #[test]
    fn test_labels_are_associated() {
        let index = ElementIndex::build(form_page(), 1, &IndexOptions::default()).unwrap();

        let by_id = index.iter().find(|(_, d)| d.id.as_deref() == Some("name")).unwrap().1;
        assert_eq!(by_id.label.as_deref(), Some("Name"));
        assert_eq!(by_id.css_selector, "#name");

        let nested = index
            .iter()
            .find(|(_, d)| d.is_tag("input") && d.id.is_none())
            .unwrap()
            .1;
        assert_eq!(nested.label.as_deref(), Some("Full name"));
        assert_eq!(nested.css_selector, "body > form:nth-child(1) > label:nth-child(3) > input:nth-child(1)");
    }

    #[test]
    fn test_exact_label_beats_substring() {
        let index = ElementIndex::build(form_page(), 1, &IndexOptions::default()).unwrap();

        // "Name" is exact for #name and a substring of "Full name"
        let (_, found) = index.find_by_label_text("Name").unwrap();
        assert_eq!(found.id.as_deref(), Some("name"));

        let (_, found) = index.find_by_label_text("full").unwrap();
        assert_eq!(found.label.as_deref(), Some("Full name"));
    }

    #[test]
    fn test_identical_labels_are_ambiguous() {
        let root = visible("body")
            .with_child(visible("input").with_attribute("aria-label", "Email"))
            .with_child(visible("input").with_attribute("aria-label", "Email"));
        let index = ElementIndex::build(PageSnapshot::new("about:blank", root), 1, &IndexOptions::default()).unwrap();

        let err = index.find_by_label_text("Email").unwrap_err();
        assert!(matches!(err, AgentError::AmbiguousLabel { ref candidates, .. } if candidates.len() == 2));
    }

    #[test]
    fn test_missing_label_is_not_found() {
        let index = ElementIndex::build(form_page(), 1, &IndexOptions::default()).unwrap();
        assert!(matches!(
            index.find_by_label_text("Phone"),
            Err(AgentError::ElementNotFound(_))
        ));
    }

    #[test]
    fn test_handle_from_other_generation_is_stale() {
        let old = ElementIndex::build(form_page(), 1, &IndexOptions::default()).unwrap();
        let new = ElementIndex::build(form_page(), 2, &IndexOptions::default()).unwrap();

        let handle = old.handle(0);
        assert!(old.resolve(handle).is_ok());
        assert!(matches!(
            new.resolve(handle),
            Err(AgentError::StaleHandle { current: 2, .. })
        ));
        assert!(matches!(
            new.resolve(new.handle(99)),
            Err(AgentError::ElementNotFound(_))
        ));
    }

    #[test]
    fn test_loading_page_is_stale() {
        let snapshot = form_page().with_ready_state(ReadyState::Loading);
        assert!(matches!(
            ElementIndex::build(snapshot, 1, &IndexOptions::default()),
            Err(AgentError::StaleIndex(_))
        ));
    }

    #[test]
    fn test_hidden_disabled_and_offscreen_elements_skipped() {
        let root = visible("body")
            .with_child(ElementNode::new("button").with_text("hidden"))
            .with_child(visible("button").with_attribute("disabled", "").with_text("off"))
            .with_child(
                ElementNode::new("button")
                    .with_visibility(true)
                    .with_bounding_box(0.0, 5000.0, 100.0, 20.0)
                    .with_text("far"),
            )
            .with_child(visible("button").with_text("ok"));
        let snapshot = PageSnapshot::new("about:blank", root);

        let index = ElementIndex::build(snapshot.clone(), 1, &IndexOptions::default()).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.resolve(index.handle(0)).unwrap().text.as_deref(), Some("ok"));

        let whole_page = IndexOptions {
            viewport_expansion: -1,
        };
        let index = ElementIndex::build(snapshot, 1, &whole_page).unwrap();
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_file_input_found_on_sibling() {
        let root = visible("body").with_child(
            visible("div")
                .with_child(visible("button").with_text("Upload CV"))
                .with_child(ElementNode::new("input").with_attribute("type", "file")),
        );
        let index = ElementIndex::build(PageSnapshot::new("about:blank", root), 1, &IndexOptions::default()).unwrap();

        let (_, button) = index.iter().next().unwrap();
        let file_input = button.file_upload_element().unwrap();
        assert_eq!(file_input.css_selector, "body > div:nth-child(1) > input:nth-child(2)");
        assert_ne!(file_input.css_selector, button.css_selector);
    }

    #[test]
    fn test_file_input_found_on_descendant() {
        let root = visible("body").with_child(
            visible("label")
                .with_text("Resume")
                .with_child(ElementNode::new("input").with_attribute("type", "file").with_attribute("id", "cv")),
        );
        let index = ElementIndex::build(PageSnapshot::new("about:blank", root), 1, &IndexOptions::default()).unwrap();

        let (_, label) = index.iter().next().unwrap();
        assert_eq!(label.file_upload_element().unwrap().css_selector, "#cv");
    }

    #[test]
    fn test_group_label_from_fieldset() {
        let root = visible("body").with_child(
            visible("fieldset")
                .with_child(ElementNode::new("legend").with_text("Preferred Choice"))
                .with_child(
                    visible("label")
                        .with_text("Option 1")
                        .with_child(visible("input").with_attribute("type", "radio").with_attribute("name", "c")),
                ),
        );
        let index = ElementIndex::build(PageSnapshot::new("about:blank", root), 1, &IndexOptions::default()).unwrap();

        let radio = index.iter().map(|(_, d)| d).find(|d| d.is_radio()).unwrap();
        assert_eq!(radio.group_label.as_deref(), Some("Preferred Choice"));
        assert_eq!(radio.label.as_deref(), Some("Option 1"));
    }

    #[test]
    fn test_duplicate_ids_fall_back_to_path() {
        let root = visible("body")
            .with_child(visible("button").with_attribute("id", "dup"))
            .with_child(visible("button").with_attribute("id", "dup"));
        let index = ElementIndex::build(PageSnapshot::new("about:blank", root), 1, &IndexOptions::default()).unwrap();

        let selectors: Vec<_> = index.iter().map(|(_, d)| d.css_selector.clone()).collect();
        assert_eq!(
            selectors,
            vec!["body > button:nth-child(1)", "body > button:nth-child(2)"]
        );
    }

    #[test]
    fn test_describe_lists_elements() {
        let index = ElementIndex::build(form_page(), 1, &IndexOptions::default()).unwrap();
        let listing = index.describe();

        assert!(listing.contains("[1]<input type=\"text\" label=\"Name\" />"));
        assert!(listing.contains("<button>Send</button>"));
        assert_eq!(listing.lines().count(), index.len());
    }
}
