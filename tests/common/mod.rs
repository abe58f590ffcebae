//! In-memory browser used by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use browser_agent::dom::{IndexOptions, ReadyState};
use browser_agent::{AgentError, BrowserContext, ElementDescriptor, ElementIndex, ElementNode, PageSnapshot, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

/// Visible element with a box inside the viewport
pub fn visible(tag: &str) -> ElementNode {
    ElementNode::new(tag)
        .with_visibility(true)
        .with_bounding_box(0.0, 10.0, 200.0, 24.0)
}

pub fn body(children: Vec<ElementNode>) -> ElementNode {
    visible("body").with_children(children)
}

pub fn button(id: &str, text: &str) -> ElementNode {
    visible("button").with_attribute("id", id).with_text(text)
}

pub fn link(id: &str, text: &str, href: &str) -> ElementNode {
    visible("a").with_attribute("id", id).with_attribute("href", href).with_text(text)
}

/// `<label for=id>text</label><input id=id>`
pub fn labelled_input(id: &str, label: &str) -> Vec<ElementNode> {
    vec![
        visible("label").with_attribute("for", id).with_text(label),
        visible("input").with_attribute("id", id).with_attribute("type", "text"),
    ]
}

pub fn radio(id: &str, name: &str, value: &str, label: &str) -> ElementNode {
    visible("label").with_children(vec![
        visible("input")
            .with_attribute("id", id)
            .with_attribute("type", "radio")
            .with_attribute("name", name)
            .with_attribute("value", value),
        ElementNode::new("span").with_visibility(true).with_text(label),
    ])
}

pub fn fieldset(legend: &str, children: Vec<ElementNode>) -> ElementNode {
    let mut nodes = vec![visible("legend").with_text(legend)];
    nodes.extend(children);
    visible("fieldset").with_children(nodes)
}

/// Application form: name, email, a resume upload and a submit button
pub fn form_page() -> ElementNode {
    let mut children = labelled_input("name", "Name");
    children.extend(labelled_input("email", "Email address"));
    children.push(
        visible("div").with_children(vec![
            button("resume-button", "Upload resume"),
            ElementNode::new("input")
                .with_attribute("id", "resume")
                .with_attribute("type", "file"),
        ]),
    );
    children.push(button("submit", "Submit"));
    body(children)
}

#[derive(Debug, Clone)]
struct Page {
    title: String,
    root: ElementNode,
}

#[derive(Default)]
struct State {
    url: String,
    pages: HashMap<String, Page>,
    back_stack: Vec<String>,
    click_targets: HashMap<String, String>,
    clicks: Vec<String>,
    fills: Vec<(String, String)>,
    uploads: Vec<(String, Vec<PathBuf>)>,
    snapshots: usize,
    loading_snapshots: usize,
    close_after_snapshots: Option<usize>,
    closed: bool,
}

/// Browser over a fixed set of pages keyed by URL. Element operations are
/// recorded and checked against the current page.
pub struct FakeBrowser {
    state: Mutex<State>,
    click_delay: Option<Duration>,
}

impl FakeBrowser {
    pub fn new(url: &str, root: ElementNode) -> Self {
        let browser = Self {
            state: Mutex::new(State {
                url: url.to_string(),
                ..State::default()
            }),
            click_delay: None,
        };
        browser.with_page(url, "", root)
    }

    pub fn with_page(self, url: &str, title: &str, root: ElementNode) -> Self {
        self.state.lock().unwrap().pages.insert(
            url.to_string(),
            Page {
                title: title.to_string(),
                root,
            },
        );
        self
    }

    /// Clicking the element with `id` navigates to `url`
    pub fn navigate_on_click(self, id: &str, url: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .click_targets
            .insert(format!("#{}", id), url.to_string());
        self
    }

    /// The first `count` snapshots report a loading document
    pub fn loading_for(self, count: usize) -> Self {
        self.state.lock().unwrap().loading_snapshots = count;
        self
    }

    /// The DevTools connection drops after `count` snapshots
    pub fn close_after_snapshots(self, count: usize) -> Self {
        self.state.lock().unwrap().close_after_snapshots = Some(count);
        self
    }

    pub fn with_click_delay(mut self, delay: Duration) -> Self {
        self.click_delay = Some(delay);
        self
    }

    pub fn url(&self) -> String {
        self.state.lock().unwrap().url.clone()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.state.lock().unwrap().clicks.clone()
    }

    pub fn fills(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().fills.clone()
    }

    pub fn uploads(&self) -> Vec<(String, Vec<PathBuf>)> {
        self.state.lock().unwrap().uploads.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    pub fn snapshot_count(&self) -> usize {
        self.state.lock().unwrap().snapshots
    }

    fn live(&self) -> Result<std::sync::MutexGuard<'_, State>> {
        let state = self
            .state
            .lock()
            .map_err(|_| AgentError::CollaboratorUnavailable("fake browser poisoned".to_string()))?;
        if state.closed {
            return Err(AgentError::CollaboratorUnavailable("connection is closed".to_string()));
        }
        Ok(state)
    }

    /// Fail unless `element` exists on the current page
    fn check_present(state: &State, element: &ElementDescriptor) -> Result<()> {
        let page = state
            .pages
            .get(&state.url)
            .ok_or_else(|| AgentError::NavigationFailed(format!("no page at {}", state.url)))?;
        let index = ElementIndex::build(
            PageSnapshot::new(state.url.clone(), page.root.clone()),
            0,
            &IndexOptions { viewport_expansion: -1 },
        )?;
        let present = index.iter().any(|(_, d)| d.css_selector == element.css_selector)
            || contains_selector(&page.root, &element.css_selector);
        if present {
            Ok(())
        } else {
            Err(AgentError::ElementNotFound(format!(
                "Element '{}' not found",
                element.css_selector
            )))
        }
    }
}

/// Id selectors of elements that are not indexed, e.g. hidden file inputs
fn contains_selector(node: &ElementNode, selector: &str) -> bool {
    node.id().is_some_and(|id| format!("#{}", id) == selector)
        || node.children.iter().any(|c| contains_selector(c, selector))
}

#[async_trait]
impl BrowserContext for FakeBrowser {
    async fn current_url(&self) -> Result<String> {
        Ok(self.live()?.url.clone())
    }

    async fn snapshot(&self) -> Result<PageSnapshot> {
        let mut state = self.live()?;
        state.snapshots += 1;
        if state.close_after_snapshots.is_some_and(|limit| state.snapshots > limit) {
            state.closed = true;
            return Err(AgentError::CollaboratorUnavailable("connection is closed".to_string()));
        }

        let page = state
            .pages
            .get(&state.url)
            .cloned()
            .ok_or_else(|| AgentError::BrowserOperation(format!("no page at {}", state.url)))?;

        let mut snapshot = PageSnapshot::new(state.url.clone(), page.root).with_title(page.title);
        if state.loading_snapshots > 0 {
            state.loading_snapshots -= 1;
            snapshot = snapshot.with_ready_state(ReadyState::Loading);
        }
        Ok(snapshot)
    }

    async fn page_html(&self) -> Result<String> {
        let state = self.live()?;
        let page = state
            .pages
            .get(&state.url)
            .ok_or_else(|| AgentError::BrowserOperation(format!("no page at {}", state.url)))?;
        Ok(format!(
            "<html><head><title>{}</title></head><body><p>{}</p></body></html>",
            page.title,
            page.root.inner_text()
        ))
    }

    async fn take_screenshot(&self) -> Result<Vec<u8>> {
        self.live()?;
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        let mut state = self.live()?;
        if !state.pages.contains_key(url) {
            return Err(AgentError::NavigationFailed(format!("Failed to navigate to {}", url)));
        }
        let previous = std::mem::replace(&mut state.url, url.to_string());
        state.back_stack.push(previous);
        Ok(())
    }

    async fn go_back(&self) -> Result<()> {
        let mut state = self.live()?;
        if let Some(previous) = state.back_stack.pop() {
            state.url = previous;
        }
        Ok(())
    }

    async fn locate(&self, element: &ElementDescriptor) -> Result<bool> {
        let state = self.live()?;
        Ok(Self::check_present(&state, element).is_ok())
    }

    async fn click(&self, element: &ElementDescriptor) -> Result<()> {
        if let Some(delay) = self.click_delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.live()?;
        Self::check_present(&state, element)?;
        state.clicks.push(element.css_selector.clone());

        if let Some(target) = state.click_targets.get(&element.css_selector).cloned() {
            let previous = std::mem::replace(&mut state.url, target);
            state.back_stack.push(previous);
        }
        Ok(())
    }

    async fn fill(&self, element: &ElementDescriptor, text: &str) -> Result<()> {
        let mut state = self.live()?;
        Self::check_present(&state, element)?;
        state.fills.push((element.css_selector.clone(), text.to_string()));
        Ok(())
    }

    async fn set_input_files(&self, element: &ElementDescriptor, paths: &[PathBuf]) -> Result<()> {
        let mut state = self.live()?;
        Self::check_present(&state, element)?;
        state.uploads.push((element.css_selector.clone(), paths.to_vec()));
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.state.lock().unwrap().closed = true;
        Ok(())
    }
}

/// Error kind of a failed action result
pub fn error_kind(result: &browser_agent::ActionResult) -> Option<browser_agent::ErrorKind> {
    match result {
        browser_agent::ActionResult::Error { kind, .. } => Some(*kind),
        _ => None,
    }
}

/// Two linked pages: `https://a.test` and `https://b.test`
pub fn two_pages() -> FakeBrowser {
    FakeBrowser::new("https://a.test", body(vec![link("to-b", "Go to B", "https://b.test")]))
        .with_page("https://b.test", "Page B", body(vec![link("to-a", "Go to A", "https://a.test")]))
}
