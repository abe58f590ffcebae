use crate::dom::element::ElementNode;
use serde::{Deserialize, Serialize};

/// `document.readyState` of the captured page, plus a detached marker
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReadyState {
    Loading,
    Interactive,
    #[default]
    Complete,
    /// The document was torn down while it was being captured
    Detached,
}

impl ReadyState {
    /// Whether an element index may be built from a page in this state
    pub fn is_settled(self) -> bool {
        matches!(self, ReadyState::Interactive | ReadyState::Complete)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 800.0,
        }
    }
}

/// Raw page state produced by the DOM extraction script
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageSnapshot {
    pub url: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub ready_state: ReadyState,

    #[serde(default)]
    pub viewport: Viewport,

    pub root: ElementNode,
}

impl PageSnapshot {
    pub fn new(url: impl Into<String>, root: ElementNode) -> Self {
        Self {
            url: url.into(),
            title: String::new(),
            ready_state: ReadyState::Complete,
            viewport: Viewport::default(),
            root,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_ready_state(mut self, ready_state: ReadyState) -> Self {
        self.ready_state = ready_state;
        self
    }
}
