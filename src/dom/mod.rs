//! DOM extraction and element indexing
//!
//! This module turns a captured page into the per-step element index the
//! decision maker targets. It includes:
//! - ElementNode: Representation of DOM elements
//! - PageSnapshot: Raw page state returned by the extraction script
//! - ElementIndex: Generation-tagged map of interactable elements
//! - SelectorMap: Mapping of indices to element descriptors

pub mod element;
pub mod index;
pub mod selector_map;
pub mod snapshot;

pub use element::{BoundingBox, ElementNode};
pub use index::{ElementHandle, ElementIndex, IndexOptions};
pub use selector_map::{ElementDescriptor, SelectorMap};
pub use snapshot::{PageSnapshot, ReadyState, Viewport};

use crate::error::{AgentError, Result};

/// Script evaluated in the page; returns the snapshot as a JSON string
pub const EXTRACT_DOM_JS: &str = include_str!("extract_dom.js");

/// Parse the value returned by [`EXTRACT_DOM_JS`]
pub fn parse_snapshot(value: Option<serde_json::Value>) -> Result<PageSnapshot> {
    let json_value =
        value.ok_or_else(|| AgentError::StaleIndex("No value returned from DOM extraction".to_string()))?;

    // The script returns a JSON string, so parse it as a string first
    let json_str: String = serde_json::from_value(json_value)
        .map_err(|e| AgentError::BrowserOperation(format!("Failed to get JSON string: {}", e)))?;

    serde_json::from_str(&json_str)
        .map_err(|e| AgentError::BrowserOperation(format!("Failed to parse DOM JSON: {}", e)))
}
