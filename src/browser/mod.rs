//! Browser collaborator surface
//!
//! [`BrowserContext`] is everything the orchestrator and the built-in actions
//! need from a browser: page capture and element-level operations addressed by
//! [`ElementDescriptor`]. [`BrowserSession`] implements it on top of
//! headless Chrome, one isolated tab per agent run.

pub mod config;
pub mod session;

pub use config::{ConnectionOptions, ContextOptions, LaunchOptions};
pub use session::{BrowserSession, TabContext};

use crate::dom::{ElementDescriptor, PageSnapshot};
use crate::error::Result;
use async_trait::async_trait;
use base64::Engine;
use std::path::PathBuf;
use std::sync::Arc;

/// Shared handle injected into actions that declare the browser capability
pub type BrowserHandle = Arc<dyn BrowserContext>;

/// An isolated browsing context owned by one agent run
#[async_trait]
pub trait BrowserContext: Send + Sync {
    /// URL of the page currently shown
    async fn current_url(&self) -> Result<String>;

    /// Capture the DOM, viewport and ready state of the current page
    async fn snapshot(&self) -> Result<PageSnapshot>;

    /// Full HTML of the current page
    async fn page_html(&self) -> Result<String>;

    /// PNG screenshot of the viewport
    async fn take_screenshot(&self) -> Result<Vec<u8>>;

    /// Navigate and wait for the load to finish
    async fn navigate(&self, url: &str) -> Result<()>;

    async fn go_back(&self) -> Result<()>;

    /// Whether the descriptor still locates a live element
    async fn locate(&self, element: &ElementDescriptor) -> Result<bool>;

    async fn click(&self, element: &ElementDescriptor) -> Result<()>;

    /// Replace the element's value with `text`
    async fn fill(&self, element: &ElementDescriptor, text: &str) -> Result<()>;

    async fn set_input_files(&self, element: &ElementDescriptor, paths: &[PathBuf]) -> Result<()>;

    /// Release the context; further calls may fail
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Screenshot of the current page, base64-encoded for prompts and hooks
pub async fn screenshot_base64(browser: &dyn BrowserContext) -> Result<String> {
    let bytes = browser.take_screenshot().await?;
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}
