//! # browser-agent
//!
//! Action dispatch and step orchestration for LLM-driven browser agents over
//! the Chrome DevTools Protocol (CDP).
//!
//! ## Features
//!
//! - **Action Registry**: Typed, schema-described actions exposed to a decision maker as a catalogue
//! - **Element Index**: Generation-tagged map of interactable elements with label lookup
//! - **Orchestrator**: Observe, decide, execute and record, step by step, with failure and step limits
//! - **History**: Append-only step log with lazy projections and lossless JSON persistence
//! - **Browser Sessions**: One isolated Chrome tab per run, shared across concurrent runs
//!
//! ## Running an Agent
//!
//! ```rust,no_run
//! use browser_agent::{ActionRegistry, Agent, BrowserSession, Decision, LaunchOptions, ScriptedDecisions};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn run() -> browser_agent::Result<()> {
//! let session = BrowserSession::launch(LaunchOptions::default())?;
//! let registry = Arc::new(ActionRegistry::with_defaults()?);
//!
//! let script = ScriptedDecisions::new(vec![
//!     Decision::single("go_to_url", json!({"url": "example.com"})),
//!     Decision::single("extract_content", json!({})),
//!     Decision::single("done", json!({"text": "Read example.com"})),
//! ]);
//!
//! let result = Agent::new("Summarise example.com", registry, Arc::new(script), session.open_context()?)
//!     .run()
//!     .await;
//!
//! for url in result.history.urls() {
//!     println!("visited {}", url);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Real runs plug an LLM in through [`agent::TextModel`] and
//! [`agent::PromptedDecisionMaker`], or implement [`DecisionMaker`] directly.
//!
//! ## Custom Actions
//!
//! ```rust,no_run
//! use browser_agent::actions::{ActionDefinition, ActionRegistry, ActionResult};
//! use browser_agent::browser::BrowserHandle;
//! use schemars::JsonSchema;
//! use serde::Deserialize;
//!
//! #[derive(Deserialize, JsonSchema)]
//! struct ReadCv {}
//!
//! # fn main() -> browser_agent::Result<()> {
//! let mut registry = ActionRegistry::with_defaults()?;
//! registry.register(ActionDefinition::from_browser_fn(
//!     "read_current_url",
//!     "Report the URL of the current page",
//!     |_: ReadCv, browser: BrowserHandle| async move {
//!         let url = browser.current_url().await?;
//!         browser_agent::Result::Ok(ActionResult::remembered(url))
//!     },
//! ))?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - [`actions`]: Action traits, registry, schema validation and built-in actions
//! - [`agent`]: Orchestrator, run state, history, decisions and hooks
//! - [`browser`]: Browser collaborator trait and the headless Chrome session
//! - [`dom`]: Page snapshots and the element index
//! - [`error`]: Error types and result aliases

pub mod actions;
pub mod agent;
pub mod browser;
pub mod dom;
pub mod error;

pub use actions::{ActionDefinition, ActionRegistry, ActionResult, Capability, Effect, PageContext};
pub use agent::{
    Agent, AgentSettings, Decision, DecisionMaker, History, RunResult, RunState, ScriptedDecisions, StepHook,
    StepRecord, TerminationReason,
};
pub use browser::{BrowserContext, BrowserHandle, BrowserSession, ConnectionOptions, ContextOptions, LaunchOptions};
pub use dom::{ElementDescriptor, ElementHandle, ElementIndex, ElementNode, PageSnapshot};
pub use error::{AgentError, ErrorKind, Result};
