//! Actions the decision maker can invoke
//!
//! An action is a named operation with a typed parameter struct. Its
//! parameter schema is generated with `schemars` and shown to the decision
//! maker; its handler is one of three typed traits depending on what it needs
//! from the run:
//!
//! - [`Action`]: nothing but its parameters
//! - [`BrowserAction`]: the run's [`BrowserHandle`]
//! - [`PageAction`]: the browser plus the current [`ElementIndex`]
//!
//! ```rust,no_run
//! use browser_agent::actions::{ActionDefinition, ActionRegistry, ActionResult};
//! use schemars::JsonSchema;
//! use serde::Deserialize;
//!
//! #[derive(Deserialize, JsonSchema)]
//! struct Job {
//!     title: String,
//!     company: String,
//! }
//!
//! # fn main() -> browser_agent::Result<()> {
//! let mut registry = ActionRegistry::with_defaults()?;
//! registry.register(ActionDefinition::from_fn(
//!     "save_job",
//!     "Save a job posting",
//!     |job: Job| async move { browser_agent::Result::Ok(format!("Saved {} at {}", job.title, job.company)) },
//! ))?;
//! # Ok(())
//! # }
//! ```

pub mod builtin;
pub mod handler;
pub mod registry;
pub mod schema;

pub use handler::Handler;
pub use registry::{ActionDefinition, ActionRegistry, ActionSpecView};
pub use schema::{JsonSchemaValidator, SchemaValidator};

use crate::browser::BrowserHandle;
use crate::dom::{ElementDescriptor, ElementHandle, ElementIndex};
use crate::error::{AgentError, ErrorKind, Result};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What a handler receives from the run besides its parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    None,
    Browser,
    PageIndex,
}

/// Whether running the action can change the page under the element index
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    #[default]
    ReadOnly,
    MutatesPage,
}

/// Outcome of one action. Success and error are exclusive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionResult {
    Success {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        extracted_content: Option<String>,

        /// Keep `extracted_content` in the context of later decisions
        #[serde(default)]
        include_in_memory: bool,

        /// This action ends the run
        #[serde(default)]
        is_done: bool,
    },
    Error {
        kind: ErrorKind,
        message: String,
    },
}

impl ActionResult {
    /// Success without content
    pub fn ok() -> Self {
        ActionResult::Success {
            extracted_content: None,
            include_in_memory: false,
            is_done: false,
        }
    }

    /// Success reporting `content` for this step only
    pub fn success_with(content: impl Into<String>) -> Self {
        ActionResult::Success {
            extracted_content: Some(content.into()),
            include_in_memory: false,
            is_done: false,
        }
    }

    /// Success whose content stays in the decision context
    pub fn remembered(content: impl Into<String>) -> Self {
        ActionResult::Success {
            extracted_content: Some(content.into()),
            include_in_memory: true,
            is_done: false,
        }
    }

    /// Successful completion of the run with `result` as the final answer
    pub fn done(result: impl Into<String>) -> Self {
        ActionResult::Success {
            extracted_content: Some(result.into()),
            include_in_memory: true,
            is_done: true,
        }
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        ActionResult::Error {
            kind,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ActionResult::Error { .. })
    }

    pub fn is_done(&self) -> bool {
        matches!(self, ActionResult::Success { is_done: true, .. })
    }

    pub fn extracted_content(&self) -> Option<&str> {
        match self {
            ActionResult::Success { extracted_content, .. } => extracted_content.as_deref(),
            ActionResult::Error { .. } => None,
        }
    }

    pub fn include_in_memory(&self) -> bool {
        matches!(self, ActionResult::Success { include_in_memory: true, .. })
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            ActionResult::Error { message, .. } => Some(message),
            ActionResult::Success { .. } => None,
        }
    }
}

impl From<&AgentError> for ActionResult {
    fn from(e: &AgentError) -> Self {
        ActionResult::error(e.kind(), e.feedback())
    }
}

impl From<AgentError> for ActionResult {
    fn from(e: AgentError) -> Self {
        ActionResult::from(&e)
    }
}

impl From<String> for ActionResult {
    fn from(content: String) -> Self {
        ActionResult::success_with(content)
    }
}

impl From<&str> for ActionResult {
    fn from(content: &str) -> Self {
        ActionResult::success_with(content)
    }
}

impl From<()> for ActionResult {
    fn from(_: ()) -> Self {
        ActionResult::ok()
    }
}

/// Page state handed to [`PageAction`]s
#[derive(Clone)]
pub struct PageContext {
    browser: BrowserHandle,
    index: Arc<ElementIndex>,

    /// Generation of the index the decision maker looked at
    observed_generation: u64,
}

impl PageContext {
    pub fn new(browser: BrowserHandle, index: Arc<ElementIndex>, observed_generation: u64) -> Self {
        Self {
            browser,
            index,
            observed_generation,
        }
    }

    pub fn browser(&self) -> &BrowserHandle {
        &self.browser
    }

    /// The current element index
    pub fn index(&self) -> &ElementIndex {
        &self.index
    }

    /// Handle for an index the decision maker referenced
    pub fn handle(&self, index: usize) -> ElementHandle {
        ElementHandle::new(index, self.observed_generation)
    }

    /// Resolve an index the decision maker referenced. Fails with
    /// [`AgentError::StaleHandle`] if the index was rebuilt since the decision.
    pub fn element(&self, index: usize) -> Result<&ElementDescriptor> {
        self.index.resolve(self.handle(index))
    }
}

/// Name, description and parameter type shared by all action kinds
pub trait ActionSpec: Send + Sync + 'static {
    type Params: DeserializeOwned + JsonSchema + Send + 'static;

    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn effect(&self) -> Effect {
        Effect::ReadOnly
    }

    /// JSON schema of [`Self::Params`]
    fn parameters_schema(&self) -> serde_json::Value {
        schema::schema_of::<Self::Params>()
    }
}

/// Action that needs nothing beyond its parameters
#[async_trait]
pub trait Action: ActionSpec {
    async fn execute_typed(&self, params: Self::Params) -> Result<ActionResult>;
}

/// Action that drives the browser directly
#[async_trait]
pub trait BrowserAction: ActionSpec {
    async fn execute_typed(&self, params: Self::Params, browser: &BrowserHandle) -> Result<ActionResult>;
}

/// Action that targets indexed elements
#[async_trait]
pub trait PageAction: ActionSpec {
    async fn execute_typed(&self, params: Self::Params, page: &PageContext) -> Result<ActionResult>;
}
