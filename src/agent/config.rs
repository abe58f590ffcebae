use crate::browser::config::duration_ms;
use crate::dom::IndexOptions;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Limits and switches for one agent run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Steps before the run ends with `StepLimitReached`
    pub max_steps: u64,

    /// Consecutive failed steps before the run ends with `FailureLimitReached`
    pub max_consecutive_failures: u32,

    /// Actions beyond this count in one decision are dropped
    pub max_actions_per_step: usize,

    /// Most recent steps shown to the decision maker; `None` shows all
    pub history_window: Option<usize>,

    /// Bound on each hook invocation
    #[serde(with = "duration_ms")]
    pub hook_timeout: Duration,

    /// Bound on each action handler and page capture
    #[serde(with = "duration_ms")]
    pub action_timeout: Duration,

    /// Bound on each decision request
    #[serde(with = "duration_ms")]
    pub decision_timeout: Duration,

    /// Attach a screenshot to decision requests
    pub use_vision: bool,

    /// Store page HTML in every step record
    pub record_page_content: bool,

    /// Extra decision attempts after a malformed or invalid decision
    pub decision_retries: u32,

    /// Element indexing window, see [`IndexOptions`]
    pub viewport_expansion: i64,

    /// Close the browser context when the run ends
    pub close_on_finish: bool,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_steps: 100,
            max_consecutive_failures: 3,
            max_actions_per_step: 10,
            history_window: None,
            hook_timeout: Duration::from_secs(5),
            action_timeout: Duration::from_secs(60),
            decision_timeout: Duration::from_secs(120),
            use_vision: false,
            record_page_content: false,
            decision_retries: 1,
            viewport_expansion: IndexOptions::default().viewport_expansion,
            close_on_finish: false,
        }
    }
}

impl AgentSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse settings from JSON; missing fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn max_consecutive_failures(mut self, max: u32) -> Self {
        self.max_consecutive_failures = max;
        self
    }

    pub fn max_actions_per_step(mut self, max: usize) -> Self {
        self.max_actions_per_step = max;
        self
    }

    pub fn history_window(mut self, window: Option<usize>) -> Self {
        self.history_window = window;
        self
    }

    pub fn hook_timeout(mut self, timeout: Duration) -> Self {
        self.hook_timeout = timeout;
        self
    }

    pub fn action_timeout(mut self, timeout: Duration) -> Self {
        self.action_timeout = timeout;
        self
    }

    pub fn decision_timeout(mut self, timeout: Duration) -> Self {
        self.decision_timeout = timeout;
        self
    }

    pub fn use_vision(mut self, use_vision: bool) -> Self {
        self.use_vision = use_vision;
        self
    }

    pub fn record_page_content(mut self, record: bool) -> Self {
        self.record_page_content = record;
        self
    }

    pub fn decision_retries(mut self, retries: u32) -> Self {
        self.decision_retries = retries;
        self
    }

    pub fn viewport_expansion(mut self, pixels: i64) -> Self {
        self.viewport_expansion = pixels;
        self
    }

    pub fn close_on_finish(mut self, close: bool) -> Self {
        self.close_on_finish = close;
        self
    }

    pub fn index_options(&self) -> IndexOptions {
        IndexOptions {
            viewport_expansion: self.viewport_expansion,
        }
    }
}
