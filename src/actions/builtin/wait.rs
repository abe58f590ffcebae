use crate::actions::{Action, ActionResult, ActionSpec};
use crate::error::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const MIN_WAIT_SECS: u64 = 1;
const MAX_WAIT_SECS: u64 = 30;

/// Parameters for the wait action
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WaitParams {
    /// Seconds to wait (1-30, default 3)
    #[serde(default = "default_seconds")]
    pub seconds: u64,
}

fn default_seconds() -> u64 {
    3
}

/// Pause so the page can finish loading or animating
#[derive(Default)]
pub struct WaitAction;

impl ActionSpec for WaitAction {
    type Params = WaitParams;

    fn name(&self) -> &str {
        "wait"
    }

    fn description(&self) -> &str {
        "Wait for a number of seconds, e.g. until the page finishes loading"
    }
}

#[async_trait]
impl Action for WaitAction {
    async fn execute_typed(&self, params: WaitParams) -> Result<ActionResult> {
        let seconds = params.seconds.clamp(MIN_WAIT_SECS, MAX_WAIT_SECS);
        log::debug!("Waiting {}s", seconds);
        tokio::time::sleep(Duration::from_secs(seconds)).await;
        Ok(ActionResult::remembered(format!("Waited for {} seconds", seconds)))
    }
}
