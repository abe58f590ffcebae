use crate::actions::{Action, ActionResult, ActionSpec};
use crate::error::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the done action
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DoneParams {
    /// Final answer for the task
    pub text: String,
}

/// Finish the run and report the result
#[derive(Default)]
pub struct DoneAction;

impl ActionSpec for DoneAction {
    type Params = DoneParams;

    fn name(&self) -> &str {
        "done"
    }

    fn description(&self) -> &str {
        "Complete the task and report the final result"
    }
}

#[async_trait]
impl Action for DoneAction {
    async fn execute_typed(&self, params: DoneParams) -> Result<ActionResult> {
        Ok(ActionResult::done(params.text))
    }
}
