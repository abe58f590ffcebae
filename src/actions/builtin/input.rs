use crate::actions::{ActionResult, ActionSpec, Effect, PageAction, PageContext};
use crate::error::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the input_text action
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InputTextParams {
    /// Element index from the current page state
    pub index: usize,

    /// Text to type; replaces the current value
    pub text: String,
}

/// Type text into an indexed input
#[derive(Default)]
pub struct InputTextAction;

impl ActionSpec for InputTextAction {
    type Params = InputTextParams;

    fn name(&self) -> &str {
        "input_text"
    }

    fn description(&self) -> &str {
        "Input text into the interactive element with the given index"
    }

    fn effect(&self) -> Effect {
        Effect::MutatesPage
    }
}

#[async_trait]
impl PageAction for InputTextAction {
    async fn execute_typed(&self, params: InputTextParams, page: &PageContext) -> Result<ActionResult> {
        let element = page.element(params.index)?;
        page.browser().fill(element, &params.text).await?;

        let msg = format!("Input \"{}\" into index {}", params.text, params.index);
        log::info!("{}", msg);
        Ok(ActionResult::success_with(msg))
    }
}
