use crate::actions::{ActionResult, ActionSpec, Effect, PageAction, PageContext};
use crate::error::{AgentError, Result};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the click_element action
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClickElementParams {
    /// Element index from the current page state
    pub index: usize,
}

/// Click an indexed element
#[derive(Default)]
pub struct ClickElementAction;

impl ActionSpec for ClickElementAction {
    type Params = ClickElementParams;

    fn name(&self) -> &str {
        "click_element"
    }

    fn description(&self) -> &str {
        "Click the element with the given index"
    }

    fn effect(&self) -> Effect {
        Effect::MutatesPage
    }
}

#[async_trait]
impl PageAction for ClickElementAction {
    async fn execute_typed(&self, params: ClickElementParams, page: &PageContext) -> Result<ActionResult> {
        let element = page.element(params.index)?;

        // A click would only open the native file dialog
        if element.attributes.get("type").is_some_and(|t| t.eq_ignore_ascii_case("file")) {
            return Err(AgentError::ActionFailed {
                action: self.name().to_string(),
                reason: format!(
                    "Index {} opens a file upload dialog, use upload_file instead",
                    params.index
                ),
            });
        }

        page.browser().click(element).await?;

        let msg = match element.display_text() {
            Some(text) => format!("Clicked element {} \"{}\"", params.index, text),
            None => format!("Clicked element {}", params.index),
        };
        log::info!("{}", msg);
        Ok(ActionResult::success_with(msg))
    }
}
