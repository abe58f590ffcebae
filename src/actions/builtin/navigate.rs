use crate::actions::builtin::utils::normalize_url;
use crate::actions::{ActionResult, ActionSpec, BrowserAction, Effect};
use crate::browser::BrowserHandle;
use crate::error::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the go_to_url action
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GoToUrlParams {
    /// URL to open; a missing scheme is filled in
    pub url: String,
}

/// Navigate the current tab to a URL
#[derive(Default)]
pub struct GoToUrlAction;

impl ActionSpec for GoToUrlAction {
    type Params = GoToUrlParams;

    fn name(&self) -> &str {
        "go_to_url"
    }

    fn description(&self) -> &str {
        "Navigate to URL in the current tab"
    }

    fn effect(&self) -> Effect {
        Effect::MutatesPage
    }
}

#[async_trait]
impl BrowserAction for GoToUrlAction {
    async fn execute_typed(&self, params: GoToUrlParams, browser: &BrowserHandle) -> Result<ActionResult> {
        let url = normalize_url(&params.url);
        browser.navigate(&url).await?;

        log::info!("Navigated to {}", url);
        Ok(ActionResult::remembered(format!("Navigated to {}", url)))
    }
}

/// Parameters for the go_back action (none)
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct GoBackParams {}

/// Go back one entry in the tab's history
#[derive(Default)]
pub struct GoBackAction;

impl ActionSpec for GoBackAction {
    type Params = GoBackParams;

    fn name(&self) -> &str {
        "go_back"
    }

    fn description(&self) -> &str {
        "Go back to the previous page"
    }

    fn effect(&self) -> Effect {
        Effect::MutatesPage
    }
}

#[async_trait]
impl BrowserAction for GoBackAction {
    async fn execute_typed(&self, _params: GoBackParams, browser: &BrowserHandle) -> Result<ActionResult> {
        browser.go_back().await?;
        Ok(ActionResult::remembered("Navigated back"))
    }
}
