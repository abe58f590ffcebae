use crate::actions::{ActionResult, ActionSpec, BrowserAction};
use crate::browser::BrowserHandle;
use crate::error::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the extract_content action
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ExtractContentParams {
    /// What the content is needed for
    #[serde(default)]
    pub goal: Option<String>,
}

/// Convert the current page to markdown and keep it in memory
#[derive(Default)]
pub struct ExtractContentAction;

impl ActionSpec for ExtractContentAction {
    type Params = ExtractContentParams;

    fn name(&self) -> &str {
        "extract_content"
    }

    fn description(&self) -> &str {
        "Extract the page content as markdown to retrieve specific information"
    }
}

#[async_trait]
impl BrowserAction for ExtractContentAction {
    async fn execute_typed(&self, params: ExtractContentParams, browser: &BrowserHandle) -> Result<ActionResult> {
        let html = browser.page_html().await?;
        let markdown = html2md::parse_html(&html);
        log::debug!("Extracted {} characters of markdown", markdown.len());

        let content = match params.goal {
            Some(goal) => format!("Extracted from page for \"{}\":\n{}", goal, markdown.trim()),
            None => format!("Extracted from page:\n{}", markdown.trim()),
        };
        Ok(ActionResult::remembered(content))
    }
}
