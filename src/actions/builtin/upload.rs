use crate::actions::{ActionResult, ActionSpec, Effect, PageAction, PageContext};
use crate::error::{AgentError, Result};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Parameters for the upload_file action
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UploadFileParams {
    /// Index of the upload control or the file input itself
    pub index: usize,

    /// One of the files made available to the agent
    pub path: String,
}

/// Hand a local file to the file input associated with an element
pub struct UploadFileAction {
    available_file_paths: Vec<PathBuf>,
}

impl UploadFileAction {
    pub fn new(available_file_paths: Vec<PathBuf>) -> Self {
        Self { available_file_paths }
    }

    fn is_available(&self, path: &str) -> bool {
        self.available_file_paths.iter().any(|p| p.as_os_str() == path)
    }
}

impl ActionSpec for UploadFileAction {
    type Params = UploadFileParams;

    fn name(&self) -> &str {
        "upload_file"
    }

    fn description(&self) -> &str {
        "Upload a file to the element with the given index. If no upload element is found, \
         try another index of the same upload control"
    }

    fn effect(&self) -> Effect {
        Effect::MutatesPage
    }
}

#[async_trait]
impl PageAction for UploadFileAction {
    async fn execute_typed(&self, params: UploadFileParams, page: &PageContext) -> Result<ActionResult> {
        if !self.is_available(&params.path) {
            return Err(AgentError::ActionFailed {
                action: self.name().to_string(),
                reason: format!("File path {} is not available", params.path),
            });
        }

        let element = page.element(params.index)?;
        let not_found = || AgentError::ElementNotFound(format!("No file upload element found at index {}", params.index));

        let file_input = element.file_upload_element().ok_or_else(|| {
            log::info!("No file upload element found at index {}", params.index);
            not_found()
        })?;

        if !page.browser().locate(file_input).await? {
            return Err(not_found());
        }

        page.browser()
            .set_input_files(file_input, &[PathBuf::from(&params.path)])
            .await
            .map_err(|e| {
                log::debug!("Error in set_input_files: {}", e);
                match e {
                    fatal if fatal.is_fatal() => fatal,
                    _ => AgentError::ActionFailed {
                        action: "upload_file".to_string(),
                        reason: format!("Failed to upload file to index {}", params.index),
                    },
                }
            })?;

        let msg = format!("Successfully uploaded file \"{}\" to index {}", params.path, params.index);
        log::info!("{}", msg);
        Ok(ActionResult::success_with(msg))
    }
}
