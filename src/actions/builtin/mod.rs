//! Actions registered by [`ActionRegistry::with_defaults`](crate::actions::ActionRegistry::with_defaults)

pub mod click;
pub mod done;
pub mod extract;
pub mod forms;
pub mod input;
pub mod navigate;
pub mod upload;
pub mod utils;
pub mod wait;

pub use click::ClickElementAction;
pub use done::DoneAction;
pub use extract::ExtractContentAction;
pub use forms::{FillTextFieldByLabelAction, SelectRadioButtonAction};
pub use input::InputTextAction;
pub use navigate::{GoBackAction, GoToUrlAction};
pub use upload::UploadFileAction;
pub use wait::WaitAction;

use crate::actions::ActionRegistry;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settings for the built-in actions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuiltinConfig {
    /// Files `upload_file` may hand to the page
    pub available_file_paths: Vec<PathBuf>,
}

impl BuiltinConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.available_file_paths.push(path.into());
        self
    }
}

/// Register every built-in action into `registry`.
///
/// Stops at the first action that cannot be registered, e.g. when `registry`
/// already holds a custom action under a built-in name.
pub fn register_all(registry: &mut ActionRegistry, config: &BuiltinConfig) -> Result<()> {
    registry.register_action(DoneAction)?;
    registry.register_browser_action(GoToUrlAction)?;
    registry.register_browser_action(GoBackAction)?;
    registry.register_page_action(ClickElementAction)?;
    registry.register_page_action(InputTextAction)?;
    registry.register_page_action(UploadFileAction::new(config.available_file_paths.clone()))?;
    registry.register_browser_action(ExtractContentAction)?;
    registry.register_page_action(FillTextFieldByLabelAction)?;
    registry.register_page_action(SelectRadioButtonAction)?;
    registry.register_action(WaitAction)?;
    Ok(())
}
