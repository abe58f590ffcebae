//! Label-addressed form actions for surveys and application forms

use crate::actions::{ActionResult, ActionSpec, Effect, PageAction, PageContext};
use crate::dom::index::match_text;
use crate::dom::{ElementDescriptor, ElementHandle, ElementIndex};
use crate::error::{AgentError, Result};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const UNFILLABLE_INPUT_TYPES: &[&str] = &["radio", "checkbox", "file", "submit", "button", "reset", "image"];

fn is_fillable(element: &ElementDescriptor) -> bool {
    if element.is_tag("textarea") || element.attributes.contains_key("contenteditable") {
        return true;
    }
    if !element.is_tag("input") {
        return false;
    }
    match element.attributes.get("type") {
        Some(kind) => !UNFILLABLE_INPUT_TYPES.contains(&kind.to_ascii_lowercase().as_str()),
        None => true,
    }
}

/// Parameters for the fill_text_field_by_label action
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FillTextFieldByLabelParams {
    /// The exact text of the label associated with the text input field
    pub label_text: String,

    /// The text to fill into the input field
    pub text_to_fill: String,
}

/// Fill a text input or textarea identified by its label
#[derive(Default)]
pub struct FillTextFieldByLabelAction;

impl ActionSpec for FillTextFieldByLabelAction {
    type Params = FillTextFieldByLabelParams;

    fn name(&self) -> &str {
        "fill_text_field_by_label"
    }

    fn description(&self) -> &str {
        "Fill a text input field (input or textarea) identified by its associated label text"
    }

    fn effect(&self) -> Effect {
        Effect::MutatesPage
    }
}

#[async_trait]
impl PageAction for FillTextFieldByLabelAction {
    async fn execute_typed(&self, params: FillTextFieldByLabelParams, page: &PageContext) -> Result<ActionResult> {
        log::info!("Filling field labeled '{}'", params.label_text);

        let (handle, element) = page.index().find_by_label_text(&params.label_text)?;
        if !is_fillable(element) {
            return Err(AgentError::ActionFailed {
                action: self.name().to_string(),
                reason: format!(
                    "Element {} labeled '{}' is a <{}>, not a text field",
                    handle.index, params.label_text, element.tag_name
                ),
            });
        }

        page.browser().fill(element, &params.text_to_fill).await?;

        Ok(ActionResult::success_with(format!(
            "Filled field labeled '{}' with '{}'",
            element.label.as_deref().unwrap_or(&params.label_text),
            params.text_to_fill
        )))
    }
}

/// Parameters for the select_radio_button action
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SelectRadioButtonParams {
    /// The exact text of the question or label associated with the radio button group
    pub question_label: String,

    /// The exact text of the radio button choice to select
    pub choice_text: String,
}

/// Select a radio choice identified by its question and choice labels
#[derive(Default)]
pub struct SelectRadioButtonAction;

impl ActionSpec for SelectRadioButtonAction {
    type Params = SelectRadioButtonParams;

    fn name(&self) -> &str {
        "select_radio_button"
    }

    fn description(&self) -> &str {
        "Select a radio button by the label of its question and the text of the desired choice"
    }

    fn effect(&self) -> Effect {
        Effect::MutatesPage
    }
}

/// Radio inputs with their question label. A radio without its own group
/// label inherits the label of a same-named radio that has one.
fn radio_groups(index: &ElementIndex) -> Vec<(ElementHandle, &ElementDescriptor, String)> {
    let radios: Vec<_> = index.iter().filter(|(_, d)| d.is_radio()).collect();

    let mut by_name: HashMap<&str, &str> = HashMap::new();
    for (_, d) in &radios {
        if let (Some(name), Some(group)) = (d.attributes.get("name"), d.group_label.as_deref()) {
            by_name.entry(name.as_str()).or_insert(group);
        }
    }

    radios
        .into_iter()
        .filter_map(|(handle, d)| {
            let group = d
                .group_label
                .as_deref()
                .or_else(|| d.attributes.get("name").and_then(|n| by_name.get(n.as_str()).copied()))?;
            Some((handle, d, group.to_string()))
        })
        .collect()
}

fn choice_text(element: &ElementDescriptor) -> Option<&str> {
    element
        .display_text()
        .or_else(|| element.attributes.get("value").map(String::as_str))
}

#[async_trait]
impl PageAction for SelectRadioButtonAction {
    async fn execute_typed(&self, params: SelectRadioButtonParams, page: &PageContext) -> Result<ActionResult> {
        log::info!(
            "Selecting '{}' for question '{}'",
            params.choice_text,
            params.question_label
        );

        let radios = radio_groups(page.index());

        let mut questions: Vec<&str> = Vec::new();
        for (_, _, group) in &radios {
            if !questions.contains(&group.as_str()) {
                questions.push(group);
            }
        }
        let question_candidates: Vec<_> = questions.iter().map(|q| (q.to_string(), *q)).collect();
        let question = match_text(&question_candidates, &params.question_label)?.ok_or_else(|| {
            AgentError::ElementNotFound(format!("No radio group labeled '{}'", params.question_label))
        })?;

        let choices: Vec<_> = radios
            .iter()
            .filter(|(_, _, group)| *group == question)
            .filter_map(|(handle, d, _)| choice_text(d).map(|text| ((*handle, *d), text)))
            .collect();
        let (handle, element) = match_text(&choices, &params.choice_text)?.ok_or_else(|| {
            AgentError::ElementNotFound(format!(
                "No choice '{}' for question '{}'",
                params.choice_text, question
            ))
        })?;

        log::debug!("Clicking radio {} for '{}'", handle, question);
        page.browser().click(element).await?;

        Ok(ActionResult::success_with(format!(
            "Selected radio button '{}' for question '{}'",
            choice_text(element).unwrap_or(&params.choice_text),
            question
        )))
    }
}
