//! Prompt rendering for text-completion decision makers

use crate::actions::ActionResult;
use crate::agent::decision::{Decision, DecisionMaker, DecisionRequest};
use crate::error::Result;
use async_trait::async_trait;
use std::fmt::Write;

/// A text completion model: system and user message in, raw text out
#[async_trait]
pub trait TextModel: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// Render the system message: rules, response format and action catalogue
pub fn system_message(request: &DecisionRequest) -> String {
    let mut out = String::from(
        "You are a browser automation agent. You see the current page as a list of \
         interactive elements, each prefixed with its index in square brackets. \
         Choose the next actions to accomplish the task.\n\n",
    );

    out.push_str("Rules:\n");
    out.push_str("- Only use indexes listed in the current page state.\n");
    let _ = writeln!(out, "- Use at most {} actions per step.", request.max_actions);
    out.push_str("- Actions that change the page end the usable indexes; later actions in the same step fail.\n");
    out.push_str("- When the task is complete, call `done` with the final result.\n\n");

    out.push_str("Respond with JSON only:\n");
    out.push_str(
        "{\"current_state\": {\"evaluation_previous_goal\": \"...\", \"memory\": \"...\", \"next_goal\": \"...\"}, \
         \"action\": [{\"<action_name>\": {<parameters>}}]}\n\n",
    );

    out.push_str("Available actions:\n");
    for action in &request.actions {
        let _ = writeln!(out, "- {}: {}", action.name, action.description);
        let _ = writeln!(out, "  parameters: {}", action.parameters);
    }
    out
}

/// Render the user message: task, context and current page
pub fn user_message(request: &DecisionRequest) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Task: {}", request.task);
    let _ = writeln!(out, "Step: {}", request.step);

    if !request.memory.is_empty() {
        out.push_str("\nMemory:\n");
        for item in &request.memory {
            let _ = writeln!(out, "- {}", item);
        }
    }

    if !request.history.is_empty() {
        out.push_str("\nPrevious steps:\n");
        for step in &request.history {
            let _ = writeln!(out, "Step {} at {}", step.sequence, step.url);
            if let Some(thought) = &step.thought {
                let _ = writeln!(out, "  thought: {}", thought.replace('\n', " | "));
            }
            for action in &step.actions {
                let _ = writeln!(out, "  {}", action);
            }
            if let Some(error) = &step.error {
                let _ = writeln!(out, "  error: {}", error);
            }
        }
    }

    if !request.previous_results.is_empty() {
        out.push_str("\nResults of your last actions:\n");
        for result in &request.previous_results {
            match result {
                ActionResult::Success { extracted_content, .. } => {
                    let _ = writeln!(out, "- ok: {}", extracted_content.as_deref().unwrap_or("done"));
                }
                ActionResult::Error { message, .. } => {
                    let _ = writeln!(out, "- error: {}", message);
                }
            }
        }
    }

    out.push_str("\nCurrent page:\n");
    let _ = writeln!(out, "URL: {}", request.page.url);
    if !request.page.title.is_empty() {
        let _ = writeln!(out, "Title: {}", request.page.title);
    }
    out.push_str("Interactive elements:\n");
    if request.page.elements.is_empty() {
        out.push_str("(none)\n");
    } else {
        out.push_str(&request.page.elements);
        out.push('\n');
    }
    if request.page.screenshot.is_some() {
        out.push_str("A screenshot of the viewport is attached.\n");
    }

    if let Some(correction) = &request.correction {
        let _ = writeln!(out, "\nYour previous response was rejected: {}", correction);
        out.push_str("Answer again with valid JSON in the required format.\n");
    }
    out
}

/// Decision maker backed by a [`TextModel`]
pub struct PromptedDecisionMaker<M> {
    model: M,
}

impl<M: TextModel> PromptedDecisionMaker<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &M {
        &self.model
    }
}

#[async_trait]
impl<M: TextModel> DecisionMaker for PromptedDecisionMaker<M> {
    async fn decide(&self, request: &DecisionRequest) -> Result<Decision> {
        let system = system_message(request);
        let user = user_message(request);

        let text = self.model.complete(&system, &user).await?;
        log::debug!("Model response: {}", text);
        Decision::from_model_output(&text)
    }
}
