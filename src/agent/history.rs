//! Append-only record of a run's steps

use crate::actions::ActionResult;
use crate::agent::decision::{ActionCall, Decision};
use crate::error::{AgentError, ErrorKind, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Page the step observed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageRef {
    pub url: String,

    #[serde(default)]
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,

    /// Base64 PNG
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
}

impl PageRef {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

/// An action the step ran, with its outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutedAction {
    pub call: ActionCall,
    pub result: ActionResult,
}

/// Failure that prevented the step from executing its actions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&AgentError> for StepError {
    fn from(e: &AgentError) -> Self {
        Self {
            kind: e.kind(),
            message: e.feedback(),
        }
    }
}

/// One step of a run. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Position in the history, starting at 1
    pub sequence: u64,

    pub page: PageRef,

    /// `None` when no usable decision was obtained
    #[serde(default)]
    pub decision: Option<Decision>,

    #[serde(default)]
    pub actions: Vec<ExecutedAction>,

    #[serde(default)]
    pub error: Option<StepError>,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl StepRecord {
    /// True when a decision was executed and no action failed
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.actions.iter().all(|a| !a.result.is_error())
    }

    pub fn is_done(&self) -> bool {
        self.actions.iter().any(|a| a.result.is_done())
    }

    /// First failure of the step, step-level or per action
    pub fn error_message(&self) -> Option<&str> {
        self.error
            .as_ref()
            .map(|e| e.message.as_str())
            .or_else(|| self.actions.iter().find_map(|a| a.result.error_message()))
    }

    pub fn duration(&self) -> Duration {
        (self.finished_at - self.started_at).to_std().unwrap_or_default()
    }
}

/// Ordered, append-only log of one run's steps
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<StepRecord>", into = "Vec<StepRecord>")]
pub struct History {
    records: Vec<StepRecord>,
}

impl TryFrom<Vec<StepRecord>> for History {
    type Error = AgentError;

    fn try_from(records: Vec<StepRecord>) -> Result<Self> {
        let mut history = History::new();
        for record in records {
            history.append(record)?;
        }
        Ok(history)
    }
}

impl From<History> for Vec<StepRecord> {
    fn from(history: History) -> Self {
        history.records
    }
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the next record; its sequence must be `len() + 1`
    pub fn append(&mut self, record: StepRecord) -> Result<()> {
        let expected = self.records.len() as u64 + 1;
        if record.sequence != expected {
            return Err(AgentError::OutOfOrder {
                expected,
                got: record.sequence,
            });
        }
        self.records.push(record);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub fn last(&self) -> Option<&StepRecord> {
        self.records.last()
    }

    /// The most recent `window` records, or all of them
    pub fn window(&self, window: Option<usize>) -> &[StepRecord] {
        match window {
            Some(n) => &self.records[self.records.len().saturating_sub(n)..],
            None => &self.records,
        }
    }

    /// URL observed by each step
    pub fn urls(&self) -> impl Iterator<Item = &str> + '_ {
        self.records.iter().map(|r| r.page.url.as_str())
    }

    /// Content reported by successful actions, in order
    pub fn extracted_content(&self) -> impl Iterator<Item = &str> + '_ {
        self.records
            .iter()
            .flat_map(|r| r.actions.iter())
            .filter_map(|a| a.result.extracted_content())
    }

    /// Content actions asked to keep in the decision context
    pub fn memory(&self) -> impl Iterator<Item = &str> + '_ {
        self.records
            .iter()
            .flat_map(|r| r.actions.iter())
            .filter(|a| a.result.include_in_memory())
            .filter_map(|a| a.result.extracted_content())
    }

    pub fn model_thoughts(&self) -> impl Iterator<Item = &str> + '_ {
        self.model_outputs().filter_map(|d| d.thought.as_deref())
    }

    /// Decisions as returned by the decision maker
    pub fn model_outputs(&self) -> impl Iterator<Item = &Decision> + '_ {
        self.records.iter().filter_map(|r| r.decision.as_ref())
    }

    /// Every executed action with its result
    pub fn model_actions(&self) -> impl Iterator<Item = &ExecutedAction> + '_ {
        self.records.iter().flat_map(|r| r.actions.iter())
    }

    /// First error of each step, `None` for successful steps
    pub fn errors(&self) -> impl Iterator<Item = Option<&str>> + '_ {
        self.records.iter().map(StepRecord::error_message)
    }

    pub fn is_done(&self) -> bool {
        self.last().is_some_and(StepRecord::is_done)
    }

    /// Content of the completing action, if the run finished
    pub fn final_result(&self) -> Option<&str> {
        self.last()?
            .actions
            .iter()
            .find(|a| a.result.is_done())
            .and_then(|a| a.result.extracted_content())
    }

    pub fn total_duration(&self) -> Duration {
        self.records.iter().map(StepRecord::duration).sum()
    }

    /// Lossless JSON form
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse JSON produced by [`History::to_json`], re-checking sequence order
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// JSON for external consumers that never fails; a record that cannot be
    /// represented degrades to its sequence and debug text
    pub fn to_value_safe(&self) -> Value {
        Value::Array(
            self.records
                .iter()
                .map(|record| {
                    serde_json::to_value(record).unwrap_or_else(|e| {
                        log::debug!("Step {} is not serializable: {}", record.sequence, e);
                        serde_json::json!({ "sequence": record.sequence, "debug": format!("{:?}", record) })
                    })
                })
                .collect(),
        )
    }

    pub fn to_json_safe(&self) -> String {
        self.to_value_safe().to_string()
    }
}

/// Serialize anything, falling back to its debug text
pub(crate) fn safe_value<T: Serialize + std::fmt::Debug>(item: &T) -> Value {
    serde_json::to_value(item).unwrap_or_else(|e| {
        log::debug!("Falling back to debug text: {}", e);
        serde_json::json!({ "debug": format!("{:?}", item) })
    })
}
