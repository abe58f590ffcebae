//! Decisions and the decision maker collaborator

use crate::actions::{ActionResult, ActionSpecView};
use crate::agent::history::StepRecord;
use crate::error::{AgentError, Result};
use async_trait::async_trait;
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

/// One chosen action with its bound parameters.
///
/// Serialized as a single-key object: `{"click_element": {"index": 3}}`.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionCall {
    pub name: String,
    pub params: Value,
}

impl ActionCall {
    pub fn new(name: impl Into<String>, params: Value) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    /// Element index referenced by the call, if any
    pub fn element_index(&self) -> Option<u64> {
        self.params.get("index").and_then(Value::as_u64)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) if map.len() == 1 => {
                let (name, params) = map.into_iter().next().ok_or_else(|| {
                    AgentError::DecisionMalformed("action object is empty".to_string())
                })?;
                Ok(Self::new(name, params))
            }
            Value::Object(map) => Err(AgentError::DecisionMalformed(format!(
                "each action must have exactly one key, got {}",
                map.len()
            ))),
            other => Err(AgentError::DecisionMalformed(format!(
                "each action must be an object, got {}",
                other
            ))),
        }
    }
}

impl fmt::Display for ActionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.params)
    }
}

impl Serialize for ActionCall {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.name, &self.params)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for ActionCall {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct CallVisitor;

        impl<'de> Visitor<'de> for CallVisitor {
            type Value = ActionCall;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object with exactly one action name key")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<ActionCall, A::Error> {
                let (name, params): (String, Value) = map
                    .next_entry()?
                    .ok_or_else(|| de::Error::custom("action object is empty"))?;
                if map.next_key::<String>()?.is_some() {
                    return Err(de::Error::custom("action object must have exactly one key"));
                }
                Ok(ActionCall::new(name, params))
            }
        }

        deserializer.deserialize_map(CallVisitor)
    }
}

/// Structured output of the decision maker for one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<String>,

    pub actions: Vec<ActionCall>,
}

impl Decision {
    pub fn new(actions: Vec<ActionCall>) -> Self {
        Self { thought: None, actions }
    }

    pub fn with_thought(mut self, thought: impl Into<String>) -> Self {
        self.thought = Some(thought.into());
        self
    }

    /// Single-action decision
    pub fn single(name: impl Into<String>, params: Value) -> Self {
        Self::new(vec![ActionCall::new(name, params)])
    }

    /// Parse raw model text. Accepts `{"thought", "actions"}` or
    /// `{"current_state": {...}, "action": [...]}`, optionally inside a
    /// ```json fence.
    pub fn from_model_output(text: &str) -> Result<Self> {
        let body = strip_code_fence(text);
        let value: Value = serde_json::from_str(body)
            .map_err(|e| AgentError::DecisionMalformed(format!("response is not valid JSON: {}", e)))?;
        Self::from_value(value)
    }

    /// Interpret an already parsed JSON value as a decision
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut map) = value else {
            return Err(AgentError::DecisionMalformed(
                "response must be a JSON object".to_string(),
            ));
        };

        let actions = match map.remove("actions").or_else(|| map.remove("action")) {
            Some(Value::Array(items)) => items
                .into_iter()
                .map(ActionCall::from_value)
                .collect::<Result<Vec<_>>>()?,
            Some(single @ Value::Object(_)) => vec![ActionCall::from_value(single)?],
            Some(other) => {
                return Err(AgentError::DecisionMalformed(format!(
                    "'action' must be a list, got {}",
                    other
                )));
            }
            None => {
                return Err(AgentError::DecisionMalformed(
                    "response has no 'action' list".to_string(),
                ));
            }
        };

        let thought = map
            .get("thought")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| map.get("current_state").and_then(thought_from_state));

        Ok(Self { thought, actions })
    }

    pub fn action_names(&self) -> Vec<&str> {
        self.actions.iter().map(|a| a.name.as_str()).collect()
    }
}

fn thought_from_state(state: &Value) -> Option<String> {
    let parts: Vec<String> = ["evaluation_previous_goal", "memory", "next_goal", "thought"]
        .iter()
        .filter_map(|key| {
            state
                .get(*key)
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .map(|s| format!("{}: {}", key, s.trim()))
        })
        .collect();
    if parts.is_empty() { None } else { Some(parts.join("\n")) }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Condensed past step shown to the decision maker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepView {
    pub sequence: u64,
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<String>,

    /// `name(params) -> outcome` per executed action
    pub actions: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepView {
    pub fn from_record(record: &StepRecord) -> Self {
        let actions = record
            .actions
            .iter()
            .map(|a| {
                let outcome = match &a.result {
                    ActionResult::Success { extracted_content, .. } => extracted_content
                        .as_deref()
                        .map(|c| crate::dom::element::truncate(c, 200))
                        .unwrap_or_else(|| "ok".to_string()),
                    ActionResult::Error { message, .. } => format!("error: {}", message),
                };
                format!("{} -> {}", a.call, outcome)
            })
            .collect();

        Self {
            sequence: record.sequence,
            url: record.page.url.clone(),
            thought: record.decision.as_ref().and_then(|d| d.thought.clone()),
            actions,
            error: record.error.as_ref().map(|e| e.message.clone()),
        }
    }
}

/// What the decision maker sees of the current page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageState {
    pub url: String,
    pub title: String,

    /// Generation of the element index listed in `elements`
    pub generation: u64,

    /// One line per indexed element: `[index]<tag ...>text</tag>`
    pub elements: String,

    /// Base64 PNG when vision is enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
}

/// Everything needed to choose the next actions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub task: String,
    pub step: u64,
    pub max_actions: usize,
    pub actions: Vec<ActionSpecView>,
    pub history: Vec<StepView>,

    /// Content earlier actions asked to keep in context
    pub memory: Vec<String>,

    /// Results of the previous step's actions, errors included
    pub previous_results: Vec<ActionResult>,

    pub page: PageState,

    /// Why the previous attempt for this step was rejected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correction: Option<String>,
}

/// The collaborator choosing actions, usually an LLM
#[async_trait]
pub trait DecisionMaker: Send + Sync {
    /// Produce one decision. Fail with [`AgentError::DecisionMalformed`] for
    /// unusable output and [`AgentError::CollaboratorUnavailable`] when the
    /// collaborator itself is gone.
    async fn decide(&self, request: &DecisionRequest) -> Result<Decision>;
}

/// Replays a fixed list of decisions in order
pub struct ScriptedDecisions {
    script: Mutex<VecDeque<Result<Decision>>>,
    repeat: Option<Decision>,
    requests: Mutex<Vec<DecisionRequest>>,
}

impl ScriptedDecisions {
    pub fn new(decisions: Vec<Decision>) -> Self {
        Self::from_results(decisions.into_iter().map(Ok).collect())
    }

    /// Script that may also yield errors, e.g. malformed output
    pub fn from_results(results: Vec<Result<Decision>>) -> Self {
        Self {
            script: Mutex::new(results.into()),
            repeat: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Return the same decision forever
    pub fn repeating(decision: Decision) -> Self {
        Self::new(Vec::new()).then_repeat(decision)
    }

    /// Once the script runs out, keep returning `decision`
    pub fn then_repeat(mut self, decision: Decision) -> Self {
        self.repeat = Some(decision);
        self
    }

    /// Load a JSON array of decisions in either accepted format
    pub fn from_json(json: &str) -> Result<Self> {
        let values: Vec<Value> = serde_json::from_str(json)?;
        let decisions = values
            .into_iter()
            .map(Decision::from_value)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(decisions))
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<DecisionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().map(|s| s.len()).unwrap_or(0)
    }
}

#[async_trait]
impl DecisionMaker for ScriptedDecisions {
    async fn decide(&self, request: &DecisionRequest) -> Result<Decision> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let next = self
            .script
            .lock()
            .map_err(|_| AgentError::CollaboratorUnavailable("decision script poisoned".to_string()))?
            .pop_front();

        match (next, &self.repeat) {
            (Some(result), _) => result,
            (None, Some(decision)) => Ok(decision.clone()),
            (None, None) => Err(AgentError::CollaboratorUnavailable(
                "decision script exhausted".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_call_is_single_key_object() {
        let call = ActionCall::new("click_element", json!({"index": 3}));
        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json, json!({"click_element": {"index": 3}}));

        let parsed: ActionCall = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, call);
        assert_eq!(parsed.element_index(), Some(3));

        assert!(serde_json::from_value::<ActionCall>(json!({"a": {}, "b": {}})).is_err());
        assert!(serde_json::from_value::<ActionCall>(json!({})).is_err());
    }

    #[test]
    fn test_parse_model_output_with_fence_and_state() {
        let text = r#"```json
{
  "current_state": {"evaluation_previous_goal": "Success", "memory": "", "next_goal": "Fill the name"},
  "action": [{"input_text": {"index": 1, "text": "Test User"}}, {"click_element": {"index": 2}}]
}
```"#;
        let decision = Decision::from_model_output(text).unwrap();
        assert_eq!(decision.action_names(), vec!["input_text", "click_element"]);
        let thought = decision.thought.unwrap();
        assert!(thought.contains("next_goal: Fill the name"));
        assert!(!thought.contains("memory"));
    }

    #[test]
    fn test_parse_plain_decision() {
        let decision =
            Decision::from_model_output(r#"{"thought": "done", "actions": [{"done": {"text": "ok"}}]}"#).unwrap();
        assert_eq!(decision.thought.as_deref(), Some("done"));
        assert_eq!(decision.actions[0].params, json!({"text": "ok"}));
    }

    #[test]
    fn test_malformed_outputs() {
        for text in [
            "I will click the button",
            "[1, 2]",
            r#"{"thought": "no actions"}"#,
            r#"{"action": "click"}"#,
            r#"{"action": [{"a": {}, "b": {}}]}"#,
            r#"{"action": [42]}"#,
        ] {
            assert!(
                matches!(Decision::from_model_output(text), Err(AgentError::DecisionMalformed(_))),
                "accepted {}",
                text
            );
        }
    }

    #[test]
    fn test_decision_serde_round_trip() {
        let decision = Decision::single("go_to_url", json!({"url": "example.com"})).with_thought("start");
        let json = serde_json::to_string(&decision).unwrap();
        let parsed: Decision = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, decision);
    }

    fn request() -> DecisionRequest {
        DecisionRequest {
            task: "t".to_string(),
            step: 1,
            max_actions: 10,
            actions: vec![],
            history: vec![],
            memory: vec![],
            previous_results: vec![],
            page: PageState {
                url: "about:blank".to_string(),
                title: String::new(),
                generation: 1,
                elements: String::new(),
                screenshot: None,
            },
            correction: None,
        }
    }

    #[tokio::test]
    async fn test_scripted_decisions_replay_in_order() {
        let script = ScriptedDecisions::new(vec![
            Decision::single("wait", json!({"seconds": 1})),
            Decision::single("done", json!({"text": "ok"})),
        ]);

        assert_eq!(script.decide(&request()).await.unwrap().action_names(), vec!["wait"]);
        assert_eq!(script.decide(&request()).await.unwrap().action_names(), vec!["done"]);
        assert!(matches!(
            script.decide(&request()).await,
            Err(AgentError::CollaboratorUnavailable(_))
        ));
        assert_eq!(script.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_scripted_decisions_repeat() {
        let script = ScriptedDecisions::repeating(Decision::single("wait", json!({})));
        for _ in 0..5 {
            assert!(script.decide(&request()).await.is_ok());
        }
        assert_eq!(script.remaining(), 0);
    }

    #[test]
    fn test_script_from_json() {
        let script = ScriptedDecisions::from_json(
            r#"[{"actions": [{"go_to_url": {"url": "example.com"}}]}, {"action": [{"done": {"text": "x"}}]}]"#,
        )
        .unwrap();
        assert_eq!(script.remaining(), 2);
    }
}
