use crate::actions::handler::Handler;
use crate::actions::schema::{self, normalize_params, JsonSchemaValidator, SchemaValidator};
use crate::actions::{Action, ActionResult, ActionSpec, BrowserAction, Capability, Effect, PageAction, PageContext};
use crate::browser::BrowserHandle;
use crate::error::{AgentError, Result};
use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// A registered action: metadata shown to the decision maker plus its handler
#[derive(Debug, Clone)]
pub struct ActionDefinition {
    name: String,
    description: String,
    parameter_schema: Value,
    effect: Effect,
    handler: Handler,
}

impl ActionDefinition {
    /// Define an action from parts. The schema is what parameters are
    /// validated against before `handler` runs.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameter_schema: Value,
        handler: Handler,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameter_schema,
            effect: Effect::ReadOnly,
            handler,
        }
    }

    fn from_spec<A: ActionSpec>(action: &A) -> (String, String, Value, Effect) {
        (
            action.name().to_string(),
            action.description().to_string(),
            action.parameters_schema(),
            action.effect(),
        )
    }

    fn assemble((name, description, parameter_schema, effect): (String, String, Value, Effect), handler: Handler) -> Self {
        Self {
            name,
            description,
            parameter_schema,
            effect,
            handler,
        }
    }

    pub fn from_action<A: Action>(action: A) -> Self {
        let spec = Self::from_spec(&action);
        Self::assemble(spec, Handler::from_action(action))
    }

    pub fn from_browser_action<A: BrowserAction>(action: A) -> Self {
        let spec = Self::from_spec(&action);
        Self::assemble(spec, Handler::from_browser_action(action))
    }

    pub fn from_page_action<A: PageAction>(action: A) -> Self {
        let spec = Self::from_spec(&action);
        Self::assemble(spec, Handler::from_page_action(action))
    }

    /// Action backed by a closure over its typed parameters
    pub fn from_fn<P, R, F, Fut>(name: impl Into<String>, description: impl Into<String>, f: F) -> Self
    where
        P: DeserializeOwned + JsonSchema + Send + 'static,
        R: Into<ActionResult> + Send + 'static,
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        Self::new(name, description, schema::schema_of::<P>(), Handler::from_fn(f))
    }

    /// Closure action that also receives the run's browser
    pub fn from_browser_fn<P, R, F, Fut>(name: impl Into<String>, description: impl Into<String>, f: F) -> Self
    where
        P: DeserializeOwned + JsonSchema + Send + 'static,
        R: Into<ActionResult> + Send + 'static,
        F: Fn(P, BrowserHandle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        Self::new(name, description, schema::schema_of::<P>(), Handler::from_browser_fn(f))
    }

    /// Closure action that also receives the current page index
    pub fn from_page_fn<P, R, F, Fut>(name: impl Into<String>, description: impl Into<String>, f: F) -> Self
    where
        P: DeserializeOwned + JsonSchema + Send + 'static,
        R: Into<ActionResult> + Send + 'static,
        F: Fn(P, PageContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        Self::new(name, description, schema::schema_of::<P>(), Handler::from_page_fn(f))
    }

    /// Mark the action as able to change the page, which invalidates the
    /// element index after it runs
    pub fn mutates_page(mut self) -> Self {
        self.effect = Effect::MutatesPage;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    pub fn effect(&self) -> Effect {
        self.effect
    }

    pub fn capability(&self) -> Capability {
        self.handler.capability()
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    pub fn view(&self) -> ActionSpecView {
        ActionSpecView {
            name: self.name.clone(),
            description: self.description.clone(),
            capability: self.capability(),
            parameters: self.parameter_schema.clone(),
        }
    }
}

/// Serializable catalogue entry presented to the decision maker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionSpecView {
    pub name: String,
    pub description: String,
    pub capability: Capability,
    pub parameters: Value,
}

/// Registry of the actions available to a run, in registration order
#[derive(Clone)]
pub struct ActionRegistry {
    actions: IndexMap<String, ActionDefinition>,
    validator: Arc<dyn SchemaValidator>,
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ActionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            actions: IndexMap::new(),
            validator: Arc::new(JsonSchemaValidator::new()),
        }
    }

    /// Create a registry holding the built-in actions
    pub fn with_defaults() -> Result<Self> {
        Self::with_builtins(&crate::actions::builtin::BuiltinConfig::default())
    }

    /// Create a registry holding the built-in actions configured by `config`
    pub fn with_builtins(config: &crate::actions::builtin::BuiltinConfig) -> Result<Self> {
        let mut registry = Self::new();
        crate::actions::builtin::register_all(&mut registry, config)?;
        Ok(registry)
    }

    /// Replace the parameter validator
    pub fn with_validator(mut self, validator: impl SchemaValidator + 'static) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    /// Register an action. Names are unique; a second registration under the
    /// same name fails and the first one is kept.
    pub fn register(&mut self, definition: ActionDefinition) -> Result<()> {
        if self.actions.contains_key(definition.name()) {
            return Err(AgentError::DuplicateAction(definition.name().to_string()));
        }
        self.validator.prepare(definition.name(), definition.parameter_schema())?;
        log::debug!("Registered action '{}'", definition.name());
        self.actions.insert(definition.name().to_string(), definition);
        Ok(())
    }

    pub fn register_action<A: Action>(&mut self, action: A) -> Result<()> {
        self.register(ActionDefinition::from_action(action))
    }

    pub fn register_browser_action<A: BrowserAction>(&mut self, action: A) -> Result<()> {
        self.register(ActionDefinition::from_browser_action(action))
    }

    pub fn register_page_action<A: PageAction>(&mut self, action: A) -> Result<()> {
        self.register(ActionDefinition::from_page_action(action))
    }

    /// Look up an action by name
    pub fn resolve(&self, name: &str) -> Result<&ActionDefinition> {
        self.actions
            .get(name)
            .ok_or_else(|| AgentError::UnknownAction(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// Every definition, in registration order
    pub fn list_actions(&self) -> impl Iterator<Item = &ActionDefinition> {
        self.actions.values()
    }

    pub fn names(&self) -> Vec<&str> {
        self.actions.keys().map(String::as_str).collect()
    }

    /// Catalogue shown to the decision maker
    pub fn catalogue(&self) -> Vec<ActionSpecView> {
        self.list_actions().map(ActionDefinition::view).collect()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Resolve `name` and check `params` against its schema
    pub fn validate(&self, name: &str, params: &Value) -> Result<&ActionDefinition> {
        let definition = self.resolve(name)?;
        let params = normalize_params(params.clone());
        self.validator.validate(name, definition.parameter_schema(), &params)?;
        Ok(definition)
    }

    /// Validate and run an action
    pub async fn execute(&self, name: &str, params: Value, page: &PageContext) -> Result<ActionResult> {
        let definition = self.validate(name, &params)?;
        definition.handler().invoke(name, params, page).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{Action, ActionSpec};
    use async_trait::async_trait;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, JsonSchema)]
    struct EchoParams {
        text: String,
    }

    struct EchoAction;

    impl ActionSpec for EchoAction {
        type Params = EchoParams;

        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Repeat the text"
        }
    }

    #[async_trait]
    impl Action for EchoAction {
        async fn execute_typed(&self, params: EchoParams) -> Result<ActionResult> {
            Ok(ActionResult::success_with(params.text))
        }
    }

    #[test]
    fn test_duplicate_registration_keeps_first() {
        let mut registry = ActionRegistry::new();
        registry.register_action(EchoAction).unwrap();

        let second = ActionDefinition::from_fn("echo", "Other echo", |_: EchoParams| async { Ok(()) });
        let err = registry.register(second).unwrap_err();
        assert!(matches!(err, AgentError::DuplicateAction(ref n) if n == "echo"));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.resolve("echo").unwrap().description(), "Repeat the text");
    }

    #[test]
    fn test_resolve_unknown() {
        let registry = ActionRegistry::new();
        assert!(matches!(
            registry.resolve("nonexistent_action"),
            Err(AgentError::UnknownAction(ref n)) if n == "nonexistent_action"
        ));
    }

    #[test]
    fn test_listing_follows_registration_order() {
        let mut registry = ActionRegistry::new();
        registry
            .register(ActionDefinition::from_fn("zeta", "", |_: Value| async { Ok(()) }))
            .unwrap();
        registry.register_action(EchoAction).unwrap();
        registry
            .register(ActionDefinition::from_fn("alpha", "", |_: Value| async { Ok(()) }))
            .unwrap();

        let names: Vec<_> = registry.list_actions().map(|d| d.name()).collect();
        assert_eq!(names, vec!["zeta", "echo", "alpha"]);
        assert_eq!(registry.names(), names);
    }

    #[test]
    fn test_typed_action_metadata() {
        let def = ActionDefinition::from_action(EchoAction);
        assert_eq!(def.name(), "echo");
        assert_eq!(def.capability(), Capability::None);
        assert_eq!(def.effect(), Effect::ReadOnly);
        assert_eq!(def.parameter_schema()["required"], json!(["text"]));

        let view = def.view();
        assert_eq!(view.name, "echo");
        assert_eq!(view.parameters["properties"]["text"]["type"], "string");
    }

    #[test]
    fn test_validate_against_schema() {
        let mut registry = ActionRegistry::new();
        registry.register_action(EchoAction).unwrap();

        assert!(registry.validate("echo", &json!({"text": "hi"})).is_ok());

        match registry.validate("echo", &json!({"text": 5})) {
            Err(AgentError::Validation { action, fields }) => {
                assert_eq!(action, "echo");
                assert_eq!(fields[0].field, "text");
            }
            other => panic!("expected validation error, got {:?}", other),
        }

        assert!(matches!(
            registry.validate("missing", &json!({})),
            Err(AgentError::UnknownAction(_))
        ));
    }

    #[test]
    fn test_register_rejects_unusable_schema() {
        let mut registry = ActionRegistry::new();
        let broken = ActionDefinition::new(
            "broken",
            "Schema with an unknown type",
            json!({"type": "text"}),
            Handler::from_fn(|_: Value| async { Ok(()) }),
        );

        assert!(matches!(registry.register(broken), Err(AgentError::Validation { .. })));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_mutates_page_marker() {
        let def = ActionDefinition::from_fn("submit", "", |_: Value| async { Ok(()) }).mutates_page();
        assert_eq!(def.effect(), Effect::MutatesPage);
    }

    #[test]
    fn test_custom_validator_is_used() {
        struct RejectAll;

        impl SchemaValidator for RejectAll {
            fn validate(&self, action: &str, _schema: &Value, _params: &Value) -> Result<()> {
                Err(AgentError::Validation {
                    action: action.to_string(),
                    fields: vec![],
                })
            }
        }

        let mut registry = ActionRegistry::new().with_validator(RejectAll);
        registry.register_action(EchoAction).unwrap();
        assert!(registry.validate("echo", &json!({"text": "hi"})).is_err());
    }

    #[test]
    fn test_defaults_are_registered() {
        let registry = ActionRegistry::with_defaults().unwrap();
        for name in [
            "done",
            "go_to_url",
            "go_back",
            "click_element",
            "input_text",
            "upload_file",
            "extract_content",
            "fill_text_field_by_label",
            "select_radio_button",
            "wait",
        ] {
            assert!(registry.contains(name), "missing built-in {}", name);
        }
    }
}
