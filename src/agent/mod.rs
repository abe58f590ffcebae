//! Step orchestration
//!
//! An [`Agent`] drives one run: every step observes the page, asks the
//! [`DecisionMaker`] for actions, executes them through the
//! [`ActionRegistry`] and appends a [`StepRecord`] to the run's [`History`].
//!
//! ```rust,no_run
//! use browser_agent::{ActionRegistry, Agent, AgentSettings, BrowserSession, LaunchOptions, ScriptedDecisions};
//! use std::sync::Arc;
//!
//! # async fn run() -> browser_agent::Result<()> {
//! let session = BrowserSession::launch(LaunchOptions::default())?;
//! let script = ScriptedDecisions::from_json(r#"[{"action": [{"done": {"text": "nothing to do"}}]}]"#)?;
//!
//! let result = Agent::new(
//!     "Open the example page",
//!     Arc::new(ActionRegistry::with_defaults()?),
//!     Arc::new(script),
//!     session.open_context()?,
//! )
//! .with_settings(AgentSettings::new().max_steps(5))
//! .run()
//! .await;
//!
//! println!("{:?}: {:?}", result.termination, result.result);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod decision;
pub mod history;
pub mod hooks;
pub mod prompt;
pub mod state;

pub use config::AgentSettings;
pub use decision::{ActionCall, Decision, DecisionMaker, DecisionRequest, PageState, ScriptedDecisions, StepView};
pub use history::{ExecutedAction, History, PageRef, StepError, StepRecord};
pub use hooks::{HookContext, StepHook, StepSummary};
pub use prompt::{PromptedDecisionMaker, TextModel};
pub use state::{RunState, RunStatus, TerminationReason};

use crate::actions::{ActionRegistry, ActionResult, Capability, Effect, PageContext};
use crate::browser::{screenshot_base64, BrowserHandle};
use crate::dom::ElementIndex;
use crate::error::{AgentError, Result};
use chrono::Utc;
use hooks::HookPhase;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Snapshots taken while the page is still loading before a step gives up
const OBSERVE_ATTEMPTS: u32 = 3;

/// Pause between snapshots of an unsettled page
const SETTLE_DELAY: Duration = Duration::from_millis(200);

/// Outcome of a finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: Uuid,

    /// Whether an action signalled completion
    pub done: bool,

    /// Text of the completing action
    pub result: Option<String>,

    /// Steps executed
    pub steps: u64,

    pub termination: TerminationReason,

    /// Error behind a failed termination
    pub error: Option<String>,

    pub history: History,
}

impl RunResult {
    pub fn is_successful(&self) -> bool {
        self.termination == TerminationReason::Done
    }
}

/// Drives a task to completion against one browsing context
pub struct Agent {
    task: String,
    registry: Arc<ActionRegistry>,
    decision_maker: Arc<dyn DecisionMaker>,
    browser: BrowserHandle,
    settings: AgentSettings,
    hooks: Vec<Arc<dyn StepHook>>,
    cancel: CancellationToken,
    run_id: Uuid,
}

/// Everything a step produced, before it is appended to the history
struct StepOutcome {
    record: StepRecord,
    fatal: Option<AgentError>,
}

impl Agent {
    /// Create an agent. The registry may be shared between concurrent runs;
    /// the browser handle must be this run's own context. The caller owns the
    /// context: it stays open after the run unless
    /// [`AgentSettings::close_on_finish`] is set.
    pub fn new(
        task: impl Into<String>,
        registry: Arc<ActionRegistry>,
        decision_maker: Arc<dyn DecisionMaker>,
        browser: BrowserHandle,
    ) -> Self {
        Self {
            task: task.into(),
            registry,
            decision_maker,
            browser,
            settings: AgentSettings::default(),
            hooks: Vec::new(),
            cancel: CancellationToken::new(),
            run_id: Uuid::new_v4(),
        }
    }

    pub fn with_settings(mut self, settings: AgentSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_hook(self, hook: impl StepHook + 'static) -> Self {
        self.with_shared_hook(Arc::new(hook))
    }

    pub fn with_shared_hook(mut self, hook: Arc<dyn StepHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Stop the run between steps once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn registry(&self) -> &Arc<ActionRegistry> {
        &self.registry
    }

    /// Token that cancels this run
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run steps until an action signals completion, a limit is hit, a
    /// collaborator fails or the run is cancelled. Never fails: every ending
    /// is reported through [`RunResult::termination`].
    pub async fn run(self) -> RunResult {
        let mut state = RunState::new(
            self.run_id,
            self.settings.max_steps,
            self.settings.max_consecutive_failures,
        );
        let mut history = History::new();
        let mut generation = 0;
        let mut fatal: Option<AgentError> = None;

        state.start();
        log::info!("Run {} started: {}", self.run_id, self.task);

        let termination = loop {
            if self.cancel.is_cancelled() {
                break TerminationReason::Cancelled;
            }
            if state.step_limit_reached() {
                break TerminationReason::StepLimitReached;
            }

            let sequence = state.begin_step();
            log::info!("Run {} step {}", self.run_id, sequence);

            let outcome = self.step(sequence, &state, &history, &mut generation).await;
            let success = outcome.record.is_success();
            let done = outcome.record.is_done();
            if let Some(message) = outcome.record.error_message() {
                log::warn!("Step {} failed: {}", sequence, message);
            }

            if let Err(e) = history.append(outcome.record) {
                log::error!("Run {} could not record step {}: {}", self.run_id, sequence, e);
                fatal = Some(e);
                break TerminationReason::CollaboratorUnavailable;
            }

            if success {
                state.record_success();
            } else {
                state.record_failure();
            }
            if done {
                state.mark_done(history.final_result().map(str::to_string));
            }

            self.notify(HookPhase::StepEnd, sequence, &state, &history).await;

            if state.is_done() {
                break TerminationReason::Done;
            }
            if let Some(e) = outcome.fatal {
                log::error!("Run {} lost a collaborator: {}", self.run_id, e);
                fatal = Some(e);
                break TerminationReason::CollaboratorUnavailable;
            }
            if state.failure_limit_reached() {
                break TerminationReason::FailureLimitReached;
            }
        };

        state.terminate(termination);
        if self.settings.close_on_finish {
            if let Err(e) = self.bounded("close context", self.browser.close()).await {
                log::warn!("Run {} could not close its browser context: {}", self.run_id, e);
            }
        }
        log::info!(
            "Run {} finished after {} steps: {:?}",
            self.run_id,
            state.current_step(),
            termination
        );

        let error = match termination {
            TerminationReason::CollaboratorUnavailable => fatal.map(|e| e.to_string()),
            TerminationReason::FailureLimitReached => history.last().and_then(StepRecord::error_message).map(str::to_string),
            TerminationReason::StepLimitReached => Some(
                AgentError::RunLimitExceeded(format!("step limit of {} reached", state.max_steps())).to_string(),
            ),
            _ => None,
        };

        RunResult {
            run_id: self.run_id,
            done: state.is_done(),
            result: state.result().map(str::to_string),
            steps: state.current_step(),
            termination,
            error,
            history,
        }
    }

    async fn step(&self, sequence: u64, state: &RunState, history: &History, generation: &mut u64) -> StepOutcome {
        let started_at = Utc::now();

        let observed = self.observe(generation).await;
        self.notify(HookPhase::StepStart, sequence, state, history).await;

        let index = match observed {
            Ok(index) => index,
            Err(e) => {
                let url = self.bounded("current url", self.browser.current_url()).await.unwrap_or_default();
                return StepOutcome {
                    record: StepRecord {
                        sequence,
                        page: PageRef::new(url),
                        decision: None,
                        actions: Vec::new(),
                        error: Some(StepError::from(&e)),
                        started_at,
                        finished_at: Utc::now(),
                    },
                    fatal: e.is_fatal().then_some(e),
                };
            }
        };

        let page = self.page_ref(&index).await;
        let mut request = self.request(sequence, history, &index, page.screenshot.clone());

        let decision = match self.decide(&mut request).await {
            Ok(decision) => decision,
            Err(e) => {
                return StepOutcome {
                    record: StepRecord {
                        sequence,
                        page,
                        decision: None,
                        actions: Vec::new(),
                        error: Some(StepError::from(&e)),
                        started_at,
                        finished_at: Utc::now(),
                    },
                    fatal: e.is_fatal().then_some(e),
                };
            }
        };
        log::debug!("Step {} decision: {:?}", sequence, decision);

        let (actions, fatal) = self.execute(&decision, index, generation).await;

        StepOutcome {
            record: StepRecord {
                sequence,
                page,
                decision: Some(decision),
                actions,
                error: None,
                started_at,
                finished_at: Utc::now(),
            },
            fatal,
        }
    }

    /// Snapshot the page and build a fresh element index
    async fn observe(&self, generation: &mut u64) -> Result<Arc<ElementIndex>> {
        let mut attempt = 1;
        loop {
            let snapshot = self.bounded("page snapshot", self.browser.snapshot()).await?;
            *generation += 1;

            match ElementIndex::build(snapshot, *generation, &self.settings.index_options()) {
                Ok(index) => return Ok(Arc::new(index)),
                Err(AgentError::StaleIndex(reason)) if attempt < OBSERVE_ATTEMPTS => {
                    log::debug!("Page not settled ({}), observing again", reason);
                    attempt += 1;
                    tokio::time::sleep(SETTLE_DELAY).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn page_ref(&self, index: &ElementIndex) -> PageRef {
        let mut page = PageRef::new(index.url());
        page.title = index.title().to_string();

        if self.settings.record_page_content {
            match self.bounded("page html", self.browser.page_html()).await {
                Ok(html) => page.html = Some(html),
                Err(e) => log::warn!("Could not record page content: {}", e),
            }
        }
        if self.settings.use_vision {
            match self.bounded("screenshot", screenshot_base64(self.browser.as_ref())).await {
                Ok(shot) => page.screenshot = Some(shot),
                Err(e) => log::warn!("Could not take screenshot: {}", e),
            }
        }
        page
    }

    fn request(&self, sequence: u64, history: &History, index: &ElementIndex, screenshot: Option<String>) -> DecisionRequest {
        let previous_results = history
            .last()
            .map(|record| {
                let mut results: Vec<ActionResult> = record.actions.iter().map(|a| a.result.clone()).collect();
                if let Some(error) = &record.error {
                    results.push(ActionResult::error(error.kind, error.message.clone()));
                }
                results
            })
            .unwrap_or_default();

        DecisionRequest {
            task: self.task.clone(),
            step: sequence,
            max_actions: self.settings.max_actions_per_step,
            actions: self.registry.catalogue(),
            history: history
                .window(self.settings.history_window)
                .iter()
                .map(StepView::from_record)
                .collect(),
            memory: history.memory().map(str::to_string).collect(),
            previous_results,
            page: PageState {
                url: index.url().to_string(),
                title: index.title().to_string(),
                generation: index.generation(),
                elements: index.describe(),
                screenshot,
            },
            correction: None,
        }
    }

    /// Ask for a decision, retrying malformed or invalid ones with a correction
    async fn decide(&self, request: &mut DecisionRequest) -> Result<Decision> {
        let attempts = self.settings.decision_retries + 1;
        let mut rejected = AgentError::DecisionMalformed("no decision was requested".to_string());

        for attempt in 1..=attempts {
            let decided = self
                .bounded_by(
                    self.settings.decision_timeout,
                    "decision",
                    self.decision_maker.decide(request),
                )
                .await;

            match decided.and_then(|decision| self.check(decision)) {
                Ok(decision) => return Ok(decision),
                Err(e @ (AgentError::DecisionMalformed(_) | AgentError::Validation { .. })) => {
                    log::warn!("Decision attempt {} of {} rejected: {}", attempt, attempts, e);
                    request.correction = Some(e.to_string());
                    rejected = e;
                }
                Err(e) => return Err(e),
            }
        }
        Err(rejected)
    }

    /// Reject empty decisions and bad parameters of known actions. Unknown
    /// actions pass through and fail when executed.
    fn check(&self, mut decision: Decision) -> Result<Decision> {
        if decision.actions.is_empty() {
            return Err(AgentError::DecisionMalformed("decision contains no actions".to_string()));
        }

        let max = self.settings.max_actions_per_step;
        if decision.actions.len() > max {
            log::warn!(
                "Decision has {} actions, keeping the first {}",
                decision.actions.len(),
                max
            );
            decision.actions.truncate(max);
        }

        for call in &decision.actions {
            if self.registry.contains(&call.name) {
                self.registry.validate(&call.name, &call.params)?;
            }
        }
        Ok(decision)
    }

    /// Run the decision's actions in order, stopping at the first error or at
    /// completion. Returns the executed actions and any fatal error.
    async fn execute(
        &self,
        decision: &Decision,
        mut index: Arc<ElementIndex>,
        generation: &mut u64,
    ) -> (Vec<ExecutedAction>, Option<AgentError>) {
        let observed_generation = index.generation();
        let mut stale = false;
        let mut executed = Vec::with_capacity(decision.actions.len());

        for call in &decision.actions {
            let outcome = self
                .execute_call(call, &mut index, &mut stale, observed_generation, generation)
                .await;

            let (result, fatal) = match outcome {
                Ok(result) => (result, None),
                Err(e) => {
                    let result = ActionResult::from(&e);
                    (result, e.is_fatal().then_some(e))
                }
            };
            log::debug!("{} -> {:?}", call, result);

            let stop = result.is_error() || result.is_done();
            executed.push(ExecutedAction {
                call: call.clone(),
                result,
            });
            if fatal.is_some() {
                return (executed, fatal);
            }
            if stop {
                break;
            }
        }
        (executed, None)
    }

    async fn execute_call(
        &self,
        call: &ActionCall,
        index: &mut Arc<ElementIndex>,
        stale: &mut bool,
        observed_generation: u64,
        generation: &mut u64,
    ) -> Result<ActionResult> {
        let definition = self.registry.validate(&call.name, &call.params)?;

        if definition.capability() == Capability::PageIndex && *stale {
            *index = self.observe(generation).await?;
            *stale = false;
        }

        let page = PageContext::new(self.browser.clone(), index.clone(), observed_generation);
        let result = self
            .bounded_by(
                self.settings.action_timeout,
                &format!("action '{}'", call.name),
                definition.handler().invoke(&call.name, call.params.clone(), &page),
            )
            .await;

        if definition.effect() == Effect::MutatesPage {
            *stale = true;
        }
        result
    }

    async fn notify(&self, phase: HookPhase, step: u64, state: &RunState, history: &History) {
        if self.hooks.is_empty() {
            return;
        }
        let ctx = HookContext {
            run_id: self.run_id,
            task: &self.task,
            step,
            state,
            history,
            browser: &self.browser,
        };
        hooks::dispatch(&self.hooks, phase, &ctx, self.settings.hook_timeout).await;
    }

    async fn bounded<T>(&self, what: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        self.bounded_by(self.settings.action_timeout, what, fut).await
    }

    async fn bounded_by<T>(&self, limit: Duration, what: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| AgentError::Timeout(format!("{} exceeded {:?}", what, limit)))?
    }
}
