use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Idle,
    Running,
    Done,
    Failed,
    StepLimitReached,
    Cancelled,
}

/// Why a run ended. Every run ends with exactly one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// An action signalled completion
    Done,
    StepLimitReached,
    FailureLimitReached,
    /// The browser or decision maker became unusable
    CollaboratorUnavailable,
    Cancelled,
}

impl TerminationReason {
    pub fn status(self) -> RunStatus {
        match self {
            TerminationReason::Done => RunStatus::Done,
            TerminationReason::StepLimitReached => RunStatus::StepLimitReached,
            TerminationReason::FailureLimitReached | TerminationReason::CollaboratorUnavailable => {
                RunStatus::Failed
            }
            TerminationReason::Cancelled => RunStatus::Cancelled,
        }
    }
}

/// Counters and termination status of one run, mutated only by the agent
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunState {
    run_id: Uuid,
    status: RunStatus,
    current_step: u64,
    consecutive_failures: u32,
    max_steps: u64,
    max_consecutive_failures: u32,
    done: bool,
    result: Option<String>,
    termination: Option<TerminationReason>,
}

impl RunState {
    pub fn new(run_id: Uuid, max_steps: u64, max_consecutive_failures: u32) -> Self {
        Self {
            run_id,
            status: RunStatus::Idle,
            current_step: 0,
            consecutive_failures: 0,
            max_steps,
            max_consecutive_failures,
            done: false,
            result: None,
            termination: None,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Number of steps started so far, equal to the history length between steps
    pub fn current_step(&self) -> u64 {
        self.current_step
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn max_steps(&self) -> u64 {
        self.max_steps
    }

    pub fn max_consecutive_failures(&self) -> u32 {
        self.max_consecutive_failures
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    pub fn termination(&self) -> Option<TerminationReason> {
        self.termination
    }

    pub fn step_limit_reached(&self) -> bool {
        self.current_step >= self.max_steps
    }

    /// True once the current failure streak reaches the limit. A limit of 0
    /// behaves like 1: the first failure ends the run, a success never does.
    pub fn failure_limit_reached(&self) -> bool {
        self.consecutive_failures > 0 && self.consecutive_failures >= self.max_consecutive_failures
    }

    pub(crate) fn start(&mut self) {
        self.status = RunStatus::Running;
    }

    /// Advance to the next step and return its sequence number
    pub(crate) fn begin_step(&mut self) -> u64 {
        self.current_step += 1;
        self.current_step
    }

    pub(crate) fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    pub(crate) fn record_failure(&mut self) {
        self.consecutive_failures += 1;
    }

    pub(crate) fn mark_done(&mut self, result: Option<String>) {
        self.done = true;
        self.result = result;
    }

    pub(crate) fn terminate(&mut self, reason: TerminationReason) {
        self.status = reason.status();
        self.termination = Some(reason);
    }
}
