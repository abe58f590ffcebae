//! Step hooks: best-effort notifications around every step

use crate::agent::history::{safe_value, History};
use crate::agent::state::RunState;
use crate::browser::{screenshot_base64, BrowserHandle};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Live view of a run handed to hooks
pub struct HookContext<'a> {
    pub run_id: Uuid,
    pub task: &'a str,

    /// Sequence number of the step being started or finished
    pub step: u64,

    pub state: &'a RunState,
    pub history: &'a History,
    pub browser: &'a BrowserHandle,
}

impl HookContext<'_> {
    /// Capture the recording payload for this point of the run
    pub async fn summary(&self) -> StepSummary {
        StepSummary::capture(self).await
    }
}

/// Observer of step boundaries. Failures and timeouts are logged and never
/// affect the run.
#[async_trait]
pub trait StepHook: Send + Sync {
    async fn on_step_start(&self, _ctx: &HookContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_step_end(&self, _ctx: &HookContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HookPhase {
    StepStart,
    StepEnd,
}

/// Invoke every hook for `phase`, each bounded by `timeout`
pub(crate) async fn dispatch(hooks: &[Arc<dyn StepHook>], phase: HookPhase, ctx: &HookContext<'_>, timeout: Duration) {
    for hook in hooks {
        let call = async {
            match phase {
                HookPhase::StepStart => hook.on_step_start(ctx).await,
                HookPhase::StepEnd => hook.on_step_end(ctx).await,
            }
        };

        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::warn!("{:?} hook failed at step {}: {:#}", phase, ctx.step, e),
            Err(_) => log::warn!("{:?} hook at step {} exceeded {:?}", phase, ctx.step, timeout),
        }
    }
}

/// Snapshot of a run for external recording: current page plus the latest
/// entry of each history projection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepSummary {
    pub run_id: Option<Uuid>,
    pub step: u64,
    pub website_html: Option<String>,

    /// Base64 PNG
    pub website_screenshot: Option<String>,

    pub url: Option<String>,
    pub model_thoughts: Value,
    pub model_outputs: Value,
    pub model_actions: Value,
    pub extracted_content: Value,
}

impl StepSummary {
    /// Collect the summary. Page capture failures leave the page fields empty.
    pub async fn capture(ctx: &HookContext<'_>) -> Self {
        let website_html = match ctx.browser.page_html().await {
            Ok(html) => Some(html),
            Err(e) => {
                log::debug!("Summary without HTML: {}", e);
                None
            }
        };
        let website_screenshot = match screenshot_base64(ctx.browser.as_ref()).await {
            Ok(shot) => Some(shot),
            Err(e) => {
                log::debug!("Summary without screenshot: {}", e);
                None
            }
        };

        let history = ctx.history;
        Self {
            run_id: Some(ctx.run_id),
            step: ctx.step,
            website_html,
            website_screenshot,
            url: history.urls().last().map(str::to_string),
            model_thoughts: history.model_thoughts().last().map(|t| safe_value(&t)).unwrap_or(Value::Null),
            model_outputs: history.model_outputs().last().map(safe_value).unwrap_or(Value::Null),
            model_actions: history.model_actions().last().map(safe_value).unwrap_or(Value::Null),
            extracted_content: history
                .extracted_content()
                .last()
                .map(|c| safe_value(&c))
                .unwrap_or(Value::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::BrowserContext;
    use crate::dom::{ElementDescriptor, PageSnapshot};
    use crate::error::{AgentError, Result};
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Context whose tab is gone: every call fails
    struct ClosedTab;

    fn closed<T>() -> Result<T> {
        Err(AgentError::CollaboratorUnavailable("tab closed".to_string()))
    }

    #[async_trait]
    impl BrowserContext for ClosedTab {
        async fn current_url(&self) -> Result<String> {
            closed()
        }

        async fn snapshot(&self) -> Result<PageSnapshot> {
            closed()
        }

        async fn page_html(&self) -> Result<String> {
            closed()
        }

        async fn take_screenshot(&self) -> Result<Vec<u8>> {
            closed()
        }

        async fn navigate(&self, _url: &str) -> Result<()> {
            closed()
        }

        async fn go_back(&self) -> Result<()> {
            closed()
        }

        async fn locate(&self, _element: &ElementDescriptor) -> Result<bool> {
            closed()
        }

        async fn click(&self, _element: &ElementDescriptor) -> Result<()> {
            closed()
        }

        async fn fill(&self, _element: &ElementDescriptor, _text: &str) -> Result<()> {
            closed()
        }

        async fn set_input_files(&self, _element: &ElementDescriptor, _paths: &[PathBuf]) -> Result<()> {
            closed()
        }
    }

    struct Failing;

    #[async_trait]
    impl StepHook for Failing {
        async fn on_step_start(&self, _ctx: &HookContext<'_>) -> anyhow::Result<()> {
            anyhow::bail!("recording endpoint unreachable")
        }
    }

    struct Hanging;

    #[async_trait]
    impl StepHook for Hanging {
        async fn on_step_start(&self, _ctx: &HookContext<'_>) -> anyhow::Result<()> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    #[derive(Default)]
    struct Recording {
        calls: Mutex<Vec<(HookPhase, u64)>>,
    }

    #[async_trait]
    impl StepHook for Recording {
        async fn on_step_start(&self, ctx: &HookContext<'_>) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push((HookPhase::StepStart, ctx.step));
            Ok(())
        }

        async fn on_step_end(&self, ctx: &HookContext<'_>) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push((HookPhase::StepEnd, ctx.step));
            Ok(())
        }
    }

    fn context<'a>(state: &'a RunState, history: &'a History, browser: &'a BrowserHandle) -> HookContext<'a> {
        HookContext {
            run_id: state.run_id(),
            task: "apply for the job",
            step: 4,
            state,
            history,
            browser,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_survives_failing_and_hanging_hooks() {
        let state = RunState::new(Uuid::new_v4(), 10, 3);
        let history = History::new();
        let browser: BrowserHandle = Arc::new(ClosedTab);
        let ctx = context(&state, &history, &browser);

        let recording = Arc::new(Recording::default());
        let hooks: Vec<Arc<dyn StepHook>> = vec![Arc::new(Failing), Arc::new(Hanging), recording.clone()];

        let started = tokio::time::Instant::now();
        dispatch(&hooks, HookPhase::StepStart, &ctx, Duration::from_secs(5)).await;
        dispatch(&hooks, HookPhase::StepEnd, &ctx, Duration::from_secs(5)).await;

        assert!(started.elapsed() < Duration::from_secs(60));
        assert_eq!(
            *recording.calls.lock().unwrap(),
            vec![(HookPhase::StepStart, 4), (HookPhase::StepEnd, 4)]
        );
    }

    #[tokio::test]
    async fn test_summary_without_page_leaves_page_fields_empty() {
        let state = RunState::new(Uuid::new_v4(), 10, 3);
        let history = History::new();
        let browser: BrowserHandle = Arc::new(ClosedTab);
        let ctx = context(&state, &history, &browser);

        let summary = ctx.summary().await;

        assert_eq!(summary.run_id, Some(state.run_id()));
        assert_eq!(summary.step, 4);
        assert_eq!(summary.website_html, None);
        assert_eq!(summary.website_screenshot, None);
        assert_eq!(summary.url, None);
        assert_eq!(summary.model_actions, Value::Null);
        assert_eq!(summary.extracted_content, Value::Null);
    }
}
