//! The step-wise command loop: perceive, deliberate, actuate, decide
//! whether to go around again.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tabpilot_action_executor::{ActionExecutor, ExecOutcome};
use tabpilot_core_types::{Action, ExecMode, PageContext, TabHandle};
use tabpilot_event_bus::{DriverBus, DriverEvent, DriverStatus, EventBus, LogKind};
use tabpilot_llm_dispatch::prompts::{RETRY_PROMPT, SEARCH_RESULTS_HEADER};
use tabpilot_llm_dispatch::{Dispatcher, ModelDecision};
use tabpilot_quiz_oracle as oracle;
use tabpilot_snapshot_service::{
    collect_all_frames, collect_with_iframe_retry, compute_diff, SnapshotConfig,
};

use crate::config::LoopConfig;
use crate::session::DriverState;

/// Slice of iframe context handed to the search analyst.
const SEARCH_CONTEXT_CAP: usize = 2_000;

const NORMAL_CONTINUATION: &str = "Continue working on the command. Re-read the page state above, take the next actions, and set done:true with a summary once the command is fully accomplished.";

const QUIZ_CONTINUATION: &str = "Continue the assessment. Work through exactly one item: reason in `thinking` about what the current question asks and which answer is correct, act on that answer, verify the map confirms it (checked option or placed tile) before clicking Next, and drag at most one tile per response. Tile selectors from earlier steps are stale; only use selectors from the state above. End with a snapshot so you can see the next item.";

/// Rejection for concurrent commands; callers surface it as busy, never
/// queue.
#[derive(Debug, Error)]
pub enum LoopError {
    #[error("a command is already executing")]
    Busy,
}

/// Terminal status of one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopStatus {
    Completed,
    Stopped,
    Failed,
    MaxStepsReached,
}

/// Final report of one command execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopResult {
    pub status: LoopStatus,
    pub message: String,
    pub steps_taken: u32,
    pub mode: ExecMode,
}

impl LoopResult {
    fn new(status: LoopStatus, message: impl Into<String>, steps: u32, mode: ExecMode) -> Self {
        Self {
            status,
            message: message.into(),
            steps_taken: steps,
            mode,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, LoopStatus::Completed)
    }
}

/// Which break-point ended a batch early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakKind {
    Snapshot,
    Screenshot,
    Search,
    Drag,
}

fn break_kind(action: &Action, quiz: bool) -> Option<BreakKind> {
    match action {
        Action::Snapshot => Some(BreakKind::Snapshot),
        Action::Screenshot => Some(BreakKind::Screenshot),
        Action::Search { .. } => Some(BreakKind::Search),
        Action::Drag { .. } if quiz => Some(BreakKind::Drag),
        _ => None,
    }
}

/// The agent loop. One per driver; single-flight is enforced through the
/// shared [`DriverState`].
pub struct AgentLoop {
    executor: ActionExecutor,
    dispatcher: Dispatcher,
    bus: Arc<DriverBus>,
    state: Arc<DriverState>,
    config: LoopConfig,
    snapshot_config: SnapshotConfig,
}

impl AgentLoop {
    pub fn new(
        executor: ActionExecutor,
        dispatcher: Dispatcher,
        bus: Arc<DriverBus>,
        state: Arc<DriverState>,
        config: LoopConfig,
        snapshot_config: SnapshotConfig,
    ) -> Self {
        Self {
            executor,
            dispatcher,
            bus,
            state,
            config,
            snapshot_config,
        }
    }

    pub fn state(&self) -> Arc<DriverState> {
        Arc::clone(&self.state)
    }

    /// Execute one user command to completion, cancellation, failure, or
    /// step exhaustion.
    pub async fn run_command(
        &mut self,
        tab: &dyn TabHandle,
        command: &str,
    ) -> Result<LoopResult, LoopError> {
        let Some(session) = self.state.try_begin() else {
            return Err(LoopError::Busy);
        };
        let token = session.token();

        self.publish(DriverEvent::execution_state(true)).await;
        self.publish(DriverEvent::status(
            DriverStatus::Busy,
            format!("Working on: {command}"),
        ))
        .await;
        self.dispatcher.clear_history();

        let result = self.drive(tab, command, &token).await;

        let (status, text) = match result.status {
            LoopStatus::Failed => (DriverStatus::Error, result.message.clone()),
            _ => (DriverStatus::Ready, result.message.clone()),
        };
        self.publish(DriverEvent::status(status, text)).await;
        self.publish(DriverEvent::execution_state(false)).await;
        drop(session);

        Ok(result)
    }

    async fn drive(&mut self, tab: &dyn TabHandle, command: &str, token: &CancellationToken) -> LoopResult {
        let mut mode = ExecMode::Normal;
        let mut step: u32 = 0;
        let mut last_full_map: Option<String> = None;
        let mut last_search_key: Option<String> = None;
        let mut buffered_search: Option<String> = None;
        let mut pending_screenshot: Option<String> = None;

        loop {
            // Cancellation and budget gates.
            if token.is_cancelled() {
                return LoopResult::new(LoopStatus::Stopped, "Stopped by user", step, mode);
            }
            if step >= self.config.max_steps(mode) {
                return LoopResult::new(
                    LoopStatus::MaxStepsReached,
                    format!("Reached the {}-step limit", self.config.max_steps(mode)),
                    step,
                    mode,
                );
            }

            // Quiz iframes may have navigated; re-arm their probes.
            if mode.is_quiz() {
                if let Err(err) = self.executor.coordinator().inject_all(tab).await {
                    warn!(%err, "probe re-injection failed");
                }
            }

            // Perceive.
            let snapshot = if mode.is_quiz() {
                collect_with_iframe_retry(self.executor.coordinator(), tab, &self.snapshot_config)
                    .await
            } else {
                collect_all_frames(self.executor.coordinator(), tab).await
            };
            let snapshot = match snapshot {
                Ok(snapshot) => snapshot,
                Err(err) if step == 0 => {
                    return LoopResult::new(
                        LoopStatus::Failed,
                        format!("Could not read the page: {err}"),
                        step,
                        mode,
                    );
                }
                Err(err) => {
                    self.log(LogKind::Error, format!("snapshot failed: {err}")).await;
                    step += 1;
                    self.pause(token, self.config.step_pause_ms).await;
                    continue;
                }
            };
            let full_map = snapshot.map;

            let map_for_llm = match (&last_full_map, mode) {
                (Some(previous), ExecMode::Quiz) if step >= 1 => {
                    compute_diff(previous, &full_map)
                }
                _ => full_map.clone(),
            };
            // Stored-before-diff: the next diff runs against full state.
            last_full_map = Some(full_map.clone());

            let url = tab.url().await.unwrap_or_default();
            let title = tab.title().await.unwrap_or_default();
            let mut ctx = PageContext::new(url, title, map_for_llm);

            // Vision need is judged on the full map, never the diff.
            if oracle::needs_vision(&full_map) {
                ctx.needs_vision = true;
            }
            if let Some(shot) = pending_screenshot.take() {
                ctx.screenshot = Some(shot);
            } else if ctx.needs_vision {
                match self.executor.debug_sessions().capture_screenshot(tab).await {
                    Ok(shot) => ctx.screenshot = Some(shot),
                    Err(err) => warn!(%err, "screenshot unavailable; continuing without"),
                }
            }

            // Quiz auto-detection on the first look at the page.
            if step == 0 && !mode.is_quiz() && oracle::detect(&ctx) {
                info!("quiz detected; switching to quiz mode");
                self.log(LogKind::Info, "Assessment detected, switching to quiz mode").await;
                mode = ExecMode::Quiz;
            }

            // Ask the search analyst once per question.
            if mode.is_quiz() {
                if let Some(analyst) = self.dispatcher.search_analyst() {
                    if let Some(key) = oracle::stable_question_key(&full_map) {
                        if last_search_key.as_deref() != Some(key.as_str()) {
                            let question = oracle::extract_question_text(&full_map)
                                .unwrap_or_else(|| key.clone());
                            let context: String = oracle::iframe_section(&full_map)
                                .unwrap_or_default()
                                .chars()
                                .take(SEARCH_CONTEXT_CAP)
                                .collect();
                            match analyst.lookup(&question, &context).await {
                                Ok(answer) => {
                                    last_search_key = Some(key);
                                    buffered_search = Some(answer);
                                }
                                Err(err) => warn!(%err, "search analyst failed"),
                            }
                        }
                    }
                }
            }

            // Compose the step message.
            let mut message = if step == 0 {
                command.to_string()
            } else if mode.is_quiz() {
                QUIZ_CONTINUATION.to_string()
            } else {
                NORMAL_CONTINUATION.to_string()
            };
            if let Some(search) = buffered_search.take() {
                message.push_str(&format!("\n\n{SEARCH_RESULTS_HEADER}\n{search}"));
            }

            // Deliberate, with bounded re-asks.
            let decided = self
                .decide(command, &message, &ctx, mode, token, step)
                .await;
            let decision = match decided {
                DecideOutcome::Decision(decision) => decision,
                DecideOutcome::Cancelled => {
                    return LoopResult::new(LoopStatus::Stopped, "Stopped by user", step, mode);
                }
                DecideOutcome::Fatal(message) => {
                    return LoopResult::new(LoopStatus::Failed, message, step, mode);
                }
                DecideOutcome::NoDecision => {
                    if step == 0 {
                        return LoopResult::new(
                            LoopStatus::Failed,
                            "The model produced no usable plan for the command",
                            step,
                            mode,
                        );
                    }
                    self.log(LogKind::Error, "no usable decision this step; continuing").await;
                    step += 1;
                    self.pause(token, self.config.step_pause_ms).await;
                    continue;
                }
            };

            // Planner-driven mode switches: quiz upgrades any time,
            // downgrades only on done.
            match decision.mode {
                Some(ExecMode::Quiz) if !mode.is_quiz() => {
                    self.log(LogKind::Info, "Planner switched to quiz mode").await;
                    mode = ExecMode::Quiz;
                }
                Some(ExecMode::Normal) if mode.is_quiz() && decision.done => {
                    mode = ExecMode::Normal;
                }
                _ => {}
            }

            // Actuate.
            let batch = self
                .execute_batch(tab, &decision, mode, token, &mut pending_screenshot, &mut buffered_search, &mut last_search_key)
                .await;
            let batch = match batch {
                Some(batch) => batch,
                None => {
                    return LoopResult::new(LoopStatus::Stopped, "Stopped by user", step, mode);
                }
            };

            self.log(
                LogKind::Info,
                format!(
                    "Step {}: {}/{} actions ok{}",
                    step + 1,
                    batch.succeeded,
                    batch.attempted,
                    match batch.broke_at {
                        Some(kind) => format!(", broke at {kind:?}"),
                        None => String::new(),
                    }
                ),
            )
            .await;

            // Done semantics: a quiz snapshot break means the planner has
            // not seen the new state yet, so done does not bind.
            let snapshot_break = matches!(batch.broke_at, Some(BreakKind::Snapshot));
            if decision.done && !(mode.is_quiz() && snapshot_break) {
                let summary = decision
                    .summary
                    .clone()
                    .unwrap_or_else(|| "Command completed".to_string());
                return LoopResult::new(LoopStatus::Completed, summary, step + 1, mode);
            }

            // Pace the next step.
            let pause_ms = if mode.is_quiz() && batch.had_click {
                self.config.quiz_click_pause_ms
            } else {
                self.config.step_pause_ms
            };
            self.pause(token, pause_ms).await;
            step += 1;
        }
    }

    async fn decide(
        &mut self,
        command: &str,
        message: &str,
        ctx: &PageContext,
        mode: ExecMode,
        token: &CancellationToken,
        step: u32,
    ) -> DecideOutcome {
        let mut attempt_message = message.to_string();
        for attempt in 0..self.config.decision_attempts {
            if token.is_cancelled() {
                return DecideOutcome::Cancelled;
            }
            let outcome = self
                .dispatcher
                .send(command, &attempt_message, ctx, mode)
                .await;
            match outcome {
                Ok(decision) if decision.has_real_actions() => {
                    return DecideOutcome::Decision(decision);
                }
                Ok(decision) if decision.done && step > 0 => {
                    // A bare done on a later step is a valid terminal signal.
                    return DecideOutcome::Decision(decision);
                }
                Ok(_) => {
                    debug!(attempt, "decision had no real actions; re-asking");
                    self.dispatcher.drop_last_exchange();
                    attempt_message = format!("{message}\n\n{RETRY_PROMPT}");
                }
                Err(err) if err.is_fatal() => {
                    return DecideOutcome::Fatal(err.to_string());
                }
                Err(err) => {
                    self.log(LogKind::Error, format!("model call failed: {err}")).await;
                }
            }
        }
        DecideOutcome::NoDecision
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute_batch(
        &mut self,
        tab: &dyn TabHandle,
        decision: &ModelDecision,
        mode: ExecMode,
        token: &CancellationToken,
        pending_screenshot: &mut Option<String>,
        buffered_search: &mut Option<String>,
        last_search_key: &mut Option<String>,
    ) -> Option<BatchReport> {
        let mut report = BatchReport::default();

        for action in &decision.actions {
            if token.is_cancelled() {
                return None;
            }
            self.log(LogKind::Pending, action.label()).await;
            report.attempted += 1;
            report.had_click |= action.is_click_like();

            let outcome = match self.executor.execute(tab, action, mode).await {
                Ok(outcome) => outcome,
                Err(err) => ExecOutcome::failed(err.to_string()),
            };

            if outcome.success {
                report.succeeded += 1;
                self.log(LogKind::Success, outcome.message.clone()).await;
            } else {
                self.log(LogKind::Error, outcome.message.clone()).await;
            }

            // Break-point side effects feed the next step's perception.
            match action {
                Action::Screenshot => {
                    if let Some(shot) = outcome
                        .payload
                        .as_ref()
                        .and_then(|p| p.get("screenshot"))
                        .and_then(|s| s.as_str())
                    {
                        *pending_screenshot = Some(shot.to_string());
                    }
                }
                Action::Search { query } => {
                    if let Some(analyst) = self.dispatcher.search_analyst() {
                        match analyst.lookup(query, "").await {
                            Ok(answer) => {
                                *buffered_search = Some(answer);
                                *last_search_key = None;
                            }
                            Err(err) => {
                                self.log(LogKind::Error, format!("search failed: {err}")).await;
                            }
                        }
                    } else {
                        self.log(LogKind::Error, "search requested but not enabled").await;
                    }
                }
                _ => {}
            }

            if let Some(kind) = break_kind(action, mode.is_quiz()) {
                report.broke_at = Some(kind);
                if kind == BreakKind::Drag {
                    self.pause(token, self.config.drag_settle_ms).await;
                }
                break;
            }
        }

        Some(report)
    }

    /// Sleep that unwinds early on cancellation.
    async fn pause(&self, token: &CancellationToken, ms: u64) {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = tokio::time::sleep(Duration::from_millis(ms)) => {}
        }
    }

    async fn publish(&self, event: DriverEvent) {
        let _ = self.bus.publish(event).await;
    }

    async fn log(&self, kind: LogKind, text: impl Into<String>) {
        let _ = self
            .bus
            .publish(DriverEvent::action_log(kind, text))
            .await;
    }
}

enum DecideOutcome {
    Decision(ModelDecision),
    NoDecision,
    Cancelled,
    Fatal(String),
}

#[derive(Debug, Default)]
struct BatchReport {
    attempted: u32,
    succeeded: u32,
    had_click: bool,
    broke_at: Option<BreakKind>,
}
