//! The flow runner state machine.
//!
//! One [`FlowRunner`] serves one session.  A matched trigger starts a run:
//! a single task spawned through the session's [`TimerRegistry`] plays the
//! sequential part (system messages, agent response, form wait, final
//! messages), awaiting a registered timer at every delay.  Cascades and the
//! closing reset are independent registry timers scheduled when the
//! sequential part ends.
//!
//! Run state is published through a [`watch`] channel.  Every update is
//! conditional on the run id, so effects that outlive their run (an
//! abandoned form, a run reset after a failed append) change nothing.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Local;
use dashmap::DashMap;
use scriptflow_intent::{
    AgentResponse, EntityExtractor, ExtractorFastPath, FastPathPredicate, Flow, FlowCatalog,
    FormData, TriggerMatcher, render_template,
};
use scriptflow_kernel::{PendingTimer, TimerRegistry};
use scriptflow_store::{
    Message, MessageSink, SessionProvider, Step, StepId, StepState, StepTracker,
};
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{PacingConfig, RunnerConfig};
use crate::error::{Result, RunnerError};
use crate::form;
use crate::state::{RunState, Stage};

/// Closing message of an approval cascade that does not declare one.
const DEFAULT_APPROVAL_CLOSING: &str = "✅ Your request has been approved.";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The stores a runner writes to.
#[derive(Clone)]
pub struct Collaborators {
    pub messages: Arc<dyn MessageSink>,
    pub steps: Arc<dyn StepTracker>,
    pub session: Arc<dyn SessionProvider>,
}

/// Plays scripted flows for one session.
///
/// Cheaply cloneable; clones drive the same session.
#[derive(Clone)]
pub struct FlowRunner {
    inner: Arc<RunnerInner>,
}

struct RunnerInner {
    matcher: TriggerMatcher,
    fast_path: Box<dyn FastPathPredicate>,
    collaborators: Collaborators,
    pacing: PacingConfig,
    timers: TimerRegistry,
    state: watch::Sender<RunState>,
    /// Form hand-off for runs paused in `AwaitingForm`, keyed by run id.
    form_waiters: DashMap<Uuid, oneshot::Sender<FormData>>,
    shut_down: AtomicBool,
}

/// Per-run context shared by the run task and its cascade effects.
struct Run {
    id: Uuid,
    flow: Arc<Flow>,
    session_id: Option<String>,
    /// Set after a failed append; nothing else of this run is appended.
    stalled: AtomicBool,
}

impl Run {
    fn is_stalled(&self) -> bool {
        self.stalled.load(Ordering::Acquire)
    }
}

// ---------------------------------------------------------------------------
// FlowRunner
// ---------------------------------------------------------------------------

impl FlowRunner {
    /// Create a runner using the entity-extractor fast path.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(
        catalog: Arc<FlowCatalog>,
        collaborators: Collaborators,
        config: RunnerConfig,
    ) -> Result<Self> {
        let fast_path = ExtractorFastPath::new(EntityExtractor::new()?);
        Self::with_fast_path(catalog, collaborators, config, fast_path)
    }

    /// Create a runner with a custom fast-path predicate.
    pub fn with_fast_path<P>(
        catalog: Arc<FlowCatalog>,
        collaborators: Collaborators,
        config: RunnerConfig,
        fast_path: P,
    ) -> Result<Self>
    where
        P: FastPathPredicate + 'static,
    {
        let matcher = TriggerMatcher::new(catalog)?;
        let timers = TimerRegistry::new()?;
        let (state, _) = watch::channel(RunState::default());

        Ok(Self {
            inner: Arc::new(RunnerInner {
                matcher,
                fast_path: Box::new(fast_path),
                collaborators,
                pacing: config.pacing,
                timers,
                state,
                form_waiters: DashMap::new(),
                shut_down: AtomicBool::new(false),
            }),
        })
    }

    /// Start the flow `text` triggers.
    ///
    /// Returns `false` when nothing matched, when a flow is already being
    /// processed (the trigger is dropped, not queued), or after shutdown.
    /// A trigger arriving while a form waits abandons that form.
    pub fn trigger_demo(&self, text: &str) -> bool {
        let inner = &self.inner;
        if inner.shut_down.load(Ordering::Acquire) {
            debug!("trigger ignored, runner is shut down");
            return false;
        }

        let Some(flow) = inner.matcher.match_flow(text) else {
            return false;
        };
        let fast_path = inner.fast_path.resolve(&flow, text);

        let run_id = Uuid::now_v7();
        let mut abandoned = None;
        let started = inner.state.send_if_modified(|state| {
            if state.is_processing {
                return false;
            }
            if state.stage == Stage::AwaitingForm {
                abandoned = state.run_id;
            }
            *state = RunState {
                active_flow: Some(Arc::clone(&flow)),
                stage: Stage::Matched,
                is_processing: true,
                run_id: Some(run_id),
                ..RunState::default()
            };
            true
        });

        if !started {
            debug!(flow_id = %flow.id, "trigger dropped, a flow is already running");
            return false;
        }
        if let Some(old_run) = abandoned {
            inner.form_waiters.remove(&old_run);
            info!(run_id = %old_run, "waiting form abandoned by a new trigger");
        }

        let run = Arc::new(Run {
            id: run_id,
            flow: Arc::clone(&flow),
            session_id: inner.collaborators.session.current_session_id(),
            stalled: AtomicBool::new(false),
        });
        info!(
            flow_id = %flow.id,
            %run_id,
            fast_path = fast_path.is_some(),
            "flow started"
        );

        let task = Arc::clone(inner).play(run, fast_path);
        if let Err(e) = inner.timers.spawn(task) {
            warn!(flow_id = %flow.id, error = %e, "could not start run");
            inner.reset(run_id);
            return false;
        }
        true
    }

    /// Submit values for the waiting form.
    ///
    /// Invalid values are rejected with [`RunnerError::Validation`] and
    /// leave the run untouched.
    pub fn submit_form(&self, values: FormData) -> Result<()> {
        let inner = &self.inner;
        if inner.shut_down.load(Ordering::Acquire) {
            return Err(RunnerError::ShutDown);
        }

        let state = self.observe_run_state();
        let (Some(run_id), Some(flow), Some(_)) =
            (state.run_id, state.active_flow.as_ref(), state.pending_form())
        else {
            return Err(RunnerError::NoPendingForm);
        };

        let today = Local::now().date_naive();
        form::validate(flow, &values, today).map_err(RunnerError::Validation)?;

        let Some((_, waiter)) = inner.form_waiters.remove(&run_id) else {
            return Err(RunnerError::NoPendingForm);
        };

        let submitted = values.clone();
        inner.state.send_if_modified(|state| {
            if !state.is_run(run_id) {
                return false;
            }
            state.stage = Stage::PlayingFinalMessages;
            state.is_processing = true;
            state.show_typing_indicator = true;
            state.form_data = submitted;
            true
        });

        waiter.send(values).map_err(|_| RunnerError::NoPendingForm)?;
        info!(%run_id, "form submitted");
        Ok(())
    }

    /// Abandon the waiting form, if any, and return to idle.
    pub fn abandon(&self) -> bool {
        let state = self.observe_run_state();
        if state.stage != Stage::AwaitingForm {
            return false;
        }
        let Some(run_id) = state.run_id else {
            return false;
        };

        let abandoned = self.inner.reset(run_id);
        if abandoned {
            info!(%run_id, "waiting form abandoned");
        }
        abandoned
    }

    /// Tear the session down.
    ///
    /// Cancels every outstanding timer, resets the run state and refuses
    /// all later triggers and submissions.  Returns the number of timers
    /// cancelled; only the first call does anything.
    pub fn shutdown(&self) -> usize {
        let inner = &self.inner;
        if inner.shut_down.swap(true, Ordering::AcqRel) {
            return 0;
        }

        let cancelled = inner.timers.cancel_all();
        inner.form_waiters.clear();
        inner.state.send_replace(RunState::default());

        info!(cancelled, "flow runner shut down");
        cancelled
    }

    /// Snapshot of the current run state.
    pub fn observe_run_state(&self) -> RunState {
        self.inner.state.borrow().clone()
    }

    /// Receive every run state change.
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.inner.state.subscribe()
    }

    /// Outstanding timers, earliest first.
    pub fn pending_timers(&self) -> Vec<PendingTimer> {
        self.inner.timers.pending()
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::Acquire)
    }

    /// The catalog triggers are matched against.
    pub fn catalog(&self) -> &Arc<FlowCatalog> {
        self.inner.matcher.catalog()
    }
}

// ---------------------------------------------------------------------------
// Run task
// ---------------------------------------------------------------------------

impl RunnerInner {
    /// Play one run from its first system message to the cascades.
    async fn play(self: Arc<Self>, run: Arc<Run>, fast_path: Option<FormData>) {
        let flow = Arc::clone(&run.flow);
        let steps = self.track_steps(&run).await;

        self.update(&run, |s| s.stage = Stage::PlayingSystemMessages);
        for (index, text) in flow.system_messages.iter().enumerate() {
            let label = format!("{}/system/{index}", flow.id);
            if self
                .timers
                .sleep(label, self.pacing.system_message_delay(index))
                .await
                .is_err()
            {
                return;
            }

            let step = steps.get(index).copied().flatten();
            if !self.emit(&run, Message::system(text.as_str())).await {
                if run.is_stalled() {
                    self.finish_step(&run, step, StepState::Error).await;
                }
                return;
            }
            self.finish_step(&run, step, StepState::Ok).await;
        }

        self.update(&run, |s| {
            s.stage = Stage::AwaitingAgentResponse;
            s.show_typing_indicator = true;
        });
        let label = format!("{}/agent", flow.id);
        if self
            .timers
            .sleep(label, self.pacing.agent_response_delay())
            .await
            .is_err()
        {
            return;
        }
        self.update(&run, |s| s.show_typing_indicator = false);

        let body = match (&fast_path, &flow.fast_path) {
            (Some(_), Some(binding)) => binding.acknowledgement.as_str(),
            _ => flow.agent_response.body(),
        };
        if !self
            .emit(&run, Message::assistant(body, flow.agent.as_str()))
            .await
        {
            return;
        }

        let form_data = match &flow.agent_response {
            AgentResponse::Form { .. } => {
                let data = match fast_path {
                    Some(data) => {
                        let confirmed = data.clone();
                        self.update(&run, move |s| {
                            s.stage = Stage::FastPathConfirmed;
                            s.form_data = confirmed;
                        });
                        data
                    }
                    None => match self.await_form(&run).await {
                        Some(data) => data,
                        None => return,
                    },
                };

                if !self.play_final_messages(&run, &data).await {
                    return;
                }
                let label = format!("{}/confirmation", flow.id);
                if self
                    .timers
                    .sleep(label, self.pacing.final_message_cadence())
                    .await
                    .is_err()
                {
                    return;
                }
                let summary = form::confirmation_text(&flow, &data);
                if !self
                    .emit(&run, Message::assistant(summary, flow.agent.as_str()))
                    .await
                {
                    return;
                }
                data
            }
            AgentResponse::Confirmation { .. } | AgentResponse::Action { .. } => {
                let data = FormData::new();
                if !self.play_final_messages(&run, &data).await {
                    return;
                }
                data
            }
        };

        self.start_cascades(&run, &form_data);
    }

    /// Pause until the form is submitted.  `None` when it is abandoned.
    async fn await_form(&self, run: &Run) -> Option<FormData> {
        let (tx, rx) = oneshot::channel();
        self.form_waiters.insert(run.id, tx);
        self.update(run, |s| {
            s.stage = Stage::AwaitingForm;
            s.is_processing = false;
            s.show_typing_indicator = false;
        });
        debug!(flow_id = %run.flow.id, run_id = %run.id, "waiting for form submission");

        match rx.await {
            Ok(data) => Some(data),
            Err(_) => {
                debug!(run_id = %run.id, "form wait ended without a submission");
                None
            }
        }
    }

    async fn play_final_messages(&self, run: &Run, data: &FormData) -> bool {
        self.update(run, |s| {
            s.stage = Stage::PlayingFinalMessages;
            s.is_processing = true;
            s.show_typing_indicator = true;
        });

        for (index, template) in run.flow.final_messages.iter().enumerate() {
            let label = format!("{}/final/{index}", run.flow.id);
            if self
                .timers
                .sleep(label, self.pacing.final_message_cadence())
                .await
                .is_err()
            {
                return false;
            }
            let text = render_template(template, data);
            if !self
                .emit(run, Message::assistant(text, run.flow.agent.as_str()))
                .await
            {
                return false;
            }
        }
        true
    }

    // -- cascades ---------------------------------------------------------

    /// Schedule both cascades and the closing reset.
    fn start_cascades(self: &Arc<Self>, run: &Arc<Run>, data: &FormData) {
        let flow = &run.flow;

        let first_stage = match (&flow.approval_cascade, &flow.notification_cascade) {
            (Some(_), _) => Stage::ApprovalCascade,
            (None, Some(_)) => Stage::NotificationCascade,
            (None, None) => Stage::PlayingFinalMessages,
        };
        self.update(run, |s| {
            s.stage = first_stage;
            s.show_typing_indicator = false;
        });

        let approval = flow.approval_cascade.as_ref().map(|cascade| {
            let closing = cascade.closing.as_deref().unwrap_or(DEFAULT_APPROVAL_CLOSING);
            let texts: Vec<String> = cascade
                .messages
                .iter()
                .map(String::as_str)
                .chain(std::iter::once(closing))
                .map(|t| render_template(t, data))
                .collect();
            (self.pacing.scale(cascade.delay()), texts)
        });
        let notification = flow.notification_cascade.as_ref().map(|cascade| {
            let texts: Vec<String> = cascade
                .messages
                .iter()
                .map(|t| render_template(t, data))
                .collect();
            (self.pacing.scale(cascade.delay()), texts)
        });

        let approval_end = approval
            .as_ref()
            .map(|(base, texts)| self.cascade_end(*base, texts.len()));
        let notification_end = notification
            .as_ref()
            .map(|(base, texts)| self.cascade_end(*base, texts.len()));

        // Hand the stage over only if notifications are still going out.
        let then = match (approval_end, notification_end) {
            (Some(a), Some(n)) if n > a => Some(Stage::NotificationCascade),
            _ => None,
        };

        if let Some((base, texts)) = approval {
            self.schedule_cascade(run, "approval", base, texts, then);
        }
        if let Some((base, texts)) = notification {
            self.schedule_cascade(run, "notification", base, texts, None);
        }

        let last = approval_end
            .into_iter()
            .chain(notification_end)
            .max()
            .unwrap_or(Duration::ZERO);

        let inner = Arc::clone(self);
        let run_id = run.id;
        let label = format!("{}/reset", flow.id);
        let reset_after = last.saturating_add(self.pacing.settle());
        if let Err(e) = self.timers.schedule(label, reset_after, async move {
            inner.reset(run_id);
        }) {
            debug!(%run_id, error = %e, "reset not scheduled");
        }
    }

    /// Offset of the last of `count` cascade messages starting at `base`.
    fn cascade_end(&self, base: Duration, count: usize) -> Duration {
        self.cascade_offset(base, count.saturating_sub(1))
    }

    fn cascade_offset(&self, base: Duration, index: usize) -> Duration {
        let steps = u32::try_from(index).unwrap_or(u32::MAX);
        base.saturating_add(self.pacing.cascade_step().saturating_mul(steps))
    }

    /// Schedule message `i` at `base + i * step`.
    ///
    /// `then` is applied to the run state once the last message is out.
    fn schedule_cascade(
        self: &Arc<Self>,
        run: &Arc<Run>,
        kind: &str,
        base: Duration,
        texts: Vec<String>,
        then: Option<Stage>,
    ) {
        let last_index = texts.len().saturating_sub(1);

        for (index, text) in texts.into_iter().enumerate() {
            let offset = self.cascade_offset(base, index);
            let label = format!("{}/{kind}/{index}", run.flow.id);
            let inner = Arc::clone(self);
            let effect_run = Arc::clone(run);
            let next = if index == last_index { then } else { None };
            let effect = async move {
                if inner.emit(&effect_run, Message::system(text)).await
                    && let Some(stage) = next
                {
                    inner.update(&effect_run, |s| s.stage = stage);
                }
            };

            if let Err(e) = self.timers.schedule(label, offset, effect) {
                debug!(run_id = %run.id, error = %e, "cascade message not scheduled");
                break;
            }
        }
    }

    // -- effects ----------------------------------------------------------

    /// Append a message for `run`.
    ///
    /// Returns `false` when the run is stale or stalled, or when the append
    /// fails.  A failed append stalls the run and resets to idle at once.
    async fn emit(&self, run: &Run, message: Message) -> bool {
        if run.is_stalled() || !self.is_current(run.id) {
            debug!(run_id = %run.id, "message skipped, run is no longer active");
            return false;
        }

        match self.collaborators.messages.append_message(message).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    flow_id = %run.flow.id,
                    run_id = %run.id,
                    error = %e,
                    "message append failed, stalling run"
                );
                run.stalled.store(true, Ordering::Release);
                self.reset(run.id);
                false
            }
        }
    }

    /// Record every system message of `run` as a pending step.
    async fn track_steps(&self, run: &Run) -> Vec<Option<StepId>> {
        let Some(session_id) = run.session_id.as_deref() else {
            return vec![None; run.flow.system_messages.len()];
        };

        let mut ids = Vec::with_capacity(run.flow.system_messages.len());
        for text in &run.flow.system_messages {
            let step = Step::pending(text.as_str());
            match self.collaborators.steps.track_step(session_id, step).await {
                Ok(id) => ids.push(Some(id)),
                Err(e) => {
                    warn!(session_id, error = %e, "step tracking failed");
                    ids.push(None);
                }
            }
        }
        ids
    }

    async fn finish_step(&self, run: &Run, step: Option<StepId>, state: StepState) {
        let (Some(session_id), Some(step_id)) = (run.session_id.as_deref(), step) else {
            return;
        };
        if let Err(e) = self
            .collaborators
            .steps
            .update_step(session_id, step_id, state)
            .await
        {
            warn!(session_id, %step_id, error = %e, "step update failed");
        }
    }

    // -- state ------------------------------------------------------------

    fn is_current(&self, run_id: Uuid) -> bool {
        self.state.borrow().is_run(run_id)
    }

    /// Apply `f` if `run` is still the active run.
    fn update(&self, run: &Run, f: impl FnOnce(&mut RunState)) {
        self.state.send_if_modified(|state| {
            if !state.is_run(run.id) {
                return false;
            }
            f(state);
            true
        });
    }

    /// Return to idle if `run_id` is still the active run.
    fn reset(&self, run_id: Uuid) -> bool {
        self.form_waiters.remove(&run_id);
        let reset = self.state.send_if_modified(|state| {
            if !state.is_run(run_id) {
                return false;
            }
            *state = RunState::default();
            true
        });
        if reset {
            info!(%run_id, "run finished, state reset to idle");
        }
        reset
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use scriptflow_intent::DisabledFastPath;
    use scriptflow_kernel::KernelError;
    use scriptflow_store::{FixedSession, MessageLog, StepLog};

    fn collaborators(log: &MessageLog) -> Collaborators {
        Collaborators {
            messages: Arc::new(log.clone()),
            steps: Arc::new(StepLog::new()),
            session: Arc::new(FixedSession::new("test")),
        }
    }

    fn runner(log: &MessageLog) -> FlowRunner {
        FlowRunner::with_fast_path(
            Arc::new(FlowCatalog::builtin()),
            collaborators(log),
            RunnerConfig::default(),
            DisabledFastPath,
        )
        .unwrap()
    }

    #[test]
    fn runner_needs_a_runtime() {
        let result = FlowRunner::new(
            Arc::new(FlowCatalog::builtin()),
            collaborators(&MessageLog::new()),
            RunnerConfig::default(),
        );
        assert!(matches!(
            result,
            Err(RunnerError::Kernel(KernelError::NoRuntime))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn unmatched_text_starts_nothing() {
        let log = MessageLog::new();
        let runner = runner(&log);
        assert!(!runner.trigger_demo("what's the weather?"));
        assert!(runner.observe_run_state().is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn match_marks_state_processing() {
        let log = MessageLog::new();
        let runner = runner(&log);
        assert!(runner.trigger_demo("payslip please"));

        let state = runner.observe_run_state();
        assert!(state.is_processing);
        assert!(state.run_id.is_some());
        assert_eq!(state.active_flow.unwrap().id, "payslip");
    }

    #[tokio::test(start_paused = true)]
    async fn submit_without_form_is_rejected() {
        let log = MessageLog::new();
        let runner = runner(&log);
        assert!(matches!(
            runner.submit_form(FormData::new()),
            Err(RunnerError::NoPendingForm)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn abandon_without_form_is_a_no_op() {
        let log = MessageLog::new();
        let runner = runner(&log);
        runner.trigger_demo("clock in");
        assert!(!runner.abandon());
        assert!(runner.observe_run_state().is_processing);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_runs_once_and_refuses_work() {
        let log = MessageLog::new();
        let runner = runner(&log);
        runner.trigger_demo("clock in");
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(runner.shutdown() >= 1);
        assert_eq!(runner.shutdown(), 0);
        assert!(runner.is_shut_down());
        assert!(runner.observe_run_state().is_idle());
        assert!(!runner.trigger_demo("clock in"));
        assert!(matches!(
            runner.submit_form(FormData::new()),
            Err(RunnerError::ShutDown)
        ));
    }
}
