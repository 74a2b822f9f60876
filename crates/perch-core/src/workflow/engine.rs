//! WorkflowEngine — runs a workflow definition step by step.
//!
//! The engine:
//! 1. Validates every step's resource against the host catalogs before any
//!    side effect
//! 2. Creates a conversation and sends the first step's message
//! 3. Advances on external "agent turn completed" events
//! 4. Forks into a fresh conversation at summarize-and-handoff boundaries
//! 5. Ignores stale/foreign completion events without touching run state
//!
//! All transitions serialize on an internal mutex, so `run_workflow`,
//! `stop_run`, and `handle_agent_complete` never interleave for the same
//! run. A second completion event arriving mid-transition waits on the lock
//! and is then processed against the updated state; events that no longer
//! match it (run ended, or the conversation was abandoned at a handoff)
//! are dropped by the guard.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Mutex;

use crate::catalog::{missing_resources, ResourceCatalog};
use crate::error::WorkflowError;
use crate::gateway::{AgentGateway, SendOptions, ORIGIN_WORKFLOW};
use crate::store::WorkflowStore;
use crate::workflow::message::build_step_message;
use crate::workflow::run_state::{RunPhase, RunStateStore, StepStatus, WorkflowRunState};

/// Fixed prompt for the summarization turn at a handoff boundary.
const SUMMARY_PROMPT: &str = "Summarize the conversation so far for a handoff to a fresh session. \
Cover: goals, decisions made, constraints, outputs produced, and open questions. \
Reply in the same language as the conversation. Do not add any other commentary.";

/// Completion event delivered by the agent backend. Carries identity only;
/// the new state is recovered from the backend's conversation cache.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentTurnCompleted {
    pub space_id: String,
    pub conversation_id: String,
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Locale passed to catalog listings.
    pub locale: String,
    /// Optional liveness deadline per workflow-originated send. When set, a
    /// run whose completion event never arrives is ended with a timeout
    /// error instead of staying `running` forever. `None` disables the
    /// watchdog.
    pub step_deadline: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            locale: "en".to_string(),
            step_deadline: None,
        }
    }
}

/// The workflow execution engine and orchestration surface.
#[derive(Clone)]
pub struct WorkflowEngine {
    store: WorkflowStore,
    catalog: Arc<dyn ResourceCatalog>,
    gateway: Arc<dyn AgentGateway>,
    run: Arc<RunStateStore>,
    /// Serializes all state transitions (single-writer rule).
    transition_lock: Arc<Mutex<()>>,
    last_error: Arc<RwLock<Option<String>>>,
    config: EngineConfig,
}

impl WorkflowEngine {
    pub fn new(
        store: WorkflowStore,
        catalog: Arc<dyn ResourceCatalog>,
        gateway: Arc<dyn AgentGateway>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            catalog,
            run: Arc::new(RunStateStore::new(gateway.clone())),
            gateway,
            transition_lock: Arc::new(Mutex::new(())),
            last_error: Arc::new(RwLock::new(None)),
            config,
        }
    }

    /// Snapshot of the active run for display, if any.
    pub fn active_run(&self) -> Option<WorkflowRunState> {
        self.run.get()
    }

    /// Last user-visible error string, if any.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().ok().and_then(|e| e.clone())
    }

    /// Start executing a workflow. No-op while a run is already active.
    ///
    /// Validation failures leave no side effects: no conversation is
    /// created and no message is sent.
    pub async fn run_workflow(
        &self,
        space_id: &str,
        workflow_id: &str,
    ) -> Result<(), WorkflowError> {
        let _guard = self.transition_lock.lock().await;

        if self.run.get().map(|r| r.is_running).unwrap_or(false) {
            tracing::warn!("[Workflow] run_workflow ignored: a run is already active");
            return Ok(());
        }
        self.clear_error();
        self.run.clear();

        let workflow = self
            .store
            .get(space_id, workflow_id)
            .await
            .map_err(|e| self.fail(e))?
            .ok_or_else(|| self.fail(WorkflowError::NotFound(format!("workflow {}", workflow_id))))?;

        let locale = self.config.locale.as_str();
        let skills = self
            .catalog
            .list_skills(space_id, locale)
            .await
            .map_err(|e| self.fail(e))?;
        let agents = self
            .catalog
            .list_agents(space_id, locale)
            .await
            .map_err(|e| self.fail(e))?;
        let commands = self
            .catalog
            .list_commands(space_id, locale)
            .await
            .map_err(|e| self.fail(e))?;

        let missing = missing_resources(&workflow.steps, &skills, &agents, &commands);
        if !missing.is_empty() {
            return Err(self.fail(WorkflowError::Validation(format!(
                "missing resources: {}",
                missing.join(", ")
            ))));
        }

        let conversation = self
            .gateway
            .create_conversation(space_id, &workflow.name)
            .await
            .map_err(|e| self.fail(e))?;

        let started_at = Utc::now();
        if let Err(e) = self
            .store
            .record_run(space_id, workflow_id, &conversation.id, started_at)
            .await
        {
            // Run metadata is advisory; the run proceeds regardless.
            tracing::warn!("[Workflow] Failed to record run metadata: {}", e);
        }

        tracing::info!(
            "[Workflow] Starting \"{}\" ({} steps) in conversation {}",
            workflow.name,
            workflow.steps.len(),
            conversation.id
        );

        self.run.set(WorkflowRunState::new(
            workflow,
            space_id.to_string(),
            conversation.id,
        ));
        self.start_step().await;
        Ok(())
    }

    /// Stop the active run, cancelling in-flight generation. Idempotent;
    /// leaves per-step statuses as they are.
    pub async fn stop_run(&self) {
        let _guard = self.transition_lock.lock().await;

        let Some(run) = self.run.get() else { return };
        if !run.is_running {
            return;
        }

        if let Err(e) = self.gateway.stop_generation(&run.conversation_id).await {
            tracing::warn!("[Workflow] stop_generation failed: {}", e);
        }

        let mut next = run;
        next.is_running = false;
        next.ended_at = Some(Utc::now());
        self.run.set(next);
        tracing::info!("[Workflow] Run stopped by caller");
    }

    /// Advance the state machine on a completed agent turn. Events that
    /// don't match the active run (wrong conversation or space, or no run)
    /// are silently ignored.
    pub async fn handle_agent_complete(&self, event: AgentTurnCompleted) {
        let _guard = self.transition_lock.lock().await;

        let Some(run) = self.run.get() else {
            return;
        };
        if !run.is_running
            || event.conversation_id != run.conversation_id
            || event.space_id != run.space_id
        {
            tracing::debug!(
                "[Workflow] Ignoring completion event for conversation {}",
                event.conversation_id
            );
            return;
        }

        match run.phase {
            RunPhase::Step => self.complete_step(run).await,
            RunPhase::Summary => self.complete_summary(run).await,
            RunPhase::SummaryInject => self.complete_injection(run).await,
        }
    }

    /// Consume completion events from a single inbound channel, so one task
    /// owns the transition function.
    pub async fn run_event_loop(&self, mut rx: UnboundedReceiver<AgentTurnCompleted>) {
        while let Some(event) = rx.recv().await {
            self.handle_agent_complete(event).await;
        }
    }

    // ─── Transitions (caller must hold the transition lock) ───────────────

    /// Drive the current step forward: mark it running, build its message,
    /// and send it to the active conversation.
    async fn start_step(&self) {
        let Some(run) = self.run.get() else { return };
        if !run.is_running || run.phase != RunPhase::Step {
            return;
        }
        // Defensive: the index is engine-controlled, but never panic on it.
        let Some(step) = run.current_step().cloned() else {
            return;
        };
        let index = run.current_step_index;

        let mut next = run.clone();
        if let Some(s) = next.steps.get_mut(index) {
            s.status = StepStatus::Running;
            s.started_at = Some(Utc::now());
        }
        self.run.set(next);

        let text = build_step_message(&step);
        if text.is_empty() {
            tracing::error!(
                "[Workflow] Step {} built an empty message, ending run",
                index + 1
            );
            self.fail_current_step(WorkflowError::EmptyStepMessage(format!(
                "step {} ({})",
                index + 1,
                step.kind.as_str()
            )));
            return;
        }

        tracing::info!(
            "[Workflow] Step {}/{}: sending to conversation {}",
            index + 1,
            run.workflow.steps.len(),
            run.conversation_id
        );
        let options = self.send_options(&run);
        if let Err(e) = self
            .gateway
            .send_message(&run.space_id, &run.conversation_id, &text, &options)
            .await
        {
            tracing::error!("[Workflow] Failed to send step message: {}", e);
            self.fail_current_step(e);
            return;
        }
        self.arm_deadline();
    }

    /// Phase `step`: record the step's output, then either request a
    /// handoff summary, advance to the next step, or finish the run.
    async fn complete_step(&self, run: WorkflowRunState) {
        let index = run.current_step_index;
        let now = Utc::now();
        let output = self.run.last_assistant_text(&run.conversation_id);

        let mut next = run;
        if let Some(s) = next.steps.get_mut(index) {
            s.status = StepStatus::Completed;
            s.output = output;
            s.ended_at = Some(now);
        }

        let summarize = next
            .current_step()
            .map(|s| s.summarize_after)
            .unwrap_or(false);

        if summarize && !next.is_last_step() {
            next.phase = RunPhase::Summary;
            let space_id = next.space_id.clone();
            let conversation_id = next.conversation_id.clone();
            let options = self.send_options(&next);
            self.run.set(next);

            tracing::info!(
                "[Workflow] Step {} complete, requesting handoff summary",
                index + 1
            );
            if let Err(e) = self
                .gateway
                .send_message(&space_id, &conversation_id, SUMMARY_PROMPT, &options)
                .await
            {
                tracing::error!("[Workflow] Failed to send summary prompt: {}", e);
                self.fail_current_step(e);
                return;
            }
            self.arm_deadline();
            return;
        }

        if next.is_last_step() {
            let total = next.workflow.steps.len();
            next.is_running = false;
            next.ended_at = Some(now);
            self.run.set(next);
            tracing::info!("[Workflow] Run complete: all {} steps finished", total);
            return;
        }

        next.current_step_index += 1;
        next.phase = RunPhase::Step;
        next.summary_text = None;
        self.run.set(next);
        self.start_step().await;
    }

    /// Phase `summary`: read the handoff summary, fork into a fresh
    /// conversation, and inject the summary there. Summarization is not
    /// retried.
    async fn complete_summary(&self, run: WorkflowRunState) {
        let Some(summary) = self.run.last_assistant_text(&run.conversation_id) else {
            tracing::error!("[Workflow] No assistant text to summarize, ending run");
            self.fail_current_step(WorkflowError::SummaryUnavailable(format!(
                "step {}",
                run.current_step_index + 1
            )));
            return;
        };

        let title = format!("{} (step {})", run.workflow.name, run.current_step_index + 2);
        let conversation = match self.gateway.create_conversation(&run.space_id, &title).await {
            Ok(c) => c,
            Err(e) => {
                tracing::error!("[Workflow] Failed to create handoff conversation: {}", e);
                let mut next = run;
                next.is_running = false;
                next.ended_at = Some(Utc::now());
                self.run.set(next);
                self.record_error(&e);
                return;
            }
        };

        let mut next = run;
        next.conversation_id = conversation.id.clone();
        next.phase = RunPhase::SummaryInject;
        next.summary_text = Some(summary.clone());
        let space_id = next.space_id.clone();
        let options = self.send_options(&next);
        self.run.set(next);

        tracing::info!(
            "[Workflow] Handoff conversation {} created, injecting summary",
            conversation.id
        );
        let injection = format!(
            "Context summary from previous steps:\n\n{}\n\nAcknowledge briefly and wait.",
            summary
        );
        if let Err(e) = self
            .gateway
            .send_message(&space_id, &conversation.id, &injection, &options)
            .await
        {
            tracing::error!("[Workflow] Failed to inject summary: {}", e);
            self.fail_current_step(e);
            return;
        }
        self.arm_deadline();
    }

    /// Phase `summary-inject`: the handoff conversation acknowledged; the
    /// next step now runs there.
    async fn complete_injection(&self, run: WorkflowRunState) {
        let mut next = run;

        // Defensive: summarization is only requested before a following
        // step, so this branch should be unreachable.
        if next.is_last_step() {
            next.is_running = false;
            next.ended_at = Some(Utc::now());
            self.run.set(next);
            return;
        }

        next.current_step_index += 1;
        next.phase = RunPhase::Step;
        next.summary_text = None;
        self.run.set(next);
        self.start_step().await;
    }

    // ─── Helpers ──────────────────────────────────────────────────────────

    fn send_options(&self, run: &WorkflowRunState) -> SendOptions {
        let settings = run.workflow.settings.clone().unwrap_or_default();
        SendOptions {
            thinking_enabled: settings.thinking_enabled,
            ai_browser_enabled: settings.ai_browser_enabled,
            origin: ORIGIN_WORKFLOW.to_string(),
        }
    }

    /// Mark the current step `error` and end the run.
    fn fail_current_step(&self, err: WorkflowError) {
        if let Some(run) = self.run.get() {
            let mut next = run;
            let now = Utc::now();
            if let Some(s) = next.steps.get_mut(next.current_step_index) {
                s.status = StepStatus::Error;
                s.ended_at = Some(now);
            }
            next.is_running = false;
            next.ended_at = Some(now);
            self.run.set(next);
        }
        self.record_error(&err);
    }

    /// Arm the liveness watchdog for the send that just happened. If no
    /// transition bumps the sequence before the deadline, the run ends with
    /// a timeout error.
    fn arm_deadline(&self) {
        let Some(deadline) = self.config.step_deadline else {
            return;
        };
        let Some(run) = self.run.get() else { return };
        let seq = run.transition_seq;
        let engine = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            let _guard = engine.transition_lock.lock().await;
            let Some(run) = engine.run.get() else { return };
            if !run.is_running || run.transition_seq != seq {
                return;
            }
            tracing::error!(
                "[Workflow] No completion event within {:?}, ending run",
                deadline
            );
            engine.fail_current_step(WorkflowError::Timeout(format!(
                "step {} saw no completion event within {:?}",
                run.current_step_index + 1,
                deadline
            )));
        });
    }

    fn record_error(&self, err: &WorkflowError) {
        if let Ok(mut last) = self.last_error.write() {
            *last = Some(err.to_string());
        }
    }

    fn clear_error(&self) {
        if let Ok(mut last) = self.last_error.write() {
            *last = None;
        }
    }

    fn fail(&self, err: WorkflowError) -> WorkflowError {
        self.record_error(&err);
        err
    }
}
