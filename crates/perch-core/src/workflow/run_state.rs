//! Run state: the single mutable aggregate of an executing workflow.
//!
//! `RunStateStore` holds at most one `WorkflowRunState` and replaces the
//! whole record on every mutation, so concurrent readers never observe a
//! torn state. All mutation happens inside the engine's serialized
//! transition path; the store itself only swaps snapshots.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::gateway::AgentGateway;
use crate::models::{WorkflowDefinition, WorkflowStep};

/// Sub-state of a run, distinct from per-step status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunPhase {
    /// Executing a workflow step.
    Step,
    /// Waiting for the summarization turn in the old conversation.
    Summary,
    /// Waiting for the handoff conversation to acknowledge the injected
    /// summary.
    SummaryInject,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Step => "step",
            Self::Summary => "summary",
            Self::SummaryInject => "summary-inject",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Error,
}

/// Execution record for one definition step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRunState {
    pub step_id: String,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl StepRunState {
    fn pending(step: &WorkflowStep) -> Self {
        Self {
            step_id: step.id.clone(),
            status: StepStatus::Pending,
            output: None,
            started_at: None,
            ended_at: None,
        }
    }
}

/// Snapshot of the currently executing workflow run.
///
/// `steps` always has one entry per definition step; `current_step_index`
/// is non-decreasing within a run and only changes inside the engine.
/// `conversation_id` changes when the summarize-and-handoff protocol forks
/// context.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRunState {
    pub workflow: WorkflowDefinition,
    pub space_id: String,
    pub conversation_id: String,
    pub current_step_index: usize,
    pub steps: Vec<StepRunState>,
    pub is_running: bool,
    pub phase: RunPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_text: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// Bumped on every snapshot replacement; lets the deadline watchdog
    /// detect that a run is stuck on the same transition.
    #[serde(skip)]
    pub transition_seq: u64,
}

impl WorkflowRunState {
    pub fn new(workflow: WorkflowDefinition, space_id: String, conversation_id: String) -> Self {
        let steps = workflow.steps.iter().map(StepRunState::pending).collect();
        Self {
            workflow,
            space_id,
            conversation_id,
            current_step_index: 0,
            steps,
            is_running: true,
            phase: RunPhase::Step,
            summary_text: None,
            started_at: Utc::now(),
            ended_at: None,
            transition_seq: 0,
        }
    }

    /// The definition step the run is currently on, if any.
    pub fn current_step(&self) -> Option<&WorkflowStep> {
        self.workflow.steps.get(self.current_step_index)
    }

    pub fn is_last_step(&self) -> bool {
        self.current_step_index + 1 >= self.workflow.steps.len()
    }
}

/// Holder of the active run. Readers get cloned snapshots; writers replace
/// the whole record.
pub struct RunStateStore {
    inner: RwLock<Option<WorkflowRunState>>,
    conversations: Arc<dyn AgentGateway>,
}

impl RunStateStore {
    pub fn new(conversations: Arc<dyn AgentGateway>) -> Self {
        Self {
            inner: RwLock::new(None),
            conversations,
        }
    }

    pub fn get(&self) -> Option<WorkflowRunState> {
        self.inner.read().ok().and_then(|r| r.clone())
    }

    /// Replace the active run snapshot, bumping the transition sequence.
    pub fn set(&self, mut next: WorkflowRunState) {
        if let Ok(mut inner) = self.inner.write() {
            next.transition_seq = inner
                .as_ref()
                .map(|prev| prev.transition_seq + 1)
                .unwrap_or(0);
            *inner = Some(next);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut inner) = self.inner.write() {
            *inner = None;
        }
    }

    /// Trimmed text of the most recent assistant message in a conversation,
    /// read from the agent backend's cache.
    pub fn last_assistant_text(&self, conversation_id: &str) -> Option<String> {
        self.conversations
            .cached_conversation(conversation_id)
            .and_then(|conv| conv.last_assistant_text())
    }
}
