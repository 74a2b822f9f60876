//! Workflow execution engine.
//!
//! A run is driven by external "agent turn completed" events rather than
//! synchronous calls: the engine sends one message per step, then waits for
//! the backend to report the turn finished before advancing. Steps marked
//! `summarizeAfter` trigger the summarize-and-handoff protocol, forking the
//! run into a fresh conversation that carries only a summarized context.

pub mod engine;
pub mod message;
pub mod run_state;

pub use engine::{AgentTurnCompleted, EngineConfig, WorkflowEngine};
pub use message::build_step_message;
pub use run_state::{RunPhase, RunStateStore, StepRunState, StepStatus, WorkflowRunState};
