//! Perch Core — Transport-agnostic workflow engine for the Perch desktop assistant.
//!
//! This crate contains the workflow execution engine and its supporting
//! domain: workflow definitions, the resource catalog contract, the
//! conversation/agent gateway contract, and the SQLite-backed workflow
//! store. It has **no HTTP framework dependency**, making it suitable for
//! use in:
//!
//! - Desktop shells (direct IPC)
//! - HTTP servers
//! - CLI tools
//!
//! The engine itself is event-driven: a run advances only when the external
//! agent backend reports a completed turn via
//! [`WorkflowEngine::handle_agent_complete`].

pub mod catalog;
pub mod db;
pub mod error;
pub mod gateway;
pub mod models;
pub mod store;
pub mod workflow;

// Convenience re-exports
pub use db::Database;
pub use error::WorkflowError;
pub use workflow::engine::{AgentTurnCompleted, EngineConfig, WorkflowEngine};
