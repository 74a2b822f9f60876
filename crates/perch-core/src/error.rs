//! Core error type for the Perch workflow engine.
//!
//! `WorkflowError` is used throughout the crate (stores, catalog, engine).
//! Pre-run failures (`Validation`, `NotFound`) are surfaced to the caller
//! and leave no side effects; mid-run failures end the active run and are
//! mirrored into the engine's `last_error` string for the UI layer. A
//! completion event that does not match the active run is *not* an error —
//! it is silently ignored by the engine's guard.

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    /// A skill/agent/command step produced an empty outgoing message
    /// (typically a missing name).
    #[error("Empty step message: {0}")]
    EmptyStepMessage(String),

    /// The summarization turn produced no assistant text to hand off.
    #[error("Summary unavailable: {0}")]
    SummaryUnavailable(String),

    /// The handoff conversation could not be created.
    #[error("Conversation create failed: {0}")]
    ConversationCreate(String),

    /// The agent backend rejected a send or stop request.
    #[error("Agent backend error: {0}")]
    Agent(String),

    #[error("Step timed out: {0}")]
    Timeout(String),
}
