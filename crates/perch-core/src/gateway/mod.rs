//! Conversation/agent gateway contract.
//!
//! The engine never talks to the agent backend directly; the host wires in
//! an `AgentGateway`. Sends are fire-and-forget: a turn's completion is
//! reported later through [`crate::workflow::engine::AgentTurnCompleted`],
//! and the resulting assistant text is recovered from the backend's
//! conversation cache.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;
use crate::models::CachedConversation;

/// Origin tag attached to workflow-sent messages so the backend and
/// telemetry can distinguish them from direct user messages.
pub const ORIGIN_WORKFLOW: &str = "workflow";

/// Handle to a newly created conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewConversation {
    pub id: String,
}

/// Per-send options passed through to the agent backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_browser_enabled: Option<bool>,
    pub origin: String,
}

/// External conversation/agent collaborator.
#[async_trait]
pub trait AgentGateway: Send + Sync {
    async fn create_conversation(
        &self,
        space_id: &str,
        title: &str,
    ) -> Result<NewConversation, WorkflowError>;

    /// Fire-and-forget: returning `Ok` means the message was accepted, not
    /// that the turn finished.
    async fn send_message(
        &self,
        space_id: &str,
        conversation_id: &str,
        text: &str,
        options: &SendOptions,
    ) -> Result<(), WorkflowError>;

    /// Cancel in-flight generation on a conversation.
    async fn stop_generation(&self, conversation_id: &str) -> Result<(), WorkflowError>;

    /// Cache read; `None` when the conversation is unknown or not cached.
    fn cached_conversation(&self, conversation_id: &str) -> Option<CachedConversation>;
}
