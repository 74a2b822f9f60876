//! Workflow definition models.
//!
//! A workflow is a user-authored, ordered sequence of steps executed against
//! the conversational agent backend. Definitions can be authored as YAML:
//!
//! ```yaml
//! name: "Release Notes"
//! settings:
//!   thinkingEnabled: true
//! steps:
//!   - kind: skill
//!     name: "docs:changelog"
//!     input: "v0.4.0..v0.5.0"
//!     summarizeAfter: true
//!   - kind: agent
//!     name: reviewer
//!     input: "Review the draft above"
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;

/// What a workflow step invokes on the agent backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Skill,
    Agent,
    Command,
    Message,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skill => "skill",
            Self::Agent => "agent",
            Self::Command => "command",
            Self::Message => "message",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "skill" => Some(Self::Skill),
            "agent" => Some(Self::Agent),
            "command" => Some(Self::Command),
            "message" => Some(Self::Message),
            _ => None,
        }
    }
}

/// A single step in a workflow definition.
///
/// `name` may be namespace-qualified as `namespace:name`; without a `:` the
/// name resolves against the default namespace. `args` applies to skill
/// steps only. When `summarize_after` is set, the engine forks the
/// conversation after this step completes, carrying only a summarized
/// context into the next step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStep {
    #[serde(default = "new_step_id")]
    pub id: String,
    pub kind: StepKind,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub args: Option<String>,
    #[serde(default)]
    pub summarize_after: bool,
}

fn new_step_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Per-workflow execution settings passed through to the agent backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_browser_enabled: Option<bool>,
}

/// A stored workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    pub id: String,
    pub space_id: String,
    pub name: String,
    pub steps: Vec<WorkflowStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<WorkflowSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_conversation_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowDefinition {
    pub fn new(id: String, space_id: String, input: WorkflowInput) -> Self {
        let now = Utc::now();
        Self {
            id,
            space_id,
            name: input.name,
            steps: input.steps,
            settings: input.settings,
            last_run_at: None,
            last_conversation_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Payload for creating a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowInput {
    pub name: String,
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
    #[serde(default)]
    pub settings: Option<WorkflowSettings>,
}

impl WorkflowInput {
    /// Parse a workflow input from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, WorkflowError> {
        serde_yaml::from_str(yaml)
            .map_err(|e| WorkflowError::Validation(format!("Failed to parse workflow YAML: {}", e)))
    }

    /// Load a workflow input from a file path.
    pub fn from_file(path: &str) -> Result<Self, WorkflowError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            WorkflowError::Validation(format!("Failed to read workflow file '{}': {}", path, e))
        })?;
        Self::from_yaml(&content)
    }
}

/// Partial update for a stored workflow. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub steps: Option<Vec<WorkflowStep>>,
    #[serde(default)]
    pub settings: Option<WorkflowSettings>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_workflow() {
        let yaml = r#"
name: "Test Flow"
steps:
  - kind: message
    input: "Hello, world!"
"#;
        let input = WorkflowInput::from_yaml(yaml).unwrap();
        assert_eq!(input.name, "Test Flow");
        assert_eq!(input.steps.len(), 1);
        assert_eq!(input.steps[0].kind, StepKind::Message);
        assert!(!input.steps[0].summarize_after);
        assert!(!input.steps[0].id.is_empty());
    }

    #[test]
    fn test_parse_full_workflow() {
        let yaml = r#"
name: "Release Notes"
settings:
  thinkingEnabled: true
  aiBrowserEnabled: false
steps:
  - kind: skill
    name: "docs:changelog"
    input: "v0.4.0..v0.5.0"
    args: "--markdown"
    summarizeAfter: true
  - kind: agent
    name: reviewer
    input: "Review the draft above"
  - kind: command
    name: publish
"#;
        let input = WorkflowInput::from_yaml(yaml).unwrap();
        assert_eq!(input.steps.len(), 3);
        let settings = input.settings.unwrap();
        assert_eq!(settings.thinking_enabled, Some(true));
        assert_eq!(settings.ai_browser_enabled, Some(false));
        assert_eq!(input.steps[0].name.as_deref(), Some("docs:changelog"));
        assert_eq!(input.steps[0].args.as_deref(), Some("--markdown"));
        assert!(input.steps[0].summarize_after);
        assert_eq!(input.steps[1].kind, StepKind::Agent);
        assert!(input.steps[2].input.is_none());
    }

    #[test]
    fn test_step_kind_round_trip() {
        for kind in [
            StepKind::Skill,
            StepKind::Agent,
            StepKind::Command,
            StepKind::Message,
        ] {
            assert_eq!(StepKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(StepKind::from_str("tool"), None);
    }
}
