//! Step message builder.
//!
//! Converts a typed step definition into the literal text sent to the agent
//! backend: `/name` for commands and skills, `@name` for agents, the raw
//! input for message steps. Pure function, no I/O.

use crate::models::{StepKind, WorkflowStep};

/// Build the outgoing message for a step.
///
/// An empty result means the step cannot be sent (e.g. a command step with
/// no name); the engine treats that as an immediate step error.
pub fn build_step_message(step: &WorkflowStep) -> String {
    let name = step.name.as_deref().map(str::trim).unwrap_or("");
    let input = step.input.as_deref().map(str::trim).unwrap_or("");
    let args = step.args.as_deref().map(str::trim).unwrap_or("");

    let text = match step.kind {
        StepKind::Command => {
            if name.is_empty() {
                return String::new();
            }
            let mut text = format!("/{}", name);
            if !input.is_empty() {
                text.push(' ');
                text.push_str(input);
            }
            text
        }
        StepKind::Skill => {
            if name.is_empty() {
                return String::new();
            }
            let mut text = format!("/{}", name);
            if !args.is_empty() {
                text.push(' ');
                text.push_str(args);
            }
            if !input.is_empty() {
                text.push(' ');
                text.push_str(input);
            }
            text
        }
        StepKind::Agent => {
            if name.is_empty() {
                return String::new();
            }
            let mut text = format!("@{}", name);
            if !input.is_empty() {
                text.push(' ');
                text.push_str(input);
            }
            text
        }
        StepKind::Message => return step.input.clone().unwrap_or_default(),
    };

    text.trim().to_string()
}
