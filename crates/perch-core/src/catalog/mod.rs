//! Resource catalogs and step resource availability.
//!
//! Skills, agents, and slash commands live in catalogs owned by the host
//! application; the engine only needs to know whether a step's declared
//! resource currently exists. Catalog entries may carry a namespace; step
//! names reference a namespaced entry as `namespace:name`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;
use crate::models::{StepKind, WorkflowStep};

/// One entry of a skill/agent/command catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl ResourceEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
        }
    }

    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Some(namespace.into()),
        }
    }
}

/// Host-supplied resource catalogs.
#[async_trait]
pub trait ResourceCatalog: Send + Sync {
    async fn list_skills(
        &self,
        space_id: &str,
        locale: &str,
    ) -> Result<Vec<ResourceEntry>, WorkflowError>;

    async fn list_agents(
        &self,
        space_id: &str,
        locale: &str,
    ) -> Result<Vec<ResourceEntry>, WorkflowError>;

    async fn list_commands(
        &self,
        space_id: &str,
        locale: &str,
    ) -> Result<Vec<ResourceEntry>, WorkflowError>;
}

/// Whether `step_name` resolves against `catalog`.
///
/// Unqualified names match an entry with that name and no namespace, with a
/// fallback to any entry of that name for catalogs that don't track
/// namespaces. Qualified `namespace:name` names require an exact match on
/// both parts.
pub fn is_available(step_name: &str, catalog: &[ResourceEntry]) -> bool {
    let step_name = step_name.trim();
    if step_name.is_empty() {
        return false;
    }

    match step_name.split_once(':') {
        Some((namespace, name)) => {
            if namespace.is_empty() || name.is_empty() {
                return false;
            }
            catalog
                .iter()
                .any(|e| e.name == name && e.namespace.as_deref() == Some(namespace))
        }
        None => {
            catalog
                .iter()
                .any(|e| e.name == step_name && e.namespace.is_none())
                || catalog.iter().any(|e| e.name == step_name)
        }
    }
}

/// Pick the catalog relevant to a step kind. `Message` steps need none.
fn catalog_for<'a>(
    kind: StepKind,
    skills: &'a [ResourceEntry],
    agents: &'a [ResourceEntry],
    commands: &'a [ResourceEntry],
) -> Option<&'a [ResourceEntry]> {
    match kind {
        StepKind::Skill => Some(skills),
        StepKind::Agent => Some(agents),
        StepKind::Command => Some(commands),
        StepKind::Message => None,
    }
}

/// Validate every step's declared resource against the supplied catalogs.
///
/// Returns one line per offending step, formatted as
/// `"Step {1-based index}: {kind} {name}"`. An empty result means the
/// workflow can run.
pub fn missing_resources(
    steps: &[WorkflowStep],
    skills: &[ResourceEntry],
    agents: &[ResourceEntry],
    commands: &[ResourceEntry],
) -> Vec<String> {
    let mut missing = Vec::new();

    for (index, step) in steps.iter().enumerate() {
        let Some(catalog) = catalog_for(step.kind, skills, agents, commands) else {
            continue;
        };
        let name = step.name.as_deref().unwrap_or("");
        if !is_available(name, catalog) {
            let name = name.trim();
            missing.push(format!(
                "Step {}: {} {}",
                index + 1,
                step.kind.as_str(),
                if name.is_empty() { "(unnamed)" } else { name }
            ));
        }
    }

    missing
}
