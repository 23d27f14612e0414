//! Workflow executor trait

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::WorkflowKind;
use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Result of running a workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowOutcome {
    /// Opaque response returned to the caller
    pub payload: serde_json::Value,
    /// Whether the workflow accepted the query as belonging to it
    pub success: bool,
}

impl WorkflowOutcome {
    pub fn succeeded(payload: serde_json::Value) -> Self {
        Self {
            payload,
            success: true,
        }
    }

    pub fn rejected(payload: serde_json::Value) -> Self {
        Self {
            payload,
            success: false,
        }
    }
}

/// Runs a workflow for a query (external collaborator)
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WorkflowExecutor: Send + Sync {
    /// Execute `workflow` for `query`. `route_id` names the route that
    /// selected the workflow.
    async fn execute(
        &self,
        workflow: WorkflowKind,
        route_id: &str,
        query: &str,
    ) -> Result<WorkflowOutcome, DomainError>;
}
