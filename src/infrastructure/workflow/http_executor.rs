//! Workflow executor that dispatches to an HTTP workflow service

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::domain::workflow::{WorkflowExecutor, WorkflowKind, WorkflowOutcome};
use crate::domain::DomainError;
use crate::infrastructure::http::HttpClientTrait;

/// Runs workflows by POSTing `{route_id, query}` to
/// `{base_url}/workflows/{kind}`
#[derive(Debug)]
pub struct HttpWorkflowExecutor<C: HttpClientTrait> {
    client: C,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct WorkflowReply {
    #[serde(default)]
    payload: serde_json::Value,
    #[serde(default = "default_success")]
    success: bool,
}

fn default_success() -> bool {
    true
}

impl<C: HttpClientTrait> HttpWorkflowExecutor<C> {
    pub fn new(client: C, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn workflow_url(&self, workflow: WorkflowKind) -> String {
        format!("{}/workflows/{}", self.base_url, workflow.as_str())
    }
}

#[async_trait]
impl<C: HttpClientTrait> WorkflowExecutor for HttpWorkflowExecutor<C> {
    async fn execute(
        &self,
        workflow: WorkflowKind,
        route_id: &str,
        query: &str,
    ) -> Result<WorkflowOutcome, DomainError> {
        let url = self.workflow_url(workflow);
        let body = serde_json::json!({
            "route_id": route_id,
            "query": query,
        });

        debug!(workflow = %workflow, route_id, "Dispatching workflow");

        let reply = self
            .client
            .post_json(&url, vec![("Content-Type", "application/json")], &body)
            .await
            .map_err(|e| {
                DomainError::computation_failed(format!("Workflow '{}' failed: {}", workflow, e))
            })?;

        let reply: WorkflowReply = serde_json::from_value(reply).map_err(|e| {
            DomainError::computation_failed(format!(
                "Workflow '{}' returned a malformed reply: {}",
                workflow, e
            ))
        })?;

        Ok(WorkflowOutcome {
            payload: reply.payload,
            success: reply.success,
        })
    }
}
