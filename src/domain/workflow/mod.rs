//! Workflow domain - the closed set of downstream workflows a route can
//! dispatch to, and the executor seam that runs them.

mod executor;
mod kind;

pub use executor::{WorkflowExecutor, WorkflowOutcome};
pub use kind::WorkflowKind;

#[cfg(test)]
pub use executor::MockWorkflowExecutor;
