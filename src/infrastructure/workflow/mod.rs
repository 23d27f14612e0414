//! Workflow executor implementations

mod http_executor;

pub use http_executor::HttpWorkflowExecutor;
