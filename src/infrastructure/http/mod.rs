//! Outbound HTTP plumbing shared by the embedder and the workflow executor

mod client;

pub use client::{HttpClient, HttpClientTrait, HttpError};

#[cfg(test)]
pub use client::mock::MockHttpClient;
