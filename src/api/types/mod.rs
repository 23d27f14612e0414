//! Request, response and error types of the HTTP API

pub mod decision;
pub mod error;
pub mod json;

pub use decision::{
    CacheLookupResponse, ClearCacheResponse, ConfirmRouteRequest, ConfirmRouteResponse,
    InvalidateRequest, InvalidateResponse, QueryRequest, RoutesResponse, StatsResponse,
    SweepResponse,
};
pub use error::{ApiError, ApiErrorResponse};
pub use json::Json;
