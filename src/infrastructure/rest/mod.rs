//! REST Executor
//!
//! The cache falls back to REST on a miss. It only needs one operation from
//! the HTTP side: run a route and hand back the decoded JSON body, with
//! failures classified so callers can tell "gone" from "try later".

mod http;
mod route;

pub use http::HttpRestExecutor;
pub use route::Route;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::shared::error::RestError;

/// Per-request options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Overrides the executor's default timeout
    pub timeout: Option<Duration>,
    /// Audit log reason, sent for requests that change state
    pub reason: Option<String>,
    /// Ask intermediaries not to serve a cached response
    pub bypass_cache: bool,
}

impl RequestOptions {
    pub fn bypassing_cache() -> Self {
        Self {
            bypass_cache: true,
            ..Self::default()
        }
    }
}

/// Executes REST routes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RestExecutor: Send + Sync {
    /// Run `route` and return the response body. Must resolve with
    /// [`RestError::Cancelled`] promptly once `token` is cancelled.
    async fn execute(
        &self,
        route: Route,
        options: RequestOptions,
        token: CancellationToken,
    ) -> Result<Value, RestError>;
}
