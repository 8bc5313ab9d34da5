//! `reqwest` implementation of [`RestExecutor`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use super::{RequestOptions, RestExecutor, Route};
use crate::config::RestSettings;
use crate::infrastructure::metrics;
use crate::shared::error::RestError;

/// Used when a 429 carries no usable retry hint.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Bot-authenticated HTTP executor.
///
/// No rate-limit bucketing: a 429 is classified and returned, never waited
/// out here.
#[derive(Debug, Clone)]
pub struct HttpRestExecutor {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpRestExecutor {
    pub fn new(settings: &RestSettings) -> Result<Self, RestError> {
        let client = Client::builder()
            .timeout(settings.timeout())
            .user_agent(&settings.user_agent)
            .build()
            .map_err(|e| RestError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            token: settings.token.clone(),
        })
    }

    async fn send(&self, route: &Route, options: &RequestOptions) -> Result<Value, RestError> {
        let url = format!("{}{}", self.base_url, route.path());
        let mut request = self
            .client
            .request(route.method(), &url)
            .header(reqwest::header::AUTHORIZATION, format!("Bot {}", self.token));

        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }
        if let Some(reason) = &options.reason {
            request = request.header("X-Audit-Log-Reason", reason);
        }
        if options.bypass_cache {
            request = request.header(reqwest::header::CACHE_CONTROL, "no-cache");
        }

        let response = request.send().await.map_err(transport_error)?;
        handle_response(route, response).await
    }
}

#[async_trait]
impl RestExecutor for HttpRestExecutor {
    #[instrument(skip(self, options, token), fields(route = %route))]
    async fn execute(
        &self,
        route: Route,
        options: RequestOptions,
        token: CancellationToken,
    ) -> Result<Value, RestError> {
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => Err(RestError::Cancelled),
            result = self.send(&route, &options) => result,
        };

        let outcome = match &result {
            Ok(_) => "ok",
            Err(RestError::NotFound { .. }) => "not_found",
            Err(RestError::Cancelled) => "cancelled",
            Err(err) if err.is_retryable() => "retryable",
            Err(_) => "failed",
        };
        metrics::record_rest_fetch(route.label(), outcome);
        if let Err(err) = &result {
            debug!(error = %err, outcome, "REST request failed");
        }
        result
    }
}

async fn handle_response(route: &Route, response: Response) -> Result<Value, RestError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<Value>()
            .await
            .map_err(|e| RestError::Decode(e.to_string()));
    }

    let retry_after = if status == StatusCode::TOO_MANY_REQUESTS {
        let header = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<f64>().ok());
        match header {
            Some(secs) => Some(secs),
            None => response
                .json::<Value>()
                .await
                .ok()
                .and_then(|body| body.get("retry_after").and_then(Value::as_f64)),
        }
    } else {
        None
    };

    Err(classify(route, status, retry_after))
}

/// Map a non-success status onto a [`RestError`].
fn classify(route: &Route, status: StatusCode, retry_after: Option<f64>) -> RestError {
    match status {
        StatusCode::NOT_FOUND => RestError::NotFound {
            route: route.path(),
        },
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = retry_after
                .filter(|secs| secs.is_finite() && *secs >= 0.0)
                .map(Duration::from_secs_f64)
                .unwrap_or(DEFAULT_RETRY_AFTER);
            warn!(route = %route, ?retry_after, "Rate limited");
            RestError::RateLimited { retry_after }
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RestError::PermanentAuth {
            status: status.as_u16(),
        },
        s if s.is_server_error() => RestError::Transient(format!("server returned {s}")),
        s => RestError::Http { status: s.as_u16() },
    }
}

fn transport_error(err: reqwest::Error) -> RestError {
    if err.is_builder() {
        RestError::Client(err.to_string())
    } else {
        // Timeouts, connection resets and DNS failures are all worth retrying
        RestError::Transient(err.to_string())
    }
}
