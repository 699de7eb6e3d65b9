// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the community guard service.
//!
//! Every refusal leaves the service as a [`Denial`], rendered with a stable
//! status code and machine-readable `code`.

use crate::config::{Config, MetricsConfig};
use crate::cron::CronAuthenticator;
use crate::error::{ConfigError, Denial};
use crate::events::{EventSink, SecurityEventRecorder};
use crate::gate::{Access, AuthorizationGate};
use crate::identity::{Identity, IdentityResolver, SessionProvider};
use crate::limiter::{RateLimiter, ResourceClass};
use crate::store::{CounterKey, CounterStore};
use crate::validator::{EndpointValidationResult, EndpointValidator, StaticRegistry};
use axum::{
    body::{self, Body},
    extract::State,
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Upper bound on request bodies read by hand.
const MAX_BODY_BYTES: usize = 16 * 1024;

/// Shared application state.
pub struct AppState {
    pub resolver: IdentityResolver,
    pub gate: AuthorizationGate,
    pub limiter: RateLimiter,
    pub validator: EndpointValidator,
    pub cron: CronAuthenticator,
    pub recorder: SecurityEventRecorder,
}

impl AppState {
    /// Wire the components around the given collaborators.
    pub fn new(
        config: &Config,
        sessions: Arc<dyn SessionProvider>,
        store: Arc<dyn CounterStore>,
        sink: Arc<dyn EventSink>,
    ) -> prometheus::Result<Self> {
        let recorder = SecurityEventRecorder::new(sink)?;
        let resolver = IdentityResolver::new(sessions);
        let limiter = RateLimiter::new(store, recorder.clone());
        let registry = StaticRegistry::new(config.endpoints.registered.iter().cloned());

        Ok(Self {
            gate: AuthorizationGate::new(resolver.clone(), recorder.clone()),
            validator: EndpointValidator::new(Arc::new(registry), recorder.clone()),
            cron: CronAuthenticator::new(
                config.cron.secret.clone(),
                limiter.clone(),
                recorder.clone(),
            ),
            resolver,
            limiter,
            recorder,
        })
    }
}

/// Paths served regardless of configuration.
pub const SERVICE_ROUTES: [&str; 6] = [
    "/health",
    "/healthz",
    "/endpoints/validate",
    "/reports",
    "/cron/tick",
    "/admin/quotas/reset",
];

/// Build the service router.
///
/// Fails when the metrics path cannot be mounted next to the service routes.
pub fn router(state: Arc<AppState>, metrics: &MetricsConfig) -> Result<Router, ConfigError> {
    let mut router = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/endpoints/validate", post(validate_endpoint))
        .route("/reports", post(submit_report))
        .route("/cron/tick", post(cron_tick))
        .route("/admin/quotas/reset", post(reset_quota));

    if metrics.enabled {
        check_metrics_path(&metrics.path)?;
        router = router.route(&metrics.path, get(metrics_handler));
    }

    Ok(router.with_state(state))
}

fn check_metrics_path(path: &str) -> Result<(), ConfigError> {
    let invalid = |reason| ConfigError::InvalidMetricsPath {
        path: path.to_string(),
        reason,
    };

    if !path.starts_with('/') {
        return Err(invalid("must start with '/'"));
    }
    if path
        .split('/')
        .any(|segment| segment.starts_with(':') || segment.starts_with('*'))
    {
        return Err(invalid("must not capture path segments"));
    }
    if SERVICE_ROUTES.contains(&path) {
        return Err(invalid("already served by another route"));
    }
    Ok(())
}

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Endpoint validation request.
#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub url: String,
}

/// Whole seconds, rounded up so a client never retries early.
fn retry_after_secs(retry_after: Duration) -> u64 {
    retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0)
}

impl IntoResponse for Denial {
    fn into_response(self) -> Response {
        let status = match &self {
            Denial::AuthenticationRequired | Denial::AutomatedCallerRejected => {
                StatusCode::UNAUTHORIZED
            }
            Denial::AuthorizationDenied => StatusCode::FORBIDDEN,
            Denial::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            Denial::InvalidEndpoint(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };
        let retry_secs = self.retry_after().map(retry_after_secs);

        let mut response = (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
                code: self.code().to_string(),
                retry_after_secs: retry_secs,
            }),
        )
            .into_response();

        if let Some(secs) = retry_secs {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        if matches!(self, Denial::AutomatedCallerRejected) {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

fn bad_request(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
            code: "BAD_REQUEST".to_string(),
            retry_after_secs: None,
        }),
    )
        .into_response()
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "community-guard",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Validate a user-supplied external endpoint.
pub async fn validate_endpoint(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<ValidateRequest>,
) -> Result<Json<EndpointValidationResult>, Denial> {
    let identity = state.resolver.resolve(&headers).await;
    let result = state.validator.validate_as(&identity, &req.url).await;
    result.into_result()?;
    Ok(Json(result))
}

/// Accept an abuse report, subject to the caller's report quota.
pub async fn submit_report(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, Denial> {
    let identity = state.resolver.resolve(&headers).await;
    let class = ResourceClass::report_submission(&identity);
    let status = state.limiter.enforce(&identity, &class.config()).await?;

    debug!(caller = %identity, remaining = status.remaining, "Report accepted");
    Ok((
        StatusCode::ACCEPTED,
        [("X-RateLimit-Remaining", status.remaining.to_string())],
    )
        .into_response())
}

/// Entry point for scheduled jobs.
pub async fn cron_tick(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<StatusCode, Denial> {
    state.cron.authorize(&headers).await?;
    info!("Scheduled tick accepted");
    Ok(StatusCode::NO_CONTENT)
}

/// Clear a caller's quota window. Requires an elevated account.
pub async fn reset_quota(State(state): State<Arc<AppState>>, request: Request<Body>) -> Response {
    let limiter = state.limiter.clone();
    let outcome = state
        .gate
        .invoke(request, Access::Elevated, |request, who| async move {
            let bytes = match body::to_bytes(request.into_body(), MAX_BODY_BYTES).await {
                Ok(bytes) => bytes,
                Err(err) => return bad_request(format!("unreadable body: {err}")),
            };
            let key: CounterKey = match serde_json::from_slice(&bytes) {
                Ok(key) => key,
                Err(err) => return bad_request(format!("invalid counter key: {err}")),
            };

            match limiter.reset(&key, &Identity::User(who.identity)).await {
                Ok(()) => StatusCode::NO_CONTENT.into_response(),
                Err(err) => {
                    error!(key = %key, error = %err, "Quota reset failed");
                    StatusCode::SERVICE_UNAVAILABLE.into_response()
                }
            }
        })
        .await;

    match outcome {
        Ok(response) => response,
        Err(denial) => {
            warn!(code = denial.code(), "Quota reset refused");
            denial.into_response()
        }
    }
}

/// Prometheus exposition of the security event counters.
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    let encoder = TextEncoder::new();
    let families = state.recorder.registry().gather();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&families, &mut buffer) {
        error!(error = %err, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    ([(header::CONTENT_TYPE, encoder.format_type().to_string())], buffer).into_response()
}
