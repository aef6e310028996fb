//! HTTP transport module for goal-roadmap
//!
//! Axum server exposing the single generation entry point plus plain JSON health, info
//! and metrics endpoints.

use axum::{
    Json, Router,
    body::Body,
    extract::{State, rejection::JsonRejection},
    http::{Request, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use std::{
    cmp::Ordering,
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::error::{RoadmapError, Result};
use crate::roadmap::pipeline_budget;
use crate::router::{
    ErrorEnvelope, FlowKind, RawRequest, Reply, RoadmapService, SHAPE_HELP, flow_kind,
    new_request_id, status_for,
};

pub const ROADMAP_PATH: &str = "/api/roadmap";
const LATENCY_WINDOW: usize = 256;

/// Shared state for HTTP server
#[derive(Clone)]
pub struct HttpState {
    pub config: Arc<Config>,
    pub service: RoadmapService,
    pub metrics: Arc<Mutex<HttpMetrics>>,
}

/// Metrics for HTTP server
#[derive(Debug, Clone)]
pub struct HttpMetrics {
    pub total_requests: u64,
    pub last_request_unix: u64,
    pub errors_total: u64,
    pub latencies: Vec<f64>, // ring buffer for p95
    pub flow_counts: HashMap<&'static str, u64>,
}

impl HttpMetrics {
    fn new() -> Self {
        Self {
            total_requests: 0,
            last_request_unix: unix_now(),
            errors_total: 0,
            latencies: Vec::with_capacity(LATENCY_WINDOW),
            flow_counts: HashMap::new(),
        }
    }
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl HttpState {
    pub fn new(config: Arc<Config>, service: RoadmapService) -> Self {
        Self {
            config,
            service,
            metrics: Arc::new(Mutex::new(HttpMetrics::new())),
        }
    }

    /// Explicit budget if configured, else derived from the registry the service runs with
    pub fn request_budget(&self) -> Duration {
        self.config
            .runtime
            .http_request_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| pipeline_budget(self.service.invoker().registry()))
    }
}

fn json_response(status: u16, body: &serde_json::Value) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
        .into_response()
}

/// Health check endpoint
pub async fn health_handler() -> impl IntoResponse {
    "ok"
}

/// Info endpoint
pub async fn info_handler(State(state): State<HttpState>) -> impl IntoResponse {
    let registry = state.service.invoker().registry();
    let generation = state.service.generation();

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        json!({
            "provider": {
                "backend": state.service.invoker().backend().name(),
                "base_url": state.config.provider.base_url,
                "models": registry.models,
                "timeout_tiers_ms": registry
                    .timeout_tiers
                    .iter()
                    .map(|d| d.as_millis() as u64)
                    .collect::<Vec<_>>(),
                "max_retries": registry.max_retries,
                "credential_present": state.service.invoker().backend().is_configured()
            },
            "generation": {
                "default_temperature": generation.default_temperature,
                "conversion_temperature": generation.conversion_temperature,
                "vagueness_prefilter": generation.vagueness_prefilter
            },
            "server": {
                "bind": state.config.runtime.http_bind.to_string(),
                "request_timeout_ms": state.request_budget().as_millis() as u64
            }
        })
        .to_string(),
    )
}

/// Metrics endpoint
pub async fn metrics_handler(State(state): State<HttpState>) -> impl IntoResponse {
    let metrics = state.metrics.lock().await.clone();

    let (avg_latency_ms, p95_latency_ms) = if metrics.latencies.is_empty() {
        (None, None)
    } else {
        let sum: f64 = metrics.latencies.iter().sum();
        let avg = sum / metrics.latencies.len() as f64;
        let mut sorted = metrics.latencies.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        let p95_idx = ((sorted.len() as f64 * 0.95) as usize).min(sorted.len() - 1);
        (Some(avg), sorted.get(p95_idx).copied())
    };

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        json!({
            "metrics_version": "1",
            "total_requests": metrics.total_requests,
            "last_request_unix": metrics.last_request_unix,
            "errors_total": metrics.errors_total,
            "avg_latency_ms": avg_latency_ms,
            "p95_latency_ms": p95_latency_ms,
            "flows": metrics.flow_counts
        })
        .to_string(),
    )
}

/// Single entry point for both flows
pub async fn roadmap_handler(
    State(state): State<HttpState>,
    body: std::result::Result<Json<RawRequest>, JsonRejection>,
) -> Response {
    let reply = match body {
        Ok(Json(raw)) => {
            let budget = state.request_budget();
            let request_id = new_request_id();
            let kind = flow_kind(&raw, state.service.generation().default_temperature);
            // Dropping the pipeline future on timeout also drops any in-flight backend call
            match tokio::time::timeout(
                budget,
                state.service.respond_with_id(raw, request_id.clone()),
            )
            .await
            {
                Ok(reply) => reply,
                Err(_) => {
                    let err = RoadmapError::Timeout {
                        operation: "roadmap request".to_string(),
                        timeout_ms: budget.as_millis() as u64,
                    };
                    tracing::error!(request_id = %request_id, error = %err, "request abandoned");
                    error_reply(err, request_id, kind)
                }
            }
        }
        Err(rejection) => {
            let request_id = new_request_id();
            let err = RoadmapError::Validation {
                message: format!(
                    "{} ({})",
                    SHAPE_HELP,
                    rejection.body_text()
                ),
            };
            tracing::warn!(request_id = %request_id, error = %err, "rejected request body");
            error_reply(err, request_id, FlowKind::Invalid)
        }
    };

    {
        let mut m = state.metrics.lock().await;
        *m.flow_counts.entry(reply.flow.as_str()).or_insert(0) += 1;
    }

    json_response(reply.status, &reply.body)
}

fn error_reply(err: RoadmapError, request_id: String, flow: FlowKind) -> Reply {
    let status = status_for(&err);
    let body = serde_json::to_value(ErrorEnvelope::from_error(&err, &request_id))
        .unwrap_or_else(|_| json!({ "error": err.code(), "requestId": request_id }));
    Reply {
        request_id,
        flow,
        status,
        body,
    }
}

/// Record latency, outcome and count for `/api/` calls; other paths pass through
async fn track_api_metrics(
    State(metrics): State<Arc<Mutex<HttpMetrics>>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if !req.uri().path().starts_with("/api/") {
        return next.run(req).await;
    }

    let started = Instant::now();
    let resp = next.run(req).await;
    let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

    let mut m = metrics.lock().await;
    if m.latencies.len() == LATENCY_WINDOW {
        m.latencies.remove(0);
    }
    m.latencies.push(latency_ms);
    m.total_requests = m.total_requests.saturating_add(1);
    if !resp.status().is_success() {
        m.errors_total = m.errors_total.saturating_add(1);
    }
    m.last_request_unix = unix_now();
    resp
}

/// Build the application router; split out so tests can drive it without a socket
pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/info", get(info_handler))
        .route("/metrics", get(metrics_handler))
        .route(ROADMAP_PATH, post(roadmap_handler))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(middleware::from_fn_with_state(
            state.metrics.clone(),
            track_api_metrics,
        ))
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_http_server(config: Arc<Config>, service: RoadmapService) -> Result<()> {
    let bind = config.runtime.http_bind;
    let app = build_router(HttpState::new(config, service));

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind HTTP listener: {}", e))?;

    tracing::info!("Starting HTTP server on {} (roadmap at {})", bind, ROADMAP_PATH);

    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

    Ok(())
}
