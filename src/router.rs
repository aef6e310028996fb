//! Request router and correlator
//!
//! Decides which flow a request body belongs to, stamps it with a correlation id that
//! every log line of the request carries, and shapes the success/failure envelopes.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

use crate::clients::OpenRouterClient;
use crate::clients::traits::ChatBackend;
use crate::config::{Config, GenerationConfig};
use crate::error::{RoadmapError, Result};
use crate::invoker::{ProviderRegistry, ResilientInvoker};
use crate::refine::{GoalRequest, RefinementOutcome, classify_goal};
use crate::roadmap::{PipelineResult, RoadmapRequest, generate_roadmap};

/// Step number reported for the classification response of the two-phase protocol
const REFINEMENT_STEP: u8 = 2;

pub const SHAPE_HELP: &str = "Send either {\"goal\", \"duration\"} to refine a goal, \
or {\"refinedGoal\", \"duration\"} with an approved goal to generate a roadmap.";

/// Entry-point body; which fields are present decides the flow
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRequest {
    #[serde(default)]
    pub goal: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default, alias = "refined_goal")]
    pub refined_goal: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Refine(GoalRequest),
    Roadmap(RoadmapRequest),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowKind {
    Refine,
    Roadmap,
    Invalid,
}

impl FlowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowKind::Refine => "refine",
            FlowKind::Roadmap => "roadmap",
            FlowKind::Invalid => "invalid",
        }
    }
}

fn present(field: &Option<String>) -> Option<String> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Pick the flow for a request body
pub fn dispatch(raw: &RawRequest, default_temperature: f32) -> Result<Flow> {
    let temperature = raw.temperature.unwrap_or(default_temperature);
    if !temperature.is_finite() || !(0.0..=2.0).contains(&temperature) {
        return Err(RoadmapError::Validation {
            message: format!("temperature must be between 0.0 and 2.0, got {}", temperature),
        });
    }

    let duration = present(&raw.duration);
    match (present(&raw.refined_goal), present(&raw.goal), duration) {
        (Some(refined_goal), _, Some(duration)) => Ok(Flow::Roadmap(RoadmapRequest {
            refined_goal,
            duration,
            temperature,
        })),
        (None, Some(goal), Some(duration)) => Ok(Flow::Refine(GoalRequest {
            goal,
            duration,
            temperature,
        })),
        _ => Err(RoadmapError::Validation {
            message: SHAPE_HELP.to_string(),
        }),
    }
}

/// Which flow a body would take, without running it
pub fn flow_kind(raw: &RawRequest, default_temperature: f32) -> FlowKind {
    match dispatch(raw, default_temperature) {
        Ok(Flow::Refine(_)) => FlowKind::Refine,
        Ok(Flow::Roadmap(_)) => FlowKind::Roadmap,
        Err(_) => FlowKind::Invalid,
    }
}

pub fn new_request_id() -> String {
    format!("req_{}", Uuid::new_v4().simple())
}

/// HTTP-style status for a failure
pub fn status_for(err: &RoadmapError) -> u16 {
    match err {
        RoadmapError::Validation { .. } => 400,
        RoadmapError::Upstream { .. } | RoadmapError::Generation { .. } => 502,
        RoadmapError::Timeout { .. } => 504,
        RoadmapError::Config { .. }
        | RoadmapError::Serialization { .. }
        | RoadmapError::Internal { .. } => 500,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefinementEnvelope {
    pub step: u8,
    #[serde(flatten)]
    pub outcome: RefinementOutcome,
    pub request_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadmapEnvelope {
    pub success: bool,
    pub data: PipelineResult,
    pub request_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub error: String,
    pub message: String,
    pub request_id: String,
}

impl ErrorEnvelope {
    pub fn from_error(err: &RoadmapError, request_id: &str) -> Self {
        Self {
            error: err.code().to_string(),
            message: err.to_string(),
            request_id: request_id.to_string(),
        }
    }
}

/// Fully shaped response, independent of the transport that delivers it
#[derive(Debug, Clone)]
pub struct Reply {
    pub request_id: String,
    pub flow: FlowKind,
    pub status: u16,
    pub body: Value,
}

/// Orchestration entry point shared by the HTTP server and the CLI
#[derive(Clone)]
pub struct RoadmapService {
    invoker: ResilientInvoker,
    generation: Arc<GenerationConfig>,
}

impl RoadmapService {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        registry: ProviderRegistry,
        generation: GenerationConfig,
    ) -> Self {
        Self {
            invoker: ResilientInvoker::new(backend, registry),
            generation: Arc::new(generation),
        }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let backend = OpenRouterClient::from_config(&config.provider)?;
        Ok(Self::new(
            Arc::new(backend),
            config.provider.registry(),
            config.generation.clone(),
        ))
    }

    pub fn invoker(&self) -> &ResilientInvoker {
        &self.invoker
    }

    pub fn generation(&self) -> &GenerationConfig {
        &self.generation
    }

    /// Run the flow selected by `flow`; no shaping, no correlation
    pub async fn run(&self, flow: Flow, request_id: &str) -> Result<Value> {
        if !self.invoker.backend().is_configured() {
            return Err(RoadmapError::Config {
                message: format!(
                    "{} backend has no API credential configured",
                    self.invoker.backend().name()
                ),
            });
        }

        match flow {
            Flow::Refine(request) => {
                let outcome = classify_goal(&self.invoker, &self.generation, &request).await?;
                Ok(serde_json::to_value(RefinementEnvelope {
                    step: REFINEMENT_STEP,
                    outcome,
                    request_id: request_id.to_string(),
                })?)
            }
            Flow::Roadmap(request) => {
                let data = generate_roadmap(&self.invoker, &self.generation, &request).await?;
                Ok(serde_json::to_value(RoadmapEnvelope {
                    success: true,
                    data,
                    request_id: request_id.to_string(),
                })?)
            }
        }
    }

    /// Dispatch, run and shape one request under a fresh correlation id
    pub async fn respond(&self, raw: RawRequest) -> Reply {
        self.respond_with_id(raw, new_request_id()).await
    }

    pub async fn respond_with_id(&self, raw: RawRequest, request_id: String) -> Reply {
        let span = info_span!("request", request_id = %request_id);
        async move {
            let (flow_kind, result) = match dispatch(&raw, self.generation.default_temperature) {
                Ok(flow) => {
                    let kind = match &flow {
                        Flow::Refine(_) => FlowKind::Refine,
                        Flow::Roadmap(_) => FlowKind::Roadmap,
                    };
                    info!(flow = kind.as_str(), "request dispatched");
                    (kind, self.run(flow, &request_id).await)
                }
                Err(e) => (FlowKind::Invalid, Err(e)),
            };

            match result {
                Ok(body) => Reply {
                    request_id,
                    flow: flow_kind,
                    status: 200,
                    body,
                },
                Err(err) => {
                    error!(flow = flow_kind.as_str(), code = err.code(), error = %err, "request failed");
                    let status = status_for(&err);
                    let body = serde_json::to_value(ErrorEnvelope::from_error(&err, &request_id))
                        .unwrap_or_else(|_| serde_json::json!({ "error": err.code() }));
                    Reply {
                        request_id,
                        flow: flow_kind,
                        status,
                        body,
                    }
                }
            }
        }
        .instrument(span)
        .await
    }
}
