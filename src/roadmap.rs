//! Roadmap generation pipeline (flow B)
//!
//! outline -> detailed roadmap -> structured conversion, strictly in sequence. Any stage
//! failure aborts the pipeline; there is no partial result.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::clients::traits::{ChatRequest, ResponseFormat};
use crate::config::GenerationConfig;
use crate::error::{RoadmapError, Result};
use crate::invoker::{ProviderRegistry, ResilientInvoker};
use crate::prompts;
use crate::sanitize::parse_roadmap;

const EXPECTED_MILESTONES: std::ops::RangeInclusive<usize> = 5..=7;
const PIPELINE_STAGES: u32 = 3;
/// Headroom over the worst case for decoding and envelope shaping
const BUDGET_SLACK: Duration = Duration::from_secs(5);

/// Longest the pipeline can run before every stage has either answered or exhausted
pub fn pipeline_budget(registry: &ProviderRegistry) -> Duration {
    registry.worst_case() * PIPELINE_STAGES + BUDGET_SLACK
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadmapRequest {
    pub refined_goal: String,
    pub duration: String,
    pub temperature: f32,
}

/// One milestone of a generated roadmap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadmapItem {
    pub title: String,
    pub year: i64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadmapMeta {
    pub total_milestones: usize,
    pub duration: String,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub roadmap: Vec<RoadmapItem>,
    pub meta: RoadmapMeta,
}

impl PipelineResult {
    pub fn new(roadmap: Vec<RoadmapItem>, duration: &str) -> Self {
        let meta = RoadmapMeta {
            total_milestones: roadmap.len(),
            duration: duration.to_string(),
            generated_at: Utc::now(),
        };
        Self { roadmap, meta }
    }
}

/// Conversion runs cooler than the prose stages; only a zero request temperature stays equal
fn conversion_temperature(request: f32, cap: f32) -> f32 {
    (request * 0.5).min(cap)
}

async fn run_stage(
    invoker: &ResilientInvoker,
    stage: &'static str,
    chat: ChatRequest,
) -> Result<String> {
    let invocation = invoker.invoke(&chat).await.map_err(|e| {
        error!(stage, error = %e, "pipeline stage failed");
        RoadmapError::upstream(stage, e)
    })?;
    info!(
        stage,
        model = %invocation.model,
        attempts = invocation.attempts,
        chars = invocation.content.len(),
        "pipeline stage complete"
    );
    Ok(invocation.content)
}

pub async fn generate_roadmap(
    invoker: &ResilientInvoker,
    generation: &GenerationConfig,
    request: &RoadmapRequest,
) -> Result<PipelineResult> {
    let outline = run_stage(
        invoker,
        "outline",
        ChatRequest {
            messages: prompts::outline(&request.refined_goal, &request.duration),
            temperature: request.temperature,
            max_tokens: generation.outline_max_tokens,
            response_format: ResponseFormat::Text,
        },
    )
    .await?;

    let detailed = run_stage(
        invoker,
        "detailed",
        ChatRequest {
            messages: prompts::detailed(&request.refined_goal, &request.duration, &outline),
            temperature: request.temperature,
            max_tokens: generation.detailed_max_tokens,
            response_format: ResponseFormat::Text,
        },
    )
    .await?;

    let structured = run_stage(
        invoker,
        "conversion",
        ChatRequest {
            messages: prompts::conversion(&detailed, &request.duration),
            temperature: conversion_temperature(
                request.temperature,
                generation.conversion_temperature,
            ),
            max_tokens: generation.conversion_max_tokens,
            response_format: ResponseFormat::Text,
        },
    )
    .await?;

    let roadmap = parse_roadmap(&structured).map_err(|e| {
        error!(error = %e, "conversion output failed validation");
        RoadmapError::from(e)
    })?;

    if !EXPECTED_MILESTONES.contains(&roadmap.len()) {
        warn!(count = roadmap.len(), "roadmap milestone count outside 5-7");
    }

    Ok(PipelineResult::new(roadmap, &request.duration))
}
