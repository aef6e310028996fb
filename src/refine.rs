//! Goal classification stage (flow A)
//!
//! One backend call judges whether the goal is specific enough. The answer is decoded
//! leniently: anything that does not decode into one of the two shapes is treated as the
//! refined goal itself, so this stage only fails when every backend is exhausted.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::clients::traits::{ChatRequest, ResponseFormat};
use crate::config::GenerationConfig;
use crate::error::{RoadmapError, Result};
use crate::invoker::ResilientInvoker;
use crate::sanitize::{clean_model_text, unescape};
use crate::{prompts, vagueness};

const EXPECTED_SUGGESTIONS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalRequest {
    pub goal: String,
    pub duration: String,
    pub temperature: f32,
}

/// Exactly one of the two outcomes is produced per classification
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", content = "data", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum RefinementOutcome {
    Clarify {
        message: String,
        suggestions: Vec<String>,
        original_goal: String,
        duration: String,
    },
    Review {
        refined_goal: String,
        original_goal: String,
        duration: String,
    },
}

impl RefinementOutcome {
    pub fn action(&self) -> &'static str {
        match self {
            RefinementOutcome::Clarify { .. } => "clarify",
            RefinementOutcome::Review { .. } => "review",
        }
    }
}

/// What the model said, before the request context is attached
#[derive(Debug, Clone, PartialEq)]
enum Classification {
    Clarify {
        message: String,
        suggestions: Vec<String>,
    },
    Refined {
        refined_goal: String,
    },
}

fn string_at<'a>(obj: &'a serde_json::Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Structural decode keyed on a discriminator field; `None` means "not one of ours"
fn decode_classification(text: &str) -> Option<Classification> {
    let value: Value = serde_json::from_str(text).ok()?;
    let obj = value.as_object()?;
    let tag = string_at(obj, &["type", "action", "status"])?.to_lowercase();

    match tag.as_str() {
        "clarify" | "clarification" | "vague" => {
            let message = string_at(obj, &["message", "reason"])?.to_string();
            let suggestions = obj
                .get("suggestions")
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default();
            Some(Classification::Clarify {
                message,
                suggestions,
            })
        }
        "refined" | "review" | "specific" => {
            let refined_goal =
                string_at(obj, &["refinedGoal", "refined_goal", "goal"])?.to_string();
            Some(Classification::Refined { refined_goal })
        }
        _ => None,
    }
}

/// Decode model output into an outcome, degrading to raw text as the refined goal
pub fn interpret(raw: &str, goal: &str, duration: &str) -> RefinementOutcome {
    let cleaned = clean_model_text(raw);
    // Escaped payloads without enclosing quotes only decode after a second unescape pass
    let decoded = decode_classification(&cleaned)
        .or_else(|| decode_classification(&unescape(&cleaned)));
    match decoded {
        Some(Classification::Clarify {
            message,
            suggestions,
        }) => {
            if suggestions.len() != EXPECTED_SUGGESTIONS {
                warn!(
                    count = suggestions.len(),
                    "clarification returned an unexpected number of suggestions"
                );
            }
            RefinementOutcome::Clarify {
                message,
                suggestions,
                original_goal: goal.to_string(),
                duration: duration.to_string(),
            }
        }
        Some(Classification::Refined { refined_goal }) => RefinementOutcome::Review {
            refined_goal,
            original_goal: goal.to_string(),
            duration: duration.to_string(),
        },
        None if cleaned.is_empty() => {
            warn!("classification output was empty, echoing the original goal for review");
            RefinementOutcome::Review {
                refined_goal: goal.trim().to_string(),
                original_goal: goal.to_string(),
                duration: duration.to_string(),
            }
        }
        None => {
            warn!("classification output did not decode, using raw text as refined goal");
            RefinementOutcome::Review {
                refined_goal: cleaned,
                original_goal: goal.to_string(),
                duration: duration.to_string(),
            }
        }
    }
}

/// Answer locally when the pre-filter is on and the goal is obviously vague
fn prefilter(request: &GoalRequest) -> Option<RefinementOutcome> {
    let verdict = vagueness::assess(&request.goal);
    if !verdict.vague {
        return None;
    }
    let reason = verdict
        .reason
        .unwrap_or_else(|| "the goal is too broad".to_string());
    Some(RefinementOutcome::Clarify {
        message: format!(
            "Your goal needs more detail before a roadmap can be built: {}. \
             Pick one of the suggestions or describe the role or outcome you are aiming for.",
            reason
        ),
        suggestions: vagueness::local_suggestions(&verdict.topic),
        original_goal: request.goal.clone(),
        duration: request.duration.clone(),
    })
}

pub async fn classify_goal(
    invoker: &ResilientInvoker,
    generation: &GenerationConfig,
    request: &GoalRequest,
) -> Result<RefinementOutcome> {
    if generation.vagueness_prefilter
        && let Some(outcome) = prefilter(request)
    {
        info!("goal answered by vagueness pre-filter");
        return Ok(outcome);
    }

    let chat = ChatRequest {
        messages: prompts::classification(&request.goal, &request.duration),
        temperature: request.temperature,
        max_tokens: generation.classification_max_tokens,
        response_format: ResponseFormat::JsonObject,
    };

    let invocation = invoker
        .invoke(&chat)
        .await
        .map_err(|e| RoadmapError::upstream("classification", e))?;
    debug!(model = %invocation.model, attempts = invocation.attempts, "classification answered");

    let outcome = interpret(&invocation.content, &request.goal, &request.duration);
    info!(action = outcome.action(), "goal classified");
    Ok(outcome)
}
