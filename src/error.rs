//! Domain-specific error types for goal-roadmap

use thiserror::Error;

use crate::invoker::InvokerError;
use crate::sanitize::SchemaError;

/// Main error type for the goal refinement and roadmap pipeline
#[derive(Error, Debug)]
pub enum RoadmapError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Upstream failure during {stage}: {message}")]
    Upstream { stage: String, message: String },

    #[error("Generation failed: {message}")]
    Generation { message: String },

    #[error("Timeout error: {operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl RoadmapError {
    /// Stable machine-readable label used in response envelopes
    pub fn code(&self) -> &'static str {
        match self {
            RoadmapError::Config { .. } => "configuration_error",
            RoadmapError::Validation { .. } => "invalid_request",
            RoadmapError::Upstream { .. } => "upstream_failure",
            RoadmapError::Generation { .. } => "generation_failed",
            RoadmapError::Timeout { .. } => "timeout",
            RoadmapError::Serialization { .. } => "serialization_error",
            RoadmapError::Internal { .. } => "internal_error",
        }
    }

    /// Wrap an invoker failure with the stage it happened in
    pub fn upstream(stage: &str, err: InvokerError) -> Self {
        RoadmapError::Upstream {
            stage: stage.to_string(),
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for RoadmapError {
    fn from(err: anyhow::Error) -> Self {
        RoadmapError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for RoadmapError {
    fn from(err: serde_json::Error) -> Self {
        RoadmapError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for RoadmapError {
    fn from(err: reqwest::Error) -> Self {
        RoadmapError::Internal {
            message: format!("HTTP client failure: {}", err),
        }
    }
}

impl From<SchemaError> for RoadmapError {
    fn from(err: SchemaError) -> Self {
        RoadmapError::Generation {
            message: err.to_string(),
        }
    }
}

impl From<InvokerError> for RoadmapError {
    fn from(err: InvokerError) -> Self {
        RoadmapError::upstream("invocation", err)
    }
}

/// Result type alias for roadmap operations
pub type Result<T> = std::result::Result<T, RoadmapError>;
