//! Error types for Blueprint Forge.

use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Downstream service error: {0}")]
    Downstream(#[from] DownstreamError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Input validation errors, rejected before any job is created.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Field {field} is invalid: {message}")]
    InvalidField { field: &'static str, message: String },
}

/// Model provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LlmError {
    /// Whether a retry could plausibly succeed (network blips, provider
    /// throttling, 5xx-style failures). Auth and malformed-response errors
    /// are permanent.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RequestFailed { .. } | Self::RateLimited { .. })
    }
}

/// Agent chain failures. Every variant names the agent so a FAILED job can
/// always be attributed to a stage.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("Agent {agent}: model call failed: {reason}")]
    ModelCall { agent: String, reason: String },

    #[error("Agent {agent}: rate limited, capacity frees at {retry_at}")]
    RateLimited {
        agent: String,
        retry_at: DateTime<Utc>,
    },

    #[error("Agent {agent}: model returned an empty response")]
    EmptyResponse { agent: String },

    #[error("Agent {agent}: malformed output: {reason}")]
    MalformedOutput { agent: String, reason: String },

    #[error("Agent {agent}: timed out after {timeout:?}")]
    Timeout { agent: String, timeout: Duration },

    #[error("Stage {stage}: downstream service failed: {source}")]
    Downstream {
        stage: String,
        #[source]
        source: DownstreamError,
    },
}

impl ChainError {
    /// Name of the agent or stage this failure is attributed to.
    pub fn agent(&self) -> &str {
        match self {
            Self::ModelCall { agent, .. }
            | Self::RateLimited { agent, .. }
            | Self::EmptyResponse { agent }
            | Self::MalformedOutput { agent, .. }
            | Self::Timeout { agent, .. } => agent,
            Self::Downstream { stage, .. } => stage,
        }
    }
}

/// Job-related errors.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Subject {subject_id} already has active job {job_id}")]
    SubjectBusy { subject_id: String, job_id: Uuid },

    #[error("Processor is shut down, cannot enqueue")]
    ShutDown,
}

/// Delegated HTTP agent service errors.
#[derive(Debug, thiserror::Error)]
pub enum DownstreamError {
    #[error("Service {service} returned {status}: {body}")]
    Status {
        service: String,
        status: u16,
        body: String,
    },

    #[error("Service {service} unreachable: {reason}")]
    Transport { service: String, reason: String },

    #[error("Service {service} returned a non-JSON body: {reason}")]
    InvalidBody { service: String, reason: String },
}

/// Record-store boundary errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Blueprint {subject_id} not found")]
    NotFound { subject_id: String },

    #[error("Store operation failed: {0}")]
    Backend(String),
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
