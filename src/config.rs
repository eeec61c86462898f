//! Configuration types.

use std::time::Duration;

/// Job processor configuration.
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Wall-clock budget for a whole job (all agents plus persistence).
    pub job_budget: Duration,
    /// Terminal jobs older than this are dropped by the retention sweep.
    pub retention_horizon: Duration,
    /// How often the retention sweep runs.
    pub sweep_interval: Duration,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            job_budget: Duration::from_secs(300), // 5 minutes
            retention_horizon: Duration::from_secs(24 * 3600),
            sweep_interval: Duration::from_secs(300),
        }
    }
}

/// Chain orchestrator configuration.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// Per-agent model-call timeout.
    pub agent_timeout: Duration,
    /// Rate-limit identifier used for model-call admission.
    pub limiter_id: String,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            agent_timeout: Duration::from_secs(45),
            limiter_id: "model".to_string(),
        }
    }
}

/// Sliding-window rate limiter configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests admitted per identifier within the window.
    pub max_requests: u32,
    /// Window length.
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window: Duration::from_secs(60),
        }
    }
}

/// Cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL for generated blueprint results.
    pub result_ttl: Duration,
    /// TTL for partial-context diagnostics written on chain failure.
    pub diagnostic_ttl: Duration,
    /// TTL applied when `increment` creates a counter.
    pub counter_ttl: Duration,
    /// How often the expiry sweep runs.
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            result_ttl: Duration::from_secs(3600),
            diagnostic_ttl: Duration::from_secs(900),
            counter_ttl: Duration::from_secs(7 * 24 * 3600),
            sweep_interval: Duration::from_secs(60),
        }
    }
}
