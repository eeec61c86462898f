//! Client for delegated agent services.
//!
//! Some pipeline stages hand off to independent network services (report
//! writer, reviewer) reachable over HTTP with JSON bodies. A non-2xx
//! response is a hard failure for that stage, carrying the upstream status
//! code and body.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::DownstreamError;

/// Maximum body length carried into an error message. Full bodies go to the
/// log only.
const ERROR_BODY_LIMIT: usize = 300;

/// JSON-over-HTTP client for one downstream agent service.
pub struct AgentServiceClient {
    name: String,
    base_url: String,
    http: reqwest::Client,
}

impl AgentServiceClient {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// POST a JSON request to `path`, returning the parsed JSON response.
    pub async fn invoke(&self, path: &str, request: &Value) -> Result<Value, DownstreamError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        debug!(service = %self.name, %url, "Invoking downstream agent service");

        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| DownstreamError::Transport {
                service: self.name.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            warn!(
                service = %self.name,
                status = status.as_u16(),
                body = %body,
                "Downstream agent service returned an error"
            );
            let mut truncated: String = body.chars().take(ERROR_BODY_LIMIT).collect();
            if body.chars().count() > ERROR_BODY_LIMIT {
                truncated.push('…');
            }
            return Err(DownstreamError::Status {
                service: self.name.clone(),
                status: status.as_u16(),
                body: truncated,
            });
        }

        serde_json::from_str(&body).map_err(|e| DownstreamError::InvalidBody {
            service: self.name.clone(),
            reason: e.to_string(),
        })
    }

    /// Probe the service's health endpoint.
    pub async fn health(&self) -> Result<Value, DownstreamError> {
        let url = format!("{}/health", self.base_url);
        let response =
            self.http
                .get(&url)
                .send()
                .await
                .map_err(|e| DownstreamError::Transport {
                    service: self.name.clone(),
                    reason: e.to_string(),
                })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(DownstreamError::Status {
                service: self.name.clone(),
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(|e| DownstreamError::InvalidBody {
            service: self.name.clone(),
            reason: e.to_string(),
        })
    }
}
