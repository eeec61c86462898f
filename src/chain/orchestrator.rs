//! Chain orchestrator — runs the agent sequence and accumulates context.
//!
//! Flow per agent:
//! 1. Admission check against the rate limiter
//! 2. Model call (bounded by the per-agent timeout, retried on transient errors)
//! 3. Defensive JSON extraction + required-field validation
//! 4. Shallow merge into the accumulated context
//!
//! The first failure aborts the chain; later agents are never invoked. The
//! partial context accumulated so far travels with the failure so callers
//! can keep it for diagnostics.

use std::sync::Arc;
use std::time::Instant;

use rust_decimal::Decimal;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::chain::agent::{ChainAgent, full_prompt};
use crate::chain::context::AgentContext;
use crate::chain::extract::parse_object;
use crate::config::ChainConfig;
use crate::error::ChainError;
use crate::llm::retry::{RetryPolicy, with_retry};
use crate::llm::{CompletionRequest, LlmProvider, prompt_messages};
use crate::ratelimit::SlidingWindowLimiter;

/// Advisory progress event emitted as the chain advances.
#[derive(Debug, Clone)]
pub struct ChainProgress {
    pub percent: u8,
    pub step: String,
}

/// Per-agent execution record, kept for the run metadata.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AgentExecution {
    pub agent: String,
    pub elapsed_ms: u64,
    pub output_keys: Vec<String>,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Successful chain run: final context plus execution metadata.
#[derive(Debug)]
pub struct ChainReport {
    pub context: AgentContext,
    pub executions: Vec<AgentExecution>,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub estimated_cost: Decimal,
}

/// Failed chain run: the error plus whatever context had accumulated.
#[derive(Debug)]
pub struct ChainFailure {
    pub error: ChainError,
    pub partial: AgentContext,
}

/// Orchestrates a fixed, ordered sequence of model-backed agents.
pub struct ChainOrchestrator {
    llm: Arc<dyn LlmProvider>,
    limiter: Arc<SlidingWindowLimiter>,
    config: ChainConfig,
    retry: RetryPolicy,
}

impl ChainOrchestrator {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        limiter: Arc<SlidingWindowLimiter>,
        config: ChainConfig,
    ) -> Self {
        Self {
            llm,
            limiter,
            config,
            retry: RetryPolicy::default(),
        }
    }

    /// Run every agent in order against the accumulating context.
    ///
    /// Progress events map the chain onto the 10–90% band; the caller owns
    /// the bands on either side.
    pub async fn run(
        &self,
        agents: &[Arc<dyn ChainAgent>],
        input: Map<String, Value>,
        progress: Option<&mpsc::UnboundedSender<ChainProgress>>,
    ) -> Result<ChainReport, ChainFailure> {
        let mut context = AgentContext::from_input(input);
        let mut executions = Vec::with_capacity(agents.len());
        let mut total_input_tokens = 0u64;
        let mut total_output_tokens = 0u64;
        let mut estimated_cost = Decimal::ZERO;
        let total = agents.len();

        for (index, agent) in agents.iter().enumerate() {
            let percent = (10 + index * 80 / total.max(1)) as u8;
            emit(
                progress,
                percent,
                format!("Agent {}/{}: {}", index + 1, total, agent.name()),
            );

            let started = Instant::now();
            let output = match self.run_agent(agent.as_ref(), &context).await {
                Ok(output) => output,
                Err(error) => {
                    warn!(agent = agent.name(), error = %error, "Chain stage failed");
                    return Err(ChainFailure {
                        error,
                        partial: context,
                    });
                }
            };
            let elapsed = started.elapsed();

            executions.push(AgentExecution {
                agent: agent.name().to_string(),
                elapsed_ms: elapsed.as_millis() as u64,
                output_keys: output.parsed.keys().cloned().collect(),
                input_tokens: output.input_tokens,
                output_tokens: output.output_tokens,
            });
            total_input_tokens += output.input_tokens;
            total_output_tokens += output.output_tokens;
            estimated_cost += output.cost;

            // Keep the full object under the agent's key for report assembly,
            // then merge its fields at top level; later agents are
            // authoritative for their declared fields.
            let mut keyed = Map::new();
            keyed.insert(
                agent.context_key().to_string(),
                Value::Object(output.parsed.clone()),
            );
            context.merge(keyed);
            context.merge(output.parsed);

            info!(
                agent = agent.name(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Chain stage completed"
            );
        }

        emit(progress, 90, "Agent chain completed".to_string());

        Ok(ChainReport {
            context,
            executions,
            total_input_tokens,
            total_output_tokens,
            estimated_cost,
        })
    }

    async fn run_agent(
        &self,
        agent: &dyn ChainAgent,
        context: &AgentContext,
    ) -> Result<AgentOutput, ChainError> {
        let name = agent.name();

        if !self.limiter.is_allowed(&self.config.limiter_id).await {
            return Err(ChainError::RateLimited {
                agent: name.to_string(),
                retry_at: self.limiter.reset_at(&self.config.limiter_id).await,
            });
        }

        let request = CompletionRequest::new(prompt_messages(
            agent.role().to_string(),
            full_prompt(agent, context),
        ))
        .with_temperature(agent.temperature())
        .with_max_tokens(agent.max_tokens());

        debug!(agent = name, "Calling model");
        let response = tokio::time::timeout(
            self.config.agent_timeout,
            with_retry(&self.retry, name, || self.llm.complete(request.clone())),
        )
        .await
        .map_err(|_| ChainError::Timeout {
            agent: name.to_string(),
            timeout: self.config.agent_timeout,
        })?
        .map_err(|e| ChainError::ModelCall {
            agent: name.to_string(),
            reason: e.to_string(),
        })?;

        if response.content.trim().is_empty() {
            return Err(ChainError::EmptyResponse {
                agent: name.to_string(),
            });
        }

        let parsed = parse_object(&response.content).map_err(|reason| {
            debug!(agent = name, raw = %response.content, "Unparseable model output");
            ChainError::MalformedOutput {
                agent: name.to_string(),
                reason,
            }
        })?;

        agent
            .validate_output(&parsed)
            .map_err(|reason| ChainError::MalformedOutput {
                agent: name.to_string(),
                reason,
            })?;

        let cost = response.estimated_cost(self.llm.cost_per_token());
        Ok(AgentOutput {
            parsed,
            input_tokens: response.input_tokens,
            output_tokens: response.output_tokens,
            cost,
        })
    }
}

struct AgentOutput {
    parsed: Map<String, Value>,
    input_tokens: u64,
    output_tokens: u64,
    cost: Decimal,
}

fn emit(progress: Option<&mpsc::UnboundedSender<ChainProgress>>, percent: u8, step: String) {
    if let Some(tx) = progress {
        let _ = tx.send(ChainProgress { percent, step });
    }
}
