//! Integration tests for the generation pipeline and its HTTP surface.
//!
//! Each test wires the real components (processor, orchestrator, cache,
//! limiter, store) around a stub LLM, spins up an Axum server on a random
//! port, and exercises the REST contract with a real HTTP client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tokio::time::timeout;

use blueprint_forge::api::{AppState, routes};
use blueprint_forge::blueprint::default_chain;
use blueprint_forge::cache::CacheService;
use blueprint_forge::chain::ChainOrchestrator;
use blueprint_forge::config::{CacheConfig, ChainConfig, JobConfig, RateLimitConfig};
use blueprint_forge::error::LlmError;
use blueprint_forge::jobs::{JobProcessor, ProcessorDeps};
use blueprint_forge::llm::{
    CompletionRequest, CompletionResponse, FinishReason, LlmProvider,
};
use blueprint_forge::ratelimit::SlidingWindowLimiter;
use blueprint_forge::store::InMemoryStore;

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Stub LLM provider: every agent gets a superset of the fields the default
/// chain requires (no real API calls).
struct StubLlm;

#[async_trait]
impl LlmProvider for StubLlm {
    fn model_name(&self) -> &str {
        "stub"
    }
    fn cost_per_token(&self) -> (Decimal, Decimal) {
        (Decimal::ZERO, Decimal::ZERO)
    }
    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        Ok(CompletionResponse {
            content: json!({
                "funding_stage": "Seed",
                "confidence": "high",
                "rationale": "early traction with paying customers",
                "recommended_amount": "$1.2M",
                "primary_investor_type": "Seed VCs",
                "estimated_runway_months": "18-24",
                "monthly_burn_rate": "$60K",
                "priorities": [{"priority": "Close the round", "importance": "critical"}]
            })
            .to_string(),
            input_tokens: 120,
            output_tokens: 80,
            finish_reason: FinishReason::Stop,
        })
    }
}

struct TestServer {
    base: String,
    http: reqwest::Client,
}

impl TestServer {
    async fn start(user_rate_limit: u32) -> Self {
        let cache = CacheService::new(CacheConfig::default());
        let model_limiter = SlidingWindowLimiter::new(RateLimitConfig {
            max_requests: 1000,
            window: Duration::from_secs(60),
        });
        let user_limiter = SlidingWindowLimiter::new(RateLimitConfig {
            max_requests: user_rate_limit,
            window: Duration::from_secs(60),
        });
        let store = InMemoryStore::new();

        let orchestrator = ChainOrchestrator::new(
            Arc::new(StubLlm),
            model_limiter,
            ChainConfig {
                agent_timeout: Duration::from_secs(5),
                limiter_id: "model".into(),
            },
        );
        let processor = JobProcessor::new(
            ProcessorDeps {
                orchestrator,
                agents: default_chain(),
                cache: Arc::clone(&cache),
                store: store.clone(),
                writer: None,
            },
            JobConfig::default(),
        );
        processor.start().await;

        let app = routes(AppState {
            processor,
            cache,
            limiter: user_limiter,
            store,
            warm_entities: Arc::new(vec!["seed-saas".to_string(), "seed-fintech".to_string()]),
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting connections.
        tokio::time::sleep(Duration::from_millis(50)).await;

        Self {
            base: format!("http://127.0.0.1:{port}"),
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    async fn submit(&self, user_id: &str) -> reqwest::Response {
        self.http
            .post(self.url("/api/blueprints"))
            .json(&json!({
                "userId": user_id,
                "profile": valid_profile(),
            }))
            .send()
            .await
            .unwrap()
    }

    /// Poll a job until it reaches a terminal state.
    async fn wait_terminal(&self, job_id: &str) -> Value {
        loop {
            let job: Value = self
                .http
                .get(self.url(&format!("/api/jobs/{job_id}")))
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            let status = job["status"].as_str().unwrap().to_string();
            if status == "completed" || status == "failed" {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(15)).await;
        }
    }
}

fn valid_profile() -> Value {
    json!({
        "startupName": "Acme Analytics",
        "industry": "SaaS",
        "targetMarket": "B2B",
        "geography": "United States",
        "teamSize": 4,
        "productStage": "MVP",
        "monthlyRevenue": 12000,
        "tractionSummary": "40 paying teams, 12% MoM growth",
        "businessModel": "Subscription",
        "mainFinancialConcern": "How much should we raise and from whom?"
    })
}

// ── Generation flow ──────────────────────────────────────────────────

#[tokio::test]
async fn submit_then_poll_to_completion() {
    timeout(TEST_TIMEOUT, async {
        let server = TestServer::start(100).await;

        let response = server.submit("alice").await;
        assert_eq!(response.status(), 202);
        let body: Value = response.json().await.unwrap();
        let job_id = body["jobId"].as_str().unwrap().to_string();
        let blueprint_id = body["blueprintId"].as_str().unwrap().to_string();

        let job = server.wait_terminal(&job_id).await;
        assert_eq!(job["status"], "completed");
        assert_eq!(job["progress"], 100);
        assert_eq!(job["subject_id"], blueprint_id);
        assert!(job["error"].is_null());

        let result = &job["result"];
        assert_eq!(result["funding_stage"]["funding_stage"], "Seed");
        assert_eq!(result["raise_amount"]["recommended_amount"], "$1.2M");
        assert!(result["summary"].as_str().unwrap().contains("Acme Analytics"));
        assert_eq!(result["metadata"]["agents_executed"], 5);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn job_lookup_by_blueprint_id() {
    timeout(TEST_TIMEOUT, async {
        let server = TestServer::start(100).await;

        let body: Value = server.submit("bob").await.json().await.unwrap();
        let blueprint_id = body["blueprintId"].as_str().unwrap().to_string();
        let job_id = body["jobId"].as_str().unwrap().to_string();
        server.wait_terminal(&job_id).await;

        let job: Value = server
            .http
            .get(server.url(&format!("/api/blueprints/{blueprint_id}/job")))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(job["id"], job_id.as_str());
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn repeat_request_served_from_cache() {
    timeout(TEST_TIMEOUT, async {
        let server = TestServer::start(100).await;

        let body: Value = server.submit("carol").await.json().await.unwrap();
        let blueprint_id = body["blueprintId"].as_str().unwrap().to_string();
        server
            .wait_terminal(body["jobId"].as_str().unwrap())
            .await;

        // Asking for the same blueprint again returns the cached strategy
        // without a new job.
        let response: Value = server
            .http
            .post(server.url("/api/blueprints"))
            .json(&json!({
                "userId": "carol",
                "blueprintId": blueprint_id,
                "profile": valid_profile(),
            }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(response["cached"], true);
        assert_eq!(
            response["strategy"]["funding_stage"]["funding_stage"],
            "Seed"
        );
    })
    .await
    .unwrap();
}

// ── Synchronous error surface ────────────────────────────────────────

#[tokio::test]
async fn malformed_profile_rejected_before_any_job() {
    timeout(TEST_TIMEOUT, async {
        let server = TestServer::start(100).await;

        let mut profile = valid_profile();
        profile["targetMarket"] = json!("B2G");
        let response = server
            .http
            .post(server.url("/api/blueprints"))
            .json(&json!({"userId": "dave", "profile": profile}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 422);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], "validation");
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn missing_concern_rejected() {
    timeout(TEST_TIMEOUT, async {
        let server = TestServer::start(100).await;

        let mut profile = valid_profile();
        profile["mainFinancialConcern"] = json!("   ");
        let response = server
            .http
            .post(server.url("/api/blueprints"))
            .json(&json!({"userId": "dave", "profile": profile}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 422);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn rate_limited_user_gets_429_with_reset() {
    timeout(TEST_TIMEOUT, async {
        let server = TestServer::start(2).await;

        assert_eq!(server.submit("eve").await.status(), 202);
        // Each submit creates a fresh subject, so only the limiter rejects.
        assert_eq!(server.submit("eve").await.status(), 202);

        let third = server.submit("eve").await;
        assert_eq!(third.status(), 429);
        let body: Value = third.json().await.unwrap();
        assert_eq!(body["error"], "rate_limited");
        assert!(body["retryAt"].as_str().is_some());

        // A different user is unaffected.
        assert_eq!(server.submit("frank").await.status(), 202);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn unknown_job_is_distinct_not_found() {
    timeout(TEST_TIMEOUT, async {
        let server = TestServer::start(100).await;

        let response = server
            .http
            .get(server.url(&format!("/api/jobs/{}", uuid::Uuid::new_v4())))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 404);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], "not_found");

        // Malformed id is a validation error, not a not-found.
        let response = server
            .http
            .get(server.url("/api/jobs/not-a-uuid"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
    })
    .await
    .unwrap();
}

// ── Cache administration ─────────────────────────────────────────────

#[tokio::test]
async fn cache_stats_and_clear_by_namespace() {
    timeout(TEST_TIMEOUT, async {
        let server = TestServer::start(100).await;

        let body: Value = server.submit("grace").await.json().await.unwrap();
        server.wait_terminal(body["jobId"].as_str().unwrap()).await;

        // The completed run cached its result and bumped the user counter.
        let stats: Value = server
            .http
            .get(server.url("/api/admin/cache"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let namespaces = stats["namespaces"].as_array().unwrap();
        let blueprint = namespaces
            .iter()
            .find(|ns| ns["namespace"] == "blueprint")
            .unwrap();
        assert_eq!(blueprint["entries"], 1);
        let rate_limit = namespaces
            .iter()
            .find(|ns| ns["namespace"] == "rate_limit")
            .unwrap();
        assert_eq!(rate_limit["entries"], 1);

        // Clear the blueprint namespace; counters survive.
        let cleared: Value = server
            .http
            .delete(server.url("/api/admin/cache/ns/blueprint"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(cleared["cleared"], 1);

        let stats: Value = server
            .http
            .get(server.url("/api/admin/cache"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let namespaces = stats["namespaces"].as_array().unwrap();
        let blueprint = namespaces
            .iter()
            .find(|ns| ns["namespace"] == "blueprint")
            .unwrap();
        assert_eq!(blueprint["entries"], 0);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn clear_empty_namespace_reports_zero() {
    timeout(TEST_TIMEOUT, async {
        let server = TestServer::start(100).await;

        let cleared: Value = server
            .http
            .delete(server.url("/api/admin/cache/ns/draft"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(cleared["cleared"], 0);

        let response = server
            .http
            .delete(server.url("/api/admin/cache/ns/bogus"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn warm_up_reports_cached_entities() {
    timeout(TEST_TIMEOUT, async {
        let server = TestServer::start(100).await;

        // Nothing cached yet: both configured entities report cold.
        let report: Value = server
            .http
            .post(server.url("/api/admin/cache/warm"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(report["checked"], 2);
        assert_eq!(report["cached"], 0);

        // Generate one of them, then re-check.
        let body: Value = server
            .http
            .post(server.url("/api/blueprints"))
            .json(&json!({
                "userId": "heidi",
                "blueprintId": "seed-saas",
                "profile": valid_profile(),
            }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        server.wait_terminal(body["jobId"].as_str().unwrap()).await;

        let report: Value = server
            .http
            .post(server.url("/api/admin/cache/warm"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(report["cached"], 1);
        let entries = report["report"].as_array().unwrap();
        let seeded = entries.iter().find(|e| e["entity"] == "seed-saas").unwrap();
        assert_eq!(seeded["cached"], true);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn health_reports_ok() {
    timeout(TEST_TIMEOUT, async {
        let server = TestServer::start(100).await;
        let health: Value = server
            .http
            .get(server.url("/api/health"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], "ok");
    })
    .await
    .unwrap();
}
