//! HTTP surface: generation submission, job status polling, cache
//! administration, health.
//!
//! Validation and not-found are reported synchronously here; everything that
//! happens after enqueue is reported through the job's status record.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tracing::info;
use uuid::Uuid;

use crate::blueprint::GenerationInput;
use crate::cache::{CacheService, Namespace};
use crate::error::JobError;
use crate::jobs::JobProcessor;
use crate::ratelimit::SlidingWindowLimiter;
use crate::store::BlueprintStore;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<JobProcessor>,
    pub cache: Arc<CacheService>,
    pub limiter: Arc<SlidingWindowLimiter>,
    pub store: Arc<dyn BlueprintStore>,
    /// Known entities pre-checked by the warm-up operation.
    pub warm_entities: Arc<Vec<String>>,
}

/// Build the API router.
pub fn routes(state: AppState) -> Router {
    let origins: [axum::http::HeaderValue; 2] = [
        "http://localhost:3000".parse().expect("static origin"),
        "http://127.0.0.1:3000".parse().expect("static origin"),
    ];
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);

    Router::new()
        .route("/api/blueprints", post(create_blueprint))
        .route("/api/jobs/{id}", get(get_job))
        .route("/api/blueprints/{id}/job", get(get_job_by_subject))
        .route("/api/admin/cache", get(cache_stats).delete(cache_clear_all))
        .route("/api/admin/cache/key/{key}", delete(cache_delete_key))
        .route("/api/admin/cache/ns/{ns}", delete(cache_clear_namespace))
        .route("/api/admin/cache/warm", post(cache_warm))
        .route("/api/health", get(health))
        .layer(cors)
        .with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    user_id: String,
    /// Regenerate an existing blueprint instead of creating a new record.
    #[serde(default)]
    blueprint_id: Option<String>,
    profile: Value,
}

fn json_error(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({"error": code, "message": message.into()})),
    )
        .into_response()
}

/// `POST /api/blueprints`: validate, rate-limit, enqueue. Returns 202 with
/// the job id; the caller polls the job endpoints for progress.
async fn create_blueprint(State(state): State<AppState>, Json(body): Json<Value>) -> Response {
    let request: GenerateRequest = match serde_json::from_value(body) {
        Ok(request) => request,
        Err(e) => return json_error(StatusCode::UNPROCESSABLE_ENTITY, "validation", e.to_string()),
    };
    if request.user_id.trim().is_empty() {
        return json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "validation",
            "userId must not be empty",
        );
    }

    let input: GenerationInput = match serde_json::from_value(request.profile) {
        Ok(input) => input,
        Err(e) => return json_error(StatusCode::UNPROCESSABLE_ENTITY, "validation", e.to_string()),
    };
    if let Err(e) = input.validate() {
        return json_error(StatusCode::UNPROCESSABLE_ENTITY, "validation", e.to_string());
    }

    let limiter_id = format!("user:{}", request.user_id);
    if !state.limiter.is_allowed(&limiter_id).await {
        let retry_at = state.limiter.reset_at(&limiter_id).await;
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": "rate_limited",
                "message": "Request budget exceeded, back off and retry later",
                "retryAt": retry_at.to_rfc3339(),
            })),
        )
            .into_response();
    }
    // Per-user diagnostic counter; visible through the cache admin surface.
    state
        .cache
        .increment(&Namespace::RateLimit.key(&request.user_id), 1)
        .await;

    // Serve an existing blueprint straight from the cache when possible.
    if let Some(blueprint_id) = &request.blueprint_id
        && let Some(strategy) = state.cache.get(&Namespace::Blueprint.key(blueprint_id)).await
    {
        return Json(json!({
            "blueprintId": blueprint_id,
            "cached": true,
            "strategy": strategy,
        }))
        .into_response();
    }

    let subject_id = request
        .blueprint_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    if let Err(e) = state.store.create_record(&subject_id, input).await {
        return json_error(StatusCode::INTERNAL_SERVER_ERROR, "store", e.to_string());
    }

    match state.processor.create_job(&subject_id).await {
        Ok(job_id) => {
            info!(%job_id, subject_id, user_id = %request.user_id, "Generation accepted");
            (
                StatusCode::ACCEPTED,
                Json(json!({"blueprintId": subject_id, "jobId": job_id})),
            )
                .into_response()
        }
        Err(e @ JobError::SubjectBusy { .. }) => {
            json_error(StatusCode::CONFLICT, "conflict", e.to_string())
        }
        Err(e) => json_error(StatusCode::SERVICE_UNAVAILABLE, "unavailable", e.to_string()),
    }
}

/// `GET /api/jobs/{id}`
async fn get_job(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Ok(job_id) = id.parse::<Uuid>() else {
        return json_error(StatusCode::BAD_REQUEST, "validation", "malformed job id");
    };
    match state.processor.get_job(job_id).await {
        Some(job) => Json(job).into_response(),
        None => json_error(StatusCode::NOT_FOUND, "not_found", format!("job {id} not found")),
    }
}

/// `GET /api/blueprints/{id}/job`: latest job for a subject.
async fn get_job_by_subject(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.processor.get_job_by_subject(&id).await {
        Some(job) => Json(job).into_response(),
        None => json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("no job for blueprint {id}"),
        ),
    }
}

/// `GET /api/admin/cache`: per-namespace entry counts and key samples.
async fn cache_stats(State(state): State<AppState>) -> Response {
    let stats = state.cache.stats().await;
    let total: usize = stats.iter().map(|s| s.entries).sum();
    Json(json!({"totalEntries": total, "namespaces": stats})).into_response()
}

/// `DELETE /api/admin/cache`
async fn cache_clear_all(State(state): State<AppState>) -> Response {
    let cleared = state.cache.clear_all().await;
    Json(json!({"cleared": cleared})).into_response()
}

/// `DELETE /api/admin/cache/key/{key}`
async fn cache_delete_key(State(state): State<AppState>, Path(key): Path<String>) -> Response {
    let deleted = state.cache.delete(&key).await;
    Json(json!({"deleted": deleted})).into_response()
}

/// `DELETE /api/admin/cache/ns/{ns}`
async fn cache_clear_namespace(State(state): State<AppState>, Path(ns): Path<String>) -> Response {
    let Some(namespace) = Namespace::parse(&ns) else {
        return json_error(
            StatusCode::BAD_REQUEST,
            "validation",
            format!("unknown namespace: {ns}"),
        );
    };
    let cleared = state.cache.clear_namespace(namespace).await;
    Json(json!({"cleared": cleared})).into_response()
}

#[derive(Debug, Deserialize)]
struct WarmRequest {
    #[serde(default)]
    entities: Option<Vec<String>>,
}

/// `POST /api/admin/cache/warm`: pre-check known entities against the
/// blueprint namespace.
async fn cache_warm(State(state): State<AppState>, body: Option<Json<WarmRequest>>) -> Response {
    let entities = body
        .and_then(|Json(request)| request.entities)
        .unwrap_or_else(|| state.warm_entities.as_ref().clone());
    let report = state.cache.warm_up(&entities).await;
    let cached = report.iter().filter(|entry| entry.cached).count();
    Json(json!({"checked": report.len(), "cached": cached, "report": report})).into_response()
}

/// `GET /api/health`
async fn health(State(state): State<AppState>) -> Response {
    Json(json!({
        "status": "ok",
        "jobs": state.processor.job_count().await,
        "cacheEntries": state.cache.len().await,
    }))
    .into_response()
}
