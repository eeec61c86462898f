use std::sync::Arc;
use std::time::Duration;

use blueprint_forge::api::{AppState, routes};
use blueprint_forge::blueprint::default_chain;
use blueprint_forge::cache::{self, CacheService};
use blueprint_forge::chain::ChainOrchestrator;
use blueprint_forge::config::{CacheConfig, ChainConfig, JobConfig, RateLimitConfig};
use blueprint_forge::downstream::AgentServiceClient;
use blueprint_forge::jobs::{JobProcessor, ProcessorDeps, spawn_retention_task};
use blueprint_forge::llm::{LlmBackend, LlmConfig, create_provider};
use blueprint_forge::ratelimit::{self, SlidingWindowLimiter};
use blueprint_forge::store::{BlueprintStore, InMemoryStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing; optional daily-rolling file output alongside stderr.
    let env_filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };
    let _file_guard = match std::env::var("FORGE_LOG_DIR") {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "blueprint-forge.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        Err(_) => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_target(false)
                .init();
            None
        }
    };

    // Read API key from environment
    let (backend, api_key) = if let Ok(key) = std::env::var("GEMINI_API_KEY") {
        (LlmBackend::Gemini, key)
    } else if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
        (LlmBackend::Anthropic, key)
    } else {
        eprintln!("Error: GEMINI_API_KEY or ANTHROPIC_API_KEY not set");
        eprintln!("  export GEMINI_API_KEY=...");
        std::process::exit(1);
    };

    let model = std::env::var("FORGE_MODEL").unwrap_or_else(|_| match backend {
        LlmBackend::Gemini => "gemini-2.0-flash-exp".to_string(),
        LlmBackend::Anthropic => "claude-sonnet-4-20250514".to_string(),
    });

    let port: u16 = match std::env::var("FORGE_PORT") {
        Ok(value) => value.parse().map_err(|_| {
            blueprint_forge::error::ConfigError::InvalidValue {
                key: "FORGE_PORT".to_string(),
                message: format!("expected a port number, got {value:?}"),
            }
        })?,
        Err(_) => 8080,
    };

    eprintln!("📐 Blueprint Forge v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", model);
    eprintln!("   API: http://0.0.0.0:{}/api", port);

    // Create LLM provider
    let llm_config = LlmConfig {
        backend,
        api_key: secrecy::SecretString::from(api_key),
        model,
    };
    let llm = create_provider(&llm_config)?;

    // ── Shared components ────────────────────────────────────────────────
    let cache = CacheService::new(CacheConfig::default());
    let model_limiter = SlidingWindowLimiter::new(RateLimitConfig::default());
    let user_limiter = SlidingWindowLimiter::new(RateLimitConfig {
        max_requests: std::env::var("FORGE_USER_RATE_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10),
        window: Duration::from_secs(60),
    });
    let store: Arc<dyn BlueprintStore> = InMemoryStore::new();

    // Optional report-composition service (writer agent).
    let writer = std::env::var("FORGE_WRITER_URL").ok().map(|url| {
        eprintln!("   Writer service: {}", url);
        AgentServiceClient::new("writer", url, Duration::from_secs(30))
    });

    let orchestrator = ChainOrchestrator::new(
        llm,
        Arc::clone(&model_limiter),
        ChainConfig::default(),
    );

    let processor = JobProcessor::new(
        ProcessorDeps {
            orchestrator,
            agents: default_chain(),
            cache: Arc::clone(&cache),
            store: Arc::clone(&store),
            writer,
        },
        JobConfig::default(),
    );
    processor.start().await;

    // Background sweeps: cache expiry, idle limiter identifiers, old jobs.
    cache::spawn_expiry_task(Arc::clone(&cache));
    ratelimit::spawn_prune_task(Arc::clone(&model_limiter), Duration::from_secs(300));
    ratelimit::spawn_prune_task(Arc::clone(&user_limiter), Duration::from_secs(300));
    spawn_retention_task(Arc::clone(&processor));

    let warm_entities: Vec<String> = std::env::var("FORGE_WARM_ENTITIES")
        .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
        .unwrap_or_default();

    let app = routes(AppState {
        processor: Arc::clone(&processor),
        cache,
        limiter: user_limiter,
        store,
        warm_entities: Arc::new(warm_entities),
    });

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    processor.shutdown().await;
    Ok(())
}
