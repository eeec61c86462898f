//! Namespaced key/value cache with per-entry expiry.
//!
//! Keys are prefixed by category (`blueprint:`, `pipeline:`, `rate_limit:`,
//! `session:`, `draft:`) so bulk operations such as clearing or counting
//! one type of entry work by prefix matching over the key space
//! without a secondary index. Entries are always re-derivable from source
//! computation, so aggregate operations need not be atomic as a whole.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::CacheConfig;

/// How many keys to include per namespace in a stats sample.
const STATS_SAMPLE_SIZE: usize = 5;

/// Cache key categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    Blueprint,
    Pipeline,
    RateLimit,
    Session,
    Draft,
}

impl Namespace {
    pub const ALL: [Namespace; 5] = [
        Namespace::Blueprint,
        Namespace::Pipeline,
        Namespace::RateLimit,
        Namespace::Session,
        Namespace::Draft,
    ];

    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Blueprint => "blueprint:",
            Self::Pipeline => "pipeline:",
            Self::RateLimit => "rate_limit:",
            Self::Session => "session:",
            Self::Draft => "draft:",
        }
    }

    /// Build a namespaced key for an entity id.
    pub fn key(&self, id: &str) -> String {
        format!("{}{}", self.prefix(), id)
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|ns| ns.prefix().trim_end_matches(':') == name)
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: DateTime<Utc>,
}

impl Entry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Per-namespace entry counts and a key sample.
#[derive(Debug, Clone, Serialize)]
pub struct NamespaceStats {
    pub namespace: Namespace,
    pub entries: usize,
    pub sample_keys: Vec<String>,
}

/// Result of a warm-up pre-check for one entity.
#[derive(Debug, Clone, Serialize)]
pub struct WarmupEntry {
    pub entity: String,
    pub cached: bool,
}

/// In-memory cache fronting expensive generation results.
pub struct CacheService {
    config: CacheConfig,
    entries: RwLock<HashMap<String, Entry>>,
}

impl CacheService {
    pub fn new(config: CacheConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            entries: RwLock::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Get a value. A read after expiry behaves identically to a miss;
    /// reads never renew an entry's expiry.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if entry.is_expired(Utc::now()) {
            return None;
        }
        Some(entry.value.clone())
    }

    /// Set a value. Every entry gets an expiry; there is no permanent mode.
    pub async fn set(&self, key: &str, value: Value, ttl: Duration) {
        let expires_at = Utc::now() + TimeDelta::from_std(ttl).unwrap_or(TimeDelta::seconds(60));
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), Entry { value, expires_at });
    }

    /// Delete a key. Idempotent: deleting a missing key reports `false` but
    /// causes no error.
    pub async fn delete(&self, key: &str) -> bool {
        self.entries.write().await.remove(key).is_some()
    }

    /// Atomically add `by` to a numeric counter, creating it (with the
    /// configured counter TTL) when absent or expired. Returns the new value.
    pub async fn increment(&self, key: &str, by: i64) -> i64 {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        match entries.get_mut(key) {
            Some(entry) if !entry.is_expired(now) => {
                let current = entry.value.as_i64().unwrap_or(0);
                let next = current + by;
                entry.value = Value::from(next);
                next
            }
            _ => {
                let ttl = TimeDelta::from_std(self.config.counter_ttl)
                    .unwrap_or(TimeDelta::seconds(3600));
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: Value::from(by),
                        expires_at: now + ttl,
                    },
                );
                by
            }
        }
    }

    /// List live keys matching a glob pattern (`*` matches any run of
    /// characters).
    pub async fn keys(&self, pattern: &str) -> Vec<String> {
        let matcher = glob_to_regex(pattern);
        let now = Utc::now();
        let entries = self.entries.read().await;
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(key, entry)| !entry.is_expired(now) && matcher.is_match(key))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Delete all keys matching a glob pattern. List-then-delete, so a fault
    /// mid-way leaves a well-defined subset deleted.
    pub async fn clear_pattern(&self, pattern: &str) -> usize {
        let keys = self.keys(pattern).await;
        let mut cleared = 0;
        for key in keys {
            if self.delete(&key).await {
                cleared += 1;
            }
        }
        cleared
    }

    /// Delete all entries of one namespace. Returns the cleared count
    /// (0 with no matches, never an error).
    pub async fn clear_namespace(&self, ns: Namespace) -> usize {
        let cleared = self.clear_pattern(&format!("{}*", ns.prefix())).await;
        info!(namespace = ns.prefix(), cleared, "Cleared cache namespace");
        cleared
    }

    /// Delete the entire keyspace.
    pub async fn clear_all(&self) -> usize {
        let mut entries = self.entries.write().await;
        let cleared = entries.len();
        entries.clear();
        info!(cleared, "Cleared entire cache");
        cleared
    }

    /// Per-namespace entry counts with a small key sample.
    pub async fn stats(&self) -> Vec<NamespaceStats> {
        let now = Utc::now();
        let entries = self.entries.read().await;
        Namespace::ALL
            .into_iter()
            .map(|ns| {
                let mut keys: Vec<&String> = entries
                    .iter()
                    .filter(|(key, entry)| {
                        !entry.is_expired(now) && key.starts_with(ns.prefix())
                    })
                    .map(|(key, _)| key)
                    .collect();
                keys.sort();
                NamespaceStats {
                    namespace: ns,
                    entries: keys.len(),
                    sample_keys: keys
                        .iter()
                        .take(STATS_SAMPLE_SIZE)
                        .map(|k| (*k).clone())
                        .collect(),
                }
            })
            .collect()
    }

    /// Pre-check a set of known entities against the blueprint namespace,
    /// reporting whether each is already cached.
    pub async fn warm_up(&self, entities: &[String]) -> Vec<WarmupEntry> {
        let checks = entities.iter().map(|entity| async move {
            WarmupEntry {
                entity: entity.clone(),
                cached: self.get(&Namespace::Blueprint.key(entity)).await.is_some(),
            }
        });
        futures::future::join_all(checks).await
    }

    /// Drop expired entries. Expiry is also enforced lazily on read, so the
    /// sweep only bounds memory.
    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Total live entries (for diagnostics).
    pub async fn len(&self) -> usize {
        let now = Utc::now();
        let entries = self.entries.read().await;
        entries.values().filter(|e| !e.is_expired(now)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Compile a glob pattern (`*` wildcards) to an anchored regex.
fn glob_to_regex(pattern: &str) -> regex::Regex {
    let escaped = regex::escape(pattern).replace(r"\*", ".*");
    regex::Regex::new(&format!("^{escaped}$"))
        .unwrap_or_else(|_| regex::Regex::new("^$").expect("empty regex is valid"))
}

/// Spawn a background task that periodically purges expired entries.
pub fn spawn_expiry_task(cache: Arc<CacheService>) -> tokio::task::JoinHandle<()> {
    let interval = cache.config.sweep_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let purged = cache.purge_expired().await;
            if purged > 0 {
                debug!(purged, "Purged expired cache entries");
            }
        }
    })
}
