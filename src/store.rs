//! Record-storage boundary.
//!
//! The blueprint record backend is an external collaborator; this trait is
//! the whole contract the pipeline needs from it. The in-memory
//! implementation is sufficient for a single process; swap in a persistent
//! backend behind the same trait without touching the processor.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::blueprint::GenerationInput;
use crate::error::StoreError;

/// Storage operations the job processor depends on.
#[async_trait]
pub trait BlueprintStore: Send + Sync {
    /// Fetch the generation parameters captured for a blueprint record.
    async fn generation_input(&self, subject_id: &str) -> Result<GenerationInput, StoreError>;

    /// Persist the generated strategy onto the blueprint record.
    async fn save_strategy(&self, subject_id: &str, strategy: &Value) -> Result<(), StoreError>;

    /// Read a previously persisted strategy, if any.
    async fn strategy(&self, subject_id: &str) -> Result<Option<Value>, StoreError>;

    /// Register a new blueprint record with its input.
    async fn create_record(
        &self,
        subject_id: &str,
        input: GenerationInput,
    ) -> Result<(), StoreError>;
}

#[derive(Default)]
struct Record {
    input: Option<GenerationInput>,
    strategy: Option<Value>,
}

/// Process-memory store.
#[derive(Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<String, Record>>,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl BlueprintStore for InMemoryStore {
    async fn generation_input(&self, subject_id: &str) -> Result<GenerationInput, StoreError> {
        let records = self.records.read().await;
        records
            .get(subject_id)
            .and_then(|record| record.input.clone())
            .ok_or_else(|| StoreError::NotFound {
                subject_id: subject_id.to_string(),
            })
    }

    async fn save_strategy(&self, subject_id: &str, strategy: &Value) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let record = records.entry(subject_id.to_string()).or_default();
        record.strategy = Some(strategy.clone());
        Ok(())
    }

    async fn strategy(&self, subject_id: &str) -> Result<Option<Value>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .get(subject_id)
            .and_then(|record| record.strategy.clone()))
    }

    async fn create_record(
        &self,
        subject_id: &str,
        input: GenerationInput,
    ) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        records.entry(subject_id.to_string()).or_default().input = Some(input);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input() -> GenerationInput {
        serde_json::from_value(json!({
            "startupName": "Acme",
            "industry": "SaaS",
            "targetMarket": "B2B",
            "geography": "US",
            "teamSize": 3,
            "productStage": "MVP",
            "businessModel": "Subscription",
            "mainFinancialConcern": "Runway"
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn create_then_fetch_input() {
        let store = InMemoryStore::new();
        store.create_record("bp-1", input()).await.unwrap();
        let fetched = store.generation_input("bp-1").await.unwrap();
        assert_eq!(fetched.startup_name, "Acme");
    }

    #[tokio::test]
    async fn missing_record_is_not_found() {
        let store = InMemoryStore::new();
        assert!(matches!(
            store.generation_input("nope").await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn strategy_roundtrip() {
        let store = InMemoryStore::new();
        store.create_record("bp-1", input()).await.unwrap();
        assert!(store.strategy("bp-1").await.unwrap().is_none());
        store
            .save_strategy("bp-1", &json!({"summary": "ok"}))
            .await
            .unwrap();
        assert_eq!(
            store.strategy("bp-1").await.unwrap().unwrap()["summary"],
            "ok"
        );
    }
}
