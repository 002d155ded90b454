use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use amend_core::attributes::AttributeDictionary;
use amend_core::engine::{ChangeEngine, EngineConfig, SubmitBatch};
use amend_core::memory::{MemoryChangeStore, MemoryEntityStore};
use amend_core::value::{AttributeMap, AttributeValue};

/// An engine over in-memory stores, with handles to both stores for
/// seeding, fault injection, and assertions.
pub struct Harness {
    pub engine: ChangeEngine,
    pub changes: Arc<MemoryChangeStore>,
    pub entities: Arc<MemoryEntityStore>,
}

pub fn harness() -> Harness {
    harness_with(EngineConfig::default())
}

pub fn harness_with(config: EngineConfig) -> Harness {
    let changes = Arc::new(MemoryChangeStore::new());
    let entities = Arc::new(MemoryEntityStore::new());
    let engine = ChangeEngine::new(
        changes.clone(),
        changes.clone(),
        entities.clone(),
        Arc::new(AttributeDictionary::employee_defaults()),
        config,
    );
    Harness {
        engine,
        changes,
        entities,
    }
}

/// A short entity-call timeout for timeout tests.
pub fn fast_timeout() -> EngineConfig {
    EngineConfig {
        entity_call_timeout: Some(Duration::from_millis(50)),
        ..EngineConfig::default()
    }
}

pub fn text(s: &str) -> Option<AttributeValue> {
    Some(AttributeValue::text(s))
}

pub fn attrs(pairs: &[(&str, Option<AttributeValue>)]) -> AttributeMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

impl Harness {
    /// Seed employees e1 (Sales) and e2 (Marketing).
    pub async fn seed_departments(&self) {
        self.entities
            .insert("e1", attrs(&[("department", text("Sales"))]))
            .await;
        self.entities
            .insert("e2", attrs(&[("department", text("Marketing"))]))
            .await;
    }

    pub async fn department(&self, entity_id: &str) -> Option<AttributeValue> {
        self.entities
            .get(entity_id)
            .await
            .and_then(|e| e.get("department").cloned().flatten())
    }
}

/// The same edit applied to every listed entity.
pub fn bulk_edit(entity_ids: &[&str], changes: AttributeMap) -> SubmitBatch {
    let changes: BTreeMap<String, AttributeMap> = entity_ids
        .iter()
        .map(|id| (id.to_string(), changes.clone()))
        .collect();
    SubmitBatch {
        entity_ids: entity_ids.iter().map(|id| id.to_string()).collect(),
        changes,
        ..SubmitBatch::default()
    }
}
