//! Batch change & revert engine.
//!
//! [`ChangeEngine`] owns the apply, revert, and lifecycle operations. It is
//! request scoped: every call fans out its own entity-store reads and writes,
//! waits for all of them to settle, and shares no mutable state with other
//! calls. Concurrent batches touching the same entity are not coordinated.

mod apply;
mod lifecycle;
mod revert;
mod settle;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::attributes::AttributeDictionary;
use crate::batch::{self, BatchStatus};
use crate::error::CoreError;
use crate::model::{BatchFilter, ChangeBatch, ChangeLog};
use crate::store::{BatchStore, EntityStore, LogStore};
use crate::types::{DbId, EntityId, Timestamp};
use crate::value::{self, AttributeMap, AttributeValue};

/// Default bound on a single entity-store call.
pub const DEFAULT_ENTITY_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Bound on each entity-store read/write. `None` waits indefinitely.
    pub entity_call_timeout: Option<Duration>,
    /// Maximum number of entities per submission.
    pub max_batch_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            entity_call_timeout: Some(DEFAULT_ENTITY_CALL_TIMEOUT),
            max_batch_size: batch::DEFAULT_MAX_BATCH_SIZE,
        }
    }
}

/// A submission: the same or different edits for a set of entities.
#[derive(Debug, Clone, Default)]
pub struct SubmitBatch {
    pub entity_ids: Vec<EntityId>,
    pub changes: BTreeMap<EntityId, AttributeMap>,
    /// Present for the scheduled path; absent applies immediately.
    pub scheduled_for: Option<Timestamp>,
    pub submitter_id: Option<DbId>,
}

/// Result of a submit or revert: the batch as persisted and its logs.
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub batch: ChangeBatch,
    pub logs: Vec<ChangeLog>,
}

impl BatchOutcome {
    pub fn batch_id(&self) -> DbId {
        self.batch.id
    }

    pub fn status(&self) -> BatchStatus {
        self.batch.status
    }
}

/// The batch change & revert engine.
pub struct ChangeEngine {
    batches: Arc<dyn BatchStore>,
    logs: Arc<dyn LogStore>,
    entities: Arc<dyn EntityStore>,
    dictionary: Arc<AttributeDictionary>,
    config: EngineConfig,
}

impl ChangeEngine {
    pub fn new(
        batches: Arc<dyn BatchStore>,
        logs: Arc<dyn LogStore>,
        entities: Arc<dyn EntityStore>,
        dictionary: Arc<AttributeDictionary>,
        config: EngineConfig,
    ) -> Self {
        Self {
            batches,
            logs,
            entities,
            dictionary,
            config,
        }
    }

    pub fn dictionary(&self) -> &AttributeDictionary {
        &self.dictionary
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // -- Query surface --------------------------------------------------------

    pub async fn get_batch(&self, id: DbId) -> Result<ChangeBatch, CoreError> {
        self.batches
            .find_by_id(id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "ChangeBatch",
                id,
            })
    }

    pub async fn list_batches(&self, filter: &BatchFilter) -> Result<Vec<ChangeBatch>, CoreError> {
        Ok(self.batches.list(filter).await?)
    }

    /// Logs of an existing batch.
    pub async fn list_logs(&self, batch_id: DbId) -> Result<Vec<ChangeLog>, CoreError> {
        self.get_batch(batch_id).await?;
        Ok(self.logs.list_by_batch(batch_id).await?)
    }

    pub async fn get_log(&self, id: DbId) -> Result<ChangeLog, CoreError> {
        self.logs
            .find_by_id(id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "ChangeLog",
                id,
            })
    }

    pub async fn health_check(&self) -> Result<(), CoreError> {
        Ok(self.batches.health_check().await?)
    }

    /// Decode logged text for writing back, using the dictionary kind when known.
    fn decode_for(&self, attribute: &str, text: Option<&str>) -> Option<AttributeValue> {
        match self.dictionary.kind(attribute) {
            Some(kind) => value::decode_as(text, kind),
            None => value::decode(text),
        }
    }
}
