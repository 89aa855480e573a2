//! In-process `RecordStore` keyed by ObjectId hex.
//!
//! Every operation holds the lock for its whole duration, which gives the same
//! per-record atomicity the MongoDB backend provides.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use parking_lot::RwLock;
use tracing::debug;

use super::{matches_search, parse_record_id, RecordStore};
use crate::error::AppResult;
use crate::model::{ClientPatch, ClientRecord, NewClient, UpdateOutcome};

#[derive(Clone, Default)]
pub struct MemoryRecordStore {
    // ObjectId hex sorts by creation time, so iteration follows insertion order
    records: Arc<RwLock<BTreeMap<String, ClientRecord>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.records.read().len() }

    pub fn is_empty(&self) -> bool { self.records.read().is_empty() }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn create(&self, client: NewClient) -> AppResult<ClientRecord> {
        let record = ClientRecord { id: ObjectId::new().to_hex(), fields: client.into_fields() };
        self.records.write().insert(record.id.clone(), record.clone());
        debug!(target: "docvault::record_store", "memory create id='{}'", record.id);
        Ok(record)
    }

    async fn list(&self, search: Option<&str>) -> AppResult<Vec<ClientRecord>> {
        let search = search.unwrap_or("");
        let guard = self.records.read();
        Ok(guard.values().filter(|r| matches_search(r, search)).cloned().collect())
    }

    async fn get(&self, id: &str) -> AppResult<Option<ClientRecord>> {
        let Some(oid) = parse_record_id(id) else { return Ok(None) };
        Ok(self.records.read().get(&oid.to_hex()).cloned())
    }

    async fn update(&self, id: &str, patch: ClientPatch) -> AppResult<UpdateOutcome> {
        let Some(oid) = parse_record_id(id) else { return Ok(UpdateOutcome::not_found()) };
        let mut guard = self.records.write();
        let Some(record) = guard.get_mut(&oid.to_hex()) else { return Ok(UpdateOutcome::not_found()) };
        let before = record.fields.clone();
        record.fields.apply(&patch);
        let modified = u64::from(record.fields != before);
        debug!(target: "docvault::record_store", "memory update id='{}' modified={}", id, modified);
        Ok(UpdateOutcome { matched: 1, modified })
    }

    async fn close(&self) -> AppResult<()> { Ok(()) }
}
