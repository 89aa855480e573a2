//!
//! docvault record store
//! ---------------------
//! Persistence seam for client records. `RecordStore` is implemented by
//! `MongoRecordStore` (production, one document per client in the `clients`
//! collection) and `MemoryRecordStore` (in-process, used for `memory://` and tests).
//!
//! Both implementations share the same contract:
//! - `create` assigns a fresh ObjectId and stores the initial shape.
//! - `list` optionally filters by a case-insensitive substring of name OR idNumber.
//! - `update` is a partial merge on a single record, atomic per record, and reports
//!   matched/modified counts so callers can tell "not found" from "unchanged".
//! - Ids that are not valid ObjectId hex strings match nothing.
//!
//! The store is opened once at startup (`open_record_store`) and closed after the
//! server shuts down.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;

use crate::error::AppResult;
use crate::model::{ClientPatch, ClientRecord, NewClient, UpdateOutcome};

pub mod memory;
pub mod mongo;

pub use memory::MemoryRecordStore;
pub use mongo::MongoRecordStore;

/// Connection string that selects the in-process store.
pub const MEMORY_URI: &str = "memory://";

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn create(&self, client: NewClient) -> AppResult<ClientRecord>;

    /// All records, or only those whose name or idNumber contains `search`
    /// (case-insensitive). `None` and `Some("")` both return everything.
    async fn list(&self, search: Option<&str>) -> AppResult<Vec<ClientRecord>>;

    async fn get(&self, id: &str) -> AppResult<Option<ClientRecord>>;

    async fn update(&self, id: &str, patch: ClientPatch) -> AppResult<UpdateOutcome>;

    /// Release backend resources. Calls after `close` are unspecified.
    async fn close(&self) -> AppResult<()>;
}

pub type SharedRecordStore = Arc<dyn RecordStore>;

/// Parse a record id; anything that is not 24 hex chars is rejected.
pub fn parse_record_id(id: &str) -> Option<ObjectId> {
    ObjectId::parse_str(id).ok()
}

pub fn is_valid_record_id(id: &str) -> bool { parse_record_id(id).is_some() }

/// Case-insensitive substring match on name OR idNumber.
pub fn matches_search(record: &ClientRecord, search: &str) -> bool {
    if search.is_empty() { return true; }
    let needle = search.to_lowercase();
    record.fields.name.to_lowercase().contains(&needle)
        || record.fields.id_number.to_lowercase().contains(&needle)
}

/// Open the record store named by a connection string.
pub async fn open_record_store(uri: &str, database: &str) -> anyhow::Result<SharedRecordStore> {
    if uri.trim() == MEMORY_URI {
        tracing::warn!(target: "docvault::record_store", "using in-memory record store; records are lost on shutdown");
        return Ok(Arc::new(MemoryRecordStore::new()));
    }
    let store = MongoRecordStore::connect(uri, database)
        .await
        .with_context(|| format!("While connecting to MongoDB database '{}'", database))?;
    Ok(Arc::new(store))
}

/// Scheme and host of a connection string with credentials removed, for logs.
pub fn redact_uri(uri: &str) -> String {
    let Some((scheme, rest)) = uri.split_once("://") else { return "<invalid uri>".to_string() };
    let host_part = rest.split(['/', '?']).next().unwrap_or("");
    let host = host_part.rsplit_once('@').map(|(_, h)| h).unwrap_or(host_part);
    format!("{}://{}", scheme, host)
}
