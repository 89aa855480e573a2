//! MongoDB-backed `RecordStore`.
//!
//! One document per client in the `clients` collection. Partial updates are a
//! single `update_one` with `$set`/`$unset`, so each update is atomic per record.
//! The driver's `matched_count` decides not-found; `modified_count` only reports
//! whether anything actually changed.
//!
//! Slot timestamps (`uploadedAt`) are native BSON dates on disk and RFC 3339 in the
//! model. Reads also accept legacy string timestamps and numeric `idNumber` values.
//! A document that still fails to decode is skipped by `list` with a warning.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use mongodb::bson::{self, doc, oid::ObjectId, to_bson, Bson, Document};
use mongodb::{Client, Collection};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{parse_record_id, RecordStore};
use crate::error::{AppError, AppResult};
use crate::model::{CheckoutChange, ClientFields, ClientPatch, ClientRecord, DocumentSlot, NewClient, UpdateOutcome};

pub const DEFAULT_DATABASE: &str = "document_management";
pub const CLIENTS_COLLECTION: &str = "clients";

const CHECKOUT_FIELDS: [&str; 4] = ["checkedOutTo", "checkedOutDate", "checkedOutPurpose", "expectedReturn"];

/// Stored shape: the ObjectId stays native BSON, everything else is `ClientFields`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredClient {
    #[serde(rename = "_id")]
    id: ObjectId,
    #[serde(flatten)]
    fields: ClientFields,
}

impl From<StoredClient> for ClientRecord {
    fn from(stored: StoredClient) -> Self {
        ClientRecord { id: stored.id.to_hex(), fields: stored.fields }
    }
}

#[derive(Clone)]
pub struct MongoRecordStore {
    client: Client,
    clients: Collection<Document>,
}

impl MongoRecordStore {
    /// Connect and verify the deployment answers a `ping`.
    pub async fn connect(uri: &str, database: &str) -> AppResult<Self> {
        let client = Client::with_uri_str(uri).await?;
        let db = client.database(database);
        db.run_command(doc! { "ping": 1 }).await?;
        info!(target: "docvault::record_store", "connected to MongoDB database='{}' collection='{}'", database, CLIENTS_COLLECTION);
        let clients = db.collection::<Document>(CLIENTS_COLLECTION);
        Ok(Self { client, clients })
    }
}

#[async_trait]
impl RecordStore for MongoRecordStore {
    async fn create(&self, client: NewClient) -> AppResult<ClientRecord> {
        let stored = StoredClient { id: ObjectId::new(), fields: client.into_fields() };
        self.clients.insert_one(encode_stored(&stored)?).await?;
        debug!(target: "docvault::record_store", "mongo create id='{}'", stored.id);
        Ok(stored.into())
    }

    async fn list(&self, search: Option<&str>) -> AppResult<Vec<ClientRecord>> {
        let cursor = self.clients.find(search_filter(search)).await?;
        let raw: Vec<Document> = cursor.try_collect().await?;
        Ok(decode_records(raw))
    }

    async fn get(&self, id: &str) -> AppResult<Option<ClientRecord>> {
        let Some(oid) = parse_record_id(id) else { return Ok(None) };
        match self.clients.find_one(doc! { "_id": oid }).await? {
            Some(raw) => {
                let stored = decode_stored(raw).map_err(|e| AppError::database("decode_error", format!("client {}: {}", id, e)))?;
                Ok(Some(stored.into()))
            }
            None => Ok(None),
        }
    }

    async fn update(&self, id: &str, patch: ClientPatch) -> AppResult<UpdateOutcome> {
        let Some(oid) = parse_record_id(id) else { return Ok(UpdateOutcome::not_found()) };
        let update = update_document(&patch)?;
        if update.is_empty() {
            // Nothing to write; still report whether the record exists
            let matched = self.clients.count_documents(doc! { "_id": oid }).await?;
            return Ok(UpdateOutcome { matched, modified: 0 });
        }
        let result = self.clients.update_one(doc! { "_id": oid }, update).await?;
        debug!(target: "docvault::record_store", "mongo update id='{}' matched={} modified={}", id, result.matched_count, result.modified_count);
        Ok(UpdateOutcome { matched: result.matched_count, modified: result.modified_count })
    }

    async fn close(&self) -> AppResult<()> {
        self.client.clone().shutdown().await;
        info!(target: "docvault::record_store", "MongoDB client shut down");
        Ok(())
    }
}

fn encode_stored(stored: &StoredClient) -> AppResult<Document> {
    let mut raw = bson::to_document(stored).map_err(|e| AppError::database("encode_error", e.to_string()))?;
    if let Ok(documents) = raw.get_document_mut("documents") {
        for slot in DocumentSlot::ALL {
            if let Ok(info) = documents.get_document_mut(slot.as_str()) {
                uploaded_at_to_bson(info);
            }
        }
    }
    Ok(raw)
}

fn decode_stored(mut raw: Document) -> Result<StoredClient, bson::de::Error> {
    if let Some(id_number) = raw.get("idNumber").and_then(scalar_to_string) {
        raw.insert("idNumber", id_number);
    }
    if let Ok(documents) = raw.get_document_mut("documents") {
        for slot in DocumentSlot::ALL {
            if let Ok(info) = documents.get_document_mut(slot.as_str()) {
                uploaded_at_from_bson(info);
            }
        }
    }
    bson::from_document(raw)
}

/// Decode every document, dropping the ones that do not fit the record shape.
fn decode_records(raw: Vec<Document>) -> Vec<ClientRecord> {
    raw.into_iter()
        .filter_map(|doc| {
            let id = doc.get_object_id("_id").map(|oid| oid.to_hex()).unwrap_or_else(|_| "<none>".to_string());
            match decode_stored(doc) {
                Ok(stored) => Some(ClientRecord::from(stored)),
                Err(e) => {
                    warn!(target: "docvault::record_store", "skipping undecodable client id='{}': {}", id, e);
                    None
                }
            }
        })
        .collect()
}

/// Numeric ids written by other tools read back as text.
fn scalar_to_string(value: &Bson) -> Option<String> {
    match value {
        Bson::Int32(n) => Some(n.to_string()),
        Bson::Int64(n) => Some(n.to_string()),
        Bson::Double(n) => Some(n.to_string()),
        _ => None,
    }
}

fn uploaded_at_to_bson(info: &mut Document) {
    let Ok(text) = info.get_str("uploadedAt") else { return };
    if let Ok(at) = DateTime::parse_from_rfc3339(text) {
        info.insert("uploadedAt", bson::DateTime::from_millis(at.timestamp_millis()));
    }
}

fn uploaded_at_from_bson(info: &mut Document) {
    let Ok(at) = info.get_datetime("uploadedAt").copied() else { return };
    match DateTime::<Utc>::from_timestamp_millis(at.timestamp_millis()) {
        Some(at) => { info.insert("uploadedAt", at.to_rfc3339()); }
        None => { info.remove("uploadedAt"); }
    }
}

/// `$or` over name and idNumber with the text regex-escaped, or match-all.
fn search_filter(search: Option<&str>) -> Document {
    match search {
        Some(text) if !text.is_empty() => {
            let pattern = regex::escape(text);
            doc! {
                "$or": [
                    { "name": { "$regex": pattern.as_str(), "$options": "i" } },
                    { "idNumber": { "$regex": pattern.as_str(), "$options": "i" } },
                ]
            }
        }
        _ => doc! {},
    }
}

fn set_or_unset(set: &mut Document, unset: &mut Document, key: &str, value: &Option<String>) {
    match value {
        Some(v) => { set.insert(key, v.as_str()); }
        None => { unset.insert(key, ""); }
    }
}

/// Translate a patch into `$set`/`$unset`. Slots are addressed as `documents.<slot>`.
fn update_document(patch: &ClientPatch) -> AppResult<Document> {
    let mut set = Document::new();
    let mut unset = Document::new();

    if let Some(status) = patch.status {
        set.insert("status", status.as_str());
    }
    match &patch.checkout {
        Some(CheckoutChange::Set(details)) => {
            set_or_unset(&mut set, &mut unset, "checkedOutTo", &details.checked_out_to);
            set_or_unset(&mut set, &mut unset, "checkedOutDate", &details.checked_out_date);
            set_or_unset(&mut set, &mut unset, "checkedOutPurpose", &details.checked_out_purpose);
            set_or_unset(&mut set, &mut unset, "expectedReturn", &details.expected_return);
        }
        Some(CheckoutChange::Clear) => {
            for key in CHECKOUT_FIELDS {
                unset.insert(key, "");
            }
        }
        None => {}
    }
    for (slot, info) in &patch.slots {
        let mut value: Bson = to_bson(info).map_err(|e| AppError::database("encode_error", e.to_string()))?;
        if let Bson::Document(fields) = &mut value {
            uploaded_at_to_bson(fields);
        }
        set.insert(format!("documents.{}", slot.as_str()), value);
    }

    let mut update = Document::new();
    if !set.is_empty() { update.insert("$set", set); }
    if !unset.is_empty() { update.insert("$unset", unset); }
    Ok(update)
}
