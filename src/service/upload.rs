//! Document upload: persist the bytes, then record the slot metadata.
//!
//! The two steps are not transactional. Validation (slot name, client id)
//! happens before any I/O; once the file is written, a failed or unmatched
//! record update leaves the file orphaned on disk. A re-upload keeps the
//! previous file and only replaces the slot metadata.

use chrono::Utc;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::file_store::FileStore;
use crate::model::{ClientPatch, DocumentInfo, DocumentSlot};
use crate::record_store::{parse_record_id, RecordStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub slot: DocumentSlot,
    /// Public URL under the uploads prefix.
    pub url: String,
    pub filename: String,
}

pub async fn upload_document(
    records: &dyn RecordStore,
    files: &FileStore,
    client_id: &str,
    doc_type: &str,
    original_name: &str,
    bytes: &[u8],
) -> AppResult<UploadReceipt> {
    let slot = DocumentSlot::parse(doc_type)?;
    let Some(oid) = parse_record_id(client_id) else {
        return Err(AppError::not_found("client_not_found", "Client not found"));
    };
    // Canonical lowercase hex keeps one directory per client
    let client_id = oid.to_hex();

    let stored = files.store(&client_id, original_name, bytes).await?;

    let slot_info = DocumentInfo {
        uploaded: true,
        url: Some(stored.url.clone()),
        filename: Some(stored.filename.clone()),
        original_name: Some(stored.original_name.clone()),
        uploaded_at: Some(Utc::now()),
        file_path: Some(stored.path.display().to_string()),
    };
    let outcome = match records.update(&client_id, ClientPatch::slot(slot, slot_info)).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(target: "docvault::upload", "record update failed after write; orphaned file '{}': {}", stored.path.display(), e);
            return Err(e);
        }
    };
    if outcome.is_not_found() {
        warn!(target: "docvault::upload", "no record for client='{}'; orphaned file '{}'", client_id, stored.path.display());
        return Err(AppError::not_found("client_not_found", "Client not found"));
    }

    info!(target: "docvault::upload", "client='{}' slot='{}' file='{}' size={}", client_id, slot, stored.filename, bytes.len());
    Ok(UploadReceipt { slot, url: stored.url, filename: stored.filename })
}
