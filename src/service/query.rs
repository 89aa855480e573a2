use crate::error::AppResult;
use crate::model::ClientRecord;
use crate::record_store::RecordStore;

/// List records, filtered by a case-insensitive substring of name or idNumber.
/// An empty search is the same as no search.
pub async fn list_clients(records: &dyn RecordStore, search: Option<&str>) -> AppResult<Vec<ClientRecord>> {
    let search = search.filter(|s| !s.is_empty());
    records.list(search).await
}
