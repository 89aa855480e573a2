//! Checkout/checkin status toggles. Both decide not-found on the matched count,
//! so repeating a checkin on an available record still succeeds.

use chrono::Utc;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::model::{CheckoutDetails, ClientPatch, UpdateOutcome};
use crate::record_store::RecordStore;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub checkout_to: String,
    pub purpose: Option<String>,
    pub expected_return: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub async fn checkout(records: &dyn RecordStore, client_id: &str, request: CheckoutRequest) -> AppResult<UpdateOutcome> {
    let checkout_to = request.checkout_to.trim();
    if checkout_to.is_empty() {
        return Err(AppError::user("missing_checkout_to", "checkout_to is required"));
    }
    let details = CheckoutDetails {
        checked_out_to: Some(checkout_to.to_string()),
        checked_out_date: Some(Utc::now().to_rfc3339()),
        checked_out_purpose: non_blank(request.purpose),
        expected_return: non_blank(request.expected_return),
    };
    let outcome = records.update(client_id, ClientPatch::checkout(details)).await?;
    if outcome.is_not_found() {
        return Err(AppError::not_found("client_not_found", "Client not found"));
    }
    info!(target: "docvault::checkout", "client='{}' checked out to '{}'", client_id, checkout_to);
    Ok(outcome)
}

pub async fn checkin(records: &dyn RecordStore, client_id: &str) -> AppResult<UpdateOutcome> {
    let outcome = records.update(client_id, ClientPatch::checkin()).await?;
    if outcome.is_not_found() {
        return Err(AppError::not_found("client_not_found", "Client not found"));
    }
    info!(target: "docvault::checkout", "client='{}' checked in (modified={})", client_id, outcome.modified);
    Ok(outcome)
}
