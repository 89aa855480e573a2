//!
//! docvault data model
//! -------------------
//! Typed shapes for client records as they are persisted and returned over HTTP.
//! Field names on the wire are camelCase (`idNumber`, `checkedOutTo`, ...) and the
//! record id travels as a 24-char hex string under `_id`.
//!
//! Every record carries exactly six document slots. A slot starts with
//! `uploaded=false` and gains its file metadata on each upload; a later upload
//! replaces the metadata wholesale.
//!
//! Mutations go through `ClientPatch`, an explicit partial update that the record
//! stores either apply in memory or translate to `$set`/`$unset`.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Keys that belong to the server and are stripped from client-supplied bodies.
pub const RESERVED_FIELDS: &[&str] = &[
    "_id",
    "documents",
    "status",
    "checkedOutTo",
    "checkedOutDate",
    "checkedOutPurpose",
    "expectedReturn",
];

/// One of the six fixed document categories tracked per client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DocumentSlot {
    #[serde(rename = "id")]
    Id,
    #[serde(rename = "titleDeed")]
    TitleDeed,
    #[serde(rename = "landAgreement")]
    LandAgreement,
    #[serde(rename = "consentForm")]
    ConsentForm,
    #[serde(rename = "annexIII")]
    AnnexIii,
    #[serde(rename = "bonusForm")]
    BonusForm,
}

impl DocumentSlot {
    pub const ALL: [DocumentSlot; 6] = [
        DocumentSlot::Id,
        DocumentSlot::TitleDeed,
        DocumentSlot::LandAgreement,
        DocumentSlot::ConsentForm,
        DocumentSlot::AnnexIii,
        DocumentSlot::BonusForm,
    ];

    /// Wire name, also used as the key under `documents` in the record store.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentSlot::Id => "id",
            DocumentSlot::TitleDeed => "titleDeed",
            DocumentSlot::LandAgreement => "landAgreement",
            DocumentSlot::ConsentForm => "consentForm",
            DocumentSlot::AnnexIii => "annexIII",
            DocumentSlot::BonusForm => "bonusForm",
        }
    }

    /// Exact, case-sensitive match against the six wire names.
    pub fn parse(name: &str) -> Result<Self, AppError> {
        DocumentSlot::ALL
            .into_iter()
            .find(|slot| slot.as_str() == name)
            .ok_or_else(|| AppError::user("invalid_doc_type", "Invalid document type"))
    }
}

impl FromStr for DocumentSlot {
    type Err = AppError;
    fn from_str(s: &str) -> Result<Self, Self::Err> { DocumentSlot::parse(s) }
}

impl Display for DocumentSlot {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

/// Metadata for a single slot. All fields besides `uploaded` are present only
/// after an upload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInfo {
    #[serde(default)]
    pub uploaded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Generated on-disk name (`<uuid><.ext>`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

/// The fixed-shape map of six slots stored under `documents`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMap {
    #[serde(default, rename = "id")]
    pub id: DocumentInfo,
    #[serde(default, rename = "titleDeed")]
    pub title_deed: DocumentInfo,
    #[serde(default, rename = "landAgreement")]
    pub land_agreement: DocumentInfo,
    #[serde(default, rename = "consentForm")]
    pub consent_form: DocumentInfo,
    #[serde(default, rename = "annexIII")]
    pub annex_iii: DocumentInfo,
    #[serde(default, rename = "bonusForm")]
    pub bonus_form: DocumentInfo,
}

impl DocumentMap {
    /// All six slots present, none uploaded.
    pub fn empty() -> Self { DocumentMap::default() }

    pub fn get(&self, slot: DocumentSlot) -> &DocumentInfo {
        match slot {
            DocumentSlot::Id => &self.id,
            DocumentSlot::TitleDeed => &self.title_deed,
            DocumentSlot::LandAgreement => &self.land_agreement,
            DocumentSlot::ConsentForm => &self.consent_form,
            DocumentSlot::AnnexIii => &self.annex_iii,
            DocumentSlot::BonusForm => &self.bonus_form,
        }
    }

    pub fn set(&mut self, slot: DocumentSlot, info: DocumentInfo) {
        let target = match slot {
            DocumentSlot::Id => &mut self.id,
            DocumentSlot::TitleDeed => &mut self.title_deed,
            DocumentSlot::LandAgreement => &mut self.land_agreement,
            DocumentSlot::ConsentForm => &mut self.consent_form,
            DocumentSlot::AnnexIii => &mut self.annex_iii,
            DocumentSlot::BonusForm => &mut self.bonus_form,
        };
        *target = info;
    }

    pub fn iter(&self) -> impl Iterator<Item = (DocumentSlot, &DocumentInfo)> {
        DocumentSlot::ALL.into_iter().map(move |slot| (slot, self.get(slot)))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientStatus {
    #[default]
    #[serde(rename = "available")]
    Available,
    #[serde(rename = "checked-out")]
    CheckedOut,
}

impl ClientStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientStatus::Available => "available",
            ClientStatus::CheckedOut => "checked-out",
        }
    }
}

/// Loan fields; meaningful only while the status is `checked-out`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked_out_to: Option<String>,
    /// RFC 3339 UTC timestamp set by the server at checkout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked_out_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked_out_purpose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_return: Option<String>,
}

impl CheckoutDetails {
    pub fn is_empty(&self) -> bool { *self == CheckoutDetails::default() }
}

/// Everything stored for a client apart from its id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientFields {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "idNumber")]
    pub id_number: String,
    #[serde(default)]
    pub documents: DocumentMap,
    #[serde(default)]
    pub status: ClientStatus,
    #[serde(flatten)]
    pub checkout: CheckoutDetails,
    /// Free-form fields supplied at creation, kept verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ClientFields {
    /// Apply a partial update in place. Only the parts named by the patch change.
    pub fn apply(&mut self, patch: &ClientPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        match &patch.checkout {
            Some(CheckoutChange::Set(details)) => self.checkout = details.clone(),
            Some(CheckoutChange::Clear) => self.checkout = CheckoutDetails::default(),
            None => {}
        }
        for (slot, info) in &patch.slots {
            self.documents.set(*slot, info.clone());
        }
    }
}

/// A stored client as returned by the record store and the HTTP API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(flatten)]
    pub fields: ClientFields,
}

/// Body accepted by the create call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewClient {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "idNumber")]
    pub id_number: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl NewClient {
    pub fn new(name: impl Into<String>, id_number: impl Into<String>) -> Self {
        Self { name: name.into(), id_number: id_number.into(), extra: serde_json::Map::new() }
    }

    /// Initial stored shape: all six slots empty, status available, no checkout.
    pub fn into_fields(self) -> ClientFields {
        let mut extra = self.extra;
        for key in RESERVED_FIELDS {
            extra.remove(*key);
        }
        ClientFields {
            name: self.name,
            id_number: self.id_number,
            documents: DocumentMap::empty(),
            status: ClientStatus::Available,
            checkout: CheckoutDetails::default(),
            extra,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutChange {
    /// Replace all four checkout fields; `None` members are cleared.
    Set(CheckoutDetails),
    Clear,
}

/// Explicit partial update merged into a single record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientPatch {
    pub status: Option<ClientStatus>,
    pub checkout: Option<CheckoutChange>,
    pub slots: BTreeMap<DocumentSlot, DocumentInfo>,
}

impl ClientPatch {
    pub fn slot(slot: DocumentSlot, info: DocumentInfo) -> Self {
        let mut patch = ClientPatch::default();
        patch.slots.insert(slot, info);
        patch
    }

    pub fn checkout(details: CheckoutDetails) -> Self {
        ClientPatch { status: Some(ClientStatus::CheckedOut), checkout: Some(CheckoutChange::Set(details)), ..Default::default() }
    }

    pub fn checkin() -> Self {
        ClientPatch { status: Some(ClientStatus::Available), checkout: Some(CheckoutChange::Clear), ..Default::default() }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.checkout.is_none() && self.slots.is_empty()
    }
}

/// Result of an update-by-id. `matched == 0` means the id does not exist;
/// `matched > 0 && modified == 0` means the record already held those values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub matched: u64,
    pub modified: u64,
}

impl UpdateOutcome {
    pub fn not_found() -> Self { UpdateOutcome { matched: 0, modified: 0 } }
    pub fn is_not_found(&self) -> bool { self.matched == 0 }
    pub fn is_unchanged(&self) -> bool { self.matched > 0 && self.modified == 0 }
}
