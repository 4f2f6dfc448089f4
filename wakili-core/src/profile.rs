//! User profile and stored document types.

use candid::CandidType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Display name used when a profile has no name set.
pub const DEFAULT_DISPLAY_NAME: &str = "User";

/// Separator between the parts of a document id.
pub const DOCUMENT_ID_SEPARATOR: char = '_';

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Convert a nanosecond epoch timestamp into a UTC datetime.
pub fn timestamp_from_nanos(nanos: u64) -> Option<Timestamp> {
    let nanos = i64::try_from(nanos).ok()?;
    Some(DateTime::from_timestamp_nanos(nanos))
}

/// Per-user statistics kept by the backend.
#[derive(Debug, Clone, PartialEq, Eq, CandidType, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: Option<String>,
    pub document_count: u32,
    /// Nanoseconds since the Unix epoch.
    pub last_active: u64,
}

impl UserProfile {
    /// The name to show, or [`DEFAULT_DISPLAY_NAME`] when none is set.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(DEFAULT_DISPLAY_NAME)
    }

    pub fn last_active_at(&self) -> Option<Timestamp> {
        timestamp_from_nanos(self.last_active)
    }
}

/// A stored document as returned by the document listing: `(id, content)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct DocumentSummary {
    pub id: String,
    pub content: String,
}

impl DocumentSummary {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
        }
    }

    pub fn parsed_id(&self) -> Option<DocumentId> {
        DocumentId::parse(&self.id)
    }
}

impl From<(String, String)> for DocumentSummary {
    fn from((id, content): (String, String)) -> Self {
        Self { id, content }
    }
}

impl From<DocumentSummary> for (String, String) {
    fn from(summary: DocumentSummary) -> Self {
        (summary.id, summary.content)
    }
}

/// A document id split into `kind_label_nanos`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentId {
    pub kind: String,
    pub label: String,
    pub created_ns: u64,
}

impl DocumentId {
    /// Parse an id that splits into exactly three parts with a numeric
    /// nanosecond timestamp last. Anything else yields `None`.
    pub fn parse(id: &str) -> Option<Self> {
        let parts: Vec<&str> = id.split(DOCUMENT_ID_SEPARATOR).collect();
        let [kind, label, nanos] = parts.as_slice() else {
            return None;
        };
        let created_ns = nanos.parse::<u64>().ok()?;
        Some(Self {
            kind: (*kind).to_string(),
            label: (*label).to_string(),
            created_ns,
        })
    }

    pub fn created_at(&self) -> Option<Timestamp> {
        timestamp_from_nanos(self.created_ns)
    }
}

/// A device registered for an identity anchor in the identity registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceData {
    pub alias: String,
    /// Hex-encoded public key of the device.
    pub pubkey: String,
    pub credential_id: Option<String>,
}
