//! Wakili Core - Data Model
//!
//! Plain data types shared by the client and its test utilities: principals
//! and identities, backend payloads, profile and document types, and the
//! error taxonomy. No I/O happens in this crate.

pub mod error;
pub mod identity;
pub mod legal;
pub mod profile;

pub use error::{AuthError, RemoteError, ValidationError, WakiliError, WakiliResult};
pub use identity::{Identity, Principal, ProviderKind};
pub use legal::{LegalRequest, LegalResponse, RemoteReply};
pub use profile::{
    timestamp_from_nanos, DeviceData, DocumentId, DocumentSummary, Timestamp, UserProfile,
    DEFAULT_DISPLAY_NAME, DOCUMENT_ID_SEPARATOR,
};
