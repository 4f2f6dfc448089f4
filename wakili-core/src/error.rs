//! Error types for Wakili operations

use crate::identity::ProviderKind;
use thiserror::Error;

/// Local precondition failures. Raised before any remote call is made.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("No generated document to {action}")]
    NoCurrentDocument { action: String },
}

impl ValidationError {
    pub fn missing(field: impl Into<String>) -> Self {
        Self::RequiredFieldMissing {
            field: field.into(),
        }
    }
}

/// Failures of a remote procedure call, whatever layer produced them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// The service answered with its failure tag.
    #[error("{method} rejected: {message}")]
    Rejected { method: String, message: String },

    #[error("Transport failure calling {method}: {reason}")]
    Transport { method: String, reason: String },

    #[error("Could not decode {method} reply: {reason}")]
    Decode { method: String, reason: String },

    #[error("Method {method} is not part of the {interface} interface")]
    UnknownMethod { interface: String, method: String },

    #[error("Root key for {host} has not been fetched; refusing to call {method}")]
    UntrustedRootKey { host: String, method: String },
}

impl RemoteError {
    /// The message shown to the user in the response area.
    pub fn user_message(&self) -> String {
        match self {
            RemoteError::Rejected { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Session bootstrap failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("No authentication provider is available")]
    NoProviderAvailable,

    #[error("Login with {provider} was rejected: {reason}")]
    LoginRejected {
        provider: ProviderKind,
        reason: String,
    },

    #[error("Credential store error for {provider}: {reason}")]
    CredentialStore {
        provider: ProviderKind,
        reason: String,
    },

    #[error("Failed to fetch root key from {host}: {reason}")]
    RootKeyFetch { host: String, reason: String },

    #[error("Failed to construct proxy for {service}: {reason}")]
    ProxyConstruction { service: String, reason: String },

    #[error("A session is already established")]
    SessionAlreadyEstablished,
}

/// Master error type for all Wakili errors.
#[derive(Debug, Clone, Error)]
pub enum WakiliError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),
}

/// Result type alias for Wakili operations.
pub type WakiliResult<T> = Result<T, WakiliError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_user_message_is_the_raw_message() {
        let err = RemoteError::Rejected {
            method: "generate_legal_advice".to_string(),
            message: "OpenAI proxy error: HTTP error: status 500".to_string(),
        };
        assert_eq!(err.user_message(), "OpenAI proxy error: HTTP error: status 500");
    }

    #[test]
    fn transport_user_message_names_the_method() {
        let err = RemoteError::Transport {
            method: "get_user_profile".to_string(),
            reason: "connection refused".to_string(),
        };
        let msg = err.user_message();
        assert!(msg.contains("get_user_profile"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn wakili_error_wraps_validation() {
        let err: WakiliError = ValidationError::missing("prompt").into();
        assert_eq!(
            err.to_string(),
            "Validation error: Required field missing: prompt"
        );
    }

    #[test]
    fn login_rejected_display() {
        let err = AuthError::LoginRejected {
            provider: ProviderKind::Wallet,
            reason: "user declined".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Login with wallet was rejected: user declined"
        );
    }
}
