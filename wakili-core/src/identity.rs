//! Identity types for authenticated Wakili sessions

use crate::error::ValidationError;
use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha224};
use std::fmt;
use std::str::FromStr;

/// Tag byte appended to a key digest for self-authenticating principals.
const SELF_AUTHENTICATING_TAG: u8 = 0x02;

/// The single byte identifying the anonymous principal.
const ANONYMOUS_TAG: u8 = 0x04;

/// Characters per group in the textual principal form.
const TEXT_GROUP_LEN: usize = 5;

/// Opaque identifier of an authenticated user.
///
/// Derived from the user's signing key, so two sessions backed by the same
/// key always resolve to the same principal.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Principal(Vec<u8>);

impl Principal {
    /// Derive the principal owned by `public_key`.
    pub fn self_authenticating(public_key: &[u8]) -> Self {
        let mut bytes = Sha224::digest(public_key).to_vec();
        bytes.push(SELF_AUTHENTICATING_TAG);
        Self(bytes)
    }

    pub fn anonymous() -> Self {
        Self(vec![ANONYMOUS_TAG])
    }

    pub fn is_anonymous(&self) -> bool {
        self.0 == [ANONYMOUS_TAG]
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Lowercase hex grouped in fives, joined by `-`.
    pub fn to_text(&self) -> String {
        let encoded = hex::encode(&self.0);
        encoded
            .as_bytes()
            .chunks(TEXT_GROUP_LEN)
            .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
            .collect::<Vec<_>>()
            .join("-")
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Principal({})", self.to_text())
    }
}

impl FromStr for Principal {
    type Err = ValidationError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let compact: String = text.chars().filter(|c| *c != '-').collect();
        let bytes = hex::decode(&compact).map_err(|e| ValidationError::InvalidValue {
            field: "principal".to_string(),
            reason: e.to_string(),
        })?;
        if bytes.is_empty() {
            return Err(ValidationError::missing("principal"));
        }
        let principal = Principal(bytes);
        if principal.to_text() != text.to_ascii_lowercase() {
            return Err(ValidationError::InvalidValue {
                field: "principal".to_string(),
                reason: "not in canonical grouped form".to_string(),
            });
        }
        Ok(principal)
    }
}

impl Serialize for Principal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_text())
    }
}

impl<'de> Deserialize<'de> for Principal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Which authentication provider produced an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Locally injected wallet. Tried first.
    Wallet,
    /// Hosted delegated-identity provider.
    DelegatedIdentity,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Wallet => f.write_str("wallet"),
            ProviderKind::DelegatedIdentity => f.write_str("delegated identity"),
        }
    }
}

/// An authenticated principal together with the key material used to sign
/// calls on its behalf. Immutable once created.
#[derive(Debug)]
pub struct Identity {
    principal: Principal,
    public_key: Vec<u8>,
    provider: ProviderKind,
    /// PEM-encoded signing key.
    signing_key: SecretString,
    /// Signed delegation chain (JSON) from `public_key` to `signing_key`.
    delegation_chain: Option<String>,
    expires_at_ns: Option<u64>,
}

impl Identity {
    /// An identity for `public_key` (DER) that signs with `signing_key`.
    pub fn new(provider: ProviderKind, public_key: &[u8], signing_key: impl Into<String>) -> Self {
        Self {
            principal: Principal::self_authenticating(public_key),
            public_key: public_key.to_vec(),
            provider,
            signing_key: SecretString::from(signing_key.into()),
            delegation_chain: None,
            expires_at_ns: None,
        }
    }

    /// Sign through a delegation: `signing_key` is a session key that
    /// `public_key` delegated to via `chain`.
    pub fn with_delegation(mut self, chain: impl Into<String>) -> Self {
        self.delegation_chain = Some(chain.into());
        self
    }

    pub fn with_expiry(mut self, expires_at_ns: u64) -> Self {
        self.expires_at_ns = Some(expires_at_ns);
        self
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    pub fn signing_key(&self) -> &SecretString {
        &self.signing_key
    }

    pub fn delegation_chain(&self) -> Option<&str> {
        self.delegation_chain.as_deref()
    }

    pub fn expires_at_ns(&self) -> Option<u64> {
        self.expires_at_ns
    }

    pub fn is_expired_at(&self, now_ns: u64) -> bool {
        self.expires_at_ns.is_some_and(|expiry| expiry <= now_ns)
    }
}
