//! Authentication providers.
//!
//! Two providers are supported, tried in this order by the bootstrapper:
//! a locally injected wallet and a hosted delegated-identity provider. Both
//! keep their credentials in small JSON files.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use wakili_core::{AuthError, Identity, ProviderKind};

fn default_wallet_name() -> String {
    "wallet".to_string()
}

/// Current time in nanoseconds since the Unix epoch.
pub fn now_ns() -> u64 {
    chrono::Utc::now()
        .timestamp_nanos_opt()
        .and_then(|n| u64::try_from(n).ok())
        .unwrap_or(0)
}

// ============================================================================
// CREDENTIAL FILES
// ============================================================================

/// Contents of the injected wallet file.
#[derive(Clone, Serialize, Deserialize)]
pub struct WalletFile {
    #[serde(default = "default_wallet_name")]
    pub name: String,
    /// Hex-encoded DER public key.
    pub public_key: String,
    /// PEM-encoded signing key for `public_key`.
    pub secret_key: String,
    /// Whether the user already approved this application.
    #[serde(default)]
    pub connected: bool,
}

impl fmt::Debug for WalletFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletFile")
            .field("name", &self.name)
            .field("public_key", &self.public_key)
            .field("connected", &self.connected)
            .finish_non_exhaustive()
    }
}

/// A delegation issued by the identity provider.
#[derive(Clone, Serialize, Deserialize)]
pub struct StoredDelegation {
    /// Hex-encoded DER public key of the user's identity anchor.
    pub public_key: String,
    /// PEM-encoded session key the delegation was issued to.
    pub session_key: String,
    /// Signed delegation chain from `public_key` to `session_key`.
    pub delegations: serde_json::Value,
    pub expiration_ns: u64,
}

impl StoredDelegation {
    pub fn is_expired_at(&self, now_ns: u64) -> bool {
        self.expiration_ns <= now_ns
    }
}

impl fmt::Debug for StoredDelegation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredDelegation")
            .field("public_key", &self.public_key)
            .field("expiration_ns", &self.expiration_ns)
            .finish_non_exhaustive()
    }
}

fn decode_public_key(provider: ProviderKind, hex_key: &str) -> Result<Vec<u8>, AuthError> {
    let key = hex::decode(hex_key.trim()).map_err(|e| AuthError::CredentialStore {
        provider,
        reason: format!("public key is not hex: {}", e),
    })?;
    if key.is_empty() {
        return Err(AuthError::CredentialStore {
            provider,
            reason: "public key is empty".to_string(),
        });
    }
    Ok(key)
}

async fn read_json<T: serde::de::DeserializeOwned>(
    provider: ProviderKind,
    path: &Path,
) -> Result<Option<T>, AuthError> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(AuthError::CredentialStore {
                provider,
                reason: format!("{}: {}", path.display(), err),
            })
        }
    };
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|e| AuthError::CredentialStore {
            provider,
            reason: format!("{}: {}", path.display(), e),
        })
}

async fn write_json<T: Serialize>(
    provider: ProviderKind,
    path: &Path,
    value: &T,
) -> Result<(), AuthError> {
    let store_error = |reason: String| AuthError::CredentialStore { provider, reason };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| store_error(format!("{}: {}", parent.display(), e)))?;
    }
    let contents = serde_json::to_string_pretty(value).map_err(|e| store_error(e.to_string()))?;
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| store_error(format!("{}: {}", path.display(), e)))
}

// ============================================================================
// TRAITS
// ============================================================================

/// Interactive half of a login: whatever talks to the user.
#[async_trait]
pub trait LoginPrompt: Send + Sync {
    /// Ask the user to approve connecting `wallet` to this application.
    async fn confirm_wallet(&self, wallet: &str) -> Result<bool, AuthError>;

    /// Send the user to `provider_url` and return the delegation it issues.
    async fn obtain_delegation(&self, provider_url: &str) -> Result<StoredDelegation, AuthError>;
}

/// A source of authenticated identities.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Whether this provider can be used at all on this machine.
    async fn is_available(&self) -> bool;

    /// The identity of an existing authenticated session, if there is one.
    async fn current_identity(&self) -> Result<Option<Identity>, AuthError>;

    /// Run the interactive login flow.
    async fn login(&self, prompt: &dyn LoginPrompt) -> Result<Identity, AuthError>;
}

// ============================================================================
// WALLET
// ============================================================================

/// Locally injected wallet. Available when its file exists.
#[derive(Debug, Clone)]
pub struct WalletProvider {
    path: PathBuf,
}

impl WalletProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read(&self) -> Result<WalletFile, AuthError> {
        read_json(ProviderKind::Wallet, &self.path)
            .await?
            .ok_or_else(|| AuthError::CredentialStore {
                provider: ProviderKind::Wallet,
                reason: format!("{} does not exist", self.path.display()),
            })
    }

    fn identity(wallet: &WalletFile) -> Result<Identity, AuthError> {
        let key = decode_public_key(ProviderKind::Wallet, &wallet.public_key)?;
        Ok(Identity::new(ProviderKind::Wallet, &key, wallet.secret_key.clone()))
    }
}

#[async_trait]
impl AuthProvider for WalletProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Wallet
    }

    async fn is_available(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }

    async fn current_identity(&self) -> Result<Option<Identity>, AuthError> {
        let wallet = self.read().await?;
        if !wallet.connected {
            return Ok(None);
        }
        Self::identity(&wallet).map(Some)
    }

    async fn login(&self, prompt: &dyn LoginPrompt) -> Result<Identity, AuthError> {
        let mut wallet = self.read().await?;
        if !prompt.confirm_wallet(&wallet.name).await? {
            return Err(AuthError::LoginRejected {
                provider: ProviderKind::Wallet,
                reason: "connection declined".to_string(),
            });
        }
        let identity = Self::identity(&wallet)?;
        wallet.connected = true;
        write_json(ProviderKind::Wallet, &self.path, &wallet).await?;
        tracing::info!(wallet = %wallet.name, "wallet connected");
        Ok(identity)
    }
}

// ============================================================================
// DELEGATED IDENTITY
// ============================================================================

/// Hosted delegated-identity provider. Always available; the delegation it
/// issues is cached on disk until it expires.
#[derive(Debug, Clone)]
pub struct DelegatedIdentityProvider {
    provider_url: String,
    store_path: PathBuf,
}

impl DelegatedIdentityProvider {
    pub fn new(provider_url: impl Into<String>, store_path: impl Into<PathBuf>) -> Self {
        Self {
            provider_url: provider_url.into(),
            store_path: store_path.into(),
        }
    }

    pub fn provider_url(&self) -> &str {
        &self.provider_url
    }

    fn identity(delegation: &StoredDelegation) -> Result<Identity, AuthError> {
        let key = decode_public_key(ProviderKind::DelegatedIdentity, &delegation.public_key)?;
        Ok(Identity::new(
            ProviderKind::DelegatedIdentity,
            &key,
            delegation.session_key.clone(),
        )
        .with_delegation(delegation.delegations.to_string())
        .with_expiry(delegation.expiration_ns))
    }
}

#[async_trait]
impl AuthProvider for DelegatedIdentityProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::DelegatedIdentity
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn current_identity(&self) -> Result<Option<Identity>, AuthError> {
        let stored: Option<StoredDelegation> =
            read_json(ProviderKind::DelegatedIdentity, &self.store_path).await?;
        match stored {
            Some(delegation) if !delegation.is_expired_at(now_ns()) => {
                Self::identity(&delegation).map(Some)
            }
            Some(_) => {
                tracing::info!("stored delegation expired");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn login(&self, prompt: &dyn LoginPrompt) -> Result<Identity, AuthError> {
        let delegation = prompt.obtain_delegation(&self.provider_url).await?;
        if delegation.is_expired_at(now_ns()) {
            return Err(AuthError::LoginRejected {
                provider: ProviderKind::DelegatedIdentity,
                reason: "issued delegation is already expired".to_string(),
            });
        }
        let identity = Self::identity(&delegation)?;
        write_json(ProviderKind::DelegatedIdentity, &self.store_path, &delegation).await?;
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wallet_debug_hides_secret_key() {
        let wallet = WalletFile {
            name: "plug".to_string(),
            public_key: "abcd".to_string(),
            secret_key: "wallet-secret".to_string(),
            connected: false,
        };
        assert!(!format!("{:?}", wallet).contains("wallet-secret"));
    }

    #[test]
    fn delegation_expiry() {
        let delegation = StoredDelegation {
            public_key: "abcd".to_string(),
            session_key: "session-secret".to_string(),
            delegations: serde_json::json!([]),
            expiration_ns: 10,
        };
        assert!(!format!("{:?}", delegation).contains("session-secret"));
        assert!(!delegation.is_expired_at(9));
        assert!(delegation.is_expired_at(10));
    }

    #[test]
    fn bad_public_key_rejected() {
        assert!(matches!(
            decode_public_key(ProviderKind::Wallet, "zz"),
            Err(AuthError::CredentialStore { .. })
        ));
        assert!(decode_public_key(ProviderKind::Wallet, "").is_err());
    }

    #[test]
    fn wallet_name_defaults() {
        let wallet: WalletFile =
            serde_json::from_str(r#"{"public_key":"ab","secret_key":"k"}"#).unwrap();
        assert_eq!(wallet.name, "wallet");
        assert!(!wallet.connected);
    }
}
