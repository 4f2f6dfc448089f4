//! Network agent: signs calls with the session identity and hands them to a
//! transport.

use crate::config::Network;
use async_trait::async_trait;
use ic_agent::export::Principal as CanisterId;
use ic_agent::identity::{BasicIdentity, DelegatedIdentity, Secp256k1Identity, SignedDelegation};
use secrecy::ExposeSecret;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use wakili_core::{Identity, Principal, RemoteError};

const STATUS_METHOD: &str = "status";

/// How a remote method is executed by the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallMode {
    /// Read-only, answered by a single replica.
    Query,
    /// State-changing, goes through consensus.
    Update,
}

/// One signed remote invocation.
#[derive(Debug)]
pub struct Call<'a> {
    pub canister_id: &'a str,
    pub method: &'a str,
    pub mode: CallMode,
    pub identity: &'a Identity,
    /// Candid-encoded argument tuple.
    pub arg: Vec<u8>,
}

/// Moves calls to the network and back.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch the network's root verification key.
    async fn fetch_root_key(&self) -> Result<Vec<u8>, RemoteError>;

    /// Submit a call and return the Candid-encoded reply.
    async fn submit(&self, call: &Call<'_>) -> Result<Vec<u8>, RemoteError>;
}

/// An agent bound to one identity and one network host.
pub struct Agent {
    transport: Arc<dyn Transport>,
    identity: Arc<Identity>,
    host: String,
    requires_root_key: bool,
    root_key: Option<Vec<u8>>,
}

impl Agent {
    pub fn new(
        transport: Arc<dyn Transport>,
        identity: Arc<Identity>,
        host: impl Into<String>,
        network: Network,
    ) -> Self {
        Self {
            transport,
            identity,
            host: host.into(),
            requires_root_key: network.should_fetch_root_key(),
            root_key: None,
        }
    }

    /// Fetch and trust the network root key. Only valid off production.
    pub async fn fetch_root_key(&mut self) -> Result<(), RemoteError> {
        let key = self.transport.fetch_root_key().await?;
        tracing::info!(host = %self.host, key_len = key.len(), "trusted network root key");
        self.root_key = Some(key);
        Ok(())
    }

    pub fn root_key(&self) -> Option<&[u8]> {
        self.root_key.as_deref()
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Invoke `method` on `canister_id` with a Candid-encoded argument.
    ///
    /// Off production the call is refused until the root key is trusted.
    pub async fn call(
        &self,
        canister_id: &str,
        method: &str,
        mode: CallMode,
        arg: Vec<u8>,
    ) -> Result<Vec<u8>, RemoteError> {
        if self.requires_root_key && self.root_key.is_none() {
            return Err(RemoteError::UntrustedRootKey {
                host: self.host.clone(),
                method: method.to_string(),
            });
        }
        tracing::debug!(canister_id, method, mode = ?mode, "remote call");
        let call = Call {
            canister_id,
            method,
            mode,
            identity: &self.identity,
            arg,
        };
        let result = self.transport.submit(&call).await;
        if let Err(err) = &result {
            tracing::warn!(canister_id, method, error = %err, "remote call failed");
        }
        result
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("host", &self.host)
            .field("principal", self.identity.principal())
            .field("requires_root_key", &self.requires_root_key)
            .field("root_key_trusted", &self.root_key.is_some())
            .finish()
    }
}

// ============================================================================
// IC TRANSPORT
// ============================================================================

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn transport_error(method: &str, reason: impl ToString) -> RemoteError {
    RemoteError::Transport {
        method: method.to_string(),
        reason: reason.to_string(),
    }
}

/// Transport over the replica HTTP interface, using `ic-agent` for request
/// envelopes, signatures and certificate checks.
///
/// One `ic_agent::Agent` is built per signing principal and reused.
pub struct IcTransport {
    url: String,
    timeout: Duration,
    root_key: Mutex<Option<Vec<u8>>>,
    agents: Mutex<HashMap<Principal, ic_agent::Agent>>,
}

impl IcTransport {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
            root_key: Mutex::new(None),
            agents: Mutex::new(HashMap::new()),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn build_agent(
        &self,
        method: &str,
        signer: Option<Box<dyn ic_agent::Identity>>,
    ) -> Result<ic_agent::Agent, RemoteError> {
        let builder = ic_agent::Agent::builder().with_url(self.url.clone());
        let builder = match signer {
            Some(signer) => builder.with_boxed_identity(signer),
            None => builder,
        };
        let agent = builder.build().map_err(|e| transport_error(method, e))?;
        if let Some(key) = lock(&self.root_key).clone() {
            agent.set_root_key(key);
        }
        Ok(agent)
    }

    fn agent_for(&self, identity: &Identity, method: &str) -> Result<ic_agent::Agent, RemoteError> {
        if let Some(agent) = lock(&self.agents).get(identity.principal()) {
            return Ok(agent.clone());
        }
        let agent = self.build_agent(method, Some(signer(identity, method)?))?;
        lock(&self.agents).insert(identity.principal().clone(), agent.clone());
        Ok(agent)
    }
}

/// Build the `ic-agent` signer for `identity`: its PEM key (Ed25519 or
/// secp256k1), wrapped in the delegation chain when it has one. The signer
/// must sign as the identity's principal.
fn signer(identity: &Identity, method: &str) -> Result<Box<dyn ic_agent::Identity>, RemoteError> {
    let pem = identity.signing_key().expose_secret().as_bytes();
    let key: Box<dyn ic_agent::Identity> = match BasicIdentity::from_pem(pem) {
        Ok(key) => Box::new(key),
        Err(_) => Box::new(
            Secp256k1Identity::from_pem(pem)
                .map_err(|e| transport_error(method, format!("unreadable signing key: {}", e)))?,
        ),
    };
    let signer: Box<dyn ic_agent::Identity> = match identity.delegation_chain() {
        Some(chain) => {
            let chain: Vec<SignedDelegation> = serde_json::from_str(chain)
                .map_err(|e| transport_error(method, format!("invalid delegation chain: {}", e)))?;
            Box::new(
                DelegatedIdentity::new(identity.public_key().to_vec(), key, chain).map_err(
                    |e| transport_error(method, format!("invalid delegation chain: {}", e)),
                )?,
            )
        }
        None => key,
    };
    let sender = signer
        .sender()
        .map_err(|e| transport_error(method, e))?;
    if sender.as_slice() != identity.principal().as_slice() {
        return Err(transport_error(
            method,
            format!("signing key does not belong to {}", identity.principal()),
        ));
    }
    Ok(signer)
}

#[async_trait]
impl Transport for IcTransport {
    async fn fetch_root_key(&self) -> Result<Vec<u8>, RemoteError> {
        let agent = self.build_agent(STATUS_METHOD, None)?;
        tokio::time::timeout(self.timeout, agent.fetch_root_key())
            .await
            .map_err(|_| transport_error(STATUS_METHOD, "timed out"))?
            .map_err(|e| transport_error(STATUS_METHOD, e))?;
        let key = agent.read_root_key();
        *lock(&self.root_key) = Some(key.clone());
        for cached in lock(&self.agents).values() {
            cached.set_root_key(key.clone());
        }
        Ok(key)
    }

    async fn submit(&self, call: &Call<'_>) -> Result<Vec<u8>, RemoteError> {
        let canister = CanisterId::from_text(call.canister_id)
            .map_err(|e| transport_error(call.method, format!("invalid canister id: {}", e)))?;
        let agent = self.agent_for(call.identity, call.method)?;
        let pending = async {
            match call.mode {
                CallMode::Query => {
                    agent
                        .query(&canister, call.method)
                        .with_arg(call.arg.clone())
                        .call()
                        .await
                }
                CallMode::Update => {
                    agent
                        .update(&canister, call.method)
                        .with_arg(call.arg.clone())
                        .call_and_wait()
                        .await
                }
            }
        };
        tokio::time::timeout(self.timeout, pending)
            .await
            .map_err(|_| transport_error(call.method, "timed out"))?
            .map_err(|e| transport_error(call.method, e))
    }
}

impl std::fmt::Debug for IcTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IcTransport")
            .field("url", &self.url)
            .field("timeout", &self.timeout)
            .field("root_key_trusted", &lock(&self.root_key).is_some())
            .finish_non_exhaustive()
    }
}
