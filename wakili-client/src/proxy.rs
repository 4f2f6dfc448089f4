//! Service proxies: typed, callable stand-ins for remote services.
//!
//! Each proxy binds an interface definition, a canister id and the session
//! agent. Proxy methods map 1:1 onto the remote methods.

use crate::agent::{Agent, CallMode};
use async_trait::async_trait;
use candid::utils::ArgumentEncoder;
use candid::{CandidType, Deserialize};
use std::sync::Arc;
use wakili_core::{
    AuthError, DeviceData, DocumentSummary, LegalRequest, LegalResponse, RemoteError, RemoteReply,
    UserProfile,
};

// ============================================================================
// INTERFACE DEFINITIONS
// ============================================================================

/// One exported method of a remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodDef {
    pub name: &'static str,
    pub mode: CallMode,
}

/// The exported surface of a remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interface {
    pub name: &'static str,
    pub methods: &'static [MethodDef],
}

impl Interface {
    pub fn method(&self, name: &str) -> Option<&MethodDef> {
        self.methods.iter().find(|m| m.name == name)
    }
}

pub const LEGAL_BACKEND: Interface = Interface {
    name: "wakili_backend",
    methods: &[
        MethodDef {
            name: "generate_legal_advice",
            mode: CallMode::Update,
        },
        MethodDef {
            name: "generate_legal_document",
            mode: CallMode::Update,
        },
        MethodDef {
            name: "get_user_profile",
            mode: CallMode::Query,
        },
        MethodDef {
            name: "get_user_documents",
            mode: CallMode::Query,
        },
        MethodDef {
            name: "get_document",
            mode: CallMode::Query,
        },
        MethodDef {
            name: "update_user_name",
            mode: CallMode::Update,
        },
    ],
};

pub const IDENTITY_REGISTRY: Interface = Interface {
    name: "internet_identity",
    methods: &[MethodDef {
        name: "lookup",
        mode: CallMode::Query,
    }],
};

// ============================================================================
// SERVICE TRAITS
// ============================================================================

/// The legal backend as seen by the mediator.
#[async_trait]
pub trait LegalBackend: Send + Sync {
    async fn generate_legal_advice(
        &self,
        request: &LegalRequest,
    ) -> Result<LegalResponse, RemoteError>;

    async fn generate_legal_document(
        &self,
        request: &LegalRequest,
    ) -> Result<LegalResponse, RemoteError>;

    async fn get_user_profile(&self) -> Result<UserProfile, RemoteError>;

    async fn get_user_documents(&self) -> Result<Vec<DocumentSummary>, RemoteError>;

    async fn get_document(&self, id: &str) -> Result<String, RemoteError>;

    async fn update_user_name(&self, name: &str) -> Result<(), RemoteError>;
}

/// The identity registry that issued the session's delegation.
#[async_trait]
pub trait IdentityRegistry: Send + Sync {
    async fn lookup(&self, anchor: u64) -> Result<Vec<DeviceData>, RemoteError>;
}

// ============================================================================
// AGENT-BACKED PROXIES
// ============================================================================

/// Untyped binding of {interface, canister id, agent}.
#[derive(Debug, Clone)]
pub struct ServiceProxy {
    agent: Arc<Agent>,
    canister_id: String,
    interface: Interface,
}

impl ServiceProxy {
    pub fn canister_id(&self) -> &str {
        &self.canister_id
    }

    pub fn interface(&self) -> &Interface {
        &self.interface
    }

    /// Call a method of the bound interface with a Candid argument tuple and
    /// decode its single return value.
    pub async fn invoke<A, T>(&self, method: &str, args: A) -> Result<T, RemoteError>
    where
        A: ArgumentEncoder,
        T: CandidType + for<'de> Deserialize<'de>,
    {
        let def = self
            .interface
            .method(method)
            .ok_or_else(|| RemoteError::UnknownMethod {
                interface: self.interface.name.to_string(),
                method: method.to_string(),
            })?;
        let arg = candid::encode_args(args).map_err(|e| RemoteError::Decode {
            method: method.to_string(),
            reason: e.to_string(),
        })?;
        let reply = self
            .agent
            .call(&self.canister_id, def.name, def.mode, arg)
            .await?;
        decode(method, &reply)
    }

    /// Call a method whose reply is the `Ok`/`Err` variant, flattening it.
    pub async fn invoke_tagged<A, T>(&self, method: &str, args: A) -> Result<T, RemoteError>
    where
        A: ArgumentEncoder,
        T: CandidType + for<'de> Deserialize<'de>,
    {
        let reply: RemoteReply<T> = self.invoke(method, args).await?;
        reply.map_err(|message| RemoteError::Rejected {
            method: method.to_string(),
            message,
        })
    }
}

fn decode<T>(method: &str, bytes: &[u8]) -> Result<T, RemoteError>
where
    T: CandidType + for<'de> Deserialize<'de>,
{
    candid::decode_one(bytes).map_err(|e| RemoteError::Decode {
        method: method.to_string(),
        reason: e.to_string(),
    })
}

/// A device entry as the identity registry returns it.
#[derive(Debug, Clone, CandidType, Deserialize)]
pub struct DeviceRecord {
    pub alias: String,
    pub pubkey: Vec<u8>,
    pub credential_id: Option<Vec<u8>>,
}

impl From<DeviceRecord> for DeviceData {
    fn from(record: DeviceRecord) -> Self {
        DeviceData {
            alias: record.alias,
            pubkey: hex::encode(record.pubkey),
            credential_id: record.credential_id.map(hex::encode),
        }
    }
}

/// [`LegalBackend`] over the network.
#[derive(Debug, Clone)]
pub struct LegalBackendProxy {
    inner: ServiceProxy,
}

#[async_trait]
impl LegalBackend for LegalBackendProxy {
    async fn generate_legal_advice(
        &self,
        request: &LegalRequest,
    ) -> Result<LegalResponse, RemoteError> {
        self.inner
            .invoke_tagged("generate_legal_advice", (request,))
            .await
    }

    async fn generate_legal_document(
        &self,
        request: &LegalRequest,
    ) -> Result<LegalResponse, RemoteError> {
        self.inner
            .invoke_tagged("generate_legal_document", (request,))
            .await
    }

    async fn get_user_profile(&self) -> Result<UserProfile, RemoteError> {
        self.inner.invoke_tagged("get_user_profile", ()).await
    }

    async fn get_user_documents(&self) -> Result<Vec<DocumentSummary>, RemoteError> {
        let documents: Vec<(String, String)> =
            self.inner.invoke_tagged("get_user_documents", ()).await?;
        Ok(documents.into_iter().map(DocumentSummary::from).collect())
    }

    async fn get_document(&self, id: &str) -> Result<String, RemoteError> {
        self.inner.invoke_tagged("get_document", (id,)).await
    }

    async fn update_user_name(&self, name: &str) -> Result<(), RemoteError> {
        self.inner.invoke_tagged("update_user_name", (name,)).await
    }
}

/// [`IdentityRegistry`] over the network.
#[derive(Debug, Clone)]
pub struct IdentityRegistryProxy {
    inner: ServiceProxy,
}

#[async_trait]
impl IdentityRegistry for IdentityRegistryProxy {
    async fn lookup(&self, anchor: u64) -> Result<Vec<DeviceData>, RemoteError> {
        let devices: Vec<DeviceRecord> = self.inner.invoke("lookup", (anchor,)).await?;
        Ok(devices.into_iter().map(DeviceData::from).collect())
    }
}

// ============================================================================
// FACTORY
// ============================================================================

/// Builds proxies once the session agent exists.
#[derive(Debug, Clone)]
pub struct ProxyFactory {
    agent: Arc<Agent>,
}

impl ProxyFactory {
    pub fn new(agent: Arc<Agent>) -> Self {
        Self { agent }
    }

    pub fn bind(&self, interface: Interface, canister_id: &str) -> Result<ServiceProxy, AuthError> {
        let canister_id = canister_id.trim();
        if canister_id.is_empty()
            || !canister_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(AuthError::ProxyConstruction {
                service: interface.name.to_string(),
                reason: format!("invalid canister id '{}'", canister_id),
            });
        }
        tracing::debug!(service = interface.name, canister_id, "bound service proxy");
        Ok(ServiceProxy {
            agent: self.agent.clone(),
            canister_id: canister_id.to_string(),
            interface,
        })
    }

    pub fn legal_backend(&self, canister_id: &str) -> Result<LegalBackendProxy, AuthError> {
        Ok(LegalBackendProxy {
            inner: self.bind(LEGAL_BACKEND, canister_id)?,
        })
    }

    pub fn identity_registry(
        &self,
        canister_id: &str,
    ) -> Result<IdentityRegistryProxy, AuthError> {
        Ok(IdentityRegistryProxy {
            inner: self.bind(IDENTITY_REGISTRY, canister_id)?,
        })
    }
}
