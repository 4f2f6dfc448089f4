//! Session bootstrap: pick a provider, establish an identity, bind the agent
//! and build the service proxies.

use crate::agent::{Agent, Transport};
use crate::auth::{AuthProvider, DelegatedIdentityProvider, LoginPrompt, WalletProvider};
use crate::config::{ClientConfig, Network};
use crate::notifications::{Notification, NotificationAction, NotificationLevel};
use crate::page::{Surface, Trigger, TriggerState};
use crate::proxy::{IdentityRegistry, LegalBackend, ProxyFactory};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use wakili_core::{AuthError, Identity, Principal, ProviderKind};

/// The authenticated identity and the proxies bound to it.
///
/// Only the [`Bootstrapper`] creates sessions from live providers, so a proxy
/// never exists before its identity does.
#[derive(Clone)]
pub struct Session {
    identity: Arc<Identity>,
    backend: Arc<dyn LegalBackend>,
    registry: Arc<dyn IdentityRegistry>,
}

impl Session {
    /// Assemble a session from already-built parts.
    pub fn new(
        identity: Arc<Identity>,
        backend: Arc<dyn LegalBackend>,
        registry: Arc<dyn IdentityRegistry>,
    ) -> Self {
        Self {
            identity,
            backend,
            registry,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn principal(&self) -> &Principal {
        self.identity.principal()
    }

    pub fn backend(&self) -> &Arc<dyn LegalBackend> {
        &self.backend
    }

    pub fn registry(&self) -> &Arc<dyn IdentityRegistry> {
        &self.registry
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("principal", self.identity.principal())
            .field("provider", &self.identity.provider())
            .finish_non_exhaustive()
    }
}

/// Outcome of [`Bootstrapper::start`].
#[derive(Debug)]
pub enum BootstrapState {
    /// The chosen provider was already authenticated.
    Ready(Session),
    /// The login trigger is exposed; call [`Bootstrapper::login`].
    AwaitingLogin { provider: ProviderKind },
}

pub struct Bootstrapper {
    providers: Vec<Arc<dyn AuthProvider>>,
    transport: Arc<dyn Transport>,
    network: Network,
    host: String,
    backend_canister_id: String,
    identity_canister_id: String,
    established: AtomicBool,
}

impl Bootstrapper {
    pub fn new(
        transport: Arc<dyn Transport>,
        network: Network,
        host: impl Into<String>,
        backend_canister_id: impl Into<String>,
        identity_canister_id: impl Into<String>,
    ) -> Self {
        Self {
            providers: Vec::new(),
            transport,
            network,
            host: host.into(),
            backend_canister_id: backend_canister_id.into(),
            identity_canister_id: identity_canister_id.into(),
            established: AtomicBool::new(false),
        }
    }

    /// Build a bootstrapper with the providers the configuration enables,
    /// wallet first.
    pub fn from_config(config: &ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let mut bootstrapper = Self::new(
            transport,
            config.network,
            config.host(),
            config.backend_canister_id.clone(),
            config.identity_canister_id.clone(),
        );
        if let Some(wallet_path) = &config.wallet_path {
            bootstrapper = bootstrapper.with_provider(Arc::new(WalletProvider::new(wallet_path)));
        }
        bootstrapper.with_provider(Arc::new(DelegatedIdentityProvider::new(
            config.identity_provider_url(),
            config.delegation_path.clone(),
        )))
    }

    /// Append a provider. Providers are tried in insertion order.
    pub fn with_provider(mut self, provider: Arc<dyn AuthProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn is_established(&self) -> bool {
        self.established.load(Ordering::SeqCst)
    }

    async fn select_provider(&self) -> Result<Arc<dyn AuthProvider>, AuthError> {
        for provider in &self.providers {
            if provider.is_available().await {
                tracing::debug!(provider = %provider.kind(), "selected auth provider");
                return Ok(provider.clone());
            }
        }
        Err(AuthError::NoProviderAvailable)
    }

    /// Detect a provider and resume its session if it has one.
    ///
    /// Once a session exists this fails without touching the view.
    pub async fn start(&self, surface: &dyn Surface) -> Result<BootstrapState, AuthError> {
        if self.is_established() {
            return Err(self.fail(surface, AuthError::SessionAlreadyEstablished));
        }
        surface.show_pre_auth();
        surface.set_trigger(Trigger::Login, TriggerState::Idle);
        let result = async {
            let provider = self.select_provider().await?;
            match provider.current_identity().await? {
                Some(identity) => self.proceed(identity, surface).await.map(BootstrapState::Ready),
                None => Ok(BootstrapState::AwaitingLogin {
                    provider: provider.kind(),
                }),
            }
        }
        .await;
        result.map_err(|err| self.fail(surface, err))
    }

    /// Run the interactive login of the selected provider, then proceed.
    pub async fn login(
        &self,
        surface: &dyn Surface,
        prompt: &dyn LoginPrompt,
    ) -> Result<Session, AuthError> {
        if self.is_established() {
            return Err(self.fail(surface, AuthError::SessionAlreadyEstablished));
        }
        surface.set_trigger(
            Trigger::Login,
            TriggerState::Busy {
                label: "Logging in...".to_string(),
            },
        );
        let result = async {
            let provider = self.select_provider().await?;
            let identity = provider.login(prompt).await?;
            self.proceed(identity, surface).await
        }
        .await;
        surface.set_trigger(Trigger::Login, TriggerState::Idle);
        result.map_err(|err| self.fail(surface, err))
    }

    async fn proceed(&self, identity: Identity, surface: &dyn Surface) -> Result<Session, AuthError> {
        if self.is_established() {
            return Err(AuthError::SessionAlreadyEstablished);
        }
        let identity = Arc::new(identity);
        tracing::info!(
            principal = %identity.principal(),
            provider = %identity.provider(),
            "authenticated"
        );
        surface.show_authenticated(identity.principal());

        let mut agent = Agent::new(
            self.transport.clone(),
            identity.clone(),
            self.host.clone(),
            self.network,
        );
        if self.network.should_fetch_root_key() {
            agent
                .fetch_root_key()
                .await
                .map_err(|e| AuthError::RootKeyFetch {
                    host: self.host.clone(),
                    reason: e.to_string(),
                })?;
        }

        let factory = ProxyFactory::new(Arc::new(agent));
        let backend = factory.legal_backend(&self.backend_canister_id)?;
        let registry = factory.identity_registry(&self.identity_canister_id)?;

        if self
            .established
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(AuthError::SessionAlreadyEstablished);
        }
        Ok(Session::new(identity, Arc::new(backend), Arc::new(registry)))
    }

    fn fail(&self, surface: &dyn Surface, err: AuthError) -> AuthError {
        tracing::error!(error = %err, "session bootstrap failed");
        if !matches!(err, AuthError::SessionAlreadyEstablished) {
            surface.show_pre_auth();
        }
        surface.notify(
            Notification::new(NotificationLevel::Error, format!("Login failed: {}", err))
                .with_action(NotificationAction::Retry),
        );
        err
    }
}

impl std::fmt::Debug for Bootstrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bootstrapper")
            .field(
                "providers",
                &self.providers.iter().map(|p| p.kind()).collect::<Vec<_>>(),
            )
            .field("network", &self.network)
            .field("host", &self.host)
            .field("backend_canister_id", &self.backend_canister_id)
            .field("identity_canister_id", &self.identity_canister_id)
            .finish()
    }
}
