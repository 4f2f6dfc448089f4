//! Wakili Test Utilities
//!
//! Shared test infrastructure for the Wakili workspace:
//! - Mock transport, backend, registry and auth providers
//! - Proptest generators for prompts, ids and keys
//! - Fixtures for sessions, configs and replies

pub use wakili_client::agent::{Call, CallMode, Transport};
pub use wakili_client::auth::{AuthProvider, LoginPrompt, StoredDelegation};
pub use wakili_client::page::{PageState, Surface, Trigger, TriggerState};
pub use wakili_client::proxy::{IdentityRegistry, LegalBackend};
pub use wakili_client::session::Session;
pub use wakili_core::{
    AuthError, DeviceData, DocumentSummary, Identity, LegalRequest, LegalResponse, Principal,
    ProviderKind, RemoteError, UserProfile,
};

use async_trait::async_trait;
use candid::{CandidType, Deserialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// MOCK TRANSPORT
// ============================================================================

/// A call as the transport saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub canister_id: String,
    pub method: String,
    pub mode: CallMode,
    pub sender: String,
    pub provider: ProviderKind,
    /// Candid-encoded argument tuple.
    pub arg: Vec<u8>,
}

impl RecordedCall {
    /// Decode the single argument of the call.
    pub fn decode_arg<T>(&self) -> T
    where
        T: CandidType + for<'de> Deserialize<'de>,
    {
        candid::decode_one(&self.arg).expect("argument decodes")
    }
}

/// In-memory [`Transport`] with scripted replies per method.
#[derive(Debug, Default)]
pub struct MockTransport {
    root_key: Mutex<Option<Result<Vec<u8>, RemoteError>>>,
    replies: Mutex<HashMap<String, Vec<u8>>>,
    calls: Mutex<Vec<RecordedCall>>,
    root_key_fetches: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root_key(self, key: Vec<u8>) -> Self {
        *lock(&self.root_key) = Some(Ok(key));
        self
    }

    pub fn with_root_key_error(self, reason: &str) -> Self {
        *lock(&self.root_key) = Some(Err(RemoteError::Transport {
            method: "status".to_string(),
            reason: reason.to_string(),
        }));
        self
    }

    /// Answer `method` with the Candid encoding of `reply`.
    pub fn with_reply<T: CandidType>(self, method: &str, reply: &T) -> Self {
        let bytes = candid::encode_one(reply).expect("reply encodes");
        lock(&self.replies).insert(method.to_string(), bytes);
        self
    }

    pub fn root_key_fetches(&self) -> usize {
        self.root_key_fetches.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn fetch_root_key(&self) -> Result<Vec<u8>, RemoteError> {
        self.root_key_fetches.fetch_add(1, Ordering::SeqCst);
        lock(&self.root_key)
            .clone()
            .unwrap_or_else(|| Ok(vec![0x30, 0x81, 0x82]))
    }

    async fn submit(&self, call: &Call<'_>) -> Result<Vec<u8>, RemoteError> {
        lock(&self.calls).push(RecordedCall {
            canister_id: call.canister_id.to_string(),
            method: call.method.to_string(),
            mode: call.mode,
            sender: call.identity.principal().to_text(),
            provider: call.identity.provider(),
            arg: call.arg.clone(),
        });
        lock(&self.replies)
            .get(call.method)
            .cloned()
            .ok_or_else(|| RemoteError::Transport {
                method: call.method.to_string(),
                reason: "no scripted reply".to_string(),
            })
    }
}

// ============================================================================
// MOCK BACKEND
// ============================================================================

type Observer = Arc<dyn Fn(&'static str) + Send + Sync>;

/// Scriptable [`LegalBackend`] that counts every call.
pub struct MockBackend {
    advice: Mutex<Result<LegalResponse, RemoteError>>,
    document: Mutex<Result<LegalResponse, RemoteError>>,
    profile: Mutex<Result<UserProfile, RemoteError>>,
    documents: Mutex<Result<Vec<DocumentSummary>, RemoteError>>,
    stored: Mutex<HashMap<String, String>>,
    rename: Mutex<Result<(), RemoteError>>,
    requests: Mutex<Vec<LegalRequest>>,
    names: Mutex<Vec<String>>,
    counts: Mutex<HashMap<&'static str, usize>>,
    observer: Mutex<Option<Observer>>,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self {
            advice: Mutex::new(Ok(fixtures::advice_response("Consult a lawyer."))),
            document: Mutex::new(Ok(fixtures::document_response("AGREEMENT"))),
            profile: Mutex::new(Ok(fixtures::sample_profile())),
            documents: Mutex::new(Ok(Vec::new())),
            stored: Mutex::new(HashMap::new()),
            rename: Mutex::new(Ok(())),
            requests: Mutex::new(Vec::new()),
            names: Mutex::new(Vec::new()),
            counts: Mutex::new(HashMap::new()),
            observer: Mutex::new(None),
            gate: Mutex::new(None),
        }
    }
}

impl std::fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockBackend")
            .field("counts", &*lock(&self.counts))
            .finish_non_exhaustive()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_advice(self, reply: Result<LegalResponse, RemoteError>) -> Self {
        *lock(&self.advice) = reply;
        self
    }

    pub fn with_document(self, reply: Result<LegalResponse, RemoteError>) -> Self {
        *lock(&self.document) = reply;
        self
    }

    pub fn with_profile(self, reply: Result<UserProfile, RemoteError>) -> Self {
        *lock(&self.profile) = reply;
        self
    }

    pub fn with_documents(self, reply: Result<Vec<DocumentSummary>, RemoteError>) -> Self {
        *lock(&self.documents) = reply;
        self
    }

    pub fn with_stored_document(self, id: &str, content: &str) -> Self {
        lock(&self.stored).insert(id.to_string(), content.to_string());
        self
    }

    pub fn with_rename(self, reply: Result<(), RemoteError>) -> Self {
        *lock(&self.rename) = reply;
        self
    }

    /// Run `observer` with the method name at the start of every call.
    pub fn observe(&self, observer: impl Fn(&'static str) + Send + Sync + 'static) {
        *lock(&self.observer) = Some(Arc::new(observer));
    }

    /// Make advice and document calls wait until `gate` is notified.
    pub fn hold_on(&self, gate: Arc<Notify>) {
        *lock(&self.gate) = Some(gate);
    }

    pub fn count(&self, method: &str) -> usize {
        lock(&self.counts).get(method).copied().unwrap_or(0)
    }

    /// Total number of calls across all methods.
    pub fn total_calls(&self) -> usize {
        lock(&self.counts).values().sum()
    }

    pub fn requests(&self) -> Vec<LegalRequest> {
        lock(&self.requests).clone()
    }

    pub fn names(&self) -> Vec<String> {
        lock(&self.names).clone()
    }

    fn record(&self, method: &'static str) {
        *lock(&self.counts).entry(method).or_insert(0) += 1;
        let observer = lock(&self.observer).clone();
        if let Some(observer) = observer {
            observer(method);
        }
    }

    async fn wait_for_gate(&self) {
        let gate = lock(&self.gate).clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }
}

fn rejected(method: &str, message: &str) -> RemoteError {
    RemoteError::Rejected {
        method: method.to_string(),
        message: message.to_string(),
    }
}

#[async_trait]
impl LegalBackend for MockBackend {
    async fn generate_legal_advice(
        &self,
        request: &LegalRequest,
    ) -> Result<LegalResponse, RemoteError> {
        self.record("generate_legal_advice");
        lock(&self.requests).push(request.clone());
        self.wait_for_gate().await;
        lock(&self.advice).clone()
    }

    async fn generate_legal_document(
        &self,
        request: &LegalRequest,
    ) -> Result<LegalResponse, RemoteError> {
        self.record("generate_legal_document");
        lock(&self.requests).push(request.clone());
        self.wait_for_gate().await;
        lock(&self.document).clone()
    }

    async fn get_user_profile(&self) -> Result<UserProfile, RemoteError> {
        self.record("get_user_profile");
        lock(&self.profile).clone()
    }

    async fn get_user_documents(&self) -> Result<Vec<DocumentSummary>, RemoteError> {
        self.record("get_user_documents");
        lock(&self.documents).clone()
    }

    async fn get_document(&self, id: &str) -> Result<String, RemoteError> {
        self.record("get_document");
        lock(&self.stored)
            .get(id)
            .cloned()
            .ok_or_else(|| rejected("get_document", "Document not found"))
    }

    async fn update_user_name(&self, name: &str) -> Result<(), RemoteError> {
        self.record("update_user_name");
        lock(&self.names).push(name.to_string());
        lock(&self.rename).clone()
    }
}

// ============================================================================
// MOCK REGISTRY
// ============================================================================

#[derive(Debug, Default)]
pub struct MockRegistry {
    devices: HashMap<u64, Vec<DeviceData>>,
    lookups: AtomicUsize,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_devices(mut self, anchor: u64, devices: Vec<DeviceData>) -> Self {
        self.devices.insert(anchor, devices);
        self
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityRegistry for MockRegistry {
    async fn lookup(&self, anchor: u64) -> Result<Vec<DeviceData>, RemoteError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.devices.get(&anchor).cloned().unwrap_or_default())
    }
}

// ============================================================================
// MOCK AUTH
// ============================================================================

/// [`AuthProvider`] with fixed availability and a scripted login result.
#[derive(Debug)]
pub struct MockAuthProvider {
    kind: ProviderKind,
    available: bool,
    public_key: Vec<u8>,
    authenticated: bool,
    login_error: Option<AuthError>,
    logins: AtomicUsize,
    availability_checks: AtomicUsize,
}

impl MockAuthProvider {
    pub fn new(kind: ProviderKind, public_key: &[u8]) -> Self {
        Self {
            kind,
            available: true,
            public_key: public_key.to_vec(),
            authenticated: false,
            login_error: None,
            logins: AtomicUsize::new(0),
            availability_checks: AtomicUsize::new(0),
        }
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn authenticated(mut self) -> Self {
        self.authenticated = true;
        self
    }

    pub fn failing_login(mut self, err: AuthError) -> Self {
        self.login_error = Some(err);
        self
    }

    /// The principal this provider's identities carry.
    pub fn principal(&self) -> Principal {
        Principal::self_authenticating(&self.public_key)
    }

    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn availability_checks(&self) -> usize {
        self.availability_checks.load(Ordering::SeqCst)
    }

    fn identity(&self) -> Identity {
        Identity::new(self.kind, &self.public_key, format!("{}-signing-key", self.kind))
    }
}

#[async_trait]
impl AuthProvider for MockAuthProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn is_available(&self) -> bool {
        self.availability_checks.fetch_add(1, Ordering::SeqCst);
        self.available
    }

    async fn current_identity(&self) -> Result<Option<Identity>, AuthError> {
        Ok(self.authenticated.then(|| self.identity()))
    }

    async fn login(&self, _prompt: &dyn LoginPrompt) -> Result<Identity, AuthError> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        match &self.login_error {
            Some(err) => Err(err.clone()),
            None => Ok(self.identity()),
        }
    }
}

/// [`LoginPrompt`] with canned answers.
#[derive(Debug, Clone, Default)]
pub struct ScriptedLoginPrompt {
    pub approve_wallet: bool,
    pub delegation: Option<StoredDelegation>,
}

impl ScriptedLoginPrompt {
    pub fn approving() -> Self {
        Self {
            approve_wallet: true,
            delegation: None,
        }
    }

    pub fn with_delegation(delegation: StoredDelegation) -> Self {
        Self {
            approve_wallet: false,
            delegation: Some(delegation),
        }
    }
}

#[async_trait]
impl LoginPrompt for ScriptedLoginPrompt {
    async fn confirm_wallet(&self, _wallet: &str) -> Result<bool, AuthError> {
        Ok(self.approve_wallet)
    }

    async fn obtain_delegation(&self, _provider_url: &str) -> Result<StoredDelegation, AuthError> {
        self.delegation
            .clone()
            .ok_or_else(|| AuthError::LoginRejected {
                provider: ProviderKind::DelegatedIdentity,
                reason: "login window closed".to_string(),
            })
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Wakili inputs.

    use proptest::prelude::*;

    /// A prompt with at least one non-whitespace character.
    pub fn arb_prompt() -> impl Strategy<Value = String> {
        "[ \\t]{0,3}[A-Za-z0-9?.,'][A-Za-z0-9?.,' ]{0,80}"
    }

    /// Input that trims to nothing.
    pub fn arb_blank() -> impl Strategy<Value = String> {
        "[ \\t\\n\\r]{0,8}"
    }

    /// A document type label without the id separator.
    pub fn arb_document_label() -> impl Strategy<Value = String> {
        "[A-Z][A-Za-z]{0,20}"
    }

    /// A well-formed `kind_label_nanos` document id and its parts.
    pub fn arb_document_id() -> impl Strategy<Value = (String, String, u64)> {
        (
            prop_oneof![Just("advice"), Just("document")],
            arb_document_label(),
            0u64..=i64::MAX as u64,
        )
            .prop_map(|(kind, label, nanos)| {
                (format!("{}_{}_{}", kind, label, nanos), label, nanos)
            })
    }

    pub fn arb_public_key() -> impl Strategy<Value = Vec<u8>> {
        prop::collection::vec(any::<u8>(), 1..96)
    }

    /// Document content of any length, including multibyte characters.
    pub fn arb_content() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9 éü§\\n]{0,250}"
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built values for common scenarios.

    use super::*;
    use wakili_client::config::{ClientConfig, Network};

    /// 2023-11-14T22:13:20Z in nanoseconds.
    pub const NOV_14_2023_NS: u64 = 1_700_000_000_000_000_000;

    pub const TEST_PUBLIC_KEY: &[u8] = b"wakili-test-public-key";

    pub fn test_identity(kind: ProviderKind) -> Identity {
        Identity::new(kind, TEST_PUBLIC_KEY, "test-signing-key")
    }

    pub fn sample_profile() -> UserProfile {
        UserProfile {
            name: Some("Amina".to_string()),
            document_count: 3,
            last_active: NOV_14_2023_NS,
        }
    }

    pub fn advice_response(text: &str) -> LegalResponse {
        LegalResponse {
            response: text.to_string(),
            document: None,
            status: "success".to_string(),
            request_id: Some("req-1".to_string()),
        }
    }

    pub fn document_response(document: &str) -> LegalResponse {
        LegalResponse {
            response: "Document generated".to_string(),
            document: Some(document.to_string()),
            status: "success".to_string(),
            request_id: Some("req-2".to_string()),
        }
    }

    pub fn delegation(public_key: &[u8], expiration_ns: u64) -> StoredDelegation {
        StoredDelegation {
            public_key: hex::encode(public_key),
            session_key: "session-signing-key".to_string(),
            delegations: serde_json::json!([]),
            expiration_ns,
        }
    }

    /// A session over mocks, bypassing the bootstrapper.
    pub fn session(backend: Arc<MockBackend>) -> Session {
        Session::new(
            Arc::new(test_identity(ProviderKind::DelegatedIdentity)),
            backend,
            Arc::new(MockRegistry::new()),
        )
    }

    pub fn config(network: Network) -> ClientConfig {
        ClientConfig {
            backend_canister_id: "uxrrr-q7777-77774-qaaaq-cai".to_string(),
            identity_canister_id: "rdmx6-jaaaa-aaaaa-aaadq-cai".to_string(),
            network,
            host: None,
            identity_provider_url: None,
            request_timeout_ms: 30_000,
            download_dir: "downloads".into(),
            delegation_path: "delegation.json".into(),
            wallet_path: None,
            log_filter: None,
        }
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Checks over recorded page state.

    use super::*;

    /// Assert that `trigger` went busy exactly once and ended idle.
    #[track_caller]
    pub fn assert_busy_cycle(page: &PageState, trigger: Trigger) {
        let snapshot = page.snapshot();
        let states: Vec<&TriggerState> = snapshot
            .trigger_history
            .iter()
            .filter(|(t, _)| *t == trigger)
            .map(|(_, s)| s)
            .collect();
        assert_eq!(states.len(), 2, "expected busy then idle for {}: {:?}", trigger, states);
        assert!(states[0].is_busy(), "first state of {} should be busy", trigger);
        assert_eq!(*states[1], TriggerState::Idle);
        assert_eq!(snapshot.trigger(trigger), TriggerState::Idle);
    }

    /// Assert that `trigger` never changed state.
    #[track_caller]
    pub fn assert_never_busy(page: &PageState, trigger: Trigger) {
        let snapshot = page.snapshot();
        assert!(
            snapshot.trigger_history.iter().all(|(t, _)| *t != trigger),
            "{} should not have changed state",
            trigger
        );
    }
}
