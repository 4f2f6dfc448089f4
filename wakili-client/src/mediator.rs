//! Command mediation.
//!
//! Every user-triggered action is described by one [`CommandSpec`] row and
//! run by [`Mediator::run`]: validate, mark the trigger busy, call the
//! backend, render the outcome, refresh dependent views, restore the trigger.

use crate::error::ClientError;
use crate::export;
use crate::notifications::Notification;
use crate::page::{Surface, Trigger, TriggerState};
use crate::proxy::LegalBackend;
use crate::session::Session;
use crate::views::{render_document_list, render_error, render_profile, render_response};
use chrono::NaiveDate;
use futures_util::future::{BoxFuture, FutureExt};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use wakili_core::{DocumentSummary, LegalRequest, LegalResponse, RemoteError, ValidationError};

/// The inputs a command reads from the page.
#[derive(Debug, Clone, Default)]
pub struct FormState {
    pub prompt: String,
    pub document_type: Option<String>,
    pub context: Option<String>,
    pub is_confidential: bool,
    pub name: String,
    pub document_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    GetAdvice,
    GenerateDocument,
    SaveDocument,
    UpdateName,
    ViewDocument,
}

/// What happened to one command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Local preconditions failed; nothing was sent.
    Rejected(ValidationError),
    /// The trigger was already busy.
    Ignored,
    Succeeded,
    Failed(RemoteError),
}

impl CommandOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CommandOutcome::Succeeded)
    }
}

// ============================================================================
// COMMAND TABLE
// ============================================================================

/// Validated input, ready to send.
#[derive(Debug, Clone)]
enum Payload {
    Request(LegalRequest),
    Text(String),
    Empty,
}

impl Payload {
    fn request(&self, method: &str) -> Result<&LegalRequest, RemoteError> {
        match self {
            Payload::Request(request) => Ok(request),
            _ => Err(payload_mismatch(method)),
        }
    }

    fn text(&self, method: &str) -> Result<&str, RemoteError> {
        match self {
            Payload::Text(text) => Ok(text),
            _ => Err(payload_mismatch(method)),
        }
    }
}

fn payload_mismatch(method: &str) -> RemoteError {
    RemoteError::Decode {
        method: method.to_string(),
        reason: "command input does not match the method argument".to_string(),
    }
}

/// Decoded success payload of an invocation.
#[derive(Debug)]
enum Reply {
    Legal(LegalResponse),
    Documents(Vec<DocumentSummary>),
    Text(String),
    Done,
}

/// When a command re-fetches the profile after its call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProfileRefresh {
    Never,
    /// After success and failure alike.
    Always,
    OnSuccess,
}

type Validator = fn(&FormState, Option<&str>) -> Result<Payload, ValidationError>;
type Invoker =
    for<'a> fn(&'a dyn LegalBackend, &'a Payload) -> BoxFuture<'a, Result<Reply, RemoteError>>;

#[derive(Clone, Copy)]
struct CommandSpec {
    trigger: Trigger,
    busy_label: &'static str,
    validate: Validator,
    invoke: Invoker,
    on_success: fn(&Mediator, Reply),
    on_failure: fn(&Mediator, &RemoteError),
    refresh_profile: ProfileRefresh,
}

const GET_ADVICE: CommandSpec = CommandSpec {
    trigger: Trigger::GetAdvice,
    busy_label: "Getting advice...",
    validate: validate_advice,
    invoke: invoke_advice,
    on_success: show_advice,
    on_failure: show_inline_error,
    refresh_profile: ProfileRefresh::Always,
};

const GENERATE_DOCUMENT: CommandSpec = CommandSpec {
    trigger: Trigger::GenerateDocument,
    busy_label: "Generating...",
    validate: validate_document,
    invoke: invoke_document,
    on_success: show_document,
    on_failure: show_inline_error,
    refresh_profile: ProfileRefresh::Always,
};

const SAVE_DOCUMENT: CommandSpec = CommandSpec {
    trigger: Trigger::SaveDocument,
    busy_label: "Saving...",
    validate: validate_save,
    invoke: invoke_list_documents,
    on_success: show_saved,
    on_failure: show_inline_error,
    refresh_profile: ProfileRefresh::Never,
};

const UPDATE_NAME: CommandSpec = CommandSpec {
    trigger: Trigger::UpdateName,
    busy_label: "Updating...",
    validate: validate_name,
    invoke: invoke_update_name,
    on_success: show_name_updated,
    on_failure: show_name_error,
    refresh_profile: ProfileRefresh::OnSuccess,
};

const VIEW_DOCUMENT: CommandSpec = CommandSpec {
    trigger: Trigger::ViewDocument,
    busy_label: "Loading...",
    validate: validate_document_id,
    invoke: invoke_get_document,
    on_success: show_fetched_document,
    on_failure: show_inline_error,
    refresh_profile: ProfileRefresh::Never,
};

impl Command {
    fn spec(self) -> CommandSpec {
        match self {
            Command::GetAdvice => GET_ADVICE,
            Command::GenerateDocument => GENERATE_DOCUMENT,
            Command::SaveDocument => SAVE_DOCUMENT,
            Command::UpdateName => UPDATE_NAME,
            Command::ViewDocument => VIEW_DOCUMENT,
        }
    }

    pub fn trigger(self) -> Trigger {
        self.spec().trigger
    }
}

// Validators

fn validate_advice(form: &FormState, _: Option<&str>) -> Result<Payload, ValidationError> {
    let request = LegalRequest::new(&form.prompt)?
        .with_context(form.context.as_deref())
        .confidential(form.is_confidential);
    Ok(Payload::Request(request))
}

fn validate_document(form: &FormState, _: Option<&str>) -> Result<Payload, ValidationError> {
    let document_type = form
        .document_type
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ValidationError::missing("document type"))?;
    let request = LegalRequest::new(&form.prompt)?
        .with_document_type(Some(document_type))
        .with_context(form.context.as_deref())
        .confidential(form.is_confidential);
    Ok(Payload::Request(request))
}

fn validate_save(_: &FormState, current: Option<&str>) -> Result<Payload, ValidationError> {
    match current {
        Some(_) => Ok(Payload::Empty),
        None => Err(ValidationError::NoCurrentDocument {
            action: "save".to_string(),
        }),
    }
}

fn validate_name(form: &FormState, _: Option<&str>) -> Result<Payload, ValidationError> {
    let name = form.name.trim();
    if name.is_empty() {
        return Err(ValidationError::missing("name"));
    }
    Ok(Payload::Text(name.to_string()))
}

fn validate_document_id(form: &FormState, _: Option<&str>) -> Result<Payload, ValidationError> {
    let id = form.document_id.trim();
    if id.is_empty() {
        return Err(ValidationError::missing("document id"));
    }
    Ok(Payload::Text(id.to_string()))
}

// Invokers

fn invoke_advice<'a>(
    backend: &'a dyn LegalBackend,
    payload: &'a Payload,
) -> BoxFuture<'a, Result<Reply, RemoteError>> {
    async move {
        let request = payload.request("generate_legal_advice")?;
        backend.generate_legal_advice(request).await.map(Reply::Legal)
    }
    .boxed()
}

fn invoke_document<'a>(
    backend: &'a dyn LegalBackend,
    payload: &'a Payload,
) -> BoxFuture<'a, Result<Reply, RemoteError>> {
    async move {
        let request = payload.request("generate_legal_document")?;
        backend
            .generate_legal_document(request)
            .await
            .map(Reply::Legal)
    }
    .boxed()
}

fn invoke_list_documents<'a>(
    backend: &'a dyn LegalBackend,
    _: &'a Payload,
) -> BoxFuture<'a, Result<Reply, RemoteError>> {
    async move { backend.get_user_documents().await.map(Reply::Documents) }.boxed()
}

fn invoke_update_name<'a>(
    backend: &'a dyn LegalBackend,
    payload: &'a Payload,
) -> BoxFuture<'a, Result<Reply, RemoteError>> {
    async move {
        let name = payload.text("update_user_name")?;
        backend.update_user_name(name).await.map(|()| Reply::Done)
    }
    .boxed()
}

fn invoke_get_document<'a>(
    backend: &'a dyn LegalBackend,
    payload: &'a Payload,
) -> BoxFuture<'a, Result<Reply, RemoteError>> {
    async move {
        let id = payload.text("get_document")?;
        backend.get_document(id).await.map(Reply::Text)
    }
    .boxed()
}

// Renderers

fn unexpected_reply(trigger: Trigger, reply: &Reply) {
    tracing::warn!(%trigger, ?reply, "unexpected reply shape");
}

fn show_advice(mediator: &Mediator, reply: Reply) {
    let response = match reply {
        Reply::Legal(response) => response,
        other => return unexpected_reply(Trigger::GetAdvice, &other),
    };
    mediator.set_current_document(None);
    mediator.surface.set_response(render_response(&response.response));
    mediator.surface.set_document_actions_visible(false);
}

fn show_document(mediator: &Mediator, reply: Reply) {
    let response = match reply {
        Reply::Legal(response) => response,
        other => return unexpected_reply(Trigger::GenerateDocument, &other),
    };
    let text = response.document_text().to_string();
    mediator.surface.set_response(render_response(&text));
    mediator.set_current_document(Some(text));
    mediator.surface.set_document_actions_visible(true);
}

fn show_saved(mediator: &Mediator, reply: Reply) {
    let documents = match reply {
        Reply::Documents(documents) => documents,
        other => return unexpected_reply(Trigger::SaveDocument, &other),
    };
    mediator
        .surface
        .set_documents(render_document_list(&documents));
    mediator
        .surface
        .notify(Notification::success("Document saved successfully"));
}

fn show_name_updated(mediator: &Mediator, _: Reply) {
    mediator
        .surface
        .notify(Notification::success("Name updated successfully"));
}

fn show_fetched_document(mediator: &Mediator, reply: Reply) {
    let text = match reply {
        Reply::Text(text) => text,
        other => return unexpected_reply(Trigger::ViewDocument, &other),
    };
    mediator.surface.set_response(render_response(&text));
}

fn show_inline_error(mediator: &Mediator, err: &RemoteError) {
    mediator
        .surface
        .set_response(render_error(&err.user_message()));
}

fn show_name_error(mediator: &Mediator, err: &RemoteError) {
    show_inline_error(mediator, err);
    mediator.surface.notify(Notification::error(format!(
        "Failed to update name: {}",
        err.user_message()
    )));
}

// ============================================================================
// MEDIATOR
// ============================================================================

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Runs commands against an established session.
pub struct Mediator {
    session: Arc<Session>,
    surface: Arc<dyn Surface>,
    current_document: Mutex<Option<String>>,
    busy: Mutex<HashSet<Trigger>>,
}

impl Mediator {
    pub fn new(session: Arc<Session>, surface: Arc<dyn Surface>) -> Self {
        Self {
            session,
            surface,
            current_document: Mutex::new(None),
            busy: Mutex::new(HashSet::new()),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The most recently generated document, if any.
    pub fn current_document(&self) -> Option<String> {
        lock(&self.current_document).clone()
    }

    fn set_current_document(&self, document: Option<String>) {
        *lock(&self.current_document) = document;
    }

    pub fn is_busy(&self, trigger: Trigger) -> bool {
        lock(&self.busy).contains(&trigger)
    }

    /// Run one command through its table row.
    pub async fn run(&self, command: Command, form: &FormState) -> CommandOutcome {
        let spec = command.spec();
        let current = self.current_document();

        let payload = match (spec.validate)(form, current.as_deref()) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(trigger = %spec.trigger, error = %err, "command rejected");
                self.surface.notify(Notification::warning(err.to_string()));
                return CommandOutcome::Rejected(err);
            }
        };

        let Some(_guard) = BusyGuard::acquire(self, spec.trigger, spec.busy_label) else {
            tracing::debug!(trigger = %spec.trigger, "trigger busy, ignoring");
            return CommandOutcome::Ignored;
        };

        tracing::debug!(trigger = %spec.trigger, "invoking");
        let outcome = match (spec.invoke)(self.session.backend().as_ref(), &payload).await {
            Ok(reply) => {
                (spec.on_success)(self, reply);
                CommandOutcome::Succeeded
            }
            Err(err) => {
                tracing::error!(trigger = %spec.trigger, error = %err, "command failed");
                (spec.on_failure)(self, &err);
                CommandOutcome::Failed(err)
            }
        };

        let refresh = match spec.refresh_profile {
            ProfileRefresh::Always => true,
            ProfileRefresh::OnSuccess => outcome.is_success(),
            ProfileRefresh::Never => false,
        };
        if refresh {
            if let Err(err) = self.refresh_profile().await {
                tracing::warn!(error = %err, "profile refresh failed");
            }
        }
        outcome
    }

    pub async fn refresh_profile(&self) -> Result<(), RemoteError> {
        let profile = self.session.backend().get_user_profile().await?;
        self.surface.set_profile(render_profile(&profile));
        Ok(())
    }

    pub async fn refresh_documents(&self) -> Result<(), RemoteError> {
        let documents = self.session.backend().get_user_documents().await?;
        self.surface.set_documents(render_document_list(&documents));
        Ok(())
    }

    /// Populate the profile and document list after bootstrap. Failures are
    /// reported but leave the session usable.
    pub async fn load_dashboard(&self) {
        for (what, result) in [
            ("profile", self.refresh_profile().await),
            ("documents", self.refresh_documents().await),
        ] {
            if let Err(err) = result {
                tracing::error!(what, error = %err, "dashboard load failed");
                self.surface.notify(Notification::error(format!(
                    "Could not load {}: {}",
                    what,
                    err.user_message()
                )));
            }
        }
    }

    /// Write the current document to `dir`, named after `date`.
    pub async fn download(&self, dir: &Path, date: NaiveDate) -> Result<PathBuf, ClientError> {
        let document = self
            .current_document()
            .ok_or_else(|| ValidationError::NoCurrentDocument {
                action: "download".to_string(),
            })?;
        let path = export::write_document(dir, date, &document).await?;
        tracing::info!(path = %path.display(), "document downloaded");
        Ok(path)
    }
}

impl std::fmt::Debug for Mediator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mediator")
            .field("session", &self.session)
            .field("has_current_document", &self.current_document().is_some())
            .finish_non_exhaustive()
    }
}

/// Holds a trigger busy; dropping it restores the trigger to idle.
struct BusyGuard<'a> {
    mediator: &'a Mediator,
    trigger: Trigger,
}

impl<'a> BusyGuard<'a> {
    fn acquire(mediator: &'a Mediator, trigger: Trigger, label: &str) -> Option<Self> {
        let inserted = lock(&mediator.busy).insert(trigger);
        if !inserted {
            return None;
        }
        mediator.surface.set_trigger(
            trigger,
            TriggerState::Busy {
                label: label.to_string(),
            },
        );
        Some(Self { mediator, trigger })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        lock(&self.mediator.busy).remove(&self.trigger);
        self.mediator
            .surface
            .set_trigger(self.trigger, TriggerState::Idle);
    }
}
