//! The rendering surface the core writes to, and an in-memory page model.
//!
//! The surface has no logic of its own. Everything that decides what to show
//! lives in the bootstrapper and the mediator.

use crate::notifications::Notification;
use crate::views::ProfileView;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use wakili_core::Principal;

/// A user-facing control that starts a remote action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Trigger {
    Login,
    GetAdvice,
    GenerateDocument,
    SaveDocument,
    UpdateName,
    ViewDocument,
}

impl Trigger {
    pub fn idle_label(self) -> &'static str {
        match self {
            Trigger::Login => "Log in",
            Trigger::GetAdvice => "Get Legal Advice",
            Trigger::GenerateDocument => "Generate Document",
            Trigger::SaveDocument => "Save Document",
            Trigger::UpdateName => "Update Name",
            Trigger::ViewDocument => "View",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.idle_label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerState {
    Idle,
    /// Disabled, showing an in-progress label.
    Busy { label: String },
}

impl TriggerState {
    pub fn is_busy(&self) -> bool {
        matches!(self, TriggerState::Busy { .. })
    }
}

/// Which top-level view is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthView {
    #[default]
    PreAuth,
    Authenticated,
}

/// Write-only rendering target.
pub trait Surface: Send + Sync {
    /// Show the login view and hide the authenticated view.
    fn show_pre_auth(&self);

    /// Hide the login view and reveal the authenticated view.
    fn show_authenticated(&self, principal: &Principal);

    fn set_trigger(&self, trigger: Trigger, state: TriggerState);

    /// Replace the response area. Used for both results and inline errors.
    fn set_response(&self, html: String);

    fn set_profile(&self, view: ProfileView);

    fn set_documents(&self, html: String);

    /// Show or hide the download/save affordances of a generated document.
    fn set_document_actions_visible(&self, visible: bool);

    fn notify(&self, notification: Notification);
}

/// Everything currently on the page.
#[derive(Debug, Clone, Default)]
pub struct PageSnapshot {
    pub view: AuthView,
    pub principal: Option<String>,
    pub triggers: HashMap<Trigger, TriggerState>,
    /// Every trigger state change in order, for inspection.
    pub trigger_history: Vec<(Trigger, TriggerState)>,
    pub response: Option<String>,
    pub profile: Option<ProfileView>,
    pub documents: Option<String>,
    pub document_actions_visible: bool,
    pub notifications: Vec<Notification>,
}

impl PageSnapshot {
    pub fn trigger(&self, trigger: Trigger) -> TriggerState {
        self.triggers
            .get(&trigger)
            .cloned()
            .unwrap_or(TriggerState::Idle)
    }

    /// Plain-text rendering for terminals.
    pub fn to_plain_text(&self) -> String {
        let mut out = String::new();
        match (&self.view, &self.principal) {
            (AuthView::Authenticated, Some(principal)) => {
                out.push_str(&format!("Signed in as {}\n", principal));
            }
            _ => out.push_str("Not signed in\n"),
        }
        if let Some(profile) = &self.profile {
            out.push_str(&format!(
                "\n{} | {} | last active {}\n",
                profile.name, profile.stats, profile.last_active
            ));
        }
        if let Some(response) = &self.response {
            out.push_str(&format!("\n{}\n", html_to_text(response)));
        }
        if let Some(documents) = &self.documents {
            out.push_str(&format!("\nDocuments:\n{}\n", html_to_text(documents)));
        }
        for notification in &self.notifications {
            out.push_str(&format!("{}\n", notification));
        }
        out
    }
}

/// Strip the small tag vocabulary the views emit and undo escaping.
fn html_to_text(html: &str) -> String {
    let spaced = html
        .replace("<br>", "\n")
        .replace("</div>", "\n")
        .replace("</h4>", " - ")
        .replace("</small>", "\n  ");
    let mut text = String::with_capacity(spaced.len());
    let mut in_tag = false;
    for c in spaced.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
        .trim_end()
        .to_string()
}

/// In-memory [`Surface`]. The CLI prints it; tests inspect it.
#[derive(Debug, Default)]
pub struct PageState {
    inner: Mutex<PageSnapshot>,
}

impl PageState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, PageSnapshot> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> PageSnapshot {
        self.lock().clone()
    }

    pub fn take_notifications(&self) -> Vec<Notification> {
        std::mem::take(&mut self.lock().notifications)
    }
}

impl Surface for PageState {
    fn show_pre_auth(&self) {
        let mut page = self.lock();
        page.view = AuthView::PreAuth;
        page.principal = None;
    }

    fn show_authenticated(&self, principal: &Principal) {
        let mut page = self.lock();
        page.view = AuthView::Authenticated;
        page.principal = Some(principal.to_text());
    }

    fn set_trigger(&self, trigger: Trigger, state: TriggerState) {
        let mut page = self.lock();
        page.trigger_history.push((trigger, state.clone()));
        page.triggers.insert(trigger, state);
    }

    fn set_response(&self, html: String) {
        self.lock().response = Some(html);
    }

    fn set_profile(&self, view: ProfileView) {
        self.lock().profile = Some(view);
    }

    fn set_documents(&self, html: String) {
        self.lock().documents = Some(html);
    }

    fn set_document_actions_visible(&self, visible: bool) {
        self.lock().document_actions_visible = visible;
    }

    fn notify(&self, notification: Notification) {
        self.lock().notifications.push(notification);
    }
}
