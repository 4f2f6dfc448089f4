//! Command mediation against a mock backend.

use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use wakili_client::mediator::{Command, CommandOutcome, FormState, Mediator};
use wakili_client::notifications::NotificationLevel;
use wakili_client::page::{PageState, Trigger};
use wakili_core::{DocumentSummary, RemoteError, ValidationError};
use wakili_test_utils::assertions::{assert_busy_cycle, assert_never_busy};
use wakili_test_utils::fixtures;
use wakili_test_utils::MockBackend;

fn setup(backend: MockBackend) -> (Arc<MockBackend>, Arc<PageState>, Mediator) {
    let backend = Arc::new(backend);
    let page = Arc::new(PageState::new());
    let session = Arc::new(fixtures::session(backend.clone()));
    let mediator = Mediator::new(session, page.clone());
    (backend, page, mediator)
}

fn advice_form(prompt: &str) -> FormState {
    FormState {
        prompt: prompt.to_string(),
        ..FormState::default()
    }
}

fn document_form(prompt: &str, document_type: &str) -> FormState {
    FormState {
        prompt: prompt.to_string(),
        document_type: Some(document_type.to_string()),
        ..FormState::default()
    }
}

fn rejected(method: &str, message: &str) -> RemoteError {
    RemoteError::Rejected {
        method: method.to_string(),
        message: message.to_string(),
    }
}

#[tokio::test]
async fn advice_calls_backend_once_and_refreshes_profile() {
    let (backend, page, mediator) = setup(MockBackend::new().with_advice(Ok(
        fixtures::advice_response("DISCLAIMER: general information\nNOTE: see a lawyer"),
    )));
    let mut form = advice_form("Can my landlord keep my deposit?");
    form.context = Some("   ".to_string());
    form.is_confidential = true;

    let outcome = mediator.run(Command::GetAdvice, &form).await;

    assert_eq!(outcome, CommandOutcome::Succeeded);
    assert_eq!(backend.count("generate_legal_advice"), 1);
    assert_eq!(backend.count("get_user_profile"), 1);
    assert_eq!(backend.total_calls(), 2);

    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].prompt(), "Can my landlord keep my deposit?");
    assert!(requests[0].is_confidential());
    assert_eq!(requests[0].context(), None);
    assert_eq!(requests[0].document_type(), None);

    let snapshot = page.snapshot();
    assert_eq!(
        snapshot.response.as_deref(),
        Some("<strong>DISCLAIMER:</strong> general information<br><strong>NOTE:</strong> see a lawyer")
    );
    assert!(!snapshot.document_actions_visible);
    assert_eq!(snapshot.profile.map(|p| p.name), Some("Amina".to_string()));
    assert_busy_cycle(&page, Trigger::GetAdvice);
}

#[tokio::test]
async fn empty_prompt_makes_no_call() {
    let (backend, page, mediator) = setup(MockBackend::new());

    let outcome = mediator.run(Command::GetAdvice, &advice_form("  \n ")).await;

    assert_eq!(
        outcome,
        CommandOutcome::Rejected(ValidationError::missing("prompt"))
    );
    assert_eq!(backend.total_calls(), 0);
    let notifications = page.take_notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].level, NotificationLevel::Warning);
    assert_never_busy(&page, Trigger::GetAdvice);
}

#[tokio::test]
async fn advice_failure_renders_inline_and_still_refreshes_profile() {
    let (backend, page, mediator) = setup(MockBackend::new().with_advice(Err(rejected(
        "generate_legal_advice",
        "OpenAI proxy error: HTTP error: status 500",
    ))));

    let outcome = mediator
        .run(Command::GetAdvice, &advice_form("What is a tort?"))
        .await;

    assert!(matches!(outcome, CommandOutcome::Failed(RemoteError::Rejected { .. })));
    assert_eq!(backend.count("get_user_profile"), 1);
    assert_eq!(
        page.snapshot().response.as_deref(),
        Some("<p class=\"error\">Error: OpenAI proxy error: HTTP error: status 500</p>")
    );
    assert_busy_cycle(&page, Trigger::GetAdvice);
}

#[tokio::test]
async fn transport_failure_renders_like_a_rejection() {
    let (backend, page, mediator) = setup(MockBackend::new().with_document(Err(
        RemoteError::Transport {
            method: "generate_legal_document".to_string(),
            reason: "connection refused".to_string(),
        },
    )));

    let outcome = mediator
        .run(Command::GenerateDocument, &document_form("An NDA", "NDA"))
        .await;

    assert!(matches!(outcome, CommandOutcome::Failed(RemoteError::Transport { .. })));
    let response = page.snapshot().response.unwrap_or_default();
    assert!(response.starts_with("<p class=\"error\">Error: "));
    assert!(response.contains("connection refused"));
    assert_eq!(backend.count("get_user_profile"), 1);
    assert_eq!(mediator.current_document(), None);
}

#[tokio::test]
async fn trigger_is_busy_exactly_during_the_call() {
    let (backend, page, mediator) = setup(MockBackend::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    {
        let page = page.clone();
        let seen = seen.clone();
        backend.observe(move |method| {
            if method == "generate_legal_advice" {
                let busy = page.snapshot().trigger(Trigger::GetAdvice).is_busy();
                seen.lock().unwrap().push(busy);
            }
        });
    }

    mediator
        .run(Command::GetAdvice, &advice_form("Is a verbal contract binding?"))
        .await;

    assert_eq!(*seen.lock().unwrap(), vec![true]);
    assert!(!page.snapshot().trigger(Trigger::GetAdvice).is_busy());
    assert!(!mediator.is_busy(Trigger::GetAdvice));
}

#[tokio::test]
async fn generate_document_sets_current_document() {
    let (backend, page, mediator) =
        setup(MockBackend::new().with_document(Ok(fixtures::document_response(
            "MUTUAL NON-DISCLOSURE AGREEMENT\nIMPORTANT: review before signing",
        ))));

    let outcome = mediator
        .run(Command::GenerateDocument, &document_form("Draft an NDA", "NDA"))
        .await;

    assert!(outcome.is_success());
    assert_eq!(backend.requests()[0].document_type(), Some("NDA"));
    assert_eq!(backend.count("get_user_profile"), 1);
    assert_eq!(
        mediator.current_document().as_deref(),
        Some("MUTUAL NON-DISCLOSURE AGREEMENT\nIMPORTANT: review before signing")
    );
    let snapshot = page.snapshot();
    assert!(snapshot.document_actions_visible);
    assert!(snapshot
        .response
        .unwrap_or_default()
        .contains("<br><strong>IMPORTANT:</strong> review"));
}

#[tokio::test]
async fn document_without_body_falls_back_to_response_text() {
    let mut reply = fixtures::document_response("unused");
    reply.document = None;
    reply.response = "Lease agreement text".to_string();
    let (_backend, _page, mediator) = setup(MockBackend::new().with_document(Ok(reply)));

    mediator
        .run(Command::GenerateDocument, &document_form("A lease", "Lease"))
        .await;

    assert_eq!(
        mediator.current_document().as_deref(),
        Some("Lease agreement text")
    );
}

#[tokio::test]
async fn generate_document_requires_a_type() {
    let (backend, page, mediator) = setup(MockBackend::new());
    let form = document_form("Draft a will", "  ");

    let outcome = mediator.run(Command::GenerateDocument, &form).await;

    assert_eq!(
        outcome,
        CommandOutcome::Rejected(ValidationError::missing("document type"))
    );
    assert_eq!(backend.total_calls(), 0);
    assert_never_busy(&page, Trigger::GenerateDocument);
}

#[tokio::test]
async fn advice_clears_the_current_document() {
    let (_backend, page, mediator) = setup(MockBackend::new());
    mediator
        .run(Command::GenerateDocument, &document_form("An NDA", "NDA"))
        .await;
    assert!(mediator.current_document().is_some());

    mediator
        .run(Command::GetAdvice, &advice_form("Now some advice"))
        .await;

    assert_eq!(mediator.current_document(), None);
    assert!(!page.snapshot().document_actions_visible);
}

#[tokio::test]
async fn save_without_document_is_rejected() {
    let (backend, page, mediator) = setup(MockBackend::new());

    let outcome = mediator
        .run(Command::SaveDocument, &FormState::default())
        .await;

    assert!(matches!(
        outcome,
        CommandOutcome::Rejected(ValidationError::NoCurrentDocument { .. })
    ));
    assert_eq!(backend.total_calls(), 0);
    assert_never_busy(&page, Trigger::SaveDocument);
}

#[tokio::test]
async fn save_refetches_document_list_only() {
    let (backend, page, mediator) = setup(MockBackend::new().with_documents(Ok(vec![
        DocumentSummary::new("document_NDA_1700000000000000000", "MUTUAL NDA"),
    ])));
    mediator
        .run(Command::GenerateDocument, &document_form("An NDA", "NDA"))
        .await;
    let before = backend.total_calls();
    page.take_notifications();

    let outcome = mediator
        .run(Command::SaveDocument, &FormState::default())
        .await;

    assert!(outcome.is_success());
    assert_eq!(backend.total_calls() - before, 1);
    assert_eq!(backend.count("get_user_documents"), 1);
    let snapshot = page.snapshot();
    let documents = snapshot.documents.unwrap_or_default();
    assert!(documents.contains("<h4>NDA</h4>"));
    assert!(documents.contains("November 14, 2023"));
    assert_eq!(snapshot.notifications.len(), 1);
    assert_eq!(snapshot.notifications[0].level, NotificationLevel::Success);
    assert_busy_cycle(&page, Trigger::SaveDocument);
}

#[tokio::test]
async fn download_writes_the_current_document() {
    let (_backend, _page, mediator) = setup(MockBackend::new().with_document(Ok(
        fixtures::document_response("EMPLOYMENT CONTRACT"),
    )));
    let dir = tempfile::tempdir().unwrap();
    let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();

    assert!(mediator.download(dir.path(), date).await.is_err());

    mediator
        .run(
            Command::GenerateDocument,
            &document_form("Employment contract", "Employment"),
        )
        .await;
    let path = mediator.download(dir.path(), date).await.unwrap();

    assert_eq!(path, dir.path().join("legal_document_2024-03-09.txt"));
    assert_eq!(std::fs::read_to_string(path).unwrap(), "EMPLOYMENT CONTRACT");
}

#[tokio::test]
async fn update_name_trims_and_refreshes_profile_only() {
    let (backend, page, mediator) = setup(MockBackend::new());
    let form = FormState {
        name: "  Wanjiru  ".to_string(),
        ..FormState::default()
    };

    let outcome = mediator.run(Command::UpdateName, &form).await;

    assert!(outcome.is_success());
    assert_eq!(backend.names(), vec!["Wanjiru".to_string()]);
    assert_eq!(backend.count("get_user_profile"), 1);
    assert_eq!(backend.count("get_user_documents"), 0);
    let notifications = page.take_notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].level, NotificationLevel::Success);
    assert_busy_cycle(&page, Trigger::UpdateName);
}

#[tokio::test]
async fn update_name_failure_skips_profile_refresh() {
    let (backend, page, mediator) = setup(
        MockBackend::new().with_rename(Err(rejected("update_user_name", "Profile not found"))),
    );
    let form = FormState {
        name: "Wanjiru".to_string(),
        ..FormState::default()
    };

    let outcome = mediator.run(Command::UpdateName, &form).await;

    assert!(matches!(outcome, CommandOutcome::Failed(_)));
    assert_eq!(backend.count("get_user_profile"), 0);
    assert_eq!(
        page.snapshot().response.as_deref(),
        Some("<p class=\"error\">Error: Profile not found</p>")
    );
    assert_busy_cycle(&page, Trigger::UpdateName);
}

#[tokio::test]
async fn blank_name_is_rejected() {
    let (backend, _page, mediator) = setup(MockBackend::new());
    let form = FormState {
        name: "   ".to_string(),
        ..FormState::default()
    };

    let outcome = mediator.run(Command::UpdateName, &form).await;

    assert_eq!(outcome, CommandOutcome::Rejected(ValidationError::missing("name")));
    assert_eq!(backend.total_calls(), 0);
}

#[tokio::test]
async fn view_document_renders_found_and_missing_inline() {
    let (backend, page, mediator) = setup(
        MockBackend::new().with_stored_document("advice_Tenancy_1700000000000000000", "NOTE: 30 days"),
    );

    let found = FormState {
        document_id: "advice_Tenancy_1700000000000000000".to_string(),
        ..FormState::default()
    };
    assert!(mediator.run(Command::ViewDocument, &found).await.is_success());
    assert_eq!(
        page.snapshot().response.as_deref(),
        Some("<strong>NOTE:</strong> 30 days")
    );

    let missing = FormState {
        document_id: "nope".to_string(),
        ..FormState::default()
    };
    assert!(matches!(
        mediator.run(Command::ViewDocument, &missing).await,
        CommandOutcome::Failed(_)
    ));
    assert_eq!(
        page.snapshot().response.as_deref(),
        Some("<p class=\"error\">Error: Document not found</p>")
    );
    assert_eq!(backend.count("get_document"), 2);
    assert_eq!(backend.count("get_user_profile"), 0);
}

#[tokio::test]
async fn refiring_a_busy_trigger_is_ignored() {
    let (backend, _page, mediator) = setup(MockBackend::new());
    let gate = Arc::new(Notify::new());
    backend.hold_on(gate.clone());
    let form = advice_form("First question");

    let (first, second, ()) = tokio::join!(
        mediator.run(Command::GetAdvice, &form),
        mediator.run(Command::GetAdvice, &form),
        async {
            tokio::task::yield_now().await;
            gate.notify_one();
        }
    );

    assert_eq!(first, CommandOutcome::Succeeded);
    assert_eq!(second, CommandOutcome::Ignored);
    assert_eq!(backend.count("generate_legal_advice"), 1);
    assert_eq!(backend.count("get_user_profile"), 1);
}

#[tokio::test]
async fn different_triggers_may_overlap() {
    let (backend, page, mediator) = setup(MockBackend::new());
    let gate = Arc::new(Notify::new());
    backend.hold_on(gate.clone());
    let rename = FormState {
        name: "Otieno".to_string(),
        ..FormState::default()
    };
    let overlapping = advice_form("Overlapping");

    let (advice, renamed, ()) = tokio::join!(
        mediator.run(Command::GetAdvice, &overlapping),
        mediator.run(Command::UpdateName, &rename),
        async {
            tokio::task::yield_now().await;
            gate.notify_one();
        }
    );

    assert!(advice.is_success());
    assert!(renamed.is_success());
    assert_eq!(backend.count("get_user_profile"), 2);
    assert_busy_cycle(&page, Trigger::GetAdvice);
    assert_busy_cycle(&page, Trigger::UpdateName);
}

#[tokio::test]
async fn dashboard_failure_notifies_and_continues() {
    let (backend, page, mediator) = setup(
        MockBackend::new()
            .with_profile(Err(rejected("get_user_profile", "Profile not found")))
            .with_documents(Ok(Vec::new())),
    );

    mediator.load_dashboard().await;

    assert_eq!(backend.count("get_user_profile"), 1);
    assert_eq!(backend.count("get_user_documents"), 1);
    let snapshot = page.snapshot();
    assert_eq!(
        snapshot.documents.as_deref(),
        Some("<p class=\"empty\">No documents yet</p>")
    );
    assert_eq!(snapshot.notifications.len(), 1);
    assert_eq!(snapshot.notifications[0].level, NotificationLevel::Error);
    assert!(snapshot.notifications[0].message.contains("Profile not found"));
}
