use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;

use crate::workflows::lifecycle::{
    Actor, InMemoryLifecycleStore, LifecycleId,
};
use crate::workflows::notifications::{
    DeliveryError, InMemoryNotificationFeed, Notification, NotificationDispatcher, OutboundMailer,
};
use crate::workflows::rebate::applications::domain::{
    ApplicationIntake, ApplicationState, CustomerRef, EvidenceId, EvidenceItem, EvidenceKind,
    EvidenceSubmission, RebateApplication, VerificationState,
};
use crate::workflows::rebate::applications::repository::InMemoryEvidenceStore;
use crate::workflows::rebate::applications::service::RebateApplicationService;

pub(super) type TestService =
    RebateApplicationService<InMemoryLifecycleStore<RebateApplication>, InMemoryEvidenceStore>;

/// Mailer double: records subjects, fails on demand.
#[derive(Default)]
pub(super) struct RecordingMailer {
    sent: Mutex<Vec<String>>,
    pub(super) fail: AtomicBool,
}

impl RecordingMailer {
    pub(super) fn sent(&self) -> Vec<String> {
        self.sent.lock().expect("mailer mutex poisoned").clone()
    }
}

impl OutboundMailer for RecordingMailer {
    fn send(&self, notification: &Notification) -> Result<(), DeliveryError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(DeliveryError::Transport("smtp down".to_string()));
        }
        self.sent
            .lock()
            .expect("mailer mutex poisoned")
            .push(notification.subject.clone());
        Ok(())
    }
}

pub(super) struct Harness {
    pub(super) service: Arc<TestService>,
    pub(super) store: Arc<InMemoryLifecycleStore<RebateApplication>>,
    pub(super) evidence: Arc<InMemoryEvidenceStore>,
    pub(super) feed: Arc<InMemoryNotificationFeed>,
    pub(super) mailer: Arc<RecordingMailer>,
}

pub(super) fn build_harness() -> Harness {
    let store = Arc::new(InMemoryLifecycleStore::default());
    let evidence = Arc::new(InMemoryEvidenceStore::default());
    let feed = Arc::new(InMemoryNotificationFeed::default());
    let mailer = Arc::new(RecordingMailer::default());
    let dispatcher = Arc::new(NotificationDispatcher::new(feed.clone(), mailer.clone()));
    let service = Arc::new(RebateApplicationService::new(
        store.clone(),
        evidence.clone(),
        dispatcher,
    ));
    Harness {
        service,
        store,
        evidence,
        feed,
        mailer,
    }
}

pub(super) fn intake() -> ApplicationIntake {
    ApplicationIntake {
        customer: CustomerRef("cust-301".to_string()),
        customer_name: "Jordan Meyer".to_string(),
        program: "Heat Pump Rebate".to_string(),
        requested_amount_cents: 240_000,
        property_address: "118 Grand Ave".to_string(),
    }
}

pub(super) fn operator() -> Actor {
    Actor::Operator("reviewer-1".to_string())
}

pub(super) fn income_proof() -> EvidenceSubmission {
    EvidenceSubmission {
        kind: EvidenceKind::IncomeProof,
        storage_key: "s3://rebate-match/docs/income.pdf".to_string(),
    }
}

pub(super) fn ownership_proof() -> EvidenceSubmission {
    EvidenceSubmission {
        kind: EvidenceKind::OwnershipProof,
        storage_key: "s3://rebate-match/docs/deed.pdf".to_string(),
    }
}

/// Submit an application and walk it into `documents_requested`.
pub(super) fn application_awaiting_documents(harness: &Harness) -> LifecycleId {
    let record = harness.service.submit(intake()).expect("submission stored");
    harness
        .service
        .request_transition(
            &record.id,
            ApplicationState::DocumentsRequested,
            operator(),
            None,
        )
        .expect("documents requested");
    record.id
}

/// Submit one evidence item and verify everything outstanding, leaving the
/// application in `documents_received` and fully verified.
pub(super) fn application_ready_for_program(harness: &Harness) -> LifecycleId {
    let id = application_awaiting_documents(harness);
    harness
        .service
        .on_evidence_submitted(&id, income_proof())
        .expect("evidence stored");
    verify_all(harness, &id);
    id
}

pub(super) fn verify_all(harness: &Harness, id: &LifecycleId) {
    for item in harness.service.evidence(id).expect("evidence listed") {
        if item.verification == VerificationState::Submitted {
            harness
                .service
                .verify_evidence(&item.id, operator())
                .expect("evidence verified");
        }
    }
}

pub(super) fn evidence_item(id: &LifecycleId, kind: EvidenceKind) -> EvidenceItem {
    EvidenceItem {
        id: EvidenceId(format!("evd-fixture-{}", kind.label())),
        lifecycle_id: id.clone(),
        kind,
        storage_key: format!("s3://rebate-match/docs/{}.pdf", kind.label()),
        verification: VerificationState::Submitted,
        rejection_reason: None,
        submitted_at: Utc::now(),
        verified_at: None,
        superseded_by: None,
    }
}
