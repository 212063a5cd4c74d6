use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::workflows::contractor::onboarding::domain::{
    ContractorIntake, ContractorRecord, ContractorRef, ContractorState,
};
use crate::workflows::contractor::onboarding::service::{
    ContractorOnboardingService, OnboardingFeePolicy,
};
use crate::workflows::lifecycle::{Actor, InMemoryLifecycleStore, LifecycleId};
use crate::workflows::notifications::{
    DeliveryError, InMemoryNotificationFeed, Notification, NotificationDispatcher, OutboundMailer,
};

pub(super) type TestService = ContractorOnboardingService<InMemoryLifecycleStore<ContractorRecord>>;

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
    pub(super) store: Arc<InMemoryLifecycleStore<ContractorRecord>>,
    pub(super) feed: Arc<InMemoryNotificationFeed>,
    pub(super) mailer: Arc<RecordingMailer>,
}

pub(super) fn build_harness() -> Harness {
    let store = Arc::new(InMemoryLifecycleStore::default());
    let feed = Arc::new(InMemoryNotificationFeed::default());
    let mailer = Arc::new(RecordingMailer::default());
    let dispatcher = Arc::new(NotificationDispatcher::new(feed.clone(), mailer.clone()));
    let service = Arc::new(ContractorOnboardingService::new(
        store.clone(),
        dispatcher,
        fee_policy(),
    ));
    Harness {
        service,
        store,
        feed,
        mailer,
    }
}

pub(super) fn fee_policy() -> OnboardingFeePolicy {
    OnboardingFeePolicy {
        amount_cents: 25_000,
        due_days: 30,
    }
}

pub(super) fn intake() -> ContractorIntake {
    ContractorIntake {
        contractor: ContractorRef("ctr-volt".to_string()),
        company: "Volt Services".to_string(),
        contact_name: "Dana Whitfield".to_string(),
        service_areas: vec!["50309".to_string(), "50310".to_string()],
    }
}

pub(super) fn operator() -> Actor {
    Actor::Operator("ops-1".to_string())
}

/// Walk a fresh registration through the standard path up to `invoice_sent`.
pub(super) fn contractor_with_invoice(harness: &Harness) -> LifecycleId {
    let record = harness.service.register(intake()).expect("registration");
    harness
        .service
        .request_transition(
            &record.id,
            ContractorState::DetailsRequested,
            operator(),
            None,
        )
        .expect("details requested");
    harness
        .service
        .request_transition(
            &record.id,
            ContractorState::AwaitingStateApproval,
            operator(),
            None,
        )
        .expect("awaiting state approval");
    harness
        .service
        .record_state_approval(&record.id, operator())
        .expect("state approval recorded");
    harness
        .service
        .request_transition(&record.id, ContractorState::InvoiceSent, operator(), None)
        .expect("invoice sent");
    record.id
}

/// Continue from `invoice_sent` to an active standard-path approval.
pub(super) fn approved_standard_contractor(harness: &Harness) -> LifecycleId {
    let id = contractor_with_invoice(harness);
    harness
        .service
        .request_transition(&id, ContractorState::PaymentPending, operator(), None)
        .expect("payment pending");
    harness
        .service
        .request_transition(&id, ContractorState::Approved, operator(), None)
        .expect("approval");
    id
}
