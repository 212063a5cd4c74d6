use std::sync::atomic::Ordering;

use super::common::*;
use crate::workflows::lifecycle::{LifecycleId, LifecycleStore, StoreError, TransitionError};
use crate::workflows::notifications::TemplateKind;
use crate::workflows::rebate::applications::domain::{ApplicationState, VerificationState};
use crate::workflows::rebate::applications::repository::EvidenceStore;
use crate::workflows::rebate::applications::service::{EvidenceError, RebateServiceError};

#[test]
fn submit_creates_record_in_initial_state_without_notification() {
    let harness = build_harness();
    let record = harness.service.submit(intake()).expect("submission stored");
    assert_eq!(record.state, ApplicationState::PreliminaryEligibility);
    assert!(record.history.is_empty());
    assert!(harness.feed.all().is_empty(), "intake announces nothing");
}

#[test]
fn unknown_application_reports_not_found() {
    let harness = build_harness();
    match harness
        .service
        .get(&LifecycleId("reb-missing".to_string()))
    {
        Err(RebateServiceError::Store(StoreError::NotFound)) => {}
        other => panic!("expected not found, got {other:?}"),
    }
}

#[test]
fn evidence_arrival_auto_advances_once() {
    let harness = build_harness();
    let id = application_awaiting_documents(&harness);

    let first = harness
        .service
        .on_evidence_submitted(&id, income_proof())
        .expect("first upload");
    assert!(first.auto_advanced);
    assert_eq!(
        harness.service.get_state(&id).expect("state"),
        ApplicationState::DocumentsReceived
    );

    let second = harness
        .service
        .on_evidence_submitted(&id, ownership_proof())
        .expect("second upload");
    assert!(!second.auto_advanced, "edge already behind us");

    let history = harness.service.get_history(&id).expect("history");
    let auto_edges = history
        .iter()
        .filter(|entry| entry.to == ApplicationState::DocumentsReceived)
        .count();
    assert_eq!(auto_edges, 1);
}

#[test]
fn program_submission_requires_fully_verified_evidence() {
    let harness = build_harness();
    let id = application_awaiting_documents(&harness);
    harness
        .service
        .on_evidence_submitted(&id, income_proof())
        .expect("upload");

    // One item still `submitted` blocks the advance.
    match harness.service.request_transition(
        &id,
        ApplicationState::SubmittedToProgram,
        operator(),
        None,
    ) {
        Err(RebateServiceError::DocumentsNotVerified {
            submitted,
            rejected,
        }) => {
            assert_eq!(submitted, 1);
            assert_eq!(rejected, 0);
        }
        other => panic!("expected documents-not-verified, got {other:?}"),
    }

    let before = harness.service.get_history(&id).expect("history").len();
    verify_all(&harness, &id);
    harness
        .service
        .request_transition(&id, ApplicationState::SubmittedToProgram, operator(), None)
        .expect("advance succeeds once verified");

    let history = harness.service.get_history(&id).expect("history");
    assert_eq!(history.len(), before + 1, "exactly one new audit entry");
    assert_eq!(
        harness.service.get_state(&id).expect("state"),
        ApplicationState::SubmittedToProgram
    );
}

#[test]
fn manual_documents_received_requires_arrived_evidence() {
    let harness = build_harness();
    let id = application_awaiting_documents(&harness);

    match harness.service.request_transition(
        &id,
        ApplicationState::DocumentsReceived,
        operator(),
        None,
    ) {
        Err(RebateServiceError::EvidenceMissing) => {}
        other => panic!("expected evidence-missing, got {other:?}"),
    }
    assert_eq!(
        harness.service.get_state(&id).expect("state"),
        ApplicationState::DocumentsRequested
    );
}

#[test]
fn evidence_review_is_one_way() {
    let harness = build_harness();
    let id = application_awaiting_documents(&harness);
    let ingest = harness
        .service
        .on_evidence_submitted(&id, income_proof())
        .expect("upload");

    let verified = harness
        .service
        .verify_evidence(&ingest.item.id, operator())
        .expect("verification");
    assert_eq!(verified.verification, VerificationState::Verified);
    assert!(verified.verified_at.is_some());

    match harness
        .service
        .reject_evidence(&ingest.item.id, operator(), "blurry scan")
    {
        Err(RebateServiceError::Evidence(EvidenceError::AlreadyResolved { current })) => {
            assert_eq!(current, "verified");
        }
        other => panic!("expected already-resolved, got {other:?}"),
    }
}

#[test]
fn resubmission_supersedes_rejected_evidence() {
    let harness = build_harness();
    let id = application_awaiting_documents(&harness);
    let first = harness
        .service
        .on_evidence_submitted(&id, income_proof())
        .expect("first upload");
    harness
        .service
        .reject_evidence(&first.item.id, operator(), "illegible")
        .expect("rejection");

    let readiness = harness.service.readiness(&id).expect("readiness");
    assert_eq!(readiness.rejected_count, 1);
    assert!(!readiness.all_verified);

    let replacement = harness
        .service
        .on_evidence_submitted(&id, income_proof())
        .expect("resubmission");
    harness
        .service
        .verify_evidence(&replacement.item.id, operator())
        .expect("verification");

    let readiness = harness.service.readiness(&id).expect("readiness");
    assert_eq!(readiness.rejected_count, 0, "superseded item dropped out");
    assert!(readiness.all_verified);

    // The rejected original stays visible in the full evidence listing but
    // drops out of the active set the gate sees.
    let all = harness.service.evidence(&id).expect("evidence");
    assert_eq!(all.len(), 2);
    assert!(all
        .iter()
        .any(|item| item.superseded_by == Some(replacement.item.id.clone())));
    let active = harness
        .evidence
        .active_for_lifecycle(&id)
        .expect("active evidence");
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, replacement.item.id);
}

#[test]
fn transitions_announce_themselves_to_the_customer() {
    let harness = build_harness();
    let _id = application_ready_for_program(&harness);

    let notifications = harness
        .service
        .notifications(&intake().customer.0)
        .expect("feed");
    let kinds: Vec<TemplateKind> = notifications.iter().map(|n| n.template).collect();
    assert!(kinds.contains(&TemplateKind::DocumentsRequested));
    assert!(kinds.contains(&TemplateKind::DocumentsReceived));
    assert!(notifications.iter().all(|n| n.dispatched));
    assert_eq!(harness.mailer.sent().len(), notifications.len());
}

#[test]
fn rejection_notification_carries_the_reason() {
    let harness = build_harness();
    let record = harness.service.submit(intake()).expect("submission stored");
    harness
        .service
        .request_transition(
            &record.id,
            ApplicationState::Rejected,
            operator(),
            Some("property outside service area".to_string()),
        )
        .expect("rejection");

    let notifications = harness
        .service
        .notifications(&intake().customer.0)
        .expect("feed");
    let rejection = notifications
        .iter()
        .find(|n| n.template == TemplateKind::ApplicationRejected)
        .expect("rejection notification");
    assert!(rejection.body.contains("property outside service area"));
}

#[test]
fn match_without_contractor_name_downgrades_to_render_failure() {
    let harness = build_harness();
    let id = application_ready_for_program(&harness);
    harness
        .service
        .request_transition(&id, ApplicationState::SubmittedToProgram, operator(), None)
        .expect("program submission");
    harness
        .service
        .request_transition(&id, ApplicationState::Approved, operator(), None)
        .expect("approval");

    // Bare transition request: no contractor recorded, so the matched
    // template is missing its {contractor_name} field.
    harness
        .service
        .request_transition(&id, ApplicationState::ContractorMatched, operator(), None)
        .expect("transition commits despite render failure");

    assert_eq!(
        harness.service.get_state(&id).expect("state"),
        ApplicationState::ContractorMatched
    );
    let notifications = harness
        .service
        .notifications(&intake().customer.0)
        .expect("feed");
    let matched = notifications
        .iter()
        .find(|n| n.template == TemplateKind::ContractorMatched)
        .expect("notification retained");
    assert!(!matched.dispatched);
    assert!(matched
        .render_error
        .as_deref()
        .expect("render error recorded")
        .contains("contractor_name"));
}

#[test]
fn recorded_match_renders_the_contractor_name() {
    let harness = build_harness();
    let id = application_ready_for_program(&harness);
    harness
        .service
        .request_transition(&id, ApplicationState::SubmittedToProgram, operator(), None)
        .expect("program submission");
    harness
        .service
        .request_transition(&id, ApplicationState::Approved, operator(), None)
        .expect("approval");
    harness
        .service
        .record_contractor_match(&id, "Volt Services", operator())
        .expect("match recorded");

    let record = harness.service.get(&id).expect("record");
    assert_eq!(record.matched_contractor.as_deref(), Some("Volt Services"));

    let notifications = harness
        .service
        .notifications(&intake().customer.0)
        .expect("feed");
    let matched = notifications
        .iter()
        .find(|n| n.template == TemplateKind::ContractorMatched)
        .expect("match notification");
    assert!(matched.dispatched);
    assert!(matched.body.contains("Volt Services"));
}

#[test]
fn delivery_failure_never_blocks_the_transition() {
    let harness = build_harness();
    let record = harness.service.submit(intake()).expect("submission stored");
    harness.mailer.fail.store(true, Ordering::Relaxed);

    harness
        .service
        .request_transition(
            &record.id,
            ApplicationState::DocumentsRequested,
            operator(),
            None,
        )
        .expect("transition commits despite delivery failure");

    assert_eq!(
        harness.service.get_state(&record.id).expect("state"),
        ApplicationState::DocumentsRequested
    );
    let notifications = harness
        .service
        .notifications(&intake().customer.0)
        .expect("feed");
    assert_eq!(notifications.len(), 1);
    assert!(!notifications[0].dispatched);
    assert!(notifications[0].render_error.is_none());
}

#[test]
fn concurrent_modification_surfaces_on_stale_operator_write() {
    let harness = build_harness();
    let id = application_awaiting_documents(&harness);

    // Simulate a stale writer by committing against an outdated expectation.
    let result = harness.store.commit_transition(
        &id,
        ApplicationState::PreliminaryEligibility,
        &mut |_| {},
    );
    match result {
        Err(StoreError::StaleState { expected, found }) => {
            assert_eq!(expected, "preliminary_eligibility");
            assert_eq!(found, "documents_requested");
        }
        other => panic!("expected stale state, got {other:?}"),
    }

    // The engine reports the same condition as a concurrent modification.
    let err: TransitionError = StoreError::StaleState {
        expected: "preliminary_eligibility",
        found: "documents_requested",
    }
    .into();
    assert!(matches!(
        err,
        TransitionError::ConcurrentModification { .. }
    ));
}
