use super::common::*;
use crate::workflows::lifecycle::{replay, LifecycleState, TransitionError};
use crate::workflows::rebate::applications::domain::ApplicationState;
use crate::workflows::rebate::applications::service::RebateServiceError;

const ALL_STATES: [ApplicationState; 9] = [
    ApplicationState::PreliminaryEligibility,
    ApplicationState::DocumentsRequested,
    ApplicationState::DocumentsReceived,
    ApplicationState::SubmittedToProgram,
    ApplicationState::Approved,
    ApplicationState::ContractorMatched,
    ApplicationState::InstallationInProgress,
    ApplicationState::Completed,
    ApplicationState::Rejected,
];

#[test]
fn every_edge_outside_the_table_is_rejected_without_side_effects() {
    for to in ALL_STATES {
        let harness = build_harness();
        let record = harness.service.submit(intake()).expect("submission stored");
        if record.state.can_move_to(to) {
            continue;
        }

        match harness
            .service
            .request_transition(&record.id, to, operator(), None)
        {
            Err(RebateServiceError::Transition(TransitionError::InvalidTransition {
                ..
            })) => {}
            other => panic!("expected invalid transition to {to:?}, got {other:?}"),
        }

        let stored = harness.service.get(&record.id).expect("record present");
        assert_eq!(stored.state, ApplicationState::PreliminaryEligibility);
        assert!(stored.history.is_empty(), "no audit entry for a denied edge");
        assert!(
            harness.feed.all().is_empty(),
            "no notification for a denied edge"
        );
    }
}

#[test]
fn terminal_states_accept_no_further_transitions() {
    let harness = build_harness();
    let record = harness.service.submit(intake()).expect("submission stored");
    harness
        .service
        .request_transition(
            &record.id,
            ApplicationState::Rejected,
            operator(),
            Some("ineligible property".to_string()),
        )
        .expect("rejection commits");

    for to in ALL_STATES {
        match harness
            .service
            .request_transition(&record.id, to, operator(), None)
        {
            Err(RebateServiceError::Transition(TransitionError::InvalidTransition {
                ..
            })) => {}
            other => panic!("terminal record accepted transition to {to:?}: {other:?}"),
        }
    }

    let stored = harness.service.get(&record.id).expect("record present");
    assert_eq!(stored.state, ApplicationState::Rejected);
    assert_eq!(stored.history.len(), 1);
}

#[test]
fn replayed_history_reproduces_current_state() {
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

    let history = harness.service.get_history(&id).expect("history");
    let state = harness.service.get_state(&id).expect("state");
    assert_eq!(replay(&history), state);
    assert_eq!(
        history.last().expect("at least one entry").to,
        state,
        "last entry's destination is the persisted state"
    );
}

#[test]
fn history_entries_chain_from_state_to_state() {
    let harness = build_harness();
    let id = application_ready_for_program(&harness);
    harness
        .service
        .request_transition(
            &id,
            ApplicationState::DocumentsRequested,
            operator(),
            Some("need utility bill".to_string()),
        )
        .expect("re-request documents");
    harness
        .service
        .on_evidence_submitted(&id, ownership_proof())
        .expect("second round of evidence");

    let history = harness.service.get_history(&id).expect("history");
    let mut previous = ApplicationState::PreliminaryEligibility;
    for entry in &history {
        assert_eq!(entry.from, previous, "entries form an unbroken chain");
        previous = entry.to;
    }
}

#[test]
fn lost_cas_race_records_exactly_one_audit_entry() {
    let harness = build_harness();
    let id = application_awaiting_documents(&harness);

    let first = std::thread::spawn({
        let service = harness.service.clone();
        let id = id.clone();
        move || service.on_evidence_submitted(&id, income_proof())
    });
    let second = std::thread::spawn({
        let service = harness.service.clone();
        let id = id.clone();
        move || service.on_evidence_submitted(&id, ownership_proof())
    });

    let outcomes = [
        first.join().expect("no panic").expect("ingest succeeds"),
        second.join().expect("no panic").expect("ingest succeeds"),
    ];

    let advanced = outcomes.iter().filter(|ingest| ingest.auto_advanced).count();
    assert_eq!(advanced, 1, "exactly one upload wins the edge");

    let history = harness.service.get_history(&id).expect("history");
    let received_edges = history
        .iter()
        .filter(|entry| {
            entry.from == ApplicationState::DocumentsRequested
                && entry.to == ApplicationState::DocumentsReceived
        })
        .count();
    assert_eq!(received_edges, 1, "the edge committed exactly once");
}
