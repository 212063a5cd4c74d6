use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;

use super::documents::{DocumentGate, EvidenceReadiness};
use super::domain::{
    ApplicationIntake, ApplicationState, ApplicationStatusView, EvidenceId, EvidenceItem,
    EvidenceSubmission, RebateApplication, VerificationState,
};
use super::repository::EvidenceStore;
use crate::workflows::format_cents;
use crate::workflows::lifecycle::{
    Actor, AuditEntry, LifecycleEngine, LifecycleId, LifecycleKind, LifecycleState,
    LifecycleStore, NotificationPlan, PathTag, StoreError, TransitionCommand, TransitionError,
};
use crate::workflows::notifications::{Notification, NotificationDispatcher};

static APPLICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static EVIDENCE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_application_id() -> LifecycleId {
    let id = APPLICATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    LifecycleId(format!("reb-{id:06}"))
}

fn next_evidence_id() -> EvidenceId {
    let id = EVIDENCE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    EvidenceId(format!("evd-{id:06}"))
}

/// Service composing the transition engine, document gate, and evidence
/// store for the customer rebate application lifecycle.
pub struct RebateApplicationService<R, E>
where
    R: LifecycleStore<RebateApplication> + 'static,
    E: EvidenceStore + 'static,
{
    engine: LifecycleEngine<RebateApplication, R>,
    store: Arc<R>,
    evidence: Arc<E>,
    dispatcher: Arc<NotificationDispatcher>,
}

/// Outcome of an evidence submission.
#[derive(Debug, Clone)]
pub struct EvidenceIngest {
    pub item: EvidenceItem,
    /// True when this submission flipped the application from
    /// `documents_requested` to `documents_received`.
    pub auto_advanced: bool,
}

impl<R, E> RebateApplicationService<R, E>
where
    R: LifecycleStore<RebateApplication> + 'static,
    E: EvidenceStore + 'static,
{
    pub fn new(store: Arc<R>, evidence: Arc<E>, dispatcher: Arc<NotificationDispatcher>) -> Self {
        let engine = LifecycleEngine::new(
            LifecycleKind::RebateApplication,
            store.clone(),
            dispatcher.clone(),
        );
        Self {
            engine,
            store,
            evidence,
            dispatcher,
        }
    }

    /// Register a new application in its initial state. No notification goes
    /// out on intake; only transitions announce themselves.
    pub fn submit(&self, intake: ApplicationIntake) -> Result<RebateApplication, RebateServiceError> {
        let record = RebateApplication {
            id: next_application_id(),
            customer: intake.customer,
            customer_name: intake.customer_name,
            program: intake.program,
            requested_amount_cents: intake.requested_amount_cents,
            property_address: intake.property_address,
            state: ApplicationState::initial(),
            matched_contractor: None,
            last_updated: Utc::now(),
            history: Vec::new(),
        };
        Ok(self.store.insert(record)?)
    }

    /// Operator-driven transition request. Fails closed: an illegal edge, an
    /// unverified evidence set, or a lost write race all leave the record
    /// unchanged and create no notification.
    pub fn request_transition(
        &self,
        id: &LifecycleId,
        to: ApplicationState,
        actor: Actor,
        reason: Option<String>,
    ) -> Result<RebateApplication, RebateServiceError> {
        let record = self.fetch(id)?;
        let from = record.state;

        if from == ApplicationState::DocumentsReceived && to == ApplicationState::SubmittedToProgram
        {
            let items = self.evidence.active_for_lifecycle(id)?;
            let readiness = DocumentGate::evaluate(&items);
            if !readiness.all_verified {
                let submitted = items
                    .iter()
                    .filter(|item| item.verification == VerificationState::Submitted)
                    .count();
                return Err(RebateServiceError::DocumentsNotVerified {
                    submitted,
                    rejected: readiness.rejected_count,
                });
            }
        }

        if from == ApplicationState::DocumentsRequested && to == ApplicationState::DocumentsReceived
        {
            // The stored transition must never contradict the evidence set;
            // an operator can only assert receipt once something arrived.
            let readiness = DocumentGate::evaluate(&self.evidence.active_for_lifecycle(id)?);
            if !readiness.any_arrived {
                return Err(RebateServiceError::EvidenceMissing);
            }
        }

        let command = TransitionCommand {
            to,
            actor,
            reason,
            path: PathTag::Standard,
            observed: None,
        };
        let outcome = self
            .engine
            .transition(id, command, |_| {}, notification_plan)?;
        Ok(outcome.record)
    }

    /// Evidence ingestion callback from the upload subsystem. Stores the item
    /// and, when the application is waiting on documents, advances it with a
    /// compare-and-swap so concurrent uploads commit the edge exactly once.
    pub fn on_evidence_submitted(
        &self,
        id: &LifecycleId,
        submission: EvidenceSubmission,
    ) -> Result<EvidenceIngest, RebateServiceError> {
        let record = self.fetch(id)?;

        let item_id = next_evidence_id();
        for prior in self.evidence.active_for_lifecycle(id)? {
            if prior.kind == submission.kind && prior.verification == VerificationState::Rejected {
                let mut resolved = prior;
                resolved.superseded_by = Some(item_id.clone());
                self.evidence.update(resolved)?;
            }
        }

        let item = self.evidence.insert(EvidenceItem {
            id: item_id,
            lifecycle_id: id.clone(),
            kind: submission.kind,
            storage_key: submission.storage_key,
            verification: VerificationState::Submitted,
            rejection_reason: None,
            submitted_at: Utc::now(),
            verified_at: None,
            superseded_by: None,
        })?;

        if record.state != ApplicationState::DocumentsRequested {
            return Ok(EvidenceIngest {
                item,
                auto_advanced: false,
            });
        }

        let command = TransitionCommand {
            to: ApplicationState::DocumentsReceived,
            actor: Actor::System,
            reason: Some("evidence received".to_string()),
            path: PathTag::Standard,
            observed: Some(ApplicationState::DocumentsRequested),
        };
        match self.engine.transition(id, command, |_| {}, notification_plan) {
            Ok(_) => Ok(EvidenceIngest {
                item,
                auto_advanced: true,
            }),
            // A racing writer already advanced the record; the desired state
            // was reached without us, nothing further to do.
            Err(TransitionError::ConcurrentModification { .. }) => Ok(EvidenceIngest {
                item,
                auto_advanced: false,
            }),
            Err(other) => Err(other.into()),
        }
    }

    /// Mark an evidence item verified. One-way from `submitted`.
    pub fn verify_evidence(
        &self,
        id: &EvidenceId,
        actor: Actor,
    ) -> Result<EvidenceItem, RebateServiceError> {
        let mut item = self
            .evidence
            .fetch(id)?
            .ok_or(EvidenceError::NotFound)?;
        if item.verification != VerificationState::Submitted {
            return Err(EvidenceError::AlreadyResolved {
                current: item.verification.label(),
            }
            .into());
        }
        item.verification = VerificationState::Verified;
        item.verified_at = Some(Utc::now());
        self.evidence.update(item.clone())?;
        tracing::debug!(evidence = %item.id.0, actor = %actor.label(), "evidence verified");
        Ok(item)
    }

    /// Mark an evidence item rejected with a reason. A fresh submission of
    /// the same kind supersedes it later.
    pub fn reject_evidence(
        &self,
        id: &EvidenceId,
        actor: Actor,
        reason: impl Into<String>,
    ) -> Result<EvidenceItem, RebateServiceError> {
        let mut item = self
            .evidence
            .fetch(id)?
            .ok_or(EvidenceError::NotFound)?;
        if item.verification != VerificationState::Submitted {
            return Err(EvidenceError::AlreadyResolved {
                current: item.verification.label(),
            }
            .into());
        }
        item.verification = VerificationState::Rejected;
        item.rejection_reason = Some(reason.into());
        self.evidence.update(item.clone())?;
        tracing::debug!(evidence = %item.id.0, actor = %actor.label(), "evidence rejected");
        Ok(item)
    }

    /// Record the installer match and advance the application in one commit.
    pub fn record_contractor_match(
        &self,
        id: &LifecycleId,
        contractor_name: impl Into<String>,
        actor: Actor,
    ) -> Result<RebateApplication, RebateServiceError> {
        let contractor_name = contractor_name.into();
        let command = TransitionCommand {
            to: ApplicationState::ContractorMatched,
            actor,
            reason: None,
            path: PathTag::Standard,
            observed: None,
        };
        let outcome = self.engine.transition(
            id,
            command,
            |record| {
                record.matched_contractor = Some(contractor_name);
            },
            notification_plan,
        )?;
        Ok(outcome.record)
    }

    pub fn get(&self, id: &LifecycleId) -> Result<RebateApplication, RebateServiceError> {
        self.fetch(id)
    }

    pub fn get_state(&self, id: &LifecycleId) -> Result<ApplicationState, RebateServiceError> {
        Ok(self.fetch(id)?.state)
    }

    pub fn allowed_next(
        &self,
        id: &LifecycleId,
    ) -> Result<&'static [ApplicationState], RebateServiceError> {
        Ok(self.fetch(id)?.state.allowed_next())
    }

    pub fn get_history(
        &self,
        id: &LifecycleId,
    ) -> Result<Vec<AuditEntry<ApplicationState>>, RebateServiceError> {
        Ok(self.fetch(id)?.history)
    }

    /// Every evidence item ever submitted, superseded ones included.
    pub fn evidence(&self, id: &LifecycleId) -> Result<Vec<EvidenceItem>, RebateServiceError> {
        self.fetch(id)?;
        Ok(self.evidence.all_for_lifecycle(id)?)
    }

    pub fn readiness(&self, id: &LifecycleId) -> Result<EvidenceReadiness, RebateServiceError> {
        self.fetch(id)?;
        Ok(DocumentGate::evaluate(
            &self.evidence.active_for_lifecycle(id)?,
        ))
    }

    pub fn status_view(&self, id: &LifecycleId) -> Result<ApplicationStatusView, RebateServiceError> {
        let record = self.fetch(id)?;
        let readiness = DocumentGate::evaluate(&self.evidence.active_for_lifecycle(id)?);
        Ok(ApplicationStatusView {
            application_id: record.id.0.clone(),
            state: record.state.label(),
            allowed_next: record
                .state
                .allowed_next()
                .iter()
                .map(|state| state.label())
                .collect(),
            readiness,
            matched_contractor: record.matched_contractor.clone(),
            last_updated: record.last_updated,
        })
    }

    pub fn notifications(&self, recipient: &str) -> Result<Vec<Notification>, RebateServiceError> {
        Ok(self.dispatcher.notifications_for(recipient)?)
    }

    fn fetch(&self, id: &LifecycleId) -> Result<RebateApplication, RebateServiceError> {
        Ok(self.store.fetch(id)?.ok_or(StoreError::NotFound)?)
    }
}

fn notification_plan(record: &RebateApplication) -> NotificationPlan {
    let mut context = BTreeMap::new();
    context.insert("customer_name".to_string(), record.customer_name.clone());
    context.insert("program".to_string(), record.program.clone());
    context.insert(
        "amount".to_string(),
        format_cents(record.requested_amount_cents),
    );
    if let Some(contractor) = &record.matched_contractor {
        context.insert("contractor_name".to_string(), contractor.clone());
    }
    if let Some(reason) = record.history.last().and_then(|entry| entry.reason.clone()) {
        context.insert("decision_reason".to_string(), reason);
    }
    context
        .entry("decision_reason".to_string())
        .or_insert_with(|| "not specified".to_string());

    NotificationPlan {
        recipient: record.customer.0.clone(),
        context,
    }
}

/// Error raised by the rebate application service.
#[derive(Debug, thiserror::Error)]
pub enum RebateServiceError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("evidence must be fully verified before program submission ({submitted} awaiting review, {rejected} rejected)")]
    DocumentsNotVerified { submitted: usize, rejected: usize },
    #[error("no evidence has arrived for this application")]
    EvidenceMissing,
    #[error(transparent)]
    Evidence(#[from] EvidenceError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors specific to evidence review actions.
#[derive(Debug, thiserror::Error)]
pub enum EvidenceError {
    #[error("evidence item not found")]
    NotFound,
    #[error("evidence item already {current}; submit a new item instead")]
    AlreadyResolved { current: &'static str },
}
