use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{Duration, Utc};

use super::domain::{
    ContractorIntake, ContractorRecord, ContractorState, OnboardingFee,
};
use crate::workflows::format_cents;
use crate::workflows::lifecycle::{
    Actor, AuditEntry, LifecycleEngine, LifecycleId, LifecycleKind, LifecycleState,
    LifecycleStore, NotificationPlan, PathTag, StoreError, TransitionCommand, TransitionError,
};
use crate::workflows::notifications::{Notification, NotificationDispatcher};

static CONTRACTOR_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_contractor_id() -> LifecycleId {
    let id = CONTRACTOR_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    LifecycleId(format!("con-{id:06}"))
}

/// Fee terms applied when an onboarding invoice goes out.
#[derive(Debug, Clone, Copy)]
pub struct OnboardingFeePolicy {
    pub amount_cents: u32,
    pub due_days: i64,
}

impl Default for OnboardingFeePolicy {
    fn default() -> Self {
        Self {
            amount_cents: 25_000,
            due_days: 30,
        }
    }
}

/// Service driving contractor onboarding through the shared lifecycle
/// engine: the standard details/approval/invoice/payment path and the
/// operator-asserted fast track.
pub struct ContractorOnboardingService<R>
where
    R: LifecycleStore<ContractorRecord> + 'static,
{
    engine: LifecycleEngine<ContractorRecord, R>,
    store: Arc<R>,
    dispatcher: Arc<NotificationDispatcher>,
    fees: OnboardingFeePolicy,
}

impl<R> ContractorOnboardingService<R>
where
    R: LifecycleStore<ContractorRecord> + 'static,
{
    pub fn new(
        store: Arc<R>,
        dispatcher: Arc<NotificationDispatcher>,
        fees: OnboardingFeePolicy,
    ) -> Self {
        let engine = LifecycleEngine::new(
            LifecycleKind::ContractorOnboarding,
            store.clone(),
            dispatcher.clone(),
        );
        Self {
            engine,
            store,
            dispatcher,
            fees,
        }
    }

    /// Register a new contractor in `pending`.
    pub fn register(
        &self,
        intake: ContractorIntake,
    ) -> Result<ContractorRecord, OnboardingServiceError> {
        let record = ContractorRecord {
            id: next_contractor_id(),
            contractor: intake.contractor,
            company: intake.company,
            contact_name: intake.contact_name,
            service_areas: intake.service_areas,
            state: ContractorState::initial(),
            state_approved: false,
            fee: None,
            fee_paid: false,
            last_updated: Utc::now(),
            history: Vec::new(),
        };
        Ok(self.store.insert(record)?)
    }

    /// Operator-driven transition along the standard path. The invoice edge
    /// requires the recorded state approval and fixes the fee terms exactly
    /// once; the payment-confirmation edge into `approved` marks the fee
    /// paid in the same commit.
    pub fn request_transition(
        &self,
        id: &LifecycleId,
        to: ContractorState,
        actor: Actor,
        reason: Option<String>,
    ) -> Result<ContractorRecord, OnboardingServiceError> {
        let record = self.fetch(id)?;
        let from = record.state;

        if from == ContractorState::Pending && to == ContractorState::Approved {
            return Err(OnboardingServiceError::FastTrackRequired);
        }
        if from == ContractorState::AwaitingStateApproval
            && to == ContractorState::InvoiceSent
            && !record.state_approved
        {
            return Err(OnboardingServiceError::StateApprovalPending);
        }

        let fees = self.fees;
        let command = TransitionCommand {
            to,
            actor,
            reason,
            path: PathTag::Standard,
            observed: None,
        };
        let outcome = self.engine.transition(
            id,
            command,
            |record| match to {
                ContractorState::InvoiceSent => {
                    // Fee terms are fixed exactly once, at invoice time.
                    if record.fee.is_none() {
                        let now = Utc::now();
                        record.fee = Some(OnboardingFee {
                            amount_cents: fees.amount_cents,
                            due: now.date_naive() + Duration::days(fees.due_days),
                            invoiced_at: now,
                        });
                    }
                }
                ContractorState::Approved if from == ContractorState::PaymentPending => {
                    // Confirming funds is what this edge means.
                    record.fee_paid = true;
                }
                _ => {}
            },
            notification_plan,
        )?;
        Ok(outcome.record)
    }

    /// Record the operator-asserted fact that the state program approved
    /// this contractor. Not a transition; the invoice edge checks it.
    pub fn record_state_approval(
        &self,
        id: &LifecycleId,
        actor: Actor,
    ) -> Result<ContractorRecord, OnboardingServiceError> {
        self.fetch(id)?;
        let record = self.store.mutate(id, &mut |record| {
            record.state_approved = true;
        })?;
        tracing::info!(contractor = %id.0, actor = %actor.label(), "state approval recorded");
        Ok(record)
    }

    /// The fast track: straight from `pending` to `approved`, taken only on
    /// the operator's explicit assertion that the contractor already holds
    /// state approval. Waives the fee and sends a welcome instead of an
    /// invoice.
    pub fn fast_track_approval(
        &self,
        id: &LifecycleId,
        actor: Actor,
        reason: Option<String>,
    ) -> Result<ContractorRecord, OnboardingServiceError> {
        let record = self.fetch(id)?;
        if record.state != ContractorState::Pending {
            return Err(TransitionError::InvalidTransition {
                from: record.state.label(),
                to: ContractorState::Approved.label(),
            }
            .into());
        }

        let command = TransitionCommand {
            to: ContractorState::Approved,
            actor,
            reason,
            path: PathTag::FastTrack,
            observed: Some(ContractorState::Pending),
        };
        let outcome = self.engine.transition(
            id,
            command,
            |record| {
                record.state_approved = true;
                record.fee_paid = true;
            },
            notification_plan,
        )?;
        Ok(outcome.record)
    }

    pub fn get(&self, id: &LifecycleId) -> Result<ContractorRecord, OnboardingServiceError> {
        self.fetch(id)
    }

    pub fn get_state(&self, id: &LifecycleId) -> Result<ContractorState, OnboardingServiceError> {
        Ok(self.fetch(id)?.state)
    }

    pub fn allowed_next(
        &self,
        id: &LifecycleId,
    ) -> Result<&'static [ContractorState], OnboardingServiceError> {
        Ok(self.fetch(id)?.state.allowed_next())
    }

    pub fn get_history(
        &self,
        id: &LifecycleId,
    ) -> Result<Vec<AuditEntry<ContractorState>>, OnboardingServiceError> {
        Ok(self.fetch(id)?.history)
    }

    pub fn notifications(
        &self,
        recipient: &str,
    ) -> Result<Vec<Notification>, OnboardingServiceError> {
        Ok(self.dispatcher.notifications_for(recipient)?)
    }

    fn fetch(&self, id: &LifecycleId) -> Result<ContractorRecord, OnboardingServiceError> {
        Ok(self.store.fetch(id)?.ok_or(StoreError::NotFound)?)
    }
}

fn notification_plan(record: &ContractorRecord) -> NotificationPlan {
    let mut context = BTreeMap::new();
    context.insert("contact_name".to_string(), record.contact_name.clone());
    context.insert("company".to_string(), record.company.clone());
    if let Some(fee) = &record.fee {
        context.insert("fee_amount".to_string(), format_cents(fee.amount_cents));
        context.insert("fee_due".to_string(), fee.due.format("%Y-%m-%d").to_string());
    }
    if let Some(reason) = record.history.last().and_then(|entry| entry.reason.clone()) {
        context.insert("decision_reason".to_string(), reason);
    }
    context
        .entry("decision_reason".to_string())
        .or_insert_with(|| "not specified".to_string());

    NotificationPlan {
        recipient: record.contractor.0.clone(),
        context,
    }
}

/// Error raised by the contractor onboarding service.
#[derive(Debug, thiserror::Error)]
pub enum OnboardingServiceError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("state approval has not been recorded for this contractor")]
    StateApprovalPending,
    #[error("direct approval from pending requires the fast-track assertion")]
    FastTrackRequired,
    #[error(transparent)]
    Store(#[from] StoreError),
}
