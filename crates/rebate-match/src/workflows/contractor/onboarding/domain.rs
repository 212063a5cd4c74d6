use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::lifecycle::{AuditEntry, Lifecycle, LifecycleId, LifecycleState};

/// Identifier wrapper for the contractor behind an onboarding record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContractorRef(pub String);

/// Status tracked through contractor onboarding. Two edges converge on
/// `Approved`: the standard fee-paid path out of `PaymentPending` and the
/// operator-asserted fast track out of `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractorState {
    Pending,
    DetailsRequested,
    AwaitingStateApproval,
    InvoiceSent,
    PaymentPending,
    Approved,
    Suspended,
    Deactivated,
}

impl LifecycleState for ContractorState {
    fn initial() -> Self {
        Self::Pending
    }

    fn allowed_next(self) -> &'static [Self] {
        match self {
            // The direct `Approved` edge is the fast track; the service only
            // takes it through the explicit fast-track operation.
            Self::Pending => &[Self::DetailsRequested, Self::Approved],
            Self::DetailsRequested => &[Self::AwaitingStateApproval],
            Self::AwaitingStateApproval => &[Self::InvoiceSent],
            Self::InvoiceSent => &[Self::PaymentPending],
            Self::PaymentPending => &[Self::Approved],
            Self::Approved => &[Self::Suspended, Self::Deactivated],
            Self::Suspended => &[Self::Approved, Self::Deactivated],
            Self::Deactivated => &[],
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::DetailsRequested => "details_requested",
            Self::AwaitingStateApproval => "awaiting_state_approval",
            Self::InvoiceSent => "invoice_sent",
            Self::PaymentPending => "payment_pending",
            Self::Approved => "approved",
            Self::Suspended => "suspended",
            Self::Deactivated => "deactivated",
        }
    }
}

/// Registration payload captured by the onboarding form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractorIntake {
    pub contractor: ContractorRef,
    pub company: String,
    pub contact_name: String,
    pub service_areas: Vec<String>,
}

/// Fee terms fixed when the invoice goes out. Never rewritten afterwards,
/// even if the policy changes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OnboardingFee {
    pub amount_cents: u32,
    pub due: NaiveDate,
    pub invoiced_at: DateTime<Utc>,
}

/// A contractor onboarding record tracked through the finite state machine.
#[derive(Debug, Clone, Serialize)]
pub struct ContractorRecord {
    pub id: LifecycleId,
    pub contractor: ContractorRef,
    pub company: String,
    pub contact_name: String,
    pub service_areas: Vec<String>,
    pub state: ContractorState,
    /// Operator-recorded fact that the state program approved this
    /// contractor. Gate for the invoice edge; set implicitly on fast track.
    pub state_approved: bool,
    pub fee: Option<OnboardingFee>,
    pub fee_paid: bool,
    pub last_updated: DateTime<Utc>,
    pub history: Vec<AuditEntry<ContractorState>>,
}

impl Lifecycle for ContractorRecord {
    type State = ContractorState;

    fn lifecycle_id(&self) -> &LifecycleId {
        &self.id
    }

    fn current_state(&self) -> ContractorState {
        self.state
    }

    fn apply_transition(&mut self, entry: AuditEntry<ContractorState>) {
        self.state = entry.to;
        self.last_updated = entry.recorded_at;
        self.history.push(entry);
    }

    fn history(&self) -> &[AuditEntry<ContractorState>] {
        &self.history
    }
}

/// Sanitized representation of a contractor's exposed status.
#[derive(Debug, Clone, Serialize)]
pub struct ContractorStatusView {
    pub contractor_id: String,
    pub company: String,
    pub state: &'static str,
    pub allowed_next: Vec<&'static str>,
    pub state_approved: bool,
    pub fee_paid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee: Option<OnboardingFee>,
    pub last_updated: DateTime<Utc>,
}

impl ContractorRecord {
    pub fn status_view(&self) -> ContractorStatusView {
        ContractorStatusView {
            contractor_id: self.id.0.clone(),
            company: self.company.clone(),
            state: self.state.label(),
            allowed_next: self
                .state
                .allowed_next()
                .iter()
                .map(|state| state.label())
                .collect(),
            state_approved: self.state_approved,
            fee_paid: self.fee_paid,
            fee: self.fee,
            last_updated: self.last_updated,
        }
    }
}
