use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::documents::EvidenceReadiness;
use crate::workflows::lifecycle::{AuditEntry, Lifecycle, LifecycleId, LifecycleState};

/// Identifier wrapper for the customer who owns an application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerRef(pub String);

/// Status tracked through the rebate application lifecycle. `Rejected` is
/// reachable from every non-terminal state; `Completed` and `Rejected`
/// accept no further transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationState {
    PreliminaryEligibility,
    DocumentsRequested,
    DocumentsReceived,
    SubmittedToProgram,
    Approved,
    ContractorMatched,
    InstallationInProgress,
    Completed,
    Rejected,
}

impl LifecycleState for ApplicationState {
    fn initial() -> Self {
        Self::PreliminaryEligibility
    }

    fn allowed_next(self) -> &'static [Self] {
        match self {
            Self::PreliminaryEligibility => &[Self::DocumentsRequested, Self::Rejected],
            Self::DocumentsRequested => &[Self::DocumentsReceived, Self::Rejected],
            // Admins may re-request documents after reviewing what arrived.
            Self::DocumentsReceived => &[
                Self::SubmittedToProgram,
                Self::DocumentsRequested,
                Self::Rejected,
            ],
            Self::SubmittedToProgram => &[Self::Approved, Self::Rejected],
            Self::Approved => &[Self::ContractorMatched, Self::Rejected],
            Self::ContractorMatched => &[Self::InstallationInProgress, Self::Rejected],
            Self::InstallationInProgress => &[Self::Completed, Self::Rejected],
            Self::Completed | Self::Rejected => &[],
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::PreliminaryEligibility => "preliminary_eligibility",
            Self::DocumentsRequested => "documents_requested",
            Self::DocumentsReceived => "documents_received",
            Self::SubmittedToProgram => "submitted_to_program",
            Self::Approved => "approved",
            Self::ContractorMatched => "contractor_matched",
            Self::InstallationInProgress => "installation_in_progress",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        }
    }
}

/// Customer-provided intake payload captured by the form UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationIntake {
    pub customer: CustomerRef,
    pub customer_name: String,
    pub program: String,
    pub requested_amount_cents: u32,
    pub property_address: String,
}

/// A customer rebate application tracked through the finite state machine.
/// Mutated exclusively through validated transitions, never by direct field
/// assignment from call sites.
#[derive(Debug, Clone, Serialize)]
pub struct RebateApplication {
    pub id: LifecycleId,
    pub customer: CustomerRef,
    pub customer_name: String,
    pub program: String,
    pub requested_amount_cents: u32,
    pub property_address: String,
    pub state: ApplicationState,
    pub matched_contractor: Option<String>,
    pub last_updated: DateTime<Utc>,
    pub history: Vec<AuditEntry<ApplicationState>>,
}

impl Lifecycle for RebateApplication {
    type State = ApplicationState;

    fn lifecycle_id(&self) -> &LifecycleId {
        &self.id
    }

    fn current_state(&self) -> ApplicationState {
        self.state
    }

    fn apply_transition(&mut self, entry: AuditEntry<ApplicationState>) {
        self.state = entry.to;
        self.last_updated = entry.recorded_at;
        self.history.push(entry);
    }

    fn history(&self) -> &[AuditEntry<ApplicationState>] {
        &self.history
    }
}

/// Identifier for one submitted evidence item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EvidenceId(pub String);

/// Fixed vocabulary of proof attached to a lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    IncomeProof,
    OwnershipProof,
    ContractorLicense,
    InsuranceCertificate,
    Misc,
}

impl EvidenceKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::IncomeProof => "income_proof",
            Self::OwnershipProof => "ownership_proof",
            Self::ContractorLicense => "contractor_license",
            Self::InsuranceCertificate => "insurance_certificate",
            Self::Misc => "misc",
        }
    }
}

/// Review outcome for an evidence item. One-way: a rejected item is
/// superseded by a fresh submission, never un-rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationState {
    Submitted,
    Verified,
    Rejected,
}

impl VerificationState {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Verified => "verified",
            Self::Rejected => "rejected",
        }
    }
}

/// Metadata for one submitted document. The raw bytes stay with the
/// file-storage subsystem; only the storage key travels here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvidenceItem {
    pub id: EvidenceId,
    pub lifecycle_id: LifecycleId,
    pub kind: EvidenceKind,
    pub storage_key: String,
    pub verification: VerificationState,
    pub rejection_reason: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
    /// Set when a later submission of the same kind replaced this rejected
    /// item; superseded items drop out of readiness evaluation.
    pub superseded_by: Option<EvidenceId>,
}

/// Submission payload handed over by the upload subsystem once a file is
/// durably stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceSubmission {
    pub kind: EvidenceKind,
    pub storage_key: String,
}

/// Sanitized representation of an application's exposed status.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationStatusView {
    pub application_id: String,
    pub state: &'static str,
    pub allowed_next: Vec<&'static str>,
    pub readiness: EvidenceReadiness,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_contractor: Option<String>,
    pub last_updated: DateTime<Utc>,
}
