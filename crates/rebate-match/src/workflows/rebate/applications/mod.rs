//! Customer rebate application lifecycle: intake, document gating, operator
//! transitions, and the evidence-driven auto-advance.

pub mod documents;
pub mod domain;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use documents::{DocumentGate, EvidenceReadiness};
pub use domain::{
    ApplicationIntake, ApplicationState, ApplicationStatusView, CustomerRef, EvidenceId,
    EvidenceItem, EvidenceKind, EvidenceSubmission, RebateApplication, VerificationState,
};
pub use repository::{EvidenceStore, InMemoryEvidenceStore};
pub use router::application_router;
pub use service::{EvidenceError, EvidenceIngest, RebateApplicationService, RebateServiceError};
