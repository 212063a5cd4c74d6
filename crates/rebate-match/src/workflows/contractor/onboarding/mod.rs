//! Contractor onboarding lifecycle: registration, the standard
//! details/state-approval/invoice/payment path, and the operator-asserted
//! fast track straight to approved.

pub mod domain;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    ContractorIntake, ContractorRecord, ContractorRef, ContractorState, ContractorStatusView,
    OnboardingFee,
};
pub use router::contractor_router;
pub use service::{ContractorOnboardingService, OnboardingFeePolicy, OnboardingServiceError};
