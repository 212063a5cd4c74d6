//! Lifecycle orchestration for a rebate-matching marketplace.
//!
//! Two linked lifecycles share one transition engine: a customer rebate
//! application moving from preliminary eligibility to installation
//! completion, and a contractor onboarding record moving from application to
//! active, fee-paid, state-approved status. Every state change is validated
//! against a per-kind transition table, committed under an optimistic
//! compare-and-swap together with its audit entry, and announced through the
//! notification dispatcher.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
