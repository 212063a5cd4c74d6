//! Generic lifecycle engine shared by the rebate application and contractor
//! onboarding workflows.
//!
//! The pattern is the same for both kinds: a finite state enum with a
//! per-state allowed-next table, an append-only audit trail, an optimistic
//! compare-and-swap on the persisted state, and a templated notification on
//! every committed edge. The engine owns that mechanism once; the two
//! services only supply their tables, records, and message context.

mod audit;
mod engine;
mod machine;
mod memory;
mod store;

pub use audit::{edge_epoch, replay, Actor, AuditEntry};
pub use engine::{LifecycleEngine, NotificationPlan, TransitionCommand, TransitionOutcome};
pub use machine::{LifecycleState, PathTag, TransitionError};
pub use memory::InMemoryLifecycleStore;
pub use store::{Lifecycle, LifecycleStore, StoreError};

use serde::{Deserialize, Serialize};

/// Opaque identifier shared by both lifecycle kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LifecycleId(pub String);

/// The two lifecycle kinds tracked by the marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleKind {
    RebateApplication,
    ContractorOnboarding,
}

impl LifecycleKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::RebateApplication => "rebate_application",
            Self::ContractorOnboarding => "contractor_onboarding",
        }
    }
}
