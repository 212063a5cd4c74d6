use chrono::{DateTime, Utc};
use serde::Serialize;

use super::machine::LifecycleState;
use super::LifecycleId;

/// Party responsible for a transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    System,
    Operator(String),
    Customer(String),
}

impl Actor {
    pub fn label(&self) -> String {
        match self {
            Actor::System => "system".to_string(),
            Actor::Operator(id) => format!("operator:{id}"),
            Actor::Customer(id) => format!("customer:{id}"),
        }
    }
}

/// Immutable record of one committed transition. Never mutated or deleted;
/// a lifecycle's history is reconstructible by replaying its entries in
/// order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry<S> {
    pub lifecycle_id: LifecycleId,
    pub from: S,
    pub to: S,
    pub actor: Actor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Fold a history back into the state it produces, starting from the kind's
/// initial state. An empty history yields the initial state.
pub fn replay<S: LifecycleState>(entries: &[AuditEntry<S>]) -> S {
    entries.iter().fold(S::initial(), |_, entry| entry.to)
}

/// Number of times the given edge appears in a history. Used as the dispatch
/// attempt epoch: re-dispatching an already-committed traversal reuses the
/// same epoch, while a later re-traversal of the same edge gets a fresh one.
pub fn edge_epoch<S: LifecycleState>(entries: &[AuditEntry<S>], from: S, to: S) -> u32 {
    entries
        .iter()
        .filter(|entry| entry.from == from && entry.to == to)
        .count() as u32
}
