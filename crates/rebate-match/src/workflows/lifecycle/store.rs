use super::audit::AuditEntry;
use super::machine::{LifecycleState, TransitionError};
use super::LifecycleId;

/// Record-side contract the engine needs: identity, current state, and the
/// audit history that travels with the record.
pub trait Lifecycle: Clone + Send + 'static {
    type State: LifecycleState;

    fn lifecycle_id(&self) -> &LifecycleId;

    fn current_state(&self) -> Self::State;

    /// Apply a committed transition: set the new state, stamp `last_updated`,
    /// and append the audit entry. Called only inside a store commit, so the
    /// state write and the history append are a single atomic step.
    fn apply_transition(&mut self, entry: AuditEntry<Self::State>);

    fn history(&self) -> &[AuditEntry<Self::State>];
}

/// Storage abstraction guarding each record with a state compare-and-swap.
pub trait LifecycleStore<R: Lifecycle>: Send + Sync {
    fn insert(&self, record: R) -> Result<R, StoreError>;

    fn fetch(&self, id: &LifecycleId) -> Result<Option<R>, StoreError>;

    /// Run `apply` against the stored record and commit, but only if the
    /// persisted state still equals `expected` at write time. A lost race
    /// returns [`StoreError::StaleState`] and leaves the record untouched.
    fn commit_transition(
        &self,
        id: &LifecycleId,
        expected: R::State,
        apply: &mut dyn FnMut(&mut R),
    ) -> Result<R, StoreError>;

    /// Atomically update non-state domain fields (operator-recorded facts
    /// such as the contractor state-approval confirmation).
    fn mutate(&self, id: &LifecycleId, apply: &mut dyn FnMut(&mut R)) -> Result<R, StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("stale state: expected {expected}, found {found}")]
    StaleState {
        expected: &'static str,
        found: &'static str,
    },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for TransitionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => TransitionError::NotFound,
            StoreError::StaleState { expected, found } => {
                TransitionError::ConcurrentModification { expected, found }
            }
            StoreError::Conflict => TransitionError::Store("record already exists".to_string()),
            StoreError::Unavailable(detail) => TransitionError::Store(detail),
        }
    }
}
