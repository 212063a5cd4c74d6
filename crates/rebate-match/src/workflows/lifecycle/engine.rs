use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

use chrono::Utc;

use super::audit::{edge_epoch, Actor, AuditEntry};
use super::machine::{LifecycleState, PathTag, TransitionError};
use super::store::{Lifecycle, LifecycleStore};
use super::{LifecycleId, LifecycleKind};
use crate::workflows::notifications::{DispatchRequest, Notification, NotificationDispatcher};

/// A requested transition, before validation.
#[derive(Debug, Clone)]
pub struct TransitionCommand<S> {
    pub to: S,
    pub actor: Actor,
    pub reason: Option<String>,
    pub path: PathTag,
    /// State the caller observed. When set, the commit is conditioned on the
    /// persisted state still matching it at write time (the evidence
    /// auto-advance); when absent the engine validates against the state it
    /// reads itself, still under the store's compare-and-swap.
    pub observed: Option<S>,
}

impl<S: LifecycleState> TransitionCommand<S> {
    pub fn new(to: S, actor: Actor) -> Self {
        Self {
            to,
            actor,
            reason: None,
            path: PathTag::Standard,
            observed: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_path(mut self, path: PathTag) -> Self {
        self.path = path;
        self
    }

    pub fn observed(mut self, state: S) -> Self {
        self.observed = Some(state);
        self
    }
}

/// Recipient and context for the notification a committed transition emits.
#[derive(Debug, Clone)]
pub struct NotificationPlan {
    pub recipient: String,
    pub context: BTreeMap<String, String>,
}

/// Result of a committed transition.
#[derive(Debug, Clone)]
pub struct TransitionOutcome<R> {
    pub record: R,
    /// Absent only when the notification feed itself failed; the committed
    /// transition stands regardless.
    pub notification: Option<Notification>,
}

/// Shared transition driver: validate against the state table, commit the
/// state change and audit entry under the store's compare-and-swap, then
/// hand the edge to the notification dispatcher.
///
/// Instantiated once per lifecycle kind; the services own no transition
/// mechanics of their own.
pub struct LifecycleEngine<R, T> {
    kind: LifecycleKind,
    store: Arc<T>,
    dispatcher: Arc<NotificationDispatcher>,
    _record: PhantomData<fn() -> R>,
}

impl<R, T> LifecycleEngine<R, T>
where
    R: Lifecycle,
    T: LifecycleStore<R>,
{
    pub fn new(kind: LifecycleKind, store: Arc<T>, dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self {
            kind,
            store,
            dispatcher,
            _record: PhantomData,
        }
    }

    /// Drive one transition end to end. `mutate` applies domain-field changes
    /// bound to this edge (fee fixing, match recording) inside the same
    /// commit; `plan` builds the notification recipient and context from the
    /// committed record. A failed validation or a lost race leaves the record
    /// untouched and creates no notification.
    pub fn transition(
        &self,
        id: &LifecycleId,
        command: TransitionCommand<R::State>,
        mutate: impl FnOnce(&mut R),
        plan: impl FnOnce(&R) -> NotificationPlan,
    ) -> Result<TransitionOutcome<R>, TransitionError> {
        let record = self.store.fetch(id)?.ok_or(TransitionError::NotFound)?;
        let from = command.observed.unwrap_or_else(|| record.current_state());

        if !from.can_move_to(command.to) {
            return Err(TransitionError::InvalidTransition {
                from: from.label(),
                to: command.to.label(),
            });
        }

        let entry = AuditEntry {
            lifecycle_id: id.clone(),
            from,
            to: command.to,
            actor: command.actor,
            reason: command.reason,
            recorded_at: Utc::now(),
        };

        let mut commit = Some((entry, mutate));
        let committed = self.store.commit_transition(id, from, &mut |record| {
            if let Some((entry, mutate)) = commit.take() {
                record.apply_transition(entry);
                mutate(record);
            }
        })?;

        let epoch = edge_epoch(committed.history(), from, command.to);
        let plan = plan(&committed);
        let request = DispatchRequest {
            kind: self.kind,
            lifecycle_id: id.clone(),
            from: from.label(),
            to: command.to.label(),
            path: command.path,
            epoch,
            recipient: plan.recipient,
            context: plan.context,
        };

        let notification = match self.dispatcher.dispatch(request) {
            Ok(notification) => Some(notification),
            Err(err) => {
                tracing::error!(
                    lifecycle = %id.0,
                    error = %err,
                    "notification feed unavailable; transition stands"
                );
                None
            }
        };

        Ok(TransitionOutcome {
            record: committed,
            notification,
        })
    }
}
