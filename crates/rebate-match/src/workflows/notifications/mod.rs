//! Notification records, the outbound channel seam, and the in-app feed.
//!
//! A transition commits first; the notification it owes is best-effort. A
//! render or delivery failure downgrades to a retained record with
//! `dispatched=false` and a log line — it never rolls the transition back.

mod dispatcher;
mod templates;

pub use dispatcher::{DispatchRequest, NotificationDispatcher};
pub use templates::{MessageTemplate, RenderError, TemplateKind};

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::lifecycle::{LifecycleId, StoreError};

/// Identifier for a notification record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct NotificationId(pub String);

/// Dedup key for one logical edge traversal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DispatchKey {
    pub lifecycle_id: LifecycleId,
    pub from: &'static str,
    pub to: &'static str,
    pub epoch: u32,
}

/// Message produced by a committed transition. Created before delivery is
/// attempted; `dispatched` flips only once the outbound channel confirms.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: NotificationId,
    pub recipient: String,
    pub lifecycle_id: LifecycleId,
    pub template: TemplateKind,
    pub subject: String,
    pub body: String,
    pub dispatched: bool,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub viewed_in_app: bool,
    /// Set when template rendering failed; the record is retained for
    /// operator follow-up instead of being dropped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub render_error: Option<String>,
    pub key: DispatchKey,
    pub created_at: DateTime<Utc>,
}

/// In-app feed storage.
pub trait NotificationStore: Send + Sync {
    fn append(&self, notification: Notification) -> Result<Notification, StoreError>;
    fn find_dispatch(&self, key: &DispatchKey) -> Result<Option<Notification>, StoreError>;
    fn for_recipient(&self, recipient: &str) -> Result<Vec<Notification>, StoreError>;
    fn undelivered(&self) -> Result<Vec<Notification>, StoreError>;
    fn set_dispatched(&self, id: &NotificationId, at: DateTime<Utc>) -> Result<(), StoreError>;
    fn mark_viewed(&self, id: &NotificationId) -> Result<(), StoreError>;
}

/// Outbound mail channel, implemented by the excluded delivery collaborator.
/// Fallible and non-blocking from the transition's point of view.
pub trait OutboundMailer: Send + Sync {
    fn send(&self, notification: &Notification) -> Result<(), DeliveryError>;
}

/// Outbound send failure.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("mail transport unavailable: {0}")]
    Transport(String),
}

/// Mutex-backed feed used by the demo server and the test harnesses.
#[derive(Default, Clone)]
pub struct InMemoryNotificationFeed {
    entries: Arc<Mutex<Vec<Notification>>>,
}

impl NotificationStore for InMemoryNotificationFeed {
    fn append(&self, notification: Notification) -> Result<Notification, StoreError> {
        let mut guard = self.entries.lock().expect("notification mutex poisoned");
        guard.push(notification.clone());
        Ok(notification)
    }

    fn find_dispatch(&self, key: &DispatchKey) -> Result<Option<Notification>, StoreError> {
        let guard = self.entries.lock().expect("notification mutex poisoned");
        Ok(guard.iter().find(|entry| &entry.key == key).cloned())
    }

    fn for_recipient(&self, recipient: &str) -> Result<Vec<Notification>, StoreError> {
        let guard = self.entries.lock().expect("notification mutex poisoned");
        Ok(guard
            .iter()
            .filter(|entry| entry.recipient == recipient)
            .cloned()
            .collect())
    }

    fn undelivered(&self) -> Result<Vec<Notification>, StoreError> {
        let guard = self.entries.lock().expect("notification mutex poisoned");
        Ok(guard
            .iter()
            .filter(|entry| !entry.dispatched)
            .cloned()
            .collect())
    }

    fn set_dispatched(&self, id: &NotificationId, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut guard = self.entries.lock().expect("notification mutex poisoned");
        let entry = guard
            .iter_mut()
            .find(|entry| &entry.id == id)
            .ok_or(StoreError::NotFound)?;
        entry.dispatched = true;
        entry.dispatched_at = Some(at);
        Ok(())
    }

    fn mark_viewed(&self, id: &NotificationId) -> Result<(), StoreError> {
        let mut guard = self.entries.lock().expect("notification mutex poisoned");
        let entry = guard
            .iter_mut()
            .find(|entry| &entry.id == id)
            .ok_or(StoreError::NotFound)?;
        entry.viewed_in_app = true;
        Ok(())
    }
}

impl InMemoryNotificationFeed {
    /// Everything ever appended, in creation order.
    pub fn all(&self) -> Vec<Notification> {
        self.entries
            .lock()
            .expect("notification mutex poisoned")
            .clone()
    }
}

/// Mailer that only records the send in the log stream. Stands in for the
/// real delivery collaborator in the demo server.
#[derive(Default, Clone)]
pub struct TracingMailer;

impl OutboundMailer for TracingMailer {
    fn send(&self, notification: &Notification) -> Result<(), DeliveryError> {
        tracing::info!(
            recipient = %notification.recipient,
            subject = %notification.subject,
            "outbound notification"
        );
        Ok(())
    }
}
