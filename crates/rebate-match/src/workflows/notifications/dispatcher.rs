use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;

use super::templates;
use super::{
    DispatchKey, Notification, NotificationId, NotificationStore, OutboundMailer,
};
use crate::workflows::lifecycle::{LifecycleId, LifecycleKind, PathTag, StoreError};

/// One committed edge traversal to announce.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub kind: LifecycleKind,
    pub lifecycle_id: LifecycleId,
    pub from: &'static str,
    pub to: &'static str,
    pub path: PathTag,
    pub epoch: u32,
    pub recipient: String,
    pub context: BTreeMap<String, String>,
}

static NOTIFICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_notification_id() -> NotificationId {
    let id = NOTIFICATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    NotificationId(format!("ntf-{id:06}"))
}

/// Maps a committed edge to a rendered, delivered notification.
///
/// Delivery is at-least-once from the caller's side; the dedup key keeps the
/// receiving side idempotent — re-dispatching an already-announced traversal
/// returns the existing record without a second send.
pub struct NotificationDispatcher {
    feed: Arc<dyn NotificationStore>,
    mailer: Arc<dyn OutboundMailer>,
}

impl NotificationDispatcher {
    pub fn new(feed: Arc<dyn NotificationStore>, mailer: Arc<dyn OutboundMailer>) -> Self {
        Self { feed, mailer }
    }

    /// Select, render, deliver, and record the notification for one edge.
    /// Only a feed failure surfaces as an error; render and delivery
    /// failures downgrade to a retained undispatched record.
    pub fn dispatch(&self, request: DispatchRequest) -> Result<Notification, StoreError> {
        let key = DispatchKey {
            lifecycle_id: request.lifecycle_id.clone(),
            from: request.from,
            to: request.to,
            epoch: request.epoch,
        };
        if let Some(existing) = self.feed.find_dispatch(&key)? {
            return Ok(existing);
        }

        let template = templates::select(request.kind, request.from, request.to, request.path);

        let mut context = request.context;
        context
            .entry("reference".to_string())
            .or_insert_with(|| request.lifecycle_id.0.clone());
        context
            .entry("from_state".to_string())
            .or_insert_with(|| request.from.to_string());
        context
            .entry("to_state".to_string())
            .or_insert_with(|| request.to.to_string());

        let mut notification = Notification {
            id: next_notification_id(),
            recipient: request.recipient,
            lifecycle_id: request.lifecycle_id,
            template: template.kind,
            subject: template.subject.to_string(),
            body: template.body.to_string(),
            dispatched: false,
            dispatched_at: None,
            viewed_in_app: false,
            render_error: None,
            key,
            created_at: Utc::now(),
        };

        match templates::render(template, &context) {
            Ok((subject, body)) => {
                notification.subject = subject;
                notification.body = body;
            }
            Err(err) => {
                tracing::warn!(
                    lifecycle = %notification.lifecycle_id.0,
                    template = ?template.kind,
                    error = %err,
                    "notification render failed; retained for follow-up"
                );
                notification.render_error = Some(err.to_string());
                return self.feed.append(notification);
            }
        }

        match self.mailer.send(&notification) {
            Ok(()) => {
                notification.dispatched = true;
                notification.dispatched_at = Some(Utc::now());
            }
            Err(err) => {
                tracing::warn!(
                    lifecycle = %notification.lifecycle_id.0,
                    recipient = %notification.recipient,
                    error = %err,
                    "outbound delivery failed; notification retained"
                );
            }
        }

        self.feed.append(notification)
    }

    /// Re-attempt delivery for retained notifications that rendered cleanly
    /// but never reached the outbound channel. Returns the ones delivered on
    /// this pass.
    pub fn retry_undelivered(&self) -> Result<Vec<Notification>, StoreError> {
        let mut delivered = Vec::new();
        for notification in self.feed.undelivered()? {
            if notification.render_error.is_some() {
                continue;
            }
            if self.mailer.send(&notification).is_ok() {
                let at = Utc::now();
                self.feed.set_dispatched(&notification.id, at)?;
                let mut sent = notification;
                sent.dispatched = true;
                sent.dispatched_at = Some(at);
                delivered.push(sent);
            }
        }
        Ok(delivered)
    }

    pub fn notifications_for(&self, recipient: &str) -> Result<Vec<Notification>, StoreError> {
        self.feed.for_recipient(recipient)
    }

    pub fn mark_viewed(&self, id: &NotificationId) -> Result<(), StoreError> {
        self.feed.mark_viewed(id)
    }
}
