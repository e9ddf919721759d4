//! Notification dispatch after commit.
//!
//! Delivery transport is out of scope; a [`Notifier`] only reports whether
//! the attempt went through. Outcomes are appended to the store's
//! notification ledger and never fail the operation that produced the
//! event.

use std::sync::Arc;

use async_trait::async_trait;
use lifecycle_log::{
    EventId, LifecycleEvent, LifecycleEventType, LifecycleStore, NotificationChannel,
    NotificationOutcome,
};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification transport failed: {0}")]
    Transport(String),
}

/// Channels each event type is announced on.
pub fn channels_for(event_type: LifecycleEventType) -> &'static [NotificationChannel] {
    use NotificationChannel::*;
    match event_type {
        LifecycleEventType::OrderPlaced => &[Email],
        LifecycleEventType::ItemClaimed => &[Push],
        LifecycleEventType::ItemRejected => &[],
        LifecycleEventType::ItemStatusChanged => &[Email, Sms],
        LifecycleEventType::OrderStatusChanged => &[Email, Push],
        LifecycleEventType::OrderCancelled => &[Email, Sms],
    }
}

/// Sends one notification for one event.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        channel: NotificationChannel,
        event: &LifecycleEvent,
    ) -> Result<(), NotifyError>;
}

/// Notifier that only logs. Every attempt counts as delivered.
#[derive(Debug, Clone, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify(
        &self,
        channel: NotificationChannel,
        event: &LifecycleEvent,
    ) -> Result<(), NotifyError> {
        tracing::info!(
            channel = %channel,
            event_type = %event.event_type,
            order_id = %event.order_id,
            item_id = ?event.item_id,
            "notification sent"
        );
        Ok(())
    }
}

/// A delivery captured by [`InMemoryNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub channel: NotificationChannel,
    pub event_id: EventId,
    pub event_type: LifecycleEventType,
}

#[derive(Debug, Default)]
struct InMemoryNotifierState {
    sent: Vec<SentNotification>,
    fail: bool,
}

/// In-memory notifier for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotifier {
    state: Arc<RwLock<InMemoryNotifierState>>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following attempt fail (or succeed again).
    pub async fn set_fail(&self, fail: bool) {
        self.state.write().await.fail = fail;
    }

    /// Successful deliveries so far.
    pub async fn sent(&self) -> Vec<SentNotification> {
        self.state.read().await.sent.clone()
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn notify(
        &self,
        channel: NotificationChannel,
        event: &LifecycleEvent,
    ) -> Result<(), NotifyError> {
        let mut state = self.state.write().await;

        if state.fail {
            return Err(NotifyError::Transport("channel unavailable".to_string()));
        }

        state.sent.push(SentNotification {
            channel,
            event_id: event.event_id,
            event_type: event.event_type,
        });
        Ok(())
    }
}

/// Notifies every channel of every committed event and records the outcomes.
///
/// Failures are logged and swallowed: the events are already durable.
pub async fn dispatch_notifications<S>(store: &S, notifier: &dyn Notifier, events: &[LifecycleEvent])
where
    S: LifecycleStore + ?Sized,
{
    for event in events {
        for &channel in channels_for(event.event_type) {
            let outcome = match notifier.notify(channel, event).await {
                Ok(()) => NotificationOutcome::delivered(),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        channel = %channel,
                        event_id = %event.event_id,
                        "notification failed"
                    );
                    NotificationOutcome::failed(e.to_string())
                }
            };

            let label = if outcome.succeeded { "sent" } else { "failed" };
            metrics::counter!(
                "notifications_total",
                "channel" => channel.as_str(),
                "outcome" => label
            )
            .increment(1);

            if let Err(e) = store.record_notification(event.event_id, channel, outcome).await {
                tracing::warn!(
                    error = %e,
                    channel = %channel,
                    event_id = %event.event_id,
                    "failed to record notification attempt"
                );
            }
        }
    }
}
