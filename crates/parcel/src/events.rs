//! Fire-and-forget progress and outcome notifications.

use tokio::sync::broadcast;
use tracing::trace;

use crate::pointer::AttachmentId;

#[derive(Debug, Clone, PartialEq)]
pub enum AttachmentEvent {
    Progress {
        attachment_id: AttachmentId,
        fraction:      f64,
    },
    Completed {
        attachment_id: AttachmentId,
        bytes:         u64,
    },
    Failed {
        attachment_id: AttachmentId,
        reason:        String,
        bad_data:      bool,
    },
}

impl AttachmentEvent {
    pub fn attachment_id(&self) -> &AttachmentId {
        match self {
            AttachmentEvent::Progress { attachment_id, .. }
            | AttachmentEvent::Completed { attachment_id, .. }
            | AttachmentEvent::Failed { attachment_id, .. } => attachment_id,
        }
    }
}

/// Broadcast bus for [`AttachmentEvent`]s.
///
/// Publishing never waits on subscribers. With no subscriber the event is
/// dropped; a subscriber that falls more than `capacity` events behind sees
/// `RecvError::Lagged` and continues from the oldest retained event.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<AttachmentEvent>,
}

impl EventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: AttachmentEvent) {
        if self.tx.send(event).is_err() {
            trace!("no event subscribers");
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AttachmentEvent> { self.tx.subscribe() }

    pub fn subscriber_count(&self) -> usize { self.tx.receiver_count() }
}

impl Default for EventBus {
    fn default() -> Self { Self::new(64) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::RecvError;

    fn progress(fraction: f64) -> AttachmentEvent {
        AttachmentEvent::Progress {
            attachment_id: AttachmentId::new("a"),
            fraction,
        }
    }

    #[test]
    fn test_publish_without_subscribers_does_not_panic() {
        EventBus::new(4).publish(progress(0.5));
    }

    #[tokio::test]
    async fn test_subscriber_receives_in_order() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        bus.publish(progress(0.1));
        bus.publish(progress(0.2));
        assert_eq!(rx.recv().await.unwrap(), progress(0.1));
        assert_eq!(rx.recv().await.unwrap(), progress(0.2));
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags_instead_of_blocking() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        for i in 0..5 {
            bus.publish(progress(f64::from(i) / 10.0));
        }
        assert!(matches!(rx.recv().await, Err(RecvError::Lagged(3))));
        assert_eq!(rx.recv().await.unwrap(), progress(0.3));
    }

    #[test]
    fn test_event_exposes_attachment_id() {
        let event = AttachmentEvent::Completed {
            attachment_id: AttachmentId::new("x"),
            bytes:         1,
        };
        assert_eq!(event.attachment_id().as_str(), "x");
    }
}
