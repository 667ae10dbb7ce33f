use tokio::sync::broadcast;
use tutor_core::StatusEvent;

/// Single-channel fan-out of status changes to live observers.
///
/// Subscribers only see events published after they subscribed. Slow
/// subscribers that fall behind the channel capacity lose the oldest events.
#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<StatusEvent>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Fire-and-forget. Returns how many subscribers received the event.
    pub fn publish(&self, event: StatusEvent) -> usize {
        match self.tx.send(event) {
            Ok(receivers) => {
                tracing::debug!(receivers, "Status event published");
                receivers
            }
            Err(_) => {
                tracing::trace!("Status event dropped: no subscribers");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutor_core::Color;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_publish_without_subscribers_is_fine() {
        let notifier = Notifier::new(8);
        assert_eq!(notifier.publish(StatusEvent::answer("s1", Uuid::new_v4(), 3.0)), 0);
    }

    #[tokio::test]
    async fn test_all_subscribers_receive_event() {
        let notifier = Notifier::new(8);
        let mut a = notifier.subscribe();
        let mut b = notifier.subscribe();
        assert_eq!(notifier.subscriber_count(), 2);

        let id = Uuid::new_v4();
        assert_eq!(notifier.publish(StatusEvent::answer("s1", id, 8.0)), 2);

        for rx in [&mut a, &mut b] {
            let event = rx.recv().await.unwrap();
            assert_eq!(event.answer_id, Some(id));
            assert_eq!(event.color, Color::Green);
        }
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_no_backlog() {
        let notifier = Notifier::new(8);
        let _early = notifier.subscribe();
        notifier.publish(StatusEvent::answer("s1", Uuid::new_v4(), 1.0));

        let mut late = notifier.subscribe();
        assert!(late.try_recv().is_err());

        let id = Uuid::new_v4();
        notifier.publish(StatusEvent::answer("s1", id, 5.0));
        assert_eq!(late.recv().await.unwrap().answer_id, Some(id));
    }
}
