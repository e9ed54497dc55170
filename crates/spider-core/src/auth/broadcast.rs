use tokio::sync::broadcast;
use tracing::debug;

use super::AuthSession;

/// Queued snapshots per subscriber before a slow one starts lagging.
const BROADCAST_CAPACITY: usize = 16;

/// What happened to a published snapshot.
///
/// `NoSubscribers` is expected (no UI open) and callers ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Delivered(usize),
    NoSubscribers,
}

/// Fan-out of `state-updated` snapshots to every subscriber.
#[derive(Debug, Clone)]
pub struct StateBroadcaster {
    tx: broadcast::Sender<AuthSession>,
}

impl Default for StateBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl StateBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthSession> {
        self.tx.subscribe()
    }

    pub fn publish(&self, snapshot: AuthSession) -> PublishOutcome {
        match self.tx.send(snapshot) {
            Ok(receivers) => PublishOutcome::Delivered(receivers),
            Err(_) => {
                debug!("No subscribers for state update");
                PublishOutcome::NoSubscribers
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers() {
        let broadcaster = StateBroadcaster::new();
        assert_eq!(
            broadcaster.publish(AuthSession::default()),
            PublishOutcome::NoSubscribers
        );
    }

    #[tokio::test]
    async fn test_subscribers_see_updates_in_order() {
        let broadcaster = StateBroadcaster::new();
        let mut rx = broadcaster.subscribe();

        for token in ["a", "b"] {
            let snapshot = AuthSession {
                token: Some(token.to_string()),
                ..AuthSession::default()
            };
            assert_eq!(broadcaster.publish(snapshot), PublishOutcome::Delivered(1));
        }

        assert_eq!(rx.recv().await.unwrap().token.as_deref(), Some("a"));
        assert_eq!(rx.recv().await.unwrap().token.as_deref(), Some("b"));
    }
}
