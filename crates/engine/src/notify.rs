//! Change notifications.
//!
//! After an operation commits, the engine hands a [`LedgerNotification`] to
//! the configured [`NotificationSink`]. Delivery (fan-out, retries, dropping
//! slow consumers) is entirely the sink's business; the engine holds no
//! connection state.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::BalanceChange;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerNotification {
    pub group_id: String,
    pub affected_balances: Vec<BalanceChange>,
    pub new_group_total_minor: i64,
}

pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: LedgerNotification);
}

/// Fans notifications out to every live subscriber.
///
/// Sending with no subscribers is not an error: the notification is dropped.
#[derive(Clone, Debug)]
pub struct BroadcastSink {
    tx: broadcast::Sender<LedgerNotification>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerNotification> {
        self.tx.subscribe()
    }
}

impl NotificationSink for BroadcastSink {
    fn notify(&self, notification: LedgerNotification) {
        let group_id = notification.group_id.clone();
        match self.tx.send(notification) {
            Ok(receivers) => tracing::debug!("ledger change for {group_id} sent to {receivers} subscriber(s)"),
            Err(_) => tracing::trace!("ledger change for {group_id} dropped: no subscribers"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_sink_delivers_to_subscribers() {
        let sink = BroadcastSink::new(8);
        let mut rx = sink.subscribe();

        sink.notify(LedgerNotification {
            group_id: "g".to_string(),
            affected_balances: Vec::new(),
            new_group_total_minor: 42,
        });

        let received = rx.recv().await.unwrap();
        assert_eq!(received.group_id, "g");
        assert_eq!(received.new_group_total_minor, 42);
    }

    #[test]
    fn broadcast_sink_without_subscribers_drops_silently() {
        let sink = BroadcastSink::new(1);
        sink.notify(LedgerNotification {
            group_id: "g".to_string(),
            affected_balances: Vec::new(),
            new_group_total_minor: 0,
        });
    }
}
