//! Outbound bridge transport
//!
//! Committed transactions hand their queued envelopes to a `BridgeTransport`.
//! `BridgeBroadcast` fans them out to any number of relayers over a tokio
//! broadcast channel; a relayer that falls behind sees `RecvError::Lagged`
//! and must resynchronise from the sender's sequence numbers.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::sequencing::BridgeEnvelope;

/// Broadcast channel capacity
const BROADCAST_CAPACITY: usize = 1024;

/// Sink for committed outbound messages
pub trait BridgeTransport: Send + Sync {
    /// Publish one envelope. Delivery is fire-and-forget.
    fn send(&self, envelope: BridgeEnvelope);
}

/// Bridge envelope broadcast channel
#[derive(Clone)]
pub struct BridgeBroadcast {
    tx: broadcast::Sender<Arc<BridgeEnvelope>>,
}

impl BridgeBroadcast {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { tx }
    }

    /// Broadcast an envelope to all subscribed relayers
    ///
    /// Returns the number of receivers that got the envelope, 0 if nobody
    /// is subscribed.
    pub fn broadcast(&self, envelope: BridgeEnvelope) -> usize {
        let sequence = envelope.sequence;
        match self.tx.send(Arc::new(envelope)) {
            Ok(count) => {
                tracing::debug!(receivers = count, sequence, "Broadcast bridge envelope");
                count
            }
            Err(_) => {
                tracing::debug!(sequence, "No relayer subscribed, envelope dropped");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<BridgeEnvelope>> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BridgeBroadcast {
    fn default() -> Self {
        Self::new()
    }
}

impl BridgeTransport for BridgeBroadcast {
    fn send(&self, envelope: BridgeEnvelope) {
        self.broadcast(envelope);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Bytes, U256};
    use namechain_core::Side;

    fn envelope(sequence: u64) -> BridgeEnvelope {
        BridgeEnvelope {
            origin: Side::L2,
            token: U256::from(1u8),
            sequence,
            payload: Bytes::from_static(&[0x03]),
        }
    }

    #[test]
    fn test_broadcast_no_receivers() {
        let broadcast = BridgeBroadcast::new();
        assert_eq!(broadcast.broadcast(envelope(0)), 0);
    }

    #[test]
    fn test_broadcast_with_receiver() {
        let broadcast = BridgeBroadcast::new();
        let mut rx = broadcast.subscribe();

        assert_eq!(broadcast.broadcast(envelope(0)), 1);
        broadcast.send(envelope(1));

        assert_eq!(rx.try_recv().unwrap().sequence, 0);
        assert_eq!(rx.try_recv().unwrap().sequence, 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_subscriber_count() {
        let broadcast = BridgeBroadcast::new();
        assert_eq!(broadcast.subscriber_count(), 0);

        let _rx1 = broadcast.subscribe();
        let _rx2 = broadcast.clone().subscribe();
        assert_eq!(broadcast.subscriber_count(), 2);
    }
}
