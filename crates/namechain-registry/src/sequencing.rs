//! Per-name ordering of bridge messages
//!
//! The bridge only guarantees eventual delivery. Messages about different
//! names may be applied in any order, but messages about the same name must be
//! applied in the order they were sent (an ejection before the renewal that
//! follows it). Every outbound message is wrapped in an envelope numbered per
//! canonical id:
//!
//! ```text
//! BridgeEnvelope { origin, token: canonical id, sequence: 0, 1, 2, ..., payload }
//! ```
//!
//! The receiving side applies sequence `n` only after `n - 1`. Earlier
//! sequences are rejected as stale, later ones are parked until the gap fills.
//! A parked envelope stays parked until it is applied, and a resend with the
//! same sequence replaces it.

use std::collections::{BTreeMap, HashMap};

use alloy_primitives::{Bytes, U256};
use namechain_core::name::canonical_id;
use namechain_core::Side;
use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, Result};

/// An encoded bridge message with its ordering metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeEnvelope {
    /// Side that sent the message
    pub origin: Side,
    /// Canonical id of the name the message concerns
    pub token: U256,
    pub sequence: u64,
    /// Encoded `BridgeMessage`
    pub payload: Bytes,
}

/// Outbound sequence counters
#[derive(Debug, Clone, Default)]
pub struct BridgeSender {
    next: HashMap<U256, u64>,
}

impl BridgeSender {
    /// Allocate the next sequence number for `token`.
    pub fn next_sequence(&mut self, token: U256) -> u64 {
        let slot = self.next.entry(canonical_id(token)).or_insert(0);
        let sequence = *slot;
        *slot += 1;
        sequence
    }

    /// Number of messages sent so far for `token`
    pub fn sent(&self, token: U256) -> u64 {
        self.next.get(&canonical_id(token)).copied().unwrap_or(0)
    }
}

/// Inbound sequence guard
#[derive(Debug, Clone, Default)]
pub struct BridgeReceiver {
    next: HashMap<U256, u64>,
    parked: HashMap<U256, BTreeMap<u64, BridgeEnvelope>>,
}

impl BridgeReceiver {
    /// Sequence number the next applied message for `token` must carry
    pub fn expected(&self, token: U256) -> u64 {
        self.next.get(&canonical_id(token)).copied().unwrap_or(0)
    }

    /// Decide what to do with an arriving envelope.
    ///
    /// Returns the envelope back if it can be applied now, `None` if it was
    /// parked behind a gap.
    pub fn admit(&mut self, envelope: BridgeEnvelope) -> Result<Option<BridgeEnvelope>> {
        let token = canonical_id(envelope.token);
        let expected = self.expected(token);

        if envelope.sequence < expected {
            return Err(RegistryError::StaleMessage {
                token,
                sequence: envelope.sequence,
                expected,
            });
        }

        if envelope.sequence > expected {
            let sequence = envelope.sequence;
            let replaced = self
                .parked
                .entry(token)
                .or_default()
                .insert(sequence, envelope)
                .is_some();
            tracing::debug!(
                token = %token,
                sequence,
                expected,
                replaced,
                "Parked out-of-order bridge message"
            );
            return Ok(None);
        }

        Ok(Some(envelope))
    }

    /// Mark the expected message for `token` as applied.
    ///
    /// Returns a copy of the parked envelope that has become ready, if any.
    /// It stays parked until it is completed in turn.
    pub fn complete(&mut self, token: U256) -> Option<BridgeEnvelope> {
        let token = canonical_id(token);
        let applied = self.expected(token);
        let next = applied + 1;
        self.next.insert(token, next);

        let queue = self.parked.get_mut(&token)?;
        queue.remove(&applied);
        let ready = queue.get(&next).cloned();
        if queue.is_empty() {
            self.parked.remove(&token);
        }
        ready
    }

    /// Envelopes waiting behind a gap, across all names
    pub fn parked_count(&self) -> usize {
        self.parked.values().map(BTreeMap::len).sum()
    }
}
