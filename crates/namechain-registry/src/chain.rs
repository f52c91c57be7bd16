//! Transaction boundary for one side of the bridge

use std::sync::Arc;

use namechain_core::Side;

use crate::error::Result;
use crate::events::Event;
use crate::state::ChainState;
use crate::transport::BridgeTransport;

/// A simulated chain: state plus the transport its bridge messages leave by
pub struct Chain {
    state: ChainState,
    transport: Arc<dyn BridgeTransport>,
}

impl Chain {
    pub fn new(side: Side, genesis_time: u64, transport: Arc<dyn BridgeTransport>) -> Self {
        Self {
            state: ChainState::new(side, genesis_time),
            transport,
        }
    }

    pub fn side(&self) -> Side {
        self.state.side()
    }

    pub fn now(&self) -> u64 {
        self.state.now()
    }

    pub fn set_time(&mut self, now: u64) {
        self.state.set_now(now);
    }

    pub fn advance_time(&mut self, seconds: u64) {
        let now = self.state.now().saturating_add(seconds);
        self.state.set_now(now);
    }

    pub fn state(&self) -> &ChainState {
        &self.state
    }

    /// Committed events, oldest first
    pub fn events(&self) -> &[Event] {
        self.state.events()
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        self.state.take_events()
    }

    /// Run `operation` atomically.
    ///
    /// On success queued bridge messages are published; on failure every
    /// mutation made by the operation is discarded.
    pub fn execute<T, F>(&mut self, operation: F) -> Result<T>
    where
        F: FnOnce(&mut ChainState) -> Result<T>,
    {
        let snapshot = self.state.clone();

        match operation(&mut self.state) {
            Ok(value) => {
                let outbox = self.state.take_outbox();
                if !outbox.is_empty() {
                    tracing::info!(side = %self.side(), messages = outbox.len(), "Publishing bridge messages");
                }
                for envelope in outbox {
                    self.transport.send(envelope);
                }
                Ok(value)
            }
            Err(e) => {
                tracing::warn!(side = %self.side(), code = e.code(), error = %e, "Transaction reverted");
                self.state = snapshot;
                Err(e)
            }
        }
    }
}
