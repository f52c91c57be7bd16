//! Synchronous hooks a registry invokes inside the calling transaction
//!
//! Implementations are installed in `ChainState` under their address and get
//! the same `&mut ChainState` as the operation that triggered them. Effects
//! made before a hook fails are only undone when the operation runs through
//! `Chain::execute`, so sinks validate in `check_eject` before the transfer
//! moves ownership.

use alloy_primitives::{Address, U256};

use crate::error::Result;
use crate::state::ChainState;

/// A token transfer into a hook-carrying address
#[derive(Debug, Clone, Copy)]
pub struct EjectionRequest<'a> {
    pub registry: Address,
    pub operator: Address,
    pub from: Address,
    pub token_id: U256,
    /// Caller supplied transfer data
    pub data: &'a [u8],
}

/// Receives tokens and turns them into outbound bridge traffic
pub trait EjectionSink: Send + Sync {
    /// Reject a transfer before any state changes.
    fn check_eject(&self, _state: &ChainState, _request: EjectionRequest<'_>) -> Result<()> {
        Ok(())
    }

    fn on_eject(&self, state: &mut ChainState, request: EjectionRequest<'_>) -> Result<()>;
}

/// Notified about lifecycle changes of tokens it observes
pub trait TokenObserver: Send + Sync {
    fn on_renew(
        &self,
        state: &mut ChainState,
        registry: Address,
        token_id: U256,
        new_expiry: u64,
        renewed_by: Address,
    ) -> Result<()>;

    fn on_relinquish(
        &self,
        state: &mut ChainState,
        registry: Address,
        token_id: U256,
        relinquished_by: Address,
    ) -> Result<()>;
}
