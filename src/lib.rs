//! namechain: cross-chain name registry
//!
//! Re-exports the workspace members:
//! - `namechain_core`: name codec, token ids, roles, pricing, bridge messages, config
//! - `namechain_registry`: datastore, permissioned registry, ejection and
//!   migration controllers, registrar and the atomic chain boundary

pub use namechain_core;
pub use namechain_registry;

pub use namechain_core::{Address, BridgeMessage, Bytes, Side, B256, U256};
pub use namechain_registry::{Chain, ChainState, RegistryError};
