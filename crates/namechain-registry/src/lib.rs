//! namechain-registry: stateful registry, bridge controllers and registrar
//!
//! One `Chain` per side of the bridge holds a `ChainState` with every
//! registry, controller table, payment token and queued message of that side.
//! Operations run through `Chain::execute`, which makes them all-or-nothing.

pub mod access;
pub mod chain;
pub mod ejection;
pub mod error;
pub mod events;
pub mod hooks;
pub mod lookup;
pub mod migration;
pub mod registrar;
pub mod registry;
pub mod sequencing;
pub mod state;
pub mod store;
pub mod token;
pub mod transport;

pub use access::AccessControl;
pub use chain::Chain;
pub use ejection::EjectionController;
pub use error::{ErrorKind, RegistryError, Result};
pub use events::Event;
pub use hooks::{EjectionRequest, EjectionSink, TokenObserver};
pub use lookup::{NameInfo, NameLookup, ResolverMatch};
pub use migration::{LegacyName, MigrationController};
pub use registrar::{RegisterRequest, Registrar};
pub use registry::PermissionedRegistry;
pub use sequencing::{BridgeEnvelope, BridgeReceiver, BridgeSender};
pub use state::ChainState;
pub use store::{NameState, RegistryDatastore, RegistryEntry};
pub use token::{Erc20Ledger, ReturnBehavior};
pub use transport::{BridgeBroadcast, BridgeTransport};
