//! namechain-core: stateless building blocks of the cross-chain name registry
//!
//! This crate holds everything that does not need registry state:
//! - `name`: DNS wire-format names, label hashes, namehash, versioned token ids
//! - `roles`: 256-bit role bitmaps with admin counterparts
//! - `price`: base rates, premium decay, duration discounts, decimal conversion
//! - `message`: type-tagged binary codec for ejection, migration and renewal messages
//! - `config`: JSON configuration for pricing, registration and the bridge
//!
//! The stateful registry, bridge controllers and registrar live in
//! `namechain-registry`.

mod config;
mod error;
pub mod message;
pub mod name;
pub mod price;
pub mod roles;

pub use config::{
    load_json_config, BridgeConfig, DiscountOverflow, DiscountPoint, PricingConfig,
    RegistrarConfig, Side, Validate, ZeroRatePolicy, DISCOUNT_SCALE, SECONDS_PER_DAY,
    SECONDS_PER_YEAR,
};
pub use error::{CodecError, ConfigError, Error, NameError, PriceError};
pub use message::{BridgeMessage, MessageType, MigrationData, TransferData};
pub use price::{convert_decimals, halving, PriceCurve, PriceQuote};
pub use roles::{RoleBitmap, ROOT_RESOURCE};

pub use alloy_primitives::{Address, Bytes, B256, U256};

pub type Result<T> = std::result::Result<T, Error>;

/// Unix timestamp in seconds
pub type Timestamp = u64;
