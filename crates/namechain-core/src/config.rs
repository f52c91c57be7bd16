//! Configuration types for pricing, registration and the bridge
//!
//! All configs are plain serde structs loaded from JSON. Integer amounts that
//! may exceed 64 bits (`U256`) are written as `"0x…"` hex strings.

use std::fmt;
use std::path::Path;

use alloy_primitives::{Address, U256};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::roles::{roles, RoleBitmap};

/// Fixed-point scale for discounts (1e18 = 100%)
pub const DISCOUNT_SCALE: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

pub const SECONDS_PER_DAY: u64 = 86_400;
pub const SECONDS_PER_YEAR: u64 = 365 * SECONDS_PER_DAY;

/// Sanity checks run after a config is deserialized
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

/// How a zero base rate is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroRatePolicy {
    /// Zero rate means the name costs nothing
    Free,
    /// Zero rate means names of that length cannot be registered
    #[default]
    Unsupported,
}

/// Behaviour past the last discount point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountOverflow {
    /// Hold the last point's discount
    #[default]
    Clamp,
    /// Continue along the last segment's slope (capped at 100%)
    Extrapolate,
}

/// One point of the piecewise-linear discount curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountPoint {
    /// Seconds added on top of the previous point's duration
    pub duration_delta: u64,
    /// Cumulative discount at this point, scaled by `DISCOUNT_SCALE`
    pub discount: U256,
}

/// Rent pricing parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Per-second rate by label length; index 0 is one character, the last
    /// entry covers every longer label
    pub base_rates: Vec<U256>,
    #[serde(default)]
    pub zero_rate_policy: ZeroRatePolicy,
    #[serde(default)]
    pub discount_points: Vec<DiscountPoint>,
    #[serde(default)]
    pub discount_overflow: DiscountOverflow,
    /// Premium right after the grace period ends
    pub initial_premium: U256,
    /// Seconds for the premium to halve
    pub premium_halving_period: u64,
    /// Seconds after the grace period at which the premium reaches zero
    pub premium_window: u64,
    /// Seconds after expiry during which no premium applies
    pub grace_period: u64,
    /// Decimals of the internal price unit
    pub price_decimals: u8,
}

impl Default for PricingConfig {
    /// USD with 12 decimals: 5+ chars $5/yr, 4 chars $160/yr, 3 chars $640/yr,
    /// 1-2 chars unsupported, $100M premium halving daily over 21 days.
    fn default() -> Self {
        let per_year = |usd: u64| U256::from(usd) * U256::from(10u64.pow(12)) / U256::from(SECONDS_PER_YEAR);
        Self {
            base_rates: vec![U256::ZERO, U256::ZERO, per_year(640), per_year(160), per_year(5)],
            zero_rate_policy: ZeroRatePolicy::Unsupported,
            discount_points: Vec::new(),
            discount_overflow: DiscountOverflow::Clamp,
            initial_premium: U256::from(100_000_000u64) * U256::from(10u64.pow(12)),
            premium_halving_period: SECONDS_PER_DAY,
            premium_window: 21 * SECONDS_PER_DAY,
            grace_period: 90 * SECONDS_PER_DAY,
            price_decimals: 12,
        }
    }
}

impl Validate for PricingConfig {
    fn validate(&self) -> Result<(), String> {
        if self.base_rates.is_empty() {
            return Err("base_rates must not be empty".into());
        }
        if self.premium_halving_period == 0 {
            return Err("premium_halving_period must be non-zero".into());
        }

        let mut previous = U256::ZERO;
        for (i, point) in self.discount_points.iter().enumerate() {
            if point.duration_delta == 0 {
                return Err(format!("discount_points[{}].duration_delta must be non-zero", i));
            }
            if point.discount > DISCOUNT_SCALE {
                return Err(format!("discount_points[{}].discount exceeds 100%", i));
            }
            if point.discount < previous {
                return Err(format!("discount_points[{}].discount decreases", i));
            }
            previous = point.discount;
        }

        Ok(())
    }
}

/// Commit-reveal registrar parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrarConfig {
    /// Seconds a commitment must age before it can be revealed
    pub min_commitment_age: u64,
    /// Seconds after which a commitment can no longer be revealed
    pub max_commitment_age: u64,
    #[serde(default = "default_min_registration_duration")]
    pub min_registration_duration: u64,
    /// Receives every payment
    pub beneficiary: Address,
    /// Roles granted to registrants on their token
    #[serde(default = "default_owner_roles")]
    pub owner_roles: RoleBitmap,
}

fn default_min_registration_duration() -> u64 {
    28 * SECONDS_PER_DAY
}

fn default_owner_roles() -> RoleBitmap {
    roles::OWNER_DEFAULT
}

impl RegistrarConfig {
    pub fn new(beneficiary: Address) -> Self {
        Self {
            min_commitment_age: 60,
            max_commitment_age: SECONDS_PER_DAY,
            min_registration_duration: default_min_registration_duration(),
            beneficiary,
            owner_roles: default_owner_roles(),
        }
    }
}

impl Validate for RegistrarConfig {
    fn validate(&self) -> Result<(), String> {
        if self.min_commitment_age >= self.max_commitment_age {
            return Err(format!(
                "min_commitment_age ({}) must be below max_commitment_age ({})",
                self.min_commitment_age, self.max_commitment_age
            ));
        }
        Ok(())
    }
}

/// Which side of the bridge a deployment is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    L1,
    L2,
}

impl Side {
    pub fn remote(self) -> Self {
        match self {
            Side::L1 => Side::L2,
            Side::L2 => Side::L1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::L1 => write!(f, "l1"),
            Side::L2 => write!(f, "l2"),
        }
    }
}

/// Ejection controller parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub side: Side,
    /// Top-level label whose registry the controller manages
    #[serde(default = "default_tld")]
    pub tld: String,
}

fn default_tld() -> String {
    "eth".to_string()
}

impl BridgeConfig {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            tld: default_tld(),
        }
    }
}

impl Validate for BridgeConfig {
    fn validate(&self) -> Result<(), String> {
        crate::name::validate_label(&self.tld).map_err(|e| format!("tld: {}", e))
    }
}

/// Read, parse and validate a JSON config file.
pub fn load_json_config<T>(path: impl AsRef<Path>) -> Result<T, ConfigError>
where
    T: DeserializeOwned + Validate,
{
    let path = path.as_ref();
    let display = path.display().to_string();

    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: display.clone(),
        source,
    })?;
    let config: T = serde_json::from_str(&raw).map_err(|source| ConfigError::Json {
        path: display.clone(),
        source,
    })?;
    config
        .validate()
        .map_err(|reason| ConfigError::Invalid { path: display, reason })?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_pricing_is_valid() {
        let config = PricingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.base_rates.len(), 5);
        assert!(config.base_rates[0].is_zero());
    }

    #[test]
    fn test_pricing_rejects_decreasing_discount() {
        let mut config = PricingConfig::default();
        config.discount_points = vec![
            DiscountPoint { duration_delta: 100, discount: U256::from(10u8) },
            DiscountPoint { duration_delta: 100, discount: U256::from(5u8) },
        ];
        assert!(config.validate().unwrap_err().contains("decreases"));
    }

    #[test]
    fn test_registrar_window_validation() {
        let mut config = RegistrarConfig::new(Address::ZERO);
        assert!(config.validate().is_ok());
        config.min_commitment_age = config.max_commitment_age;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_json_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let json = serde_json::to_string(&PricingConfig::default()).unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let loaded: PricingConfig = load_json_config(file.path()).unwrap();
        assert_eq!(loaded, PricingConfig::default());
    }

    #[test]
    fn test_load_json_config_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"side":"l1","tld":""}"#).unwrap();

        let result: Result<BridgeConfig, _> = load_json_config(file.path());
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_load_json_config_missing_file() {
        let result: Result<BridgeConfig, _> = load_json_config("/nonexistent/bridge.json");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_bridge_config_default_tld() {
        let config: BridgeConfig = serde_json::from_str(r#"{"side":"l2"}"#).unwrap();
        assert_eq!(config.tld, "eth");
        assert_eq!(config.side.remote(), Side::L1);
    }
}
