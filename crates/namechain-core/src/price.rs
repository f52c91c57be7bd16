//! Rent pricing: base rates, expiry premium decay, duration discounts and
//! decimal conversion
//!
//! ## Premium
//!
//! After a name's grace period ends, re-registering it costs an extra premium
//! that starts at `initial_premium` and halves every `premium_halving_period`:
//! ```text
//! t        = now - (expiry + grace_period)
//! premium  = halving(initial, t, period) - halving(initial, window, period)   for 0 < t < window
//!          = 0                                                               otherwise
//! ```
//! Subtracting the value at the end of the window makes the premium reach zero
//! continuously instead of dropping from a small positive amount.
//!
//! ## Fractional halving
//!
//! `halving(v, n, d) ≈ v * 2^(-n/d)` in integer math. Whole halvings are a
//! right shift; the remaining fraction is quantized to 32 bits and applied as a
//! product of precomputed Q96 constants `2^(-1/2^k)`. Each of the up to 32
//! products floors, so the absolute error is a few dozen units at most. The
//! 1e-5 relative bound against the exact exponential therefore holds only for
//! results of at least 1e8 units, which is 1e-4 of a price unit at the
//! default 12 decimals.

use std::sync::OnceLock;

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::config::{DiscountOverflow, PricingConfig, Validate, ZeroRatePolicy, DISCOUNT_SCALE};
use crate::error::PriceError;

/// Fixed-point precision of the halving constants
const Q: usize = 96;

/// Bits of the fractional exponent
const FRACTION_BITS: usize = 32;

/// Rent price in the internal price unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PriceQuote {
    pub base: U256,
    pub premium: U256,
}

impl PriceQuote {
    pub fn total(&self) -> Result<U256, PriceError> {
        self.base
            .checked_add(self.premium)
            .ok_or(PriceError::Overflow { what: "quote total" })
    }
}

/// Pure pricing functions over a validated `PricingConfig`
#[derive(Debug, Clone)]
pub struct PriceCurve {
    config: PricingConfig,
}

impl PriceCurve {
    pub fn new(config: PricingConfig) -> Result<Self, PriceError> {
        config.validate().map_err(PriceError::InvalidConfig)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    /// Per-second rate for a label of `label_length` characters.
    pub fn rate(&self, label_length: usize) -> U256 {
        let rates = &self.config.base_rates;
        let index = label_length.clamp(1, rates.len()) - 1;
        rates[index]
    }

    /// Whether labels of this length can be priced at all.
    pub fn is_priced(&self, label_length: usize) -> bool {
        label_length > 0
            && (!self.rate(label_length).is_zero()
                || self.config.zero_rate_policy == ZeroRatePolicy::Free)
    }

    /// `rate(label_length) * duration`, without discount.
    pub fn base_price(&self, label_length: usize, duration: u64) -> Result<U256, PriceError> {
        self.rate(label_length)
            .checked_mul(U256::from(duration))
            .ok_or(PriceError::Overflow { what: "base price" })
    }

    /// Base price after the duration discount, rounded up.
    pub fn discounted_base_price(
        &self,
        label_length: usize,
        duration: u64,
    ) -> Result<U256, PriceError> {
        let base = self.base_price(label_length, duration)?;
        let keep = DISCOUNT_SCALE - self.discount(duration);
        let scaled = base
            .checked_mul(keep)
            .ok_or(PriceError::Overflow { what: "discounted base price" })?;
        Ok(div_ceil(scaled, DISCOUNT_SCALE))
    }

    /// Premium owed when registering at `now` a name that expired at `expiry`.
    pub fn premium(&self, expiry: u64, now: u64) -> U256 {
        let start = expiry.saturating_add(self.config.grace_period);
        if now <= start {
            return U256::ZERO;
        }

        let elapsed = now - start;
        let window = self.config.premium_window;
        if elapsed >= window {
            return U256::ZERO;
        }

        let period = self.config.premium_halving_period;
        let initial = self.config.initial_premium;
        halving(initial, elapsed, period).saturating_sub(halving(initial, window, period))
    }

    /// Cumulative discount for `duration`, scaled by `DISCOUNT_SCALE`.
    pub fn discount(&self, duration: u64) -> U256 {
        let mut start_time = 0u64;
        let mut start_discount = U256::ZERO;
        let mut slope: Option<(U256, u64)> = None;

        for point in &self.config.discount_points {
            let end_time = start_time.saturating_add(point.duration_delta);
            let rise = point.discount.saturating_sub(start_discount);

            if duration <= end_time {
                let progress = U256::from(duration - start_time);
                return start_discount + rise * progress / U256::from(point.duration_delta);
            }

            start_time = end_time;
            start_discount = point.discount;
            slope = Some((rise, point.duration_delta));
        }

        match (self.config.discount_overflow, slope) {
            (DiscountOverflow::Extrapolate, Some((rise, run))) => {
                let extra = rise * U256::from(duration - start_time) / U256::from(run);
                start_discount.saturating_add(extra).min(DISCOUNT_SCALE)
            }
            _ => start_discount,
        }
    }

    /// Full quote for registering or renewing `label`.
    ///
    /// `expiry` is the name's current expiry (0 if it has never been
    /// registered), which drives the premium.
    pub fn price(
        &self,
        label: &str,
        expiry: u64,
        duration: u64,
        now: u64,
    ) -> Result<PriceQuote, PriceError> {
        let length = label.chars().count();
        if !self.is_priced(length) {
            return Err(PriceError::LabelLengthNotPriced { length });
        }

        Ok(PriceQuote {
            base: self.discounted_base_price(length, duration)?,
            premium: self.premium(expiry, now),
        })
    }
}

/// Compute `value * 2^(-numerator/denominator)` with integer arithmetic.
///
/// A zero denominator means no decay. Within 1e-5 relative error for results
/// of at least 1e8, within 64 units absolute below that.
pub fn halving(value: U256, numerator: u64, denominator: u64) -> U256 {
    if denominator == 0 {
        return value;
    }

    let whole = numerator / denominator;
    if whole >= 256 {
        return U256::ZERO;
    }

    let mut result = value >> (whole as usize);
    let remainder = (numerator % denominator) as u128;
    let fraction = (remainder << FRACTION_BITS) / denominator as u128;

    let table = halving_table();
    for (k, constant) in table.iter().enumerate() {
        if fraction & (1u128 << (FRACTION_BITS - 1 - k)) != 0 {
            result = mul_q(result, *constant);
        }
    }

    result
}

/// `2^(-1/2^(k+1))` in Q96 for k in 0..32
fn halving_table() -> &'static [U256; FRACTION_BITS] {
    static TABLE: OnceLock<[U256; FRACTION_BITS]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [U256::ZERO; FRACTION_BITS];
        // sqrt(1/2) in Q96 = sqrt(2^191)
        let mut current = isqrt(U256::from(1u8) << (2 * Q - 1));
        for entry in table.iter_mut() {
            *entry = current;
            current = isqrt(current << Q);
        }
        table
    })
}

/// `floor(x * c / 2^96)` for `c < 2^96` without overflowing 256 bits
fn mul_q(x: U256, c: U256) -> U256 {
    let mask = (U256::from(1u8) << Q) - U256::from(1u8);
    let high = (x >> Q) * c;
    let low = ((x & mask) * c) >> Q;
    high + low
}

/// Integer square root (floor)
fn isqrt(n: U256) -> U256 {
    if n.is_zero() {
        return U256::ZERO;
    }

    let mut x = U256::from(1u8) << n.bit_len().div_ceil(2);
    loop {
        let y = (x + n / x) >> 1;
        if y >= x {
            return x;
        }
        x = y;
    }
}

fn div_ceil(numerator: U256, denominator: U256) -> U256 {
    let quotient = numerator / denominator;
    if (numerator % denominator).is_zero() {
        quotient
    } else {
        quotient + U256::from(1u8)
    }
}

/// Convert `amount` between fixed-point representations.
///
/// Scaling up is exact and fails with `AmountTooLarge` on overflow. Scaling
/// down rounds up, so a converted price never undercharges.
pub fn convert_decimals(
    amount: U256,
    from_decimals: u8,
    to_decimals: u8,
) -> Result<U256, PriceError> {
    use std::cmp::Ordering;

    let too_large = PriceError::AmountTooLarge {
        from_decimals,
        to_decimals,
    };

    match from_decimals.cmp(&to_decimals) {
        Ordering::Equal => Ok(amount),
        Ordering::Less => {
            if amount.is_zero() {
                return Ok(U256::ZERO);
            }
            let exponent = U256::from(to_decimals - from_decimals);
            U256::from(10u8)
                .checked_pow(exponent)
                .and_then(|factor| amount.checked_mul(factor))
                .ok_or(too_large)
        }
        Ordering::Greater => {
            let exponent = U256::from(from_decimals - to_decimals);
            match U256::from(10u8).checked_pow(exponent) {
                Some(factor) => Ok(div_ceil(amount, factor)),
                // the divisor exceeds any representable amount
                None if amount.is_zero() => Ok(U256::ZERO),
                None => Ok(U256::from(1u8)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DiscountPoint, SECONDS_PER_DAY, SECONDS_PER_YEAR};

    fn curve() -> PriceCurve {
        PriceCurve::new(PricingConfig::default()).unwrap()
    }

    fn scaled(percent: u64) -> U256 {
        DISCOUNT_SCALE * U256::from(percent) / U256::from(100u8)
    }

    #[test]
    fn test_rate_by_length() {
        let curve = curve();
        let rates = &curve.config().base_rates;
        assert_eq!(curve.rate(1), rates[0]);
        assert_eq!(curve.rate(3), rates[2]);
        assert_eq!(curve.rate(5), rates[4]);
        assert_eq!(curve.rate(42), rates[4]);
    }

    #[test]
    fn test_base_price() {
        let curve = curve();
        let rate = curve.rate(5);
        assert_eq!(curve.base_price(5, 1000).unwrap(), rate * U256::from(1000u64));
        assert_eq!(curve.base_price(5, 0).unwrap(), U256::ZERO);
    }

    #[test]
    fn test_zero_rate_policy() {
        let curve = curve();
        assert!(!curve.is_priced(1));
        assert!(curve.is_priced(3));
        assert_eq!(
            curve.price("ab", 0, SECONDS_PER_YEAR, 1),
            Err(PriceError::LabelLengthNotPriced { length: 2 })
        );

        let mut config = PricingConfig::default();
        config.zero_rate_policy = ZeroRatePolicy::Free;
        let free = PriceCurve::new(config).unwrap();
        let quote = free.price("ab", 0, SECONDS_PER_YEAR, 1).unwrap();
        assert_eq!(quote.base, U256::ZERO);
    }

    #[test]
    fn test_label_length_counts_characters() {
        let curve = curve();
        // 3 characters, 9 bytes
        let quote = curve.price("日本語", 0, 100, 1).unwrap();
        assert_eq!(quote.base, curve.rate(3) * U256::from(100u64));
    }

    #[test]
    fn test_premium_boundaries() {
        let curve = curve();
        let grace = curve.config().grace_period;
        let expiry = 1_700_000_000u64;

        assert_eq!(curve.premium(expiry, expiry), U256::ZERO);
        assert_eq!(curve.premium(expiry, expiry + grace), U256::ZERO);
        assert!(curve.premium(expiry, expiry + grace + 1) > U256::ZERO);

        let window = curve.config().premium_window;
        assert_eq!(curve.premium(expiry, expiry + grace + window), U256::ZERO);
    }

    #[test]
    fn test_premium_halves_daily() {
        let curve = curve();
        let grace = curve.config().grace_period;
        let initial = curve.config().initial_premium;
        let end = halving(initial, curve.config().premium_window, SECONDS_PER_DAY);

        let day_one = curve.premium(0, grace + SECONDS_PER_DAY);
        assert_eq!(day_one, (initial >> 1) - end);

        let day_two = curve.premium(0, grace + 2 * SECONDS_PER_DAY);
        assert_eq!(day_two, (initial >> 2) - end);
    }

    #[test]
    fn test_never_registered_name_has_no_premium() {
        let curve = curve();
        let now = 1_700_000_000u64;
        assert_eq!(curve.premium(0, now), U256::ZERO);
    }

    #[test]
    fn test_halving_exact_powers() {
        let value = U256::from(1u64 << 40);
        assert_eq!(halving(value, 0, 10), value);
        assert_eq!(halving(value, 10, 10), value >> 1);
        assert_eq!(halving(value, 30, 10), value >> 3);
        assert_eq!(halving(value, 10 * 300, 10), U256::ZERO);
        assert_eq!(halving(value, 5, 0), value);
    }

    #[test]
    fn test_halving_half_step() {
        // 2^(-1/2) = 0.70710678118...
        let value = U256::from(10u64.pow(18));
        let result: u128 = halving(value, 1, 2).try_into().unwrap();
        let expected = 707_106_781_186_547_524u128;
        let diff = result.abs_diff(expected);
        assert!(diff < 10, "got {}, expected ~{}", result, expected);
    }

    #[test]
    fn test_halving_table_first_entries() {
        let table = halving_table();
        let one = U256::from(1u8) << Q;
        assert!(table[0] < one);
        // each entry is the square root of the previous one, approaching 1
        for pair in table.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        assert!(table[31] < one);
    }

    #[test]
    fn test_discount_interpolation() {
        let mut config = PricingConfig::default();
        config.discount_points = vec![
            DiscountPoint { duration_delta: SECONDS_PER_YEAR, discount: U256::ZERO },
            DiscountPoint { duration_delta: SECONDS_PER_YEAR, discount: scaled(10) },
            DiscountPoint { duration_delta: 2 * SECONDS_PER_YEAR, discount: scaled(20) },
        ];
        let curve = PriceCurve::new(config.clone()).unwrap();

        assert_eq!(curve.discount(0), U256::ZERO);
        assert_eq!(curve.discount(SECONDS_PER_YEAR), U256::ZERO);
        assert_eq!(curve.discount(SECONDS_PER_YEAR + SECONDS_PER_YEAR / 2), scaled(5));
        assert_eq!(curve.discount(2 * SECONDS_PER_YEAR), scaled(10));
        assert_eq!(curve.discount(3 * SECONDS_PER_YEAR), scaled(15));
        assert_eq!(curve.discount(4 * SECONDS_PER_YEAR), scaled(20));

        // clamped past the last point
        assert_eq!(curve.discount(10 * SECONDS_PER_YEAR), scaled(20));

        config.discount_overflow = DiscountOverflow::Extrapolate;
        let curve = PriceCurve::new(config).unwrap();
        assert_eq!(curve.discount(6 * SECONDS_PER_YEAR), scaled(30));
        assert_eq!(curve.discount(1000 * SECONDS_PER_YEAR), DISCOUNT_SCALE);
    }

    #[test]
    fn test_discounted_base_rounds_up() {
        let mut config = PricingConfig::default();
        config.base_rates = vec![U256::from(1u8)];
        config.discount_points = vec![DiscountPoint { duration_delta: 3, discount: scaled(50) }];
        let curve = PriceCurve::new(config).unwrap();

        // base 3, discount 50% -> 1.5 rounds up to 2
        assert_eq!(curve.discounted_base_price(5, 3).unwrap(), U256::from(2u8));
    }

    #[test]
    fn test_convert_decimals_identity() {
        let amount = U256::from(123_456u64);
        assert_eq!(convert_decimals(amount, 6, 6).unwrap(), amount);
        assert_eq!(convert_decimals(amount, 0, 0).unwrap(), amount);
    }

    #[test]
    fn test_convert_decimals_scale_up() {
        assert_eq!(
            convert_decimals(U256::from(5u8), 6, 18).unwrap(),
            U256::from(5_000_000_000_000u64)
        );
        assert_eq!(
            convert_decimals(U256::from(1u8), 0, 77).unwrap(),
            U256::from(10u8).pow(U256::from(77u8))
        );
    }

    #[test]
    fn test_convert_decimals_scale_down_rounds_up() {
        assert_eq!(convert_decimals(U256::from(1001u64), 3, 0).unwrap(), U256::from(2u8));
        assert_eq!(convert_decimals(U256::from(1000u64), 3, 0).unwrap(), U256::from(1u8));
        assert_eq!(convert_decimals(U256::from(1u8), 18, 6).unwrap(), U256::from(1u8));
        assert_eq!(convert_decimals(U256::ZERO, 18, 6).unwrap(), U256::ZERO);
        assert_eq!(convert_decimals(U256::from(7u8), 200, 0).unwrap(), U256::from(1u8));
    }

    #[test]
    fn test_convert_decimals_overflow() {
        let result = convert_decimals(U256::MAX, 6, 18);
        assert_eq!(
            result,
            Err(PriceError::AmountTooLarge { from_decimals: 6, to_decimals: 18 })
        );
        assert!(convert_decimals(U256::from(1u8), 0, 78).is_err());
        assert_eq!(convert_decimals(U256::ZERO, 0, 100).unwrap(), U256::ZERO);
    }

    #[test]
    fn test_quote_total() {
        let quote = PriceQuote { base: U256::from(3u8), premium: U256::from(4u8) };
        assert_eq!(quote.total().unwrap(), U256::from(7u8));

        let overflow = PriceQuote { base: U256::MAX, premium: U256::from(1u8) };
        assert!(overflow.total().is_err());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = PricingConfig::default();
        config.premium_halving_period = 0;
        assert!(matches!(PriceCurve::new(config), Err(PriceError::InvalidConfig(_))));
    }
}
