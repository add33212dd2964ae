//! Oracle price samples and the candidate price window.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Largest scale `Decimal` can represent.
const MAX_DECIMAL_SCALE: u32 = 28;

/// One oracle reading for a single pair index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSample {
    /// Oracle round number.
    pub round: u64,
    /// Number of decimals `raw_price` is scaled by.
    pub decimals: u32,
    /// Oracle timestamp (as reported by the feed).
    pub time: u64,
    /// Raw fixed-point price.
    pub raw_price: u128,
}

impl PriceSample {
    /// Human price: `raw_price / 10^decimals`, in exact decimal arithmetic.
    ///
    /// Fails for a zero price or one that does not fit a `Decimal`.
    pub fn human_price(&self) -> Result<Decimal> {
        if self.raw_price == 0 {
            return Err(CoreError::InvalidPrice(format!(
                "zero price at round {}",
                self.round
            )));
        }

        let mut raw = self.raw_price;
        let mut scale = self.decimals;
        // Drop excess precision beyond what Decimal can hold.
        while scale > MAX_DECIMAL_SCALE {
            raw /= 10;
            scale -= 1;
        }

        let mantissa = i128::try_from(raw)
            .map_err(|_| CoreError::InvalidPrice(format!("raw price {} too large", self.raw_price)))?;
        let price = Decimal::try_from_i128_with_scale(mantissa, scale)?;
        Ok(price.normalize())
    }
}

/// Inclusive price window `[from, to]` around a reference price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceBand {
    pub from: Decimal,
    pub to: Decimal,
}

impl PriceBand {
    /// Band of `price * (1 - rate)` to `price * (1 + rate)`.
    ///
    /// Fails when either edge overflows `Decimal`.
    pub fn around(price: Decimal, rate: Decimal) -> Result<Self> {
        let edge = |factor: Option<Decimal>| {
            factor
                .and_then(|f| price.checked_mul(f))
                .map(|v| v.normalize())
                .ok_or_else(|| {
                    CoreError::InvalidPrice(format!("band around {price} at rate {rate} overflows"))
                })
        };
        Ok(Self {
            from: edge(Decimal::ONE.checked_sub(rate))?,
            to: edge(Decimal::ONE.checked_add(rate))?,
        })
    }

    /// Whether `price` lies inside the band (inclusive).
    pub fn contains(&self, price: Decimal) -> bool {
        price >= self.from && price <= self.to
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_band_around_hundred() {
        let band = PriceBand::around(dec!(100), dec!(0.0002)).unwrap();
        assert_eq!(band.from, dec!(99.98));
        assert_eq!(band.to, dec!(100.02));
        assert_eq!(band.from.to_string(), "99.98");
        assert_eq!(band.to.to_string(), "100.02");
        assert!(band.contains(dec!(100)));
        assert!(band.contains(dec!(99.98)));
        assert!(!band.contains(dec!(100.03)));
    }

    #[test]
    fn test_human_price_18_decimals() {
        let sample = PriceSample {
            round: 1,
            decimals: 18,
            time: 1_700_000_000,
            raw_price: 65_000 * 10u128.pow(18),
        };
        assert_eq!(sample.human_price().unwrap(), dec!(65000));
    }

    #[test]
    fn test_human_price_fractional() {
        let sample = PriceSample {
            round: 7,
            decimals: 8,
            time: 0,
            raw_price: 108_523_456,
        };
        assert_eq!(sample.human_price().unwrap(), dec!(1.08523456));
    }

    #[test]
    fn test_human_price_rejects_zero() {
        let sample = PriceSample {
            round: 3,
            decimals: 18,
            time: 0,
            raw_price: 0,
        };
        assert!(matches!(
            sample.human_price(),
            Err(CoreError::InvalidPrice(_))
        ));
    }

    #[test]
    fn test_human_price_excess_scale() {
        let sample = PriceSample {
            round: 1,
            decimals: 30,
            time: 0,
            raw_price: 2 * 10u128.pow(30),
        };
        assert_eq!(sample.human_price().unwrap(), dec!(2));
    }

    #[test]
    fn test_band_overflow_is_an_error() {
        let sample = PriceSample {
            round: 9,
            decimals: 0,
            time: 0,
            raw_price: 79_228_162_514_264_337_593_543_950_335,
        };
        let price = sample.human_price().unwrap();
        assert_eq!(price, Decimal::MAX);

        assert!(matches!(
            PriceBand::around(price, dec!(0.0002)),
            Err(CoreError::InvalidPrice(_))
        ));
    }
}
