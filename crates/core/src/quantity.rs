//! Stock quantities.

use core::fmt;
use core::ops::Neg;
use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Maximum number of fractional digits a quantity may carry.
pub const QUANTITY_SCALE: u32 = 4;

/// Total significant digits (integer + fraction).
pub const QUANTITY_PRECISION: u32 = 15;

/// Signed stock quantity (a balance or a movement delta).
///
/// Backed by an exact decimal with at most 4 fractional digits and 15 digits in total.
/// Serialized as a decimal string (`"12.5"`); deserializes from strings or JSON numbers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Quantity(Decimal);

impl Quantity {
    pub const ZERO: Quantity = Quantity(Decimal::ZERO);

    pub fn new(value: Decimal) -> DomainResult<Self> {
        let value = value.normalize();
        if value.scale() > QUANTITY_SCALE {
            return Err(DomainError::validation(format!(
                "quantity {value} has more than {QUANTITY_SCALE} decimal places"
            )));
        }
        if value.abs() >= max_magnitude() {
            return Err(DomainError::validation(format!(
                "quantity {value} exceeds {QUANTITY_PRECISION} digits"
            )));
        }
        Ok(Self(value))
    }

    pub fn from_i64(value: i64) -> DomainResult<Self> {
        Self::new(Decimal::from(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    pub fn checked_add(self, other: Quantity) -> DomainResult<Self> {
        let sum = self
            .0
            .checked_add(other.0)
            .ok_or_else(|| DomainError::validation("quantity overflow"))?;
        Self::new(sum)
    }

    pub fn checked_sub(self, other: Quantity) -> DomainResult<Self> {
        self.checked_add(-other)
    }

    pub fn checked_mul(self, factor: Quantity) -> DomainResult<Self> {
        let product = self
            .0
            .checked_mul(factor.0)
            .ok_or_else(|| DomainError::validation("quantity overflow"))?;
        Self::new(product)
    }

    /// Fixed 4-decimal rendering (`"3.0000"`), the format used by history listings.
    pub fn to_fixed_string(&self) -> String {
        format!("{:.4}", self.0)
    }
}

impl ValueObject for Quantity {}

impl Neg for Quantity {
    type Output = Quantity;

    fn neg(self) -> Self::Output {
        Quantity(-self.0)
    }
}

impl TryFrom<Decimal> for Quantity {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for Decimal {
    fn from(value: Quantity) -> Self {
        value.0
    }
}

impl FromStr for Quantity {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s.trim())
            .map_err(|e| DomainError::validation(format!("invalid quantity '{s}': {e}")))?;
        Self::new(value)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

fn max_magnitude() -> Decimal {
    Decimal::from(10i64.pow(QUANTITY_PRECISION - QUANTITY_SCALE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn q(s: &str) -> Quantity {
        s.parse().unwrap()
    }

    #[test]
    fn rejects_more_than_four_decimals() {
        assert!(matches!(
            Quantity::from_str("1.23456"),
            Err(DomainError::Validation(msg)) if msg.contains("decimal places")
        ));
        // Trailing zeros are normalized away first.
        assert_eq!(q("1.23450000"), q("1.2345"));
    }

    #[test]
    fn rejects_values_wider_than_fifteen_digits() {
        assert!(Quantity::from_str("99999999999.9999").is_ok());
        assert!(Quantity::from_str("100000000000").is_err());
        assert!(Quantity::from_str("-100000000000").is_err());
    }

    #[test]
    fn sign_helpers() {
        assert!(q("-0.0001").is_negative());
        assert!(q("0.0001").is_positive());
        assert!(!Quantity::ZERO.is_negative());
        assert!(!Quantity::ZERO.is_positive());
        assert_eq!(-q("3"), q("-3"));
    }

    #[test]
    fn fixed_rendering_uses_four_places() {
        assert_eq!(q("3").to_fixed_string(), "3.0000");
        assert_eq!(q("-1.5").to_fixed_string(), "-1.5000");
    }

    #[test]
    fn serde_uses_strings_and_accepts_numbers() {
        assert_eq!(serde_json::to_value(q("2.5")).unwrap(), serde_json::json!("2.5"));
        let from_number: Quantity = serde_json::from_value(serde_json::json!(7)).unwrap();
        assert_eq!(from_number, q("7"));
        assert!(serde_json::from_value::<Quantity>(serde_json::json!("0.00001")).is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 256, .. ProptestConfig::default() })]

        #[test]
        fn add_then_sub_is_identity(a in -1_000_000i64..1_000_000, b in -1_000_000i64..1_000_000) {
            let qa = Quantity::new(Decimal::new(a, 2)).unwrap();
            let qb = Quantity::new(Decimal::new(b, 3)).unwrap();
            let back = qa.checked_add(qb).unwrap().checked_sub(qb).unwrap();
            prop_assert_eq!(back, qa);
        }
    }
}
