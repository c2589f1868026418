//! Fixed-point math utilities for deterministic simulation.
//!
//! All combat arithmetic uses fixed-point numbers so that two observers
//! running the same battle on different CPUs see the same numbers.
//! Floating-point values only appear at the edges: when authored data is
//! parsed, and when results are exported for humans.

use fixed::types::I32F32;

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
/// Range: approximately -2,147,483,648 to 2,147,483,647
/// Precision: approximately 0.00000000023
pub type Fixed = I32F32;

/// Build a fixed-point ratio `num / den` from integers.
///
/// Returns zero when `den` is zero.
#[must_use]
pub fn ratio(num: i32, den: i32) -> Fixed {
    if den == 0 {
        return Fixed::ZERO;
    }
    Fixed::from_num(num) / Fixed::from_num(den)
}

/// Clamp a value to be at least zero.
#[inline]
#[must_use]
pub fn non_negative(value: Fixed) -> Fixed {
    value.max(Fixed::ZERO)
}

/// Convert a fixed-point number to `f64` for display and export.
#[inline]
#[must_use]
pub fn to_f64(value: Fixed) -> f64 {
    value.to_num::<f64>()
}

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries. Used for
/// engine snapshots and replays.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

/// Serde support for hand-authored fixed-point numbers.
///
/// Unit templates, crests and scenario files are written by people, so
/// they use plain decimals (`attack_speed: 0.75`). Parsing happens once,
/// before any simulation runs; the simulation itself never sees a float.
pub mod fixed_decimal {
    use super::Fixed;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize a fixed-point number as a decimal.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(value.to_num::<f64>())
    }

    /// Deserialize a fixed-point number from a decimal.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        if !value.is_finite() {
            return Err(D::Error::custom(format!("{value} is not a finite number")));
        }
        Fixed::checked_from_num(value)
            .ok_or_else(|| D::Error::custom(format!("{value} is out of fixed-point range")))
    }
}
