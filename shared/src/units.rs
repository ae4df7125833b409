//! Measurement units and conversion between them
//!
//! Mass units convert between each other; count-based ingredients only
//! convert to themselves and are never reinterpreted as mass.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unit in which an ingredient is stocked or a quantity was entered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeasureUnit {
    #[serde(rename = "g")]
    Grams,
    #[serde(rename = "kg")]
    Kilograms,
    #[serde(rename = "unit")]
    Count,
}

impl MeasureUnit {
    pub const ALL: [MeasureUnit; 3] = [MeasureUnit::Grams, MeasureUnit::Kilograms, MeasureUnit::Count];

    pub fn code(&self) -> &'static str {
        match self {
            MeasureUnit::Grams => "g",
            MeasureUnit::Kilograms => "kg",
            MeasureUnit::Count => "unit",
        }
    }

}

impl std::fmt::Display for MeasureUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Raised when a unit code is not one of `g`, `kg` or `unit`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown unit of measure '{0}'")]
pub struct UnitParseError(pub String);

impl std::str::FromStr for MeasureUnit {
    type Err = UnitParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "g" => Ok(MeasureUnit::Grams),
            "kg" => Ok(MeasureUnit::Kilograms),
            "unit" => Ok(MeasureUnit::Count),
            other => Err(UnitParseError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("cannot convert {from} to {to}")]
    UnsupportedConversion { from: MeasureUnit, to: MeasureUnit },

    #[error("quantity too large to convert {from} to {to}")]
    Overflow { from: MeasureUnit, to: MeasureUnit },
}

const GRAMS_PER_KILOGRAM: Decimal = Decimal::from_parts(1000, 0, 0, false, 0);

/// Convert a quantity between units.
///
/// | from | to | result |
/// |------|----|--------|
/// | g    | kg | q / 1000 |
/// | kg   | g  | q * 1000 |
/// | x    | x  | q |
///
/// Any pair mixing `unit` with a mass unit is rejected, as is a result
/// outside the range of `Decimal`.
pub fn convert(quantity: Decimal, from: MeasureUnit, to: MeasureUnit) -> Result<Decimal, ConversionError> {
    use MeasureUnit::*;

    match (from, to) {
        (Grams, Kilograms) => Ok(quantity / GRAMS_PER_KILOGRAM),
        (Kilograms, Grams) => quantity
            .checked_mul(GRAMS_PER_KILOGRAM)
            .ok_or(ConversionError::Overflow { from, to }),
        (Grams, Grams) | (Kilograms, Kilograms) | (Count, Count) => Ok(quantity),
        _ => Err(ConversionError::UnsupportedConversion { from, to }),
    }
}
