//! WebAssembly module for the Kitchen Inventory Management service
//!
//! Lets the movement form check entries before submitting them, using the
//! same parsing and conversion rules as the server:
//! - Localized quantity and price parsing
//! - Unit conversion between grams, kilograms and counts

use rust_decimal::Decimal;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::types::*;
pub use shared::units::*;
pub use shared::validation::*;

/// Parse a localized entry (`"1.234,56"`) and return it in canonical form
/// (`"1234.56"`), or `None` when the server would reject it.
#[wasm_bindgen]
pub fn normalize_quantity(raw: &str) -> Option<String> {
    parse_localized_decimal(raw).ok().map(|value| value.to_string())
}

/// Message explaining why an entry would be rejected, if it would be
#[wasm_bindgen]
pub fn quantity_error(raw: &str) -> Option<String> {
    parse_localized_decimal(raw).err().map(|err| err.to_string())
}

/// Whether stock kept in `to` can be topped up with an entry made in `from`
#[wasm_bindgen]
pub fn is_convertible(from: &str, to: &str) -> bool {
    match (from.parse::<MeasureUnit>(), to.parse::<MeasureUnit>()) {
        (Ok(from), Ok(to)) => convert(Decimal::ONE, from, to).is_ok(),
        _ => false,
    }
}

/// Convert a localized entry between units and format it back for display
#[wasm_bindgen]
pub fn convert_quantity(raw: &str, from: &str, to: &str) -> Option<String> {
    let quantity = parse_localized_decimal(raw).ok()?;
    let from = from.parse::<MeasureUnit>().ok()?;
    let to = to.parse::<MeasureUnit>().ok()?;
    convert(quantity, from, to).ok().map(format_localized_decimal)
}
