//! Stock movement ledger models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::MovementType;
use crate::units::MeasureUnit;

/// Header of a posted stock movement
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Movement {
    pub id: Uuid,
    /// Display name of the person responsible, kept for audit only
    pub user: String,
    /// Total value: sum of unit prices paid (inflow) or of sale values (outflow)
    pub value: Decimal,
    #[serde(rename = "type")]
    pub movement_type: MovementType,
    pub date: DateTime<Utc>,
    pub commentary: Option<String>,
}

/// Ingredient received in an inflow movement.
///
/// `name` is a snapshot taken at posting time so the line stays readable
/// after the ingredient is renamed or removed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MovementInflowLine {
    pub id: Uuid,
    pub movement_id: Uuid,
    pub name: String,
    /// Quantity in the unit the user entered, not the ingredient's native unit
    pub quantity: Decimal,
    pub price: Decimal,
    pub measure: MeasureUnit,
}

/// Product sold in an outflow movement
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MovementOutflowLine {
    pub id: Uuid,
    pub movement_id: Uuid,
    pub name: String,
    pub quantity: Decimal,
    /// Sale value of the line (product price times quantity)
    pub price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum MovementLines {
    Inflow(Vec<MovementInflowLine>),
    Outflow(Vec<MovementOutflowLine>),
}

impl MovementLines {
    pub fn len(&self) -> usize {
        match self {
            MovementLines::Inflow(lines) => lines.len(),
            MovementLines::Outflow(lines) => lines.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A movement together with its line items
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MovementRecord {
    #[serde(flatten)]
    pub movement: Movement,
    pub lines: MovementLines,
}

impl MovementRecord {
    pub fn inflow_lines(&self) -> &[MovementInflowLine] {
        match &self.lines {
            MovementLines::Inflow(lines) => lines,
            MovementLines::Outflow(_) => &[],
        }
    }

    pub fn outflow_lines(&self) -> &[MovementOutflowLine] {
        match &self.lines {
            MovementLines::Outflow(lines) => lines,
            MovementLines::Inflow(_) => &[],
        }
    }
}
