//! Common types used across the service

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Direction of a stock movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementType {
    /// Purchase or receipt of ingredients
    #[serde(rename = "in")]
    Inflow,
    /// Sale of products, consuming ingredients through their recipes
    #[serde(rename = "out")]
    Outflow,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Inflow => "in",
            MovementType::Outflow => "out",
        }
    }
}

impl std::fmt::Display for MovementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MovementType::Inflow => write!(f, "Inflow"),
            MovementType::Outflow => write!(f, "Outflow"),
        }
    }
}

/// Raised when a stored or submitted movement type code is not `in` or `out`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown movement type '{0}'")]
pub struct MovementTypeParseError(pub String);

impl std::str::FromStr for MovementType {
    type Err = MovementTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in" => Ok(MovementType::Inflow),
            "out" => Ok(MovementType::Outflow),
            other => Err(MovementTypeParseError(other.to_string())),
        }
    }
}
