//! Shared types and models for the Kitchen Inventory Management service
//!
//! This crate contains the domain types and the pure quantity rules shared
//! between the backend and the browser (via WASM).

pub mod models;
pub mod types;
pub mod units;
pub mod validation;

pub use models::*;
pub use types::*;
pub use units::*;
pub use validation::*;
