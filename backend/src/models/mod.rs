//! Domain models for the kitchen inventory backend
//!
//! Re-exports the shared crate so services import from one place

pub use shared::models::*;
pub use shared::types::*;
pub use shared::units::*;
pub use shared::validation::*;
