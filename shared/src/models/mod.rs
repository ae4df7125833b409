//! Domain models for the Kitchen Inventory Management service

mod catalog;
mod movement;

pub use catalog::*;
pub use movement::*;
