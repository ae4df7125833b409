//! HTTP request handlers

pub mod dashboard;
pub mod health;
pub mod movement;

pub use dashboard::get_dashboard;
pub use health::health_check;
pub use movement::{delete_movement, get_movement, list_movements, post_inflow, post_outflow};
