//! Request extractors shared by the API handlers

pub mod actor;

pub use actor::{Actor, AdminActor, Role, ACTOR_NAME_HEADER, ACTOR_ROLE_HEADER};
