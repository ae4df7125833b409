//! Acting user
//!
//! Sign-in happens upstream of this service. The caller forwards the acting
//! user's display name and role in request headers and every movement is
//! stamped with that name.

use std::str::FromStr;

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use serde::Serialize;
use validator::Validate;

use crate::error::AppError;

pub const ACTOR_NAME_HEADER: &str = "x-actor-name";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Employee,
    Admin,
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "employee" => Ok(Role::Employee),
            "admin" => Ok(Role::Admin),
            other => Err(AppError::Unauthorized(format!("Unknown role: {}", other))),
        }
    }
}

/// User on whose behalf the request is made
#[derive(Debug, Clone, Validate)]
pub struct Actor {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub role: Role,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Read the actor from request headers. A missing role means employee.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, AppError> {
        let name = header_text(headers, ACTOR_NAME_HEADER)?
            .ok_or_else(|| AppError::Unauthorized("Missing acting user".to_string()))?;

        let role = match header_text(headers, ACTOR_ROLE_HEADER)? {
            Some(raw) => raw.parse()?,
            None => Role::Employee,
        };

        let actor = Actor { name, role };
        actor
            .validate()
            .map_err(|_| AppError::Unauthorized("Invalid acting user name".to_string()))?;
        Ok(actor)
    }
}

fn header_text(headers: &HeaderMap, name: &str) -> Result<Option<String>, AppError> {
    let Some(value) = headers.get(name) else {
        return Ok(None);
    };
    let text = std::str::from_utf8(value.as_bytes())
        .map_err(|_| AppError::Unauthorized(format!("Header {} is not valid UTF-8", name)))?
        .trim();

    Ok((!text.is_empty()).then(|| text.to_string()))
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Actor::from_headers(&parts.headers)
    }
}

/// Actor holding the admin role
#[derive(Debug, Clone)]
pub struct AdminActor(pub Actor);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AdminActor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let actor = Actor::from_request_parts(parts, state).await?;
        if !actor.is_admin() {
            return Err(AppError::InsufficientPermissions);
        }
        Ok(AdminActor(actor))
    }
}
