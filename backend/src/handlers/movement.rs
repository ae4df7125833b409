//! Stock movement HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{Actor, AdminActor};
use crate::models::{Movement, MovementRecord};
use crate::services::{InflowLineInput, MovementFilter, MovementService, OutflowLineInput};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PostInflowRequest {
    #[serde(default)]
    pub lines: Vec<InflowLineInput>,
    pub commentary: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PostOutflowRequest {
    #[serde(default)]
    pub lines: Vec<OutflowLineInput>,
    pub commentary: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MovementListResponse {
    pub movements: Vec<Movement>,
}

/// Register a purchase of ingredients
pub async fn post_inflow(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<PostInflowRequest>,
) -> AppResult<(StatusCode, Json<MovementRecord>)> {
    let service = MovementService::new(state.store.clone());
    let record = service
        .post_inflow(request.lines, request.commentary, &actor.name)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Register a sale of products
pub async fn post_outflow(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<PostOutflowRequest>,
) -> AppResult<(StatusCode, Json<MovementRecord>)> {
    let service = MovementService::new(state.store.clone());
    let record = service
        .post_outflow(request.lines, request.commentary, &actor.name)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// List movement headers, newest first
pub async fn list_movements(
    State(state): State<AppState>,
    _actor: Actor,
    Query(filter): Query<MovementFilter>,
) -> AppResult<Json<MovementListResponse>> {
    let service = MovementService::new(state.store.clone());
    let movements = service.list_movements(&filter).await?;
    Ok(Json(MovementListResponse { movements }))
}

/// Get a movement with its lines
pub async fn get_movement(
    State(state): State<AppState>,
    _actor: Actor,
    Path(movement_id): Path<Uuid>,
) -> AppResult<Json<MovementRecord>> {
    let service = MovementService::new(state.store.clone());
    let record = service.get_movement(movement_id).await?;
    Ok(Json(record))
}

/// Remove a movement from the ledger. Stock levels are left as they are.
pub async fn delete_movement(
    State(state): State<AppState>,
    AdminActor(actor): AdminActor,
    Path(movement_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = MovementService::new(state.store.clone());
    service.delete_movement(movement_id).await?;
    tracing::info!(movement_id = %movement_id, admin = %actor.name, "Movement deleted");
    Ok(StatusCode::NO_CONTENT)
}
