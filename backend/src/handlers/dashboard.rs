//! Dashboard handler

use axum::{extract::State, Json};
use chrono::Utc;

use crate::error::AppResult;
use crate::middleware::Actor;
use crate::services::{DashboardService, DashboardSummary};
use crate::AppState;

/// Get dashboard metrics for the current day
pub async fn get_dashboard(
    State(state): State<AppState>,
    _actor: Actor,
) -> AppResult<Json<DashboardSummary>> {
    let service = DashboardService::new(state.store.clone());
    let summary = service.summary(Utc::now().date_naive()).await?;
    Ok(Json(summary))
}
