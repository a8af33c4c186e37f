//! Crew roster API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{success, ApiResponse, ApiResult};
use crate::errors::AppError;
use crate::models::{CreateCrewRequest, CrewRecord};
use crate::roster::{RosterPage, RosterQuery, RosterStore};
use crate::AppState;

/// Largest page a single query may ask for.
pub const MAX_PAGE_ROWS: usize = 500;

/// POST /api/crew/query - Run one roster page query.
pub async fn query_crew(
    State(state): State<AppState>,
    Json(query): Json<RosterQuery>,
) -> ApiResult<RosterPage> {
    if query.range.to < query.range.from {
        return Err(AppError::Validation(format!(
            "Invalid range: {} to {}",
            query.range.from, query.range.to
        )));
    }
    if query.range.limit() > MAX_PAGE_ROWS {
        return Err(AppError::Validation(format!(
            "A page may hold at most {} rows",
            MAX_PAGE_ROWS
        )));
    }

    let page = state.repo.query_roster(&query).await?;
    tracing::debug!(
        rows = page.rows.len(),
        offset = query.range.from,
        "roster page served"
    );
    success(page)
}

/// GET /api/crew/{id} - Get a single crew member.
pub async fn get_crew(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<CrewRecord> {
    match state.repo.get_crew(&id).await? {
        Some(crew) => success(crew),
        None => Err(AppError::NotFound(format!("Crew member {} not found", id))),
    }
}

/// POST /api/crew - Create a new crew member.
pub async fn create_crew(
    State(state): State<AppState>,
    Json(request): Json<CreateCrewRequest>,
) -> ApiResult<CrewRecord> {
    // Validate required fields
    if request.full_name.trim().is_empty() {
        return Err(AppError::Validation("Full name is required".to_string()));
    }
    if request.position.trim().is_empty() {
        return Err(AppError::Validation("Position is required".to_string()));
    }

    let crew = state.repo.create_crew(&request).await?;
    tracing::info!(id = %crew.id, position = %crew.position, "crew member created");
    Ok(ApiResponse::created(crew))
}
