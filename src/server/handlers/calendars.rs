use axum::{extract::State, Json};
use serde::Deserialize;
use std::sync::Arc;

use super::ApiResult;
use crate::cli::{CalendarListResponse, SelectionResponse, SuccessResponse};
use crate::models::{LocalConfig, SelectedCalendar};
use crate::server::AppState;

/// Calendars on the account, flagged with whether they are selected
pub async fn list_calendars(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<CalendarListResponse>> {
    let config = LocalConfig::load(&state.paths.config_file())?;
    let available = state.source.list_calendars().await?;
    Ok(Json(CalendarListResponse::new(available, &config)))
}

pub async fn get_selection(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<SelectionResponse>> {
    let config = LocalConfig::load(&state.paths.config_file())?;
    Ok(Json(SelectionResponse {
        selected_calendars: config.selected_calendars,
    }))
}

#[derive(Deserialize)]
pub struct UpdateSelectionRequest {
    pub calendar_ids: Vec<String>,
}

/// Replace the selection; names are looked up on the account
pub async fn update_selection(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateSelectionRequest>,
) -> ApiResult<Json<SelectionResponse>> {
    let available = state.source.list_calendars().await?;
    let config = LocalConfig {
        selected_calendars: SelectedCalendar::resolve(&req.calendar_ids, &available),
    };
    config.save(&state.paths.config_file())?;

    tracing::info!(
        "selection updated: {} calendar(s)",
        config.selected_calendars.len()
    );
    Ok(Json(SelectionResponse {
        selected_calendars: config.selected_calendars,
    }))
}

pub async fn clear_selection(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<SuccessResponse>> {
    LocalConfig::clear(&state.paths.config_file())?;
    Ok(Json(SuccessResponse::new("Calendar selection cleared")))
}
