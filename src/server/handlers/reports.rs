use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{ApiResult, ErrorResponse};
use crate::models::{LocalConfig, ReportPeriod};
use crate::report::{generate_report, is_report_file_name, local_offset, ReportSummary};
use crate::server::AppState;
use crate::Error;

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Deserialize)]
pub struct CreateReportRequest {
    pub year: i32,
    pub month: u32,
}

#[derive(Serialize)]
pub struct CreateReportResponse {
    pub file_name: String,
    pub download_url: String,
    pub period: ReportPeriod,
    pub summary: ReportSummary,
}

/// Generate the spreadsheet for one month from the saved selection
pub async fn create_report(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateReportRequest>,
) -> ApiResult<Json<CreateReportResponse>> {
    ReportPeriod::new(req.year, req.month)?;
    let config = LocalConfig::load(&state.paths.config_file())?;
    if !config.has_selected_calendars() {
        return Err(Error::NoCalendarsSelected.into());
    }

    let report = generate_report(
        state.source.as_ref(),
        &config.selected_calendars,
        req.year,
        req.month,
        &state.reports_dir,
        local_offset(),
    )
    .await?;

    Ok(Json(CreateReportResponse {
        download_url: format!("/v1/reports/{}", report.file_name),
        file_name: report.file_name,
        period: report.period,
        summary: report.summary,
    }))
}

/// Serve a previously generated report
pub async fn download_report(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Response> {
    if !is_report_file_name(&name) {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Invalid report name")),
        )
            .into_response());
    }

    let bytes = tokio::fs::read(state.reports_dir.join(&name))
        .await
        .map_err(Error::from)?;

    Ok((
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", name),
            ),
        ],
        bytes,
    )
        .into_response())
}
