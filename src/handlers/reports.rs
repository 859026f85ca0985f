//! # Report API Handlers
//!
//! Public, unauthenticated views over ingested reports.

use axum::{extract::State, response::Json};

use crate::error::ApiError;
use crate::models::{reservoir_report, seismic_report};
use crate::reports::{PowerReport, ReportService};
use crate::repositories::ReportRepository;
use crate::server::AppState;

fn service(state: &AppState) -> ReportService {
    ReportService::new(ReportRepository::new(state.db.clone()))
}

/// Reservoir reports plus regional aggregates
#[utoipa::path(
    get,
    path = "/report/dam",
    responses(
        (status = 200, description = "Reservoir reports, then one aggregate per region", body = [reservoir_report::Model]),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    tag = "reports"
)]
pub async fn dam_reports(
    State(state): State<AppState>,
) -> Result<Json<Vec<reservoir_report::Model>>, ApiError> {
    Ok(Json(service(&state).dams().await?))
}

/// Grid load reports with island-wide totals
#[utoipa::path(
    get,
    path = "/report/power",
    responses(
        (status = 200, description = "Grid reports, newest first", body = [PowerReport]),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    tag = "reports"
)]
pub async fn power_reports(
    State(state): State<AppState>,
) -> Result<Json<Vec<PowerReport>>, ApiError> {
    Ok(Json(service(&state).power().await?))
}

/// Earthquake reports
#[utoipa::path(
    get,
    path = "/report/eq",
    responses(
        (status = 200, description = "Seismic reports, newest first", body = [seismic_report::Model]),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    tag = "reports"
)]
pub async fn earthquake_reports(
    State(state): State<AppState>,
) -> Result<Json<Vec<seismic_report::Model>>, ApiError> {
    Ok(Json(service(&state).earthquakes().await?))
}
