//! # Issue API Handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::models::issue::{IssueFilter, ReadIssue, ReadIssueDetail, UpdateIssue};
use crate::repositories::IssueRepository;
use crate::server::AppState;

/// List the caller's issues, newest first
#[utoipa::path(
    get,
    path = "/issue",
    security(("bearer_auth" = [])),
    params(IssueFilter),
    responses(
        (status = 200, description = "Issues owned by the caller", body = [ReadIssue]),
        (status = 400, description = "Invalid filter", body = ApiError),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError)
    ),
    tag = "issues"
)]
pub async fn list_issues(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(filter): Query<IssueFilter>,
) -> Result<Json<Vec<ReadIssue>>, ApiError> {
    let issues = IssueRepository::new(state.db.clone())
        .list_for_user(user.id, filter)
        .await?;
    Ok(Json(issues.into_iter().map(ReadIssue::from).collect()))
}

/// Fetch an issue with its content and originating rule
#[utoipa::path(
    get,
    path = "/issue/{id}",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Issue id")),
    responses(
        (status = 200, description = "Issue detail", body = ReadIssueDetail),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 404, description = "Issue not found", body = ApiError)
    ),
    tag = "issues"
)]
pub async fn get_issue(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(issue_id): Path<i32>,
) -> Result<Json<ReadIssueDetail>, ApiError> {
    let detail = IssueRepository::new(state.db.clone())
        .detail(user.id, issue_id)
        .await?;
    Ok(Json(detail))
}

/// Edit an issue or move its status forward
#[utoipa::path(
    patch,
    path = "/issue/{id}",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Issue id")),
    request_body = UpdateIssue,
    responses(
        (status = 200, description = "Updated issue", body = ReadIssue),
        (status = 400, description = "Status cannot move backwards", body = ApiError),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 404, description = "Issue not found", body = ApiError)
    ),
    tag = "issues"
)]
pub async fn update_issue(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(issue_id): Path<i32>,
    Json(request): Json<UpdateIssue>,
) -> Result<Json<ReadIssue>, ApiError> {
    let issue = IssueRepository::new(state.db.clone())
        .update(user.id, issue_id, request)
        .await?;
    tracing::info!(issue_id, status = %issue.status, "Issue updated");
    Ok(Json(issue.into()))
}

#[utoipa::path(
    delete,
    path = "/issue/{id}",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Issue id")),
    responses(
        (status = 204, description = "Issue deleted"),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 404, description = "Issue not found", body = ApiError)
    ),
    tag = "issues"
)]
pub async fn delete_issue(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(issue_id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    IssueRepository::new(state.db.clone())
        .delete(user.id, issue_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
