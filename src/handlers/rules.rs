//! # Rule API Handlers
//!
//! CRUD for the caller's rules plus enable/disable and the manual trigger.
//! Rules owned by someone else read as missing.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use tracing::error;

use crate::auth::CurrentUser;
use crate::error::{ApiError, RepositoryError, RuleAction, not_found, rule_action_failed};
use crate::models::rule::{CreateRule, ReadRule, UpdateRule};
use crate::repositories::RuleRepository;
use crate::server::AppState;
use crate::trigger::{TriggerError, TriggerOutcome};

/// Validation and ownership failures keep their status; storage failures
/// collapse into the action's generic error.
fn rule_failure(action: RuleAction, rule_id: Option<i32>) -> impl FnOnce(RepositoryError) -> ApiError {
    move |err| match err {
        RepositoryError::Database(source) => {
            error!(?action, ?rule_id, error = %source, "Rule operation failed");
            rule_action_failed(action)
        }
        other => other.into(),
    }
}

/// Create a rule for the caller
#[utoipa::path(
    post,
    path = "/rule",
    security(("bearer_auth" = [])),
    request_body = CreateRule,
    responses(
        (status = 201, description = "Rule created", body = ReadRule),
        (status = 400, description = "Resource does not apply to the position", body = ApiError),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 500, description = "Create failed", body = ApiError)
    ),
    tag = "rules"
)]
pub async fn create_rule(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CreateRule>,
) -> Result<(StatusCode, Json<ReadRule>), ApiError> {
    let rule = RuleRepository::new(state.db.clone())
        .create(user.id, request)
        .await
        .map_err(rule_failure(RuleAction::Create, None))?;

    tracing::info!(rule_id = rule.id, user_id = user.id, position = %rule.position, "Rule created");
    Ok((StatusCode::CREATED, Json(rule.into())))
}

/// List the caller's rules, newest first
#[utoipa::path(
    get,
    path = "/rule",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Rules owned by the caller", body = [ReadRule]),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError)
    ),
    tag = "rules"
)]
pub async fn list_rules(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<ReadRule>>, ApiError> {
    let rules = RuleRepository::new(state.db.clone())
        .list_for_user(user.id)
        .await?;
    Ok(Json(rules.into_iter().map(ReadRule::from).collect()))
}

/// Fetch one rule
#[utoipa::path(
    get,
    path = "/rule/{id}",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Rule id")),
    responses(
        (status = 200, description = "Rule", body = ReadRule),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 404, description = "Rule not found", body = ApiError)
    ),
    tag = "rules"
)]
pub async fn get_rule(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(rule_id): Path<i32>,
) -> Result<Json<ReadRule>, ApiError> {
    let rule = RuleRepository::new(state.db.clone())
        .find_for_user(user.id, rule_id)
        .await?;
    Ok(Json(rule.into()))
}

/// Partially update a rule
///
/// The trigger watermark is kept, so data already reported is not raised again.
#[utoipa::path(
    patch,
    path = "/rule/{id}",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Rule id")),
    request_body = UpdateRule,
    responses(
        (status = 200, description = "Updated rule", body = ReadRule),
        (status = 400, description = "Resource does not apply to the position", body = ApiError),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 404, description = "Rule not found", body = ApiError),
        (status = 500, description = "Update failed", body = ApiError)
    ),
    tag = "rules"
)]
pub async fn update_rule(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(rule_id): Path<i32>,
    Json(request): Json<UpdateRule>,
) -> Result<Json<ReadRule>, ApiError> {
    let rule = RuleRepository::new(state.db.clone())
        .update(user.id, rule_id, request)
        .await
        .map_err(rule_failure(RuleAction::Update, Some(rule_id)))?;
    Ok(Json(rule.into()))
}

/// Delete a rule; issues it opened are kept
#[utoipa::path(
    delete,
    path = "/rule/{id}",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Rule id")),
    responses(
        (status = 204, description = "Rule deleted"),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 404, description = "Rule not found", body = ApiError),
        (status = 500, description = "Delete failed", body = ApiError)
    ),
    tag = "rules"
)]
pub async fn delete_rule(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(rule_id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    RuleRepository::new(state.db.clone())
        .delete(user.id, rule_id)
        .await
        .map_err(rule_failure(RuleAction::Delete, Some(rule_id)))?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    put,
    path = "/rule/{id}/enable",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Rule id")),
    responses(
        (status = 204, description = "Rule enabled"),
        (status = 404, description = "Rule not found", body = ApiError),
        (status = 500, description = "Enable failed", body = ApiError)
    ),
    tag = "rules"
)]
pub async fn enable_rule(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(rule_id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    RuleRepository::new(state.db.clone())
        .set_enabled(user.id, rule_id, true)
        .await
        .map_err(rule_failure(RuleAction::Enable, Some(rule_id)))?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    put,
    path = "/rule/{id}/disable",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Rule id")),
    responses(
        (status = 204, description = "Rule disabled"),
        (status = 404, description = "Rule not found", body = ApiError),
        (status = 500, description = "Disable failed", body = ApiError)
    ),
    tag = "rules"
)]
pub async fn disable_rule(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(rule_id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    RuleRepository::new(state.db.clone())
        .set_enabled(user.id, rule_id, false)
        .await
        .map_err(rule_failure(RuleAction::Disable, Some(rule_id)))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Evaluate a rule now, whether or not it is enabled
#[utoipa::path(
    put,
    path = "/rule/{id}/trigger",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Rule id")),
    responses(
        (status = 200, description = "Evaluation finished", body = TriggerOutcome),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 404, description = "Rule not found", body = ApiError),
        (status = 500, description = "Trigger failed", body = ApiError)
    ),
    tag = "rules"
)]
pub async fn trigger_rule(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(rule_id): Path<i32>,
) -> Result<Json<TriggerOutcome>, ApiError> {
    RuleRepository::new(state.db.clone())
        .find_for_user(user.id, rule_id)
        .await
        .map_err(rule_failure(RuleAction::Trigger, Some(rule_id)))?;

    match state.engine.trigger_rule(rule_id).await {
        Ok(outcome) => Ok(Json(outcome)),
        Err(TriggerError::RuleNotFound(_)) => Err(not_found("rule")),
        Err(_) => Err(rule_action_failed(RuleAction::Trigger)),
    }
}
