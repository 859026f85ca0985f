//! # Server Configuration
//!
//! Router assembly, shared state and the HTTP listener for the meter API.

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router, middleware,
    http::{HeaderValue, Method, header},
    routing::{get, post, put},
};
use sea_orm::DatabaseConnection;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::{AuthService, auth_middleware};
use crate::config::AppConfig;
use crate::handlers;
use crate::notify::Notifier;
use crate::repositories::{IssueRepository, ReportRepository, RuleRepository};
use crate::telemetry::{TRACE_ID_HEADER, trace_context_middleware};
use crate::trigger::TriggerEngine;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: Arc<DatabaseConnection>,
    pub engine: Arc<TriggerEngine>,
    pub auth: Arc<AuthService>,
}

impl AppState {
    pub fn new(config: AppConfig, db: DatabaseConnection, notifier: Arc<dyn Notifier>) -> Self {
        let db = Arc::new(db);
        let engine = Arc::new(build_engine(&config, Arc::clone(&db), notifier));
        let auth = Arc::new(AuthService::from_config(&config));
        Self {
            config: Arc::new(config),
            db,
            engine,
            auth,
        }
    }
}

/// Trigger engine backed by the database repositories.
pub fn build_engine(
    config: &AppConfig,
    db: Arc<DatabaseConnection>,
    notifier: Arc<dyn Notifier>,
) -> TriggerEngine {
    TriggerEngine::new(
        Arc::new(ReportRepository::new(Arc::clone(&db))),
        Arc::new(RuleRepository::new(Arc::clone(&db))),
        Arc::new(IssueRepository::new(db)),
        notifier,
        &config.trigger,
    )
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .expose_headers([TRACE_ID_HEADER]);

    if config.cors_allowed_origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(origins)
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let public = Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route("/user/signup", post(handlers::users::signup))
        .route("/user/login", post(handlers::users::login))
        .route("/report/dam", get(handlers::reports::dam_reports))
        .route("/report/power", get(handlers::reports::power_reports))
        .route("/report/eq", get(handlers::reports::earthquake_reports));

    let protected = Router::new()
        .route("/user/me", get(handlers::users::me))
        .route(
            "/rule",
            get(handlers::rules::list_rules).post(handlers::rules::create_rule),
        )
        .route(
            "/rule/{id}",
            get(handlers::rules::get_rule)
                .patch(handlers::rules::update_rule)
                .delete(handlers::rules::delete_rule),
        )
        .route("/rule/{id}/enable", put(handlers::rules::enable_rule))
        .route("/rule/{id}/disable", put(handlers::rules::disable_rule))
        .route("/rule/{id}/trigger", put(handlers::rules::trigger_rule))
        .route("/issue", get(handlers::issues::list_issues))
        .route(
            "/issue/{id}",
            get(handlers::issues::get_issue)
                .patch(handlers::issues::update_issue)
                .delete(handlers::issues::delete_issue),
        )
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state.auth),
            auth_middleware,
        ));

    let cors = cors_layer(&state.config);

    public
        .merge(protected)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn(trace_context_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Serves `state` until `shutdown` is cancelled.
pub async fn run_server(state: AppState, shutdown: CancellationToken) -> anyhow::Result<()> {
    let addr = state
        .config
        .bind_addr()
        .context("Invalid server address")?;
    let profile = state.config.profile.clone();
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(%addr, %profile, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("HTTP server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::healthz,
        crate::handlers::users::signup,
        crate::handlers::users::login,
        crate::handlers::users::me,
        crate::handlers::rules::create_rule,
        crate::handlers::rules::list_rules,
        crate::handlers::rules::get_rule,
        crate::handlers::rules::update_rule,
        crate::handlers::rules::delete_rule,
        crate::handlers::rules::enable_rule,
        crate::handlers::rules::disable_rule,
        crate::handlers::rules::trigger_rule,
        crate::handlers::issues::list_issues,
        crate::handlers::issues::get_issue,
        crate::handlers::issues::update_issue,
        crate::handlers::issues::delete_issue,
        crate::handlers::reports::dam_reports,
        crate::handlers::reports::power_reports,
        crate::handlers::reports::earthquake_reports,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::handlers::HealthStatus,
            crate::error::ApiError,
            crate::handlers::users::SignupRequest,
            crate::handlers::users::LoginRequest,
            crate::handlers::users::TokenResponse,
            crate::models::user::ReadUser,
            crate::models::rule::CreateRule,
            crate::models::rule::UpdateRule,
            crate::models::rule::ReadRule,
            crate::models::rule::RulePosition,
            crate::models::rule::RuleResource,
            crate::models::rule::RuleOperator,
            crate::models::issue::IssueStatus,
            crate::models::issue::UpdateIssue,
            crate::models::issue::ReadIssue,
            crate::models::issue::ReadIssueDetail,
            crate::models::reservoir_report::Model,
            crate::models::grid_report::Model,
            crate::models::grid_report::RegionLoad,
            crate::models::seismic_report::Model,
            crate::models::seismic_report::Geometry,
            crate::models::seismic_report::StationIntensity,
            crate::reports::PowerReport,
            crate::trigger::TriggerOutcome,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "root", description = "Service information and health"),
        (name = "users", description = "Accounts and access tokens"),
        (name = "rules", description = "Alert rules owned by the caller"),
        (name = "issues", description = "Issues opened by triggered rules"),
        (name = "reports", description = "Ingested reservoir, grid and seismic reports"),
    ),
    info(
        title = "Meter API",
        description = "Threshold alerts over reservoir, power grid and earthquake reports",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            utoipa::openapi::security::SecurityScheme::Http(
                utoipa::openapi::security::HttpBuilder::new()
                    .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
