//! Test utilities for database and API testing.
//!
//! In-memory SQLite databases with migrations applied, fixture inserters and
//! a router wired the way the server builds it.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::Result;
use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use meter::config::AppConfig;
use meter::models::grid_report::{self, RegionLoad};
use meter::models::reservoir_report;
use meter::models::seismic_report::{self, Geometry, StationIntensity};
use meter::notify::Notifier;
use meter::server::{AppState, create_app};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
use serde_json::Value;
use tower::ServiceExt;

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

pub fn test_config() -> AppConfig {
    AppConfig {
        profile: "test".to_string(),
        jwt_secret: Some("integration-secret".to_string()),
        password_hash_cost: 4,
        ..AppConfig::default()
    }
}

/// Notifier that keeps every message for inspection.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(Vec<String>, String, String)>>,
}

impl RecordingNotifier {
    pub fn subjects(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, subject, _)| subject.clone())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn send_async(&self, to: Vec<String>, subject: String, body: String) {
        self.sent.lock().unwrap().push((to, subject, body));
    }
}

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        let db = setup_test_db().await?;
        let notifier = Arc::new(RecordingNotifier::default());
        let state = AppState::new(test_config(), db, notifier.clone());
        let router = create_app(state.clone());
        Ok(Self {
            state,
            router,
            notifier,
        })
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.state.db
    }

    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        self.router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap()
    }

    /// Sends a request and decodes the JSON body, asserting the status.
    pub async fn json(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
        expected: StatusCode,
    ) -> Value {
        let response = self.request(method, uri, token, body).await;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(
            status,
            expected,
            "{method} {uri}: {}",
            String::from_utf8_lossy(&bytes)
        );
        if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        }
    }

    /// Signs a user up and logs in, returning the bearer token.
    pub async fn register(&self, name: &str) -> String {
        self.json(
            "POST",
            "/user/signup",
            None,
            Some(serde_json::json!({
                "name": name,
                "email": format!("{name}@example.com"),
                "password": "correct horse",
            })),
            StatusCode::CREATED,
        )
        .await;

        let login = self
            .json(
                "POST",
                "/user/login",
                None,
                Some(serde_json::json!({ "name": name, "password": "correct horse" })),
                StatusCode::OK,
            )
            .await;
        login["access_token"].as_str().unwrap().to_string()
    }
}

pub async fn insert_reservoir(
    db: &DatabaseConnection,
    name: &str,
    timestamp: i64,
    storage: f64,
    percent: f64,
) -> Result<reservoir_report::Model> {
    Ok(reservoir_report::ActiveModel {
        name: Set(name.to_string()),
        timestamp: Set(timestamp),
        storage: Set(storage),
        percent: Set(percent),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

/// Grid snapshot where every region carries the same load and supply.
pub async fn insert_grid(
    db: &DatabaseConnection,
    timestamp: i64,
    load: f64,
    max_supply: f64,
) -> Result<grid_report::Model> {
    let region = RegionLoad::new(load, max_supply);
    Ok(grid_report::ActiveModel {
        timestamp: Set(timestamp),
        east: Set(region.clone()),
        south: Set(region.clone()),
        central: Set(region.clone()),
        north: Set(region),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

pub async fn insert_seismic(
    db: &DatabaseConnection,
    timestamp: i64,
    intensity: [i32; 3],
) -> Result<seismic_report::Model> {
    Ok(seismic_report::ActiveModel {
        timestamp: Set(timestamp),
        geometry: Set(Geometry::point(121.0, 24.0)),
        scale: Set(5.1),
        intensity: Set(StationIntensity(intensity.to_vec())),
        link: Set(format!("https://example.com/eq/{timestamp}")),
        img: Set(format!("https://example.com/eq/{timestamp}.png")),
        ..Default::default()
    }
    .insert(db)
    .await?)
}
