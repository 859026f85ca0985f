//! Persistence seams used by the trigger engine.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{grid_report, issue, reservoir_report, rule, seismic_report};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Read access to ingested reports.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Newest report for the dam `name` whose timestamp is strictly greater
    /// than `newer_than`, or the newest overall when `newer_than` is `None`.
    async fn latest_reservoir(
        &self,
        name: &str,
        newer_than: Option<i64>,
    ) -> Result<Option<reservoir_report::Model>, StoreError>;

    async fn latest_grid(&self) -> Result<Option<grid_report::Model>, StoreError>;

    /// Every seismic report, newest first.
    async fn all_seismic_descending(&self) -> Result<Vec<seismic_report::Model>, StoreError>;
}

#[async_trait]
pub trait RuleStore: Send + Sync {
    async fn all_enabled(&self) -> Result<Vec<rule::Model>, StoreError>;

    async fn find(&self, rule_id: i32) -> Result<Option<rule::Model>, StoreError>;

    /// Email address of an active owner, if any.
    async fn owner_email(&self, user_id: i32) -> Result<Option<String>, StoreError>;

    /// Moves `last_triggered_by` to `timestamp` unless it already is at or
    /// beyond it. Returns whether the row changed.
    async fn advance_watermark(&self, rule_id: i32, timestamp: i64) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait IssueStore: Send + Sync {
    async fn create(&self, issue: issue::NewIssue) -> Result<issue::Model, StoreError>;
}
