//! # Rule Trigger Engine
//!
//! Evaluates enabled rules against the newest ingested reports, opens an issue
//! for each newly satisfied condition, notifies the rule owner and advances the
//! rule's `last_triggered_by` watermark so the same data never fires twice.
//!
//! The engine talks to persistence only through the traits in [`store`], so
//! the same code runs against SeaORM repositories and in-memory fakes.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::models::rule::{RulePosition, RuleResource};

pub mod engine;
pub mod evaluator;
pub mod issue_service;
pub mod scheduler;
pub mod store;


pub use engine::TriggerEngine;
pub use evaluator::{Resolution, RuleEvaluator, Trigger};
pub use issue_service::IssueService;
pub use scheduler::TriggerScheduler;
pub use store::{IssueStore, ReportStore, RuleStore, StoreError};

/// Failure while processing a single rule.
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("rule {rule_id}: resource {resource} does not apply to position {position}")]
    Configuration {
        rule_id: i32,
        position: RulePosition,
        resource: RuleResource,
    },
    #[error("storage failure during {operation}: {source}")]
    Storage {
        operation: &'static str,
        #[source]
        source: StoreError,
    },
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },
    #[error("malformed {kind} report at {timestamp}: {reason}")]
    MalformedReport {
        kind: &'static str,
        timestamp: i64,
        reason: String,
    },
    #[error("rule {0} not found")]
    RuleNotFound(i32),
}

impl TriggerError {
    /// Configuration errors repeat every tick until the rule is edited.
    pub fn is_permanent(&self) -> bool {
        matches!(self, TriggerError::Configuration { .. })
    }
}

/// Aggregate counts for one evaluation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PassStats {
    /// Rules whose processing started
    pub evaluated: u64,
    /// Rules that produced an issue
    pub matched: u64,
    /// Rules that ended in an error
    pub failed: u64,
    /// Rules left for the next tick because the pass deadline elapsed
    pub deferred: u64,
}

/// Result of processing one rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TriggerOutcome {
    pub triggered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_id: Option<i32>,
    /// Source timestamp of the record that satisfied the rule
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl TriggerOutcome {
    pub fn not_triggered() -> Self {
        Self::default()
    }
}
