//! Issue entity model
//!
//! An issue is the durable record of a rule firing. Its status only moves
//! forward: CREATED, then PROCESSING, then SOLVED.

use std::fmt;

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::rule::ReadRule;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "issues")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub user_id: i32,

    /// Rule that produced the issue. Not a foreign key: issues outlive deleted rules.
    pub rule_id: i32,

    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub content: String,

    pub status: IssueStatus,

    pub created_at: DateTimeWithTimeZone,

    pub processing_at: Option<DateTimeWithTimeZone>,

    pub solved_at: Option<DateTimeWithTimeZone>,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueStatus {
    #[sea_orm(string_value = "CREATED")]
    Created,
    #[sea_orm(string_value = "PROCESSING")]
    Processing,
    #[sea_orm(string_value = "SOLVED")]
    Solved,
}

impl IssueStatus {
    fn rank(self) -> u8 {
        match self {
            IssueStatus::Created => 0,
            IssueStatus::Processing => 1,
            IssueStatus::Solved => 2,
        }
    }

    /// Staying put or moving forward is allowed; moving back is not.
    pub fn can_transition_to(self, next: IssueStatus) -> bool {
        next.rank() >= self.rank()
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_value())
    }
}

/// Fields the trigger engine supplies when opening an issue
#[derive(Debug, Clone, PartialEq)]
pub struct NewIssue {
    pub user_id: i32,
    pub rule_id: i32,
    pub title: String,
    pub content: String,
}

/// Partial update requested through the API; absent fields are kept
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateIssue {
    pub title: Option<String>,
    pub content: Option<String>,
    pub status: Option<IssueStatus>,
}

/// Query filters for listing issues
#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct IssueFilter {
    pub status: Option<IssueStatus>,
    pub rule_id: Option<i32>,
}

/// Issue as listed by the API
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReadIssue {
    pub id: i32,
    pub rule_id: i32,
    pub title: String,
    pub status: IssueStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub processing_at: Option<chrono::DateTime<chrono::Utc>>,
    pub solved_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<Model> for ReadIssue {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            rule_id: model.rule_id,
            title: model.title,
            status: model.status,
            created_at: model.created_at.with_timezone(&chrono::Utc),
            processing_at: model.processing_at.map(|t| t.with_timezone(&chrono::Utc)),
            solved_at: model.solved_at.map(|t| t.with_timezone(&chrono::Utc)),
            updated_at: model.updated_at.with_timezone(&chrono::Utc),
        }
    }
}

/// Full issue with its body and, when it still exists, the originating rule
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReadIssueDetail {
    #[serde(flatten)]
    pub issue: ReadIssue,
    pub content: String,
    pub rule: Option<ReadRule>,
}
