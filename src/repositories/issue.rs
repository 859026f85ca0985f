//! # Issue Repository

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set,
};

use crate::error::RepositoryError;
use crate::models::issue::{
    self, Entity as Issue, IssueFilter, IssueStatus, NewIssue, ReadIssueDetail, UpdateIssue,
};
use crate::models::rule::Entity as Rule;
use crate::trigger::{IssueStore, StoreError};

#[derive(Debug, Clone)]
pub struct IssueRepository {
    db: Arc<DatabaseConnection>,
}

impl IssueRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Issues owned by `user_id`, newest first.
    pub async fn list_for_user(
        &self,
        user_id: i32,
        filter: IssueFilter,
    ) -> Result<Vec<issue::Model>, RepositoryError> {
        let mut query = Issue::find().filter(issue::Column::UserId.eq(user_id));
        if let Some(status) = filter.status {
            query = query.filter(issue::Column::Status.eq(status));
        }
        if let Some(rule_id) = filter.rule_id {
            query = query.filter(issue::Column::RuleId.eq(rule_id));
        }

        let issues = query
            .order_by_desc(issue::Column::CreatedAt)
            .order_by_desc(issue::Column::Id)
            .all(&*self.db)
            .await?;
        Ok(issues)
    }

    pub async fn find_for_user(
        &self,
        user_id: i32,
        issue_id: i32,
    ) -> Result<issue::Model, RepositoryError> {
        Issue::find_by_id(issue_id)
            .filter(issue::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| RepositoryError::not_found("issue"))
    }

    /// Issue with its content and, when it still exists, the originating rule.
    pub async fn detail(
        &self,
        user_id: i32,
        issue_id: i32,
    ) -> Result<ReadIssueDetail, RepositoryError> {
        let issue = self.find_for_user(user_id, issue_id).await?;
        let rule = Rule::find_by_id(issue.rule_id).one(&*self.db).await?;
        let content = issue.content.clone();

        Ok(ReadIssueDetail {
            issue: issue.into(),
            content,
            rule: rule.map(Into::into),
        })
    }

    /// Partial update. Status only moves forward; entering PROCESSING or
    /// SOLVED for the first time stamps the matching column.
    pub async fn update(
        &self,
        user_id: i32,
        issue_id: i32,
        request: UpdateIssue,
    ) -> Result<issue::Model, RepositoryError> {
        let existing = self.find_for_user(user_id, issue_id).await?;
        let now = Utc::now().fixed_offset();

        if let Some(next) = request.status
            && !existing.status.can_transition_to(next)
        {
            return Err(RepositoryError::validation_error(format!(
                "status cannot move from {} to {next}",
                existing.status
            )));
        }

        let processing_at = existing.processing_at;
        let solved_at = existing.solved_at;
        let mut active = existing.into_active_model();

        if let Some(title) = request.title {
            active.title = Set(title);
        }
        if let Some(content) = request.content {
            active.content = Set(content);
        }
        if let Some(status) = request.status {
            active.status = Set(status);
            match status {
                IssueStatus::Processing if processing_at.is_none() => {
                    active.processing_at = Set(Some(now));
                }
                IssueStatus::Solved if solved_at.is_none() => {
                    active.solved_at = Set(Some(now));
                }
                _ => {}
            }
        }
        active.updated_at = Set(now);

        Ok(active.update(&*self.db).await?)
    }

    pub async fn delete(&self, user_id: i32, issue_id: i32) -> Result<(), RepositoryError> {
        let result = Issue::delete_many()
            .filter(issue::Column::Id.eq(issue_id))
            .filter(issue::Column::UserId.eq(user_id))
            .exec(&*self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(RepositoryError::not_found("issue"));
        }
        Ok(())
    }
}

#[async_trait]
impl IssueStore for IssueRepository {
    async fn create(&self, new: NewIssue) -> Result<issue::Model, StoreError> {
        let now = Utc::now().fixed_offset();
        let active = issue::ActiveModel {
            user_id: Set(new.user_id),
            rule_id: Set(new.rule_id),
            title: Set(new.title),
            content: Set(new.content),
            status: Set(IssueStatus::Created),
            created_at: Set(now),
            processing_at: Set(None),
            solved_at: Set(None),
            updated_at: Set(now),
            ..Default::default()
        };
        Ok(active.insert(&*self.db).await?)
    }
}
