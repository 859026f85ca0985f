//! # Rule Repository
//!
//! User-scoped CRUD for rules, plus the [`RuleStore`] the trigger engine reads
//! enabled rules and commits watermarks through.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, IntoActiveModel,
    QueryFilter, QueryOrder, Set,
};

use crate::error::RepositoryError;
use crate::models::rule::{self, CreateRule, Entity as Rule, RulePosition, RuleResource, UpdateRule};
use crate::models::user::{self, Entity as User};
use crate::trigger::{RuleStore, StoreError};

#[derive(Debug, Clone)]
pub struct RuleRepository {
    db: Arc<DatabaseConnection>,
}

impl RuleRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Create an enabled rule owned by `user_id`.
    pub async fn create(
        &self,
        user_id: i32,
        request: CreateRule,
    ) -> Result<rule::Model, RepositoryError> {
        validate_condition(request.position, request.resource, request.value)?;

        let now = Utc::now();
        let active = rule::ActiveModel {
            user_id: Set(user_id),
            name: Set(request.name),
            position: Set(request.position),
            resource: Set(request.resource),
            operator: Set(request.operator),
            value: Set(request.value),
            is_enable: Set(true),
            last_triggered_by: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };

        active
            .insert(&*self.db)
            .await
            .map_err(|e| RepositoryError::database_error(e, "rule"))
    }

    /// Rules owned by `user_id`, newest first.
    pub async fn list_for_user(&self, user_id: i32) -> Result<Vec<rule::Model>, RepositoryError> {
        let rules = Rule::find()
            .filter(rule::Column::UserId.eq(user_id))
            .order_by_desc(rule::Column::CreatedAt)
            .order_by_desc(rule::Column::Id)
            .all(&*self.db)
            .await?;
        Ok(rules)
    }

    /// A rule owned by `user_id`. Someone else's rule reads as missing.
    pub async fn find_for_user(
        &self,
        user_id: i32,
        rule_id: i32,
    ) -> Result<rule::Model, RepositoryError> {
        Rule::find_by_id(rule_id)
            .filter(rule::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| RepositoryError::not_found("rule"))
    }

    /// Apply a partial update. The watermark is left to the trigger engine.
    pub async fn update(
        &self,
        user_id: i32,
        rule_id: i32,
        request: UpdateRule,
    ) -> Result<rule::Model, RepositoryError> {
        let existing = self.find_for_user(user_id, rule_id).await?;

        let position = request.position.unwrap_or(existing.position);
        let resource = request.resource.unwrap_or(existing.resource);
        let value = request.value.unwrap_or(existing.value);
        validate_condition(position, resource, value)?;

        let mut active = existing.into_active_model();
        if let Some(name) = request.name {
            active.name = Set(Some(name));
        }
        active.position = Set(position);
        active.resource = Set(resource);
        active.value = Set(value);
        if let Some(operator) = request.operator {
            active.operator = Set(operator);
        }
        active.updated_at = Set(Utc::now().into());

        active
            .update(&*self.db)
            .await
            .map_err(|e| RepositoryError::database_error(e, "rule"))
    }

    /// Delete a rule. Issues it produced are kept.
    pub async fn delete(&self, user_id: i32, rule_id: i32) -> Result<(), RepositoryError> {
        let result = Rule::delete_many()
            .filter(rule::Column::Id.eq(rule_id))
            .filter(rule::Column::UserId.eq(user_id))
            .exec(&*self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(RepositoryError::not_found("rule"));
        }
        Ok(())
    }

    pub async fn set_enabled(
        &self,
        user_id: i32,
        rule_id: i32,
        enabled: bool,
    ) -> Result<(), RepositoryError> {
        let result = Rule::update_many()
            .col_expr(rule::Column::IsEnable, Expr::value(enabled))
            .col_expr(
                rule::Column::UpdatedAt,
                Expr::value(sea_orm::prelude::DateTimeWithTimeZone::from(Utc::now())),
            )
            .filter(rule::Column::Id.eq(rule_id))
            .filter(rule::Column::UserId.eq(user_id))
            .exec(&*self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(RepositoryError::not_found("rule"));
        }
        Ok(())
    }
}

fn validate_condition(
    position: RulePosition,
    resource: RuleResource,
    value: f64,
) -> Result<(), RepositoryError> {
    if !resource.applies_to(position.domain()) {
        return Err(RepositoryError::validation_error(format!(
            "resource {resource} does not apply to position {position}"
        )));
    }
    if !value.is_finite() {
        return Err(RepositoryError::validation_error("value must be a finite number"));
    }
    Ok(())
}

#[async_trait]
impl RuleStore for RuleRepository {
    async fn all_enabled(&self) -> Result<Vec<rule::Model>, StoreError> {
        let rules = Rule::find()
            .filter(rule::Column::IsEnable.eq(true))
            .order_by_asc(rule::Column::Id)
            .all(&*self.db)
            .await?;
        Ok(rules)
    }

    async fn find(&self, rule_id: i32) -> Result<Option<rule::Model>, StoreError> {
        Ok(Rule::find_by_id(rule_id).one(&*self.db).await?)
    }

    async fn owner_email(&self, user_id: i32) -> Result<Option<String>, StoreError> {
        let owner = User::find_by_id(user_id)
            .filter(user::Column::IsActive.eq(true))
            .one(&*self.db)
            .await?;
        Ok(owner.map(|u| u.email))
    }

    async fn advance_watermark(&self, rule_id: i32, timestamp: i64) -> Result<bool, StoreError> {
        let result = Rule::update_many()
            .col_expr(rule::Column::LastTriggeredBy, Expr::value(timestamp))
            .filter(rule::Column::Id.eq(rule_id))
            .filter(
                Condition::any()
                    .add(rule::Column::LastTriggeredBy.is_null())
                    .add(rule::Column::LastTriggeredBy.lt(timestamp)),
            )
            .exec(&*self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }
}
