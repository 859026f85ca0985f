//! User entity model
//!
//! Accounts own rules and issues. Only the password digest is stored.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Unique login name
    #[sea_orm(unique)]
    pub name: String,

    /// Unique, lowercased email address
    #[sea_orm(unique)]
    pub email: String,

    /// bcrypt digest of the password
    pub password_digest: String,

    pub is_active: bool,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::rule::Entity")]
    Rules,
}

impl Related<super::rule::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Rules.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Public view of a user account
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReadUser {
    pub id: i32,
    pub name: String,
    pub email: String,
}

impl From<Model> for ReadUser {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            email: model.email,
        }
    }
}
