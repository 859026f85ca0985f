//! Reservoir report entity model

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One reservoir observation. `(name, timestamp)` is unique.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "reservoir_reports")]
#[schema(as = ReservoirReport)]
pub struct Model {
    #[sea_orm(primary_key)]
    #[serde(skip)]
    pub id: i32,

    /// Dam name as published by the source
    pub name: String,

    /// Unix seconds
    pub timestamp: i64,

    /// Effective storage in 10^4 m^3; `-1` when the source omits it
    pub storage: f64,

    /// Fill ratio in percent; `-1` when the source omits it
    pub percent: f64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReservoirReport {
    pub name: String,
    pub timestamp: i64,
    pub storage: f64,
    pub percent: f64,
}
