//! Power grid report entity model
//!
//! Each row carries the load, forecast maximum supply and reserve margin of
//! the four grid regions at a single instant.

use sea_orm::ActiveModelBehavior;
use sea_orm::FromJsonQueryResult;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::rule::GridRegion;

#[derive(
    Clone, Debug, Default, PartialEq, Serialize, Deserialize, FromJsonQueryResult, ToSchema,
)]
pub struct RegionLoad {
    pub load: f64,
    pub max_supply: f64,
    /// Reserve margin in percent, `(max_supply - load) / load * 100`
    pub recv_rate: f64,
}

impl RegionLoad {
    pub fn new(load: f64, max_supply: f64) -> Self {
        Self {
            load,
            max_supply,
            recv_rate: reserve_margin(load, max_supply),
        }
    }
}

/// Zero when there is no load to measure against.
pub fn reserve_margin(load: f64, max_supply: f64) -> f64 {
    if load == 0.0 {
        0.0
    } else {
        (max_supply - load) / load * 100.0
    }
}

/// One grid snapshot. `timestamp` is unique.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "grid_reports")]
#[schema(as = GridReport)]
pub struct Model {
    #[sea_orm(primary_key)]
    #[serde(skip)]
    pub id: i32,

    pub timestamp: i64,

    #[sea_orm(column_type = "JsonBinary")]
    pub east: RegionLoad,

    #[sea_orm(column_type = "JsonBinary")]
    pub south: RegionLoad,

    #[sea_orm(column_type = "JsonBinary")]
    pub central: RegionLoad,

    #[sea_orm(column_type = "JsonBinary")]
    pub north: RegionLoad,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn region(&self, region: GridRegion) -> &RegionLoad {
        match region {
            GridRegion::East => &self.east,
            GridRegion::South => &self.south,
            GridRegion::Central => &self.central,
            GridRegion::North => &self.north,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewGridReport {
    pub timestamp: i64,
    pub east: RegionLoad,
    pub south: RegionLoad,
    pub central: RegionLoad,
    pub north: RegionLoad,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_margin_is_a_percentage_of_load() {
        assert_eq!(reserve_margin(100.0, 110.0), 10.0);
        assert_eq!(reserve_margin(200.0, 150.0), -25.0);
        assert_eq!(reserve_margin(0.0, 150.0), 0.0);
    }
}
