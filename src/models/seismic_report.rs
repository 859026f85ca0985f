//! Earthquake report entity model

use sea_orm::ActiveModelBehavior;
use sea_orm::FromJsonQueryResult;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// GeoJSON point of the epicenter, `[longitude, latitude]`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, FromJsonQueryResult, ToSchema)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: [f64; 2],
}

impl Geometry {
    pub fn point(longitude: f64, latitude: f64) -> Self {
        Self {
            kind: "Point".to_string(),
            coordinates: [longitude, latitude],
        }
    }
}

/// Estimated intensity at the Hsinchu, Taichung and Tainan stations, in that order
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, FromJsonQueryResult, ToSchema)]
#[serde(transparent)]
pub struct StationIntensity(pub Vec<i32>);

/// One earthquake event. `timestamp` is unique.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "seismic_reports")]
#[schema(as = SeismicReport)]
pub struct Model {
    #[sea_orm(primary_key)]
    #[serde(skip)]
    pub id: i32,

    pub timestamp: i64,

    #[sea_orm(column_type = "JsonBinary")]
    pub geometry: Geometry,

    /// Local magnitude
    pub scale: f64,

    #[sea_orm(column_type = "JsonBinary")]
    pub intensity: StationIntensity,

    pub link: String,

    pub img: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn intensity_at(&self, station: usize) -> Option<i32> {
        self.intensity.0.get(station).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSeismicReport {
    pub timestamp: i64,
    pub geometry: Geometry,
    pub scale: f64,
    pub intensity: StationIntensity,
    pub link: String,
    pub img: String,
}
