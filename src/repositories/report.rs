//! # Report Repository
//!
//! Read access to ingested reservoir, grid and seismic reports.

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder};

use crate::models::{
    GridReport, ReservoirReport, SeismicReport, grid_report, reservoir_report, seismic_report,
};
use crate::trigger::{ReportStore, StoreError};

#[derive(Debug, Clone)]
pub struct ReportRepository {
    db: Arc<DatabaseConnection>,
}

impl ReportRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Every reservoir report, newest first.
    pub async fn all_reservoir(&self) -> Result<Vec<reservoir_report::Model>, DbErr> {
        ReservoirReport::find()
            .order_by_desc(reservoir_report::Column::Timestamp)
            .order_by_asc(reservoir_report::Column::Name)
            .all(&*self.db)
            .await
    }

    /// Newest report for each of `names`; dams without data are left out.
    pub async fn latest_reservoirs(
        &self,
        names: &[&str],
    ) -> Result<Vec<reservoir_report::Model>, DbErr> {
        let mut latest = Vec::with_capacity(names.len());
        for name in names {
            if let Some(report) = self.newest_reservoir(name, None).await? {
                latest.push(report);
            }
        }
        Ok(latest)
    }

    pub async fn all_grid(&self) -> Result<Vec<grid_report::Model>, DbErr> {
        GridReport::find()
            .order_by_desc(grid_report::Column::Timestamp)
            .all(&*self.db)
            .await
    }

    pub async fn all_seismic(&self) -> Result<Vec<seismic_report::Model>, DbErr> {
        SeismicReport::find()
            .order_by_desc(seismic_report::Column::Timestamp)
            .all(&*self.db)
            .await
    }

    async fn newest_reservoir(
        &self,
        name: &str,
        newer_than: Option<i64>,
    ) -> Result<Option<reservoir_report::Model>, DbErr> {
        let mut query = ReservoirReport::find().filter(reservoir_report::Column::Name.eq(name));
        if let Some(watermark) = newer_than {
            query = query.filter(reservoir_report::Column::Timestamp.gt(watermark));
        }
        query
            .order_by_desc(reservoir_report::Column::Timestamp)
            .one(&*self.db)
            .await
    }
}

#[async_trait]
impl ReportStore for ReportRepository {
    async fn latest_reservoir(
        &self,
        name: &str,
        newer_than: Option<i64>,
    ) -> Result<Option<reservoir_report::Model>, StoreError> {
        Ok(self.newest_reservoir(name, newer_than).await?)
    }

    async fn latest_grid(&self) -> Result<Option<grid_report::Model>, StoreError> {
        let latest = GridReport::find()
            .order_by_desc(grid_report::Column::Timestamp)
            .one(&*self.db)
            .await?;
        Ok(latest)
    }

    async fn all_seismic_descending(&self) -> Result<Vec<seismic_report::Model>, StoreError> {
        Ok(self.all_seismic().await?)
    }
}
