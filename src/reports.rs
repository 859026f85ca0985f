//! # Report Views
//!
//! Read-side shaping of ingested reports: regional reservoir aggregates and
//! the island-wide grid total.

use sea_orm::DbErr;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::grid_report::{self, RegionLoad, reserve_margin};
use crate::models::rule::GridRegion;
use crate::models::{reservoir_report, seismic_report};
use crate::repositories::ReportRepository;

/// Regional reservoir groups and the dams they sum over.
pub const DAM_GROUPS: [(&str, &[&str]); 3] = [
    ("竹", &["石門水庫", "寶山第二水庫", "永和山水庫"]),
    ("中", &["鯉魚潭水庫", "德基水庫"]),
    ("南", &["南化水庫", "曾文水庫", "烏山頭水庫"]),
];

/// Grid report with the sum of all regions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PowerReport {
    #[serde(flatten)]
    pub report: grid_report::Model,
    pub whole: RegionLoad,
}

impl From<grid_report::Model> for PowerReport {
    fn from(report: grid_report::Model) -> Self {
        let whole = whole_region(&report);
        Self { report, whole }
    }
}

#[derive(Debug, Clone)]
pub struct ReportService {
    reports: ReportRepository,
}

impl ReportService {
    pub fn new(reports: ReportRepository) -> Self {
        Self { reports }
    }

    /// Every reservoir report followed by one aggregate per [`DAM_GROUPS`] entry.
    pub async fn dams(&self) -> Result<Vec<reservoir_report::Model>, DbErr> {
        let mut dams = self.reports.all_reservoir().await?;
        for (name, members) in DAM_GROUPS {
            let latest = self.reports.latest_reservoirs(members).await?;
            dams.push(aggregate_dams(name, &latest));
        }
        Ok(dams)
    }

    pub async fn power(&self) -> Result<Vec<PowerReport>, DbErr> {
        let reports = self.reports.all_grid().await?;
        Ok(reports.into_iter().map(PowerReport::from).collect())
    }

    pub async fn earthquakes(&self) -> Result<Vec<seismic_report::Model>, DbErr> {
        self.reports.all_seismic().await
    }
}

/// Sum storage over `members` and derive the combined fill ratio from each
/// member's implied capacity. Unavailable readings are skipped.
pub fn aggregate_dams(name: &str, members: &[reservoir_report::Model]) -> reservoir_report::Model {
    let (storage, capacity) = members
        .iter()
        .filter(|dam| dam.storage >= 0.0 && dam.percent > 0.0)
        .fold((0.0, 0.0), |(storage, capacity), dam| {
            (storage + dam.storage, capacity + dam.storage / dam.percent)
        });

    let percent = if capacity > 0.0 { storage / capacity } else { 0.0 };
    reservoir_report::Model {
        id: 0,
        name: name.to_string(),
        timestamp: 0,
        storage,
        percent,
    }
}

pub fn whole_region(report: &grid_report::Model) -> RegionLoad {
    let (load, max_supply) = GridRegion::ALL
        .iter()
        .map(|region| report.region(*region))
        .fold((0.0, 0.0), |(load, supply), r| {
            (load + r.load, supply + r.max_supply)
        });

    RegionLoad {
        load,
        max_supply,
        recv_rate: reserve_margin(load, max_supply),
    }
}
