//! Resolution of a rule onto the report that backs it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument};

use super::TriggerError;
use super::store::{ReportStore, StoreError};
use crate::models::grid_report::RegionLoad;
use crate::models::reservoir_report;
use crate::models::rule::{self, Domain, GridRegion, RuleResource};

/// Reading from the report that satisfied a rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trigger {
    pub timestamp: i64,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution {
    Matched(Trigger),
    /// Eligible data exists but does not satisfy the condition
    NoMatch,
    /// No eligible data yet
    NoData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReservoirField {
    Storage,
    Percent,
}

impl ReservoirField {
    fn read(self, report: &reservoir_report::Model) -> f64 {
        match self {
            ReservoirField::Storage => report.storage,
            ReservoirField::Percent => report.percent,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GridField {
    Load,
    MaxSupply,
    RecvRate,
}

impl GridField {
    fn read(self, region: &RegionLoad) -> f64 {
        match self {
            GridField::Load => region.load,
            GridField::MaxSupply => region.max_supply,
            GridField::RecvRate => region.recv_rate,
        }
    }
}

/// Concrete data a rule points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Reservoir {
        dam: &'static str,
        field: ReservoirField,
    },
    Grid {
        region: GridRegion,
        field: GridField,
    },
    Seismic {
        station: usize,
    },
}

impl Target {
    fn for_rule(rule: &rule::Model) -> Result<Self, TriggerError> {
        let mismatch = || TriggerError::Configuration {
            rule_id: rule.id,
            position: rule.position,
            resource: rule.resource,
        };

        let target = match (rule.position.domain(), rule.resource) {
            (Domain::Reservoir, RuleResource::Storage | RuleResource::Percent) => {
                Target::Reservoir {
                    dam: rule.position.dam_name().ok_or_else(mismatch)?,
                    field: if rule.resource == RuleResource::Storage {
                        ReservoirField::Storage
                    } else {
                        ReservoirField::Percent
                    },
                }
            }
            (Domain::Electricity, RuleResource::Load) => Target::Grid {
                region: rule.position.grid_region().ok_or_else(mismatch)?,
                field: GridField::Load,
            },
            (Domain::Electricity, RuleResource::MaxSupply) => Target::Grid {
                region: rule.position.grid_region().ok_or_else(mismatch)?,
                field: GridField::MaxSupply,
            },
            (Domain::Electricity, RuleResource::RecvRate) => Target::Grid {
                region: rule.position.grid_region().ok_or_else(mismatch)?,
                field: GridField::RecvRate,
            },
            (Domain::Earthquake, RuleResource::Intensity) => Target::Seismic {
                station: rule.position.seismic_station().ok_or_else(mismatch)?,
            },
            _ => return Err(mismatch()),
        };
        Ok(target)
    }
}

/// Decides whether the newest not-yet-processed report satisfies a rule.
///
/// A report is eligible only when its timestamp is strictly greater than the
/// rule's `last_triggered_by`. Resolution never writes.
#[derive(Clone)]
pub struct RuleEvaluator {
    reports: Arc<dyn ReportStore>,
    store_timeout: Duration,
}

impl RuleEvaluator {
    pub fn new(reports: Arc<dyn ReportStore>, store_timeout: Duration) -> Self {
        Self {
            reports,
            store_timeout,
        }
    }

    #[instrument(skip_all, fields(rule_id = rule.id, position = %rule.position))]
    pub async fn resolve(&self, rule: &rule::Model) -> Result<Resolution, TriggerError> {
        let watermark = rule.last_triggered_by;
        let resolution = match Target::for_rule(rule)? {
            Target::Reservoir { dam, field } => {
                let report = self
                    .bounded(
                        "latest reservoir report",
                        self.reports.latest_reservoir(dam, watermark),
                    )
                    .await?;
                match report {
                    None => Resolution::NoData,
                    Some(report) => {
                        let value = field.read(&report);
                        // `storage` and `percent` carry -1 when the dam did not
                        // report (see `reservoir_report::Model`). Treat that as no
                        // reading rather than comparing the sentinel.
                        if value < 0.0 {
                            Resolution::NoData
                        } else {
                            compare(rule, report.timestamp, value)
                        }
                    }
                }
            }
            Target::Grid { region, field } => {
                let report = self
                    .bounded("latest grid report", self.reports.latest_grid())
                    .await?;
                match report {
                    None => Resolution::NoData,
                    Some(report) if !is_newer(report.timestamp, watermark) => Resolution::NoData,
                    Some(report) => {
                        let value = field.read(report.region(region));
                        compare(rule, report.timestamp, value)
                    }
                }
            }
            Target::Seismic { station } => {
                let reports = self
                    .bounded("seismic reports", self.reports.all_seismic_descending())
                    .await?;
                scan_seismic(rule, station, &reports)?
            }
        };

        debug!(?resolution, "Rule resolved");
        Ok(resolution)
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T, TriggerError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        bounded(operation, self.store_timeout, fut).await
    }
}

/// Runs a store call under `timeout`, folding both failure modes into `TriggerError`.
pub(crate) async fn bounded<T, F>(
    operation: &'static str,
    timeout: Duration,
    fut: F,
) -> Result<T, TriggerError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| TriggerError::Timeout { operation, timeout })?
        .map_err(|source| TriggerError::Storage { operation, source })
}

fn is_newer(timestamp: i64, watermark: Option<i64>) -> bool {
    watermark.is_none_or(|mark| timestamp > mark)
}

fn compare(rule: &rule::Model, timestamp: i64, value: f64) -> Resolution {
    if rule.operator.check(value, rule.value) {
        Resolution::Matched(Trigger { timestamp, value })
    } else {
        Resolution::NoMatch
    }
}

/// Newest-first scan that stops at the watermark.
fn scan_seismic(
    rule: &rule::Model,
    station: usize,
    reports: &[crate::models::seismic_report::Model],
) -> Result<Resolution, TriggerError> {
    let mut saw_eligible = false;
    for report in reports {
        if !is_newer(report.timestamp, rule.last_triggered_by) {
            break;
        }
        saw_eligible = true;

        let intensity = report
            .intensity_at(station)
            .ok_or_else(|| TriggerError::MalformedReport {
                kind: "seismic",
                timestamp: report.timestamp,
                reason: format!(
                    "expected 3 station intensities, found {}",
                    report.intensity.0.len()
                ),
            })?;

        if rule.operator.check(f64::from(intensity), rule.value) {
            return Ok(Resolution::Matched(Trigger {
                timestamp: report.timestamp,
                value: f64::from(intensity),
            }));
        }
    }

    Ok(if saw_eligible {
        Resolution::NoMatch
    } else {
        Resolution::NoData
    })
}
