//! Power grid load source.
//!
//! Reads the forecast maximum supply from `loadpara.json`, splits it across
//! the four regions, and pairs it with the per-region loads of
//! `loadareas.csv` (`HH:MM,east,south,central,north`).

use async_trait::async_trait;
use chrono::{Local, NaiveDate, NaiveTime, TimeZone};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use super::{DataSource, ReportBatch, SourceError, round2};
use crate::models::grid_report::{NewGridReport, RegionLoad, reserve_margin};

/// Share of the national maximum supply available to east, south, central
/// and north, in that order.
pub const SUPPLY_RATIOS: [f64; 4] = [0.022, 0.32, 0.33, 0.35];

pub struct GridSource {
    client: Client,
    base_url: String,
}

impl GridSource {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn get(&self, file: &str) -> Result<reqwest::Response, SourceError> {
        let url = format!("{}/{file}", self.base_url);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(SourceError::Status {
                url,
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }

    async fn regional_supply(&self) -> Result<[f64; 4], SourceError> {
        let body: Value = self.get("loadpara.json").await?.json().await?;
        let capacity = body
            .pointer("/records/1/fore_maxi_sply_capacity")
            .and_then(number)
            .ok_or_else(|| {
                SourceError::Payload("loadpara.json lacks records[1].fore_maxi_sply_capacity".into())
            })?;
        Ok(SUPPLY_RATIOS.map(|ratio| ratio * capacity))
    }
}

#[async_trait]
impl DataSource for GridSource {
    fn name(&self) -> &'static str {
        "grid"
    }

    async fn fetch(&self) -> Result<ReportBatch, SourceError> {
        let supply = self.regional_supply().await?;
        let loads = self.get("loadareas.csv").await?.text().await?;
        let reports = parse_loads(&loads, supply, Local::now().date_naive(), &Local)?;
        debug!(rows = reports.len(), "Parsed grid loads");
        Ok(ReportBatch::Grid(reports))
    }
}

/// Accepts the capacity as a JSON number or a numeric string.
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Parse `loadareas.csv`. Row times are taken on `date` in `tz`.
/// Rows that do not parse are logged and skipped.
pub fn parse_loads<Tz: TimeZone>(
    text: &str,
    supply: [f64; 4],
    date: NaiveDate,
    tz: &Tz,
) -> Result<Vec<NewGridReport>, SourceError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut reports = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        match parse_row(&record, supply, date, tz) {
            Some(report) => reports.push(report),
            None => warn!(row = ?record, "Skipping malformed grid load row"),
        }
    }
    Ok(reports)
}

fn parse_row<Tz: TimeZone>(
    record: &csv::StringRecord,
    supply: [f64; 4],
    date: NaiveDate,
    tz: &Tz,
) -> Option<NewGridReport> {
    if record.len() < 5 {
        return None;
    }
    let time = parse_clock(record.get(0)?)?;
    let timestamp = tz
        .from_local_datetime(&date.and_time(time))
        .earliest()?
        .timestamp();

    let mut loads = [0.0; 4];
    for (slot, field) in loads.iter_mut().zip(record.iter().skip(1)) {
        *slot = field.parse().ok()?;
    }

    let region = |i: usize| RegionLoad {
        load: loads[i],
        max_supply: round2(supply[i]),
        recv_rate: round2(reserve_margin(loads[i], supply[i])),
    };

    Some(NewGridReport {
        timestamp,
        east: region(0),
        south: region(1),
        central: region(2),
        north: region(3),
    })
}

/// `HH:MM`, or a bare hour.
fn parse_clock(field: &str) -> Option<NaiveTime> {
    let (hour, minute) = match field.split_once(':') {
        Some((h, m)) => (h.parse().ok()?, m.parse().ok()?),
        None => (field.parse().ok()?, 0),
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}
