//! # Report Ingestion
//!
//! Data sources fetch public reports over HTTP and hand back validated rows.
//! [`save_batch`] stores them insert-or-ignore on each table's natural key,
//! so re-fetching overlapping windows never duplicates a report.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use reqwest::Client;
use sea_orm::sea_query::OnConflict;
use sea_orm::{DatabaseConnection, DbErr, EntityTrait, Set};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

use crate::config::IngestConfig;
use crate::models::grid_report::{self, NewGridReport};
use crate::models::reservoir_report::{self, NewReservoirReport};
use crate::models::seismic_report::{self, NewSeismicReport};
use crate::models::{GridReport, ReservoirReport, SeismicReport};

pub mod grid;
pub mod seismic;

pub use grid::GridSource;
pub use seismic::SeismicSource;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
    #[error("malformed payload: {0}")]
    Payload(String),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// Rows produced by one fetch, all of a single report kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportBatch {
    Reservoir(Vec<NewReservoirReport>),
    Grid(Vec<NewGridReport>),
    Seismic(Vec<NewSeismicReport>),
}

impl ReportBatch {
    pub fn kind(&self) -> &'static str {
        match self {
            ReportBatch::Reservoir(_) => "reservoir",
            ReportBatch::Grid(_) => "grid",
            ReportBatch::Seismic(_) => "seismic",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ReportBatch::Reservoir(rows) => rows.len(),
            ReportBatch::Grid(rows) => rows.len(),
            ReportBatch::Seismic(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
pub trait DataSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(&self) -> Result<ReportBatch, SourceError>;
}

/// Store a batch, skipping rows whose natural key already exists.
/// Returns the number of rows actually inserted.
pub async fn save_batch(db: &DatabaseConnection, batch: ReportBatch) -> Result<u64, DbErr> {
    if batch.is_empty() {
        return Ok(0);
    }

    match batch {
        ReportBatch::Reservoir(rows) => {
            let models = rows.into_iter().map(|r| reservoir_report::ActiveModel {
                name: Set(r.name),
                timestamp: Set(r.timestamp),
                storage: Set(r.storage),
                percent: Set(r.percent),
                ..Default::default()
            });
            ReservoirReport::insert_many(models)
                .on_conflict(
                    OnConflict::columns([
                        reservoir_report::Column::Name,
                        reservoir_report::Column::Timestamp,
                    ])
                    .do_nothing()
                    .to_owned(),
                )
                .exec_without_returning(db)
                .await
        }
        ReportBatch::Grid(rows) => {
            let models = rows.into_iter().map(|r| grid_report::ActiveModel {
                timestamp: Set(r.timestamp),
                east: Set(r.east),
                south: Set(r.south),
                central: Set(r.central),
                north: Set(r.north),
                ..Default::default()
            });
            GridReport::insert_many(models)
                .on_conflict(
                    OnConflict::column(grid_report::Column::Timestamp)
                        .do_nothing()
                        .to_owned(),
                )
                .exec_without_returning(db)
                .await
        }
        ReportBatch::Seismic(rows) => {
            let models = rows.into_iter().map(|r| seismic_report::ActiveModel {
                timestamp: Set(r.timestamp),
                geometry: Set(r.geometry),
                scale: Set(r.scale),
                intensity: Set(r.intensity),
                link: Set(r.link),
                img: Set(r.img),
                ..Default::default()
            });
            SeismicReport::insert_many(models)
                .on_conflict(
                    OnConflict::column(seismic_report::Column::Timestamp)
                        .do_nothing()
                        .to_owned(),
                )
                .exec_without_returning(db)
                .await
        }
    }
}

/// HTTP sources configured by `INGEST_*`.
pub fn sources_from_config(config: &IngestConfig) -> Result<Vec<Arc<dyn DataSource>>, SourceError> {
    let client = Client::builder()
        .timeout(config.request_timeout())
        .user_agent(concat!("meter/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let sources: Vec<Arc<dyn DataSource>> = vec![
        Arc::new(GridSource::new(client.clone(), &config.grid_base_url)),
        Arc::new(SeismicSource::new(client, &config.seismic_url)),
    ];
    Ok(sources)
}

/// Periodically fetches every source and stores what it returns.
pub struct IngestScheduler {
    db: Arc<DatabaseConnection>,
    sources: Vec<Arc<dyn DataSource>>,
    interval: Duration,
}

impl IngestScheduler {
    pub fn new(
        db: Arc<DatabaseConnection>,
        sources: Vec<Arc<dyn DataSource>>,
        interval: Duration,
    ) -> Self {
        Self {
            db,
            sources,
            interval,
        }
    }

    /// Fetch and store every source once. A failing source is logged and
    /// does not stop the others.
    #[instrument(skip(self))]
    pub async fn run_once(&self) -> u64 {
        let mut saved = 0;
        for source in &self.sources {
            let batch = match source.fetch().await {
                Ok(batch) => batch,
                Err(err) => {
                    error!(source = source.name(), error = %err, "Source fetch failed");
                    continue;
                }
            };

            let fetched = batch.len();
            let kind = batch.kind();
            match save_batch(&self.db, batch).await {
                Ok(inserted) => {
                    counter!("ingest_reports_saved_total", "source" => source.name())
                        .increment(inserted);
                    info!(source = source.name(), kind, fetched, inserted, "Reports ingested");
                    saved += inserted;
                }
                Err(err) => {
                    error!(source = source.name(), error = %err, "Saving reports failed");
                }
            }
        }
        saved
    }

    /// Run immediately, then every interval until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            sources = self.sources.len(),
            interval_secs = self.interval.as_secs(),
            "Ingest scheduler started"
        );
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Ingest scheduler stopping");
                    break;
                }
                _ = ticker.tick() => {
                    self.run_once().await;
                }
            }
        }
    }
}

/// Round to two decimals, as the upstream dashboards publish.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
