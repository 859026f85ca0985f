//! Report ingestion into SQLite.

#[path = "test_utils/mod.rs"]
mod test_utils;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use meter::ingest::{DataSource, IngestScheduler, ReportBatch, SourceError, save_batch};
use meter::models::grid_report::{NewGridReport, RegionLoad};
use meter::models::reservoir_report::NewReservoirReport;
use meter::models::seismic_report::{Geometry, NewSeismicReport, StationIntensity};
use meter::models::{GridReport, ReservoirReport, SeismicReport};
use sea_orm::{EntityTrait, PaginatorTrait};
use test_utils::setup_test_db;

fn reservoirs() -> ReportBatch {
    ReportBatch::Reservoir(vec![
        NewReservoirReport {
            name: "石門水庫".to_string(),
            timestamp: 100,
            storage: 1000.0,
            percent: 40.0,
        },
        NewReservoirReport {
            name: "德基水庫".to_string(),
            timestamp: 100,
            storage: 2000.0,
            percent: 60.0,
        },
    ])
}

fn grid(timestamp: i64) -> NewGridReport {
    let region = RegionLoad::new(100.0, 110.0);
    NewGridReport {
        timestamp,
        east: region.clone(),
        south: region.clone(),
        central: region.clone(),
        north: region,
    }
}

struct StaticSource(ReportBatch);

#[async_trait]
impl DataSource for StaticSource {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn fetch(&self) -> Result<ReportBatch, SourceError> {
        Ok(self.0.clone())
    }
}

struct BrokenSource;

#[async_trait]
impl DataSource for BrokenSource {
    fn name(&self) -> &'static str {
        "broken"
    }

    async fn fetch(&self) -> Result<ReportBatch, SourceError> {
        Err(SourceError::Payload("upstream sent HTML".to_string()))
    }
}

#[tokio::test]
async fn saving_the_same_batch_twice_is_a_no_op() {
    let db = setup_test_db().await.unwrap();

    assert_eq!(save_batch(&db, reservoirs()).await.unwrap(), 2);
    assert_eq!(save_batch(&db, reservoirs()).await.unwrap(), 0);
    assert_eq!(ReservoirReport::find().count(&db).await.unwrap(), 2);

    let mixed = ReportBatch::Grid(vec![grid(10), grid(20)]);
    assert_eq!(save_batch(&db, ReportBatch::Grid(vec![grid(10)])).await.unwrap(), 1);
    assert_eq!(save_batch(&db, mixed).await.unwrap(), 1);
    assert_eq!(GridReport::find().count(&db).await.unwrap(), 2);
}

#[tokio::test]
async fn empty_batches_store_nothing() {
    let db = setup_test_db().await.unwrap();
    assert_eq!(save_batch(&db, ReportBatch::Seismic(Vec::new())).await.unwrap(), 0);
    assert_eq!(SeismicReport::find().count(&db).await.unwrap(), 0);
}

#[tokio::test]
async fn scheduler_skips_failing_sources() {
    let db = Arc::new(setup_test_db().await.unwrap());
    let quake = NewSeismicReport {
        timestamp: 1_700_000_000,
        geometry: Geometry::point(121.5, 24.1),
        scale: 4.2,
        intensity: StationIntensity(vec![1, 2, 0]),
        link: "https://example.com/eq/1".to_string(),
        img: "https://example.com/eq/1.png".to_string(),
    };
    let sources: Vec<Arc<dyn DataSource>> = vec![
        Arc::new(BrokenSource),
        Arc::new(StaticSource(ReportBatch::Seismic(vec![quake]))),
        Arc::new(StaticSource(reservoirs())),
    ];
    let scheduler = IngestScheduler::new(db.clone(), sources, Duration::from_secs(3600));

    assert_eq!(scheduler.run_once().await, 3);
    assert_eq!(scheduler.run_once().await, 0);

    let stored = SeismicReport::find().all(&*db).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].intensity.0, vec![1, 2, 0]);
}
