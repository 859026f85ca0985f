//! Earthquake report source.
//!
//! Queries the seismology center's event table for the current month and
//! estimates the intensity each event produced at three monitored stations.

use async_trait::async_trait;
use chrono::{Datelike, Local, NaiveDateTime, TimeZone};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{DataSource, ReportBatch, SourceError};
use crate::models::seismic_report::{Geometry, NewSeismicReport, StationIntensity};

const EVENT_PAGE_URL: &str = "https://scweb.cwb.gov.tw/zh-tw/earthquake/imgs";
const EVENT_IMAGE_URL: &str = "https://scweb.cwb.gov.tw/webdata/OLDEQ";

/// A monitored site: longitude, latitude and soil amplification factor.
#[derive(Debug, Clone, Copy)]
pub struct Station {
    pub longitude: f64,
    pub latitude: f64,
    pub site_factor: f64,
}

/// Hsinchu, Taichung and Tainan, in the order of a report's intensity list.
pub const STATIONS: [Station; 3] = [
    Station {
        longitude: 121.010,
        latitude: 24.7730,
        site_factor: 1.758,
    },
    Station {
        longitude: 120.618,
        latitude: 24.2115,
        site_factor: 1.063,
    },
    Station {
        longitude: 120.272,
        latitude: 23.1135,
        site_factor: 1.968,
    },
];

pub struct SeismicSource {
    client: Client,
    url: String,
}

#[derive(Debug, Deserialize)]
struct EventTable {
    data: Vec<Vec<Value>>,
}

impl SeismicSource {
    pub fn new(client: Client, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
        }
    }

    fn query(year: i32, month: u32) -> Vec<(&'static str, String)> {
        vec![
            ("draw", "1".into()),
            ("order[0][column]", "2".into()),
            ("order[0][dir]", "desc".into()),
            ("start", "0".into()),
            ("length", "50".into()),
            ("Search", format!("{year}年{month}月")),
        ]
    }
}

#[async_trait]
impl DataSource for SeismicSource {
    fn name(&self) -> &'static str {
        "seismic"
    }

    async fn fetch(&self) -> Result<ReportBatch, SourceError> {
        let today = Local::now();
        let response = self
            .client
            .post(&self.url)
            .form(&Self::query(today.year(), today.month()))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SourceError::Status {
                url: self.url.clone(),
                status: response.status().as_u16(),
            });
        }

        let table: EventTable = response
            .json()
            .await
            .map_err(|e| SourceError::Payload(format!("event table: {e}")))?;
        let reports = parse_events(&table.data, &Local);
        debug!(rows = reports.len(), "Parsed seismic events");
        Ok(ReportBatch::Seismic(reports))
    }
}

/// Turn event table rows into reports. Origin times are read in `tz`.
/// Rows that do not parse are logged and skipped.
fn parse_events<Tz: TimeZone>(rows: &[Vec<Value>], tz: &Tz) -> Vec<NewSeismicReport> {
    rows.iter()
        .filter_map(|row| {
            let report = parse_event(row, tz);
            if report.is_none() {
                warn!(row = ?row, "Skipping malformed seismic event row");
            }
            report
        })
        .collect()
}

fn parse_event<Tz: TimeZone>(row: &[Value], tz: &Tz) -> Option<NewSeismicReport> {
    let event_no = text(row.first()?)?;
    let origin = NaiveDateTime::parse_from_str(&text(row.get(2)?)?, "%Y-%m-%d %H:%M:%S").ok()?;
    let timestamp = tz.from_local_datetime(&origin).earliest()?.timestamp();
    let scale = number(row.get(3)?)?;
    let depth = number(row.get(4)?)?;
    let longitude = number(row.get(7)?)?;
    let latitude = number(row.get(8)?)?;

    let month_dir = event_no.get(..6).unwrap_or(&event_no);
    Some(NewSeismicReport {
        timestamp,
        geometry: Geometry::point(longitude, latitude),
        scale,
        intensity: StationIntensity(estimate_intensity(scale, depth, longitude, latitude)),
        link: format!("{EVENT_PAGE_URL}/{event_no}"),
        img: format!("{EVENT_IMAGE_URL}/{month_dir}/{event_no}_H.png"),
    })
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Estimated intensity at each of [`STATIONS`].
pub fn estimate_intensity(magnitude: f64, depth_km: f64, longitude: f64, latitude: f64) -> Vec<i32> {
    STATIONS
        .iter()
        .map(|station| {
            let surface = great_circle_km(
                longitude,
                latitude,
                station.longitude,
                station.latitude,
            );
            let hypocentral = (surface.powi(2) + depth_km.powi(2)).sqrt();
            let pga = 1.657 * (1.533 * magnitude).exp() * hypocentral.powf(-1.607) * station.site_factor;
            intensity_from_pga(pga)
        })
        .collect()
}

/// Peak ground acceleration (gal) to intensity level. Strong shaking is
/// graded on the velocity derived from it.
pub fn intensity_from_pga(pga: f64) -> i32 {
    if pga < 80.0 {
        return match pga {
            p if p < 0.8 => 0,
            p if p < 2.5 => 1,
            p if p < 8.0 => 2,
            p if p < 25.0 => 3,
            _ => 4,
        };
    }

    let pgv = pga / 8.6561;
    match pgv {
        v if v < 15.0 => 4,
        v if v < 50.0 => 5,
        v if v < 140.0 => 6,
        _ => 7,
    }
}

/// Spherical law of cosines distance in kilometres.
pub fn great_circle_km(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let (lat1, lat2) = (lat1.to_radians(), lat2.to_radians());
    let theta = (lon1 - lon2).to_radians();
    let cosine = lat1.sin() * lat2.sin() + lat1.cos() * lat2.cos() * theta.cos();
    let degrees = cosine.clamp(-1.0, 1.0).acos().to_degrees();
    degrees * 60.0 * 1.1515 * 1.609344
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn event_row() -> Value {
        json!([
            "113001", "4", "2024-05-01 08:30:00", "6.0", "10.0", "", "", "121.010", "24.7730"
        ])
    }

    #[test]
    fn pga_thresholds() {
        let cases = [
            (0.5, 0),
            (1.0, 1),
            (3.0, 2),
            (10.0, 3),
            (30.0, 4),
            (79.9, 4),
            (80.0, 4),
            (200.0, 5),
            (500.0, 6),
            (1300.0, 7),
        ];
        for (pga, expected) in cases {
            assert_eq!(intensity_from_pga(pga), expected, "pga {pga}");
        }
    }

    #[test]
    fn distances_are_in_kilometres() {
        assert!(great_circle_km(121.0, 24.0, 121.0, 24.0) < 1e-3);
        let one_degree = great_circle_km(121.0, 24.0, 121.0, 25.0);
        assert!((one_degree - 111.19).abs() < 0.1, "{one_degree}");
    }

    #[test]
    fn epicentre_at_station_is_strongest_there() {
        let intensity = estimate_intensity(6.0, 10.0, 121.010, 24.7730);
        assert_eq!(intensity.len(), 3);
        assert_eq!(intensity[0], 6);
        assert!(intensity[2] < intensity[0]);

        let small = estimate_intensity(3.0, 10.0, 121.010, 24.7730);
        assert_eq!(small[0], 2);
    }

    #[test]
    fn rows_parse_into_reports() {
        let tz = FixedOffset::east_opt(8 * 3600).unwrap();
        let rows = vec![
            event_row().as_array().unwrap().clone(),
            vec![json!("bad")],
        ];

        let reports = parse_events(&rows, &tz);

        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(
            report.timestamp,
            tz.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap().timestamp()
        );
        assert_eq!(report.geometry, Geometry::point(121.010, 24.7730));
        assert_eq!(report.scale, 6.0);
        assert_eq!(report.intensity.0[0], 6);
        assert_eq!(report.link, "https://scweb.cwb.gov.tw/zh-tw/earthquake/imgs/113001");
        assert_eq!(
            report.img,
            "https://scweb.cwb.gov.tw/webdata/OLDEQ/113001/113001_H.png"
        );
    }

    #[tokio::test]
    async fn fetch_posts_month_query() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ajaxhandler"))
            .and(body_string_contains("Search="))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [event_row()]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let source = SeismicSource::new(Client::new(), &format!("{}/ajaxhandler", server.uri()));
        let batch = source.fetch().await.unwrap();

        let ReportBatch::Seismic(reports) = batch else {
            panic!("expected a seismic batch");
        };
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].intensity.0.len(), 3);
    }

    #[tokio::test]
    async fn unexpected_body_is_a_payload_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let source = SeismicSource::new(Client::new(), &server.uri());

        assert!(matches!(
            source.fetch().await.unwrap_err(),
            SourceError::Payload(_)
        ));
    }
}
