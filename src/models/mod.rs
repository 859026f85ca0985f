//! # Data Models
//!
//! Entities persisted by the service plus the request and response shapes
//! built from them.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod grid_report;
pub mod issue;
pub mod reservoir_report;
pub mod rule;
pub mod seismic_report;
pub mod user;

pub use grid_report::Entity as GridReport;
pub use issue::Entity as Issue;
pub use reservoir_report::Entity as ReservoirReport;
pub use rule::Entity as Rule;
pub use seismic_report::Entity as SeismicReport;
pub use user::Entity as User;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "meter".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
