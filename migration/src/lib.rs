//! Database migrations for the meter service.
//!
//! Tables are created in dependency order: accounts, rules and issues first,
//! then the three report collections fed by ingestion.

pub use sea_orm_migration::prelude::*;

mod m2024_06_01_000001_create_users;
mod m2024_06_01_000002_create_rules;
mod m2024_06_01_000003_create_issues;
mod m2024_06_02_000001_create_reservoir_reports;
mod m2024_06_02_000002_create_grid_reports;
mod m2024_06_02_000003_create_seismic_reports;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2024_06_01_000001_create_users::Migration),
            Box::new(m2024_06_01_000002_create_rules::Migration),
            Box::new(m2024_06_01_000003_create_issues::Migration),
            Box::new(m2024_06_02_000001_create_reservoir_reports::Migration),
            Box::new(m2024_06_02_000002_create_grid_reports::Migration),
            Box::new(m2024_06_02_000003_create_seismic_reports::Migration),
        ]
    }
}
