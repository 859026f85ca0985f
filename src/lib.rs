//! # Meter Library
//!
//! Rule-based alerting over public reservoir, power grid and earthquake
//! reports: ingestion, the trigger engine, notifications and the HTTP API.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod ingest;
pub mod models;
pub mod notify;
pub mod reports;
pub mod repositories;
pub mod server;
pub mod telemetry;
pub mod trigger;
pub use migration;
