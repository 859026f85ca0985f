//! # Repository Layer
//!
//! SeaORM access for every entity. Rule, issue and report repositories also
//! implement the trigger engine's store traits.

pub mod issue;
pub mod report;
pub mod rule;
pub mod user;

pub use issue::IssueRepository;
pub use report::ReportRepository;
pub use rule::RuleRepository;
pub use user::{NewUser, UserRepository};
