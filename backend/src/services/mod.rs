//! Business logic services

pub mod dashboard;
pub mod movement;

pub use dashboard::{DashboardService, DashboardSummary, ReportingPeriods};
pub use movement::{
    Field, InflowLineInput, MovementFilter, MovementService, OutflowLineInput, PostingIssue,
    Selection,
};
