pub mod fetch_report;

pub use fetch_report::{
    ConfigSnapshot, FetchReport, FetchSummary, ReportWriter, TrackOutcome, TrackStatus,
};
