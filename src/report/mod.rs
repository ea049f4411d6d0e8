//! Patient and batch reports with text, JSON and CSV output.

mod generator;
mod render;

pub use generator::{
    BatchFailure, BatchReport, PatientInfo, PatientReport, ReportGenerator, RiskDistribution, SummaryStatistics,
};
pub use render::{
    default_report_path, render, render_csv, render_json, render_text, save_batch_report, save_report, ReportFormat,
};
