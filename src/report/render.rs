//! Text, JSON and CSV rendering and file output.

use super::generator::{BatchReport, PatientReport};
use crate::error::{Error, Result};
use chrono::Local;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Text,
    Csv,
}

impl ReportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ReportFormat::Json => "json",
            ReportFormat::Text => "txt",
            ReportFormat::Csv => "csv",
        }
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ReportFormat::Json),
            "txt" | "text" => Ok(ReportFormat::Text),
            "csv" => Ok(ReportFormat::Csv),
            other => Err(format!("unknown report format {}, expected txt, json or csv", other)),
        }
    }
}

fn title_case(key: &str) -> String {
    key.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out, "{}", title);
    let _ = writeln!(out, "{}", "-".repeat(title.len()));
}

pub fn render_json(report: &PatientReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Fixed layout: header, patient info, risk, severity, key factors, recommendations, follow-up.
pub fn render_text(report: &PatientReport) -> String {
    let mut out = String::new();
    let rule = "=".repeat(60);
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "DRY EYE DISEASE RISK ASSESSMENT REPORT");
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "Report ID: {}", report.report_id);
    let _ = writeln!(
        out,
        "Assessment Date: {}",
        report.assessment_date.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
    );
    out.push('\n');

    section(&mut out, "PATIENT INFORMATION");
    for (key, value) in report.patient_info.fields() {
        let _ = writeln!(out, "{}: {}", title_case(key), value);
    }
    out.push('\n');

    section(&mut out, "RISK ASSESSMENT");
    let risk = &report.risk_assessment;
    let _ = writeln!(out, "Risk Probability: {:.3}", risk.probability);
    let _ = writeln!(out, "Risk Category: {}", risk.category);
    let _ = writeln!(out, "Confidence Level: {}", risk.confidence);
    out.push('\n');

    section(&mut out, "SEVERITY ASSESSMENT");
    let severity = &report.severity_assessment;
    let _ = writeln!(out, "Severity Level: {}", severity.level().index());
    let _ = writeln!(out, "Severity Description: {}", severity.level().name());
    let _ = writeln!(out, "Method: {} (confidence {:.2})", severity.method(), severity.confidence());
    out.push('\n');

    section(&mut out, "KEY RISK FACTORS");
    for (factor, summary) in &report.key_factors {
        let _ = writeln!(
            out,
            "{}: {} (Importance: {:.3})",
            title_case(factor),
            crate::data::format_number(summary.value),
            summary.importance
        );
    }
    out.push('\n');

    section(&mut out, "RECOMMENDATIONS");
    for (i, rec) in report.recommendations.iter().enumerate() {
        let _ = writeln!(out, "{}. [{}] {}: {}", i + 1, rec.priority, rec.category, rec.message);
    }
    out.push('\n');

    section(&mut out, "FOLLOW-UP PLAN");
    let follow = &report.follow_up;
    let _ = writeln!(out, "Next Assessment: {}", follow.next_assessment);
    let _ = writeln!(out, "Follow-up Frequency: {}", follow.follow_up_frequency);
    let _ = writeln!(out, "Monitoring Duration: {}", follow.monitoring_duration);
    let _ = write!(
        out,
        "Specialist Referral: {}",
        if follow.specialist_referral { "Yes" } else { "No" }
    );
    out
}

/// One header row and one data row with `patient_`, `risk_` and `severity_` prefixed keys.
pub fn render_csv(report: &PatientReport) -> Result<String> {
    let mut header: Vec<String> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut push = |k: String, v: String| {
        header.push(k);
        row.push(v);
    };
    for (key, value) in report.patient_info.fields() {
        push(format!("patient_{}", key), value.to_string());
    }
    let risk = &report.risk_assessment;
    push("risk_probability".into(), risk.probability.to_string());
    push("risk_at_risk".into(), risk.at_risk.to_string());
    push("risk_category".into(), risk.category.to_string());
    push("risk_confidence".into(), risk.confidence.to_string());
    push("risk_confidence_score".into(), risk.confidence_score.to_string());
    let severity = &report.severity_assessment;
    push("severity_method".into(), severity.method().to_string());
    push("severity_level".into(), severity.level().index().to_string());
    push("severity_name".into(), severity.level().name().to_string());
    push("severity_confidence".into(), severity.confidence().to_string());
    push(
        "assessment_date".into(),
        report.assessment_date.format("%Y-%m-%d %H:%M:%S").to_string(),
    );
    push("recommendations_count".into(), report.recommendations.len().to_string());

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&header)?;
    writer.write_record(&row)?;
    let bytes = writer
        .into_inner()
        .map_err(|e| Error::InvalidInput(format!("csv buffer: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| Error::InvalidInput(e.to_string()))
}

pub fn render(report: &PatientReport, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Json => render_json(report),
        ReportFormat::Text => Ok(render_text(report)),
        ReportFormat::Csv => render_csv(report),
    }
}

/// `dry_eye_report_<timestamp>.<ext>` inside `dir`.
pub fn default_report_path(dir: &Path, format: ReportFormat) -> PathBuf {
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    dir.join(format!("dry_eye_report_{}.{}", stamp, format.extension()))
}

fn write_creating_dirs(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)?;
    Ok(())
}

/// Render and write `report`. Parent directories are created as needed.
pub fn save_report(report: &PatientReport, format: ReportFormat, path: &Path) -> Result<PathBuf> {
    write_creating_dirs(path, &render(report, format)?)?;
    info!(path = %path.display(), format = format.extension(), "report saved");
    Ok(path.to_path_buf())
}

pub fn save_batch_report(batch: &BatchReport, path: &Path) -> Result<PathBuf> {
    write_creating_dirs(path, &serde_json::to_string_pretty(batch)?)?;
    info!(
        path = %path.display(),
        reports = batch.individual_reports.len(),
        failures = batch.failures.len(),
        "batch report saved"
    );
    Ok(path.to_path_buf())
}
