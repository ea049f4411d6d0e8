//! Tracing setup plus ndjson audit lines for batch assessments.

use serde::Serialize;
use std::io::Write;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// One line per assessed (or failed) record in a batch run.
#[derive(Debug, Serialize)]
pub struct AssessmentLogEvent<'a> {
    pub ts: String,
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_probability: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_category: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity_level: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a str>,
}

impl<'a> AssessmentLogEvent<'a> {
    pub fn failure(index: usize, error: &'a str) -> Self {
        Self {
            ts: chrono::Utc::now().to_rfc3339(),
            index,
            report_id: None,
            risk_probability: None,
            risk_category: None,
            severity_level: None,
            error: Some(error),
        }
    }
}

pub struct StructuredLogger;

impl StructuredLogger {
    /// Install the global subscriber writing to stderr so stdout stays free for reports.
    /// `RUST_LOG` overrides `default_level`. A second call is a no-op.
    pub fn init(json: bool, default_level: &str) {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
        let result = if json {
            let fmt = tracing_subscriber::fmt::layer()
                .json()
                .with_span_events(FmtSpan::NONE)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry().with(filter).with(fmt).try_init()
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .try_init()
        };
        let _ = result;
    }

    /// Write one JSON line without going through tracing.
    pub fn emit_json(event: &impl Serialize, w: &mut (impl Write + ?Sized)) {
        if let Ok(line) = serde_json::to_string(event) {
            let _ = writeln!(w, "{}", line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_line_omits_empty_fields() {
        let mut buf = Vec::new();
        StructuredLogger::emit_json(&AssessmentLogEvent::failure(3, "bad age"), &mut buf);
        let line = String::from_utf8(buf).unwrap();
        assert!(line.ends_with('\n'));
        let v: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(v["index"], 3);
        assert_eq!(v["error"], "bad age");
        assert!(v.get("risk_probability").is_none());
    }
}
