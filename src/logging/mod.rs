mod format;

pub use format::{AssessmentLogEvent, StructuredLogger};
