//! Patient records, the column-oriented feature table, loading, validation and cleaning.

mod cleaner;
mod loader;
mod record;
mod table;
mod validator;
pub mod stats;

pub use cleaner::{
    detect_outliers, iqr_bounds, CleanOptions, Cleaner, FillStrategy, FillValue, FittedScaler,
    FittedStats, OutlierAction, OutlierBounds, ScaleParams,
};
pub use loader::{data_info, features_and_target, load_records, load_table, DataInfo, LabeledTable};
pub use record::{encode_category, format_number, PatientRecord, Value, CATEGORY_ENCODINGS};
pub use table::{Column, ColumnData, FeatureTable};
pub use validator::{
    FieldRule, IssueKind, QualityReport, ValidationIssue, ValidationReport, Validator,
    VALIDATION_RULES,
};
