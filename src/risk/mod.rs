//! Risk categories and alerts, severity classification, and factor analysis.

mod engine;
mod factors;
mod severity;

pub use engine::{
    normalize_feature_value, AlertLevel, ConfidenceLevel, FactorContribution, PopulationRisk, RiskAlert,
    RiskAssessment, RiskAssessor, RiskCategory, RiskComparison, RiskTrend, TrendDirection,
};
pub use factors::{
    factor_weight, Correlation, CorrelationStrength, FactorAnalyzer, FactorSummary, RankBy, FACTOR_WEIGHTS,
};
pub use severity::{
    feature_score, rule_score, Consistency, ProgressionFlags, ProgressionRisk, SeverityAssessment,
    SeverityClassifier, SeverityDirection, SeverityLevel, SeverityTrend,
};
