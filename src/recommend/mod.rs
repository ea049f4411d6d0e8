//! Recommendations from static rule tables, follow-up scheduling and personalisation.

mod generator;
mod personalize;
pub mod rules;

pub use generator::{sort_by_priority, Category, FollowUpPlan, Priority, Recommendation, RecommendationGenerator};
pub use personalize::{ActionPlan, AgeBand, Gender, PatientProfile, Personalization, WorkType};
