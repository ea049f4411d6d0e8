//! Profile-driven message augmentation and action plans. Priorities and categories never change.

use super::generator::{Priority, Recommendation};
use super::rules::{
    Target, AGE_GUIDANCE, CONTACT_LENS_GUIDANCE, FEMALE_GUIDANCE, MALE_GUIDANCE, MOTIVATION, PROGRESS_MESSAGE,
    WORK_GUIDANCE,
};
use crate::data::{PatientRecord, Value};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeBand {
    Young,
    Middle,
    Senior,
}

impl AgeBand {
    /// young below 31, middle 31 to 45, senior from 46
    pub fn from_age(age: f64) -> Self {
        if age < 31.0 {
            AgeBand::Young
        } else if age < 46.0 {
            AgeBand::Middle
        } else {
            AgeBand::Senior
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Female,
    Male,
}

impl Gender {
    /// `F` or `0` reads as female; anything else as male.
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Text(s)) if s.trim().eq_ignore_ascii_case("f") || s.trim() == "0" => Gender::Female,
            Some(Value::Number(n)) if *n == 0.0 => Gender::Female,
            _ => Gender::Male,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkType {
    Office,
    Outdoor,
}

impl WorkType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "office" => Some(WorkType::Office),
            "outdoor" => Some(WorkType::Outdoor),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientProfile {
    pub age: f64,
    pub gender: Gender,
    pub work_type: Option<WorkType>,
    pub contact_lenses: bool,
}

impl PatientProfile {
    /// Age defaults to 30 and gender to male when absent.
    pub fn from_record(record: &PatientRecord) -> Self {
        Self {
            age: record.number("age").unwrap_or(30.0),
            gender: Gender::from_value(record.get("gender")),
            work_type: record.text("work_type").and_then(WorkType::parse),
            contact_lenses: record.number("contact_lenses").map_or(false, |v| v != 0.0),
        }
    }

    pub fn age_band(&self) -> AgeBand {
        AgeBand::from_age(self.age)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPlan {
    pub immediate_actions: Vec<Recommendation>,
    pub short_term_goals: Vec<Recommendation>,
    pub long_term_maintenance: Vec<Recommendation>,
    pub profile: PatientProfile,
}

fn applies(target: Target, rec: &Recommendation) -> bool {
    match target {
        Target::Factor(f) => rec.factor == f,
        Target::Category(c) => rec.category == c,
    }
}

fn append(rec: &mut Recommendation, guidance: &str) {
    rec.message.push_str(". ");
    rec.message.push_str(guidance);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Personalization;

impl Personalization {
    pub fn new() -> Self {
        Self
    }

    pub fn by_age(&self, recommendations: &mut [Recommendation], band: AgeBand) {
        for rec in recommendations.iter_mut() {
            for (_, target, text) in AGE_GUIDANCE.iter().filter(|(b, _, _)| *b == band) {
                if applies(*target, rec) {
                    append(rec, text);
                }
            }
        }
    }

    pub fn by_gender(&self, recommendations: &mut [Recommendation], gender: Gender) {
        let table = match gender {
            Gender::Female => FEMALE_GUIDANCE,
            Gender::Male => MALE_GUIDANCE,
        };
        for rec in recommendations.iter_mut() {
            for (target, text) in table {
                if applies(*target, rec) {
                    append(rec, text);
                }
            }
        }
    }

    pub fn by_lifestyle(&self, recommendations: &mut [Recommendation], work_type: Option<WorkType>, contact_lenses: bool) {
        for rec in recommendations.iter_mut() {
            if let Some(work) = work_type {
                for (_, target, text) in WORK_GUIDANCE.iter().filter(|(w, _, _)| *w == work) {
                    if applies(*target, rec) {
                        append(rec, text);
                    }
                }
            }
            if contact_lenses {
                for (target, text) in CONTACT_LENS_GUIDANCE {
                    if applies(*target, rec) {
                        append(rec, text);
                    }
                }
            }
        }
    }

    /// Personalise by age, gender and lifestyle, then bucket by priority.
    pub fn action_plan(&self, recommendations: &[Recommendation], profile: &PatientProfile) -> ActionPlan {
        let mut recs = recommendations.to_vec();
        self.by_age(&mut recs, profile.age_band());
        self.by_gender(&mut recs, profile.gender);
        self.by_lifestyle(&mut recs, profile.work_type, profile.contact_lenses);

        let mut plan = ActionPlan {
            immediate_actions: Vec::new(),
            short_term_goals: Vec::new(),
            long_term_maintenance: Vec::new(),
            profile: profile.clone(),
        };
        for rec in recs {
            match rec.priority {
                Priority::Critical | Priority::High => plan.immediate_actions.push(rec),
                Priority::Medium => plan.short_term_goals.push(rec),
                Priority::Low => plan.long_term_maintenance.push(rec),
            }
        }
        plan
    }

    pub fn motivational_messages(&self, profile: &PatientProfile, has_improvements: bool) -> Vec<String> {
        let band = profile.age_band();
        let mut messages: Vec<String> = MOTIVATION
            .iter()
            .filter(|(b, _)| *b == band)
            .map(|(_, m)| m.to_string())
            .collect();
        if has_improvements {
            messages.push(PROGRESS_MESSAGE.to_string());
        }
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recommend::Category;

    fn rec(category: Category, factor: &str, priority: Priority) -> Recommendation {
        Recommendation {
            category,
            factor: factor.to_string(),
            current_value: None,
            message: "Base".to_string(),
            priority,
        }
    }

    #[test]
    fn age_bands() {
        assert_eq!(AgeBand::from_age(30.0), AgeBand::Young);
        assert_eq!(AgeBand::from_age(31.0), AgeBand::Middle);
        assert_eq!(AgeBand::from_age(45.0), AgeBand::Middle);
        assert_eq!(AgeBand::from_age(46.0), AgeBand::Senior);
    }

    #[test]
    fn personalisation_only_touches_messages() {
        let p = Personalization;
        let profile = PatientProfile::from_record(
            &PatientRecord::new()
                .with("age", 25.0)
                .with("gender", "F")
                .with("work_type", "office")
                .with("contact_lenses", "Yes"),
        );
        assert_eq!(profile.gender, Gender::Female);
        assert!(profile.contact_lenses);
        let recs = vec![
            rec(Category::Lifestyle, "screen_time", Priority::High),
            rec(Category::Medical, "severity", Priority::Medium),
            rec(Category::Lifestyle, "other", Priority::Low),
        ];
        let plan = p.action_plan(&recs, &profile);
        let screen = &plan.immediate_actions[0];
        assert_eq!(screen.priority, Priority::High);
        assert!(screen.message.contains("blue light"));
        assert!(screen.message.contains("ergonomic assessment"));
        assert!(plan.short_term_goals[0].message.contains("contact lens use"));
        assert_eq!(plan.long_term_maintenance[0].message, "Base");
    }

    #[test]
    fn motivation_per_band() {
        let p = Personalization;
        let senior = PatientProfile::from_record(&PatientRecord::new().with("age", 60.0));
        let messages = p.motivational_messages(&senior, true);
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("independence"));
    }
}
