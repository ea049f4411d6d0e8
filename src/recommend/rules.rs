//! Static rule tables for recommendations and personalised guidance.

use super::personalize::{AgeBand, WorkType};
use super::Category;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Condition {
    Above(f64),
    Below(f64),
}

impl Condition {
    pub fn matches(self, value: f64) -> bool {
        match self {
            Condition::Above(limit) => value > limit,
            Condition::Below(limit) => value < limit,
        }
    }
}

pub struct LifestyleRule {
    pub factor: &'static str,
    pub condition: Condition,
    pub message: &'static str,
}

pub const LIFESTYLE_RULES: &[LifestyleRule] = &[
    LifestyleRule {
        factor: "screen_time",
        condition: Condition::Above(8.0),
        message: "Reduce screen time, take regular breaks every 20 minutes",
    },
    LifestyleRule {
        factor: "blink_frequency",
        condition: Condition::Below(15.0),
        message: "Practice conscious blinking exercises",
    },
    LifestyleRule {
        factor: "sleep_quality",
        condition: Condition::Below(3.0),
        message: "Improve sleep hygiene and aim for 7-8 hours of quality sleep",
    },
    LifestyleRule {
        factor: "stress_level",
        condition: Condition::Above(3.0),
        message: "Consider stress management techniques like meditation",
    },
    LifestyleRule {
        factor: "humidity",
        condition: Condition::Below(40.0),
        message: "Use a humidifier to maintain optimal humidity levels",
    },
];

/// Lifestyle factors whose priority follows model importance.
pub const IMPORTANCE_PRIORITISED: &[&str] = &["screen_time", "blink_frequency", "sleep_quality"];

/// What a guidance suffix attaches to.
#[derive(Debug, Clone, Copy)]
pub enum Target {
    Factor(&'static str),
    Category(Category),
}

pub const AGE_GUIDANCE: &[(AgeBand, Target, &str)] = &[
    (AgeBand::Young, Target::Factor("screen_time"), "Consider using blue light filtering apps on devices."),
    (AgeBand::Young, Target::Factor("stress_level"), "Try mobile apps for meditation and stress management."),
    (AgeBand::Middle, Target::Factor("screen_time"), "Adjust workplace ergonomics and lighting."),
    (AgeBand::Middle, Target::Factor("sleep_quality"), "Consider establishing a consistent bedtime routine."),
    (AgeBand::Senior, Target::Factor("blink_frequency"), "Regular eye exercises may help maintain muscle function."),
    (AgeBand::Senior, Target::Factor("humidity"), "Consider room humidifiers especially during heating season."),
];

pub const FEMALE_GUIDANCE: &[(Target, &str)] = &[(
    Target::Factor("stress_level"),
    "Hormonal changes may affect dry eye; consult healthcare provider.",
)];

pub const MALE_GUIDANCE: &[(Target, &str)] = &[(
    Target::Factor("physical_activity"),
    "Regular exercise can improve overall circulation including eye health.",
)];

pub const WORK_GUIDANCE: &[(WorkType, Target, &str)] = &[
    (WorkType::Office, Target::Factor("screen_time"), "Request ergonomic assessment of workstation."),
    (WorkType::Office, Target::Factor("humidity"), "Discuss office air quality with facility management."),
    (WorkType::Outdoor, Target::Category(Category::Environment), "Use protective eyewear in windy or dusty conditions."),
];

pub const CONTACT_LENS_GUIDANCE: &[(Target, &str)] = &[
    (Target::Factor("blink_frequency"), "Consider rewetting drops suitable for contact lenses."),
    (Target::Category(Category::Medical), "Inform eye care provider about contact lens use."),
];

/// First entry per age band.
pub const MOTIVATION: &[(AgeBand, &str)] = &[
    (AgeBand::Young, "Small changes now can prevent major eye problems later in life."),
    (AgeBand::Middle, "Taking care of your eyes supports your continued productivity and quality of life."),
    (AgeBand::Senior, "Protecting your vision helps maintain independence and enjoyment of daily activities."),
];

pub const PROGRESS_MESSAGE: &str = "Great progress! Continue following your personalized plan.";
