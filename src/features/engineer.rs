//! Derived features: interactions, composites, age buckets, threshold flags, polynomial terms.

use crate::data::FeatureTable;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How a two-column interaction combines its inputs.
#[derive(Debug, Clone, Copy)]
enum Combine {
    /// `a / (b + 1)`
    RatioPlusOne,
    /// `a * b`
    Product,
}

const INTERACTIONS: &[(&str, &str, &str, Combine)] = &[
    ("screen_blink_ratio", "screen_time", "blink_frequency", Combine::RatioPlusOne),
    ("age_stress_interaction", "age", "stress_level", Combine::Product),
    ("sleep_stress_score", "sleep_quality", "stress_level", Combine::RatioPlusOne),
];

/// Row-mean composites: (name, candidate sources, minimum sources present).
const COMPOSITES: &[(&str, &[&str], usize)] = &[
    ("lifestyle_score", &["sleep_quality", "physical_activity", "stress_level"], 2),
    ("environment_risk", &["humidity", "air_conditioner_use"], 1),
];

#[derive(Debug, Clone, Copy)]
enum Compare {
    Above,
    Below,
}

const FLAGS: &[(&str, &str, Compare, f64)] = &[
    ("high_screen_time", "screen_time", Compare::Above, 8.0),
    ("low_blink_frequency", "blink_frequency", Compare::Below, 15.0),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeGroup {
    Young,
    Middle,
    Senior,
}

impl AgeGroup {
    pub const ALL: [AgeGroup; 3] = [AgeGroup::Young, AgeGroup::Middle, AgeGroup::Senior];

    pub fn from_age(age: f64) -> Self {
        if age < 25.0 {
            AgeGroup::Young
        } else if age < 40.0 {
            AgeGroup::Middle
        } else {
            AgeGroup::Senior
        }
    }

    pub fn column_name(self) -> &'static str {
        match self {
            AgeGroup::Young => "age_young",
            AgeGroup::Middle => "age_middle",
            AgeGroup::Senior => "age_senior",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineerOptions {
    pub interactions: bool,
    pub composites: bool,
    pub categorical: bool,
    pub polynomial: bool,
    pub polynomial_degree: u32,
}

impl Default for EngineerOptions {
    fn default() -> Self {
        Self {
            interactions: true,
            composites: true,
            categorical: true,
            polynomial: false,
            polynomial_degree: 2,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FeatureEngineer {
    options: EngineerOptions,
}

impl FeatureEngineer {
    pub fn new(options: EngineerOptions) -> Self {
        Self { options }
    }

    /// Append derived columns to `table`. Returns the names created, in creation order.
    pub fn engineer(&self, table: &mut FeatureTable) -> Vec<String> {
        self.fit(table).0
    }

    /// Fit mode: like [`engineer`](Self::engineer), also returning the columns chosen
    /// for polynomial terms so prediction can replay the same ones.
    pub fn fit(&self, table: &mut FeatureTable) -> (Vec<String>, Vec<String>) {
        self.run(table, None)
    }

    /// Replay mode: polynomial terms are built from `polynomial_sources` rather than table order.
    pub fn replay(&self, table: &mut FeatureTable, polynomial_sources: &[String]) -> Vec<String> {
        self.run(table, Some(polynomial_sources)).0
    }

    fn run(&self, table: &mut FeatureTable, polynomial_sources: Option<&[String]>) -> (Vec<String>, Vec<String>) {
        let mut created = Vec::new();
        if self.options.interactions {
            created.extend(self.interactions(table));
        }
        if self.options.composites {
            created.extend(self.composites(table));
        }
        if self.options.categorical {
            created.extend(self.categorical(table));
        }
        let mut sources = Vec::new();
        if self.options.polynomial {
            sources = match polynomial_sources {
                Some(s) => s.to_vec(),
                None => polynomial_sources_for(table),
            };
            created.extend(self.polynomial(table, &sources, self.options.polynomial_degree));
        }
        debug!(created = created.len(), "features engineered");
        (created, sources)
    }

    pub fn interactions(&self, table: &mut FeatureTable) -> Vec<String> {
        let mut created = Vec::new();
        for (name, a, b, how) in INTERACTIONS {
            let (Some(xs), Some(ys)) = (table.numeric(a), table.numeric(b)) else {
                continue;
            };
            let values = xs
                .iter()
                .zip(ys)
                .map(|(x, y)| match (x, y, how) {
                    (Some(x), Some(y), Combine::RatioPlusOne) => Some(x / (y + 1.0)),
                    (Some(x), Some(y), Combine::Product) => Some(x * y),
                    _ => None,
                })
                .collect();
            table.set_numeric(name, values);
            created.push(name.to_string());
        }
        created
    }

    pub fn composites(&self, table: &mut FeatureTable) -> Vec<String> {
        let mut created = Vec::new();
        for (name, sources, min_present) in COMPOSITES {
            let present: Vec<&[Option<f64>]> = sources.iter().filter_map(|s| table.numeric(s)).collect();
            if present.len() < *min_present {
                continue;
            }
            let values = (0..table.n_rows())
                .map(|i| {
                    let cells: Vec<f64> = present.iter().filter_map(|c| c[i]).collect();
                    if cells.is_empty() {
                        None
                    } else {
                        Some(cells.iter().sum::<f64>() / cells.len() as f64)
                    }
                })
                .collect();
            table.set_numeric(name, values);
            created.push(name.to_string());
        }
        created
    }

    /// Age buckets one-hot encoded as `age_young` / `age_middle` / `age_senior`, then threshold flags.
    pub fn categorical(&self, table: &mut FeatureTable) -> Vec<String> {
        let mut created = Vec::new();
        if let Some(ages) = table.numeric("age").map(<[Option<f64>]>::to_vec) {
            for group in AgeGroup::ALL {
                let dummy = ages
                    .iter()
                    .map(|a| a.map(|a| if AgeGroup::from_age(a) == group { 1.0 } else { 0.0 }))
                    .collect();
                table.set_numeric(group.column_name(), dummy);
                created.push(group.column_name().to_string());
            }
        }
        for (name, source, cmp, limit) in FLAGS {
            let Some(values) = table.numeric(source) else {
                continue;
            };
            let flags = values
                .iter()
                .map(|v| {
                    v.map(|v| {
                        let hit = match cmp {
                            Compare::Above => v > *limit,
                            Compare::Below => v < *limit,
                        };
                        if hit {
                            1.0
                        } else {
                            0.0
                        }
                    })
                })
                .collect();
            table.set_numeric(name, flags);
            created.push(name.to_string());
        }
        created
    }

    /// Powers of each column in `sources`. Absent or non-numeric sources are skipped.
    pub fn polynomial(&self, table: &mut FeatureTable, sources: &[String], degree: u32) -> Vec<String> {
        let mut created = Vec::new();
        for source in sources {
            let name = if degree == 2 {
                format!("{}_squared", source)
            } else {
                format!("{}_pow{}", source, degree)
            };
            let Some(base) = table.numeric(source) else {
                debug!(column = %source, "polynomial source absent");
                continue;
            };
            let values = base.iter().map(|v| v.map(|x| x.powi(degree as i32))).collect();
            table.set_numeric(&name, values);
            created.push(name);
        }
        created
    }
}

/// The first three numeric columns of `table`, the polynomial sources chosen at fit time.
pub fn polynomial_sources_for(table: &FeatureTable) -> Vec<String> {
    table.numeric_column_names().into_iter().take(3).collect()
}

/// `screen_time / (blink_frequency + 1)`, shared with single-record scoring.
pub fn screen_blink_ratio(screen_time: f64, blink_frequency: f64) -> f64 {
    screen_time / (blink_frequency + 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::PatientRecord;
    use approx::assert_relative_eq;

    #[test]
    fn ratio_from_screen_and_blink() {
        let mut t = FeatureTable::from_records(&[PatientRecord::new()
            .with("screen_time", 10.0)
            .with("blink_frequency", 4.0)]);
        let created = FeatureEngineer::default().engineer(&mut t);
        assert!(created.contains(&"screen_blink_ratio".to_string()));
        assert_relative_eq!(t.numeric("screen_blink_ratio").unwrap()[0].unwrap(), 2.0);
        assert_eq!(t.numeric("high_screen_time").unwrap()[0], Some(1.0));
        assert_eq!(t.numeric("low_blink_frequency").unwrap()[0], Some(1.0));
        assert_relative_eq!(screen_blink_ratio(10.0, 4.0), 2.0);
    }

    #[test]
    fn age_buckets_and_missing_propagation() {
        let mut t = FeatureTable::from_records(&[
            PatientRecord::new().with("age", 24.0).with("stress_level", 2.0),
            PatientRecord::new().with("age", 40.0),
        ]);
        FeatureEngineer::default().engineer(&mut t);
        assert_eq!(t.numeric("age_young").unwrap(), &[Some(1.0), Some(0.0)]);
        assert_eq!(t.numeric("age_senior").unwrap(), &[Some(0.0), Some(1.0)]);
        assert_eq!(t.numeric("age_stress_interaction").unwrap(), &[Some(48.0), None]);
    }

    #[test]
    fn composites_need_enough_sources() {
        let mut t = FeatureTable::from_records(&[PatientRecord::new().with("sleep_quality", 3.0)]);
        let created = FeatureEngineer::default().composites(&mut t);
        assert!(created.is_empty());
    }

    #[test]
    fn replay_uses_fitted_polynomial_sources() {
        let options = EngineerOptions {
            polynomial: true,
            ..EngineerOptions::default()
        };
        let engineer = FeatureEngineer::new(options);
        let mut train = FeatureTable::from_columns(vec![
            crate::data::Column::numeric("stress_level", vec![Some(2.0)]),
            crate::data::Column::numeric("age", vec![Some(30.0)]),
            crate::data::Column::numeric("screen_time", vec![Some(6.0)]),
            crate::data::Column::numeric("blink_frequency", vec![Some(12.0)]),
        ])
        .unwrap();
        let (created, sources) = engineer.fit(&mut train);
        assert_eq!(sources, vec!["stress_level", "age", "screen_time"]);
        assert!(created.contains(&"stress_level_squared".to_string()));

        let mut fresh = FeatureTable::from_records(&[PatientRecord::new()
            .with("age", 40.0)
            .with("blink_frequency", 9.0)
            .with("screen_time", 3.0)
            .with("stress_level", 4.0)]);
        let replayed = engineer.replay(&mut fresh, &sources);
        assert_eq!(replayed, created);
        assert_relative_eq!(fresh.numeric("stress_level_squared").unwrap()[0].unwrap(), 16.0);
        assert!(fresh.numeric("blink_frequency_squared").is_none());
    }
}
