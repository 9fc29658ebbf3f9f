use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "F")]
    F,
    #[serde(rename = "C")]
    C,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "B+")]
    BPlus,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "A+")]
    APlus,
    #[serde(rename = "O")]
    O,
}

impl Grade {
    pub fn as_str(self) -> &'static str {
        match self {
            Grade::O => "O",
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::BPlus => "B+",
            Grade::B => "B",
            Grade::C => "C",
            Grade::F => "F",
        }
    }

    /// Fine-grained performance label paired with each letter.
    pub fn label(self) -> &'static str {
        match self {
            Grade::O => "Outstanding",
            Grade::APlus => "Excellent",
            Grade::A => "Very Good",
            Grade::BPlus => "Good",
            Grade::B => "Average",
            Grade::C => "Below Average",
            Grade::F => "Poor",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse label used on overall reports: `>=80 / >=60 / >=40 / below`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PerformanceLevel {
    Excellent,
    Good,
    Average,
    Poor,
}

impl PerformanceLevel {
    pub fn from_percent(p: f64) -> Self {
        if p >= 80.0 {
            PerformanceLevel::Excellent
        } else if p >= 60.0 {
            PerformanceLevel::Good
        } else if p >= 40.0 {
            PerformanceLevel::Average
        } else {
            PerformanceLevel::Poor
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PerformanceLevel::Excellent => "Excellent",
            PerformanceLevel::Good => "Good",
            PerformanceLevel::Average => "Average",
            PerformanceLevel::Poor => "Poor",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeBand {
    pub min_percent: f64,
    pub grade: Grade,
}

/// Percentage-to-letter table. Bands are ordered by descending lower bound;
/// lower bounds are inclusive and anything below the last band is `F`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GradeScale {
    bands: Vec<GradeBand>,
}

impl Default for GradeScale {
    fn default() -> Self {
        let band = |min_percent, grade| GradeBand { min_percent, grade };
        Self {
            bands: vec![
                band(90.0, Grade::O),
                band(80.0, Grade::APlus),
                band(70.0, Grade::A),
                band(60.0, Grade::BPlus),
                band(50.0, Grade::B),
                band(40.0, Grade::C),
            ],
        }
    }
}

impl GradeScale {
    pub fn new(bands: Vec<GradeBand>) -> Result<Self, String> {
        let scale = Self { bands };
        scale.validate()?;
        Ok(scale)
    }

    pub fn bands(&self) -> &[GradeBand] {
        &self.bands
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.bands.is_empty() {
            return Err("grade scale must contain at least one band".to_string());
        }
        for pair in self.bands.windows(2) {
            if pair[0].min_percent <= pair[1].min_percent {
                return Err(format!(
                    "grade bands must have strictly descending bounds ({} then {})",
                    pair[0].min_percent, pair[1].min_percent
                ));
            }
            if pair[0].grade <= pair[1].grade {
                return Err(format!(
                    "grade bands must rank strictly descending ({} then {})",
                    pair[0].grade, pair[1].grade
                ));
            }
        }
        if self.bands.iter().any(|b| !b.min_percent.is_finite()) {
            return Err("grade band bounds must be finite".to_string());
        }
        Ok(())
    }

    pub fn grade(&self, percent: f64) -> Grade {
        self.bands
            .iter()
            .find(|b| percent >= b.min_percent)
            .map(|b| b.grade)
            .unwrap_or(Grade::F)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_table_boundaries_are_inclusive_below() {
        let scale = GradeScale::default();
        assert_eq!(scale.grade(100.0), Grade::O);
        assert_eq!(scale.grade(90.0), Grade::O);
        assert_eq!(scale.grade(89.999), Grade::APlus);
        assert_eq!(scale.grade(80.0), Grade::APlus);
        assert_eq!(scale.grade(79.99), Grade::A);
        assert_eq!(scale.grade(70.0), Grade::A);
        assert_eq!(scale.grade(60.0), Grade::BPlus);
        assert_eq!(scale.grade(50.0), Grade::B);
        assert_eq!(scale.grade(40.0), Grade::C);
        assert_eq!(scale.grade(39.999), Grade::F);
        assert_eq!(scale.grade(0.0), Grade::F);
    }

    #[test]
    fn labels_follow_grades() {
        let scale = GradeScale::default();
        assert_eq!(scale.grade(95.0).label(), "Outstanding");
        assert_eq!(scale.grade(72.0).label(), "Very Good");
        assert_eq!(scale.grade(45.0).label(), "Below Average");
        assert_eq!(scale.grade(12.0).label(), "Poor");
    }

    #[test]
    fn coarse_levels() {
        assert_eq!(PerformanceLevel::from_percent(80.0), PerformanceLevel::Excellent);
        assert_eq!(PerformanceLevel::from_percent(79.99), PerformanceLevel::Good);
        assert_eq!(PerformanceLevel::from_percent(60.0), PerformanceLevel::Good);
        assert_eq!(PerformanceLevel::from_percent(40.0), PerformanceLevel::Average);
        assert_eq!(PerformanceLevel::from_percent(39.0), PerformanceLevel::Poor);
    }

    #[test]
    fn rejects_unordered_bands() {
        let bad = vec![
            GradeBand { min_percent: 50.0, grade: Grade::B },
            GradeBand { min_percent: 70.0, grade: Grade::A },
        ];
        assert!(GradeScale::new(bad).is_err());
        assert!(GradeScale::new(Vec::new()).is_err());
    }

    #[test]
    fn grade_serializes_as_letter() {
        assert_eq!(serde_json::to_string(&Grade::APlus).unwrap(), "\"A+\"");
        let scale: GradeScale = serde_json::from_str(
            r#"[{"minPercent": 50.0, "grade": "B"}, {"minPercent": 40.0, "grade": "C"}]"#,
        )
        .unwrap();
        assert_eq!(scale.grade(55.0), Grade::B);
        assert_eq!(scale.grade(95.0), Grade::B);
        assert_eq!(scale.grade(10.0), Grade::F);
    }

    proptest! {
        #[test]
        fn grade_is_monotone(a in 0.0f64..=100.0, b in 0.0f64..=100.0) {
            let scale = GradeScale::default();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(scale.grade(lo) <= scale.grade(hi));
        }
    }
}
