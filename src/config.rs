use crate::error::EngineError;
use crate::grade::GradeScale;
use serde::{Deserialize, Serialize};

pub const DEFAULT_ATTENDANCE_THRESHOLD: f64 = 75.0;
pub const DEFAULT_PASS_THRESHOLD: f64 = 40.0;

/// Knobs passed explicitly to the report builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub attendance_threshold: f64,
    pub pass_threshold: f64,
    pub grade_scale: GradeScale,
    /// Append dropped-row warnings to a report's weaknesses instead of only logging them.
    pub surface_row_warnings: bool,
    /// Printed under the title of formatted text reports when non-empty.
    pub institution_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            attendance_threshold: DEFAULT_ATTENDANCE_THRESHOLD,
            pass_threshold: DEFAULT_PASS_THRESHOLD,
            grade_scale: GradeScale::default(),
            surface_row_warnings: false,
            institution_name: String::new(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        for (name, v) in [
            ("attendanceThreshold", self.attendance_threshold),
            ("passThreshold", self.pass_threshold),
        ] {
            if !v.is_finite() || !(0.0..=100.0).contains(&v) {
                return Err(EngineError::InvariantViolation(format!(
                    "{} must be between 0 and 100",
                    name
                )));
            }
        }
        self.grade_scale
            .validate()
            .map_err(EngineError::InvariantViolation)
    }

    /// Parse a stored/patched JSON object, filling absent fields with defaults.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, EngineError> {
        let cfg: EngineConfig = serde_json::from_value(value.clone())
            .map_err(|e| EngineError::InvariantViolation(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_match_published_thresholds() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.attendance_threshold, 75.0);
        assert_eq!(cfg.pass_threshold, 40.0);
        assert_eq!(cfg.grade_scale, GradeScale::default());
        assert!(!cfg.surface_row_warnings);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = EngineConfig::from_json(&json!({ "surfaceRowWarnings": true })).unwrap();
        assert!(cfg.surface_row_warnings);
        assert_eq!(cfg.attendance_threshold, 75.0);
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let e = EngineConfig::from_json(&json!({ "passThreshold": 140.0 })).unwrap_err();
        assert_eq!(e.code(), "invariant_violation");
    }
}
