use crate::config::EngineConfig;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const STRENGTH_ATTENDANCE: &str = "Excellent attendance record";
pub const STRENGTH_ACADEMIC: &str = "Strong academic performance";
pub const WEAKNESS_ATTENDANCE: &str = "Low attendance - below 75% threshold";
pub const WEAKNESS_ACADEMIC: &str = "Poor academic performance";
pub const RECOMMEND_ATTENDANCE: &str = "Improve attendance to meet minimum requirement";
pub const RECOMMEND_TUTORING: &str = "Seek additional tutoring or academic support";
pub const RECOMMEND_STUDY_HABITS: &str = "Focus on consistent study habits";

const POOR_PERFORMANCE_BELOW: f64 = 50.0;
const LOW_RISK_ATTENDANCE_BELOW: f64 = 85.0;
const LOW_RISK_MARKS_BELOW: f64 = 60.0;
const EXCELLENT_ATTENDANCE_FROM: f64 = 90.0;
const STRONG_MARKS_FROM: f64 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    None,
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::None => "NONE",
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub at_risk: bool,
    pub level: RiskLevel,
}

/// First matching rule wins.
pub fn classify(attendance_pct: f64, marks_pct: f64, cfg: &EngineConfig) -> RiskAssessment {
    let low_attendance = attendance_pct < cfg.attendance_threshold;
    let failing = marks_pct < cfg.pass_threshold;
    let poor = marks_pct < POOR_PERFORMANCE_BELOW;

    let level = if failing || (low_attendance && poor) {
        RiskLevel::High
    } else if low_attendance || poor {
        RiskLevel::Medium
    } else if attendance_pct < LOW_RISK_ATTENDANCE_BELOW || marks_pct < LOW_RISK_MARKS_BELOW {
        RiskLevel::Low
    } else {
        RiskLevel::None
    };

    RiskAssessment {
        at_risk: matches!(level, RiskLevel::High | RiskLevel::Medium),
        level,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Insights {
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Independent predicates, each appending its canonical sentence once.
pub fn insights(attendance_pct: f64, marks_pct: f64, cfg: &EngineConfig) -> Insights {
    let mut out = Insights::default();

    if attendance_pct >= EXCELLENT_ATTENDANCE_FROM {
        out.strengths.push(STRENGTH_ATTENDANCE.to_string());
    }
    if marks_pct >= STRONG_MARKS_FROM {
        out.strengths.push(STRENGTH_ACADEMIC.to_string());
    }

    if attendance_pct < cfg.attendance_threshold {
        out.weaknesses.push(WEAKNESS_ATTENDANCE.to_string());
    }
    if marks_pct < POOR_PERFORMANCE_BELOW {
        out.weaknesses.push(WEAKNESS_ACADEMIC.to_string());
    }

    if attendance_pct < cfg.attendance_threshold {
        out.recommendations.push(RECOMMEND_ATTENDANCE.to_string());
    }
    if marks_pct < cfg.pass_threshold {
        out.recommendations.push(RECOMMEND_TUTORING.to_string());
    }
    if marks_pct >= cfg.pass_threshold && marks_pct < LOW_RISK_MARKS_BELOW {
        out.recommendations.push(RECOMMEND_STUDY_HABITS.to_string());
    }

    out
}
