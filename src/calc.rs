use crate::config::EngineConfig;
use crate::grade::Grade;
use crate::model::{AttendanceEvent, AttendanceStatus, EnrollmentId, MarkEntry};
use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// Two-decimal rounding, half away from zero (SQL `ROUND(x, 2)`).
pub fn round_off_2_decimal(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// A stored row that broke a data-model invariant and was left out of the
/// statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowWarning {
    pub row_kind: &'static str,
    pub row_id: i64,
    pub message: String,
}

impl RowWarning {
    pub fn attendance(row_id: i64, message: impl Into<String>) -> Self {
        Self {
            row_kind: "attendance",
            row_id,
            message: message.into(),
        }
    }

    pub fn mark(row_id: i64, message: impl Into<String>) -> Self {
        Self {
            row_kind: "mark",
            row_id,
            message: message.into(),
        }
    }

    pub fn describe(&self) -> String {
        format!("Skipped {} row {}: {}", self.row_kind, self.row_id, self.message)
    }
}

fn sort_warnings(warnings: &mut [RowWarning]) {
    warnings.sort_by(|a, b| a.row_kind.cmp(b.row_kind).then(a.row_id.cmp(&b.row_id)));
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceStats {
    pub total: usize,
    pub present: usize,
    pub absent: usize,
    pub late: usize,
    pub excused: usize,
    pub attended: usize,
    /// Full precision; rounded only when rendered.
    pub percentage: f64,
    pub below_threshold: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceTally {
    pub stats: AttendanceStats,
    pub warnings: Vec<RowWarning>,
}

impl AttendanceTally {
    /// Add rows the gateway could not read at all.
    pub fn with_rejected(mut self, rejected: Vec<RowWarning>) -> Self {
        self.warnings.extend(rejected);
        sort_warnings(&mut self.warnings);
        self
    }
}

/// Keep one event per `(enrollment, date)`. A later `marked_at` replaces an
/// earlier one (row id breaks ties); the replaced row is reported.
fn dedupe_events<'a, I>(events: I) -> (Vec<&'a AttendanceEvent>, Vec<RowWarning>)
where
    I: IntoIterator<Item = &'a AttendanceEvent>,
{
    let mut by_key: HashMap<(EnrollmentId, NaiveDate), &'a AttendanceEvent> = HashMap::new();
    let mut warnings = Vec::new();
    for ev in events {
        let key = (ev.enrollment_id, ev.date);
        let Some(prev) = by_key.get(&key).copied() else {
            by_key.insert(key, ev);
            continue;
        };
        let (keep, dropped) = if (ev.marked_at, ev.id) > (prev.marked_at, prev.id) {
            (ev, prev)
        } else {
            (prev, ev)
        };
        warnings.push(RowWarning::attendance(
            dropped.id,
            format!(
                "duplicate attendance on {} superseded by row {}",
                dropped.date, keep.id
            ),
        ));
        by_key.insert(key, keep);
    }
    let mut kept: Vec<&AttendanceEvent> = by_key.into_values().collect();
    kept.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));
    (kept, warnings)
}

fn percent_of(part: usize, total: usize) -> f64 {
    if total > 0 {
        (part as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}

pub fn attendance_summary<'a, I>(events: I, cfg: &EngineConfig) -> AttendanceTally
where
    I: IntoIterator<Item = &'a AttendanceEvent>,
{
    let (kept, mut warnings) = dedupe_events(events);

    let mut present = 0usize;
    let mut absent = 0usize;
    let mut late = 0usize;
    let mut excused = 0usize;
    for ev in &kept {
        match ev.status {
            AttendanceStatus::Present => present += 1,
            AttendanceStatus::Absent => absent += 1,
            AttendanceStatus::Late => late += 1,
            AttendanceStatus::Excused => excused += 1,
        }
    }

    let total = kept.len();
    let attended = present + late + excused;
    let percentage = percent_of(attended, total);
    sort_warnings(&mut warnings);

    AttendanceTally {
        stats: AttendanceStats {
            total,
            present,
            absent,
            late,
            excused,
            attended,
            percentage,
            below_threshold: percentage < cfg.attendance_threshold,
        },
        warnings,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarksStats {
    pub total_obtained: f64,
    pub total_max: f64,
    pub count: usize,
    /// Already rounded to two decimals; grade and pass/fail are read from it.
    pub percentage: f64,
    pub grade: Grade,
    pub passed: bool,
    /// `Σ (obtained/max)·weightage`, in weightage units, never renormalised.
    pub weighted_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentBreakdown {
    pub mark_id: i64,
    pub type_name: String,
    pub assessment_date: NaiveDate,
    pub obtained: f64,
    pub max: f64,
    pub percentage: f64,
    pub grade: Grade,
    pub weightage: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarksTally {
    pub stats: MarksStats,
    pub breakdowns: Vec<AssessmentBreakdown>,
    pub warnings: Vec<RowWarning>,
}

impl MarksTally {
    pub fn with_rejected(mut self, rejected: Vec<RowWarning>) -> Self {
        self.warnings.extend(rejected);
        sort_warnings(&mut self.warnings);
        self
    }
}

fn check_mark(m: &MarkEntry) -> Result<(), String> {
    if !m.max_marks.is_finite() || m.max_marks <= 0.0 {
        return Err(format!("max marks must be positive (got {})", m.max_marks));
    }
    if !m.marks_obtained.is_finite() || m.marks_obtained < 0.0 {
        return Err(format!(
            "marks obtained must be non-negative (got {})",
            m.marks_obtained
        ));
    }
    if m.marks_obtained > m.max_marks {
        return Err(format!(
            "marks obtained {} exceed max marks {}",
            m.marks_obtained, m.max_marks
        ));
    }
    if !m.assessment_type.weightage.is_finite() || m.assessment_type.weightage < 0.0 {
        return Err(format!(
            "weightage of '{}' must be non-negative",
            m.assessment_type.name
        ));
    }
    Ok(())
}

/// Fold mark entries into totals, weighted score and per-entry breakdowns.
/// Entries of the same assessment type are summed, not averaged.
pub fn marks_summary<'a, I>(entries: I, cfg: &EngineConfig) -> MarksTally
where
    I: IntoIterator<Item = &'a MarkEntry>,
{
    let mut valid: Vec<&MarkEntry> = Vec::new();
    let mut warnings = Vec::new();
    for m in entries {
        match check_mark(m) {
            Ok(()) => valid.push(m),
            Err(msg) => warnings.push(RowWarning::mark(m.id, msg)),
        }
    }
    // Fixed summation order keeps results independent of arrival order.
    valid.sort_by(|a, b| {
        a.assessment_date
            .cmp(&b.assessment_date)
            .then(a.id.cmp(&b.id))
    });

    let mut total_obtained = 0.0_f64;
    let mut total_max = 0.0_f64;
    let mut weighted_score = 0.0_f64;
    let mut breakdowns = Vec::with_capacity(valid.len());
    for m in &valid {
        total_obtained += m.marks_obtained;
        total_max += m.max_marks;
        let ratio = m.marks_obtained / m.max_marks;
        weighted_score += ratio * m.assessment_type.weightage;

        let percentage = ratio * 100.0;
        breakdowns.push(AssessmentBreakdown {
            mark_id: m.id,
            type_name: m.assessment_type.name.clone(),
            assessment_date: m.assessment_date,
            obtained: m.marks_obtained,
            max: m.max_marks,
            percentage,
            grade: cfg.grade_scale.grade(percentage),
            weightage: m.assessment_type.weightage,
        });
    }

    let percentage = if total_max > 0.0 {
        round_off_2_decimal((total_obtained / total_max) * 100.0)
    } else {
        0.0
    };
    sort_warnings(&mut warnings);

    MarksTally {
        stats: MarksStats {
            total_obtained,
            total_max,
            count: valid.len(),
            percentage,
            grade: cfg.grade_scale.grade(percentage),
            passed: percentage >= cfg.pass_threshold,
            weighted_score,
        },
        breakdowns,
        warnings,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyAttendance {
    pub date: NaiveDate,
    pub total_students: usize,
    pub present: usize,
    pub absent: usize,
    pub late: usize,
    pub excused: usize,
    pub percentage: f64,
}

/// Per-date class attendance across all enrollments of a subject.
pub fn daily_attendance_rows<'a, I>(events: I) -> (Vec<DailyAttendance>, Vec<RowWarning>)
where
    I: IntoIterator<Item = &'a AttendanceEvent>,
{
    let (kept, mut warnings) = dedupe_events(events);
    let mut by_date: BTreeMap<NaiveDate, DailyAttendance> = BTreeMap::new();
    for ev in kept {
        let day = by_date.entry(ev.date).or_insert(DailyAttendance {
            date: ev.date,
            total_students: 0,
            present: 0,
            absent: 0,
            late: 0,
            excused: 0,
            percentage: 0.0,
        });
        day.total_students += 1;
        match ev.status {
            AttendanceStatus::Present => day.present += 1,
            AttendanceStatus::Absent => day.absent += 1,
            AttendanceStatus::Late => day.late += 1,
            AttendanceStatus::Excused => day.excused += 1,
        }
    }
    let rows = by_date
        .into_values()
        .map(|mut d| {
            d.percentage = percent_of(d.present + d.late + d.excused, d.total_students);
            d
        })
        .collect();
    sort_warnings(&mut warnings);
    (rows, warnings)
}

/// Order by a percentage ascending, then by enrollment id.
pub fn cmp_metric_then_id(a: (f64, EnrollmentId), b: (f64, EnrollmentId)) -> Ordering {
    a.0.partial_cmp(&b.0)
        .unwrap_or(Ordering::Equal)
        .then(a.1.cmp(&b.1))
}
