use crate::calc::{
    self, AssessmentBreakdown, AttendanceStats, AttendanceTally, DailyAttendance, MarksStats,
    MarksTally, RowWarning,
};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::gateway::DataGateway;
use crate::grade::{Grade, PerformanceLevel};
use crate::model::{
    AttendanceEvent, Enrolled, Enrollment, EnrollmentId, StudentId, StudentMeta, SubjectId,
    SubjectMeta,
};
use crate::risk::{self, RiskAssessment};
use chrono::{Local, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportKind {
    Comprehensive,
    Attendance,
    Marks,
    AtRisk,
}

impl ReportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportKind::Comprehensive => "COMPREHENSIVE",
            ReportKind::Attendance => "ATTENDANCE",
            ReportKind::Marks => "MARKS",
            ReportKind::AtRisk => "AT_RISK",
        }
    }
}

/// Derived per-(student, subject, year) report. Built in one step by
/// [`ReportBuilder`]; sections a report kind does not cover are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub kind: ReportKind,
    pub student_id: StudentId,
    pub subject_id: SubjectId,
    pub academic_year: String,
    pub enrollment_id: Option<EnrollmentId>,
    pub student: Option<StudentMeta>,
    pub subject: Option<SubjectMeta>,
    pub attendance: Option<AttendanceStats>,
    pub marks: Option<MarksStats>,
    pub assessments: Vec<AssessmentBreakdown>,
    pub performance_level: Option<PerformanceLevel>,
    pub risk: Option<RiskAssessment>,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub recommendations: Vec<String>,
    pub generated_at: NaiveDateTime,
}

impl Report {
    pub fn roll_number(&self) -> Option<&str> {
        self.student.as_ref().map(|s| s.roll_number.as_str())
    }

    pub fn subject_code(&self) -> Option<&str> {
        self.subject.as_ref().map(|s| s.code.as_str())
    }

    pub fn attendance_percentage(&self) -> f64 {
        self.attendance.map(|a| a.percentage).unwrap_or(0.0)
    }

    pub fn marks_percentage(&self) -> f64 {
        self.marks.as_ref().map(|m| m.percentage).unwrap_or(0.0)
    }

    pub fn grade(&self) -> Option<Grade> {
        self.marks.as_ref().map(|m| m.grade)
    }
}

/// Cooperative cancellation flag shared with the host. The builder checks it
/// around every gateway read.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, AtomicOrdering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(AtomicOrdering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectSummary {
    pub subject_id: SubjectId,
    pub subject_code: String,
    pub subject_name: String,
    pub academic_year: String,
    pub total_students: usize,
    pub avg_attendance: f64,
    pub avg_marks: f64,
    pub passed: usize,
    pub failed: usize,
    pub pass_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopPerformer {
    pub student_id: StudentId,
    pub full_name: String,
    pub roll_number: String,
    pub percentage: f64,
    pub grade: Grade,
}

/// One stored attendance row with the names a record export prints.
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceRecord {
    pub student: StudentMeta,
    pub subject_code: String,
    pub event: AttendanceEvent,
    pub marked_by_name: Option<String>,
}

/// One stored mark, graded on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkRecord {
    pub student: StudentMeta,
    pub subject_code: String,
    pub assessment: AssessmentBreakdown,
}

fn sort_roster<T>(roster: &mut Vec<Enrolled<T>>, key: impl Fn(&T) -> &str) {
    roster.sort_by(|a, b| {
        key(&a.meta)
            .cmp(key(&b.meta))
            .then(a.enrollment.id.cmp(&b.enrollment.id))
    });
    let mut seen = HashSet::new();
    roster.retain(|e| seen.insert(e.enrollment.id));
}

/// Stateless across calls: everything it knows comes from its arguments
/// and the gateway, so one builder can serve many requests.
pub struct ReportBuilder<'g, G: DataGateway + ?Sized> {
    gateway: &'g G,
    config: EngineConfig,
    cancel: CancelToken,
    generated_at: NaiveDateTime,
}

impl<'g, G: DataGateway + ?Sized> ReportBuilder<'g, G> {
    pub fn new(gateway: &'g G, config: EngineConfig) -> Self {
        let now = Local::now().naive_local();
        Self {
            gateway,
            config,
            cancel: CancelToken::new(),
            generated_at: now.with_nanosecond(0).unwrap_or(now),
        }
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Pin the timestamp stamped on every report this builder produces.
    pub fn generated_at(mut self, at: NaiveDateTime) -> Self {
        self.generated_at = at;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn gateway(&self) -> &'g G {
        self.gateway
    }

    fn checkpoint(&self) -> Result<(), EngineError> {
        if self.cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        Ok(())
    }

    fn fetch<T>(
        &self,
        read: impl FnOnce(&G) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        self.checkpoint()?;
        let out = read(self.gateway)?;
        self.checkpoint()?;
        Ok(out)
    }

    fn attendance_tally(&self, enrollment: &Enrollment) -> Result<AttendanceTally, EngineError> {
        let fetched = self.fetch(|g| g.fetch_attendance(enrollment))?;
        let tally = calc::attendance_summary(&fetched.rows, &self.config);
        Ok(tally.with_rejected(fetched.rejected))
    }

    fn marks_tally(&self, enrollment: &Enrollment) -> Result<MarksTally, EngineError> {
        let fetched = self.fetch(|g| g.fetch_marks(enrollment))?;
        let tally = calc::marks_summary(&fetched.rows, &self.config);
        Ok(tally.with_rejected(fetched.rejected))
    }

    fn absorb_warnings(
        &self,
        enrollment_id: EnrollmentId,
        warnings: &[RowWarning],
        weaknesses: &mut Vec<String>,
    ) {
        for w in warnings {
            warn!(
                enrollment_id,
                row_kind = w.row_kind,
                row_id = w.row_id,
                "dropped row: {}",
                w.message
            );
            if self.config.surface_row_warnings {
                weaknesses.push(w.describe());
            }
        }
    }

    fn blank(
        &self,
        kind: ReportKind,
        student_id: StudentId,
        subject_id: SubjectId,
        academic_year: &str,
    ) -> Report {
        Report {
            kind,
            student_id,
            subject_id,
            academic_year: academic_year.to_string(),
            enrollment_id: None,
            student: None,
            subject: None,
            attendance: None,
            marks: None,
            assessments: Vec::new(),
            performance_level: None,
            risk: None,
            strengths: Vec::new(),
            weaknesses: Vec::new(),
            recommendations: Vec::new(),
            generated_at: self.generated_at,
        }
    }

    fn assemble(
        &self,
        kind: ReportKind,
        enrollment: &Enrollment,
        student: Option<StudentMeta>,
        subject: Option<SubjectMeta>,
        attendance: AttendanceTally,
        marks: MarksTally,
    ) -> Report {
        let att_pct = attendance.stats.percentage;
        let marks_pct = marks.stats.percentage;
        let insights = risk::insights(att_pct, marks_pct, &self.config);

        let mut weaknesses = insights.weaknesses;
        self.absorb_warnings(enrollment.id, &attendance.warnings, &mut weaknesses);
        self.absorb_warnings(enrollment.id, &marks.warnings, &mut weaknesses);

        Report {
            enrollment_id: Some(enrollment.id),
            student,
            subject,
            attendance: Some(attendance.stats),
            performance_level: Some(PerformanceLevel::from_percent(marks_pct)),
            risk: Some(risk::classify(att_pct, marks_pct, &self.config)),
            marks: Some(marks.stats),
            assessments: marks.breakdowns,
            strengths: insights.strengths,
            weaknesses,
            recommendations: insights.recommendations,
            ..self.blank(
                kind,
                enrollment.student_id,
                enrollment.subject_id,
                &enrollment.academic_year,
            )
        }
    }

    fn comprehensive(
        &self,
        kind: ReportKind,
        enrollment: &Enrollment,
        student: Option<StudentMeta>,
        subject: Option<SubjectMeta>,
    ) -> Result<Report, EngineError> {
        let attendance = self.attendance_tally(enrollment)?;
        let marks = self.marks_tally(enrollment)?;
        debug!(
            enrollment_id = enrollment.id,
            events = attendance.stats.total,
            marks = marks.stats.count,
            "building report"
        );
        Ok(self.assemble(kind, enrollment, student, subject, attendance, marks))
    }

    /// Comprehensive report for one enrollment. An unknown student, subject
    /// or enrollment yields a report with zeroed stats rather than an error.
    pub fn build_single(
        &self,
        student_id: StudentId,
        subject_id: SubjectId,
        academic_year: &str,
    ) -> Result<Report, EngineError> {
        let student = self.fetch(|g| g.fetch_student(student_id))?;
        let subject = self.fetch(|g| g.fetch_subject(subject_id))?;
        let enrollment =
            self.fetch(|g| g.find_enrollment(student_id, subject_id, academic_year))?;
        let Some(enrollment) = enrollment else {
            debug!(student_id, subject_id, academic_year, "no enrollment; empty report");
            return Ok(Report {
                student,
                subject,
                ..self.blank(
                    ReportKind::Comprehensive,
                    student_id,
                    subject_id,
                    academic_year,
                )
            });
        };
        self.comprehensive(ReportKind::Comprehensive, &enrollment, student, subject)
    }

    fn subject_roster(
        &self,
        subject_id: SubjectId,
        academic_year: &str,
    ) -> Result<Vec<Enrolled<StudentMeta>>, EngineError> {
        let mut roster = self.fetch(|g| g.list_enrolled_students(subject_id, academic_year))?;
        sort_roster(&mut roster, |s| s.roll_number.as_str());
        Ok(roster)
    }

    /// Stream attendance-only reports in roll-number order. Returns how many
    /// reports were emitted.
    pub fn for_each_subject_attendance(
        &self,
        subject_id: SubjectId,
        academic_year: &str,
        mut emit: impl FnMut(Report) -> Result<(), EngineError>,
    ) -> Result<usize, EngineError> {
        let subject = self.fetch(|g| g.fetch_subject(subject_id))?;
        let roster = self.subject_roster(subject_id, academic_year)?;
        let mut emitted = 0;
        for entry in roster {
            let tally = self.attendance_tally(&entry.enrollment)?;
            let mut weaknesses = Vec::new();
            self.absorb_warnings(entry.enrollment.id, &tally.warnings, &mut weaknesses);
            emit(Report {
                enrollment_id: Some(entry.enrollment.id),
                student: Some(entry.meta),
                subject: subject.clone(),
                attendance: Some(tally.stats),
                weaknesses,
                ..self.blank(
                    ReportKind::Attendance,
                    entry.enrollment.student_id,
                    subject_id,
                    academic_year,
                )
            })?;
            emitted += 1;
        }
        Ok(emitted)
    }

    pub fn build_subject_attendance(
        &self,
        subject_id: SubjectId,
        academic_year: &str,
    ) -> Result<Vec<Report>, EngineError> {
        let mut out = Vec::new();
        self.for_each_subject_attendance(subject_id, academic_year, |r| {
            out.push(r);
            Ok(())
        })?;
        Ok(out)
    }

    /// Marks-only counterpart of [`Self::for_each_subject_attendance`].
    pub fn for_each_subject_marks(
        &self,
        subject_id: SubjectId,
        academic_year: &str,
        mut emit: impl FnMut(Report) -> Result<(), EngineError>,
    ) -> Result<usize, EngineError> {
        let subject = self.fetch(|g| g.fetch_subject(subject_id))?;
        let roster = self.subject_roster(subject_id, academic_year)?;
        let mut emitted = 0;
        for entry in roster {
            let tally = self.marks_tally(&entry.enrollment)?;
            let mut weaknesses = Vec::new();
            self.absorb_warnings(entry.enrollment.id, &tally.warnings, &mut weaknesses);
            emit(Report {
                enrollment_id: Some(entry.enrollment.id),
                student: Some(entry.meta),
                subject: subject.clone(),
                performance_level: Some(PerformanceLevel::from_percent(tally.stats.percentage)),
                marks: Some(tally.stats),
                weaknesses,
                ..self.blank(
                    ReportKind::Marks,
                    entry.enrollment.student_id,
                    subject_id,
                    academic_year,
                )
            })?;
            emitted += 1;
        }
        Ok(emitted)
    }

    pub fn build_subject_marks(
        &self,
        subject_id: SubjectId,
        academic_year: &str,
    ) -> Result<Vec<Report>, EngineError> {
        let mut out = Vec::new();
        self.for_each_subject_marks(subject_id, academic_year, |r| {
            out.push(r);
            Ok(())
        })?;
        Ok(out)
    }

    /// Comprehensive reports for every subject the student is enrolled in,
    /// ordered by subject code. An unknown student yields nothing.
    pub fn for_each_student_subject(
        &self,
        student_id: StudentId,
        academic_year: &str,
        mut emit: impl FnMut(Report) -> Result<(), EngineError>,
    ) -> Result<usize, EngineError> {
        let Some(student) = self.fetch(|g| g.fetch_student(student_id))? else {
            debug!(student_id, "unknown student; nothing to report");
            return Ok(0);
        };
        let mut subjects = self.fetch(|g| g.list_subjects_for(student_id, academic_year))?;
        sort_roster(&mut subjects, |s| s.code.as_str());
        let mut emitted = 0;
        for entry in subjects {
            let report = self.comprehensive(
                ReportKind::Comprehensive,
                &entry.enrollment,
                Some(student.clone()),
                Some(entry.meta),
            )?;
            emit(report)?;
            emitted += 1;
        }
        Ok(emitted)
    }

    pub fn build_student_all(
        &self,
        student_id: StudentId,
        academic_year: &str,
    ) -> Result<Vec<Report>, EngineError> {
        let mut out = Vec::new();
        self.for_each_student_subject(student_id, academic_year, |r| {
            out.push(r);
            Ok(())
        })?;
        Ok(out)
    }

    /// The metric that put an enrollment on the at-risk list: the lower of
    /// whichever of attendance / marks is below its threshold. Enrollments
    /// without attendance rows (resp. mark rows) are never flagged on that
    /// metric.
    fn risk_driver(&self, attendance: &AttendanceStats, marks: &MarksStats) -> Option<f64> {
        let by_attendance = (attendance.total > 0
            && attendance.percentage < self.config.attendance_threshold)
            .then_some(attendance.percentage);
        let by_marks = (marks.count > 0 && marks.percentage < self.config.pass_threshold)
            .then_some(marks.percentage);
        match (by_attendance, by_marks) {
            (Some(a), Some(m)) => Some(a.min(m)),
            (a, m) => a.or(m),
        }
    }

    /// Stream every enrollment of the year, in an active subject, with
    /// attendance below the attendance threshold or marks below the pass
    /// threshold, lowest driving metric first.
    ///
    /// The scan keeps only `(driver, enrollment)` pairs; each report is
    /// rebuilt from the gateway when its turn comes.
    pub fn for_each_at_risk(
        &self,
        academic_year: &str,
        mut emit: impl FnMut(Report) -> Result<(), EngineError>,
    ) -> Result<usize, EngineError> {
        let mut enrollments = self.fetch(|g| g.list_enrollments(academic_year))?;
        enrollments.sort_by_key(|e| e.id);
        enrollments.dedup_by_key(|e| e.id);

        let mut flagged: Vec<(f64, Enrollment)> = Vec::new();
        for enrollment in enrollments {
            let attendance = self.attendance_tally(&enrollment)?.stats;
            let marks = self.marks_tally(&enrollment)?.stats;
            if let Some(driver) = self.risk_driver(&attendance, &marks) {
                flagged.push((driver, enrollment));
            }
        }
        flagged.sort_by(|a, b| calc::cmp_metric_then_id((a.0, a.1.id), (b.0, b.1.id)));
        debug!(academic_year, flagged = flagged.len(), "at-risk scan complete");

        let mut students: HashMap<StudentId, Option<StudentMeta>> = HashMap::new();
        let mut subjects: HashMap<SubjectId, Option<SubjectMeta>> = HashMap::new();
        let mut emitted = 0;
        for (_, enrollment) in flagged {
            let student = match students.get(&enrollment.student_id) {
                Some(s) => s.clone(),
                None => {
                    let s = self.fetch(|g| g.fetch_student(enrollment.student_id))?;
                    students.insert(enrollment.student_id, s.clone());
                    s
                }
            };
            let subject = match subjects.get(&enrollment.subject_id) {
                Some(s) => s.clone(),
                None => {
                    let s = self.fetch(|g| g.fetch_subject(enrollment.subject_id))?;
                    subjects.insert(enrollment.subject_id, s.clone());
                    s
                }
            };
            let (Some(student), Some(subject)) = (student, subject) else {
                debug!(enrollment_id = enrollment.id, "enrollment references missing metadata");
                continue;
            };
            let report = self.comprehensive(
                ReportKind::AtRisk,
                &enrollment,
                Some(student),
                Some(subject),
            )?;
            emit(report)?;
            emitted += 1;
        }
        Ok(emitted)
    }

    pub fn build_at_risk(&self, academic_year: &str) -> Result<Vec<Report>, EngineError> {
        let mut out = Vec::new();
        self.for_each_at_risk(academic_year, |r| {
            out.push(r);
            Ok(())
        })?;
        Ok(out)
    }

    pub fn subject_summary(
        &self,
        subject_id: SubjectId,
        academic_year: &str,
    ) -> Result<SubjectSummary, EngineError> {
        let Some(subject) = self.fetch(|g| g.fetch_subject(subject_id))? else {
            return Err(EngineError::not_found("subject", subject_id));
        };
        let roster = self.subject_roster(subject_id, academic_year)?;

        let total_students = roster.len();
        let mut attendance_sum = 0.0_f64;
        let mut attendance_n = 0usize;
        let mut marks_sum = 0.0_f64;
        let mut marks_n = 0usize;
        let mut passed = 0usize;
        let mut failed = 0usize;
        for entry in &roster {
            let attendance = self.attendance_tally(&entry.enrollment)?.stats;
            let marks = self.marks_tally(&entry.enrollment)?.stats;

            if attendance.total > 0 {
                attendance_sum += calc::round_off_2_decimal(attendance.percentage);
                attendance_n += 1;
            }
            if marks.count > 0 {
                marks_sum += calc::round_off_2_decimal(marks.percentage);
                marks_n += 1;
                if marks.passed {
                    passed += 1;
                } else {
                    failed += 1;
                }
            }
        }

        let mean = |sum: f64, n: usize| if n > 0 { sum / n as f64 } else { 0.0 };
        Ok(SubjectSummary {
            subject_id,
            subject_code: subject.code,
            subject_name: subject.name,
            academic_year: academic_year.to_string(),
            total_students,
            avg_attendance: mean(attendance_sum, attendance_n),
            avg_marks: mean(marks_sum, marks_n),
            passed,
            failed,
            pass_percentage: if total_students > 0 {
                (passed as f64 / total_students as f64) * 100.0
            } else {
                0.0
            },
        })
    }

    /// Highest marks percentage first; students without marks are skipped.
    pub fn top_performers(
        &self,
        subject_id: SubjectId,
        academic_year: &str,
        limit: usize,
    ) -> Result<Vec<TopPerformer>, EngineError> {
        if self.fetch(|g| g.fetch_subject(subject_id))?.is_none() {
            return Err(EngineError::not_found("subject", subject_id));
        }
        let roster = self.subject_roster(subject_id, academic_year)?;
        let mut ranked: Vec<(f64, EnrollmentId, TopPerformer)> = Vec::new();
        for entry in roster {
            let stats = self.marks_tally(&entry.enrollment)?.stats;
            if stats.count == 0 {
                continue;
            }
            ranked.push((
                stats.percentage,
                entry.enrollment.id,
                TopPerformer {
                    student_id: entry.meta.id,
                    full_name: entry.meta.full_name,
                    roll_number: entry.meta.roll_number,
                    percentage: stats.percentage,
                    grade: stats.grade,
                },
            ));
        }
        ranked.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });
        Ok(ranked.into_iter().take(limit).map(|(_, _, p)| p).collect())
    }

    /// Every readable attendance row of a subject's roster, by date and then
    /// roll number. Unreadable rows are logged and left out.
    pub fn attendance_records(
        &self,
        subject_id: SubjectId,
        academic_year: &str,
    ) -> Result<Vec<AttendanceRecord>, EngineError> {
        let Some(subject) = self.fetch(|g| g.fetch_subject(subject_id))? else {
            return Err(EngineError::not_found("subject", subject_id));
        };
        let roster = self.subject_roster(subject_id, academic_year)?;
        let mut markers: HashMap<i64, Option<String>> = HashMap::new();
        let mut records = Vec::new();
        for entry in roster {
            let fetched = self.fetch(|g| g.fetch_attendance(&entry.enrollment))?;
            self.absorb_warnings(entry.enrollment.id, &fetched.rejected, &mut Vec::new());
            for event in fetched.rows {
                let marked_by_name = match markers.get(&event.marked_by) {
                    Some(name) => name.clone(),
                    None => {
                        let name = self.fetch(|g| g.fetch_user_name(event.marked_by))?;
                        markers.insert(event.marked_by, name.clone());
                        name
                    }
                };
                records.push(AttendanceRecord {
                    student: entry.meta.clone(),
                    subject_code: subject.code.clone(),
                    event,
                    marked_by_name,
                });
            }
        }
        // Stable: rows of one date keep roster order.
        records.sort_by_key(|r| r.event.date);
        Ok(records)
    }

    /// Every valid mark of a subject's roster, by roll number and then
    /// assessment date. Rows the marks summary would drop are logged and left
    /// out.
    pub fn mark_records(
        &self,
        subject_id: SubjectId,
        academic_year: &str,
    ) -> Result<Vec<MarkRecord>, EngineError> {
        let Some(subject) = self.fetch(|g| g.fetch_subject(subject_id))? else {
            return Err(EngineError::not_found("subject", subject_id));
        };
        let roster = self.subject_roster(subject_id, academic_year)?;
        let mut records = Vec::new();
        for entry in roster {
            let tally = self.marks_tally(&entry.enrollment)?;
            self.absorb_warnings(entry.enrollment.id, &tally.warnings, &mut Vec::new());
            records.extend(tally.breakdowns.into_iter().map(|assessment| MarkRecord {
                student: entry.meta.clone(),
                subject_code: subject.code.clone(),
                assessment,
            }));
        }
        Ok(records)
    }

    /// Class-wide attendance per date within `[from, to]`. An inverted range
    /// is empty.
    pub fn daily_attendance(
        &self,
        subject_id: SubjectId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyAttendance>, EngineError> {
        if from > to {
            return Ok(Vec::new());
        }
        let events = self.fetch(|g| g.fetch_subject_attendance(subject_id, from, to))?;
        let (rows, warnings) = calc::daily_attendance_rows(&events);
        for w in &warnings {
            warn!(subject_id, row_id = w.row_id, "dropped row: {}", w.message);
        }
        Ok(rows)
    }
}
