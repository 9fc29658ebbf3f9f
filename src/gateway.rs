use crate::calc::RowWarning;
use crate::error::EngineError;
use crate::model::{
    AttendanceEvent, Enrolled, Enrollment, MarkEntry, StudentId, StudentMeta, SubjectId,
    SubjectMeta,
};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

/// Rows read for one enrollment, plus stored rows that could not be read at
/// all (unknown status, malformed date). Rejected rows never reach the
/// aggregators but are reported alongside their warnings.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
    pub rows: Vec<T>,
    pub rejected: Vec<RowWarning>,
}

impl<T> Fetched<T> {
    pub fn clean(rows: Vec<T>) -> Self {
        Self {
            rows,
            rejected: Vec::new(),
        }
    }
}

/// Read contract the analytics engine relies on.
///
/// Missing entities are `Ok(None)`; anything that prevents answering at all
/// is `Err(EngineError::DataUnavailable)`. List operations return rows that
/// are already filtered to the requested scope.
pub trait DataGateway {
    fn fetch_student(&self, id: StudentId) -> Result<Option<StudentMeta>, EngineError>;
    fn fetch_subject(&self, id: SubjectId) -> Result<Option<SubjectMeta>, EngineError>;
    /// Display name of the staff member who recorded a row.
    fn fetch_user_name(&self, user_id: i64) -> Result<Option<String>, EngineError>;
    fn find_enrollment(
        &self,
        student: StudentId,
        subject: SubjectId,
        academic_year: &str,
    ) -> Result<Option<Enrollment>, EngineError>;
    fn fetch_attendance(
        &self,
        enrollment: &Enrollment,
    ) -> Result<Fetched<AttendanceEvent>, EngineError>;
    /// Mark entries with their assessment weightage joined in.
    fn fetch_marks(&self, enrollment: &Enrollment) -> Result<Fetched<MarkEntry>, EngineError>;
    fn list_enrolled_students(
        &self,
        subject: SubjectId,
        academic_year: &str,
    ) -> Result<Vec<Enrolled<StudentMeta>>, EngineError>;
    fn list_subjects_for(
        &self,
        student: StudentId,
        academic_year: &str,
    ) -> Result<Vec<Enrolled<SubjectMeta>>, EngineError>;
    /// Enrollments of the year in subjects that are still active.
    fn list_enrollments(&self, academic_year: &str) -> Result<Vec<Enrollment>, EngineError>;
    /// Every attendance event of a subject dated within `[from, to]`, across years.
    fn fetch_subject_attendance(
        &self,
        subject: SubjectId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendanceEvent>, EngineError>;
}

/// In-process gateway over plain collections. Recording attendance for an
/// existing `(enrollment, date)` replaces the earlier event.
#[derive(Debug, Default, Clone)]
pub struct MemoryGateway {
    students: BTreeMap<StudentId, StudentMeta>,
    subjects: BTreeMap<SubjectId, SubjectMeta>,
    enrollments: BTreeMap<i64, Enrollment>,
    attendance: BTreeMap<(i64, NaiveDate), AttendanceEvent>,
    marks: Vec<MarkEntry>,
    retired: BTreeSet<SubjectId>,
    users: BTreeMap<i64, String>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_student(&mut self, student: StudentMeta) -> &mut Self {
        self.students.insert(student.id, student);
        self
    }

    pub fn add_subject(&mut self, subject: SubjectMeta) -> &mut Self {
        self.subjects.insert(subject.id, subject);
        self
    }

    pub fn add_user(&mut self, id: i64, full_name: &str) -> &mut Self {
        self.users.insert(id, full_name.to_string());
        self
    }

    pub fn enroll(&mut self, enrollment: Enrollment) -> &mut Self {
        self.enrollments.insert(enrollment.id, enrollment);
        self
    }

    pub fn record_attendance(&mut self, event: AttendanceEvent) -> &mut Self {
        self.attendance
            .insert((event.enrollment_id, event.date), event);
        self
    }

    pub fn add_mark(&mut self, mark: MarkEntry) -> &mut Self {
        self.marks.push(mark);
        self
    }

    /// Mark a subject inactive; its enrollments drop out of year-wide scans.
    pub fn retire_subject(&mut self, id: SubjectId) -> &mut Self {
        self.retired.insert(id);
        self
    }
}

impl DataGateway for MemoryGateway {
    fn fetch_student(&self, id: StudentId) -> Result<Option<StudentMeta>, EngineError> {
        Ok(self.students.get(&id).cloned())
    }

    fn fetch_subject(&self, id: SubjectId) -> Result<Option<SubjectMeta>, EngineError> {
        Ok(self.subjects.get(&id).cloned())
    }

    fn fetch_user_name(&self, user_id: i64) -> Result<Option<String>, EngineError> {
        Ok(self.users.get(&user_id).cloned())
    }

    fn find_enrollment(
        &self,
        student: StudentId,
        subject: SubjectId,
        academic_year: &str,
    ) -> Result<Option<Enrollment>, EngineError> {
        Ok(self
            .enrollments
            .values()
            .find(|e| {
                e.student_id == student
                    && e.subject_id == subject
                    && e.academic_year == academic_year
            })
            .cloned())
    }

    fn fetch_attendance(
        &self,
        enrollment: &Enrollment,
    ) -> Result<Fetched<AttendanceEvent>, EngineError> {
        Ok(Fetched::clean(
            self.attendance
                .values()
                .filter(|a| a.enrollment_id == enrollment.id)
                .cloned()
                .collect(),
        ))
    }

    fn fetch_marks(&self, enrollment: &Enrollment) -> Result<Fetched<MarkEntry>, EngineError> {
        Ok(Fetched::clean(
            self.marks
                .iter()
                .filter(|m| m.enrollment_id == enrollment.id)
                .cloned()
                .collect(),
        ))
    }

    fn list_enrolled_students(
        &self,
        subject: SubjectId,
        academic_year: &str,
    ) -> Result<Vec<Enrolled<StudentMeta>>, EngineError> {
        Ok(self
            .enrollments
            .values()
            .filter(|e| e.subject_id == subject && e.academic_year == academic_year)
            .filter_map(|e| {
                self.students.get(&e.student_id).map(|s| Enrolled {
                    enrollment: e.clone(),
                    meta: s.clone(),
                })
            })
            .collect())
    }

    fn list_subjects_for(
        &self,
        student: StudentId,
        academic_year: &str,
    ) -> Result<Vec<Enrolled<SubjectMeta>>, EngineError> {
        Ok(self
            .enrollments
            .values()
            .filter(|e| e.student_id == student && e.academic_year == academic_year)
            .filter_map(|e| {
                self.subjects.get(&e.subject_id).map(|s| Enrolled {
                    enrollment: e.clone(),
                    meta: s.clone(),
                })
            })
            .collect())
    }

    fn list_enrollments(&self, academic_year: &str) -> Result<Vec<Enrollment>, EngineError> {
        Ok(self
            .enrollments
            .values()
            .filter(|e| e.academic_year == academic_year)
            .filter(|e| !self.retired.contains(&e.subject_id))
            .cloned()
            .collect())
    }

    fn fetch_subject_attendance(
        &self,
        subject: SubjectId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendanceEvent>, EngineError> {
        Ok(self
            .attendance
            .values()
            .filter(|a| a.date >= from && a.date <= to)
            .filter(|a| {
                self.enrollments
                    .get(&a.enrollment_id)
                    .map(|e| e.subject_id == subject)
                    .unwrap_or(false)
            })
            .cloned()
            .collect())
    }
}
