//! In-memory fixtures shared by the engine's unit tests.

use crate::gateway::MemoryGateway;
use crate::model::{
    AssessmentType, AttendanceEvent, AttendanceStatus, Enrollment, MarkEntry, StudentMeta,
    SubjectMeta,
};
use chrono::{Days, NaiveDate, NaiveDateTime};

pub const YEAR: &str = "2024-2025";

pub fn day(offset: u64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 7, 1)
        .and_then(|d| d.checked_add_days(Days::new(offset)))
        .expect("valid fixture date")
}

pub fn generated_at() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 3, 14)
        .and_then(|d| d.and_hms_opt(10, 30, 0))
        .expect("valid fixture timestamp")
}

#[derive(Default)]
pub struct Fixture {
    pub gw: MemoryGateway,
    next_event: i64,
    next_mark: i64,
    next_type: i64,
}

impl Fixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn student(&mut self, id: i64, roll: &str, name: &str) -> &mut Self {
        self.gw.add_student(StudentMeta {
            id,
            full_name: name.to_string(),
            roll_number: roll.to_string(),
            email: Some(format!("{}@college.test", roll.to_ascii_lowercase())),
            semester: Some(3),
        });
        self
    }

    pub fn subject(&mut self, id: i64, code: &str, name: &str) -> &mut Self {
        self.gw.add_subject(SubjectMeta {
            id,
            name: name.to_string(),
            code: code.to_string(),
            credits: Some(4),
        });
        self
    }

    pub fn enroll(&mut self, id: i64, student_id: i64, subject_id: i64) -> &mut Self {
        self.enroll_in(id, student_id, subject_id, YEAR)
    }

    pub fn enroll_in(
        &mut self,
        id: i64,
        student_id: i64,
        subject_id: i64,
        year: &str,
    ) -> &mut Self {
        self.gw.enroll(Enrollment {
            id,
            student_id,
            subject_id,
            academic_year: year.to_string(),
        });
        self
    }

    /// One event per status on consecutive days.
    pub fn attendance(&mut self, enrollment_id: i64, statuses: &[AttendanceStatus]) -> &mut Self {
        for (i, status) in statuses.iter().enumerate() {
            self.next_event += 1;
            let date = day(i as u64);
            self.gw.record_attendance(AttendanceEvent {
                id: self.next_event,
                enrollment_id,
                date,
                status: *status,
                marked_by: 100,
                marked_at: date.and_hms_opt(9, 0, 0).expect("valid time"),
                remarks: None,
            });
        }
        self
    }

    pub fn present(&mut self, enrollment_id: i64, n: usize) -> &mut Self {
        self.attendance(enrollment_id, &vec![AttendanceStatus::Present; n])
    }

    pub fn mark(
        &mut self,
        enrollment_id: i64,
        type_name: &str,
        obtained: f64,
        max: f64,
        weightage: f64,
    ) -> &mut Self {
        self.next_mark += 1;
        self.next_type += 1;
        self.gw.add_mark(MarkEntry {
            id: self.next_mark,
            enrollment_id,
            assessment_type: AssessmentType {
                id: self.next_type,
                name: type_name.to_string(),
                weightage,
            },
            max_marks: max,
            marks_obtained: obtained,
            assessment_date: day(self.next_mark as u64),
            entered_by: 100,
            remarks: None,
        });
        self
    }
}
