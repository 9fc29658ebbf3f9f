use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type StudentId = i64;
pub type SubjectId = i64;
pub type EnrollmentId = i64;

/// One student taking one subject in one academic year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub student_id: StudentId,
    pub subject_id: SubjectId,
    pub academic_year: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "PRESENT",
            AttendanceStatus::Absent => "ABSENT",
            AttendanceStatus::Late => "LATE",
            AttendanceStatus::Excused => "EXCUSED",
        }
    }

    /// PRESENT, LATE and EXCUSED count toward the attendance percentage.
    pub fn is_attended(self) -> bool {
        !matches!(self, AttendanceStatus::Absent)
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PRESENT" => Ok(AttendanceStatus::Present),
            "ABSENT" => Ok(AttendanceStatus::Absent),
            "LATE" => Ok(AttendanceStatus::Late),
            "EXCUSED" => Ok(AttendanceStatus::Excused),
            other => Err(format!("unknown attendance status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEvent {
    pub id: i64,
    pub enrollment_id: EnrollmentId,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub marked_by: i64,
    pub marked_at: NaiveDateTime,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentType {
    pub id: i64,
    pub name: String,
    /// Percentage share of the subject's weighted score. Weightages of a
    /// subject are not required to sum to 100.
    pub weightage: f64,
}

/// A stored mark with its assessment type joined in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkEntry {
    pub id: i64,
    pub enrollment_id: EnrollmentId,
    pub assessment_type: AssessmentType,
    pub max_marks: f64,
    pub marks_obtained: f64,
    pub assessment_date: NaiveDate,
    pub entered_by: i64,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentMeta {
    pub id: StudentId,
    pub full_name: String,
    pub roll_number: String,
    pub email: Option<String>,
    /// Carried through to reports only; never used in any computation.
    pub semester: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectMeta {
    pub id: SubjectId,
    pub name: String,
    pub code: String,
    pub credits: Option<i64>,
}

/// Roster row: an enrollment plus the metadata of the other side of the join.
#[derive(Debug, Clone, PartialEq)]
pub struct Enrolled<T> {
    pub enrollment: Enrollment,
    pub meta: T,
}
