use crate::calc::RowWarning;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::gateway::{DataGateway, Fetched};
use crate::model::{
    AssessmentType, AttendanceEvent, AttendanceStatus, Enrolled, Enrollment, MarkEntry,
    StudentId, StudentMeta, SubjectId, SubjectMeta,
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use tracing::warn;

pub const DB_FILE: &str = "attendease.sqlite3";
pub const ANALYTICS_SETTINGS_KEY: &str = "setup.analytics";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            user_id INTEGER PRIMARY KEY,
            full_name TEXT NOT NULL,
            email TEXT,
            role TEXT NOT NULL DEFAULT 'STUDENT'
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            student_id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            roll_number TEXT NOT NULL UNIQUE,
            semester INTEGER,
            FOREIGN KEY(user_id) REFERENCES users(user_id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            subject_id INTEGER PRIMARY KEY,
            subject_name TEXT NOT NULL,
            subject_code TEXT NOT NULL UNIQUE,
            credits INTEGER
        )",
        [],
    )?;
    // Workspaces created before subjects could be retired lack the flag.
    ensure_subjects_is_active(&conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS enrollments(
            enrollment_id INTEGER PRIMARY KEY,
            student_id INTEGER NOT NULL,
            subject_id INTEGER NOT NULL,
            academic_year TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(student_id),
            FOREIGN KEY(subject_id) REFERENCES subjects(subject_id),
            UNIQUE(student_id, subject_id, academic_year)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_enrollments_subject_year ON enrollments(subject_id, academic_year)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_enrollments_year ON enrollments(academic_year)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance(
            attendance_id INTEGER PRIMARY KEY,
            enrollment_id INTEGER NOT NULL,
            attendance_date TEXT NOT NULL,
            status TEXT NOT NULL,
            marked_by INTEGER NOT NULL DEFAULT 0,
            marked_at TEXT,
            FOREIGN KEY(enrollment_id) REFERENCES enrollments(enrollment_id),
            UNIQUE(enrollment_id, attendance_date)
        )",
        [],
    )?;
    ensure_attendance_remarks(&conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_date ON attendance(attendance_date)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS assessment_types(
            type_id INTEGER PRIMARY KEY,
            type_name TEXT NOT NULL,
            weightage REAL NOT NULL DEFAULT 0
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS marks(
            mark_id INTEGER PRIMARY KEY,
            enrollment_id INTEGER NOT NULL,
            assessment_type_id INTEGER NOT NULL,
            max_marks REAL NOT NULL,
            marks_obtained REAL NOT NULL,
            assessment_date TEXT NOT NULL,
            entered_by INTEGER NOT NULL DEFAULT 0,
            remarks TEXT,
            FOREIGN KEY(enrollment_id) REFERENCES enrollments(enrollment_id),
            FOREIGN KEY(assessment_type_id) REFERENCES assessment_types(type_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_marks_enrollment ON marks(enrollment_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

fn ensure_subjects_is_active(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "subjects", "is_active")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE subjects ADD COLUMN is_active INTEGER NOT NULL DEFAULT 1",
        [],
    )?;
    Ok(())
}

fn ensure_attendance_remarks(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "attendance", "remarks")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE attendance ADD COLUMN remarks TEXT", [])?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn settings_get_json(
    conn: &Connection,
    key: &str,
) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

/// Effective analytics config for one request. A stored value that no longer
/// validates is ignored in favour of the defaults.
pub fn load_engine_config(conn: &Connection) -> anyhow::Result<EngineConfig> {
    let Some(saved) = settings_get_json(conn, ANALYTICS_SETTINGS_KEY)? else {
        return Ok(EngineConfig::default());
    };
    match EngineConfig::from_json(&saved) {
        Ok(cfg) => Ok(cfg),
        Err(e) => {
            warn!("ignoring stored analytics settings: {}", e);
            Ok(EngineConfig::default())
        }
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}

type AttendanceRow = (i64, i64, String, String, i64, Option<String>, Option<String>);

/// Rows whose date or status cannot be read are left out and reported as
/// rejects, the same way the aggregators treat rows that break the data model.
fn attendance_from_rows(rows: Vec<AttendanceRow>) -> Fetched<AttendanceEvent> {
    let mut out = Fetched::clean(Vec::with_capacity(rows.len()));
    for (id, enrollment_id, date_raw, status_raw, marked_by, marked_at_raw, remarks) in rows {
        let Some(date) = parse_date(&date_raw) else {
            out.rejected.push(RowWarning::attendance(
                id,
                format!("unreadable attendance date {:?}", date_raw),
            ));
            continue;
        };
        let status = match status_raw.parse::<AttendanceStatus>() {
            Ok(s) => s,
            Err(e) => {
                out.rejected.push(RowWarning::attendance(id, e.to_string()));
                continue;
            }
        };
        let marked_at = marked_at_raw
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or_else(|| date.and_time(NaiveTime::default()));
        out.rows.push(AttendanceEvent {
            id,
            enrollment_id,
            date,
            status,
            marked_by,
            marked_at,
            remarks,
        });
    }
    out
}

/// [`DataGateway`] over a workspace connection.
pub struct SqliteGateway<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteGateway<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

const STUDENT_COLUMNS: &str = "s.student_id, u.full_name, s.roll_number, u.email, s.semester";

fn student_from_row(r: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<StudentMeta> {
    Ok(StudentMeta {
        id: r.get(offset)?,
        full_name: r.get(offset + 1)?,
        roll_number: r.get(offset + 2)?,
        email: r.get(offset + 3)?,
        semester: r.get(offset + 4)?,
    })
}

fn subject_from_row(r: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<SubjectMeta> {
    Ok(SubjectMeta {
        id: r.get(offset)?,
        name: r.get(offset + 1)?,
        code: r.get(offset + 2)?,
        credits: r.get(offset + 3)?,
    })
}

fn enrollment_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Enrollment> {
    Ok(Enrollment {
        id: r.get(0)?,
        student_id: r.get(1)?,
        subject_id: r.get(2)?,
        academic_year: r.get(3)?,
    })
}

impl DataGateway for SqliteGateway<'_> {
    fn fetch_student(&self, id: StudentId) -> Result<Option<StudentMeta>, EngineError> {
        let sql = format!(
            "SELECT {STUDENT_COLUMNS}
             FROM students s JOIN users u ON u.user_id = s.user_id
             WHERE s.student_id = ?"
        );
        Ok(self
            .conn
            .query_row(&sql, [id], |r| student_from_row(r, 0))
            .optional()?)
    }

    fn fetch_subject(&self, id: SubjectId) -> Result<Option<SubjectMeta>, EngineError> {
        Ok(self
            .conn
            .query_row(
                "SELECT subject_id, subject_name, subject_code, credits
                 FROM subjects WHERE subject_id = ?",
                [id],
                |r| subject_from_row(r, 0),
            )
            .optional()?)
    }

    fn fetch_user_name(&self, user_id: i64) -> Result<Option<String>, EngineError> {
        Ok(self
            .conn
            .query_row(
                "SELECT full_name FROM users WHERE user_id = ?",
                [user_id],
                |r| r.get(0),
            )
            .optional()?)
    }

    fn find_enrollment(
        &self,
        student: StudentId,
        subject: SubjectId,
        academic_year: &str,
    ) -> Result<Option<Enrollment>, EngineError> {
        Ok(self
            .conn
            .query_row(
                "SELECT enrollment_id, student_id, subject_id, academic_year
                 FROM enrollments
                 WHERE student_id = ? AND subject_id = ? AND academic_year = ?",
                (student, subject, academic_year),
                enrollment_from_row,
            )
            .optional()?)
    }

    fn fetch_attendance(
        &self,
        enrollment: &Enrollment,
    ) -> Result<Fetched<AttendanceEvent>, EngineError> {
        let mut stmt = self.conn.prepare(
            "SELECT attendance_id, enrollment_id, attendance_date, status,
                    marked_by, marked_at, remarks
             FROM attendance
             WHERE enrollment_id = ?
             ORDER BY attendance_date, attendance_id",
        )?;
        let rows = stmt
            .query_map([enrollment.id], |r| {
                Ok((
                    r.get(0)?,
                    r.get(1)?,
                    r.get(2)?,
                    r.get(3)?,
                    r.get(4)?,
                    r.get(5)?,
                    r.get(6)?,
                ))
            })
            .and_then(|it| it.collect::<Result<Vec<AttendanceRow>, _>>())?;
        Ok(attendance_from_rows(rows))
    }

    fn fetch_marks(&self, enrollment: &Enrollment) -> Result<Fetched<MarkEntry>, EngineError> {
        let mut stmt = self.conn.prepare(
            "SELECT m.mark_id, m.enrollment_id, t.type_id, t.type_name, t.weightage,
                    m.max_marks, m.marks_obtained, m.assessment_date, m.entered_by, m.remarks
             FROM marks m
             JOIN assessment_types t ON t.type_id = m.assessment_type_id
             WHERE m.enrollment_id = ?
             ORDER BY m.assessment_date, m.mark_id",
        )?;
        let rows = stmt
            .query_map([enrollment.id], |r| {
                let date_raw: String = r.get(7)?;
                Ok((
                    MarkEntry {
                        id: r.get(0)?,
                        enrollment_id: r.get(1)?,
                        assessment_type: AssessmentType {
                            id: r.get(2)?,
                            name: r.get(3)?,
                            weightage: r.get(4)?,
                        },
                        max_marks: r.get(5)?,
                        marks_obtained: r.get(6)?,
                        assessment_date: NaiveDate::MIN,
                        entered_by: r.get(8)?,
                        remarks: r.get(9)?,
                    },
                    date_raw,
                ))
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;

        let mut out = Fetched::clean(Vec::with_capacity(rows.len()));
        for (mut mark, date_raw) in rows {
            let Some(date) = parse_date(&date_raw) else {
                out.rejected.push(RowWarning::mark(
                    mark.id,
                    format!("unreadable assessment date {:?}", date_raw),
                ));
                continue;
            };
            mark.assessment_date = date;
            out.rows.push(mark);
        }
        Ok(out)
    }

    fn list_enrolled_students(
        &self,
        subject: SubjectId,
        academic_year: &str,
    ) -> Result<Vec<Enrolled<StudentMeta>>, EngineError> {
        let sql = format!(
            "SELECT e.enrollment_id, e.student_id, e.subject_id, e.academic_year, {STUDENT_COLUMNS}
             FROM enrollments e
             JOIN students s ON s.student_id = e.student_id
             JOIN users u ON u.user_id = s.user_id
             WHERE e.subject_id = ? AND e.academic_year = ?
             ORDER BY s.roll_number, e.enrollment_id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map((subject, academic_year), |r| {
                Ok(Enrolled {
                    enrollment: enrollment_from_row(r)?,
                    meta: student_from_row(r, 4)?,
                })
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
        Ok(rows)
    }

    fn list_subjects_for(
        &self,
        student: StudentId,
        academic_year: &str,
    ) -> Result<Vec<Enrolled<SubjectMeta>>, EngineError> {
        let mut stmt = self.conn.prepare(
            "SELECT e.enrollment_id, e.student_id, e.subject_id, e.academic_year,
                    sub.subject_id, sub.subject_name, sub.subject_code, sub.credits
             FROM enrollments e
             JOIN subjects sub ON sub.subject_id = e.subject_id
             WHERE e.student_id = ? AND e.academic_year = ?
             ORDER BY sub.subject_code, e.enrollment_id",
        )?;
        let rows = stmt
            .query_map((student, academic_year), |r| {
                Ok(Enrolled {
                    enrollment: enrollment_from_row(r)?,
                    meta: subject_from_row(r, 4)?,
                })
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
        Ok(rows)
    }

    fn list_enrollments(&self, academic_year: &str) -> Result<Vec<Enrollment>, EngineError> {
        let mut stmt = self.conn.prepare(
            "SELECT e.enrollment_id, e.student_id, e.subject_id, e.academic_year
             FROM enrollments e
             JOIN subjects sub ON sub.subject_id = e.subject_id
             WHERE e.academic_year = ? AND sub.is_active = 1
             ORDER BY e.enrollment_id",
        )?;
        let rows = stmt
            .query_map([academic_year], enrollment_from_row)
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
        Ok(rows)
    }

    fn fetch_subject_attendance(
        &self,
        subject: SubjectId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendanceEvent>, EngineError> {
        let mut stmt = self.conn.prepare(
            "SELECT a.attendance_id, a.enrollment_id, a.attendance_date, a.status,
                    a.marked_by, a.marked_at, a.remarks
             FROM attendance a
             JOIN enrollments e ON e.enrollment_id = a.enrollment_id
             WHERE e.subject_id = ? AND a.attendance_date BETWEEN ? AND ?
             ORDER BY a.attendance_date, a.attendance_id",
        )?;
        let from = from.format("%Y-%m-%d").to_string();
        let to = to.format("%Y-%m-%d").to_string();
        let rows = stmt
            .query_map((subject, from, to), |r| {
                Ok((
                    r.get(0)?,
                    r.get(1)?,
                    r.get(2)?,
                    r.get(3)?,
                    r.get(4)?,
                    r.get(5)?,
                    r.get(6)?,
                ))
            })
            .and_then(|it| it.collect::<Result<Vec<AttendanceRow>, _>>())?;
        let fetched = attendance_from_rows(rows);
        for w in &fetched.rejected {
            warn!(subject_id = subject, row_id = w.row_id, "dropped row: {}", w.message);
        }
        Ok(fetched.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_workspace(prefix: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("{}-{}", prefix, nanos))
    }

    fn seed(conn: &Connection) {
        conn.execute_batch(
            "INSERT INTO users(user_id, full_name, email, role) VALUES
                (1, 'Asha Rao', 'r01@college.test', 'STUDENT'),
                (2, 'Bilal Khan', NULL, 'STUDENT');
             INSERT INTO students(student_id, user_id, roll_number, semester) VALUES
                (11, 1, 'R02', 3),
                (12, 2, 'R01', NULL);
             INSERT INTO subjects(subject_id, subject_name, subject_code, credits) VALUES
                (21, 'Data Structures', 'CS201', 4),
                (22, 'Programming', 'CS101', 3);
             INSERT INTO enrollments(enrollment_id, student_id, subject_id, academic_year) VALUES
                (31, 11, 21, '2024-2025'),
                (32, 12, 21, '2024-2025'),
                (33, 11, 22, '2024-2025'),
                (34, 11, 21, '2023-2024');
             INSERT INTO attendance(attendance_id, enrollment_id, attendance_date, status, marked_by, marked_at) VALUES
                (41, 31, '2024-08-01', 'PRESENT', 5, '2024-08-01 09:00:00'),
                (42, 31, '2024-08-02', 'late', 5, NULL),
                (43, 31, '2024-08-03', 'ON_LEAVE', 5, NULL),
                (44, 32, '2024-08-01', 'ABSENT', 5, '2024-08-01 09:05:00'),
                (45, 31, 'garbage', 'PRESENT', 5, NULL);
             INSERT INTO assessment_types(type_id, type_name, weightage) VALUES
                (51, 'Quiz', 10), (52, 'Final', 60);
             INSERT INTO marks(mark_id, enrollment_id, assessment_type_id, max_marks, marks_obtained, assessment_date, entered_by) VALUES
                (61, 31, 51, 10, 8, '2024-08-10', 5),
                (62, 31, 52, 100, 70, '2024-11-20', 5),
                (63, 31, 51, 10, 9, '20/11/2024', 5);",
        )
        .unwrap();
    }

    #[test]
    fn schema_is_created_idempotently() {
        let ws = temp_workspace("attendease-db-schema");
        let conn = open_db(&ws).unwrap();
        assert!(table_has_column(&conn, "subjects", "is_active").unwrap());
        assert!(table_has_column(&conn, "attendance", "remarks").unwrap());
        drop(conn);
        let again = open_db(&ws).unwrap();
        assert!(table_has_column(&again, "settings", "value_json").unwrap());
        assert!(ws.join(DB_FILE).is_file());
    }

    #[test]
    fn settings_round_trip_and_config_fallback() {
        let ws = temp_workspace("attendease-db-settings");
        let conn = open_db(&ws).unwrap();
        assert_eq!(load_engine_config(&conn).unwrap(), EngineConfig::default());

        settings_set_json(
            &conn,
            ANALYTICS_SETTINGS_KEY,
            &serde_json::json!({ "attendanceThreshold": 80.0 }),
        )
        .unwrap();
        assert_eq!(load_engine_config(&conn).unwrap().attendance_threshold, 80.0);

        settings_set_json(
            &conn,
            ANALYTICS_SETTINGS_KEY,
            &serde_json::json!({ "passThreshold": 400.0 }),
        )
        .unwrap();
        assert_eq!(load_engine_config(&conn).unwrap(), EngineConfig::default());
    }

    #[test]
    fn gateway_reads_joined_rows() {
        let ws = temp_workspace("attendease-db-gateway");
        let conn = open_db(&ws).unwrap();
        seed(&conn);
        let gw = SqliteGateway::new(&conn);

        let student = gw.fetch_student(11).unwrap().unwrap();
        assert_eq!(student.full_name, "Asha Rao");
        assert_eq!(student.semester, Some(3));
        assert!(gw.fetch_student(99).unwrap().is_none());
        assert_eq!(gw.fetch_user_name(2).unwrap().as_deref(), Some("Bilal Khan"));
        assert!(gw.fetch_user_name(5).unwrap().is_none());

        let e = gw.find_enrollment(11, 21, "2024-2025").unwrap().unwrap();
        assert_eq!(e.id, 31);

        let events = gw.fetch_attendance(&e).unwrap();
        let ids: Vec<i64> = events.rows.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![41, 42]);
        assert_eq!(events.rows[1].status, AttendanceStatus::Late);
        let rejected: Vec<i64> = events.rejected.iter().map(|w| w.row_id).collect();
        assert_eq!(rejected, vec![43, 45]);

        let marks = gw.fetch_marks(&e).unwrap();
        assert_eq!(marks.rows.len(), 2);
        assert_eq!(marks.rows[1].assessment_type.weightage, 60.0);
        assert_eq!(marks.rejected.len(), 1);
        assert_eq!(marks.rejected[0].row_kind, "mark");
        assert_eq!(marks.rejected[0].row_id, 63);

        let roster = gw.list_enrolled_students(21, "2024-2025").unwrap();
        let rolls: Vec<&str> = roster.iter().map(|r| r.meta.roll_number.as_str()).collect();
        assert_eq!(rolls, vec!["R01", "R02"]);

        let subjects = gw.list_subjects_for(11, "2024-2025").unwrap();
        let codes: Vec<&str> = subjects.iter().map(|s| s.meta.code.as_str()).collect();
        assert_eq!(codes, vec!["CS101", "CS201"]);

        assert_eq!(gw.list_enrollments("2023-2024").unwrap().len(), 1);

        let day = |d| NaiveDate::from_ymd_opt(2024, 8, d).unwrap();
        let class_day = gw.fetch_subject_attendance(21, day(1), day(1)).unwrap();
        assert_eq!(class_day.len(), 2);
    }

    #[test]
    fn retired_subjects_leave_the_year_scan() {
        let ws = temp_workspace("attendease-db-retired");
        let conn = open_db(&ws).unwrap();
        seed(&conn);
        conn.execute("UPDATE subjects SET is_active = 0 WHERE subject_id = 22", [])
            .unwrap();
        let gw = SqliteGateway::new(&conn);
        let ids: Vec<i64> = gw
            .list_enrollments("2024-2025")
            .unwrap()
            .iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![31, 32]);
        assert_eq!(gw.list_subjects_for(11, "2024-2025").unwrap().len(), 2);
    }

    #[test]
    fn unreadable_rows_surface_on_request() {
        let ws = temp_workspace("attendease-db-surfaced");
        let conn = open_db(&ws).unwrap();
        seed(&conn);
        let gw = SqliteGateway::new(&conn);
        let cfg = EngineConfig {
            surface_row_warnings: true,
            ..EngineConfig::default()
        };
        let report = crate::report::ReportBuilder::new(&gw, cfg)
            .build_single(11, 21, "2024-2025")
            .unwrap();
        assert_eq!(report.attendance.unwrap().total, 2);
        let skipped: Vec<&String> = report
            .weaknesses
            .iter()
            .filter(|w| w.starts_with("Skipped"))
            .collect();
        assert_eq!(skipped.len(), 3);
        assert!(skipped[0].starts_with("Skipped attendance row 43"));
        assert!(skipped[1].starts_with("Skipped attendance row 45"));
        assert!(skipped[2].starts_with("Skipped mark row 63"));

        let quiet = crate::report::ReportBuilder::new(&gw, EngineConfig::default())
            .build_single(11, 21, "2024-2025")
            .unwrap();
        assert!(quiet.weaknesses.iter().all(|w| !w.starts_with("Skipped")));
    }
}
