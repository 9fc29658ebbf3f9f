#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub const YEAR: &str = "2024-2025";
pub const CS201: i64 = 21;
pub const CS101: i64 = 22;
pub const R01: i64 = 12;
pub const R02: i64 = 11;
pub const R03: i64 = 13;

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_attendeased");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn attendeased");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or(json!({}))
}

/// Returns the error code of a failed response.
pub fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> String {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .expect("error code")
        .to_string()
}

/// Three students in CS201 for 2024-2025, inserted out of roll order:
///
/// - R01: 4/4 present, 94/110 marks
/// - R02: 1/4 present, 65/110 marks (low attendance)
/// - R03: 3/4 present, 33/110 marks (failing)
///
/// R01 is also enrolled in CS101 with attendance only. Every row was
/// recorded by Meera Iyer (user 5).
pub fn seed_workspace(workspace: &Path) {
    let conn = attendease::db::open_db(workspace).expect("open db");
    conn.execute_batch(
        "INSERT INTO users(user_id, full_name, email, role) VALUES
            (1, 'Asha Rao', 'asha@college.test', 'STUDENT'),
            (2, 'Bilal Khan', 'bilal@college.test', 'STUDENT'),
            (3, 'Chen Li', NULL, 'STUDENT'),
            (5, 'Meera Iyer', 'meera@college.test', 'FACULTY');
         INSERT INTO students(student_id, user_id, roll_number, semester) VALUES
            (11, 2, 'R02', 3),
            (12, 1, 'R01', 3),
            (13, 3, 'R03', 3);
         INSERT INTO subjects(subject_id, subject_name, subject_code, credits) VALUES
            (21, 'Data Structures', 'CS201', 4),
            (22, 'Programming', 'CS101', 3);
         INSERT INTO enrollments(enrollment_id, student_id, subject_id, academic_year) VALUES
            (31, 11, 21, '2024-2025'),
            (32, 12, 21, '2024-2025'),
            (33, 13, 21, '2024-2025'),
            (34, 12, 22, '2024-2025');
         INSERT INTO attendance(enrollment_id, attendance_date, status, marked_by) VALUES
            (31, '2024-09-02', 'PRESENT', 5),
            (31, '2024-09-03', 'ABSENT', 5),
            (31, '2024-09-04', 'ABSENT', 5),
            (31, '2024-09-05', 'ABSENT', 5),
            (32, '2024-09-02', 'PRESENT', 5),
            (32, '2024-09-03', 'PRESENT', 5),
            (32, '2024-09-04', 'PRESENT', 5),
            (32, '2024-09-05', 'PRESENT', 5),
            (33, '2024-09-02', 'PRESENT', 5),
            (33, '2024-09-03', 'PRESENT', 5),
            (33, '2024-09-04', 'ABSENT', 5),
            (33, '2024-09-05', 'PRESENT', 5),
            (34, '2024-09-02', 'PRESENT', 5),
            (34, '2024-09-03', 'PRESENT', 5);
         INSERT INTO assessment_types(type_id, type_name, weightage) VALUES
            (51, 'Quiz', 10), (52, 'Final', 60);
         INSERT INTO marks(enrollment_id, assessment_type_id, max_marks, marks_obtained, assessment_date, entered_by) VALUES
            (31, 51, 10, 5, '2024-09-10', 5),
            (31, 52, 100, 60, '2024-11-20', 5),
            (32, 51, 10, 9, '2024-09-10', 5),
            (32, 52, 100, 85, '2024-11-20', 5),
            (33, 51, 10, 3, '2024-09-10', 5),
            (33, 52, 100, 30, '2024-11-20', 5);",
    )
    .expect("seed workspace");
}

/// Spawn a sidecar with a seeded workspace already selected.
pub fn open_seeded(prefix: &str) -> (PathBuf, Child, ChildStdin, BufReader<ChildStdout>) {
    let workspace = temp_dir(prefix);
    seed_workspace(&workspace);
    let (child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "select",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    (workspace, child, stdin, reader)
}
