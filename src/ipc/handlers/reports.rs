use crate::db::SqliteGateway;
use crate::error::EngineError;
use crate::ipc::error::{engine_err, ok};
use crate::ipc::helpers::{
    academic_year, date_range, db_conn, engine_config, optional_u64, required_i64,
};
use crate::ipc::types::{AppState, Request};
use crate::render::{report_object, ReportObject};
use crate::report::{Report, ReportBuilder};
use rusqlite::Connection;
use serde_json::json;

const DEFAULT_TOP_PERFORMERS: u64 = 10;

fn with_builder<F>(state: &AppState, req: &Request, run: F) -> serde_json::Value
where
    F: FnOnce(&ReportBuilder<'_, SqliteGateway<'_>>) -> serde_json::Value,
{
    let conn: &Connection = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let cfg = match engine_config(conn, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let gateway = SqliteGateway::new(conn);
    let builder = ReportBuilder::new(&gateway, cfg);
    run(&builder)
}

fn reports_result(req: &Request, reports: Vec<ReportObject>) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "count": reports.len(),
            "reports": reports,
        }),
    )
}

/// Stream a bulk builder into structured objects.
fn collect_objects<S>(stream: S) -> Result<Vec<ReportObject>, EngineError>
where
    S: FnOnce(&mut dyn FnMut(Report) -> Result<(), EngineError>) -> Result<usize, EngineError>,
{
    let mut out = Vec::new();
    stream(&mut |r: Report| {
        out.push(report_object(&r));
        Ok(())
    })?;
    Ok(out)
}

fn handle_reports_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match required_i64(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subject_id = match required_i64(req, "subjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let year = match academic_year(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    with_builder(state, req, |b| match b.build_single(student_id, subject_id, &year) {
        Ok(r) => ok(&req.id, json!(report_object(&r))),
        Err(e) => engine_err(&req.id, &e),
    })
}

fn handle_reports_subject_attendance(state: &mut AppState, req: &Request) -> serde_json::Value {
    let subject_id = match required_i64(req, "subjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let year = match academic_year(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    with_builder(state, req, |b| {
        match collect_objects(|emit| b.for_each_subject_attendance(subject_id, &year, emit)) {
            Ok(reports) => reports_result(req, reports),
            Err(e) => engine_err(&req.id, &e),
        }
    })
}

fn handle_reports_subject_marks(state: &mut AppState, req: &Request) -> serde_json::Value {
    let subject_id = match required_i64(req, "subjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let year = match academic_year(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    with_builder(state, req, |b| {
        match collect_objects(|emit| b.for_each_subject_marks(subject_id, &year, emit)) {
            Ok(reports) => reports_result(req, reports),
            Err(e) => engine_err(&req.id, &e),
        }
    })
}

fn handle_reports_student_all(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match required_i64(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let year = match academic_year(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    with_builder(state, req, |b| {
        match collect_objects(|emit| b.for_each_student_subject(student_id, &year, emit)) {
            Ok(reports) => reports_result(req, reports),
            Err(e) => engine_err(&req.id, &e),
        }
    })
}

fn handle_reports_at_risk(state: &mut AppState, req: &Request) -> serde_json::Value {
    let year = match academic_year(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    with_builder(state, req, |b| {
        match collect_objects(|emit| b.for_each_at_risk(&year, emit)) {
            Ok(reports) => reports_result(req, reports),
            Err(e) => engine_err(&req.id, &e),
        }
    })
}

fn handle_reports_subject_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let subject_id = match required_i64(req, "subjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let year = match academic_year(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    with_builder(state, req, |b| match b.subject_summary(subject_id, &year) {
        Ok(summary) => ok(&req.id, json!(summary)),
        Err(e) => engine_err(&req.id, &e),
    })
}

fn handle_reports_top_performers(state: &mut AppState, req: &Request) -> serde_json::Value {
    let subject_id = match required_i64(req, "subjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let year = match academic_year(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let limit = match optional_u64(req, "limit", DEFAULT_TOP_PERFORMERS) {
        Ok(v) => v,
        Err(e) => return e,
    };
    with_builder(state, req, |b| {
        match b.top_performers(subject_id, &year, limit as usize) {
            Ok(performers) => ok(
                &req.id,
                json!({ "limit": limit, "performers": performers }),
            ),
            Err(e) => engine_err(&req.id, &e),
        }
    })
}

fn handle_reports_daily_attendance(state: &mut AppState, req: &Request) -> serde_json::Value {
    let subject_id = match required_i64(req, "subjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let (from, to) = match date_range(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    with_builder(state, req, |b| match b.daily_attendance(subject_id, from, to) {
        Ok(days) => ok(&req.id, json!({ "days": days })),
        Err(e) => engine_err(&req.id, &e),
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.student" => Some(handle_reports_student(state, req)),
        "reports.subjectAttendance" => Some(handle_reports_subject_attendance(state, req)),
        "reports.subjectMarks" => Some(handle_reports_subject_marks(state, req)),
        "reports.studentAll" => Some(handle_reports_student_all(state, req)),
        "reports.atRisk" => Some(handle_reports_at_risk(state, req)),
        "reports.subjectSummary" => Some(handle_reports_subject_summary(state, req)),
        "reports.topPerformers" => Some(handle_reports_top_performers(state, req)),
        "reports.dailyAttendance" => Some(handle_reports_daily_attendance(state, req)),
        _ => None,
    }
}
