use crate::bundle::{self, BundleEntry};
use crate::config::EngineConfig;
use crate::db::SqliteGateway;
use crate::error::EngineError;
use crate::export;
use crate::gateway::DataGateway;
use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::helpers::{
    academic_year, date_range, db_conn, engine_config, required_i64, required_str, workspace,
};
use crate::ipc::types::{AppState, Request};
use crate::render::{self, ReportTable};
use crate::report::ReportBuilder;
use chrono::{Local, NaiveDateTime, Timelike};
use rusqlite::Connection;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::info;

/// Everything an export needs, resolved once per request.
struct ExportContext<'a> {
    conn: &'a Connection,
    dir: PathBuf,
    cfg: EngineConfig,
    now: NaiveDateTime,
}

impl<'a> ExportContext<'a> {
    fn load(state: &'a AppState, req: &Request) -> Result<Self, serde_json::Value> {
        let conn = db_conn(state, req)?;
        let ws: &Path = workspace(state, req)?;
        let cfg = engine_config(conn, req)?;
        let now = Local::now().naive_local();
        Ok(Self {
            conn,
            dir: export::export_dir(ws),
            cfg,
            now: now.with_nanosecond(0).unwrap_or(now),
        })
    }

    fn gateway(&self) -> SqliteGateway<'a> {
        SqliteGateway::new(self.conn)
    }

    fn write(&self, req: &Request, file_name: &str, contents: &[u8]) -> serde_json::Value {
        match export::write_export(&self.dir, file_name, contents) {
            Ok(file) => ok(&req.id, json!(file)),
            Err(e) => err(&req.id, "export_failed", format!("{e:?}"), None),
        }
    }
}

fn handle_exports_student(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    let format = match required_str(req, "format") {
        Ok(v) => v.to_ascii_lowercase(),
        Err(e) => return e,
    };
    if format != "csv" && format != "txt" {
        return err(
            &req.id,
            "bad_params",
            "format must be one of: csv, txt",
            Some(json!({ "format": format })),
        );
    }
    let ctx = match ExportContext::load(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };

    let gateway = ctx.gateway();
    let builder = ReportBuilder::new(&gateway, ctx.cfg.clone()).generated_at(ctx.now);
    let report = match builder.build_single(student_id, subject_id, &year) {
        Ok(r) => r,
        Err(e) => return engine_err(&req.id, &e),
    };

    let mut buf = Vec::new();
    let rendered = if format == "csv" {
        render::write_report_sheet(&report, &mut buf)
    } else {
        render::write_report_text(&report, &ctx.cfg.institution_name, &mut buf)
    };
    if let Err(e) = rendered {
        return engine_err(&req.id, &e);
    }

    let roll = report
        .roll_number()
        .map(str::to_string)
        .unwrap_or_else(|| student_id.to_string());
    let code = report
        .subject_code()
        .map(str::to_string)
        .unwrap_or_else(|| subject_id.to_string());
    let name = export::export_file_name("report", &roll, &code, ctx.now, &format);
    ctx.write(req, &name, &buf)
}

#[derive(Debug, Clone, Copy)]
enum TableScope {
    SubjectAttendance,
    SubjectMarks,
    StudentAll,
    AtRisk,
}

impl TableScope {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "subjectAttendance" => Some(Self::SubjectAttendance),
            "subjectMarks" => Some(Self::SubjectMarks),
            "studentAll" => Some(Self::StudentAll),
            "atRisk" => Some(Self::AtRisk),
            _ => None,
        }
    }

    fn file_kind(self) -> &'static str {
        match self {
            Self::SubjectAttendance => "attendance",
            Self::SubjectMarks => "marks",
            Self::StudentAll => "student",
            Self::AtRisk => "at-risk",
        }
    }
}

/// Stream the scope's reports into one table; nothing reaches disk unless
/// every row rendered.
fn build_table(
    builder: &ReportBuilder<'_, SqliteGateway<'_>>,
    scope: TableScope,
    id: i64,
    year: &str,
) -> Result<(ReportTable, String), EngineError> {
    let mut table = ReportTable::new()?;
    let gateway = builder.gateway();
    let label = match scope {
        TableScope::SubjectAttendance => {
            builder.for_each_subject_attendance(id, year, |r| table.push(&r))?;
            subject_label(gateway, id)?
        }
        TableScope::SubjectMarks => {
            builder.for_each_subject_marks(id, year, |r| table.push(&r))?;
            subject_label(gateway, id)?
        }
        TableScope::StudentAll => {
            builder.for_each_student_subject(id, year, |r| table.push(&r))?;
            gateway
                .fetch_student(id)?
                .map(|s| s.roll_number)
                .unwrap_or_else(|| id.to_string())
        }
        TableScope::AtRisk => {
            builder.for_each_at_risk(year, |r| table.push(&r))?;
            "all".to_string()
        }
    };
    Ok((table, label))
}

fn subject_label(gateway: &SqliteGateway<'_>, id: i64) -> Result<String, EngineError> {
    Ok(gateway
        .fetch_subject(id)?
        .map(|s| s.code)
        .unwrap_or_else(|| id.to_string()))
}

fn handle_exports_table(state: &mut AppState, req: &Request) -> serde_json::Value {
    let scope_raw = match required_str(req, "scope") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(scope) = TableScope::parse(&scope_raw) else {
        return err(
            &req.id,
            "bad_params",
            "scope must be one of: subjectAttendance, subjectMarks, studentAll, atRisk",
            Some(json!({ "scope": scope_raw })),
        );
    };
    let year = match academic_year(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let id = match scope {
        TableScope::SubjectAttendance | TableScope::SubjectMarks => {
            match required_i64(req, "subjectId") {
                Ok(v) => v,
                Err(e) => return e,
            }
        }
        TableScope::StudentAll => match required_i64(req, "studentId") {
            Ok(v) => v,
            Err(e) => return e,
        },
        TableScope::AtRisk => 0,
    };
    let ctx = match ExportContext::load(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };

    let gateway = ctx.gateway();
    let builder = ReportBuilder::new(&gateway, ctx.cfg.clone()).generated_at(ctx.now);
    let (table, label) = match build_table(&builder, scope, id, &year) {
        Ok(v) => v,
        Err(e) => return engine_err(&req.id, &e),
    };
    let rows = table.rows();
    let buf = match table.finish() {
        Ok(b) => b,
        Err(e) => return engine_err(&req.id, &e),
    };

    let name = export::export_file_name(scope.file_kind(), &label, &year, ctx.now, "csv");
    let mut resp = ctx.write(req, &name, &buf);
    if resp["ok"] == json!(true) {
        resp["result"]["rows"] = json!(rows);
    }
    resp
}

/// Raw stored rows of one subject, as opposed to the derived report tables.
fn handle_exports_records(state: &mut AppState, req: &Request) -> serde_json::Value {
    let kind = match required_str(req, "kind") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if kind != "attendance" && kind != "marks" {
        return err(
            &req.id,
            "bad_params",
            "kind must be one of: attendance, marks",
            Some(json!({ "kind": kind })),
        );
    }
    let subject_id = match required_i64(req, "subjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let year = match academic_year(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let ctx = match ExportContext::load(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };

    let gateway = ctx.gateway();
    let builder = ReportBuilder::new(&gateway, ctx.cfg.clone()).generated_at(ctx.now);
    let mut buf = Vec::new();
    let rendered = if kind == "attendance" {
        builder
            .attendance_records(subject_id, &year)
            .and_then(|records| render::write_attendance_records(&records, &mut buf))
    } else {
        builder
            .mark_records(subject_id, &year)
            .and_then(|records| render::write_mark_records(&records, &mut buf))
    };
    let rows = match rendered {
        Ok(n) => n,
        Err(e) => return engine_err(&req.id, &e),
    };
    let label = match subject_label(&gateway, subject_id) {
        Ok(l) => l,
        Err(e) => return engine_err(&req.id, &e),
    };

    let file_kind = format!("{}-records", kind);
    let name = export::export_file_name(&file_kind, &label, &year, ctx.now, "csv");
    let mut resp = ctx.write(req, &name, &buf);
    if resp["ok"] == json!(true) {
        resp["result"]["rows"] = json!(rows);
    }
    resp
}

fn handle_exports_daily_attendance(state: &mut AppState, req: &Request) -> serde_json::Value {
    let subject_id = match required_i64(req, "subjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let (from, to) = match date_range(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let ctx = match ExportContext::load(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };

    let gateway = ctx.gateway();
    let builder = ReportBuilder::new(&gateway, ctx.cfg.clone()).generated_at(ctx.now);
    let days = match builder.daily_attendance(subject_id, from, to) {
        Ok(d) => d,
        Err(e) => return engine_err(&req.id, &e),
    };
    let label = match subject_label(&gateway, subject_id) {
        Ok(l) => l,
        Err(e) => return engine_err(&req.id, &e),
    };
    let mut buf = Vec::new();
    if let Err(e) = render::write_daily_attendance_csv(&days, &mut buf) {
        return engine_err(&req.id, &e);
    }
    let range = format!("{}-to-{}", from.format("%Y%m%d"), to.format("%Y%m%d"));
    let name = export::export_file_name("daily-attendance", &label, &range, ctx.now, "csv");
    ctx.write(req, &name, &buf)
}

fn handle_exports_transcript(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match required_i64(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let year = match academic_year(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let ctx = match ExportContext::load(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };

    let gateway = ctx.gateway();
    let student = match gateway.fetch_student(student_id) {
        Ok(Some(s)) => s,
        Ok(None) => return engine_err(&req.id, &EngineError::not_found("student", student_id)),
        Err(e) => return engine_err(&req.id, &e),
    };
    let builder = ReportBuilder::new(&gateway, ctx.cfg.clone()).generated_at(ctx.now);
    let reports = match builder.build_student_all(student_id, &year) {
        Ok(r) => r,
        Err(e) => return engine_err(&req.id, &e),
    };

    let mut summary = Vec::new();
    if let Err(e) = render::write_report_table(&reports, &mut summary) {
        return engine_err(&req.id, &e);
    }
    let mut entries = Vec::with_capacity(reports.len());
    for r in &reports {
        let mut contents = Vec::new();
        if let Err(e) = render::write_report_text(r, &ctx.cfg.institution_name, &mut contents) {
            return engine_err(&req.id, &e);
        }
        let code = r
            .subject_code()
            .map(str::to_string)
            .unwrap_or_else(|| r.subject_id.to_string());
        entries.push(BundleEntry {
            name: format!("{}.txt", export::file_name_part(&code)),
            contents,
        });
    }

    let name = export::export_file_name("transcript", &student.roll_number, &year, ctx.now, "zip");
    let out_path = ctx.dir.join(&name);
    match bundle::write_transcript_bundle(&out_path, student_id, &year, &summary, &entries) {
        Ok(b) => {
            info!(path = %out_path.display(), entries = b.entry_count, "transcript bundle written");
            ok(
                &req.id,
                json!({
                    "path": out_path.to_string_lossy(),
                    "fileName": name,
                    "bundleId": b.bundle_id,
                    "bundleFormat": b.bundle_format,
                    "entryCount": b.entry_count,
                    "subjects": entries
                        .iter()
                        .map(|e| e.name.trim_end_matches(".txt"))
                        .collect::<Vec<_>>(),
                }),
            )
        }
        Err(e) => err(&req.id, "export_failed", format!("{e:?}"), None),
    }
}

fn handle_exports_cleanup(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(days) = req.params.get("olderThanDays").and_then(|v| v.as_u64()) else {
        return err(
            &req.id,
            "bad_params",
            "olderThanDays must be a non-negative integer",
            None,
        );
    };
    let ws = match workspace(state, req) {
        Ok(w) => w,
        Err(e) => return e,
    };
    match export::cleanup_old_exports(&export::export_dir(ws), days) {
        Ok(deleted) => ok(&req.id, json!({ "deleted": deleted })),
        Err(e) => err(&req.id, "export_failed", format!("{e:?}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "exports.student" => Some(handle_exports_student(state, req)),
        "exports.table" => Some(handle_exports_table(state, req)),
        "exports.records" => Some(handle_exports_records(state, req)),
        "exports.dailyAttendance" => Some(handle_exports_daily_attendance(state, req)),
        "exports.transcript" => Some(handle_exports_transcript(state, req)),
        "exports.cleanup" => Some(handle_exports_cleanup(state, req)),
        _ => None,
    }
}
