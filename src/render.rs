//! Report renderers. Every writer formats into memory first and hands the
//! sink one complete buffer, so a failed render never leaves partial output.

use crate::calc::{round_off_2_decimal, DailyAttendance};
use crate::error::EngineError;
use crate::grade::{Grade, PerformanceLevel};
use crate::report::{AttendanceRecord, MarkRecord, Report, ReportKind};
use crate::risk::RiskLevel;
use csv::{QuoteStyle, Terminator, WriterBuilder};
use serde::Serialize;
use std::io::Write;

pub const TABLE_HEADER: [&str; 11] = [
    "Roll Number",
    "Student Name",
    "Subject",
    "Attendance %",
    "Total Classes",
    "Classes Attended",
    "Overall Marks %",
    "Grade",
    "Performance Level",
    "At Risk",
    "Risk Level",
];

pub const DAILY_HEADER: [&str; 6] = [
    "Date",
    "Total Students",
    "Present",
    "Absent",
    "Late",
    "Attendance Percentage",
];

pub const ATTENDANCE_RECORD_HEADER: [&str; 7] = [
    "Date",
    "Roll Number",
    "Student Name",
    "Subject",
    "Status",
    "Remarks",
    "Marked By",
];

pub const MARK_RECORD_HEADER: [&str; 9] = [
    "Roll Number",
    "Student Name",
    "Subject",
    "Assessment Type",
    "Marks Obtained",
    "Max Marks",
    "Percentage",
    "Grade",
    "Date",
];

const TEXT_WIDTH: usize = 59;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentObject {
    #[serde(rename = "type")]
    pub type_name: String,
    pub marks_obtained: f64,
    pub max_marks: f64,
    pub percentage: f64,
    pub grade: Grade,
    pub weightage: f64,
}

/// The report as it crosses the JSON boundary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportObject {
    pub report_type: ReportKind,
    pub student_name: Option<String>,
    pub roll_number: Option<String>,
    pub email: Option<String>,
    pub semester: Option<i64>,
    pub subject_name: Option<String>,
    pub subject_code: Option<String>,
    pub credits: Option<i64>,
    pub academic_year: String,
    pub total_classes: usize,
    pub classes_attended: usize,
    pub classes_absent: usize,
    pub classes_late: usize,
    pub classes_excused: usize,
    pub attendance_percentage: f64,
    pub total_marks_obtained: f64,
    pub total_max_marks: f64,
    pub overall_percentage: f64,
    pub overall_grade: Option<Grade>,
    pub performance_level: Option<PerformanceLevel>,
    pub weighted_score: f64,
    pub assessments: Vec<AssessmentObject>,
    pub is_at_risk: bool,
    pub risk_level: Option<RiskLevel>,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub recommendations: Vec<String>,
}

pub fn report_object(r: &Report) -> ReportObject {
    let student = r.student.as_ref();
    let subject = r.subject.as_ref();
    let att = r.attendance.unwrap_or_default();
    let marks = r.marks.as_ref();
    ReportObject {
        report_type: r.kind,
        student_name: student.map(|s| s.full_name.clone()),
        roll_number: student.map(|s| s.roll_number.clone()),
        email: student.and_then(|s| s.email.clone()),
        semester: student.and_then(|s| s.semester),
        subject_name: subject.map(|s| s.name.clone()),
        subject_code: subject.map(|s| s.code.clone()),
        credits: subject.and_then(|s| s.credits),
        academic_year: r.academic_year.clone(),
        total_classes: att.total,
        classes_attended: att.attended,
        classes_absent: att.absent,
        classes_late: att.late,
        classes_excused: att.excused,
        attendance_percentage: round_off_2_decimal(r.attendance_percentage()),
        total_marks_obtained: round_off_2_decimal(marks.map(|m| m.total_obtained).unwrap_or(0.0)),
        total_max_marks: round_off_2_decimal(marks.map(|m| m.total_max).unwrap_or(0.0)),
        overall_percentage: round_off_2_decimal(r.marks_percentage()),
        overall_grade: r.grade(),
        performance_level: r.performance_level,
        weighted_score: round_off_2_decimal(marks.map(|m| m.weighted_score).unwrap_or(0.0)),
        assessments: r
            .assessments
            .iter()
            .map(|a| AssessmentObject {
                type_name: a.type_name.clone(),
                marks_obtained: round_off_2_decimal(a.obtained),
                max_marks: round_off_2_decimal(a.max),
                percentage: round_off_2_decimal(a.percentage),
                grade: a.grade,
                weightage: round_off_2_decimal(a.weightage),
            })
            .collect(),
        is_at_risk: r.risk.map(|x| x.at_risk).unwrap_or(false),
        risk_level: r.risk.map(|x| x.level),
        strengths: r.strengths.clone(),
        weaknesses: r.weaknesses.clone(),
        recommendations: r.recommendations.clone(),
    }
}

fn pct(x: f64) -> String {
    format!("{:.2}", round_off_2_decimal(x))
}

fn yes_no(b: bool) -> &'static str {
    if b {
        "Yes"
    } else {
        "No"
    }
}

/// Free text inside a delimited row: no field separators, no line breaks.
fn clean_field(s: &str) -> String {
    s.replace(',', ";").replace(['\r', '\n'], " ")
}

fn clean_opt(s: Option<&str>) -> String {
    s.map(clean_field).unwrap_or_default()
}

/// Row-CSV accumulator for bulk exports. Rows are buffered until
/// [`ReportTable::finish`], which is what makes the write all-or-nothing.
pub struct ReportTable {
    writer: csv::Writer<Vec<u8>>,
    rows: usize,
}

fn row_writer() -> csv::Writer<Vec<u8>> {
    WriterBuilder::new()
        .quote_style(QuoteStyle::Never)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new())
}

fn finish_rows(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>, EngineError> {
    writer
        .into_inner()
        .map_err(|e| EngineError::Render(e.into_error()))
}

impl ReportTable {
    pub fn new() -> Result<Self, EngineError> {
        let mut writer = row_writer();
        writer.write_record(TABLE_HEADER)?;
        Ok(Self { writer, rows: 0 })
    }

    pub fn push(&mut self, r: &Report) -> Result<(), EngineError> {
        let att = r.attendance.unwrap_or_default();
        let student = r.student.as_ref();
        self.writer.write_record([
            clean_opt(r.roll_number()),
            clean_opt(student.map(|s| s.full_name.as_str())),
            clean_opt(r.subject_code()),
            pct(r.attendance_percentage()),
            att.total.to_string(),
            att.attended.to_string(),
            pct(r.marks_percentage()),
            r.grade().map(|g| g.as_str().to_string()).unwrap_or_default(),
            r.performance_level
                .map(|p| p.as_str().to_string())
                .unwrap_or_default(),
            yes_no(r.risk.map(|x| x.at_risk).unwrap_or(false)).to_string(),
            r.risk.map(|x| x.level.as_str().to_string()).unwrap_or_default(),
        ])?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn finish(self) -> Result<Vec<u8>, EngineError> {
        finish_rows(self.writer)
    }
}

pub fn write_report_table<'a, W, I>(reports: I, sink: &mut W) -> Result<usize, EngineError>
where
    W: Write + ?Sized,
    I: IntoIterator<Item = &'a Report>,
{
    let mut table = ReportTable::new()?;
    for r in reports {
        table.push(r)?;
    }
    let rows = table.rows();
    sink.write_all(&table.finish()?)?;
    Ok(rows)
}

pub fn write_daily_attendance_csv<W: Write + ?Sized>(
    days: &[DailyAttendance],
    sink: &mut W,
) -> Result<(), EngineError> {
    let mut writer = row_writer();
    writer.write_record(DAILY_HEADER)?;
    for d in days {
        writer.write_record([
            d.date.format("%Y-%m-%d").to_string(),
            d.total_students.to_string(),
            d.present.to_string(),
            d.absent.to_string(),
            d.late.to_string(),
            format!("{}%", pct(d.percentage)),
        ])?;
    }
    sink.write_all(&finish_rows(writer)?)?;
    Ok(())
}

/// Raw attendance rows, one line per stored event. Returns the row count.
pub fn write_attendance_records<W: Write + ?Sized>(
    records: &[AttendanceRecord],
    sink: &mut W,
) -> Result<usize, EngineError> {
    let mut writer = row_writer();
    writer.write_record(ATTENDANCE_RECORD_HEADER)?;
    for r in records {
        writer.write_record([
            r.event.date.format("%Y-%m-%d").to_string(),
            clean_field(&r.student.roll_number),
            clean_field(&r.student.full_name),
            clean_field(&r.subject_code),
            r.event.status.as_str().to_string(),
            clean_opt(r.event.remarks.as_deref()),
            clean_opt(r.marked_by_name.as_deref()),
        ])?;
    }
    sink.write_all(&finish_rows(writer)?)?;
    Ok(records.len())
}

/// Raw mark rows with each row's own percentage and grade.
pub fn write_mark_records<W: Write + ?Sized>(
    records: &[MarkRecord],
    sink: &mut W,
) -> Result<usize, EngineError> {
    let mut writer = row_writer();
    writer.write_record(MARK_RECORD_HEADER)?;
    for r in records {
        let a = &r.assessment;
        writer.write_record([
            clean_field(&r.student.roll_number),
            clean_field(&r.student.full_name),
            clean_field(&r.subject_code),
            clean_field(&a.type_name),
            format!("{:.2}", a.obtained),
            format!("{:.2}", a.max),
            format!("{}%", pct(a.percentage)),
            a.grade.as_str().to_string(),
            a.assessment_date.format("%Y-%m-%d").to_string(),
        ])?;
    }
    sink.write_all(&finish_rows(writer)?)?;
    Ok(records.len())
}

fn opt_num(v: Option<i64>) -> String {
    v.map(|n| n.to_string()).unwrap_or_default()
}

/// Sectioned key/value CSV for one report.
pub fn write_report_sheet<W: Write + ?Sized>(r: &Report, sink: &mut W) -> Result<(), EngineError> {
    let o = report_object(r);
    let mut buf: Vec<u8> = Vec::new();
    let s = |v: &Option<String>| v.as_deref().map(clean_field).unwrap_or_default();

    writeln!(buf, "STUDENT PERFORMANCE REPORT")?;
    writeln!(buf)?;
    writeln!(buf, "Student Information")?;
    writeln!(buf, "Name,{}", s(&o.student_name))?;
    writeln!(buf, "Roll Number,{}", s(&o.roll_number))?;
    writeln!(buf, "Email,{}", s(&o.email))?;
    writeln!(buf, "Semester,{}", opt_num(o.semester))?;
    writeln!(buf)?;

    writeln!(buf, "Subject Information")?;
    writeln!(buf, "Subject,{}", s(&o.subject_name))?;
    writeln!(buf, "Subject Code,{}", s(&o.subject_code))?;
    writeln!(buf, "Credits,{}", opt_num(o.credits))?;
    writeln!(buf, "Academic Year,{}", clean_field(&o.academic_year))?;
    writeln!(buf)?;

    writeln!(buf, "Attendance Statistics")?;
    writeln!(buf, "Total Classes,{}", o.total_classes)?;
    writeln!(buf, "Classes Attended,{}", o.classes_attended)?;
    writeln!(buf, "Classes Absent,{}", o.classes_absent)?;
    writeln!(buf, "Classes Late,{}", o.classes_late)?;
    writeln!(buf, "Classes Excused,{}", o.classes_excused)?;
    writeln!(buf, "Attendance Percentage,{}%", pct(o.attendance_percentage))?;
    writeln!(buf)?;

    writeln!(buf, "Marks Statistics")?;
    writeln!(buf, "Total Marks Obtained,{}", pct(o.total_marks_obtained))?;
    writeln!(buf, "Total Max Marks,{}", pct(o.total_max_marks))?;
    writeln!(buf, "Overall Percentage,{}%", pct(o.overall_percentage))?;
    writeln!(
        buf,
        "Overall Grade,{}",
        o.overall_grade.map(|g| g.as_str()).unwrap_or("")
    )?;
    writeln!(
        buf,
        "Performance Level,{}",
        o.performance_level.map(|p| p.as_str()).unwrap_or("")
    )?;
    writeln!(buf, "Weighted Score,{}", pct(o.weighted_score))?;
    writeln!(buf)?;

    if !o.assessments.is_empty() {
        writeln!(buf, "Assessment-wise Performance")?;
        writeln!(buf, "Assessment Type,Marks Obtained,Max Marks,Percentage,Grade,Weightage")?;
        for a in &o.assessments {
            writeln!(
                buf,
                "{},{},{},{}%,{},{}%",
                clean_field(&a.type_name),
                pct(a.marks_obtained),
                pct(a.max_marks),
                pct(a.percentage),
                a.grade,
                pct(a.weightage)
            )?;
        }
        writeln!(buf)?;
    }

    writeln!(buf, "Risk Analysis")?;
    writeln!(buf, "At Risk,{}", yes_no(o.is_at_risk))?;
    writeln!(
        buf,
        "Risk Level,{}",
        o.risk_level.map(|l| l.as_str()).unwrap_or("")
    )?;

    for (title, items) in [
        ("Strengths", &o.strengths),
        ("Areas for Improvement", &o.weaknesses),
        ("Recommendations", &o.recommendations),
    ] {
        if items.is_empty() {
            continue;
        }
        writeln!(buf)?;
        writeln!(buf, "{}", title)?;
        for item in items {
            writeln!(buf, "- {}", clean_field(item))?;
        }
    }

    sink.write_all(&buf)?;
    Ok(())
}

fn section(buf: &mut Vec<u8>, title: &str) -> std::io::Result<()> {
    writeln!(buf, "{}", title)?;
    writeln!(buf, "{}", "─".repeat(TEXT_WIDTH))
}

fn centered(buf: &mut Vec<u8>, text: &str) -> std::io::Result<()> {
    let pad = TEXT_WIDTH.saturating_sub(text.chars().count()) / 2;
    writeln!(buf, "{}{}", " ".repeat(pad), text)
}

/// Human-readable report. The first four sections are always present;
/// assessment, risk and insight sections appear only when they have content.
pub fn write_report_text<W: Write + ?Sized>(
    r: &Report,
    institution: &str,
    sink: &mut W,
) -> Result<(), EngineError> {
    let o = report_object(r);
    let heavy = "═".repeat(TEXT_WIDTH);
    let s = |v: &Option<String>| v.clone().unwrap_or_default();
    let mut buf: Vec<u8> = Vec::new();

    writeln!(buf, "{}", heavy)?;
    centered(&mut buf, "STUDENT PERFORMANCE REPORT")?;
    if !institution.trim().is_empty() {
        centered(&mut buf, institution.trim())?;
    }
    writeln!(buf, "{}", heavy)?;
    writeln!(buf)?;

    section(&mut buf, "STUDENT INFORMATION")?;
    writeln!(buf, "Name           : {}", s(&o.student_name))?;
    writeln!(buf, "Roll Number    : {}", s(&o.roll_number))?;
    writeln!(buf, "Email          : {}", s(&o.email))?;
    writeln!(buf, "Semester       : {}", opt_num(o.semester))?;
    writeln!(buf)?;

    section(&mut buf, "SUBJECT INFORMATION")?;
    writeln!(buf, "Subject        : {}", s(&o.subject_name))?;
    writeln!(buf, "Subject Code   : {}", s(&o.subject_code))?;
    writeln!(buf, "Credits        : {}", opt_num(o.credits))?;
    writeln!(buf, "Academic Year  : {}", o.academic_year)?;
    writeln!(buf)?;

    section(&mut buf, "ATTENDANCE STATISTICS")?;
    writeln!(buf, "Total Classes       : {}", o.total_classes)?;
    writeln!(buf, "Classes Attended    : {}", o.classes_attended)?;
    writeln!(buf, "Classes Absent      : {}", o.classes_absent)?;
    writeln!(buf, "Classes Late        : {}", o.classes_late)?;
    writeln!(buf, "Classes Excused     : {}", o.classes_excused)?;
    writeln!(buf, "Attendance %        : {}%", pct(o.attendance_percentage))?;
    writeln!(buf)?;

    section(&mut buf, "MARKS STATISTICS")?;
    writeln!(buf, "Total Marks Obtained : {}", pct(o.total_marks_obtained))?;
    writeln!(buf, "Total Max Marks      : {}", pct(o.total_max_marks))?;
    writeln!(buf, "Overall Percentage   : {}%", pct(o.overall_percentage))?;
    writeln!(
        buf,
        "Overall Grade        : {}",
        o.overall_grade.map(|g| g.as_str()).unwrap_or("")
    )?;
    writeln!(
        buf,
        "Performance Level    : {}",
        o.performance_level.map(|p| p.as_str()).unwrap_or("")
    )?;
    writeln!(buf)?;

    if !o.assessments.is_empty() {
        section(&mut buf, "ASSESSMENT-WISE PERFORMANCE")?;
        writeln!(
            buf,
            "{:<20} {:<10} {:<10} {:<12} {:<8}",
            "Assessment", "Obtained", "Max", "Percentage", "Grade"
        )?;
        writeln!(buf, "{}", "─".repeat(TEXT_WIDTH))?;
        for a in &o.assessments {
            writeln!(
                buf,
                "{:<20} {:<10.2} {:<10.2} {:<12.2}% {:<8}",
                a.type_name,
                a.marks_obtained,
                a.max_marks,
                a.percentage,
                a.grade.as_str()
            )?;
        }
        writeln!(buf)?;
    }

    if let Some(level) = o.risk_level {
        section(&mut buf, "RISK ANALYSIS")?;
        writeln!(buf, "At Risk        : {}", yes_no(o.is_at_risk))?;
        writeln!(buf, "Risk Level     : {}", level)?;
        writeln!(buf)?;
    }

    for (title, items) in [
        ("STRENGTHS", &o.strengths),
        ("AREAS FOR IMPROVEMENT", &o.weaknesses),
        ("RECOMMENDATIONS", &o.recommendations),
    ] {
        if items.is_empty() {
            continue;
        }
        section(&mut buf, title)?;
        for item in items {
            writeln!(buf, "• {}", item)?;
        }
        writeln!(buf)?;
    }

    writeln!(buf, "{}", heavy)?;
    writeln!(
        buf,
        "Generated on: {}",
        r.generated_at.format("%d-%b-%Y %H:%M:%S")
    )?;
    writeln!(buf, "{}", heavy)?;

    sink.write_all(&buf)?;
    Ok(())
}
