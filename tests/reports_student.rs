mod test_support;

use serde_json::json;
use test_support::{open_seeded, request_ok, CS101, CS201, R01, R02, R03, YEAR};

fn approx(v: &serde_json::Value, want: f64) -> bool {
    v.as_f64().map(|x| (x - want).abs() < 1e-6).unwrap_or(false)
}

#[test]
fn student_report_combines_attendance_marks_and_risk() {
    let (_ws, _child, mut stdin, mut reader) = open_seeded("attendease-reports-student");

    let r = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "reports.student",
        json!({ "studentId": R01, "subjectId": CS201, "academicYear": YEAR }),
    );
    assert_eq!(r["reportType"], "COMPREHENSIVE");
    assert_eq!(r["studentName"], "Asha Rao");
    assert_eq!(r["rollNumber"], "R01");
    assert_eq!(r["subjectCode"], "CS201");
    assert_eq!(r["totalClasses"], 4);
    assert_eq!(r["classesAttended"], 4);
    assert!(approx(&r["attendancePercentage"], 100.0));
    assert!(approx(&r["totalMarksObtained"], 94.0));
    assert!(approx(&r["totalMaxMarks"], 110.0));
    assert!(approx(&r["overallPercentage"], 85.45));
    assert_eq!(r["overallGrade"], "A+");
    assert_eq!(r["isAtRisk"], false);
    assert_eq!(r["riskLevel"], "NONE");
    assert_eq!(r["assessments"].as_array().map(|a| a.len()), Some(2));
    assert_eq!(r["assessments"][0]["type"], "Quiz");

    let low = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "reports.student",
        json!({ "studentId": R02, "subjectId": CS201, "academicYear": YEAR }),
    );
    assert!(approx(&low["attendancePercentage"], 25.0));
    assert_eq!(low["isAtRisk"], true);
    assert_eq!(low["riskLevel"], "MEDIUM");
    assert!(low["weaknesses"]
        .as_array()
        .expect("weaknesses")
        .iter()
        .any(|w| w == "Low attendance - below 75% threshold"));

    let failing = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "reports.student",
        json!({ "studentId": R03, "subjectId": CS201, "academicYear": YEAR }),
    );
    assert_eq!(failing["riskLevel"], "HIGH");
    assert_eq!(failing["overallGrade"], "F");
}

#[test]
fn missing_enrollment_yields_an_empty_report() {
    let (_ws, _child, mut stdin, mut reader) = open_seeded("attendease-reports-empty");

    let r = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "reports.student",
        json!({ "studentId": R02, "subjectId": CS101, "academicYear": YEAR }),
    );
    assert_eq!(r["rollNumber"], "R02");
    assert_eq!(r["subjectCode"], "CS101");
    assert_eq!(r["totalClasses"], 0);
    assert!(approx(&r["attendancePercentage"], 0.0));
    assert_eq!(r["isAtRisk"], false);
    assert!(r["riskLevel"].is_null());
    assert_eq!(r["assessments"], json!([]));

    let other_year = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "reports.student",
        json!({ "studentId": R01, "subjectId": CS201, "academicYear": "2023-2024" }),
    );
    assert_eq!(other_year["totalClasses"], 0);
}

#[test]
fn student_all_lists_subjects_by_code() {
    let (_ws, _child, mut stdin, mut reader) = open_seeded("attendease-reports-student-all");

    let res = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "reports.studentAll",
        json!({ "studentId": R01, "academicYear": YEAR }),
    );
    assert_eq!(res["count"], 2);
    let codes: Vec<&str> = res["reports"]
        .as_array()
        .expect("reports")
        .iter()
        .filter_map(|r| r["subjectCode"].as_str())
        .collect();
    assert_eq!(codes, vec!["CS101", "CS201"]);
    // CS101 has attendance but no marks yet.
    assert_eq!(res["reports"][0]["totalClasses"], 2);
    assert_eq!(res["reports"][0]["assessments"], json!([]));
}
