use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_workspace(prefix: &str) -> PathBuf {
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

fn spawn_sidecar(workspace: &Path) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_academicd");
    let mut child = Command::new(exe)
        .arg(workspace)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn academicd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
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

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn id_of(result: &serde_json::Value, key: &str) -> String {
    result
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_else(|| panic!("missing {} in {}", key, result))
        .to_string()
}

struct Fixture {
    offering_id: String,
    teacher_id: String,
    student_ids: Vec<String>,
}

fn seed(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    student_count: usize,
) -> Fixture {
    let college = request_ok(
        stdin,
        reader,
        "seed-college",
        "admin.collegeCreate",
        json!({ "name": "City Engineering College" }),
    );
    let college_id = id_of(&college, "collegeId");
    let dept = request_ok(
        stdin,
        reader,
        "seed-dept",
        "admin.departmentCreate",
        json!({ "collegeId": college_id, "name": "Computer Science" }),
    );
    let dept_id = id_of(&dept, "departmentId");
    let year = request_ok(
        stdin,
        reader,
        "seed-year",
        "admin.academicYearCreate",
        json!({ "collegeId": college_id, "yearLabel": "2024-25" }),
    );
    let year_id = id_of(&year, "academicYearId");
    let teacher = request_ok(
        stdin,
        reader,
        "seed-teacher",
        "admin.teacherCreate",
        json!({ "collegeId": college_id, "name": "Prof. Iyer" }),
    );
    let teacher_id = id_of(&teacher, "teacherId");
    let course = request_ok(
        stdin,
        reader,
        "seed-course",
        "admin.courseCreate",
        json!({ "code": "CS301", "departmentId": dept_id, "courseType": "core" }),
    );
    let course_id = id_of(&course, "courseId");
    let offering = request_ok(
        stdin,
        reader,
        "seed-offering",
        "offerings.findOrCreate",
        json!({ "courseId": course_id, "semester": 5, "academicYearId": year_id, "teacherId": teacher_id }),
    );
    let offering_id = id_of(&offering, "offeringId");

    let mut student_ids = Vec::new();
    for i in 0..student_count {
        let student = request_ok(
            stdin,
            reader,
            &format!("seed-s{}", i),
            "admin.studentCreate",
            json!({
                "enrollmentNo": format!("EN20220{:02}", i + 1),
                "name": format!("Student {}", i + 1),
                "collegeId": college_id,
                "departmentId": dept_id,
                "currentSemester": 5,
                "batchYear": 2022
            }),
        );
        student_ids.push(id_of(&student, "studentId"));
    }
    let _ = request_ok(
        stdin,
        reader,
        "seed-batch",
        "enroll.batch",
        json!({ "offeringId": offering_id, "studentIds": student_ids, "academicYearId": year_id }),
    );

    Fixture {
        offering_id,
        teacher_id,
        student_ids,
    }
}

#[test]
fn eager_fill_seeds_one_absent_record_per_enrolled_student() {
    let workspace = temp_workspace("academicd-eager-fill");
    let (_child, mut stdin, mut reader) = spawn_sidecar(&workspace);
    let fx = seed(&mut stdin, &mut reader, 5);

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "attendance.createSession",
        json!({
            "offeringId": fx.offering_id,
            "teacherId": fx.teacher_id,
            "classDate": "2025-01-06",
            "period": 2,
            "eagerFillEnrolled": true
        }),
    );
    assert_eq!(created.get("recordsSeeded").and_then(|v| v.as_i64()), Some(5));
    let session_id = created
        .get("session")
        .map(|s| id_of(s, "sessionId"))
        .expect("session");

    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "attendance.sessionOpen",
        json!({ "sessionId": session_id }),
    );
    let records = opened
        .get("records")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(records.len(), 5);
    assert!(records
        .iter()
        .all(|r| r.get("status").and_then(|v| v.as_str()) == Some("absent")));
}

#[test]
fn unmarked_deletes_the_record_and_duplicate_create_conflicts() {
    let workspace = temp_workspace("academicd-unmarked");
    let (_child, mut stdin, mut reader) = spawn_sidecar(&workspace);
    let fx = seed(&mut stdin, &mut reader, 2);

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "attendance.createSession",
        json!({
            "offeringId": fx.offering_id,
            "teacherId": fx.teacher_id,
            "classDate": "2025-01-06",
            "period": 1,
            "eagerFillEnrolled": false
        }),
    );
    let session_id = created
        .get("session")
        .map(|s| id_of(s, "sessionId"))
        .expect("session");

    // Creating the same (offering, date, period, teacher) again is a caller
    // mistake, not an idempotent no-op.
    let dupe = request(
        &mut stdin,
        &mut reader,
        "2",
        "attendance.createSession",
        json!({
            "offeringId": fx.offering_id,
            "teacherId": fx.teacher_id,
            "classDate": "2025-01-06",
            "period": 1
        }),
    );
    assert_eq!(dupe.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        dupe.get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str()),
        Some("conflict")
    );

    let set = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "attendance.setStatus",
        json!({ "sessionId": session_id, "studentId": fx.student_ids[0], "status": "present" }),
    );
    assert_eq!(
        set.get("record")
            .and_then(|r| r.get("status"))
            .and_then(|v| v.as_str()),
        Some("present")
    );

    // Re-setting the same pair updates in place rather than adding a row.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "attendance.setStatus",
        json!({ "sessionId": session_id, "studentId": fx.student_ids[0], "status": "absent" }),
    );
    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "attendance.sessionOpen",
        json!({ "sessionId": session_id }),
    );
    let records = opened
        .get("records")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].get("status").and_then(|v| v.as_str()),
        Some("absent")
    );

    // Unmarked removes the row entirely; a later read has no record at all.
    let cleared = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "attendance.setStatus",
        json!({ "sessionId": session_id, "studentId": fx.student_ids[0], "status": "unmarked" }),
    );
    assert!(cleared.get("record").map(|v| v.is_null()).unwrap_or(true));
    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "attendance.sessionOpen",
        json!({ "sessionId": session_id }),
    );
    let records = opened
        .get("records")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert!(records.is_empty());

    // A student with no enrollment in the offering cannot be marked.
    let stray = request(
        &mut stdin,
        &mut reader,
        "8",
        "attendance.setStatus",
        json!({ "sessionId": session_id, "studentId": "no-such-student", "status": "present" }),
    );
    assert_eq!(
        stray
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str()),
        Some("enrollment_not_found")
    );
}

#[test]
fn only_held_and_confirmed_sessions_count_toward_summary() {
    let workspace = temp_workspace("academicd-summary-gating");
    let (_child, mut stdin, mut reader) = spawn_sidecar(&workspace);
    let fx = seed(&mut stdin, &mut reader, 2);

    let mut session_ids = Vec::new();
    for (i, date) in ["2025-01-06", "2025-01-07", "2025-01-08"].iter().enumerate() {
        let created = request_ok(
            &mut stdin,
            &mut reader,
            &format!("c{}", i),
            "attendance.createSession",
            json!({
                "offeringId": fx.offering_id,
                "teacherId": fx.teacher_id,
                "classDate": date,
                "period": 1,
                "eagerFillEnrolled": true
            }),
        );
        session_ids.push(created.get("session").map(|s| id_of(s, "sessionId")).expect("session"));
    }

    // Student 0 present in all three sessions; student 1 absent throughout.
    for (i, session_id) in session_ids.iter().enumerate() {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("p{}", i),
            "attendance.setStatus",
            json!({ "sessionId": session_id, "studentId": fx.student_ids[0], "status": "present" }),
        );
    }

    // Cancel the third class; it must drop out of every total.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "cancel",
        "attendance.setSessionStatus",
        json!({ "sessionId": session_ids[2], "status": "cancelled" }),
    );
    // Confirm the first; confirmed still counts.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "confirm",
        "attendance.setSessionStatus",
        json!({ "sessionId": session_ids[0], "status": "confirmed" }),
    );

    let summary = request_ok(
        &mut stdin,
        &mut reader,
        "sum",
        "attendance.offeringSummary",
        json!({ "offeringId": fx.offering_id }),
    );
    assert_eq!(
        summary.get("classesCompleted").and_then(|v| v.as_i64()),
        Some(2)
    );
    let per_student = summary
        .get("perStudent")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(per_student.len(), 2);
    assert_eq!(
        per_student[0].get("present").and_then(|v| v.as_i64()),
        Some(2)
    );
    assert_eq!(
        per_student[0].get("percent").and_then(|v| v.as_f64()),
        Some(100.0)
    );
    assert_eq!(
        per_student[1].get("present").and_then(|v| v.as_i64()),
        Some(0)
    );
    assert_eq!(
        summary.get("averagePercent").and_then(|v| v.as_f64()),
        Some(50.0)
    );
}
