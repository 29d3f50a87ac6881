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

fn seed_enrollment(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>) -> String {
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
    let course = request_ok(
        stdin,
        reader,
        "seed-course",
        "admin.courseCreate",
        json!({ "code": "CS301", "departmentId": dept_id, "courseType": "core", "hasLab": true }),
    );
    let course_id = id_of(&course, "courseId");
    let student = request_ok(
        stdin,
        reader,
        "seed-student",
        "admin.studentCreate",
        json!({
            "enrollmentNo": "EN2022001",
            "name": "Asha Rao",
            "collegeId": college_id,
            "departmentId": dept_id,
            "currentSemester": 5,
            "batchYear": 2022
        }),
    );
    let student_id = id_of(&student, "studentId");
    let offering = request_ok(
        stdin,
        reader,
        "seed-offering",
        "offerings.findOrCreate",
        json!({ "courseId": course_id, "semester": 5, "academicYearId": year_id }),
    );
    let offering_id = id_of(&offering, "offeringId");
    let enrolled = request_ok(
        stdin,
        reader,
        "seed-enroll",
        "enroll.student",
        json!({ "studentId": student_id, "offeringId": offering_id, "academicYearId": year_id }),
    );
    enrolled
        .get("enrollment")
        .map(|e| id_of(e, "enrollmentId"))
        .expect("enrollmentId")
}

fn theory(result: &serde_json::Value) -> serde_json::Value {
    result.get("theory").cloned().expect("theory component")
}

#[test]
fn mse3_is_forced_null_once_first_two_midterms_reach_twenty() {
    let workspace = temp_workspace("academicd-mse3");
    let (_child, mut stdin, mut reader) = spawn_sidecar(&workspace);
    let enrollment_id = seed_enrollment(&mut stdin, &mut reader);

    // Below the ceiling the supplied MSE3 is kept.
    let below = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "marks.upsert",
        json!({ "enrollmentId": enrollment_id, "mse1": 9.0, "mse2": 8.0, "mse3": 14.0 }),
    );
    assert_eq!(
        theory(&below).get("mse3").and_then(|v| v.as_f64()),
        Some(14.0)
    );

    // Raising MSE2 so that mse1 + mse2 hits the ceiling clears MSE3 even
    // though this request supplies a value for it.
    let at_ceiling = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "marks.upsert",
        json!({ "enrollmentId": enrollment_id, "mse2": 11.0, "mse3": 15.0 }),
    );
    let t = theory(&at_ceiling);
    assert_eq!(t.get("mse1").and_then(|v| v.as_f64()), Some(9.0));
    assert_eq!(t.get("mse2").and_then(|v| v.as_f64()), Some(11.0));
    assert!(
        t.get("mse3").map(|v| v.is_null()).unwrap_or(false),
        "mse3 must be null at the ceiling; got {}",
        t
    );

    // Persisted state agrees with the write response.
    let read_back = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "marks.get",
        json!({ "enrollmentId": enrollment_id }),
    );
    assert!(theory(&read_back)
        .get("mse3")
        .map(|v| v.is_null())
        .unwrap_or(false));
}

#[test]
fn partial_updates_overlay_without_touching_other_fields() {
    let workspace = temp_workspace("academicd-marks-overlay");
    let (_child, mut stdin, mut reader) = spawn_sidecar(&workspace);
    let enrollment_id = seed_enrollment(&mut stdin, &mut reader);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "marks.upsert",
        json!({ "enrollmentId": enrollment_id, "mse1": 7.0, "ta": 6.5 }),
    );
    // A later request touching only mse2 keeps mse1 and ta as stored.
    let merged = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "marks.upsert",
        json!({ "enrollmentId": enrollment_id, "mse2": 5.0 }),
    );
    let t = theory(&merged);
    assert_eq!(t.get("mse1").and_then(|v| v.as_f64()), Some(7.0));
    assert_eq!(t.get("mse2").and_then(|v| v.as_f64()), Some(5.0));
    assert_eq!(t.get("ta").and_then(|v| v.as_f64()), Some(6.5));
    assert!(t.get("updatedAt").and_then(|v| v.as_str()).is_some());

    // One request may carry both components; lab fields route to the lab row.
    let both = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "marks.upsert",
        json!({ "enrollmentId": enrollment_id, "mse3": 2.0, "ca": 22.0, "ese": 11.0 }),
    );
    let lab = both.get("lab").cloned().expect("lab component");
    assert_eq!(lab.get("total").and_then(|v| v.as_f64()), Some(33.0));
    assert_eq!(lab.get("passing").and_then(|v| v.as_bool()), Some(true));
    // Theory total 7 + 5 + 2 + 6.5 = 20.5, below the pass threshold.
    let t = theory(&both);
    assert_eq!(t.get("passing").and_then(|v| v.as_bool()), Some(false));
}

#[test]
fn marks_against_unknown_enrollment_fail_typed() {
    let workspace = temp_workspace("academicd-marks-missing");
    let (_child, mut stdin, mut reader) = spawn_sidecar(&workspace);

    let value = request(
        &mut stdin,
        &mut reader,
        "1",
        "marks.upsert",
        json!({ "enrollmentId": "no-such-enrollment", "mse1": 5.0 }),
    );
    assert_eq!(value.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str()),
        Some("enrollment_not_found")
    );
}
