use rusqlite::Connection;
use serde_json::json;

use crate::engine::enrollment::{self, BatchSummary, Enrollment};
use crate::ipc::error::{respond, HandlerError};
use crate::ipc::helpers::{required_i64, required_str, required_str_list};
use crate::ipc::types::{AppState, Request};

type HandlerResult = Result<serde_json::Value, HandlerError>;

fn enrollment_json(e: &Enrollment) -> serde_json::Value {
    json!({
        "enrollmentId": e.id,
        "studentId": e.student_id,
        "offeringId": e.offering_id,
        "academicYearId": e.academic_year_id,
        "attempt": e.attempt,
    })
}

fn batch_json(summary: &BatchSummary) -> serde_json::Value {
    json!({
        "enrolled": summary.enrolled,
        "alreadyEnrolled": summary.already_enrolled,
        "errors": summary.errors,
        "perStudentResults": summary.results.iter().map(|item| {
            json!({
                "studentId": item.student_id,
                "status": item.status,
                "enrollmentId": item.enrollment_id,
                "detail": item.detail,
            })
        }).collect::<Vec<_>>(),
    })
}

fn enroll_student(conn: &Connection, params: &serde_json::Value) -> HandlerResult {
    let student_id = required_str(params, "studentId")?;
    let offering_id = required_str(params, "offeringId")?;
    let academic_year_id = required_str(params, "academicYearId")?;
    let outcome = enrollment::enroll_student(conn, &student_id, &offering_id, &academic_year_id)?;
    Ok(json!({
        "status": outcome.status(),
        "enrollment": enrollment_json(outcome.enrollment()),
    }))
}

fn enroll_batch(conn: &Connection, params: &serde_json::Value) -> HandlerResult {
    let offering_id = required_str(params, "offeringId")?;
    let student_ids = required_str_list(params, "studentIds")?;
    let academic_year_id = required_str(params, "academicYearId")?;
    let summary = enrollment::enroll_batch(conn, &offering_id, &student_ids, &academic_year_id)?;
    Ok(batch_json(&summary))
}

fn roster(conn: &Connection, params: &serde_json::Value) -> HandlerResult {
    let offering_id = required_str(params, "offeringId")?;
    let rows = enrollment::roster(conn, &offering_id)?;
    Ok(json!({
        "enrollments": rows.iter().map(enrollment_json).collect::<Vec<_>>()
    }))
}

fn promote_semester(conn: &Connection, params: &serde_json::Value) -> HandlerResult {
    let department_id = required_str(params, "departmentId")?;
    let from_semester = required_i64(params, "fromSemester")?;
    let academic_year_id = required_str(params, "academicYearId")?;
    let summary =
        enrollment::promote_semester(conn, &department_id, from_semester, &academic_year_id)?;
    Ok(json!({
        "promoted": summary.promoted,
        "skipped": summary.skipped,
        "items": summary.items.iter().map(|item| {
            json!({
                "studentId": item.student_id,
                "newSemester": item.new_semester,
                "enrollment": batch_json(&item.batch),
            })
        }).collect::<Vec<_>>(),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let conn = &state.db;
    let result = match req.method.as_str() {
        "enroll.student" => enroll_student(conn, &req.params),
        "enroll.batch" => enroll_batch(conn, &req.params),
        "enroll.roster" => roster(conn, &req.params),
        "enroll.promoteSemester" => promote_semester(conn, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
