use rusqlite::Connection;
use serde_json::json;

use crate::engine::calendar;
use crate::ipc::error::{respond, HandlerError};
use crate::ipc::helpers::{opt_str, required_i64, required_str};
use crate::ipc::types::{AppState, Request};
use crate::engine::offerings::{semester_to_year, Offering};

pub fn offering_json(o: &Offering) -> serde_json::Value {
    json!({
        "offeringId": o.id,
        "courseId": o.course_id,
        "courseCode": o.course_code,
        "semester": o.semester,
        "yearOfStudy": semester_to_year(o.semester),
        "academicYearId": o.academic_year_id,
        "sectionId": o.section_id,
        "teacherId": o.teacher_id,
    })
}

fn resolve_offerings(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerError> {
    let college_id = required_str(params, "collegeId")?;
    let department_id = required_str(params, "departmentId")?;
    let semester = required_i64(params, "semester")?;
    let explicit_year = opt_str(params, "academicYearId");

    let resolved = calendar::resolve_offerings_for_semester(
        conn,
        &college_id,
        &department_id,
        semester,
        explicit_year.as_deref(),
    )?;
    Ok(json!({
        "academicYearId": resolved.academic_year.id,
        "yearLabel": resolved.academic_year.year_label,
        "offerings": resolved.offerings.iter().map(offering_json).collect::<Vec<_>>(),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "calendar.resolveOfferings" => {
            Some(respond(&req.id, resolve_offerings(&state.db, &req.params)))
        }
        _ => None,
    }
}
