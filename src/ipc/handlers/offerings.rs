use rusqlite::Connection;
use serde_json::json;

use super::calendar::offering_json;
use crate::engine::offerings;
use crate::ipc::error::{respond, HandlerError};
use crate::ipc::helpers::{opt_bool, opt_i64, opt_str, required_i64, required_str};
use crate::ipc::types::{AppState, Request};

type HandlerResult = Result<serde_json::Value, HandlerError>;

fn find_or_create(conn: &Connection, params: &serde_json::Value) -> HandlerResult {
    let course_id = required_str(params, "courseId")?;
    let semester = required_i64(params, "semester")?;
    let academic_year_id = required_str(params, "academicYearId")?;
    let section_id = opt_str(params, "sectionId");
    let teacher_id = opt_str(params, "teacherId");
    let offering = offerings::find_or_create_offering(
        conn,
        &course_id,
        semester,
        &academic_year_id,
        section_id.as_deref(),
        teacher_id.as_deref(),
    )?;
    Ok(offering_json(&offering))
}

fn find_or_create_by_code(conn: &Connection, params: &serde_json::Value) -> HandlerResult {
    let course_code = required_str(params, "courseCode")?;
    let semester = opt_i64(params, "semester");
    let academic_year_id = required_str(params, "academicYearId")?;
    let section_id = opt_str(params, "sectionId");
    let teacher_id = opt_str(params, "teacherId");
    let offering = offerings::find_or_create_offering_by_code(
        conn,
        &course_code,
        semester,
        &academic_year_id,
        section_id.as_deref(),
        teacher_id.as_deref(),
    )?;
    Ok(offering_json(&offering))
}

fn for_department(conn: &Connection, params: &serde_json::Value) -> HandlerResult {
    let department_id = required_str(params, "departmentId")?;
    let semester = required_i64(params, "semester")?;
    let academic_year_id = required_str(params, "academicYearId")?;
    let create_missing = opt_bool(params, "createMissing", false);
    let rows = offerings::core_offerings_for_department(
        conn,
        &department_id,
        semester,
        &academic_year_id,
        create_missing,
    )?;
    Ok(json!({
        "offerings": rows.iter().map(offering_json).collect::<Vec<_>>()
    }))
}

fn require(conn: &Connection, params: &serde_json::Value) -> HandlerResult {
    let course_id = required_str(params, "courseId")?;
    let semester = required_i64(params, "semester")?;
    let academic_year_id = required_str(params, "academicYearId")?;
    let section_id = opt_str(params, "sectionId");
    let offering = offerings::require_offering(
        conn,
        &course_id,
        semester,
        &academic_year_id,
        section_id.as_deref(),
    )?;
    Ok(offering_json(&offering))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let conn = &state.db;
    let result = match req.method.as_str() {
        "offerings.findOrCreate" => find_or_create(conn, &req.params),
        "offerings.findOrCreateByCode" => find_or_create_by_code(conn, &req.params),
        "offerings.forDepartment" => for_department(conn, &req.params),
        "offerings.require" => require(conn, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
