//! Thin seed/CRUD entry points for entities owned by administrative
//! workflows. No rules live here; anything with an invariant goes through
//! `crate::engine`.

use rusqlite::Connection;
use serde_json::json;

use crate::engine::calendar;
use crate::engine::{new_id, EngineError};
use crate::ipc::error::{respond, HandlerError};
use crate::ipc::helpers::{opt_bool, opt_str, required_i64, required_str, required_str_list};
use crate::ipc::types::{AppState, Request};

type HandlerResult = Result<serde_json::Value, HandlerError>;

fn college_create(conn: &Connection, params: &serde_json::Value) -> HandlerResult {
    let name = required_str(params, "name")?;
    let id = new_id();
    conn.execute("INSERT INTO colleges(id, name) VALUES(?, ?)", (&id, &name))
        .map_err(EngineError::Db)?;
    Ok(json!({ "collegeId": id }))
}

fn department_create(conn: &Connection, params: &serde_json::Value) -> HandlerResult {
    let college_id = required_str(params, "collegeId")?;
    let name = required_str(params, "name")?;
    let id = new_id();
    conn.execute(
        "INSERT INTO departments(id, college_id, name) VALUES(?, ?, ?)",
        (&id, &college_id, &name),
    )
    .map_err(EngineError::Db)?;
    Ok(json!({ "departmentId": id }))
}

fn section_create(conn: &Connection, params: &serde_json::Value) -> HandlerResult {
    let department_id = required_str(params, "departmentId")?;
    let name = required_str(params, "name")?;
    let id = new_id();
    conn.execute(
        "INSERT INTO sections(id, department_id, name) VALUES(?, ?, ?)",
        (&id, &department_id, &name),
    )
    .map_err(EngineError::Db)?;
    Ok(json!({ "sectionId": id }))
}

fn teacher_create(conn: &Connection, params: &serde_json::Value) -> HandlerResult {
    let college_id = required_str(params, "collegeId")?;
    let name = required_str(params, "name")?;
    let id = new_id();
    conn.execute(
        "INSERT INTO teachers(id, college_id, name) VALUES(?, ?, ?)",
        (&id, &college_id, &name),
    )
    .map_err(EngineError::Db)?;
    Ok(json!({ "teacherId": id }))
}

fn student_create(conn: &Connection, params: &serde_json::Value) -> HandlerResult {
    let enrollment_no = required_str(params, "enrollmentNo")?;
    let name = required_str(params, "name")?;
    let college_id = required_str(params, "collegeId")?;
    let department_id = required_str(params, "departmentId")?;
    let section_id = opt_str(params, "sectionId");
    let current_semester = required_i64(params, "currentSemester")?;
    let batch_year = required_i64(params, "batchYear")?;
    let id = new_id();
    conn.execute(
        "INSERT INTO students(id, enrollment_no, name, college_id, department_id, section_id, current_semester, batch_year)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &id,
            &enrollment_no,
            &name,
            &college_id,
            &department_id,
            &section_id,
            current_semester,
            batch_year,
        ),
    )
    .map_err(EngineError::Db)?;
    Ok(json!({ "studentId": id }))
}

fn course_create(conn: &Connection, params: &serde_json::Value) -> HandlerResult {
    let code = required_str(params, "code")?;
    let department_id = required_str(params, "departmentId")?;
    let course_type = required_str(params, "courseType")?;
    if !["core", "department_elective", "open_elective"].contains(&course_type.as_str()) {
        return Err(HandlerError::BadParams(format!(
            "invalid courseType: {}",
            course_type
        )));
    }
    let has_theory = opt_bool(params, "hasTheory", true);
    let has_lab = opt_bool(params, "hasLab", false);
    let restricted = match params.get("restrictedDepartmentIds") {
        Some(_) => required_str_list(params, "restrictedDepartmentIds")?,
        None => Vec::new(),
    };
    if !restricted.is_empty() && course_type != "open_elective" {
        return Err(HandlerError::BadParams(
            "restrictedDepartmentIds only applies to open electives".to_string(),
        ));
    }

    let id = new_id();
    conn.execute(
        "INSERT INTO courses(id, code, department_id, course_type, has_theory, has_lab)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &id,
            &code,
            &department_id,
            &course_type,
            has_theory as i64,
            has_lab as i64,
        ),
    )
    .map_err(EngineError::Db)?;
    for dept_id in &restricted {
        conn.execute(
            "INSERT INTO course_restricted_departments(course_id, department_id)
             VALUES(?, ?)
             ON CONFLICT DO NOTHING",
            (&id, dept_id),
        )
        .map_err(EngineError::Db)?;
    }
    Ok(json!({ "courseId": id }))
}

fn academic_year_create(conn: &Connection, params: &serde_json::Value) -> HandlerResult {
    let college_id = required_str(params, "collegeId")?;
    let year_label = required_str(params, "yearLabel")?;
    let active = opt_bool(params, "active", true);
    let start_date = opt_str(params, "startDate");
    let end_date = opt_str(params, "endDate");
    // Same identity the resolver's lazy creation uses; an admin re-create of
    // an existing label just refreshes the flags.
    let year = calendar::find_or_create_academic_year(conn, &college_id, &year_label)?;
    conn.execute(
        "UPDATE academic_years SET active = ?, start_date = ?, end_date = ? WHERE id = ?",
        (active as i64, &start_date, &end_date, &year.id),
    )
    .map_err(EngineError::Db)?;
    Ok(json!({ "academicYearId": year.id }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let conn = &state.db;
    let result = match req.method.as_str() {
        "admin.collegeCreate" => college_create(conn, &req.params),
        "admin.departmentCreate" => department_create(conn, &req.params),
        "admin.sectionCreate" => section_create(conn, &req.params),
        "admin.teacherCreate" => teacher_create(conn, &req.params),
        "admin.studentCreate" => student_create(conn, &req.params),
        "admin.courseCreate" => course_create(conn, &req.params),
        "admin.academicYearCreate" => academic_year_create(conn, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
