use rusqlite::Connection;
use serde_json::json;

use crate::engine::attendance::{self, AttendanceRecord, MarkStatus, Session};
use crate::ipc::error::{respond, HandlerError};
use crate::ipc::helpers::{opt_bool, opt_str, required_i64, required_str};
use crate::ipc::types::{AppState, Request};

type HandlerResult = Result<serde_json::Value, HandlerError>;

fn session_json(s: &Session) -> serde_json::Value {
    json!({
        "sessionId": s.id,
        "offeringId": s.offering_id,
        "teacherId": s.teacher_id,
        "classDate": s.class_date,
        "period": s.period,
        "status": s.status,
        "syllabus": s.syllabus,
    })
}

fn record_json(r: &AttendanceRecord) -> serde_json::Value {
    json!({
        "recordId": r.id,
        "sessionId": r.session_id,
        "studentId": r.student_id,
        "status": r.status,
    })
}

fn create_session(conn: &Connection, params: &serde_json::Value) -> HandlerResult {
    let offering_id = required_str(params, "offeringId")?;
    let teacher_id = required_str(params, "teacherId")?;
    let class_date = required_str(params, "classDate")?;
    let period = required_i64(params, "period")?;
    let eager_fill = opt_bool(params, "eagerFillEnrolled", false);
    let syllabus = opt_str(params, "syllabus");
    let (session, seeded) = attendance::create_session(
        conn,
        &offering_id,
        &teacher_id,
        &class_date,
        period,
        eager_fill,
        syllabus.as_deref(),
    )?;
    Ok(json!({
        "session": session_json(&session),
        "recordsSeeded": seeded,
    }))
}

fn set_status(conn: &Connection, params: &serde_json::Value) -> HandlerResult {
    let session_id = required_str(params, "sessionId")?;
    let student_id = required_str(params, "studentId")?;
    let status_raw = required_str(params, "status")?;
    let Some(status) = MarkStatus::parse(&status_raw) else {
        return Err(HandlerError::BadParams(format!(
            "status must be present, absent or unmarked; got {}",
            status_raw
        )));
    };
    let record = attendance::set_attendance(conn, &session_id, &student_id, status)?;
    Ok(json!({
        "record": record.as_ref().map(record_json),
    }))
}

fn session_open(conn: &Connection, params: &serde_json::Value) -> HandlerResult {
    let session_id = required_str(params, "sessionId")?;
    let session = attendance::get_session(conn, &session_id)?;
    let records = attendance::session_records(conn, &session_id)?;
    Ok(json!({
        "session": session_json(&session),
        "records": records.iter().map(record_json).collect::<Vec<_>>(),
    }))
}

fn set_session_status(conn: &Connection, params: &serde_json::Value) -> HandlerResult {
    let session_id = required_str(params, "sessionId")?;
    let status = required_str(params, "status")?;
    let session = attendance::set_session_status(conn, &session_id, &status)?;
    Ok(json!({ "session": session_json(&session) }))
}

fn offering_summary(conn: &Connection, params: &serde_json::Value) -> HandlerResult {
    let offering_id = required_str(params, "offeringId")?;
    let summary = attendance::offering_summary(conn, &offering_id)?;
    Ok(json!({
        "offeringId": summary.offering_id,
        "classesCompleted": summary.classes_completed,
        "averagePercent": summary.average_percent,
        "perStudent": summary.per_student.iter().map(|s| {
            json!({
                "studentId": s.student_id,
                "present": s.present,
                "percent": s.percent,
            })
        }).collect::<Vec<_>>(),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let conn = &state.db;
    let result = match req.method.as_str() {
        "attendance.createSession" => create_session(conn, &req.params),
        "attendance.setStatus" => set_status(conn, &req.params),
        "attendance.sessionOpen" => session_open(conn, &req.params),
        "attendance.setSessionStatus" => set_session_status(conn, &req.params),
        "attendance.offeringSummary" => offering_summary(conn, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
