use rusqlite::Connection;
use serde_json::json;

use crate::engine::marks::{self, LabPatch, MarksRow, TheoryPatch};
use crate::ipc::error::{respond, HandlerError};
use crate::ipc::helpers::{opt_f64, required_str};
use crate::ipc::types::{AppState, Request};

type HandlerResult = Result<serde_json::Value, HandlerError>;

const THEORY_FIELDS: [&str; 4] = ["mse1", "mse2", "mse3", "ta"];
const LAB_FIELDS: [&str; 2] = ["ca", "ese"];

fn has_any_field(params: &serde_json::Value, fields: &[&str]) -> bool {
    fields.iter().any(|f| params.get(*f).is_some())
}

fn marks_json(row: &MarksRow) -> serde_json::Value {
    let theory = row.theory.as_ref().map(|t| {
        let total = marks::theory_total(t);
        json!({
            "mse1": t.mse1,
            "mse2": t.mse2,
            "mse3": t.mse3,
            "ta": t.ta,
            "mse3Eligible": !marks::mse_ceiling_reached(t.mse1, t.mse2),
            "total": total,
            "passing": marks::component_passing(total),
            "updatedAt": t.updated_at,
        })
    });
    let lab = row.lab.as_ref().map(|l| {
        let total = marks::lab_total(l);
        json!({
            "ca": l.ca,
            "ese": l.ese,
            "total": total,
            "passing": marks::component_passing(total),
            "updatedAt": l.updated_at,
        })
    });
    json!({
        "enrollmentId": row.enrollment_id,
        "theory": theory,
        "lab": lab,
    })
}

/// Which component(s) a request targets is decided by which named fields are
/// present; a single request may carry both theory and lab sub-scores.
fn upsert(conn: &Connection, params: &serde_json::Value) -> HandlerResult {
    let enrollment_id = required_str(params, "enrollmentId")?;

    let theory = has_any_field(params, &THEORY_FIELDS).then(|| TheoryPatch {
        mse1: opt_f64(params, "mse1"),
        mse2: opt_f64(params, "mse2"),
        mse3: opt_f64(params, "mse3"),
        ta: opt_f64(params, "ta"),
    });
    let lab = has_any_field(params, &LAB_FIELDS).then(|| LabPatch {
        ca: opt_f64(params, "ca"),
        ese: opt_f64(params, "ese"),
    });
    if theory.is_none() && lab.is_none() {
        return Err(HandlerError::BadParams(
            "no mark fields supplied".to_string(),
        ));
    }

    let row = marks::upsert_marks(conn, &enrollment_id, theory, lab)?;
    Ok(marks_json(&row))
}

fn get(conn: &Connection, params: &serde_json::Value) -> HandlerResult {
    let enrollment_id = required_str(params, "enrollmentId")?;
    let row = marks::get_marks(conn, &enrollment_id)?;
    Ok(marks_json(&row))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let conn = &state.db;
    let result = match req.method.as_str() {
        "marks.upsert" => upsert(conn, &req.params),
        "marks.get" => get(conn, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
