use serde_json::json;

use crate::engine::EngineError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// One failure type for every handler, so each rule's error mapping exists
/// exactly once.
pub enum HandlerError {
    BadParams(String),
    Engine(EngineError),
}

impl From<EngineError> for HandlerError {
    fn from(e: EngineError) -> Self {
        HandlerError::Engine(e)
    }
}

impl HandlerError {
    fn response(self, id: &str) -> serde_json::Value {
        match self {
            HandlerError::BadParams(message) => err(id, "bad_params", message, None),
            HandlerError::Engine(e) => err(id, e.code(), e.to_string(), None),
        }
    }
}

pub fn respond(id: &str, res: Result<serde_json::Value, HandlerError>) -> serde_json::Value {
    match res {
        Ok(result) => ok(id, result),
        Err(e) => e.response(id),
    }
}
