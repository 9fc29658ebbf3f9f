use crate::error::EngineError;
use serde_json::json;

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

/// Envelope for an engine failure, keyed by its stable wire code.
pub fn engine_err(req_id: &str, e: &EngineError) -> serde_json::Value {
    let details = match e {
        EngineError::NotFound { what, id } => Some(json!({ "entity": what, "id": id })),
        _ => None,
    };
    err(req_id, e.code(), e.to_string(), details)
}
