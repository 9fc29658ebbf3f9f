use crate::config::EngineConfig;
use crate::db;
use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde_json::json;
use std::path::Path;

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn required_i64(req: &Request, key: &str) -> Result<i64, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                format!("{} must be an integer", key),
                None,
            )
        })
}

/// Non-negative integer with a default when absent.
pub fn optional_u64(req: &Request, key: &str, default: u64) -> Result<u64, serde_json::Value> {
    match req.params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(default),
        Some(v) => v.as_u64().ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                format!("{} must be a non-negative integer", key),
                Some(json!({ key: v })),
            )
        }),
    }
}

fn is_academic_year(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() == 9
        && b[4] == b'-'
        && b[..4].iter().all(u8::is_ascii_digit)
        && b[5..].iter().all(u8::is_ascii_digit)
}

/// `academicYear` as `YYYY-YYYY`. Past this point the engine only compares it.
pub fn academic_year(req: &Request) -> Result<String, serde_json::Value> {
    let year = required_str(req, "academicYear")?;
    if !is_academic_year(&year) {
        return Err(err(
            &req.id,
            "bad_params",
            "academicYear must look like YYYY-YYYY",
            Some(json!({ "academicYear": year })),
        ));
    }
    Ok(year)
}

pub fn required_date(req: &Request, key: &str) -> Result<NaiveDate, serde_json::Value> {
    let raw = required_str(req, key)?;
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        err(
            &req.id,
            "bad_params",
            format!("{} must be a YYYY-MM-DD date", key),
            Some(json!({ key: raw })),
        )
    })
}

/// Inclusive `startDate..=endDate`; an inverted range is rejected here.
pub fn date_range(req: &Request) -> Result<(NaiveDate, NaiveDate), serde_json::Value> {
    let from = required_date(req, "startDate")?;
    let to = required_date(req, "endDate")?;
    if from > to {
        return Err(err(
            &req.id,
            "bad_params",
            "startDate must not be after endDate",
            Some(json!({ "startDate": from, "endDate": to })),
        ));
    }
    Ok((from, to))
}

pub fn db_conn<'a>(
    state: &'a AppState,
    req: &Request,
) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn workspace<'a>(state: &'a AppState, req: &Request) -> Result<&'a Path, serde_json::Value> {
    state
        .workspace
        .as_deref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn engine_config(conn: &Connection, req: &Request) -> Result<EngineConfig, serde_json::Value> {
    db::load_engine_config(conn).map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(params: serde_json::Value) -> Request {
        Request {
            id: "1".to_string(),
            method: "test".to_string(),
            params,
        }
    }

    #[test]
    fn academic_year_shape_is_enforced() {
        assert_eq!(
            academic_year(&req(json!({ "academicYear": "2024-2025" }))).unwrap(),
            "2024-2025"
        );
        for bad in ["2024", "2024/2025", "24-25", "2024-20255", "abcd-efgh"] {
            let resp = academic_year(&req(json!({ "academicYear": bad }))).unwrap_err();
            assert_eq!(resp["error"]["code"], "bad_params");
        }
    }

    #[test]
    fn inverted_date_range_is_bad_params() {
        let resp = date_range(&req(json!({
            "startDate": "2024-09-02",
            "endDate": "2024-09-01"
        })))
        .unwrap_err();
        assert_eq!(resp["error"]["code"], "bad_params");
    }

    #[test]
    fn optional_limit_defaults() {
        assert_eq!(optional_u64(&req(json!({})), "limit", 10).unwrap(), 10);
        assert_eq!(optional_u64(&req(json!({ "limit": 3 })), "limit", 10).unwrap(), 3);
        assert!(optional_u64(&req(json!({ "limit": -1 })), "limit", 10).is_err());
    }
}
