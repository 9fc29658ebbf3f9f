use crate::config::EngineConfig;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, engine_config};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Map, Value};
use tracing::info;

#[derive(Clone, Copy)]
enum SetupSection {
    Analytics,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "analytics" => Some(Self::Analytics),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Analytics => db::ANALYTICS_SETTINGS_KEY,
        }
    }
}

/// Apply `patch` over the effective config. Unknown fields are rejected, and
/// the merged result must validate before anything is stored.
fn merge_analytics_patch(
    current: &EngineConfig,
    patch: &Map<String, Value>,
) -> Result<EngineConfig, String> {
    let mut merged = serde_json::to_value(current).map_err(|e| e.to_string())?;
    let Some(obj) = merged.as_object_mut() else {
        return Err("analytics settings must be an object".to_string());
    };
    for (k, v) in patch {
        if !obj.contains_key(k) {
            return Err(format!("unknown analytics field: {}", k));
        }
        obj.insert(k.clone(), v.clone());
    }
    EngineConfig::from_json(&merged).map_err(|e| e.to_string())
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let analytics = match engine_config(conn, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    ok(&req.id, json!({ "analytics": analytics }))
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let current = match engine_config(conn, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let merged = match merge_analytics_patch(&current, patch_obj) {
        Ok(c) => c,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    let stored = match serde_json::to_value(&merged) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_update_failed", e.to_string(), None),
    };
    if let Err(e) = db::settings_set_json(conn, section.key(), &stored) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    info!(section = section.key(), "settings updated");
    ok(&req.id, json!({ "analytics": stored }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
