use crate::db;
use crate::import::ImportConfig;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Map, Value};

#[derive(Clone, Copy)]
enum SetupSection {
    Import,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "import" => Some(Self::Import),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Import => "setup.import",
        }
    }
}

pub const DEFAULT_LIST_PAGE_SIZE: usize = 10;

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Import => {
            let defaults = ImportConfig::default();
            json!({
                "chunkSize": defaults.chunk_size,
                "pageSize": defaults.page_size,
                "requireRegionCode": defaults.require_region_code,
                "listPageSize": DEFAULT_LIST_PAGE_SIZE
            })
        }
    }
}

fn as_object_mut(value: &mut Value) -> Result<&mut Map<String, Value>, String> {
    value
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())
}

fn parse_bool(v: &Value, key: &str) -> Result<bool, String> {
    v.as_bool()
        .ok_or_else(|| format!("{} must be boolean", key))
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = as_object_mut(current)?;
    for (k, v) in patch {
        match section {
            SetupSection::Import => match k.as_str() {
                "chunkSize" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 5000)?));
                }
                "pageSize" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 10_000)?));
                }
                "listPageSize" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 500)?));
                }
                "requireRegionCode" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                _ => return Err(format!("unknown import field: {}", k)),
            },
        }
    }
    Ok(())
}

fn load_section(conn: &rusqlite::Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Malformed historical values fall back to defaults.
            let _ = merge_section_patch(section, &mut current, saved_obj);
        }
    }
    Ok(current)
}

/// Import settings for this workspace; defaults when unreadable.
pub fn import_config(conn: &rusqlite::Connection) -> ImportConfig {
    match load_section(conn, SetupSection::Import) {
        Ok(v) => ImportConfig::from_json(&v),
        Err(e) => {
            tracing::warn!(error = %e, "failed to load import settings, using defaults");
            ImportConfig::default()
        }
    }
}

pub fn list_page_size(conn: &rusqlite::Connection) -> usize {
    load_section(conn, SetupSection::Import)
        .ok()
        .and_then(|v| v.get("listPageSize").and_then(|n| n.as_u64()))
        .map(|n| n as usize)
        .unwrap_or(DEFAULT_LIST_PAGE_SIZE)
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let import = match load_section(conn, SetupSection::Import) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    ok(&req.id, json!({ "import": import }))
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
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

    let mut current = match load_section(conn, section) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = merge_section_patch(section, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(conn, section.key(), &current) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
