use crate::export::{csv_field, write_text_file};
use crate::import::{self, TableKind};
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::setup::import_config;
use crate::ipc::helpers::{get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::sheet::{self, Cell};
use crate::store::SqliteStore;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

fn parse_kind(params: &Value) -> Result<Option<TableKind>, HandlerErr> {
    match params.get("kind").and_then(|v| v.as_str()) {
        None => Ok(None),
        Some(raw) => TableKind::parse(raw)
            .map(Some)
            .ok_or_else(|| HandlerErr::new("bad_params", "kind must be one of: towns, characters")),
    }
}

fn read_upload(path: &str) -> Result<Vec<Vec<Cell>>, HandlerErr> {
    sheet::read_table(Path::new(path)).map_err(|e| HandlerErr {
        code: "parse_failed",
        message: e.to_string(),
        details: Some(json!({ "path": path })),
    })
}

fn handle_import_preview(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let in_path = match get_required_str(&req.params, "inPath") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let kind = match parse_kind(&req.params) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let table = match read_upload(&in_path) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let config = import_config(conn).with_overrides(&req.params);
    let store = SqliteStore::new(conn);
    match import::preview_table(&store, &table, kind, &config) {
        Ok(preview) => ok(
            &req.id,
            serde_json::to_value(&preview).unwrap_or_else(|_| json!({})),
        ),
        Err(e) => HandlerErr::from(e).response(&req.id),
    }
}

fn handle_import_apply(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let in_path = match get_required_str(&req.params, "inPath") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let kind = match parse_kind(&req.params) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let table = match read_upload(&in_path) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let config = import_config(conn).with_overrides(&req.params);
    tracing::info!(path = %in_path, rows = table.len(), chunk_size = config.chunk_size, "import requested");

    let store = SqliteStore::new(conn);
    match import::import_table(&store, &table, kind, &config) {
        Ok(report) => ok(&req.id, report.to_json()),
        Err(e) => {
            tracing::warn!(path = %in_path, code = e.code(), error = %e, "import rejected");
            HandlerErr::from(e).response(&req.id)
        }
    }
}

/// Writes an empty upload file with the header row the importer expects.
fn handle_import_template(_state: &mut AppState, req: &Request) -> Value {
    let kind = match parse_kind(&req.params) {
        Ok(Some(v)) => v,
        Ok(None) => return err(&req.id, "bad_params", "missing kind", None),
        Err(e) => return e.response(&req.id),
    };
    let out_path = match get_required_str(&req.params, "outPath") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let header = kind
        .headers()
        .iter()
        .map(|h| csv_field(h))
        .collect::<Vec<_>>()
        .join(",");
    if let Err(e) = write_text_file(&PathBuf::from(&out_path), &format!("{}\n", header)) {
        return err(
            &req.id,
            "export_failed",
            e.to_string(),
            Some(json!({ "path": out_path })),
        );
    }
    ok(
        &req.id,
        json!({ "ok": true, "kind": kind.as_str(), "path": out_path }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "import.preview" => Some(handle_import_preview(state, req)),
        "import.apply" => Some(handle_import_apply(state, req)),
        "import.template" => Some(handle_import_template(state, req)),
        _ => None,
    }
}
