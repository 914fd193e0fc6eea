use crate::bundle;
use crate::catalog::{self, CharacterFilters, TownFilters};
use crate::export::{characters_csv, towns_csv, write_text_file};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{character_filters, get_required_str, query_failed, town_filters, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::records::Collection;
use serde_json::{json, Value};
use std::path::Path;

fn export_failed(path: &str, message: impl Into<String>) -> HandlerErr {
    HandlerErr {
        code: "export_failed",
        message: message.into(),
        details: Some(json!({ "path": path })),
    }
}

fn handle_export_csv(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let kind = match get_required_str(&req.params, "kind") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let Some(collection) = Collection::parse(&kind) else {
        return err(&req.id, "bad_params", "kind must be one of: towns, characters", None);
    };
    let out_path = match get_required_str(&req.params, "outPath") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let filters = req.params.get("filters").cloned().unwrap_or_else(|| json!({}));

    let (csv, rows_exported) = match collection {
        Collection::Towns => match catalog::all_towns(conn, &town_filters(&filters)) {
            Ok(towns) => (towns_csv(&towns), towns.len()),
            Err(e) => return query_failed(e).response(&req.id),
        },
        Collection::Characters => match catalog::all_characters(conn, &character_filters(&filters)) {
            Ok(items) => (characters_csv(&items), items.len()),
            Err(e) => return query_failed(e).response(&req.id),
        },
    };
    if let Err(e) = write_text_file(Path::new(&out_path), &csv) {
        return export_failed(&out_path, e.to_string()).response(&req.id);
    }
    tracing::info!(kind = collection.table(), rows = rows_exported, path = %out_path, "csv exported");
    ok(
        &req.id,
        json!({
            "ok": true,
            "kind": collection.table(),
            "rowsExported": rows_exported,
            "path": out_path
        }),
    )
}

fn handle_export_bundle(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let out_path = match get_required_str(&req.params, "outPath") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let towns = match catalog::all_towns(conn, &TownFilters::default()) {
        Ok(v) => v,
        Err(e) => return query_failed(e).response(&req.id),
    };
    let characters = match catalog::all_characters(conn, &CharacterFilters::default()) {
        Ok(v) => v,
        Err(e) => return query_failed(e).response(&req.id),
    };

    match bundle::export_bundle(
        Path::new(&out_path),
        &towns_csv(&towns),
        &characters_csv(&characters),
    ) {
        Ok(summary) => ok(
            &req.id,
            json!({
                "ok": true,
                "bundleFormat": summary.bundle_format,
                "entryCount": summary.entry_count,
                "townRows": summary.town_rows,
                "characterRows": summary.character_rows,
                "path": out_path
            }),
        ),
        Err(e) => export_failed(&out_path, format!("{e:#}")).response(&req.id),
    }
}

fn handle_export_verify_bundle(_state: &mut AppState, req: &Request) -> Value {
    let in_path = match get_required_str(&req.params, "inPath") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match bundle::verify_bundle(Path::new(&in_path)) {
        Ok(summary) => ok(
            &req.id,
            json!({
                "bundleFormat": summary.bundle_format,
                "exportedAt": summary.exported_at,
                "entriesChecked": summary.entries_checked,
                "mismatched": summary.mismatched,
                "intact": summary.is_intact()
            }),
        ),
        Err(e) => err(
            &req.id,
            "parse_failed",
            format!("{e:#}"),
            Some(json!({ "path": in_path })),
        ),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "export.csv" => Some(handle_export_csv(state, req)),
        "export.bundle" => Some(handle_export_bundle(state, req)),
        "export.verifyBundle" => Some(handle_export_verify_bundle(state, req)),
        _ => None,
    }
}
