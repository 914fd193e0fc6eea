use crate::catalog;
use crate::edit::{self, TownPatch};
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::setup::list_page_size;
use crate::ipc::helpers::{get_page, get_required_str, query_failed, town_filters, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::records::Town;
use crate::store::SqliteStore;
use serde_json::{json, Value};

fn handle_towns_list(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let (page, page_size) = match get_page(&req.params, list_page_size(conn)) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let filters = town_filters(&req.params);
    match catalog::list_towns(conn, &filters, page, page_size) {
        Ok(p) => ok(&req.id, p.to_json(Town::to_json)),
        Err(e) => query_failed(e).response(&req.id),
    }
}

fn handle_towns_get(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let town_id = match get_required_str(&req.params, "townId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let store = SqliteStore::new(conn);
    match edit::get_town(&store, &town_id) {
        Ok(town) => ok(&req.id, json!({ "town": town.to_json() })),
        Err(e) => HandlerErr::from(e).response(&req.id),
    }
}

fn handle_towns_update(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let town_id = match get_required_str(&req.params, "townId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let Some(patch_raw) = req.params.get("patch").filter(|v| v.is_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };
    let patch: TownPatch = match serde_json::from_value(patch_raw.clone()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", format!("invalid patch: {}", e), None),
    };

    let store = SqliteStore::new(conn);
    match edit::update_town(&store, &town_id, &patch) {
        Ok(town) => {
            tracing::info!(town_id = %town.id, place_code = %town.place_code, "town updated");
            ok(&req.id, json!({ "town": town.to_json() }))
        }
        Err(e) => HandlerErr::from(e).response(&req.id),
    }
}

fn handle_towns_delete(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let town_id = match get_required_str(&req.params, "townId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let store = SqliteStore::new(conn);
    match edit::delete_town(&store, &town_id) {
        Ok(()) => {
            tracing::info!(town_id = %town_id, "town deleted");
            ok(&req.id, json!({ "ok": true }))
        }
        Err(e) => HandlerErr::from(e).response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "towns.list" => Some(handle_towns_list(state, req)),
        "towns.get" => Some(handle_towns_get(state, req)),
        "towns.update" => Some(handle_towns_update(state, req)),
        "towns.delete" => Some(handle_towns_delete(state, req)),
        _ => None,
    }
}
