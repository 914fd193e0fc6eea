use crate::catalog::{self, CharacterListItem};
use crate::edit::{self, CharacterDetails, CharacterPatch};
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::setup::list_page_size;
use crate::ipc::helpers::{
    character_filters, get_page, get_required_str, query_failed, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::store::SqliteStore;
use serde_json::{json, Value};

fn details_json(d: &CharacterDetails) -> Value {
    json!({
        "character": d.character.to_json(),
        "town": d.town.as_ref().map(|t| t.to_json()),
    })
}

fn handle_characters_list(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let (page, page_size) = match get_page(&req.params, list_page_size(conn)) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let filters = character_filters(&req.params);
    match catalog::list_characters(conn, &filters, page, page_size) {
        Ok(p) => ok(&req.id, p.to_json(CharacterListItem::to_json)),
        Err(e) => query_failed(e).response(&req.id),
    }
}

fn handle_characters_get(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let character_id = match get_required_str(&req.params, "characterId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let store = SqliteStore::new(conn);
    match edit::get_character(&store, &character_id) {
        Ok(d) => ok(&req.id, details_json(&d)),
        Err(e) => HandlerErr::from(e).response(&req.id),
    }
}

fn handle_characters_update(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let character_id = match get_required_str(&req.params, "characterId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let patch: CharacterPatch = match req.params.get("patch") {
        None | Some(Value::Null) => CharacterPatch::default(),
        Some(v) if v.is_object() => match serde_json::from_value(v.clone()) {
            Ok(p) => p,
            Err(e) => return err(&req.id, "bad_params", format!("invalid patch: {}", e), None),
        },
        Some(_) => return err(&req.id, "bad_params", "patch must be an object", None),
    };
    // Absent keeps the current town, "" unlinks it.
    let place_code = match req.params.get("placeCode") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.as_str()),
        Some(_) => return err(&req.id, "bad_params", "placeCode must be a string", None),
    };

    let store = SqliteStore::new(conn);
    match edit::update_character(&store, &character_id, &patch, place_code) {
        Ok(d) => {
            tracing::info!(character_id = %d.character.id, "character updated");
            ok(&req.id, details_json(&d))
        }
        Err(e) => HandlerErr::from(e).response(&req.id),
    }
}

fn handle_characters_delete(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let character_id = match get_required_str(&req.params, "characterId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let store = SqliteStore::new(conn);
    match edit::delete_character(&store, &character_id) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => HandlerErr::from(e).response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "characters.list" => Some(handle_characters_list(state, req)),
        "characters.get" => Some(handle_characters_get(state, req)),
        "characters.update" => Some(handle_characters_update(state, req)),
        "characters.delete" => Some(handle_characters_delete(state, req)),
        _ => None,
    }
}
