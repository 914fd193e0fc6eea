use crate::catalog::{self, Suggestion};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::query_failed;
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};

const DEFAULT_SUGGEST_LIMIT: u64 = 10;
const MAX_SUGGEST_LIMIT: u64 = 50;

fn handle_search_suggest(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(term) = req.params.get("term").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing term", None);
    };
    let limit = req
        .params
        .get("limit")
        .and_then(|v| v.as_u64())
        .unwrap_or(DEFAULT_SUGGEST_LIMIT)
        .min(MAX_SUGGEST_LIMIT) as usize;

    match catalog::suggest(conn, term, limit) {
        Ok(hits) => ok(
            &req.id,
            json!({
                "term": term,
                "suggestions": hits.iter().map(Suggestion::to_json).collect::<Vec<_>>()
            }),
        ),
        Err(e) => query_failed(e).response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "search.suggest" => Some(handle_search_suggest(state, req)),
        _ => None,
    }
}
