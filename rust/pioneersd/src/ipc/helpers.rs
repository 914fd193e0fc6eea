use crate::catalog::{CharacterFilters, TownFilters};
use crate::edit::EditError;
use crate::import::ImportError;
use crate::ipc::error::err;
use serde_json::{json, Value};

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn response(self, id: &str) -> Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<EditError> for HandlerErr {
    fn from(e: EditError) -> Self {
        let details = match &e {
            EditError::CodeConflict { code, name } => Some(json!({ "placeCode": code, "townName": name })),
            EditError::TownInUse { count } => Some(json!({ "characterCount": count })),
            EditError::UnknownPlaceCode(code) => Some(json!({ "placeCode": code })),
            _ => None,
        };
        Self {
            code: e.code(),
            message: e.to_string(),
            details,
        }
    }
}

impl From<ImportError> for HandlerErr {
    fn from(e: ImportError) -> Self {
        Self {
            code: e.code(),
            message: e.to_string(),
            details: Some(json!({ "errors": e.messages() })),
        }
    }
}

pub fn get_required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing {}", key)))
}

pub fn get_optional_str(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// 1-based page number and page size, `default_size` when not given.
pub fn get_page(params: &Value, default_size: usize) -> Result<(usize, usize), HandlerErr> {
    let read = |key: &str, default: usize| -> Result<usize, HandlerErr> {
        match params.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(v) => match v.as_u64() {
                Some(n) if n >= 1 => Ok(n as usize),
                _ => Err(HandlerErr::new(
                    "bad_params",
                    format!("{} must be a positive integer", key),
                )),
            },
        }
    };
    Ok((read("page", 1)?, read("pageSize", default_size)?))
}

pub fn town_filters(params: &Value) -> TownFilters {
    TownFilters {
        region: get_optional_str(params, "regionFilter"),
    }
}

pub fn character_filters(params: &Value) -> CharacterFilters {
    CharacterFilters {
        town: get_optional_str(params, "townFilter"),
        region: get_optional_str(params, "regionFilter"),
        no_town: params
            .get("noTown")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
    }
}

pub fn query_failed(e: impl std::fmt::Display) -> HandlerErr {
    HandlerErr::new("db_query_failed", e.to_string())
}
