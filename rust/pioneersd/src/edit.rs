use crate::records::{from_row, non_empty_trimmed, Character, Collection, Row, Town};
use crate::store::{Filter, RecordStore, StoreError};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EditError {
    #[error("{0}")]
    Invalid(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("place code {code} is already used by town {name}")]
    CodeConflict { code: String, name: String },
    #[error("place code {0} does not match any town")]
    UnknownPlaceCode(String),
    #[error("town cannot be deleted: {count} character(s) still reference it")]
    TownInUse { count: usize },
    #[error("stored record is malformed: {0}")]
    Malformed(String),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for EditError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { table, .. } => {
                EditError::NotFound(if table == "towns" { "town" } else { "character" })
            }
            other => EditError::Store(other),
        }
    }
}

impl EditError {
    pub fn code(&self) -> &'static str {
        match self {
            EditError::Invalid(_) => "bad_params",
            EditError::NotFound(_) => "not_found",
            EditError::CodeConflict { .. } => "code_conflict",
            EditError::UnknownPlaceCode(_) => "unknown_place_code",
            EditError::TownInUse { .. } => "town_in_use",
            EditError::Malformed(_) | EditError::Store(_) => "store_failed",
        }
    }
}

/// Fields of a town edit. Absent fields are left unchanged; an empty string
/// clears an optional text field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TownPatch {
    pub name: Option<String>,
    pub place_code: Option<String>,
    pub postal_code: Option<String>,
    pub region_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterPatch {
    pub last_name: Option<String>,
    pub first_name: Option<String>,
    pub bio: Option<String>,
    pub birthplace: Option<String>,
    pub deathplace: Option<String>,
    pub main_character: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CharacterDetails {
    pub character: Character,
    pub town: Option<Town>,
}

fn decode<T: serde::de::DeserializeOwned>(row: Row) -> Result<T, EditError> {
    from_row(row).map_err(|e| EditError::Malformed(e.to_string()))
}

fn find_one<T: serde::de::DeserializeOwned>(
    store: &dyn RecordStore,
    collection: Collection,
    filter: &Filter,
) -> Result<Option<T>, EditError> {
    let mut rows = store.fetch_by_filter(collection, filter)?;
    if rows.is_empty() {
        return Ok(None);
    }
    decode(rows.swap_remove(0)).map(Some)
}

fn required_text(v: &str, label: &str) -> Result<String, EditError> {
    non_empty_trimmed(v).ok_or_else(|| EditError::Invalid(format!("{} must not be empty", label)))
}

fn optional_text(v: &str) -> Value {
    non_empty_trimmed(v).map(Value::String).unwrap_or(Value::Null)
}

pub fn get_town(store: &dyn RecordStore, id: &str) -> Result<Town, EditError> {
    find_one(store, Collection::Towns, &Filter::Eq("id", id.into()))?
        .ok_or(EditError::NotFound("town"))
}

pub fn find_town_by_code(store: &dyn RecordStore, code: &str) -> Result<Option<Town>, EditError> {
    find_one(store, Collection::Towns, &Filter::Eq("place_code", code.into()))
}

pub fn update_town(store: &dyn RecordStore, id: &str, patch: &TownPatch) -> Result<Town, EditError> {
    let current = get_town(store, id)?;
    let mut fields = Row::new();

    if let Some(name) = patch.name.as_deref() {
        fields.insert("name".into(), Value::String(required_text(name, "name")?));
    }
    if let Some(code) = patch.place_code.as_deref() {
        let code = required_text(code, "place code")?;
        // Checked at write time; the form may have been loaded long ago.
        if let Some(owner) = find_town_by_code(store, &code)? {
            if owner.id != current.id {
                return Err(EditError::CodeConflict {
                    code,
                    name: owner.name,
                });
            }
        }
        fields.insert("place_code".into(), Value::String(code));
    }
    if let Some(v) = patch.postal_code.as_deref() {
        fields.insert("postal_code".into(), optional_text(v));
    }
    if let Some(v) = patch.region_code.as_deref() {
        fields.insert("region_code".into(), optional_text(v));
    }
    if let Some(v) = patch.description.as_deref() {
        fields.insert("description".into(), optional_text(v));
    }
    for (key, v) in [("latitude", patch.latitude), ("longitude", patch.longitude)] {
        if let Some(v) = v {
            if !v.is_finite() {
                return Err(EditError::Invalid(format!("{} must be a finite number", key)));
            }
            fields.insert(key.into(), Value::from(v));
        }
    }

    store.update(Collection::Towns, id, &fields)?;
    get_town(store, id)
}

pub fn delete_town(store: &dyn RecordStore, id: &str) -> Result<(), EditError> {
    get_town(store, id)?;
    let referencing = store.fetch_by_filter(Collection::Characters, &Filter::Eq("town_id", id.into()))?;
    if !referencing.is_empty() {
        return Err(EditError::TownInUse {
            count: referencing.len(),
        });
    }
    store.delete(Collection::Towns, id)?;
    Ok(())
}

pub fn get_character(store: &dyn RecordStore, id: &str) -> Result<CharacterDetails, EditError> {
    let character: Character = find_one(store, Collection::Characters, &Filter::Eq("id", id.into()))?
        .ok_or(EditError::NotFound("character"))?;
    let town = match character.town_id.as_deref() {
        Some(town_id) => find_one(store, Collection::Towns, &Filter::Eq("id", town_id.into()))?,
        None => None,
    };
    Ok(CharacterDetails { character, town })
}

/// `place_code`: `None` keeps the current town, `Some("")` unlinks it, any other
/// value must name an existing town.
pub fn update_character(
    store: &dyn RecordStore,
    id: &str,
    patch: &CharacterPatch,
    place_code: Option<&str>,
) -> Result<CharacterDetails, EditError> {
    get_character(store, id)?;
    let mut fields = Row::new();

    if let Some(v) = patch.last_name.as_deref() {
        fields.insert("last_name".into(), Value::String(required_text(v, "last name")?));
    }
    for (key, v) in [
        ("first_name", &patch.first_name),
        ("bio", &patch.bio),
        ("birthplace", &patch.birthplace),
        ("deathplace", &patch.deathplace),
    ] {
        if let Some(v) = v.as_deref() {
            fields.insert(key.into(), optional_text(v));
        }
    }
    if let Some(flag) = patch.main_character {
        fields.insert("main_character".into(), Value::Bool(flag));
    }
    if let Some(code) = place_code {
        match non_empty_trimmed(code) {
            None => {
                fields.insert("town_id".into(), Value::Null);
            }
            Some(code) => {
                let town = find_town_by_code(store, &code)?.ok_or(EditError::UnknownPlaceCode(code))?;
                fields.insert("town_id".into(), Value::String(town.id));
            }
        }
    }

    store.update(Collection::Characters, id, &fields)?;
    get_character(store, id)
}

pub fn delete_character(store: &dyn RecordStore, id: &str) -> Result<(), EditError> {
    store.delete(Collection::Characters, id)?;
    Ok(())
}
