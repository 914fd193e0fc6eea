use super::rows::{CharacterDraft, Parsed};
use super::{SkipReason, SkippedRow};
use crate::records::{Collection, NewCharacter, NewTown, Row};
use crate::store::{RecordStore, StoreError};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Read a whole collection page by page. Stops at the first page shorter than
/// `page_size`, which also covers an empty page.
pub fn fetch_all_rows(
    store: &dyn RecordStore,
    collection: Collection,
    columns: &[&str],
    page_size: usize,
) -> Result<Vec<Row>, StoreError> {
    let page_size = page_size.max(1);
    let mut out = Vec::new();
    let mut offset = 0usize;
    loop {
        let page = store.fetch_page(collection, columns, offset, page_size)?;
        let n = page.len();
        out.extend(page);
        if n < page_size {
            break;
        }
        offset += page_size;
    }
    Ok(out)
}

fn str_field<'r>(row: &'r Row, key: &str) -> Option<&'r str> {
    row.get(key).and_then(Value::as_str)
}

pub fn existing_place_codes(
    store: &dyn RecordStore,
    page_size: usize,
) -> Result<HashSet<String>, StoreError> {
    let rows = fetch_all_rows(store, Collection::Towns, &["place_code"], page_size)?;
    Ok(rows
        .iter()
        .filter_map(|r| str_field(r, "place_code").map(str::to_string))
        .collect())
}

/// place code -> town id
pub fn place_code_index(
    store: &dyn RecordStore,
    page_size: usize,
) -> Result<HashMap<String, String>, StoreError> {
    let rows = fetch_all_rows(store, Collection::Towns, &["id", "place_code"], page_size)?;
    Ok(rows
        .iter()
        .filter_map(|r| {
            let code = str_field(r, "place_code")?;
            let id = str_field(r, "id")?;
            Some((code.to_string(), id.to_string()))
        })
        .collect())
}

pub fn partition_new_towns(
    towns: Vec<Parsed<NewTown>>,
    existing: &HashSet<String>,
) -> (Vec<Parsed<NewTown>>, Vec<SkippedRow>) {
    let mut fresh = Vec::new();
    let mut skipped = Vec::new();
    for town in towns {
        if !town.record.place_code.is_empty() && existing.contains(&town.record.place_code) {
            skipped.push(SkippedRow {
                row: town.row,
                label: town.record.name.clone(),
                place_code: Some(town.record.place_code.clone()),
                reason: SkipReason::DuplicateCode,
            });
        } else {
            fresh.push(town);
        }
    }
    (fresh, skipped)
}

pub fn resolve_characters(
    drafts: Vec<Parsed<CharacterDraft>>,
    index: &HashMap<String, String>,
) -> (Vec<Parsed<NewCharacter>>, Vec<SkippedRow>) {
    let mut resolved = Vec::new();
    let mut skipped = Vec::new();
    for Parsed { row, record } in drafts {
        let CharacterDraft {
            mut character,
            place_code,
        } = record;
        if let Some(code) = place_code {
            let Some(town_id) = index.get(&code) else {
                skipped.push(SkippedRow {
                    row,
                    label: display_label(&character),
                    place_code: Some(code),
                    reason: SkipReason::UnresolvedPlaceCode,
                });
                continue;
            };
            character.town_id = Some(town_id.clone());
        }
        resolved.push(Parsed {
            row,
            record: character,
        });
    }
    (resolved, skipped)
}

fn display_label(c: &NewCharacter) -> String {
    match c.first_name.as_deref() {
        Some(first) => format!("{} {}", first, c.last_name),
        None => c.last_name.clone(),
    }
}
