//! Read-side queries behind the listing, search and export screens.

use crate::records::{Character, Town};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use serde_json::{json, Value};

pub const MIN_SUGGEST_CHARS: usize = 3;

#[derive(Debug, Clone, Default)]
pub struct TownFilters {
    pub region: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CharacterFilters {
    pub town: Option<String>,
    pub region: Option<String>,
    /// Only characters with no linked town. Other filters are ignored.
    pub no_town: bool,
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> usize {
        if self.total == 0 {
            1
        } else {
            self.total.div_ceil(self.page_size.max(1))
        }
    }

    pub fn to_json(&self, item: impl Fn(&T) -> Value) -> Value {
        json!({
            "items": self.items.iter().map(item).collect::<Vec<_>>(),
            "page": self.page,
            "pageSize": self.page_size,
            "total": self.total,
            "totalPages": self.total_pages(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CharacterListItem {
    pub character: Character,
    pub town_name: Option<String>,
    pub place_code: Option<String>,
    pub region_code: Option<String>,
}

impl CharacterListItem {
    pub fn to_json(&self) -> Value {
        let mut v = self.character.to_json();
        v["townName"] = json!(self.town_name);
        v["placeCode"] = json!(self.place_code);
        v["regionCode"] = json!(self.region_code);
        v
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    pub kind: &'static str,
    pub id: String,
    pub label: String,
    pub detail: Option<String>,
}

impl Suggestion {
    pub fn to_json(&self) -> Value {
        json!({
            "kind": self.kind,
            "id": self.id,
            "label": self.label,
            "detail": self.detail,
        })
    }
}

fn like_pattern(term: &str) -> String {
    let mut out = String::from("%");
    for ch in term.trim().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out
}

fn active(filter: &Option<String>) -> Option<&str> {
    filter.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn town_where(filters: &TownFilters) -> (String, Vec<SqlValue>) {
    match active(&filters.region) {
        Some(region) => (
            "WHERE region_code LIKE ? ESCAPE '\\'".to_string(),
            vec![SqlValue::Text(like_pattern(region))],
        ),
        None => (String::new(), Vec::new()),
    }
}

fn character_where(filters: &CharacterFilters) -> (String, Vec<SqlValue>) {
    if filters.no_town {
        return ("WHERE c.town_id IS NULL".to_string(), Vec::new());
    }
    let mut parts: Vec<&str> = Vec::new();
    let mut binds: Vec<SqlValue> = Vec::new();
    if let Some(town) = active(&filters.town) {
        parts.push("t.name LIKE ? ESCAPE '\\'");
        binds.push(SqlValue::Text(like_pattern(town)));
    }
    if let Some(region) = active(&filters.region) {
        parts.push("t.region_code LIKE ? ESCAPE '\\'");
        binds.push(SqlValue::Text(like_pattern(region)));
    }
    if parts.is_empty() {
        (String::new(), binds)
    } else {
        (format!("WHERE {}", parts.join(" AND ")), binds)
    }
}

/// SQLite takes LIMIT and OFFSET as i64; pages past the end are simply empty.
fn limit_clause(page: Option<(usize, usize)>) -> String {
    match page {
        Some((page, size)) => {
            let max = i64::MAX as usize;
            let offset = page.saturating_sub(1).saturating_mul(size).min(max);
            format!(" LIMIT {} OFFSET {}", size.min(max), offset)
        }
        None => String::new(),
    }
}

fn query_towns(
    conn: &Connection,
    filters: &TownFilters,
    page: Option<(usize, usize)>,
) -> rusqlite::Result<Vec<Town>> {
    let (where_sql, binds) = town_where(filters);
    let sql = format!(
        "SELECT id, name, place_code, postal_code, region_code, latitude, longitude, description
         FROM towns {} ORDER BY name COLLATE NOCASE, place_code{}",
        where_sql,
        limit_clause(page)
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(binds), |r| {
            Ok(Town {
                id: r.get(0)?,
                name: r.get(1)?,
                place_code: r.get(2)?,
                postal_code: r.get(3)?,
                region_code: r.get(4)?,
                latitude: r.get::<_, Option<f64>>(5)?.unwrap_or(0.0),
                longitude: r.get::<_, Option<f64>>(6)?.unwrap_or(0.0),
                description: r.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn query_characters(
    conn: &Connection,
    filters: &CharacterFilters,
    page: Option<(usize, usize)>,
) -> rusqlite::Result<Vec<CharacterListItem>> {
    let (where_sql, binds) = character_where(filters);
    let sql = format!(
        "SELECT c.id, c.last_name, c.first_name, c.bio, c.birthplace, c.deathplace,
                c.main_character, c.town_id, t.name, t.place_code, t.region_code
         FROM characters c
         LEFT JOIN towns t ON t.id = c.town_id
         {}
         ORDER BY c.last_name COLLATE NOCASE, c.first_name COLLATE NOCASE, c.id{}",
        where_sql,
        limit_clause(page)
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(binds), |r| {
            Ok(CharacterListItem {
                character: Character {
                    id: r.get(0)?,
                    last_name: r.get(1)?,
                    first_name: r.get(2)?,
                    bio: r.get(3)?,
                    birthplace: r.get(4)?,
                    deathplace: r.get(5)?,
                    main_character: r.get::<_, i64>(6)? != 0,
                    town_id: r.get(7)?,
                },
                town_name: r.get(8)?,
                place_code: r.get(9)?,
                region_code: r.get(10)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn count(conn: &Connection, sql: &str, binds: Vec<SqlValue>) -> rusqlite::Result<usize> {
    let n: i64 = conn.query_row(sql, params_from_iter(binds), |r| r.get(0))?;
    Ok(n.max(0) as usize)
}

pub fn list_towns(
    conn: &Connection,
    filters: &TownFilters,
    page: usize,
    page_size: usize,
) -> rusqlite::Result<Page<Town>> {
    let page = page.max(1);
    let page_size = page_size.max(1);
    let (where_sql, binds) = town_where(filters);
    let total = count(conn, &format!("SELECT COUNT(*) FROM towns {}", where_sql), binds)?;
    let items = query_towns(conn, filters, Some((page, page_size)))?;
    Ok(Page {
        items,
        page,
        page_size,
        total,
    })
}

pub fn list_characters(
    conn: &Connection,
    filters: &CharacterFilters,
    page: usize,
    page_size: usize,
) -> rusqlite::Result<Page<CharacterListItem>> {
    let page = page.max(1);
    let page_size = page_size.max(1);
    let (where_sql, binds) = character_where(filters);
    let total = count(
        conn,
        &format!(
            "SELECT COUNT(*) FROM characters c LEFT JOIN towns t ON t.id = c.town_id {}",
            where_sql
        ),
        binds,
    )?;
    let items = query_characters(conn, filters, Some((page, page_size)))?;
    Ok(Page {
        items,
        page,
        page_size,
        total,
    })
}

pub fn all_towns(conn: &Connection, filters: &TownFilters) -> rusqlite::Result<Vec<Town>> {
    query_towns(conn, filters, None)
}

pub fn all_characters(
    conn: &Connection,
    filters: &CharacterFilters,
) -> rusqlite::Result<Vec<CharacterListItem>> {
    query_characters(conn, filters, None)
}

/// Towns matching by name or place code, then characters matching by name.
/// Terms shorter than [`MIN_SUGGEST_CHARS`] yield nothing.
pub fn suggest(conn: &Connection, term: &str, limit: usize) -> rusqlite::Result<Vec<Suggestion>> {
    let term = term.trim();
    if term.chars().count() < MIN_SUGGEST_CHARS || limit == 0 {
        return Ok(Vec::new());
    }
    let pattern = like_pattern(term);
    let mut out: Vec<Suggestion> = Vec::new();

    let mut stmt = conn.prepare(
        "SELECT id, name, place_code FROM towns
         WHERE name LIKE ?1 ESCAPE '\\' OR place_code LIKE ?1 ESCAPE '\\'
         ORDER BY name COLLATE NOCASE LIMIT ?2",
    )?;
    let towns = stmt
        .query_map((&pattern, limit as i64), |r| {
            Ok(Suggestion {
                kind: "town",
                id: r.get(0)?,
                label: r.get(1)?,
                detail: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    out.extend(towns);

    let remaining = limit.saturating_sub(out.len());
    if remaining > 0 {
        let mut stmt = conn.prepare(
            "SELECT c.id, c.first_name, c.last_name, t.name
             FROM characters c
             LEFT JOIN towns t ON t.id = c.town_id
             WHERE c.last_name LIKE ?1 ESCAPE '\\' OR c.first_name LIKE ?1 ESCAPE '\\'
                OR (COALESCE(c.first_name, '') || ' ' || c.last_name) LIKE ?1 ESCAPE '\\'
             ORDER BY c.last_name COLLATE NOCASE, c.first_name COLLATE NOCASE LIMIT ?2",
        )?;
        let characters = stmt
            .query_map((&pattern, remaining as i64), |r| {
                let first: Option<String> = r.get(1)?;
                let last: String = r.get(2)?;
                let label = match first.as_deref().map(str::trim) {
                    Some(f) if !f.is_empty() => format!("{} {}", f, last),
                    _ => last,
                };
                Ok(Suggestion {
                    kind: "character",
                    id: r.get(0)?,
                    label,
                    detail: r.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        out.extend(characters);
    }
    Ok(out)
}
