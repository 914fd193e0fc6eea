use crate::records::{Collection, ColumnKind, Row};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown column {column} for {table}")]
    UnknownColumn { table: &'static str, column: String },
    #[error("invalid value for {table}.{column}")]
    InvalidValue { table: &'static str, column: String },
    #[error("{table} record not found: {id}")]
    NotFound { table: &'static str, id: String },
    #[error("{0}")]
    Backend(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(&'static str, Value),
    IsNull(&'static str),
}

impl Filter {
    pub fn column(&self) -> &'static str {
        match self {
            Filter::Eq(c, _) | Filter::IsNull(c) => c,
        }
    }
}

/// The operations the rest of the daemon needs from persistent storage.
///
/// `insert_batch` is all-or-nothing: either every row is stored or none is.
/// `fetch_page` signals the end of data by returning fewer rows than `limit`.
pub trait RecordStore {
    fn fetch_page(
        &self,
        collection: Collection,
        columns: &[&str],
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Row>, StoreError>;

    fn fetch_by_filter(&self, collection: Collection, filter: &Filter)
        -> Result<Vec<Row>, StoreError>;

    fn insert_batch(&self, collection: Collection, rows: &[Row]) -> Result<usize, StoreError>;

    fn update(&self, collection: Collection, id: &str, fields: &Row) -> Result<(), StoreError>;

    fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError>;
}

fn check_column(collection: Collection, column: &str) -> Result<ColumnKind, StoreError> {
    collection
        .column_kind(column)
        .ok_or_else(|| StoreError::UnknownColumn {
            table: collection.table(),
            column: column.to_string(),
        })
}

fn to_sql_value(
    collection: Collection,
    column: &str,
    kind: ColumnKind,
    v: &Value,
) -> Result<SqlValue, StoreError> {
    let invalid = || StoreError::InvalidValue {
        table: collection.table(),
        column: column.to_string(),
    };
    match (kind, v) {
        (_, Value::Null) => Ok(SqlValue::Null),
        (ColumnKind::Text, Value::String(s)) => Ok(SqlValue::Text(s.clone())),
        (ColumnKind::Real, Value::Number(n)) => n.as_f64().map(SqlValue::Real).ok_or_else(invalid),
        (ColumnKind::Bool, Value::Bool(b)) => Ok(SqlValue::Integer(if *b { 1 } else { 0 })),
        _ => Err(invalid()),
    }
}

fn read_column(row: &rusqlite::Row<'_>, idx: usize, kind: ColumnKind) -> rusqlite::Result<Value> {
    Ok(match kind {
        ColumnKind::Text => row
            .get::<_, Option<String>>(idx)?
            .map(Value::String)
            .unwrap_or(Value::Null),
        ColumnKind::Real => row
            .get::<_, Option<f64>>(idx)?
            .map(Value::from)
            .unwrap_or(Value::Null),
        ColumnKind::Bool => row
            .get::<_, Option<i64>>(idx)?
            .map(|n| Value::Bool(n != 0))
            .unwrap_or(Value::Null),
    })
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// [`RecordStore`] backed by the workspace SQLite database.
pub struct SqliteStore<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    fn select(
        &self,
        collection: Collection,
        columns: &[(&str, ColumnKind)],
        tail: &str,
        binds: Vec<SqlValue>,
    ) -> Result<Vec<Row>, StoreError> {
        let select_list = columns
            .iter()
            .map(|(c, _)| *c)
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {} FROM {} {}",
            select_list,
            collection.table(),
            tail
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(binds), |r| {
                let mut out = Row::new();
                for (i, (name, kind)) in columns.iter().enumerate() {
                    out.insert((*name).to_string(), read_column(r, i, *kind)?);
                }
                Ok(out)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl RecordStore for SqliteStore<'_> {
    fn fetch_page(
        &self,
        collection: Collection,
        columns: &[&str],
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Row>, StoreError> {
        let cols = columns
            .iter()
            .map(|c| check_column(collection, c).map(|k| (*c, k)))
            .collect::<Result<Vec<_>, _>>()?;
        self.select(
            collection,
            &cols,
            "ORDER BY rowid LIMIT ? OFFSET ?",
            vec![SqlValue::Integer(limit as i64), SqlValue::Integer(offset as i64)],
        )
    }

    fn fetch_by_filter(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Vec<Row>, StoreError> {
        let kind = check_column(collection, filter.column())?;
        let cols = collection
            .columns()
            .map(|c| (c, collection.column_kind(c).unwrap_or(ColumnKind::Text)))
            .collect::<Vec<_>>();
        match filter {
            Filter::Eq(column, v) => {
                let bind = to_sql_value(collection, column, kind, v)?;
                self.select(
                    collection,
                    &cols,
                    &format!("WHERE {} = ? ORDER BY rowid", column),
                    vec![bind],
                )
            }
            Filter::IsNull(column) => self.select(
                collection,
                &cols,
                &format!("WHERE {} IS NULL ORDER BY rowid", column),
                Vec::new(),
            ),
        }
    }

    fn insert_batch(&self, collection: Collection, rows: &[Row]) -> Result<usize, StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        let now = now_rfc3339();
        for row in rows {
            let mut names: Vec<&str> = vec!["id", "updated_at"];
            let mut binds: Vec<SqlValue> = vec![
                SqlValue::Text(Uuid::new_v4().to_string()),
                SqlValue::Text(now.clone()),
            ];
            for (column, v) in row {
                if column == "id" || column == "updated_at" {
                    continue;
                }
                let kind = check_column(collection, column)?;
                binds.push(to_sql_value(collection, column, kind, v)?);
                names.push(column.as_str());
            }
            let placeholders = vec!["?"; names.len()].join(", ");
            let sql = format!(
                "INSERT INTO {}({}) VALUES({})",
                collection.table(),
                names.join(", "),
                placeholders
            );
            // Dropping `tx` on the error path rolls the whole batch back.
            tx.execute(&sql, params_from_iter(binds))?;
        }
        tx.commit()?;
        Ok(rows.len())
    }

    fn update(&self, collection: Collection, id: &str, fields: &Row) -> Result<(), StoreError> {
        let mut set_parts: Vec<String> = Vec::new();
        let mut binds: Vec<SqlValue> = Vec::new();
        for (column, v) in fields {
            if column == "id" || column == "updated_at" {
                continue;
            }
            let kind = check_column(collection, column)?;
            binds.push(to_sql_value(collection, column, kind, v)?);
            set_parts.push(format!("{} = ?", column));
        }
        set_parts.push("updated_at = ?".into());
        binds.push(SqlValue::Text(now_rfc3339()));
        binds.push(SqlValue::Text(id.to_string()));

        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?",
            collection.table(),
            set_parts.join(", ")
        );
        let changed = self.conn.execute(&sql, params_from_iter(binds))?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                table: collection.table(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        let sql = format!("DELETE FROM {} WHERE id = ?", collection.table());
        let changed = self.conn.execute(&sql, [id])?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                table: collection.table(),
                id: id.to_string(),
            });
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use serde_json::json;

    fn row(v: Value) -> Row {
        v.as_object().cloned().unwrap_or_default()
    }

    fn open_temp() -> Connection {
        let dir = std::env::temp_dir().join(format!("pioneersd-store-{}", Uuid::new_v4()));
        db::open_db(&dir).expect("open db")
    }

    #[test]
    fn sqlite_insert_batch_is_all_or_nothing() {
        let conn = open_temp();
        let store = SqliteStore::new(&conn);
        let batch = vec![
            row(json!({ "name": "Brouage", "place_code": "17200" })),
            row(json!({ "name": "Hiers", "place_code": "17200" })),
        ];
        let res = store.insert_batch(Collection::Towns, &batch);
        assert!(res.is_err(), "duplicate code must reject the batch");
        let page = store
            .fetch_page(Collection::Towns, &["id", "place_code"], 0, 10)
            .expect("fetch page");
        assert!(page.is_empty());
    }

    #[test]
    fn sqlite_fetch_page_reports_end_of_data_with_short_page() {
        let conn = open_temp();
        let store = SqliteStore::new(&conn);
        let batch = (0..5)
            .map(|i| row(json!({ "name": format!("T{i}"), "place_code": format!("{i:05}") })))
            .collect::<Vec<_>>();
        assert_eq!(store.insert_batch(Collection::Towns, &batch).expect("insert"), 5);

        let first = store
            .fetch_page(Collection::Towns, &["id", "place_code"], 0, 3)
            .expect("page 1");
        let second = store
            .fetch_page(Collection::Towns, &["id", "place_code"], 3, 3)
            .expect("page 2");
        assert_eq!(first.len(), 3);
        assert_eq!(second.len(), 2);
        assert_eq!(second[1].get("place_code"), Some(&json!("00004")));
        assert!(first[0].get("name").is_none());
    }

    #[test]
    fn sqlite_rejects_unknown_columns() {
        let conn = open_temp();
        let store = SqliteStore::new(&conn);
        let err = store
            .fetch_page(Collection::Characters, &["place_code"], 0, 10)
            .expect_err("characters have no place_code column");
        assert!(matches!(err, StoreError::UnknownColumn { .. }));
    }

    #[test]
    fn sqlite_update_and_delete_report_missing_ids() {
        let conn = open_temp();
        let store = SqliteStore::new(&conn);
        let err = store
            .update(Collection::Towns, "nope", &row(json!({ "name": "X" })))
            .expect_err("missing id");
        assert!(matches!(err, StoreError::NotFound { .. }));
        let err = store
            .delete(Collection::Characters, "nope")
            .expect_err("missing id");
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn sqlite_filters_by_null_town() {
        let conn = open_temp();
        let store = SqliteStore::new(&conn);
        store
            .insert_batch(
                Collection::Characters,
                &[row(json!({ "last_name": "Champlain", "main_character": true }))],
            )
            .expect("insert");
        let rows = store
            .fetch_by_filter(Collection::Characters, &Filter::IsNull("town_id"))
            .expect("filter");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("main_character"), Some(&json!(true)));
    }
}
