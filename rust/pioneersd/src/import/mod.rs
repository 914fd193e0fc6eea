//! Bulk import of uploaded town / character tables.
//!
//! Stages: header check, row parsing, reconciliation against stored towns,
//! chunked inserts. Schema and row problems stop the import before anything is
//! written; rejected chunks are reported without stopping later chunks.

mod batch;
mod reconcile;
mod rows;
mod schema;

pub use schema::TableKind;

use batch::insert_in_chunks;
use rows::{parse_character_rows, parse_town_rows};
use schema::validate_headers;

use crate::records::{to_row, Collection, Row};
use crate::sheet::Cell;
use crate::store::{RecordStore, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const DEFAULT_PAGE_SIZE: usize = 1000;
const MAX_CHUNK_SIZE: usize = 5000;
const MAX_PAGE_SIZE: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImportConfig {
    pub chunk_size: usize,
    pub page_size: usize,
    pub require_region_code: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            page_size: DEFAULT_PAGE_SIZE,
            require_region_code: true,
        }
    }
}

impl ImportConfig {
    /// Build from a stored settings section, falling back to defaults for
    /// anything missing or malformed.
    pub fn from_json(v: &Value) -> Self {
        serde_json::from_value::<ImportConfig>(v.clone())
            .unwrap_or_default()
            .clamped()
    }

    pub fn with_overrides(mut self, params: &Value) -> Self {
        if let Some(n) = params.get("chunkSize").and_then(Value::as_u64) {
            self.chunk_size = n as usize;
        }
        if let Some(n) = params.get("pageSize").and_then(Value::as_u64) {
            self.page_size = n as usize;
        }
        if let Some(b) = params.get("requireRegionCode").and_then(Value::as_bool) {
            self.require_region_code = b;
        }
        self.clamped()
    }

    fn clamped(mut self) -> Self {
        self.chunk_size = self.chunk_size.clamp(1, MAX_CHUNK_SIZE);
        self.page_size = self.page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("the uploaded table is empty")]
    EmptyTable,
    #[error("{message}")]
    Schema { message: String },
    #[error("{} row validation error(s)", errors.len())]
    Rows { errors: Vec<String> },
    #[error("no data rows found below the header")]
    NoData,
    #[error("failed to read existing towns: {0}")]
    Store(#[from] StoreError),
}

impl ImportError {
    pub fn code(&self) -> &'static str {
        match self {
            ImportError::EmptyTable | ImportError::NoData => "empty_table",
            ImportError::Schema { .. } => "schema_mismatch",
            ImportError::Rows { .. } => "row_validation_failed",
            ImportError::Store(_) => "store_failed",
        }
    }

    /// Every message the caller should show, one per line.
    pub fn messages(&self) -> Vec<String> {
        match self {
            ImportError::Rows { errors } => errors.clone(),
            other => vec![other.to_string()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    DuplicateCode,
    UnresolvedPlaceCode,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedRow {
    pub row: usize,
    pub label: String,
    pub place_code: Option<String>,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub kind: TableKind,
    pub rows_parsed: usize,
    pub inserted: usize,
    pub batches: usize,
    pub skipped: Vec<SkippedRow>,
    pub batch_errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportPreview {
    pub kind: TableKind,
    pub rows_parsed: usize,
    pub to_insert: usize,
    pub skipped: Vec<SkippedRow>,
}

struct Plan {
    kind: TableKind,
    rows_parsed: usize,
    insertable: Vec<Row>,
    skipped: Vec<SkippedRow>,
}

fn plan(
    store: &dyn RecordStore,
    table: &[Vec<Cell>],
    expected: Option<TableKind>,
    config: &ImportConfig,
) -> Result<Plan, ImportError> {
    let Some((header, data)) = table.split_first() else {
        return Err(ImportError::EmptyTable);
    };
    let kind = validate_headers(header)?;
    if let Some(expected) = expected {
        if expected != kind {
            return Err(ImportError::Schema {
                message: format!(
                    "the uploaded headers describe {} but {} were requested",
                    kind.as_str(),
                    expected.as_str()
                ),
            });
        }
    }
    tracing::debug!(kind = kind.as_str(), rows = data.len(), "headers accepted");

    match kind {
        TableKind::Towns => {
            let parsed = parse_town_rows(data, config.require_region_code);
            if !parsed.errors.is_empty() {
                return Err(ImportError::Rows {
                    errors: parsed.errors,
                });
            }
            if parsed.rows.is_empty() {
                return Err(ImportError::NoData);
            }
            let rows_parsed = parsed.rows.len();
            let existing = reconcile::existing_place_codes(store, config.page_size)?;
            let (fresh, skipped) = reconcile::partition_new_towns(parsed.rows, &existing);
            Ok(Plan {
                kind,
                rows_parsed,
                insertable: fresh.iter().map(|t| to_row(&t.record)).collect(),
                skipped,
            })
        }
        TableKind::Characters => {
            let parsed = parse_character_rows(data);
            if !parsed.errors.is_empty() {
                return Err(ImportError::Rows {
                    errors: parsed.errors,
                });
            }
            if parsed.rows.is_empty() {
                return Err(ImportError::NoData);
            }
            let rows_parsed = parsed.rows.len();
            let index = reconcile::place_code_index(store, config.page_size)?;
            let (resolved, skipped) = reconcile::resolve_characters(parsed.rows, &index);
            Ok(Plan {
                kind,
                rows_parsed,
                insertable: resolved.iter().map(|c| to_row(&c.record)).collect(),
                skipped,
            })
        }
    }
}

fn collection_for(kind: TableKind) -> Collection {
    match kind {
        TableKind::Towns => Collection::Towns,
        TableKind::Characters => Collection::Characters,
    }
}

/// Validate and reconcile without writing anything.
pub fn preview_table(
    store: &dyn RecordStore,
    table: &[Vec<Cell>],
    expected: Option<TableKind>,
    config: &ImportConfig,
) -> Result<ImportPreview, ImportError> {
    let plan = plan(store, table, expected, config)?;
    Ok(ImportPreview {
        kind: plan.kind,
        rows_parsed: plan.rows_parsed,
        to_insert: plan.insertable.len(),
        skipped: plan.skipped,
    })
}

pub fn import_table(
    store: &dyn RecordStore,
    table: &[Vec<Cell>],
    expected: Option<TableKind>,
    config: &ImportConfig,
) -> Result<ImportReport, ImportError> {
    let plan = plan(store, table, expected, config)?;
    let collection = collection_for(plan.kind);
    tracing::info!(
        table = collection.table(),
        parsed = plan.rows_parsed,
        insertable = plan.insertable.len(),
        skipped = plan.skipped.len(),
        "import reconciled"
    );

    let outcome = insert_in_chunks(store, collection, &plan.insertable, config.chunk_size);
    tracing::info!(
        table = collection.table(),
        inserted = outcome.inserted,
        batches = outcome.batches,
        failed_batches = outcome.errors.len(),
        "import finished"
    );

    Ok(ImportReport {
        kind: plan.kind,
        rows_parsed: plan.rows_parsed,
        inserted: outcome.inserted,
        batches: outcome.batches,
        skipped: plan.skipped,
        batch_errors: outcome.errors,
    })
}

impl ImportReport {
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| json!({}))
    }
}
