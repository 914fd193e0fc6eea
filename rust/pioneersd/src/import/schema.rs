use super::ImportError;
use crate::sheet::Cell;
use serde::Serialize;

pub const TOWN_HEADERS: [&str; 7] = [
    "Name",
    "Place Code",
    "Postal Code",
    "Region Code",
    "Description",
    "Latitude",
    "Longitude",
];

pub const CHARACTER_HEADERS: [&str; 7] = [
    "Principal Subject",
    "Last Name",
    "First Name",
    "Place Code",
    "Birthplace",
    "Deathplace",
    "Biography",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TableKind {
    Towns,
    Characters,
}

impl TableKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "towns" => Some(TableKind::Towns),
            "characters" => Some(TableKind::Characters),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TableKind::Towns => "towns",
            TableKind::Characters => "characters",
        }
    }

    pub fn headers(self) -> &'static [&'static str] {
        match self {
            TableKind::Towns => &TOWN_HEADERS,
            TableKind::Characters => &CHARACTER_HEADERS,
        }
    }
}

/// Match the header row against the two known layouts. Matching is exact:
/// same names, same order, same count, no trimming or case folding. Empty
/// cells after the last header are ignored since spreadsheet readers pad rows
/// to the widest row of the sheet.
pub fn validate_headers(header_row: &[Cell]) -> Result<TableKind, ImportError> {
    let mut end = header_row.len();
    while end > 0 && header_row[end - 1] == Cell::Empty {
        end -= 1;
    }
    let headers = header_row[..end]
        .iter()
        .map(Cell::raw_text)
        .collect::<Vec<_>>();

    for kind in [TableKind::Towns, TableKind::Characters] {
        if headers.iter().map(String::as_str).eq(kind.headers().iter().copied()) {
            return Ok(kind);
        }
    }

    Err(ImportError::Schema {
        message: format!(
            "unrecognised column headers [{}]; expected towns [{}] or characters [{}]",
            headers.join(", "),
            TOWN_HEADERS.join(", "),
            CHARACTER_HEADERS.join(", ")
        ),
    })
}
