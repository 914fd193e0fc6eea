//! Reading uploaded tables (CSV or spreadsheet workbooks) into rows of cells.

use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("spreadsheet error: {0}")]
    Workbook(#[from] calamine::Error),
    #[error("workbook has no worksheet")]
    NoWorksheet,
    #[error("unsupported file type: {0}")]
    Unsupported(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Cell {
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) | Cell::Bool(_) => false,
        }
    }

    /// Cell content exactly as written, used for header matching.
    pub fn raw_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(f) => {
                if f.fract() == 0.0 {
                    format!("{:.0}", f)
                } else {
                    format!("{}", f)
                }
            }
            Cell::Bool(b) => {
                if *b {
                    "TRUE".to_string()
                } else {
                    "FALSE".to_string()
                }
            }
        }
    }

    pub fn text(&self) -> String {
        self.raw_text().trim().to_string()
    }

    /// `Ok(None)` for a blank cell, `Err(())` when the content is not a finite number.
    pub fn number(&self) -> Result<Option<f64>, ()> {
        let value = match self {
            Cell::Number(f) => *f,
            Cell::Empty => return Ok(None),
            Cell::Text(s) => {
                let t = s.trim();
                if t.is_empty() {
                    return Ok(None);
                }
                t.replace(',', ".").parse::<f64>().map_err(|_| ())?
            }
            Cell::Bool(_) => return Err(()),
        };
        if value.is_finite() {
            Ok(Some(value))
        } else {
            Err(())
        }
    }

    /// Code-like text. Whole numbers are left-padded with zeros to `width`
    /// digits, since workbooks store codes such as 01004 as the number 1004.
    pub fn code_text(&self, width: usize) -> String {
        match self {
            Cell::Number(f) if f.fract() == 0.0 && *f >= 0.0 => {
                format!("{:0width$.0}", f, width = width)
            }
            _ => self.text(),
        }
    }

    pub fn boolean(&self) -> Option<bool> {
        match self {
            Cell::Bool(b) => Some(*b),
            Cell::Number(f) => Some(*f != 0.0),
            Cell::Text(s) => parse_boolish(s),
            Cell::Empty => None,
        }
    }
}

pub fn parse_boolish(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" => Some(true),
        "0" | "false" | "no" | "n" => Some(false),
        _ => None,
    }
}

pub fn read_table(path: &Path) -> Result<Vec<Vec<Cell>>, SheetError> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "csv" | "txt" => {
            let bytes = std::fs::read(path)?;
            Ok(parse_csv_table(&String::from_utf8_lossy(&bytes)))
        }
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => read_workbook_table(path),
        other => Err(SheetError::Unsupported(other.to_string())),
    }
}

fn read_workbook_table(path: &Path) -> Result<Vec<Vec<Cell>>, SheetError> {
    let mut workbook = open_workbook_auto(path)?;
    let Some(first) = workbook.sheet_names().first().cloned() else {
        return Err(SheetError::NoWorksheet);
    };
    let range = workbook.worksheet_range(&first)?;
    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_from_data).collect())
        .collect())
}

fn cell_from_data(cell: &Data) -> Cell {
    match cell {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Bool(*b),
        Data::Error(e) => Cell::Text(format!("#ERROR: {:?}", e)),
        Data::DateTime(dt) => Cell::Text(format!("{}", dt)),
        Data::DateTimeIso(s) => Cell::Text(s.clone()),
        Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}

/// One table row per CSV record. Quoted cells may span lines, so records
/// rather than input lines are counted; a record's position is its
/// spreadsheet row.
pub fn parse_csv_table(text: &str) -> Vec<Vec<Cell>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut rows: Vec<Vec<Cell>> = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut buf = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                buf.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => record.push(std::mem::take(&mut buf)),
            '\r' if !in_quotes && chars.peek() == Some(&'\n') => {}
            '\n' if !in_quotes => {
                record.push(std::mem::take(&mut buf));
                rows.push(to_cells(std::mem::take(&mut record)));
            }
            _ => buf.push(ch),
        }
    }
    if !buf.is_empty() || !record.is_empty() {
        record.push(buf);
        rows.push(to_cells(record));
    }
    while rows.last().is_some_and(|r| r.iter().all(Cell::is_blank)) {
        rows.pop();
    }
    rows
}

fn to_cells(record: Vec<String>) -> Vec<Cell> {
    record
        .into_iter()
        .map(|s| if s.is_empty() { Cell::Empty } else { Cell::Text(s) })
        .collect()
}
