use crate::records::{non_empty_trimmed, NewCharacter, NewTown};
use crate::sheet::Cell;
use std::collections::HashSet;

/// A parsed record and the spreadsheet row it came from (header is row 1).
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed<T> {
    pub row: usize,
    pub record: T,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRows<T> {
    pub rows: Vec<Parsed<T>>,
    pub errors: Vec<String>,
}

/// A character row before its place code is resolved to a town id.
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterDraft {
    pub character: NewCharacter,
    pub place_code: Option<String>,
}

const EMPTY: Cell = Cell::Empty;

/// Place codes are five characters; numeric workbook cells lose their leading zeros.
const PLACE_CODE_WIDTH: usize = 5;

fn cell(row: &[Cell], idx: usize) -> &Cell {
    row.get(idx).unwrap_or(&EMPTY)
}

fn optional_text(row: &[Cell], idx: usize) -> Option<String> {
    non_empty_trimmed(&cell(row, idx).raw_text())
}

fn spreadsheet_row(data_index: usize) -> usize {
    data_index + 2
}

/// Town columns, in order: name, place code, postal code, region code,
/// description, latitude, longitude.
///
/// Rows with errors are reported and left out of `rows`; callers treat a
/// non-empty `errors` as fatal for the whole upload.
pub fn parse_town_rows(data: &[Vec<Cell>], require_region_code: bool) -> ParsedRows<NewTown> {
    let mut rows = Vec::new();
    let mut errors = Vec::new();
    let mut seen_codes = HashSet::<String>::new();
    let mut duplicate_codes: Vec<String> = Vec::new();

    for (i, raw) in data.iter().enumerate() {
        if raw.iter().all(Cell::is_blank) {
            continue;
        }
        let row_no = spreadsheet_row(i);
        let errors_before = errors.len();

        let name = cell(raw, 0).text();
        let place_code = cell(raw, 1).code_text(PLACE_CODE_WIDTH);
        let postal_code = optional_text(raw, 2);
        let region_code = optional_text(raw, 3);
        let description = optional_text(raw, 4);

        if name.is_empty() {
            errors.push(format!("row {}: name is required", row_no));
        }
        if place_code.is_empty() {
            errors.push(format!("row {}: place code is required", row_no));
        } else if !seen_codes.insert(place_code.clone()) && !duplicate_codes.contains(&place_code) {
            duplicate_codes.push(place_code.clone());
        }
        if require_region_code && region_code.is_none() {
            errors.push(format!("row {}: region code is required", row_no));
        }

        let mut coordinate = |idx: usize, label: &str| match cell(raw, idx).number() {
            Ok(v) => v.unwrap_or(0.0),
            Err(()) => {
                errors.push(format!("row {}: {} must be numeric", row_no, label));
                0.0
            }
        };
        let latitude = coordinate(5, "latitude");
        let longitude = coordinate(6, "longitude");

        if errors.len() == errors_before {
            rows.push(Parsed {
                row: row_no,
                record: NewTown {
                    name,
                    place_code,
                    postal_code,
                    region_code,
                    latitude,
                    longitude,
                    description,
                },
            });
        }
    }

    if !duplicate_codes.is_empty() {
        errors.push(format!(
            "duplicate place codes in file: {}",
            duplicate_codes.join(", ")
        ));
    }

    ParsedRows { rows, errors }
}

/// Character columns, in order: principal subject flag, last name, first name,
/// place code, birthplace, deathplace, biography.
pub fn parse_character_rows(data: &[Vec<Cell>]) -> ParsedRows<CharacterDraft> {
    let mut rows = Vec::new();
    let mut errors = Vec::new();

    for (i, raw) in data.iter().enumerate() {
        if raw.iter().all(Cell::is_blank) {
            continue;
        }
        let row_no = spreadsheet_row(i);

        let last_name = cell(raw, 1).text();
        if last_name.is_empty() {
            errors.push(format!("row {}: last name is required", row_no));
            continue;
        }

        rows.push(Parsed {
            row: row_no,
            record: CharacterDraft {
                character: NewCharacter {
                    main_character: cell(raw, 0).boolean().unwrap_or(false),
                    last_name,
                    first_name: optional_text(raw, 2),
                    birthplace: optional_text(raw, 4),
                    deathplace: optional_text(raw, 5),
                    bio: optional_text(raw, 6),
                    town_id: None,
                },
                place_code: non_empty_trimmed(&cell(raw, 3).code_text(PLACE_CODE_WIDTH)),
            },
        });
    }

    ParsedRows { rows, errors }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_row(values: &[&str]) -> Vec<Cell> {
        values
            .iter()
            .map(|s| {
                if s.is_empty() {
                    Cell::Empty
                } else {
                    Cell::Text((*s).to_string())
                }
            })
            .collect()
    }

    #[test]
    fn blank_rows_produce_nothing() {
        let data = vec![
            text_row(&["", "", ""]),
            vec![Cell::Text("   ".into()), Cell::Empty],
            Vec::new(),
        ];
        let towns = parse_town_rows(&data, true);
        assert!(towns.rows.is_empty());
        assert!(towns.errors.is_empty());
        let characters = parse_character_rows(&data);
        assert!(characters.rows.is_empty());
        assert!(characters.errors.is_empty());
    }

    #[test]
    fn town_row_fields_are_trimmed_and_coordinates_coerced() {
        let data = vec![vec![
            Cell::Text("  Brouage ".into()),
            Cell::Number(17200.0),
            Cell::Text("17320".into()),
            Cell::Text(" 17 ".into()),
            Cell::Empty,
            Cell::Text("45.86".into()),
            Cell::Empty,
        ]];
        let parsed = parse_town_rows(&data, true);
        assert!(parsed.errors.is_empty(), "{:?}", parsed.errors);
        let town = &parsed.rows[0];
        assert_eq!(town.row, 2);
        assert_eq!(town.record.name, "Brouage");
        assert_eq!(town.record.place_code, "17200");
        assert_eq!(town.record.region_code.as_deref(), Some("17"));
        assert_eq!(town.record.description, None);
        assert_eq!(town.record.latitude, 45.86);
        assert_eq!(town.record.longitude, 0.0);
    }

    #[test]
    fn missing_name_cites_spreadsheet_row() {
        let data = vec![
            text_row(&["Brouage", "17200", "", "17", "", "", ""]),
            text_row(&["", "17201", "", "17", "", "", ""]),
            text_row(&["Hiers", "17202", "", "17", "", "", ""]),
        ];
        let parsed = parse_town_rows(&data, true);
        assert_eq!(parsed.errors, vec!["row 3: name is required".to_string()]);
        assert_eq!(parsed.rows.len(), 2);
    }

    #[test]
    fn region_code_requirement_is_configurable() {
        let data = vec![text_row(&["Brouage", "17200"])];
        assert_eq!(
            parse_town_rows(&data, true).errors,
            vec!["row 2: region code is required".to_string()]
        );
        assert!(parse_town_rows(&data, false).errors.is_empty());
    }

    #[test]
    fn non_numeric_coordinates_are_row_errors() {
        let data = vec![text_row(&["Brouage", "17200", "", "17", "", "north", "x"])];
        let parsed = parse_town_rows(&data, true);
        assert_eq!(
            parsed.errors,
            vec![
                "row 2: latitude must be numeric".to_string(),
                "row 2: longitude must be numeric".to_string()
            ]
        );
        assert!(parsed.rows.is_empty());
    }

    #[test]
    fn non_finite_coordinates_are_row_errors() {
        let data = vec![
            text_row(&["Brouage", "17200", "", "17", "", "45.8", "-1.0"]),
            text_row(&["Hiers", "17189", "", "17", "", "NaN", "inf"]),
        ];
        let parsed = parse_town_rows(&data, true);
        assert_eq!(
            parsed.errors,
            vec![
                "row 3: latitude must be numeric".to_string(),
                "row 3: longitude must be numeric".to_string()
            ]
        );
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0].record.name, "Brouage");
    }

    #[test]
    fn numeric_place_codes_are_zero_padded() {
        let towns = vec![vec![
            Cell::Text("Ambérieu-en-Bugey".into()),
            Cell::Number(1004.0),
            Cell::Empty,
            Cell::Text("01".into()),
        ]];
        let parsed = parse_town_rows(&towns, true);
        assert_eq!(parsed.rows[0].record.place_code, "01004");

        let characters = vec![vec![
            Cell::Empty,
            Cell::Text("Vaugelas".into()),
            Cell::Empty,
            Cell::Number(1004.0),
        ]];
        let parsed = parse_character_rows(&characters);
        assert_eq!(parsed.rows[0].record.place_code.as_deref(), Some("01004"));
    }

    #[test]
    fn duplicate_codes_add_one_aggregate_error() {
        let data = vec![
            text_row(&["A", "100", "", "1"]),
            text_row(&["B", "200", "", "1"]),
            text_row(&["C", "100", "", "1"]),
            text_row(&["D", "100", "", "1"]),
            text_row(&["", "200", "", "1"]),
        ];
        let parsed = parse_town_rows(&data, true);
        assert_eq!(
            parsed.errors,
            vec![
                "row 6: name is required".to_string(),
                "duplicate place codes in file: 100, 200".to_string()
            ]
        );
    }

    #[test]
    fn character_rows_parse_flag_and_optional_place_code() {
        let data = vec![
            vec![
                Cell::Bool(true),
                Cell::Text("Champlain".into()),
                Cell::Text("Samuel".into()),
                Cell::Number(17200.0),
            ],
            text_row(&["FALSE", "Hébert", "", "", "Paris"]),
            text_row(&["true", "", "Marie"]),
        ];
        let parsed = parse_character_rows(&data);
        assert_eq!(parsed.errors, vec!["row 4: last name is required".to_string()]);
        assert_eq!(parsed.rows.len(), 2);

        let first = &parsed.rows[0].record;
        assert!(first.character.main_character);
        assert_eq!(first.place_code.as_deref(), Some("17200"));
        assert_eq!(first.character.first_name.as_deref(), Some("Samuel"));

        let second = &parsed.rows[1].record;
        assert!(!second.character.main_character);
        assert_eq!(second.place_code, None);
        assert_eq!(second.character.birthplace.as_deref(), Some("Paris"));
    }
}
