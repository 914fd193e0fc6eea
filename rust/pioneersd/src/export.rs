//! CSV rendering of the listing screens.

use crate::catalog::CharacterListItem;
use crate::records::Town;
use std::path::Path;

pub const TOWN_EXPORT_HEADERS: [&str; 7] = [
    "Name",
    "Place Code",
    "Postal Code",
    "Region Code",
    "Latitude",
    "Longitude",
    "Description",
];

pub const CHARACTER_EXPORT_HEADERS: [&str; 8] = [
    "First Name",
    "Last Name",
    "Birthplace",
    "Deathplace",
    "Town",
    "Region Code",
    "Principal Subject",
    "Biography",
];

/// Every field is quoted, embedded quotes doubled.
pub fn csv_field(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn csv_line<S: AsRef<str>>(fields: &[S]) -> String {
    fields
        .iter()
        .map(|f| csv_field(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

fn opt(s: &Option<String>) -> String {
    s.clone().unwrap_or_default()
}

pub fn towns_csv(towns: &[Town]) -> String {
    let mut lines = vec![csv_line(&TOWN_EXPORT_HEADERS)];
    for t in towns {
        lines.push(csv_line(&[
            t.name.clone(),
            t.place_code.clone(),
            opt(&t.postal_code),
            opt(&t.region_code),
            t.latitude.to_string(),
            t.longitude.to_string(),
            opt(&t.description),
        ]));
    }
    lines.join("\n")
}

pub fn characters_csv(items: &[CharacterListItem]) -> String {
    let mut lines = vec![csv_line(&CHARACTER_EXPORT_HEADERS)];
    for item in items {
        let c = &item.character;
        lines.push(csv_line(&[
            opt(&c.first_name),
            c.last_name.clone(),
            opt(&c.birthplace),
            opt(&c.deathplace),
            opt(&item.town_name),
            opt(&item.region_code),
            if c.main_character { "Yes" } else { "No" }.to_string(),
            opt(&c.bio),
        ]));
    }
    lines.join("\n")
}

pub fn write_text_file(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)
}
