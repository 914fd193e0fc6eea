use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A record as exchanged with a [`crate::store::RecordStore`]: column name to JSON value.
pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Towns,
    Characters,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Real,
    Bool,
}

const TOWN_COLUMNS: &[(&str, ColumnKind)] = &[
    ("id", ColumnKind::Text),
    ("name", ColumnKind::Text),
    ("place_code", ColumnKind::Text),
    ("postal_code", ColumnKind::Text),
    ("region_code", ColumnKind::Text),
    ("latitude", ColumnKind::Real),
    ("longitude", ColumnKind::Real),
    ("description", ColumnKind::Text),
    ("updated_at", ColumnKind::Text),
];

const CHARACTER_COLUMNS: &[(&str, ColumnKind)] = &[
    ("id", ColumnKind::Text),
    ("last_name", ColumnKind::Text),
    ("first_name", ColumnKind::Text),
    ("bio", ColumnKind::Text),
    ("birthplace", ColumnKind::Text),
    ("deathplace", ColumnKind::Text),
    ("main_character", ColumnKind::Bool),
    ("town_id", ColumnKind::Text),
    ("updated_at", ColumnKind::Text),
];

impl Collection {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "towns" | "town" => Some(Collection::Towns),
            "characters" | "character" => Some(Collection::Characters),
            _ => None,
        }
    }

    pub fn table(self) -> &'static str {
        match self {
            Collection::Towns => "towns",
            Collection::Characters => "characters",
        }
    }

    pub fn columns(self) -> impl Iterator<Item = &'static str> {
        self.schema().iter().map(|(name, _)| *name)
    }

    pub fn column_kind(self, column: &str) -> Option<ColumnKind> {
        self.schema()
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, kind)| *kind)
    }

    fn schema(self) -> &'static [(&'static str, ColumnKind)] {
        match self {
            Collection::Towns => TOWN_COLUMNS,
            Collection::Characters => CHARACTER_COLUMNS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Town {
    pub id: String,
    pub name: String,
    pub place_code: String,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub region_code: Option<String>,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    #[serde(default)]
    pub description: Option<String>,
}

impl Town {
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "id": self.id,
            "name": self.name,
            "placeCode": self.place_code,
            "postalCode": self.postal_code,
            "regionCode": self.region_code,
            "position": [self.latitude, self.longitude],
            "description": self.description,
        })
    }
}

/// A town as parsed from an upload, before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTown {
    pub name: String,
    pub place_code: String,
    pub postal_code: Option<String>,
    pub region_code: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: String,
    pub last_name: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub birthplace: Option<String>,
    #[serde(default)]
    pub deathplace: Option<String>,
    #[serde(default)]
    pub main_character: bool,
    #[serde(default)]
    pub town_id: Option<String>,
}

impl Character {
    pub fn display_name(&self) -> String {
        match self.first_name.as_deref() {
            Some(first) if !first.is_empty() => format!("{} {}", first, self.last_name),
            _ => self.last_name.clone(),
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "id": self.id,
            "lastName": self.last_name,
            "firstName": self.first_name,
            "displayName": self.display_name(),
            "bio": self.bio,
            "birthplace": self.birthplace,
            "deathplace": self.deathplace,
            "mainCharacter": self.main_character,
            "townId": self.town_id,
        })
    }
}

/// A character ready for insertion. The upload's place code has already been
/// resolved into `town_id` and is not part of the stored shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCharacter {
    pub last_name: String,
    pub first_name: Option<String>,
    pub bio: Option<String>,
    pub birthplace: Option<String>,
    pub deathplace: Option<String>,
    pub main_character: bool,
    pub town_id: Option<String>,
}

pub fn to_row<T: Serialize>(value: &T) -> Row {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map,
        _ => Row::new(),
    }
}

pub fn from_row<T: DeserializeOwned>(row: Row) -> Result<T, serde_json::Error> {
    serde_json::from_value(Value::Object(row))
}

pub fn non_empty_trimmed(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}
