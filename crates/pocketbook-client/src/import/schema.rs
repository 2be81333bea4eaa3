use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::ImportConfig;
use crate::import::input::RawSource;
use crate::import::invalid_input_error;
use crate::{ClientError, ClientResult};

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct CatalogEntry {
    pub name: String,
    pub position: usize,
}

/// Distinct header names in file order. Empty for JSON and headerless sources.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize)]
pub struct ColumnCatalog {
    entries: Vec<CatalogEntry>,
}

impl ColumnCatalog {
    /// Builds a catalog from raw header cells. Blank cells and repeated names are
    /// skipped; the first occurrence of a name keeps its position.
    pub fn from_header_cells(cells: &[String]) -> Self {
        let mut entries: Vec<CatalogEntry> = Vec::new();
        for (position, cell) in cells.iter().enumerate() {
            let name = unquote(cell.trim());
            if name.is_empty() || entries.iter().any(|entry| entry.name == name) {
                continue;
            }
            entries.push(CatalogEntry {
                name: name.to_string(),
                position,
            });
        }
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.name.clone()).collect()
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn position_of(&self, name: &str) -> Option<usize> {
        let wanted = name.trim();
        self.entries
            .iter()
            .find(|entry| entry.name == wanted)
            .map(|entry| entry.position)
    }

    /// Case-insensitive lookup used for the optional `tags`/`recurring` columns.
    pub fn position_of_any(&self, names: &[&str]) -> Option<usize> {
        self.entries
            .iter()
            .find(|entry| {
                let lowered = entry.name.to_lowercase();
                names.iter().any(|candidate| lowered == *candidate)
            })
            .map(|entry| entry.position)
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DelimitedRow {
    pub row: i64,
    pub cells: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JsonRow {
    pub row: i64,
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawRow {
    Delimited(DelimitedRow),
    Json(JsonRow),
}

impl RawRow {
    pub fn row_number(&self) -> i64 {
        match self {
            Self::Delimited(row) => row.row,
            Self::Json(row) => row.row,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawValue<'a> {
    Text(&'a str),
    Json(&'a Value),
}

impl RawValue<'_> {
    /// String form of the value; `None` for JSON null.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Text(value) => Some((*value).to_string()),
            Self::Json(value) => json_value_text(value),
        }
    }
}

fn json_value_text(value: &Value) -> Option<String> {
    if value.is_null() {
        return None;
    }

    if let Some(string_value) = value.as_str() {
        return Some(string_value.to_string());
    }

    if let Some(integer_value) = value.as_i64() {
        return Some(integer_value.to_string());
    }

    if let Some(number_value) = value.as_f64() {
        return Some(number_value.to_string());
    }

    Some(value.to_string())
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectedSchema {
    pub columns: ColumnCatalog,
    pub rows: Vec<RawRow>,
}

pub fn detect_schema(source: &RawSource, config: &ImportConfig) -> ClientResult<DetectedSchema> {
    match source {
        RawSource::Delimited { lines } => detect_delimited(lines, config),
        RawSource::Json { text } => detect_json(text),
    }
}

fn detect_delimited(lines: &[String], config: &ImportConfig) -> ClientResult<DetectedSchema> {
    let records = split_records(lines, config.separator.as_byte())?;

    let mut records_iter = records.into_iter();
    let columns = if config.has_headers {
        match records_iter.next() {
            Some(header_cells) => ColumnCatalog::from_header_cells(&header_cells),
            None => ColumnCatalog::default(),
        }
    } else {
        ColumnCatalog::default()
    };

    let rows = records_iter
        .enumerate()
        .map(|(index, cells)| {
            RawRow::Delimited(DelimitedRow {
                row: (index as i64) + 1,
                cells: cells.iter().map(|cell| unquote(cell).to_string()).collect(),
            })
        })
        .collect::<Vec<RawRow>>();

    debug!(
        columns = columns.len(),
        rows = rows.len(),
        has_headers = config.has_headers,
        "detected delimited schema"
    );

    Ok(DetectedSchema { columns, rows })
}

fn split_records(lines: &[String], delimiter: u8) -> ClientResult<Vec<Vec<String>>> {
    let joined = lines.join("\n");
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(joined.as_bytes());

    let mut records = Vec::new();
    for result_row in reader.records() {
        let record = result_row
            .map_err(|error| invalid_input_error(&format!("Delimited rows are malformed: {error}")))?;
        records.push(record.iter().map(str::to_string).collect::<Vec<String>>());
    }
    Ok(records)
}

fn detect_json(text: &str) -> ClientResult<DetectedSchema> {
    let parsed = serde_json::from_str::<Value>(text.trim())
        .map_err(|error| ClientError::invalid_json(&error.to_string()))?;

    let items = match parsed {
        Value::Array(items) => items,
        Value::Object(mut object) => match object.remove("data") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    let rows = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let fields = match item {
                Value::Object(object) => object,
                _ => Map::new(),
            };
            RawRow::Json(JsonRow {
                row: (index as i64) + 1,
                fields,
            })
        })
        .collect::<Vec<RawRow>>();

    debug!(rows = rows.len(), "detected json records");

    Ok(DetectedSchema {
        columns: ColumnCatalog::default(),
        rows,
    })
}

fn unquote(value: &str) -> &str {
    let trimmed = value.trim();
    for quote in ['"', '\''] {
        if trimmed.len() >= 2
            && let Some(inner) = trimmed
                .strip_prefix(quote)
                .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner.trim();
        }
    }
    trimmed
}
