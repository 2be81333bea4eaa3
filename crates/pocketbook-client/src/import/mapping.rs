use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::import::schema::{ColumnCatalog, RawRow, RawValue};
use crate::{ClientError, ClientResult};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    Date,
    Type,
    Amount,
    Description,
    Category,
    AccountName,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 6] = [
        CanonicalField::Date,
        CanonicalField::Type,
        CanonicalField::Amount,
        CanonicalField::Description,
        CanonicalField::Category,
        CanonicalField::AccountName,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Type => "type",
            Self::Amount => "amount",
            Self::Description => "description",
            Self::Category => "category",
            Self::AccountName => "account_name",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|field| field.as_str() == value.trim())
    }

    pub fn is_required(&self) -> bool {
        matches!(self, Self::Date | Self::Amount | Self::Description)
    }

    /// Lower-case substrings that mark a header as this field.
    fn synonyms(&self) -> &'static [&'static str] {
        match self {
            Self::Date => &["fecha", "date"],
            Self::Type => &["tipo", "type"],
            Self::Amount => &["monto", "amount", "valor"],
            Self::Description => &["descripcion", "description", "concepto"],
            Self::Category => &["categoria", "category"],
            Self::AccountName => &["cuenta", "account"],
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

const TAGS_HEADERS: [&str; 2] = ["tags", "etiquetas"];
const RECURRING_HEADERS: [&str; 2] = ["recurring", "recurrente"];

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ColumnRef {
    Name(String),
    /// 1-based position, for files without a header row.
    Position(usize),
}

impl ColumnRef {
    /// Headered files take names verbatim; headerless files need `#n` or `n`.
    pub fn parse(field: CanonicalField, value: &str, has_headers: bool) -> ClientResult<Self> {
        let trimmed = value.trim();
        if has_headers {
            return Ok(Self::Name(trimmed.to_string()));
        }

        let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
        match digits.parse::<usize>() {
            Ok(position) if position > 0 => Ok(Self::Position(position)),
            _ => Err(ClientError::invalid_column_ref(field.as_str(), trimmed)),
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::Name(name) => name.clone(),
            Self::Position(position) => format!("#{position}"),
        }
    }
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct MappingDraft {
    columns: BTreeMap<CanonicalField, ColumnRef>,
}

impl MappingDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: CanonicalField, column: ColumnRef) -> Self {
        if matches!(&column, ColumnRef::Name(name) if name.trim().is_empty()) {
            self.columns.remove(&field);
        } else {
            self.columns.insert(field, column);
        }
        self
    }

    pub fn without(mut self, field: CanonicalField) -> Self {
        self.columns.remove(&field);
        self
    }

    /// Applies explicit choices on top of this draft; an empty value unmaps the field.
    pub fn merged_with(
        self,
        overrides: &MappingOverrides,
        has_headers: bool,
    ) -> ClientResult<Self> {
        let mut draft = self;
        for (field, value) in &overrides.values {
            draft = if value.trim().is_empty() {
                draft.without(*field)
            } else {
                draft.with(*field, ColumnRef::parse(*field, value, has_headers)?)
            };
        }
        Ok(draft)
    }

    pub fn column_for(&self, field: CanonicalField) -> Option<&ColumnRef> {
        self.columns.get(&field)
    }

    pub fn missing_required(&self) -> Vec<CanonicalField> {
        CanonicalField::ALL
            .into_iter()
            .filter(|field| field.is_required() && !self.columns.contains_key(field))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_required().is_empty()
    }

    pub fn freeze(self, catalog: &ColumnCatalog) -> ClientResult<FieldMapping> {
        let missing = self.missing_required();
        if !missing.is_empty() {
            return Err(ClientError::mapping_incomplete(
                missing.iter().map(|field| field.as_str().to_string()).collect(),
            ));
        }

        let mut slots = BTreeMap::new();
        let mut labels = BTreeMap::new();
        for (field, column) in &self.columns {
            let index = match column {
                ColumnRef::Name(name) => catalog.position_of(name).ok_or_else(|| {
                    ClientError::unknown_column(field.as_str(), name, catalog.names())
                })?,
                ColumnRef::Position(position) => position.checked_sub(1).ok_or_else(|| {
                    ClientError::invalid_column_ref(field.as_str(), &column.label())
                })?,
            };
            slots.insert(*field, index);
            labels.insert(*field, column.label());
        }

        debug!(mapped = slots.len(), "froze column mapping");

        Ok(FieldMapping {
            resolved: Resolved::Columns {
                slots,
                labels,
                tags: catalog.position_of_any(&TAGS_HEADERS),
                recurring: catalog.position_of_any(&RECURRING_HEADERS),
            },
        })
    }
}

#[derive(Debug, Clone, Default, Eq, PartialEq, Deserialize)]
#[serde(try_from = "BTreeMap<String, String>")]
pub struct MappingOverrides {
    values: BTreeMap<CanonicalField, String>,
}

impl MappingOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: CanonicalField, column: &str) -> Self {
        self.values.insert(field, column.to_string());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn parse_pair(pair: &str) -> ClientResult<(CanonicalField, String)> {
        let Some((field_raw, column)) = pair.split_once('=') else {
            return Err(ClientError::invalid_argument_for_command(
                &format!("mapping `{pair}` must look like <field>=<column>"),
                Some("import create"),
            ));
        };
        let field = CanonicalField::parse(field_raw).ok_or_else(|| unknown_field(field_raw))?;
        Ok((field, column.to_string()))
    }

    pub fn from_pairs(pairs: &[String]) -> ClientResult<Self> {
        let mut overrides = Self::new();
        for pair in pairs {
            let (field, column) = Self::parse_pair(pair)?;
            overrides = overrides.set(field, &column);
        }
        Ok(overrides)
    }

    /// Later entries win.
    pub fn extend(mut self, other: MappingOverrides) -> Self {
        self.values.extend(other.values);
        self
    }
}

impl TryFrom<BTreeMap<String, String>> for MappingOverrides {
    type Error = String;

    fn try_from(raw: BTreeMap<String, String>) -> Result<Self, Self::Error> {
        let mut overrides = Self::new();
        for (key, value) in raw {
            let field = CanonicalField::parse(&key)
                .ok_or_else(|| format!("unknown mapping field `{key}`"))?;
            overrides = overrides.set(field, &value);
        }
        Ok(overrides)
    }
}

fn unknown_field(value: &str) -> ClientError {
    ClientError::invalid_argument_for_command(
        &format!(
            "unknown field `{}`; expected one of: date, type, amount, description, category, account_name",
            value.trim()
        ),
        Some("import create"),
    )
}

/// Suggests a column for each field by substring-matching lower-cased headers
/// against fixed synonym lists. The first matching synonym set decides a
/// column's field; when that field already has a column the later one stays
/// unmapped.
pub fn auto_map(catalog: &ColumnCatalog) -> MappingDraft {
    let mut draft = MappingDraft::new();
    for entry in catalog.entries() {
        let lowered = entry.name.to_lowercase();
        let matched = CanonicalField::ALL.into_iter().find(|field| {
            field
                .synonyms()
                .iter()
                .any(|synonym| lowered.contains(synonym))
        });
        if let Some(field) = matched
            && draft.column_for(field).is_none()
        {
            draft = draft.with(field, ColumnRef::Name(entry.name.clone()));
        }
    }
    draft
}

pub fn unmapped_columns(catalog: &ColumnCatalog, draft: &MappingDraft) -> Vec<String> {
    catalog
        .names()
        .into_iter()
        .filter(|name| {
            !CanonicalField::ALL.into_iter().any(|field| {
                matches!(draft.column_for(field), Some(ColumnRef::Name(mapped)) if mapped == name)
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RowKey {
    Field(CanonicalField),
    Tags,
    Recurring,
}

impl RowKey {
    fn json_key(&self) -> &'static str {
        match self {
            Self::Field(field) => field.as_str(),
            Self::Tags => "tags",
            Self::Recurring => "recurring",
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
enum Resolved {
    ObjectKeys,
    Columns {
        slots: BTreeMap<CanonicalField, usize>,
        labels: BTreeMap<CanonicalField, String>,
        tags: Option<usize>,
        recurring: Option<usize>,
    },
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FieldMapping {
    resolved: Resolved,
}

impl FieldMapping {
    /// JSON records are read by canonical key with no remapping.
    pub fn object_keys() -> Self {
        Self {
            resolved: Resolved::ObjectKeys,
        }
    }

    pub fn column_label(&self, field: CanonicalField) -> Option<String> {
        match &self.resolved {
            Resolved::ObjectKeys => Some(field.as_str().to_string()),
            Resolved::Columns { labels, .. } => labels.get(&field).cloned(),
        }
    }

    pub fn get<'r>(&self, row: &'r RawRow, key: RowKey) -> Option<RawValue<'r>> {
        match (row, &self.resolved) {
            (RawRow::Json(json_row), _) => json_row.fields.get(key.json_key()).map(RawValue::Json),
            (RawRow::Delimited(_), Resolved::ObjectKeys) => None,
            (
                RawRow::Delimited(delimited),
                Resolved::Columns {
                    slots,
                    tags,
                    recurring,
                    ..
                },
            ) => {
                let index = match key {
                    RowKey::Field(field) => slots.get(&field).copied(),
                    RowKey::Tags => *tags,
                    RowKey::Recurring => *recurring,
                }?;
                delimited
                    .cells
                    .get(index)
                    .map(|cell| RawValue::Text(cell.as_str()))
            }
        }
    }
}
