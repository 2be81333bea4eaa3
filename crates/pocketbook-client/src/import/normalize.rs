//! Per-field coercion and validation of raw rows.
//!
//! Every field is checked by its own pure function returning a [`FieldOutcome`].
//! A row's outcomes are concatenated in a fixed order (type, amount, description,
//! date) so one bad field never hides problems in another.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::import::mapping::{CanonicalField, FieldMapping, RowKey};
use crate::import::schema::{RawRow, RawValue};

pub const MAX_DESCRIPTION_CHARS: usize = 200;
pub const DEFAULT_CATEGORY: &str = "Otros";
pub const DEFAULT_ACCOUNT_NAME: &str = "Principal";

const CREDIT_TOKENS: [&str; 4] = ["ingreso", "income", "+", "1"];
const DEBIT_TOKENS: [&str; 4] = ["gasto", "expense", "-", "0"];
const CURRENCY_SYMBOLS: [char; 12] = ['$', '€', '£', '¥', '¢', '₡', '₲', '₱', '₹', '₽', '₩', '₿'];
const NAIVE_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];
const DATE_FORMATS: [&str; 6] = [
    "%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y%m%d",
];

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

/// One normalized record. Records with errors are never committed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedTransaction {
    pub row: i64,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: f64,
    pub description: String,
    pub category: String,
    pub account_name: String,
    pub date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurring: Option<bool>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ParsedTransaction {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldOutcome<T> {
    pub value: T,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl<T> FieldOutcome<T> {
    fn ok(value: T) -> Self {
        Self {
            value,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn error(value: T, message: String) -> Self {
        Self {
            value,
            errors: vec![message],
            warnings: Vec::new(),
        }
    }

    fn warning(value: T, message: String) -> Self {
        Self {
            value,
            errors: Vec::new(),
            warnings: vec![message],
        }
    }

    fn drain_into(self, errors: &mut Vec<String>, warnings: &mut Vec<String>) -> T {
        errors.extend(self.errors);
        warnings.extend(self.warnings);
        self.value
    }
}

pub fn normalize_type(raw: Option<&str>) -> FieldOutcome<TransactionKind> {
    let Some(value) = non_blank(raw) else {
        return FieldOutcome::warning(
            TransactionKind::Expense,
            "Type not specified, assuming expense".to_string(),
        );
    };

    let lowered = value.to_lowercase();
    if CREDIT_TOKENS.iter().any(|token| lowered.contains(token)) {
        return FieldOutcome::ok(TransactionKind::Income);
    }
    if DEBIT_TOKENS.iter().any(|token| lowered.contains(token)) {
        return FieldOutcome::ok(TransactionKind::Expense);
    }

    FieldOutcome::error(
        TransactionKind::Expense,
        format!("Unrecognized type: {value}"),
    )
}

pub fn normalize_amount(raw: Option<&str>) -> FieldOutcome<f64> {
    let Some(value) = non_blank(raw) else {
        return FieldOutcome::error(0.0, "Amount required".to_string());
    };

    match parse_amount(value) {
        Some(amount) if amount >= 0.0 => FieldOutcome::ok(amount),
        _ => FieldOutcome::error(0.0, format!("Invalid amount: {value}")),
    }
}

fn parse_amount(value: &str) -> Option<f64> {
    let without_code = strip_currency_code(value);
    let compact = without_code
        .chars()
        .filter(|character| !character.is_whitespace() && !CURRENCY_SYMBOLS.contains(character))
        .collect::<String>();
    let canonical = normalize_separators(&compact);
    let parsed = canonical.parse::<f64>().ok()?;
    if parsed.is_finite() { Some(parsed) } else { None }
}

/// Drops a leading or trailing ISO currency code such as `USD 10` or `10 MXN`.
fn strip_currency_code(value: &str) -> &str {
    let is_code = |token: &str| token.len() == 3 && token.chars().all(|c| c.is_ascii_uppercase());
    let trimmed = value.trim();
    if let Some((head, rest)) = trimmed.split_once(char::is_whitespace)
        && is_code(head)
    {
        return rest.trim();
    }
    if let Some((rest, tail)) = trimmed.rsplit_once(char::is_whitespace)
        && is_code(tail)
    {
        return rest.trim();
    }
    trimmed
}

/// Decides which of `.`/`,` is the decimal mark and removes the other.
///
/// The mark appearing last wins when both are present. A lone `,` followed by
/// one or two digits is a decimal comma; otherwise `,` groups thousands.
/// Repeated `.` with no `,` groups thousands as well.
fn normalize_separators(value: &str) -> String {
    let last_dot = value.rfind('.');
    let last_comma = value.rfind(',');
    match (last_dot, last_comma) {
        (Some(dot), Some(comma)) if comma > dot => value.replace('.', "").replace(',', "."),
        (Some(_), None) if value.matches('.').count() > 1 => value.replace('.', ""),
        (Some(_), Some(_)) | (Some(_), None) => value.replace(',', ""),
        (None, Some(comma)) => {
            let decimals = value.len() - comma - 1;
            let single_comma = value.matches(',').count() == 1;
            if single_comma && (1..=2).contains(&decimals) {
                value.replace(',', ".")
            } else {
                value.replace(',', "")
            }
        }
        (None, None) => value.to_string(),
    }
}

pub fn normalize_description(raw: Option<&str>) -> FieldOutcome<String> {
    let Some(value) = non_blank(raw) else {
        return FieldOutcome::error(String::new(), "Description required".to_string());
    };

    if value.chars().count() > MAX_DESCRIPTION_CHARS {
        return FieldOutcome::warning(
            value.chars().take(MAX_DESCRIPTION_CHARS).collect(),
            "Description too long, will be truncated".to_string(),
        );
    }

    FieldOutcome::ok(value.to_string())
}

pub fn normalize_date(raw: Option<&str>, processed_at: DateTime<Utc>) -> FieldOutcome<String> {
    let Some(value) = non_blank(raw) else {
        return FieldOutcome::warning(
            to_iso(processed_at),
            "Date not specified, using current date".to_string(),
        );
    };

    match parse_calendar_date(value) {
        Some(parsed) => FieldOutcome::ok(to_iso(parsed)),
        None => FieldOutcome::error(to_iso(processed_at), format!("Invalid date: {value}")),
    }
}

fn parse_calendar_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Some(parsed.and_utc());
        }
    }

    for format in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, format) {
            return parsed.and_hms_opt(0, 0, 0).map(|midnight| midnight.and_utc());
        }
    }

    None
}

fn to_iso(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Missing category or account fall back silently, unlike every other default.
pub fn normalize_category(raw: Option<&str>) -> String {
    non_blank(raw).unwrap_or(DEFAULT_CATEGORY).to_string()
}

pub fn normalize_account_name(raw: Option<&str>) -> String {
    non_blank(raw).unwrap_or(DEFAULT_ACCOUNT_NAME).to_string()
}

pub fn normalize_tags(raw: Option<RawValue<'_>>) -> Option<Vec<String>> {
    let tags = match raw? {
        RawValue::Text(text) => split_tags(text),
        RawValue::Json(Value::Array(items)) => items
            .iter()
            .filter_map(|item| RawValue::Json(item).as_text())
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect(),
        RawValue::Json(other) => split_tags(&RawValue::Json(other).as_text()?),
    };

    if tags.is_empty() { None } else { Some(tags) }
}

fn split_tags(text: &str) -> Vec<String> {
    text.split(';')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn normalize_recurring(raw: Option<RawValue<'_>>) -> Option<bool> {
    match raw? {
        RawValue::Json(Value::Null) => None,
        RawValue::Json(Value::Bool(flag)) => Some(*flag),
        RawValue::Json(Value::Number(number)) => Some(number.as_f64().unwrap_or(0.0) != 0.0),
        other => {
            let text = other.as_text()?;
            let lowered = text.trim().to_lowercase();
            if lowered.is_empty() {
                return None;
            }
            Some(matches!(
                lowered.as_str(),
                "true" | "1" | "yes" | "y" | "si" | "sí" | "x"
            ))
        }
    }
}

fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|value| !value.is_empty())
}

pub fn normalize_row(
    row: &RawRow,
    mapping: &FieldMapping,
    processed_at: DateTime<Utc>,
) -> ParsedTransaction {
    let text = |field: CanonicalField| {
        mapping
            .get(row, RowKey::Field(field))
            .and_then(|value| value.as_text())
    };

    let raw_type = text(CanonicalField::Type);
    let raw_amount = text(CanonicalField::Amount);
    let raw_description = text(CanonicalField::Description);
    let raw_date = text(CanonicalField::Date);
    let raw_category = text(CanonicalField::Category);
    let raw_account = text(CanonicalField::AccountName);

    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let kind = normalize_type(raw_type.as_deref()).drain_into(&mut errors, &mut warnings);
    let amount = normalize_amount(raw_amount.as_deref()).drain_into(&mut errors, &mut warnings);
    let description =
        normalize_description(raw_description.as_deref()).drain_into(&mut errors, &mut warnings);
    let date =
        normalize_date(raw_date.as_deref(), processed_at).drain_into(&mut errors, &mut warnings);

    ParsedTransaction {
        row: row.row_number(),
        kind,
        amount,
        description,
        category: normalize_category(raw_category.as_deref()),
        account_name: normalize_account_name(raw_account.as_deref()),
        date,
        tags: normalize_tags(mapping.get(row, RowKey::Tags)),
        recurring: normalize_recurring(mapping.get(row, RowKey::Recurring)),
        errors,
        warnings,
    }
}

/// Normalizes a whole batch. Output order matches input order.
pub fn normalize_rows(
    rows: &[RawRow],
    mapping: &FieldMapping,
    processed_at: DateTime<Utc>,
) -> Vec<ParsedTransaction> {
    let records = rows
        .iter()
        .map(|row| normalize_row(row, mapping, processed_at))
        .collect::<Vec<ParsedTransaction>>();

    let invalid = records.iter().filter(|record| !record.is_valid()).count();
    info!(
        total = records.len(),
        valid = records.len() - invalid,
        invalid,
        "normalized import rows"
    );

    records
}
