use serde::Serialize;

use crate::import::report::{ImportPreview, ImportReport};

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize)]
pub struct ImportCounts {
    pub total: i64,
    pub valid: i64,
    pub warnings: i64,
    pub errors: i64,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct RowIssue {
    pub row: i64,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceSettings {
    pub format: String,
    pub separator: String,
    pub has_headers: bool,
    pub encoding: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MappingEntry {
    pub field: String,
    pub required: bool,
    pub column: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportInspectData {
    pub path: Option<String>,
    pub source_kind: String,
    pub settings: SourceSettings,
    pub columns: Vec<String>,
    pub mapping: Vec<MappingEntry>,
    pub unmapped_columns: Vec<String>,
    pub missing_required: Vec<String>,
    pub mapping_complete: bool,
    pub rows_detected: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportNextStep {
    pub label: String,
    pub command: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportRunData {
    pub dry_run: bool,
    pub path: Option<String>,
    pub source_kind: String,
    pub settings: SourceSettings,
    pub mapping: Vec<MappingEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import_id: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ImportReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<ImportPreview>,
    pub issues: Vec<RowIssue>,
    pub next_step: ImportNextStep,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportListItem {
    pub import_id: String,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_ref: Option<String>,
    pub rows_total: i64,
    pub rows_sent: i64,
    pub rows_imported: i64,
    pub rows_with_errors: i64,
    pub rows_with_warnings: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportListData {
    pub db_path: String,
    pub rows: Vec<ImportListItem>,
}
