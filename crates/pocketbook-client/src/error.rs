use std::path::Path;

use serde_json::{Value, json};
use thiserror::Error;

use crate::contracts::types::{ImportCounts, RowIssue};

pub(crate) const IMPORT_HELP_COMMAND: &str = "pocketbook import create --help";
pub(crate) const IMPORT_HELP_SECTION_TITLE: &str = "Import Troubleshooting";

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ClientError {
    pub code: String,
    pub message: String,
    pub recovery_steps: Vec<String>,
    pub data: Option<Value>,
}

impl ClientError {
    pub fn new(code: &str, message: &str, recovery_steps: Vec<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
            recovery_steps,
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_import_help(self) -> Self {
        self.with_import_help_data(json!({}))
    }

    pub fn with_import_help_data(self, data: Value) -> Self {
        self.with_data(merge_import_help_data(data))
    }

    pub fn invalid_argument(message: &str) -> Self {
        Self::invalid_argument_for_command(message, None)
    }

    pub fn invalid_argument_for_command(message: &str, command: Option<&str>) -> Self {
        let help_hint = match command {
            Some(cmd) => format!("Run `pocketbook {cmd} --help` for usage."),
            None => "Run `pocketbook --help` for usage.".to_string(),
        };
        let error = Self::new("invalid_argument", message, vec![help_hint]);
        if let Some(cmd) = command {
            return error.with_data(json!({
                "command_hint": cmd,
            }));
        }
        error
    }

    pub fn invalid_argument_with_recovery(message: &str, recovery_steps: Vec<String>) -> Self {
        Self::new("invalid_argument", message, recovery_steps)
    }

    pub fn unsupported_encoding(label: &str) -> Self {
        Self::new(
            "unsupported_encoding",
            &format!("Encoding `{label}` is not recognized."),
            vec![
                "Pass a standard encoding label such as utf-8, latin1 or windows-1252.".to_string(),
                "Rerun pocketbook import inspect <path> --encoding <label>.".to_string(),
            ],
        )
        .with_import_help_data(json!({
            "encoding": label,
        }))
    }

    pub fn decode_failed(encoding: &str) -> Self {
        Self::new(
            "decode_failed",
            &format!("Import file is not valid `{encoding}` text. Nothing was parsed."),
            vec![
                "Check which encoding your bank or spreadsheet used to export the file.".to_string(),
                "Rerun with --encoding <label> (for example latin1 or utf-16le).".to_string(),
            ],
        )
        .with_import_help_data(json!({
            "encoding": encoding,
        }))
    }

    pub fn invalid_json(detail: &str) -> Self {
        Self::new(
            "invalid_json",
            &format!("JSON import source could not be parsed: {detail}"),
            vec![
                "Provide a JSON array of transaction objects or an object with a `data` array."
                    .to_string(),
                "Use --format csv if the file is delimited text.".to_string(),
            ],
        )
        .with_import_help()
    }

    pub fn mapping_incomplete(missing_fields: Vec<String>) -> Self {
        let listed = missing_fields.join(", ");
        Self::new(
            "mapping_incomplete",
            &format!("Required fields are not mapped to a source column: {listed}."),
            vec![
                "Run pocketbook import inspect <path> to list the detected columns.".to_string(),
                "Map each required field with --map <field>=<column>.".to_string(),
            ],
        )
        .with_import_help_data(json!({
            "missing_fields": missing_fields,
        }))
    }

    pub fn unknown_column(field: &str, column: &str, available_columns: Vec<String>) -> Self {
        Self::new(
            "unknown_column",
            &format!("Field `{field}` is mapped to `{column}`, which is not a column in this file."),
            vec![
                "Run pocketbook import inspect <path> to list the detected columns.".to_string(),
                "Column names are matched exactly after trimming.".to_string(),
            ],
        )
        .with_import_help_data(json!({
            "field": field,
            "column": column,
            "available_columns": available_columns,
        }))
    }

    pub fn invalid_column_ref(field: &str, value: &str) -> Self {
        Self::invalid_argument_with_recovery(
            &format!(
                "Field `{field}` must reference a column position (`#1`, `#2`, ...) when the file has no header row; got `{value}`."
            ),
            vec![
                "Use 1-based column positions for headerless files.".to_string(),
                "Or drop --no-headers if the first line names the columns.".to_string(),
            ],
        )
        .with_import_help()
    }

    pub fn no_valid_records(counts: ImportCounts, issues: Vec<RowIssue>) -> Self {
        let total = counts.total;
        Self::new(
            "no_valid_records",
            &format!("None of the {total} rows passed validation. Nothing was committed."),
            vec![
                "Fix the listed rows in your source file.".to_string(),
                "Rerun pocketbook import create --dry-run <path>.".to_string(),
                "Then rerun pocketbook import create <path>.".to_string(),
            ],
        )
        .with_import_help_data(json!({
            "counts": counts,
            "issues": issues,
        }))
    }

    pub fn commit_failed(detail: &str, status: Option<u16>) -> Self {
        Self::new(
            "commit_failed",
            &format!("Bulk commit failed: {detail}"),
            vec![
                "Validated rows were kept; nothing needs to be re-mapped.".to_string(),
                "Check the commit target is reachable, then rerun pocketbook import create <path>."
                    .to_string(),
            ],
        )
        .with_data(json!({
            "detail": detail,
            "status": status,
        }))
    }

    pub fn internal_serialization(message: &str) -> Self {
        Self::new("internal_serialization_error", message, Vec::new())
    }

    pub fn ledger_init_permission_denied(path: &Path, detail: &str) -> Self {
        let location = path.display().to_string();
        Self::new(
            "ledger_init_permission_denied",
            &format!("Cannot initialize ledger at `{location}`: {detail}"),
            vec![format!(
                "Grant write access to `{location}` or set `POCKETBOOK_HOME` to a writable directory."
            )],
        )
    }

    pub fn ledger_locked(path: &Path) -> Self {
        let location = path.display().to_string();
        Self::new(
            "ledger_locked",
            &format!("Ledger database is locked at `{location}`."),
            vec![format!(
                "Close other processes using `{location}` so the lock is released."
            )],
        )
    }

    pub fn ledger_corrupt(path: &Path) -> Self {
        let location = path.display().to_string();
        Self::new(
            "ledger_corrupt",
            &format!("Ledger database appears corrupt at `{location}`."),
            vec![format!(
                "Replace `{location}` with a valid SQLite ledger file or restore from backup."
            )],
        )
    }

    pub fn migration_failed(path: &Path, detail: &str) -> Self {
        let location = path.display().to_string();
        Self::new(
            "migration_failed",
            &format!("Ledger migration failed at `{location}`: {detail}"),
            vec!["Resolve conflicting schema objects referenced in the error details.".to_string()],
        )
    }

    pub fn ledger_init_failed(path: &Path, detail: &str) -> Self {
        let location = path.display().to_string();
        Self::new(
            "ledger_init_failed",
            &format!("Ledger initialization failed at `{location}`: {detail}"),
            Vec::new(),
        )
    }

    pub fn is_internal(&self) -> bool {
        self.code.starts_with("internal_")
            || matches!(
                self.code.as_str(),
                "ledger_init_permission_denied"
                    | "ledger_locked"
                    | "ledger_corrupt"
                    | "migration_failed"
                    | "ledger_init_failed"
            )
    }
}

fn merge_import_help_data(mut data: Value) -> Value {
    if !data.is_object() {
        data = json!({});
    }

    if let Some(object) = data.as_object_mut() {
        object.insert(
            "help_command".to_string(),
            Value::String(IMPORT_HELP_COMMAND.to_string()),
        );
        object.insert(
            "help_section_title".to_string(),
            Value::String(IMPORT_HELP_SECTION_TITLE.to_string()),
        );
    }

    data
}

pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::ClientError;
    use crate::contracts::types::ImportCounts;

    #[test]
    fn import_errors_carry_help_pointers() {
        let error = ClientError::mapping_incomplete(vec!["amount".to_string()]);
        assert_eq!(error.code, "mapping_incomplete");
        let data = error.data.unwrap_or(Value::Null);
        assert_eq!(data["help_command"], "pocketbook import create --help");
        assert_eq!(data["missing_fields"][0], "amount");
    }

    #[test]
    fn no_valid_records_reports_counts() {
        let counts = ImportCounts {
            total: 2,
            valid: 0,
            warnings: 0,
            errors: 2,
        };
        let error = ClientError::no_valid_records(counts, Vec::new());
        assert!(error.message.contains("2 rows"));
        assert!(!error.is_internal());
    }

    #[test]
    fn ledger_errors_are_internal() {
        let error = ClientError::ledger_locked(std::path::Path::new("/tmp/ledger.db"));
        assert!(error.is_internal());
    }
}
