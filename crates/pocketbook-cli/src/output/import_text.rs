use std::io;

use chrono::{Local, TimeZone};
use serde_json::{Map, Value};

use super::format::{self, Align, Column};

const PREVIEW_ROW_LIMIT: usize = 20;
const ISSUE_ROW_LIMIT: usize = 25;

pub fn render_import_inspect(data: &Value) -> io::Result<String> {
    let settings = data
        .get("settings")
        .and_then(Value::as_object)
        .ok_or_else(|| io::Error::other("import inspect output requires settings"))?;
    let mapping = data
        .get("mapping")
        .and_then(Value::as_array)
        .ok_or_else(|| io::Error::other("import inspect output requires mapping"))?;

    let mut lines = vec!["Source inspected. Nothing was imported.".to_string(), String::new()];
    lines.push("Source:".to_string());
    lines.extend(format::key_value_rows(
        &[
            ("Path:", source_label(data)),
            ("Format:", get_str(settings, "format")),
            ("Separator:", get_str(settings, "separator")),
            (
                "Headers:",
                if settings.get("has_headers").and_then(Value::as_bool) == Some(false) {
                    "no".to_string()
                } else {
                    "yes".to_string()
                },
            ),
            ("Encoding:", get_str(settings, "encoding")),
            (
                "Rows:",
                data.get("rows_detected")
                    .and_then(Value::as_i64)
                    .unwrap_or(0)
                    .to_string(),
            ),
        ],
        2,
    ));

    let columns = string_list(data.get("columns"));
    if !columns.is_empty() {
        lines.push(String::new());
        lines.push(format!("Columns: {}", columns.join(", ")));
    }

    lines.push(String::new());
    lines.push("Field mapping:".to_string());
    let table_rows = mapping
        .iter()
        .map(|entry| {
            vec![
                entry
                    .get("field")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string(),
                if entry.get("required").and_then(Value::as_bool) == Some(true) {
                    "yes".to_string()
                } else {
                    "no".to_string()
                },
                entry
                    .get("column")
                    .and_then(Value::as_str)
                    .unwrap_or("-")
                    .to_string(),
            ]
        })
        .collect::<Vec<Vec<String>>>();
    lines.extend(format::render_table(
        &[
            Column {
                name: "Field",
                align: Align::Left,
            },
            Column {
                name: "Required",
                align: Align::Left,
            },
            Column {
                name: "Column",
                align: Align::Left,
            },
        ],
        &table_rows,
        format::terminal_width(),
    ));

    let unmapped = string_list(data.get("unmapped_columns"));
    if !unmapped.is_empty() {
        lines.push(String::new());
        lines.push(format!("Unmapped columns: {}", unmapped.join(", ")));
    }

    lines.push(String::new());
    lines.push("What to do next:".to_string());
    let missing = string_list(data.get("missing_required"));
    if missing.is_empty() {
        lines.push("  1. Preview the import: pocketbook import create --dry-run <path>".to_string());
    } else {
        lines.push(format!(
            "  1. Map the missing required fields ({}) with --map <field>=<column>.",
            missing.join(", ")
        ));
        lines.push("  2. Inspect again until every required field has a column.".to_string());
    }

    Ok(lines.join("\n"))
}

pub fn render_import_run(data: &Value) -> io::Result<String> {
    let dry_run = data
        .get("dry_run")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let message = data
        .get("message")
        .and_then(Value::as_str)
        .ok_or_else(|| io::Error::other("import output requires message"))?;

    let mut lines = vec![message.to_string(), String::new(), "Summary:".to_string()];
    let mut entries = Vec::new();
    if let Some(import_id) = data.get("import_id").and_then(Value::as_str) {
        entries.push(("Import ID:", import_id.to_string()));
    }
    if let Some(target) = data.get("target").and_then(Value::as_str) {
        entries.push(("Target:", target.to_string()));
    }

    if dry_run {
        let counts = data
            .get("preview")
            .and_then(|preview| preview.get("counts"))
            .and_then(Value::as_object)
            .ok_or_else(|| io::Error::other("dry-run output requires preview counts"))?;
        entries.push(("Rows read:", get_i64(counts, "total").to_string()));
        entries.push(("Valid:", get_i64(counts, "valid").to_string()));
        entries.push(("With warnings:", get_i64(counts, "warnings").to_string()));
        entries.push(("With errors:", get_i64(counts, "errors").to_string()));
    } else {
        let report = data
            .get("report")
            .and_then(Value::as_object)
            .ok_or_else(|| io::Error::other("import output requires report"))?;
        entries.push(("Rows read:", get_i64(report, "total").to_string()));
        entries.push(("Imported:", get_i64(report, "success").to_string()));
        entries.push(("With warnings:", get_i64(report, "warnings").to_string()));
        entries.push(("With errors:", get_i64(report, "errors").to_string()));
    }
    lines.extend(format::key_value_rows(&entries, 2));

    if dry_run {
        let records = data
            .get("preview")
            .and_then(|preview| preview.get("records"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let preview = render_record_preview(&records);
        if !preview.is_empty() {
            lines.push(String::new());
            lines.extend(preview);
        }
    }

    let issues = render_issues(data.get("issues").and_then(Value::as_array));
    if !issues.is_empty() {
        lines.push(String::new());
        lines.extend(issues);
    }

    if let Some(next_step) = data.get("next_step").and_then(Value::as_object) {
        lines.push(String::new());
        lines.push("What to do next:".to_string());
        lines.push(format!(
            "  {}: {}",
            get_str(next_step, "label"),
            get_str(next_step, "command")
        ));
    }

    Ok(lines.join("\n"))
}

pub fn render_import_list(data: &Value) -> io::Result<String> {
    let rows = data
        .get("rows")
        .and_then(Value::as_array)
        .ok_or_else(|| io::Error::other("import list output requires rows"))?;

    if rows.is_empty() {
        return Ok([
            "No imports found yet.",
            "",
            "Run your first import:",
            "  1. pocketbook import inspect <path>",
            "  2. pocketbook import create --dry-run <path>",
            "  3. pocketbook import create <path>",
        ]
        .join("\n"));
    }

    let count_label = if rows.len() == 1 {
        "1 import found.".to_string()
    } else {
        format!("{} imports found.", rows.len())
    };

    let columns = [
        Column {
            name: "Import ID",
            align: Align::Left,
        },
        Column {
            name: "Created (local)",
            align: Align::Left,
        },
        Column {
            name: "Source",
            align: Align::Left,
        },
        Column {
            name: "Rows",
            align: Align::Right,
        },
        Column {
            name: "Imported",
            align: Align::Right,
        },
        Column {
            name: "Errors",
            align: Align::Right,
        },
    ];

    let table_rows = rows
        .iter()
        .map(|row| {
            vec![
                row.get("import_id")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string(),
                format_created_local(row),
                row.get("source_ref")
                    .and_then(Value::as_str)
                    .or_else(|| row.get("source_kind").and_then(Value::as_str))
                    .unwrap_or("-")
                    .to_string(),
                row_i64(row, "rows_total").to_string(),
                row_i64(row, "rows_imported").to_string(),
                row_i64(row, "rows_with_errors").to_string(),
            ]
        })
        .collect::<Vec<Vec<String>>>();

    let mut lines = vec![count_label, String::new(), "Imports:".to_string()];
    lines.extend(format::render_table(
        &columns,
        &table_rows,
        format::terminal_width(),
    ));
    if let Some(db_path) = data.get("db_path").and_then(Value::as_str) {
        lines.push(String::new());
        lines.push(format!("Ledger: {db_path}"));
    }

    Ok(lines.join("\n"))
}

fn render_record_preview(records: &[Value]) -> Vec<String> {
    let valid = records
        .iter()
        .filter(|record| {
            record
                .get("errors")
                .and_then(Value::as_array)
                .is_none_or(Vec::is_empty)
        })
        .collect::<Vec<&Value>>();
    if valid.is_empty() {
        return Vec::new();
    }

    let table_rows = valid
        .iter()
        .take(PREVIEW_ROW_LIMIT)
        .map(|record| {
            vec![
                row_i64(record, "row").to_string(),
                row_str(record, "date"),
                row_str(record, "type"),
                record
                    .get("amount")
                    .and_then(Value::as_f64)
                    .map(|amount| format!("{amount:.2}"))
                    .unwrap_or_default(),
                row_str(record, "description"),
                row_str(record, "category"),
                row_str(record, "account_name"),
            ]
        })
        .collect::<Vec<Vec<String>>>();

    let mut lines = vec!["Rows that would be committed:".to_string()];
    lines.extend(format::render_table(
        &[
            Column {
                name: "Row",
                align: Align::Right,
            },
            Column {
                name: "Date",
                align: Align::Left,
            },
            Column {
                name: "Type",
                align: Align::Left,
            },
            Column {
                name: "Amount",
                align: Align::Right,
            },
            Column {
                name: "Description",
                align: Align::Left,
            },
            Column {
                name: "Category",
                align: Align::Left,
            },
            Column {
                name: "Account",
                align: Align::Left,
            },
        ],
        &table_rows,
        format::terminal_width(),
    ));
    if valid.len() > PREVIEW_ROW_LIMIT {
        lines.push(format!(
            "  ... and {} more (use --json for every row)",
            valid.len() - PREVIEW_ROW_LIMIT
        ));
    }
    lines
}

fn render_issues(issues: Option<&Vec<Value>>) -> Vec<String> {
    let Some(issues) = issues.filter(|issues| !issues.is_empty()) else {
        return Vec::new();
    };

    let mut lines = vec!["Row issues:".to_string()];
    for issue in issues.iter().take(ISSUE_ROW_LIMIT) {
        let row = row_i64(issue, "row");
        for error in string_list(issue.get("errors")) {
            lines.push(format!("  Row {row}  error    {error}"));
        }
        for warning in string_list(issue.get("warnings")) {
            lines.push(format!("  Row {row}  warning  {warning}"));
        }
    }
    if issues.len() > ISSUE_ROW_LIMIT {
        lines.push(format!(
            "  ... and {} more rows with issues (use --json for the full list)",
            issues.len() - ISSUE_ROW_LIMIT
        ));
    }
    lines
}

fn source_label(data: &Value) -> String {
    match data.get("path").and_then(Value::as_str) {
        Some("-") | None => "stdin".to_string(),
        Some(path) => path.to_string(),
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn get_i64(map: &Map<String, Value>, key: &str) -> i64 {
    map.get(key).and_then(Value::as_i64).unwrap_or(0)
}

fn get_str(map: &Map<String, Value>, key: &str) -> String {
    map.get(key)
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string()
}

fn row_i64(row: &Value, key: &str) -> i64 {
    row.get(key).and_then(Value::as_i64).unwrap_or(0)
}

fn row_str(row: &Value, key: &str) -> String {
    row.get(key)
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

fn format_created_local(row: &Value) -> String {
    let created_at = row.get("created_at").and_then(|raw| {
        raw.as_i64()
            .or_else(|| raw.as_str().and_then(|text| text.parse::<i64>().ok()))
    });
    let Some(created_at) = created_at else {
        return "unknown".to_string();
    };
    let Some(local_dt) = Local.timestamp_opt(created_at, 0).single() else {
        return "unknown".to_string();
    };
    local_dt.format("%Y-%m-%d %H:%M:%S %:z").to_string()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{render_import_inspect, render_import_list, render_import_run};

    #[test]
    fn dry_run_lists_committable_rows_and_issues() {
        let data = json!({
            "dry_run": true,
            "message": "Dry run: 1 of 2 rows would be committed. Nothing was written.",
            "preview": {
                "counts": {"total": 2, "valid": 1, "warnings": 0, "errors": 1},
                "records": [
                    {"row": 1, "type": "income", "amount": 1500.5, "description": "Salary",
                     "category": "Otros", "account_name": "Principal", "date": "2025-01-02T00:00:00.000Z",
                     "errors": [], "warnings": []},
                    {"row": 2, "type": "expense", "amount": 0.0, "description": "Broken",
                     "category": "Otros", "account_name": "Principal", "date": "",
                     "errors": ["Invalid amount: abc"], "warnings": []}
                ]
            },
            "issues": [{"row": 2, "errors": ["Invalid amount: abc"], "warnings": []}],
            "next_step": {"label": "Commit this import", "command": "pocketbook import create <path>"}
        });

        let rendered = render_import_run(&data);
        assert!(rendered.is_ok());
        if let Ok(text) = rendered {
            assert!(text.starts_with("Dry run: 1 of 2 rows"));
            assert!(text.contains("Rows that would be committed:"));
            assert!(text.contains("1500.50"));
            assert!(!text.contains("Broken"));
            assert!(text.contains("  Row 2  error    Invalid amount: abc"));
            assert!(text.contains("Commit this import: pocketbook import create <path>"));
        }
    }

    #[test]
    fn committed_run_shows_report_counts() {
        let data = json!({
            "dry_run": false,
            "message": "Imported 1 of 1 rows.",
            "import_id": "imp_01HX",
            "target": "ledger /tmp/ledger.db",
            "report": {"total": 1, "success": 1, "warnings": 0, "errors": 0, "records": []},
            "issues": [],
            "next_step": {"label": "View import history", "command": "pocketbook import list"}
        });

        let rendered = render_import_run(&data);
        assert!(rendered.is_ok());
        if let Ok(text) = rendered {
            assert!(text.contains("Import ID:"));
            assert!(text.contains("imp_01HX"));
            assert!(text.contains("Imported:"));
            assert!(!text.contains("Row issues:"));
        }
    }

    #[test]
    fn inspect_points_at_missing_fields() {
        let data = json!({
            "path": "bank.csv",
            "settings": {"format": "csv", "separator": ",", "has_headers": true, "encoding": "utf-8"},
            "columns": ["Fecha", "Importe"],
            "mapping": [
                {"field": "date", "required": true, "column": "Fecha"},
                {"field": "amount", "required": true, "column": null}
            ],
            "unmapped_columns": ["Importe"],
            "missing_required": ["amount"],
            "mapping_complete": false,
            "rows_detected": 4
        });

        let rendered = render_import_inspect(&data);
        assert!(rendered.is_ok());
        if let Ok(text) = rendered {
            assert!(text.contains("Columns: Fecha, Importe"));
            assert!(text.contains("Unmapped columns: Importe"));
            assert!(text.contains("missing required fields (amount)"));
        }
    }

    #[test]
    fn empty_import_list_suggests_first_import() {
        let rendered = render_import_list(&json!({"db_path": "/tmp/ledger.db", "rows": []}));
        assert!(rendered.is_ok());
        if let Ok(text) = rendered {
            assert!(text.starts_with("No imports found yet."));
        }
    }

    #[test]
    fn import_list_renders_one_line_per_run() {
        let rendered = render_import_list(&json!({
            "db_path": "/tmp/ledger.db",
            "rows": [
                {"import_id": "imp_2", "created_at": "1700000100", "source_ref": "march.csv",
                 "rows_total": 3, "rows_sent": 2, "rows_imported": 2, "rows_with_errors": 1,
                 "rows_with_warnings": 0},
                {"import_id": "imp_1", "created_at": "1700000000", "source_kind": "stdin",
                 "rows_total": 1, "rows_sent": 1, "rows_imported": 1, "rows_with_errors": 0,
                 "rows_with_warnings": 0}
            ]
        }));
        assert!(rendered.is_ok());
        if let Ok(text) = rendered {
            assert!(text.starts_with("2 imports found."));
            assert!(text.contains("march.csv"));
            assert!(text.contains("stdin"));
            assert!(text.contains("Ledger: /tmp/ledger.db"));
        }
    }
}
