use std::collections::HashMap;

use rusqlite::Connection;
use rusqlite_migration::{M, Migrations};

const BOOTSTRAP_SQL: &str = include_str!("migrations/0001_bootstrap.sql");
const SAFE_REPAIR_START: &str = "-- pocketbook:safe_repair:start:";
const SAFE_REPAIR_END: &str = "-- pocketbook:safe_repair:end:";

pub const EXPECTED_USER_VERSION: i64 = 1;

pub const REQUIRED_VIEW_NAMES: [&str; 2] = ["v1_transactions", "v1_imports"];

pub const REQUIRED_INDEX_NAMES: [&str; 3] = [
    "idx_internal_transactions_import_id",
    "idx_internal_transactions_account_occurred_at",
    "idx_internal_import_runs_created_at_desc",
];

pub const REQUIRED_META_KEYS: [(&str, &str); 3] = [
    ("schema_version", "v1"),
    ("public_views_version", "v1"),
    ("import_contract_version", "v1"),
];

pub fn run_pending(conn: &mut Connection) -> rusqlite_migration::Result<()> {
    let migrations = Migrations::new(vec![M::up(BOOTSTRAP_SQL)]);
    migrations.to_latest(conn)
}

/// Canonical SQL that recreates a view or index without touching row data.
pub fn safe_repair_statement(statement_name: &str) -> Option<String> {
    parse_safe_repair_statements().remove(statement_name)
}

fn parse_safe_repair_statements() -> HashMap<String, String> {
    let mut blocks: HashMap<String, String> = HashMap::new();
    let mut active: Option<(String, String)> = None;

    for line in BOOTSTRAP_SQL.lines() {
        let trimmed = line.trim();

        if let Some(name) = trimmed.strip_prefix(SAFE_REPAIR_START) {
            active = Some((name.to_string(), String::new()));
            continue;
        }

        if let Some(name) = trimmed.strip_prefix(SAFE_REPAIR_END) {
            if let Some((active_name, sql)) = active.take()
                && active_name == name
            {
                blocks.insert(active_name, sql.trim().to_string());
            }
            continue;
        }

        if let Some((_, sql)) = active.as_mut() {
            sql.push_str(line);
            sql.push('\n');
        }
    }

    blocks
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use super::{REQUIRED_INDEX_NAMES, REQUIRED_VIEW_NAMES, run_pending, safe_repair_statement};

    #[test]
    fn every_required_view_and_index_has_repair_sql() {
        for name in REQUIRED_VIEW_NAMES.iter().chain(REQUIRED_INDEX_NAMES.iter()) {
            let sql = safe_repair_statement(name);
            assert!(sql.is_some(), "missing repair block for {name}");
        }
    }

    #[test]
    fn repair_blocks_do_not_include_markers() {
        let sql = safe_repair_statement("v1_imports").unwrap_or_default();
        assert!(sql.starts_with("DROP VIEW IF EXISTS v1_imports;"));
        assert!(!sql.contains("safe_repair"));
    }

    #[test]
    fn migrations_apply_to_a_fresh_database() {
        let connection = Connection::open_in_memory();
        assert!(connection.is_ok());
        if let Ok(mut connection) = connection {
            assert!(run_pending(&mut connection).is_ok());
            let version = connection.query_row("PRAGMA user_version", [], |row| row.get::<_, i64>(0));
            assert!(matches!(version, Ok(1)));
        }
    }
}
