use std::path::Path;

use pocketbook_client::migrations::{REQUIRED_INDEX_NAMES, REQUIRED_VIEW_NAMES};
use pocketbook_client::setup::ensure_initialized;
use rusqlite::{Connection, OptionalExtension};
use tempfile::tempdir;

fn object_exists(connection: &Connection, object_type: &str, object_name: &str) -> bool {
    connection
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = ?1 AND name = ?2",
            [object_type, object_name],
            |_row| Ok(true),
        )
        .optional()
        .ok()
        .flatten()
        .unwrap_or(false)
}

fn meta_value(connection: &Connection, key: &str) -> Option<String> {
    connection
        .query_row(
            "SELECT value FROM internal_meta WHERE key = ?1 LIMIT 1",
            [key],
            |row| row.get::<_, String>(0),
        )
        .ok()
}

fn open(home: &Path) -> Option<Connection> {
    Connection::open(home.join("ledger.db")).ok()
}

#[test]
fn fresh_home_gets_migrated_ledger() {
    let temp = tempdir();
    assert!(temp.is_ok());
    let Ok(temp) = temp else {
        return;
    };
    let home = temp.path().join("nested").join("home");

    let ledger = ensure_initialized(Some(&home));
    assert!(ledger.is_ok());
    if let Ok(ledger) = ledger {
        assert_eq!(ledger.schema_version, "v1");
        assert_eq!(ledger.db_path, home.join("ledger.db"));
    }

    let connection = open(&home);
    assert!(connection.is_some());
    if let Some(connection) = connection {
        for table in ["internal_meta", "internal_import_runs", "internal_transactions"] {
            assert!(object_exists(&connection, "table", table), "missing {table}");
        }
        for view in REQUIRED_VIEW_NAMES {
            assert!(object_exists(&connection, "view", view), "missing {view}");
        }
        for index in REQUIRED_INDEX_NAMES {
            assert!(object_exists(&connection, "index", index), "missing {index}");
        }
        assert_eq!(
            meta_value(&connection, "import_contract_version").as_deref(),
            Some("v1")
        );
    }
}

#[test]
fn initialization_is_repeatable() {
    let temp = tempdir();
    assert!(temp.is_ok());
    if let Ok(temp) = temp {
        assert!(ensure_initialized(Some(temp.path())).is_ok());
        assert!(ensure_initialized(Some(temp.path())).is_ok());
    }
}

#[test]
fn dropped_views_and_indexes_are_repaired() {
    let temp = tempdir();
    assert!(temp.is_ok());
    let Ok(temp) = temp else {
        return;
    };
    assert!(ensure_initialized(Some(temp.path())).is_ok());

    if let Some(connection) = open(temp.path()) {
        let dropped = connection.execute_batch(
            "DROP VIEW v1_imports; DROP INDEX idx_internal_transactions_import_id;",
        );
        assert!(dropped.is_ok());
    }

    assert!(ensure_initialized(Some(temp.path())).is_ok());

    let connection = open(temp.path());
    assert!(connection.is_some());
    if let Some(connection) = connection {
        assert!(object_exists(&connection, "view", "v1_imports"));
        assert!(object_exists(
            &connection,
            "index",
            "idx_internal_transactions_import_id"
        ));
    }
}

#[test]
fn changed_meta_values_mark_the_ledger_corrupt() {
    let temp = tempdir();
    assert!(temp.is_ok());
    let Ok(temp) = temp else {
        return;
    };
    assert!(ensure_initialized(Some(temp.path())).is_ok());

    if let Some(connection) = open(temp.path()) {
        let updated = connection.execute(
            "UPDATE internal_meta SET value = 'v9' WHERE key = 'schema_version'",
            [],
        );
        assert!(updated.is_ok());
    }

    let result = ensure_initialized(Some(temp.path()));
    assert!(matches!(result, Err(ref error) if error.code == "ledger_corrupt"));
}

#[test]
fn non_database_file_is_reported_corrupt() {
    let temp = tempdir();
    assert!(temp.is_ok());
    let Ok(temp) = temp else {
        return;
    };
    let written = std::fs::write(
        temp.path().join("ledger.db"),
        b"this is definitely not an sqlite database file, just plain text padding",
    );
    assert!(written.is_ok());

    let result = ensure_initialized(Some(temp.path()));
    assert!(result.is_err());
    if let Err(error) = result {
        assert!(error.is_internal());
        assert_eq!(error.code, "ledger_corrupt");
    }
}
