use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, TransactionBehavior, params};
use tracing::debug;
use ulid::Ulid;

use crate::contracts::types::{ImportCounts, ImportListItem};
use crate::import::commit::{BulkCommitter, CommitReceipt, CommitRequest, CommitTransaction};
use crate::setup::ensure_initialized;
use crate::state::{
    ledger_db_path, map_sqlite_error, open_connection, open_readonly_connection,
    resolve_ledger_home,
};
use crate::{ClientError, ClientResult};

#[derive(Debug, Clone, Default)]
pub struct ImportRunContext {
    pub source_kind: String,
    pub source_ref: Option<String>,
    pub counts: ImportCounts,
}

/// Commits batches into the local SQLite ledger.
///
/// The ledger is created and migrated on the first commit, not on construction.
/// Rows identical to an already stored transaction (same date, type, amount,
/// description and account) are skipped, so the receipt may report fewer rows
/// than were sent.
#[derive(Debug)]
pub struct LedgerCommitter {
    home: PathBuf,
    db_path: PathBuf,
    run: ImportRunContext,
    last_import_id: Option<String>,
}

impl LedgerCommitter {
    pub fn new(home_override: Option<&Path>) -> ClientResult<Self> {
        let home = resolve_ledger_home(home_override)?;
        Ok(Self {
            db_path: ledger_db_path(&home),
            home,
            run: ImportRunContext::default(),
            last_import_id: None,
        })
    }

    pub fn with_run_context(mut self, run: ImportRunContext) -> Self {
        self.run = run;
        self
    }

    pub fn last_import_id(&self) -> Option<&str> {
        self.last_import_id.as_deref()
    }
}

impl BulkCommitter for LedgerCommitter {
    fn target(&self) -> String {
        format!("ledger {}", self.db_path.display())
    }

    fn commit(&mut self, request: &CommitRequest) -> ClientResult<CommitReceipt> {
        ensure_initialized(Some(&self.home))?;
        let mut connection = open_connection(&self.db_path)?;
        let import_id = persist_batch(&mut connection, &self.db_path, &self.run, request)?;
        let imported = count_run_rows(&connection, &self.db_path, &import_id)?;
        self.last_import_id = Some(import_id);
        Ok(CommitReceipt { imported })
    }
}

fn persist_batch(
    connection: &mut Connection,
    db_path: &Path,
    run: &ImportRunContext,
    request: &CommitRequest,
) -> ClientResult<String> {
    let import_id = format!("imp_{}", Ulid::new());
    let timestamp = now_timestamp();

    let transaction = connection
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    transaction
        .execute(
            "INSERT INTO internal_import_runs (
                import_id,
                created_at,
                source_kind,
                source_ref,
                rows_total,
                rows_sent,
                rows_imported,
                rows_with_errors,
                rows_with_warnings
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8)",
            params![
                &import_id,
                &timestamp,
                &run.source_kind,
                &run.source_ref,
                run.counts.total,
                request.transactions.len() as i64,
                run.counts.errors,
                run.counts.warnings
            ],
        )
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    let mut inserted = 0_i64;
    for row in &request.transactions {
        if insert_transaction(&transaction, db_path, &import_id, row)? {
            inserted += 1;
        }
    }

    transaction
        .execute(
            "UPDATE internal_import_runs SET rows_imported = ?1 WHERE import_id = ?2",
            params![inserted, &import_id],
        )
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    transaction
        .commit()
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    debug!(
        import_id = %import_id,
        sent = request.transactions.len(),
        inserted,
        "persisted import batch"
    );
    Ok(import_id)
}

/// Returns `false` when the row already exists in the ledger.
fn insert_transaction(
    transaction: &rusqlite::Transaction<'_>,
    db_path: &Path,
    import_id: &str,
    row: &CommitTransaction,
) -> ClientResult<bool> {
    let tags = row
        .tags
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|error| ClientError::internal_serialization(&error.to_string()))?;

    let changed = transaction
        .execute(
            "INSERT OR IGNORE INTO internal_transactions (
                txn_id,
                import_id,
                occurred_at,
                kind,
                amount,
                description,
                category,
                account_name,
                tags,
                recurring
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                format!("txn_{}", Ulid::new()),
                import_id,
                &row.date,
                row.kind.as_str(),
                row.amount,
                &row.description,
                &row.category,
                &row.account_name,
                tags,
                row.recurring
            ],
        )
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    Ok(changed > 0)
}

fn count_run_rows(connection: &Connection, db_path: &Path, import_id: &str) -> ClientResult<i64> {
    connection
        .query_row(
            "SELECT rows_imported FROM internal_import_runs WHERE import_id = ?1",
            [import_id],
            |row| row.get::<_, i64>(0),
        )
        .map_err(|error| map_sqlite_error(db_path, &error))
}

pub fn list_import_runs(db_path: &Path) -> ClientResult<Vec<ImportListItem>> {
    let connection = open_readonly_connection(db_path)?;
    let mut statement = connection
        .prepare(
            "SELECT
                import_id,
                created_at,
                source_kind,
                source_ref,
                rows_total,
                rows_sent,
                rows_imported,
                rows_with_errors,
                rows_with_warnings
             FROM internal_import_runs
             ORDER BY CAST(created_at AS INTEGER) DESC, import_id DESC",
        )
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    let rows = statement
        .query_map([], |row| {
            Ok(ImportListItem {
                import_id: row.get(0)?,
                created_at: row.get(1)?,
                source_kind: row.get(2)?,
                source_ref: row.get(3)?,
                rows_total: row.get(4)?,
                rows_sent: row.get(5)?,
                rows_imported: row.get(6)?,
                rows_with_errors: row.get(7)?,
                rows_with_warnings: row.get(8)?,
            })
        })
        .map_err(|error| map_sqlite_error(db_path, &error))?
        .collect::<Result<Vec<ImportListItem>, _>>()
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    Ok(rows)
}

pub(crate) fn now_timestamp() -> String {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration.as_secs().to_string(),
        Err(_) => "0".to_string(),
    }
}
