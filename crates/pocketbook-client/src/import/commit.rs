use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::import::normalize::{ParsedTransaction, TransactionKind};
use crate::import::report::{ImportReport, build_report, counts, row_issues};
use crate::{ClientError, ClientResult};

/// Wire shape of one committed record. Errors and warnings are never sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitTransaction {
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: f64,
    pub description: String,
    pub category: String,
    pub account_name: String,
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring: Option<bool>,
}

impl From<&ParsedTransaction> for CommitTransaction {
    fn from(record: &ParsedTransaction) -> Self {
        Self {
            kind: record.kind,
            amount: record.amount,
            description: record.description.clone(),
            category: record.category.clone(),
            account_name: record.account_name.clone(),
            date: record.date.clone(),
            tags: record.tags.clone(),
            recurring: record.recurring,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitRequest {
    pub transactions: Vec<CommitTransaction>,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct CommitReceipt {
    pub imported: i64,
}

/// The storage service that persists a validated batch in one round trip.
pub trait BulkCommitter {
    fn target(&self) -> String;

    fn commit(&mut self, request: &CommitRequest) -> ClientResult<CommitReceipt>;
}

/// Sends every error-free record to `committer` and builds the final report.
///
/// Fails with `no_valid_records` before any I/O when nothing is committable.
/// Collaborator failures surface as `commit_failed`; the caller keeps `records`
/// and may retry from this step.
pub fn commit_batch(
    records: Vec<ParsedTransaction>,
    committer: &mut dyn BulkCommitter,
) -> ClientResult<ImportReport> {
    let request = CommitRequest {
        transactions: records
            .iter()
            .filter(|record| record.is_valid())
            .map(CommitTransaction::from)
            .collect(),
    };

    if request.transactions.is_empty() {
        return Err(ClientError::no_valid_records(
            counts(&records),
            row_issues(&records),
        ));
    }

    let sent = request.transactions.len() as i64;
    let target = committer.target();
    info!(sent, target = %target, "committing import batch");

    let receipt = committer.commit(&request).map_err(|error| {
        warn!(code = %error.code, target = %target, "bulk commit failed");
        as_commit_failure(error)
    })?;

    let imported = receipt.imported.clamp(0, sent);
    if imported != receipt.imported {
        warn!(
            reported = receipt.imported,
            sent, "collaborator reported an out-of-range imported count"
        );
    } else if imported < sent {
        warn!(imported, sent, "collaborator imported fewer rows than sent");
    }

    Ok(build_report(records, imported))
}

fn as_commit_failure(error: ClientError) -> ClientError {
    if error.code == "commit_failed" {
        return error;
    }
    let cause = error.code.clone();
    let mut wrapped = ClientError::commit_failed(&error.message, None);
    if let Some(object) = wrapped.data.as_mut().and_then(|data| data.as_object_mut()) {
        object.insert("cause_code".to_string(), serde_json::Value::String(cause));
    }
    wrapped.recovery_steps.extend(error.recovery_steps);
    wrapped
}

#[cfg(test)]
mod tests {
    use super::{BulkCommitter, CommitReceipt, CommitRequest, commit_batch};
    use crate::import::normalize::{ParsedTransaction, TransactionKind};
    use crate::{ClientError, ClientResult};

    struct RecordingCommitter {
        reply: ClientResult<CommitReceipt>,
        calls: Vec<CommitRequest>,
    }

    impl RecordingCommitter {
        fn replying(reply: ClientResult<CommitReceipt>) -> Self {
            Self {
                reply,
                calls: Vec::new(),
            }
        }
    }

    impl BulkCommitter for RecordingCommitter {
        fn target(&self) -> String {
            "memory".to_string()
        }

        fn commit(&mut self, request: &CommitRequest) -> ClientResult<CommitReceipt> {
            self.calls.push(request.clone());
            self.reply.clone()
        }
    }

    fn record(row: i64, errors: &[&str], warnings: &[&str]) -> ParsedTransaction {
        ParsedTransaction {
            row,
            kind: TransactionKind::Expense,
            amount: row as f64,
            description: format!("row {row}"),
            category: "Otros".to_string(),
            account_name: "Principal".to_string(),
            date: "2024-01-15T00:00:00.000Z".to_string(),
            tags: None,
            recurring: None,
            errors: errors.iter().map(|value| value.to_string()).collect(),
            warnings: warnings.iter().map(|value| value.to_string()).collect(),
        }
    }

    fn ten_rows_three_invalid() -> Vec<ParsedTransaction> {
        (1..=10)
            .map(|row| match row {
                2 | 5 | 9 => record(row, &["Amount required"], &[]),
                3 | 4 => record(row, &[], &["Type not specified, assuming expense"]),
                _ => record(row, &[], &[]),
            })
            .collect()
    }

    #[test]
    fn only_valid_rows_are_sent_and_backend_count_wins() {
        let mut committer = RecordingCommitter::replying(Ok(CommitReceipt { imported: 6 }));
        let report = commit_batch(ten_rows_three_invalid(), &mut committer);
        assert!(report.is_ok());
        if let Ok(report) = report {
            assert_eq!(report.total, 10);
            assert_eq!(report.success, 6);
            assert_eq!(report.errors, 3);
            assert_eq!(report.warnings, 2);
            assert_eq!(report.records.len(), 10);
        }
        assert_eq!(committer.calls.len(), 1);
        let sent_rows = committer.calls[0]
            .transactions
            .iter()
            .map(|transaction| transaction.description.clone())
            .collect::<Vec<String>>();
        assert_eq!(
            sent_rows,
            ["row 1", "row 3", "row 4", "row 6", "row 7", "row 8", "row 10"]
        );
    }

    #[test]
    fn commit_payload_omits_errors_and_warnings() {
        let mut committer = RecordingCommitter::replying(Ok(CommitReceipt { imported: 1 }));
        let result = commit_batch(vec![record(1, &[], &["note"])], &mut committer);
        assert!(result.is_ok());
        let payload = serde_json::to_value(&committer.calls[0]).unwrap_or_default();
        let sent = &payload["transactions"][0];
        assert_eq!(sent["type"], "expense");
        assert!(sent.get("errors").is_none());
        assert!(sent.get("warnings").is_none());
        assert!(sent.get("row").is_none());
        assert!(sent.get("tags").is_none());
    }

    #[test]
    fn zero_valid_rows_fails_without_calling_backend() {
        let mut committer = RecordingCommitter::replying(Ok(CommitReceipt { imported: 0 }));
        let result = commit_batch(vec![record(1, &["Amount required"], &[])], &mut committer);
        assert!(matches!(result, Err(ref error) if error.code == "no_valid_records"));
        assert!(committer.calls.is_empty());

        let empty = commit_batch(Vec::new(), &mut committer);
        assert!(matches!(empty, Err(ref error) if error.code == "no_valid_records"));
    }

    #[test]
    fn backend_failures_become_commit_failed() {
        let mut committer =
            RecordingCommitter::replying(Err(ClientError::ledger_locked(std::path::Path::new(
                "/tmp/ledger.db",
            ))));
        let result = commit_batch(ten_rows_three_invalid(), &mut committer);
        assert!(result.is_err());
        if let Err(error) = result {
            assert_eq!(error.code, "commit_failed");
            let cause = error
                .data
                .as_ref()
                .and_then(|data| data.get("cause_code"))
                .and_then(serde_json::Value::as_str)
                .map(str::to_string);
            assert_eq!(cause.as_deref(), Some("ledger_locked"));
        }
    }

    #[test]
    fn over_reported_counts_are_bounded_by_rows_sent() {
        let mut committer = RecordingCommitter::replying(Ok(CommitReceipt { imported: 50 }));
        let report = commit_batch(ten_rows_three_invalid(), &mut committer);
        assert!(matches!(report, Ok(ref report) if report.success == 7));
        if let Ok(report) = report {
            assert!(report.success + report.errors <= report.total);
        }
    }
}
