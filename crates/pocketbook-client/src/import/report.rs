use serde::Serialize;

use crate::contracts::types::{ImportCounts, RowIssue};
use crate::import::normalize::ParsedTransaction;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportReport {
    pub total: i64,
    pub success: i64,
    pub warnings: i64,
    pub errors: i64,
    pub records: Vec<ParsedTransaction>,
}

impl ImportReport {
    pub fn failed_records(&self) -> impl Iterator<Item = &ParsedTransaction> {
        self.records.iter().filter(|record| !record.is_valid())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportPreview {
    pub counts: ImportCounts,
    pub records: Vec<ParsedTransaction>,
}

/// `success` comes from the collaborator; `errors` and `warnings` come only from
/// the records themselves.
pub fn build_report(records: Vec<ParsedTransaction>, imported: i64) -> ImportReport {
    let tally = counts(&records);
    ImportReport {
        total: tally.total,
        success: imported,
        warnings: tally.warnings,
        errors: tally.errors,
        records,
    }
}

pub fn build_preview(records: Vec<ParsedTransaction>) -> ImportPreview {
    ImportPreview {
        counts: counts(&records),
        records,
    }
}

pub fn counts(records: &[ParsedTransaction]) -> ImportCounts {
    let errors = records.iter().filter(|record| !record.is_valid()).count() as i64;
    let warnings = records.iter().filter(|record| record.has_warnings()).count() as i64;
    let total = records.len() as i64;
    ImportCounts {
        total,
        valid: total - errors,
        warnings,
        errors,
    }
}

/// Rows that carry at least one error or warning, in source order.
pub fn row_issues(records: &[ParsedTransaction]) -> Vec<RowIssue> {
    records
        .iter()
        .filter(|record| !record.is_valid() || record.has_warnings())
        .map(|record| RowIssue {
            row: record.row,
            errors: record.errors.clone(),
            warnings: record.warnings.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{build_preview, build_report, row_issues};
    use crate::import::normalize::{ParsedTransaction, TransactionKind};

    fn record(row: i64, errors: usize, warnings: usize) -> ParsedTransaction {
        ParsedTransaction {
            row,
            kind: TransactionKind::Income,
            amount: 10.0,
            description: "Salario".to_string(),
            category: "Otros".to_string(),
            account_name: "Principal".to_string(),
            date: "2024-01-15T00:00:00.000Z".to_string(),
            tags: None,
            recurring: None,
            errors: vec!["Amount required".to_string(); errors],
            warnings: vec!["Date not specified, using current date".to_string(); warnings],
        }
    }

    #[test]
    fn rows_count_once_however_many_messages_they_carry() {
        let records = vec![record(1, 2, 1), record(2, 0, 2), record(3, 0, 0)];
        let report = build_report(records, 1);
        assert_eq!(report.total, 3);
        assert_eq!(report.success, 1);
        assert_eq!(report.errors, 1);
        assert_eq!(report.warnings, 2);
        assert_eq!(report.failed_records().count(), 1);
    }

    #[test]
    fn report_is_deterministic_for_same_inputs() {
        let records = vec![record(1, 1, 0), record(2, 0, 1)];
        assert_eq!(
            build_report(records.clone(), 1),
            build_report(records, 1)
        );
    }

    #[test]
    fn preview_counts_valid_rows() {
        let preview = build_preview(vec![record(1, 1, 0), record(2, 0, 0), record(3, 0, 1)]);
        assert_eq!(preview.counts.valid, 2);
        assert_eq!(preview.counts.errors, 1);
        assert_eq!(preview.counts.warnings, 1);
    }

    #[test]
    fn issues_list_only_rows_with_messages() {
        let issues = row_issues(&[record(1, 0, 0), record(2, 1, 0), record(3, 0, 1)]);
        assert_eq!(
            issues.iter().map(|issue| issue.row).collect::<Vec<i64>>(),
            vec![2, 3]
        );
    }
}
