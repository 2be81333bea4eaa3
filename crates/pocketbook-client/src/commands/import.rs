use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::{
    ImportConfig, Separator, SourceFormat, api_token_from_env, commit_url_from_env,
};
use crate::contracts::envelope::{SuccessEnvelope, success};
use crate::contracts::types::{ImportInspectData, ImportListData, ImportNextStep, ImportRunData};
use crate::import::ImportSession;
use crate::import::commit::{BulkCommitter, commit_batch};
use crate::import::input::{SourceKind, resolve_source};
use crate::import::ledger::{ImportRunContext, LedgerCommitter, list_import_runs};
use crate::import::mapping::MappingOverrides;
use crate::import::remote::HttpCommitter;
use crate::import::report::{counts, row_issues};
use crate::setup::ensure_initialized;
use crate::{ClientError, ClientResult};

#[derive(Debug, Default)]
pub struct ImportSourceOptions {
    pub path: Option<String>,
    pub format: Option<String>,
    pub separator: Option<String>,
    pub no_headers: bool,
    pub encoding: Option<String>,
    pub stdin_override: Option<Vec<u8>>,
}

/// Explicit column choices layered over the auto-mapping guess.
#[derive(Debug, Default)]
pub struct ImportMappingOptions {
    /// `field=column` pairs; these win over the mapping file.
    pub pairs: Vec<String>,
    pub mapping_file: Option<String>,
}

#[derive(Debug, Default)]
pub struct ImportInspectOptions {
    pub source: ImportSourceOptions,
    pub mapping: ImportMappingOptions,
}

#[derive(Debug, Default)]
pub struct ImportRunOptions<'a> {
    pub source: ImportSourceOptions,
    pub mapping: ImportMappingOptions,
    pub dry_run: bool,
    pub endpoint: Option<String>,
    pub home_override: Option<&'a Path>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct ImportListOptions<'a> {
    pub home_override: Option<&'a Path>,
}

pub fn inspect(path: Option<String>) -> ClientResult<SuccessEnvelope> {
    inspect_with_options(ImportInspectOptions {
        source: ImportSourceOptions {
            path,
            ..ImportSourceOptions::default()
        },
        ..ImportInspectOptions::default()
    })
}

#[doc(hidden)]
pub fn inspect_with_options(options: ImportInspectOptions) -> ClientResult<SuccessEnvelope> {
    let path = options.source.path.clone();
    let session = open_session(options.source)?;
    let overrides = load_overrides(&options.mapping)?;
    let draft = session.draft(&overrides)?;
    let missing_required = session
        .missing_required(&draft)
        .iter()
        .map(|field| field.as_str().to_string())
        .collect::<Vec<String>>();

    let data = ImportInspectData {
        path,
        source_kind: session.source().source_kind.as_str().to_string(),
        settings: session.settings(),
        columns: session.columns().names(),
        mapping: session.mapping_entries(&draft),
        unmapped_columns: session.unmapped_columns(&draft),
        mapping_complete: missing_required.is_empty(),
        missing_required,
        rows_detected: session.rows_detected(),
    };

    success("import inspect", data)
}

pub fn run(path: Option<String>, dry_run: bool) -> ClientResult<SuccessEnvelope> {
    run_with_options(ImportRunOptions {
        source: ImportSourceOptions {
            path,
            ..ImportSourceOptions::default()
        },
        dry_run,
        ..ImportRunOptions::default()
    })
}

#[doc(hidden)]
pub fn run_with_options(options: ImportRunOptions<'_>) -> ClientResult<SuccessEnvelope> {
    let path = options.source.path.clone();
    let session = open_session(options.source)?;
    let overrides = load_overrides(&options.mapping)?;
    let draft = session.draft(&overrides)?;
    let mapping_entries = session.mapping_entries(&draft);
    let mapping = session.freeze(draft)?;
    let processed_at = options.processed_at.unwrap_or_else(Utc::now);
    let source_kind = session.source().source_kind.clone();

    if options.dry_run {
        let preview = session.preview(&mapping, processed_at);
        let message = format!(
            "Dry run: {} of {} rows would be committed. Nothing was written.",
            preview.counts.valid, preview.counts.total
        );
        let data = ImportRunData {
            dry_run: true,
            path,
            source_kind: source_kind.as_str().to_string(),
            settings: session.settings(),
            mapping: mapping_entries,
            target: None,
            import_id: None,
            message,
            report: None,
            issues: row_issues(&preview.records),
            preview: Some(preview),
            next_step: ImportNextStep {
                label: "Commit this import".to_string(),
                command: create_command(&source_kind, false),
            },
        };
        return success("import create", data);
    }

    let records = session.normalize(&mapping, processed_at);
    let tally = counts(&records);
    let issues = row_issues(&records);

    let endpoint = options.endpoint.or_else(commit_url_from_env);
    let (report, target, import_id) = match endpoint {
        Some(base_url) => {
            let mut committer = HttpCommitter::new(&base_url, api_token_from_env().as_deref())?;
            let target = committer.target();
            (commit_batch(records, &mut committer)?, target, None)
        }
        None => {
            let mut committer =
                LedgerCommitter::new(options.home_override)?.with_run_context(ImportRunContext {
                    source_kind: source_kind.as_str().to_string(),
                    source_ref: session.source().source_ref.clone(),
                    counts: tally,
                });
            let target = committer.target();
            let report = commit_batch(records, &mut committer)?;
            let import_id = committer.last_import_id().map(str::to_string);
            (report, target, import_id)
        }
    };

    info!(
        total = report.total,
        imported = report.success,
        errors = report.errors,
        "import finished"
    );

    let mut message = format!("Imported {} of {} rows.", report.success, report.total);
    if report.errors > 0 {
        message.push_str(&format!(" {} rows had errors and were skipped.", report.errors));
    }
    let sent = tally.valid;
    if report.success < sent {
        message.push_str(&format!(
            " {} valid rows were already present or refused by the target.",
            sent - report.success
        ));
    }

    let next_step = if report.errors > 0 {
        ImportNextStep {
            label: "Fix the rows listed under issues, then preview again".to_string(),
            command: create_command(&source_kind, true),
        }
    } else if import_id.is_some() {
        ImportNextStep {
            label: "View import history".to_string(),
            command: "pocketbook import list".to_string(),
        }
    } else {
        ImportNextStep {
            label: "Import another file".to_string(),
            command: "pocketbook import create <path>".to_string(),
        }
    };

    let data = ImportRunData {
        dry_run: false,
        path,
        source_kind: source_kind.as_str().to_string(),
        settings: session.settings(),
        mapping: mapping_entries,
        target: Some(target),
        import_id,
        message,
        report: Some(report),
        preview: None,
        issues,
        next_step,
    };

    success("import create", data)
}

pub fn list() -> ClientResult<SuccessEnvelope> {
    list_with_options(ImportListOptions::default())
}

#[doc(hidden)]
pub fn list_with_options(options: ImportListOptions<'_>) -> ClientResult<SuccessEnvelope> {
    let ledger = ensure_initialized(options.home_override)?;
    let rows = list_import_runs(&ledger.db_path)?;
    success(
        "import list",
        ImportListData {
            db_path: ledger.db_path_display(),
            rows,
        },
    )
}

fn open_session(options: ImportSourceOptions) -> ClientResult<ImportSession> {
    let config = build_config(&options)?;
    let source = resolve_source(options.path, options.stdin_override)?;
    ImportSession::open(source, config)
}

fn build_config(options: &ImportSourceOptions) -> ClientResult<ImportConfig> {
    let format = match (&options.format, &options.path) {
        (Some(value), _) => SourceFormat::parse(value)?,
        (None, Some(path)) => SourceFormat::infer_from_path(path),
        (None, None) => SourceFormat::Csv,
    };

    let mut config = ImportConfig {
        format,
        ..ImportConfig::default()
    }
    .with_headers(!options.no_headers);
    if let Some(separator) = &options.separator {
        config = config.with_separator(Separator::parse(separator)?);
    }
    if let Some(encoding) = &options.encoding {
        config = config.with_encoding(encoding);
    }
    Ok(config)
}

fn load_overrides(options: &ImportMappingOptions) -> ClientResult<MappingOverrides> {
    let from_file = match &options.mapping_file {
        Some(path) => read_mapping_file(path)?,
        None => MappingOverrides::new(),
    };
    Ok(from_file.extend(MappingOverrides::from_pairs(&options.pairs)?))
}

fn read_mapping_file(path: &str) -> ClientResult<MappingOverrides> {
    let recovery = vec![
        "The mapping file is a JSON object such as {\"date\": \"Fecha\", \"amount\": \"Monto\"}."
            .to_string(),
        "Run pocketbook import inspect <path> to list the detected columns.".to_string(),
    ];
    let text = std::fs::read_to_string(path).map_err(|error| {
        ClientError::invalid_argument_with_recovery(
            &format!("Could not read mapping file `{path}`: {error}"),
            recovery.clone(),
        )
    })?;
    serde_json::from_str::<MappingOverrides>(&text).map_err(|error| {
        ClientError::invalid_argument_with_recovery(
            &format!("Mapping file `{path}` is not a valid field mapping: {error}"),
            recovery,
        )
    })
}

fn create_command(source_kind: &SourceKind, dry_run: bool) -> String {
    let flag = if dry_run { " --dry-run" } else { "" };
    match source_kind {
        SourceKind::Stdin => format!("pocketbook import create{flag} -"),
        SourceKind::File => format!("pocketbook import create{flag} <path>"),
    }
}

#[cfg(test)]
mod tests {
    use super::{ImportMappingOptions, ImportSourceOptions, build_config, load_overrides};
    use crate::config::{Separator, SourceFormat};

    #[test]
    fn config_is_inferred_from_path_and_flags() {
        let config = build_config(&ImportSourceOptions {
            path: Some("export.JSON".to_string()),
            ..ImportSourceOptions::default()
        });
        assert!(matches!(config, Ok(ref config) if config.format == SourceFormat::Json));

        let config = build_config(&ImportSourceOptions {
            path: Some("bank.txt".to_string()),
            separator: Some(";".to_string()),
            no_headers: true,
            encoding: Some("latin1".to_string()),
            ..ImportSourceOptions::default()
        });
        assert!(config.is_ok());
        if let Ok(config) = config {
            assert_eq!(config.format, SourceFormat::Csv);
            assert_eq!(config.separator, Separator::Semicolon);
            assert!(!config.has_headers);
            assert_eq!(config.encoding, "latin1");
        }
    }

    #[test]
    fn unknown_format_flag_is_rejected() {
        let config = build_config(&ImportSourceOptions {
            format: Some("xlsx".to_string()),
            ..ImportSourceOptions::default()
        });
        assert!(matches!(config, Err(ref error) if error.code == "invalid_argument"));
    }

    #[test]
    fn flag_pairs_win_over_mapping_file() {
        let temp = tempfile::tempdir();
        assert!(temp.is_ok());
        if let Ok(temp) = temp {
            let file = temp.path().join("mapping.json");
            let written = std::fs::write(&file, r#"{"date":"Fecha","amount":"Monto"}"#);
            assert!(written.is_ok());
            let overrides = load_overrides(&ImportMappingOptions {
                pairs: vec!["amount=Importe".to_string()],
                mapping_file: Some(file.display().to_string()),
            });
            assert!(overrides.is_ok());
            if let Ok(overrides) = overrides {
                assert!(!overrides.is_empty());
            }
        }
    }

    #[test]
    fn missing_mapping_file_is_an_argument_error() {
        let overrides = load_overrides(&ImportMappingOptions {
            pairs: Vec::new(),
            mapping_file: Some("/definitely/not/here.json".to_string()),
        });
        assert!(matches!(overrides, Err(ref error) if error.code == "invalid_argument"));
    }
}
