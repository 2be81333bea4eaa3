pub mod commit;
pub mod input;
pub mod ledger;
pub mod mapping;
pub mod normalize;
pub mod remote;
pub mod report;
pub mod schema;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::{ImportConfig, SourceFormat};
use crate::contracts::types::{MappingEntry, SourceSettings};
use crate::import::input::{ResolvedSource, read_source};
use crate::import::mapping::{
    CanonicalField, FieldMapping, MappingDraft, MappingOverrides, auto_map, unmapped_columns,
};
use crate::import::normalize::{ParsedTransaction, normalize_rows};
use crate::import::report::{ImportPreview, build_preview};
use crate::import::schema::{ColumnCatalog, DetectedSchema, detect_schema};
use crate::{ClientError, ClientResult};

/// One pass of the import pipeline over a single source.
///
/// Reading and schema detection happen once in [`ImportSession::open`]. The
/// mapping can then be adjusted any number of times before normalization.
/// The session never commits; see [`commit::commit_batch`].
#[derive(Debug, Clone)]
pub struct ImportSession {
    source: ResolvedSource,
    config: ImportConfig,
    schema: DetectedSchema,
    suggested: MappingDraft,
}

impl ImportSession {
    pub fn open(source: ResolvedSource, config: ImportConfig) -> ClientResult<Self> {
        let raw = read_source(&source.bytes, &config)?;
        let schema = detect_schema(&raw, &config)?;
        let suggested = match config.format {
            SourceFormat::Csv => auto_map(&schema.columns),
            SourceFormat::Json => MappingDraft::new(),
        };

        debug!(
            format = config.format.as_str(),
            columns = schema.columns.len(),
            rows = schema.rows.len(),
            "opened import session"
        );

        Ok(Self {
            source,
            config,
            schema,
            suggested,
        })
    }

    pub fn source(&self) -> &ResolvedSource {
        &self.source
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    pub fn columns(&self) -> &ColumnCatalog {
        &self.schema.columns
    }

    pub fn rows_detected(&self) -> i64 {
        self.schema.rows.len() as i64
    }

    /// Auto-mapping guess for delimited sources; empty for JSON.
    pub fn suggested_mapping(&self) -> &MappingDraft {
        &self.suggested
    }

    pub fn unmapped_columns(&self, draft: &MappingDraft) -> Vec<String> {
        unmapped_columns(&self.schema.columns, draft)
    }

    pub fn draft(&self, overrides: &MappingOverrides) -> ClientResult<MappingDraft> {
        match self.config.format {
            SourceFormat::Json if !overrides.is_empty() => Err(invalid_input_error(
                "Column mapping applies to delimited sources only. JSON records are read by field name.",
            )),
            SourceFormat::Json => Ok(MappingDraft::new()),
            SourceFormat::Csv => self
                .suggested
                .clone()
                .merged_with(overrides, self.config.has_headers),
        }
    }

    pub fn freeze(&self, draft: MappingDraft) -> ClientResult<FieldMapping> {
        match self.config.format {
            SourceFormat::Json => Ok(FieldMapping::object_keys()),
            SourceFormat::Csv => draft.freeze(&self.schema.columns),
        }
    }

    pub fn normalize(
        &self,
        mapping: &FieldMapping,
        processed_at: DateTime<Utc>,
    ) -> Vec<ParsedTransaction> {
        normalize_rows(&self.schema.rows, mapping, processed_at)
    }

    pub fn preview(&self, mapping: &FieldMapping, processed_at: DateTime<Utc>) -> ImportPreview {
        build_preview(self.normalize(mapping, processed_at))
    }

    pub fn settings(&self) -> SourceSettings {
        SourceSettings {
            format: self.config.format.as_str().to_string(),
            separator: self.config.separator.as_str().to_string(),
            has_headers: self.config.has_headers,
            encoding: self.config.encoding.clone(),
        }
    }

    pub fn mapping_entries(&self, draft: &MappingDraft) -> Vec<MappingEntry> {
        CanonicalField::ALL
            .into_iter()
            .map(|field| MappingEntry {
                field: field.as_str().to_string(),
                required: field.is_required(),
                column: match self.config.format {
                    SourceFormat::Json => Some(field.as_str().to_string()),
                    SourceFormat::Csv => draft.column_for(field).map(|column| column.label()),
                },
            })
            .collect()
    }

    pub fn missing_required(&self, draft: &MappingDraft) -> Vec<CanonicalField> {
        match self.config.format {
            SourceFormat::Json => Vec::new(),
            SourceFormat::Csv => draft.missing_required(),
        }
    }
}

pub(crate) fn invalid_input_error(message: &str) -> ClientError {
    ClientError::invalid_argument_with_recovery(
        message,
        vec![
            "Provide CSV or JSON input via a path or stdin.".to_string(),
            "Run `pocketbook import inspect <path>` to check detected columns.".to_string(),
        ],
    )
    .with_import_help()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::ImportSession;
    use crate::config::ImportConfig;
    use crate::import::input::{ResolvedSource, SourceKind};
    use crate::import::mapping::{CanonicalField, MappingOverrides};

    fn source(body: &str) -> ResolvedSource {
        ResolvedSource {
            source_kind: SourceKind::Stdin,
            source_ref: None,
            bytes: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn session_suggests_mapping_from_spanish_headers() {
        let session = ImportSession::open(
            source("fecha,monto,concepto,notas\n2024-01-15,1.500,Salario,x\n"),
            ImportConfig::csv(),
        );
        assert!(session.is_ok());
        if let Ok(session) = session {
            let draft = session.suggested_mapping();
            assert!(draft.is_complete());
            assert_eq!(session.unmapped_columns(draft), vec!["notas".to_string()]);
            assert_eq!(session.rows_detected(), 1);
        }
    }

    #[test]
    fn overrides_can_complete_a_partial_mapping() {
        let session = ImportSession::open(
            source("when,monto,memo\n2024-01-15,10,Cafe\n"),
            ImportConfig::csv(),
        );
        assert!(session.is_ok());
        if let Ok(session) = session {
            assert_eq!(
                session.missing_required(session.suggested_mapping()),
                vec![CanonicalField::Date, CanonicalField::Description]
            );
            let overrides = MappingOverrides::new()
                .set(CanonicalField::Date, "when")
                .set(CanonicalField::Description, "memo");
            let draft = session.draft(&overrides);
            assert!(draft.is_ok());
            if let Ok(draft) = draft {
                let mapping = session.freeze(draft);
                assert!(mapping.is_ok());
                if let Ok(mapping) = mapping {
                    let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single();
                    assert!(now.is_some());
                    if let Some(now) = now {
                        let preview = session.preview(&mapping, now);
                        assert_eq!(preview.counts.valid, 1);
                    }
                }
            }
        }
    }

    #[test]
    fn json_sources_reject_column_overrides() {
        let session = ImportSession::open(source("[]"), ImportConfig::json());
        assert!(session.is_ok());
        if let Ok(session) = session {
            let overrides = MappingOverrides::new().set(CanonicalField::Date, "when");
            let draft = session.draft(&overrides);
            assert!(matches!(draft, Err(ref error) if error.code == "invalid_argument"));
            assert!(session.draft(&MappingOverrides::new()).is_ok());
        }
    }
}
