use std::fs;
use std::io::{IsTerminal, Read};

use encoding_rs::Encoding;
use tracing::debug;

use crate::config::{ImportConfig, SourceFormat};
use crate::import::invalid_input_error;
use crate::{ClientError, ClientResult};

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SourceKind {
    File,
    Stdin,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Stdin => "stdin",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedSource {
    pub source_kind: SourceKind,
    pub source_ref: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum RawSource {
    /// Non-empty lines of delimited text, in file order.
    Delimited { lines: Vec<String> },
    Json { text: String },
}

impl RawSource {
    pub fn format(&self) -> SourceFormat {
        match self {
            Self::Delimited { .. } => SourceFormat::Csv,
            Self::Json { .. } => SourceFormat::Json,
        }
    }
}

pub fn resolve_source(
    path: Option<String>,
    stdin_override: Option<Vec<u8>>,
) -> ClientResult<ResolvedSource> {
    if let Some(path_value) = path {
        if path_value == "-" {
            let stdin_body = read_stdin(stdin_override)?;
            if let Some(stdin_value) = stdin_body {
                return Ok(ResolvedSource {
                    source_kind: SourceKind::Stdin,
                    source_ref: None,
                    bytes: stdin_value,
                });
            }

            return Err(invalid_input_error(
                "Path `-` means stdin input, but stdin was empty. Pipe CSV/JSON input or pass a file path.",
            ));
        }

        let file_body = fs::read(&path_value).map_err(|error| {
            ClientError::invalid_argument_with_recovery(
                &format!("Could not read import file `{path_value}`: {error}"),
                vec![
                    "Verify the path exists and is readable.".to_string(),
                    "Rerun pocketbook import create <path>.".to_string(),
                ],
            )
        })?;

        return Ok(ResolvedSource {
            source_kind: SourceKind::File,
            source_ref: Some(path_value),
            bytes: file_body,
        });
    }

    if let Some(stdin_value) = read_stdin(stdin_override)? {
        return Ok(ResolvedSource {
            source_kind: SourceKind::Stdin,
            source_ref: None,
            bytes: stdin_value,
        });
    }

    Err(invalid_input_error(
        "No import source provided. Pass a file path or pipe input via stdin.",
    ))
}

fn read_stdin(stdin_override: Option<Vec<u8>>) -> ClientResult<Option<Vec<u8>>> {
    if let Some(value) = stdin_override {
        if value.is_empty() {
            return Ok(None);
        }
        return Ok(Some(value));
    }

    if std::io::stdin().is_terminal() {
        return Ok(None);
    }

    let mut buffer = Vec::new();
    std::io::stdin().read_to_end(&mut buffer).map_err(|error| {
        ClientError::invalid_argument_with_recovery(
            &format!("Could not read stdin: {error}"),
            vec![
                "Retry with an explicit file path argument.".to_string(),
                "Or rerun with valid stdin content.".to_string(),
            ],
        )
    })?;

    if buffer.is_empty() {
        return Ok(None);
    }

    Ok(Some(buffer))
}

/// Decodes `bytes` under the declared encoding. Any malformed sequence fails the
/// whole read; nothing is parsed from a partially decoded file.
pub fn decode_text(bytes: &[u8], encoding_label: &str) -> ClientResult<String> {
    let label = encoding_label.trim();
    let encoding = Encoding::for_label(label.as_bytes())
        .ok_or_else(|| ClientError::unsupported_encoding(label))?;

    let (text, had_errors) = encoding.decode_with_bom_removal(bytes);
    if had_errors {
        return Err(ClientError::decode_failed(encoding.name()));
    }

    debug!(
        encoding = encoding.name(),
        bytes = bytes.len(),
        "decoded import source"
    );
    Ok(text.into_owned())
}

pub fn split_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}

pub fn read_source(bytes: &[u8], config: &ImportConfig) -> ClientResult<RawSource> {
    let text = decode_text(bytes, &config.encoding)?;
    match config.format {
        SourceFormat::Csv => {
            let lines = split_lines(&text);
            debug!(lines = lines.len(), "split delimited source into lines");
            Ok(RawSource::Delimited { lines })
        }
        SourceFormat::Json => Ok(RawSource::Json { text }),
    }
}
