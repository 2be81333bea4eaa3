use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{ClientError, ClientResult};

pub const DEFAULT_ENCODING: &str = "utf-8";
pub const COMMIT_URL_ENV: &str = "POCKETBOOK_COMMIT_URL";
pub const API_TOKEN_ENV: &str = "POCKETBOOK_API_TOKEN";
pub const HOME_ENV: &str = "POCKETBOOK_HOME";
pub const LOG_ENV: &str = "POCKETBOOK_LOG";

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Csv,
    Json,
}

impl SourceFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }

    pub fn parse(value: &str) -> ClientResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(ClientError::invalid_argument_for_command(
                &format!("format must be `csv` or `json`; got `{other}`"),
                Some("import create"),
            )),
        }
    }

    /// `.json` files are read as JSON, everything else as delimited text.
    pub fn infer_from_path(path: &str) -> Self {
        let is_json = Path::new(path)
            .extension()
            .and_then(|extension| extension.to_str())
            .map(|extension| extension.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json { Self::Json } else { Self::Csv }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum Separator {
    #[serde(rename = ",")]
    Comma,
    #[serde(rename = ";")]
    Semicolon,
    #[serde(rename = "\t")]
    Tab,
    #[serde(rename = "|")]
    Pipe,
}

impl Separator {
    pub fn as_byte(&self) -> u8 {
        match self {
            Self::Comma => b',',
            Self::Semicolon => b';',
            Self::Tab => b'\t',
            Self::Pipe => b'|',
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Comma => ",",
            Self::Semicolon => ";",
            Self::Tab => "\t",
            Self::Pipe => "|",
        }
    }

    /// Accepts the literal character or a spelled-out name (`tab`, `semicolon`, ...).
    pub fn parse(value: &str) -> ClientResult<Self> {
        match value {
            "," | "comma" => Ok(Self::Comma),
            ";" | "semicolon" => Ok(Self::Semicolon),
            "\t" | "\\t" | "tab" => Ok(Self::Tab),
            "|" | "pipe" => Ok(Self::Pipe),
            other => Err(ClientError::invalid_argument_for_command(
                &format!("separator must be one of `,` `;` `tab` `|`; got `{other}`"),
                Some("import create"),
            )),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportConfig {
    pub format: SourceFormat,
    #[serde(default = "default_separator")]
    pub separator: Separator,
    #[serde(default = "default_has_headers")]
    pub has_headers: bool,
    #[serde(default = "default_encoding")]
    pub encoding: String,
}

impl ImportConfig {
    pub fn csv() -> Self {
        Self {
            format: SourceFormat::Csv,
            separator: default_separator(),
            has_headers: default_has_headers(),
            encoding: default_encoding(),
        }
    }

    pub fn json() -> Self {
        Self {
            format: SourceFormat::Json,
            ..Self::csv()
        }
    }

    pub fn with_separator(mut self, separator: Separator) -> Self {
        self.separator = separator;
        self
    }

    pub fn with_headers(mut self, has_headers: bool) -> Self {
        self.has_headers = has_headers;
        self
    }

    pub fn with_encoding(mut self, encoding: &str) -> Self {
        self.encoding = encoding.to_string();
        self
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self::csv()
    }
}

fn default_separator() -> Separator {
    Separator::Comma
}

fn default_has_headers() -> bool {
    true
}

fn default_encoding() -> String {
    DEFAULT_ENCODING.to_string()
}

pub fn commit_url_from_env() -> Option<String> {
    std::env::var(COMMIT_URL_ENV)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn api_token_from_env() -> Option<String> {
    std::env::var(API_TOKEN_ENV)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
