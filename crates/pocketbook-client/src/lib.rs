//! Bulk transaction import for a personal ledger.
//!
//! Sources are read, mapped onto canonical fields, validated row by row and
//! committed in one batch to either the local SQLite ledger or a remote
//! storage service. See [`import::ImportSession`] for the pipeline and
//! [`commands::import`] for the entry points used by the CLI.

pub mod commands;
pub mod config;
pub mod contracts;
pub mod error;
pub mod import;
pub mod migrations;
pub mod setup;
pub mod state;

pub use config::ImportConfig;
pub use contracts::envelope::{FailureEnvelope, SuccessEnvelope};
pub use error::{ClientError, ClientResult};

pub const API_VERSION: &str = env!("CARGO_PKG_VERSION");
