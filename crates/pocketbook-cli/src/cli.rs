use clap::{ArgAction, Args, Parser, Subcommand};

/// Extended help shown after `pocketbook import create --help`.
pub const IMPORT_CREATE_AFTER_HELP: &str = "\
How import works:
  1. pocketbook reads your CSV or JSON export and guesses which column holds
     each transaction field from the header names.
  2. Every row is checked on its own. Rows with errors are reported and skipped;
     rows with warnings are imported with a default value.
  3. The valid rows are committed in one batch to your local ledger, or to the
     service at --endpoint / POCKETBOOK_COMMIT_URL.

  <path> is a local file path. Use `-` to read stdin.
  Example: cat export.csv | pocketbook import create --dry-run -

What to do next:
  1. Run `pocketbook import inspect <path>` to see detected columns and the guessed mapping.
  2. Fix gaps with --map <field>=<column> (repeatable) or --mapping <file.json>.
  3. Run `pocketbook import create --dry-run <path>` and review the reported rows.
  4. Run `pocketbook import create <path>` to commit.

Fields:
  date          required  YYYY-MM-DD, DD/MM/YYYY, DD-MM-YYYY, DD.MM.YYYY or RFC 3339.
                          A blank date uses the time of the import (warning).
  amount        required  A non-negative number. Currency symbols, ISO codes and
                          thousands separators are ignored: `$1,500.50`, `1.500,50 EUR`.
  description   required  Trimmed; longer than 200 characters is truncated (warning).
  type          optional  Contains ingreso/income/+/1 for income, gasto/expense/-/0 for
                          expense. Blank means expense (warning).
  category      optional  Defaults to `Otros`.
  account_name  optional  Defaults to `Principal`.

  CSV columns named `tags`/`etiquetas` (split on `;`) and `recurring`/`recurrente`
  are picked up automatically. JSON records use the field names above as keys.

Headerless files:
  With --no-headers, map columns by 1-based position: --map date=#1 --map amount=#3
";

#[derive(Debug, Parser)]
#[command(
    name = "pocketbook",
    version,
    about = "bulk transaction import for your personal ledger",
    disable_help_subcommand = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Inspect, preview and commit transaction imports
    #[command(arg_required_else_help = true)]
    Import {
        #[command(subcommand)]
        command: ImportCommand,
    },
}

#[derive(Debug, Args)]
pub struct SourceArgs {
    /// Path to a CSV or JSON export (use `-` for stdin)
    pub path: Option<String>,
    /// Source format; inferred from the file extension when omitted
    #[arg(long, value_name = "csv|json")]
    pub format: Option<String>,
    /// Column separator for delimited files: `,` `;` `tab` or `|`
    #[arg(long)]
    pub separator: Option<String>,
    /// Treat the first line as data instead of column names
    #[arg(long)]
    pub no_headers: bool,
    /// Text encoding of the file (for example utf-8, latin1, windows-1252)
    #[arg(long)]
    pub encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct MappingArgs {
    /// Map a field to a source column, e.g. `--map date=Fecha` or `--map amount=#3`
    #[arg(long = "map", value_name = "FIELD=COLUMN", action = ArgAction::Append)]
    pub pairs: Vec<String>,
    /// JSON file holding a field-to-column mapping
    #[arg(long, value_name = "FILE")]
    pub mapping: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum ImportCommand {
    /// Show detected columns and the suggested field mapping without importing
    Inspect {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        mapping: MappingArgs,
        /// Emit machine-readable JSON output
        #[arg(long)]
        json: bool,
    },
    /// Validate a file and commit its valid rows
    #[command(after_help = IMPORT_CREATE_AFTER_HELP)]
    Create {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        mapping: MappingArgs,
        /// Validate and preview without committing anything
        #[arg(long)]
        dry_run: bool,
        /// Commit to a remote service at this base URL instead of the local ledger
        #[arg(long, value_name = "URL")]
        endpoint: Option<String>,
        /// Emit machine-readable JSON output
        #[arg(long)]
        json: bool,
    },
    /// List past imports committed to the local ledger
    List {
        /// Emit machine-readable JSON output
        #[arg(long)]
        json: bool,
    },
}

pub fn parse_from<I, T>(itr: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(itr)
}
