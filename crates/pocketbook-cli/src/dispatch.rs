use pocketbook_client::commands::import::{
    self, ImportInspectOptions, ImportListOptions, ImportMappingOptions, ImportRunOptions,
    ImportSourceOptions,
};
use pocketbook_client::{ClientResult, SuccessEnvelope};

use crate::cli::{Cli, Commands, ImportCommand, MappingArgs, SourceArgs};

pub fn dispatch(cli: &Cli) -> ClientResult<SuccessEnvelope> {
    match &cli.command {
        Commands::Import { command } => match command {
            ImportCommand::Inspect {
                source, mapping, ..
            } => import::inspect_with_options(ImportInspectOptions {
                source: source_options(source),
                mapping: mapping_options(mapping),
            }),
            ImportCommand::Create {
                source,
                mapping,
                dry_run,
                endpoint,
                json: _,
            } => import::run_with_options(ImportRunOptions {
                source: source_options(source),
                mapping: mapping_options(mapping),
                dry_run: *dry_run,
                endpoint: endpoint.clone(),
                ..ImportRunOptions::default()
            }),
            ImportCommand::List { .. } => import::list_with_options(ImportListOptions::default()),
        },
    }
}

fn source_options(args: &SourceArgs) -> ImportSourceOptions {
    ImportSourceOptions {
        path: args.path.clone(),
        format: args.format.clone(),
        separator: args.separator.clone(),
        no_headers: args.no_headers,
        encoding: args.encoding.clone(),
        stdin_override: None,
    }
}

fn mapping_options(args: &MappingArgs) -> ImportMappingOptions {
    ImportMappingOptions {
        pairs: args.pairs.clone(),
        mapping_file: args.mapping.clone(),
    }
}
