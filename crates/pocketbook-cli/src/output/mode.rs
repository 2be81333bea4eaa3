use crate::cli::{Commands, ImportCommand};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum OutputMode {
    Text,
    Json,
}

pub fn mode_for_command(command: &Commands) -> OutputMode {
    let json = match command {
        Commands::Import { command } => match command {
            ImportCommand::Inspect { json, .. }
            | ImportCommand::Create { json, .. }
            | ImportCommand::List { json } => *json,
        },
    };
    if json {
        OutputMode::Json
    } else {
        OutputMode::Text
    }
}
