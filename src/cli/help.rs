//! CLI help and command-name contract for logging and routing.

use crate::cli::parse::Commands;

/// Command name string for log events (e.g. "run", "inspect").
pub fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Window { .. } => "window",
        Commands::Slots { .. } => "slots",
        Commands::Render { .. } => "render",
        Commands::Merge { .. } => "merge",
        Commands::Inspect { .. } => "inspect",
        Commands::Run { .. } => "run",
    }
}

/// Whether a command writes into the workspace
pub fn is_mutation(command: &Commands) -> bool {
    match command {
        Commands::Window { .. } | Commands::Slots { .. } | Commands::Inspect { .. } => false,
        Commands::Render { output, .. } => output.is_some(),
        Commands::Merge { .. } | Commands::Run { .. } => true,
    }
}
