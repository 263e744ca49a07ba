//! CLI domain: parse, route, help, output, and presentation only.
//! No domain orchestration; single route table dispatches to domain services.

mod help;
mod output;
mod parse;
mod presentation;
mod route;

pub use help::{command_name, is_mutation};
pub use output::map_error;
pub use parse::{Cli, Commands};
pub use presentation::{
    format_inspect_json, format_inspect_text, format_merge_outcome, format_run_report_json,
    format_run_report_text, format_section_heading, format_slots_json, format_slots_text,
    format_window_json, format_window_text, to_pretty_json,
};
pub use route::RunContext;
