//! CLI presentation: text and json formatters per command family.

mod cycle;
mod dataset;
mod shared;
mod window;

pub use cycle::{format_run_report_json, format_run_report_text};
pub use dataset::{format_inspect_json, format_inspect_text, format_merge_outcome};
pub use shared::{format_section_heading, to_pretty_json};
pub use window::{format_slots_json, format_slots_text, format_window_json, format_window_text};
