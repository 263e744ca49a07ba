//! Dataset inspection and merge presentation.

use super::shared::{format_section_heading, to_pretty_json};
use crate::dataset::DatasetSummary;
use crate::error::CycleError;
use crate::merge::MergeOutcome;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use std::path::Path;

pub fn format_inspect_text(path: &Path, summary: &DatasetSummary) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Dataset")));
    out.push_str(&format!("  Path: {}\n\n", path.display()));

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Dimension", "Length"]);
    for (name, len) in &summary.dimensions {
        table.add_row(vec![name.clone(), len.to_string()]);
    }
    out.push_str(&format!("{}\n\n", table));

    if !summary.groups.is_empty() {
        out.push_str(&format!("  Groups: {}\n\n", summary.groups.join(", ")));
    }

    if summary.variables.is_empty() {
        out.push_str("No variables.\n");
        return out;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Variable", "Type", "Dimensions", "Shape", "Fill", "Masked"]);
    for v in &summary.variables {
        let shape: Vec<String> = v.shape.iter().map(|n| n.to_string()).collect();
        table.add_row(vec![
            v.path.clone(),
            v.dtype.clone(),
            v.dims.join(", "),
            format!("({})", shape.join(", ")),
            v.fill_value.clone().unwrap_or_else(|| "-".to_string()),
            v.masked.to_string(),
        ]);
    }
    out.push_str(&format!("{}", table));
    out
}

pub fn format_inspect_json(summary: &DatasetSummary) -> Result<String, CycleError> {
    to_pretty_json(summary)
}

pub fn format_merge_outcome(output: &Path, outcome: &MergeOutcome) -> String {
    match outcome {
        MergeOutcome::Renamed { from } => format!(
            "Single input {} moved to {}",
            from.display(),
            output.display()
        ),
        MergeOutcome::Merged {
            inputs,
            growing_len,
            fixed_dimensions,
        } => {
            let fixed = if fixed_dimensions.is_empty() {
                "none".to_string()
            } else {
                fixed_dimensions.join(", ")
            };
            format!(
                "Merged {} inputs into {}\n  Growing length: {}\n  Fixed dimensions: {}",
                inputs,
                output.display(),
                growing_len,
                fixed
            )
        }
    }
}
