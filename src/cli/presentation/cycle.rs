//! Cycle run report presentation.

use super::shared::{format_section_heading, to_pretty_json};
use crate::cycle::{CycleReport, ObservationOutcome};
use crate::error::CycleError;
use crate::merge::MergeOutcome;
use crate::time;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use serde_json::json;

fn outcome_label(outcome: &ObservationOutcome) -> (String, String, String) {
    match outcome {
        ObservationOutcome::Skipped => ("skipped".to_string(), "-".to_string(), "-".to_string()),
        ObservationOutcome::Merged {
            provider,
            output,
            outcome,
            missing,
        } => {
            let how = match outcome {
                MergeOutcome::Renamed { .. } => "renamed".to_string(),
                MergeOutcome::Merged { inputs, .. } => format!("merged {}", inputs),
            };
            let status = if *missing > 0 {
                format!("{} ({} slots missing)", how, missing)
            } else {
                how
            };
            (status, provider.clone(), output.display().to_string())
        }
    }
}

pub fn format_run_report_text(report: &CycleReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Cycle")));
    out.push_str(&format!("  Cycle: {}\n", time::iso(&report.cycle.time())));
    out.push_str(&format!("  Directory: {}\n", report.cycle.dir().display()));
    out.push_str(&format!("  Window: {}\n", report.window));
    out.push_str(&format!("  Slots: {}\n\n", report.slots.len()));

    out.push_str(&format!("{}\n\n", format_section_heading("Observations")));
    if report.observations.is_empty() {
        out.push_str("No observations configured.\n\n");
    } else {
        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec!["Observation", "Status", "Provider", "File", "Bias files"]);
        for obs in &report.observations {
            let (status, provider, file) = outcome_label(&obs.outcome);
            let bias = obs.bias.linked.len() + obs.bias.fetched.len();
            table.add_row(vec![
                obs.observation.clone(),
                status,
                provider,
                file,
                bias.to_string(),
            ]);
        }
        out.push_str(&format!("{}\n\n", table));
    }

    out.push_str(&format!("{}\n\n", format_section_heading("Solver")));
    for file in &report.config_files {
        out.push_str(&format!("  Configuration: {}\n", file.display()));
    }
    out.push_str(&format!(
        "  Dispatched: {}\n",
        if report.dispatched { "yes" } else { "no" }
    ));
    for file in &report.geovals {
        out.push_str(&format!("  GeoVaLs: {}\n", file.display()));
    }
    let states: Vec<String> = report.states.iter().map(|s| s.to_string()).collect();
    out.push_str(&format!("  States: {}", states.join(" -> ")));
    out
}

pub fn format_run_report_json(report: &CycleReport) -> Result<String, CycleError> {
    let observations: Vec<serde_json::Value> = report
        .observations
        .iter()
        .map(|obs| {
            let (status, provider, file) = outcome_label(&obs.outcome);
            json!({
                "observation": obs.observation,
                "status": status,
                "provider": provider,
                "file": file,
                "bias_linked": obs.bias.linked,
                "bias_fetched": obs.bias.fetched,
                "bias_missing": obs.bias.missing,
            })
        })
        .collect();
    to_pretty_json(&json!({
        "cycle_time": time::iso(&report.cycle.time()),
        "cycle_dir": report.cycle.dir(),
        "window_begin": time::iso(&report.window.begin()),
        "window_end": time::iso(&report.window.end()),
        "slots": report.slots.iter().map(time::iso).collect::<Vec<_>>(),
        "observations": observations,
        "config_files": report.config_files,
        "dispatched": report.dispatched,
        "geovals": report.geovals,
        "states": report.states.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
    }))
}
