//! Window and slot presentation.

use super::shared::{format_section_heading, to_pretty_json};
use crate::error::CycleError;
use crate::slots::SlotGrid;
use crate::time;
use crate::window::Window;
use chrono::{DateTime, Utc};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use serde_json::json;

pub fn format_window_text(window: &Window) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Window")));
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Field", "Value"]);
    table.add_row(vec!["Cycle".to_string(), time::iso(&window.cycle_time())]);
    table.add_row(vec!["Type".to_string(), window.window_type().to_string()]);
    table.add_row(vec!["Length".to_string(), window.length().to_string()]);
    table.add_row(vec!["Begin".to_string(), time::iso(&window.begin())]);
    table.add_row(vec!["End".to_string(), time::iso(&window.end())]);
    table.add_row(vec![
        "Background".to_string(),
        time::iso(&window.background_time()),
    ]);
    table.add_row(vec![
        "Local background".to_string(),
        time::iso(&window.local_background_time()),
    ]);
    out.push_str(&format!("{}", table));
    out
}

pub fn format_window_json(window: &Window) -> Result<String, CycleError> {
    to_pretty_json(&window_value(window))
}

fn window_value(window: &Window) -> serde_json::Value {
    json!({
        "cycle_time": time::iso(&window.cycle_time()),
        "window_type": window.window_type().to_string(),
        "window_length": window.length().to_string(),
        "window_begin": time::iso(&window.begin()),
        "window_end": time::iso(&window.end()),
        "background_time": time::iso(&window.background_time()),
        "local_background_time": time::iso(&window.local_background_time()),
    })
}

pub fn format_slots_text(window: &Window, grid: &SlotGrid, slots: &[DateTime<Utc>]) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Observation slots")));
    out.push_str(&format!("  Window: {}\n", window));
    out.push_str(&format!("  Slot width: {}\n\n", grid.width()));

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["#", "Start", "End"]);
    for (i, slot) in slots.iter().enumerate() {
        let end = *slot + grid.width().to_chrono();
        table.add_row(vec![i.to_string(), time::iso(slot), time::iso(&end)]);
    }
    out.push_str(&format!("{}", table));
    out
}

pub fn format_slots_json(window: &Window, slots: &[DateTime<Utc>]) -> Result<String, CycleError> {
    to_pretty_json(&json!({
        "window": window_value(window),
        "slots": slots.iter().map(time::iso).collect::<Vec<_>>(),
    }))
}
