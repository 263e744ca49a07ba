//! Render context for one cycle

use super::Cycle;
use crate::config::ExperimentConfig;
use crate::error::RenderError;
use crate::template::TemplateContext;
use crate::time;
use crate::window::Window;

/// Keys every cycle provides. Extra keys from the `[context]` table are added on top
/// and may not change the kind of a built-in key.
pub fn build(
    config: &ExperimentConfig,
    cycle: &Cycle,
    window: &Window,
) -> Result<TemplateContext, RenderError> {
    let mut ctx = TemplateContext::new();

    ctx.insert("experiment_id", config.experiment_id.as_str())?;
    ctx.insert("cycle_dir", cycle.dir().to_string_lossy().into_owned())?;
    ctx.insert("cycle_time", time::iso(&cycle.time()))?;

    // Window
    ctx.insert("window_type", window.window_type().to_string())?;
    ctx.insert("window_length", window.length().to_string())?;
    ctx.insert("window_begin", time::directory(&window.begin()))?;
    ctx.insert("window_begin_iso", time::iso(&window.begin()))?;
    ctx.insert("window_end_iso", time::iso(&window.end()))?;

    // Background
    ctx.insert("background_time", time::directory(&window.background_time()))?;
    ctx.insert(
        "local_background_time",
        time::directory(&window.local_background_time()),
    )?;
    ctx.insert(
        "local_background_time_iso",
        time::iso(&window.local_background_time()),
    )?;

    // Observations
    ctx.insert("observations", config.observations.types.clone())?;

    ctx.extend(config.context.clone())?;
    Ok(ctx)
}
