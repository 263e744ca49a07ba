//! Merge rules: defaults, override order, conflict handling.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("experiment_id", "experiment")?
        .set_default("experiment_root", "experiments")?
        .set_default("templates.root", "templates")?
        .set_default("archive.root", "archive")
}
