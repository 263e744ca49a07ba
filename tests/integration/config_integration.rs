//! Integration tests for Configuration System

use super::test_utils::with_env;
use assimilate::config::ConfigLoader;
use assimilate::cycle::Application;
use assimilate::error::CycleError;
use assimilate::template::ContextValue;
use assimilate::time::IsoDuration;
use assimilate::window::WindowType;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_load_from_file_resolves_relative_paths() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("letkf.toml");
    fs::write(
        &config_file,
        r#"
experiment_id = "letkf_test"
experiment_root = "runs"

[window]
window_type = "4D"
length = "PT6H"
offset = "PT3H"

[slots]
phases = ["PT3H", "PT9H", "PT15H", "PT21H"]
width = "PT6H"

[observations]
types = ["aircraft", "amsua_n19"]
providers = ["gdas", "ncdiag"]
cycling_bias_correction = true
first_cycle = "2021-12-11T00:00:00Z"

[templates]
root = "/opt/templates"

[executable]
application = "localensembleda"
save_posterior_mean = true

[context]
npx_proc = 4
npy_proc = 4
vertical_resolution = "72"
"#,
    )
    .unwrap();

    let config = ConfigLoader::load_from_file(&config_file).unwrap();
    assert_eq!(config.experiment_id, "letkf_test");
    assert_eq!(config.experiment_root, temp_dir.path().join("runs"));
    assert_eq!(config.archive.root, temp_dir.path().join("archive"));
    assert_eq!(config.templates.root, std::path::PathBuf::from("/opt/templates"));
    assert_eq!(config.window.window_type, WindowType::FourD);
    assert_eq!(config.slots.phases().len(), 4);
    assert_eq!(config.observations.providers, vec!["gdas", "ncdiag"]);
    assert!(config.observations.first_cycle.is_some());
    assert_eq!(config.executable.application, Application::LocalEnsembleDa);
    assert_eq!(config.context.get("npx_proc"), Some(&ContextValue::Int(4)));
    assert_eq!(
        config.context.get("vertical_resolution").and_then(|v| v.as_str()),
        Some("72")
    );
    // Cycle frequency falls back to the window length
    assert_eq!(config.cycle_frequency(), IsoDuration::hours(6));
}

#[test]
fn test_load_from_missing_file_fails() {
    let temp_dir = TempDir::new().unwrap();
    let err = ConfigLoader::load_from_file(&temp_dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, CycleError::ConfigError(ref m) if m.contains("not found")));
}

#[test]
fn test_validation_reports_every_problem() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("bad.toml");
    fs::write(
        &config_file,
        r#"
experiment_id = "a/b"

[observations]
types = ["aircraft", "aircraft"]

[executable]
save_posterior_mean = true
save_posterior_ensemble = true
"#,
    )
    .unwrap();

    match ConfigLoader::load_from_file(&config_file) {
        Err(CycleError::ConfigError(message)) => {
            assert!(message.contains("cannot contain '/'"), "{}", message);
            assert!(message.contains("listed twice"), "{}", message);
            assert!(message.contains("save_posterior_mean"), "{}", message);
        }
        other => panic!("expected ConfigError, got {:?}", other),
    }
}

#[test]
fn test_unparseable_duration_is_a_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("bad.toml");
    fs::write(&config_file, "[window]\nlength = \"six hours\"\n").unwrap();
    assert!(matches!(
        ConfigLoader::load_from_file(&config_file),
        Err(CycleError::ConfigError(_))
    ));
}

#[test]
fn test_workspace_layers_and_environment_override() {
    let temp_dir = TempDir::new().unwrap();
    let workspace = temp_dir.path().join("ws");
    fs::create_dir_all(workspace.join("config")).unwrap();
    fs::write(
        workspace.join("config/experiment.toml"),
        r#"
experiment_id = "base"

[window]
length = "PT6H"

[observations]
types = ["aircraft"]
"#,
    )
    .unwrap();
    fs::write(
        workspace.join("config/production.toml"),
        "experiment_id = \"prod\"\n",
    )
    .unwrap();

    let config = with_env(
        &temp_dir,
        &[
            ("ASSIMILATE_ENV", "production"),
            ("ASSIMILATE__WINDOW__LENGTH", "PT12H"),
        ],
        || ConfigLoader::load(&workspace).unwrap(),
    );

    assert_eq!(config.experiment_id, "prod");
    assert_eq!(config.window.length, IsoDuration::hours(12));
    assert_eq!(config.observations.types, vec!["aircraft"]);
    assert_eq!(config.experiment_root, workspace.join("experiments"));
}

#[test]
fn test_global_file_is_overridden_by_workspace() {
    let temp_dir = TempDir::new().unwrap();
    let global_dir = temp_dir.path().join("xdg").join("assimilate");
    fs::create_dir_all(&global_dir).unwrap();
    fs::write(
        global_dir.join("config.toml"),
        r#"
experiment_id = "from_global"

[executable]
launcher = "srun"
"#,
    )
    .unwrap();

    let workspace = temp_dir.path().join("ws");
    fs::create_dir_all(workspace.join("config")).unwrap();
    fs::write(
        workspace.join("config/experiment.toml"),
        "experiment_id = \"from_workspace\"\n",
    )
    .unwrap();

    let config = with_env(&temp_dir, &[], || ConfigLoader::load(&workspace).unwrap());
    assert_eq!(config.experiment_id, "from_workspace");
    assert_eq!(config.executable.launcher, "srun");
}
