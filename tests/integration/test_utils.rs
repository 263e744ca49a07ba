//! Shared test utilities for integration tests
//!
//! Environment isolation for configuration tests, plus an experiment workspace
//! fixture: a template tree for the `geos_atmosphere` interface and a local archive.

use assimilate::dataset::{self, ArrayData, Dataset, Group, Variable};
use assimilate::fetch::{DataKind, FetchRequest, LocalArchive};
use assimilate::time::{parse_timestamp, IsoDuration};
use ndarray::arr1;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

/// Serializes environment variable access across all tests in this binary
static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Environment variable state to restore after test
struct EnvState {
    saved: Vec<(String, Option<String>)>,
}

impl EnvState {
    fn capture(keys: &[&str]) -> Self {
        Self {
            saved: keys
                .iter()
                .map(|k| (k.to_string(), std::env::var(k).ok()))
                .collect(),
        }
    }

    fn restore(self) {
        for (key, value) in self.saved {
            match value {
                Some(orig) => std::env::set_var(&key, orig),
                None => std::env::remove_var(&key),
            }
        }
    }
}

/// Run `f` with an isolated XDG config home inside `test_dir` and the given variables set.
///
/// Every variable is restored afterwards, and a global mutex keeps parallel tests from
/// seeing each other's environment.
pub fn with_env<F, R>(test_dir: &TempDir, vars: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());

    let mut keys = vec!["HOME", "XDG_CONFIG_HOME"];
    keys.extend(vars.iter().map(|(k, _)| *k));
    let env_state = EnvState::capture(&keys);

    let test_config_home = test_dir.path().join("xdg");
    let test_home = test_dir.path().join("home");
    fs::create_dir_all(&test_config_home).unwrap();
    fs::create_dir_all(&test_home).unwrap();

    std::env::set_var("HOME", &test_home);
    std::env::set_var("XDG_CONFIG_HOME", &test_config_home);
    for (key, value) in vars {
        std::env::set_var(key, value);
    }

    let result = f();

    env_state.restore();

    result
}

pub const VARIATIONAL_3D: &str = "\
cost function:
  cost type: 3D-Var
  window begin: '{{window_begin_iso}}'
  window length: {{window_length}}
  geometry: TASKFILLgeometry
  background: TASKFILLbackground
  observations:
    observers: SPECIALobservations
output:
  filename: '{{cycle_dir}}/analysis.{{local_background_time}}.nc4'
";

pub const HOFX_3D: &str = "\
window begin: '{{window_begin_iso}}'
window length: {{window_length}}
geometry: TASKFILLgeometry
state: TASKFILLbackground
observations:
  observers: SPECIALobservations
";

pub const QC_THINNING: &str = "\
window begin: '{{window_begin_iso}}'
window length: {{window_length}}
observations:
  observers: SPECIALobservations
";

pub const GEOMETRY: &str = "\
fms initialization:
  namelist filename: '{{cycle_dir}}/fmsmpp.nml'
npx: {{horizontal_resolution}}
layout: [{{npx_proc}}, {{npy_proc}}]
";

pub const BACKGROUND: &str = "\
datetime: '{{local_background_time_iso}}'
filename: '{{cycle_dir}}/bkg.{{local_background_time}}.nc4'
";

pub const INTERFACE_META: &str = "\
total_processors: 6*npx_proc*npy_proc
executables:
  variational3D: fv3jedi_var.x
  variational4D: fv3jedi_var.x
  hofx3D: fv3jedi_hofx_nomodel.x
  hofx4D: fv3jedi_hofx_nomodel.x
  localensembleda: fv3jedi_letkf.x
  obsfilters: ioda_thinning.x
";

pub const AIRCRAFT: &str = "\
obs space:
  name: Aircraft
  obsdatain:
    engine:
      type: H5File
      obsfile: '{{cycle_dir}}/{{experiment_id}}.aircraft.{{window_begin}}.ads'
  obsdataout:
    engine:
      type: H5File
      obsfile: '{{cycle_dir}}/{{experiment_id}}.aircraft.{{window_begin}}.out.ads'
  simulated variables: [airTemperature]
obs operator:
  name: VertInterp
";

pub const AMSUA_N19: &str = "\
obs space:
  name: AMSU-A NOAA-19
  obsdatain:
    engine:
      type: H5File
      obsfile: '{{cycle_dir}}/{{experiment_id}}.amsua_n19.{{window_begin}}.ads'
  simulated variables: [brightnessTemperature]
obs operator:
  name: CRTM
obs bias:
  input file: '{{cycle_dir}}/amsua_n19.{{background_time}}.satbias.nc4'
  variational bc:
    predictors:
    - name: lapse_rate
      tlapse: '{{cycle_dir}}/amsua_n19.{{background_time}}.tlapse.txt'
  covariance:
    prior:
      input file: '{{cycle_dir}}/amsua_n19.{{background_time}}.satbias_cov.nc4'
";

/// A temporary experiment workspace with templates, archive and config file
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let ws = Self {
            dir: TempDir::new().unwrap(),
        };
        ws.template("oops/variational3D", VARIATIONAL_3D);
        ws.template("oops/hofx3D", HOFX_3D);
        ws.template("oops/qc_thinning", QC_THINNING);
        ws.template("interfaces/geos_atmosphere/model/geometry", GEOMETRY);
        ws.template("interfaces/geos_atmosphere/model/background", BACKGROUND);
        ws.template("interfaces/geos_atmosphere/model/interface_meta", INTERFACE_META);
        ws.template("interfaces/geos_atmosphere/observations/aircraft", AIRCRAFT);
        ws.template("interfaces/geos_atmosphere/observations/amsua_n19", AMSUA_N19);
        ws
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn template(&self, relative: &str, text: &str) {
        let path = self
            .root()
            .join("templates")
            .join(format!("{}.yaml", relative));
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    /// Write `config/experiment.toml` with the common settings followed by `extra`
    pub fn write_config(&self, observations: &[&str], extra: &str) -> PathBuf {
        self.write_config_with(observations, "", extra)
    }

    /// Like [`Workspace::write_config`], with extra keys for the `[observations]` table
    pub fn write_config_with(
        &self,
        observations: &[&str],
        observations_extra: &str,
        extra: &str,
    ) -> PathBuf {
        let types: Vec<String> = observations.iter().map(|o| format!("\"{}\"", o)).collect();
        let root = self.root();
        let text = format!(
            r#"experiment_id = "exp"
experiment_root = '{}'

[templates]
root = '{}'

[archive]
root = '{}'

[observations]
types = [{}]
{}

[context]
horizontal_resolution = 91
npx_proc = 1
npy_proc = 1

{}
"#,
            root.join("experiments").display(),
            root.join("templates").display(),
            root.join("archive").display(),
            types.join(", "),
            observations_extra,
            extra
        );
        let dir = root.join("config");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("experiment.toml");
        fs::write(&path, text).unwrap();
        path
    }

    pub fn archive(&self) -> LocalArchive {
        LocalArchive::new(self.root().join("archive"))
    }

    pub fn run_dir(&self) -> PathBuf {
        self.root().join("experiments").join("exp").join("run")
    }

    /// Put an observation file for one slot into the archive
    pub fn seed_observation(&self, provider: &str, obs_type: &str, slot: &str, values: &[f32]) {
        let request = FetchRequest {
            date: parse_timestamp(slot).unwrap(),
            target: PathBuf::new(),
            provider: provider.to_string(),
            obs_type: obs_type.to_string(),
            time_window: Some(IsoDuration::hours(6)),
            experiment: "oper".to_string(),
            kind: DataKind::Observation,
            file_type: None,
        };
        let path = self.archive().archive_path(&request);
        dataset::write(&path, &observation_dataset(values)).unwrap();
    }

    /// Put a bias-correction file into the archive
    pub fn seed_bias(&self, obs_type: &str, background: &str, file_type: &str, content: &str) {
        let request = FetchRequest {
            date: parse_timestamp(background).unwrap(),
            target: PathBuf::new(),
            provider: "gsi".to_string(),
            obs_type: obs_type.to_string(),
            time_window: None,
            experiment: "oper".to_string(),
            kind: DataKind::BiasCorrection,
            file_type: Some(file_type.to_string()),
        };
        let path = self.archive().archive_path(&request);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
}

/// Observation file with `values` along `Location` and a fixed channel dimension
pub fn observation_dataset(values: &[f32]) -> Dataset {
    Dataset::new()
        .with_dimension("Location", values.len())
        .with_dimension("Channel", 2)
        .with_root(
            Group::new("")
                .with_group(Group::new("ObsValue").with_variable(Variable::new(
                    "airTemperature",
                    &["Location"],
                    ArrayData::F32(arr1(values).into_dyn()),
                )))
                .with_variable(Variable::new(
                    "Channel",
                    &["Channel"],
                    ArrayData::I32(arr1(&[1, 2]).into_dyn()),
                )),
        )
}
