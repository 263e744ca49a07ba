//! Integration tests for running whole cycles against a local archive

use super::test_utils::Workspace;
use assimilate::config::{ConfigLoader, ExperimentConfig};
use assimilate::cycle::{
    CycleState, CycleTask, DispatchRequest, Dispatcher, ObservationOutcome,
};
use assimilate::dataset::{self, ArrayData, Dataset, Group, Variable};
use assimilate::error::{CycleError, DispatchError, MergeError};
use assimilate::merge::MergeOutcome;
use assimilate::time::parse_timestamp;
use ndarray::arr1;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const CYCLE: &str = "2021-12-12T00:00:00Z";

/// Records requests; optionally writes per-rank GeoVaLs files like the solver would
#[derive(Default)]
struct FakeSolver {
    requests: Mutex<Vec<DispatchRequest>>,
    /// (observation, window begin, file count)
    geovals: Option<(String, String, usize)>,
}

impl Dispatcher for FakeSolver {
    fn dispatch(&self, request: &DispatchRequest) -> Result<(), DispatchError> {
        self.requests.lock().unwrap().push(request.clone());
        fs::write(&request.log_file, "solver output\n").unwrap();
        if let Some((observation, window_begin, count)) = &self.geovals {
            for rank in 0..*count {
                let path = request.working_dir.join(format!(
                    "{}-geovals.{}_{:04}.ads",
                    observation, window_begin, rank
                ));
                let values: Vec<f64> = vec![rank as f64; 2];
                let ds = Dataset::new().with_dimension("nlocs", 2).with_root(
                    Group::new("").with_variable(Variable::new(
                        "air_temperature",
                        &["nlocs"],
                        ArrayData::F64(arr1(&values).into_dyn()),
                    )),
                );
                dataset::write(&path, &ds).unwrap();
            }
        }
        Ok(())
    }
}

fn load(path: &Path) -> ExperimentConfig {
    ConfigLoader::load_from_file(path).unwrap()
}

fn cycle_dir(ws: &Workspace) -> PathBuf {
    ws.run_dir().join("20211212T000000Z")
}

#[test]
fn test_variational_cycle_with_partial_and_absent_observations() {
    let ws = Workspace::new();
    let config = load(&ws.write_config(&["aircraft", "amsua_n19"], "[window]\noffset = \"PT6H\"\n"));
    // Window [18:00, 00:00) needs the 15:00 and 21:00 slots; only the later one exists
    ws.seed_observation("gdas", "aircraft", "2021-12-11T21:00:00Z", &[1.0, 2.0]);
    ws.seed_bias("amsua_n19", "2021-12-11T18:00:00Z", "satbias", "coefficients\n");

    let archive = ws.archive();
    let solver = FakeSolver::default();
    let mut task = CycleTask::from_config(&config, &archive, &solver);
    let report = task.run(parse_timestamp(CYCLE).unwrap()).unwrap();

    assert_eq!(report.slots.len(), 2);
    assert_eq!(report.cycle.dir(), cycle_dir(&ws));

    let aircraft = &report.observations[0];
    match &aircraft.outcome {
        ObservationOutcome::Merged {
            provider,
            output,
            outcome,
            missing,
        } => {
            assert_eq!(provider, "gdas");
            assert_eq!(*missing, 1);
            assert!(matches!(outcome, MergeOutcome::Renamed { .. }));
            assert_eq!(
                output,
                &cycle_dir(&ws).join("exp.aircraft.20211211T180000Z.ads")
            );
            assert!(output.exists());
        }
        other => panic!("expected Merged, got {:?}", other),
    }
    // No aircraft bias tables in the archive
    assert_eq!(aircraft.bias.missing.len(), 3);

    let amsua = &report.observations[1];
    assert_eq!(amsua.outcome, ObservationOutcome::Skipped);
    // Bias files are still propagated for skipped observations
    assert_eq!(amsua.bias.fetched.len(), 1);
    assert!(amsua.bias.fetched[0].ends_with("amsua_n19.20211211T180000Z.satbias.nc4"));
    assert_eq!(amsua.bias.missing.len(), 2);

    assert!(report.dispatched);
    let requests = solver.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].processors, 6);
    assert!(requests[0].executable.ends_with("fv3jedi_var.x"));
    assert_eq!(
        requests[0].config_file,
        cycle_dir(&ws).join("jedi_variational_config.yaml")
    );

    let rendered = fs::read_to_string(&requests[0].config_file).unwrap();
    assert!(rendered.contains("2021-12-11T18:00:00Z"));
    assert_eq!(task.state(), CycleState::Done);
}

#[cfg(unix)]
#[test]
fn test_produced_files_are_world_readable() {
    use std::os::unix::fs::PermissionsExt;

    let ws = Workspace::new();
    let config = load(&ws.write_config(&["aircraft"], "[executable]\ngenerate_config_only = true\n"));
    ws.seed_observation("gdas", "aircraft", "2021-12-11T21:00:00Z", &[1.0]);

    let archive = ws.archive();
    let solver = FakeSolver::default();
    let report = CycleTask::from_config(&config, &archive, &solver)
        .run(parse_timestamp(CYCLE).unwrap())
        .unwrap();
    match &report.observations[0].outcome {
        ObservationOutcome::Merged { output, .. } => {
            let mode = fs::metadata(output).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o644);
        }
        other => panic!("expected Merged, got {:?}", other),
    }
}

#[test]
fn test_provider_fallback() {
    let ws = Workspace::new();
    let config = load(&ws.write_config_with(
        &["aircraft"],
        "providers = [\"gdas\", \"ncdiag\"]",
        "[executable]\ngenerate_config_only = true\n",
    ));
    ws.seed_observation("ncdiag", "aircraft", "2021-12-11T21:00:00Z", &[4.0, 5.0, 6.0]);

    let archive = ws.archive();
    let solver = FakeSolver::default();
    let report = CycleTask::from_config(&config, &archive, &solver)
        .run(parse_timestamp(CYCLE).unwrap())
        .unwrap();

    match &report.observations[0].outcome {
        ObservationOutcome::Merged { provider, .. } => assert_eq!(provider, "ncdiag"),
        other => panic!("expected Merged, got {:?}", other),
    }
    assert!(!report.dispatched);
    assert!(solver.requests.lock().unwrap().is_empty());
    assert_eq!(report.states.last(), Some(&CycleState::Done));
}

#[test]
fn test_cycling_bias_links_previous_cycle() {
    let ws = Workspace::new();
    let config = load(&ws.write_config_with(
        &["amsua_n19"],
        "cycling_bias_correction = true\nfirst_cycle = \"2021-12-11T18:00:00Z\"",
        "[executable]\ngenerate_config_only = true\n",
    ));

    // The previous cycle left coefficients for this cycle's background time
    let previous = ws.run_dir().join("20211211T180000Z");
    fs::create_dir_all(&previous).unwrap();
    fs::write(previous.join("amsua_n19.20211211T210000Z.satbias.nc4"), "coef").unwrap();
    fs::write(previous.join("amsua_n19.20211211T210000Z.satbias_cov.nc4"), "cov").unwrap();
    ws.seed_bias("amsua_n19", "2021-12-11T21:00:00Z", "tlapse", "lapse");

    let archive = ws.archive();
    let solver = FakeSolver::default();
    let report = CycleTask::from_config(&config, &archive, &solver)
        .run(parse_timestamp(CYCLE).unwrap())
        .unwrap();

    let bias = &report.observations[0].bias;
    assert_eq!(bias.linked.len(), 2);
    assert_eq!(bias.fetched.len(), 1, "tlapse is always fetched");
    assert_eq!(
        fs::read_to_string(cycle_dir(&ws).join("amsua_n19.20211211T210000Z.satbias.nc4")).unwrap(),
        "coef"
    );
}

#[test]
fn test_first_cycle_fetches_bias_even_when_cycling() {
    let ws = Workspace::new();
    let config = load(&ws.write_config_with(
        &["amsua_n19"],
        &format!("cycling_bias_correction = true\nfirst_cycle = \"{}\"", CYCLE),
        "[executable]\ngenerate_config_only = true\n",
    ));
    ws.seed_bias("amsua_n19", "2021-12-11T21:00:00Z", "satbias", "coef");
    ws.seed_bias("amsua_n19", "2021-12-11T21:00:00Z", "satbias_cov", "cov");

    let archive = ws.archive();
    let solver = FakeSolver::default();
    let report = CycleTask::from_config(&config, &archive, &solver)
        .run(parse_timestamp(CYCLE).unwrap())
        .unwrap();

    let bias = &report.observations[0].bias;
    assert!(bias.linked.is_empty());
    assert_eq!(bias.fetched.len(), 2);
}

#[test]
fn test_hofx_saves_and_merges_geovals() {
    let ws = Workspace::new();
    let config = load(&ws.write_config(
        &["aircraft"],
        "[executable]\napplication = \"hofx\"\nsave_geovals = true\n",
    ));
    ws.seed_observation("gdas", "aircraft", "2021-12-11T21:00:00Z", &[1.0]);

    let archive = ws.archive();
    let solver = FakeSolver {
        geovals: Some(("aircraft".to_string(), "20211211T210000Z".to_string(), 6)),
        ..FakeSolver::default()
    };
    let report = CycleTask::from_config(&config, &archive, &solver)
        .run(parse_timestamp(CYCLE).unwrap())
        .unwrap();

    let config_file = cycle_dir(&ws).join("jedi_hofx_config.yaml");
    let rendered = fs::read_to_string(&config_file).unwrap();
    assert!(rendered.contains("GOMsaver"));
    assert!(rendered.contains("obs prior filters"));
    assert!(solver.requests.lock().unwrap()[0]
        .executable
        .ends_with("fv3jedi_hofx_nomodel.x"));

    assert_eq!(
        report.geovals,
        vec![cycle_dir(&ws).join("exp.aircraft-geovals.20211211T210000Z.ads")]
    );
    let merged = dataset::read(&report.geovals[0]).unwrap();
    assert_eq!(merged.dimension("nlocs"), Some(12));
}

#[test]
fn test_hofx_geovals_count_must_match_processors() {
    let ws = Workspace::new();
    let config = load(&ws.write_config(
        &["aircraft"],
        "[executable]\napplication = \"hofx\"\nsave_geovals = true\n",
    ));

    let archive = ws.archive();
    let solver = FakeSolver {
        geovals: Some(("aircraft".to_string(), "20211211T210000Z".to_string(), 2)),
        ..FakeSolver::default()
    };
    let mut task = CycleTask::from_config(&config, &archive, &solver);
    let err = task.run(parse_timestamp(CYCLE).unwrap()).unwrap_err();
    assert!(matches!(
        err,
        CycleError::Merge(MergeError::InputCount {
            expected: 6,
            found: 2,
            ..
        })
    ));
    assert_eq!(task.state(), CycleState::Failed);
}

#[test]
fn test_hofx_ensemble_renders_one_config_per_member() {
    let ws = Workspace::new();
    let config = load(&ws.write_config(
        &["aircraft"],
        "[executable]\napplication = \"hofx\"\nensemble_members = [1, 2, 3]\n",
    ));

    let archive = ws.archive();
    let solver = FakeSolver::default();
    let report = CycleTask::from_config(&config, &archive, &solver)
        .run(parse_timestamp(CYCLE).unwrap())
        .unwrap();

    assert_eq!(report.config_files.len(), 3);
    assert_eq!(
        report.config_files[1],
        cycle_dir(&ws).join("jedi_hofx_mem2_config.yaml")
    );
    assert!(report.config_files.iter().all(|p| p.exists()));
    assert!(!report.dispatched);
}

#[test]
fn test_obsfilters_thins_a_copy_on_one_process() {
    let ws = Workspace::new();
    let config = load(&ws.write_config(
        &["aircraft"],
        "[executable]\napplication = \"obsfilters\"\n",
    ));
    ws.seed_observation("gdas", "aircraft", "2021-12-11T21:00:00Z", &[1.0, 2.0]);

    let archive = ws.archive();
    let solver = FakeSolver::default();
    CycleTask::from_config(&config, &archive, &solver)
        .run(parse_timestamp(CYCLE).unwrap())
        .unwrap();

    let dir = cycle_dir(&ws);
    assert!(dir.join("exp.aircraft.20211211T210000Z_orig.ads").exists());
    let rendered = fs::read_to_string(dir.join("jedi_obsfilters_config.yaml")).unwrap();
    assert!(rendered.contains("Thinning"));
    assert!(rendered.contains("exp.aircraft.20211211T210000Z_orig.ads"));

    let requests = solver.requests.lock().unwrap();
    assert_eq!(requests[0].processors, 1);
    assert!(requests[0].executable.ends_with("ioda_thinning.x"));
}

#[test]
fn test_localensembleda_drops_observation_output() {
    let ws = Workspace::new();
    ws.template("oops/LocalEnsembleDA", super::test_utils::HOFX_3D);
    let config = load(&ws.write_config(
        &["aircraft"],
        "[executable]\napplication = \"localensembleda\"\ngenerate_config_only = true\n",
    ));

    let archive = ws.archive();
    let solver = FakeSolver::default();
    CycleTask::from_config(&config, &archive, &solver)
        .run(parse_timestamp(CYCLE).unwrap())
        .unwrap();

    let rendered =
        fs::read_to_string(cycle_dir(&ws).join("jedi_localensembleda_config.yaml")).unwrap();
    assert!(rendered.contains("obsdatain"));
    assert!(!rendered.contains("obsdataout"));
}
