//! Integration tests for merging per-slot observation files

use super::test_utils::observation_dataset;
use assimilate::dataset::{self, ArrayData};
use assimilate::error::MergeError;
use assimilate::merge::{merge, MergeOutcome, MergeSpec};
use tempfile::TempDir;

fn values(path: &std::path::Path) -> Vec<f32> {
    let merged = dataset::read(path).unwrap();
    match &merged.variable("ObsValue/airTemperature").unwrap().data {
        ArrayData::F32(a) => a.iter().copied().collect(),
        other => panic!("unexpected data {:?}", other),
    }
}

#[test]
fn test_merge_skips_missing_slots_in_order() {
    let temp = TempDir::new().unwrap();
    let inputs: Vec<_> = (0..3)
        .map(|i| temp.path().join(format!("aircraft.{}.ads", i)))
        .collect();
    dataset::write(&inputs[0], &observation_dataset(&[1.0, 2.0])).unwrap();
    dataset::write(&inputs[2], &observation_dataset(&[5.0, 6.0, 7.0])).unwrap();
    let output = temp.path().join("exp.aircraft.20211211T210000Z.ads");

    let outcome = merge(&MergeSpec::new(inputs.clone(), &output, "Location")).unwrap();
    assert_eq!(
        outcome,
        MergeOutcome::Merged {
            inputs: 2,
            growing_len: 5,
            fixed_dimensions: vec!["Channel".to_string()],
        }
    );
    assert_eq!(values(&output), vec![1.0, 2.0, 5.0, 6.0, 7.0]);

    // Fixed-dimension variables come through unchanged
    let merged = dataset::read(&output).unwrap();
    assert_eq!(merged.dimension("Channel"), Some(2));
    assert_eq!(merged.variable("Channel").unwrap().data.len(), 2);
}

#[test]
fn test_single_input_is_moved() {
    let temp = TempDir::new().unwrap();
    let only = temp.path().join("aircraft.1.ads");
    dataset::write(&only, &observation_dataset(&[3.0])).unwrap();
    let output = temp.path().join("merged.ads");

    let outcome = merge(&MergeSpec::new(
        vec![temp.path().join("aircraft.0.ads"), only.clone()],
        &output,
        "Location",
    ))
    .unwrap();
    assert_eq!(outcome, MergeOutcome::Renamed { from: only.clone() });
    assert!(!only.exists());
    assert_eq!(values(&output), vec![3.0]);
}

#[test]
fn test_fixed_dimension_mismatch_is_rejected() {
    let temp = TempDir::new().unwrap();
    let a = temp.path().join("a.ads");
    let b = temp.path().join("b.ads");
    dataset::write(&a, &observation_dataset(&[1.0])).unwrap();
    let mut other = observation_dataset(&[2.0]);
    other.set_dimension("Channel", 3);
    // Keep the file self-consistent so only the schema check can fail
    other.root.variables[0].data = ArrayData::I32(ndarray::arr1(&[1, 2, 3]).into_dyn());
    dataset::write(&b, &other).unwrap();

    let err = merge(&MergeSpec::new(vec![a, b], temp.path().join("out.ads"), "Location"))
        .unwrap_err();
    match err {
        MergeError::SchemaMismatch { detail, .. } => assert!(detail.contains("Channel"), "{}", detail),
        other => panic!("expected SchemaMismatch, got {:?}", other),
    }
}

#[test]
fn test_no_inputs() {
    let temp = TempDir::new().unwrap();
    let err = merge(&MergeSpec::new(
        vec![temp.path().join("x.ads"), temp.path().join("y.ads")],
        temp.path().join("out.ads"),
        "Location",
    ))
    .unwrap_err();
    assert!(matches!(err, MergeError::NoInputs(2)));
}
