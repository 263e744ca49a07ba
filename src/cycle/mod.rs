//! Cycle Task
//!
//! One assimilation cycle: compute the window, reconcile slots, fetch and merge
//! observations, render the solver configuration and dispatch the solver. Cycles are
//! independent; each works in its own directory.

pub mod application;
pub mod context;
pub mod dispatch;
pub mod state;
pub mod task;

pub use application::Application;
pub use dispatch::{DispatchRequest, Dispatcher, MpiDispatcher};
pub use state::{CycleState, StateTracker};
pub use task::{CycleReport, CycleTask, ObservationOutcome};

use crate::config::ExperimentConfig;
use crate::error::TimeError;
use crate::time::{self, IsoDuration};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// A cycle time and its working directory. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    time: DateTime<Utc>,
    dir: PathBuf,
}

impl Cycle {
    /// `{experiment_root}/{experiment_id}/run/{YYYYmmddTHHMMSSZ}`
    pub fn new(config: &ExperimentConfig, time: DateTime<Utc>) -> Self {
        let dir = run_dir(config).join(time::directory(&time));
        Self { time, dir }
    }

    pub fn with_dir(time: DateTime<Utc>, dir: impl Into<PathBuf>) -> Self {
        Self {
            time,
            dir: dir.into(),
        }
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The cycle `frequency` earlier, in the same run directory
    pub fn previous(&self, frequency: IsoDuration) -> Result<Cycle, TimeError> {
        let time = time::shift(self.time, frequency.neg())?;
        let dir = match self.dir.parent() {
            Some(parent) => parent.join(time::directory(&time)),
            None => PathBuf::from(time::directory(&time)),
        };
        Ok(Cycle { time, dir })
    }
}

/// Directory holding every cycle of the experiment
pub fn run_dir(config: &ExperimentConfig) -> PathBuf {
    config
        .experiment_root
        .join(&config.experiment_id)
        .join("run")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::parse_timestamp;

    #[test]
    fn test_cycle_directory_layout() {
        let mut config = ExperimentConfig::default();
        config.experiment_root = PathBuf::from("/exp");
        config.experiment_id = "letkf_test".to_string();
        let cycle = Cycle::new(&config, parse_timestamp("2021-12-12T00:00:00Z").unwrap());
        assert_eq!(
            cycle.dir(),
            Path::new("/exp/letkf_test/run/20211212T000000Z")
        );

        let previous = cycle.previous(IsoDuration::hours(6)).unwrap();
        assert_eq!(
            previous.dir(),
            Path::new("/exp/letkf_test/run/20211211T180000Z")
        );
    }
}
