//! Solver dispatch
//!
//! The cycle hands a rendered configuration to a [`Dispatcher`]; the stock
//! implementation launches the solver under an MPI launcher and sends its output to
//! the cycle's log file.

use crate::error::DispatchError;
use std::fs::File;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::{error, info};

/// One solver invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRequest {
    pub executable: PathBuf,
    pub config_file: PathBuf,
    pub log_file: PathBuf,
    pub processors: u32,
    pub working_dir: PathBuf,
}

/// Runs a solver to completion
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, request: &DispatchRequest) -> Result<(), DispatchError>;
}

/// `{launcher} -np {n} {executable} {config}` with stdout and stderr in the log file
#[derive(Debug, Clone)]
pub struct MpiDispatcher {
    launcher: String,
}

impl MpiDispatcher {
    pub fn new(launcher: impl Into<String>) -> Self {
        Self {
            launcher: launcher.into(),
        }
    }

    pub fn command(&self, request: &DispatchRequest) -> Command {
        let mut command = Command::new(&self.launcher);
        command
            .arg("-np")
            .arg(request.processors.to_string())
            .arg(&request.executable)
            .arg(&request.config_file)
            .current_dir(&request.working_dir);
        command
    }
}

impl Dispatcher for MpiDispatcher {
    fn dispatch(&self, request: &DispatchRequest) -> Result<(), DispatchError> {
        let launch_error = |source| DispatchError::Launch {
            executable: request.executable.clone(),
            source,
        };

        let log = File::create(&request.log_file).map_err(launch_error)?;
        let log_err = log.try_clone().map_err(launch_error)?;

        info!(
            executable = %request.executable.display(),
            processors = request.processors,
            log = %request.log_file.display(),
            "Running solver"
        );
        let status = self
            .command(request)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .status()
            .map_err(launch_error)?;

        if !status.success() {
            error!(
                executable = %request.executable.display(),
                code = ?status.code(),
                "Solver failed"
            );
            return Err(DispatchError::ExecutableFailed {
                executable: request.executable.clone(),
                code: status.code(),
                log: request.log_file.clone(),
            });
        }
        Ok(())
    }
}
