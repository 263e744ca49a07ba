//! Analysis window calculation
//!
//! A cycle's window is derived once from the cycle time and the configured offsets and
//! never changes afterwards. Everything here is pure arithmetic on UTC timestamps.

use crate::error::TimeError;
use crate::time::{self, IsoDuration};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Assimilation window kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindowType {
    #[serde(rename = "3D")]
    ThreeD,
    #[serde(rename = "4D")]
    FourD,
}

impl fmt::Display for WindowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowType::ThreeD => write!(f, "3D"),
            WindowType::FourD => write!(f, "4D"),
        }
    }
}

impl FromStr for WindowType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "3D" => Ok(WindowType::ThreeD),
            "4D" => Ok(WindowType::FourD),
            other => Err(format!("Unknown window type '{}' (expected 3D or 4D)", other)),
        }
    }
}

/// Inputs to the window calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowParams {
    pub window_type: WindowType,
    /// Window length (e.g. `PT6H`)
    pub length: IsoDuration,
    /// Distance from window begin to cycle time (e.g. `PT3H`)
    pub offset: IsoDuration,
    /// Added to the cycle time to get the background time. Absent means window begin.
    pub background_offset: Option<IsoDuration>,
}

impl Default for WindowParams {
    fn default() -> Self {
        Self {
            window_type: WindowType::ThreeD,
            length: IsoDuration::hours(6),
            offset: IsoDuration::hours(3),
            background_offset: None,
        }
    }
}

/// A computed window. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    cycle_time: DateTime<Utc>,
    window_type: WindowType,
    length: IsoDuration,
    begin: DateTime<Utc>,
    end: DateTime<Utc>,
    background_time: DateTime<Utc>,
}

impl Window {
    /// Compute the window for a cycle
    pub fn compute(cycle_time: DateTime<Utc>, params: &WindowParams) -> Result<Self, TimeError> {
        if params.length.seconds() <= 0 {
            return Err(TimeError::InvalidDuration(format!(
                "window length must be positive, got {}",
                params.length
            )));
        }

        let begin = time::shift(cycle_time, params.offset.neg())?;
        let end = time::shift(begin, params.length)?;
        let background_time = match params.background_offset {
            Some(offset) => time::shift(cycle_time, offset)?,
            None => begin,
        };

        Ok(Self {
            cycle_time,
            window_type: params.window_type,
            length: params.length,
            begin,
            end,
            background_time,
        })
    }

    pub fn cycle_time(&self) -> DateTime<Utc> {
        self.cycle_time
    }

    pub fn window_type(&self) -> WindowType {
        self.window_type
    }

    pub fn length(&self) -> IsoDuration {
        self.length
    }

    pub fn begin(&self) -> DateTime<Utc> {
        self.begin
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn background_time(&self) -> DateTime<Utc> {
        self.background_time
    }

    /// Time of the background state the solver reads: the cycle time for 3D windows,
    /// window begin for 4D windows.
    pub fn local_background_time(&self) -> DateTime<Utc> {
        match self.window_type {
            WindowType::ThreeD => self.cycle_time,
            WindowType::FourD => self.begin,
        }
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.begin <= t && t < self.end
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} window [{}, {}) background {}",
            self.window_type,
            time::iso(&self.begin),
            time::iso(&self.end),
            time::iso(&self.background_time)
        )
    }
}
