//! Slot reconciliation
//!
//! Observation archives partition data into fixed-width slots that start at fixed
//! hour-of-day phases (for example 6-hour slots starting 03Z, 09Z, 15Z and 21Z). Given
//! an analysis window, [`reconcile`] returns the slot starts whose data must be fetched
//! to cover it.
//!
//! The range is end-exclusive: the slot starting at or after the window end is never
//! fetched. Including it would only add observations outside the window.

use crate::error::SlotError;
use crate::time::{self, IsoDuration};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Raw grid description as it appears in configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotGridSpec {
    /// Slot start offsets from midnight UTC
    pub phases: Vec<IsoDuration>,
    /// Slot width handed to the archive as its time window
    pub width: IsoDuration,
}

/// Validated slot grid: non-empty, ascending, unique phases within one day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SlotGridSpec", into = "SlotGridSpec")]
pub struct SlotGrid {
    phases: Vec<IsoDuration>,
    width: IsoDuration,
}

impl SlotGrid {
    pub fn new(mut phases: Vec<IsoDuration>, width: IsoDuration) -> Result<Self, SlotError> {
        if phases.is_empty() {
            return Err(SlotError::InvalidGrid("at least one phase is required".to_string()));
        }
        if width.seconds() <= 0 {
            return Err(SlotError::InvalidGrid(format!(
                "slot width must be positive, got {}",
                width
            )));
        }
        let day = IsoDuration::days(1);
        if let Some(bad) = phases.iter().find(|p| p.is_negative() || **p >= day) {
            return Err(SlotError::InvalidGrid(format!(
                "phase {} is outside [PT0S, P1D)",
                bad
            )));
        }
        phases.sort();
        phases.dedup();
        Ok(Self { phases, width })
    }

    /// Grid from whole hours, e.g. `from_hours(&[3, 9, 15, 21], 6)`
    pub fn from_hours(hours: &[i64], width_hours: i64) -> Result<Self, SlotError> {
        Self::new(
            hours.iter().map(|h| IsoDuration::hours(*h)).collect(),
            IsoDuration::hours(width_hours),
        )
    }

    pub fn phases(&self) -> &[IsoDuration] {
        &self.phases
    }

    pub fn width(&self) -> IsoDuration {
        self.width
    }

    /// Every slot start from the day before `begin` through the day after `end`
    fn candidates(
        &self,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, SlotError> {
        let out_of_range = || SlotError::NoCoveringSlot { begin, end };
        let first_day = begin
            .checked_sub_signed(Duration::days(1))
            .ok_or_else(out_of_range)?
            .date_naive();
        let last_day = end
            .checked_add_signed(Duration::days(1))
            .ok_or_else(out_of_range)?
            .date_naive();

        let mut starts = Vec::new();
        let mut day: NaiveDate = first_day;
        while day <= last_day {
            let midnight = day.and_hms_opt(0, 0, 0).ok_or_else(out_of_range)?;
            let midnight = Utc.from_utc_datetime(&midnight);
            for phase in &self.phases {
                starts.push(time::shift(midnight, *phase).map_err(|_| out_of_range())?);
            }
            day = match day.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }
        Ok(starts)
    }

    /// Slot starts covering `[begin, end)`, ascending and without duplicates
    pub fn reconcile(
        &self,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, SlotError> {
        if begin >= end {
            return Err(SlotError::InvalidWindow { begin, end });
        }

        let candidates = self.candidates(begin, end)?;

        let start = candidates
            .iter()
            .copied()
            .filter(|t| *t <= begin)
            .max()
            .ok_or(SlotError::NoCoveringSlot { begin, end })?;
        let stop = candidates
            .iter()
            .copied()
            .filter(|t| *t >= end)
            .min()
            .ok_or(SlotError::NoCoveringSlot { begin, end })?;

        Ok(candidates
            .into_iter()
            .filter(|t| start <= *t && *t < stop)
            .collect())
    }
}

impl Default for SlotGrid {
    fn default() -> Self {
        Self {
            phases: [3, 9, 15, 21].iter().map(|h| IsoDuration::hours(*h)).collect(),
            width: IsoDuration::hours(6),
        }
    }
}

impl TryFrom<SlotGridSpec> for SlotGrid {
    type Error = SlotError;

    fn try_from(spec: SlotGridSpec) -> Result<Self, Self::Error> {
        SlotGrid::new(spec.phases, spec.width)
    }
}

impl From<SlotGrid> for SlotGridSpec {
    fn from(grid: SlotGrid) -> Self {
        SlotGridSpec {
            phases: grid.phases,
            width: grid.width,
        }
    }
}

/// Free-function form of [`SlotGrid::reconcile`]
pub fn reconcile(
    phases: &[IsoDuration],
    width: IsoDuration,
    begin: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<DateTime<Utc>>, SlotError> {
    SlotGrid::new(phases.to_vec(), width)?.reconcile(begin, end)
}
