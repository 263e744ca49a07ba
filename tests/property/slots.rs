//! Slot reconciliation properties over evenly spaced grids

use assimilate::slots::SlotGrid;
use assimilate::time::IsoDuration;
use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

/// Slot counts per day that divide 24 hours evenly
const PER_DAY: [i64; 8] = [1, 2, 3, 4, 6, 8, 12, 24];

/// An evenly spaced grid whose slots tile the day: (grid, step in seconds)
fn tiling_grid() -> impl Strategy<Value = (SlotGrid, i64)> {
    (0..PER_DAY.len(), 0i64..24).prop_map(|(i, first)| {
        let n = PER_DAY[i];
        let step = 24 / n;
        let first = first % step;
        let hours: Vec<i64> = (0..n).map(|k| first + k * step).collect();
        (SlotGrid::from_hours(&hours, step).unwrap(), step * 3600)
    })
}

/// A window in 2021 with a minute-aligned begin and a length up to three days
fn window() -> impl Strategy<Value = (DateTime<Utc>, DateTime<Utc>)> {
    (0i64..365 * 24 * 60, 1i64..3 * 24 * 60).prop_map(|(start, length)| {
        let base = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        let begin = base + Duration::minutes(start);
        (begin, begin + Duration::minutes(length))
    })
}

proptest! {
    #[test]
    fn slots_ascend_without_duplicates((grid, _) in tiling_grid(), (begin, end) in window()) {
        let slots = grid.reconcile(begin, end).unwrap();
        prop_assert!(!slots.is_empty());
        prop_assert!(slots.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn slots_cover_window_exactly((grid, step) in tiling_grid(), (begin, end) in window()) {
        let slots = grid.reconcile(begin, end).unwrap();
        let width = grid.width().to_chrono();

        let first = slots[0];
        let last = slots[slots.len() - 1];
        prop_assert!(first <= begin && begin < first + width);
        prop_assert!(last < end && end <= last + width);
        prop_assert!(slots.windows(2).all(|w| (w[1] - w[0]).num_seconds() == step));
    }

    #[test]
    fn slots_fall_on_grid_phases((grid, _) in tiling_grid(), (begin, end) in window()) {
        let slots = grid.reconcile(begin, end).unwrap();
        for slot in slots {
            let midnight = Utc.from_utc_datetime(&slot.date_naive().and_hms_opt(0, 0, 0).unwrap());
            let since_midnight = IsoDuration::from_seconds((slot - midnight).num_seconds()).unwrap();
            prop_assert!(grid.phases().contains(&since_midnight));
        }
    }

    #[test]
    fn reversed_window_is_rejected((grid, _) in tiling_grid(), (begin, end) in window()) {
        prop_assert!(grid.reconcile(end, begin).is_err());
        prop_assert!(grid.reconcile(begin, begin).is_err());
    }
}
