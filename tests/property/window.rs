//! Window calculation properties

use assimilate::time::{self, IsoDuration};
use assimilate::window::{Window, WindowParams};
use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

proptest! {
    #[test]
    fn window_spans_length_from_offset(
        minutes in 0i64..365 * 24 * 60,
        length_h in 1i64..48,
        offset_h in -24i64..24,
    ) {
        let cycle = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes);
        let params = WindowParams {
            length: IsoDuration::hours(length_h),
            offset: IsoDuration::hours(offset_h),
            ..WindowParams::default()
        };
        let window = Window::compute(cycle, &params).unwrap();

        prop_assert_eq!(window.end() - window.begin(), Duration::hours(length_h));
        prop_assert_eq!(cycle - window.begin(), Duration::hours(offset_h));
        prop_assert_eq!(window.background_time(), window.begin());
    }

    #[test]
    fn timestamps_survive_both_text_forms(seconds in 0i64..4_000_000_000) {
        let t = Utc.timestamp_opt(seconds, 0).unwrap();
        prop_assert_eq!(time::parse_timestamp(&time::iso(&t)).unwrap(), t);
        prop_assert_eq!(time::parse_timestamp(&time::directory(&t)).unwrap(), t);
    }
}
