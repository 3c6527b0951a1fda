//! Fragment-to-match grouping. Pure functions so the 15-second gap
//! tolerance and the connected-timeframe overlap filter can be tested
//! without touching the filesystem or the camera.

use chrono::NaiveDateTime;

use crate::state::group::group_dir_name;

const GAP_TOLERANCE_SECONDS: i64 = 15;

/// The tail of an existing group directory, as scanned newest-first by the
/// caller.
#[derive(Debug, Clone)]
pub struct ExistingGroup {
    pub dir_name: String,
    pub latest_end: NaiveDateTime,
}

/// Decides which group directory a newly discovered fragment belongs to.
/// Scans `groups_newest_first` in order and assigns to the first whose
/// latest `end_time` is within the gap tolerance of this fragment's start;
/// otherwise the fragment starts a brand new group.
pub fn assign_group(fragment_start: NaiveDateTime, groups_newest_first: &[ExistingGroup]) -> GroupAssignment {
    for group in groups_newest_first {
        let gap = (fragment_start - group.latest_end).num_seconds();
        if (0..=GAP_TOLERANCE_SECONDS).contains(&gap) {
            return GroupAssignment::Existing(group.dir_name.clone());
        }
    }
    GroupAssignment::New(group_dir_name(fragment_start))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupAssignment {
    Existing(String),
    New(String),
}

/// A camera "otherwise engaged" window. `end` is the interval's actual end
/// for closed windows, or `now` for a still-open one — callers resolve that
/// before constructing this.
#[derive(Debug, Clone, Copy)]
pub struct ConnectedInterval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// True iff `[fs, fe)` overlaps any connected interval, per the spec's
/// overlap rule `fs < t_end AND fe > t_start`.
pub fn overlaps_connected_interval(fs: NaiveDateTime, fe: NaiveDateTime, intervals: &[ConnectedInterval]) -> bool {
    intervals.iter().any(|iv| fs < iv.end && fe > iv.start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn exact_15_second_gap_joins_existing_group() {
        let groups = [ExistingGroup {
            dir_name: "2024.03.01-10.00.00".into(),
            latest_end: dt(10, 5, 0),
        }];
        let assignment = assign_group(dt(10, 5, 15), &groups);
        assert_eq!(assignment, GroupAssignment::Existing("2024.03.01-10.00.00".into()));
    }

    #[test]
    fn sixteen_second_gap_starts_new_group() {
        let groups = [ExistingGroup {
            dir_name: "2024.03.01-10.00.00".into(),
            latest_end: dt(10, 5, 0),
        }];
        let assignment = assign_group(dt(10, 5, 16), &groups);
        assert_eq!(assignment, GroupAssignment::New("2024.03.01-10.05.16".into()));
    }

    #[test]
    fn negative_gap_does_not_join() {
        // Fragment starting before the existing group's latest end (clock
        // skew or out-of-order discovery) never joins.
        let groups = [ExistingGroup {
            dir_name: "2024.03.01-10.00.00".into(),
            latest_end: dt(10, 5, 0),
        }];
        let assignment = assign_group(dt(10, 4, 0), &groups);
        assert_eq!(assignment, GroupAssignment::New("2024.03.01-10.04.00".into()));
    }

    #[test]
    fn scans_newest_first_and_picks_first_match() {
        let groups = [
            ExistingGroup {
                dir_name: "newer".into(),
                latest_end: dt(12, 0, 0),
            },
            ExistingGroup {
                dir_name: "older".into(),
                latest_end: dt(10, 5, 0),
            },
        ];
        // Would also satisfy "older" at a larger gap, but "newer" comes
        // first in the scan order and is within tolerance too.
        let assignment = assign_group(dt(12, 0, 10), &groups);
        assert_eq!(assignment, GroupAssignment::Existing("newer".into()));
    }

    #[test]
    fn fragment_fully_inside_connected_interval_is_dropped() {
        let intervals = [ConnectedInterval {
            start: dt(9, 0, 0),
            end: dt(11, 0, 0),
        }];
        assert!(overlaps_connected_interval(dt(9, 30, 0), dt(9, 45, 0), &intervals));
    }

    #[test]
    fn fragment_straddling_boundary_is_dropped() {
        let intervals = [ConnectedInterval {
            start: dt(9, 0, 0),
            end: dt(11, 0, 0),
        }];
        assert!(overlaps_connected_interval(dt(10, 55, 0), dt(11, 5, 0), &intervals));
    }

    #[test]
    fn fragment_entirely_before_or_after_is_kept() {
        let intervals = [ConnectedInterval {
            start: dt(9, 0, 0),
            end: dt(11, 0, 0),
        }];
        assert!(!overlaps_connected_interval(dt(8, 0, 0), dt(8, 55, 0), &intervals));
        assert!(!overlaps_connected_interval(dt(11, 0, 0), dt(11, 30, 0), &intervals));
    }
}
