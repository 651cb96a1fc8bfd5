//! Diminishing returns on crowd control.
//!
//! Each unit tracks one level per diminishing group. Repeated applications
//! inside the reset window shorten durations 100% -> 50% -> 25% -> immune;
//! a window with no application resets the group to full duration.

use std::collections::HashMap;

use arcanum_core::constants::DIMINISHING_RESET_MS;
use arcanum_core::types::{DiminishingGroup, DiminishingLevel};

use crate::world::Ms;

#[derive(Debug, Clone, Copy)]
struct GroupEntry {
    level: DiminishingLevel,
    last_applied: Ms,
}

/// Per-unit diminishing state, keyed by group.
#[derive(Debug, Default)]
pub struct DiminishingTracker {
    groups: HashMap<DiminishingGroup, GroupEntry>,
}

impl DiminishingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The level the next application of `group` would be charged at.
    pub fn level(&self, group: DiminishingGroup, now: Ms) -> DiminishingLevel {
        match self.groups.get(&group) {
            Some(e) if now.saturating_sub(e.last_applied) <= DIMINISHING_RESET_MS => e.level,
            _ => DiminishingLevel::Level1,
        }
    }

    /// Charge one application of `group` and scale `duration_ms` by the
    /// current level. Returns the scaled duration; zero means the target
    /// is immune and the aura must not be applied. `DiminishingGroup::None`
    /// and non-positive durations pass through untouched.
    pub fn apply(&mut self, group: DiminishingGroup, now: Ms, duration_ms: i32) -> i32 {
        if group == DiminishingGroup::None || duration_ms <= 0 {
            return duration_ms;
        }
        let level = self.level(group, now);
        self.groups.insert(
            group,
            GroupEntry {
                level: level.next(),
                last_applied: now,
            },
        );
        (duration_ms as i64 * level.duration_pct() as i64 / 100) as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_durations_diminish_monotonically() {
        let mut dr = DiminishingTracker::new();
        let d1 = dr.apply(DiminishingGroup::Stun, 0, 8_000);
        let d2 = dr.apply(DiminishingGroup::Stun, 1_000, 8_000);
        let d3 = dr.apply(DiminishingGroup::Stun, 2_000, 8_000);
        let d4 = dr.apply(DiminishingGroup::Stun, 3_000, 8_000);
        assert_eq!(d1, 8_000);
        assert_eq!(d2, 4_000);
        assert_eq!(d3, 2_000);
        assert_eq!(d4, 0);
        // stays immune while inside the window
        assert_eq!(dr.apply(DiminishingGroup::Stun, 4_000, 8_000), 0);
    }

    #[test]
    fn test_window_expiry_resets_to_full() {
        let mut dr = DiminishingTracker::new();
        dr.apply(DiminishingGroup::Fear, 0, 6_000);
        dr.apply(DiminishingGroup::Fear, 100, 6_000);
        // window measured from the last application
        let later = 100 + DIMINISHING_RESET_MS + 1;
        assert_eq!(dr.apply(DiminishingGroup::Fear, later, 6_000), 6_000);
    }

    #[test]
    fn test_groups_are_independent() {
        let mut dr = DiminishingTracker::new();
        dr.apply(DiminishingGroup::Stun, 0, 8_000);
        // a different group is not diminished
        assert_eq!(dr.apply(DiminishingGroup::Root, 0, 8_000), 8_000);
        assert_eq!(dr.apply(DiminishingGroup::Stun, 0, 8_000), 4_000);
    }

    #[test]
    fn test_none_group_and_permanent_pass_through() {
        let mut dr = DiminishingTracker::new();
        assert_eq!(dr.apply(DiminishingGroup::None, 0, 8_000), 8_000);
        assert_eq!(dr.apply(DiminishingGroup::None, 0, 8_000), 8_000);
        assert_eq!(dr.apply(DiminishingGroup::Stun, 0, -1), -1);
        // the permanent application did not charge a level
        assert_eq!(dr.apply(DiminishingGroup::Stun, 0, 8_000), 8_000);
    }
}
