//! Bounded history of accepted fixes.
//!
//! Keeps the last N accepted fixes (oldest first) for the last-known-fix
//! cache and for deriving a course when the source reports no heading.
//! Nothing is persisted; the buffer lives as long as the tracker.

use std::collections::VecDeque;
use std::time::Duration;

use crate::fix::LocationFix;
use crate::geo;

/// Displacement below which a derived course is considered noise.
pub const MIN_DISTANCE_FOR_COURSE_M: f64 = 20.0;

/// Ring buffer of the most recent accepted fixes.
///
/// # Usage
///
/// ```
/// use gpstracker::fix::{FixTimestamp, LocationFix};
/// use gpstracker::history::FixHistory;
///
/// let mut history = FixHistory::new(8);
/// history.push(LocationFix::new(37.5, 127.0, 5.0, FixTimestamp::now()));
/// assert_eq!(history.latest().map(|f| f.latitude()), Some(37.5));
/// ```
#[derive(Debug, Clone)]
pub struct FixHistory {
    /// Accepted fixes (oldest first).
    fixes: VecDeque<LocationFix>,
    capacity: usize,
}

impl FixHistory {
    /// Create an empty history. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            fixes: VecDeque::new(),
            capacity,
        }
    }

    /// Record an accepted fix, evicting the oldest when full.
    pub fn push(&mut self, fix: LocationFix) {
        self.fixes.push_back(fix);
        while self.fixes.len() > self.capacity {
            self.fixes.pop_front();
        }
    }

    pub fn latest(&self) -> Option<&LocationFix> {
        self.fixes.back()
    }

    pub fn oldest(&self) -> Option<&LocationFix> {
        self.fixes.front()
    }

    pub fn len(&self) -> usize {
        self.fixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate fixes, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &LocationFix> {
        self.fixes.iter()
    }

    /// Copy of the buffer, oldest first.
    pub fn to_vec(&self) -> Vec<LocationFix> {
        self.fixes.iter().copied().collect()
    }

    /// Wall-clock span between the oldest and newest fix.
    pub fn time_span(&self) -> Option<Duration> {
        let oldest = self.fixes.front()?;
        let newest = self.fixes.back()?;
        newest.timestamp().wall_elapsed_since(&oldest.timestamp())
    }

    /// Sum of great-circle legs between consecutive fixes, in meters.
    pub fn path_length_m(&self) -> f64 {
        self.fixes
            .iter()
            .zip(self.fixes.iter().skip(1))
            .map(|(a, b)| a.distance_to(b))
            .sum()
    }

    /// Course over ground derived from the buffer.
    ///
    /// Initial great-circle bearing from the oldest to the newest fix, or
    /// `None` with fewer than two fixes or less than
    /// [`MIN_DISTANCE_FOR_COURSE_M`] of displacement.
    pub fn derived_course_deg(&self) -> Option<f64> {
        if self.fixes.len() < 2 {
            return None;
        }
        let oldest = self.fixes.front()?;
        let newest = self.fixes.back()?;

        if oldest.distance_to(newest) < MIN_DISTANCE_FOR_COURSE_M {
            return None;
        }
        Some(geo::initial_bearing_deg(oldest.position(), newest.position()))
    }

    /// Heading of the latest fix, falling back to the derived course.
    pub fn course_deg(&self) -> Option<f64> {
        self.latest()
            .and_then(LocationFix::heading_deg)
            .or_else(|| self.derived_course_deg())
    }

    pub fn clear(&mut self) {
        self.fixes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fix::FixTimestamp;

    fn track(count: usize, bearing: f64, spacing_m: f64) -> Vec<LocationFix> {
        let t0 = FixTimestamp::now();
        let mut position = (53.5, 10.0);
        (0..count)
            .map(|i| {
                let fix = LocationFix::new(
                    position.0,
                    position.1,
                    5.0,
                    t0.offset(Duration::from_secs(i as u64)),
                );
                position = geo::destination(position, bearing, spacing_m);
                fix
            })
            .collect()
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let history = FixHistory::new(0);
        assert_eq!(history.capacity(), 1);
        assert!(history.is_empty());
    }

    #[test]
    fn test_huge_capacity_allocates_lazily() {
        let mut history = FixHistory::new(usize::MAX);
        history.push(track(1, 0.0, 0.0)[0]);

        assert_eq!(history.capacity(), usize::MAX);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_evicts_oldest() {
        let mut history = FixHistory::new(3);
        let fixes = track(5, 0.0, 10.0);
        for fix in &fixes {
            history.push(*fix);
        }

        assert_eq!(history.len(), 3);
        assert_eq!(history.oldest(), Some(&fixes[2]));
        assert_eq!(history.latest(), Some(&fixes[4]));
        assert_eq!(history.to_vec(), fixes[2..].to_vec());
    }

    #[test]
    fn test_default_capacity_keeps_last_fix_only() {
        let mut history = FixHistory::new(1);
        let fixes = track(2, 0.0, 10.0);
        history.push(fixes[0]);
        history.push(fixes[1]);

        assert_eq!(history.len(), 1);
        assert_eq!(history.latest(), Some(&fixes[1]));
        assert!(history.derived_course_deg().is_none());
    }

    #[test]
    fn test_time_span_and_path_length() {
        let mut history = FixHistory::new(10);
        for fix in track(4, 90.0, 100.0) {
            history.push(fix);
        }

        assert_eq!(history.time_span(), Some(Duration::from_secs(3)));
        assert!((history.path_length_m() - 300.0).abs() < 0.1);
    }

    #[test]
    fn test_derived_course_east() {
        let mut history = FixHistory::new(10);
        for fix in track(5, 90.0, 50.0) {
            history.push(fix);
        }

        let course = history.derived_course_deg().unwrap();
        assert!((course - 90.0).abs() < 0.5, "got {}", course);
    }

    #[test]
    fn test_derived_course_ignores_jitter() {
        let mut history = FixHistory::new(10);
        for fix in track(3, 45.0, 2.0) {
            history.push(fix);
        }
        assert!(history.derived_course_deg().is_none());
    }

    #[test]
    fn test_course_prefers_reported_heading() {
        let mut history = FixHistory::new(10);
        let fixes = track(3, 0.0, 50.0);
        history.push(fixes[0]);
        history.push(fixes[1]);
        history.push(fixes[2].with_heading(123.0));

        assert_eq!(history.course_deg(), Some(123.0));
    }

    #[test]
    fn test_clear() {
        let mut history = FixHistory::new(4);
        for fix in track(3, 0.0, 10.0) {
            history.push(fix);
        }
        history.clear();
        assert!(history.is_empty());
        assert!(history.latest().is_none());
        assert!(history.time_span().is_none());
    }
}
