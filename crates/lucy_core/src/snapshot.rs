//! Periodic capture of the in-progress estimate.

use crate::float_trait::LucyFloat;
use crate::image::Image;

/// A normalized copy of the estimate taken after iteration `iteration`.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<F: LucyFloat> {
    /// Zero-based iteration index the snapshot was taken at.
    pub iteration: usize,
    /// One-based position of this snapshot in the emitted sequence.
    pub ordinal: usize,
    /// Estimate min-max normalized into `[0, 1]`.
    pub image: Image<F>,
}

/// Decides at which iterations snapshots are emitted.
///
/// With `count > 0` the interval is `iterations / count`. When that interval
/// divides `iterations` exactly it is recomputed as
/// `iterations / (count + 1)` so the last slot does not collide with the
/// final iteration. A snapshot fires at `j` when `j % interval == 0`,
/// `j != 0` and fewer than `count` snapshots have been emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotSchedule {
    interval: usize,
    limit: usize,
    emitted: usize,
}

impl SnapshotSchedule {
    pub fn new(iterations: usize, count: usize) -> Self {
        if count == 0 || iterations == 0 {
            return Self {
                interval: 0,
                limit: 0,
                emitted: 0,
            };
        }

        let mut interval = iterations / count;
        if count * interval == iterations {
            interval = iterations / count.saturating_add(1);
        }

        Self {
            // More snapshots than iterations: take every iteration.
            interval: interval.max(1),
            limit: count,
            emitted: 0,
        }
    }

    /// Spacing between snapshots, or `None` when emission is disabled.
    pub fn interval(&self) -> Option<usize> {
        (self.limit > 0).then_some(self.interval)
    }

    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Register iteration `j`; returns the snapshot ordinal if one is due.
    pub fn next_ordinal(&mut self, j: usize) -> Option<usize> {
        if self.emitted < self.limit && j != 0 && j % self.interval == 0 {
            self.emitted += 1;
            Some(self.emitted)
        } else {
            None
        }
    }

    /// Iterations at which a fresh schedule would emit, for `iterations` steps.
    pub fn planned(&self, iterations: usize) -> Vec<usize> {
        let mut fresh = Self {
            emitted: 0,
            ..self.clone()
        };
        (0..iterations)
            .filter(|&j| fresh.next_ordinal(j).is_some())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uneven_division_keeps_interval() {
        let schedule = SnapshotSchedule::new(10, 3);
        assert_eq!(schedule.interval(), Some(3));
        assert_eq!(schedule.planned(10), vec![3, 6, 9]);
    }

    #[test]
    fn test_even_division_recomputes_interval() {
        let schedule = SnapshotSchedule::new(9, 3);
        assert_eq!(schedule.interval(), Some(2));
        // Candidates 2, 4, 6, 8 are capped at three.
        assert_eq!(schedule.planned(9), vec![2, 4, 6]);
    }

    #[test]
    fn test_disabled_when_count_zero() {
        let mut schedule = SnapshotSchedule::new(20, 0);
        assert_eq!(schedule.interval(), None);
        assert!((0..20).all(|j| schedule.next_ordinal(j).is_none()));
    }

    #[test]
    fn test_more_snapshots_than_iterations() {
        // 2 / 3 == 0 -> every iteration after the first
        let schedule = SnapshotSchedule::new(2, 3);
        assert_eq!(schedule.interval(), Some(1));
        assert_eq!(schedule.planned(2), vec![1]);
    }

    #[test]
    fn test_single_iteration_never_snapshots() {
        let schedule = SnapshotSchedule::new(1, 1);
        assert!(schedule.planned(1).is_empty());
    }

    #[test]
    fn test_ordinals_are_sequential() {
        let mut schedule = SnapshotSchedule::new(100, 4);
        // 100 / 4 = 25 divides evenly -> 100 / 5 = 20
        assert_eq!(schedule.interval(), Some(20));
        let ordinals: Vec<(usize, usize)> = (0..100)
            .filter_map(|j| schedule.next_ordinal(j).map(|o| (j, o)))
            .collect();
        assert_eq!(ordinals, vec![(20, 1), (40, 2), (60, 3), (80, 4)]);
        assert_eq!(schedule.emitted(), 4);
    }
}
