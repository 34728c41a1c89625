//! Canonical disjoint-interval sets.
//!
//! An [`IntervalCoverageSet`] stores its intervals as one flat, strictly
//! ascending sequence of boundary points: even indices are starts, odd
//! indices are ends. Touching or overlapping intervals are always merged on
//! insertion, so every lookup is a binary search over the points rather than
//! a scan over the intervals.

use std::fmt;
use std::iter::FusedIterator;
use std::slice::ChunksExact;

use crate::error::CalFetchResult;
use crate::interval::Interval;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntervalCoverageSet {
    points: Vec<f64>,
}

impl IntervalCoverageSet {
    pub fn new() -> Self {
        IntervalCoverageSet { points: Vec::new() }
    }

    /// Build a set by inserting each interval in turn. The result is the
    /// same canonical form regardless of input order.
    pub fn from_intervals<I>(intervals: I) -> CalFetchResult<Self>
    where
        I: IntoIterator<Item = Interval>,
    {
        let mut set = Self::new();
        for interval in intervals {
            set.add_range(interval)?;
        }
        Ok(set)
    }

    /// Number of stored intervals.
    pub fn len(&self) -> usize {
        self.points.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> Intervals<'_> {
        Intervals {
            chunks: self.points.chunks_exact(2),
        }
    }

    fn start(&self, index: usize) -> f64 {
        self.points[2 * index]
    }

    fn end(&self, index: usize) -> f64 {
        self.points[2 * index + 1]
    }

    /// Number of leading intervals for which `pred(start, end)` holds.
    /// `pred` must be true for a prefix of the intervals and false after.
    fn partition_intervals(&self, pred: impl Fn(f64, f64) -> bool) -> usize {
        let (mut lo, mut hi) = (0, self.len());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if pred(self.start(mid), self.end(mid)) {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// Index of the interval with the largest start `<= x`.
    fn floor(&self, x: f64) -> Option<usize> {
        self.partition_intervals(|start, _| start <= x).checked_sub(1)
    }

    /// Index of the first interval whose end is `>= x`, or `len()` if none.
    fn ceiling(&self, x: f64) -> usize {
        self.partition_intervals(|_, end| end < x)
    }

    /// Whether `interval` lies entirely within one stored interval.
    pub fn contains(&self, interval: Interval) -> CalFetchResult<bool> {
        interval.validate()?;

        Ok(self
            .floor(interval.start)
            .is_some_and(|index| self.end(index) >= interval.end))
    }

    /// Union `interval` into the set, merging every stored interval it
    /// overlaps or touches.
    pub fn add_range(&mut self, interval: Interval) -> CalFetchResult<()> {
        interval.validate()?;

        let lo = self.ceiling(interval.start);
        let hi = self.floor(interval.end).map_or(0, |index| index + 1).max(lo);

        let merged = if lo < hi {
            [
                self.start(lo).min(interval.start),
                self.end(hi - 1).max(interval.end),
            ]
        } else {
            [interval.start, interval.end]
        };

        self.points.splice(2 * lo..2 * hi, merged);
        Ok(())
    }

    /// Subtract `interval` from the set. Stored intervals that merely touch
    /// it are left alone.
    pub fn remove_range(&mut self, interval: Interval) -> CalFetchResult<()> {
        interval.validate()?;

        let lo = self.partition_intervals(|_, end| end <= interval.start);
        let hi = self.partition_intervals(|start, _| start < interval.end);
        if lo >= hi {
            return Ok(());
        }

        let mut remainder = Vec::with_capacity(4);
        if self.start(lo) < interval.start {
            remainder.extend([self.start(lo), interval.start]);
        }
        if self.end(hi - 1) > interval.end {
            remainder.extend([interval.end, self.end(hi - 1)]);
        }

        self.points.splice(2 * lo..2 * hi, remainder);
        Ok(())
    }

    /// The complement of this set over the whole real line.
    pub fn inverse(&self) -> Self {
        let mut points = Vec::with_capacity(self.points.len() + 2);
        points.push(f64::NEG_INFINITY);
        points.extend_from_slice(&self.points);
        points.push(f64::INFINITY);

        // A set already reaching either sentinel leaves a zero-width
        // interval at that end.
        if points[0] == points[1] {
            points.drain(..2);
        }
        let n = points.len();
        if n >= 2 && points[n - 2] == points[n - 1] {
            points.truncate(n - 2);
        }

        IntervalCoverageSet { points }
    }

    /// Points covered by both `self` and `other`.
    pub fn intersection(&self, other: &Self) -> Self {
        let (a, b) = (&self.points, &other.points);
        let (Some(&a_first), Some(&b_first)) = (a.first(), b.first()) else {
            return Self::new();
        };

        // Everything before the other set's first point cannot intersect.
        // The parity of a skipped prefix still says whether we are inside.
        let mut i = a.partition_point(|&p| p < b_first);
        let mut j = b.partition_point(|&p| p < a_first);
        let mut points = Vec::new();

        while i < a.len() && j < b.len() {
            let was_inside = i % 2 == 1 && j % 2 == 1;

            // On equal points, close before opening so touching intervals
            // never yield a zero-width intersection.
            let take_a = if a[i] < b[j] {
                true
            } else if a[i] > b[j] {
                false
            } else {
                i % 2 == 1
            };

            let point = if take_a {
                i += 1;
                a[i - 1]
            } else {
                j += 1;
                b[j - 1]
            };

            if (i % 2 == 1 && j % 2 == 1) != was_inside {
                points.push(point);
            }
        }

        IntervalCoverageSet { points }
    }
}

impl fmt::Display for IntervalCoverageSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (n, interval) in self.iter().enumerate() {
            if n > 0 {
                write!(f, ",")?;
            }
            write!(f, "{interval}")?;
        }
        write!(f, "]")
    }
}

/// Ascending iterator over the intervals of an [`IntervalCoverageSet`].
#[derive(Debug, Clone)]
pub struct Intervals<'a> {
    chunks: ChunksExact<'a, f64>,
}

impl Iterator for Intervals<'_> {
    type Item = Interval;

    fn next(&mut self) -> Option<Self::Item> {
        self.chunks
            .next()
            .map(|pair| Interval::new(pair[0], pair[1]))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl DoubleEndedIterator for Intervals<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.chunks
            .next_back()
            .map(|pair| Interval::new(pair[0], pair[1]))
    }
}

impl ExactSizeIterator for Intervals<'_> {}

impl FusedIterator for Intervals<'_> {}

impl<'a> IntoIterator for &'a IntervalCoverageSet {
    type Item = Interval;
    type IntoIter = Intervals<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CalFetchError;

    fn set(intervals: &[(f64, f64)]) -> IntervalCoverageSet {
        IntervalCoverageSet::from_intervals(intervals.iter().copied().map(Interval::from)).unwrap()
    }

    fn ranges(set: &IntervalCoverageSet) -> Vec<(f64, f64)> {
        set.iter().map(|i| (i.start, i.end)).collect()
    }

    #[test]
    fn test_add_range_scenario_merges_touching_and_overlapping() {
        let mut coverage = IntervalCoverageSet::new();
        for (start, end) in [(1.0, 2.0), (4.0, 6.0), (8.0, 9.0), (2.0, 3.0), (5.0, 6.0), (5.0, 8.0)] {
            coverage.add_range(Interval::new(start, end)).unwrap();
        }

        assert_eq!(ranges(&coverage), [(1.0, 3.0), (4.0, 9.0)]);
        assert_eq!(coverage.to_string(), "[[1,3],[4,9]]");
    }

    #[test]
    fn test_add_range_inserts_in_sorted_position() {
        let coverage = set(&[(10.0, 12.0), (1.0, 2.0), (5.0, 6.0)]);
        assert_eq!(ranges(&coverage), [(1.0, 2.0), (5.0, 6.0), (10.0, 12.0)]);
    }

    #[test]
    fn test_add_range_spanning_many_collapses_to_one() {
        let mut coverage = set(&[(1.0, 2.0), (3.0, 4.0), (5.0, 6.0), (20.0, 21.0)]);
        coverage.add_range(Interval::new(0.0, 5.5)).unwrap();
        assert_eq!(ranges(&coverage), [(0.0, 6.0), (20.0, 21.0)]);
    }

    #[test]
    fn test_add_range_is_idempotent() {
        let mut once = set(&[(1.0, 3.0), (7.0, 9.0)]);
        once.add_range(Interval::new(2.0, 8.0)).unwrap();
        let mut twice = once.clone();
        twice.add_range(Interval::new(2.0, 8.0)).unwrap();

        assert_eq!(once, twice);
    }

    #[test]
    fn test_add_two_ranges_covers_both() {
        let a = Interval::new(1.0, 4.0);
        let b = Interval::new(3.0, 9.0);
        let coverage = IntervalCoverageSet::from_intervals([a, b]).unwrap();

        assert_eq!(coverage.len(), 1);
        assert!(coverage.contains(a).unwrap());
        assert!(coverage.contains(b).unwrap());
        assert!(coverage.contains(Interval::new(3.5, 3.75)).unwrap());
    }

    #[test]
    fn test_construction_order_does_not_matter() {
        let forward = set(&[(1.0, 2.0), (2.0, 3.0), (5.0, 7.0)]);
        let backward = set(&[(5.0, 7.0), (2.0, 3.0), (1.0, 2.0)]);
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_contains_requires_single_interval() {
        let coverage = set(&[(1.0, 3.0), (4.0, 9.0)]);

        assert!(coverage.contains(Interval::new(1.0, 3.0)).unwrap());
        assert!(coverage.contains(Interval::new(5.0, 9.0)).unwrap());
        assert!(!coverage.contains(Interval::new(2.0, 5.0)).unwrap());
        assert!(!coverage.contains(Interval::new(0.0, 2.0)).unwrap());
        assert!(!coverage.contains(Interval::new(8.0, 10.0)).unwrap());
        assert!(!IntervalCoverageSet::new().contains(Interval::new(0.0, 1.0)).unwrap());
    }

    #[test]
    fn test_operations_reject_invalid_intervals() {
        let mut coverage = set(&[(1.0, 3.0)]);

        assert!(matches!(
            coverage.contains(Interval::new(2.0, 2.0)),
            Err(CalFetchError::InvalidInterval { .. })
        ));
        assert!(coverage.add_range(Interval::new(5.0, 4.0)).is_err());
        assert!(coverage.remove_range(Interval::new(f64::NAN, 4.0)).is_err());
        assert_eq!(ranges(&coverage), [(1.0, 3.0)]);
    }

    #[test]
    fn test_remove_range_truncates_and_drops() {
        let mut coverage = set(&[(1.0, 3.0), (4.0, 6.0), (8.0, 12.0)]);
        coverage.remove_range(Interval::new(2.0, 10.0)).unwrap();
        assert_eq!(ranges(&coverage), [(1.0, 2.0), (10.0, 12.0)]);
    }

    #[test]
    fn test_remove_range_splits_interval() {
        let mut coverage = set(&[(0.0, 10.0)]);
        coverage.remove_range(Interval::new(3.0, 4.0)).unwrap();
        assert_eq!(ranges(&coverage), [(0.0, 3.0), (4.0, 10.0)]);
    }

    #[test]
    fn test_remove_range_touching_is_noop() {
        let mut coverage = set(&[(1.0, 3.0), (5.0, 7.0)]);
        coverage.remove_range(Interval::new(3.0, 5.0)).unwrap();
        assert_eq!(ranges(&coverage), [(1.0, 3.0), (5.0, 7.0)]);
    }

    #[test]
    fn test_remove_range_undoes_add_range() {
        let original = set(&[(1.0, 3.0), (10.0, 12.0)]);
        let mut coverage = original.clone();

        coverage.add_range(Interval::new(5.0, 8.0)).unwrap();
        coverage.remove_range(Interval::new(5.0, 8.0)).unwrap();

        assert_eq!(coverage, original);
    }

    #[test]
    fn test_inverse_of_empty_is_whole_line() {
        let inverse = IntervalCoverageSet::new().inverse();
        assert_eq!(ranges(&inverse), [(f64::NEG_INFINITY, f64::INFINITY)]);
        assert!(inverse.inverse().is_empty());
    }

    #[test]
    fn test_inverse_drops_degenerate_edges() {
        let coverage = set(&[(f64::NEG_INFINITY, 0.0), (5.0, f64::INFINITY)]);
        assert_eq!(ranges(&coverage.inverse()), [(0.0, 5.0)]);
    }

    #[test]
    fn test_inverse_twice_reconstructs() {
        let coverage = set(&[(1.0, 3.0), (4.0, 9.0), (11.0, 12.0)]);
        let inverse = coverage.inverse();

        assert_eq!(
            ranges(&inverse),
            [
                (f64::NEG_INFINITY, 1.0),
                (3.0, 4.0),
                (9.0, 11.0),
                (12.0, f64::INFINITY)
            ]
        );
        assert_eq!(inverse.inverse(), coverage);
    }

    #[test]
    fn test_intersection_with_inverse_is_empty() {
        let coverage = set(&[(1.0, 3.0), (4.0, 9.0)]);
        assert!(coverage.intersection(&coverage.inverse()).is_empty());
        assert!(coverage.inverse().intersection(&coverage).is_empty());
    }

    #[test]
    fn test_intersection_of_overlapping_sets() {
        let a = set(&[(0.0, 5.0), (8.0, 12.0), (20.0, 30.0)]);
        let b = set(&[(3.0, 9.0), (11.0, 21.0), (40.0, 50.0)]);

        let expected = [(3.0, 5.0), (8.0, 9.0), (11.0, 12.0), (20.0, 21.0)];
        assert_eq!(ranges(&a.intersection(&b)), expected);
        assert_eq!(ranges(&b.intersection(&a)), expected);
    }

    #[test]
    fn test_intersection_with_self_is_identity() {
        let coverage = set(&[(1.0, 3.0), (4.0, 9.0)]);
        assert_eq!(coverage.intersection(&coverage), coverage);
    }

    #[test]
    fn test_gap_computation_against_requested_range() {
        let covered = set(&[(1.0, 5.0), (10.0, 12.0), (14.0, 18.0)]);
        let requested = set(&[(3.0, 16.0)]);

        let gaps = covered.inverse().intersection(&requested);
        assert_eq!(ranges(&gaps), [(5.0, 10.0), (12.0, 14.0)]);

        let covered_request = set(&[(2.0, 4.0)]);
        assert!(covered.inverse().intersection(&covered_request).is_empty());
    }

    #[test]
    fn test_iteration_is_restartable_and_double_ended() {
        let coverage = set(&[(1.0, 2.0), (3.0, 4.0), (5.0, 6.0)]);
        let iter = coverage.iter();
        assert_eq!(iter.len(), 3);

        let first: Vec<_> = coverage.iter().collect();
        let second: Vec<_> = (&coverage).into_iter().collect();
        assert_eq!(first, second);

        let reversed: Vec<_> = coverage.iter().rev().map(|i| i.start).collect();
        assert_eq!(reversed, [5.0, 3.0, 1.0]);
    }
}
