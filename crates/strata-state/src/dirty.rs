//! Dirty byte-range tracking for cached state values.
//!
//! This module provides:
//! - [`ByteRange`]: one half-open `[offset, offset + length)` interval
//! - [`DirtySet`]: a set of disjoint intervals over a fixed-size value
//!
//! The dirty set is what makes partial synchronization possible: a partial
//! push transfers exactly the union of the marked intervals instead of the
//! whole value, so network cost is proportional to the bytes actually
//! changed.

use std::collections::BTreeMap;

/// A half-open byte interval `[offset, offset + length)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// Start offset of the interval.
    pub offset: u64,

    /// Length of the interval in bytes. Always non-zero inside a
    /// [`DirtySet`].
    pub length: u64,
}

impl ByteRange {
    /// Create a new range.
    pub fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    /// Exclusive end of the interval.
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }
}

/// A set of disjoint dirty intervals, kept sorted by offset.
///
/// Marking a sub-range inserts a new interval and merges it with any
/// overlapping or adjacent neighbours, so the set always equals the union
/// of everything marked since the last drain.
#[derive(Debug, Clone, Default)]
pub struct DirtySet {
    /// offset -> length, disjoint and non-adjacent.
    ranges: BTreeMap<u64, u64>,
}

impl DirtySet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `[offset, offset + length)` dirty, merging with overlapping or
    /// adjacent intervals. Zero-length marks are ignored.
    pub fn mark(&mut self, offset: u64, length: u64) {
        if length == 0 {
            return;
        }

        let mut start = offset;
        let mut end = offset + length;

        // Absorb a predecessor that overlaps or touches the new interval.
        if let Some((&prev_start, &prev_len)) = self.ranges.range(..start).next_back() {
            if prev_start + prev_len >= start {
                start = prev_start;
                end = end.max(prev_start + prev_len);
                self.ranges.remove(&prev_start);
            }
        }

        // Absorb successors covered by or touching the interval.
        let absorbed: Vec<u64> = self
            .ranges
            .range(start..=end)
            .map(|(&o, _)| o)
            .collect();
        for o in absorbed {
            let len = self.ranges.remove(&o).unwrap_or(0);
            end = end.max(o + len);
        }

        self.ranges.insert(start, end - start);
    }

    /// Replace the set with a single interval spanning the full value.
    pub fn mark_all(&mut self, size: u64) {
        self.ranges.clear();
        if size > 0 {
            self.ranges.insert(0, size);
        }
    }

    /// Returns `true` if no bytes are marked dirty.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Number of disjoint intervals in the set.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// The current intervals, sorted by offset.
    pub fn ranges(&self) -> Vec<ByteRange> {
        self.ranges
            .iter()
            .map(|(&offset, &length)| ByteRange { offset, length })
            .collect()
    }

    /// Drain the set, returning the intervals it held.
    ///
    /// A partial push snapshots the set with this before transferring, so
    /// ranges dirtied while the transfer is in flight accumulate in the
    /// fresh set and stay dirty afterwards.
    pub fn take(&mut self) -> Vec<ByteRange> {
        let taken = self.ranges();
        self.ranges.clear();
        taken
    }

    /// Re-insert previously drained intervals.
    ///
    /// Used to roll a failed partial push back, so a local write is never
    /// lost to a transfer error.
    pub fn merge_from(&mut self, ranges: &[ByteRange]) {
        for range in ranges {
            self.mark(range.offset, range.length);
        }
    }

    /// The complement of the set over a value of `size` bytes: every clean
    /// interval, sorted by offset.
    pub fn gaps(&self, size: u64) -> Vec<ByteRange> {
        let mut gaps = Vec::new();
        let mut cursor = 0;

        for (&offset, &length) in &self.ranges {
            if offset > cursor {
                gaps.push(ByteRange::new(cursor, offset - cursor));
            }
            cursor = offset + length;
        }

        if cursor < size {
            gaps.push(ByteRange::new(cursor, size - cursor));
        }

        gaps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranges(set: &DirtySet) -> Vec<(u64, u64)> {
        set.ranges().iter().map(|r| (r.offset, r.length)).collect()
    }

    #[test]
    fn test_mark_disjoint() {
        let mut set = DirtySet::new();
        set.mark(0, 4);
        set.mark(10, 2);

        assert_eq!(ranges(&set), vec![(0, 4), (10, 2)]);
    }

    #[test]
    fn test_mark_merges_overlap() {
        let mut set = DirtySet::new();
        set.mark(0, 6);
        set.mark(4, 6);

        assert_eq!(ranges(&set), vec![(0, 10)]);
    }

    #[test]
    fn test_mark_merges_adjacent() {
        let mut set = DirtySet::new();
        set.mark(0, 4);
        set.mark(4, 4);

        assert_eq!(ranges(&set), vec![(0, 8)]);
    }

    #[test]
    fn test_mark_absorbs_covered_ranges() {
        let mut set = DirtySet::new();
        set.mark(2, 2);
        set.mark(6, 2);
        set.mark(12, 2);
        set.mark(0, 10);

        assert_eq!(ranges(&set), vec![(0, 10), (12, 2)]);
    }

    #[test]
    fn test_mark_zero_length_ignored() {
        let mut set = DirtySet::new();
        set.mark(5, 0);

        assert!(set.is_empty());
    }

    #[test]
    fn test_union_equals_marked_intervals() {
        let mut set = DirtySet::new();
        // Arbitrary interleaved sequence; result must be the union
        set.mark(20, 5);
        set.mark(0, 3);
        set.mark(2, 4);
        set.mark(24, 10);
        set.mark(6, 1);

        assert_eq!(ranges(&set), vec![(0, 7), (20, 14)]);
    }

    #[test]
    fn test_mark_all_replaces() {
        let mut set = DirtySet::new();
        set.mark(3, 2);
        set.mark_all(16);

        assert_eq!(ranges(&set), vec![(0, 16)]);
    }

    #[test]
    fn test_take_drains() {
        let mut set = DirtySet::new();
        set.mark(0, 4);
        set.mark(8, 2);

        let taken = set.take();
        assert_eq!(taken.len(), 2);
        assert!(set.is_empty());
    }

    #[test]
    fn test_merge_from_restores() {
        let mut set = DirtySet::new();
        set.mark(0, 4);
        let taken = set.take();

        // Marks racing with the drained transfer
        set.mark(2, 4);
        set.merge_from(&taken);

        assert_eq!(ranges(&set), vec![(0, 6)]);
    }

    #[test]
    fn test_gaps() {
        let mut set = DirtySet::new();
        set.mark(2, 2);
        set.mark(8, 2);

        let gaps = set.gaps(12);
        assert_eq!(
            gaps,
            vec![
                ByteRange::new(0, 2),
                ByteRange::new(4, 4),
                ByteRange::new(10, 2)
            ]
        );
    }

    #[test]
    fn test_gaps_empty_set_spans_value() {
        let set = DirtySet::new();
        assert_eq!(set.gaps(8), vec![ByteRange::new(0, 8)]);
    }

    #[test]
    fn test_gaps_full_set_has_none() {
        let mut set = DirtySet::new();
        set.mark_all(8);
        assert!(set.gaps(8).is_empty());
    }
}
