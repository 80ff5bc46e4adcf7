//! Capacity partitioning.
//!
//! Greedy, order-preserving: walk the items once, closing the current split
//! whenever adding the next item would push it strictly over capacity.

use derive_more::Display;
use std::ops::Range;

/// Upper bound on the total size of one disc.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum Capacity {
    #[display("unbounded")]
    Unbounded,
    #[display("{_0}")]
    Limited(u64),
}

impl Capacity {
    /// Negative values mean no limit.
    pub fn from_signed(value: i64) -> Self {
        u64::try_from(value).map(Self::Limited).unwrap_or(Self::Unbounded)
    }

    pub fn is_exceeded_by(&self, size: u64) -> bool {
        match self {
            Self::Unbounded => false,
            Self::Limited(limit) => size > *limit,
        }
    }
}

/// A contiguous run of items that fits on one disc.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Split<T> {
    pub first: T,
    pub last: T,
    /// Zero-based indices into the partitioned sequence.
    pub range: Range<usize>,
    pub size: u64,
}

/// Partition `items` into consecutive splits of at most `capacity`.
///
/// An item larger than the capacity by itself gets a split of its own.
/// Empty input produces no splits.
pub fn partition<T, I, F>(items: I, capacity: Capacity, mut size_of: F) -> Vec<Split<T>>
where
    T: Clone,
    I: IntoIterator<Item = T>,
    F: FnMut(&T) -> u64,
{
    let mut splits = Vec::new();
    let mut current: Option<Split<T>> = None;
    for (index, item) in items.into_iter().enumerate() {
        let size = size_of(&item);
        match current.as_mut() {
            Some(split) if !capacity.is_exceeded_by(split.size + size) => {
                split.last = item;
                split.range.end = index + 1;
                split.size += size;
            },
            _ => {
                splits.extend(current.take());
                current = Some(Split { first: item.clone(), last: item, range: index..index + 1, size });
            },
        }
    }
    splits.extend(current);
    splits
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn ranges<T>(splits: &[Split<T>]) -> Vec<Range<usize>> {
        splits.iter().map(|s| s.range.clone()).collect()
    }

    #[rstest]
    #[case(Capacity::Limited(486), vec![0..2, 2..3], vec![486, 274])]
    #[case(Capacity::Limited(208), vec![0..1, 1..2, 2..3], vec![208, 278, 274])]
    #[case(Capacity::Limited(485), vec![0..1, 1..2, 2..3], vec![208, 278, 274])]
    #[case(Capacity::Limited(760), vec![0..3], vec![760])]
    #[case(Capacity::Limited(10), vec![0..1, 1..2, 2..3], vec![208, 278, 274])]
    #[case(Capacity::Unbounded, vec![0..3], vec![760])]
    fn test_partition(#[case] capacity: Capacity, #[case] expected: Vec<Range<usize>>, #[case] totals: Vec<u64>) {
        let items = [208u64, 278, 274];
        let splits = partition(items, capacity, |s| *s);
        assert_eq!(ranges(&splits), expected);
        assert_eq!(splits.iter().map(|s| s.size).collect::<Vec<_>>(), totals);
        // Concatenating the splits reproduces the input.
        let flattened: Vec<u64> = splits.iter().flat_map(|s| items[s.range.clone()].to_vec()).collect();
        assert_eq!(flattened, items);
    }

    #[test]
    fn test_partition_first_and_last() {
        let items = ["a", "b", "c", "d"];
        let splits = partition(items, Capacity::Limited(2), |_| 1);
        assert_eq!(splits.len(), 2);
        assert_eq!((splits[0].first, splits[0].last), ("a", "b"));
        assert_eq!((splits[1].first, splits[1].last), ("c", "d"));
    }

    #[test]
    fn test_partition_single_item_split_has_same_first_and_last() {
        let splits = partition([5u64], Capacity::Limited(1), |s| *s);
        assert_eq!(splits, vec![Split { first: 5, last: 5, range: 0..1, size: 5 }]);
    }

    #[test]
    fn test_partition_empty() {
        let splits = partition(Vec::<u64>::new(), Capacity::Limited(100), |s| *s);
        assert!(splits.is_empty());
    }

    #[test]
    fn test_partition_zero_sized_items_stay_together() {
        let splits = partition([0u64, 0, 0], Capacity::Limited(0), |s| *s);
        assert_eq!(ranges(&splits), vec![0..3]);
    }

    #[rstest]
    #[case(-1, Capacity::Unbounded)]
    #[case(-42, Capacity::Unbounded)]
    #[case(0, Capacity::Limited(0))]
    #[case(4800, Capacity::Limited(4800))]
    fn test_capacity_from_signed(#[case] value: i64, #[case] expected: Capacity) {
        assert_eq!(Capacity::from_signed(value), expected);
    }
}
