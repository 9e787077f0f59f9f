//! Ranges of the numeric domain and the partitioner that produces them.
//!
//! The benchmark domain is `[1, total]`. It is split once per run into a
//! [`PartitionPlan`]: an ordered list of inclusive, contiguous, non-overlapping
//! [`Range`]s whose union is exactly the domain.
//!
//! # Size pattern
//!
//! Every range but the last gets `round(weight * average)` numbers, where the
//! weight cycles through `0.5, 1.0, 1.5` and `average = total / ranges`. The last
//! range starts right after its predecessor and always ends at `total`, so it
//! absorbs whatever drift the weights introduced:
//!
//! ```text
//!   total = 30, ranges = 3, average = 10
//!
//!   weight 0.5        weight 1.0                 remainder
//!  ├──[1, 5]──┤├──────[6, 15]──────┤├─────────[16, 30]──────────┤
//! ```
//!
//! A weighted size is clamped so that it is at least one and leaves at least
//! one number for each range that follows. When `ranges == total` every range
//! therefore holds a single number.

use std::fmt::{self, Display};
use std::ops::{Deref, RangeInclusive};
use std::sync::Arc;

use crate::error::PartitionError;

/// Weights applied to the average range size, cycled by range index.
pub const SIZE_WEIGHTS: [f64; 3] = [0.5, 1.0, 1.5];

/// An inclusive interval `[start, end]` of the numeric domain.
///
/// Ranges are immutable and `Copy`; a strategy receives them by value or through
/// the shared [`PartitionPlan`].
///
/// # Examples
///
/// ```rust
/// use primebench::range::Range;
///
/// let range = Range::new(6, 15);
/// assert_eq!(range.len(), 10);
/// assert!(range.contains(6) && range.contains(15));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Range {
    start: u64,
    end: u64,
}

impl Range {
    /// Creates the range `[start, end]`.
    ///
    /// # Panics
    ///
    /// Panics if `start > end`.
    pub fn new(start: u64, end: u64) -> Self {
        assert!(start <= end, "range start {start} is past its end {end}");
        Self { start, end }
    }

    /// First number of the range.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Last number of the range (inclusive).
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Number of integers in the range. Never zero.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Always `false`; ranges hold at least one number.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, value: u64) -> bool {
        (self.start..=self.end).contains(&value)
    }

    /// Iterates every number of the range in ascending order.
    pub fn iter(&self) -> RangeInclusive<u64> {
        self.start..=self.end
    }

    /// Splits the range at its midpoint.
    ///
    /// The first half is `[start, mid]` and the second `[mid + 1, end]` with
    /// `mid = start + (end - start) / 2`. Returns `None` for single-number ranges.
    pub fn split(&self) -> Option<(Range, Range)> {
        if self.start == self.end {
            return None;
        }
        let mid = self.start + (self.end - self.start) / 2;
        Some((Range::new(self.start, mid), Range::new(mid + 1, self.end)))
    }
}

impl Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

impl IntoIterator for Range {
    type Item = u64;
    type IntoIter = RangeInclusive<u64>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// The ordered set of ranges covering `[1, total]` exactly once.
///
/// Cloning a plan is cheap: the ranges live behind an [`Arc`] and are shared
/// read-only by every strategy instance of every round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionPlan {
    total: u64,
    ranges: Arc<[Range]>,
}

impl PartitionPlan {
    /// The upper bound of the domain.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// The ranges in ascending order.
    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    /// `total / number_of_ranges`, the basis of the weighted sizes.
    pub fn average_range_size(&self) -> u64 {
        self.total / self.ranges.len() as u64
    }
}

impl Deref for PartitionPlan {
    type Target = [Range];

    fn deref(&self) -> &[Range] {
        &self.ranges
    }
}

/// Splits `[1, total_range]` into `number_of_ranges` contiguous ranges.
///
/// # Errors
///
/// - [`PartitionError::NoRanges`] if `number_of_ranges == 0`
/// - [`PartitionError::EmptyDomain`] if `total_range == 0`
/// - [`PartitionError::TooManyRanges`] if `total_range < number_of_ranges`
///
/// # Examples
///
/// ```rust
/// use primebench::range::{partition, Range};
///
/// let plan = partition(30, 3).unwrap();
/// assert_eq!(plan.ranges(), &[Range::new(1, 5), Range::new(6, 15), Range::new(16, 30)]);
/// ```
pub fn partition(total_range: u64, number_of_ranges: usize) -> Result<PartitionPlan, PartitionError> {
    if number_of_ranges == 0 {
        return Err(PartitionError::NoRanges);
    }
    if total_range == 0 {
        return Err(PartitionError::EmptyDomain);
    }
    if total_range < number_of_ranges as u64 {
        return Err(PartitionError::TooManyRanges {
            total: total_range,
            ranges: number_of_ranges,
        });
    }

    let average = total_range / number_of_ranges as u64;
    let mut ranges = Vec::with_capacity(number_of_ranges);
    let mut previous_end = 0u64;

    for index in 0..number_of_ranges - 1 {
        let weight = SIZE_WEIGHTS[index % SIZE_WEIGHTS.len()];
        let weighted = (weight * average as f64).round() as u64;

        // Ranges still to come after this one, the last included.
        let following = (number_of_ranges - 1 - index) as u64;
        let size = weighted.clamp(1, total_range - previous_end - following);

        let range = Range::new(previous_end + 1, previous_end + size);
        previous_end = range.end();
        ranges.push(range);
    }

    ranges.push(Range::new(previous_end + 1, total_range));

    Ok(PartitionPlan {
        total: total_range,
        ranges: ranges.into(),
    })
}
