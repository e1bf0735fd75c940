use itertools::{EitherOrBoth, Itertools};
use serde::{Deserialize, Serialize};
use std::{borrow::Borrow, fmt};

/// Range where lower bound is inclusive, upper bound is exclusive or unbounded.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Range<T>(T, Option<T>);

impl<T> Range<T>
where
    T: Ord,
{
    pub fn new(from: T, to: Option<T>) -> Self {
        if let Some(ref to) = to {
            if from >= *to {
                panic!("ranges must go from low to high")
            }
        }
        Range(from, to)
    }

    pub fn contains(&self, val: &T) -> bool {
        if let Some(end) = &self.1 {
            val >= &self.0 && val < end
        } else {
            val >= &self.0
        }
    }
}

impl<T> Range<T> {
    pub fn low(&self) -> &T {
        &self.0
    }
}

impl<T> fmt::Display for Range<T>
where
    T: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(end) = &self.1 {
            write!(f, "{}–{}", self.0, end)
        } else {
            write!(f, "{}+", self.0)
        }
    }
}

/// An ordered list of ranges. Values are allocated to the first range containing them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeSet<T> {
    ranges: Vec<Range<T>>,
}

impl<T> RangeSet<T> {
    pub fn new(ranges: Vec<Range<T>>) -> Self {
        Self { ranges }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Range<T>> + '_ {
        self.ranges.iter()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

impl<T> RangeSet<T>
where
    T: Ord,
{
    /// Index of the range `value` falls in, if any.
    pub fn position(&self, value: &T) -> Option<usize> {
        self.ranges.iter().position(|range| range.contains(value))
    }

    /// Count values per range. Values outside every range are not counted anywhere; `None` values
    /// are counted in a trailing "missing" bucket.
    pub fn bucket_values_with_missing<I, B>(&self, values: I) -> RangeSetCountsWithMissing<'_, T>
    where
        I: Iterator<Item = Option<B>>,
        B: Borrow<T>,
    {
        let mut buckets = vec![0usize; self.ranges.len() + 1];
        let last = self.ranges.len();
        for value in values {
            if let Some(value) = value {
                if let Some(idx) = self.position(value.borrow()) {
                    buckets[idx] += 1;
                }
            } else {
                buckets[last] += 1;
            }
        }
        RangeSetCountsWithMissing {
            set: self,
            counts: buckets,
        }
    }
}

/// A range set with values bucketed, and bucket sizes recorded.
pub struct RangeSetCountsWithMissing<'a, T> {
    set: &'a RangeSet<T>,
    counts: Vec<usize>,
}

impl<'a, T> RangeSetCountsWithMissing<'a, T> {
    pub fn iter(&self) -> impl Iterator<Item = (Option<&Range<T>>, usize)> {
        self.set
            .iter()
            .zip_longest(self.counts.iter().copied())
            .map(|el| match el {
                EitherOrBoth::Left(_) => unreachable!(),
                EitherOrBoth::Right(count) => (None, count),
                EitherOrBoth::Both(range, count) => (Some(range), count),
            })
    }

    pub fn missing(&self) -> usize {
        self.counts.last().copied().unwrap_or(0)
    }
}
