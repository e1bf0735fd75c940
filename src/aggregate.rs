//! Counts and binned distributions, ready to be drawn.
use crate::{
    error::{AnalysisError, Result},
    table::{Table, Value},
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Slack when locating the bin a value falls in, so values on a boundary are not pushed into the
/// bin below by rounding.
const BIN_EPSILON: f64 = 1e-14;

/// Equal-width bins `[start, stop]` with a step of 1, 2 or 5 times a power of ten.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct Bins {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
}

impl Bins {
    /// Choose bins covering `[min, max]` with no more than `max_bins` bins.
    ///
    /// These are the same bins the `maxbins` option of Vega-Lite picks.
    pub fn nice(min: f64, max: f64, max_bins: usize) -> Result<Bins> {
        if max_bins == 0 {
            return Err(AnalysisError::InvalidArgument(
                "at least one bin is needed".into(),
            ));
        }
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(AnalysisError::InvalidArgument(format!(
                "cannot bin the range [{}, {}]",
                min, max
            )));
        }
        if min == max {
            let start = min.floor();
            return Ok(Bins {
                start,
                stop: start + 1.,
                step: 1.,
            });
        }

        let max_bins_f = max_bins as f64;
        let span = max - min;
        let single = Bins {
            start: min,
            stop: max,
            step: span,
        };
        let level = max_bins_f.log10().ceil() as i32;
        let mut step = 10f64.powi(span.log10().round() as i32 - level);
        // spans near the ends of the f64 range under- or overflow
        if !(step > 0. && step.is_finite() && span.is_finite()) {
            return Ok(single);
        }
        while (span / step).ceil() > max_bins_f {
            step *= 10.;
        }
        for div in [5., 2.] {
            let v = step / div;
            if span / v <= max_bins_f {
                step = v;
            }
        }

        // Aligning the edges to multiples of the step can add a bin, so widen until we fit.
        loop {
            if !step.is_finite() || step > 2. * span {
                // only a single unaligned bin fits
                return Ok(single);
            }
            let bins = Bins::aligned(min, max, step);
            if bins.len() <= max_bins {
                return Ok(bins);
            }
            step = next_step(step);
        }
    }

    fn aligned(min: f64, max: f64, step: f64) -> Bins {
        let log = step.log10();
        let precision = if log >= 0. { 0 } else { (-log).floor() as i32 + 1 };
        let eps = 10f64.powi(-precision - 1);
        let v = (min / step + eps).floor() * step;
        let start = if min < v { v - step } else { v };
        let stop = (max / step).ceil() * step;
        Bins { start, stop, step }
    }

    pub fn len(&self) -> usize {
        if self.step.is_infinite() {
            return 1;
        }
        ((self.stop - self.start) / self.step).round() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The bin containing `value`. Values at the upper edge go in the last bin.
    pub fn index(&self, value: f64) -> usize {
        if self.step.is_infinite() {
            return 0;
        }
        let v = value.min(self.stop - self.step).max(self.start);
        (BIN_EPSILON + (v - self.start) / self.step).floor() as usize
    }

    pub fn edges(&self, index: usize) -> (f64, f64) {
        if self.step.is_infinite() {
            return (self.start, self.stop);
        }
        let low = self.start + self.step * index as f64;
        (low, low + self.step)
    }
}

/// The next step in the 1, 2, 5, 10, 20, ... sequence.
fn next_step(step: f64) -> f64 {
    let magnitude = 10f64.powi(step.log10().floor() as i32);
    let mantissa = (step / magnitude).round();
    if mantissa < 2. {
        2. * magnitude
    } else if mantissa < 5. {
        5. * magnitude
    } else {
        10. * magnitude
    }
}

/// One bar of a grouped histogram.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub low: f64,
    pub high: f64,
    pub group: Value,
    pub count: usize,
}

/// Histogram of `column`, with counts split by the values of `group_by`.
///
/// Rows missing either value are ignored. Only non-zero counts are returned, ordered by bin and
/// then group.
pub fn histogram(
    table: &Table,
    column: &str,
    group_by: &str,
    max_bins: usize,
) -> Result<Vec<HistogramBin>> {
    let values: Vec<Option<f64>> = table.column(column)?.numbers()?.collect();
    let groups = table.column(group_by)?.values();
    let observations: Vec<(f64, &Value)> = values
        .iter()
        .zip(groups)
        .filter_map(|(v, group)| match v {
            Some(v) if !group.is_missing() => Some((*v, group)),
            _ => None,
        })
        .collect();
    if observations.is_empty() {
        return Ok(vec![]);
    }

    // the bins cover every value of the column, including rows without a group
    let (min, max) = values
        .iter()
        .flatten()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), v| {
            (min.min(*v), max.max(*v))
        });
    let bins = Bins::nice(min, max, max_bins)?;

    let mut counts: BTreeMap<(usize, &Value), usize> = BTreeMap::new();
    for (v, group) in observations {
        *counts.entry((bins.index(v), group)).or_insert(0) += 1;
    }
    Ok(counts
        .into_iter()
        .map(|((idx, group), count)| {
            let (low, high) = bins.edges(idx);
            HistogramBin {
                low,
                high,
                group: group.clone(),
                count,
            }
        })
        .collect())
}

/// Count of each distinct value present in `column`, in the values' natural order.
///
/// Values that never occur are not listed; see [`category_count_with_levels`].
pub fn category_count(table: &Table, column: &str) -> Result<Vec<(Value, usize)>> {
    category_count_with_levels(table, column, &[])
}

/// Like [`category_count`], but every value in `levels` is listed, with a count of 0 if it does
/// not occur.
pub fn category_count_with_levels(
    table: &Table,
    column: &str,
    levels: &[Value],
) -> Result<Vec<(Value, usize)>> {
    // B Tree so we get a predictable ordering.
    let mut map: BTreeMap<&Value, usize> = BTreeMap::new();
    // Manually insert to make sure all levels are included.
    for level in levels {
        map.insert(level, 0);
    }
    for v in table.column(column)?.values() {
        if !v.is_missing() {
            *map.entry(v).or_insert(0) += 1;
        }
    }
    Ok(map.into_iter().map(|(v, count)| (v.clone(), count)).collect())
}

/// A count for one value of one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupedCount {
    pub value: Value,
    pub group: Value,
    pub count: usize,
}

/// Counts of `column` split by `group_by`.
///
/// Every combination of a listed level and an observed group is present, with 0 where it does not
/// occur. Rows missing either value are ignored.
pub fn grouped_category_count(
    table: &Table,
    column: &str,
    group_by: &str,
    levels: &[Value],
) -> Result<Vec<GroupedCount>> {
    let values = table.column(column)?.values();
    let groups = table.column(group_by)?.values();
    let observed: BTreeSet<&Value> = groups.iter().filter(|g| !g.is_missing()).collect();

    let mut map: BTreeMap<(&Value, &Value), usize> = BTreeMap::new();
    for level in levels {
        for group in observed.iter() {
            map.insert((level, group), 0);
        }
    }
    for (v, group) in values.iter().zip(groups) {
        if !v.is_missing() && !group.is_missing() {
            *map.entry((v, group)).or_insert(0) += 1;
        }
    }
    Ok(map
        .into_iter()
        .map(|((value, group), count)| GroupedCount {
            value: value.clone(),
            group: group.clone(),
            count,
        })
        .collect())
}
