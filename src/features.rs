//! Derived columns: outcome labels, age groups and the change between two timepoints.
use crate::{
    error::{AnalysisError, Result},
    range::{Range, RangeSet},
    table::{Bucket, Column, Table, Value},
    ArcStr,
};
use noisy_float::prelude::*;
use qu::ick_use::*;
use serde::Serialize;
use std::fmt;

/// Name of the column added by [`label_outcome`].
pub const OUTCOME: &str = "Outcome";
/// Name of the column added by [`bucket_age`].
pub const AGE_GROUP: &str = "age_group";
/// Name of the column added by [`compute_delta`].
pub const DELTA: &str = "delta";

/// The outcome flag is encoded `0` or `1`. No other values are valid.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Outcome {
    Alive,
    Deceased,
}

impl Outcome {
    pub fn from_flag(flag: f64) -> Option<Self> {
        if flag == 0. {
            Some(Outcome::Alive)
        } else if flag == 1. {
            Some(Outcome::Deceased)
        } else {
            None
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Outcome::Alive => "Alive",
            Outcome::Deceased => "Deceased",
        }
    }

    pub fn value(self) -> Value {
        Value::from(self.label())
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn outcome_of(value: &Value) -> Option<Outcome> {
    value.as_f64().and_then(Outcome::from_flag)
}

/// Add an `Outcome` column labelling the flag in `flag_column`.
///
/// Missing flags give a missing label. Any other value outside {0, 1} is an error: bad rows
/// should be removed with [`drop_invalid_outcomes`] first if they are to be tolerated.
pub fn label_outcome(table: &Table, flag_column: &str) -> Result<Table> {
    let col = table.column(flag_column)?;
    let mut invalid = col
        .values()
        .iter()
        .filter(|v| !v.is_missing() && outcome_of(v).is_none());
    if let Some(first) = invalid.next() {
        return Err(AnalysisError::InvalidOutcome {
            column: col.name().clone(),
            count: 1 + invalid.count(),
            first: first.to_string(),
        });
    }
    let labels = col
        .values()
        .iter()
        .map(|v| outcome_of(v).map(Outcome::value).unwrap_or(Value::Missing))
        .collect();
    table.with_column(Column::new(OUTCOME, labels))
}

/// Remove rows whose flag is present but not 0 or 1, returning how many were removed.
pub fn drop_invalid_outcomes(table: &Table, flag_column: &str) -> Result<(Table, usize)> {
    let values = table.column(flag_column)?.values();
    let kept = table.filter(|rec| {
        let v = &values[rec.index()];
        v.is_missing() || outcome_of(v).is_some()
    });
    let dropped = table.len() - kept.len();
    if dropped > 0 {
        event!(
            Level::WARN,
            "excluded {} row(s) with an outcome outside {{0, 1}} in \"{}\"",
            dropped,
            flag_column
        );
    }
    Ok((kept, dropped))
}

/// Age groups over half-open intervals `[b_i, b_{i+1})`.
///
/// The last group is labelled as open ended ("80+"), but ages at or beyond the last boundary are
/// still out of range.
#[derive(Debug, Clone, PartialEq)]
pub struct AgeBuckets {
    ranges: RangeSet<R64>,
    labels: Vec<ArcStr>,
}

impl AgeBuckets {
    /// Boundaries must be finite, strictly increasing, and there must be at least two of them.
    pub fn new(boundaries: &[f64]) -> Result<Self> {
        let bounds: Option<Vec<R64>> = boundaries.iter().map(|b| R64::try_new(*b)).collect();
        let bounds = match bounds {
            Some(bounds) if bounds.len() >= 2 && bounds.windows(2).all(|w| w[0] < w[1]) => bounds,
            _ => {
                return Err(AnalysisError::InvalidArgument(format!(
                    "age boundaries must be at least two increasing numbers, got {:?}",
                    boundaries
                )))
            }
        };
        let ranges: Vec<Range<R64>> = bounds
            .windows(2)
            .map(|w| Range::new(w[0], Some(w[1])))
            .collect();
        let last = ranges.len() - 1;
        let labels = ranges
            .iter()
            .enumerate()
            .map(|(idx, range)| {
                if idx == last {
                    format!("{}+", range.low()).into()
                } else {
                    range.to_string().into()
                }
            })
            .collect();
        Ok(AgeBuckets {
            ranges: RangeSet::new(ranges),
            labels,
        })
    }

    /// The group `age` falls in, if it is in range.
    pub fn bucket(&self, age: f64) -> Option<Bucket> {
        let age = R64::try_new(age)?;
        let index = self.ranges.position(&age)?;
        Some(Bucket {
            index,
            label: self.labels[index].clone(),
        })
    }

    /// Every group, in order.
    pub fn levels(&self) -> Vec<Value> {
        self.labels
            .iter()
            .enumerate()
            .map(|(index, label)| {
                Value::Bucket(Bucket {
                    index,
                    label: label.clone(),
                })
            })
            .collect()
    }

    pub fn ranges(&self) -> &RangeSet<R64> {
        &self.ranges
    }
}

impl Default for AgeBuckets {
    fn default() -> Self {
        AgeBuckets::new(&[0., 20., 40., 60., 80., 200.]).expect("default age boundaries are valid")
    }
}

/// Add an `age_group` column. Rows with a missing or out of range age are excluded.
pub fn bucket_age(table: &Table, age_column: &str, buckets: &AgeBuckets) -> Result<Table> {
    let groups: Vec<Option<Bucket>> = table
        .column(age_column)?
        .numbers()?
        .map(|age| age.and_then(|age| buckets.bucket(age)))
        .collect();
    let table = table.with_column(Column::new(
        AGE_GROUP,
        groups
            .iter()
            .map(|g| g.clone().map(Value::Bucket).unwrap_or(Value::Missing))
            .collect(),
    ))?;
    Ok(table.filter(|rec| groups[rec.index()].is_some()))
}

/// Add a `delta` column holding `late - early`, missing where either is missing.
pub fn compute_delta(table: &Table, early: &str, late: &str) -> Result<Table> {
    let early = table.column(early)?.numbers()?;
    let late = table.column(late)?.numbers()?;
    let delta = early
        .zip(late)
        .map(|(early, late)| match (early, late) {
            (Some(early), Some(late)) => Value::number(late - early),
            _ => Value::Missing,
        })
        .collect();
    table.with_column(Column::new(DELTA, delta))
}

#[cfg(test)]
mod test {
    use super::{
        bucket_age, compute_delta, drop_invalid_outcomes, label_outcome, AgeBuckets, AGE_GROUP,
        DELTA, OUTCOME,
    };
    use crate::{table::Table, AnalysisError, Value};

    fn flags(values: &[Option<f64>]) -> Table {
        Table::from_rows(
            &["hospital_death"],
            values.iter().map(|v| vec![(*v).into()]).collect(),
        )
        .unwrap()
    }

    #[test]
    fn outcome_labels() {
        let table = label_outcome(&flags(&[Some(0.), Some(1.), None]), "hospital_death").unwrap();
        assert_eq!(
            table.column(OUTCOME).unwrap().values(),
            &[Value::from("Alive"), Value::from("Deceased"), Value::Missing]
        );
    }

    #[test]
    fn outcome_outside_01() {
        let err = label_outcome(&flags(&[Some(0.), Some(2.), Some(0.5)]), "hospital_death")
            .unwrap_err();
        match err {
            AnalysisError::InvalidOutcome { count, first, .. } => {
                assert_eq!(count, 2);
                assert_eq!(first, "2");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn invalid_outcomes_dropped() {
        let (table, dropped) =
            drop_invalid_outcomes(&flags(&[Some(0.), Some(2.), None, Some(1.)]), "hospital_death")
                .unwrap();
        assert_eq!(dropped, 1);
        assert_eq!(table.len(), 3);
        assert!(label_outcome(&table, "hospital_death").is_ok());
    }

    #[test]
    fn default_age_buckets() {
        let buckets = AgeBuckets::default();
        let label = |age: f64| buckets.bucket(age).map(|b| b.label.to_string());
        assert_eq!(label(0.).as_deref(), Some("0–20"));
        assert_eq!(label(20.).as_deref(), Some("20–40"));
        assert_eq!(label(79.9).as_deref(), Some("60–80"));
        assert_eq!(label(80.).as_deref(), Some("80+"));
        assert_eq!(label(199.99).as_deref(), Some("80+"));
        assert_eq!(label(200.), None);
        assert_eq!(label(-1.), None);
    }

    #[test]
    fn levels_are_ordered() {
        let levels = AgeBuckets::default().levels();
        let labels: Vec<String> = levels.iter().map(|v| v.to_string()).collect();
        assert_eq!(labels, vec!["0–20", "20–40", "40–60", "60–80", "80+"]);
        let mut sorted = levels.clone();
        sorted.sort();
        assert_eq!(sorted, levels);
    }

    #[test]
    fn bad_boundaries() {
        assert!(AgeBuckets::new(&[0.]).is_err());
        assert!(AgeBuckets::new(&[0., 20., 20.]).is_err());
        assert!(AgeBuckets::new(&[0., f64::NAN]).is_err());
    }

    #[test]
    fn bucket_age_excludes_out_of_range() {
        let table = Table::from_rows(
            &["age"],
            vec![
                vec![Value::number(19.)],
                vec![Value::number(200.)],
                vec![Value::Missing],
                vec![Value::number(20.)],
            ],
        )
        .unwrap();
        let table = bucket_age(&table, "age", &AgeBuckets::default()).unwrap();
        let groups: Vec<String> = table
            .column(AGE_GROUP)
            .unwrap()
            .values()
            .iter()
            .map(|v| v.to_string())
            .collect();
        assert_eq!(groups, vec!["0–20", "20–40"]);
    }

    #[test]
    fn delta() {
        let table = Table::from_rows(
            &["h1_glucose_max", "d1_glucose_max"],
            vec![
                vec![Value::number(100.), Value::number(250.5)],
                vec![Value::Missing, Value::number(120.)],
                vec![Value::number(140.), Value::Missing],
                vec![Value::number(300.), Value::number(180.)],
            ],
        )
        .unwrap();
        let table = compute_delta(&table, "h1_glucose_max", "d1_glucose_max").unwrap();
        assert_eq!(
            table.column(DELTA).unwrap().values(),
            &[
                Value::number(250.5 - 100.),
                Value::Missing,
                Value::Missing,
                Value::number(-120.),
            ]
        );
    }

    #[test]
    fn delta_needs_numbers() {
        let table = Table::from_rows(
            &["a", "b"],
            vec![vec![Value::from("x"), Value::number(1.)]],
        )
        .unwrap();
        assert!(matches!(
            compute_delta(&table, "a", "b"),
            Err(AnalysisError::DataFormat(_))
        ));
    }
}
