//! The dashboard sections, each a pure function of the loaded table and one selection.
use crate::{
    aggregate::{grouped_category_count, histogram, GroupedCount, HistogramBin},
    catalog::{Catalog, LabCatalog},
    cohort::{by_category, distinct_values, select},
    compare::{compare, Comparison},
    config::Config,
    error::{AnalysisError, Result},
    features::{
        bucket_age, compute_delta, drop_invalid_outcomes, label_outcome, AgeBuckets, Outcome,
        AGE_GROUP, DELTA, OUTCOME,
    },
    table::{ColumnKind, Table, Value},
    ArcStr,
};
use qu::ick_use::*;
use serde::Serialize;

/// What the user has picked in one section of the dashboard.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// Age groups by outcome within one stratum.
    Demographic { column: String, value: Value },
    /// Distribution of one predictor by outcome.
    Predictor { label: String },
    /// Change in a lab value between the first hour and the first day, by outcome.
    LabChange {
        label: String,
        stratum: Option<Stratum>,
    },
}

/// Rows where `column` equals `value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Stratum {
    pub column: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rows {
    Histogram(Vec<HistogramBin>),
    Categories(Vec<GroupedCount>),
}

impl Rows {
    /// Sum of all the counts.
    pub fn total(&self) -> usize {
        match self {
            Rows::Histogram(bins) => bins.iter().map(|b| b.count).sum(),
            Rows::Categories(counts) => counts.iter().map(|c| c.count).sum(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub rows: Rows,
    /// Alive (sample `a`) against Deceased (sample `b`), where the section has one.
    pub comparison: Option<Comparison>,
    /// Things the user should know about how the numbers were arrived at.
    pub notices: Vec<String>,
    /// Rows in the working set after filtering.
    pub observations: usize,
}

/// What to show for a selection: either the result, or a message in its place.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    Ready(QueryResult),
    Message(String),
}

/// The loaded table together with everything needed to answer selections against it.
#[derive(Debug, Clone)]
pub struct Dashboard {
    table: Table,
    predictors: Catalog,
    labs: LabCatalog,
    buckets: AgeBuckets,
    max_bins: usize,
    outcome_column: ArcStr,
    age_column: ArcStr,
    demographic_columns: Vec<ArcStr>,
}

impl Dashboard {
    pub fn new(table: Table, config: &Config) -> Result<Self> {
        if config.max_bins == 0 {
            return Err(AnalysisError::InvalidArgument(
                "max_bins must be at least 1".into(),
            ));
        }
        Ok(Dashboard {
            table,
            predictors: config.predictor_catalog(),
            labs: config.lab_catalog(),
            buckets: AgeBuckets::new(&config.age_boundaries)?,
            max_bins: config.max_bins,
            outcome_column: config.outcome_column.as_str().into(),
            age_column: config.age_column.as_str().into(),
            demographic_columns: config
                .demographic_columns
                .iter()
                .map(|c| c.as_str().into())
                .collect(),
        })
    }

    pub fn predictor_labels(&self) -> impl Iterator<Item = &ArcStr> + '_ {
        self.predictors.labels()
    }

    pub fn lab_labels(&self) -> impl Iterator<Item = &ArcStr> + '_ {
        self.labs.labels()
    }

    pub fn demographic_columns(&self) -> &[ArcStr] {
        &self.demographic_columns
    }

    /// The values a stratum can be chosen from.
    pub fn strata(&self, column: &str) -> Result<Vec<Value>> {
        distinct_values(&self.table, column)
    }

    /// Interpret user input as a value of `column`.
    pub fn parse_value(&self, column: &str, raw: &str) -> Result<Value> {
        match self.table.column(column)?.kind() {
            ColumnKind::Numeric => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(Value::number)
                .ok_or_else(|| {
                    AnalysisError::InvalidArgument(format!(
                        "\"{}\" is not a number, but column \"{}\" is numeric",
                        raw, column
                    ))
                }),
            _ => Ok(Value::text(raw)),
        }
    }

    /// Run one selection.
    pub fn query(&self, selection: &Selection) -> Result<QueryResult> {
        event!(Level::DEBUG, "running query {:?}", selection);
        match selection {
            Selection::Demographic { column, value } => self.demographic(column, value),
            Selection::Predictor { label } => self.predictor(label),
            Selection::LabChange { label, stratum } => self.lab_change(label, stratum.as_ref()),
        }
    }

    /// Run one selection, turning any error into a message for the user.
    pub fn respond(&self, selection: &Selection) -> Response {
        match self.query(selection) {
            Ok(result) => Response::Ready(result),
            Err(e) => {
                event!(Level::WARN, "query {:?} failed: {}", selection, e);
                Response::Message(e.user_message())
            }
        }
    }

    fn demographic(&self, column: &str, value: &Value) -> Result<QueryResult> {
        let stratum = by_category(
            &self.table,
            column,
            value,
            &[&*self.age_column, &*self.outcome_column],
        )?;
        let mut notices = vec![];
        let working = self.labelled(&stratum, &mut notices)?;
        let working = bucket_age(&working, &self.age_column, &self.buckets)?;
        let counts =
            grouped_category_count(&working, AGE_GROUP, OUTCOME, &self.buckets.levels())?;
        Ok(QueryResult {
            rows: Rows::Categories(counts),
            comparison: None,
            notices,
            observations: working.len(),
        })
    }

    fn predictor(&self, label: &str) -> Result<QueryResult> {
        let column = self.predictors.resolve(label)?;
        let working = select(&self.table, &[&**column, &*self.outcome_column])?;
        let mut notices = vec![];
        let working = self.labelled(&working, &mut notices)?;
        let bins = histogram(&working, column, OUTCOME, self.max_bins)?;
        let comparison = compare_outcomes(&working, column, &mut notices)?;
        Ok(QueryResult {
            rows: Rows::Histogram(bins),
            comparison,
            notices,
            observations: working.len(),
        })
    }

    fn lab_change(&self, label: &str, stratum: Option<&Stratum>) -> Result<QueryResult> {
        let pair = self.labs.resolve(label)?;
        let projection = [&*pair.early, &*pair.late, &*self.outcome_column];
        let working = match stratum {
            Some(stratum) => by_category(&self.table, &stratum.column, &stratum.value, &projection)?,
            None => select(&self.table, &projection)?,
        };
        let mut notices = vec![];
        let working = self.labelled(&working, &mut notices)?;
        let working = compute_delta(&working, &pair.early, &pair.late)?;
        let bins = histogram(&working, DELTA, OUTCOME, self.max_bins)?;
        let comparison = compare_outcomes(&working, DELTA, &mut notices)?;
        Ok(QueryResult {
            rows: Rows::Histogram(bins),
            comparison,
            notices,
            observations: working.len(),
        })
    }

    /// Drop rows with a bad outcome flag (noting how many) and add the outcome label.
    fn labelled(&self, table: &Table, notices: &mut Vec<String>) -> Result<Table> {
        let (table, dropped) = drop_invalid_outcomes(table, &self.outcome_column)?;
        if dropped > 0 {
            notices.push(format!(
                "{} row(s) with an outcome other than 0 or 1 were excluded",
                dropped
            ));
        }
        label_outcome(&table, &self.outcome_column)
    }
}

/// Compare `column` between survivors and non-survivors. Too few values in either group is not an
/// error for the section as a whole, so it becomes a notice instead.
fn compare_outcomes(
    table: &Table,
    column: &str,
    notices: &mut Vec<String>,
) -> Result<Option<Comparison>> {
    let values = table.column(column)?.numbers()?;
    let outcomes = table.column(OUTCOME)?.values();
    let (mut alive, mut deceased) = (vec![], vec![]);
    for (value, outcome) in values.zip(outcomes) {
        let value = match value {
            Some(value) => value,
            None => continue,
        };
        match outcome.as_str() {
            Some(l) if l == Outcome::Alive.label() => alive.push(value),
            Some(l) if l == Outcome::Deceased.label() => deceased.push(value),
            _ => (),
        }
    }
    match compare(&alive, &deceased) {
        Ok(comparison) => Ok(Some(comparison)),
        Err(e @ AnalysisError::InsufficientData { .. }) => {
            notices.push(e.user_message());
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod test {
    use super::{Dashboard, Response, Rows, Selection, Stratum};
    use crate::{
        config::Config,
        loader::{read_table, Cleaning},
        table::Table,
        AnalysisError, Value,
    };
    use std::io::Write;

    fn dashboard() -> Dashboard {
        // age, hospital_death, ethnicity, bmi, h1_glucose_max, d1_glucose_max
        let rows = [
            (19., 0., "Caucasian", Some(22.0), Some(100.), Some(140.)),
            (20., 1., "Caucasian", Some(31.5), Some(180.), Some(260.)),
            (81., 0., "Caucasian", Some(27.3), Some(90.), Some(95.)),
            (45., 1., "Hispanic", Some(24.8), Some(150.), Some(210.)),
            (67., 0., "Hispanic", None, Some(110.), None),
            (72., 1., "Caucasian", Some(29.9), Some(200.), Some(320.)),
            (55., 2., "Caucasian", Some(25.0), Some(120.), Some(130.)),
            (33., 0., "Hispanic", Some(21.4), None, Some(115.)),
        ];
        let table = Table::from_rows(
            &[
                "age",
                "hospital_death",
                "ethnicity",
                "bmi",
                "h1_glucose_max",
                "d1_glucose_max",
            ],
            rows.iter()
                .map(|(age, death, eth, bmi, h1, d1)| {
                    vec![
                        Value::number(*age),
                        Value::number(*death),
                        Value::from(*eth),
                        (*bmi).into(),
                        (*h1).into(),
                        (*d1).into(),
                    ]
                })
                .collect(),
        )
        .unwrap();
        Dashboard::new(table, &Config::default()).unwrap()
    }

    fn caucasian() -> Stratum {
        Stratum {
            column: "ethnicity".into(),
            value: Value::from("Caucasian"),
        }
    }

    #[test]
    fn demographic_section() {
        let result = dashboard()
            .query(&Selection::Demographic {
                column: "ethnicity".into(),
                value: Value::from("Caucasian"),
            })
            .unwrap();
        assert_eq!(result.observations, 4);
        assert_eq!(result.notices.len(), 1);
        assert!(result.comparison.is_none());
        let counts = match result.rows {
            Rows::Categories(counts) => counts,
            other => panic!("unexpected rows {:?}", other),
        };
        // every age group for both outcomes
        assert_eq!(counts.len(), 10);
        let nonzero: Vec<(String, String)> = counts
            .iter()
            .filter(|c| c.count > 0)
            .map(|c| (c.value.to_string(), c.group.to_string()))
            .collect();
        assert_eq!(
            nonzero,
            vec![
                ("0–20".to_string(), "Alive".to_string()),
                ("20–40".to_string(), "Deceased".to_string()),
                ("60–80".to_string(), "Deceased".to_string()),
                ("80+".to_string(), "Alive".to_string()),
            ]
        );
    }

    #[test]
    fn predictor_section() {
        let result = dashboard()
            .query(&Selection::Predictor {
                label: "Body Mass Index (BMI)".into(),
            })
            .unwrap();
        assert_eq!(result.observations, 6);
        assert_eq!(result.rows.total(), 6);
        let comparison = result.comparison.unwrap();
        assert_eq!((comparison.n_a, comparison.n_b), (3, 3));
        assert!(comparison.welch_t < 0.);
    }

    #[test]
    fn lab_section() {
        let dashboard = dashboard();
        let all = dashboard
            .query(&Selection::LabChange {
                label: "Glucose (max)".into(),
                stratum: None,
            })
            .unwrap();
        assert_eq!(all.observations, 5);
        let comparison = all.comparison.unwrap();
        assert_eq!((comparison.n_a, comparison.n_b), (2, 3));

        let stratum = dashboard
            .query(&Selection::LabChange {
                label: "Glucose (max)".into(),
                stratum: Some(caucasian()),
            })
            .unwrap();
        assert_eq!(stratum.observations, 4);
        assert_eq!(stratum.rows.total(), 4);
        assert!(stratum.comparison.is_some());
    }

    #[test]
    fn too_few_for_comparison() {
        let result = dashboard()
            .query(&Selection::LabChange {
                label: "Glucose (max)".into(),
                stratum: Some(Stratum {
                    column: "ethnicity".into(),
                    value: Value::from("Hispanic"),
                }),
            })
            .unwrap();
        assert_eq!(result.observations, 1);
        assert!(result.comparison.is_none());
        assert_eq!(result.notices, vec!["not enough data for this selection"]);
    }

    #[test]
    fn unknown_label() {
        let dashboard = dashboard();
        let selection = Selection::Predictor {
            label: "Shoe size".into(),
        };
        assert!(matches!(
            dashboard.query(&selection),
            Err(AnalysisError::Lookup { .. })
        ));
        assert_eq!(
            dashboard.respond(&selection),
            Response::Message("unknown predictor \"Shoe size\"".into())
        );
    }

    #[test]
    fn missing_column_is_a_message() {
        let response = dashboard().respond(&Selection::Predictor {
            label: "Age".into(),
        });
        assert!(matches!(response, Response::Ready(_)));
        let response = dashboard().respond(&Selection::Predictor {
            label: "APACHE BUN".into(),
        });
        assert!(matches!(response, Response::Message(_)));
    }

    #[test]
    fn missing_tokens_do_not_break_a_predictor() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        write!(
            file,
            "age,hospital_death,d1_mbp_max\n61,0,80\n70,1,NA\n45,0,95\n80,1,110\n52,1,NaN\n"
        )
        .unwrap();
        let table = read_table(file.path(), &Cleaning::default()).unwrap();
        let dashboard = Dashboard::new(table, &Config::default()).unwrap();
        let response = dashboard.respond(&Selection::Predictor {
            label: "Day 1 Mean Blood Pressure (max)".into(),
        });
        match response {
            Response::Ready(result) => {
                assert_eq!(result.observations, 3);
                assert_eq!(result.rows.total(), 3);
            }
            other => panic!("unexpected response {:?}", other),
        }
    }

    #[test]
    fn strata_and_values() {
        let dashboard = dashboard();
        assert_eq!(
            dashboard.strata("ethnicity").unwrap(),
            vec![Value::from("Caucasian"), Value::from("Hispanic")]
        );
        assert_eq!(
            dashboard.parse_value("ethnicity", "Hispanic").unwrap(),
            Value::from("Hispanic")
        );
        assert_eq!(
            dashboard.parse_value("age", "45").unwrap(),
            Value::number(45.)
        );
        assert!(dashboard.parse_value("age", "old").is_err());
        assert_eq!(dashboard.predictor_labels().count(), 12);
    }

    #[test]
    fn result_serializes() {
        let result = dashboard()
            .query(&Selection::Predictor {
                label: "Age".into(),
            })
            .unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert!(json["rows"]["histogram"].is_array());
        assert_eq!(json["observations"], 7);
    }
}
