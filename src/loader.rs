//! Reading and cleaning the admissions file.
//!
//! All missing-value normalisation happens here, once. Everything downstream can assume that a
//! sentinel string or an impossible probability has already become [`Value::Missing`].
use crate::{
    error::{AnalysisError, Result},
    table::{Column, ColumnKind, Table, Value},
    ArcStr,
};
use parking_lot::Mutex;
use qu::ick_use::*;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

/// Cleaning rules applied while loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cleaning {
    /// Literal used for "not available" in the sentinel columns.
    pub missing_sentinel: String,
    /// Columns that may hold the sentinel. These are always coerced to numbers.
    pub sentinel_columns: Vec<String>,
    /// Model-estimated probabilities. Negative values are errors and become missing.
    pub probability_columns: Vec<String>,
}

impl Default for Cleaning {
    fn default() -> Self {
        Cleaning {
            missing_sentinel: "NA".into(),
            sentinel_columns: vec!["bmi".into()],
            probability_columns: vec![
                "apache_4a_hospital_death_prob".into(),
                "apache_4a_icu_death_prob".into(),
            ],
        }
    }
}

/// Loads tables and keeps them for the life of the process.
///
/// Create one at startup and hand it (or the tables it returns) to whatever needs the data.
pub struct DatasetLoader {
    cleaning: Cleaning,
    cache: Mutex<BTreeMap<PathBuf, Table>>,
}

impl DatasetLoader {
    pub fn new(cleaning: Cleaning) -> Self {
        DatasetLoader {
            cleaning,
            cache: Mutex::new(BTreeMap::new()),
        }
    }

    /// Load and clean the table at `path`, or return the one loaded earlier from the same path.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Table> {
        let path = path.as_ref();
        let mut cache = self.cache.lock();
        if let Some(table) = cache.get(path) {
            event!(Level::DEBUG, "using cached table for \"{}\"", path.display());
            return Ok(table.clone());
        }
        let table = read_table(path, &self.cleaning)?;
        cache.insert(path.to_owned(), table.clone());
        Ok(table)
    }

    /// The table previously loaded from `path`, if any.
    pub fn get(&self, path: impl AsRef<Path>) -> Option<Table> {
        self.cache.lock().get(path.as_ref()).cloned()
    }
}

impl Default for DatasetLoader {
    fn default() -> Self {
        DatasetLoader::new(Cleaning::default())
    }
}

/// Read and clean a table, bypassing any cache.
pub fn read_table(path: impl AsRef<Path>, cleaning: &Cleaning) -> Result<Table> {
    let path = path.as_ref();
    let data_source = |source| AnalysisError::DataSource {
        path: path.to_owned(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(data_source)?;
    let headers: Vec<ArcStr> = reader
        .headers()
        .map_err(data_source)?
        .iter()
        .map(Into::into)
        .collect();
    let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record.map_err(data_source)?;
        for (col, field) in cells.iter_mut().zip(record.iter()) {
            col.push(field.to_owned());
        }
    }

    for name in cleaning.sentinel_columns.iter() {
        if !headers.iter().any(|h| **h == **name) {
            event!(Level::WARN, "sentinel column \"{}\" not present, skipping", name);
        }
    }

    let columns = headers
        .iter()
        .zip(cells)
        .map(|(name, cells)| {
            if cleaning.sentinel_columns.iter().any(|c| **c == **name) {
                coerce_numeric(name.clone(), &cells, &cleaning.missing_sentinel)
            } else {
                infer_column(name.clone(), &cells, &cleaning.missing_sentinel)
            }
        })
        .collect();
    let mut table = Table::new(columns)?;

    for name in cleaning.probability_columns.iter() {
        table = drop_negative(table, name)?;
    }

    event!(
        Level::INFO,
        "loaded {} rows and {} columns from \"{}\"",
        table.len(),
        table.columns().len(),
        path.display()
    );
    Ok(table)
}

/// Cells read as missing in every column, in addition to the configured sentinel. These are the
/// usual spellings of "not available" in exported CSV files.
const MISSING_TOKENS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN", "<NA>",
    "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

fn is_missing_cell(cell: &str, sentinel: &str) -> bool {
    cell.is_empty() || cell == sentinel || MISSING_TOKENS.contains(&cell)
}

fn parse_number(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Sentinel and empty cells become missing, as does anything else that isn't a number.
fn coerce_numeric(name: ArcStr, cells: &[String], sentinel: &str) -> Column {
    let values = cells
        .iter()
        .map(|cell| {
            if is_missing_cell(cell, sentinel) {
                Value::Missing
            } else {
                parse_number(cell).map(Value::number).unwrap_or(Value::Missing)
            }
        })
        .collect();
    Column::new(name, values)
}

/// A column is numeric if every cell that isn't missing is a number, otherwise it is text.
fn infer_column(name: ArcStr, cells: &[String], sentinel: &str) -> Column {
    let numeric = cells
        .iter()
        .all(|cell| is_missing_cell(cell, sentinel) || parse_number(cell).is_some());
    let values = cells
        .iter()
        .map(|cell| {
            if is_missing_cell(cell, sentinel) {
                Value::Missing
            } else if numeric {
                parse_number(cell).map(Value::number).unwrap_or(Value::Missing)
            } else {
                Value::text(cell.as_str())
            }
        })
        .collect();
    Column::new(name, values)
}

fn drop_negative(table: Table, name: &str) -> Result<Table> {
    let col = match table.column(name) {
        Ok(col) => col,
        Err(_) => {
            event!(Level::WARN, "probability column \"{}\" not present, skipping", name);
            return Ok(table);
        }
    };
    if col.kind() != ColumnKind::Numeric {
        event!(Level::WARN, "probability column \"{}\" is not numeric, skipping", name);
        return Ok(table);
    }
    let mut replaced = 0;
    let values = col
        .values()
        .iter()
        .map(|v| match v.as_f64() {
            Some(p) if p < 0. => {
                replaced += 1;
                Value::Missing
            }
            _ => v.clone(),
        })
        .collect();
    if replaced == 0 {
        return Ok(table);
    }
    event!(
        Level::DEBUG,
        "{} negative value(s) in \"{}\" set to missing",
        replaced,
        name
    );
    table.with_column(Column::new(name, values))
}

#[cfg(test)]
mod test {
    use super::{read_table, Cleaning, DatasetLoader};
    use crate::{table::ColumnKind, AnalysisError, Value};
    use std::io::Write;

    const CSV: &str = "\
patient_id,age,bmi,gender,hospital_death,apache_4a_hospital_death_prob,apache_4a_icu_death_prob
1,68,22.7,M,0,0.1,0.05
2,77,NA,F,0,-1,0.0
3,25,31.95,F,1,0.47,-1
4,81,oops,M,0,,0.2
5,,NA,,1,0.0,0.01
";

    fn fixture(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn sentinel_becomes_missing() {
        let file = fixture(CSV);
        let table = read_table(file.path(), &Cleaning::default()).unwrap();
        let bmi = table.column("bmi").unwrap();
        assert_eq!(bmi.kind(), ColumnKind::Numeric);
        assert_eq!(
            bmi.values(),
            &[
                Value::number(22.7),
                Value::Missing,
                Value::number(31.95),
                Value::Missing,
                Value::Missing,
            ]
        );
        assert!(bmi.values().iter().all(|v| v.as_str() != Some("NA")));
    }

    #[test]
    fn negative_probabilities_become_missing() {
        let file = fixture(CSV);
        let table = read_table(file.path(), &Cleaning::default()).unwrap();
        let hospital = table.column("apache_4a_hospital_death_prob").unwrap();
        assert_eq!(
            hospital.values(),
            &[
                Value::number(0.1),
                Value::Missing,
                Value::number(0.47),
                Value::Missing,
                Value::number(0.0),
            ]
        );
        let icu = table.column("apache_4a_icu_death_prob").unwrap();
        assert_eq!(
            icu.values(),
            &[
                Value::number(0.05),
                Value::number(0.0),
                Value::Missing,
                Value::number(0.2),
                Value::number(0.01),
            ]
        );
    }

    #[test]
    fn other_columns_are_inferred() {
        let file = fixture(CSV);
        let table = read_table(file.path(), &Cleaning::default()).unwrap();
        assert_eq!(table.column("age").unwrap().kind(), ColumnKind::Numeric);
        assert_eq!(table.column("age").unwrap().missing_count(), 1);
        let gender = table.column("gender").unwrap();
        assert_eq!(gender.kind(), ColumnKind::Categorical);
        assert_eq!(gender.values()[1], Value::from("F"));
        assert_eq!(gender.values()[4], Value::Missing);
    }

    #[test]
    fn missing_tokens_in_other_columns() {
        let file = fixture(
            "\
age,ethnicity,d1_mbp_max
40,Caucasian,80
NA,N/A,NA
52,Hispanic,95
61,null,NaN
",
        );
        let table = read_table(file.path(), &Cleaning::default()).unwrap();
        let mbp = table.column("d1_mbp_max").unwrap();
        assert_eq!(mbp.kind(), ColumnKind::Numeric);
        assert_eq!(
            mbp.values(),
            &[
                Value::number(80.),
                Value::Missing,
                Value::number(95.),
                Value::Missing,
            ]
        );
        assert_eq!(table.column("age").unwrap().kind(), ColumnKind::Numeric);
        let ethnicity = table.column("ethnicity").unwrap();
        assert_eq!(ethnicity.kind(), ColumnKind::Categorical);
        assert_eq!(ethnicity.missing_count(), 2);
    }

    #[test]
    fn missing_file() {
        let err = read_table("/definitely/not/here.csv", &Cleaning::default()).unwrap_err();
        assert!(matches!(err, AnalysisError::DataSource { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn ragged_file() {
        let file = fixture("a,b\n1,2\n3\n");
        let err = read_table(file.path(), &Cleaning::default()).unwrap_err();
        assert!(matches!(err, AnalysisError::DataSource { .. }));
    }

    #[test]
    fn absent_configured_columns_are_skipped() {
        let file = fixture("age,hospital_death\n40,0\n");
        let table = read_table(file.path(), &Cleaning::default()).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn load_is_cached() {
        let file = fixture(CSV);
        let loader = DatasetLoader::default();
        assert!(loader.get(file.path()).is_none());
        let first = loader.load(file.path()).unwrap();
        // a change on disk is not picked up
        std::fs::write(file.path(), "age\n1\n").unwrap();
        let second = loader.load(file.path()).unwrap();
        assert!(first.ptr_eq(&second));
        assert_eq!(first, second);
        assert!(loader.get(file.path()).unwrap().ptr_eq(&first));
    }

    #[test]
    fn reading_twice_is_idempotent() {
        let file = fixture(CSV);
        let first = read_table(file.path(), &Cleaning::default()).unwrap();
        let second = read_table(file.path(), &Cleaning::default()).unwrap();
        assert!(!first.ptr_eq(&second));
        assert_eq!(first, second);
    }
}
