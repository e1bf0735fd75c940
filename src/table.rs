//! An immutable, column-oriented table of admissions.
//!
//! The schema is whatever the input file has, so cells are dynamically typed [`Value`]s. Columns
//! are reference counted: deriving a working set from a table only copies the columns it changes.
use crate::{
    error::{AnalysisError, Result},
    ArcStr,
};
use noisy_float::prelude::*;
use serde::{Serialize, Serializer};
use std::{collections::BTreeMap, fmt, sync::Arc};

/// A single cell.
///
/// Ordering is total: `Missing` sorts first, numbers numerically, buckets by their position and
/// text lexicographically. This is what makes distinct values and counts come out in a stable order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Value {
    Missing,
    /// Always finite. Anything else is stored as `Missing`.
    Number(R64),
    Bucket(Bucket),
    Text(ArcStr),
}

impl Value {
    /// Make a number, mapping NaN and infinities to `Missing`.
    pub fn number(v: f64) -> Self {
        match R64::try_new(v) {
            Some(v) => Value::Number(v),
            None => Value::Missing,
        }
    }

    pub fn text(s: impl Into<ArcStr>) -> Self {
        Value::Text(s.into())
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(v) => Some(v.raw()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Bucket(b) => Some(&b.label),
            _ => None,
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::number(v)
    }
}

impl From<Option<f64>> for Value {
    fn from(v: Option<f64>) -> Self {
        v.map(Value::number).unwrap_or(Value::Missing)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.into())
    }
}

impl From<Bucket> for Value {
    fn from(b: Bucket) -> Self {
        Value::Bucket(b)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Missing => f.write_str("missing"),
            Value::Number(v) => fmt::Display::fmt(v, f),
            Value::Bucket(b) => f.write_str(&b.label),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Missing => s.serialize_none(),
            Value::Number(v) => s.serialize_f64(v.raw()),
            Value::Bucket(b) => s.serialize_str(&b.label),
            Value::Text(t) => s.serialize_str(t),
        }
    }
}

/// A level of an ordered categorical variable (e.g. an age group).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Bucket {
    /// Position of the level, which is what it sorts by.
    pub index: usize,
    pub label: ArcStr,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum ColumnKind {
    Numeric,
    Categorical,
    Ordinal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: ArcStr,
    kind: ColumnKind,
    values: Arc<[Value]>,
}

impl Column {
    /// The kind is inferred from the values. A column with no values present is numeric.
    pub fn new(name: impl Into<ArcStr>, values: Vec<Value>) -> Self {
        let kind = if values.iter().any(|v| matches!(v, Value::Text(_))) {
            ColumnKind::Categorical
        } else if values.iter().any(|v| matches!(v, Value::Bucket(_))) {
            ColumnKind::Ordinal
        } else {
            ColumnKind::Numeric
        };
        Column {
            name: name.into(),
            kind,
            values: values.into(),
        }
    }

    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_missing()).count()
    }

    /// Iterate over the numeric cells, `None` for missing ones.
    ///
    /// Fails if the column holds anything other than numbers.
    pub fn numbers(&self) -> Result<impl Iterator<Item = Option<f64>> + '_> {
        if self.kind != ColumnKind::Numeric {
            return Err(AnalysisError::not_numeric(&self.name));
        }
        Ok(self.values.iter().map(Value::as_f64))
    }

    fn take(&self, idxs: &[usize]) -> Column {
        Column {
            name: self.name.clone(),
            kind: self.kind,
            values: idxs.iter().map(|idx| self.values[*idx].clone()).collect(),
        }
    }
}

/// The parsed table, with a pre-built index for column names.
#[derive(Debug, Clone)]
pub struct Table {
    columns: Arc<Vec<Column>>,
    name_idx: BTreeMap<ArcStr, usize>,
    len: usize,
}

impl Table {
    /// Columns must have distinct names and the same length.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let len = columns.first().map(|col| col.values.len()).unwrap_or(0);
        if let Some(col) = columns.iter().find(|col| col.values.len() != len) {
            return Err(AnalysisError::DataFormat(format!(
                "column \"{}\" has {} rows, expected {}",
                col.name,
                col.values.len(),
                len
            )));
        }
        let mut this = Table {
            columns: Arc::new(columns),
            name_idx: BTreeMap::new(),
            len,
        };
        this.rebuild_index()?;
        Ok(this)
    }

    /// Build a table from rows. Every row must have one value per name.
    pub fn from_rows<N>(names: &[N], rows: Vec<Vec<Value>>) -> Result<Self>
    where
        N: AsRef<str>,
    {
        let mut cols: Vec<Vec<Value>> = vec![Vec::with_capacity(rows.len()); names.len()];
        for (idx, row) in rows.into_iter().enumerate() {
            if row.len() != names.len() {
                return Err(AnalysisError::DataFormat(format!(
                    "row {} has {} fields, expected {}",
                    idx,
                    row.len(),
                    names.len()
                )));
            }
            for (col, value) in cols.iter_mut().zip(row) {
                col.push(value);
            }
        }
        Table::new(
            names
                .iter()
                .zip(cols)
                .map(|(name, values)| Column::new(name.as_ref(), values))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.name_idx.contains_key(name)
    }

    pub fn column(&self, name: &str) -> Result<&Column> {
        let idx = self
            .name_idx
            .get(name)
            .ok_or_else(|| AnalysisError::missing_column(name))?;
        Ok(&self.columns[*idx])
    }

    pub fn records(&self) -> impl Iterator<Item = Record<'_>> + '_ {
        (0..self.len).map(move |idx| Record { table: self, idx })
    }

    /// Whether two handles share the same storage.
    pub fn ptr_eq(&self, other: &Table) -> bool {
        Arc::ptr_eq(&self.columns, &other.columns)
    }

    /// Keep only the named columns, in the order given.
    pub fn project<N>(&self, names: &[N]) -> Result<Table>
    where
        N: AsRef<str>,
    {
        let columns = names
            .iter()
            .map(|name| self.column(name.as_ref()).cloned())
            .collect::<Result<Vec<_>>>()?;
        Table::new(columns)
    }

    /// Remove every row with a missing value in any column.
    pub fn drop_missing(&self) -> Table {
        let keep: Vec<usize> = (0..self.len)
            .filter(|idx| self.columns.iter().all(|col| !col.values[*idx].is_missing()))
            .collect();
        self.take_rows(&keep)
    }

    /// Get a table containing only the rows that match the filter.
    pub fn filter(&self, f: impl Fn(&Record) -> bool) -> Table {
        let keep: Vec<usize> = self
            .records()
            .filter(|rec| f(rec))
            .map(|rec| rec.idx)
            .collect();
        self.take_rows(&keep)
    }

    /// Add a column at the end, or replace the existing column with the same name in place.
    pub fn with_column(&self, column: Column) -> Result<Table> {
        if column.values.len() != self.len {
            return Err(AnalysisError::DataFormat(format!(
                "column \"{}\" has {} rows, expected {}",
                column.name,
                column.values.len(),
                self.len
            )));
        }
        let mut columns: Vec<Column> = self.columns.to_vec();
        match self.name_idx.get(&column.name) {
            Some(idx) => columns[*idx] = column,
            None => columns.push(column),
        }
        Table::new(columns)
    }

    fn take_rows(&self, idxs: &[usize]) -> Table {
        if idxs.len() == self.len {
            return self.clone();
        }
        Table {
            columns: Arc::new(self.columns.iter().map(|col| col.take(idxs)).collect()),
            name_idx: self.name_idx.clone(),
            len: idxs.len(),
        }
    }

    fn rebuild_index(&mut self) -> Result<()> {
        self.name_idx.clear();
        for (idx, col) in self.columns.iter().enumerate() {
            if self.name_idx.insert(col.name.clone(), idx).is_some() {
                return Err(AnalysisError::DataFormat(format!(
                    "column \"{}\" appears more than once",
                    col.name
                )));
            }
        }
        Ok(())
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.columns == other.columns
    }
}

/// One row of a table.
#[derive(Copy, Clone)]
pub struct Record<'a> {
    table: &'a Table,
    idx: usize,
}

impl<'a> Record<'a> {
    pub fn index(&self) -> usize {
        self.idx
    }

    /// `None` if the table has no such column.
    pub fn get(&self, name: &str) -> Option<&'a Value> {
        let col = self.table.column(name).ok()?;
        Some(&col.values[self.idx])
    }
}
