//! Cutting the table down to the rows and columns one selection needs.
use crate::{
    error::{AnalysisError, Result},
    table::{Table, Value},
};
use std::collections::BTreeSet;

/// Keep only `columns`, dropping rows with a missing value in any of them.
pub fn select<N>(table: &Table, columns: &[N]) -> Result<Table>
where
    N: AsRef<str>,
{
    Ok(table.project(columns)?.drop_missing())
}

/// Rows where `column` equals `value`, restricted to `projection`, without incomplete rows.
///
/// `column` does not need to be in the projection. A missing `value` matches nothing.
pub fn by_category<N>(table: &Table, column: &str, value: &Value, projection: &[N]) -> Result<Table>
where
    N: AsRef<str>,
{
    // check the projection before doing any work so bad column names are always reported.
    table.project(projection)?;
    let col = table.column(column)?;
    if value.is_missing() {
        return Err(AnalysisError::InvalidArgument(format!(
            "cannot select rows where \"{}\" is missing",
            column
        )));
    }
    let values = col.values();
    let stratum = table.filter(|rec| values[rec.index()] == *value);
    select(&stratum, projection)
}

/// The sorted distinct values of a column, without the missing marker.
pub fn distinct_values(table: &Table, column: &str) -> Result<Vec<Value>> {
    let set: BTreeSet<&Value> = table
        .column(column)?
        .values()
        .iter()
        .filter(|v| !v.is_missing())
        .collect();
    Ok(set.into_iter().cloned().collect())
}
