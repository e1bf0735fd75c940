use crate::ArcStr;
use std::path::PathBuf;

pub type Result<T, E = AnalysisError> = std::result::Result<T, E>;

/// Everything that can go wrong between reading the admissions file and answering a selection.
///
/// Only `DataSource` is fatal: it means there is no table to work with. The rest are scoped to the
/// query that raised them and should be shown to the user as a message.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("unable to load data from \"{}\"", path.display())]
    DataSource {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("{0}")]
    DataFormat(String),
    /// The UI should only ever offer labels from the catalog, so this is a bug in the caller.
    #[error("unknown {catalog} \"{label}\"")]
    Lookup { catalog: &'static str, label: String },
    #[error("column \"{column}\" has {count} value(s) outside {{0, 1}} (first seen: {first})")]
    InvalidOutcome {
        column: ArcStr,
        count: usize,
        first: String,
    },
    #[error("not enough data for this selection (sample {sample} has {count} observation(s))")]
    InsufficientData { sample: char, count: usize },
    #[error("{0}")]
    InvalidArgument(String),
}

impl AnalysisError {
    pub(crate) fn missing_column(name: &str) -> Self {
        AnalysisError::DataFormat(format!("expected column \"{}\" is not in the table", name))
    }

    pub(crate) fn not_numeric(name: &str) -> Self {
        AnalysisError::DataFormat(format!("column \"{}\" is not numeric", name))
    }

    /// Whether the dashboard can carry on after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AnalysisError::DataSource { .. })
    }

    /// The text shown in place of a chart when a query fails.
    pub fn user_message(&self) -> String {
        match self {
            AnalysisError::InsufficientData { .. } => {
                "not enough data for this selection".to_string()
            }
            other => other.to_string(),
        }
    }
}
