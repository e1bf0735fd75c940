//! Exploratory analysis of ICU admissions: who died in hospital, and how that relates to their
//! demographics, their predictors and the change in their lab values over the first day.
//!
//! The table is loaded and cleaned once by a [`DatasetLoader`]. Every dashboard section is then a
//! pure function of that table and a [`Selection`], see [`Dashboard`].
pub mod aggregate;
pub mod catalog;
pub mod cohort;
pub mod compare;
pub mod config;
mod error;
pub mod features;
pub mod loader;
pub mod query;
mod range;
pub mod table;

use std::sync::Arc;

pub use crate::{
    aggregate::{Bins, GroupedCount, HistogramBin},
    catalog::{Catalog, CatalogEntry, LabCatalog, LabPair},
    compare::{compare, Comparison, MannWhitneyMethod},
    config::Config,
    error::{AnalysisError, Result},
    features::{AgeBuckets, Outcome},
    loader::{Cleaning, DatasetLoader},
    query::{Dashboard, QueryResult, Response, Rows, Selection, Stratum},
    range::{Range, RangeSet, RangeSetCountsWithMissing},
    table::{Column, ColumnKind, Table, Value},
};

pub type ArcStr = Arc<str>;

/// Print a section heading, underlined.
pub fn header(header: &str) {
    println!("\n{}\n{}\n", header, "=".repeat(header.chars().count()));
}
