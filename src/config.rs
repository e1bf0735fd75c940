//! Dashboard settings, read from a TOML file. Every field has a default.
use crate::{
    catalog::{Catalog, CatalogEntry, LabCatalog, LAB_OPERATIONS, PREDICTORS},
    features::AgeBuckets,
    loader::Cleaning,
};
use qu::ick_use::*;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_path: PathBuf,
    /// Column holding the 0/1 death flag.
    pub outcome_column: String,
    pub age_column: String,
    pub cleaning: Cleaning,
    pub age_boundaries: Vec<f64>,
    pub max_bins: usize,
    /// Categorical columns the user can stratify by.
    pub demographic_columns: Vec<String>,
    pub predictors: Vec<CatalogEntry>,
    pub lab_operations: Vec<CatalogEntry>,
    pub early_prefix: String,
    pub late_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_path: "./data/training_v2.csv".into(),
            outcome_column: "hospital_death".into(),
            age_column: "age".into(),
            cleaning: Cleaning::default(),
            age_boundaries: vec![0., 20., 40., 60., 80., 200.],
            max_bins: 30,
            demographic_columns: vec!["ethnicity".into(), "gender".into()],
            predictors: PREDICTORS.clone(),
            lab_operations: LAB_OPERATIONS.clone(),
            early_prefix: "h1_".into(),
            late_prefix: "d1_".into(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        fn inner(path: &Path) -> Result<Config> {
            let text = fs::read_to_string(path)?;
            let config: Config = toml::from_str(&text)?;
            config.check()?;
            Ok(config)
        }
        let path = path.as_ref();
        inner(path).with_context(|| format!("unable to load config from \"{}\"", path.display()))
    }

    /// Catch mistakes that would otherwise only show up on the first query.
    pub fn check(&self) -> Result {
        ensure!(self.max_bins > 0, "max_bins must be at least 1");
        self.age_buckets()?;
        Ok(())
    }

    pub fn age_buckets(&self) -> Result<AgeBuckets> {
        Ok(AgeBuckets::new(&self.age_boundaries)?)
    }

    pub fn predictor_catalog(&self) -> Catalog {
        Catalog::new("predictor", self.predictors.clone())
    }

    pub fn lab_catalog(&self) -> LabCatalog {
        LabCatalog::new(
            self.lab_operations.clone(),
            self.early_prefix.as_str(),
            self.late_prefix.as_str(),
        )
    }
}
