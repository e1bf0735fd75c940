//! Lookups from the labels offered to the user to the columns they refer to.
use crate::{
    error::{AnalysisError, Result},
    ArcStr,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The numeric predictors offered by default.
pub static PREDICTORS: Lazy<Vec<CatalogEntry>> = Lazy::new(|| {
    entries(&[
        ("Age", "age"),
        ("Body Mass Index (BMI)", "bmi"),
        ("Day 1 Mean Blood Pressure (max)", "d1_mbp_max"),
        ("Day 1 Temperature (max)", "d1_temp_max"),
        (
            "APACHE IV Hospital Death Probability",
            "apache_4a_hospital_death_prob",
        ),
        ("APACHE IV ICU Death Probability", "apache_4a_icu_death_prob"),
        ("Pre-ICU Length of Stay (days)", "pre_icu_los_days"),
        ("APACHE Creatinine", "creatinine_apache"),
        ("APACHE BUN", "bun_apache"),
        ("APACHE FiO₂", "fio2_apache"),
        ("APACHE Glucose", "glucose_apache"),
        ("APACHE Heart Rate", "heart_rate_apache"),
    ])
});

/// The lab operations offered by default. The column here is the base name shared by the first
/// hour (`h1_`) and first day (`d1_`) measurements.
pub static LAB_OPERATIONS: Lazy<Vec<CatalogEntry>> = Lazy::new(|| {
    entries(&[
        ("Albumin (min)", "albumin_min"),
        ("Bilirubin (max)", "bilirubin_max"),
        ("BUN (max)", "bun_max"),
        ("Calcium (min)", "calcium_min"),
        ("Creatinine (max)", "creatinine_max"),
        ("Glucose (max)", "glucose_max"),
        ("HCO₃ (min)", "hco3_min"),
        // sic: the dataset spells it this way
        ("Haemoglobin (min)", "hemaglobin_min"),
        ("Haematocrit (min)", "hematocrit_min"),
        ("INR (max)", "inr_max"),
        ("Lactate (max)", "lactate_max"),
        ("Platelets (min)", "platelets_min"),
        ("Potassium (max)", "potassium_max"),
        ("Sodium (max)", "sodium_max"),
        ("WBC (max)", "wbc_max"),
        ("Arterial pH (min)", "arterial_ph_min"),
        ("PaO₂/FiO₂ ratio (min)", "pao2fio2ratio_min"),
    ])
});

fn entries(pairs: &[(&str, &str)]) -> Vec<CatalogEntry> {
    pairs
        .iter()
        .map(|(label, column)| CatalogEntry {
            label: (*label).into(),
            column: (*column).into(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub label: ArcStr,
    pub column: ArcStr,
}

/// An ordered list of `(label, column)` entries, with a pre-built index for labels.
#[derive(Debug, Clone)]
pub struct Catalog {
    kind: &'static str,
    entries: Vec<CatalogEntry>,
    label_idx: BTreeMap<ArcStr, usize>,
}

impl Catalog {
    /// `kind` names the catalog in lookup errors. If a label appears twice the first entry wins.
    pub fn new(kind: &'static str, entries: Vec<CatalogEntry>) -> Self {
        let mut label_idx = BTreeMap::new();
        for (idx, entry) in entries.iter().enumerate() {
            label_idx.entry(entry.label.clone()).or_insert(idx);
        }
        Catalog {
            kind,
            entries,
            label_idx,
        }
    }

    pub fn predictors() -> Self {
        Catalog::new("predictor", PREDICTORS.clone())
    }

    /// Labels in the order they should be offered.
    pub fn labels(&self) -> impl Iterator<Item = &ArcStr> + '_ {
        self.entries.iter().map(|entry| &entry.label)
    }

    pub fn resolve(&self, label: &str) -> Result<&ArcStr> {
        let idx = self
            .label_idx
            .get(label)
            .ok_or_else(|| AnalysisError::Lookup {
                catalog: self.kind,
                label: label.to_string(),
            })?;
        Ok(&self.entries[*idx].column)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The two columns measuring the same thing at different times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabPair {
    pub base: ArcStr,
    pub early: ArcStr,
    pub late: ArcStr,
}

/// Lab operations, resolved to a pair of columns by prefixing the base name.
#[derive(Debug, Clone)]
pub struct LabCatalog {
    catalog: Catalog,
    early_prefix: ArcStr,
    late_prefix: ArcStr,
}

impl LabCatalog {
    pub fn new(
        entries: Vec<CatalogEntry>,
        early_prefix: impl Into<ArcStr>,
        late_prefix: impl Into<ArcStr>,
    ) -> Self {
        LabCatalog {
            catalog: Catalog::new("lab operation", entries),
            early_prefix: early_prefix.into(),
            late_prefix: late_prefix.into(),
        }
    }

    pub fn labels(&self) -> impl Iterator<Item = &ArcStr> + '_ {
        self.catalog.labels()
    }

    pub fn resolve(&self, label: &str) -> Result<LabPair> {
        let base = self.catalog.resolve(label)?;
        Ok(LabPair {
            base: base.clone(),
            early: format!("{}{}", self.early_prefix, base).into(),
            late: format!("{}{}", self.late_prefix, base).into(),
        })
    }
}

impl Default for LabCatalog {
    fn default() -> Self {
        LabCatalog::new(LAB_OPERATIONS.clone(), "h1_", "d1_")
    }
}
