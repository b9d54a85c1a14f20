//! Core data model: one normalized row of source data.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Sentinel age/ethnicity label denoting an aggregate row rather than a
/// specific demographic subgroup.
pub const OVERALL: &str = "overall";

/// Sentinel sex label denoting the aggregate over both sexes.
pub const BOTH_SEXES: &str = "both";

/// State designation assigned to the national aggregate feed.
pub const NATIONAL_STATE: &str = "Malaysia";

/// Jurisdictions kept from the columnar per-state extract.
pub const TARGET_STATES: &[&str] = &["Kedah", "Selangor"];

/// Provenance tag for the national aggregate feed.
pub const SOURCE_MALAYSIA_API: &str = "malaysia_api";

/// Provenance tag for the columnar per-state extract.
pub const SOURCE_STATE_PARQUET: &str = "state_parquet";

/// One row of normalized source data.
///
/// `age`, `sex`, and `ethnicity` carry either a category label or a
/// sentinel ([`OVERALL`], [`BOTH_SEXES`]). Sentinel rows are aggregates and
/// must be excluded when iterating finer-grained categories, otherwise
/// totals double-count.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DemographicRecord {
    pub state: String,
    pub date: NaiveDate,
    pub age: String,
    pub sex: String,
    pub ethnicity: String,
    /// Population count in thousands, non-negative.
    pub population: f64,
    pub data_source: String,
}

impl DemographicRecord {
    /// Calendar year derived from the record date.
    pub fn year(&self) -> i32 {
        self.date.year()
    }

    /// True for the aggregate total row (all three sentinel labels).
    pub fn is_overall_total(&self) -> bool {
        self.age == OVERALL && self.sex == BOTH_SEXES && self.ethnicity == OVERALL
    }
}
