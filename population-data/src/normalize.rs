//! Record normalization: heterogeneous upstream rows → [`DemographicRecord`].
//!
//! Each upstream feed has its own row shape and its own explicit adapter;
//! there is no runtime field probing. Rows missing required fields are
//! dropped and counted, never fatal to the batch.

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::record::{
    DemographicRecord, NATIONAL_STATE, SOURCE_MALAYSIA_API, SOURCE_STATE_PARQUET, TARGET_STATES,
};

/// Outcome counters for one normalization pass.
#[derive(Clone, Copy, Debug, Default)]
pub struct NormalizeReport {
    /// Records that made it into the normalized output.
    pub kept: usize,
    /// Rows dropped for missing/invalid fields.
    pub dropped: usize,
    /// Rows filtered out by the jurisdiction allow-list (state feed only).
    pub filtered: usize,
}

/// Row shape of the national aggregate feed. Arrives without a `state`
/// column; the national designation is forced during normalization.
#[derive(Debug, Deserialize)]
struct RawNationalRow {
    date: String,
    age: String,
    sex: String,
    ethnicity: String,
    population: f64,
}

/// Row shape of the columnar per-state extract.
#[derive(Debug, Deserialize)]
struct RawStateRow {
    state: String,
    date: String,
    age: String,
    sex: String,
    ethnicity: String,
    population: f64,
}

/// Normalizes the national aggregate feed.
///
/// Tags rows with `data_source = "malaysia_api"` and forces
/// `state = "Malaysia"`.
pub fn normalize_national(rows: &[Value]) -> (Vec<DemographicRecord>, NormalizeReport) {
    let mut out = Vec::with_capacity(rows.len());
    let mut report = NormalizeReport::default();

    for row in rows {
        let parsed: RawNationalRow = match serde_json::from_value(row.clone()) {
            Ok(p) => p,
            Err(e) => {
                debug!("Dropping national row: {e}");
                report.dropped += 1;
                continue;
            }
        };
        match build_record(
            NATIONAL_STATE.to_string(),
            &parsed.date,
            parsed.age,
            parsed.sex,
            parsed.ethnicity,
            parsed.population,
            SOURCE_MALAYSIA_API,
        ) {
            Some(rec) => {
                out.push(rec);
                report.kept += 1;
            }
            None => report.dropped += 1,
        }
    }

    summarize("malaysia_api", &report);
    (out, report)
}

/// Normalizes the per-state extract, restricted to [`TARGET_STATES`].
///
/// Tags rows with `data_source = "state_parquet"`.
pub fn normalize_state(rows: &[Value]) -> (Vec<DemographicRecord>, NormalizeReport) {
    let mut out = Vec::with_capacity(rows.len());
    let mut report = NormalizeReport::default();

    for row in rows {
        let parsed: RawStateRow = match serde_json::from_value(row.clone()) {
            Ok(p) => p,
            Err(e) => {
                debug!("Dropping state row: {e}");
                report.dropped += 1;
                continue;
            }
        };
        if !TARGET_STATES.contains(&parsed.state.as_str()) {
            report.filtered += 1;
            continue;
        }
        match build_record(
            parsed.state,
            &parsed.date,
            parsed.age,
            parsed.sex,
            parsed.ethnicity,
            parsed.population,
            SOURCE_STATE_PARQUET,
        ) {
            Some(rec) => {
                out.push(rec);
                report.kept += 1;
            }
            None => report.dropped += 1,
        }
    }

    summarize("state_parquet", &report);
    (out, report)
}

fn summarize(feed: &str, report: &NormalizeReport) {
    if report.dropped > 0 {
        warn!(
            "Normalized {feed}: kept={} dropped={} filtered={}",
            report.kept, report.dropped, report.filtered
        );
    } else {
        debug!(
            "Normalized {feed}: kept={} filtered={}",
            report.kept, report.filtered
        );
    }
}

fn build_record(
    state: String,
    date: &str,
    age: String,
    sex: String,
    ethnicity: String,
    population: f64,
    data_source: &str,
) -> Option<DemographicRecord> {
    let date = parse_date(date)?;
    if !population.is_finite() || population < 0.0 {
        return None;
    }
    Some(DemographicRecord {
        state,
        date,
        age,
        sex,
        ethnicity,
        population,
        data_source: data_source.to_string(),
    })
}

/// Coerces upstream date representations to a calendar date.
///
/// Accepts plain `YYYY-MM-DD` and timestamp strings with a date prefix
/// (the state extract serializes midnight timestamps).
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let prefix = raw.get(..10)?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn national_rows_get_state_and_source_forced() {
        let rows = vec![json!({
            "date": "2023-01-01",
            "age": "overall",
            "sex": "both",
            "ethnicity": "overall",
            "population": 33000.0
        })];
        let (recs, report) = normalize_national(&rows);
        assert_eq!(report.kept, 1);
        assert_eq!(recs[0].state, "Malaysia");
        assert_eq!(recs[0].data_source, "malaysia_api");
        assert_eq!(recs[0].year(), 2023);
    }

    #[test]
    fn state_rows_outside_allow_list_are_filtered() {
        let mk = |state: &str| {
            json!({
                "state": state,
                "date": "2023-01-01T00:00:00",
                "age": "overall",
                "sex": "both",
                "ethnicity": "overall",
                "population": 100.0
            })
        };
        let rows = vec![mk("Kedah"), mk("Johor"), mk("Selangor")];
        let (recs, report) = normalize_state(&rows);
        assert_eq!(report.kept, 2);
        assert_eq!(report.filtered, 1);
        assert!(recs.iter().all(|r| r.state != "Johor"));
    }

    #[test]
    fn malformed_rows_are_dropped_not_fatal() {
        let rows = vec![
            json!({"date": "2023-01-01"}),
            json!({
                "date": "not-a-date",
                "age": "overall",
                "sex": "both",
                "ethnicity": "overall",
                "population": 1.0
            }),
            json!({
                "date": "2023-01-01",
                "age": "overall",
                "sex": "both",
                "ethnicity": "overall",
                "population": -5.0
            }),
            json!({
                "date": "2023-01-01",
                "age": "overall",
                "sex": "both",
                "ethnicity": "overall",
                "population": 1.0
            }),
        ];
        let (recs, report) = normalize_national(&rows);
        assert_eq!(recs.len(), 1);
        assert_eq!(report.dropped, 3);
    }
}
