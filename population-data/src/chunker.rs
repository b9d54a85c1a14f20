//! Year-State-Demographic chunking.
//!
//! Groups normalized records by `(year, state)` and synthesizes exactly one
//! retrieval chunk per group: a human-readable text block plus structured
//! metadata with gender/age/ethnicity breakdowns. Chunks are immutable and
//! content-stable across re-runs; re-ingestion supersedes rather than
//! mutates them.

use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::record::{BOTH_SEXES, DemographicRecord, OVERALL};

/// Demographic breakdowns for one `(year, state)` group.
///
/// Sentinel labels (`"overall"`, `"both"`) are aggregate rows and never
/// appear as keys here.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Demographics {
    pub gender_breakdown: BTreeMap<String, f64>,
    pub age_breakdown: BTreeMap<String, f64>,
    pub ethnicity_breakdown: BTreeMap<String, f64>,
}

/// Structured payload metadata persisted alongside the chunk text.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub chunk_id: String,
    pub state: String,
    pub year: i32,
    pub total_population: f64,
    pub data_points: usize,
    pub data_source: String,
    pub demographics: Demographics,
    pub age_groups: Vec<String>,
    pub sex_categories: Vec<String>,
    pub ethnicity_categories: Vec<String>,
    /// ISO-8601 timestamp of the ingestion run that produced the chunk.
    pub ingestion_timestamp: String,
}

/// The unit of retrieval: one `(state, year)` population snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Chunk {
    /// Deterministic identity: `{state}_{year}`.
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// Counters for one chunking pass.
#[derive(Clone, Copy, Debug, Default)]
pub struct ChunkReport {
    /// Chunks emitted (one per distinct `(year, state)`).
    pub chunks: usize,
    /// Groups without an overall total row; emitted with total 0.
    pub degenerate_groups: usize,
    /// Duplicate rows that were averaged into one value.
    pub averaged_duplicates: usize,
}

/// Groups records by `(year, state)` and emits one chunk per group.
///
/// Group order is deterministic (year, then state), so output is stable
/// for unchanged input.
pub fn chunk_records(records: &[DemographicRecord]) -> (Vec<Chunk>, ChunkReport) {
    let mut groups: BTreeMap<(i32, String), Vec<&DemographicRecord>> = BTreeMap::new();
    for rec in records {
        groups
            .entry((rec.year(), rec.state.clone()))
            .or_default()
            .push(rec);
    }

    let mut report = ChunkReport::default();
    let mut chunks = Vec::with_capacity(groups.len());
    for ((year, state), group) in &groups {
        chunks.push(chunk_group(&state, *year, group, &mut report));
        report.chunks += 1;
    }

    info!(
        "Created {} chunks ({} degenerate, {} duplicate rows averaged)",
        report.chunks, report.degenerate_groups, report.averaged_duplicates
    );
    (chunks, report)
}

/// Builds the chunk for one `(year, state)` group.
fn chunk_group(
    state: &str,
    year: i32,
    group: &[&DemographicRecord],
    report: &mut ChunkReport,
) -> Chunk {
    let total_population = match averaged(
        group.iter().filter(|r| r.is_overall_total()),
        report,
        state,
        year,
    ) {
        Some(total) => total,
        None => {
            // Degenerate chunk: still emitted, flagged by total 0.
            warn!("No overall total row for {state} {year}");
            report.degenerate_groups += 1;
            0.0
        }
    };

    let demographics = build_breakdowns(group, report, state, year);

    let text = render_text(state, year, total_population, &demographics, group);
    let chunk_id = format!("{state}_{year}");
    debug!("Chunk {chunk_id}: total={total_population} points={}", group.len());

    let metadata = ChunkMetadata {
        chunk_id: chunk_id.clone(),
        state: state.to_string(),
        year,
        total_population,
        data_points: group.len(),
        data_source: group
            .first()
            .map(|r| r.data_source.clone())
            .unwrap_or_else(|| "Unknown".to_string()),
        age_groups: demographics.age_breakdown.keys().cloned().collect(),
        sex_categories: demographics.gender_breakdown.keys().cloned().collect(),
        ethnicity_categories: demographics.ethnicity_breakdown.keys().cloned().collect(),
        demographics,
        ingestion_timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    };

    Chunk {
        id: chunk_id,
        text,
        metadata,
    }
}

/// Builds the three breakdown maps, excluding sentinel labels so aggregate
/// rows never double-count against their own categories.
fn build_breakdowns(
    group: &[&DemographicRecord],
    report: &mut ChunkReport,
    state: &str,
    year: i32,
) -> Demographics {
    let mut demographics = Demographics::default();

    // Gender: overall age, overall ethnicity, one value per sex label.
    accumulate(
        group
            .iter()
            .filter(|r| r.age == OVERALL && r.ethnicity == OVERALL && r.sex != BOTH_SEXES)
            .map(|r| (r.sex.as_str(), r.population)),
        &mut demographics.gender_breakdown,
        report,
        state,
        year,
    );

    // Age: both sexes, overall ethnicity, excluding the overall age row.
    accumulate(
        group
            .iter()
            .filter(|r| r.sex == BOTH_SEXES && r.ethnicity == OVERALL && r.age != OVERALL)
            .map(|r| (r.age.as_str(), r.population)),
        &mut demographics.age_breakdown,
        report,
        state,
        year,
    );

    // Ethnicity: both sexes, overall age, excluding the overall ethnicity row.
    accumulate(
        group
            .iter()
            .filter(|r| r.sex == BOTH_SEXES && r.age == OVERALL && r.ethnicity != OVERALL)
            .map(|r| (r.ethnicity.as_str(), r.population)),
        &mut demographics.ethnicity_breakdown,
        report,
        state,
        year,
    );

    demographics
}

/// Averages duplicate rows into one value per key.
///
/// Source data occasionally repeats a `(age, sex, ethnicity)` combination;
/// picking an arbitrary row would make output depend on feed order.
fn accumulate<'a>(
    entries: impl Iterator<Item = (&'a str, f64)>,
    out: &mut BTreeMap<String, f64>,
    report: &mut ChunkReport,
    state: &str,
    year: i32,
) {
    let mut sums: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for (key, value) in entries {
        let slot = sums.entry(key).or_insert((0.0, 0));
        slot.0 += value;
        slot.1 += 1;
    }
    for (key, (sum, count)) in sums {
        if count > 1 {
            warn!("Averaging {count} duplicate rows for {key} in {state} {year}");
            report.averaged_duplicates += count - 1;
        }
        out.insert(key.to_string(), sum / count as f64);
    }
}

/// Averages duplicates of a single selection (the overall total row).
fn averaged<'a>(
    rows: impl Iterator<Item = &'a &'a DemographicRecord>,
    report: &mut ChunkReport,
    state: &str,
    year: i32,
) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for row in rows {
        sum += row.population;
        count += 1;
    }
    if count == 0 {
        return None;
    }
    if count > 1 {
        warn!("Averaging {count} duplicate total rows for {state} {year}");
        report.averaged_duplicates += count - 1;
    }
    Some(sum / count as f64)
}

/// Renders the fixed descriptive template used for embedding.
fn render_text(
    state: &str,
    year: i32,
    total: f64,
    demographics: &Demographics,
    group: &[&DemographicRecord],
) -> String {
    let mut text = format!(
        "Population data for {state} in {year}.\n\n\
         Total population: {} thousand people.\n\n\
         Gender Breakdown:\n",
        fmt_thousands(total)
    );

    for (gender, pop) in &demographics.gender_breakdown {
        text.push_str(&format!(
            "- {}: {}k ({:.1}%)\n",
            title_case(gender),
            fmt_thousands(*pop),
            percentage(*pop, total)
        ));
    }

    text.push_str("\nAge Distribution:\n");
    for (age_group, pop) in &demographics.age_breakdown {
        text.push_str(&format!(
            "- {}: {}k ({:.1}%)\n",
            age_group,
            fmt_thousands(*pop),
            percentage(*pop, total)
        ));
    }

    text.push_str("\nEthnic Composition:\n");
    for (ethnicity, pop) in &demographics.ethnicity_breakdown {
        text.push_str(&format!(
            "- {}: {}k ({:.1}%)\n",
            title_case(&ethnicity.replace('_', " ")),
            fmt_thousands(*pop),
            percentage(*pop, total)
        ));
    }

    let data_source = group
        .first()
        .map(|r| r.data_source.as_str())
        .unwrap_or("Unknown");
    text.push_str(&format!("\nData source: {data_source}"));
    text.push_str(&format!("\nCoverage: {} demographic data points", group.len()));

    text
}

/// Share of `part` in `total`, as a percentage. A zero total would divide
/// by zero; degenerate chunks report 0.0% instead.
fn percentage(part: f64, total: f64) -> f64 {
    if total > 0.0 { part / total * 100.0 } else { 0.0 }
}

/// Formats a count in thousands with comma grouping and one decimal,
/// e.g. `33000.0` → `"33,000.0"`.
fn fmt_thousands(value: f64) -> String {
    let formatted = format!("{value:.1}");
    let (int_part, frac_part) = formatted
        .split_once('.')
        .unwrap_or((formatted.as_str(), "0"));
    let (sign, digits) = int_part
        .strip_prefix('-')
        .map_or(("", int_part), |rest| ("-", rest));

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}{grouped}.{frac_part}")
}

/// Capitalizes the first letter of each whitespace-separated word.
fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn rec(
        state: &str,
        year: i32,
        age: &str,
        sex: &str,
        ethnicity: &str,
        population: f64,
    ) -> DemographicRecord {
        DemographicRecord {
            state: state.to_string(),
            date: NaiveDate::from_ymd_opt(year, 1, 1).unwrap(),
            age: age.to_string(),
            sex: sex.to_string(),
            ethnicity: ethnicity.to_string(),
            population,
            data_source: "malaysia_api".to_string(),
        }
    }

    fn sample_group() -> Vec<DemographicRecord> {
        vec![
            rec("Malaysia", 2023, "overall", "both", "overall", 33000.0),
            rec("Malaysia", 2023, "overall", "male", "overall", 17000.0),
            rec("Malaysia", 2023, "overall", "female", "overall", 16000.0),
            rec("Malaysia", 2023, "0-14", "both", "overall", 8000.0),
            rec("Malaysia", 2023, "15-64", "both", "overall", 22000.0),
            rec("Malaysia", 2023, "65+", "both", "overall", 3000.0),
            rec("Malaysia", 2023, "overall", "both", "bumi_malay", 18000.0),
            rec("Malaysia", 2023, "overall", "both", "chinese", 7000.0),
            rec("Malaysia", 2023, "overall", "both", "indian", 2000.0),
            rec("Malaysia", 2023, "overall", "both", "other_citizen", 6000.0),
        ]
    }

    #[test]
    fn one_chunk_per_year_state_group() {
        let mut records = sample_group();
        records.push(rec("Kedah", 2023, "overall", "both", "overall", 2200.0));
        records.push(rec("Kedah", 2022, "overall", "both", "overall", 2150.0));

        let (chunks, report) = chunk_records(&records);
        assert_eq!(chunks.len(), 3);
        assert_eq!(report.chunks, 3);
        let ids: Vec<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
        assert!(ids.contains(&"Malaysia_2023"));
        assert!(ids.contains(&"Kedah_2023"));
        assert!(ids.contains(&"Kedah_2022"));
    }

    #[test]
    fn breakdowns_never_contain_sentinel_keys() {
        let (chunks, _) = chunk_records(&sample_group());
        let demo = &chunks[0].metadata.demographics;
        assert!(!demo.gender_breakdown.contains_key("both"));
        assert!(!demo.age_breakdown.contains_key("overall"));
        assert!(!demo.ethnicity_breakdown.contains_key("overall"));
        assert_eq!(demo.gender_breakdown.len(), 2);
        assert_eq!(demo.age_breakdown.len(), 3);
        assert_eq!(demo.ethnicity_breakdown.len(), 4);
    }

    #[test]
    fn breakdown_percentages_sum_to_roughly_100() {
        let (chunks, _) = chunk_records(&sample_group());
        let meta = &chunks[0].metadata;
        let total = meta.total_population;
        for breakdown in [
            &meta.demographics.gender_breakdown,
            &meta.demographics.age_breakdown,
            &meta.demographics.ethnicity_breakdown,
        ] {
            let sum: f64 = breakdown.values().map(|v| v / total * 100.0).sum();
            assert!((sum - 100.0).abs() < 0.01, "percentages sum to {sum}");
        }
    }

    #[test]
    fn missing_total_row_yields_degenerate_chunk_without_panicking() {
        let records = vec![
            rec("Kedah", 2020, "0-14", "both", "overall", 600.0),
            rec("Kedah", 2020, "15-64", "both", "overall", 1400.0),
        ];
        let (chunks, report) = chunk_records(&records);
        assert_eq!(chunks.len(), 1);
        assert_eq!(report.degenerate_groups, 1);
        assert_eq!(chunks[0].metadata.total_population, 0.0);
        // Division guard: 0.0% instead of NaN/inf.
        assert!(chunks[0].text.contains("(0.0%)"));
        assert!(!chunks[0].text.contains("NaN"));
    }

    #[test]
    fn duplicate_rows_are_averaged() {
        let mut records = sample_group();
        records.push(rec("Malaysia", 2023, "overall", "male", "overall", 19000.0));

        let (chunks, report) = chunk_records(&records);
        assert_eq!(report.averaged_duplicates, 1);
        let male = chunks[0].metadata.demographics.gender_breakdown["male"];
        assert!((male - 18000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn text_template_has_expected_sections_and_footers() {
        let (chunks, _) = chunk_records(&sample_group());
        let text = &chunks[0].text;
        assert!(text.starts_with("Population data for Malaysia in 2023."));
        assert!(text.contains("Total population: 33,000.0 thousand people."));
        assert!(text.contains("Gender Breakdown:\n- Female: 16,000.0k (48.5%)"));
        assert!(text.contains("Age Distribution:"));
        assert!(text.contains("Ethnic Composition:\n- Bumi Malay: 18,000.0k"));
        assert!(text.contains("Data source: malaysia_api"));
        assert!(text.contains("Coverage: 10 demographic data points"));
    }

    #[test]
    fn re_chunking_unchanged_input_is_content_stable() {
        let records = sample_group();
        let (first, _) = chunk_records(&records);
        let (second, _) = chunk_records(&records);
        assert_eq!(first[0].id, second[0].id);
        assert_eq!(first[0].text, second[0].text);
    }

    #[test]
    fn thousands_formatting() {
        assert_eq!(fmt_thousands(33000.0), "33,000.0");
        assert_eq!(fmt_thousands(950.25), "950.2");
        assert_eq!(fmt_thousands(1234567.89), "1,234,567.9");
        assert_eq!(fmt_thousands(0.0), "0.0");
    }
}
