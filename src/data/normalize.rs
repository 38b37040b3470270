//! Schema normalization: raw CSV text → canonical typed rows.
//!
//! Per family the normalizer renames headers, rewrites mis-encoded
//! categorical labels, parses the date column and coerces metric cells.
//! A family is either normalized completely or not at all: a missing column
//! or a single unparsable date fails the whole pass.

use std::collections::{BTreeMap, HashMap};

use super::dates::parse_date;
use super::error::{DataError, Result};
use super::family::FamilyRules;
use super::loader::{RawRecord, RawTable};
use super::model::{Dimension, Metric, NormalizedDataset, NormalizedRow};

/// Normalize one raw table into a sorted dataset.
pub fn normalize(raw: &RawTable, rules: &FamilyRules) -> Result<NormalizedDataset> {
    let rows = normalize_rows(raw, rules)?;
    Ok(NormalizedDataset::from_rows(rules, rows))
}

/// Normalize one raw table into rows, still in source order.
pub(crate) fn normalize_rows(raw: &RawTable, rules: &FamilyRules) -> Result<Vec<NormalizedRow>> {
    let layout = ColumnLayout::resolve(raw, rules)?;
    raw.records
        .iter()
        .map(|record| layout.row(record, rules))
        .collect()
}

/// Positions of the canonical columns within one raw table.
struct ColumnLayout {
    date: usize,
    dimensions: Vec<(Dimension, usize)>,
    metrics: Vec<(Metric, usize)>,
}

impl ColumnLayout {
    fn resolve(raw: &RawTable, rules: &FamilyRules) -> Result<Self> {
        let mut positions: HashMap<&str, usize> = HashMap::new();
        for (idx, header) in raw.headers.iter().enumerate() {
            let canonical = rules.canonical_column(header);
            if let Some(&first) = positions.get(canonical) {
                log::warn!(
                    "{}: header '{}' duplicates column '{}' (position {}), keeping the first",
                    rules.id,
                    header,
                    canonical,
                    first
                );
                continue;
            }
            positions.insert(canonical, idx);
        }

        let find = |column: &str| {
            positions
                .get(column)
                .copied()
                .ok_or_else(|| DataError::MissingColumn {
                    family: rules.id,
                    column: column.to_string(),
                })
        };

        let date = find(&rules.date_column)?;
        let dimensions = rules
            .dimensions()
            .map(|d| find(d.column()).map(|idx| (d, idx)))
            .collect::<Result<Vec<_>>>()?;
        let metrics = rules
            .metrics
            .iter()
            .map(|&m| find(m.column()).map(|idx| (m, idx)))
            .collect::<Result<Vec<_>>>()?;

        Ok(ColumnLayout {
            date,
            dimensions,
            metrics,
        })
    }

    fn row(&self, record: &RawRecord, rules: &FamilyRules) -> Result<NormalizedRow> {
        let raw_date = record.cell(self.date);
        let date = parse_date(raw_date, &rules.date_formats).ok_or_else(|| {
            DataError::MalformedDate {
                family: rules.id,
                column: rules.date_column.clone(),
                line: record.line,
                value: raw_date.to_string(),
            }
        })?;

        let dimensions = self
            .dimensions
            .iter()
            .map(|&(d, idx)| (d, rules.rewrite_value(d, record.cell(idx)).to_string()))
            .collect::<BTreeMap<_, _>>();

        let metrics = self
            .metrics
            .iter()
            .map(|&(m, idx)| (m, parse_metric(record.cell(idx))))
            .collect::<BTreeMap<_, _>>();

        Ok(NormalizedRow {
            date,
            dimensions,
            metrics,
        })
    }
}

/// Numeric cell → value. Blanks, `NA`, suppressed markers and other
/// non-numeric tokens become `None`, never zero.
fn parse_metric(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    let parsed = if cell.contains(',') {
        cell.replace(',', "").parse::<f64>()
    } else {
        cell.parse::<f64>()
    };
    parsed.ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::FamilyId;
    use chrono::NaiveDate;

    const HOSPITALIZATION_CSV: &str = "\
Laboratory-confirmed COVID-19 hospitalization rates by vaccination status
Rates are per 100,000 population
Week ending,Age group,Unvaccinated Rate,Vaccinated Rate,Boosted Rate
01/15/2022,18-49,30.5,5.1,
01/08/2022,5-Nov,4.0,1.0,NA
01/08/2022,Dec-17,6.5,1.2,0.4
01/15/2022,All ages,40.1,\"1,004.2\",2.0
";

    fn hospitalization() -> NormalizedDataset {
        let rules = FamilyRules::builtin(FamilyId::HospitalizationByAge);
        let raw = RawTable::from_csv(HOSPITALIZATION_CSV.as_bytes(), rules.header_offset).unwrap();
        normalize(&raw, &rules).unwrap()
    }

    #[test]
    fn test_renames_rewrites_and_sorts() {
        let ds = hospitalization();
        let ages: Vec<&str> = ds
            .rows()
            .iter()
            .filter_map(|r| r.dimension(Dimension::AgeGroup))
            .collect();
        // Same-date rows keep source order.
        assert_eq!(ages, vec!["5-11", "12-17", "18-49", "All ages"]);
        assert_eq!(ds.rows()[0].date, NaiveDate::from_ymd_opt(2022, 1, 8).unwrap());
    }

    #[test]
    fn test_non_numeric_metrics_become_null_not_zero() {
        let ds = hospitalization();
        let five_to_eleven = &ds.rows()[0];
        assert_eq!(five_to_eleven.metric(Metric::UnvaccinatedRate), Some(4.0));
        assert_eq!(five_to_eleven.metric(Metric::BoostedRate), None);
        assert!(five_to_eleven.metrics.contains_key(&Metric::BoostedRate));

        let adults = &ds.rows()[2];
        assert_eq!(adults.metric(Metric::BoostedRate), None);

        let all_ages = &ds.rows()[3];
        assert_eq!(all_ages.metric(Metric::VaccinatedRate), Some(1004.2));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        assert_eq!(hospitalization(), hospitalization());
    }

    #[test]
    fn test_labels_without_malformed_tokens_are_untouched() {
        let rules = FamilyRules::builtin(FamilyId::HospitalizationByAge);
        let csv = "x\nx\nWeek ending,Age group,Unvaccinated Rate,Vaccinated Rate,Boosted Rate\n\
                   01/08/2022,0-4,1,1,1\n01/08/2022,65+,2,2,2\n";
        let raw = RawTable::from_csv(csv.as_bytes(), 2).unwrap();
        let ds = normalize(&raw, &rules).unwrap();
        let ages: Vec<&str> = ds
            .rows()
            .iter()
            .filter_map(|r| r.dimension(Dimension::AgeGroup))
            .collect();
        assert_eq!(ages, vec!["0-4", "65+"]);
    }

    #[test]
    fn test_missing_column_fails_fast() {
        let rules = FamilyRules::builtin(FamilyId::HospitalizationByAge);
        let csv = "a\nb\nWeek ending,Unvaccinated Rate,Vaccinated Rate,Boosted Rate\n01/08/2022,1,2,3\n";
        let raw = RawTable::from_csv(csv.as_bytes(), 2).unwrap();
        let err = normalize(&raw, &rules).unwrap_err();
        match err {
            DataError::MissingColumn { family, column } => {
                assert_eq!(family, FamilyId::HospitalizationByAge);
                assert_eq!(column, "age_group");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_malformed_date_fails_whole_family() {
        let rules = FamilyRules::builtin(FamilyId::DailyStateCounts);
        let csv = "date,Province_State,Variant,daily_deaths,daily_fully_vaccinated,Deaths,People_Fully_Vaccinated\n\
                   2021-01-01,Ohio,Alpha,1,1,1,1\n\
                   not-a-date,Ohio,Alpha,1,1,1,1\n";
        let raw = RawTable::from_csv(csv.as_bytes(), 0).unwrap();
        match normalize(&raw, &rules).unwrap_err() {
            DataError::MalformedDate { line, value, .. } => {
                assert_eq!(line, 3);
                assert_eq!(value, "not-a-date");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_mmwr_week_dates_and_outcome_rewrites() {
        let rules = FamilyRules::builtin(FamilyId::VaccineOutcomes);
        let csv = "title\n\n\
                   outcome,MMWR week,Age group,Vaccine product,Crude vax IR,Crude unvax IR,Age adjusted vax IR,Age adjusted unvax IR\n\
                   Case,202201,5-Nov,Pfizer,10,50,11,52\n";
        let raw = RawTable::from_csv(csv.as_bytes(), 2).unwrap();
        let ds = normalize(&raw, &rules).unwrap();
        let row = &ds.rows()[0];
        assert_eq!(row.date, NaiveDate::from_ymd_opt(2022, 1, 8).unwrap());
        assert_eq!(row.dimension(Dimension::Outcome), Some("case"));
        assert_eq!(row.dimension(Dimension::AgeGroup), Some("5-11"));
        assert_eq!(row.metric(Metric::AgeAdjustedUnvaccinatedRate), Some(52.0));
    }

    #[test]
    fn test_parse_metric() {
        assert_eq!(parse_metric("12"), Some(12.0));
        assert_eq!(parse_metric(" 3.5 "), Some(3.5));
        assert_eq!(parse_metric("1,234"), Some(1234.0));
        assert_eq!(parse_metric("0"), Some(0.0));
        assert_eq!(parse_metric(""), None);
        assert_eq!(parse_metric("NA"), None);
        assert_eq!(parse_metric("NaN"), None);
        assert_eq!(parse_metric("*"), None);
    }
}
