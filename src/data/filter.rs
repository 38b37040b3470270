use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::error::{DataError, Result};
use super::model::{DateSpan, Dimension, NormalizedDataset, NormalizedRow};

// ---------------------------------------------------------------------------
// Filter: date range × accepted values per dimension
// ---------------------------------------------------------------------------

/// A caller-built query: an inclusive date range plus, per dimension, the set
/// of accepted values. A dimension that is absent, or mapped to an empty set,
/// is not constrained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub start: NaiveDate,
    pub end: NaiveDate,
    #[serde(default)]
    pub values: BTreeMap<Dimension, BTreeSet<String>>,
}

impl FilterSpec {
    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        FilterSpec {
            start,
            end,
            values: BTreeMap::new(),
        }
    }

    /// Range covering a dataset's whole span.
    pub fn covering(span: DateSpan) -> Self {
        Self::between(span.first, span.last)
    }

    /// Accept `values` for `dimension`, in addition to any already accepted.
    pub fn with_values<I, S>(mut self, dimension: Dimension, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values
            .entry(dimension)
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    /// Reject reversed ranges and dimensions the dataset does not carry.
    pub fn validate(&self, dataset: &NormalizedDataset) -> Result<()> {
        if self.start > self.end {
            return Err(DataError::InvalidFilter(format!(
                "start {} is after end {}",
                self.start, self.end
            )));
        }
        if let Some(dimension) = self.values.keys().find(|d| !dataset.has_dimension(**d)) {
            return Err(DataError::InvalidFilter(format!(
                "{} has no '{}' dimension",
                dataset.family(),
                dimension
            )));
        }
        Ok(())
    }

    /// Whether `row` satisfies every predicate.
    pub fn accepts(&self, row: &NormalizedRow) -> bool {
        if row.date < self.start || row.date > self.end {
            return false;
        }
        self.values.iter().all(|(dimension, accepted)| {
            accepted.is_empty()
                || row
                    .dimension(*dimension)
                    .is_some_and(|value| accepted.contains(value))
        })
    }
}

// ---------------------------------------------------------------------------
// Query engine
// ---------------------------------------------------------------------------

/// Indices of the rows passing `spec`, in the dataset's date order.
///
/// No matching rows is an empty result, not an error.
pub fn filtered_indices(dataset: &NormalizedDataset, spec: &FilterSpec) -> Result<Vec<usize>> {
    spec.validate(dataset)?;

    // Rows are date-sorted, so the range narrows to one contiguous window.
    let rows = dataset.rows();
    let lo = rows.partition_point(|row| row.date < spec.start);
    let hi = rows.partition_point(|row| row.date <= spec.end);

    Ok((lo..hi.max(lo))
        .filter(|&idx| spec.accepts(&rows[idx]))
        .collect())
}

/// Rows passing `spec`, in ascending date order.
pub fn query<'a>(dataset: &'a NormalizedDataset, spec: &FilterSpec) -> Result<Vec<&'a NormalizedRow>> {
    let rows = dataset.rows();
    Ok(filtered_indices(dataset, spec)?
        .into_iter()
        .map(|idx| &rows[idx])
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::family::FamilyRules;
    use crate::data::model::{FamilyId, Metric};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 1, d).unwrap()
    }

    fn daily_counts() -> NormalizedDataset {
        let rules = FamilyRules::builtin(FamilyId::DailyStateCounts);
        let rows = (1..=3)
            .flat_map(|d| {
                ["California", "New York"].map(|state| NormalizedRow {
                    date: day(d),
                    dimensions: BTreeMap::from([
                        (Dimension::State, state.to_string()),
                        (Dimension::Variant, "Alpha".to_string()),
                    ]),
                    metrics: BTreeMap::from([(Metric::DailyDeaths, Some(f64::from(d)))]),
                })
            })
            .collect();
        NormalizedDataset::from_rows(&rules, rows)
    }

    #[test]
    fn test_state_and_range_filter() {
        let ds = daily_counts();
        let spec = FilterSpec::between(day(1), day(2)).with_values(Dimension::State, ["California"]);
        let rows = query(&ds, &spec).unwrap();

        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.dimension(Dimension::State) == Some("California")));
        assert_eq!(rows[0].date, day(1));
        assert_eq!(rows[1].date, day(2));
    }

    #[test]
    fn test_multiple_values_return_all_selected_series() {
        let ds = daily_counts();
        let spec = FilterSpec::between(day(3), day(3))
            .with_values(Dimension::State, ["California", "New York"]);
        assert_eq!(filtered_indices(&ds, &spec).unwrap().len(), 2);
    }

    #[test]
    fn test_empty_value_set_is_no_constraint() {
        let ds = daily_counts();
        let spec = FilterSpec::between(day(1), day(3))
            .with_values(Dimension::State, Vec::<String>::new());
        assert_eq!(filtered_indices(&ds, &spec).unwrap().len(), 6);
    }

    #[test]
    fn test_unknown_value_and_out_of_span_range_are_empty() {
        let ds = daily_counts();
        let spec = FilterSpec::between(day(1), day(3)).with_values(Dimension::State, ["Guam"]);
        assert!(query(&ds, &spec).unwrap().is_empty());

        let later = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap();
        let spec = FilterSpec::between(later, later);
        assert!(query(&ds, &spec).unwrap().is_empty());
    }

    #[test]
    fn test_reversed_range_is_rejected() {
        let ds = daily_counts();
        let spec = FilterSpec::between(day(3), day(1));
        assert!(matches!(query(&ds, &spec), Err(DataError::InvalidFilter(_))));
    }

    #[test]
    fn test_foreign_dimension_is_rejected() {
        let ds = daily_counts();
        let spec = FilterSpec::between(day(1), day(3)).with_values(Dimension::AgeGroup, ["5-11"]);
        assert!(matches!(query(&ds, &spec), Err(DataError::InvalidFilter(_))));
    }

    #[test]
    fn test_covering_span_returns_everything() {
        let ds = daily_counts();
        let spec = FilterSpec::covering(ds.date_span().unwrap());
        assert_eq!(query(&ds, &spec).unwrap().len(), ds.len());
    }
}
