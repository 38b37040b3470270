use std::collections::{BTreeMap, BTreeSet, HashSet};

use super::error::{DataError, Result};
use super::family::{DomainOrder, DomainRule};
use super::model::{Dimension, NormalizedDataset, NormalizedRow};

/// Legal values per categorical dimension, computed once per dataset.
///
/// Aggregate buckets declared on the [`DomainRule`] and blank cells are
/// never part of a domain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainIndex {
    values: BTreeMap<Dimension, Vec<String>>,
}

impl DomainIndex {
    /// Build the index from date-sorted rows.
    pub fn build(rows: &[NormalizedRow], rules: &[DomainRule]) -> Self {
        let values = rules
            .iter()
            .map(|rule| {
                let concrete = rows
                    .iter()
                    .filter_map(|row| row.dimension(rule.dimension))
                    .filter(|v| !v.is_empty() && !rule.is_aggregate(v));

                let ordered: Vec<String> = match rule.order {
                    DomainOrder::FirstSeen => {
                        let mut seen = HashSet::new();
                        concrete
                            .filter(|v| seen.insert(*v))
                            .map(str::to_string)
                            .collect()
                    }
                    DomainOrder::Lexical => concrete
                        .collect::<BTreeSet<&str>>()
                        .into_iter()
                        .map(str::to_string)
                        .collect(),
                };
                (rule.dimension, ordered)
            })
            .collect();

        DomainIndex { values }
    }

    pub fn values(&self, dimension: Dimension) -> Option<&[String]> {
        self.values.get(&dimension).map(Vec::as_slice)
    }
}

/// Ordered distinct values of `dimension`, for populating selection controls.
///
/// Fails with [`DataError::InvalidFilter`] when the family has no such dimension.
pub fn distinct_values(dataset: &NormalizedDataset, dimension: Dimension) -> Result<&[String]> {
    dataset.domain().values(dimension).ok_or_else(|| {
        DataError::InvalidFilter(format!(
            "{} has no '{}' dimension",
            dataset.family(),
            dimension
        ))
    })
}
