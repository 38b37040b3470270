use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::DomainIndex;
use super::error::DataError;
use super::family::FamilyRules;

// ---------------------------------------------------------------------------
// FamilyId – the closed set of dataset families
// ---------------------------------------------------------------------------

/// A logical dataset: one raw schema plus one normalization rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FamilyId {
    /// Per-state daily deaths and vaccinations, tagged with the dominant variant.
    DailyStateCounts,
    /// Weekly hospitalization rates per age band and vaccination status.
    HospitalizationByAge,
    /// Weekly case/death incidence by age band and vaccine product.
    VaccineOutcomes,
    /// Same as [`FamilyId::VaccineOutcomes`] with an extra boosted category.
    VaccineOutcomesBooster,
}

impl FamilyId {
    pub const ALL: [FamilyId; 4] = [
        FamilyId::DailyStateCounts,
        FamilyId::HospitalizationByAge,
        FamilyId::VaccineOutcomes,
        FamilyId::VaccineOutcomesBooster,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FamilyId::DailyStateCounts => "daily_state_counts",
            FamilyId::HospitalizationByAge => "hospitalization_by_age",
            FamilyId::VaccineOutcomes => "vaccine_outcomes",
            FamilyId::VaccineOutcomesBooster => "vaccine_outcomes_booster",
        }
    }

    /// Human-readable name for menus and log lines.
    pub fn label(self) -> &'static str {
        match self {
            FamilyId::DailyStateCounts => "Daily state counts",
            FamilyId::HospitalizationByAge => "Hospitalization by age group",
            FamilyId::VaccineOutcomes => "Cases/deaths by vaccination status",
            FamilyId::VaccineOutcomesBooster => "Cases/deaths with booster",
        }
    }
}

impl fmt::Display for FamilyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FamilyId {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FamilyId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| DataError::UnknownFamily(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Dimension – categorical columns a query can constrain
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    State,
    Variant,
    AgeGroup,
    VaccineProduct,
    /// `case` or `death`.
    Outcome,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::State,
        Dimension::Variant,
        Dimension::AgeGroup,
        Dimension::VaccineProduct,
        Dimension::Outcome,
    ];

    /// Canonical column name after renaming.
    pub fn column(self) -> &'static str {
        match self {
            Dimension::State => "state",
            Dimension::Variant => "variant",
            Dimension::AgeGroup => "age_group",
            Dimension::VaccineProduct => "vaccine_product",
            Dimension::Outcome => "outcome",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Dimension::State => "State",
            Dimension::Variant => "Variant",
            Dimension::AgeGroup => "Age group",
            Dimension::VaccineProduct => "Vaccine product",
            Dimension::Outcome => "Outcome",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for Dimension {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dimension::ALL
            .into_iter()
            .find(|d| d.column() == s)
            .ok_or_else(|| DataError::InvalidFilter(format!("unknown dimension '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Metric – pre-computed numeric columns, passed through untouched
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    DailyDeaths,
    DailyFullyVaccinated,
    /// Cumulative deaths.
    Deaths,
    /// Cumulative fully vaccinated people.
    PeopleFullyVaccinated,
    UnvaccinatedRate,
    VaccinatedRate,
    BoostedRate,
    AgeAdjustedUnvaccinatedRate,
    AgeAdjustedVaccinatedRate,
    AgeAdjustedBoostedRate,
}

impl Metric {
    pub const ALL: [Metric; 10] = [
        Metric::DailyDeaths,
        Metric::DailyFullyVaccinated,
        Metric::Deaths,
        Metric::PeopleFullyVaccinated,
        Metric::UnvaccinatedRate,
        Metric::VaccinatedRate,
        Metric::BoostedRate,
        Metric::AgeAdjustedUnvaccinatedRate,
        Metric::AgeAdjustedVaccinatedRate,
        Metric::AgeAdjustedBoostedRate,
    ];

    pub fn column(self) -> &'static str {
        match self {
            Metric::DailyDeaths => "daily_deaths",
            Metric::DailyFullyVaccinated => "daily_fully_vaccinated",
            Metric::Deaths => "deaths",
            Metric::PeopleFullyVaccinated => "people_fully_vaccinated",
            Metric::UnvaccinatedRate => "unvaccinated_rate",
            Metric::VaccinatedRate => "vaccinated_rate",
            Metric::BoostedRate => "boosted_rate",
            Metric::AgeAdjustedUnvaccinatedRate => "age_adjusted_unvaccinated_rate",
            Metric::AgeAdjustedVaccinatedRate => "age_adjusted_vaccinated_rate",
            Metric::AgeAdjustedBoostedRate => "age_adjusted_boosted_rate",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for Metric {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .into_iter()
            .find(|m| m.column() == s)
            .ok_or_else(|| DataError::InvalidFilter(format!("unknown metric '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// NormalizedRow – one observation
// ---------------------------------------------------------------------------

/// A single observation after renaming, value rewrites and type coercion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRow {
    /// Calendar day, or the week-ending day for weekly families.
    pub date: NaiveDate,
    pub dimensions: BTreeMap<Dimension, String>,
    /// `None` marks a missing or non-numeric cell, which is not the same as zero.
    pub metrics: BTreeMap<Metric, Option<f64>>,
}

impl NormalizedRow {
    pub fn dimension(&self, dimension: Dimension) -> Option<&str> {
        self.dimensions.get(&dimension).map(String::as_str)
    }

    pub fn metric(&self, metric: Metric) -> Option<f64> {
        self.metrics.get(&metric).copied().flatten()
    }
}

// ---------------------------------------------------------------------------
// DateSpan – first and last observed dates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateSpan {
    pub first: NaiveDate,
    pub last: NaiveDate,
}

impl DateSpan {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.first <= date && date <= self.last
    }
}

// ---------------------------------------------------------------------------
// NormalizedDataset – the immutable table for one family
// ---------------------------------------------------------------------------

/// All rows of one family, sorted by date, with the date span and the
/// per-dimension domain computed once at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedDataset {
    family: FamilyId,
    rows: Vec<NormalizedRow>,
    dimensions: Vec<Dimension>,
    metrics: Vec<Metric>,
    span: Option<DateSpan>,
    domain: DomainIndex,
}

impl NormalizedDataset {
    /// Sort `rows` by date (stable, so same-date rows keep source order) and
    /// derive the span and the domain index.
    pub fn from_rows(rules: &FamilyRules, mut rows: Vec<NormalizedRow>) -> Self {
        rows.sort_by_key(|row| row.date);

        let span = rows
            .iter()
            .map(|row| row.date)
            .fold(None, |acc: Option<DateSpan>, date| {
                Some(match acc {
                    None => DateSpan { first: date, last: date },
                    Some(span) => DateSpan {
                        first: span.first.min(date),
                        last: span.last.max(date),
                    },
                })
            });

        let domain = DomainIndex::build(&rows, &rules.domains);

        NormalizedDataset {
            family: rules.id,
            rows,
            dimensions: rules.dimensions().collect(),
            metrics: rules.metrics.clone(),
            span,
            domain,
        }
    }

    pub fn family(&self) -> FamilyId {
        self.family
    }

    pub fn rows(&self) -> &[NormalizedRow] {
        &self.rows
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn has_dimension(&self, dimension: Dimension) -> bool {
        self.dimensions.contains(&dimension)
    }

    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    /// First and last observed dates; `None` for an empty table.
    pub fn date_span(&self) -> Option<DateSpan> {
        self.span
    }

    pub fn domain(&self) -> &DomainIndex {
        &self.domain
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
