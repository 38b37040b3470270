//! Chart requests: typed descriptions of each plot the dashboard offers,
//! resolved into one query plus a series layout.
//!
//! Every chart is the same shape, a handful of named time series over one
//! family, so one [`render_chart`] serves them all.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::data::error::Result;
use crate::data::filter::FilterSpec;
use crate::data::model::{Dimension, FamilyId, Metric, NormalizedRow};
use crate::data::registry::DatasetRegistry;

// ---------------------------------------------------------------------------
// Request vocabulary
// ---------------------------------------------------------------------------

/// Date range of a chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateWindow {
    /// The dataset's full observed span.
    Full,
    /// Inclusive range.
    Between(NaiveDate, NaiveDate),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VaccinationStatus {
    Unvaccinated,
    Vaccinated,
    Boosted,
}

impl VaccinationStatus {
    pub const ALL: [VaccinationStatus; 3] = [
        VaccinationStatus::Unvaccinated,
        VaccinationStatus::Vaccinated,
        VaccinationStatus::Boosted,
    ];

    pub fn label(self) -> &'static str {
        match self {
            VaccinationStatus::Unvaccinated => "Unvaccinated",
            VaccinationStatus::Vaccinated => "Vaccinated",
            VaccinationStatus::Boosted => "Boosted",
        }
    }

    pub fn metric(self, basis: RateBasis) -> Metric {
        match (self, basis) {
            (VaccinationStatus::Unvaccinated, RateBasis::Crude) => Metric::UnvaccinatedRate,
            (VaccinationStatus::Vaccinated, RateBasis::Crude) => Metric::VaccinatedRate,
            (VaccinationStatus::Boosted, RateBasis::Crude) => Metric::BoostedRate,
            (VaccinationStatus::Unvaccinated, RateBasis::AgeAdjusted) => {
                Metric::AgeAdjustedUnvaccinatedRate
            }
            (VaccinationStatus::Vaccinated, RateBasis::AgeAdjusted) => {
                Metric::AgeAdjustedVaccinatedRate
            }
            (VaccinationStatus::Boosted, RateBasis::AgeAdjusted) => Metric::AgeAdjustedBoostedRate,
        }
    }
}

/// Crude rates or rates standardized to a reference age distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RateBasis {
    #[default]
    Crude,
    AgeAdjusted,
}

/// The kinds of chart on offer, without their parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChartKind {
    /// Leading rows of a family as a table; the landing page.
    #[default]
    Preview,
    DailyDeaths,
    DailyVaccinations,
    DeathsAndVaccinations,
    OverallDeathsAndVaccinations,
    VariantDeathsAndVaccinations,
    HospitalizationByAge,
    HospitalizationByStatus,
    OutcomeRates,
    BoosterOutcomeRates,
}

impl ChartKind {
    pub const ALL: [ChartKind; 10] = [
        ChartKind::Preview,
        ChartKind::DailyDeaths,
        ChartKind::DailyVaccinations,
        ChartKind::DeathsAndVaccinations,
        ChartKind::OverallDeathsAndVaccinations,
        ChartKind::VariantDeathsAndVaccinations,
        ChartKind::HospitalizationByAge,
        ChartKind::HospitalizationByStatus,
        ChartKind::OutcomeRates,
        ChartKind::BoosterOutcomeRates,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ChartKind::Preview => "Introduction - Data Preview",
            ChartKind::DailyDeaths => "US States - Daily Deaths",
            ChartKind::DailyVaccinations => "US States - Daily Vaccines",
            ChartKind::DeathsAndVaccinations => "US State - Daily Deaths and Vaccines",
            ChartKind::OverallDeathsAndVaccinations => "US State - Overall Deaths and Vaccines",
            ChartKind::VariantDeathsAndVaccinations => "US State - Variant",
            ChartKind::HospitalizationByAge => "Hospitalization - By Age Group",
            ChartKind::HospitalizationByStatus => "Hospitalization - By Vaccination Status",
            ChartKind::OutcomeRates => "Cases/Deaths - By Vaccination Status",
            ChartKind::BoosterOutcomeRates => "Cases/Deaths - With Booster",
        }
    }

    /// Family the kind reads. The preview may be pointed at any family;
    /// this is its default.
    pub fn family(self) -> FamilyId {
        match self {
            ChartKind::Preview
            | ChartKind::DailyDeaths
            | ChartKind::DailyVaccinations
            | ChartKind::DeathsAndVaccinations
            | ChartKind::OverallDeathsAndVaccinations
            | ChartKind::VariantDeathsAndVaccinations => FamilyId::DailyStateCounts,
            ChartKind::HospitalizationByAge | ChartKind::HospitalizationByStatus => {
                FamilyId::HospitalizationByAge
            }
            ChartKind::OutcomeRates => FamilyId::VaccineOutcomes,
            ChartKind::BoosterOutcomeRates => FamilyId::VaccineOutcomesBooster,
        }
    }

    /// Dimensions a request of this kind needs selections for.
    pub fn selectors(self) -> &'static [Dimension] {
        match self {
            ChartKind::Preview => &[],
            ChartKind::DailyDeaths
            | ChartKind::DailyVaccinations
            | ChartKind::DeathsAndVaccinations
            | ChartKind::OverallDeathsAndVaccinations => &[Dimension::State],
            ChartKind::VariantDeathsAndVaccinations => &[Dimension::State, Dimension::Variant],
            ChartKind::HospitalizationByAge | ChartKind::HospitalizationByStatus => {
                &[Dimension::AgeGroup]
            }
            ChartKind::OutcomeRates | ChartKind::BoosterOutcomeRates => &[
                Dimension::Outcome,
                Dimension::AgeGroup,
                Dimension::VaccineProduct,
            ],
        }
    }

    /// The selector that takes several values (one series each), if any.
    pub fn multi_select(self) -> Option<Dimension> {
        match self {
            ChartKind::DailyDeaths | ChartKind::DailyVaccinations => Some(Dimension::State),
            ChartKind::HospitalizationByAge => Some(Dimension::AgeGroup),
            _ => None,
        }
    }

    /// Variant charts and the preview always span the whole dataset.
    pub fn uses_window(self) -> bool {
        !matches!(
            self,
            ChartKind::Preview | ChartKind::VariantDeathsAndVaccinations
        )
    }
}

/// A fully parameterized chart. Built by the UI from its selections.
#[derive(Debug, Clone, PartialEq)]
pub enum ChartRequest {
    /// One line per state.
    DailyDeaths { states: Vec<String>, window: DateWindow },
    /// One line per state.
    DailyVaccinations { states: Vec<String>, window: DateWindow },
    /// Deaths and fully vaccinated people for one state, daily or cumulative.
    DeathsAndVaccinations {
        state: String,
        cumulative: bool,
        window: DateWindow,
    },
    /// Daily deaths and vaccinations for one state while `variant` dominated.
    VariantDeathsAndVaccinations { state: String, variant: String },
    /// One line per age band, for one vaccination status.
    HospitalizationByAge {
        age_groups: Vec<String>,
        status: VaccinationStatus,
        window: DateWindow,
    },
    /// One line per vaccination status, for one age band.
    HospitalizationByStatus { age_group: String, window: DateWindow },
    /// One line per vaccination status for an outcome/age/product cell;
    /// `booster` selects the family with the boosted category.
    OutcomeRates {
        booster: bool,
        outcome: String,
        age_group: String,
        vaccine_product: String,
        basis: RateBasis,
        window: DateWindow,
    },
}

/// How matching rows become series.
#[derive(Debug, Clone, PartialEq)]
pub enum SeriesLayout {
    /// One series per listed value of `dimension`, plotting `metric`.
    PerValue {
        dimension: Dimension,
        values: Vec<String>,
        metric: Metric,
    },
    /// A fixed set of named series, each read from its own metric column.
    Fixed(Vec<(String, Metric)>),
}

impl ChartRequest {
    pub fn kind(&self) -> ChartKind {
        match self {
            ChartRequest::DailyDeaths { .. } => ChartKind::DailyDeaths,
            ChartRequest::DailyVaccinations { .. } => ChartKind::DailyVaccinations,
            ChartRequest::DeathsAndVaccinations {
                cumulative: false, ..
            } => ChartKind::DeathsAndVaccinations,
            ChartRequest::DeathsAndVaccinations { cumulative: true, .. } => {
                ChartKind::OverallDeathsAndVaccinations
            }
            ChartRequest::VariantDeathsAndVaccinations { .. } => {
                ChartKind::VariantDeathsAndVaccinations
            }
            ChartRequest::HospitalizationByAge { .. } => ChartKind::HospitalizationByAge,
            ChartRequest::HospitalizationByStatus { .. } => ChartKind::HospitalizationByStatus,
            ChartRequest::OutcomeRates { booster: false, .. } => ChartKind::OutcomeRates,
            ChartRequest::OutcomeRates { booster: true, .. } => ChartKind::BoosterOutcomeRates,
        }
    }

    pub fn family(&self) -> FamilyId {
        self.kind().family()
    }

    pub fn window(&self) -> DateWindow {
        match self {
            ChartRequest::DailyDeaths { window, .. }
            | ChartRequest::DailyVaccinations { window, .. }
            | ChartRequest::DeathsAndVaccinations { window, .. }
            | ChartRequest::HospitalizationByAge { window, .. }
            | ChartRequest::HospitalizationByStatus { window, .. }
            | ChartRequest::OutcomeRates { window, .. } => *window,
            ChartRequest::VariantDeathsAndVaccinations { .. } => DateWindow::Full,
        }
    }

    pub fn title(&self) -> String {
        match self {
            ChartRequest::DeathsAndVaccinations { state, .. }
            | ChartRequest::VariantDeathsAndVaccinations { state, .. } => {
                format!("{} ({state})", self.kind().label())
            }
            ChartRequest::HospitalizationByAge { status, .. } => {
                format!("{} ({})", self.kind().label(), status.label())
            }
            ChartRequest::HospitalizationByStatus { age_group, .. } => {
                format!("{} ({age_group})", self.kind().label())
            }
            ChartRequest::OutcomeRates {
                outcome,
                age_group,
                vaccine_product,
                ..
            } => format!(
                "{} ({outcome}, {age_group}, {vaccine_product})",
                self.kind().label()
            ),
            _ => self.kind().label().to_string(),
        }
    }

    pub fn y_label(&self) -> &'static str {
        match self {
            ChartRequest::DailyDeaths { .. } => "Daily death count",
            ChartRequest::DailyVaccinations { .. } => "Daily fully vaccinated count",
            ChartRequest::DeathsAndVaccinations {
                cumulative: true, ..
            } => "Overall deaths",
            ChartRequest::DeathsAndVaccinations { .. }
            | ChartRequest::VariantDeathsAndVaccinations { .. } => "Daily deaths",
            ChartRequest::HospitalizationByAge { .. }
            | ChartRequest::HospitalizationByStatus { .. } => "Hospitalizations per 100,000",
            ChartRequest::OutcomeRates { .. } => "Incidence per 100,000",
        }
    }

    /// Metric drawn against its own right-hand axis, with that axis' label.
    /// Vaccination counts run orders of magnitude above death counts.
    pub fn secondary_axis(&self) -> Option<(Metric, &'static str)> {
        match self {
            ChartRequest::DeathsAndVaccinations {
                cumulative: true, ..
            } => Some((Metric::PeopleFullyVaccinated, "Overall fully vaccinated")),
            ChartRequest::DeathsAndVaccinations { .. }
            | ChartRequest::VariantDeathsAndVaccinations { .. } => {
                Some((Metric::DailyFullyVaccinated, "Daily fully vaccinated"))
            }
            _ => None,
        }
    }

    /// Accepted values per dimension for this chart's query.
    pub fn constraints(&self) -> Vec<(Dimension, Vec<String>)> {
        match self {
            ChartRequest::DailyDeaths { states, .. }
            | ChartRequest::DailyVaccinations { states, .. } => {
                vec![(Dimension::State, states.clone())]
            }
            ChartRequest::DeathsAndVaccinations { state, .. } => {
                vec![(Dimension::State, vec![state.clone()])]
            }
            ChartRequest::VariantDeathsAndVaccinations { state, variant } => vec![
                (Dimension::State, vec![state.clone()]),
                (Dimension::Variant, vec![variant.clone()]),
            ],
            ChartRequest::HospitalizationByAge { age_groups, .. } => {
                vec![(Dimension::AgeGroup, age_groups.clone())]
            }
            ChartRequest::HospitalizationByStatus { age_group, .. } => {
                vec![(Dimension::AgeGroup, vec![age_group.clone()])]
            }
            ChartRequest::OutcomeRates {
                outcome,
                age_group,
                vaccine_product,
                ..
            } => vec![
                (Dimension::Outcome, vec![outcome.clone()]),
                (Dimension::AgeGroup, vec![age_group.clone()]),
                (Dimension::VaccineProduct, vec![vaccine_product.clone()]),
            ],
        }
    }

    pub fn layout(&self) -> SeriesLayout {
        fn fixed(pairs: &[(&str, Metric)]) -> SeriesLayout {
            SeriesLayout::Fixed(pairs.iter().map(|(name, m)| (name.to_string(), *m)).collect())
        }
        match self {
            ChartRequest::DailyDeaths { states, .. } => SeriesLayout::PerValue {
                dimension: Dimension::State,
                values: states.clone(),
                metric: Metric::DailyDeaths,
            },
            ChartRequest::DailyVaccinations { states, .. } => SeriesLayout::PerValue {
                dimension: Dimension::State,
                values: states.clone(),
                metric: Metric::DailyFullyVaccinated,
            },
            ChartRequest::DeathsAndVaccinations {
                cumulative: true, ..
            } => fixed(&[
                ("Deaths", Metric::Deaths),
                ("Fully Vaccinated", Metric::PeopleFullyVaccinated),
            ]),
            ChartRequest::DeathsAndVaccinations { .. }
            | ChartRequest::VariantDeathsAndVaccinations { .. } => fixed(&[
                ("Deaths", Metric::DailyDeaths),
                ("Fully Vaccinated", Metric::DailyFullyVaccinated),
            ]),
            ChartRequest::HospitalizationByAge {
                age_groups, status, ..
            } => SeriesLayout::PerValue {
                dimension: Dimension::AgeGroup,
                values: age_groups.clone(),
                metric: status.metric(RateBasis::Crude),
            },
            ChartRequest::HospitalizationByStatus { .. } => SeriesLayout::Fixed(
                VaccinationStatus::ALL
                    .iter()
                    .map(|s| (s.label().to_string(), s.metric(RateBasis::Crude)))
                    .collect(),
            ),
            ChartRequest::OutcomeRates { booster, basis, .. } => {
                let statuses: &[VaccinationStatus] = if *booster {
                    &VaccinationStatus::ALL
                } else {
                    &VaccinationStatus::ALL[..2]
                };
                SeriesLayout::Fixed(
                    statuses
                        .iter()
                        .map(|s| (s.label().to_string(), s.metric(*basis)))
                        .collect(),
                )
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Rendered output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    /// `None` where the source had no value; plotted as a gap.
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    /// Plotted against the chart's secondary axis.
    pub secondary: bool,
    pub points: Vec<SeriesPoint>,
}

impl Series {
    fn new(name: impl Into<String>) -> Self {
        Series {
            name: name.into(),
            secondary: false,
            points: Vec::new(),
        }
    }

    /// Whether the series has at least one non-null point.
    pub fn has_values(&self) -> bool {
        self.points.iter().any(|p| p.value.is_some())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chart {
    pub title: String,
    pub y_label: String,
    /// Label of the right-hand axis when some series use it.
    pub secondary_y_label: Option<String>,
    pub series: Vec<Series>,
}

impl Chart {
    /// No series carries a single value.
    pub fn is_empty(&self) -> bool {
        !self.series.iter().any(Series::has_values)
    }
}

/// Map date-ordered rows onto series. Rows whose value for a per-value
/// dimension is not listed are skipped; no aggregation takes place.
pub fn build_series<'a>(
    rows: impl IntoIterator<Item = &'a NormalizedRow>,
    layout: &SeriesLayout,
) -> Vec<Series> {
    match layout {
        SeriesLayout::PerValue {
            dimension,
            values,
            metric,
        } => {
            let mut series: Vec<Series> = values.iter().map(Series::new).collect();
            let position: HashMap<&str, usize> = values
                .iter()
                .enumerate()
                .map(|(i, v)| (v.as_str(), i))
                .collect();
            for row in rows {
                let Some(&idx) = row.dimension(*dimension).and_then(|v| position.get(v)) else {
                    continue;
                };
                series[idx].points.push(SeriesPoint {
                    date: row.date,
                    value: row.metric(*metric),
                });
            }
            series
        }
        SeriesLayout::Fixed(columns) => {
            let mut series: Vec<Series> =
                columns.iter().map(|(name, _)| Series::new(name)).collect();
            for row in rows {
                for (s, (_, metric)) in series.iter_mut().zip(columns) {
                    s.points.push(SeriesPoint {
                        date: row.date,
                        value: row.metric(*metric),
                    });
                }
            }
            series
        }
    }
}

/// Load (if needed), query and lay out one chart.
pub fn render_chart(registry: &DatasetRegistry, request: &ChartRequest) -> Result<Chart> {
    let family = request.family();
    let dataset = registry.get(family)?;

    let spec = match (request.window(), dataset.date_span()) {
        (DateWindow::Between(start, end), _) => Some(FilterSpec::between(start, end)),
        (DateWindow::Full, Some(span)) => Some(FilterSpec::covering(span)),
        (DateWindow::Full, None) => None,
    };

    let layout = request.layout();
    let mut series = match spec {
        Some(spec) => {
            let spec = request
                .constraints()
                .into_iter()
                .fold(spec, |spec, (dimension, values)| spec.with_values(dimension, values));
            let slice = registry.query(family, &spec)?;
            build_series(slice.rows(), &layout)
        }
        None => build_series(std::iter::empty(), &layout),
    };

    let secondary = request.secondary_axis();
    if let (SeriesLayout::Fixed(columns), Some((metric, _))) = (&layout, secondary) {
        for (s, (_, m)) in series.iter_mut().zip(columns) {
            s.secondary = *m == metric;
        }
    }

    Ok(Chart {
        title: request.title(),
        y_label: request.y_label().to_string(),
        secondary_y_label: secondary.map(|(_, label)| label.to_string()),
        series,
    })
}

// ---------------------------------------------------------------------------
// Data preview
// ---------------------------------------------------------------------------

/// Rows shown on the preview page.
pub const PREVIEW_ROWS: usize = 10;

/// Leading rows of one family, with the columns they carry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Preview {
    pub family: FamilyId,
    pub dimensions: Vec<Dimension>,
    pub metrics: Vec<Metric>,
    pub rows: Vec<NormalizedRow>,
    /// Rows in the whole dataset.
    pub total: usize,
}

/// The first `limit` rows of `family` in date order.
pub fn preview(registry: &DatasetRegistry, family: FamilyId, limit: usize) -> Result<Preview> {
    let dataset = registry.get(family)?;
    let rows = match dataset.date_span() {
        Some(span) => registry
            .query(family, &FilterSpec::covering(span))?
            .rows()
            .take(limit)
            .cloned()
            .collect(),
        None => Vec::new(),
    };

    Ok(Preview {
        family,
        dimensions: dataset.dimensions().to_vec(),
        metrics: dataset.metrics().to_vec(),
        rows,
        total: dataset.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 1, d).unwrap()
    }

    fn row(d: u32, age: &str, unvax: Option<f64>, vax: Option<f64>) -> NormalizedRow {
        NormalizedRow {
            date: day(d),
            dimensions: BTreeMap::from([(Dimension::AgeGroup, age.to_string())]),
            metrics: BTreeMap::from([
                (Metric::UnvaccinatedRate, unvax),
                (Metric::VaccinatedRate, vax),
            ]),
        }
    }

    #[test]
    fn test_per_value_layout_splits_rows_by_dimension() {
        let rows = [
            row(1, "5-11", Some(1.0), None),
            row(1, "18-49", Some(2.0), None),
            row(8, "5-11", Some(3.0), None),
            row(8, "65+", Some(9.0), None),
        ];
        let layout = SeriesLayout::PerValue {
            dimension: Dimension::AgeGroup,
            values: vec!["5-11".into(), "18-49".into()],
            metric: Metric::UnvaccinatedRate,
        };
        let series = build_series(&rows, &layout);

        assert_eq!(series.len(), 2);
        assert_eq!(series[0].name, "5-11");
        assert_eq!(
            series[0].points,
            vec![
                SeriesPoint { date: day(1), value: Some(1.0) },
                SeriesPoint { date: day(8), value: Some(3.0) },
            ]
        );
        assert_eq!(series[1].points.len(), 1);
    }

    #[test]
    fn test_fixed_layout_reads_columns_of_the_same_row() {
        let rows = [row(1, "5-11", Some(10.0), Some(2.0)), row(8, "5-11", Some(12.0), None)];
        let layout = SeriesLayout::Fixed(vec![
            ("Unvaccinated".into(), Metric::UnvaccinatedRate),
            ("Vaccinated".into(), Metric::VaccinatedRate),
        ]);
        let series = build_series(&rows, &layout);

        assert_eq!(series[0].points.iter().map(|p| p.value).collect::<Vec<_>>(), vec![Some(10.0), Some(12.0)]);
        assert_eq!(series[1].points.iter().map(|p| p.value).collect::<Vec<_>>(), vec![Some(2.0), None]);
    }

    #[test]
    fn test_request_kinds_and_families() {
        let overall = ChartRequest::DeathsAndVaccinations {
            state: "Ohio".into(),
            cumulative: true,
            window: DateWindow::Full,
        };
        assert_eq!(overall.kind(), ChartKind::OverallDeathsAndVaccinations);
        assert_eq!(overall.family(), FamilyId::DailyStateCounts);
        assert_eq!(overall.title(), "US State - Overall Deaths and Vaccines (Ohio)");
        assert_eq!(
            overall.secondary_axis(),
            Some((Metric::PeopleFullyVaccinated, "Overall fully vaccinated"))
        );

        let booster = ChartRequest::OutcomeRates {
            booster: true,
            outcome: "death".into(),
            age_group: "50-64".into(),
            vaccine_product: "Pfizer".into(),
            basis: RateBasis::AgeAdjusted,
            window: DateWindow::Full,
        };
        assert_eq!(booster.family(), FamilyId::VaccineOutcomesBooster);
        match booster.layout() {
            SeriesLayout::Fixed(columns) => {
                let metrics: Vec<Metric> = columns.into_iter().map(|(_, m)| m).collect();
                assert_eq!(
                    metrics,
                    vec![
                        Metric::AgeAdjustedUnvaccinatedRate,
                        Metric::AgeAdjustedVaccinatedRate,
                        Metric::AgeAdjustedBoostedRate,
                    ]
                );
            }
            other => panic!("unexpected layout {other:?}"),
        }
    }

    #[test]
    fn test_every_kind_maps_back_from_a_request() {
        for kind in ChartKind::ALL {
            assert!(!kind.label().is_empty());
            if let Some(multi) = kind.multi_select() {
                assert!(kind.selectors().contains(&multi));
            }
        }
        assert_eq!(ChartKind::default(), ChartKind::Preview);
        assert!(ChartKind::Preview.selectors().is_empty());
        assert!(!ChartKind::Preview.uses_window());

        let variant = ChartRequest::VariantDeathsAndVaccinations {
            state: "Ohio".into(),
            variant: "Delta".into(),
        };
        assert_eq!(variant.window(), DateWindow::Full);
        assert_eq!(variant.constraints().len(), 2);
    }
}
