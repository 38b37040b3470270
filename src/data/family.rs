//! Static declarations of the dataset families and their normalization rules.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use super::dates::DateFormat;
use super::model::{Dimension, FamilyId, Metric};

/// How the distinct values of a dimension are ordered for callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainOrder {
    /// Order of first appearance in the date-sorted table.
    FirstSeen,
    /// Lexically sorted.
    Lexical,
}

/// Domain declaration for one categorical dimension of a family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainRule {
    pub dimension: Dimension,
    pub order: DomainOrder,
    /// Labels of aggregate buckets ("all ages", "all types") that overlap the
    /// concrete values and are therefore left out of the domain.
    pub aggregates: Vec<String>,
}

impl DomainRule {
    fn new(dimension: Dimension, order: DomainOrder, aggregates: &[&str]) -> Self {
        DomainRule {
            dimension,
            order,
            aggregates: aggregates.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn is_aggregate(&self, value: &str) -> bool {
        self.aggregates.iter().any(|a| a == value)
    }
}

/// Everything needed to turn one family's raw CSV into a
/// [`NormalizedDataset`](super::model::NormalizedDataset).
#[derive(Debug, Clone)]
pub struct FamilyRules {
    pub id: FamilyId,
    /// Source files, relative to the registry's table source.
    pub sources: Vec<PathBuf>,
    /// Physical lines to skip before the header row.
    pub header_offset: usize,
    /// Raw header text → canonical column name.
    pub column_renames: HashMap<String, String>,
    /// Literal substitutions applied to categorical values.
    pub value_rewrites: BTreeMap<Dimension, HashMap<String, String>>,
    /// Canonical name of the date column.
    pub date_column: String,
    pub date_formats: Vec<DateFormat>,
    pub domains: Vec<DomainRule>,
    pub metrics: Vec<Metric>,
}

// Spreadsheet tools autocorrect "5-11" to 5 November and "12-17" to December 2017.
const AGE_GROUP_REWRITES: &[(&str, &str)] = &[
    ("5-Nov", "5-11"),
    ("Nov-05", "5-11"),
    ("Dec-17", "12-17"),
    ("17-Dec", "12-17"),
];

const OUTCOME_REWRITES: &[(&str, &str)] = &[
    ("Case", "case"),
    ("cases", "case"),
    ("Death", "death"),
    ("deaths", "death"),
];

fn string_map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect()
}

impl FamilyRules {
    /// Built-in declaration of `id`.
    pub fn builtin(id: FamilyId) -> Self {
        match id {
            FamilyId::DailyStateCounts => Self::daily_state_counts(),
            FamilyId::HospitalizationByAge => Self::hospitalization_by_age(),
            FamilyId::VaccineOutcomes => Self::vaccine_outcomes(false),
            FamilyId::VaccineOutcomesBooster => Self::vaccine_outcomes(true),
        }
    }

    /// Built-in declarations of every family.
    pub fn catalog() -> Vec<Self> {
        FamilyId::ALL.into_iter().map(Self::builtin).collect()
    }

    fn daily_state_counts() -> Self {
        FamilyRules {
            id: FamilyId::DailyStateCounts,
            sources: vec![PathBuf::from(
                "us_covid19_vaccine_cases_deaths_daily_count_variant.csv",
            )],
            header_offset: 0,
            column_renames: string_map(&[
                ("Date", "date"),
                ("Province_State", "state"),
                ("Variant", "variant"),
                ("Deaths", "deaths"),
                ("People_Fully_Vaccinated", "people_fully_vaccinated"),
            ]),
            value_rewrites: BTreeMap::new(),
            date_column: "date".to_string(),
            date_formats: vec![
                DateFormat::IsoDate,
                DateFormat::UsSlash,
                DateFormat::IsoDateTime,
            ],
            domains: vec![
                DomainRule::new(Dimension::State, DomainOrder::FirstSeen, &[]),
                DomainRule::new(Dimension::Variant, DomainOrder::FirstSeen, &[]),
            ],
            metrics: vec![
                Metric::DailyDeaths,
                Metric::DailyFullyVaccinated,
                Metric::Deaths,
                Metric::PeopleFullyVaccinated,
            ],
        }
    }

    fn hospitalization_by_age() -> Self {
        FamilyRules {
            id: FamilyId::HospitalizationByAge,
            sources: vec![PathBuf::from("covid_net_hospitalization_by_age.csv")],
            header_offset: 2,
            column_renames: string_map(&[
                ("Week ending", "week_ending"),
                ("Week Ending Date", "week_ending"),
                ("_WeekendDate", "week_ending"),
                ("Age group", "age_group"),
                ("Age Category", "age_group"),
                ("AgeCategory_Legend", "age_group"),
                ("Unvaccinated Rate", "unvaccinated_rate"),
                ("Rate in unvaccinated", "unvaccinated_rate"),
                ("Vaccinated Rate", "vaccinated_rate"),
                ("Fully Vaccinated Rate", "vaccinated_rate"),
                ("Rate in fully vaccinated", "vaccinated_rate"),
                ("Boosted Rate", "boosted_rate"),
                ("Rate in boosted", "boosted_rate"),
            ]),
            value_rewrites: BTreeMap::from([(Dimension::AgeGroup, string_map(AGE_GROUP_REWRITES))]),
            date_column: "week_ending".to_string(),
            date_formats: vec![DateFormat::UsSlash, DateFormat::IsoDate],
            domains: vec![DomainRule::new(
                Dimension::AgeGroup,
                DomainOrder::Lexical,
                &["All ages", "all_ages"],
            )],
            metrics: vec![
                Metric::UnvaccinatedRate,
                Metric::VaccinatedRate,
                Metric::BoostedRate,
            ],
        }
    }

    fn vaccine_outcomes(booster: bool) -> Self {
        let mut renames = vec![
            ("Outcome", "outcome"),
            ("MMWR week", "mmwr_week"),
            ("MMWR Week", "mmwr_week"),
            ("Age group", "age_group"),
            ("Vaccine product", "vaccine_product"),
            ("vaccine product", "vaccine_product"),
            ("Crude vax IR", "vaccinated_rate"),
            ("crude_vax_ir", "vaccinated_rate"),
            ("crude_primary_series_only_ir", "vaccinated_rate"),
            ("Crude unvax IR", "unvaccinated_rate"),
            ("crude_unvax_ir", "unvaccinated_rate"),
            ("Age adjusted vax IR", "age_adjusted_vaccinated_rate"),
            ("age_adj_vax_ir", "age_adjusted_vaccinated_rate"),
            ("age_adj_primary_series_only_ir", "age_adjusted_vaccinated_rate"),
            ("Age adjusted unvax IR", "age_adjusted_unvaccinated_rate"),
            ("age_adj_unvax_ir", "age_adjusted_unvaccinated_rate"),
        ];
        let mut metrics = vec![
            Metric::UnvaccinatedRate,
            Metric::VaccinatedRate,
            Metric::AgeAdjustedUnvaccinatedRate,
            Metric::AgeAdjustedVaccinatedRate,
        ];
        let (id, file) = if booster {
            renames.extend([
                ("Crude booster IR", "boosted_rate"),
                ("crude_booster_ir", "boosted_rate"),
                ("Age adjusted booster IR", "age_adjusted_boosted_rate"),
                ("age_adj_booster_ir", "age_adjusted_boosted_rate"),
            ]);
            metrics.extend([Metric::BoostedRate, Metric::AgeAdjustedBoostedRate]);
            (
                FamilyId::VaccineOutcomesBooster,
                "rates_by_vaccination_status_booster.csv",
            )
        } else {
            (FamilyId::VaccineOutcomes, "rates_by_vaccination_status.csv")
        };

        FamilyRules {
            id,
            sources: vec![PathBuf::from(file)],
            header_offset: 2,
            column_renames: string_map(&renames),
            value_rewrites: BTreeMap::from([
                (Dimension::AgeGroup, string_map(AGE_GROUP_REWRITES)),
                (Dimension::Outcome, string_map(OUTCOME_REWRITES)),
            ]),
            date_column: "mmwr_week".to_string(),
            date_formats: vec![DateFormat::MmwrWeek, DateFormat::IsoDate],
            domains: vec![
                DomainRule::new(Dimension::Outcome, DomainOrder::FirstSeen, &[]),
                DomainRule::new(
                    Dimension::AgeGroup,
                    DomainOrder::Lexical,
                    &["all_ages_adj", "all_ages"],
                ),
                DomainRule::new(Dimension::VaccineProduct, DomainOrder::FirstSeen, &["all_types"]),
            ],
            metrics,
        }
    }

    /// Categorical dimensions of this family, in declaration order.
    pub fn dimensions(&self) -> impl Iterator<Item = Dimension> + '_ {
        self.domains.iter().map(|rule| rule.dimension)
    }

    pub fn has_dimension(&self, dimension: Dimension) -> bool {
        self.dimensions().any(|d| d == dimension)
    }

    /// Canonical name for a raw header; unmapped headers keep their text.
    pub fn canonical_column<'a>(&'a self, raw_header: &'a str) -> &'a str {
        self.column_renames
            .get(raw_header)
            .map_or(raw_header, String::as_str)
    }

    /// Apply the literal rewrite for `dimension`, if one matches.
    pub fn rewrite_value<'a>(&'a self, dimension: Dimension, raw: &'a str) -> &'a str {
        self.value_rewrites
            .get(&dimension)
            .and_then(|rewrites| rewrites.get(raw))
            .map_or(raw, String::as_str)
    }
}
