use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use covid_dash::chart::{
    preview, render_chart, ChartRequest, DateWindow, RateBasis, VaccinationStatus, PREVIEW_ROWS,
};
use covid_dash::data::family::FamilyRules;
use covid_dash::data::loader::FileSource;
use covid_dash::{DataError, DatasetRegistry, Dimension, FamilyId, FilterSpec, Metric};
use tempfile::TempDir;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Daily counts for three states over March 2021, rows written newest first.
fn daily_csv() -> String {
    let mut csv = String::from(
        "date,Province_State,Variant,daily_deaths,daily_fully_vaccinated,Deaths,People_Fully_Vaccinated\n",
    );
    for day in (1..=10).rev() {
        for (i, state) in ["California", "New York", "Texas"].iter().enumerate() {
            let deaths = day * 10 + i as u32;
            csv.push_str(&format!(
                "2021-03-{day:02},{state},Alpha,{deaths},{},{},{}\n",
                deaths * 100,
                deaths * 3,
                deaths * 1000
            ));
        }
    }
    csv
}

const HOSPITALIZATION: &str = "\
Rates of laboratory-confirmed COVID-19 hospitalizations by vaccination status
Data as of 2022-02-01
Week ending,Age group,Unvaccinated Rate,Vaccinated Rate,Boosted Rate
01/08/2022,5-Nov,3.1,0.9,
01/08/2022,18-49,20.5,4.2,1.1
01/08/2022,All ages,30.2,6.8,2.0
01/15/2022,Dec-17,5.7,1.3,
01/15/2022,5-Nov,3.4,1.0,
01/15/2022,65+,120.0,25.0,6.0
";

const OUTCOMES: &str = "\
Rates of COVID-19 cases or deaths by age group and vaccination status

outcome,MMWR week,Age group,Vaccine product,Crude vax IR,Crude unvax IR,Age adjusted vax IR,Age adjusted unvax IR
Case,202140,18-29,Pfizer,80.5,420.1,78.0,430.9
Case,202140,18-29,all_types,85.0,420.1,80.0,430.9
deaths,202140,18-29,Pfizer,0.1,2.3,0.1,2.5
Case,202141,18-29,Pfizer,82.5,430.0,79.5,440.0
";

fn data_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let write = |name: &str, body: &str| fs::write(dir.path().join(name), body).unwrap();
    write("us_covid19_vaccine_cases_deaths_daily_count_variant.csv", &daily_csv());
    write("covid_net_hospitalization_by_age.csv", HOSPITALIZATION);
    write("rates_by_vaccination_status.csv", OUTCOMES);
    dir
}

fn registry(dir: &Path) -> DatasetRegistry {
    DatasetRegistry::new(FamilyRules::catalog(), Arc::new(FileSource::new(dir)))
}

#[test]
fn test_single_state_week_returns_seven_ordered_rows() {
    let dir = data_dir();
    let registry = registry(dir.path());
    let spec = FilterSpec::between(date(2021, 3, 1), date(2021, 3, 7))
        .with_values(Dimension::State, ["California"]);

    let slice = registry.query(FamilyId::DailyStateCounts, &spec).unwrap();
    let rows = slice.to_rows();

    assert_eq!(rows.len(), 7);
    assert!(rows.iter().all(|r| r.dimension(Dimension::State) == Some("California")));
    let dates: Vec<NaiveDate> = rows.iter().map(|r| r.date).collect();
    let expected: Vec<NaiveDate> = (1..=7).map(|d| date(2021, 3, d)).collect();
    assert_eq!(dates, expected);
    assert_eq!(rows[0].metric(Metric::DailyDeaths), Some(10.0));
}

#[test]
fn test_preamble_skipped_and_age_bands_repaired() {
    let dir = data_dir();
    let registry = registry(dir.path());

    let ages = registry
        .list_dimension_values(FamilyId::HospitalizationByAge, Dimension::AgeGroup)
        .unwrap();
    assert_eq!(ages, vec!["12-17", "18-49", "5-11", "65+"]);

    let ds = registry.get(FamilyId::HospitalizationByAge).unwrap();
    assert_eq!(ds.len(), 6);
    assert!(ds
        .rows()
        .iter()
        .all(|r| r.dimension(Dimension::AgeGroup) != Some("5-Nov")));
    // The aggregate row is kept and can still be asked for by name.
    let spec = FilterSpec::covering(ds.date_span().unwrap())
        .with_values(Dimension::AgeGroup, ["All ages"]);
    assert_eq!(registry.query(FamilyId::HospitalizationByAge, &spec).unwrap().len(), 1);
}

#[test]
fn test_several_states_yield_one_series_each() {
    let dir = data_dir();
    let registry = registry(dir.path());

    let chart = render_chart(
        &registry,
        &ChartRequest::DailyDeaths {
            states: vec!["Texas".into(), "California".into()],
            window: DateWindow::Between(date(2021, 3, 4), date(2021, 3, 6)),
        },
    )
    .unwrap();

    let names: Vec<&str> = chart.series.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Texas", "California"]);
    for series in &chart.series {
        assert_eq!(series.points.len(), 3);
        assert!(series.points.windows(2).all(|w| w[0].date <= w[1].date));
    }
    assert_eq!(chart.series[0].points[0].value, Some(42.0));
}

#[test]
fn test_repeated_query_serializes_identically() {
    let dir = data_dir();
    let registry = registry(dir.path());
    let spec = FilterSpec::between(date(2021, 3, 2), date(2021, 3, 8))
        .with_values(Dimension::State, ["New York", "Texas"]);

    let first = serde_json::to_vec(&registry.query(FamilyId::DailyStateCounts, &spec).unwrap().to_rows()).unwrap();
    let second = serde_json::to_vec(&registry.query(FamilyId::DailyStateCounts, &spec).unwrap().to_rows()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_domain_lists_every_concrete_value() {
    let dir = data_dir();
    let registry = registry(dir.path());
    let ds = registry.get(FamilyId::DailyStateCounts).unwrap();

    let states = registry
        .list_dimension_values(FamilyId::DailyStateCounts, Dimension::State)
        .unwrap();
    for row in ds.rows() {
        let state = row.dimension(Dimension::State).unwrap();
        assert!(states.iter().any(|s| s == state));
    }
    assert_eq!(states.len(), 3);
}

#[test]
fn test_outcome_weeks_and_labels_are_canonical() {
    let dir = data_dir();
    let registry = registry(dir.path());

    let outcomes = registry
        .list_dimension_values(FamilyId::VaccineOutcomes, Dimension::Outcome)
        .unwrap();
    assert_eq!(outcomes, vec!["case", "death"]);
    let products = registry
        .list_dimension_values(FamilyId::VaccineOutcomes, Dimension::VaccineProduct)
        .unwrap();
    assert_eq!(products, vec!["Pfizer"]);

    let ds = registry.get(FamilyId::VaccineOutcomes).unwrap();
    let span = ds.date_span().unwrap();
    // MMWR 2021 week 40 ends Saturday 9 October.
    assert_eq!(span.first, date(2021, 10, 9));
    assert_eq!(span.last, date(2021, 10, 16));
}

#[test]
fn test_outcome_chart_plots_each_status() {
    let dir = data_dir();
    let registry = registry(dir.path());

    let chart = render_chart(
        &registry,
        &ChartRequest::OutcomeRates {
            booster: false,
            outcome: "case".into(),
            age_group: "18-29".into(),
            vaccine_product: "Pfizer".into(),
            basis: RateBasis::Crude,
            window: DateWindow::Full,
        },
    )
    .unwrap();

    assert_eq!(chart.series.len(), 2);
    let unvax: Vec<Option<f64>> = chart.series[0].points.iter().map(|p| p.value).collect();
    assert_eq!(unvax, vec![Some(420.1), Some(430.0)]);
}

#[test]
fn test_hospitalization_chart_leaves_gaps_for_missing_rates() {
    let dir = data_dir();
    let registry = registry(dir.path());

    let chart = render_chart(
        &registry,
        &ChartRequest::HospitalizationByAge {
            age_groups: vec!["5-11".into()],
            status: VaccinationStatus::Boosted,
            window: DateWindow::Full,
        },
    )
    .unwrap();

    assert_eq!(chart.series.len(), 1);
    assert_eq!(chart.series[0].points.len(), 2);
    assert!(chart.is_empty());
}

#[test]
fn test_unavailable_family_and_bad_filters() {
    let dir = data_dir();
    let registry = registry(dir.path());

    let err = registry.get(FamilyId::VaccineOutcomesBooster).unwrap_err();
    assert!(matches!(err, DataError::DatasetUnavailable { .. }));

    let reversed = FilterSpec::between(date(2021, 3, 5), date(2021, 3, 1));
    assert!(matches!(
        registry.query(FamilyId::DailyStateCounts, &reversed),
        Err(DataError::InvalidFilter(_))
    ));

    let outside = FilterSpec::between(date(2019, 1, 1), date(2019, 12, 31));
    assert!(registry
        .query(FamilyId::DailyStateCounts, &outside)
        .unwrap()
        .is_empty());
}

#[test]
fn test_preview_shows_leading_rows_in_date_order() {
    let dir = data_dir();
    let registry = registry(dir.path());

    let table = preview(&registry, FamilyId::DailyStateCounts, PREVIEW_ROWS).unwrap();
    assert_eq!(table.rows.len(), 10);
    assert_eq!(table.total, 30);
    assert_eq!(table.rows[0].date, date(2021, 3, 1));
    assert!(table.rows.windows(2).all(|w| w[0].date <= w[1].date));
    assert!(table.dimensions.contains(&Dimension::State));
    assert!(table.metrics.contains(&Metric::DailyDeaths));

    let short = preview(&registry, FamilyId::VaccineOutcomes, PREVIEW_ROWS).unwrap();
    assert_eq!(short.rows.len(), 4);
    assert_eq!(short.total, 4);
}

#[test]
fn test_vaccinations_ride_the_secondary_axis() {
    let dir = data_dir();
    let registry = registry(dir.path());

    let chart = render_chart(
        &registry,
        &ChartRequest::DeathsAndVaccinations {
            state: "Texas".into(),
            cumulative: false,
            window: DateWindow::Full,
        },
    )
    .unwrap();

    let flags: Vec<(&str, bool)> = chart
        .series
        .iter()
        .map(|s| (s.name.as_str(), s.secondary))
        .collect();
    assert_eq!(flags, vec![("Deaths", false), ("Fully Vaccinated", true)]);
    assert_eq!(chart.y_label, "Daily deaths");
    assert_eq!(chart.secondary_y_label.as_deref(), Some("Daily fully vaccinated"));

    let daily = render_chart(
        &registry,
        &ChartRequest::DailyDeaths {
            states: vec!["Texas".into()],
            window: DateWindow::Full,
        },
    )
    .unwrap();
    assert!(daily.secondary_y_label.is_none());
    assert!(daily.series.iter().all(|s| !s.secondary));
}
