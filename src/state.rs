use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::mpsc::{self, TryRecvError};
use std::sync::Arc;
use std::thread;

use chrono::NaiveDate;
use covid_dash::chart::{preview, Preview, RateBasis, VaccinationStatus, PREVIEW_ROWS};
use covid_dash::data::error::UnavailableReason;
use covid_dash::data::model::DateSpan;
use covid_dash::{
    render_chart, Chart, ChartKind, ChartRequest, DashboardConfig, DataError, DatasetRegistry,
    DateWindow, Dimension, FamilyId,
};

use crate::color::SeriesColors;

/// States plotted on first open when the data has them.
const DEFAULT_STATES: [&str; 2] = ["California", "New York"];

/// A family load running off the UI thread.
struct Loading {
    family: FamilyId,
    done: mpsc::Receiver<Result<(), DataError>>,
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    pub config: DashboardConfig,

    /// Owns the loaded families; rebuilt when the data folder changes.
    pub registry: Arc<DatasetRegistry>,
    loading: Option<Loading>,

    /// Which chart the user is looking at.
    pub kind: ChartKind,

    /// Family shown by the preview page.
    pub preview_family: FamilyId,
    pub preview: Option<Preview>,

    /// Legal values per selector dimension of the current family, in
    /// display order.
    pub options: BTreeMap<Dimension, Vec<String>>,

    /// Selected values per dimension. Single-select dimensions hold one.
    pub selections: BTreeMap<Dimension, BTreeSet<String>>,

    pub status: VaccinationStatus,
    pub basis: RateBasis,

    /// Plot the family's whole span instead of `start..=end`.
    pub full_span: bool,
    pub start: NaiveDate,
    pub end: NaiveDate,

    /// Observed span of the current family, once loaded.
    pub span: Option<DateSpan>,

    /// Last rendered chart (None if nothing could be rendered).
    pub chart: Option<Chart>,
    pub colors: SeriesColors,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl AppState {
    pub fn new(config: DashboardConfig) -> Self {
        let registry = Arc::new(config.build_registry());
        let mut state = Self {
            config,
            registry,
            loading: None,
            kind: ChartKind::default(),
            preview_family: ChartKind::Preview.family(),
            preview: None,
            options: BTreeMap::new(),
            selections: BTreeMap::new(),
            status: VaccinationStatus::Unvaccinated,
            basis: RateBasis::default(),
            full_span: true,
            start: NaiveDate::default(),
            end: NaiveDate::default(),
            span: None,
            chart: None,
            colors: SeriesColors::default(),
            status_message: None,
        };
        state.reload_options();
        state.refresh();
        state
    }

    /// Point the dashboard at another data folder.
    pub fn open_data_dir(&mut self, dir: PathBuf) {
        self.config.data_dir = dir;
        self.registry = Arc::new(self.config.build_registry());
        self.loading = None;
        self.selections.clear();
        self.span = None;
        self.reload_options();
        self.refresh();
    }

    pub fn set_kind(&mut self, kind: ChartKind) {
        if kind == self.kind {
            return;
        }
        self.kind = kind;
        self.reload_options();
        self.refresh();
    }

    pub fn set_preview_family(&mut self, family: FamilyId) {
        if family == self.preview_family {
            return;
        }
        self.preview_family = family;
        self.reload_options();
        self.refresh();
    }

    /// Family behind the current page.
    pub fn family(&self) -> FamilyId {
        match self.kind {
            ChartKind::Preview => self.preview_family,
            kind => kind.family(),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_some()
    }

    /// Family currently being read in the background, if any.
    pub fn loading_family(&self) -> Option<FamilyId> {
        self.loading.as_ref().map(|loading| loading.family)
    }

    /// Load `family` on a worker thread; `poll_loading` picks up the result.
    fn start_loading(&mut self, family: FamilyId) {
        if self.loading_family() == Some(family) {
            return;
        }
        let (sender, done) = mpsc::channel();
        let registry = Arc::clone(&self.registry);
        let spawned = thread::Builder::new()
            .name(format!("ui-load-{family}"))
            .spawn(move || {
                let result = registry.get(family).map(|_| ());
                // The page may have moved on; the registry keeps the dataset.
                let _ = sender.send(result);
            });

        match spawned {
            Ok(_) => {
                log::debug!("loading {family} in the background");
                self.loading = Some(Loading { family, done });
            }
            Err(e) => {
                self.loading = None;
                self.report(&DataError::DatasetUnavailable {
                    family,
                    reason: UnavailableReason::Spawn(Arc::new(e)),
                });
            }
        }
    }

    /// Pick up a finished background load. Called once per frame.
    pub fn poll_loading(&mut self) {
        let Some(loading) = &self.loading else {
            return;
        };
        let family = loading.family;
        let received = loading.done.try_recv();

        match received {
            Err(TryRecvError::Empty) => {}
            Ok(Ok(())) => {
                self.loading = None;
                self.reload_options();
                self.refresh();
            }
            Ok(Err(e)) => {
                self.loading = None;
                self.report(&e);
            }
            Err(TryRecvError::Disconnected) => {
                self.loading = None;
                self.report(&DataError::DatasetUnavailable {
                    family,
                    reason: UnavailableReason::LoaderLost,
                });
            }
        }
    }

    /// Re-read selector values and the date span for the current family,
    /// keeping whatever selections are still legal. An unloaded family is
    /// handed to a worker first.
    pub fn reload_options(&mut self) {
        let family = self.family();
        self.options.clear();

        if !self.registry.is_loaded(family) {
            self.start_loading(family);
            return;
        }
        self.loading = None;

        let dataset = match self.registry.get(family) {
            Ok(dataset) => dataset,
            Err(e) => {
                self.report(&e);
                self.span = None;
                return;
            }
        };

        for &dimension in self.kind.selectors() {
            match self.registry.list_dimension_values(family, dimension) {
                Ok(values) => {
                    self.options.insert(dimension, values);
                }
                Err(e) => self.report(&e),
            }
        }

        for &dimension in self.kind.selectors() {
            let options = self.options.get(&dimension).map(Vec::as_slice).unwrap_or(&[]);
            let selected = self.selections.entry(dimension).or_default();
            selected.retain(|v| options.contains(v));
            if self.kind.multi_select() != Some(dimension) {
                // Single-select: keep at most the first surviving value.
                let first = options.iter().find(|v| selected.contains(*v)).cloned();
                selected.clear();
                selected.extend(first);
            }
            if selected.is_empty() && self.kind.multi_select() == Some(Dimension::State) {
                selected.extend(
                    options
                        .iter()
                        .filter(|v| DEFAULT_STATES.contains(&v.as_str()))
                        .cloned(),
                );
            }
            if selected.is_empty() {
                selected.extend(options.first().cloned());
            }
        }

        let span = dataset.date_span();
        if span != self.span {
            if let Some(span) = span {
                self.start = span.first;
                self.end = span.last;
            }
            self.span = span;
        }
    }

    /// Re-render the chart (or preview table) from the current selections.
    /// Nothing is drawn until the family has loaded.
    pub fn refresh(&mut self) {
        let family = self.family();
        if self.is_loading() || !self.registry.is_loaded(family) {
            self.chart = None;
            self.preview = None;
            return;
        }

        if self.kind == ChartKind::Preview {
            self.chart = None;
            match preview(&self.registry, family, PREVIEW_ROWS) {
                Ok(table) => {
                    self.preview = Some(table);
                    self.status_message = None;
                }
                Err(e) => {
                    self.report(&e);
                    self.preview = None;
                }
            }
            return;
        }

        self.preview = None;
        let Some(request) = self.request() else {
            self.chart = None;
            return;
        };
        match render_chart(&self.registry, &request) {
            Ok(chart) => {
                self.colors = SeriesColors::for_chart(&chart);
                self.chart = Some(chart);
                self.status_message = None;
            }
            Err(e) => {
                self.report(&e);
                self.chart = None;
            }
        }
    }

    /// Toggle a value of the multi-select dimension.
    pub fn toggle_value(&mut self, dimension: Dimension, value: &str) {
        let selected = self.selections.entry(dimension).or_default();
        if !selected.remove(value) {
            selected.insert(value.to_string());
        }
        self.refresh();
    }

    /// Replace the selection of a single-select dimension.
    pub fn select_only(&mut self, dimension: Dimension, value: &str) {
        self.selections
            .insert(dimension, BTreeSet::from([value.to_string()]));
        self.refresh();
    }

    pub fn select_all(&mut self, dimension: Dimension) {
        if let Some(values) = self.options.get(&dimension) {
            self.selections
                .insert(dimension, values.iter().cloned().collect());
            self.refresh();
        }
    }

    pub fn select_none(&mut self, dimension: Dimension) {
        self.selections.insert(dimension, BTreeSet::new());
        self.refresh();
    }

    /// Selected values of `dimension`, in display order.
    pub fn selected(&self, dimension: Dimension) -> Vec<String> {
        let (Some(options), Some(selected)) =
            (self.options.get(&dimension), self.selections.get(&dimension))
        else {
            return Vec::new();
        };
        options
            .iter()
            .filter(|v| selected.contains(*v))
            .cloned()
            .collect()
    }

    pub fn is_selected(&self, dimension: Dimension, value: &str) -> bool {
        self.selections
            .get(&dimension)
            .is_some_and(|selected| selected.contains(value))
    }

    fn single(&self, dimension: Dimension) -> Option<String> {
        self.selected(dimension).into_iter().next()
    }

    fn window(&self) -> DateWindow {
        if self.full_span {
            DateWindow::Full
        } else {
            DateWindow::Between(self.start, self.end)
        }
    }

    /// The chart request the current selections describe; None on the
    /// preview page or while a single-select dimension has nothing to
    /// choose from.
    pub fn request(&self) -> Option<ChartRequest> {
        let window = self.window();
        let request = match self.kind {
            ChartKind::Preview => return None,
            ChartKind::DailyDeaths => ChartRequest::DailyDeaths {
                states: self.selected(Dimension::State),
                window,
            },
            ChartKind::DailyVaccinations => ChartRequest::DailyVaccinations {
                states: self.selected(Dimension::State),
                window,
            },
            ChartKind::DeathsAndVaccinations | ChartKind::OverallDeathsAndVaccinations => {
                ChartRequest::DeathsAndVaccinations {
                    state: self.single(Dimension::State)?,
                    cumulative: self.kind == ChartKind::OverallDeathsAndVaccinations,
                    window,
                }
            }
            ChartKind::VariantDeathsAndVaccinations => ChartRequest::VariantDeathsAndVaccinations {
                state: self.single(Dimension::State)?,
                variant: self.single(Dimension::Variant)?,
            },
            ChartKind::HospitalizationByAge => ChartRequest::HospitalizationByAge {
                age_groups: self.selected(Dimension::AgeGroup),
                status: self.status,
                window,
            },
            ChartKind::HospitalizationByStatus => ChartRequest::HospitalizationByStatus {
                age_group: self.single(Dimension::AgeGroup)?,
                window,
            },
            ChartKind::OutcomeRates | ChartKind::BoosterOutcomeRates => ChartRequest::OutcomeRates {
                booster: self.kind == ChartKind::BoosterOutcomeRates,
                outcome: self.single(Dimension::Outcome)?,
                age_group: self.single(Dimension::AgeGroup)?,
                vaccine_product: self.single(Dimension::VaccineProduct)?,
                basis: self.basis,
                window,
            },
        };
        Some(request)
    }

    fn report(&mut self, error: &DataError) {
        log::error!("{}: {error}", self.kind.label());
        self.status_message = Some(format!("Error: {error}"));
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    const DAILY: &str = "\
date,Province_State,Variant,daily_deaths,daily_fully_vaccinated,Deaths,People_Fully_Vaccinated
2021-03-01,Ohio,Alpha,3,100,10,1000
2021-03-01,Texas,Alpha,5,300,20,3000
2021-03-02,Ohio,Alpha,,120,10,1120
2021-03-02,Texas,Alpha,4,310,24,3310
";

    /// Poll until the background load has been picked up.
    fn settle(state: &mut AppState) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while state.is_loading() {
            assert!(Instant::now() < deadline, "background load never finished");
            thread::sleep(Duration::from_millis(5));
            state.poll_loading();
        }
    }

    fn state_with(dir: &std::path::Path, daily: &str) -> AppState {
        std::fs::write(
            dir.join("us_covid19_vaccine_cases_deaths_daily_count_variant.csv"),
            daily,
        )
        .unwrap();
        let mut state = AppState::new(DashboardConfig {
            data_dir: dir.to_path_buf(),
            ..DashboardConfig::default()
        });
        settle(&mut state);
        state
    }

    fn state_over(dir: &std::path::Path) -> AppState {
        let mut state = state_with(dir, DAILY);
        state.set_kind(ChartKind::DailyDeaths);
        state
    }

    #[test]
    fn test_first_load_runs_off_the_ui_thread() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("us_covid19_vaccine_cases_deaths_daily_count_variant.csv"),
            DAILY,
        )
        .unwrap();
        let mut state = AppState::new(DashboardConfig {
            data_dir: dir.path().to_path_buf(),
            ..DashboardConfig::default()
        });

        // Construction hands the load to a worker and returns at once.
        assert_eq!(state.loading_family(), Some(FamilyId::DailyStateCounts));
        assert!(state.preview.is_none());

        settle(&mut state);
        assert!(state.registry.is_loaded(FamilyId::DailyStateCounts));
        assert_eq!(state.preview.as_ref().map(|p| p.total), Some(4));
    }

    #[test]
    fn test_preview_is_the_landing_page() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with(dir.path(), DAILY);

        assert_eq!(state.kind, ChartKind::Preview);
        assert!(state.chart.is_none());
        let table = state.preview.as_ref().unwrap();
        assert_eq!(table.family, FamilyId::DailyStateCounts);
        assert_eq!(table.rows.len(), 4);
        assert_eq!(table.rows[0].dimension(Dimension::State), Some("Ohio"));
        assert!(state.status_message.is_none());
    }

    #[test]
    fn test_preview_of_missing_family_reports_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state_with(dir.path(), DAILY);
        state.set_preview_family(FamilyId::VaccineOutcomes);
        settle(&mut state);

        assert!(state.preview.is_none());
        assert!(state
            .status_message
            .as_deref()
            .is_some_and(|msg| msg.contains("unavailable")));
    }

    #[test]
    fn test_defaults_select_first_state_and_full_span() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_over(dir.path());

        assert_eq!(state.selected(Dimension::State), vec!["Ohio".to_string()]);
        assert_eq!(state.start, NaiveDate::from_ymd_opt(2021, 3, 1).unwrap());
        assert_eq!(state.end, NaiveDate::from_ymd_opt(2021, 3, 2).unwrap());

        let chart = state.chart.as_ref().unwrap();
        assert_eq!(chart.series.len(), 1);
        let values: Vec<Option<f64>> = chart.series[0].points.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![Some(3.0), None]);
    }

    #[test]
    fn test_defaults_prefer_california_and_new_york() {
        let dir = tempfile::tempdir().unwrap();
        let daily = "\
date,Province_State,Variant,daily_deaths,daily_fully_vaccinated,Deaths,People_Fully_Vaccinated
2021-03-01,Alabama,Alpha,1,10,1,10
2021-03-01,California,Alpha,2,20,2,20
2021-03-01,New York,Alpha,3,30,3,30
2021-03-01,Texas,Alpha,4,40,4,40
";
        let mut state = state_with(dir.path(), daily);
        state.set_kind(ChartKind::DailyVaccinations);

        assert_eq!(
            state.selected(Dimension::State),
            vec!["California".to_string(), "New York".to_string()]
        );
        let names: Vec<&str> = state
            .chart
            .as_ref()
            .unwrap()
            .series
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["California", "New York"]);

        // Single-select pages still start from the first state.
        state.set_kind(ChartKind::DeathsAndVaccinations);
        assert_eq!(state.selected(Dimension::State), vec!["California".to_string()]);
    }

    #[test]
    fn test_toggle_adds_a_series() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state_over(dir.path());
        state.toggle_value(Dimension::State, "Texas");

        let names: Vec<&str> = state
            .chart
            .as_ref()
            .unwrap()
            .series
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["Ohio", "Texas"]);
    }

    #[test]
    fn test_reversed_window_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state_over(dir.path());
        state.full_span = false;
        std::mem::swap(&mut state.start, &mut state.end);
        state.refresh();

        assert!(state.chart.is_none());
        assert!(state.status_message.is_some());
    }

    #[test]
    fn test_missing_family_reports_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state_over(dir.path());
        state.set_kind(ChartKind::HospitalizationByAge);
        settle(&mut state);

        assert!(state.chart.is_none());
        assert!(state
            .status_message
            .as_deref()
            .is_some_and(|msg| msg.contains("unavailable")));
    }
}
