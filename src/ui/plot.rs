use chrono::{Datelike, NaiveDate};
use covid_dash::chart::SeriesPoint;
use covid_dash::Chart;
use eframe::egui::Ui;
use egui_plot::{AxisHints, GridMark, HPlacement, Legend, Line, Plot, PlotPoint, PlotPoints};

use crate::state::AppState;

// ---------------------------------------------------------------------------
// Time-series plot (central panel)
// ---------------------------------------------------------------------------

/// Dates are plotted as days since 0001-01-01.
fn date_to_x(date: NaiveDate) -> f64 {
    f64::from(date.num_days_from_ce())
}

fn x_to_date(x: f64) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(x.round() as i32)
}

/// Largest absolute value among the series on one axis.
fn axis_peak(chart: &Chart, secondary: bool) -> f64 {
    chart
        .series
        .iter()
        .filter(|s| s.secondary == secondary)
        .flat_map(|s| s.points.iter().filter_map(|p| p.value))
        .fold(0.0, |peak: f64, v| peak.max(v.abs()))
}

/// Factor mapping secondary-axis values onto the primary axis so both
/// peaks line up. 1.0 when either axis has nothing to scale by.
fn secondary_scale(chart: &Chart) -> f64 {
    let primary = axis_peak(chart, false);
    let secondary = axis_peak(chart, true);
    if primary > 0.0 && secondary > 0.0 {
        primary / secondary
    } else {
        1.0
    }
}

/// Split a series at missing values so gaps are drawn as gaps. Values are
/// multiplied by `scale`.
fn segments(points: &[SeriesPoint], scale: f64) -> Vec<Vec<[f64; 2]>> {
    let mut out = Vec::new();
    let mut current = Vec::new();
    for point in points {
        match point.value {
            Some(y) => current.push([date_to_x(point.date), y * scale]),
            None if !current.is_empty() => out.push(std::mem::take(&mut current)),
            None => {}
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// Render the current chart in the central panel.
pub fn chart_plot(ui: &mut Ui, state: &AppState) {
    let chart = match &state.chart {
        Some(chart) if !chart.is_empty() => chart,
        Some(_) => {
            ui.centered_and_justified(|ui: &mut Ui| {
                ui.heading("No data for the current selection");
            });
            return;
        }
        None => {
            ui.centered_and_justified(|ui: &mut Ui| {
                if state.is_loading() {
                    ui.spinner();
                } else {
                    ui.heading("Open a data folder to view charts  (File → Open data folder…)");
                }
            });
            return;
        }
    };

    ui.vertical_centered(|ui: &mut Ui| {
        ui.heading(&chart.title);
    });

    // Secondary series are drawn scaled onto the primary axis; the right
    // axis and the hover label undo the scale.
    let scale = secondary_scale(chart);
    let mut y_axes = vec![AxisHints::new_y().label(chart.y_label.as_str())];
    if let Some(label) = &chart.secondary_y_label {
        y_axes.push(
            AxisHints::new_y()
                .label(label.as_str())
                .placement(HPlacement::Right)
                .formatter(move |mark: GridMark, _range| format!("{:.0}", mark.value / scale)),
        );
    }
    let secondary_names: Vec<&str> = chart
        .series
        .iter()
        .filter(|s| s.secondary)
        .map(|s| s.name.as_str())
        .collect();

    Plot::new("chart_plot")
        .legend(Legend::default())
        .x_axis_label("Date")
        .custom_y_axes(y_axes)
        .x_axis_formatter(|mark: GridMark, _range| {
            x_to_date(mark.value)
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default()
        })
        .label_formatter(move |name: &str, value: &PlotPoint| {
            let date = x_to_date(value.x)
                .map(|d| d.to_string())
                .unwrap_or_default();
            let y = if secondary_names.iter().any(|n| *n == name) {
                value.y / scale
            } else {
                value.y
            };
            if name.is_empty() {
                format!("{date}\n{y:.2}")
            } else {
                format!("{name}\n{date}\n{y:.2}")
            }
        })
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true)
        .show(ui, |plot_ui| {
            for series in &chart.series {
                let color = state.colors.color_for(&series.name);
                let factor = if series.secondary { scale } else { 1.0 };
                for segment in segments(&series.points, factor) {
                    let points: PlotPoints = segment.into();
                    let line = Line::new(points)
                        .name(&series.name)
                        .color(color)
                        .width(1.5);
                    plot_ui.line(line);
                }
            }
        });
}
