use covid_dash::chart::Preview;
use covid_dash::NormalizedRow;
use eframe::egui::{self, RichText, Ui};
use egui_extras::{Column, TableBuilder};

use crate::state::AppState;

// ---------------------------------------------------------------------------
// Data preview table (central panel)
// ---------------------------------------------------------------------------

/// Cell text for each column of `row`: date, dimensions, then metrics.
fn cells(table: &Preview, row: &NormalizedRow) -> Vec<String> {
    let mut out = Vec::with_capacity(1 + table.dimensions.len() + table.metrics.len());
    out.push(row.date.to_string());
    out.extend(
        table
            .dimensions
            .iter()
            .map(|&d| row.dimension(d).unwrap_or_default().to_string()),
    );
    out.extend(
        table
            .metrics
            .iter()
            .map(|&m| row.metric(m).map(|v| v.to_string()).unwrap_or_default()),
    );
    out
}

/// Render the leading rows of the preview family.
pub fn preview_table(ui: &mut Ui, state: &AppState) {
    let Some(table) = &state.preview else {
        ui.centered_and_justified(|ui: &mut Ui| {
            if state.is_loading() {
                ui.spinner();
            } else {
                ui.heading("Open a data folder to preview it  (File → Open data folder…)");
            }
        });
        return;
    };

    ui.vertical_centered(|ui: &mut Ui| {
        ui.heading(format!("{} - first {} rows", table.family.label(), table.rows.len()));
    });
    ui.label(RichText::new(format!("{} rows in total", table.total)).weak());
    ui.separator();

    let headers: Vec<&str> = std::iter::once("date")
        .chain(table.dimensions.iter().map(|d| d.column()))
        .chain(table.metrics.iter().map(|m| m.column()))
        .collect();
    let text_height = egui::TextStyle::Body.resolve(ui.style()).size;

    egui::ScrollArea::horizontal().show(ui, |ui: &mut Ui| {
        TableBuilder::new(ui)
            .striped(true)
            .resizable(true)
            .cell_layout(egui::Layout::left_to_right(egui::Align::Center))
            .columns(Column::auto().at_least(60.0).clip(true), headers.len())
            .header(24.0, |mut header| {
                for name in &headers {
                    header.col(|ui: &mut Ui| {
                        ui.label(RichText::new(*name).strong().monospace());
                    });
                }
            })
            .body(|body| {
                body.rows(text_height + 8.0, table.rows.len(), |mut row| {
                    let values = cells(table, &table.rows[row.index()]);
                    for value in values {
                        row.col(|ui: &mut Ui| {
                            ui.label(RichText::new(value).monospace().small());
                        });
                    }
                });
            });
    });
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use covid_dash::{Dimension, FamilyId, Metric};

    use super::*;

    #[test]
    fn test_cells_follow_header_order_and_blank_missing_values() {
        let row = NormalizedRow {
            date: NaiveDate::from_ymd_opt(2021, 3, 1).unwrap(),
            dimensions: [(Dimension::State, "Ohio".to_string())].into(),
            metrics: [(Metric::DailyDeaths, Some(3.0)), (Metric::Deaths, None)].into(),
        };
        let table = Preview {
            family: FamilyId::DailyStateCounts,
            dimensions: vec![Dimension::State, Dimension::Variant],
            metrics: vec![Metric::DailyDeaths, Metric::Deaths],
            rows: vec![row.clone()],
            total: 1,
        };

        assert_eq!(cells(&table, &row), vec!["2021-03-01", "Ohio", "", "3", ""]);
    }
}
