use covid_dash::chart::{RateBasis, VaccinationStatus};
use covid_dash::{ChartKind, Dimension, FamilyId};
use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};
use egui_extras::DatePickerButton;

use crate::state::AppState;

// ---------------------------------------------------------------------------
// Left side panel – chart selectors
// ---------------------------------------------------------------------------

/// Render the left selector panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Chart");
    ui.separator();

    let current = state.kind;
    egui::ComboBox::from_id_salt("chart_kind")
        .selected_text(current.label())
        .width(ui.available_width())
        .show_ui(ui, |ui: &mut Ui| {
            for kind in ChartKind::ALL {
                if ui.selectable_label(current == kind, kind.label()).clicked() {
                    state.set_kind(kind);
                }
            }
        });
    ui.separator();

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            if state.kind == ChartKind::Preview {
                preview_family(ui, state);
            }

            for &dimension in state.kind.selectors() {
                if state.kind.multi_select() == Some(dimension) {
                    multi_selector(ui, state, dimension);
                } else {
                    single_selector(ui, state, dimension);
                }
            }

            match state.kind {
                ChartKind::HospitalizationByAge => {
                    ui.strong("Vaccination status");
                    let mut changed = false;
                    for status in VaccinationStatus::ALL {
                        changed |= ui
                            .radio_value(&mut state.status, status, status.label())
                            .changed();
                    }
                    if changed {
                        state.refresh();
                    }
                    ui.separator();
                }
                ChartKind::OutcomeRates | ChartKind::BoosterOutcomeRates => {
                    ui.strong("Rates");
                    let crude = ui
                        .radio_value(&mut state.basis, RateBasis::Crude, "Crude")
                        .changed();
                    let adjusted = ui
                        .radio_value(&mut state.basis, RateBasis::AgeAdjusted, "Age adjusted")
                        .changed();
                    if crude || adjusted {
                        state.refresh();
                    }
                    ui.separator();
                }
                _ => {}
            }

            if state.kind.uses_window() {
                date_window(ui, state);
            }
        });
}

fn preview_family(ui: &mut Ui, state: &mut AppState) {
    let current = state.preview_family;
    ui.strong("Dataset");
    egui::ComboBox::from_id_salt("preview_family")
        .selected_text(current.label())
        .width(ui.available_width())
        .show_ui(ui, |ui: &mut Ui| {
            for family in FamilyId::ALL {
                if ui.selectable_label(current == family, family.label()).clicked() {
                    state.set_preview_family(family);
                }
            }
        });
    ui.separator();
}

/// Checkbox list with All/None buttons; one series per checked value.
fn multi_selector(ui: &mut Ui, state: &mut AppState, dimension: Dimension) {
    let values = state.options.get(&dimension).cloned().unwrap_or_default();
    let n_selected = state.selected(dimension).len();
    let header_text = format!("{}  ({n_selected}/{})", dimension.label(), values.len());

    egui::CollapsingHeader::new(RichText::new(header_text).strong())
        .id_salt(dimension.column())
        .default_open(true)
        .show(ui, |ui: &mut Ui| {
            ui.horizontal(|ui: &mut Ui| {
                if ui.small_button("All").clicked() {
                    state.select_all(dimension);
                }
                if ui.small_button("None").clicked() {
                    state.select_none(dimension);
                }
            });

            for value in &values {
                let mut checked = state.is_selected(dimension, value);
                let mut text = RichText::new(value);
                if checked {
                    text = text.color(state.colors.color_for(value));
                }
                if ui.checkbox(&mut checked, text).changed() {
                    state.toggle_value(dimension, value);
                }
            }
        });
    ui.separator();
}

fn single_selector(ui: &mut Ui, state: &mut AppState, dimension: Dimension) {
    let values = state.options.get(&dimension).cloned().unwrap_or_default();
    let current = state.selected(dimension).into_iter().next().unwrap_or_default();

    ui.strong(dimension.label());
    egui::ComboBox::from_id_salt(dimension.column())
        .selected_text(&current)
        .width(ui.available_width())
        .show_ui(ui, |ui: &mut Ui| {
            for value in &values {
                if ui.selectable_label(current == *value, value).clicked() {
                    state.select_only(dimension, value);
                }
            }
        });
    ui.separator();
}

fn date_window(ui: &mut Ui, state: &mut AppState) {
    ui.strong("Dates");
    let mut changed = ui.checkbox(&mut state.full_span, "Full span").changed();

    if !state.full_span {
        egui::Grid::new("date_window")
            .num_columns(2)
            .show(ui, |ui: &mut Ui| {
                ui.label("From");
                changed |= ui
                    .add(DatePickerButton::new(&mut state.start).id_salt("window_start"))
                    .changed();
                ui.end_row();

                ui.label("To");
                changed |= ui
                    .add(DatePickerButton::new(&mut state.end).id_salt("window_end"))
                    .changed();
                ui.end_row();
            });
    }

    if let Some(span) = state.span {
        ui.label(RichText::new(format!("Data: {} to {}", span.first, span.last)).weak());
    }

    if changed {
        state.refresh();
    }
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open data folder…").clicked() {
                open_folder_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        ui.label(format!("Data: {}", state.config.data_dir.display()));

        if let Some(family) = state.loading_family() {
            ui.separator();
            ui.spinner();
            ui.label(format!("Loading {}…", family.label()));
        }

        if let Some(chart) = &state.chart {
            ui.separator();
            let points: usize = chart.series.iter().map(|s| s.points.len()).sum();
            ui.label(format!("{} series, {points} points", chart.series.len()));
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// Folder dialog
// ---------------------------------------------------------------------------

pub fn open_folder_dialog(state: &mut AppState) {
    let folder = rfd::FileDialog::new()
        .set_title("Open COVID-19 data folder")
        .set_directory(&state.config.data_dir)
        .pick_folder();

    if let Some(dir) = folder {
        log::info!("switching data folder to {}", dir.display());
        state.open_data_dir(dir);
    }
}
