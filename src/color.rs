use std::collections::BTreeMap;

use covid_dash::Chart;
use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

// ---------------------------------------------------------------------------
// Series palette
// ---------------------------------------------------------------------------

/// `n` distinct line colours from evenly spaced hues.
pub fn series_palette(n: usize) -> Vec<Color32> {
    (0..n)
        .map(|i| {
            let hue = 210.0 + (i as f32 / n as f32) * 360.0;
            let rgb: Srgb = Hsl::new(hue, 0.70, 0.50).into_color();
            let [r, g, b] = [rgb.red, rgb.green, rgb.blue].map(|c| (c.clamp(0.0, 1.0) * 255.0) as u8);
            Color32::from_rgb(r, g, b)
        })
        .collect()
}

/// Line colour per series name of the current chart.
#[derive(Debug, Clone, Default)]
pub struct SeriesColors {
    mapping: BTreeMap<String, Color32>,
}

impl SeriesColors {
    pub fn for_chart(chart: &Chart) -> Self {
        let palette = series_palette(chart.series.len());
        let mapping = chart
            .series
            .iter()
            .zip(palette)
            .map(|(series, color)| (series.name.clone(), color))
            .collect();
        SeriesColors { mapping }
    }

    pub fn color_for(&self, name: &str) -> Color32 {
        self.mapping.get(name).copied().unwrap_or(Color32::GRAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_colours_are_distinct() {
        let palette = series_palette(5);
        assert_eq!(palette.len(), 5);
        for (i, a) in palette.iter().enumerate() {
            assert!(palette[i + 1..].iter().all(|b| b != a));
        }
        assert!(series_palette(0).is_empty());
    }
}
