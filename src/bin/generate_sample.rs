//! Writes a small synthetic data folder with one CSV per dataset family.
//!
//! Usage: `generate_sample [DIR]` (default `data`). The files reproduce the
//! quirks of the published downloads: preamble lines above the header,
//! spreadsheet-mangled age bands, aggregate rows and empty cells.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};

/// Deterministic splitmix64 generator, enough for plausible noise.
struct SampleRng(u64);

impl SampleRng {
    fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform in `[0, 1)`.
    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// `base` scaled by a random factor in `[1 - spread, 1 + spread)`.
    fn jitter(&mut self, base: f64, spread: f64) -> f64 {
        base * (1.0 + spread * (2.0 * self.next_f64() - 1.0))
    }
}

fn fmt_rate(value: f64) -> String {
    format!("{value:.2}")
}

/// Open `path` and write the preamble lines that precede the header.
fn create_with_preamble(path: &Path, preamble: &[&str]) -> Result<csv::Writer<File>> {
    let mut file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    for line in preamble {
        writeln!(file, "{line}")?;
    }
    Ok(csv::Writer::from_writer(file))
}

// ---------------------------------------------------------------------------
// Families
// ---------------------------------------------------------------------------

fn daily_state_counts(dir: &Path, rng: &mut SampleRng) -> Result<usize> {
    const STATES: [(&str, f64); 5] = [
        ("California", 3.9e7),
        ("Texas", 2.9e7),
        ("Florida", 2.2e7),
        ("New York", 2.0e7),
        ("Ohio", 1.2e7),
    ];
    let path = dir.join("us_covid19_vaccine_cases_deaths_daily_count_variant.csv");
    let mut wtr = create_with_preamble(&path, &[])?;
    wtr.write_record([
        "date",
        "Province_State",
        "Variant",
        "daily_deaths",
        "daily_fully_vaccinated",
        "Deaths",
        "People_Fully_Vaccinated",
    ])?;

    let start = NaiveDate::from_ymd_opt(2021, 1, 1).context("invalid start date")?;
    let mut rows = 0;
    for (state, population) in STATES {
        let mut deaths = population * 1.2e-3;
        let mut vaccinated = 0.0;
        for day in 0..180 {
            let date = start + Duration::days(day);
            let variant = match day {
                0..=59 => "Alpha",
                60..=129 => "Delta",
                _ => "Omicron",
            };
            let wave = 1.0 + 0.8 * ((day as f64) / 28.0).sin().abs();
            let daily_deaths = rng.jitter(population * 2.5e-6 * wave, 0.3).round();
            deaths += daily_deaths;

            // Vaccination reporting starts mid-January and skips some Sundays.
            let reported = day >= 14 && day % 7 != 2;
            let daily_vax = if reported {
                rng.jitter(population * 3.0e-3, 0.4).round()
            } else {
                0.0
            };
            vaccinated += daily_vax;

            let (daily_vax_cell, vaccinated_cell) = if reported {
                (daily_vax.to_string(), vaccinated.to_string())
            } else {
                (String::new(), String::new())
            };
            wtr.write_record([
                date.to_string(),
                state.to_string(),
                variant.to_string(),
                daily_deaths.to_string(),
                daily_vax_cell,
                deaths.round().to_string(),
                vaccinated_cell,
            ])?;
            rows += 1;
        }
    }
    wtr.flush()?;
    Ok(rows)
}

fn hospitalization_by_age(dir: &Path, rng: &mut SampleRng) -> Result<usize> {
    // Spreadsheet-mangled bands are written the way the downloads carry them.
    const AGE_GROUPS: [(&str, f64); 6] = [
        ("5-Nov", 8.0),
        ("Dec-17", 12.0),
        ("18-49", 30.0),
        ("50-64", 60.0),
        ("65+", 140.0),
        ("All ages", 45.0),
    ];
    let path = dir.join("covid_net_hospitalization_by_age.csv");
    let mut wtr = create_with_preamble(
        &path,
        &[
            "Rates of COVID-19-Associated Hospitalization by Vaccination Status",
            "Source: synthetic sample",
        ],
    )?;
    wtr.write_record([
        "Week ending",
        "Age group",
        "Unvaccinated Rate",
        "Vaccinated Rate",
        "Boosted Rate",
    ])?;

    let first = NaiveDate::from_ymd_opt(2021, 1, 9).context("invalid start date")?;
    let mut rows = 0;
    for week in 0..52 {
        let week_ending = first + Duration::weeks(week);
        for (age_group, base) in AGE_GROUPS {
            let unvax = rng.jitter(base, 0.2);
            let vax = rng.jitter(base * 0.25, 0.2);
            // Boosters only appear in the last quarter of the year.
            let boosted = if week >= 39 {
                fmt_rate(rng.jitter(base * 0.08, 0.2))
            } else {
                String::new()
            };
            wtr.write_record([
                week_ending.format("%m/%d/%Y").to_string(),
                age_group.to_string(),
                fmt_rate(unvax),
                fmt_rate(vax),
                boosted,
            ])?;
            rows += 1;
        }
    }
    wtr.flush()?;
    Ok(rows)
}

const OUTCOMES: [(&str, f64); 2] = [("Case", 400.0), ("death", 4.0)];
const OUTCOME_AGE_GROUPS: [(&str, f64); 6] = [
    ("12-17", 0.6),
    ("18-29", 0.8),
    ("30-49", 1.0),
    ("50-64", 1.4),
    ("65+", 2.5),
    ("all_ages_adj", 1.2),
];
const PRODUCTS: [(&str, f64); 4] = [
    ("Janssen", 1.4),
    ("Moderna", 0.8),
    ("Pfizer", 0.9),
    ("all_types", 1.0),
];

fn vaccine_outcomes(dir: &Path, rng: &mut SampleRng) -> Result<usize> {
    let path = dir.join("rates_by_vaccination_status.csv");
    let mut wtr = create_with_preamble(
        &path,
        &[
            "Rates of COVID-19 Cases or Deaths by Age Group and Vaccination Status",
            "",
        ],
    )?;
    wtr.write_record([
        "outcome",
        "MMWR week",
        "Age group",
        "Vaccine product",
        "Crude vax IR",
        "Crude unvax IR",
        "Age adjusted vax IR",
        "Age adjusted unvax IR",
    ])?;

    let mut rows = 0;
    for week in 14..=52 {
        for (outcome, base) in OUTCOMES {
            for (age_group, age_factor) in OUTCOME_AGE_GROUPS {
                for (product, product_factor) in PRODUCTS {
                    let unvax = rng.jitter(base * age_factor, 0.15);
                    let vax = rng.jitter(base * age_factor * product_factor * 0.2, 0.15);
                    wtr.write_record([
                        outcome.to_string(),
                        format!("2021{week:02}"),
                        age_group.to_string(),
                        product.to_string(),
                        fmt_rate(vax),
                        fmt_rate(unvax),
                        fmt_rate(vax * 0.95),
                        fmt_rate(unvax * 1.05),
                    ])?;
                    rows += 1;
                }
            }
        }
    }
    wtr.flush()?;
    Ok(rows)
}

fn vaccine_outcomes_booster(dir: &Path, rng: &mut SampleRng) -> Result<usize> {
    let path = dir.join("rates_by_vaccination_status_booster.csv");
    let mut wtr = create_with_preamble(
        &path,
        &[
            "Rates of COVID-19 Cases or Deaths by Age Group, Vaccination and Booster Status",
            "",
        ],
    )?;
    wtr.write_record([
        "outcome",
        "mmwr_week",
        "age_group",
        "vaccine_product",
        "crude_vax_ir",
        "crude_unvax_ir",
        "crude_booster_ir",
        "age_adj_vax_ir",
        "age_adj_unvax_ir",
        "age_adj_booster_ir",
    ])?;

    let mut rows = 0;
    for week in 38..=52 {
        for (outcome, base) in OUTCOMES {
            for (age_group, age_factor) in OUTCOME_AGE_GROUPS {
                // The booster release has no Janssen breakdown.
                for (product, product_factor) in PRODUCTS.iter().filter(|(p, _)| *p != "Janssen") {
                    let unvax = rng.jitter(base * age_factor, 0.15);
                    let vax = rng.jitter(base * age_factor * product_factor * 0.25, 0.15);
                    let boosted = rng.jitter(base * age_factor * product_factor * 0.05, 0.15);
                    wtr.write_record([
                        outcome.to_lowercase(),
                        format!("2021{week:02}"),
                        age_group.to_string(),
                        product.to_string(),
                        fmt_rate(vax),
                        fmt_rate(unvax),
                        fmt_rate(boosted),
                        fmt_rate(vax * 0.95),
                        fmt_rate(unvax * 1.05),
                        fmt_rate(boosted * 0.9),
                    ])?;
                    rows += 1;
                }
            }
        }
    }
    wtr.flush()?;
    Ok(rows)
}

fn main() -> Result<()> {
    env_logger::init();

    let dir = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data"));
    std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

    let mut rng = SampleRng(42);
    let written = [
        ("daily state counts", daily_state_counts(&dir, &mut rng)?),
        ("hospitalization by age", hospitalization_by_age(&dir, &mut rng)?),
        ("vaccine outcomes", vaccine_outcomes(&dir, &mut rng)?),
        ("vaccine outcomes (booster)", vaccine_outcomes_booster(&dir, &mut rng)?),
    ];
    for (family, rows) in written {
        log::info!("{family}: {rows} rows");
    }
    println!("Wrote sample data to {}", dir.display());
    Ok(())
}
