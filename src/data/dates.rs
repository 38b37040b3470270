//! Date-cell parsing for the formats the upstream files use.

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime};

/// One accepted spelling of a date cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    /// `2021-01-31`
    IsoDate,
    /// `2021-01-31T00:00:00` or `2021-01-31 00:00:00`; the time is dropped.
    IsoDateTime,
    /// `01/31/2021`
    UsSlash,
    /// MMWR epidemiological week code `YYYYWW`, resolved to the Saturday
    /// that ends the week.
    MmwrWeek,
}

impl DateFormat {
    pub fn parse(self, raw: &str) -> Option<NaiveDate> {
        let raw = raw.trim();
        match self {
            DateFormat::IsoDate => NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok(),
            DateFormat::IsoDateTime => ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date()),
            DateFormat::UsSlash => NaiveDate::parse_from_str(raw, "%m/%d/%Y").ok(),
            DateFormat::MmwrWeek => parse_mmwr_code(raw),
        }
    }
}

/// Try each format in order and return the first successful parse.
pub fn parse_date(raw: &str, formats: &[DateFormat]) -> Option<NaiveDate> {
    formats.iter().find_map(|format| format.parse(raw))
}

fn parse_mmwr_code(raw: &str) -> Option<NaiveDate> {
    if raw.len() != 6 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = raw[..4].parse().ok()?;
    let week: u32 = raw[4..].parse().ok()?;
    mmwr_week_ending(year, week)
}

/// Sunday that starts MMWR week 1: the Sunday-to-Saturday week holding January 4th.
fn mmwr_week_one_start(year: i32) -> Option<NaiveDate> {
    let jan4 = NaiveDate::from_ymd_opt(year, 1, 4)?;
    let back = u64::from(jan4.weekday().num_days_from_sunday());
    jan4.checked_sub_days(Days::new(back))
}

/// Saturday ending MMWR week `week` of `year`, or `None` when the year has
/// no such week (week 0, or week 53 in a 52-week year).
pub fn mmwr_week_ending(year: i32, week: u32) -> Option<NaiveDate> {
    if week == 0 {
        return None;
    }
    let start = mmwr_week_one_start(year)?.checked_add_days(Days::new(u64::from(week - 1) * 7))?;
    if start >= mmwr_week_one_start(year + 1)? {
        return None;
    }
    start.checked_add_days(Days::new(6))
}
