//! SDMX time period parsing.
//!
//! Periods come in reporting formats (`2025`, `2025-Q1`, `2025-M03`, `2025-S2`,
//! `2025-W07`) as well as plain ISO dates. Observations are dated at the end of
//! their period; user-supplied bounds are read as the start of theirs.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Observation frequency of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frequency {
    Annual,
    Semiannual,
    Quarterly,
    Monthly,
    Weekly,
    Daily,
}

impl Frequency {
    /// Parses an SDMX frequency code (`A`, `Q`, `M`...) or its English name.
    pub fn parse(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "A" | "Y" | "ANNUAL" => Some(Self::Annual),
            "S" | "SEMIANNUAL" => Some(Self::Semiannual),
            "Q" | "QUARTERLY" => Some(Self::Quarterly),
            "M" | "MONTHLY" => Some(Self::Monthly),
            "W" | "WEEKLY" => Some(Self::Weekly),
            "D" | "B" | "DAILY" => Some(Self::Daily),
            _ => None,
        }
    }

    pub const fn code(self) -> &'static str {
        match self {
            Self::Annual => "A",
            Self::Semiannual => "S",
            Self::Quarterly => "Q",
            Self::Monthly => "M",
            Self::Weekly => "W",
            Self::Daily => "D",
        }
    }
}

/// Which end of a period a parsed date should fall on.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Edge {
    Start,
    End,
}

/// Parses a period and returns the last day it covers.
pub fn parse_period_end(period: &str) -> Option<NaiveDate> {
    parse_period(period, Edge::End)
}

/// Parses a period and returns the first day it covers.
pub fn parse_period_start(period: &str) -> Option<NaiveDate> {
    parse_period(period, Edge::Start)
}

/// Parses a user-supplied date bound (`2020`, `2020-03`, `2020-03-15`, `2020-Q2`).
pub fn parse_date_bound(value: &str) -> Option<NaiveDate> {
    parse_period_start(value)
}

fn parse_period(period: &str, edge: Edge) -> Option<NaiveDate> {
    let period = period.trim();
    if period.len() < 4 || !period.is_char_boundary(4) {
        return None;
    }
    let year: i32 = period[..4].parse().ok()?;
    let rest = period[4..].trim_start_matches('-');

    if rest.is_empty() {
        return span(year, 1, year, 12, edge);
    }

    if let Ok(date) = NaiveDate::parse_from_str(period, "%Y-%m-%d") {
        return Some(date);
    }

    if !rest.is_char_boundary(1) {
        return None;
    }
    let (tag, number) = rest.split_at(1);
    let tag = tag.to_ascii_uppercase();
    match (tag.as_str(), number.parse::<u32>()) {
        ("Q", Ok(q @ 1..=4)) => span(year, q * 3 - 2, year, q * 3, edge),
        ("S", Ok(s @ 1..=2)) => span(year, s * 6 - 5, year, s * 6, edge),
        ("M", Ok(m @ 1..=12)) => span(year, m, year, m, edge),
        ("A", Ok(1)) => span(year, 1, year, 12, edge),
        ("W", Ok(w)) => {
            let weekday = if edge == Edge::Start { Weekday::Mon } else { Weekday::Sun };
            NaiveDate::from_isoywd_opt(year, w, weekday)
        }
        _ => match rest.parse::<u32>() {
            Ok(m @ 1..=12) => span(year, m, year, m, edge),
            _ => None,
        },
    }
}

fn span(
    start_year: i32,
    start_month: u32,
    end_year: i32,
    end_month: u32,
    edge: Edge,
) -> Option<NaiveDate> {
    match edge {
        Edge::Start => NaiveDate::from_ymd_opt(start_year, start_month, 1),
        Edge::End => month_end(end_year, end_month),
    }
}

/// Last day of the given month.
pub fn month_end(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}

/// First day of the month following `date`.
pub fn next_month_start(date: NaiveDate) -> Option<NaiveDate> {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
}
