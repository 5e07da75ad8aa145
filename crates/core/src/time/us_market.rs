use anyhow::Result;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CalendarId {
    Nyse,
}

/// Trading-session calendar for a single named exchange. Construction fails
/// on an unknown calendar id; a constructed calendar is deterministic.
#[derive(Debug, Clone)]
pub struct TradingCalendar {
    id: CalendarId,
    extra_closures: HashSet<NaiveDate>,
}

impl TradingCalendar {
    pub fn from_id(id: &str) -> Result<Self> {
        let id = match id.trim().to_ascii_uppercase().as_str() {
            "NYSE" | "XNYS" => CalendarId::Nyse,
            other => anyhow::bail!("unknown market calendar: {other}"),
        };
        Ok(Self {
            id,
            extra_closures: HashSet::new(),
        })
    }

    // Ad-hoc full-day closures (e.g. national days of mourning) that the
    // computed holiday rules cannot know about.
    pub fn with_extra_closures(mut self, closures: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.extra_closures.extend(closures);
        self
    }

    /// Trading sessions in [start, end], ascending, both bounds inclusive.
    pub fn trading_days(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        if start > end {
            return Vec::new();
        }

        let mut holidays = HashSet::new();
        for year in start.year()..=end.year() {
            match self.id {
                CalendarId::Nyse => nyse_holidays(year, &mut holidays),
            }
        }

        let mut out = Vec::new();
        let mut cur = start;
        while cur <= end {
            if !is_weekend(cur) && !holidays.contains(&cur) && !self.extra_closures.contains(&cur) {
                out.push(cur);
            }
            cur += Duration::days(1);
        }
        out
    }
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

fn nyse_holidays(year: i32, out: &mut HashSet<NaiveDate>) {
    // New Year's Day rolls Sunday -> Monday; a Saturday Jan 1 is not
    // observed (the preceding Friday stays a full session).
    if let Some(jan1) = NaiveDate::from_ymd_opt(year, 1, 1) {
        match jan1.weekday() {
            Weekday::Sun => {
                out.insert(jan1 + Duration::days(1));
            }
            Weekday::Sat => {}
            _ => {
                out.insert(jan1);
            }
        }
    }

    if year >= 1998 {
        // Martin Luther King Jr. Day
        if let Some(d) = NaiveDate::from_weekday_of_month_opt(year, 1, Weekday::Mon, 3) {
            out.insert(d);
        }
    }

    // Washington's Birthday
    if let Some(d) = NaiveDate::from_weekday_of_month_opt(year, 2, Weekday::Mon, 3) {
        out.insert(d);
    }

    out.insert(easter_sunday(year) - Duration::days(2)); // Good Friday

    // Memorial Day
    if let Some(d) = last_monday_of_may(year) {
        out.insert(d);
    }

    if year >= 2022 {
        // Juneteenth
        if let Some(d) = NaiveDate::from_ymd_opt(year, 6, 19) {
            out.insert(observed(d));
        }
    }

    // Independence Day
    if let Some(d) = NaiveDate::from_ymd_opt(year, 7, 4) {
        out.insert(observed(d));
    }

    // Labor Day
    if let Some(d) = NaiveDate::from_weekday_of_month_opt(year, 9, Weekday::Mon, 1) {
        out.insert(d);
    }

    // Thanksgiving
    if let Some(d) = NaiveDate::from_weekday_of_month_opt(year, 11, Weekday::Thu, 4) {
        out.insert(d);
    }

    // Christmas
    if let Some(d) = NaiveDate::from_ymd_opt(year, 12, 25) {
        out.insert(observed(d));
    }
}

// Saturday holidays are observed the Friday before, Sunday holidays the
// Monday after.
fn observed(d: NaiveDate) -> NaiveDate {
    match d.weekday() {
        Weekday::Sat => d - Duration::days(1),
        Weekday::Sun => d + Duration::days(1),
        _ => d,
    }
}

fn last_monday_of_may(year: i32) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, 5, Weekday::Mon, 5)
        .or_else(|| NaiveDate::from_weekday_of_month_opt(year, 5, Weekday::Mon, 4))
}

// Meeus/Jones/Butcher Gregorian computus.
fn easter_sunday(year: i32) -> NaiveDate {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
        .expect("computus yields a date in March or April")
}
