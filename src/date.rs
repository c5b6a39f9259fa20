//! Date parsing, formatting, and calendar arithmetic.
//!
//! Services hand back timestamps in two layouts: a plain
//! `2006-01-02 15:04:05` assumed to be UTC, and the long
//! `2006-01-02 15:04:05.999999 -0700 UTC` form with an explicit offset.
//! [`Date`] parses both and formats with the `yyyy-MM-dd HH:mm:ss` style
//! patterns generated code carries around.
//!
//! ## Examples
//!
//! ```
//! use keelson::date::Date;
//!
//! let date = Date::parse("2023-12-31 08:32:05")?;
//!
//! assert_eq!(date.unix(), 1704011525);
//! assert_eq!(date.format("yyyy-MM-dd"), "2023-12-31");
//! assert_eq!(date.add("day", 1)?.format("yyyy-MM-dd"), "2024-01-01");
//! # Ok::<(), keelson::Error>(())
//! ```

use time::macros::format_description;
use time::{Duration, Month, OffsetDateTime, PrimitiveDateTime};

use crate::error::{Error, Result};

/// A point in time with calendar accessors.
///
/// Wraps [`time::OffsetDateTime`]; the offset given at parse time is kept,
/// so the hour accessors reflect the service's clock, while [`Date::unix`]
/// and [`Date::diff`] always compare instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Date {
    inner: OffsetDateTime,
}

impl Date {
    /// Parses a date from either supported layout.
    ///
    /// The long layout keeps its offset: `2023-12-31 00:00:00.916000 +0800
    /// UTC` is midnight in UTC+8, eight hours before midnight UTC. The
    /// short layout has no offset and is taken as UTC.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DateParse`] when the string matches neither layout.
    pub fn parse(raw: &str) -> Result<Date> {
        let with_offset = format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:6] \
             [offset_hour sign:mandatory][offset_minute] UTC"
        );
        if let Ok(inner) = OffsetDateTime::parse(raw, with_offset) {
            return Ok(Date { inner });
        }
        let plain = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
        let inner = PrimitiveDateTime::parse(raw, plain)?.assume_utc();
        Ok(Date { inner })
    }

    /// The current time in UTC.
    pub fn now() -> Date {
        Date {
            inner: OffsetDateTime::now_utc(),
        }
    }

    /// Builds a date from seconds since the Unix epoch, in UTC.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when the timestamp is outside the
    /// representable range.
    pub fn from_unix(timestamp: i64) -> Result<Date> {
        let inner = OffsetDateTime::from_unix_timestamp(timestamp)
            .map_err(|_| Error::Configuration(format!("invalid unix timestamp: {timestamp}")))?;
        Ok(Date { inner })
    }

    /// Seconds since the Unix epoch.
    pub fn unix(&self) -> i64 {
        self.inner.unix_timestamp()
    }

    /// Formats the date with a `yyyy-MM-dd HH:mm:ss` style pattern.
    ///
    /// Recognized tokens: `yyyy`/`YYYY` and `YY` for the year, `MM`/`M`
    /// for the month, `dd`/`DD` and `d`/`D` for the day of month, `HH`/`H`
    /// and `hh`/`h` for the hour, `mm`/`m` minutes, `ss`/`s` seconds,
    /// `SSS` milliseconds, `a`/`A` for AM/PM, and `E` runs for the
    /// weekday (`EEEE` spells it out). Anything else passes through
    /// literally.
    pub fn format(&self, layout: &str) -> String {
        let translated: String = layout
            .chars()
            .map(|c| match c {
                'y' => 'Y',
                'd' => 'D',
                'h' => 'H',
                'a' => 'A',
                'E' => 'd',
                _ => c,
            })
            .collect();

        let mut out = String::new();
        let mut rest = translated.as_str();
        'scan: while !rest.is_empty() {
            for &token in TOKENS {
                if let Some(remaining) = rest.strip_prefix(token) {
                    out.push_str(&self.render(token));
                    rest = remaining;
                    continue 'scan;
                }
            }
            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                out.push(c);
            }
            rest = chars.as_str();
        }
        out
    }

    fn render(&self, token: &str) -> String {
        match token {
            "YYYY" | "Y" => format!("{:04}", self.inner.year()),
            "YY" => format!("{:02}", self.inner.year().rem_euclid(100)),
            "MM" => format!("{:02}", self.month()),
            "M" => self.month().to_string(),
            "DD" => format!("{:02}", self.day_of_month()),
            "D" => self.day_of_month().to_string(),
            "HH" => format!("{:02}", self.hour()),
            "H" => self.hour().to_string(),
            "mm" => format!("{:02}", self.minute()),
            "m" => self.minute().to_string(),
            "ss" => format!("{:02}", self.second()),
            "s" => self.second().to_string(),
            "SSS" => format!("{:03}", self.millisecond()),
            "A" => {
                let marker = if self.hour() < 12 { "AM" } else { "PM" };
                marker.to_string()
            }
            "dddd" => self.inner.weekday().to_string(),
            "ddd" => self.inner.weekday().to_string()[..3].to_string(),
            "d" => self.day_of_week().to_string(),
            _ => String::new(),
        }
    }

    /// Moves the date by `amount` of `unit`.
    ///
    /// Units are `second`, `minute`, `hour`, `day`, `week`, `month`, and
    /// `year`. Month and year moves are calendar moves: the day of month
    /// clamps to the target month's length, so one month past January 31
    /// is the last day of February.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for an unknown unit.
    pub fn add(&self, unit: &str, amount: i64) -> Result<Date> {
        let inner = match unit {
            "second" => self.inner + Duration::seconds(amount),
            "minute" => self.inner + Duration::minutes(amount),
            "hour" => self.inner + Duration::hours(amount),
            "day" => self.inner + Duration::days(amount),
            "week" => self.inner + Duration::weeks(amount),
            "month" => shift_months(self.inner, amount),
            "year" => shift_months(self.inner, amount.saturating_mul(12)),
            _ => return Err(Error::Configuration(format!("unknown time unit: {unit}"))),
        };
        Ok(Date { inner })
    }

    /// Moves the date backwards; the mirror of [`Date::add`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for an unknown unit.
    pub fn sub(&self, unit: &str, amount: i64) -> Result<Date> {
        self.add(unit, amount.saturating_neg())
    }

    /// The difference `self - other` in whole units, truncated toward
    /// zero. `month` and `year` count completed calendar months.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for an unknown unit.
    pub fn diff(&self, unit: &str, other: &Date) -> Result<i64> {
        let seconds = self.unix() - other.unix();
        let value = match unit {
            "second" => seconds,
            "minute" => seconds / 60,
            "hour" => seconds / 3_600,
            "day" => seconds / 86_400,
            "week" => seconds / 604_800,
            "month" => month_span(&other.inner, &self.inner),
            "year" => month_span(&other.inner, &self.inner) / 12,
            _ => return Err(Error::Configuration(format!("unknown time unit: {unit}"))),
        };
        Ok(value)
    }

    /// The year.
    pub fn year(&self) -> i32 {
        self.inner.year()
    }

    /// The month, 1 through 12.
    pub fn month(&self) -> u8 {
        u8::from(self.inner.month())
    }

    /// The day of the month, 1 through 31.
    pub fn day_of_month(&self) -> u8 {
        self.inner.day()
    }

    /// The day of the week, Monday = 1 through Sunday = 7.
    pub fn day_of_week(&self) -> u8 {
        self.inner.weekday().number_from_monday()
    }

    /// The ISO 8601 week number, 1 through 53.
    pub fn week_of_year(&self) -> u8 {
        self.inner.iso_week()
    }

    /// The hour, 0 through 23.
    pub fn hour(&self) -> u8 {
        self.inner.hour()
    }

    /// The minute.
    pub fn minute(&self) -> u8 {
        self.inner.minute()
    }

    /// The second.
    pub fn second(&self) -> u8 {
        self.inner.second()
    }

    /// The millisecond within the second.
    pub fn millisecond(&self) -> u16 {
        self.inner.millisecond()
    }
}

const TOKENS: &[&str] = &[
    "YYYY", "dddd", "SSS", "ddd", "YY", "MM", "DD", "HH", "mm", "ss", "Y", "M", "D", "H", "m",
    "s", "d", "A",
];

// Calendar month arithmetic: count months linearly, then clamp the day to
// the target month's length.
fn shift_months(from: OffsetDateTime, amount: i64) -> OffsetDateTime {
    let total = i64::from(from.year()) * 12 + i64::from(u8::from(from.month())) - 1 + amount;
    let year = match i32::try_from(total.div_euclid(12)) {
        Ok(year) => year,
        Err(_) => return from,
    };
    let month = match Month::try_from((total.rem_euclid(12) + 1) as u8) {
        Ok(month) => month,
        Err(_) => return from,
    };
    let day = from.day().min(month.length(year));
    match time::Date::from_calendar_date(year, month, day) {
        Ok(date) => PrimitiveDateTime::new(date, from.time()).assume_offset(from.offset()),
        Err(_) => from,
    }
}

// Completed months between two instants, signed as `to - from`.
fn month_span(from: &OffsetDateTime, to: &OffsetDateTime) -> i64 {
    let mut months = i64::from(to.year() - from.year()) * 12
        + i64::from(u8::from(to.month()))
        - i64::from(u8::from(from.month()));
    let from_day = (from.day(), from.time());
    let to_day = (to.day(), to.time());
    if months > 0 && to_day < from_day {
        months -= 1;
    } else if months < 0 && to_day > from_day {
        months += 1;
    }
    months
}
