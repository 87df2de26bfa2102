//! bol-calendar
//!
//! Exchange trading calendar. Deterministic, pure logic: no IO, no wall-clock.
//! Callers pass `now` explicitly.
//!
//! # Design
//!
//! [`TradingCalendar`] answers the date questions the ledger asks:
//! - which exchange-local date an instant belongs to,
//! - whether a date is a trading session,
//! - when a session closes (regular 16:00 local, 13:00 on early-close days),
//! - where a trailing N-session window starts.
//!
//! Local time is computed with `chrono-tz` (`America/New_York` by default),
//! so daylight saving is handled exactly. Holidays and early closes are a
//! hardcoded NYSE table for 2023–2027; dates outside the table fall back to
//! weekday-only rules. [`TradingCalendar::covers`] tells callers when that
//! fallback is in effect so they can log it.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

/// Upper bound on consecutive non-trading days (long weekend + holiday run).
const MAX_CLOSED_RUN: usize = 14;

/// First and last year of the holiday and early-close tables.
pub const HOLIDAY_TABLE_YEARS: (i32, i32) = (2023, 2027);

// ---------------------------------------------------------------------------
// TradingCalendar
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TradingCalendar {
    tz: Tz,
}

impl Default for TradingCalendar {
    fn default() -> Self {
        Self::nyse()
    }
}

impl TradingCalendar {
    /// NYSE sessions in `America/New_York`.
    pub fn nyse() -> Self {
        Self {
            tz: chrono_tz::America::New_York,
        }
    }

    /// NYSE session table evaluated in another IANA zone (tests, replicas
    /// that store exchange-local dates in a different zone).
    pub fn with_timezone(name: &str) -> Result<Self> {
        let tz: Tz = name
            .parse()
            .map_err(|e| anyhow!("invalid calendar timezone {name:?}: {e}"))?;
        Ok(Self { tz })
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    // -----------------------------------------------------------------------
    // Dates
    // -----------------------------------------------------------------------

    /// Exchange-local calendar date of an instant.
    pub fn local_date(&self, ts: DateTime<Utc>) -> NaiveDate {
        ts.with_timezone(&self.tz).date_naive()
    }

    /// Whether `date` falls inside the holiday table. Outside it, holidays
    /// count as trading days.
    pub fn covers(&self, date: NaiveDate) -> bool {
        let (first, last) = HOLIDAY_TABLE_YEARS;
        (first..=last).contains(&date.year())
    }

    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !is_nyse_holiday(date)
    }

    /// First trading day strictly after `date`.
    pub fn next_trading_day(&self, date: NaiveDate) -> NaiveDate {
        let mut d = date;
        for _ in 0..MAX_CLOSED_RUN {
            d += Duration::days(1);
            if self.is_trading_day(d) {
                return d;
            }
        }
        d
    }

    /// Last trading day strictly before `date`.
    pub fn previous_trading_day(&self, date: NaiveDate) -> NaiveDate {
        let mut d = date;
        for _ in 0..MAX_CLOSED_RUN {
            d -= Duration::days(1);
            if self.is_trading_day(d) {
                return d;
            }
        }
        d
    }

    /// The trading date `now` belongs to: today if the exchange trades
    /// today, otherwise the most recent session.
    pub fn current_trading_date(&self, now: DateTime<Utc>) -> NaiveDate {
        let today = self.local_date(now);
        if self.is_trading_day(today) {
            today
        } else {
            self.previous_trading_day(today)
        }
    }

    // -----------------------------------------------------------------------
    // Instants
    // -----------------------------------------------------------------------

    /// Exchange-local midnight of `date`, as UTC.
    pub fn start_of_day_utc(&self, date: NaiveDate) -> DateTime<Utc> {
        self.local_to_utc(date.and_time(NaiveTime::MIN))
    }

    /// Close of the regular session on `date`, as UTC.
    pub fn session_close(&self, date: NaiveDate) -> DateTime<Utc> {
        let hour = if is_nyse_early_close(date) { 13 } else { 16 };
        let close = NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN);
        self.local_to_utc(date.and_time(close))
    }

    /// Latest session close strictly before `ts`.
    pub fn previous_session_close(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let mut d = self.local_date(ts);
        for _ in 0..=MAX_CLOSED_RUN {
            if self.is_trading_day(d) {
                let close = self.session_close(d);
                if close < ts {
                    return close;
                }
            }
            d -= Duration::days(1);
        }
        self.session_close(d)
    }

    /// Start of the trailing window covering the last `sessions` trading
    /// sessions up to `now`, found by stepping back to the previous session
    /// close `sessions` times. Events strictly after the returned instant
    /// are inside the window.
    pub fn trailing_window_start(&self, now: DateTime<Utc>, sessions: u32) -> DateTime<Utc> {
        let mut edge = now;
        for _ in 0..sessions {
            edge = self.previous_session_close(edge);
        }
        edge
    }

    fn local_to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        match self.tz.from_local_datetime(&local).earliest() {
            Some(t) => t.with_timezone(&Utc),
            // Inside a DST gap; the hour after is the first valid instant.
            None => match self
                .tz
                .from_local_datetime(&(local + Duration::hours(1)))
                .earliest()
            {
                Some(t) => t.with_timezone(&Utc),
                None => Utc.from_utc_datetime(&local),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// NYSE tables 2023–2027
// ---------------------------------------------------------------------------

/// Observed full-day closures.
const HOLIDAYS: &[(i32, u32, u32)] = &[
    // 2023
    (2023, 1, 2),
    (2023, 1, 16),
    (2023, 2, 20),
    (2023, 4, 7),
    (2023, 5, 29),
    (2023, 6, 19),
    (2023, 7, 4),
    (2023, 9, 4),
    (2023, 11, 23),
    (2023, 12, 25),
    // 2024
    (2024, 1, 1),
    (2024, 1, 15),
    (2024, 2, 19),
    (2024, 3, 29),
    (2024, 5, 27),
    (2024, 6, 19),
    (2024, 7, 4),
    (2024, 9, 2),
    (2024, 11, 28),
    (2024, 12, 25),
    // 2025
    (2025, 1, 1),
    (2025, 1, 9), // national day of mourning
    (2025, 1, 20),
    (2025, 2, 17),
    (2025, 4, 18),
    (2025, 5, 26),
    (2025, 6, 19),
    (2025, 7, 4),
    (2025, 9, 1),
    (2025, 11, 27),
    (2025, 12, 25),
    // 2026
    (2026, 1, 1),
    (2026, 1, 19),
    (2026, 2, 16),
    (2026, 4, 3),
    (2026, 5, 25),
    (2026, 6, 19),
    (2026, 7, 3), // July 4 falls on Saturday
    (2026, 9, 7),
    (2026, 11, 26),
    (2026, 12, 25),
    // 2027
    (2027, 1, 1),
    (2027, 1, 18),
    (2027, 2, 15),
    (2027, 3, 26),
    (2027, 5, 31),
    (2027, 6, 18), // June 19 falls on Saturday
    (2027, 7, 5),  // July 4 falls on Sunday
    (2027, 9, 6),
    (2027, 11, 25),
    (2027, 12, 24), // Christmas falls on Saturday
];

/// 13:00 local closes.
const EARLY_CLOSES: &[(i32, u32, u32)] = &[
    (2023, 7, 3),
    (2023, 11, 24),
    (2024, 7, 3),
    (2024, 11, 29),
    (2024, 12, 24),
    (2025, 7, 3),
    (2025, 11, 28),
    (2025, 12, 24),
    (2026, 11, 27),
    (2026, 12, 24),
    (2027, 11, 26),
];

fn ymd(date: NaiveDate) -> (i32, u32, u32) {
    (date.year(), date.month(), date.day())
}

fn is_nyse_holiday(date: NaiveDate) -> bool {
    HOLIDAYS.contains(&ymd(date))
}

fn is_nyse_early_close(date: NaiveDate) -> bool {
    EARLY_CLOSES.contains(&ymd(date))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn utc(y: i32, m: u32, day: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, day, h, min, 0).unwrap()
    }

    #[test]
    fn coverage_matches_holiday_table() {
        let cal = TradingCalendar::nyse();
        assert!(cal.covers(d(2023, 1, 2)));
        assert!(cal.covers(d(2027, 12, 31)));
        assert!(!cal.covers(d(2022, 12, 30)));
        assert!(!cal.covers(d(2028, 1, 3)));
        for (y, m, day) in HOLIDAYS.iter().chain(EARLY_CLOSES) {
            assert!(cal.covers(d(*y, *m, *day)));
        }
    }

    #[test]
    fn weekends_and_holidays_are_closed() {
        let cal = TradingCalendar::nyse();
        assert!(cal.is_trading_day(d(2024, 1, 8))); // Monday
        assert!(!cal.is_trading_day(d(2024, 1, 6))); // Saturday
        assert!(!cal.is_trading_day(d(2024, 1, 7))); // Sunday
        assert!(!cal.is_trading_day(d(2024, 1, 1))); // New Year's Day
        assert!(!cal.is_trading_day(d(2027, 12, 24)));
    }

    #[test]
    fn previous_trading_day_skips_long_weekend() {
        let cal = TradingCalendar::nyse();
        // Tue after MLK day -> prior Friday
        assert_eq!(cal.previous_trading_day(d(2024, 1, 16)), d(2024, 1, 12));
        assert_eq!(cal.next_trading_day(d(2024, 1, 12)), d(2024, 1, 16));
    }

    #[test]
    fn session_close_tracks_daylight_saving() {
        let cal = TradingCalendar::nyse();
        // EST: 16:00 local = 21:00Z
        assert_eq!(cal.session_close(d(2024, 1, 8)), utc(2024, 1, 8, 21, 0));
        // EDT: 16:00 local = 20:00Z
        assert_eq!(cal.session_close(d(2024, 7, 8)), utc(2024, 7, 8, 20, 0));
    }

    #[test]
    fn early_close_is_one_pm_local() {
        let cal = TradingCalendar::nyse();
        assert_eq!(cal.session_close(d(2024, 11, 29)), utc(2024, 11, 29, 18, 0));
    }

    #[test]
    fn local_date_uses_exchange_zone() {
        let cal = TradingCalendar::nyse();
        // 02:00Z on the 9th is still the evening of the 8th in New York.
        assert_eq!(cal.local_date(utc(2024, 1, 9, 2, 0)), d(2024, 1, 8));
    }

    #[test]
    fn current_trading_date_rolls_back_on_weekends() {
        let cal = TradingCalendar::nyse();
        assert_eq!(cal.current_trading_date(utc(2024, 1, 13, 15, 0)), d(2024, 1, 12));
        assert_eq!(cal.current_trading_date(utc(2024, 1, 10, 15, 0)), d(2024, 1, 10));
    }

    #[test]
    fn previous_session_close_is_strictly_before() {
        let cal = TradingCalendar::nyse();
        // Mid-session Wednesday -> Tuesday close
        assert_eq!(
            cal.previous_session_close(utc(2024, 1, 10, 15, 0)),
            utc(2024, 1, 9, 21, 0)
        );
        // Exactly at Wednesday close -> still Tuesday close
        assert_eq!(
            cal.previous_session_close(utc(2024, 1, 10, 21, 0)),
            utc(2024, 1, 9, 21, 0)
        );
        // After Wednesday close -> Wednesday close
        assert_eq!(
            cal.previous_session_close(utc(2024, 1, 10, 22, 0)),
            utc(2024, 1, 10, 21, 0)
        );
    }

    #[test]
    fn trailing_window_spans_five_sessions_across_holiday() {
        let cal = TradingCalendar::nyse();
        // Wed 2024-01-17 mid-session. Sessions in window: 10, 11, 12, 16, 17.
        let start = cal.trailing_window_start(utc(2024, 1, 17, 15, 0), 5);
        assert_eq!(start, utc(2024, 1, 9, 21, 0));
    }

    #[test]
    fn start_of_day_is_local_midnight() {
        let cal = TradingCalendar::nyse();
        assert_eq!(cal.start_of_day_utc(d(2024, 1, 8)), utc(2024, 1, 8, 5, 0));
    }

    #[test]
    fn custom_timezone_parses() {
        assert!(TradingCalendar::with_timezone("America/Chicago").is_ok());
        assert!(TradingCalendar::with_timezone("Mars/Olympus").is_err());
    }
}
