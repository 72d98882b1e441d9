//! Wall-clock and calendar queries
//!
//! Guests hold time as a signed millisecond count since the Unix epoch and
//! ask the host for one calendar field at a time. The breakdown happens
//! here with integer civil-calendar arithmetic rather than a platform
//! date type, so UTC results are identical on every host.
//!
//! Field conventions follow the guest ABI: months run 0-11, weekdays run
//! 0-6 with Sunday first, day-of-year is 1-based.

use crate::context::CrtContext;
use crate::error::CrtResult;

const MS_PER_DAY: i64 = 86_400_000;

/// A millisecond timestamp broken down into calendar fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarTime {
    pub year: i32,
    /// 0 = January
    pub month: u32,
    /// 0 = Sunday
    pub weekday: u32,
    pub day_of_month: u32,
    /// 1 = January 1st
    pub day_of_year: u32,
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

impl CalendarTime {
    /// Break a UTC millisecond timestamp into calendar fields
    pub fn from_utc_ms(ms: i64) -> Self {
        let days = ms.div_euclid(MS_PER_DAY);
        let ms_of_day = ms.rem_euclid(MS_PER_DAY);
        let (year, month, day) = civil_from_days(days);
        let day_of_year = (days - days_from_civil(year, 1, 1) + 1) as u32;
        Self {
            year: year as i32,
            month: month - 1,
            // day 0 (1970-01-01) was a Thursday
            weekday: (days + 4).rem_euclid(7) as u32,
            day_of_month: day,
            day_of_year,
            hours: (ms_of_day / 3_600_000) as u32,
            minutes: (ms_of_day / 60_000 % 60) as u32,
            seconds: (ms_of_day / 1_000 % 60) as u32,
        }
    }

    /// Break a timestamp into fields for a zone `offset_minutes` behind UTC
    pub fn from_local_ms(ms: i64, offset_minutes: i32) -> Self {
        Self::from_utc_ms(ms - offset_minutes as i64 * 60_000)
    }
}

/// Days since 1970-01-01 for a civil date, proleptic Gregorian
fn days_from_civil(year: i64, month: u32, day: u32) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let mp = ((month + 9) % 12) as i64;
    let doy = (153 * mp + 2) / 5 + day as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

/// Civil date for a day count since 1970-01-01
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + if month <= 2 { 1 } else { 0 };
    (year, month, day)
}

fn is_leap_year(year: i64) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

/// ISO-8601 week count for a year: 53 when January 1st falls on a
/// Thursday, or on a Wednesday in a leap year
pub fn weeks_in_year(year: i32) -> u32 {
    let jan1_weekday = (days_from_civil(year as i64, 1, 1) + 4).rem_euclid(7);
    if jan1_weekday == 4 || (is_leap_year(year as i64) && jan1_weekday == 3) {
        53
    } else {
        52
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch
pub fn now_ms() -> i64 {
    #[cfg(target_arch = "wasm32")]
    {
        js_sys::Date::now() as i64
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }
}

/// Minutes the host zone lags UTC at the given instant; positive west
pub fn tz_offset_minutes(ms: i64) -> i32 {
    #[cfg(target_arch = "wasm32")]
    {
        js_sys::Date::new(&wasm_bindgen::JsValue::from_f64(ms as f64)).get_timezone_offset() as i32
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        let _ = ms;
        0
    }
}

impl CrtContext {
    /// `clock`: wall-clock milliseconds
    pub fn clock(&self) -> i64 {
        now_ms()
    }

    /// `time`: current milliseconds, also stored at `timer_ptr` when non-null
    pub fn time(&mut self, timer_ptr: u32) -> CrtResult<i64> {
        let ms = now_ms();
        if timer_ptr != 0 {
            self.memory().write_i64(timer_ptr, ms)?;
        }
        Ok(ms)
    }

    /// Calendar fields of a timestamp in UTC
    pub fn utc_fields(&self, ms: i64) -> CalendarTime {
        CalendarTime::from_utc_ms(ms)
    }

    /// Calendar fields of a timestamp in the host zone
    pub fn local_fields(&self, ms: i64) -> CalendarTime {
        CalendarTime::from_local_ms(ms, tz_offset_minutes(ms))
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use crate::context::CrtContext;

    #[test]
    fn test_epoch_fields() {
        let t = CalendarTime::from_utc_ms(0);
        assert_eq!(t.year, 1970);
        assert_eq!(t.month, 0);
        assert_eq!(t.day_of_month, 1);
        assert_eq!(t.day_of_year, 1);
        assert_eq!(t.weekday, 4); // Thursday
        assert_eq!((t.hours, t.minutes, t.seconds), (0, 0, 0));
    }

    #[test]
    fn test_known_timestamp() {
        // 2001-09-09T01:46:40Z, a Sunday
        let t = CalendarTime::from_utc_ms(1_000_000_000_000);
        assert_eq!(t.year, 2001);
        assert_eq!(t.month, 8);
        assert_eq!(t.day_of_month, 9);
        assert_eq!(t.day_of_year, 252);
        assert_eq!(t.weekday, 0);
        assert_eq!((t.hours, t.minutes, t.seconds), (1, 46, 40));
    }

    #[test]
    fn test_pre_epoch_timestamp() {
        let t = CalendarTime::from_utc_ms(-86_400_000);
        assert_eq!(t.year, 1969);
        assert_eq!(t.month, 11);
        assert_eq!(t.day_of_month, 31);
        assert_eq!(t.day_of_year, 365);
        assert_eq!(t.weekday, 3); // Wednesday
    }

    #[test]
    fn test_leap_day() {
        // 2020-02-29T00:00:00Z
        let days = days_from_civil(2020, 2, 29);
        let t = CalendarTime::from_utc_ms(days * MS_PER_DAY);
        assert_eq!(t.year, 2020);
        assert_eq!(t.month, 1);
        assert_eq!(t.day_of_month, 29);
        assert_eq!(t.day_of_year, 60);
    }

    #[test]
    fn test_civil_round_trip() {
        for &days in &[-1_000_000, -1, 0, 1, 365, 59_000, 1_000_000] {
            let (y, m, d) = civil_from_days(days);
            assert_eq!(days_from_civil(y, m, d), days);
        }
    }

    #[test]
    fn test_local_offset_shifts_fields() {
        // five hours behind UTC at the epoch
        let t = CalendarTime::from_local_ms(0, 300);
        assert_eq!(t.year, 1969);
        assert_eq!(t.month, 11);
        assert_eq!(t.day_of_month, 31);
        assert_eq!(t.hours, 19);
        assert_eq!(t.weekday, 3);
    }

    #[test]
    fn test_weeks_in_year() {
        // Jan 1 on a Thursday
        assert_eq!(weeks_in_year(2015), 53);
        assert_eq!(weeks_in_year(2026), 53);
        // leap year with Jan 1 on a Wednesday
        assert_eq!(weeks_in_year(2020), 53);
        // ordinary year
        assert_eq!(weeks_in_year(2021), 52);
        assert_eq!(weeks_in_year(2023), 52);
    }

    #[test]
    fn test_time_writes_through_pointer() {
        let mut ctx = CrtContext::for_tests();
        let reported = ctx.time(64).unwrap();
        let stored = ctx.memory().read_i64(64).unwrap();
        assert_eq!(reported, stored);
        assert!(reported > 1_500_000_000_000);
        // null pointer is skipped, not an error
        assert!(ctx.time(0).is_ok());
    }
}
