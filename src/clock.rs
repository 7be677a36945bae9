//! Wall-clock source behind the datetime port.

use crate::register::RegisterWindow;

/// Civil time broken into the fields the datetime port exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateTime {
    /// Full year, e.g. 2026.
    pub year: u16,
    /// 0 = January.
    pub month: u8,
    /// 1..=31
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    /// 0 = Sunday.
    pub weekday: u8,
    /// 0 = January 1st.
    pub yearday: u16,
    pub dst: bool,
}

impl DateTime {
    /// Convert seconds since the Unix epoch to UTC civil time.
    pub fn from_unix_utc(secs: i64) -> Self {
        let days = secs.div_euclid(86_400);
        let rem = secs.rem_euclid(86_400);
        let (year, month, day) = civil_from_days(days);
        let yearday = days - days_from_civil(year, 1, 1);
        Self {
            year: year as u16,
            month: (month - 1) as u8,
            day: day as u8,
            hour: (rem / 3600) as u8,
            minute: (rem / 60 % 60) as u8,
            second: (rem % 60) as u8,
            // 1970-01-01 was a Thursday.
            weekday: (days + 4).rem_euclid(7) as u8,
            yearday: yearday as u16,
            dst: false,
        }
    }

    /// Store the fields in the datetime port's register layout.
    pub fn write_to(&self, window: &mut RegisterWindow) {
        window.set16(0x0, self.year);
        window.set(0x2, self.month);
        window.set(0x3, self.day);
        window.set(0x4, self.hour);
        window.set(0x5, self.minute);
        window.set(0x6, self.second);
        window.set(0x7, self.weekday);
        window.set16(0x8, self.yearday);
        window.set(0xa, self.dst as u8);
    }

    /// Decode the fields back out of a datetime register window.
    pub fn read_from(window: &RegisterWindow) -> Self {
        Self {
            year: window.get16(0x0),
            month: window.get(0x2),
            day: window.get(0x3),
            hour: window.get(0x4),
            minute: window.get(0x5),
            second: window.get(0x6),
            weekday: window.get(0x7),
            yearday: window.get16(0x8),
            dst: window.get(0xa) != 0,
        }
    }
}

// Howard Hinnant's civil calendar algorithms.
fn civil_from_days(days: i64) -> (i64, i64, i64) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = yoe + era * 400 + i64::from(m <= 2);
    (y, m, d)
}

fn days_from_civil(year: i64, month: i64, day: i64) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = y.div_euclid(400);
    let yoe = y - era * 400;
    let mp = if month > 2 { month - 3 } else { month + 9 };
    let doy = (153 * mp + 2) / 5 + day - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

/// A source of the current time.
pub trait Clock {
    fn now(&self) -> DateTime;
}

/// The host's local wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostClock;

impl Clock for HostClock {
    #[cfg(unix)]
    fn now(&self) -> DateTime {
        match local_tm() {
            (_, Some(tm)) => DateTime::from_tm(&tm),
            (t, None) => DateTime::from_unix_utc(t),
        }
    }

    #[cfg(not(unix))]
    fn now(&self) -> DateTime {
        let secs = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();
        DateTime::from_unix_utc(secs)
    }
}

/// Current Unix time and, when the host can convert it, the local `tm`.
#[cfg(unix)]
fn local_tm() -> (i64, Option<libc::tm>) {
    // SAFETY: `time` accepts a null out-pointer, an all-zero `tm` is a valid
    // value, and `localtime_r` only writes into the `tm` we own.
    unsafe {
        let t = libc::time(std::ptr::null_mut());
        let mut tm: libc::tm = std::mem::zeroed();
        let converted = !libc::localtime_r(&t, &mut tm).is_null();
        (t as i64, converted.then_some(tm))
    }
}

#[cfg(unix)]
impl DateTime {
    fn from_tm(tm: &libc::tm) -> Self {
        DateTime {
            year: (tm.tm_year + 1900) as u16,
            month: tm.tm_mon as u8,
            day: tm.tm_mday as u8,
            hour: tm.tm_hour as u8,
            minute: tm.tm_min as u8,
            second: tm.tm_sec as u8,
            weekday: tm.tm_wday as u8,
            yearday: tm.tm_yday as u16,
            dst: tm.tm_isdst > 0,
        }
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime);

impl Clock for FixedClock {
    fn now(&self) -> DateTime {
        self.0
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn civil_round_trip(days in -100_000i64..200_000) {
            let (y, m, d) = civil_from_days(days);
            prop_assert_eq!(days_from_civil(y, m, d), days);
        }

        #[test]
        fn fields_in_range(secs in 0i64..4_102_444_800) {
            let t = DateTime::from_unix_utc(secs);
            prop_assert!(t.year >= 1970);
            prop_assert!(t.month <= 11);
            prop_assert!(t.weekday <= 6);
            prop_assert!(t.hour <= 23 && t.minute <= 59 && t.second <= 59);
            prop_assert!(t.yearday <= 365);
        }
    }
}
