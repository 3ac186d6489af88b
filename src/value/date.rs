use std::time::{SystemTime, UNIX_EPOCH};

/// Which parts of a [`Date`] are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateKind {
    Date,
    Time,
    DateTime,
    /// The host did not say; such a date cannot be formatted or compared
    /// until it is reinterpreted with `?date`, `?time` or `?datetime`.
    Unknown,
}

/// A point in time, stored as milliseconds since the Unix epoch (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Date {
    pub millis: i64,
    pub kind: DateKind,
}

/// Broken down UTC calendar fields of a [`Date`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Civil {
    pub year: i64,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub millis: u32,
}

const MILLIS_PER_DAY: i64 = 86_400_000;

impl Date {
    pub const fn new(millis: i64, kind: DateKind) -> Self {
        Self { millis, kind }
    }

    pub(crate) fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or(0);
        Self::new(millis, DateKind::DateTime)
    }

    /// Builds a date from UTC calendar fields.
    pub fn from_ymd_hms(year: i64, month: u32, day: u32, h: u32, m: u32, s: u32) -> Self {
        let days = days_from_civil(year, month, day);
        let millis = days * MILLIS_PER_DAY
            + i64::from(h) * 3_600_000
            + i64::from(m) * 60_000
            + i64::from(s) * 1000;
        Self::new(millis, DateKind::DateTime)
    }

    pub const fn with_kind(self, kind: DateKind) -> Self {
        Self::new(self.millis, kind)
    }

    pub(crate) fn civil(self) -> Civil {
        let days = self.millis.div_euclid(MILLIS_PER_DAY);
        let rem = self.millis.rem_euclid(MILLIS_PER_DAY);
        let (year, month, day) = civil_from_days(days);
        let rem = rem as u32;
        Civil {
            year,
            month,
            day,
            hour: rem / 3_600_000,
            minute: rem / 60_000 % 60,
            second: rem / 1000 % 60,
            millis: rem % 1000,
        }
    }
}

// Algorithms from Howard Hinnant's "chrono-Compatible Low-Level Date
// Algorithms".

fn days_from_civil(y: i64, m: u32, d: u32) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = y.div_euclid(400);
    let yoe = y - era * 400;
    let m = i64::from(m);
    let doy = (153 * (if m > 2 { m - 3 } else { m + 9 }) + 2) / 5 + i64::from(d) - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    (if m <= 2 { y + 1 } else { y }, m, d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn civil_round_trip() {
        let d = Date::from_ymd_hms(2024, 2, 29, 13, 45, 7);
        let c = d.civil();
        assert_eq!((c.year, c.month, c.day), (2024, 2, 29));
        assert_eq!((c.hour, c.minute, c.second), (13, 45, 7));
    }

    #[test]
    fn epoch_and_before() {
        assert_eq!(Date::from_ymd_hms(1970, 1, 1, 0, 0, 0).millis, 0);
        let c = Date::new(-1, DateKind::DateTime).civil();
        assert_eq!((c.year, c.month, c.day, c.hour), (1969, 12, 31, 23));
    }
}
