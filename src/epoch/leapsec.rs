//! The compiled-in leap-second table.
//!
//! Rows before 1972 carry the drift formula of the era:
//! `TAI - UTC = tai_utc + (MJD - drift_epoch) * drift_rate`. From 1972
//! onward the offset is a whole number of seconds.

/// One row of the leap-second table, effective from the given UTC date.
#[derive(Debug, Clone, Copy)]
pub struct LeapSecond {
    /// Effective year.
    pub year: i64,
    /// Effective month.
    pub month: i64,
    /// Effective day of month.
    pub day: i64,
    /// TAI - UTC in seconds at the effective date.
    pub tai_utc: f64,
    /// Reference MJD of the drift term.
    pub drift_epoch: f64,
    /// Drift in seconds per day.
    pub drift_rate: f64,
}

/// Date of the last table update, as yyyymmdd. Conversions past this date
/// proceed with the last row's offset and log a warning.
pub const LAST_UPDATED: i32 = 20_170_101;

/// The table, sorted by effective date.
pub const LEAP_SECONDS: &[LeapSecond] = &[
    row(1960, 1, 1, 1.417_818_0, 37_300.0, 0.001_296),
    row(1961, 1, 1, 1.422_818_0, 37_300.0, 0.001_296),
    row(1961, 8, 1, 1.372_818_0, 37_300.0, 0.001_296),
    row(1962, 1, 1, 1.845_858_0, 37_665.0, 0.001_123_2),
    row(1963, 11, 1, 1.945_858_0, 37_665.0, 0.001_123_2),
    row(1964, 1, 1, 3.240_130_0, 38_761.0, 0.001_296),
    row(1964, 4, 1, 3.340_130_0, 38_761.0, 0.001_296),
    row(1964, 9, 1, 3.440_130_0, 38_761.0, 0.001_296),
    row(1965, 1, 1, 3.540_130_0, 38_761.0, 0.001_296),
    row(1965, 3, 1, 3.640_130_0, 38_761.0, 0.001_296),
    row(1965, 7, 1, 3.740_130_0, 38_761.0, 0.001_296),
    row(1965, 9, 1, 3.840_130_0, 38_761.0, 0.001_296),
    row(1966, 1, 1, 4.313_170_0, 39_126.0, 0.002_592),
    row(1968, 2, 1, 4.213_170_0, 39_126.0, 0.002_592),
    row(1972, 1, 1, 10.0, 0.0, 0.0),
    row(1972, 7, 1, 11.0, 0.0, 0.0),
    row(1973, 1, 1, 12.0, 0.0, 0.0),
    row(1974, 1, 1, 13.0, 0.0, 0.0),
    row(1975, 1, 1, 14.0, 0.0, 0.0),
    row(1976, 1, 1, 15.0, 0.0, 0.0),
    row(1977, 1, 1, 16.0, 0.0, 0.0),
    row(1978, 1, 1, 17.0, 0.0, 0.0),
    row(1979, 1, 1, 18.0, 0.0, 0.0),
    row(1980, 1, 1, 19.0, 0.0, 0.0),
    row(1981, 7, 1, 20.0, 0.0, 0.0),
    row(1982, 7, 1, 21.0, 0.0, 0.0),
    row(1983, 7, 1, 22.0, 0.0, 0.0),
    row(1985, 7, 1, 23.0, 0.0, 0.0),
    row(1988, 1, 1, 24.0, 0.0, 0.0),
    row(1990, 1, 1, 25.0, 0.0, 0.0),
    row(1991, 1, 1, 26.0, 0.0, 0.0),
    row(1992, 7, 1, 27.0, 0.0, 0.0),
    row(1993, 7, 1, 28.0, 0.0, 0.0),
    row(1994, 7, 1, 29.0, 0.0, 0.0),
    row(1996, 1, 1, 30.0, 0.0, 0.0),
    row(1997, 7, 1, 31.0, 0.0, 0.0),
    row(1999, 1, 1, 32.0, 0.0, 0.0),
    row(2006, 1, 1, 33.0, 0.0, 0.0),
    row(2009, 1, 1, 34.0, 0.0, 0.0),
    row(2012, 7, 1, 35.0, 0.0, 0.0),
    row(2015, 7, 1, 36.0, 0.0, 0.0),
    row(2017, 1, 1, 37.0, 0.0, 0.0),
];

const fn row(
    year: i64,
    month: i64,
    day: i64,
    tai_utc: f64,
    drift_epoch: f64,
    drift_rate: f64,
) -> LeapSecond {
    LeapSecond {
        year,
        month,
        day,
        tai_utc,
        drift_epoch,
        drift_rate,
    }
}

/// Index of the first whole-second row (1972-01-01).
pub fn first_integral_row() -> usize {
    LEAP_SECONDS
        .iter()
        .position(|r| r.drift_rate == 0.0)
        .unwrap_or(LEAP_SECONDS.len())
}

/// The row in effect on the given UTC date, or `None` before the table
/// begins.
pub fn row_for_date(year: i64, month: i64, day: i64) -> Option<&'static LeapSecond> {
    LEAP_SECONDS
        .iter()
        .rev()
        .find(|r| (r.year, r.month, r.day) <= (year, month, day))
}

/// TAI - UTC in seconds on the given UTC date. `mjd` is the date's modified
/// Julian day, used by the pre-1972 drift terms. Dates before the table are
/// pre-leap-second and return zero.
pub fn tai_minus_utc(year: i64, month: i64, day: i64, mjd: f64) -> f64 {
    match row_for_date(year, month, day) {
        Some(row) if row.drift_rate != 0.0 => {
            row.tai_utc + (mjd - row.drift_epoch) * row.drift_rate
        }
        Some(row) => row.tai_utc,
        None => 0.0,
    }
}

/// Whether a UTC date lies past the table's validity.
pub fn is_past_table(year: i64, month: i64, day: i64) -> bool {
    let ymd = year * 10_000 + month * 100 + day;
    ymd > i64::from(LAST_UPDATED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_sorted_and_monotonic() {
        for pair in LEAP_SECONDS.windows(2) {
            assert!(
                (pair[0].year, pair[0].month, pair[0].day)
                    < (pair[1].year, pair[1].month, pair[1].day)
            );
        }
        for pair in LEAP_SECONDS[first_integral_row()..].windows(2) {
            assert_eq!(pair[1].tai_utc - pair[0].tai_utc, 1.0);
        }
    }

    #[test]
    fn offsets_at_known_dates() {
        assert_eq!(tai_minus_utc(1999, 6, 1, 0.0), 32.0);
        assert_eq!(tai_minus_utc(2016, 12, 31, 0.0), 36.0);
        assert_eq!(tai_minus_utc(2017, 1, 1, 0.0), 37.0);
        assert_eq!(tai_minus_utc(1959, 12, 31, 0.0), 0.0);
    }

    #[test]
    fn drift_formula_applies_before_1972() {
        // 1970-01-01 is MJD 40587, under the 1968-02-01 row.
        let dat = tai_minus_utc(1970, 1, 1, 40_587.0);
        assert!((dat - 8.000_082).abs() < 1e-6);
    }

    #[test]
    fn staleness_boundary() {
        assert!(!is_past_table(2017, 1, 1));
        assert!(is_past_table(2017, 1, 2));
    }
}
