//! The three CDF time scales and their conversions.
//!
//! * `CDF_EPOCH` — `f64` milliseconds since 0000-01-01T00:00:00.000.
//! * `CDF_EPOCH16` — `(f64, f64)`: seconds since year 0 and picoseconds
//!   within the second.
//! * `CDF_TIME_TT2000` — `i64` nanoseconds since J2000
//!   (2000-01-01T12:00:00 TT), leap-second aware.
//!
//! Calendar math is proleptic Gregorian. TT2000 conversions consult the
//! compiled-in leap-second table; conversions past the table's validity
//! proceed with the last known offset and log a warning.

/// The compiled-in leap-second table.
pub mod leapsec;

use std::sync::OnceLock;

use tracing::warn;

use crate::error::{CdfError, Result};

/// The fill sentinel for CDF_EPOCH and the halves of CDF_EPOCH16.
pub const EPOCH_FILL: f64 = -1.0e31;

/// The fill sentinel for CDF_TIME_TT2000.
pub const TT2000_FILL: i64 = i64::MIN;

/// Component count of a broken-down CDF_EPOCH.
pub const EPOCH_COMPONENTS: usize = 7;
/// Component count of a broken-down CDF_EPOCH16.
pub const EPOCH16_COMPONENTS: usize = 10;
/// Component count of a broken-down CDF_TIME_TT2000.
pub const TT2000_COMPONENTS: usize = 9;

const DAYS_0000_TO_1970: i64 = 719_528;
const SECS_0000_TO_1970: i64 = 62_167_219_200;
const DAYS_1970_TO_2000: i64 = 10_957;
const NOON_SECS: i64 = 43_200;
const NS_PER_SEC: i64 = 1_000_000_000;
const TT_MINUS_TAI_NS: i64 = 32_184_000_000;
const MS_PER_DAY: f64 = 86_400_000.0;
const PS_PER_SEC: f64 = 1.0e12;

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Days since 1970-01-01 of a proleptic Gregorian date.
pub(crate) fn days_from_civil(year: i64, month: i64, day: i64) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = y.div_euclid(400);
    let yoe = y - era * 400;
    let mp = if month > 2 { month - 3 } else { month + 9 };
    let doy = (153 * mp + 2) / 5 + day - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

/// Proleptic Gregorian date of a count of days since 1970-01-01.
pub(crate) fn civil_from_days(days: i64) -> (i64, i64, i64) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    (if month <= 2 { y + 1 } else { y }, month, day)
}

/// How many of the next-finer unit make up component `index`
/// (0 year, 1 month, 2 day, 3 hour, 4 minute, 5 second, 6.. thousandths).
fn unit_ratio(index: usize) -> f64 {
    match index {
        2 => 24.0,
        3 | 4 => 60.0,
        _ => 1000.0,
    }
}

/// Expand a partial component list to `total` entries. Every component but
/// the last supplied one must be integral; the last one's fractional part is
/// distributed into the omitted finer units.
fn distribute(components: &[f64], total: usize) -> Result<Vec<f64>> {
    if components.len() < 3 || components.len() > total {
        return Err(CdfError::OutOfRange(format!(
            "{} components supplied, between 3 and {total} accepted",
            components.len()
        )));
    }
    let mut full = vec![0.0f64; total];
    full[..components.len()].copy_from_slice(components);
    for (index, value) in components.iter().enumerate() {
        if !value.is_finite() {
            return Err(CdfError::OutOfRange(format!(
                "component {index} is not finite"
            )));
        }
        if index + 1 < components.len() && value.fract() != 0.0 {
            return Err(CdfError::OutOfRange(
                "only the last supplied component may be fractional".to_string(),
            ));
        }
    }
    for index in components.len() - 1..total - 1 {
        let fraction = full[index].fract();
        full[index] = full[index].trunc();
        full[index + 1] += fraction * unit_ratio(index);
    }
    Ok(full)
}

/// Range checks shared by the three compute paths, applied to expanded
/// components.
fn validate_fields(full: &[f64], max_second: f64) -> Result<()> {
    let bounds: [(f64, f64, &str); 6] = [
        (0.0, 9999.0, "year"),
        (1.0, 12.0, "month"),
        (1.0, 31.0, "day"),
        (0.0, 23.0, "hour"),
        (0.0, 59.0, "minute"),
        (0.0, max_second, "second"),
    ];
    for ((lo, hi, name), value) in bounds.iter().zip(full) {
        if *value < *lo || *value > *hi {
            return Err(CdfError::OutOfRange(format!(
                "{name} component {value} outside [{lo}, {hi}]"
            )));
        }
    }
    for (index, value) in full.iter().enumerate().skip(6) {
        if *value < 0.0 || value.trunc() > 999.0 {
            return Err(CdfError::OutOfRange(format!(
                "sub-second component {index} holds {value}, outside [0, 999]"
            )));
        }
    }
    Ok(())
}

fn is_all_zero(components: &[f64]) -> bool {
    components.iter().all(|c| *c == 0.0)
}

fn is_fill_components(full: &[f64]) -> bool {
    full[..6] == [9999.0, 12.0, 31.0, 23.0, 59.0, 59.0] && full[6..].iter().all(|c| *c == 999.0)
}

fn fill_components<const N: usize>() -> [i64; N] {
    let mut comps = [999i64; N];
    comps[..6].copy_from_slice(&[9999, 12, 31, 23, 59, 59]);
    comps
}

// ---------------------------------------------------------------------------
// CDF_EPOCH
// ---------------------------------------------------------------------------

/// Compose a CDF_EPOCH value from calendar components
/// `[year, month, day, hour, minute, second, millisecond]`. Three or more
/// components may be supplied; only the last supplied one may carry a
/// fraction, which is distributed into the finer units.
pub fn compute_epoch(components: &[f64]) -> Result<f64> {
    if is_all_zero(components) {
        return Ok(0.0);
    }
    let full = distribute(components, EPOCH_COMPONENTS)?;
    if is_fill_components(&full) {
        return Ok(EPOCH_FILL);
    }
    validate_fields(&full, 59.0)?;
    let days = days_from_civil(full[0] as i64, full[1] as i64, full[2] as i64) + DAYS_0000_TO_1970;
    if days < 0 {
        return Err(CdfError::OutOfRange(
            "date precedes 0000-01-01".to_string(),
        ));
    }
    Ok(days as f64 * MS_PER_DAY
        + full[3] * 3_600_000.0
        + full[4] * 60_000.0
        + full[5] * 1000.0
        + full[6])
}

/// Break a CDF_EPOCH value into
/// `[year, month, day, hour, minute, second, millisecond]`.
pub fn breakdown_epoch(epoch: f64) -> Result<[i64; EPOCH_COMPONENTS]> {
    if epoch == EPOCH_FILL {
        return Ok(fill_components());
    }
    if !epoch.is_finite() || epoch < 0.0 {
        return Err(CdfError::OutOfRange(format!(
            "epoch value {epoch} is not a representable time"
        )));
    }
    let days = (epoch / MS_PER_DAY).floor();
    let ms_in_day = (epoch - days * MS_PER_DAY) as i64;
    let (year, month, day) = civil_from_days(days as i64 - DAYS_0000_TO_1970);
    Ok([
        year,
        month,
        day,
        ms_in_day / 3_600_000,
        ms_in_day / 60_000 % 60,
        ms_in_day / 1000 % 60,
        ms_in_day % 1000,
    ])
}

/// Render a CDF_EPOCH value as text: ISO 8601
/// `yyyy-mm-ddTHH:MM:SS.mmm`, or the classic `dd-Mmm-yyyy HH:MM:SS.mmm`.
pub fn encode_epoch(epoch: f64, iso_8601: bool) -> Result<String> {
    let c = breakdown_epoch(epoch)?;
    Ok(if iso_8601 {
        format!(
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}",
            c[0], c[1], c[2], c[3], c[4], c[5], c[6]
        )
    } else {
        format!(
            "{:02}-{}-{:04} {:02}:{:02}:{:02}.{:03}",
            c[2],
            MONTH_NAMES[(c[1] - 1) as usize],
            c[0],
            c[3],
            c[4],
            c[5],
            c[6]
        )
    })
}

/// Parse a CDF_EPOCH string in either grammar accepted by [`encode_epoch`].
pub fn parse_epoch(text: &str) -> Result<f64> {
    let (date, fractions) = parse_stamp(text)?;
    let ms = *fractions.first().unwrap_or(&0);
    compute_epoch(&[
        date[0] as f64,
        date[1] as f64,
        date[2] as f64,
        date[3] as f64,
        date[4] as f64,
        date[5] as f64,
        ms as f64,
    ])
}

/// Convert CDF_EPOCH values to Unix seconds at microsecond precision.
pub fn epoch_to_unixtime(epochs: &[f64]) -> Vec<f64> {
    epochs
        .iter()
        .map(|e| {
            let seconds = (e - SECS_0000_TO_1970 as f64 * 1000.0) / 1000.0;
            (seconds * 1.0e6).round() / 1.0e6
        })
        .collect()
}

// ---------------------------------------------------------------------------
// CDF_EPOCH16
// ---------------------------------------------------------------------------

/// Compose a CDF_EPOCH16 value from `[year, month, day, hour, minute,
/// second, millisecond, microsecond, nanosecond, picosecond]`.
pub fn compute_epoch16(components: &[f64]) -> Result<(f64, f64)> {
    if is_all_zero(components) {
        return Ok((0.0, 0.0));
    }
    let full = distribute(components, EPOCH16_COMPONENTS)?;
    if is_fill_components(&full) {
        return Ok((EPOCH_FILL, EPOCH_FILL));
    }
    validate_fields(&full, 59.0)?;
    let days = days_from_civil(full[0] as i64, full[1] as i64, full[2] as i64) + DAYS_0000_TO_1970;
    if days < 0 {
        return Err(CdfError::OutOfRange(
            "date precedes 0000-01-01".to_string(),
        ));
    }
    let mut seconds = days as f64 * 86_400.0 + full[3] * 3600.0 + full[4] * 60.0 + full[5];
    let mut picos = (full[6] * 1.0e9 + full[7] * 1.0e6 + full[8] * 1.0e3 + full[9]).round();
    // A picosecond field at exactly 10^12 carries into the seconds.
    if picos >= PS_PER_SEC {
        let carry = (picos / PS_PER_SEC).floor();
        seconds += carry;
        picos -= carry * PS_PER_SEC;
    }
    Ok((seconds, picos))
}

/// Break a CDF_EPOCH16 value into its ten components. Picosecond overflow
/// carries into the seconds half before splitting.
pub fn breakdown_epoch16(epoch: (f64, f64)) -> Result<[i64; EPOCH16_COMPONENTS]> {
    let (mut seconds, mut picos) = epoch;
    if seconds == EPOCH_FILL {
        return Ok(fill_components());
    }
    if !seconds.is_finite() || !picos.is_finite() || seconds < 0.0 || picos < 0.0 {
        return Err(CdfError::OutOfRange(format!(
            "epoch16 value ({seconds}, {picos}) is not a representable time"
        )));
    }
    if picos >= PS_PER_SEC {
        let carry = (picos / PS_PER_SEC).floor();
        seconds += carry;
        picos -= carry * PS_PER_SEC;
    }
    let days = (seconds / 86_400.0).floor();
    let sod = (seconds - days * 86_400.0) as i64;
    let (year, month, day) = civil_from_days(days as i64 - DAYS_0000_TO_1970);
    let picos = picos as i64;
    Ok([
        year,
        month,
        day,
        sod / 3600,
        sod / 60 % 60,
        sod % 60,
        picos / 1_000_000_000,
        picos / 1_000_000 % 1000,
        picos / 1000 % 1000,
        picos % 1000,
    ])
}

/// Render a CDF_EPOCH16 value as text, with the fraction carried to
/// picoseconds.
pub fn encode_epoch16(epoch: (f64, f64), iso_8601: bool) -> Result<String> {
    let c = breakdown_epoch16(epoch)?;
    Ok(if iso_8601 {
        format!(
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}{:03}{:03}{:03}",
            c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7], c[8], c[9]
        )
    } else {
        format!(
            "{:02}-{}-{:04} {:02}:{:02}:{:02}.{:03}.{:03}.{:03}.{:03}",
            c[2],
            MONTH_NAMES[(c[1] - 1) as usize],
            c[0],
            c[3],
            c[4],
            c[5],
            c[6],
            c[7],
            c[8],
            c[9]
        )
    })
}

/// Parse a CDF_EPOCH16 string in either grammar accepted by
/// [`encode_epoch16`].
pub fn parse_epoch16(text: &str) -> Result<(f64, f64)> {
    let (date, fractions) = parse_stamp(text)?;
    let mut components = [0.0f64; EPOCH16_COMPONENTS];
    for (slot, value) in components.iter_mut().zip(&date) {
        *slot = *value as f64;
    }
    for (slot, value) in components[6..].iter_mut().zip(&fractions) {
        *slot = *value as f64;
    }
    compute_epoch16(&components)
}

/// Convert CDF_EPOCH16 values to Unix seconds at microsecond precision.
pub fn epoch16_to_unixtime(epochs: &[(f64, f64)]) -> Vec<f64> {
    epochs
        .iter()
        .map(|(seconds, picos)| {
            let unix = (seconds - SECS_0000_TO_1970 as f64) + picos / PS_PER_SEC;
            (unix * 1.0e6).round() / 1.0e6
        })
        .collect()
}

// ---------------------------------------------------------------------------
// CDF_TIME_TT2000
// ---------------------------------------------------------------------------

struct TtRow {
    /// First TAI nanosecond (since J2000, TT-32.184s) governed by this row.
    start_tai: i128,
    /// TAI - UTC for this row, in nanoseconds.
    dat_ns: i128,
    /// The row's effective UTC midnight in leap-free nanoseconds since
    /// 2000-01-01T12:00 UTC.
    utc_day_ns: i128,
}

fn tt_rows() -> &'static [TtRow] {
    static ROWS: OnceLock<Vec<TtRow>> = OnceLock::new();
    ROWS.get_or_init(|| {
        leapsec::LEAP_SECONDS[leapsec::first_integral_row()..]
            .iter()
            .map(|row| {
                let days = days_from_civil(row.year, row.month, row.day) - DAYS_1970_TO_2000;
                let utc_day_ns =
                    i128::from(days * 86_400 - NOON_SECS) * i128::from(NS_PER_SEC);
                let dat_ns = i128::from(row.tai_utc as i64) * i128::from(NS_PER_SEC);
                TtRow {
                    start_tai: utc_day_ns + dat_ns,
                    dat_ns,
                    utc_day_ns,
                }
            })
            .collect()
    })
}

/// Compose a CDF_TIME_TT2000 value from `[year, month, day, hour, minute,
/// second, millisecond, microsecond, nanosecond]`. The second component may
/// be 60 inside an inserted leap second.
pub fn compute_tt2000(components: &[f64]) -> Result<i64> {
    if is_all_zero(components) {
        return Ok(TT2000_FILL);
    }
    let full = distribute(components, TT2000_COMPONENTS)?;
    if is_fill_components(&full) {
        return Ok(TT2000_FILL);
    }
    validate_fields(&full, 60.0)?;

    let (year, month, day) = (full[0] as i64, full[1] as i64, full[2] as i64);
    if leapsec::is_past_table(year, month, day) {
        warn!(
            "TT2000 conversion for {year:04}-{month:02}-{day:02} is past the \
             leap-second table (updated {}); using the last known offset",
            leapsec::LAST_UPDATED
        );
    }

    let days = days_from_civil(year, month, day) - DAYS_1970_TO_2000;
    let second = full[5].trunc() as i64;
    let subsecond_ns = (full[6] * 1.0e6 + full[7] * 1.0e3 + full[8]).round() as i64;
    let utc_ns = i128::from(days * 86_400 + full[3] as i64 * 3600 + full[4] as i64 * 60 + second)
        * i128::from(NS_PER_SEC)
        - i128::from(NOON_SECS) * i128::from(NS_PER_SEC)
        + i128::from(subsecond_ns);

    let mjd = days_from_civil(year, month, day) + 40_587;
    let dat = leapsec::tai_minus_utc(year, month, day, mjd as f64);
    let dat_ns = (dat * 1.0e9).round() as i128;

    let total = utc_ns + dat_ns + i128::from(TT_MINUS_TAI_NS);
    i64::try_from(total).map_err(|_| {
        CdfError::OutOfRange(format!(
            "{year:04}-{month:02}-{day:02} is outside the TT2000 range"
        ))
    })
}

fn utc_ns_to_components(utc: i128) -> Result<[i64; TT2000_COMPONENTS]> {
    let subns = utc.rem_euclid(i128::from(NS_PER_SEC)) as i64;
    let secs = utc.div_euclid(i128::from(NS_PER_SEC)) + i128::from(NOON_SECS);
    let days = i64::try_from(secs.div_euclid(86_400)).map_err(|_| {
        CdfError::OutOfRange("TT2000 value is outside the calendar range".to_string())
    })?;
    let sod = secs.rem_euclid(86_400) as i64;
    let (year, month, day) = civil_from_days(days + DAYS_1970_TO_2000);
    Ok([
        year,
        month,
        day,
        sod / 3600,
        sod / 60 % 60,
        sod % 60,
        subns / 1_000_000,
        subns / 1000 % 1000,
        subns % 1000,
    ])
}

/// Break a CDF_TIME_TT2000 value into its nine components. The second
/// component reads 60 inside an inserted leap second.
pub fn breakdown_tt2000(tt2000: i64) -> Result<[i64; TT2000_COMPONENTS]> {
    if tt2000 == TT2000_FILL {
        return Ok(fill_components());
    }
    let tai = i128::from(tt2000) - i128::from(TT_MINUS_TAI_NS);
    let rows = tt_rows();

    if tai < rows[0].start_tai {
        return breakdown_tt2000_drift(tai);
    }

    let index = rows.partition_point(|row| row.start_tai <= tai) - 1;
    let utc = tai - rows[index].dat_ns;

    if let Some(next) = rows.get(index + 1) {
        if utc >= next.utc_day_ns {
            // Inside the leap second inserted at the next row's midnight:
            // render as 23:59:60 of the preceding day.
            let sub = (utc - next.utc_day_ns) as i64;
            let mut comps = utc_ns_to_components(next.utc_day_ns - i128::from(NS_PER_SEC))?;
            comps[5] = 60;
            comps[6] = sub / 1_000_000;
            comps[7] = sub / 1000 % 1000;
            comps[8] = sub % 1000;
            return Ok(comps);
        }
    }

    let comps = utc_ns_to_components(utc)?;
    if index == rows.len() - 1 && leapsec::is_past_table(comps[0], comps[1], comps[2]) {
        warn!(
            "TT2000 value {tt2000} is past the leap-second table (updated {}); \
             converted with the last known offset",
            leapsec::LAST_UPDATED
        );
    }
    Ok(comps)
}

/// Pre-1972 conversion, where TAI - UTC is a drift formula rather than an
/// integer. Converges in a few rounds; nanosecond exactness is not defined
/// in this era.
fn breakdown_tt2000_drift(tai: i128) -> Result<[i64; TT2000_COMPONENTS]> {
    let tai_secs = tai as f64 / 1.0e9;
    let mut utc_secs = tai_secs;
    for _ in 0..3 {
        let days = ((utc_secs + NOON_SECS as f64) / 86_400.0).floor() as i64;
        let (year, month, day) = civil_from_days(days + DAYS_1970_TO_2000);
        let mjd = days_from_civil(year, month, day) + 40_587;
        utc_secs = tai_secs - leapsec::tai_minus_utc(year, month, day, mjd as f64);
    }
    // Rounded at microseconds: the drift formula's float math leaves noise
    // well under that, and sub-microsecond exactness has no meaning in the
    // drift era.
    let utc_ns = ((utc_secs * 1.0e6).round() as i128) * 1000;
    utc_ns_to_components(utc_ns)
}

/// Render a CDF_TIME_TT2000 value as text, with the fraction carried to
/// nanoseconds.
pub fn encode_tt2000(tt2000: i64, iso_8601: bool) -> Result<String> {
    let c = breakdown_tt2000(tt2000)?;
    Ok(if iso_8601 {
        format!(
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}{:03}{:03}",
            c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7], c[8]
        )
    } else {
        format!(
            "{:02}-{}-{:04} {:02}:{:02}:{:02}.{:03}.{:03}.{:03}",
            c[2],
            MONTH_NAMES[(c[1] - 1) as usize],
            c[0],
            c[3],
            c[4],
            c[5],
            c[6],
            c[7],
            c[8]
        )
    })
}

/// Parse a CDF_TIME_TT2000 string in either grammar accepted by
/// [`encode_tt2000`].
pub fn parse_tt2000(text: &str) -> Result<i64> {
    let (date, fractions) = parse_stamp(text)?;
    let mut components = [0.0f64; TT2000_COMPONENTS];
    for (slot, value) in components.iter_mut().zip(&date) {
        *slot = *value as f64;
    }
    for (slot, value) in components[6..].iter_mut().zip(&fractions) {
        *slot = *value as f64;
    }
    compute_tt2000(&components)
}

/// Convert CDF_TIME_TT2000 values to Unix seconds at microsecond precision.
/// A leap second folds into the first second of the following day, which is
/// the closest a Unix clock can come.
pub fn tt2000_to_unixtime(values: &[i64]) -> Result<Vec<f64>> {
    values
        .iter()
        .map(|v| {
            let c = breakdown_tt2000(*v)?;
            let days = days_from_civil(c[0], c[1], c[2]);
            let seconds = days * 86_400 + c[3] * 3600 + c[4] * 60 + c[5];
            let micros = c[6] * 1000 + c[7];
            Ok(seconds as f64 + micros as f64 / 1.0e6)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Shared
// ---------------------------------------------------------------------------

/// Binary-search a sorted epoch array for the values inside
/// `[start, end]`, inclusive. `None` bounds mean the domain minimum and
/// maximum. Returns the inclusive index range, or `None` when no values
/// fall inside the bounds.
pub fn find_epoch_range<T: PartialOrd>(
    values: &[T],
    start: Option<T>,
    end: Option<T>,
) -> Option<(usize, usize)> {
    if values.is_empty() {
        return None;
    }
    let lo = match &start {
        Some(s) => values.partition_point(|v| v < s),
        None => 0,
    };
    let hi = match &end {
        Some(e) => values.partition_point(|v| v <= e),
        None => values.len(),
    };
    if lo >= hi {
        return None;
    }
    Some((lo, hi - 1))
}

/// Split a timestamp in either grammar into `[year, month, day, hour,
/// minute, second]` plus thousandths groups (milliseconds first).
fn parse_stamp(text: &str) -> Result<([i64; 6], Vec<i64>)> {
    let malformed = || CdfError::Malformed(format!("unparsable epoch string {text:?}"));
    let text = text.trim();

    if let Some((date_part, time_part)) = text.split_once('T') {
        // ISO 8601: yyyy-mm-ddTHH:MM:SS.ffff...
        let mut date_fields = date_part.splitn(3, '-');
        let year = next_int(&mut date_fields).ok_or_else(malformed)?;
        let month = next_int(&mut date_fields).ok_or_else(malformed)?;
        let day = next_int(&mut date_fields).ok_or_else(malformed)?;
        let (clock, fraction) = split_clock(time_part).ok_or_else(malformed)?;
        let groups = fraction_groups_from_digits(fraction).ok_or_else(malformed)?;
        Ok(([year, month, day, clock[0], clock[1], clock[2]], groups))
    } else {
        // Classic: dd-Mmm-yyyy HH:MM:SS.fff[.fff...]
        let (date_part, time_part) = text.split_once(' ').ok_or_else(malformed)?;
        let mut date_fields = date_part.splitn(3, '-');
        let day = next_int(&mut date_fields).ok_or_else(malformed)?;
        let month_name = date_fields.next().ok_or_else(malformed)?;
        let month = MONTH_NAMES
            .iter()
            .position(|m| m.eq_ignore_ascii_case(month_name))
            .ok_or_else(malformed)? as i64
            + 1;
        let year = next_int(&mut date_fields).ok_or_else(malformed)?;
        let (clock, fraction) = split_clock(time_part).ok_or_else(malformed)?;
        let groups: Option<Vec<i64>> = if fraction.is_empty() {
            Some(vec![])
        } else {
            fraction
                .split('.')
                .map(|g| (g.len() <= 3).then(|| g.parse::<i64>().ok()).flatten())
                .collect()
        };
        Ok((
            [year, month, day, clock[0], clock[1], clock[2]],
            groups.ok_or_else(malformed)?,
        ))
    }
}

fn next_int<'a>(fields: &mut impl Iterator<Item = &'a str>) -> Option<i64> {
    fields.next()?.parse().ok()
}

/// Split `HH:MM:SS[.rest]` into the three clock fields and the fraction text.
fn split_clock(time_part: &str) -> Option<([i64; 3], &str)> {
    let mut fields = time_part.splitn(3, ':');
    let hour = next_int(&mut fields)?;
    let minute = next_int(&mut fields)?;
    let seconds_field = fields.next()?;
    let (second, fraction) = match seconds_field.split_once('.') {
        Some((s, f)) => (s.parse().ok()?, f),
        None => (seconds_field.parse().ok()?, ""),
    };
    Some(([hour, minute, second], fraction))
}

/// Turn an undotted ISO fraction like `123456789` into thousandths groups
/// `[123, 456, 789]`, padding a short last group with zeros.
fn fraction_groups_from_digits(digits: &str) -> Option<Vec<i64>> {
    if digits.is_empty() {
        return Some(vec![]);
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mut groups = Vec::with_capacity(digits.len().div_ceil(3));
    let bytes = digits.as_bytes();
    for chunk in bytes.chunks(3) {
        let mut text = std::str::from_utf8(chunk).ok()?.to_string();
        while text.len() < 3 {
            text.push('0');
        }
        groups.push(text.parse().ok()?);
    }
    Some(groups)
}
