//! Generalized time decoding and normalization.
//!
//! Values follow `YYYYMMDDHH[MM[SS[.fff]]](Z|+-HHMM|+-HH)`.  Each
//! two-digit field is validated by a hand-unrolled match that maps
//! directly to its calendar component; the fraction is read digit by
//! digit against the multiplier of the field it fractions (hour, minute,
//! or second).  The normalized form is the fixed-width zero-padded UTC
//! rendering `YYYYMMDDHHMMSS.fffZ`, which makes byte-lexicographic
//! comparison identical to chronological comparison.

use chrono::{Datelike, NaiveDate, TimeZone, Timelike, Utc};

use crate::error::{syntax_error, Result};

/// Milliseconds per unit of the field a fraction can apply to.
const MS_PER_HOUR: u128 = 3_600_000;
const MS_PER_MINUTE: u128 = 60_000;
const MS_PER_SECOND: u128 = 1_000;

/// Accumulation stops once the fraction scale reaches 10^15; later
/// digits cannot move the rounded millisecond value but must still be
/// consumed and validated.
const MAX_FRACTION_SCALE: u128 = 1_000_000_000_000_000;

/// 0000-01-01T00:00:00Z and 9999-12-31T23:59:59.999Z in epoch
/// milliseconds.  Instants outside this window have no four-digit-year
/// rendering, so the fixed-width normalized form could not hold them.
const MIN_EPOCH_MS: i64 = -62_167_219_200_000;
const MAX_EPOCH_MS: i64 = 253_402_300_799_999;

/// Decode a generalized time value to epoch milliseconds.
pub fn decode_generalized_time(value: &str) -> Result<i64> {
    let bytes = value.as_bytes();
    if bytes.len() < 11 {
        return Err(syntax_error(format!(
            "generalized time value \"{}\" is too short",
            value
        )));
    }

    let year = decode_year(value, bytes)?;
    let month = decode_month(value, bytes[4], bytes[5])?;
    let day = decode_day(value, bytes[6], bytes[7], month, year)?;
    let hour = decode_hour(value, bytes[8], bytes[9])?;

    let mut pos = 10;
    let mut minute = 0u32;
    let mut second = 0u32;
    let mut fraction_unit = MS_PER_HOUR;

    if pos + 1 < bytes.len() && bytes[pos].is_ascii_digit() {
        minute = decode_sexagesimal(value, bytes[pos], bytes[pos + 1], "minute")?;
        pos += 2;
        fraction_unit = MS_PER_MINUTE;

        if pos + 1 < bytes.len() && bytes[pos].is_ascii_digit() {
            second = decode_sexagesimal(value, bytes[pos], bytes[pos + 1], "second")?;
            pos += 2;
            fraction_unit = MS_PER_SECOND;
        }
    }

    let mut fraction_ms = 0u128;
    if pos < bytes.len() && (bytes[pos] == b'.' || bytes[pos] == b',') {
        pos += 1;
        let start = pos;
        let mut numerator = 0u128;
        let mut scale = 1u128;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            if scale < MAX_FRACTION_SCALE {
                numerator = numerator * 10 + (bytes[pos] - b'0') as u128;
                scale *= 10;
            }
            pos += 1;
        }
        if pos == start {
            return Err(syntax_error(format!(
                "generalized time value \"{}\" has an empty fraction",
                value
            )));
        }
        // Round half up on the first sub-millisecond digit.
        fraction_ms = (numerator * fraction_unit + scale / 2) / scale;
    }

    let offset_ms = decode_time_zone(value, bytes, pos)?;

    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
        syntax_error(format!(
            "generalized time value \"{}\" has an invalid date",
            value
        ))
    })?;
    let local_ms = date
        .and_hms_opt(hour, minute, second)
        .ok_or_else(|| {
            syntax_error(format!(
                "generalized time value \"{}\" has an invalid time of day",
                value
            ))
        })?
        .and_utc()
        .timestamp_millis()
        + fraction_ms as i64;

    let utc_ms = local_ms - offset_ms;
    if !(MIN_EPOCH_MS..=MAX_EPOCH_MS).contains(&utc_ms) {
        return Err(syntax_error(format!(
            "generalized time value \"{}\" falls outside years 0000-9999",
            value
        )));
    }
    Ok(utc_ms)
}

/// Normalize a generalized time value to its fixed-width UTC rendering.
pub fn normalize_generalized_time(value: &str) -> Result<Vec<u8>> {
    let millis = decode_generalized_time(value)?;
    Ok(format_generalized_time(millis).into_bytes())
}

/// Render epoch milliseconds as `YYYYMMDDHHMMSS.fffZ`.
pub fn format_generalized_time(millis: i64) -> String {
    // decode_generalized_time rejects instants outside years 0000-9999,
    // so a decoded value always has a four-digit-year rendering.
    let dt = Utc.timestamp_millis_opt(millis).single().unwrap_or_default();
    format!(
        "{:04}{:02}{:02}{:02}{:02}{:02}.{:03}Z",
        dt.year(),
        dt.month(),
        dt.day(),
        dt.hour(),
        dt.minute(),
        dt.second(),
        dt.timestamp_subsec_millis()
    )
}

// ---------------------------------------------------------------------------
// Field decoders
// ---------------------------------------------------------------------------

fn digit(value: &str, b: u8, what: &str) -> Result<u32> {
    if b.is_ascii_digit() {
        Ok((b - b'0') as u32)
    } else {
        Err(syntax_error(format!(
            "illegal character '{}' in {} of generalized time value \"{}\"",
            b as char, what, value
        )))
    }
}

fn decode_year(value: &str, bytes: &[u8]) -> Result<i32> {
    let mut year = 0i32;
    for &b in &bytes[0..4] {
        year = year * 10 + digit(value, b, "year")? as i32;
    }
    Ok(year)
}

fn decode_month(value: &str, b1: u8, b2: u8) -> Result<u32> {
    match (b1, b2) {
        (b'0', b'1'..=b'9') => Ok((b2 - b'0') as u32),
        (b'1', b'0'..=b'2') => Ok(10 + (b2 - b'0') as u32),
        _ => Err(syntax_error(format!(
            "invalid month \"{}{}\" in generalized time value \"{}\"",
            b1 as char, b2 as char, value
        ))),
    }
}

fn decode_day(value: &str, b1: u8, b2: u8, month: u32, year: i32) -> Result<u32> {
    let day = match (b1, b2) {
        (b'0', b'1'..=b'9') => (b2 - b'0') as u32,
        (b'1' | b'2', b'0'..=b'9') => (b1 - b'0') as u32 * 10 + (b2 - b'0') as u32,
        (b'3', b'0' | b'1') => 30 + (b2 - b'0') as u32,
        _ => {
            return Err(syntax_error(format!(
                "invalid day \"{}{}\" in generalized time value \"{}\"",
                b1 as char, b2 as char, value
            )))
        }
    };
    let max = match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => unreachable!("month already validated"),
    };
    if day > max {
        return Err(syntax_error(format!(
            "day {} is out of range for month {} in generalized time value \"{}\"",
            day, month, value
        )));
    }
    Ok(day)
}

fn is_leap_year(year: i32) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

fn decode_hour(value: &str, b1: u8, b2: u8) -> Result<u32> {
    match (b1, b2) {
        (b'0' | b'1', b'0'..=b'9') => Ok((b1 - b'0') as u32 * 10 + (b2 - b'0') as u32),
        (b'2', b'0'..=b'3') => Ok(20 + (b2 - b'0') as u32),
        _ => Err(syntax_error(format!(
            "invalid hour \"{}{}\" in generalized time value \"{}\"",
            b1 as char, b2 as char, value
        ))),
    }
}

fn decode_sexagesimal(value: &str, b1: u8, b2: u8, what: &str) -> Result<u32> {
    match (b1, b2) {
        (b'0'..=b'5', b'0'..=b'9') => Ok((b1 - b'0') as u32 * 10 + (b2 - b'0') as u32),
        _ => Err(syntax_error(format!(
            "invalid {} \"{}{}\" in generalized time value \"{}\"",
            what, b1 as char, b2 as char, value
        ))),
    }
}

/// Decode the mandatory time zone indicator starting at `pos`.  Returns
/// the offset from UTC in milliseconds (zero for `Z`).
fn decode_time_zone(value: &str, bytes: &[u8], pos: usize) -> Result<i64> {
    if pos >= bytes.len() {
        return Err(syntax_error(format!(
            "generalized time value \"{}\" is missing a time zone indicator",
            value
        )));
    }
    match bytes[pos] {
        b'Z' => {
            if pos + 1 != bytes.len() {
                return Err(syntax_error(format!(
                    "trailing characters after 'Z' in generalized time value \"{}\"",
                    value
                )));
            }
            Ok(0)
        }
        sign @ (b'+' | b'-') => {
            let rest = bytes.len() - pos - 1;
            if rest != 2 && rest != 4 {
                return Err(syntax_error(format!(
                    "invalid time zone offset in generalized time value \"{}\"",
                    value
                )));
            }
            let hour = decode_hour(value, bytes[pos + 1], bytes[pos + 2])?;
            let minute = if rest == 4 {
                decode_sexagesimal(value, bytes[pos + 3], bytes[pos + 4], "offset minute")?
            } else {
                0
            };
            let ms = (hour as i64 * 60 + minute as i64) * 60_000;
            Ok(if sign == b'-' { -ms } else { ms })
        }
        c => Err(syntax_error(format!(
            "invalid time zone indicator '{}' in generalized time value \"{}\"",
            c as char, value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(s: &str) -> String {
        String::from_utf8(normalize_generalized_time(s).unwrap()).unwrap()
    }

    // ── Group 1: decoding ─────────────────────────────────────────

    #[test]
    fn decode_with_second_fraction() {
        // 2006-01-01T12:00:00.500Z
        assert_eq!(
            decode_generalized_time("20060101120000.5Z").unwrap(),
            1_136_116_800_500
        );
    }

    #[test]
    fn decode_without_fraction() {
        assert_eq!(
            decode_generalized_time("20060101120000Z").unwrap(),
            1_136_116_800_000
        );
    }

    #[test]
    fn decode_hour_only_form() {
        assert_eq!(
            decode_generalized_time("2006010112Z").unwrap(),
            1_136_116_800_000
        );
    }

    #[test]
    fn decode_hour_fraction() {
        // .5 of an hour = 30 minutes.
        assert_eq!(
            decode_generalized_time("2006010112.5Z").unwrap(),
            1_136_116_800_000 + 30 * 60_000
        );
    }

    #[test]
    fn decode_minute_fraction() {
        // 12:30.5 = 12:30:30.
        assert_eq!(
            decode_generalized_time("200601011230.5Z").unwrap(),
            1_136_116_800_000 + 30 * 60_000 + 30_000
        );
    }

    #[test]
    fn decode_offset_forms() {
        let utc = decode_generalized_time("20060101120000Z").unwrap();
        assert_eq!(
            decode_generalized_time("20060101130000+0100").unwrap(),
            utc
        );
        assert_eq!(decode_generalized_time("20060101110000-01").unwrap(), utc);
    }

    #[test]
    fn very_long_fraction_decodes_without_overflow() {
        // Digits past the accumulation cap cannot change the rounded
        // millisecond value.
        let value = format!("20060101120000.{}Z", "1".repeat(45));
        assert_eq!(
            decode_generalized_time(&value).unwrap(),
            1_136_116_800_111
        );
    }

    #[test]
    fn fraction_rounds_half_up_on_fourth_digit() {
        let lo = decode_generalized_time("20060101120000.1234Z").unwrap();
        let hi = decode_generalized_time("20060101120000.1235Z").unwrap();
        assert_eq!(lo % 1000, 123);
        assert_eq!(hi % 1000, 124);
    }

    // ── Group 2: rejection ────────────────────────────────────────

    #[test]
    fn reject_missing_time_zone() {
        assert!(decode_generalized_time("20060101120000").is_err());
    }

    #[test]
    fn reject_bad_month_and_day() {
        assert!(decode_generalized_time("20061301120000Z").is_err());
        assert!(decode_generalized_time("20060132120000Z").is_err());
        assert!(decode_generalized_time("20060229120000Z").is_err());
    }

    #[test]
    fn leap_day_valid_in_leap_year() {
        assert!(decode_generalized_time("20040229120000Z").is_ok());
        assert!(decode_generalized_time("20000229120000Z").is_ok());
        assert!(decode_generalized_time("19000229120000Z").is_err());
    }

    #[test]
    fn reject_bad_hour_and_trailing_garbage() {
        assert!(decode_generalized_time("20060101240000Z").is_err());
        assert!(decode_generalized_time("20060101120000Zx").is_err());
        assert!(decode_generalized_time("20060101120000.Z").is_err());
    }

    #[test]
    fn offsets_cannot_escape_the_four_digit_year_range() {
        // A positive offset at year 0000 lands before the epoch window,
        // a negative one at year 9999 lands after it.
        assert!(decode_generalized_time("00000101000000+0100").is_err());
        assert!(decode_generalized_time("99991231235959-0100").is_err());

        assert!(decode_generalized_time("00000101000000Z").is_ok());
        assert!(decode_generalized_time("99991231235959Z").is_ok());
    }

    // ── Group 3: normalization ────────────────────────────────────

    #[test]
    fn normalized_form_is_fixed_width_utc() {
        assert_eq!(norm("20060101120000.5Z"), "20060101120000.500Z");
        assert_eq!(norm("20060101130000+0100"), "20060101120000.000Z");
        assert_eq!(norm("2006010112Z"), "20060101120000.000Z");
    }

    #[test]
    fn equal_instants_normalize_identically() {
        assert_eq!(norm("20060101120000.5Z"), norm("20060101120000.500Z"));
        assert_eq!(norm("20060101120000Z"), norm("20060101130000+01"));
    }

    #[test]
    fn lexicographic_order_matches_chronology() {
        let earlier = norm("20060101120000.499Z");
        let later = norm("20060101120000.5Z");
        assert!(earlier.as_bytes() < later.as_bytes());

        let much_later = norm("20070101000000Z");
        assert!(later.as_bytes() < much_later.as_bytes());
    }

    #[test]
    fn second_fraction_carry_propagates() {
        // 999.96 ms rounds to the next second.
        assert_eq!(norm("20061231235959.9996Z"), "20070101000000.000Z");
    }
}
