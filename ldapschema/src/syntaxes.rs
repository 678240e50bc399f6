//! Value syntaxes: acceptability checks and, where the syntax has a
//! binary form, encode/decode.
//!
//! The integer normalizer honors the three-level [`SyntaxPolicy`]:
//! Reject raises, Warn logs once per offending value and repairs,
//! Accept repairs silently.

use std::cmp::Ordering;

use crate::error::{syntax_error, Result};
use crate::schema::SyntaxPolicy;

// ---------------------------------------------------------------------------
// Bit string
// ---------------------------------------------------------------------------

/// Check a bit string value: `'`, binary digits, `'B` (the trailing B is
/// case-insensitive).  The shortest legal value is `''B`.
pub fn check_bit_string(value: &str) -> Result<()> {
    let bytes = value.as_bytes();
    if bytes.len() < 3 {
        return Err(syntax_error(format!(
            "bit string value \"{}\" is too short",
            value
        )));
    }
    if bytes[0] != b'\'' {
        return Err(syntax_error(format!(
            "bit string value \"{}\" is not quoted",
            value
        )));
    }
    let last = bytes[bytes.len() - 1];
    if last != b'B' && last != b'b' {
        return Err(syntax_error(format!(
            "bit string value \"{}\" does not end with 'B'",
            value
        )));
    }
    if bytes[bytes.len() - 2] != b'\'' {
        return Err(syntax_error(format!(
            "bit string value \"{}\" is missing the closing quote",
            value
        )));
    }
    for &b in &bytes[1..bytes.len() - 2] {
        if b != b'0' && b != b'1' {
            return Err(syntax_error(format!(
                "illegal character '{}' in bit string value \"{}\"",
                b as char, value
            )));
        }
    }
    Ok(())
}

/// Decode a bit string value to packed bytes.  Bits fill each byte left
/// to right, MSB first; a final partial byte holds its bits
/// right-justified, high bits zero.  Ten `1` bits decode to
/// `{0xFF, 0x03}`.
pub fn decode_bit_string_value(value: &str) -> Result<Vec<u8>> {
    check_bit_string(value)?;
    let bits = &value.as_bytes()[1..value.len() - 2];
    let mut out = Vec::with_capacity(bits.len().div_ceil(8));
    let mut acc = 0u8;
    let mut count = 0;
    for &b in bits {
        acc = (acc << 1) | (b - b'0');
        count += 1;
        if count == 8 {
            out.push(acc);
            acc = 0;
            count = 0;
        }
    }
    if count > 0 {
        out.push(acc);
    }
    Ok(out)
}

/// Encode packed bytes as a bit string value, eight bits per byte, MSB
/// first.  The exact inverse of [`decode_bit_string_value`] for
/// whole-byte inputs.
pub fn create_bit_string_value(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 8 + 3);
    s.push('\'');
    for &b in bytes {
        for shift in (0..8).rev() {
            s.push(if (b >> shift) & 1 == 1 { '1' } else { '0' });
        }
    }
    s.push_str("'B");
    s
}

// ---------------------------------------------------------------------------
// Integer
// ---------------------------------------------------------------------------

/// Check an integer value: optional leading minus, non-empty digit run,
/// no leading zero except for the literal `0`.
pub fn check_integer(value: &[u8]) -> Result<()> {
    if value.is_empty() {
        return Err(syntax_error("integer value is empty"));
    }
    let digits = if value[0] == b'-' { &value[1..] } else { value };
    if digits.is_empty() {
        return Err(syntax_error("integer value has a dash but no digits"));
    }
    if digits[0] == b'0' && digits.len() > 1 {
        return Err(syntax_error(format!(
            "integer value \"{}\" has a leading zero",
            String::from_utf8_lossy(value)
        )));
    }
    for &b in digits {
        if !b.is_ascii_digit() {
            return Err(syntax_error(format!(
                "illegal character '{}' in integer value \"{}\"",
                b as char,
                String::from_utf8_lossy(value)
            )));
        }
    }
    Ok(())
}

/// Normalize an integer value.  A conforming value passes through
/// byte-exact; violations (illegal character, misplaced dash, leading
/// zero) are handled per `policy`: Reject raises, Warn logs once for the
/// value then repairs, Accept repairs silently.  Repair drops the
/// offending bytes; a value with nothing left becomes `0`.
pub fn normalize_integer(value: &[u8], policy: SyntaxPolicy) -> Result<Vec<u8>> {
    let mut out: Vec<u8> = Vec::with_capacity(value.len());
    let mut warned = false;

    let mut violation = |msg: String, warned: &mut bool| -> Result<()> {
        match policy {
            SyntaxPolicy::Reject => Err(syntax_error(msg)),
            SyntaxPolicy::Warn => {
                if !*warned {
                    log::warn!("{}", msg);
                    *warned = true;
                }
                Ok(())
            }
            SyntaxPolicy::Accept => Ok(()),
        }
    };

    for (i, &b) in value.iter().enumerate() {
        match b {
            b'-' => {
                if out.is_empty() && i == 0 {
                    out.push(b'-');
                } else {
                    violation(
                        format!(
                            "misplaced dash at position {} in integer value \"{}\"",
                            i,
                            String::from_utf8_lossy(value)
                        ),
                        &mut warned,
                    )?;
                }
            }
            b'0' if out.is_empty() || out == b"-" => {
                // Leading zero: only legal when it is the entire number.
                if value.len() == 1 {
                    out.push(b'0');
                } else {
                    violation(
                        format!(
                            "leading zero in integer value \"{}\"",
                            String::from_utf8_lossy(value)
                        ),
                        &mut warned,
                    )?;
                }
            }
            b'0'..=b'9' => out.push(b),
            _ => {
                violation(
                    format!(
                        "illegal character '{}' at position {} in integer value \"{}\"",
                        b as char,
                        i,
                        String::from_utf8_lossy(value)
                    ),
                    &mut warned,
                )?;
            }
        }
    }

    if out.is_empty() || out == b"-" {
        if policy == SyntaxPolicy::Reject {
            return Err(syntax_error(format!(
                "integer value \"{}\" has no digits",
                String::from_utf8_lossy(value)
            )));
        }
        out = b"0".to_vec();
    }
    Ok(out)
}

/// Arbitrary-precision comparison of two normalized integer values:
/// sign first, then digit count, then bytewise digit comparison.  Never
/// parses to a machine integer, so values past 64 bits order correctly.
pub fn compare_integer_values(a: &[u8], b: &[u8]) -> Ordering {
    let a_neg = a.first() == Some(&b'-');
    let b_neg = b.first() == Some(&b'-');
    match (a_neg, b_neg) {
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        _ => {}
    }
    let a_digits = if a_neg { &a[1..] } else { a };
    let b_digits = if b_neg { &b[1..] } else { b };

    // No leading zeros in normalized form, so more digits means larger
    // magnitude.
    let magnitude = match a_digits.len().cmp(&b_digits.len()) {
        Ordering::Equal => a_digits.cmp(b_digits),
        other => other,
    };
    if a_neg {
        magnitude.reverse()
    } else {
        magnitude
    }
}

// ---------------------------------------------------------------------------
// Directory string
// ---------------------------------------------------------------------------

/// Check a directory string: UTF-8 text, non-empty unless zero-length
/// values are configured as acceptable.
pub fn check_directory_string(value: &[u8], allow_zero_length: bool) -> Result<()> {
    if value.is_empty() && !allow_zero_length {
        return Err(syntax_error("directory string value is empty"));
    }
    if std::str::from_utf8(value).is_err() {
        return Err(syntax_error("directory string value is not valid UTF-8"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Telephone number
// ---------------------------------------------------------------------------

/// Characters legal in a PrintableString.
fn is_printable_char(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(
            b,
            b'\'' | b'(' | b')' | b'+' | b',' | b'-' | b'.' | b'/' | b':' | b'?' | b' ' | b'='
        )
}

/// Check a telephone number.  Lenient mode accepts any non-empty
/// PrintableString; strict E.123 mode requires a leading `+` and allows
/// only digits, spaces, hyphens, periods, and parentheses after it, with
/// at least one digit.
pub fn check_telephone_number(value: &str, strict_e123: bool) -> Result<()> {
    let bytes = value.as_bytes();
    if bytes.is_empty() {
        return Err(syntax_error("telephone number value is empty"));
    }

    if !strict_e123 {
        for &b in bytes {
            if !is_printable_char(b) {
                return Err(syntax_error(format!(
                    "illegal character '{}' in telephone number value \"{}\"",
                    b as char, value
                )));
            }
        }
        return Ok(());
    }

    if bytes[0] != b'+' {
        return Err(syntax_error(format!(
            "telephone number value \"{}\" does not start with '+'",
            value
        )));
    }
    let mut digits = 0;
    for &b in &bytes[1..] {
        match b {
            b'0'..=b'9' => digits += 1,
            b' ' | b'-' | b'.' | b'(' | b')' => {}
            _ => {
                return Err(syntax_error(format!(
                    "illegal character '{}' in E.123 telephone number value \"{}\"",
                    b as char, value
                )));
            }
        }
    }
    if digits == 0 {
        return Err(syntax_error(format!(
            "telephone number value \"{}\" contains no digits",
            value
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Guide
// ---------------------------------------------------------------------------

const GUIDE_MATCH_TYPES: &[&str] = &["EQ", "SUBSTR", "GE", "LE", "APPROX"];

/// Check a guide value: `[ objectclass '#' ] criteria`.
pub fn check_guide(value: &str) -> Result<()> {
    let criteria = match value.find('#') {
        Some(pos) => {
            let class = &value[..pos];
            if class.is_empty() || !is_woid(class) {
                return Err(syntax_error(format!(
                    "invalid object class \"{}\" in guide value \"{}\"",
                    class, value
                )));
            }
            &value[pos + 1..]
        }
        None => value,
    };
    if criteria_is_valid(criteria) {
        Ok(())
    } else {
        Err(syntax_error(format!(
            "invalid criteria \"{}\" in guide value \"{}\"",
            criteria, value
        )))
    }
}

fn is_woid(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.is_empty() {
        return false;
    }
    if bytes[0].is_ascii_digit() {
        let mut last_was_period = true;
        for &b in bytes {
            match b {
                b'.' => {
                    if last_was_period {
                        return false;
                    }
                    last_was_period = true;
                }
                b'0'..=b'9' => last_was_period = false,
                _ => return false,
            }
        }
        !last_was_period
    } else if bytes[0].is_ascii_alphabetic() {
        bytes
            .iter()
            .all(|&b| b.is_ascii_alphanumeric() || b == b'-')
    } else {
        false
    }
}

/// Recursive descent over the boolean criteria mini-language: `!` prefix,
/// parenthesized sub-expressions joined by `|`/`&`, `?true`/`?false`,
/// or `attr$matchtype`.
fn criteria_is_valid(criteria: &str) -> bool {
    if criteria.is_empty() {
        return false;
    }
    let bytes = criteria.as_bytes();
    match bytes[0] {
        b'!' => criteria_is_valid(&criteria[1..]),
        b'(' => {
            let close = match matching_paren(bytes) {
                Some(i) => i,
                None => return false,
            };
            if !criteria_is_valid(&criteria[1..close]) {
                return false;
            }
            connector_is_valid(&criteria[close + 1..])
        }
        b'?' => {
            let rest = if let Some(r) = criteria.strip_prefix("?true") {
                r
            } else if let Some(r) = criteria.strip_prefix("?false") {
                r
            } else {
                return false;
            };
            connector_is_valid(rest)
        }
        _ => {
            // attr '$' matchtype, running to the next top-level connector.
            let end = bytes
                .iter()
                .position(|&b| b == b'|' || b == b'&')
                .unwrap_or(bytes.len());
            let term = &criteria[..end];
            let dollar = match term.find('$') {
                Some(i) => i,
                None => return false,
            };
            let attr = &term[..dollar];
            let match_type = &term[dollar + 1..];
            if !is_woid(attr) || !GUIDE_MATCH_TYPES.contains(&match_type) {
                return false;
            }
            connector_is_valid(&criteria[end..])
        }
    }
}

/// An empty tail, or a `|`/`&` connector followed by more valid criteria.
fn connector_is_valid(rest: &str) -> bool {
    if rest.is_empty() {
        return true;
    }
    let bytes = rest.as_bytes();
    if bytes[0] != b'|' && bytes[0] != b'&' {
        return false;
    }
    criteria_is_valid(&rest[1..])
}

/// Index of the parenthesis matching the opening one at position 0.
fn matching_paren(bytes: &[u8]) -> Option<usize> {
    let mut depth = 0usize;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
