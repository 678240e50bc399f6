//! Tokenizer primitives shared by all schema definition decoders.
//!
//! RFC 4512-style definitions are scanned with an explicit byte position,
//! space as the sole separator.  The only backtracking anywhere is the
//! one-character back-up when a WOID runs straight into a closing
//! parenthesis -- sloppy definitions that omit the space before `)` are
//! tolerated silently.

use crate::data::NameSet;
use crate::error::{syntax_error, Result};

/// Skip any spaces at `pos`, returning the first non-space position.
pub fn skip_spaces(value: &str, mut pos: usize) -> usize {
    let bytes = value.as_bytes();
    while pos < bytes.len() && bytes[pos] == b' ' {
        pos += 1;
    }
    pos
}

/// Read one whitespace-delimited token: skip leading spaces, consume the
/// non-space run, skip trailing spaces.  Returns the token and the new
/// position.
pub fn read_token_name(value: &str, pos: usize) -> Result<(String, usize)> {
    let bytes = value.as_bytes();
    let start = skip_spaces(value, pos);
    if start >= bytes.len() {
        return Err(syntax_error(format!(
            "truncated value: no token found at or after position {} in \"{}\"",
            pos, value
        )));
    }

    let mut end = start;
    while end < bytes.len() && bytes[end] != b' ' {
        end += 1;
    }
    let token = value[start..end].to_string();
    Ok((token, skip_spaces(value, end)))
}

/// Read a single-quoted string at `pos`.  The opening quote must be the
/// current character; the value runs to the next quote.  Trailing spaces
/// are skipped, and something must remain after them (a schema definition
/// never ends on a quoted value -- the closing `)` is still due).
pub fn read_quoted_string(value: &str, pos: usize) -> Result<(String, usize)> {
    let bytes = value.as_bytes();
    if pos >= bytes.len() {
        return Err(syntax_error(format!(
            "truncated value: expected quoted string at position {} in \"{}\"",
            pos, value
        )));
    }
    if bytes[pos] != b'\'' {
        return Err(syntax_error(format!(
            "expected a single quote at position {} in \"{}\", found '{}'",
            pos, value, bytes[pos] as char
        )));
    }

    let start = pos + 1;
    let mut end = start;
    while end < bytes.len() && bytes[end] != b'\'' {
        end += 1;
    }
    if end >= bytes.len() {
        return Err(syntax_error(format!(
            "truncated value: unterminated quoted string starting at position {} in \"{}\"",
            pos, value
        )));
    }

    let s = value[start..end].to_string();
    let after = skip_spaces(value, end + 1);
    if after >= bytes.len() {
        return Err(syntax_error(format!(
            "truncated value: nothing follows the quoted string ending at position {} in \"{}\"",
            end, value
        )));
    }
    Ok((s, after))
}

/// Dual-buffer variant of [`read_quoted_string`]: returns both the string
/// as written and its ASCII-lowercased shadow, for decoders that key on
/// the folded form but display the original.
pub fn read_quoted_string_folded(value: &str, pos: usize) -> Result<(String, String, usize)> {
    let (s, new_pos) = read_quoted_string(value, pos)?;
    let lower = s.to_ascii_lowercase();
    Ok((s, lower, new_pos))
}

/// Read a WOID ("word or OID"): either a numeric OID (digits and single
/// periods) or a descriptor name (letters, digits, hyphens, and underscore
/// when `allow_exceptions` is set).  `lower` must already be lowercased.
///
/// A bare `)` terminates the WOID early and backs the position up one
/// character so the caller's next token read sees it.
pub fn read_woid(lower: &str, pos: usize, allow_exceptions: bool) -> Result<(String, usize)> {
    let bytes = lower.as_bytes();
    let start = skip_spaces(lower, pos);
    if start >= bytes.len() {
        return Err(syntax_error(format!(
            "truncated value: expected an OID or name at or after position {} in \"{}\"",
            pos, lower
        )));
    }

    let mut end = start;
    if bytes[start].is_ascii_digit() {
        // Numeric OID.
        let mut last_was_period = false;
        loop {
            if end >= bytes.len() {
                break;
            }
            let c = bytes[end];
            match c {
                b' ' => break,
                // Missing separator before the close paren; hand the
                // paren back to the caller.
                b')' => break,
                b'.' => {
                    if last_was_period {
                        return Err(syntax_error(format!(
                            "two consecutive periods at position {} in numeric OID in \"{}\"",
                            end, lower
                        )));
                    }
                    last_was_period = true;
                }
                b'0'..=b'9' => {
                    last_was_period = false;
                }
                _ => {
                    return Err(syntax_error(format!(
                        "illegal character '{}' at position {} in numeric OID in \"{}\"",
                        c as char, end, lower
                    )));
                }
            }
            end += 1;
        }
        if last_was_period {
            return Err(syntax_error(format!(
                "numeric OID ends with a period at position {} in \"{}\"",
                end, lower
            )));
        }
    } else if bytes[start].is_ascii_alphabetic() {
        // Descriptor name.
        loop {
            if end >= bytes.len() {
                break;
            }
            let c = bytes[end];
            match c {
                b' ' | b')' => break,
                b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' => {}
                b'_' if allow_exceptions => {}
                _ => {
                    return Err(syntax_error(format!(
                        "illegal character '{}' at position {} in name in \"{}\"",
                        c as char, end, lower
                    )));
                }
            }
            end += 1;
        }
    } else {
        return Err(syntax_error(format!(
            "illegal character '{}' at position {} at start of OID or name in \"{}\"",
            bytes[start] as char, start, lower
        )));
    }

    let woid = lower[start..end].to_string();
    if woid.is_empty() {
        return Err(syntax_error(format!(
            "empty OID or name at position {} in \"{}\"",
            start, lower
        )));
    }

    // A `)` terminator stays unconsumed: skip_spaces will not move past it.
    Ok((woid, skip_spaces(lower, end)))
}

/// Read the value(s) of a generic extra parameter (an `X-*` extension):
/// either one bare word, one quoted string, or a parenthesized list of
/// quoted/bare values.  Appends every value found to `values`.
pub fn read_extra_parameter_values(
    value: &str,
    pos: usize,
    values: &mut Vec<String>,
) -> Result<usize> {
    let bytes = value.as_bytes();
    let start = skip_spaces(value, pos);
    if start >= bytes.len() {
        return Err(syntax_error(format!(
            "truncated value: expected extension value at or after position {} in \"{}\"",
            pos, value
        )));
    }

    match bytes[start] {
        b'\'' => {
            let (s, new_pos) = read_quoted_string(value, start)?;
            values.push(s);
            Ok(new_pos)
        }
        b'(' => {
            let mut p = skip_spaces(value, start + 1);
            loop {
                if p >= bytes.len() {
                    return Err(syntax_error(format!(
                        "truncated value: unterminated extension value list in \"{}\"",
                        value
                    )));
                }
                if bytes[p] == b')' {
                    p += 1;
                    break;
                }
                p = read_extra_parameter_values(value, p, values)?;
            }
            Ok(skip_spaces(value, p))
        }
        _ => {
            // Bare word, terminated by space or close paren.
            let mut end = start;
            while end < bytes.len() && bytes[end] != b' ' && bytes[end] != b')' {
                end += 1;
            }
            values.push(value[start..end].to_string());
            Ok(skip_spaces(value, end))
        }
    }
}

/// Read a NAME clause value: one quoted name, or a parenthesized list of
/// quoted names.  Adds each name to `names` in order of appearance.
pub fn read_name_list(value: &str, pos: usize, names: &mut NameSet) -> Result<usize> {
    let bytes = value.as_bytes();
    let start = skip_spaces(value, pos);
    if start >= bytes.len() {
        return Err(syntax_error(format!(
            "truncated value: expected name(s) at or after position {} in \"{}\"",
            pos, value
        )));
    }

    if bytes[start] == b'(' {
        let mut p = skip_spaces(value, start + 1);
        loop {
            if p >= bytes.len() {
                return Err(syntax_error(format!(
                    "truncated value: unterminated name list in \"{}\"",
                    value
                )));
            }
            if bytes[p] == b')' {
                p += 1;
                break;
            }
            let (name, new_pos) = read_quoted_string(value, p)?;
            names.add(&name);
            p = new_pos;
        }
        Ok(skip_spaces(value, p))
    } else {
        let (name, new_pos) = read_quoted_string(value, start)?;
        names.add(&name);
        Ok(new_pos)
    }
}
