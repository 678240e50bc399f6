//! ObjectClassDescription decoder.

use crate::data::{ExtraProperties, NameSet, ObjectClass, ObjectClassKind};
use crate::error::{constraint_error, syntax_error, Result};
use crate::schema::Schema;
use crate::token::{
    read_extra_parameter_values, read_name_list, read_quoted_string, read_token_name, read_woid,
    skip_spaces,
};

/// OID of the `top` abstract class, the root of the class hierarchy.
pub const TOP_OBJECTCLASS_OID: &str = "2.5.6.0";

/// Decode an RFC 4512 ObjectClassDescription against a schema snapshot.
///
/// MUST/MAY references to undefined attribute types are not fatal: the
/// undefined name is kept as written and a warning is logged, since
/// real-world schemas routinely ship classes before their attributes.
pub fn decode_object_class(
    value: &str,
    schema: &Schema,
    allow_unknown_elements: bool,
) -> Result<ObjectClass> {
    let lower = value.to_ascii_lowercase();
    let mut pos = skip_spaces(&lower, 0);
    if pos >= lower.len() {
        return Err(syntax_error("object class description is empty"));
    }
    if lower.as_bytes()[pos] != b'(' {
        return Err(syntax_error(format!(
            "expected '(' at position {} in object class description \"{}\"",
            pos, value
        )));
    }
    pos = skip_spaces(&lower, pos + 1);

    let (oid, mut pos) = read_woid(&lower, pos, schema.allow_name_exceptions())?;

    let mut names = NameSet::new();
    let mut description = None;
    let mut obsolete = false;
    let mut superior: Option<String> = None;
    let mut kind: Option<ObjectClassKind> = None;
    let mut required = Vec::new();
    let mut optional = Vec::new();
    let mut extra = ExtraProperties::new();

    loop {
        let (token, new_pos) = read_token_name(value, pos)?;
        pos = new_pos;
        match token.to_ascii_lowercase().as_str() {
            ")" => {
                if pos < lower.len() {
                    return Err(syntax_error(format!(
                        "unexpected content after ')' in object class description \"{}\"",
                        value
                    )));
                }
                break;
            }
            "name" => {
                pos = read_name_list(value, pos, &mut names)?;
            }
            "desc" => {
                let (desc, new_pos) = read_quoted_string(value, pos)?;
                description = Some(desc);
                pos = new_pos;
            }
            "obsolete" => {
                obsolete = true;
            }
            "sup" => {
                let (woid, new_pos) = read_woid(&lower, pos, schema.allow_name_exceptions())?;
                pos = new_pos;
                if oid == TOP_OBJECTCLASS_OID {
                    // top is the hierarchy root; a SUP clause on it (it
                    // conventionally names itself) is ignored.
                    continue;
                }
                match schema.get_object_class(&woid) {
                    Some(sup) => {
                        // A class naming itself as its own superior is
                        // treated as having none.
                        if sup.oid != oid {
                            if kind.is_none() {
                                kind = Some(sup.kind);
                            }
                            superior = Some(sup.oid.clone());
                        }
                    }
                    None => {
                        if woid == oid || names.contains(&woid) {
                            continue;
                        }
                        if !allow_unknown_elements {
                            return Err(constraint_error(format!(
                                "object class description \"{}\" references unknown superior class {}",
                                value, woid
                            )));
                        }
                        superior = Some(woid);
                    }
                }
            }
            "abstract" => {
                kind = Some(ObjectClassKind::Abstract);
            }
            "structural" => {
                kind = Some(ObjectClassKind::Structural);
            }
            "auxiliary" => {
                kind = Some(ObjectClassKind::Auxiliary);
            }
            "must" => {
                pos = read_attribute_list(value, &lower, pos, schema, &mut required)?;
            }
            "may" => {
                pos = read_attribute_list(value, &lower, pos, schema, &mut optional)?;
            }
            _ => {
                let mut values = Vec::new();
                pos = read_extra_parameter_values(value, pos, &mut values)?;
                extra.put(&token, values);
            }
        }
    }

    Ok(ObjectClass {
        oid,
        names,
        description,
        obsolete,
        superior,
        required,
        optional,
        kind: kind.unwrap_or(ObjectClassKind::Structural),
        extra,
    })
}

/// Read a MUST/MAY value: one WOID, or a parenthesized `$`-separated
/// list.  Each reference is resolved to its canonical OID when the type
/// is known; unknown references are kept as written with a warning.
fn read_attribute_list(
    value: &str,
    lower: &str,
    pos: usize,
    schema: &Schema,
    oids: &mut Vec<String>,
) -> Result<usize> {
    let bytes = lower.as_bytes();
    let start = skip_spaces(lower, pos);
    if start >= bytes.len() {
        return Err(syntax_error(format!(
            "truncated value: expected attribute type reference(s) in \"{}\"",
            value
        )));
    }

    if bytes[start] == b'(' {
        let mut p = skip_spaces(lower, start + 1);
        loop {
            let (woid, new_pos) = read_woid(lower, p, schema.allow_name_exceptions())?;
            oids.push(resolve_attribute(&woid, value, schema));
            p = new_pos;
            if p >= bytes.len() {
                return Err(syntax_error(format!(
                    "truncated value: unterminated attribute type list in \"{}\"",
                    value
                )));
            }
            match bytes[p] {
                b')' => {
                    p += 1;
                    break;
                }
                b'$' => {
                    p = skip_spaces(lower, p + 1);
                }
                c => {
                    return Err(syntax_error(format!(
                        "expected '$' or ')' at position {} in attribute type list in \"{}\", found '{}'",
                        p, value, c as char
                    )));
                }
            }
        }
        Ok(skip_spaces(lower, p))
    } else {
        let (woid, new_pos) = read_woid(lower, start, schema.allow_name_exceptions())?;
        oids.push(resolve_attribute(&woid, value, schema));
        Ok(new_pos)
    }
}

fn resolve_attribute(woid: &str, value: &str, schema: &Schema) -> String {
    match schema.get_attribute_type(woid) {
        Some(at) => at.oid.clone(),
        None => {
            log::warn!(
                "object class description \"{}\" references undefined attribute type {}",
                value,
                woid
            );
            woid.to_string()
        }
    }
}

/// Acceptability entry point: swallows decode errors into a boolean and
/// an appended diagnostic.
pub fn object_class_is_acceptable(value: &str, schema: &Schema, diagnostic: &mut String) -> bool {
    match decode_object_class(value, schema, true) {
        Ok(_) => true,
        Err(e) => {
            diagnostic.push_str(e.message());
            false
        }
    }
}
