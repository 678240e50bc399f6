//! DITStructureRuleDescription decoder.

use crate::data::{DitStructureRule, ExtraProperties, NameSet};
use crate::error::{constraint_error, syntax_error, Result};
use crate::schema::Schema;
use crate::token::{
    read_extra_parameter_values, read_name_list, read_quoted_string, read_token_name, read_woid,
    skip_spaces,
};

/// Decode an RFC 4512 DITStructureRuleDescription against a schema
/// snapshot.  Structure rules are identified by an integer rule id, not
/// an OID, and the FORM clause is mandatory.
pub fn decode_dit_structure_rule(
    value: &str,
    schema: &Schema,
    allow_unknown_elements: bool,
) -> Result<DitStructureRule> {
    let lower = value.to_ascii_lowercase();
    let mut pos = skip_spaces(&lower, 0);
    if pos >= lower.len() {
        return Err(syntax_error("DIT structure rule description is empty"));
    }
    if lower.as_bytes()[pos] != b'(' {
        return Err(syntax_error(format!(
            "expected '(' at position {} in DIT structure rule description \"{}\"",
            pos, value
        )));
    }
    pos = skip_spaces(&lower, pos + 1);

    let (rule_id, mut pos) = read_rule_id(&lower, pos)?;

    let mut names = NameSet::new();
    let mut description = None;
    let mut obsolete = false;
    let mut name_form: Option<String> = None;
    let mut superior_rules = Vec::new();
    let mut extra = ExtraProperties::new();

    loop {
        let (token, new_pos) = read_token_name(value, pos)?;
        pos = new_pos;
        match token.to_ascii_lowercase().as_str() {
            ")" => {
                if pos < lower.len() {
                    return Err(syntax_error(format!(
                        "unexpected content after ')' in DIT structure rule description \"{}\"",
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
            "form" => {
                let (woid, new_pos) = read_woid(&lower, pos, schema.allow_name_exceptions())?;
                pos = new_pos;
                match schema.get_name_form(&woid) {
                    Some(nf) => name_form = Some(nf.oid.clone()),
                    None => {
                        if !allow_unknown_elements {
                            return Err(constraint_error(format!(
                                "DIT structure rule description \"{}\" references unknown name form {}",
                                value, woid
                            )));
                        }
                    }
                }
            }
            "sup" => {
                pos = read_rule_id_list(&lower, pos, &mut superior_rules)?;
            }
            _ => {
                let mut values = Vec::new();
                pos = read_extra_parameter_values(value, pos, &mut values)?;
                extra.put(&token, values);
            }
        }
    }

    if name_form.is_none() && !allow_unknown_elements {
        return Err(syntax_error(format!(
            "DIT structure rule description \"{}\" has no FORM clause",
            value
        )));
    }

    Ok(DitStructureRule {
        rule_id,
        names,
        description,
        obsolete,
        name_form,
        superior_rules,
        extra,
    })
}

/// Read a bare decimal rule id.
fn read_rule_id(lower: &str, pos: usize) -> Result<(u32, usize)> {
    let bytes = lower.as_bytes();
    let start = skip_spaces(lower, pos);
    let mut end = start;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == start {
        return Err(syntax_error(format!(
            "expected a rule id at position {} in \"{}\"",
            start, lower
        )));
    }
    if end < bytes.len() && bytes[end] != b' ' && bytes[end] != b')' {
        return Err(syntax_error(format!(
            "illegal character '{}' in rule id at position {} in \"{}\"",
            bytes[end] as char, end, lower
        )));
    }
    let id: u32 = lower[start..end]
        .parse()
        .map_err(|_| syntax_error(format!("rule id out of range in \"{}\"", lower)))?;
    Ok((id, skip_spaces(lower, end)))
}

/// Read a SUP value: one rule id, or a parenthesized space-separated
/// list of rule ids.
fn read_rule_id_list(lower: &str, pos: usize, ids: &mut Vec<u32>) -> Result<usize> {
    let bytes = lower.as_bytes();
    let start = skip_spaces(lower, pos);
    if start >= bytes.len() {
        return Err(syntax_error(format!(
            "truncated value: expected superior rule id(s) in \"{}\"",
            lower
        )));
    }

    if bytes[start] == b'(' {
        let mut p = skip_spaces(lower, start + 1);
        loop {
            if p >= bytes.len() {
                return Err(syntax_error(format!(
                    "truncated value: unterminated superior rule list in \"{}\"",
                    lower
                )));
            }
            if bytes[p] == b')' {
                p += 1;
                break;
            }
            let (id, new_pos) = read_rule_id(lower, p)?;
            ids.push(id);
            p = new_pos;
        }
        Ok(skip_spaces(lower, p))
    } else {
        let (id, new_pos) = read_rule_id(lower, start)?;
        ids.push(id);
        Ok(new_pos)
    }
}

/// Acceptability entry point: swallows decode errors into a boolean and
/// an appended diagnostic.
pub fn dit_structure_rule_is_acceptable(
    value: &str,
    schema: &Schema,
    diagnostic: &mut String,
) -> bool {
    match decode_dit_structure_rule(value, schema, true) {
        Ok(_) => true,
        Err(e) => {
            diagnostic.push_str(e.message());
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::NameForm;
    use crate::error::ResultCode;

    fn test_schema() -> Schema {
        let mut schema = Schema::builtin();
        let mut names = NameSet::new();
        names.add("domainNameForm");
        schema.register_name_form(NameForm {
            oid: "1.3.6.1.1.10.15.1".to_string(),
            names,
        });
        schema
    }

    // ── Group 1: basic decoding ───────────────────────────────────

    #[test]
    fn decode_minimal() {
        let schema = test_schema();
        let rule = decode_dit_structure_rule(
            "( 21 NAME 'domainStructureRule' FORM domainNameForm )",
            &schema,
            false,
        )
        .unwrap();
        assert_eq!(rule.rule_id, 21);
        assert_eq!(rule.name(), "domainStructureRule");
        assert_eq!(rule.name_form.as_deref(), Some("1.3.6.1.1.10.15.1"));
        assert!(rule.superior_rules.is_empty());
    }

    #[test]
    fn decode_with_superior_list() {
        let schema = test_schema();
        let rule = decode_dit_structure_rule(
            "( 22 DESC 'below domains' FORM 1.3.6.1.1.10.15.1 SUP ( 21 20 ) X-ORIGIN 'local' )",
            &schema,
            false,
        )
        .unwrap();
        assert_eq!(rule.superior_rules, vec![21, 20]);
        assert_eq!(rule.description.as_deref(), Some("below domains"));
        assert_eq!(rule.extra.get("x-origin").unwrap(), &["local".to_string()]);
    }

    #[test]
    fn decode_single_superior() {
        let schema = test_schema();
        let rule = decode_dit_structure_rule(
            "( 22 FORM domainNameForm SUP 21 )",
            &schema,
            false,
        )
        .unwrap();
        assert_eq!(rule.superior_rules, vec![21]);
    }

    // ── Group 2: rule id parsing ──────────────────────────────────

    #[test]
    fn rule_id_must_be_numeric() {
        let schema = test_schema();
        assert!(decode_dit_structure_rule("( abc FORM domainNameForm )", &schema, false).is_err());
        assert!(decode_dit_structure_rule("( 2a FORM domainNameForm )", &schema, false).is_err());
    }

    #[test]
    fn rule_id_overflow() {
        let schema = test_schema();
        let err = decode_dit_structure_rule(
            "( 99999999999 FORM domainNameForm )",
            &schema,
            false,
        )
        .unwrap_err();
        assert!(err.message().contains("out of range"));
    }

    // ── Group 3: FORM clause ──────────────────────────────────────

    #[test]
    fn form_is_mandatory() {
        let schema = test_schema();
        let err = decode_dit_structure_rule("( 21 NAME 'x' )", &schema, false).unwrap_err();
        assert!(err.message().contains("FORM"));
        // Acceptability mode tolerates the omission.
        assert!(decode_dit_structure_rule("( 21 NAME 'x' )", &schema, true).is_ok());
    }

    #[test]
    fn unknown_name_form_is_constraint_violation() {
        let schema = test_schema();
        let err =
            decode_dit_structure_rule("( 21 FORM noSuchForm )", &schema, false).unwrap_err();
        assert_eq!(err.result_code(), ResultCode::ConstraintViolation);
        let rule = decode_dit_structure_rule("( 21 FORM noSuchForm )", &schema, true).unwrap();
        assert_eq!(rule.name_form, None);
    }

    // ── Group 4: acceptability wrapper ────────────────────────────

    #[test]
    fn acceptability_swallows_errors() {
        let schema = test_schema();
        let mut diag = String::new();
        assert!(dit_structure_rule_is_acceptable("( 21 FORM domainNameForm )", &schema, &mut diag));
        assert!(!dit_structure_rule_is_acceptable("21 FORM x", &schema, &mut diag));
        assert!(!diag.is_empty());
    }
}
