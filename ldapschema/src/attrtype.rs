//! AttributeTypeDescription decoder.

use crate::data::{AttributeType, AttributeUsage, ExtraProperties, NameSet};
use crate::error::{constraint_error, syntax_error, Result};
use crate::ldapsyntax::DIRECTORY_STRING_OID;
use crate::schema::Schema;
use crate::token::{
    read_extra_parameter_values, read_name_list, read_quoted_string, read_token_name, read_woid,
    skip_spaces,
};

/// Decode an RFC 4512 AttributeTypeDescription against a schema
/// snapshot.  With `allow_unknown_elements`, unresolvable references
/// fall back to silent defaults; that mode is for acceptability checks
/// only and must never be used when installing the element.
pub fn decode_attribute_type(
    value: &str,
    schema: &Schema,
    allow_unknown_elements: bool,
) -> Result<AttributeType> {
    let lower = value.to_ascii_lowercase();
    let mut pos = skip_spaces(&lower, 0);
    if pos >= lower.len() {
        return Err(syntax_error("attribute type description is empty"));
    }
    if lower.as_bytes()[pos] != b'(' {
        return Err(syntax_error(format!(
            "expected '(' at position {} in attribute type description \"{}\"",
            pos, value
        )));
    }
    pos = skip_spaces(&lower, pos + 1);

    let (oid, mut pos) = read_woid(&lower, pos, schema.allow_name_exceptions())?;

    let mut names = NameSet::new();
    let mut description = None;
    let mut obsolete = false;
    let mut superior: Option<String> = None;
    let mut syntax: Option<String> = None;
    let mut equality_rule: Option<String> = None;
    let mut ordering_rule: Option<String> = None;
    let mut substring_rule: Option<String> = None;
    let mut approximate_rule: Option<String> = None;
    let mut usage = AttributeUsage::UserApplications;
    let mut collective = false;
    let mut no_user_modification = false;
    let mut single_value = false;
    let mut extra = ExtraProperties::new();

    loop {
        let (token, new_pos) = read_token_name(value, pos)?;
        pos = new_pos;
        match token.to_ascii_lowercase().as_str() {
            ")" => {
                if pos < lower.len() {
                    return Err(syntax_error(format!(
                        "unexpected content after ')' in attribute type description \"{}\"",
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
                // The superior's matching rules, syntax, usage, and flags
                // are copied as defaults the moment SUP is parsed.  A
                // later explicit clause overwrites the copy, but an
                // explicit clause that appeared *before* SUP is clobbered
                // here.  Clause order matters; this is long-standing
                // behavior that consumers rely on.
                let (woid, new_pos) = read_woid(&lower, pos, schema.allow_name_exceptions())?;
                pos = new_pos;
                match schema.get_attribute_type(&woid) {
                    Some(sup) => {
                        equality_rule = sup.equality_rule.clone();
                        ordering_rule = sup.ordering_rule.clone();
                        substring_rule = sup.substring_rule.clone();
                        approximate_rule = sup.approximate_rule.clone();
                        syntax = Some(sup.syntax.clone());
                        usage = sup.usage;
                        collective = sup.collective;
                        no_user_modification = sup.no_user_modification;
                        single_value = sup.single_value;
                        superior = Some(sup.oid.clone());
                    }
                    None => {
                        if !allow_unknown_elements {
                            return Err(constraint_error(format!(
                                "attribute type description \"{}\" references unknown superior type {}",
                                value, woid
                            )));
                        }
                        superior = Some(woid);
                    }
                }
            }
            "equality" => {
                let (woid, new_pos) = read_woid(&lower, pos, schema.allow_name_exceptions())?;
                pos = new_pos;
                match schema.get_equality_matching_rule(&woid) {
                    Some(rule) => equality_rule = Some(rule.oid().to_string()),
                    None => {
                        if !allow_unknown_elements {
                            return Err(constraint_error(format!(
                                "attribute type description \"{}\" references unknown equality matching rule {}",
                                value, woid
                            )));
                        }
                    }
                }
            }
            "ordering" => {
                let (woid, new_pos) = read_woid(&lower, pos, schema.allow_name_exceptions())?;
                pos = new_pos;
                match schema.get_ordering_matching_rule(&woid) {
                    Some(rule) => ordering_rule = Some(rule.oid().to_string()),
                    None => {
                        if !allow_unknown_elements {
                            return Err(constraint_error(format!(
                                "attribute type description \"{}\" references unknown ordering matching rule {}",
                                value, woid
                            )));
                        }
                    }
                }
            }
            "substr" => {
                let (woid, new_pos) = read_woid(&lower, pos, schema.allow_name_exceptions())?;
                pos = new_pos;
                match schema.get_substring_matching_rule(&woid) {
                    Some(rule) => substring_rule = Some(rule.oid().to_string()),
                    None => {
                        if !allow_unknown_elements {
                            return Err(constraint_error(format!(
                                "attribute type description \"{}\" references unknown substring matching rule {}",
                                value, woid
                            )));
                        }
                    }
                }
            }
            "syntax" => {
                let (woid, new_pos) = read_syntax_oid(&lower, pos)?;
                pos = new_pos;
                if schema.get_syntax(&woid).is_none() && !allow_unknown_elements {
                    return Err(constraint_error(format!(
                        "attribute type description \"{}\" references unknown syntax {}",
                        value, woid
                    )));
                }
                syntax = Some(woid);
            }
            "single-value" => {
                single_value = true;
            }
            "collective" => {
                collective = true;
            }
            "no-user-modification" => {
                no_user_modification = true;
            }
            "usage" => {
                let (woid, new_pos) = read_woid(&lower, pos, schema.allow_name_exceptions())?;
                pos = new_pos;
                usage = match AttributeUsage::parse(&woid) {
                    Some(u) => u,
                    None => {
                        return Err(syntax_error(format!(
                            "invalid USAGE \"{}\" in attribute type description \"{}\"",
                            woid, value
                        )));
                    }
                };
            }
            _ => {
                // Older-generation decoder: unknown tokens become
                // generic extra properties, extension-shaped or not.
                let mut values = Vec::new();
                pos = read_extra_parameter_values(value, pos, &mut values)?;
                extra.put(&token, values);
            }
        }
    }

    let syntax = syntax.unwrap_or_else(|| DIRECTORY_STRING_OID.to_string());

    // Rules still unset pick up the syntax's defaults.
    if let Some(s) = schema.get_syntax(&syntax) {
        if equality_rule.is_none() {
            equality_rule = s.default_equality_rule(schema);
        }
        if ordering_rule.is_none() {
            ordering_rule = s.default_ordering_rule(schema);
        }
        if substring_rule.is_none() {
            substring_rule = s.default_substring_rule(schema);
        }
        if approximate_rule.is_none() {
            approximate_rule = s.default_approximate_rule(schema);
        }
    }

    // Cross-field invariants.
    if let Some(sup_oid) = &superior {
        if let Some(sup) = schema.get_attribute_type(sup_oid) {
            if usage != sup.usage {
                return Err(syntax_error(format!(
                    "attribute type {} has usage {} but its superior {} has usage {}",
                    oid, usage, sup.oid, sup.usage
                )));
            }
            if collective != sup.collective {
                return Err(syntax_error(format!(
                    "attribute type {} and its superior {} disagree on COLLECTIVE",
                    oid, sup.oid
                )));
            }
        }
    }
    if collective && usage != AttributeUsage::UserApplications {
        return Err(syntax_error(format!(
            "collective attribute type {} must have userApplications usage",
            oid
        )));
    }
    if no_user_modification && usage == AttributeUsage::UserApplications {
        return Err(syntax_error(format!(
            "attribute type {} is NO-USER-MODIFICATION but has userApplications usage",
            oid
        )));
    }

    Ok(AttributeType {
        oid,
        names,
        description,
        obsolete,
        superior,
        syntax,
        equality_rule,
        ordering_rule,
        substring_rule,
        approximate_rule,
        usage,
        collective,
        no_user_modification,
        single_value,
        extra,
    })
}

/// Read the OID of a SYNTAX clause.  Unlike every other reference this
/// one may carry a `{len}` length bound; the bound is advisory at this
/// layer and dropped after a digits-only check.
fn read_syntax_oid(lower: &str, pos: usize) -> Result<(String, usize)> {
    let bytes = lower.as_bytes();
    let start = skip_spaces(lower, pos);
    let mut end = start;
    while end < bytes.len() && bytes[end] != b' ' && bytes[end] != b')' && bytes[end] != b'{' {
        end += 1;
    }
    let (oid, consumed) = read_woid(&lower[start..end], 0, false)?;
    if consumed != end - start {
        return Err(syntax_error(format!(
            "malformed syntax OID at position {} in \"{}\"",
            start, lower
        )));
    }
    let mut after = end;
    if after < bytes.len() && bytes[after] == b'{' {
        after += 1;
        let digits_start = after;
        while after < bytes.len() && bytes[after].is_ascii_digit() {
            after += 1;
        }
        if after == digits_start || after >= bytes.len() || bytes[after] != b'}' {
            return Err(syntax_error(format!(
                "malformed length bound on syntax OID at position {} in \"{}\"",
                end, lower
            )));
        }
        after += 1;
    }
    Ok((oid, skip_spaces(lower, after)))
}

/// Acceptability entry point: swallows decode errors into a boolean and
/// an appended diagnostic.
pub fn attribute_type_is_acceptable(value: &str, schema: &Schema, diagnostic: &mut String) -> bool {
    match decode_attribute_type(value, schema, true) {
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
    use crate::error::ResultCode;
    use crate::ldapsyntax::INTEGER_OID;

    fn test_schema() -> Schema {
        let mut schema = Schema::builtin();
        let name = decode_attribute_type(
            "( 2.5.4.41 NAME 'name' EQUALITY integerMatch ORDERING integerOrderingMatch \
             SYNTAX 1.3.6.1.4.1.1466.115.121.1.27 )",
            &schema,
            false,
        )
        .unwrap();
        schema.register_attribute_type(name);
        schema
    }

    // ── Group 1: basic decoding ───────────────────────────────────

    #[test]
    fn decode_minimal() {
        let schema = Schema::builtin();
        let at = decode_attribute_type("( 2.5.4.3 NAME 'cn' )", &schema, false).unwrap();
        assert_eq!(at.oid, "2.5.4.3");
        assert_eq!(at.name(), "cn");
        assert_eq!(at.syntax, DIRECTORY_STRING_OID);
        assert!(!at.obsolete);
        assert!(!at.single_value);
    }

    #[test]
    fn decode_full_clause_set() {
        let schema = Schema::builtin();
        let at = decode_attribute_type(
            "( 1.2.3.4 NAME ( 'testAttr' 'ta' ) DESC 'a test' OBSOLETE \
             EQUALITY integerMatch ORDERING integerOrderingMatch \
             SYNTAX 1.3.6.1.4.1.1466.115.121.1.27 SINGLE-VALUE \
             USAGE directoryOperation NO-USER-MODIFICATION \
             X-ORIGIN 'local' )",
            &schema,
            false,
        )
        .unwrap();
        assert_eq!(at.names.iter().collect::<Vec<_>>(), vec!["testAttr", "ta"]);
        assert_eq!(at.description.as_deref(), Some("a test"));
        assert!(at.obsolete);
        assert_eq!(at.equality_rule.as_deref(), Some("2.5.13.14"));
        assert_eq!(at.ordering_rule.as_deref(), Some("2.5.13.15"));
        assert_eq!(at.syntax, INTEGER_OID);
        assert!(at.single_value);
        assert!(at.no_user_modification);
        assert_eq!(at.usage, AttributeUsage::DirectoryOperation);
        assert_eq!(at.extra.get("X-ORIGIN").unwrap(), &["local".to_string()]);
    }

    #[test]
    fn decode_empty_and_unparenthesized() {
        let schema = Schema::builtin();
        assert!(decode_attribute_type("", &schema, false).is_err());
        assert!(decode_attribute_type("   ", &schema, false).is_err());
        assert!(decode_attribute_type("2.5.4.3 NAME 'cn'", &schema, false).is_err());
    }

    #[test]
    fn decode_trailing_garbage() {
        let schema = Schema::builtin();
        let err =
            decode_attribute_type("( 2.5.4.3 NAME 'cn' ) junk", &schema, false).unwrap_err();
        assert!(err.message().contains("after ')'"));
    }

    #[test]
    fn decode_missing_space_before_close_paren() {
        let schema = Schema::builtin();
        let at = decode_attribute_type(
            "( 2.5.4.3 SYNTAX 1.3.6.1.4.1.1466.115.121.1.27)",
            &schema,
            false,
        )
        .unwrap();
        assert_eq!(at.syntax, INTEGER_OID);
    }

    // ── Group 2: superior copying ─────────────────────────────────

    #[test]
    fn sup_copies_rules_and_syntax() {
        let schema = test_schema();
        let at = decode_attribute_type("( 2.5.4.3 NAME 'cn' SUP name )", &schema, false).unwrap();
        assert_eq!(at.superior.as_deref(), Some("2.5.4.41"));
        assert_eq!(at.equality_rule.as_deref(), Some("2.5.13.14"));
        assert_eq!(at.ordering_rule.as_deref(), Some("2.5.13.15"));
        assert_eq!(at.syntax, INTEGER_OID);
    }

    #[test]
    fn explicit_clause_after_sup_overrides_copy() {
        let schema = test_schema();
        let at = decode_attribute_type(
            "( 2.5.4.3 NAME 'cn' SUP name SYNTAX 1.3.6.1.4.1.1466.115.121.1.15 )",
            &schema,
            false,
        )
        .unwrap();
        assert_eq!(at.syntax, DIRECTORY_STRING_OID);
        // Rules copied from the superior survive.
        assert_eq!(at.equality_rule.as_deref(), Some("2.5.13.14"));
    }

    #[test]
    fn explicit_clause_before_sup_is_clobbered() {
        let schema = test_schema();
        // Order-dependent on purpose: SYNTAX appears first, SUP's copy
        // overwrites it.
        let at = decode_attribute_type(
            "( 2.5.4.3 NAME 'cn' SYNTAX 1.3.6.1.4.1.1466.115.121.1.15 SUP name )",
            &schema,
            false,
        )
        .unwrap();
        assert_eq!(at.syntax, INTEGER_OID);
    }

    #[test]
    fn unknown_superior_is_constraint_violation() {
        let schema = Schema::builtin();
        let err =
            decode_attribute_type("( 2.5.4.3 SUP noSuchType )", &schema, false).unwrap_err();
        assert_eq!(err.result_code(), ResultCode::ConstraintViolation);
        // Tolerated in acceptability mode.
        assert!(decode_attribute_type("( 2.5.4.3 SUP noSuchType )", &schema, true).is_ok());
    }

    // ── Group 3: cross-field invariants ───────────────────────────

    #[test]
    fn usage_must_match_superior() {
        let schema = test_schema();
        let err = decode_attribute_type(
            "( 2.5.4.3 SUP name USAGE directoryOperation )",
            &schema,
            false,
        )
        .unwrap_err();
        assert!(err.message().contains("usage"));
    }

    #[test]
    fn collective_requires_user_applications() {
        let schema = Schema::builtin();
        let err = decode_attribute_type(
            "( 1.2.3 COLLECTIVE USAGE directoryOperation )",
            &schema,
            false,
        )
        .unwrap_err();
        assert!(err.message().contains("userApplications"));
    }

    #[test]
    fn no_user_modification_requires_operational_usage() {
        let schema = Schema::builtin();
        assert!(decode_attribute_type("( 1.2.3 NO-USER-MODIFICATION )", &schema, false).is_err());
        assert!(decode_attribute_type(
            "( 1.2.3 NO-USER-MODIFICATION USAGE dSAOperation )",
            &schema,
            false
        )
        .is_ok());
    }

    // ── Group 4: syntax defaults and unknown rules ────────────────

    #[test]
    fn integer_syntax_supplies_default_rules() {
        let schema = Schema::builtin();
        let at = decode_attribute_type(
            "( 1.2.3 SYNTAX 1.3.6.1.4.1.1466.115.121.1.27 )",
            &schema,
            false,
        )
        .unwrap();
        assert_eq!(at.equality_rule.as_deref(), Some("2.5.13.14"));
        assert_eq!(at.ordering_rule.as_deref(), Some("2.5.13.15"));
    }

    #[test]
    fn unknown_equality_rule_is_constraint_violation() {
        let schema = Schema::builtin();
        let err =
            decode_attribute_type("( 1.2.3 EQUALITY noSuchRule )", &schema, false).unwrap_err();
        assert_eq!(err.result_code(), ResultCode::ConstraintViolation);
    }

    #[test]
    fn syntax_length_bound_is_dropped() {
        let schema = Schema::builtin();
        let at = decode_attribute_type(
            "( 1.2.3 SYNTAX 1.3.6.1.4.1.1466.115.121.1.15{256} )",
            &schema,
            false,
        )
        .unwrap();
        assert_eq!(at.syntax, DIRECTORY_STRING_OID);
    }

    // ── Group 5: round trip ───────────────────────────────────────

    #[test]
    fn definition_round_trip_preserves_assignments() {
        let schema = test_schema();
        let original = decode_attribute_type(
            "( 2.5.4.3 NAME ( 'cn' 'commonName' ) DESC 'common name' SUP name SINGLE-VALUE )",
            &schema,
            false,
        )
        .unwrap();
        let redecoded =
            decode_attribute_type(&original.definition(), &schema, false).unwrap();
        assert_eq!(redecoded.oid, original.oid);
        assert_eq!(redecoded.name(), original.name());
        assert_eq!(redecoded.equality_rule, original.equality_rule);
        assert_eq!(redecoded.ordering_rule, original.ordering_rule);
        assert_eq!(redecoded.syntax, original.syntax);
        assert_eq!(redecoded.single_value, original.single_value);
    }

    // ── Group 6: acceptability wrapper ────────────────────────────

    #[test]
    fn acceptability_swallows_errors() {
        let schema = Schema::builtin();
        let mut diag = String::new();
        assert!(attribute_type_is_acceptable("( 2.5.4.3 NAME 'cn' )", &schema, &mut diag));
        assert!(!attribute_type_is_acceptable("( 2..3 )", &schema, &mut diag));
        assert!(diag.contains("consecutive periods"));
    }
}
