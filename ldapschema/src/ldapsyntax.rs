//! LDAP syntaxes: the per-syntax acceptability dispatch, the
//! LDAPSyntaxDescription decoder, and the three attached-syntax variants
//! (substitution, regex pattern, enumeration).
//!
//! Unlike the older decoders, this one hard-errors on unrecognized
//! tokens that do not carry the `X-` extension prefix.

use std::cmp::Ordering;
use std::sync::Arc;

use regex::Regex;

use crate::data::ExtraProperties;
use crate::error::{constraint_error, syntax_error, Result};
use crate::gentime;
use crate::mrule::{MatchingRule, MatchingRuleKind};
use crate::schema::{MatchingRuleRegistry, Schema, SyntaxPolicy};
use crate::syntaxes;
use crate::token::{
    read_extra_parameter_values, read_quoted_string, read_quoted_string_folded, read_token_name,
    read_woid, skip_spaces,
};

// Standard syntax OIDs.
pub const BIT_STRING_OID: &str = "1.3.6.1.4.1.1466.115.121.1.6";
pub const DIRECTORY_STRING_OID: &str = "1.3.6.1.4.1.1466.115.121.1.15";
pub const DIT_STRUCTURE_RULE_DESCRIPTION_OID: &str = "1.3.6.1.4.1.1466.115.121.1.17";
pub const GENERALIZED_TIME_OID: &str = "1.3.6.1.4.1.1466.115.121.1.24";
pub const GUIDE_OID: &str = "1.3.6.1.4.1.1466.115.121.1.25";
pub const IA5_STRING_OID: &str = "1.3.6.1.4.1.1466.115.121.1.26";
pub const INTEGER_OID: &str = "1.3.6.1.4.1.1466.115.121.1.27";
pub const MATCHING_RULE_DESCRIPTION_OID: &str = "1.3.6.1.4.1.1466.115.121.1.30";
pub const ATTRIBUTE_TYPE_DESCRIPTION_OID: &str = "1.3.6.1.4.1.1466.115.121.1.3";
pub const OBJECT_CLASS_DESCRIPTION_OID: &str = "1.3.6.1.4.1.1466.115.121.1.37";
pub const OID_SYNTAX_OID: &str = "1.3.6.1.4.1.1466.115.121.1.38";
pub const OCTET_STRING_OID: &str = "1.3.6.1.4.1.1466.115.121.1.40";
pub const TELEPHONE_NUMBER_OID: &str = "1.3.6.1.4.1.1466.115.121.1.50";
pub const LDAP_SYNTAX_DESCRIPTION_OID: &str = "1.3.6.1.4.1.1466.115.121.1.54";

/// OID arc under which enum-ordering rules spawned by X-ENUM syntaxes
/// are registered; the syntax's own OID is appended.
pub const ENUM_ORDERING_OID_PREFIX: &str = "1.3.6.1.4.1.26027.1.4.8";

/// An X-SUBST chain longer than this is treated as malformed.  Decoding
/// with unknown elements allowed can register chains with dangling or
/// circular links, so resolution has to bound its walk.
const MAX_SUBSTITUTION_DEPTH: usize = 16;

// ---------------------------------------------------------------------------
// Syntax checks and variants
// ---------------------------------------------------------------------------

/// The value checker a plain syntax runs.  Flags baked into a check are
/// configuration supplied at construction time.
#[derive(Debug, Clone)]
pub enum SyntaxCheck {
    /// No constraint (octet string and friends).
    Any,
    BitString,
    Integer,
    GeneralizedTime,
    DirectoryString { allow_zero_length: bool },
    TelephoneNumber { strict: bool },
    Guide,
    Ia5String,
    AttributeTypeDescription,
    ObjectClassDescription,
    MatchingRuleDescription,
    DitStructureRuleDescription,
    LdapSyntaxDescription,
}

/// The behavior attached to a syntax: plain, or one of the three
/// extension kinds an LDAPSyntaxDescription can carry.
#[derive(Debug, Clone)]
pub enum SyntaxVariant {
    Plain(SyntaxCheck),
    /// X-SUBST: delegate everything to an existing syntax.
    Substitution { substitute: String },
    /// X-PATTERN: values must match the compiled pattern in full.
    Regex { pattern: Regex },
    /// X-ENUM: values must be one of the listed byte sequences; ordering
    /// is list position, served by a spawned matching rule.
    Enum { values: Vec<Vec<u8>> },
}

/// A syntax as the schema registry holds it.
#[derive(Debug, Clone)]
pub struct LdapSyntax {
    pub oid: String,
    pub description: Option<String>,
    pub variant: SyntaxVariant,
    pub extra: ExtraProperties,
}

impl LdapSyntax {
    pub fn plain(oid: &str, description: &str, check: SyntaxCheck) -> Self {
        LdapSyntax {
            oid: oid.to_string(),
            description: if description.is_empty() {
                None
            } else {
                Some(description.to_string())
            },
            variant: SyntaxVariant::Plain(check),
            extra: ExtraProperties::new(),
        }
    }

    /// Check a raw value against this syntax.  The caller gets a
    /// boolean and an appended diagnostic; decode errors never
    /// propagate out of this entry point.
    pub fn value_is_acceptable(
        &self,
        value: &[u8],
        schema: &Schema,
        diagnostic: &mut String,
    ) -> bool {
        let outcome: Result<()> = match &self.variant {
            SyntaxVariant::Plain(check) => run_check(check, value, schema),
            SyntaxVariant::Substitution { substitute } => {
                match self.resolve_substitute(substitute, schema) {
                    Ok(target) => {
                        return target.value_is_acceptable(value, schema, diagnostic);
                    }
                    Err(e) => Err(e),
                }
            }
            SyntaxVariant::Regex { pattern } => match std::str::from_utf8(value) {
                Ok(text) if pattern.is_match(text) => Ok(()),
                Ok(text) => Err(syntax_error(format!(
                    "value \"{}\" does not match pattern \"{}\"",
                    text,
                    pattern.as_str()
                ))),
                Err(_) => Err(syntax_error("value is not valid UTF-8")),
            },
            SyntaxVariant::Enum { values } => {
                if values.iter().any(|v| v == value) {
                    Ok(())
                } else {
                    Err(syntax_error(format!(
                        "value \"{}\" is not in the enumeration for syntax {}",
                        String::from_utf8_lossy(value),
                        self.oid
                    )))
                }
            }
        };
        match outcome {
            Ok(()) => true,
            Err(e) => {
                diagnostic.push_str(e.message());
                false
            }
        }
    }

    /// Follow an X-SUBST chain to its first non-substitution syntax,
    /// starting from `first`.  Errors on a dangling link or once the
    /// chain passes [`MAX_SUBSTITUTION_DEPTH`] hops, which also covers
    /// circular chains.
    fn resolve_substitute(&self, first: &str, schema: &Schema) -> Result<Arc<LdapSyntax>> {
        let mut current = first.to_string();
        for _ in 0..MAX_SUBSTITUTION_DEPTH {
            let syntax = schema.get_syntax(&current).ok_or_else(|| {
                constraint_error(format!(
                    "substitute syntax {} is not registered",
                    current
                ))
            })?;
            match &syntax.variant {
                SyntaxVariant::Substitution { substitute } => current = substitute.clone(),
                _ => return Ok(syntax),
            }
        }
        Err(constraint_error(format!(
            "substitution chain starting at syntax {} exceeds {} links",
            self.oid, MAX_SUBSTITUTION_DEPTH
        )))
    }

    // -- default matching rules --------------------------------------------

    pub fn default_equality_rule(&self, schema: &Schema) -> Option<String> {
        match &self.variant {
            SyntaxVariant::Plain(SyntaxCheck::Integer) => Some("2.5.13.14".to_string()),
            SyntaxVariant::Substitution { substitute } => self
                .resolve_substitute(substitute, schema)
                .ok()
                .and_then(|s| s.default_equality_rule(schema)),
            _ => None,
        }
    }

    pub fn default_ordering_rule(&self, schema: &Schema) -> Option<String> {
        match &self.variant {
            SyntaxVariant::Plain(SyntaxCheck::Integer) => Some("2.5.13.15".to_string()),
            SyntaxVariant::Plain(SyntaxCheck::GeneralizedTime) => Some("2.5.13.28".to_string()),
            SyntaxVariant::Substitution { substitute } => self
                .resolve_substitute(substitute, schema)
                .ok()
                .and_then(|s| s.default_ordering_rule(schema)),
            SyntaxVariant::Enum { .. } => Some(self.enum_rule_oid()),
            _ => None,
        }
    }

    pub fn default_substring_rule(&self, schema: &Schema) -> Option<String> {
        match &self.variant {
            SyntaxVariant::Plain(SyntaxCheck::Ia5String) => {
                Some("1.3.6.1.4.1.1466.109.114.3".to_string())
            }
            SyntaxVariant::Substitution { substitute } => self
                .resolve_substitute(substitute, schema)
                .ok()
                .and_then(|s| s.default_substring_rule(schema)),
            _ => None,
        }
    }

    pub fn default_approximate_rule(&self, schema: &Schema) -> Option<String> {
        match &self.variant {
            SyntaxVariant::Substitution { substitute } => self
                .resolve_substitute(substitute, schema)
                .ok()
                .and_then(|s| s.default_approximate_rule(schema)),
            _ => None,
        }
    }

    // -- enum rule lifecycle -----------------------------------------------

    /// OID of the ordering rule an X-ENUM syntax spawns.
    pub fn enum_rule_oid(&self) -> String {
        format!("{}.{}", ENUM_ORDERING_OID_PREFIX, self.oid)
    }

    /// Register the spawned ordering rule for an X-ENUM syntax.  The
    /// syntax owns this rule's lifecycle; plain syntaxes are a no-op.
    pub fn activate(&self, registry: &mut MatchingRuleRegistry) {
        if let SyntaxVariant::Enum { values } = &self.variant {
            registry.register(Arc::new(EnumOrderingRule {
                oid: self.enum_rule_oid(),
                names: vec![format!("enumOrderingMatch:{}", self.oid)],
                syntax_oid: self.oid.clone(),
                values: values.clone(),
            }));
        }
    }

    /// Deregister anything [`activate`](Self::activate) registered.
    pub fn finalize(&self, registry: &mut MatchingRuleRegistry) {
        if matches!(self.variant, SyntaxVariant::Enum { .. }) {
            registry.deregister(&self.enum_rule_oid());
        }
    }
}

fn run_check(check: &SyntaxCheck, value: &[u8], schema: &Schema) -> Result<()> {
    let text = || {
        std::str::from_utf8(value).map_err(|_| syntax_error("value is not valid UTF-8"))
    };
    match check {
        SyntaxCheck::Any => Ok(()),
        SyntaxCheck::BitString => syntaxes::check_bit_string(text()?),
        SyntaxCheck::Integer => syntaxes::check_integer(value),
        SyntaxCheck::GeneralizedTime => {
            gentime::decode_generalized_time(text()?).map(|_| ())
        }
        SyntaxCheck::DirectoryString { allow_zero_length } => {
            syntaxes::check_directory_string(value, *allow_zero_length)
        }
        SyntaxCheck::TelephoneNumber { strict } => {
            syntaxes::check_telephone_number(text()?, *strict)
        }
        SyntaxCheck::Guide => syntaxes::check_guide(text()?),
        SyntaxCheck::Ia5String => {
            for &b in value {
                if b > 0x7F {
                    return Err(syntax_error(format!(
                        "non-ASCII byte 0x{:02X} in IA5 string value",
                        b
                    )));
                }
            }
            Ok(())
        }
        SyntaxCheck::AttributeTypeDescription => {
            crate::attrtype::decode_attribute_type(text()?, schema, true).map(|_| ())
        }
        SyntaxCheck::ObjectClassDescription => {
            crate::objectclass::decode_object_class(text()?, schema, true).map(|_| ())
        }
        SyntaxCheck::MatchingRuleDescription => {
            crate::mrule::decode_matching_rule(text()?, schema, true).map(|_| ())
        }
        SyntaxCheck::DitStructureRuleDescription => {
            crate::ditrule::decode_dit_structure_rule(text()?, schema, true).map(|_| ())
        }
        SyntaxCheck::LdapSyntaxDescription => {
            decode_ldap_syntax(text()?, schema, true).map(|_| ())
        }
    }
}

// ---------------------------------------------------------------------------
// Enum-ordering matching rule
// ---------------------------------------------------------------------------

/// Ordering rule spawned by an X-ENUM syntax: values order by their
/// position in the enumeration, not lexically.
pub struct EnumOrderingRule {
    oid: String,
    names: Vec<String>,
    syntax_oid: String,
    values: Vec<Vec<u8>>,
}

impl EnumOrderingRule {
    fn position(&self, value: &[u8]) -> Result<usize> {
        self.values
            .iter()
            .position(|v| v == value)
            .ok_or_else(|| {
                syntax_error(format!(
                    "value \"{}\" is not in the enumeration for syntax {}",
                    String::from_utf8_lossy(value),
                    self.syntax_oid
                ))
            })
    }
}

impl MatchingRule for EnumOrderingRule {
    fn oid(&self) -> &str {
        &self.oid
    }

    fn names(&self) -> &[String] {
        &self.names
    }

    fn kind(&self) -> MatchingRuleKind {
        MatchingRuleKind::Ordering
    }

    fn syntax_oid(&self) -> &str {
        &self.syntax_oid
    }

    fn normalize(&self, value: &[u8], _policy: SyntaxPolicy) -> Result<Vec<u8>> {
        self.position(value)?;
        Ok(value.to_vec())
    }

    fn compare_values(&self, a: &[u8], b: &[u8], _policy: SyntaxPolicy) -> Result<Ordering> {
        Ok(self.position(a)?.cmp(&self.position(b)?))
    }
}

// ---------------------------------------------------------------------------
// LDAPSyntaxDescription decoder
// ---------------------------------------------------------------------------

/// Decode an RFC 4512 LDAPSyntaxDescription, including the X-SUBST /
/// X-PATTERN / X-ENUM extensions.  At most one of the three may appear.
pub fn decode_ldap_syntax(
    value: &str,
    schema: &Schema,
    allow_unknown_elements: bool,
) -> Result<LdapSyntax> {
    let lower = value.to_ascii_lowercase();
    let mut pos = skip_spaces(&lower, 0);
    if pos >= lower.len() {
        return Err(syntax_error("LDAP syntax description is empty"));
    }
    if lower.as_bytes()[pos] != b'(' {
        return Err(syntax_error(format!(
            "expected '(' at position {} in LDAP syntax description \"{}\"",
            pos, value
        )));
    }
    pos = skip_spaces(&lower, pos + 1);

    let (oid, mut pos) = read_woid(&lower, pos, schema.allow_name_exceptions())?;

    let mut description = None;
    let mut substitute: Option<String> = None;
    let mut pattern: Option<String> = None;
    let mut enum_values: Option<Vec<String>> = None;
    let mut extra = ExtraProperties::new();

    loop {
        let (token, new_pos) = read_token_name(value, pos)?;
        pos = new_pos;
        let token_lower = token.to_ascii_lowercase();
        match token_lower.as_str() {
            ")" => {
                if pos < lower.len() {
                    return Err(syntax_error(format!(
                        "unexpected content after ')' in LDAP syntax description \"{}\"",
                        value
                    )));
                }
                break;
            }
            "desc" => {
                let (desc, new_pos) = read_quoted_string(value, pos)?;
                description = Some(desc);
                pos = new_pos;
            }
            "x-subst" => {
                // Keyed on the folded form; the original casing is not
                // kept for substitute references.
                let (_, sub, new_pos) = read_quoted_string_folded(value, pos)?;
                substitute = Some(sub);
                pos = new_pos;
            }
            "x-pattern" => {
                let (pat, new_pos) = read_quoted_string(value, pos)?;
                pattern = Some(pat);
                pos = new_pos;
            }
            "x-enum" => {
                let mut values = Vec::new();
                pos = read_extra_parameter_values(value, pos, &mut values)?;
                enum_values = Some(values);
            }
            _ if token_lower.starts_with("x-") => {
                let mut values = Vec::new();
                pos = read_extra_parameter_values(value, pos, &mut values)?;
                extra.put(&token, values);
            }
            _ => {
                // This decoder, unlike the older ones, rejects unknown
                // tokens outright.
                return Err(syntax_error(format!(
                    "unknown token \"{}\" in LDAP syntax description \"{}\"",
                    token, value
                )));
            }
        }
    }

    let extension_count = [
        substitute.is_some(),
        pattern.is_some(),
        enum_values.is_some(),
    ]
    .iter()
    .filter(|&&p| p)
    .count();
    if extension_count > 1 {
        return Err(syntax_error(format!(
            "LDAP syntax description \"{}\" carries more than one of X-SUBST, X-PATTERN, X-ENUM",
            value
        )));
    }

    let variant = if let Some(sub) = substitute {
        if sub == oid {
            return Err(syntax_error(format!(
                "LDAP syntax {} substitutes itself",
                oid
            )));
        }
        if schema.get_syntax(&sub).is_none() && !allow_unknown_elements {
            return Err(constraint_error(format!(
                "LDAP syntax description \"{}\" references unknown substitute syntax {}",
                value, sub
            )));
        }
        SyntaxVariant::Substitution { substitute: sub }
    } else if let Some(pat) = pattern {
        if pat.is_empty() {
            return Err(syntax_error(format!(
                "LDAP syntax description \"{}\" has an empty X-PATTERN",
                value
            )));
        }
        // Full-value matching, as the original pattern semantics demand.
        let compiled = Regex::new(&format!("^(?:{})$", pat)).map_err(|e| {
            syntax_error(format!(
                "invalid X-PATTERN \"{}\" in LDAP syntax description: {}",
                pat, e
            ))
        })?;
        SyntaxVariant::Regex { pattern: compiled }
    } else if let Some(values) = enum_values {
        if values.is_empty() {
            return Err(syntax_error(format!(
                "X-ENUM in LDAP syntax description \"{}\" has no values",
                value
            )));
        }
        let mut seen: Vec<Vec<u8>> = Vec::with_capacity(values.len());
        for v in &values {
            let bytes = v.as_bytes().to_vec();
            if seen.contains(&bytes) {
                return Err(syntax_error(format!(
                    "duplicate value \"{}\" in X-ENUM of LDAP syntax description \"{}\"",
                    v, value
                )));
            }
            seen.push(bytes);
        }
        SyntaxVariant::Enum { values: seen }
    } else {
        SyntaxVariant::Plain(SyntaxCheck::Any)
    };

    Ok(LdapSyntax {
        oid,
        description,
        variant,
        extra,
    })
}

// ---------------------------------------------------------------------------
// Bootstrap syntax set
// ---------------------------------------------------------------------------

pub fn builtin_syntaxes() -> Vec<LdapSyntax> {
    vec![
        LdapSyntax::plain(BIT_STRING_OID, "Bit String", SyntaxCheck::BitString),
        LdapSyntax::plain(
            DIRECTORY_STRING_OID,
            "Directory String",
            SyntaxCheck::DirectoryString {
                allow_zero_length: false,
            },
        ),
        LdapSyntax::plain(
            DIT_STRUCTURE_RULE_DESCRIPTION_OID,
            "DIT Structure Rule Description",
            SyntaxCheck::DitStructureRuleDescription,
        ),
        LdapSyntax::plain(
            GENERALIZED_TIME_OID,
            "Generalized Time",
            SyntaxCheck::GeneralizedTime,
        ),
        LdapSyntax::plain(GUIDE_OID, "Guide", SyntaxCheck::Guide),
        LdapSyntax::plain(IA5_STRING_OID, "IA5 String", SyntaxCheck::Ia5String),
        LdapSyntax::plain(INTEGER_OID, "INTEGER", SyntaxCheck::Integer),
        LdapSyntax::plain(
            MATCHING_RULE_DESCRIPTION_OID,
            "Matching Rule Description",
            SyntaxCheck::MatchingRuleDescription,
        ),
        LdapSyntax::plain(
            ATTRIBUTE_TYPE_DESCRIPTION_OID,
            "Attribute Type Description",
            SyntaxCheck::AttributeTypeDescription,
        ),
        LdapSyntax::plain(
            OBJECT_CLASS_DESCRIPTION_OID,
            "Object Class Description",
            SyntaxCheck::ObjectClassDescription,
        ),
        LdapSyntax::plain(OID_SYNTAX_OID, "OID", SyntaxCheck::Any),
        LdapSyntax::plain(OCTET_STRING_OID, "Octet String", SyntaxCheck::Any),
        LdapSyntax::plain(
            TELEPHONE_NUMBER_OID,
            "Telephone Number",
            SyntaxCheck::TelephoneNumber { strict: false },
        ),
        LdapSyntax::plain(
            LDAP_SYNTAX_DESCRIPTION_OID,
            "LDAP Syntax Description",
            SyntaxCheck::LdapSyntaxDescription,
        ),
    ]
}
