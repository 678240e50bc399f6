//! Matching rules: normalization plus equality, ordering, or substring
//! comparison semantics for attribute values.
//!
//! Rules are looked up through the registry by OID or name; index-query
//! construction goes through the injected [`IndexQueryFactory`]
//! collaborator so that no rule ever touches backend state directly.
//! Also hosts the matchingRule description decoder, which exists purely
//! so matchingRule attribute values can be acceptability-checked.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::data::{ExtraProperties, MatchingRuleDef, NameSet};
use crate::error::{constraint_error, syntax_error, Result};
use crate::gentime;
use crate::schema::{Schema, SyntaxPolicy};
use crate::syntaxes;
use crate::token::{
    read_extra_parameter_values, read_name_list, read_quoted_string, read_token_name, read_woid,
    skip_spaces,
};

// ---------------------------------------------------------------------------
// Trait surface
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchingRuleKind {
    Equality,
    Ordering,
    Substring,
    Approximate,
}

/// A parsed substring assertion: initial fragment, any number of middle
/// fragments, final fragment.
#[derive(Debug, Clone, Default)]
pub struct SubstringAssertion {
    pub initial: Option<Vec<u8>>,
    pub any: Vec<Vec<u8>>,
    pub final_fragment: Option<Vec<u8>>,
}

/// A named value-matching algorithm.  All operations are pure; the
/// default comparisons work on the normalized byte forms, and rules
/// whose normalized order differs from byte order override them.
pub trait MatchingRule: Send + Sync {
    fn oid(&self) -> &str;
    fn names(&self) -> &[String];
    fn kind(&self) -> MatchingRuleKind;
    fn syntax_oid(&self) -> &str;

    /// Normalize an attribute value to its comparable/indexable form.
    fn normalize(&self, value: &[u8], policy: SyntaxPolicy) -> Result<Vec<u8>>;

    fn values_match(&self, value: &[u8], assertion: &[u8], policy: SyntaxPolicy) -> Result<bool> {
        Ok(self.normalize(value, policy)? == self.normalize(assertion, policy)?)
    }

    fn compare_values(&self, a: &[u8], b: &[u8], policy: SyntaxPolicy) -> Result<Ordering> {
        Ok(self.normalize(a, policy)?.cmp(&self.normalize(b, policy)?))
    }

    fn value_matches_substring(
        &self,
        _value: &[u8],
        _assertion: &SubstringAssertion,
        _policy: SyntaxPolicy,
    ) -> Result<bool> {
        Err(syntax_error(format!(
            "matching rule {} does not implement substring matching",
            self.oid()
        )))
    }

    /// Describe the index lookup for an assertion against this rule.
    /// The default is an exact-match lookup on the normalized assertion.
    fn index_plan(&self, assertion: &[u8], policy: SyntaxPolicy) -> Result<IndexPlan> {
        Ok(IndexPlan::Exact(self.normalize(assertion, policy)?))
    }
}

// ---------------------------------------------------------------------------
// Index queries
// ---------------------------------------------------------------------------

/// A backend-neutral description of an index lookup.  An empty bound in
/// a range means unbounded on that side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexPlan {
    MatchAll,
    Exact(Vec<u8>),
    Range {
        lower: Vec<u8>,
        upper: Vec<u8>,
        lower_inclusive: bool,
        upper_inclusive: bool,
    },
    Intersection(Vec<IndexPlan>),
}

/// Storage collaborator that materializes index lookups.
pub trait IndexQueryFactory {
    type Query;

    fn create_exact_match_query(&self, key: &[u8]) -> Self::Query;
    fn create_range_match_query(
        &self,
        lower: &[u8],
        upper: &[u8],
        lower_inclusive: bool,
        upper_inclusive: bool,
    ) -> Self::Query;
    fn create_intersection_query(&self, subqueries: Vec<Self::Query>) -> Self::Query;
    fn create_match_all_query(&self) -> Self::Query;
}

/// Build a concrete query from a rule's plan for an assertion value.
pub fn create_index_query<F: IndexQueryFactory>(
    rule: &dyn MatchingRule,
    assertion: &[u8],
    policy: SyntaxPolicy,
    factory: &F,
) -> Result<F::Query> {
    let plan = rule.index_plan(assertion, policy)?;
    Ok(materialize_plan(&plan, factory))
}

fn materialize_plan<F: IndexQueryFactory>(plan: &IndexPlan, factory: &F) -> F::Query {
    match plan {
        IndexPlan::MatchAll => factory.create_match_all_query(),
        IndexPlan::Exact(key) => factory.create_exact_match_query(key),
        IndexPlan::Range {
            lower,
            upper,
            lower_inclusive,
            upper_inclusive,
        } => factory.create_range_match_query(lower, upper, *lower_inclusive, *upper_inclusive),
        IndexPlan::Intersection(subplans) => {
            let subqueries = subplans
                .iter()
                .map(|p| materialize_plan(p, factory))
                .collect();
            factory.create_intersection_query(subqueries)
        }
    }
}

// ---------------------------------------------------------------------------
// Integer matching rules
// ---------------------------------------------------------------------------

pub const INTEGER_SYNTAX_OID: &str = "1.3.6.1.4.1.1466.115.121.1.27";
pub const GENERALIZED_TIME_SYNTAX_OID: &str = "1.3.6.1.4.1.1466.115.121.1.24";
pub const IA5_STRING_SYNTAX_OID: &str = "1.3.6.1.4.1.1466.115.121.1.26";

pub struct IntegerEqualityRule {
    names: Vec<String>,
}

impl IntegerEqualityRule {
    pub fn new() -> Self {
        IntegerEqualityRule {
            names: vec!["integerMatch".to_string()],
        }
    }
}

impl Default for IntegerEqualityRule {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchingRule for IntegerEqualityRule {
    fn oid(&self) -> &str {
        "2.5.13.14"
    }

    fn names(&self) -> &[String] {
        &self.names
    }

    fn kind(&self) -> MatchingRuleKind {
        MatchingRuleKind::Equality
    }

    fn syntax_oid(&self) -> &str {
        INTEGER_SYNTAX_OID
    }

    fn normalize(&self, value: &[u8], policy: SyntaxPolicy) -> Result<Vec<u8>> {
        syntaxes::normalize_integer(value, policy)
    }
}

pub struct IntegerOrderingRule {
    names: Vec<String>,
}

impl IntegerOrderingRule {
    pub fn new() -> Self {
        IntegerOrderingRule {
            names: vec!["integerOrderingMatch".to_string()],
        }
    }
}

impl Default for IntegerOrderingRule {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchingRule for IntegerOrderingRule {
    fn oid(&self) -> &str {
        "2.5.13.15"
    }

    fn names(&self) -> &[String] {
        &self.names
    }

    fn kind(&self) -> MatchingRuleKind {
        MatchingRuleKind::Ordering
    }

    fn syntax_oid(&self) -> &str {
        INTEGER_SYNTAX_OID
    }

    fn normalize(&self, value: &[u8], policy: SyntaxPolicy) -> Result<Vec<u8>> {
        syntaxes::normalize_integer(value, policy)
    }

    fn compare_values(&self, a: &[u8], b: &[u8], policy: SyntaxPolicy) -> Result<Ordering> {
        let a = self.normalize(a, policy)?;
        let b = self.normalize(b, policy)?;
        Ok(syntaxes::compare_integer_values(&a, &b))
    }
}

// ---------------------------------------------------------------------------
// Generalized time ordering
// ---------------------------------------------------------------------------

pub struct GeneralizedTimeOrderingRule {
    names: Vec<String>,
}

impl GeneralizedTimeOrderingRule {
    pub fn new() -> Self {
        GeneralizedTimeOrderingRule {
            names: vec!["generalizedTimeOrderingMatch".to_string()],
        }
    }
}

impl Default for GeneralizedTimeOrderingRule {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchingRule for GeneralizedTimeOrderingRule {
    fn oid(&self) -> &str {
        "2.5.13.28"
    }

    fn names(&self) -> &[String] {
        &self.names
    }

    fn kind(&self) -> MatchingRuleKind {
        MatchingRuleKind::Ordering
    }

    fn syntax_oid(&self) -> &str {
        GENERALIZED_TIME_SYNTAX_OID
    }

    fn normalize(&self, value: &[u8], _policy: SyntaxPolicy) -> Result<Vec<u8>> {
        let text = std::str::from_utf8(value)
            .map_err(|_| syntax_error("generalized time value is not valid UTF-8"))?;
        gentime::normalize_generalized_time(text)
    }

    // Byte-lexicographic comparison of the fixed-width normalized form
    // is chronological comparison, so the default compare_values holds.
}

// ---------------------------------------------------------------------------
// Case-ignore IA5 substring matching
// ---------------------------------------------------------------------------

pub struct CaseIgnoreIa5SubstringRule {
    names: Vec<String>,
}

impl CaseIgnoreIa5SubstringRule {
    pub fn new() -> Self {
        CaseIgnoreIa5SubstringRule {
            names: vec!["caseIgnoreIA5SubstringsMatch".to_string()],
        }
    }
}

impl Default for CaseIgnoreIa5SubstringRule {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchingRule for CaseIgnoreIa5SubstringRule {
    fn oid(&self) -> &str {
        "1.3.6.1.4.1.1466.109.114.3"
    }

    fn names(&self) -> &[String] {
        &self.names
    }

    fn kind(&self) -> MatchingRuleKind {
        MatchingRuleKind::Substring
    }

    fn syntax_oid(&self) -> &str {
        IA5_STRING_SYNTAX_OID
    }

    /// Lowercase, collapse runs of spaces to one, and handle bytes
    /// outside 7-bit ASCII per policy (Reject raises, Warn logs once for
    /// the value then strips, Accept strips silently).
    fn normalize(&self, value: &[u8], policy: SyntaxPolicy) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(value.len());
        let mut warned = false;
        let mut last_was_space = false;
        for &b in value {
            if b > 0x7F {
                match policy {
                    SyntaxPolicy::Reject => {
                        return Err(syntax_error(format!(
                            "non-ASCII byte 0x{:02X} in IA5 string value",
                            b
                        )));
                    }
                    SyntaxPolicy::Warn => {
                        if !warned {
                            log::warn!("stripping non-ASCII byte 0x{:02X} from IA5 string value", b);
                            warned = true;
                        }
                    }
                    SyntaxPolicy::Accept => {}
                }
                continue;
            }
            if b == b' ' {
                if !last_was_space {
                    out.push(b' ');
                    last_was_space = true;
                }
            } else {
                out.push(b.to_ascii_lowercase());
                last_was_space = false;
            }
        }
        Ok(out)
    }

    /// Single left-to-right scan: initial as prefix, each any fragment by
    /// naive search advancing past the match, final as a suffix that must
    /// not overlap positions already consumed.
    fn value_matches_substring(
        &self,
        value: &[u8],
        assertion: &SubstringAssertion,
        policy: SyntaxPolicy,
    ) -> Result<bool> {
        let value = self.normalize(value, policy)?;
        let mut pos = 0usize;

        if let Some(initial) = &assertion.initial {
            let initial = self.normalize(initial, policy)?;
            if value.len() < initial.len() || value[..initial.len()] != initial[..] {
                return Ok(false);
            }
            pos = initial.len();
        }

        for fragment in &assertion.any {
            let fragment = self.normalize(fragment, policy)?;
            match find_subsequence(&value[pos..], &fragment) {
                Some(offset) => pos += offset + fragment.len(),
                None => return Ok(false),
            }
        }

        if let Some(final_fragment) = &assertion.final_fragment {
            let final_fragment = self.normalize(final_fragment, policy)?;
            if value.len() < final_fragment.len() {
                return Ok(false);
            }
            let start = value.len() - final_fragment.len();
            // The suffix must sit past everything the scan consumed.
            if start < pos {
                return Ok(false);
            }
            if value[start..] != final_fragment[..] {
                return Ok(false);
            }
        }

        Ok(true)
    }
}

/// Naive first-occurrence search; fragments are short enough that
/// anything cleverer would not pay for itself.
fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    if haystack.len() < needle.len() {
        return None;
    }
    (0..=haystack.len() - needle.len()).find(|&i| &haystack[i..i + needle.len()] == needle)
}

// ---------------------------------------------------------------------------
// Bootstrap rule set
// ---------------------------------------------------------------------------

pub fn builtin_rules() -> Vec<Arc<dyn MatchingRule>> {
    vec![
        Arc::new(IntegerEqualityRule::new()),
        Arc::new(IntegerOrderingRule::new()),
        Arc::new(GeneralizedTimeOrderingRule::new()),
        Arc::new(CaseIgnoreIa5SubstringRule::new()),
    ]
}

// ---------------------------------------------------------------------------
// MatchingRuleDescription decoder
// ---------------------------------------------------------------------------

/// Decode an RFC 4512 MatchingRuleDescription.  Used to check that a
/// matchingRule attribute value is acceptable; with
/// `allow_unknown_elements` set, an unresolvable SYNTAX reference is
/// tolerated.
pub fn decode_matching_rule(
    value: &str,
    schema: &Schema,
    allow_unknown_elements: bool,
) -> Result<MatchingRuleDef> {
    let lower = value.to_ascii_lowercase();
    let mut pos = skip_spaces(&lower, 0);
    if pos >= lower.len() {
        return Err(syntax_error("matching rule description is empty"));
    }
    if lower.as_bytes()[pos] != b'(' {
        return Err(syntax_error(format!(
            "expected '(' at position {} in matching rule description \"{}\"",
            pos, value
        )));
    }
    pos = skip_spaces(&lower, pos + 1);

    let (oid, mut pos) = read_woid(&lower, pos, schema.allow_name_exceptions())?;

    let mut names = NameSet::new();
    let mut description = None;
    let mut obsolete = false;
    let mut syntax = None;
    let mut extra = ExtraProperties::new();

    loop {
        let (token, new_pos) = read_token_name(value, pos)?;
        pos = new_pos;
        match token.to_ascii_lowercase().as_str() {
            ")" => {
                if pos < lower.len() {
                    return Err(syntax_error(format!(
                        "unexpected content after ')' in matching rule description \"{}\"",
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
            "syntax" => {
                let (woid, new_pos) = read_woid(&lower, pos, schema.allow_name_exceptions())?;
                if schema.get_syntax(&woid).is_none() && !allow_unknown_elements {
                    return Err(constraint_error(format!(
                        "matching rule description \"{}\" references unknown syntax {}",
                        value, woid
                    )));
                }
                syntax = Some(woid);
                pos = new_pos;
            }
            _ => {
                // Older-generation decoder: anything unrecognized is
                // captured as a generic extra property.
                let mut values = Vec::new();
                pos = read_extra_parameter_values(value, pos, &mut values)?;
                extra.put(&token, values);
            }
        }
    }

    let syntax = match syntax {
        Some(s) => s,
        None => {
            return Err(syntax_error(format!(
                "matching rule description \"{}\" has no SYNTAX clause",
                value
            )));
        }
    };

    Ok(MatchingRuleDef {
        oid,
        names,
        description,
        obsolete,
        syntax,
        extra,
    })
}

/// Acceptability entry point: never propagates the decode error, only a
/// boolean plus an appended diagnostic.
pub fn matching_rule_is_acceptable(value: &str, schema: &Schema, diagnostic: &mut String) -> bool {
    match decode_matching_rule(value, schema, true) {
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

    fn policy() -> SyntaxPolicy {
        SyntaxPolicy::Reject
    }

    // ── Group 1: integer rules ────────────────────────────────────

    #[test]
    fn integer_equality_matches_normalized_forms() {
        let rule = IntegerEqualityRule::new();
        assert!(rule.values_match(b"12345", b"12345", policy()).unwrap());
        assert!(!rule.values_match(b"12345", b"12346", policy()).unwrap());
    }

    #[test]
    fn integer_ordering_negative_before_positive() {
        let rule = IntegerOrderingRule::new();
        assert_eq!(
            rule.compare_values(b"-5", b"3", policy()).unwrap(),
            Ordering::Less
        );
        assert_eq!(
            rule.compare_values(b"99999999999999999999", b"100", policy())
                .unwrap(),
            Ordering::Greater
        );
    }

    #[test]
    fn integer_index_plan_is_exact_match() {
        let rule = IntegerEqualityRule::new();
        assert_eq!(
            rule.index_plan(b"42", policy()).unwrap(),
            IndexPlan::Exact(b"42".to_vec())
        );
    }

    // ── Group 2: generalized time ordering ────────────────────────

    #[test]
    fn gentime_ordering_across_time_zones() {
        let rule = GeneralizedTimeOrderingRule::new();
        assert_eq!(
            rule.compare_values(b"20060101120000Z", b"20060101130000+0100", policy())
                .unwrap(),
            Ordering::Equal
        );
        assert_eq!(
            rule.compare_values(b"20060101120000Z", b"20060101120001Z", policy())
                .unwrap(),
            Ordering::Less
        );
    }

    // ── Group 3: case-ignore IA5 substring ────────────────────────

    fn assertion(
        initial: Option<&[u8]>,
        any: &[&[u8]],
        final_fragment: Option<&[u8]>,
    ) -> SubstringAssertion {
        SubstringAssertion {
            initial: initial.map(|v| v.to_vec()),
            any: any.iter().map(|v| v.to_vec()).collect(),
            final_fragment: final_fragment.map(|v| v.to_vec()),
        }
    }

    #[test]
    fn ia5_normalize_folds_case_and_spaces() {
        let rule = CaseIgnoreIa5SubstringRule::new();
        assert_eq!(
            rule.normalize(b"Hello   World", policy()).unwrap(),
            b"hello world"
        );
    }

    #[test]
    fn ia5_normalize_policy_on_non_ascii() {
        let rule = CaseIgnoreIa5SubstringRule::new();
        assert!(rule.normalize(b"caf\xC3\xA9", SyntaxPolicy::Reject).is_err());
        assert_eq!(
            rule.normalize(b"caf\xC3\xA9", SyntaxPolicy::Accept).unwrap(),
            b"caf"
        );
    }

    #[test]
    fn ia5_substring_initial_any_final() {
        let rule = CaseIgnoreIa5SubstringRule::new();
        let value = b"The Quick Brown Fox";
        assert!(rule
            .value_matches_substring(value, &assertion(Some(b"the"), &[b"quick"], None), policy())
            .unwrap());
        assert!(rule
            .value_matches_substring(
                value,
                &assertion(Some(b"the"), &[b"quick", b"brown"], Some(b"fox")),
                policy()
            )
            .unwrap());
        assert!(!rule
            .value_matches_substring(value, &assertion(Some(b"quick"), &[], None), policy())
            .unwrap());
        assert!(!rule
            .value_matches_substring(
                value,
                &assertion(None, &[b"brown", b"quick"], None),
                policy()
            )
            .unwrap());
    }

    #[test]
    fn ia5_substring_final_overlap_rejected() {
        let rule = CaseIgnoreIa5SubstringRule::new();
        // "abc": any fragment "bc" consumes through position 3; final
        // "c" would need to start at position 2, inside consumed ground.
        assert!(!rule
            .value_matches_substring(b"abc", &assertion(None, &[b"bc"], Some(b"c")), policy())
            .unwrap());
        assert!(rule
            .value_matches_substring(b"abcc", &assertion(None, &[b"bc"], Some(b"c")), policy())
            .unwrap());
    }

    // ── Group 4: index query materialization ──────────────────────

    struct DebugFactory;

    impl IndexQueryFactory for DebugFactory {
        type Query = String;

        fn create_exact_match_query(&self, key: &[u8]) -> String {
            format!("exact({:?})", key)
        }

        fn create_range_match_query(
            &self,
            lower: &[u8],
            upper: &[u8],
            lower_inclusive: bool,
            upper_inclusive: bool,
        ) -> String {
            format!(
                "range({:?},{:?},{},{})",
                lower, upper, lower_inclusive, upper_inclusive
            )
        }

        fn create_intersection_query(&self, subqueries: Vec<String>) -> String {
            format!("and[{}]", subqueries.join(","))
        }

        fn create_match_all_query(&self) -> String {
            "all".to_string()
        }
    }

    #[test]
    fn create_index_query_goes_through_factory() {
        let rule = IntegerEqualityRule::new();
        let q = create_index_query(&rule, b"7", policy(), &DebugFactory).unwrap();
        assert_eq!(q, "exact([55])");
    }

    // ── Group 5: matching rule description decoder ────────────────

    #[test]
    fn decode_matching_rule_description() {
        let schema = Schema::builtin();
        let def = decode_matching_rule(
            "( 2.5.13.14 NAME 'integerMatch' SYNTAX 1.3.6.1.4.1.1466.115.121.1.27 )",
            &schema,
            false,
        )
        .unwrap();
        assert_eq!(def.oid, "2.5.13.14");
        assert_eq!(def.names.primary(), Some("integerMatch"));
        assert_eq!(def.syntax, INTEGER_SYNTAX_OID);
    }

    #[test]
    fn decode_matching_rule_requires_syntax() {
        let schema = Schema::builtin();
        let err =
            decode_matching_rule("( 2.5.13.14 NAME 'integerMatch' )", &schema, false).unwrap_err();
        assert!(err.message().contains("SYNTAX"));
    }

    #[test]
    fn decode_matching_rule_unknown_syntax_constraint() {
        let schema = Schema::builtin();
        let err = decode_matching_rule("( 2.5.13.99 SYNTAX 9.9.9 )", &schema, false).unwrap_err();
        assert_eq!(
            err.result_code(),
            crate::error::ResultCode::ConstraintViolation
        );
        // Tolerated in acceptability mode.
        assert!(decode_matching_rule("( 2.5.13.99 SYNTAX 9.9.9 )", &schema, true).is_ok());
    }

    #[test]
    fn matching_rule_acceptability_swallows_errors() {
        let schema = Schema::builtin();
        let mut diag = String::new();
        assert!(!matching_rule_is_acceptable("( 2.5.13.14", &schema, &mut diag));
        assert!(!diag.is_empty());
    }
}
