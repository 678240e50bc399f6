//! Locale-aware collation matching rules.
//!
//! The collation service itself is injected through the [`Collator`] and
//! [`CollationProvider`] traits; this module turns one configured locale
//! mapping (`"en:2.16.840.1.113730.3.3.2.11.1"`) into the six matching
//! rule variants a directory exposes for it and wires their index plans
//! to the equality and substring indexes.
//!
//! Collation keys are opaque byte strings whose lexicographic order is
//! the locale's linguistic order.  Keys end in four zero terminator
//! bytes; the substring variant works on keys with the terminator
//! stripped so that six-byte index windows never span it.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::error::{syntax_error, Result};
use crate::mrule::{IndexPlan, MatchingRule, MatchingRuleKind, SubstringAssertion};
use crate::schema::{MatchingRuleRegistry, SyntaxPolicy};

/// Directory String, the syntax every collation rule matches against.
pub const COLLATION_SYNTAX_OID: &str = "1.3.6.1.4.1.1466.115.121.1.15";

/// Window width of the substring index.
const SUBSTRING_KEY_LEN: usize = 6;

/// Trailing terminator bytes on every collation key.
const KEY_TERMINATOR_LEN: usize = 4;

// ---------------------------------------------------------------------------
// Injected collation service
// ---------------------------------------------------------------------------

/// One locale's key generator.
pub trait Collator: Send + Sync {
    /// The collation key for `text`: byte-comparable, ending in four
    /// zero terminator bytes.
    fn collation_key(&self, text: &str) -> Vec<u8>;
}

/// Source of collators, keyed by language tag.
pub trait CollationProvider: Send + Sync {
    fn collator_for(&self, language_tag: &str) -> Option<Arc<dyn Collator>>;
}

// ---------------------------------------------------------------------------
// Rule variants
// ---------------------------------------------------------------------------

/// The six relational variants spawned per configured locale.  The OID
/// suffix and name suffix are fixed; `"en:<oid>"` yields `<oid>.1`
/// named `en.lt` through `<oid>.6` named `en.sub`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollationOperator {
    LessThan,
    LessThanOrEqual,
    Equality,
    GreaterThanOrEqual,
    GreaterThan,
    Substring,
}

impl CollationOperator {
    pub const ALL: [CollationOperator; 6] = [
        CollationOperator::LessThan,
        CollationOperator::LessThanOrEqual,
        CollationOperator::Equality,
        CollationOperator::GreaterThanOrEqual,
        CollationOperator::GreaterThan,
        CollationOperator::Substring,
    ];

    fn oid_suffix(&self) -> &'static str {
        match self {
            CollationOperator::LessThan => "1",
            CollationOperator::LessThanOrEqual => "2",
            CollationOperator::Equality => "3",
            CollationOperator::GreaterThanOrEqual => "4",
            CollationOperator::GreaterThan => "5",
            CollationOperator::Substring => "6",
        }
    }

    fn name_suffix(&self) -> &'static str {
        match self {
            CollationOperator::LessThan => "lt",
            CollationOperator::LessThanOrEqual => "lte",
            CollationOperator::Equality => "eq",
            CollationOperator::GreaterThanOrEqual => "gte",
            CollationOperator::GreaterThan => "gt",
            CollationOperator::Substring => "sub",
        }
    }

    fn kind(&self) -> MatchingRuleKind {
        match self {
            CollationOperator::Equality => MatchingRuleKind::Equality,
            CollationOperator::Substring => MatchingRuleKind::Substring,
            _ => MatchingRuleKind::Ordering,
        }
    }
}

// ---------------------------------------------------------------------------
// Locale mapping
// ---------------------------------------------------------------------------

/// One configured `"{languageTag}:{numericOID}"` mapping.
#[derive(Debug, Clone)]
pub struct CollationMapping {
    pub language_tag: String,
    pub base_oid: String,
}

impl CollationMapping {
    /// Parse a mapping config string.  The tag must be non-empty and the
    /// OID numeric.
    pub fn parse(config: &str) -> Result<CollationMapping> {
        let (tag, oid) = config.split_once(':').ok_or_else(|| {
            syntax_error(format!(
                "collation mapping \"{}\" is not of the form languageTag:numericOID",
                config
            ))
        })?;
        if tag.is_empty() {
            return Err(syntax_error(format!(
                "collation mapping \"{}\" has an empty language tag",
                config
            )));
        }
        if oid.is_empty()
            || !oid
                .bytes()
                .all(|b| b.is_ascii_digit() || b == b'.')
            || oid.starts_with('.')
            || oid.ends_with('.')
            || oid.contains("..")
        {
            return Err(syntax_error(format!(
                "collation mapping \"{}\" has a malformed numeric OID",
                config
            )));
        }
        Ok(CollationMapping {
            language_tag: tag.to_string(),
            base_oid: oid.to_string(),
        })
    }

    /// Build the six rule variants for this mapping.  Fails when the
    /// provider has no collator for the language tag.
    pub fn rules(&self, provider: &dyn CollationProvider) -> Result<Vec<Arc<dyn MatchingRule>>> {
        let collator = provider.collator_for(&self.language_tag).ok_or_else(|| {
            syntax_error(format!(
                "no collator available for language tag \"{}\"",
                self.language_tag
            ))
        })?;
        Ok(CollationOperator::ALL
            .iter()
            .map(|&operator| {
                let mut names = vec![format!("{}.{}", self.language_tag, operator.name_suffix())];
                if operator == CollationOperator::Equality {
                    // The bare tag and the unsuffixed OID both resolve
                    // to the equality variant.
                    names.push(self.language_tag.clone());
                    names.push(self.base_oid.clone());
                }
                Arc::new(CollationRule {
                    oid: format!("{}.{}", self.base_oid, operator.oid_suffix()),
                    names,
                    operator,
                    collator: Arc::clone(&collator),
                }) as Arc<dyn MatchingRule>
            })
            .collect())
    }

    /// Register the six variants.
    pub fn activate(
        &self,
        provider: &dyn CollationProvider,
        registry: &mut MatchingRuleRegistry,
    ) -> Result<()> {
        for rule in self.rules(provider)? {
            registry.register(rule);
        }
        Ok(())
    }

    /// Deregister anything [`activate`](Self::activate) registered.
    pub fn finalize(&self, registry: &mut MatchingRuleRegistry) {
        for operator in CollationOperator::ALL {
            registry.deregister(&format!("{}.{}", self.base_oid, operator.oid_suffix()));
        }
    }
}

// ---------------------------------------------------------------------------
// The rule itself
// ---------------------------------------------------------------------------

struct CollationRule {
    oid: String,
    names: Vec<String>,
    operator: CollationOperator,
    collator: Arc<dyn Collator>,
}

impl CollationRule {
    fn key(&self, value: &[u8]) -> Result<Vec<u8>> {
        let text = std::str::from_utf8(value)
            .map_err(|_| syntax_error("collation value is not valid UTF-8"))?;
        Ok(self.collator.collation_key(text))
    }

    /// Key with the four-byte terminator stripped, for substring work.
    fn substring_key(&self, value: &[u8]) -> Result<Vec<u8>> {
        let mut key = self.key(value)?;
        key.truncate(key.len().saturating_sub(KEY_TERMINATOR_LEN));
        Ok(key)
    }

}

/// Index plans for one assertion fragment against the substring index:
/// a prefix range when the fragment key fits inside one window,
/// otherwise an exact lookup per six-byte window.
fn fragment_plans(key: &[u8], plans: &mut Vec<IndexPlan>) {
    if key.len() < SUBSTRING_KEY_LEN {
        plans.push(prefix_range(key));
    } else {
        for window in key.windows(SUBSTRING_KEY_LEN) {
            plans.push(IndexPlan::Exact(window.to_vec()));
        }
    }
}

impl MatchingRule for CollationRule {
    fn oid(&self) -> &str {
        &self.oid
    }

    fn names(&self) -> &[String] {
        &self.names
    }

    fn kind(&self) -> MatchingRuleKind {
        self.operator.kind()
    }

    fn syntax_oid(&self) -> &str {
        COLLATION_SYNTAX_OID
    }

    fn normalize(&self, value: &[u8], _policy: SyntaxPolicy) -> Result<Vec<u8>> {
        if self.operator == CollationOperator::Substring {
            self.substring_key(value)
        } else {
            self.key(value)
        }
    }

    /// The relational operator is the match semantics: the lessThan
    /// variant matches values strictly below the assertion, and so on.
    fn values_match(&self, value: &[u8], assertion: &[u8], policy: SyntaxPolicy) -> Result<bool> {
        if self.operator == CollationOperator::Substring {
            let parsed = parse_substring_assertion(assertion)?;
            return self.value_matches_substring(value, &parsed, policy);
        }
        let ord = self.key(value)?.cmp(&self.key(assertion)?);
        Ok(match self.operator {
            CollationOperator::LessThan => ord == Ordering::Less,
            CollationOperator::LessThanOrEqual => ord != Ordering::Greater,
            CollationOperator::Equality => ord == Ordering::Equal,
            CollationOperator::GreaterThanOrEqual => ord != Ordering::Less,
            CollationOperator::GreaterThan => ord == Ordering::Greater,
            CollationOperator::Substring => unreachable!(),
        })
    }

    fn value_matches_substring(
        &self,
        value: &[u8],
        assertion: &SubstringAssertion,
        _policy: SyntaxPolicy,
    ) -> Result<bool> {
        let value = self.substring_key(value)?;
        let mut pos = 0usize;

        if let Some(initial) = &assertion.initial {
            let initial = self.substring_key(initial)?;
            if value.len() < initial.len() || value[..initial.len()] != initial[..] {
                return Ok(false);
            }
            pos = initial.len();
        }

        for fragment in &assertion.any {
            let fragment = self.substring_key(fragment)?;
            match find_window(&value[pos..], &fragment) {
                Some(offset) => pos += offset + fragment.len(),
                None => return Ok(false),
            }
        }

        if let Some(final_fragment) = &assertion.final_fragment {
            let final_fragment = self.substring_key(final_fragment)?;
            if value.len() < final_fragment.len() {
                return Ok(false);
            }
            let start = value.len() - final_fragment.len();
            if start < pos || value[start..] != final_fragment[..] {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn index_plan(&self, assertion: &[u8], _policy: SyntaxPolicy) -> Result<IndexPlan> {
        match self.operator {
            CollationOperator::Equality => Ok(IndexPlan::Exact(self.key(assertion)?)),
            CollationOperator::LessThan => Ok(IndexPlan::Range {
                lower: Vec::new(),
                upper: self.key(assertion)?,
                lower_inclusive: false,
                upper_inclusive: false,
            }),
            CollationOperator::LessThanOrEqual => Ok(IndexPlan::Range {
                lower: Vec::new(),
                upper: self.key(assertion)?,
                lower_inclusive: false,
                upper_inclusive: true,
            }),
            CollationOperator::GreaterThanOrEqual => Ok(IndexPlan::Range {
                lower: self.key(assertion)?,
                upper: Vec::new(),
                lower_inclusive: true,
                upper_inclusive: false,
            }),
            CollationOperator::GreaterThan => Ok(IndexPlan::Range {
                lower: self.key(assertion)?,
                upper: Vec::new(),
                lower_inclusive: false,
                upper_inclusive: false,
            }),
            CollationOperator::Substring => {
                let parsed = parse_substring_assertion(assertion)?;
                let mut plans = Vec::new();
                if let Some(initial) = &parsed.initial {
                    // The initial fragment bounds a scan of the ordered
                    // full-key index; when it spans a window it also
                    // contributes window lookups.
                    let key = self.substring_key(initial)?;
                    plans.push(prefix_range(&key));
                    if key.len() >= SUBSTRING_KEY_LEN {
                        fragment_plans(&key, &mut plans);
                    }
                }
                for fragment in &parsed.any {
                    fragment_plans(&self.substring_key(fragment)?, &mut plans);
                }
                if let Some(final_fragment) = &parsed.final_fragment {
                    fragment_plans(&self.substring_key(final_fragment)?, &mut plans);
                }
                match plans.len() {
                    0 => Ok(IndexPlan::MatchAll),
                    1 => Ok(plans.remove(0)),
                    _ => Ok(IndexPlan::Intersection(plans)),
                }
            }
        }
    }
}

/// Exclusive-upper prefix range over `key`: everything the key is a
/// prefix of.  The upper bound is the key with its last non-0xFF byte
/// incremented and everything after it dropped; a key of all 0xFF bytes
/// leaves the range unbounded above.
fn prefix_range(key: &[u8]) -> IndexPlan {
    let mut upper = key.to_vec();
    while let Some(&last) = upper.last() {
        if last == 0xFF {
            upper.pop();
        } else {
            let i = upper.len() - 1;
            upper[i] = last + 1;
            break;
        }
    }
    IndexPlan::Range {
        lower: key.to_vec(),
        upper,
        lower_inclusive: true,
        upper_inclusive: false,
    }
}

fn find_window(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    if haystack.len() < needle.len() {
        return None;
    }
    (0..=haystack.len() - needle.len()).find(|&i| &haystack[i..i + needle.len()] == needle)
}

// ---------------------------------------------------------------------------
// Substring assertion wire forms
// ---------------------------------------------------------------------------

/// Parse a raw `*`-delimited substring assertion.  `\XX` escapes a hex
/// byte, so `ab\2Acd` contains a literal asterisk.  A fragment before
/// the first `*` is the initial, one after the last is the final.
pub fn parse_substring_assertion(assertion: &[u8]) -> Result<SubstringAssertion> {
    let mut fragments: Vec<Vec<u8>> = vec![Vec::new()];
    let mut i = 0;
    while i < assertion.len() {
        match assertion[i] {
            b'*' => {
                fragments.push(Vec::new());
                i += 1;
            }
            b'\\' => {
                let hi = hex_digit(assertion.get(i + 1).copied())?;
                let lo = hex_digit(assertion.get(i + 2).copied())?;
                if let Some(f) = fragments.last_mut() {
                    f.push((hi << 4) | lo);
                }
                i += 3;
            }
            b => {
                if let Some(f) = fragments.last_mut() {
                    f.push(b);
                }
                i += 1;
            }
        }
    }

    if fragments.len() == 1 {
        return Err(syntax_error(
            "substring assertion contains no '*' wildcard",
        ));
    }

    let last = fragments.len() - 1;
    let mut out = SubstringAssertion::default();
    for (index, fragment) in fragments.into_iter().enumerate() {
        if fragment.is_empty() {
            continue;
        }
        if index == 0 {
            out.initial = Some(fragment);
        } else if index == last {
            out.final_fragment = Some(fragment);
        } else {
            out.any.push(fragment);
        }
    }
    Ok(out)
}

fn hex_digit(b: Option<u8>) -> Result<u8> {
    match b {
        Some(b @ b'0'..=b'9') => Ok(b - b'0'),
        Some(b @ b'a'..=b'f') => Ok(b - b'a' + 10),
        Some(b @ b'A'..=b'F') => Ok(b - b'A' + 10),
        _ => Err(syntax_error("invalid hex escape in substring assertion")),
    }
}

/// Encode a parsed substring assertion into its length-prefixed byte
/// form: initial length and bytes, then the any-fragment count followed
/// by each fragment length-prefixed, then the final length and bytes.
/// Absent fragments encode as length zero.  Fragments are capped at 255
/// bytes by the one-byte lengths.
pub fn encode_substring_assertion(assertion: &SubstringAssertion) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut push_fragment = |out: &mut Vec<u8>, fragment: Option<&Vec<u8>>| -> Result<()> {
        match fragment {
            Some(f) => {
                if f.len() > u8::MAX as usize {
                    return Err(syntax_error("substring assertion fragment exceeds 255 bytes"));
                }
                out.push(f.len() as u8);
                out.extend_from_slice(f);
            }
            None => out.push(0),
        }
        Ok(())
    };
    push_fragment(&mut out, assertion.initial.as_ref())?;
    if assertion.any.len() > u8::MAX as usize {
        return Err(syntax_error("substring assertion has too many fragments"));
    }
    out.push(assertion.any.len() as u8);
    for fragment in &assertion.any {
        push_fragment(&mut out, Some(fragment))?;
    }
    push_fragment(&mut out, assertion.final_fragment.as_ref())?;
    Ok(out)
}

/// Decode the length-prefixed byte form produced by
/// [`encode_substring_assertion`].
pub fn decode_substring_assertion(encoded: &[u8]) -> Result<SubstringAssertion> {
    let mut pos = 0usize;
    let mut take = |len: usize| -> Result<&[u8]> {
        if pos + len > encoded.len() {
            return Err(syntax_error("truncated encoded substring assertion"));
        }
        let slice = &encoded[pos..pos + len];
        pos += len;
        Ok(slice)
    };

    let mut out = SubstringAssertion::default();
    let init_len = take(1)?[0] as usize;
    if init_len > 0 {
        out.initial = Some(take(init_len)?.to_vec());
    }
    let any_count = take(1)?[0] as usize;
    for _ in 0..any_count {
        let len = take(1)?[0] as usize;
        out.any.push(take(len)?.to_vec());
    }
    let final_len = take(1)?[0] as usize;
    if final_len > 0 {
        out.final_fragment = Some(take(final_len)?.to_vec());
    }
    if pos != encoded.len() {
        return Err(syntax_error(
            "trailing bytes after encoded substring assertion",
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic stand-in collator: the key is the ASCII-lowercased
    /// text followed by the four terminator bytes.  Key order equals
    /// case-insensitive byte order, which is all the tests need.
    struct AsciiCollator;

    impl Collator for AsciiCollator {
        fn collation_key(&self, text: &str) -> Vec<u8> {
            let mut key = text.to_ascii_lowercase().into_bytes();
            key.extend_from_slice(&[0, 0, 0, 0]);
            key
        }
    }

    struct AsciiProvider;

    impl CollationProvider for AsciiProvider {
        fn collator_for(&self, language_tag: &str) -> Option<Arc<dyn Collator>> {
            if language_tag == "en" {
                Some(Arc::new(AsciiCollator))
            } else {
                None
            }
        }
    }

    const BASE_OID: &str = "1.3.6.1.4.1.42.2.27.9.4.34.1";

    fn mapping() -> CollationMapping {
        CollationMapping::parse(&format!("en:{}", BASE_OID)).unwrap()
    }

    fn rules() -> Vec<Arc<dyn MatchingRule>> {
        mapping().rules(&AsciiProvider).unwrap()
    }

    fn rule(suffix: &str) -> Arc<dyn MatchingRule> {
        let oid = format!("{}.{}", BASE_OID, suffix);
        rules()
            .into_iter()
            .find(|r| r.oid() == oid)
            .unwrap()
    }

    fn policy() -> SyntaxPolicy {
        SyntaxPolicy::Reject
    }

    // ── Group 1: mapping config ───────────────────────────────────

    #[test]
    fn parse_mapping_config() {
        let m = CollationMapping::parse("fr:2.16.840.1.113730.3.3.2.15.1").unwrap();
        assert_eq!(m.language_tag, "fr");
        assert_eq!(m.base_oid, "2.16.840.1.113730.3.3.2.15.1");
    }

    #[test]
    fn parse_mapping_config_errors() {
        assert!(CollationMapping::parse("en").is_err());
        assert!(CollationMapping::parse(":1.2.3").is_err());
        assert!(CollationMapping::parse("en:").is_err());
        assert!(CollationMapping::parse("en:1..2").is_err());
        assert!(CollationMapping::parse("en:abc").is_err());
    }

    #[test]
    fn unknown_locale_is_an_error() {
        let m = CollationMapping::parse("xx-YY:1.2.3").unwrap();
        assert!(m.rules(&AsciiProvider).is_err());
    }

    // ── Group 2: variant naming and registration ──────────────────

    #[test]
    fn six_variants_with_suffixed_oids_and_names() {
        let rules = rules();
        assert_eq!(rules.len(), 6);
        let lt = rule("1");
        assert_eq!(lt.names(), &["en.lt".to_string()]);
        assert_eq!(lt.kind(), MatchingRuleKind::Ordering);
        let eq = rule("3");
        assert!(eq.names().contains(&"en".to_string()));
        assert_eq!(eq.kind(), MatchingRuleKind::Equality);
        let sub = rule("6");
        assert_eq!(sub.names(), &["en.sub".to_string()]);
        assert_eq!(sub.kind(), MatchingRuleKind::Substring);
    }

    #[test]
    fn activate_and_finalize_lifecycle() {
        let mut registry = MatchingRuleRegistry::new();
        let m = mapping();
        m.activate(&AsciiProvider, &mut registry).unwrap();
        assert!(registry.get("en.lt").is_some());
        assert!(registry.get("en").is_some());
        assert!(registry.get(BASE_OID).is_some());
        m.finalize(&mut registry);
        assert!(registry.get("en.lt").is_none());
        assert!(registry.get(BASE_OID).is_none());
    }

    // ── Group 3: relational matching ──────────────────────────────

    #[test]
    fn relational_variants_match_by_key_order() {
        assert!(rule("1").values_match(b"Apple", b"banana", policy()).unwrap());
        assert!(!rule("1").values_match(b"banana", b"banana", policy()).unwrap());
        assert!(rule("2").values_match(b"banana", b"BANANA", policy()).unwrap());
        assert!(rule("3").values_match(b"Cherry", b"cherry", policy()).unwrap());
        assert!(rule("4").values_match(b"date", b"cherry", policy()).unwrap());
        assert!(rule("5").values_match(b"date", b"cherry", policy()).unwrap());
        assert!(!rule("5").values_match(b"cherry", b"cherry", policy()).unwrap());
    }

    // ── Group 4: substring assertion wire forms ───────────────────

    #[test]
    fn parse_star_delimited_assertion() {
        let a = parse_substring_assertion(b"abc*def*ghi").unwrap();
        assert_eq!(a.initial.as_deref(), Some(&b"abc"[..]));
        assert_eq!(a.any, vec![b"def".to_vec()]);
        assert_eq!(a.final_fragment.as_deref(), Some(&b"ghi"[..]));

        let a = parse_substring_assertion(b"*middle*").unwrap();
        assert_eq!(a.initial, None);
        assert_eq!(a.any, vec![b"middle".to_vec()]);
        assert_eq!(a.final_fragment, None);
    }

    #[test]
    fn parse_assertion_hex_escape() {
        // \2A is a literal asterisk, not a wildcard.
        let a = parse_substring_assertion(b"ab\\2Acd*x").unwrap();
        assert_eq!(a.initial.as_deref(), Some(&b"ab*cd"[..]));
        assert_eq!(a.final_fragment.as_deref(), Some(&b"x"[..]));
    }

    #[test]
    fn parse_assertion_errors() {
        assert!(parse_substring_assertion(b"nostar").is_err());
        assert!(parse_substring_assertion(b"ab\\2").is_err());
        assert!(parse_substring_assertion(b"ab\\zz*").is_err());
    }

    #[test]
    fn encoded_assertion_round_trip() {
        let a = parse_substring_assertion(b"init*mid1*mid2*fin").unwrap();
        let encoded = encode_substring_assertion(&a).unwrap();
        let decoded = decode_substring_assertion(&encoded).unwrap();
        assert_eq!(decoded.initial, a.initial);
        assert_eq!(decoded.any, a.any);
        assert_eq!(decoded.final_fragment, a.final_fragment);
    }

    #[test]
    fn decode_assertion_truncated() {
        assert!(decode_substring_assertion(&[5, b'a']).is_err());
        assert!(decode_substring_assertion(&[0, 0, 0, b'x']).is_err());
    }

    // ── Group 5: substring matching ───────────────────────────────

    #[test]
    fn substring_variant_matches_fragments() {
        let sub = rule("6");
        assert!(sub
            .values_match(b"The Quick Brown Fox", b"the*brown*", policy())
            .unwrap());
        assert!(sub
            .values_match(b"The Quick Brown Fox", b"*quick*fox", policy())
            .unwrap());
        assert!(!sub
            .values_match(b"The Quick Brown Fox", b"fox*", policy())
            .unwrap());
    }

    // ── Group 6: index plans ──────────────────────────────────────

    #[test]
    fn ordering_plans_are_half_bounded_ranges() {
        let key = AsciiCollator.collation_key("banana");
        assert_eq!(
            rule("1").index_plan(b"banana", policy()).unwrap(),
            IndexPlan::Range {
                lower: Vec::new(),
                upper: key.clone(),
                lower_inclusive: false,
                upper_inclusive: false,
            }
        );
        assert_eq!(
            rule("4").index_plan(b"banana", policy()).unwrap(),
            IndexPlan::Range {
                lower: key,
                upper: Vec::new(),
                lower_inclusive: true,
                upper_inclusive: false,
            }
        );
    }

    #[test]
    fn equality_plan_is_exact() {
        assert_eq!(
            rule("3").index_plan(b"x", policy()).unwrap(),
            IndexPlan::Exact(AsciiCollator.collation_key("x"))
        );
    }

    #[test]
    fn short_substring_plan_is_single_prefix_range() {
        // "abc" trims to a 3-byte key, below the window width, so the
        // plan is one prefix range with a carry-incremented upper bound.
        let plan = rule("6").index_plan(b"*abc*", policy()).unwrap();
        assert_eq!(
            plan,
            IndexPlan::Range {
                lower: b"abc".to_vec(),
                upper: b"abd".to_vec(),
                lower_inclusive: true,
                upper_inclusive: false,
            }
        );
    }

    #[test]
    fn long_substring_plan_decomposes_into_windows() {
        let plan = rule("6").index_plan(b"*abcdefgh*", policy()).unwrap();
        let IndexPlan::Intersection(plans) = plan else {
            panic!("expected an intersection plan");
        };
        assert_eq!(
            plans,
            vec![
                IndexPlan::Exact(b"abcdef".to_vec()),
                IndexPlan::Exact(b"bcdefg".to_vec()),
                IndexPlan::Exact(b"cdefgh".to_vec()),
            ]
        );
    }

    #[test]
    fn initial_fragment_adds_ordered_range() {
        let plan = rule("6").index_plan(b"abc*xyz", policy()).unwrap();
        let IndexPlan::Intersection(plans) = plan else {
            panic!("expected an intersection plan");
        };
        // Ordered-index scan over the initial prefix, then the final
        // fragment's own prefix range.
        assert_eq!(
            plans,
            vec![
                IndexPlan::Range {
                    lower: b"abc".to_vec(),
                    upper: b"abd".to_vec(),
                    lower_inclusive: true,
                    upper_inclusive: false,
                },
                IndexPlan::Range {
                    lower: b"xyz".to_vec(),
                    upper: b"xy{".to_vec(),
                    lower_inclusive: true,
                    upper_inclusive: false,
                },
            ]
        );
    }

    #[test]
    fn carry_increment_skips_trailing_max_bytes() {
        let plan = prefix_range(&[0x61, 0xFF, 0xFF]);
        assert_eq!(
            plan,
            IndexPlan::Range {
                lower: vec![0x61, 0xFF, 0xFF],
                upper: vec![0x62],
                lower_inclusive: true,
                upper_inclusive: false,
            }
        );
        // All 0xFF: unbounded above.
        let plan = prefix_range(&[0xFF, 0xFF]);
        assert_eq!(
            plan,
            IndexPlan::Range {
                lower: vec![0xFF, 0xFF],
                upper: Vec::new(),
                lower_inclusive: true,
                upper_inclusive: false,
            }
        );
    }
}
