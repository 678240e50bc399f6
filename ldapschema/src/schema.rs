//! Schema registry and policy types.
//!
//! The registry is the lookup collaborator every decoder resolves
//! cross-references against: attribute types, object classes, name forms,
//! DIT structure rules, syntaxes, and live matching rules, all keyed
//! case-insensitively by OID or any name.  It is built single-threaded
//! during configuration application and treated as an immutable snapshot
//! thereafter; concurrent mutation is the caller's problem to serialize.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::data::{AttributeType, DitStructureRule, NameForm, ObjectClass};
use crate::ldapsyntax::LdapSyntax;
use crate::mrule::{MatchingRule, MatchingRuleKind};

// ---------------------------------------------------------------------------
// CaseFold -- case-insensitive string key for HashMap
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub(crate) struct CaseFold(pub String);

impl CaseFold {
    pub fn new(s: &str) -> Self {
        CaseFold(s.to_string())
    }
}

impl PartialEq for CaseFold {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for CaseFold {}

impl Hash for CaseFold {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.0.bytes() {
            state.write_u8(b.to_ascii_lowercase());
        }
    }
}

// ---------------------------------------------------------------------------
// SyntaxPolicy -- three-level enforcement for value syntaxes
// ---------------------------------------------------------------------------

/// How strictly value syntaxes enforce their grammar.  `Warn` logs once
/// per offending value and then repairs; `Accept` repairs silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyntaxPolicy {
    Reject,
    Warn,
    #[default]
    Accept,
}

// ---------------------------------------------------------------------------
// MatchingRuleRegistry
// ---------------------------------------------------------------------------

/// Live matching rules, registered under OID and every name.
///
/// Dynamically configured families (collation, enum-ordering) register
/// here on configuration apply and deregister on change or removal; the
/// element that spawned a rule owns its lifecycle.
#[derive(Default)]
pub struct MatchingRuleRegistry {
    rules: HashMap<CaseFold, Arc<dyn MatchingRule>>,
}

impl MatchingRuleRegistry {
    pub fn new() -> Self {
        MatchingRuleRegistry {
            rules: HashMap::new(),
        }
    }

    pub fn register(&mut self, rule: Arc<dyn MatchingRule>) {
        self.rules
            .insert(CaseFold::new(rule.oid()), Arc::clone(&rule));
        for name in rule.names() {
            self.rules.insert(CaseFold::new(name), Arc::clone(&rule));
        }
    }

    /// Remove a rule and all of its name aliases, whichever key the
    /// caller supplied.  Returns the rule if it was registered.
    pub fn deregister(&mut self, name_or_oid: &str) -> Option<Arc<dyn MatchingRule>> {
        let rule = self.rules.remove(&CaseFold::new(name_or_oid))?;
        self.rules.remove(&CaseFold::new(rule.oid()));
        for name in rule.names() {
            self.rules.remove(&CaseFold::new(name));
        }
        Some(rule)
    }

    pub fn get(&self, name_or_oid: &str) -> Option<Arc<dyn MatchingRule>> {
        self.rules.get(&CaseFold::new(name_or_oid)).cloned()
    }

    pub fn get_of_kind(
        &self,
        name_or_oid: &str,
        kind: MatchingRuleKind,
    ) -> Option<Arc<dyn MatchingRule>> {
        self.get(name_or_oid).filter(|r| r.kind() == kind)
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

pub struct Schema {
    attribute_types: HashMap<CaseFold, Arc<AttributeType>>,
    object_classes: HashMap<CaseFold, Arc<ObjectClass>>,
    name_forms: HashMap<CaseFold, Arc<NameForm>>,
    structure_rules: HashMap<u32, Arc<DitStructureRule>>,
    structure_rule_names: HashMap<CaseFold, u32>,
    syntaxes: HashMap<CaseFold, Arc<LdapSyntax>>,
    matching_rules: MatchingRuleRegistry,
    allow_name_exceptions: bool,
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}

impl Schema {
    pub fn new() -> Self {
        Schema {
            attribute_types: HashMap::new(),
            object_classes: HashMap::new(),
            name_forms: HashMap::new(),
            structure_rules: HashMap::new(),
            structure_rule_names: HashMap::new(),
            syntaxes: HashMap::new(),
            matching_rules: MatchingRuleRegistry::new(),
            allow_name_exceptions: false,
        }
    }

    /// A schema preloaded with the matching rules and syntaxes this crate
    /// implements, under their standard OIDs and names, so that decoded
    /// definitions can resolve EQUALITY/ORDERING/SUBSTR/SYNTAX clauses
    /// the way they would against a live server's bootstrap schema.
    pub fn builtin() -> Self {
        let mut schema = Schema::new();
        for rule in crate::mrule::builtin_rules() {
            schema.matching_rules.register(rule);
        }
        for syntax in crate::ldapsyntax::builtin_syntaxes() {
            schema.register_syntax(syntax);
        }
        schema
    }

    /// Permit underscores in attribute descriptors (a compatibility
    /// concession some deployments need).
    pub fn set_allow_name_exceptions(&mut self, allow: bool) {
        self.allow_name_exceptions = allow;
    }

    pub fn allow_name_exceptions(&self) -> bool {
        self.allow_name_exceptions
    }

    // -- registration -------------------------------------------------------

    pub fn register_attribute_type(&mut self, at: AttributeType) -> Arc<AttributeType> {
        let at = Arc::new(at);
        self.attribute_types
            .insert(CaseFold::new(&at.oid), Arc::clone(&at));
        for name in at.names.iter_lower() {
            self.attribute_types
                .insert(CaseFold::new(name), Arc::clone(&at));
        }
        at
    }

    pub fn register_object_class(&mut self, oc: ObjectClass) -> Arc<ObjectClass> {
        let oc = Arc::new(oc);
        self.object_classes
            .insert(CaseFold::new(&oc.oid), Arc::clone(&oc));
        for name in oc.names.iter_lower() {
            self.object_classes
                .insert(CaseFold::new(name), Arc::clone(&oc));
        }
        oc
    }

    pub fn register_name_form(&mut self, nf: NameForm) -> Arc<NameForm> {
        let nf = Arc::new(nf);
        self.name_forms
            .insert(CaseFold::new(&nf.oid), Arc::clone(&nf));
        for name in nf.names.iter_lower() {
            self.name_forms.insert(CaseFold::new(name), Arc::clone(&nf));
        }
        nf
    }

    pub fn register_structure_rule(&mut self, rule: DitStructureRule) -> Arc<DitStructureRule> {
        let rule = Arc::new(rule);
        self.structure_rules.insert(rule.rule_id, Arc::clone(&rule));
        for name in rule.names.iter_lower() {
            self.structure_rule_names
                .insert(CaseFold::new(name), rule.rule_id);
        }
        rule
    }

    pub fn register_syntax(&mut self, syntax: LdapSyntax) -> Arc<LdapSyntax> {
        let syntax = Arc::new(syntax);
        self.syntaxes
            .insert(CaseFold::new(&syntax.oid), Arc::clone(&syntax));
        syntax
    }

    // -- lookups ------------------------------------------------------------

    pub fn get_attribute_type(&self, name_or_oid: &str) -> Option<Arc<AttributeType>> {
        self.attribute_types.get(&CaseFold::new(name_or_oid)).cloned()
    }

    pub fn get_object_class(&self, name_or_oid: &str) -> Option<Arc<ObjectClass>> {
        self.object_classes.get(&CaseFold::new(name_or_oid)).cloned()
    }

    pub fn get_name_form(&self, name_or_oid: &str) -> Option<Arc<NameForm>> {
        self.name_forms.get(&CaseFold::new(name_or_oid)).cloned()
    }

    pub fn get_structure_rule(&self, rule_id: u32) -> Option<Arc<DitStructureRule>> {
        self.structure_rules.get(&rule_id).cloned()
    }

    pub fn get_structure_rule_by_name(&self, name: &str) -> Option<Arc<DitStructureRule>> {
        let id = self.structure_rule_names.get(&CaseFold::new(name))?;
        self.structure_rules.get(id).cloned()
    }

    pub fn get_syntax(&self, oid: &str) -> Option<Arc<LdapSyntax>> {
        self.syntaxes.get(&CaseFold::new(oid)).cloned()
    }

    pub fn get_equality_matching_rule(&self, name_or_oid: &str) -> Option<Arc<dyn MatchingRule>> {
        self.matching_rules
            .get_of_kind(name_or_oid, MatchingRuleKind::Equality)
    }

    pub fn get_ordering_matching_rule(&self, name_or_oid: &str) -> Option<Arc<dyn MatchingRule>> {
        self.matching_rules
            .get_of_kind(name_or_oid, MatchingRuleKind::Ordering)
    }

    pub fn get_substring_matching_rule(&self, name_or_oid: &str) -> Option<Arc<dyn MatchingRule>> {
        self.matching_rules
            .get_of_kind(name_or_oid, MatchingRuleKind::Substring)
    }

    pub fn get_approximate_matching_rule(&self, name_or_oid: &str) -> Option<Arc<dyn MatchingRule>> {
        self.matching_rules
            .get_of_kind(name_or_oid, MatchingRuleKind::Approximate)
    }

    pub fn matching_rules(&self) -> &MatchingRuleRegistry {
        &self.matching_rules
    }

    pub fn matching_rules_mut(&mut self) -> &mut MatchingRuleRegistry {
        &mut self.matching_rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::NameSet;

    fn attr(oid: &str, name: &str) -> AttributeType {
        let mut names = NameSet::new();
        names.add(name);
        AttributeType {
            oid: oid.to_string(),
            names,
            description: None,
            obsolete: false,
            superior: None,
            syntax: "1.3.6.1.4.1.1466.115.121.1.15".to_string(),
            equality_rule: None,
            ordering_rule: None,
            substring_rule: None,
            approximate_rule: None,
            usage: Default::default(),
            collective: false,
            no_user_modification: false,
            single_value: false,
            extra: Default::default(),
        }
    }

    // ── Group 1: case-insensitive lookup ──────────────────────────

    #[test]
    fn attribute_type_by_oid_and_name() {
        let mut schema = Schema::new();
        schema.register_attribute_type(attr("2.5.4.3", "cn"));
        assert!(schema.get_attribute_type("2.5.4.3").is_some());
        assert!(schema.get_attribute_type("cn").is_some());
        assert!(schema.get_attribute_type("CN").is_some());
        assert!(schema.get_attribute_type("sn").is_none());
    }

    // ── Group 2: matching rule registry ───────────────────────────

    #[test]
    fn builtin_rules_resolve_by_kind() {
        let schema = Schema::builtin();
        assert!(schema.get_equality_matching_rule("integerMatch").is_some());
        assert!(schema
            .get_ordering_matching_rule("integerOrderingMatch")
            .is_some());
        // Kind filter: an ordering rule is not an equality rule.
        assert!(schema
            .get_equality_matching_rule("integerOrderingMatch")
            .is_none());
    }

    #[test]
    fn deregister_removes_aliases() {
        let mut reg = MatchingRuleRegistry::new();
        for rule in crate::mrule::builtin_rules() {
            reg.register(rule);
        }
        assert!(reg.get("2.5.13.14").is_some());
        // Deregistering by alias removes the OID entry too.
        reg.deregister("integerMatch");
        assert!(reg.get("2.5.13.14").is_none());
        assert!(reg.get("integerMatch").is_none());
        // Other rules are untouched.
        assert!(reg.get("integerOrderingMatch").is_some());
    }

    // ── Group 3: structure rules by id and name ───────────────────

    #[test]
    fn structure_rule_lookup() {
        let mut schema = Schema::new();
        let mut names = NameSet::new();
        names.add("domainStructureRule");
        schema.register_structure_rule(DitStructureRule {
            rule_id: 13,
            names,
            description: None,
            obsolete: false,
            name_form: Some("1.2.3.4".to_string()),
            superior_rules: vec![],
            extra: Default::default(),
        });
        assert!(schema.get_structure_rule(13).is_some());
        assert!(schema
            .get_structure_rule_by_name("domainstructurerule")
            .is_some());
        assert!(schema.get_structure_rule(14).is_none());
    }
}
