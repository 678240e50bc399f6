//! Schema element data model.
//!
//! Every element is immutable once its decoder has constructed it.
//! Cross-references between elements (superior type, syntax, matching
//! rules) are held as normalized lowercase OIDs and resolved through the
//! schema registry on demand, never as owning pointers.

use std::fmt;

// ---------------------------------------------------------------------------
// NameSet -- case-insensitive names, insertion order preserved
// ---------------------------------------------------------------------------

/// The names of a schema element: lowercase key to display form, first
/// inserted name is the primary one.
#[derive(Debug, Clone, Default)]
pub struct NameSet {
    entries: Vec<(String, String)>,
}

impl NameSet {
    pub fn new() -> Self {
        NameSet {
            entries: Vec::new(),
        }
    }

    pub fn add(&mut self, display: &str) {
        let lower = display.to_ascii_lowercase();
        if !self.entries.iter().any(|(l, _)| *l == lower) {
            self.entries.push((lower, display.to_string()));
        }
    }

    pub fn primary(&self) -> Option<&str> {
        self.entries.first().map(|(_, d)| d.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        let lower = name.to_ascii_lowercase();
        self.entries.iter().any(|(l, _)| *l == lower)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Display forms in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, d)| d.as_str())
    }

    /// Lowercase keys in insertion order.
    pub fn iter_lower(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(l, _)| l.as_str())
    }
}

// ---------------------------------------------------------------------------
// ExtraProperties -- opaque X-* extension clauses
// ---------------------------------------------------------------------------

/// Vendor extension clauses (`X-*`), preserved opaquely in the order they
/// appeared.  Property names compare case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct ExtraProperties {
    entries: Vec<(String, Vec<String>)>,
}

impl ExtraProperties {
    pub fn new() -> Self {
        ExtraProperties {
            entries: Vec::new(),
        }
    }

    pub fn put(&mut self, name: &str, values: Vec<String>) {
        match self
            .entries
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            Some((_, existing)) => existing.extend(values),
            None => self.entries.push((name.to_string(), values)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_slice()))
    }
}

// ---------------------------------------------------------------------------
// AttributeUsage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttributeUsage {
    #[default]
    UserApplications,
    DirectoryOperation,
    DistributedOperation,
    DsaOperation,
}

impl AttributeUsage {
    pub fn parse(s: &str) -> Option<AttributeUsage> {
        match s {
            "userapplications" => Some(AttributeUsage::UserApplications),
            "directoryoperation" => Some(AttributeUsage::DirectoryOperation),
            "distributedoperation" => Some(AttributeUsage::DistributedOperation),
            "dsaoperation" => Some(AttributeUsage::DsaOperation),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeUsage::UserApplications => "userApplications",
            AttributeUsage::DirectoryOperation => "directoryOperation",
            AttributeUsage::DistributedOperation => "distributedOperation",
            AttributeUsage::DsaOperation => "dSAOperation",
        }
    }
}

impl fmt::Display for AttributeUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// AttributeType
// ---------------------------------------------------------------------------

/// A decoded attribute type definition.
#[derive(Debug, Clone)]
pub struct AttributeType {
    pub oid: String,
    pub names: NameSet,
    pub description: Option<String>,
    pub obsolete: bool,
    /// Superior type, by normalized OID.
    pub superior: Option<String>,
    /// Assigned syntax, by normalized OID.
    pub syntax: String,
    pub equality_rule: Option<String>,
    pub ordering_rule: Option<String>,
    pub substring_rule: Option<String>,
    pub approximate_rule: Option<String>,
    pub usage: AttributeUsage,
    pub collective: bool,
    pub no_user_modification: bool,
    pub single_value: bool,
    pub extra: ExtraProperties,
}

impl AttributeType {
    pub fn name(&self) -> &str {
        self.names.primary().unwrap_or(&self.oid)
    }

    /// Render back to RFC 4512 definition form.
    pub fn definition(&self) -> String {
        let mut s = format!("( {}", self.oid);
        append_names(&mut s, &self.names);
        if let Some(desc) = &self.description {
            s.push_str(&format!(" DESC '{}'", desc));
        }
        if self.obsolete {
            s.push_str(" OBSOLETE");
        }
        if let Some(sup) = &self.superior {
            s.push_str(&format!(" SUP {}", sup));
        }
        if let Some(r) = &self.equality_rule {
            s.push_str(&format!(" EQUALITY {}", r));
        }
        if let Some(r) = &self.ordering_rule {
            s.push_str(&format!(" ORDERING {}", r));
        }
        if let Some(r) = &self.substring_rule {
            s.push_str(&format!(" SUBSTR {}", r));
        }
        s.push_str(&format!(" SYNTAX {}", self.syntax));
        if self.single_value {
            s.push_str(" SINGLE-VALUE");
        }
        if self.collective {
            s.push_str(" COLLECTIVE");
        }
        if self.no_user_modification {
            s.push_str(" NO-USER-MODIFICATION");
        }
        if self.usage != AttributeUsage::UserApplications {
            s.push_str(&format!(" USAGE {}", self.usage));
        }
        append_extras(&mut s, &self.extra);
        s.push_str(" )");
        s
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ---------------------------------------------------------------------------
// ObjectClass
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectClassKind {
    Abstract,
    Structural,
    Auxiliary,
}

impl ObjectClassKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectClassKind::Abstract => "ABSTRACT",
            ObjectClassKind::Structural => "STRUCTURAL",
            ObjectClassKind::Auxiliary => "AUXILIARY",
        }
    }
}

/// A decoded object class definition.
#[derive(Debug, Clone)]
pub struct ObjectClass {
    pub oid: String,
    pub names: NameSet,
    pub description: Option<String>,
    pub obsolete: bool,
    /// Superior class, by normalized OID.  `None` for top (2.5.6.0) and
    /// for classes whose SUP clause names themselves.
    pub superior: Option<String>,
    /// Required attribute types, by normalized OID.
    pub required: Vec<String>,
    /// Optional attribute types, by normalized OID.
    pub optional: Vec<String>,
    pub kind: ObjectClassKind,
    pub extra: ExtraProperties,
}

impl ObjectClass {
    pub fn name(&self) -> &str {
        self.names.primary().unwrap_or(&self.oid)
    }

    /// Render back to RFC 4512 definition form.
    pub fn definition(&self) -> String {
        let mut s = format!("( {}", self.oid);
        append_names(&mut s, &self.names);
        if let Some(desc) = &self.description {
            s.push_str(&format!(" DESC '{}'", desc));
        }
        if self.obsolete {
            s.push_str(" OBSOLETE");
        }
        if let Some(sup) = &self.superior {
            s.push_str(&format!(" SUP {}", sup));
        }
        s.push(' ');
        s.push_str(self.kind.as_str());
        append_oid_list(&mut s, "MUST", &self.required);
        append_oid_list(&mut s, "MAY", &self.optional);
        append_extras(&mut s, &self.extra);
        s.push_str(" )");
        s
    }
}

impl fmt::Display for ObjectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ---------------------------------------------------------------------------
// DitStructureRule
// ---------------------------------------------------------------------------

/// A decoded DIT structure rule.  Keyed by integer rule id, not OID.
#[derive(Debug, Clone)]
pub struct DitStructureRule {
    pub rule_id: u32,
    pub names: NameSet,
    pub description: Option<String>,
    pub obsolete: bool,
    /// The governing name form, by normalized OID.  Only absent when the
    /// decoder ran in unknown-elements-tolerated (acceptability) mode.
    pub name_form: Option<String>,
    /// Superior rules, by rule id.
    pub superior_rules: Vec<u32>,
    pub extra: ExtraProperties,
}

impl DitStructureRule {
    pub fn name(&self) -> String {
        match self.names.primary() {
            Some(n) => n.to_string(),
            None => self.rule_id.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// NameForm
// ---------------------------------------------------------------------------

/// A name form, as far as this layer needs one: an OID and names that a
/// DIT structure rule's FORM clause can resolve against.
#[derive(Debug, Clone)]
pub struct NameForm {
    pub oid: String,
    pub names: NameSet,
}

impl NameForm {
    pub fn name(&self) -> &str {
        self.names.primary().unwrap_or(&self.oid)
    }
}

// ---------------------------------------------------------------------------
// MatchingRuleDef -- decoded matching rule description
// ---------------------------------------------------------------------------

/// A decoded matching rule description.  Used for acceptability checking
/// of matchingRule attribute values; live rule behavior comes from the
/// registered [`crate::mrule::MatchingRule`] implementations instead.
#[derive(Debug, Clone)]
pub struct MatchingRuleDef {
    pub oid: String,
    pub names: NameSet,
    pub description: Option<String>,
    pub obsolete: bool,
    /// The governing syntax, by normalized OID.
    pub syntax: String,
    pub extra: ExtraProperties,
}

// ---------------------------------------------------------------------------
// Definition rendering helpers
// ---------------------------------------------------------------------------

fn append_names(s: &mut String, names: &NameSet) {
    match names.len() {
        0 => {}
        1 => {
            if let Some(n) = names.primary() {
                s.push_str(&format!(" NAME '{}'", n));
            }
        }
        _ => {
            s.push_str(" NAME (");
            for n in names.iter() {
                s.push_str(&format!(" '{}'", n));
            }
            s.push_str(" )");
        }
    }
}

fn append_oid_list(s: &mut String, keyword: &str, oids: &[String]) {
    match oids.len() {
        0 => {}
        1 => s.push_str(&format!(" {} {}", keyword, oids[0])),
        _ => {
            s.push_str(&format!(" {} ( {} )", keyword, oids.join(" $ ")));
        }
    }
}

fn append_extras(s: &mut String, extra: &ExtraProperties) {
    for (name, values) in extra.iter() {
        match values.len() {
            0 => {}
            1 => s.push_str(&format!(" {} '{}'", name, values[0])),
            _ => {
                s.push_str(&format!(" {} (", name));
                for v in values {
                    s.push_str(&format!(" '{}'", v));
                }
                s.push_str(" )");
            }
        }
    }
}
