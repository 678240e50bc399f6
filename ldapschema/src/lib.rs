//! LDAP schema element decoding and value matching.
//!
//! Decoders for the RFC 4512 definition syntaxes (attribute types,
//! object classes, DIT structure rules, matching rules, LDAP syntaxes),
//! the value syntaxes they govern (bit string, integer, generalized
//! time, directory string, telephone number, guide), and the matching
//! rule machinery that normalizes, compares, and plans index lookups
//! for attribute values.
//!
//! Decoders resolve cross-references against a [`Schema`] snapshot and
//! answer in two registers: the strict `decode_*` entry points propagate
//! errors, the `*_is_acceptable` entry points fold them into a boolean
//! plus a diagnostic for value-acceptance checks.

pub mod attrtype;
pub mod collation;
pub mod data;
pub mod ditrule;
pub mod error;
pub mod gentime;
pub mod ldapsyntax;
pub mod mrule;
pub mod objectclass;
pub mod schema;
pub mod syntaxes;
pub mod token;

pub use attrtype::decode_attribute_type;
pub use data::{
    AttributeType, AttributeUsage, DitStructureRule, MatchingRuleDef, NameForm, ObjectClass,
    ObjectClassKind,
};
pub use ditrule::decode_dit_structure_rule;
pub use error::{Result, ResultCode, SchemaError};
pub use ldapsyntax::{decode_ldap_syntax, LdapSyntax};
pub use mrule::{
    create_index_query, decode_matching_rule, IndexPlan, IndexQueryFactory, MatchingRule,
    MatchingRuleKind, SubstringAssertion,
};
pub use objectclass::decode_object_class;
pub use schema::{MatchingRuleRegistry, Schema, SyntaxPolicy};
