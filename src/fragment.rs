//! Emitter-agnostic per-concern fragments.
//!
//! Every type answers the same questions for each concern: how a value is
//! compared, hashed, written to JSON and to a graph. The answers share one
//! recursive shape, [`Fragment`], parameterised by a concern-specific leaf
//! operation. Object types answer with an [`ObjectFragment`] listing their own
//! properties and naming the parent whose fragment runs first.
use serde::Serialize;

use crate::model::PrimitiveKind;
use crate::rdf::{Iri, NodeKind};
use crate::value::Value;

// ————————————————————————————————————————————————————————————————————————————
// LEAF OPERATIONS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EqualsOp {
    /// `===` on primitives and discriminator tags.
    Strict,
    /// Term equality on identifiers and literals.
    Term,
    /// Deep structural JSON equality.
    Native,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum HashOp {
    Primitive(PrimitiveKind),
    Literal,
    Identifier,
    Native,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum JsonOp {
    Primitive(PrimitiveKind),
    /// `{"@value", "@type", "@language"}` object.
    Literal,
    /// `"_:label"` or the IRI string.
    Identifier,
    Native,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum RdfOp {
    Primitive { kind: PrimitiveKind, datatype: Iri },
    Literal,
    Identifier { node_kinds: Vec<NodeKind> },
    /// JSON text in an `rdf:JSON` literal.
    Native,
}

// ————————————————————————————————————————————————————————————————————————————
// FRAGMENTS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "camelCase")]
pub enum Fragment<Op> {
    Leaf { op: Op },
    /// Missing values take `value`.
    Default { item: Box<Fragment<Op>>, value: Value },
    /// Delegates to the named object type's own fragment.
    Object { type_name: String },
    Option { item: Box<Fragment<Op>> },
    /// Ordered collection (RDF list in the graph).
    List { item: Box<Fragment<Op>> },
    /// Repeated values (one triple each in the graph).
    Set { item: Box<Fragment<Op>>, min_count: u32 },
    Union(UnionFragment<Op>),
}

impl<Op> Fragment<Op> {
    pub fn leaf(op: Op) -> Self { Self::Leaf { op } }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnionFragment<Op> {
    pub discriminator: UnionDiscriminator,
    pub members: Vec<UnionArm<Op>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum UnionDiscriminator {
    /// Members expose the same discriminator field; values pass through.
    Shared { property_name: String },
    /// Values are wrapped in a `{tag, value}` envelope.
    Synthetic,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnionArm<Op> {
    pub member_type_name: String,
    /// Discriminator values selecting this arm; the single tag when synthetic.
    pub values: Vec<String>,
    pub fragment: Fragment<Op>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectFragment<Op> {
    pub type_name: String,
    /// Runs before this fragment's own properties.
    pub parent: Option<String>,
    pub properties: Vec<PropertyFragment<Op>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyFragment<Op> {
    pub name: String,
    pub role: PropertyRole,
    pub fragment: Fragment<Op>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "role", rename_all = "camelCase")]
pub enum PropertyRole {
    Identifier,
    Discriminator { values: Vec<String> },
    Shacl { path: Iri },
}

// ————————————————————————————————————————————————————————————————————————————
// CONVERSIONS
// ————————————————————————————————————————————————————————————————————————————

/// One legal alternative representation accepted when constructing a value.
/// A conversion chain is evaluated top to bottom; the first match wins.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversion {
    pub source_type_name: String,
    pub source_check: SourceCheck,
    pub conversion: ConversionExpr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "check", rename_all = "camelCase")]
pub enum SourceCheck {
    Absent,
    Boolean,
    Number,
    String,
    DateTime,
    Literal,
    Identifier,
    Native,
    Array,
    /// Instance of the named object type or one of its descendants.
    Object { type_name: String },
    Tagged,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "expr", rename_all = "camelCase")]
pub enum ConversionExpr {
    Identity,
    Default { value: Value },
    /// String to named node.
    Iri,
    /// Primitive to an RDF literal of `datatype`.
    Literal { datatype: Iri },
    EmptyList,
    /// Rejects numbers with a fractional part (integer datatypes).
    WholeNumber,
    /// Truncates a date-time to midnight UTC of its own calendar date
    /// (`xsd:date`).
    Date,
}

impl Conversion {
    pub fn new(source_type_name: impl Into<String>, source_check: SourceCheck, conversion: ConversionExpr) -> Self {
        Self { source_type_name: source_type_name.into(), source_check, conversion }
    }

    pub fn identity(source_type_name: impl Into<String>, source_check: SourceCheck) -> Self {
        Self::new(source_type_name, source_check, ConversionExpr::Identity)
    }
}
