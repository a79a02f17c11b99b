//! Leaf types: identifiers, literals and opaque native values.
use std::collections::BTreeSet;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::ast::{AstIdentifierType, AstLiteral, AstLiteralType};
use crate::fragment::{
    Conversion, ConversionExpr, EqualsOp, Fragment, HashOp, JsonOp, RdfOp, SourceCheck,
};
use crate::rdf::{Identifier, Iri, Literal, NodeKind, rdf, xsd};
use crate::value::Value;

// ————————————————————————————————————————————————————————————————————————————
// PRIMITIVES
// ————————————————————————————————————————————————————————————————————————————

static DECIMAL_LEXICAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?$").expect("decimal lexical pattern")
});
static INTEGER_LEXICAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?\d+$").expect("integer lexical pattern"));

const INTEGER_DATATYPES: [&str; 13] = [
    xsd::BYTE,
    xsd::INT,
    xsd::INTEGER,
    xsd::LONG,
    xsd::NEGATIVE_INTEGER,
    xsd::NON_NEGATIVE_INTEGER,
    xsd::NON_POSITIVE_INTEGER,
    xsd::POSITIVE_INTEGER,
    xsd::SHORT,
    xsd::UNSIGNED_BYTE,
    xsd::UNSIGNED_INT,
    xsd::UNSIGNED_LONG,
    xsd::UNSIGNED_SHORT,
];

/// True if `lexical` is a valid numeric lexical form for `datatype`.
fn numeric_lexical(lexical: &str, datatype: &Iri) -> bool {
    let pattern = if INTEGER_DATATYPES.contains(&datatype.as_str()) {
        &*INTEGER_LEXICAL
    } else {
        &*DECIMAL_LEXICAL
    };
    pattern.is_match(lexical)
}

/// Literal kinds with a native primitive representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PrimitiveKind {
    Boolean,
    DateTime,
    Number,
    String,
}

impl PrimitiveKind {
    /// Kind for a recognized XSD datatype.
    pub fn for_datatype(datatype: &Iri) -> Option<Self> {
        let kind = match datatype.as_str() {
            xsd::BOOLEAN => Self::Boolean,
            xsd::DATE | xsd::DATE_TIME => Self::DateTime,
            xsd::BYTE
            | xsd::DECIMAL
            | xsd::DOUBLE
            | xsd::FLOAT
            | xsd::INT
            | xsd::INTEGER
            | xsd::LONG
            | xsd::NEGATIVE_INTEGER
            | xsd::NON_NEGATIVE_INTEGER
            | xsd::NON_POSITIVE_INTEGER
            | xsd::POSITIVE_INTEGER
            | xsd::SHORT
            | xsd::UNSIGNED_BYTE
            | xsd::UNSIGNED_INT
            | xsd::UNSIGNED_LONG
            | xsd::UNSIGNED_SHORT => Self::Number,
            xsd::ANY_URI | xsd::NORMALIZED_STRING | xsd::STRING | xsd::TOKEN => Self::String,
            _ => return None,
        };
        Some(kind)
    }

    pub fn type_name(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::DateTime => "Date",
            Self::Number => "number",
            Self::String => "string",
        }
    }

    pub fn source_check(self) -> SourceCheck {
        match self {
            Self::Boolean => SourceCheck::Boolean,
            Self::DateTime => SourceCheck::DateTime,
            Self::Number => SourceCheck::Number,
            Self::String => SourceCheck::String,
        }
    }

    /// Parse a lexical form into a primitive value of this kind.
    pub fn parse(self, lexical: &str, datatype: &Iri) -> Option<Value> {
        match self {
            Self::Boolean => match lexical {
                "true" | "1" => Some(Value::Boolean(true)),
                "false" | "0" => Some(Value::Boolean(false)),
                _ => None,
            },
            Self::DateTime if datatype.as_str() == xsd::DATE => {
                let date = NaiveDate::parse_from_str(lexical, "%Y-%m-%d").ok()?;
                Some(Value::DateTime(midnight_utc(date)))
            }
            Self::DateTime => DateTime::parse_from_rfc3339(lexical).ok().map(Value::DateTime),
            Self::Number if numeric_lexical(lexical.trim(), datatype) => {
                lexical.trim().parse::<f64>().ok().map(Value::number)
            }
            Self::Number => None,
            Self::String => Some(Value::string(lexical)),
        }
    }

    /// Canonical lexical form of a primitive value.
    pub fn lexical(self, value: &Value, datatype: &Iri) -> Option<String> {
        match (self, value) {
            (Self::Boolean, Value::Boolean(b)) => Some(b.to_string()),
            (Self::DateTime, Value::DateTime(dt)) if datatype.as_str() == xsd::DATE => {
                Some(dt.format("%Y-%m-%d").to_string())
            }
            (Self::DateTime, Value::DateTime(dt)) => Some(format_date_time(dt)),
            (Self::Number, Value::Number(n)) => Some(n.0.to_string()),
            (Self::String, Value::String(s)) => Some(s.clone()),
            _ => None,
        }
    }
}

pub(crate) fn format_date_time(dt: &DateTime<FixedOffset>) -> String {
    dt.to_rfc3339()
}

/// The instant an `xsd:date` value stands for.
pub(crate) fn midnight_utc(date: NaiveDate) -> DateTime<FixedOffset> {
    date.and_time(NaiveTime::MIN).and_utc().fixed_offset()
}

// ————————————————————————————————————————————————————————————————————————————
// LITERAL TYPE
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LiteralKind {
    Primitive { kind: PrimitiveKind, datatype: Iri },
    Generic,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiteralType {
    pub(crate) kind: LiteralKind,
    pub(crate) default_value: Option<Value>,
    #[serde(rename = "in")]
    pub(crate) in_: Vec<Value>,
    pub(crate) has_values: Vec<Value>,
}

/// Datatypes that are legitimately generic; no warning when seen.
const GENERIC_DATATYPES: [&str; 4] = [rdf::LANG_STRING, rdf::HTML, rdf::XML_LITERAL, rdf::JSON];

impl LiteralType {
    /// Refine a literal node by the set of datatypes it mentions.
    ///
    /// Exactly one recognized datatype whose values all parse yields a
    /// primitive kind. Anything else degrades to the generic literal kind; that
    /// is logged, never an error.
    pub fn from_ast(id: &str, ast: &AstLiteralType) -> Self {
        let values = ast.default_value.iter().chain(&ast.in_).chain(&ast.has_values);
        let mut datatypes: BTreeSet<Iri> = values.map(AstLiteral::effective_datatype).collect();
        if let Some(datatype) = &ast.datatype {
            datatypes.insert(datatype.clone());
        }

        let refined = match datatypes.len() {
            0 => {
                tracing::debug!(literal = id, "no datatype declared; using generic literal");
                None
            }
            1 => {
                let datatype = datatypes.into_iter().next().unwrap_or_else(|| Iri::new(xsd::STRING));
                match PrimitiveKind::for_datatype(&datatype) {
                    Some(kind) => Some((kind, datatype)),
                    None => {
                        if !GENERIC_DATATYPES.contains(&datatype.as_str()) {
                            tracing::warn!(
                                literal = id,
                                datatype = datatype.as_str(),
                                "unrecognized datatype; using generic literal"
                            );
                        }
                        None
                    }
                }
            }
            _ => {
                tracing::warn!(
                    literal = id,
                    datatypes = ?datatypes.iter().map(Iri::as_str).collect::<Vec<_>>(),
                    "ambiguous datatypes; using generic literal"
                );
                None
            }
        };

        if let Some((kind, datatype)) = refined {
            let primitive = |literal: &AstLiteral| kind.parse(&literal.value, &datatype);
            let default_value = ast.default_value.as_ref().map(primitive);
            let in_: Vec<Option<Value>> = ast.in_.iter().map(primitive).collect();
            let has_values: Vec<Option<Value>> = ast.has_values.iter().map(primitive).collect();
            let all_parsed = !matches!(default_value, Some(None))
                && in_.iter().all(Option::is_some)
                && has_values.iter().all(Option::is_some);
            if all_parsed {
                return Self {
                    kind: LiteralKind::Primitive { kind, datatype },
                    default_value: default_value.flatten(),
                    in_: in_.into_iter().flatten().collect(),
                    has_values: has_values.into_iter().flatten().collect(),
                };
            }
            tracing::warn!(literal = id, datatype = datatype.as_str(), "invalid lexical form; using generic literal");
        }

        let generic = |literal: &AstLiteral| {
            Value::Literal(Literal {
                lexical: literal.value.clone(),
                datatype: literal.effective_datatype(),
                language: literal.language.clone(),
            })
        };
        Self {
            kind: LiteralKind::Generic,
            default_value: ast.default_value.as_ref().map(generic),
            in_: ast.in_.iter().map(generic).collect(),
            has_values: ast.has_values.iter().map(generic).collect(),
        }
    }

    pub fn kind(&self) -> &LiteralKind { &self.kind }
    pub fn default_value(&self) -> Option<&Value> { self.default_value.as_ref() }
    pub fn in_values(&self) -> &[Value] { &self.in_ }

    pub fn primitive_kind(&self) -> Option<PrimitiveKind> {
        match &self.kind {
            LiteralKind::Primitive { kind, .. } => Some(*kind),
            LiteralKind::Generic => None,
        }
    }

    pub fn name(&self) -> String {
        match &self.kind {
            LiteralKind::Primitive { kind, .. } => kind.type_name().to_string(),
            LiteralKind::Generic => "Literal".to_string(),
        }
    }

    pub fn conversions(&self) -> Vec<Conversion> {
        let mut out = Vec::new();
        if let Some(default) = &self.default_value {
            out.push(Conversion::new(
                "undefined",
                SourceCheck::Absent,
                ConversionExpr::Default { value: default.clone() },
            ));
        }
        match &self.kind {
            LiteralKind::Primitive { kind, datatype } => {
                let expr = match (*kind, datatype.as_str()) {
                    (PrimitiveKind::Number, datatype) if INTEGER_DATATYPES.contains(&datatype) => {
                        ConversionExpr::WholeNumber
                    }
                    (PrimitiveKind::DateTime, xsd::DATE) => ConversionExpr::Date,
                    _ => ConversionExpr::Identity,
                };
                out.push(Conversion::new(kind.type_name(), kind.source_check(), expr));
            }
            LiteralKind::Generic => {
                out.push(Conversion::identity("Literal", SourceCheck::Literal));
                for (kind, datatype) in [
                    (PrimitiveKind::Boolean, xsd::BOOLEAN),
                    (PrimitiveKind::DateTime, xsd::DATE_TIME),
                    (PrimitiveKind::Number, xsd::DOUBLE),
                    (PrimitiveKind::String, xsd::STRING),
                ] {
                    out.push(Conversion::new(
                        kind.type_name(),
                        kind.source_check(),
                        ConversionExpr::Literal { datatype: Iri::new(datatype) },
                    ));
                }
            }
        }
        out
    }

    fn with_default<Op>(&self, leaf: Fragment<Op>) -> Fragment<Op> {
        match &self.default_value {
            Some(value) => Fragment::Default { item: Box::new(leaf), value: value.clone() },
            None => leaf,
        }
    }

    pub fn equals_fragment(&self) -> Fragment<EqualsOp> {
        let op = match self.kind {
            LiteralKind::Primitive { .. } => EqualsOp::Strict,
            LiteralKind::Generic => EqualsOp::Term,
        };
        self.with_default(Fragment::leaf(op))
    }

    pub fn hash_fragment(&self) -> Fragment<HashOp> {
        let op = match self.kind {
            LiteralKind::Primitive { kind, .. } => HashOp::Primitive(kind),
            LiteralKind::Generic => HashOp::Literal,
        };
        self.with_default(Fragment::leaf(op))
    }

    pub fn json_fragment(&self) -> Fragment<JsonOp> {
        let op = match self.kind {
            LiteralKind::Primitive { kind, .. } => JsonOp::Primitive(kind),
            LiteralKind::Generic => JsonOp::Literal,
        };
        self.with_default(Fragment::leaf(op))
    }

    pub fn rdf_fragment(&self) -> Fragment<RdfOp> {
        let op = match &self.kind {
            LiteralKind::Primitive { kind, datatype } => {
                RdfOp::Primitive { kind: *kind, datatype: datatype.clone() }
            }
            LiteralKind::Generic => RdfOp::Literal,
        };
        self.with_default(Fragment::leaf(op))
    }
}

// ————————————————————————————————————————————————————————————————————————————
// IDENTIFIER TYPE
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifierType {
    pub(crate) node_kinds: BTreeSet<NodeKind>,
    #[serde(rename = "in")]
    pub(crate) in_: Vec<Iri>,
    pub(crate) default_value: Option<Identifier>,
}

impl IdentifierType {
    pub fn new(node_kinds: BTreeSet<NodeKind>) -> Self {
        Self { node_kinds, in_: Vec::new(), default_value: None }
    }

    pub fn from_ast(ast: &AstIdentifierType) -> Self {
        Self {
            node_kinds: ast.node_kinds.clone(),
            in_: ast.in_.clone(),
            default_value: ast.default_value.clone().map(Identifier::Iri),
        }
    }

    pub fn node_kinds(&self) -> &BTreeSet<NodeKind> { &self.node_kinds }

    pub fn allows(&self, identifier: &Identifier) -> bool {
        self.node_kinds.contains(&identifier.node_kind())
            && match identifier {
                Identifier::Iri(iri) => self.in_.is_empty() || self.in_.contains(iri),
                Identifier::BlankNode(_) => true,
            }
    }

    pub fn name(&self) -> String {
        let blank = self.node_kinds.contains(&NodeKind::BlankNode);
        let iri = self.node_kinds.contains(&NodeKind::Iri);
        match (blank, iri) {
            (true, false) => "BlankNode",
            (false, true) => "NamedNode",
            _ => "Identifier",
        }
        .to_string()
    }

    pub fn conversions(&self) -> Vec<Conversion> {
        let mut out = Vec::new();
        if let Some(default) = &self.default_value {
            out.push(Conversion::new(
                "undefined",
                SourceCheck::Absent,
                ConversionExpr::Default { value: Value::Identifier(default.clone()) },
            ));
        }
        out.push(Conversion::identity(self.name(), SourceCheck::Identifier));
        if self.node_kinds.contains(&NodeKind::Iri) {
            out.push(Conversion::new("string", SourceCheck::String, ConversionExpr::Iri));
        }
        out
    }

    fn with_default<Op>(&self, leaf: Fragment<Op>) -> Fragment<Op> {
        match &self.default_value {
            Some(value) => Fragment::Default {
                item: Box::new(leaf),
                value: Value::Identifier(value.clone()),
            },
            None => leaf,
        }
    }

    pub fn equals_fragment(&self) -> Fragment<EqualsOp> { self.with_default(Fragment::leaf(EqualsOp::Term)) }
    pub fn hash_fragment(&self) -> Fragment<HashOp> { self.with_default(Fragment::leaf(HashOp::Identifier)) }
    pub fn json_fragment(&self) -> Fragment<JsonOp> { self.with_default(Fragment::leaf(JsonOp::Identifier)) }

    pub fn rdf_fragment(&self) -> Fragment<RdfOp> {
        let node_kinds = self.node_kinds.iter().copied().collect();
        self.with_default(Fragment::leaf(RdfOp::Identifier { node_kinds }))
    }
}

// ————————————————————————————————————————————————————————————————————————————
// NATIVE TYPE
// ————————————————————————————————————————————————————————————————————————————

/// A type defined outside the schema, carried as opaque JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NativeType {
    pub(crate) name: String,
}

impl NativeType {
    pub fn name(&self) -> String { self.name.clone() }

    pub fn conversions(&self) -> Vec<Conversion> {
        vec![Conversion::identity(&self.name, SourceCheck::Native)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AstLiteralType;

    fn literal(json: serde_json::Value) -> LiteralType {
        let ast: AstLiteralType = serde_json::from_value(json).unwrap();
        LiteralType::from_ast("test", &ast)
    }

    #[test]
    fn single_datatype_refines_to_primitive() {
        let ty = literal(serde_json::json!({"datatype": xsd::INTEGER, "defaultValue": 7}));
        assert_eq!(ty.primitive_kind(), Some(PrimitiveKind::Number));
        assert_eq!(ty.default_value(), Some(&Value::number(7.0)));
        assert_eq!(ty.name(), "number");
    }

    #[test]
    fn values_alone_imply_datatype() {
        let ty = literal(serde_json::json!({"in": ["a", "b"]}));
        assert_eq!(ty.primitive_kind(), Some(PrimitiveKind::String));
        assert_eq!(ty.in_values(), &[Value::string("a"), Value::string("b")]);
    }

    #[test]
    fn ambiguous_datatypes_degrade_to_generic() {
        let ty = literal(serde_json::json!({"datatype": xsd::STRING, "defaultValue": 1}));
        assert_eq!(ty.kind(), &LiteralKind::Generic);
        assert_eq!(ty.default_value(), Some(&Value::Literal(Literal::typed("1", xsd::INTEGER))));
    }

    #[test]
    fn unrecognized_and_missing_datatypes_are_generic() {
        assert_eq!(literal(serde_json::json!({"datatype": "http://example.com/dt"})).kind(), &LiteralKind::Generic);
        assert_eq!(literal(serde_json::json!({})).kind(), &LiteralKind::Generic);
    }

    #[test]
    fn unparseable_value_degrades() {
        let ty = literal(serde_json::json!({"datatype": xsd::BOOLEAN, "defaultValue": {"value": "maybe", "datatype": xsd::BOOLEAN}}));
        assert_eq!(ty.kind(), &LiteralKind::Generic);
    }

    #[test]
    fn date_lexical_round_trips() {
        let datatype = Iri::new(xsd::DATE);
        let value = PrimitiveKind::DateTime.parse("2024-02-29", &datatype).unwrap();
        assert_eq!(PrimitiveKind::DateTime.lexical(&value, &datatype).as_deref(), Some("2024-02-29"));
    }

    #[test]
    fn numeric_lexical_forms_are_checked() {
        let integer = Iri::new(xsd::INTEGER);
        let double = Iri::new(xsd::DOUBLE);
        assert_eq!(PrimitiveKind::Number.parse("-42", &integer), Some(Value::number(-42.0)));
        assert_eq!(PrimitiveKind::Number.parse("4.5", &integer), None);
        assert_eq!(PrimitiveKind::Number.parse("4.5e1", &double), Some(Value::number(45.0)));
        assert_eq!(PrimitiveKind::Number.parse("inf", &double), None);
    }

    #[test]
    fn integer_and_date_datatypes_narrow_their_values() {
        let exprs = |datatype: &str| -> Vec<ConversionExpr> {
            literal(serde_json::json!({"datatype": datatype})).conversions().into_iter().map(|c| c.conversion).collect()
        };
        assert_eq!(exprs(xsd::UNSIGNED_SHORT), vec![ConversionExpr::WholeNumber]);
        assert_eq!(exprs(xsd::DECIMAL), vec![ConversionExpr::Identity]);
        assert_eq!(exprs(xsd::DATE), vec![ConversionExpr::Date]);
        assert_eq!(exprs(xsd::DATE_TIME), vec![ConversionExpr::Identity]);
    }

    #[test]
    fn generic_literal_accepts_primitives() {
        let ty = literal(serde_json::json!({}));
        let checks: Vec<_> = ty.conversions().into_iter().map(|c| c.source_check).collect();
        assert_eq!(checks[0], SourceCheck::Literal);
        assert!(checks.contains(&SourceCheck::Number));
    }
}
