//! Dynamic instance values. Used for default values in the type model and as
//! the data the reference evaluator operates on.
use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;
use once_cell::unsync::OnceCell;
use ordered_float::OrderedFloat;
use serde::Serialize;

use crate::rdf::{Identifier, Literal};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Value {
    /// No value (an unset optional, or a parameter that was not passed).
    Absent,
    Boolean(bool),
    Number(OrderedFloat<f64>),
    String(String),
    DateTime(DateTime<FixedOffset>),
    /// Generic RDF literal.
    Literal(Literal),
    Identifier(Identifier),
    /// Opaque JSON carried by a native type.
    Native(serde_json::Value),
    List(Vec<Value>),
    Object(Box<ObjectValue>),
    /// Synthetic union envelope.
    Tagged { tag: String, value: Box<Value> },
}

impl Value {
    pub fn number(value: f64) -> Self { Self::Number(OrderedFloat(value)) }
    pub fn string(value: impl Into<String>) -> Self { Self::String(value.into()) }
    pub fn is_absent(&self) -> bool { matches!(self, Self::Absent) }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectValue> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Short label for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Boolean(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::DateTime(_) => "dateTime",
            Self::Literal(_) => "literal",
            Self::Identifier(_) => "identifier",
            Self::Native(_) => "native",
            Self::List(_) => "list",
            Self::Object(_) => "object",
            Self::Tagged { .. } => "tagged",
        }
    }
}

impl From<ObjectValue> for Value {
    fn from(object: ObjectValue) -> Self { Self::Object(Box::new(object)) }
}

/// An instance of a concrete object type.
///
/// `fields` holds every property value keyed by property name, including the
/// discriminator and an explicitly supplied identifier. A minted identifier
/// lives in `minted_identifier`, never in `fields`.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectValue {
    pub(crate) type_name: String,
    pub(crate) fields: IndexMap<String, Value>,
    #[serde(skip)]
    pub(crate) minted_identifier: OnceCell<Identifier>,
}

impl ObjectValue {
    pub(crate) fn new(type_name: impl Into<String>, fields: IndexMap<String, Value>) -> Self {
        Self { type_name: type_name.into(), fields, minted_identifier: OnceCell::new() }
    }

    pub fn type_name(&self) -> &str { &self.type_name }

    pub fn get(&self, property_name: &str) -> &Value {
        self.fields.get(property_name).unwrap_or(&Value::Absent)
    }

    pub fn fields(&self) -> &IndexMap<String, Value> { &self.fields }
}

// The minted identifier is a cache, not part of the value.
impl PartialEq for ObjectValue {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name && self.fields == other.fields
    }
}
