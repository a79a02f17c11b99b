//! Reference evaluator for the emitted fragments.
//!
//! Generators print the fragments as target-language code. This module runs
//! them directly over dynamic [`Value`]s instead, so every concern of a model
//! can be exercised (and checked against the others) without a code
//! generator in the loop.
mod equals;
mod graph;
mod hash;
mod json;

use indexmap::IndexMap;
use thiserror::Error;
use uuid::Uuid;

use crate::ast::MintingStrategy;
use crate::fragment::{
    ConversionExpr, PropertyFragment, PropertyRole, SourceCheck, UnionArm, UnionDiscriminator,
    UnionFragment,
};
use crate::model::literal::{format_date_time, midnight_utc};
use crate::model::{ObjectType, Type, TypeModel};
use crate::rdf::{Identifier, Iri, Literal};
use crate::value::{ObjectValue, Value};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("unknown object type `{0}`")]
    UnknownType(String),

    #[error("`{0}` is abstract and has no concrete subtype here")]
    AbstractType(String),

    #[error("`{type_name}` has no property `{property}`")]
    UnknownProperty { type_name: String, property: String },

    #[error("`{type_name}.{property}` is not mutable")]
    Immutable { type_name: String, property: String },

    #[error("`{type_name}.{property}` has no value and none can be minted")]
    MissingValue { type_name: String, property: String },

    #[error("no conversion from {found} to `{target}`")]
    NoConversion { target: String, found: &'static str },

    #[error("expected {expected}, found {found}")]
    Mismatch { expected: String, found: String },

    #[error("cannot decode `{expected}`: {message}")]
    Decode { expected: String, message: String },
}

impl EvalError {
    pub(crate) fn decode(expected: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode { expected: expected.into(), message: message.into() }
    }

    pub(crate) fn mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::Mismatch { expected: expected.into(), found: found.into() }
    }
}

/// Interprets a [`TypeModel`]'s fragments.
#[derive(Debug, Clone, Copy)]
pub struct Evaluator<'m> {
    model: &'m TypeModel,
}

// ————————————————————————————————————————————————————————————————————————————
// CONSTRUCTION
// ————————————————————————————————————————————————————————————————————————————

impl<'m> Evaluator<'m> {
    pub fn new(model: &'m TypeModel) -> Self { Self { model } }

    pub fn model(&self) -> &'m TypeModel { self.model }

    pub fn object_type(&self, name: &str) -> Result<&'m ObjectType, EvalError> {
        self.model.object_type_by_name(name).ok_or_else(|| EvalError::UnknownType(name.to_string()))
    }

    /// `Type` of the object type called `name`.
    pub fn object(&self, name: &str) -> Result<Type, EvalError> {
        Ok(Type::Object(self.object_type(name)?.id()))
    }

    /// Build an instance from constructor parameters. Every parameter runs
    /// through its property's conversion chain; the discriminator is fixed.
    pub fn construct(&self, type_name: &str, mut params: IndexMap<String, Value>) -> Result<ObjectValue, EvalError> {
        let object_type = self.object_type(type_name)?;
        if object_type.abstract_() {
            return Err(EvalError::AbstractType(type_name.to_string()));
        }

        let mut fields = IndexMap::new();
        for property in object_type.chain_properties(self.model) {
            if let Some(discriminator) = property.as_discriminator() {
                if let Some(value) = params.shift_remove(property.name()) {
                    if value.as_str() != Some(object_type.discriminator_value()) {
                        return Err(EvalError::mismatch(object_type.discriminator_value(), value.kind_name()));
                    }
                }
                fields.insert(discriminator.name.clone(), Value::string(object_type.discriminator_value()));
                continue;
            }
            let value = params.shift_remove(property.name()).unwrap_or(Value::Absent);
            let value = if property.as_identifier().is_some() && value.is_absent() {
                // Minted lazily by `identifier`.
                property
                    .conversions(self.model)
                    .iter()
                    .find(|c| c.source_check == SourceCheck::Absent)
                    .map(|_| Value::Absent)
                    .ok_or_else(|| EvalError::MissingValue {
                        type_name: type_name.to_string(),
                        property: property.name().to_string(),
                    })?
            } else {
                self.convert(property.type_(), value)?
            };
            if !value.is_absent() {
                fields.insert(property.name().to_string(), value);
            }
        }

        if let Some(unknown) = params.keys().next() {
            return Err(EvalError::UnknownProperty { type_name: type_name.to_string(), property: unknown.clone() });
        }
        Ok(ObjectValue::new(type_name, fields))
    }

    /// Run `ty`'s conversion chain over `value`; the first matching check wins.
    pub fn convert(&self, ty: &Type, value: Value) -> Result<Value, EvalError> {
        if let Type::Option(option) = ty {
            return match value {
                Value::Absent => Ok(Value::Absent),
                value => self.convert(option.item(), value),
            };
        }

        let conversions = ty.conversions(self.model);
        let Some(conversion) = conversions.iter().find(|c| self.check(&c.source_check, &value)) else {
            return Err(EvalError::NoConversion { target: ty.name(self.model), found: value.kind_name() });
        };
        let converted = apply(&conversion.conversion, value)?;

        match (ty, converted) {
            (Type::List(list), Value::List(items)) => {
                let items = items.into_iter().map(|item| self.convert(list.item(), item));
                Ok(Value::List(items.collect::<Result<_, _>>()?))
            }
            (Type::Set(set), Value::List(items)) => {
                if items.len() < set.min_count() as usize {
                    return Err(EvalError::mismatch(
                        format!("at least {} values", set.min_count()),
                        items.len().to_string(),
                    ));
                }
                let items = items.into_iter().map(|item| self.convert(set.item(), item));
                Ok(Value::List(items.collect::<Result<_, _>>()?))
            }
            (Type::Union(union), Value::Tagged { tag, value }) => {
                let values = union.member_values(self.model);
                let index = values
                    .iter()
                    .position(|values| values.contains(&tag))
                    .ok_or_else(|| EvalError::mismatch(union.name(self.model), tag.clone()))?;
                let value = self.convert(&union.members()[index], *value)?;
                Ok(Value::Tagged { tag, value: Box::new(value) })
            }
            (_, converted) => Ok(converted),
        }
    }

    fn check(&self, check: &SourceCheck, value: &Value) -> bool {
        match (check, value) {
            (SourceCheck::Absent, Value::Absent)
            | (SourceCheck::Boolean, Value::Boolean(_))
            | (SourceCheck::Number, Value::Number(_))
            | (SourceCheck::String, Value::String(_))
            | (SourceCheck::DateTime, Value::DateTime(_))
            | (SourceCheck::Literal, Value::Literal(_))
            | (SourceCheck::Identifier, Value::Identifier(_))
            | (SourceCheck::Native, Value::Native(_))
            | (SourceCheck::Array, Value::List(_))
            | (SourceCheck::Tagged, Value::Tagged { .. }) => true,
            (SourceCheck::Object { type_name }, Value::Object(object)) => {
                match (self.model.object_type_by_name(object.type_name()), self.model.object_type_by_name(type_name)) {
                    (Some(actual), Some(expected)) => actual.is_a(expected.id(), self.model),
                    _ => false,
                }
            }
            _ => false,
        }
    }

    /// Assign a mutable property.
    pub fn set(&self, object: &mut ObjectValue, property_name: &str, value: Value) -> Result<(), EvalError> {
        let object_type = self.object_type(object.type_name())?;
        let property = object_type
            .chain_properties(self.model)
            .into_iter()
            .find(|p| p.name() == property_name)
            .ok_or_else(|| EvalError::UnknownProperty {
                type_name: object_type.name().to_string(),
                property: property_name.to_string(),
            })?;
        if !property.mutable() {
            return Err(EvalError::Immutable {
                type_name: object_type.name().to_string(),
                property: property_name.to_string(),
            });
        }
        match self.convert(property.type_(), value)? {
            Value::Absent => {
                object.fields.shift_remove(property_name);
            }
            value => {
                object.fields.insert(property_name.to_string(), value);
            }
        }
        Ok(())
    }
}

fn apply(expr: &ConversionExpr, value: Value) -> Result<Value, EvalError> {
    match expr {
        ConversionExpr::Identity => Ok(value),
        ConversionExpr::Default { value } => Ok(value.clone()),
        ConversionExpr::Iri => match value {
            Value::String(iri) => Ok(Value::Identifier(Identifier::Iri(Iri::new(iri)))),
            other => Err(EvalError::mismatch("string", other.kind_name())),
        },
        ConversionExpr::Literal { datatype } => {
            let lexical = primitive_lexical(&value).ok_or_else(|| EvalError::mismatch("primitive", value.kind_name()))?;
            Ok(Value::Literal(Literal::typed(lexical, datatype.as_str())))
        }
        ConversionExpr::EmptyList => Ok(Value::List(Vec::new())),
        ConversionExpr::WholeNumber => match value {
            Value::Number(n) if n.0.fract() == 0.0 => Ok(Value::Number(n)),
            Value::Number(n) => Err(EvalError::mismatch("whole number", n.0.to_string())),
            other => Err(EvalError::mismatch("number", other.kind_name())),
        },
        ConversionExpr::Date => match value {
            Value::DateTime(dt) => Ok(Value::DateTime(midnight_utc(dt.date_naive()))),
            other => Err(EvalError::mismatch("date", other.kind_name())),
        },
    }
}

pub(crate) fn primitive_lexical(value: &Value) -> Option<String> {
    match value {
        Value::Boolean(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.0.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::DateTime(dt) => Some(format_date_time(dt)),
        _ => None,
    }
}

// ————————————————————————————————————————————————————————————————————————————
// IDENTIFIERS
// ————————————————————————————————————————————————————————————————————————————

impl Evaluator<'_> {
    /// The instance's identifier: the supplied one, else minted by the
    /// type's strategy. Minted values are cached on the instance unless the
    /// identifier hashes the content of a mutable type.
    pub fn identifier(&self, object: &ObjectValue) -> Result<Identifier, EvalError> {
        let object_type = self.object_type(object.type_name())?;
        let property = object_type.identifier_property();
        if let Value::Identifier(identifier) = object.get(&property.name) {
            return Ok(identifier.clone());
        }
        if property.memoizes(object_type.mutable(self.model)) {
            object.minted_identifier.get_or_try_init(|| self.mint(object_type, object)).cloned()
        } else {
            self.mint(object_type, object)
        }
    }

    fn mint(&self, object_type: &ObjectType, object: &ObjectValue) -> Result<Identifier, EvalError> {
        let property = object_type.identifier_property();
        let identifier = match property.minting_strategy() {
            MintingStrategy::ExternallySupplied => {
                return Err(EvalError::MissingValue {
                    type_name: object_type.name().to_string(),
                    property: property.name.clone(),
                });
            }
            MintingStrategy::Random => Identifier::BlankNode(Uuid::new_v4().simple().to_string()),
            MintingStrategy::ContentHash => {
                let digest = self.content_hash(object_type, object)?;
                Identifier::Iri(Iri::new(format!("{}{digest}", property.mint_prefix())))
            }
            MintingStrategy::SequentialRandom => {
                Identifier::Iri(Iri::new(format!("{}{}", property.mint_prefix(), Uuid::new_v4())))
            }
        };
        tracing::trace!(type_name = object_type.name(), %identifier, "minted identifier");
        Ok(identifier)
    }

    /// Value of one property as its getter reports it.
    pub(crate) fn field<Op>(&self, object: &ObjectValue, property: &PropertyFragment<Op>) -> Result<Value, EvalError> {
        match property.role {
            PropertyRole::Identifier => Ok(Value::Identifier(self.identifier(object)?)),
            _ => Ok(object.get(&property.name).clone()),
        }
    }

    /// The arm a union value belongs to, and the payload that arm sees.
    pub(crate) fn select_arm<'f, Op>(
        &self,
        union: &'f UnionFragment<Op>,
        value: &'f Value,
    ) -> Result<(&'f UnionArm<Op>, &'f Value), EvalError> {
        let (tag, payload) = match (&union.discriminator, value) {
            (UnionDiscriminator::Synthetic, Value::Tagged { tag, value }) => (tag.as_str(), value.as_ref()),
            (UnionDiscriminator::Shared { property_name }, Value::Object(object)) => {
                let tag = object
                    .get(property_name)
                    .as_str()
                    .ok_or_else(|| EvalError::mismatch(format!("`{property_name}` discriminator"), "nothing"))?;
                (tag, value)
            }
            (UnionDiscriminator::Synthetic, other) => return Err(EvalError::mismatch("tagged value", other.kind_name())),
            (UnionDiscriminator::Shared { .. }, other) => return Err(EvalError::mismatch("object", other.kind_name())),
        };
        let arm = union
            .members
            .iter()
            .find(|arm| arm.values.iter().any(|v| v == tag))
            .ok_or_else(|| EvalError::mismatch("a union member tag", tag))?;
        Ok((arm, payload))
    }
}

/// `value`, or `default` when it is absent.
pub(crate) fn or_default<'v>(value: &'v Value, default: &'v Value) -> &'v Value {
    if value.is_absent() { default } else { value }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AstForest;
    use crate::config::GeneratorConfig;
    use serde_json::json;

    fn model() -> TypeModel {
        let ast = AstForest::from_json_value(json!({
            "nodes": {
                "string": {"kind": "literal", "datatype": "http://www.w3.org/2001/XMLSchema#string"},
                "count": {"kind": "literal", "datatype": "http://www.w3.org/2001/XMLSchema#integer", "defaultValue": 1},
                "Note": {
                    "kind": "object", "name": "Note",
                    "identifierNodeKinds": ["iri"],
                    "identifierMintingStrategy": "contentHash",
                    "properties": ["Note.text", "Note.count", "Note.tags"]
                }
            },
            "properties": {
                "Note.text": {"name": "text", "path": "http://example.com/text", "type": "string", "minCount": 1, "maxCount": 1, "mutable": true},
                "Note.count": {"name": "count", "path": "http://example.com/count", "type": "count", "maxCount": 1},
                "Note.tags": {"name": "tags", "path": "http://example.com/tag", "type": "string"}
            }
        }))
        .unwrap();
        TypeModel::from_ast(&ast, &GeneratorConfig::default()).unwrap()
    }

    #[test]
    fn construct_applies_conversions() {
        let model = model();
        let evaluator = Evaluator::new(&model);
        let note = evaluator
            .construct("Note", IndexMap::from([("text".to_string(), Value::string("hi"))]))
            .unwrap();
        assert_eq!(note.get("count"), &Value::number(1.0));
        assert_eq!(note.get("tags"), &Value::List(Vec::new()));
        assert_eq!(note.get("type"), &Value::string("Note"));
    }

    #[test]
    fn construct_rejects_unknown_and_wrong_params() {
        let model = model();
        let evaluator = Evaluator::new(&model);
        let unknown = IndexMap::from([
            ("text".to_string(), Value::string("hi")),
            ("colour".to_string(), Value::string("red")),
        ]);
        assert!(matches!(evaluator.construct("Note", unknown), Err(EvalError::UnknownProperty { .. })));
        let wrong = IndexMap::from([("text".to_string(), Value::number(3.0))]);
        assert!(matches!(evaluator.construct("Note", wrong), Err(EvalError::NoConversion { .. })));
    }

    #[test]
    fn set_only_touches_mutable_properties() {
        let model = model();
        let evaluator = Evaluator::new(&model);
        let mut note = evaluator
            .construct("Note", IndexMap::from([("text".to_string(), Value::string("hi"))]))
            .unwrap();
        evaluator.set(&mut note, "text", Value::string("bye")).unwrap();
        assert_eq!(note.get("text"), &Value::string("bye"));
        assert!(matches!(
            evaluator.set(&mut note, "count", Value::number(2.0)),
            Err(EvalError::Immutable { .. })
        ));
    }

    #[test]
    fn mutable_content_hash_tracks_content() {
        let model = model();
        let evaluator = Evaluator::new(&model);
        let mut note = evaluator
            .construct("Note", IndexMap::from([("text".to_string(), Value::string("hi"))]))
            .unwrap();
        let before = evaluator.identifier(&note).unwrap();
        assert_eq!(before, evaluator.identifier(&note).unwrap());
        assert!(before.to_json_string().starts_with("urn:blake3:"));
        evaluator.set(&mut note, "text", Value::string("bye")).unwrap();
        assert_ne!(before, evaluator.identifier(&note).unwrap());
    }
}
