use indexmap::IndexMap;
use serde_json::{Map, Number, Value as Json};

use crate::fragment::{Fragment, JsonOp, PropertyFragment, PropertyRole, UnionDiscriminator};
use crate::model::{ObjectType, PrimitiveKind, Type};
use crate::model::literal::format_date_time;
use crate::rdf::{Identifier, Iri, Literal, xsd};
use crate::runtime::{EvalError, Evaluator, or_default};
use crate::value::{ObjectValue, Value};

/// JSON key of the identifier property.
pub const IDENTIFIER_KEY: &str = "@id";

fn key<Op>(property: &PropertyFragment<Op>) -> &str {
    match property.role {
        PropertyRole::Identifier => IDENTIFIER_KEY,
        _ => &property.name,
    }
}

fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

// ————————————————————————————————————————————————————————————————————————————
// ENCODE
// ————————————————————————————————————————————————————————————————————————————

impl Evaluator<'_> {
    pub fn to_json(&self, ty: &Type, value: &Value) -> Result<Json, EvalError> {
        self.encode(&ty.json_fragment(self.model), value)
    }

    fn encode(&self, fragment: &Fragment<JsonOp>, value: &Value) -> Result<Json, EvalError> {
        match fragment {
            Fragment::Leaf { op } => encode_leaf(*op, value),
            Fragment::Default { item, value: default } => self.encode(item, or_default(value, default)),
            Fragment::Object { type_name } => match value {
                Value::Object(object) => {
                    let mut map = Map::new();
                    self.encode_object_as(object.type_name(), object, &mut map)?;
                    Ok(Json::Object(map))
                }
                other => Err(EvalError::mismatch(type_name.as_str(), other.kind_name())),
            },
            Fragment::Option { item } => match value {
                Value::Absent => Ok(Json::Null),
                value => self.encode(item, value),
            },
            Fragment::List { item } | Fragment::Set { item, .. } => match value {
                Value::List(items) => Ok(Json::Array(
                    items.iter().map(|v| self.encode(item, v)).collect::<Result<_, _>>()?,
                )),
                other => Err(EvalError::mismatch("list", other.kind_name())),
            },
            // Both discriminator kinds encode as the bare member value; a
            // synthetic tag is recovered on decode by trying members in order.
            Fragment::Union(union) => {
                let (arm, payload) = self.select_arm(union, value)?;
                self.encode(&arm.fragment, payload)
            }
        }
    }

    fn encode_object_as(&self, type_name: &str, object: &ObjectValue, map: &mut Map<String, Json>) -> Result<(), EvalError> {
        let fragment = self.object_type(type_name)?.json_fragment(self.model);
        if let Some(parent) = &fragment.parent {
            self.encode_object_as(parent, object, map)?;
        }
        for property in &fragment.properties {
            let json = self.encode(&property.fragment, &self.field(object, property)?)?;
            if !json.is_null() {
                map.insert(key(property).to_string(), json);
            }
        }
        Ok(())
    }
}

fn encode_leaf(op: JsonOp, value: &Value) -> Result<Json, EvalError> {
    Ok(match (op, value) {
        (JsonOp::Primitive(PrimitiveKind::Boolean), Value::Boolean(b)) => Json::Bool(*b),
        (JsonOp::Primitive(PrimitiveKind::Number), Value::Number(n)) => Number::from_f64(n.0)
            .map(Json::Number)
            .ok_or_else(|| EvalError::mismatch("finite number", n.0.to_string()))?,
        (JsonOp::Primitive(PrimitiveKind::String), Value::String(s)) => Json::String(s.clone()),
        (JsonOp::Primitive(PrimitiveKind::DateTime), Value::DateTime(dt)) => Json::String(format_date_time(dt)),
        (JsonOp::Literal, Value::Literal(literal)) => {
            let mut map = Map::new();
            map.insert("@value".to_string(), Json::String(literal.lexical.clone()));
            match &literal.language {
                Some(language) => {
                    map.insert("@language".to_string(), Json::String(language.clone()));
                }
                None => {
                    map.insert("@type".to_string(), Json::String(literal.datatype.as_str().to_string()));
                }
            }
            Json::Object(map)
        }
        (JsonOp::Identifier, Value::Identifier(identifier)) => Json::String(identifier.to_json_string()),
        (JsonOp::Native, Value::Native(json)) => json.clone(),
        (op, value) => return Err(EvalError::mismatch(format!("{op:?}"), value.kind_name())),
    })
}

// ————————————————————————————————————————————————————————————————————————————
// DECODE
// ————————————————————————————————————————————————————————————————————————————

impl Evaluator<'_> {
    pub fn from_json(&self, ty: &Type, json: &Json) -> Result<Value, EvalError> {
        self.decode(&ty.json_fragment(self.model), json)
    }

    fn decode(&self, fragment: &Fragment<JsonOp>, json: &Json) -> Result<Value, EvalError> {
        match fragment {
            Fragment::Leaf { op } => decode_leaf(*op, json),
            Fragment::Default { value, .. } if json.is_null() => Ok(value.clone()),
            Fragment::Default { item, .. } => self.decode(item, json),
            Fragment::Object { type_name } => Ok(Value::from(self.decode_object(type_name, json)?)),
            Fragment::Option { .. } if json.is_null() => Ok(Value::Absent),
            Fragment::Option { item } => self.decode(item, json),
            Fragment::Set { min_count: 0, .. } if json.is_null() => Ok(Value::List(Vec::new())),
            Fragment::List { item } | Fragment::Set { item, .. } => {
                let Json::Array(items) = json else {
                    return Err(EvalError::decode("array", format!("found {}", json_kind(json))));
                };
                let items = items.iter().map(|v| self.decode(item, v)).collect::<Result<Vec<_>, _>>()?;
                if let Fragment::Set { min_count, .. } = fragment {
                    if items.len() < *min_count as usize {
                        return Err(EvalError::decode("set", format!("{} values, at least {min_count} required", items.len())));
                    }
                }
                Ok(Value::List(items))
            }
            Fragment::Union(union) => {
                let mut failures = Vec::new();
                for arm in &union.members {
                    match self.decode(&arm.fragment, json) {
                        Ok(value) => {
                            return Ok(match (&union.discriminator, arm.values.first()) {
                                (UnionDiscriminator::Synthetic, Some(tag)) => {
                                    Value::Tagged { tag: tag.clone(), value: Box::new(value) }
                                }
                                _ => value,
                            });
                        }
                        Err(error) => failures.push(format!("{}: {error}", arm.member_type_name)),
                    }
                }
                Err(EvalError::decode("union", failures.join("; ")))
            }
        }
    }

    /// Decode an instance of `type_name` or of the descendant its
    /// discriminator names.
    fn decode_object(&self, type_name: &str, json: &Json) -> Result<ObjectValue, EvalError> {
        let Json::Object(map) = json else {
            return Err(EvalError::decode(type_name, format!("expected an object, found {}", json_kind(json))));
        };
        let target = self.object_type(type_name)?;
        let discriminator =
            target.discriminator_type_property().ok_or_else(|| EvalError::AbstractType(type_name.to_string()))?;
        let tag = map
            .get(&discriminator.name)
            .and_then(Json::as_str)
            .ok_or_else(|| EvalError::decode(type_name, format!("missing `{}`", discriminator.name)))?;
        let concrete = std::iter::once(target.id())
            .chain(target.descendants(self.model).iter().copied())
            .map(|id| self.model.object_type(id))
            .find(|candidate| !candidate.abstract_() && candidate.discriminator_value() == tag)
            .ok_or_else(|| EvalError::decode(type_name, format!("`{tag}` is not a known subtype")))?;

        let mut fields = IndexMap::new();
        self.decode_object_as(concrete, map, &mut fields)?;
        Ok(ObjectValue::new(concrete.name(), fields))
    }

    fn decode_object_as(
        &self,
        object_type: &ObjectType,
        map: &Map<String, Json>,
        fields: &mut IndexMap<String, Value>,
    ) -> Result<(), EvalError> {
        let fragment = object_type.json_fragment(self.model);
        if let Some(parent) = object_type.parent(self.model) {
            self.decode_object_as(parent, map, fields)?;
        }
        for property in &fragment.properties {
            let json = map.get(key(property)).unwrap_or(&Json::Null);
            let value = match &property.role {
                PropertyRole::Identifier if json.is_null() => continue,
                PropertyRole::Discriminator { .. } => match json.as_str() {
                    Some(tag) => Value::string(tag),
                    None => return Err(EvalError::decode(object_type.name(), format!("missing `{}`", property.name))),
                },
                _ => self
                    .decode(&property.fragment, json)
                    .map_err(|error| EvalError::decode(format!("{}.{}", object_type.name(), property.name), error.to_string()))?,
            };
            if !value.is_absent() {
                fields.insert(property.name.clone(), value);
            }
        }
        Ok(())
    }
}

fn decode_leaf(op: JsonOp, json: &Json) -> Result<Value, EvalError> {
    let wrong = || EvalError::decode(format!("{op:?}"), format!("found {}", json_kind(json)));
    Ok(match (op, json) {
        (JsonOp::Primitive(PrimitiveKind::Boolean), Json::Bool(b)) => Value::Boolean(*b),
        (JsonOp::Primitive(PrimitiveKind::Number), Json::Number(n)) => Value::number(n.as_f64().ok_or_else(wrong)?),
        (JsonOp::Primitive(PrimitiveKind::String), Json::String(s)) => Value::string(s),
        (JsonOp::Primitive(PrimitiveKind::DateTime), Json::String(s)) => {
            PrimitiveKind::DateTime.parse(s, &Iri::new(xsd::DATE_TIME)).ok_or_else(wrong)?
        }
        (JsonOp::Literal, Json::String(s)) => Value::Literal(Literal::string(s)),
        (JsonOp::Literal, Json::Object(map)) => {
            let lexical = map.get("@value").and_then(Json::as_str).ok_or_else(wrong)?;
            let language = map.get("@language").and_then(Json::as_str);
            let datatype = map.get("@type").and_then(Json::as_str);
            Value::Literal(match (language, datatype) {
                (Some(language), _) => Literal::lang_string(lexical, language),
                (None, Some(datatype)) => Literal::typed(lexical, datatype),
                (None, None) => Literal::string(lexical),
            })
        }
        (JsonOp::Identifier, Json::String(s)) => Value::Identifier(Identifier::parse(s)),
        (JsonOp::Native, json) if !json.is_null() => Value::Native(json.clone()),
        _ => return Err(wrong()),
    })
}
