use crate::fragment::{Fragment, HashOp, PropertyRole};
use crate::model::{ObjectType, Type};
use crate::runtime::{EvalError, Evaluator, or_default, primitive_lexical};
use crate::value::{ObjectValue, Value};

/// Length-prefixed writes keep `["ab", "c"]` and `["a", "bc"]` apart.
struct Accumulator(blake3::Hasher);

impl Accumulator {
    fn new() -> Self { Self(blake3::Hasher::new()) }

    fn write(&mut self, bytes: &[u8]) {
        self.0.update(&(bytes.len() as u64).to_le_bytes());
        self.0.update(bytes);
    }

    fn write_str(&mut self, value: &str) { self.write(value.as_bytes()) }

    fn finish(self) -> String { self.0.finalize().to_hex().to_string() }
}

impl Evaluator<'_> {
    /// Hex digest of a value of `ty`. Equal values hash equally.
    pub fn hash(&self, ty: &Type, value: &Value) -> Result<String, EvalError> {
        let mut accumulator = Accumulator::new();
        self.hash_fragment(&ty.hash_fragment(self.model), value, &mut accumulator)?;
        Ok(accumulator.finish())
    }

    /// Digest of every property on the chain except the identifier.
    pub(crate) fn content_hash(&self, object_type: &ObjectType, object: &ObjectValue) -> Result<String, EvalError> {
        let mut accumulator = Accumulator::new();
        self.hash_object_as(object_type.name(), object, &mut accumulator, false)?;
        Ok(accumulator.finish())
    }

    fn hash_fragment(&self, fragment: &Fragment<HashOp>, value: &Value, out: &mut Accumulator) -> Result<(), EvalError> {
        match fragment {
            Fragment::Leaf { op } => self.hash_leaf(*op, value, out),
            Fragment::Default { item, value: default } => self.hash_fragment(item, or_default(value, default), out),
            Fragment::Object { type_name } => match value {
                Value::Object(object) => {
                    out.write_str(object.type_name());
                    self.hash_object_as(object.type_name(), object, out, true)
                }
                other => Err(EvalError::mismatch(type_name.as_str(), other.kind_name())),
            },
            Fragment::Option { item } => match value {
                Value::Absent => {
                    out.write(&[0]);
                    Ok(())
                }
                value => {
                    out.write(&[1]);
                    self.hash_fragment(item, value, out)
                }
            },
            Fragment::List { item } | Fragment::Set { item, .. } => match value {
                Value::List(items) => {
                    out.write(&(items.len() as u64).to_le_bytes());
                    items.iter().try_for_each(|item_value| self.hash_fragment(item, item_value, out))
                }
                other => Err(EvalError::mismatch("list", other.kind_name())),
            },
            Fragment::Union(union) => {
                let (arm, payload) = self.select_arm(union, value)?;
                out.write_str(&arm.member_type_name);
                self.hash_fragment(&arm.fragment, payload, out)
            }
        }
    }

    fn hash_leaf(&self, op: HashOp, value: &Value, out: &mut Accumulator) -> Result<(), EvalError> {
        match (op, value) {
            (HashOp::Primitive(kind), value) if self.check(&kind.source_check(), value) => {
                let lexical =
                    primitive_lexical(value).ok_or_else(|| EvalError::mismatch(kind.type_name(), value.kind_name()))?;
                out.write_str(kind.type_name());
                out.write_str(&lexical);
            }
            (HashOp::Literal, Value::Literal(literal)) => {
                out.write_str(&literal.lexical);
                out.write_str(literal.datatype.as_str());
                out.write_str(literal.language.as_deref().unwrap_or(""));
            }
            (HashOp::Identifier, Value::Identifier(identifier)) => out.write_str(&identifier.to_json_string()),
            (HashOp::Native, Value::Native(json)) => out.write_str(&json.to_string()),
            (op, value) => return Err(EvalError::mismatch(format!("{op:?}"), value.kind_name())),
        }
        Ok(())
    }

    /// Parent first, then own properties, into one accumulator.
    fn hash_object_as(
        &self,
        type_name: &str,
        object: &ObjectValue,
        out: &mut Accumulator,
        with_identifier: bool,
    ) -> Result<(), EvalError> {
        let fragment = self.object_type(type_name)?.hash_fragment(self.model);
        if let Some(parent) = &fragment.parent {
            self.hash_object_as(parent, object, out, with_identifier)?;
        }
        for property in &fragment.properties {
            if !with_identifier && property.role == PropertyRole::Identifier {
                continue;
            }
            out.write_str(&property.name);
            self.hash_fragment(&property.fragment, &self.field(object, property)?, out)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AstLiteralType;
    use crate::config::GeneratorConfig;
    use crate::model::{LiteralType, SetType, TypeModel};
    use crate::rdf::{Iri, xsd};

    #[test]
    fn equal_values_hash_equally_and_prefixes_do_not_collide() {
        let model = TypeModel::from_ast(&Default::default(), &GeneratorConfig::default()).unwrap();
        let evaluator = Evaluator::new(&model);
        let string = Type::Literal(LiteralType::from_ast(
            "s",
            &AstLiteralType { datatype: Some(Iri::new(xsd::STRING)), ..Default::default() },
        ));
        let set = Type::Set(SetType { item: Box::new(string.clone()), min_count: 0 });

        let ab_c = Value::List(vec![Value::string("ab"), Value::string("c")]);
        let a_bc = Value::List(vec![Value::string("a"), Value::string("bc")]);
        assert_eq!(evaluator.hash(&set, &ab_c).unwrap(), evaluator.hash(&set, &ab_c.clone()).unwrap());
        assert_ne!(evaluator.hash(&set, &ab_c).unwrap(), evaluator.hash(&set, &a_bc).unwrap());
        assert!(matches!(evaluator.hash(&string, &Value::number(1.0)), Err(EvalError::Mismatch { .. })));
    }
}
