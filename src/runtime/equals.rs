use crate::fragment::{EqualsOp, Fragment};
use crate::model::Type;
use crate::runtime::{EvalError, Evaluator, or_default};
use crate::value::{ObjectValue, Value};

impl Evaluator<'_> {
    /// Structural equality of two values of `ty`.
    pub fn equals(&self, ty: &Type, a: &Value, b: &Value) -> Result<bool, EvalError> {
        self.equals_fragment(&ty.equals_fragment(self.model), a, b)
    }

    fn equals_fragment(&self, fragment: &Fragment<EqualsOp>, a: &Value, b: &Value) -> Result<bool, EvalError> {
        match fragment {
            // Strict, term and native equality all coincide on dynamic values.
            Fragment::Leaf { .. } => Ok(a == b),
            Fragment::Default { item, value } => self.equals_fragment(item, or_default(a, value), or_default(b, value)),
            Fragment::Object { .. } => match (a, b) {
                (Value::Object(a), Value::Object(b)) => self.object_equals(a, b),
                _ => Ok(false),
            },
            Fragment::Option { item } => match (a, b) {
                (Value::Absent, Value::Absent) => Ok(true),
                (Value::Absent, _) | (_, Value::Absent) => Ok(false),
                _ => self.equals_fragment(item, a, b),
            },
            Fragment::List { item } | Fragment::Set { item, .. } => match (a, b) {
                (Value::List(a), Value::List(b)) if a.len() == b.len() => {
                    for (a, b) in a.iter().zip(b) {
                        if !self.equals_fragment(item, a, b)? {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                }
                _ => Ok(false),
            },
            Fragment::Union(union) => {
                let (arm_a, a) = self.select_arm(union, a)?;
                let (arm_b, b) = self.select_arm(union, b)?;
                if arm_a.member_type_name != arm_b.member_type_name {
                    return Ok(false);
                }
                self.equals_fragment(&arm_a.fragment, a, b)
            }
        }
    }

    fn object_equals(&self, a: &ObjectValue, b: &ObjectValue) -> Result<bool, EvalError> {
        if a.type_name() != b.type_name() {
            return Ok(false);
        }
        self.object_equals_as(a.type_name(), a, b)
    }

    /// Parent first; stops at the first unequal property.
    fn object_equals_as(&self, type_name: &str, a: &ObjectValue, b: &ObjectValue) -> Result<bool, EvalError> {
        let fragment = self.object_type(type_name)?.equals_fragment(self.model);
        if let Some(parent) = &fragment.parent {
            if !self.object_equals_as(parent, a, b)? {
                return Ok(false);
            }
        }
        for property in &fragment.properties {
            let (x, y) = (self.field(a, property)?, self.field(b, property)?);
            if !self.equals_fragment(&property.fragment, &x, &y)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
