use indexmap::IndexMap;
use uuid::Uuid;

use crate::fragment::{Fragment, PropertyRole, RdfOp, UnionDiscriminator};
use crate::model::{ObjectType, PrimitiveKind};
use crate::rdf::{Graph, Identifier, Iri, Literal, Term, rdf};
use crate::runtime::{EvalError, Evaluator, or_default};
use crate::value::{ObjectValue, Value};

fn term_kind(term: &Term) -> &'static str {
    match term {
        Term::Identifier(Identifier::BlankNode(_)) => "blank node",
        Term::Identifier(Identifier::Iri(_)) => "IRI",
        Term::Literal(_) => "literal",
    }
}

// ————————————————————————————————————————————————————————————————————————————
// ENCODE
// ————————————————————————————————————————————————————————————————————————————

impl Evaluator<'_> {
    /// Write `object` (and anything inline in it) into `graph`. Returns the
    /// subject. `rdf:type` triples come from the chain's classes; the
    /// discriminator itself is never written.
    pub fn to_rdf(&self, object: &ObjectValue, graph: &mut Graph) -> Result<Identifier, EvalError> {
        let subject = self.identifier(object)?;
        let object_type = self.object_type(object.type_name())?;
        let rdf_type = Iri::new(rdf::TYPE);
        let chain = std::iter::once(object_type.id()).chain(object_type.ancestors(self.model).iter().copied());
        for id in chain {
            let ty = self.model.object_type(id);
            for class in ty.from_rdf_type().into_iter().chain(ty.to_rdf_types()) {
                graph.insert(subject.clone(), rdf_type.clone(), Term::Identifier(Identifier::Iri(class.clone())));
            }
        }
        self.rdf_encode_object_as(object_type, object, &subject, graph)?;
        Ok(subject)
    }

    fn rdf_encode_object_as(
        &self,
        object_type: &ObjectType,
        object: &ObjectValue,
        subject: &Identifier,
        graph: &mut Graph,
    ) -> Result<(), EvalError> {
        if let Some(parent) = object_type.parent(self.model) {
            self.rdf_encode_object_as(parent, object, subject, graph)?;
        }
        for property in object_type.rdf_fragment(self.model).properties {
            let PropertyRole::Shacl { path } = &property.role else { continue };
            for term in self.encode_terms(&property.fragment, object.get(&property.name), graph)? {
                graph.insert(subject.clone(), path.clone(), term);
            }
        }
        Ok(())
    }

    /// Objects of one property: none for an absent option, one per member
    /// of a set, otherwise exactly one.
    fn encode_terms(&self, fragment: &Fragment<RdfOp>, value: &Value, graph: &mut Graph) -> Result<Vec<Term>, EvalError> {
        match fragment {
            Fragment::Leaf { op } => Ok(vec![encode_term(op, value)?]),
            Fragment::Default { item, value: default } => self.encode_terms(item, or_default(value, default), graph),
            Fragment::Option { item } => match value {
                Value::Absent => Ok(Vec::new()),
                value => self.encode_terms(item, value, graph),
            },
            Fragment::Set { item, .. } => match value {
                Value::List(items) => {
                    let mut out = Vec::new();
                    for item_value in items {
                        out.extend(self.encode_terms(item, item_value, graph)?);
                    }
                    Ok(out)
                }
                other => Err(EvalError::mismatch("list", other.kind_name())),
            },
            Fragment::List { item } => match value {
                Value::List(items) => {
                    let mut head = Term::iri(rdf::NIL);
                    for item_value in items.iter().rev() {
                        let first = self.encode_single(item, item_value, graph)?;
                        let cell = Identifier::BlankNode(Uuid::new_v4().simple().to_string());
                        graph.insert(cell.clone(), Iri::new(rdf::FIRST), first);
                        graph.insert(cell.clone(), Iri::new(rdf::REST), head);
                        head = Term::Identifier(cell);
                    }
                    Ok(vec![head])
                }
                other => Err(EvalError::mismatch("list", other.kind_name())),
            },
            Fragment::Object { type_name } => match value {
                Value::Object(object) => Ok(vec![Term::Identifier(self.to_rdf(object, graph)?)]),
                other => Err(EvalError::mismatch(type_name.as_str(), other.kind_name())),
            },
            Fragment::Union(union) => {
                let (arm, payload) = self.select_arm(union, value)?;
                self.encode_terms(&arm.fragment, payload, graph)
            }
        }
    }

    fn encode_single(&self, fragment: &Fragment<RdfOp>, value: &Value, graph: &mut Graph) -> Result<Term, EvalError> {
        let mut terms = self.encode_terms(fragment, value, graph)?;
        match terms.len() {
            1 => Ok(terms.remove(0)),
            n => Err(EvalError::mismatch("one list item", format!("{n} terms"))),
        }
    }
}

fn encode_term(op: &RdfOp, value: &Value) -> Result<Term, EvalError> {
    Ok(match (op, value) {
        (RdfOp::Primitive { kind, datatype }, value) => {
            let lexical = kind
                .lexical(value, datatype)
                .ok_or_else(|| EvalError::mismatch(kind.type_name(), value.kind_name()))?;
            Term::Literal(Literal::typed(lexical, datatype.as_str()))
        }
        (RdfOp::Literal, Value::Literal(literal)) => Term::Literal(literal.clone()),
        (RdfOp::Identifier { .. }, Value::Identifier(identifier)) => Term::Identifier(identifier.clone()),
        (RdfOp::Native, Value::Native(json)) => Term::Literal(Literal::typed(json.to_string(), rdf::JSON)),
        (op, value) => return Err(EvalError::mismatch(format!("{op:?}"), value.kind_name())),
    })
}

// ————————————————————————————————————————————————————————————————————————————
// DECODE
// ————————————————————————————————————————————————————————————————————————————

impl Evaluator<'_> {
    /// Read an instance of `type_name` rooted at `subject`.
    ///
    /// Concrete descendants are tried deepest first, then the type itself.
    /// A candidate whose `fromRdfType` class is missing from the subject is
    /// skipped; the first candidate that decodes wins.
    pub fn from_rdf(&self, type_name: &str, graph: &Graph, subject: &Identifier) -> Result<ObjectValue, EvalError> {
        self.from_rdf_visiting(type_name, graph, subject, &mut Vec::new())
    }

    fn from_rdf_visiting(
        &self,
        type_name: &str,
        graph: &Graph,
        subject: &Identifier,
        visiting: &mut Vec<Identifier>,
    ) -> Result<ObjectValue, EvalError> {
        if visiting.contains(subject) {
            return Err(EvalError::decode(type_name, format!("{subject} contains itself")));
        }
        let target = self.object_type(type_name)?;
        let mut candidates = target.concrete_descendants(self.model);
        if !target.abstract_() {
            candidates.push(target.id());
        }

        visiting.push(subject.clone());
        let mut last_error = None;
        for id in candidates {
            let candidate = self.model.object_type(id);
            if let Some(class) = candidate.from_rdf_type() {
                if !graph.has_type(subject, class) {
                    continue;
                }
            }
            match self.rdf_decode_object(candidate, graph, subject, visiting) {
                Ok(object) => {
                    visiting.pop();
                    return Ok(object);
                }
                Err(error) => last_error = Some(error),
            }
        }
        visiting.pop();
        Err(last_error.unwrap_or_else(|| EvalError::decode(type_name, format!("no concrete type matches {subject}"))))
    }

    fn rdf_decode_object(
        &self,
        object_type: &ObjectType,
        graph: &Graph,
        subject: &Identifier,
        visiting: &mut Vec<Identifier>,
    ) -> Result<ObjectValue, EvalError> {
        let root = object_type.root(self.model);
        if !object_type.identifier_type().allows(subject) {
            return Err(EvalError::decode(object_type.name(), format!("{subject} is not an allowed identifier")));
        }
        let mut fields = IndexMap::new();
        fields.insert(root.identifier_property().name.clone(), Value::Identifier(subject.clone()));
        if let Some(discriminator) = root.discriminator_type_property() {
            fields.insert(discriminator.name.clone(), Value::string(object_type.discriminator_value()));
        }
        self.rdf_decode_object_as(object_type, graph, subject, &mut fields, visiting)?;
        Ok(ObjectValue::new(object_type.name(), fields))
    }

    fn rdf_decode_object_as(
        &self,
        object_type: &ObjectType,
        graph: &Graph,
        subject: &Identifier,
        fields: &mut IndexMap<String, Value>,
        visiting: &mut Vec<Identifier>,
    ) -> Result<(), EvalError> {
        if let Some(parent) = object_type.parent(self.model) {
            self.rdf_decode_object_as(parent, graph, subject, fields, visiting)?;
        }
        for property in object_type.rdf_fragment(self.model).properties {
            let PropertyRole::Shacl { path } = &property.role else { continue };
            let terms = graph.objects(subject, path);
            let value = self
                .decode_terms(&property.fragment, &terms, graph, visiting)
                .map_err(|error| EvalError::decode(format!("{}.{}", object_type.name(), property.name), error.to_string()))?;
            if !value.is_absent() {
                fields.insert(property.name.clone(), value);
            }
        }
        Ok(())
    }

    fn decode_terms(
        &self,
        fragment: &Fragment<RdfOp>,
        terms: &[Term],
        graph: &Graph,
        visiting: &mut Vec<Identifier>,
    ) -> Result<Value, EvalError> {
        match (fragment, terms) {
            (Fragment::Option { .. }, []) => Ok(Value::Absent),
            (Fragment::Option { item }, [term]) => self.decode_term(item, term, graph, visiting),
            (Fragment::Default { value, .. }, []) => Ok(value.clone()),
            (Fragment::Default { item, .. }, terms) => self.decode_terms(item, terms, graph, visiting),
            (Fragment::Set { item, min_count }, terms) => {
                if terms.len() < *min_count as usize {
                    return Err(EvalError::decode("set", format!("{} values, at least {min_count} required", terms.len())));
                }
                let items = terms.iter().map(|term| self.decode_term(item, term, graph, visiting));
                Ok(Value::List(items.collect::<Result<_, _>>()?))
            }
            (fragment, [term]) => self.decode_term(fragment, term, graph, visiting),
            (_, []) => Err(EvalError::decode("value", "required value is missing")),
            (_, terms) => Err(EvalError::decode("value", format!("{} values where one is allowed", terms.len()))),
        }
    }

    fn decode_term(
        &self,
        fragment: &Fragment<RdfOp>,
        term: &Term,
        graph: &Graph,
        visiting: &mut Vec<Identifier>,
    ) -> Result<Value, EvalError> {
        match fragment {
            Fragment::Leaf { op } => decode_leaf(op, term),
            Fragment::Default { item, .. } | Fragment::Option { item } => self.decode_term(item, term, graph, visiting),
            Fragment::Set { item, .. } => Ok(Value::List(vec![self.decode_term(item, term, graph, visiting)?])),
            Fragment::List { item } => {
                let mut items = Vec::new();
                let mut cursor = term.clone();
                let nil = Term::iri(rdf::NIL);
                while cursor != nil {
                    if items.len() > graph.len() {
                        return Err(EvalError::decode("list", "list does not terminate"));
                    }
                    let Term::Identifier(cell) = &cursor else {
                        return Err(EvalError::decode("list", format!("found a {}", term_kind(&cursor))));
                    };
                    let firsts = graph.objects(cell, &Iri::new(rdf::FIRST));
                    let [first] = firsts.as_slice() else {
                        return Err(EvalError::decode("list", format!("{cell} needs exactly one rdf:first")));
                    };
                    items.push(self.decode_term(item, first, graph, visiting)?);
                    let rests = graph.objects(cell, &Iri::new(rdf::REST));
                    let [rest] = rests.as_slice() else {
                        return Err(EvalError::decode("list", format!("{cell} needs exactly one rdf:rest")));
                    };
                    cursor = rest.clone();
                }
                Ok(Value::List(items))
            }
            Fragment::Object { type_name } => match term {
                Term::Identifier(identifier) => {
                    Ok(Value::from(self.from_rdf_visiting(type_name, graph, identifier, visiting)?))
                }
                Term::Literal(_) => Err(EvalError::decode(type_name.as_str(), "found a literal")),
            },
            Fragment::Union(union) => {
                let mut failures = Vec::new();
                for arm in &union.members {
                    match self.decode_term(&arm.fragment, term, graph, visiting) {
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
}

fn decode_leaf(op: &RdfOp, term: &Term) -> Result<Value, EvalError> {
    let wrong = || EvalError::decode(format!("{op:?}"), format!("found {} {term}", term_kind(term)));
    match (op, term) {
        (RdfOp::Primitive { kind, .. }, Term::Literal(literal))
            if PrimitiveKind::for_datatype(&literal.datatype) == Some(*kind) =>
        {
            kind.parse(&literal.lexical, &literal.datatype).ok_or_else(wrong)
        }
        (RdfOp::Literal, Term::Literal(literal)) => Ok(Value::Literal(literal.clone())),
        (RdfOp::Identifier { node_kinds }, Term::Identifier(identifier))
            if node_kinds.contains(&identifier.node_kind()) =>
        {
            Ok(Value::Identifier(identifier.clone()))
        }
        (RdfOp::Native, Term::Literal(literal)) if literal.datatype.as_str() == rdf::JSON => {
            serde_json::from_str(&literal.lexical).map(Value::Native).map_err(|_| wrong())
        }
        _ => Err(wrong()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AstForest;
    use crate::config::GeneratorConfig;
    use crate::model::TypeModel;
    use serde_json::json;

    fn model() -> TypeModel {
        let ast = AstForest::from_json_value(json!({
            "nodes": {
                "string": {"kind": "literal", "datatype": "http://www.w3.org/2001/XMLSchema#string"},
                "tricks": {"kind": "list", "item": "string"},
                "Pet": {
                    "kind": "object", "name": "Pet", "abstract": true,
                    "fromRdfType": "http://example.com/Pet",
                    "properties": ["Pet.name"]
                },
                "Dog": {
                    "kind": "object", "name": "Dog", "parents": ["Pet"],
                    "fromRdfType": "http://example.com/Dog",
                    "properties": ["Dog.tricks"]
                },
                "Cat": {
                    "kind": "object", "name": "Cat", "parents": ["Pet"],
                    "fromRdfType": "http://example.com/Cat"
                }
            },
            "properties": {
                "Pet.name": {"name": "name", "path": "http://example.com/name", "type": "string", "minCount": 1, "maxCount": 1},
                "Dog.tricks": {"name": "tricks", "path": "http://example.com/tricks", "type": "tricks", "maxCount": 1}
            }
        }))
        .unwrap();
        TypeModel::from_ast(&ast, &GeneratorConfig::default()).unwrap()
    }

    fn dog(evaluator: &Evaluator<'_>) -> ObjectValue {
        evaluator
            .construct(
                "Dog",
                IndexMap::from([
                    ("name".to_string(), Value::string("Rex")),
                    ("tricks".to_string(), Value::List(vec![Value::string("sit"), Value::string("roll")])),
                ]),
            )
            .unwrap()
    }

    #[test]
    fn decoding_the_parent_dispatches_on_rdf_type() {
        let model = model();
        let evaluator = Evaluator::new(&model);
        let dog = dog(&evaluator);
        let mut graph = Graph::new();
        let subject = evaluator.to_rdf(&dog, &mut graph).unwrap();

        assert!(graph.has_type(&subject, &Iri::new("http://example.com/Pet")));
        assert!(graph.has_type(&subject, &Iri::new("http://example.com/Dog")));

        let decoded = evaluator.from_rdf("Pet", &graph, &subject).unwrap();
        assert_eq!(decoded.type_name(), "Dog");
        assert!(evaluator.equals(&evaluator.object("Pet").unwrap(), &dog.into(), &decoded.into()).unwrap());
    }

    #[test]
    fn lists_become_rdf_collections() {
        let model = model();
        let evaluator = Evaluator::new(&model);
        let mut graph = Graph::new();
        let subject = evaluator.to_rdf(&dog(&evaluator), &mut graph).unwrap();

        let heads = graph.objects(&subject, &Iri::new("http://example.com/tricks"));
        let [Term::Identifier(head)] = heads.as_slice() else { panic!("expected one list head, got {heads:?}") };
        assert_eq!(graph.objects(head, &Iri::new(rdf::FIRST)), vec![Term::Literal(Literal::string("sit"))]);
        let rest = graph.objects(head, &Iri::new(rdf::REST));
        let [Term::Identifier(second)] = rest.as_slice() else { panic!("expected a second cell") };
        assert_eq!(graph.objects(second, &Iri::new(rdf::REST)), vec![Term::iri(rdf::NIL)]);
    }

    #[test]
    fn missing_required_values_and_wrong_classes_fail() {
        let model = model();
        let evaluator = Evaluator::new(&model);
        let mut graph = Graph::new();
        let subject = Identifier::BlankNode("b0".into());
        graph.insert(subject.clone(), Iri::new(rdf::TYPE), Term::iri("http://example.com/Dog"));
        assert!(matches!(evaluator.from_rdf("Dog", &graph, &subject), Err(EvalError::Decode { .. })));

        graph.insert(subject.clone(), Iri::new("http://example.com/name"), Literal::string("Tom").into());
        assert!(evaluator.from_rdf("Cat", &graph, &subject).is_err());
        assert_eq!(evaluator.from_rdf("Pet", &graph, &subject).unwrap().type_name(), "Dog");
    }
}
