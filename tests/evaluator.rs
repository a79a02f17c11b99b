use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;
use proptest::prelude::*;
use serde_json::json;
use shape_typemodel::ast::AstForest;
use shape_typemodel::model::Type;
use shape_typemodel::rdf::{Graph, Identifier};
use shape_typemodel::value::{ObjectValue, Value};
use shape_typemodel::{EvalError, Evaluator, GeneratorConfig, TypeModel};

fn model() -> TypeModel {
    let ast = AstForest::from_json_value(json!({
        "nodes": {
            "string": {"kind": "literal", "datatype": "http://www.w3.org/2001/XMLSchema#string"},
            "token": {"kind": "literal", "datatype": "http://www.w3.org/2001/XMLSchema#token"},
            "integer": {"kind": "literal", "datatype": "http://www.w3.org/2001/XMLSchema#integer"},
            "date": {"kind": "literal", "datatype": "http://www.w3.org/2001/XMLSchema#date"},
            "Note": {
                "kind": "object", "name": "Note",
                "properties": ["Note.text", "Note.count", "Note.tags", "Note.written"]
            },
            "Quote": {
                "kind": "object", "name": "Quote",
                "identifierNodeKinds": ["iri"],
                "identifierMintingStrategy": "contentHash",
                "identifierPrefix": "urn:quote:",
                "properties": ["Quote.text"]
            },
            "Pet": {
                "kind": "object", "name": "Pet", "abstract": true,
                "identifierNodeKinds": ["iri"],
                "identifierMintingStrategy": "contentHash",
                "identifierPrefix": "urn:pet:",
                "properties": ["Pet.name"]
            },
            "Dog": {"kind": "object", "name": "Dog", "parents": ["Pet"]},
            "Cat": {"kind": "object", "name": "Cat", "parents": ["Pet"]},
            "AnyPet": {"kind": "union", "name": "AnyPet", "members": ["Dog", "Cat"]},
            "Fox": {"kind": "object", "name": "Fox", "properties": ["Fox.den"]},
            "Owl": {"kind": "object", "name": "Owl", "properties": ["Owl.perch"]},
            "Wild": {"kind": "union", "name": "Wild", "members": ["Fox", "Owl"]},
            "Word": {"kind": "union", "name": "Word", "members": ["string", "token"]}
        },
        "properties": {
            "Note.text": {"name": "text", "path": "http://example.com/text", "type": "string", "minCount": 1, "maxCount": 1},
            "Note.count": {"name": "count", "path": "http://example.com/count", "type": "integer", "maxCount": 1},
            "Note.tags": {"name": "tags", "path": "http://example.com/tag", "type": "string"},
            "Note.written": {"name": "written", "path": "http://example.com/written", "type": "date", "maxCount": 1},
            "Quote.text": {"name": "text", "path": "http://example.com/text", "type": "string", "minCount": 1, "maxCount": 1},
            "Fox.den": {"name": "den", "path": "http://example.com/den", "type": "string", "minCount": 1, "maxCount": 1},
            "Owl.perch": {"name": "perch", "path": "http://example.com/perch", "type": "string", "minCount": 1, "maxCount": 1},
            "Pet.name": {"name": "name", "path": "http://example.com/name", "type": "string", "minCount": 1, "maxCount": 1}
        }
    }))
    .unwrap();
    TypeModel::from_ast(&ast, &GeneratorConfig::default()).unwrap()
}

fn params(entries: &[(&str, Value)]) -> IndexMap<String, Value> {
    entries.iter().map(|(name, value)| (name.to_string(), value.clone())).collect()
}

#[test]
fn immutable_identifiers_are_minted_once() {
    let model = model();
    let evaluator = Evaluator::new(&model);

    let note = evaluator.construct("Note", params(&[("text", Value::string("hi"))])).unwrap();
    let first = evaluator.identifier(&note).unwrap();
    assert!(matches!(first, Identifier::BlankNode(_)));
    assert_eq!(evaluator.identifier(&note).unwrap(), first);

    let a = evaluator.construct("Quote", params(&[("text", Value::string("to be"))])).unwrap();
    let b = evaluator.construct("Quote", params(&[("text", Value::string("to be"))])).unwrap();
    let c = evaluator.construct("Quote", params(&[("text", Value::string("not to be"))])).unwrap();
    let id = evaluator.identifier(&a).unwrap();
    assert!(id.to_json_string().starts_with("urn:quote:"));
    assert_eq!(id, evaluator.identifier(&b).unwrap());
    assert_ne!(id, evaluator.identifier(&c).unwrap());
}

#[test]
fn supplied_identifiers_win_over_minting() {
    let model = model();
    let evaluator = Evaluator::new(&model);
    let quote = evaluator
        .construct(
            "Quote",
            params(&[
                ("identifier", Value::string("http://example.com/q1")),
                ("text", Value::string("to be")),
            ]),
        )
        .unwrap();
    assert_eq!(evaluator.identifier(&quote).unwrap(), Identifier::parse("http://example.com/q1"));
}

#[test]
fn earlier_union_members_win_on_decode() {
    let model = model();
    let evaluator = Evaluator::new(&model);
    let word = model.root("Word").unwrap().clone();

    let decoded = evaluator.from_json(&word, &json!("hello")).unwrap();
    assert_eq!(decoded, Value::Tagged { tag: "0-string".into(), value: Box::new(Value::string("hello")) });

    let tagged = Value::Tagged { tag: "1-string".into(), value: Box::new(Value::string("hello")) };
    assert_eq!(evaluator.to_json(&word, &tagged).unwrap(), json!("hello"));
    assert!(evaluator.from_json(&word, &json!(3)).is_err());
}

#[test]
fn shared_discriminator_dispatches_without_an_envelope() {
    let model = model();
    let evaluator = Evaluator::new(&model);
    let any_pet = model.root("AnyPet").unwrap().clone();

    let dog = evaluator.construct("Dog", params(&[("name", Value::string("Rex"))])).unwrap();
    let encoded = evaluator.to_json(&any_pet, &dog.into()).unwrap();
    assert_eq!(encoded["type"], "Dog");
    assert_eq!(encoded["name"], "Rex");

    let decoded = evaluator.from_json(&any_pet, &encoded).unwrap();
    assert_eq!(decoded.as_object().map(ObjectValue::type_name), Some("Dog"));

    let pet = evaluator.object("Pet").unwrap();
    let cat = evaluator.from_json(&pet, &json!({"type": "Cat", "name": "Tom"})).unwrap();
    assert_eq!(cat.as_object().map(ObjectValue::type_name), Some("Cat"));
    assert!(matches!(
        evaluator.from_json(&pet, &json!({"type": "Pet", "name": "Nobody"})),
        Err(EvalError::Decode { .. })
    ));
}

#[test]
fn unrelated_members_share_a_discriminator_field() {
    let model = model();
    let evaluator = Evaluator::new(&model);
    let Some(Type::Union(wild)) = model.root("Wild") else { panic!("Wild is not a union root") };
    assert!(!wild.is_synthetic(&model));
    assert_eq!(wild.member_values(&model), vec![vec!["Fox"], vec!["Owl"]]);
    let wild = Type::Union(wild.clone());

    let owl = evaluator.construct("Owl", params(&[("perch", Value::string("oak"))])).unwrap();
    let encoded = evaluator.to_json(&wild, &owl.into()).unwrap();
    assert_eq!(encoded["type"], "Owl");
    assert_eq!(encoded["perch"], "oak");
    assert!(encoded.get("tag").is_none() && encoded.get("value").is_none());

    let decoded = evaluator.from_json(&wild, &encoded).unwrap();
    assert_eq!(decoded.as_object().map(ObjectValue::type_name), Some("Owl"));
    let fox = evaluator.from_json(&wild, &json!({"type": "Fox", "den": "hill"})).unwrap();
    assert_eq!(fox.as_object().map(ObjectValue::type_name), Some("Fox"));
}

#[test]
fn subtypes_mint_with_the_root_strategy() {
    let model = model();
    let evaluator = Evaluator::new(&model);
    let rex = || evaluator.construct("Dog", params(&[("name", Value::string("Rex"))])).unwrap();
    let id = evaluator.identifier(&rex()).unwrap();
    assert!(id.to_json_string().starts_with("urn:pet:"), "{id}");
    assert_eq!(id, evaluator.identifier(&rex()).unwrap());
}

#[test]
fn date_fields_keep_only_the_calendar_date() {
    let model = model();
    let evaluator = Evaluator::new(&model);
    let afternoon = DateTime::parse_from_rfc3339("2024-02-29T13:45:00+02:00").unwrap();
    let note = evaluator
        .construct("Note", params(&[("text", Value::string("leap")), ("written", Value::DateTime(afternoon))]))
        .unwrap();
    let midnight = DateTime::parse_from_rfc3339("2024-02-29T00:00:00Z").unwrap();
    assert_eq!(note.get("written"), &Value::DateTime(midnight));
}

#[test]
fn abstract_types_cannot_be_constructed() {
    let model = model();
    let evaluator = Evaluator::new(&model);
    assert!(matches!(
        evaluator.construct("Pet", params(&[("name", Value::string("Rex"))])),
        Err(EvalError::AbstractType(_))
    ));
}

fn round_trip(evaluator: &Evaluator<'_>, note_type: &Type, note: Value) -> Result<(), TestCaseError> {
    let json = evaluator.to_json(note_type, &note).unwrap();
    let from_json = evaluator.from_json(note_type, &json).unwrap();
    prop_assert!(evaluator.equals(note_type, &note, &from_json).unwrap());
    prop_assert_eq!(evaluator.hash(note_type, &note).unwrap(), evaluator.hash(note_type, &from_json).unwrap());
    prop_assert_eq!(evaluator.to_json(note_type, &from_json).unwrap(), json);

    let object = note.as_object().unwrap();
    let mut graph = Graph::new();
    let subject = evaluator.to_rdf(object, &mut graph).unwrap();
    let from_graph: Value = evaluator.from_rdf("Note", &graph, &subject).unwrap().into();
    prop_assert!(evaluator.equals(note_type, &note, &from_graph).unwrap());
    Ok(())
}

fn date_time() -> impl Strategy<Value = DateTime<FixedOffset>> {
    (-2_000_000_000i64..4_000_000_000, -720i32..=840).prop_filter_map("out of range", |(seconds, minutes)| {
        let offset = FixedOffset::east_opt(minutes * 60)?;
        Some(DateTime::from_timestamp(seconds, 0)?.with_timezone(&offset))
    })
}

proptest! {
    #[test]
    fn notes_survive_json_and_graph(
        text in "\\PC{0,16}",
        count in proptest::option::of(-1000i32..1000),
        tags in proptest::collection::btree_set("[a-z]{1,8}", 0..4),
        written in proptest::option::of(date_time()),
    ) {
        let model = model();
        let evaluator = Evaluator::new(&model);
        let note_type = evaluator.object("Note").unwrap();

        let mut entries = vec![
            ("text", Value::string(text)),
            ("tags", Value::List(tags.into_iter().map(Value::string).collect())),
        ];
        if let Some(count) = count {
            entries.push(("count", Value::number(f64::from(count))));
        }
        if let Some(written) = written {
            entries.push(("written", Value::DateTime(written)));
        }
        let note = evaluator.construct("Note", params(&entries)).unwrap();
        round_trip(&evaluator, &note_type, note.into())?;
    }

    #[test]
    fn fractional_counts_are_rejected(whole in -1000i32..1000, fraction in 0.01f64..0.99) {
        let model = model();
        let evaluator = Evaluator::new(&model);
        let count = Value::number(f64::from(whole) + fraction);
        let result = evaluator.construct("Note", params(&[("text", Value::string("x")), ("count", count)]));
        prop_assert!(matches!(result, Err(EvalError::Mismatch { .. })), "{result:?}");
    }
}
