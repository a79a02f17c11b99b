use std::collections::BTreeSet;

use serde_json::json;
use shape_typemodel::ast::AstForest;
use shape_typemodel::fragment::UnionDiscriminator;
use shape_typemodel::model::{Declaration, Type};
use shape_typemodel::sparql::Pattern;
use shape_typemodel::{Concern, GeneratorConfig, ModelError, TypeModel};

fn shapes() -> serde_json::Value {
    json!({
        "nodes": {
            "string": {"kind": "literal", "datatype": "http://www.w3.org/2001/XMLSchema#string"},
            "integer": {"kind": "literal", "datatype": "http://www.w3.org/2001/XMLSchema#integer"},
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
            "Puppy": {"kind": "object", "name": "Puppy", "parents": ["Dog"], "fromRdfType": "http://example.com/Puppy"},
            "Cat": {"kind": "object", "name": "Cat", "parents": ["Pet"], "fromRdfType": "http://example.com/Cat"},
            "AnyPet": {"kind": "union", "name": "AnyPet", "members": ["Dog", "Cat"]},
            "Scalar": {"kind": "union", "name": "Scalar", "members": ["string", "integer"]}
        },
        "properties": {
            "Pet.name": {"name": "name", "path": "http://example.com/name", "type": "string", "minCount": 1, "maxCount": 1},
            "Dog.tricks": {"name": "tricks", "path": "http://example.com/trick", "type": "string", "mutable": true}
        }
    })
}

fn build(input: serde_json::Value) -> Result<TypeModel, ModelError> {
    TypeModel::from_ast(&AstForest::from_json_value(input)?, &GeneratorConfig::default())
}

#[test]
fn hierarchy_is_closed_in_both_directions() {
    let model = build(shapes()).unwrap();
    let names = |ids: &[shape_typemodel::model::ObjectTypeId]| -> Vec<String> {
        ids.iter().map(|id| model.object_type(*id).name().to_string()).collect()
    };
    let pet = model.object_type_by_name("Pet").unwrap();
    let puppy = model.object_type_by_name("Puppy").unwrap();

    assert_eq!(names(pet.descendants(&model)), vec!["Dog", "Cat", "Puppy"]);
    assert_eq!(names(puppy.ancestors(&model)), vec!["Dog", "Pet"]);
    assert_eq!(puppy.root(&model).name(), "Pet");
    for descendant in pet.descendants(&model) {
        assert!(model.object_type(*descendant).is_a(pet.id(), &model));
    }
    assert_eq!(pet.discriminator(&model).unwrap().values, vec!["Dog", "Cat", "Puppy"]);
}

#[test]
fn mutability_propagates_to_descendants() {
    let model = build(shapes()).unwrap();
    let mutable = |name: &str| model.object_type_by_name(name).unwrap().mutable(&model);
    assert!(!mutable("Pet"));
    assert!(mutable("Dog"));
    assert!(mutable("Puppy"));
    assert!(!mutable("Cat"));
}

#[test]
fn unions_share_object_discriminators_and_tag_everything_else() {
    let model = build(shapes()).unwrap();

    let Some(Type::Union(pets)) = model.root("AnyPet") else { panic!("AnyPet is not a union root") };
    assert_eq!(
        pets.discriminator(&model),
        &UnionDiscriminator::Shared { property_name: "type".to_string() }
    );
    assert_eq!(pets.member_values(&model), vec![vec!["Dog", "Puppy"], vec!["Cat"]]);

    let Some(Type::Union(scalar)) = model.root("Scalar") else { panic!("Scalar is not a union root") };
    assert!(scalar.is_synthetic(&model));
    let discriminator = scalar.discriminator_property(&model);
    assert_eq!(discriminator.name, "tag");
    assert_eq!(discriminator.values, vec!["0-string", "1-number"]);
}

#[test]
fn declarations_carry_metadata_and_requested_fragments() {
    let model = build(shapes()).unwrap();

    let bare = model.declarations(&BTreeSet::new());
    let dog = bare
        .iter()
        .find_map(|declaration| match declaration {
            Declaration::Object(object) if object.name == "Dog" => Some(object),
            _ => None,
        })
        .unwrap();
    assert_eq!(dog.parent.as_deref(), Some("Pet"));
    assert!(dog.equals.is_none() && dog.sparql.is_none());
    let parameters: Vec<_> = dog.constructor.iter().map(|p| p.name.as_str()).collect();
    assert!(parameters.contains(&"name") && parameters.contains(&"tricks"));
    assert!(!parameters.contains(&"type"));

    let json = serde_json::to_value(model.declarations(&BTreeSet::from([Concern::Json]))).unwrap();
    let dog = json.as_array().unwrap().iter().find(|d| d["name"] == "Dog").unwrap();
    assert_eq!(dog["kind"], "object");
    assert_eq!(dog["json"]["parent"], "Pet");
    assert!(dog.get("hash").is_none());
}

#[test]
fn malformed_input_reports_its_path() {
    let error = AstForest::from_json_str(r#"{"nodes": {"Pet": {"kind": "object", "name": 3}}}"#).unwrap_err();
    let ModelError::Input { path, .. } = error else { panic!("expected an input error, got {error}") };
    assert!(path.starts_with("nodes"), "{path}");
}

#[test]
fn dangling_references_are_reported() {
    let mut input = shapes();
    input["nodes"]["Cat"]["properties"] = json!(["Cat.missing"]);
    let error = build(input).unwrap_err();
    assert!(matches!(error, ModelError::UnknownNode { kind: "property", .. }), "{error}");
}

#[test]
fn abstract_only_types_cannot_be_dispatched_on() {
    let mut input = shapes();
    input["nodes"]["Ghost"] = json!({"kind": "object", "name": "Ghost", "abstract": true});
    input["nodes"]["Haunt"] = json!({"kind": "union", "name": "Haunt", "members": ["Cat", "Ghost"]});
    let error = build(input).unwrap_err();
    assert!(matches!(error, ModelError::Configuration { ref subject, .. } if subject == "Ghost"), "{error}");

    let mut input = shapes();
    input["nodes"]["Ghost"] = json!({"kind": "object", "name": "Ghost", "abstract": true});
    input["nodes"]["Cat"]["properties"] = json!(["Cat.haunts"]);
    input["properties"]["Cat.haunts"] =
        json!({"name": "haunts", "path": "http://example.com/haunts", "type": "Ghost", "inline": true});
    assert!(matches!(build(input), Err(ModelError::Configuration { .. })));
}

#[test]
fn query_fragments_follow_the_property_chain() {
    let model = build(shapes()).unwrap();
    let dog = model.object_type_by_name("Dog").unwrap();
    let query = dog.sparql_fragment(&model, "subject", &mut Vec::new()).to_construct_query();
    let rdf_type = "<http://www.w3.org/1999/02/22-rdf-syntax-ns#type>";
    let expected = format!(
        "CONSTRUCT {{
  ?subject {rdf_type} <http://example.com/Dog> .
  ?subject <http://example.com/name> ?subjectName .
  ?subject <http://example.com/trick> ?subjectTricks .
}} WHERE {{
  ?subject {rdf_type} <http://example.com/Dog> .
  ?subject <http://example.com/name> ?subjectName .
  OPTIONAL {{
    ?subject <http://example.com/trick> ?subjectTricks .
  }}
}}"
    );
    assert_eq!(query, expected);
}

#[test]
fn union_query_branches_collapse_when_identical() {
    let model = build(shapes()).unwrap();

    let Some(Type::Union(pets)) = model.root("AnyPet") else { panic!("AnyPet is not a union root") };
    let fragment = pets.sparql_fragment(&model, "pet", &mut Vec::new());
    let [Pattern::Union(branches)] = fragment.where_patterns.as_slice() else {
        panic!("expected one UNION, got {:?}", fragment.where_patterns)
    };
    assert_eq!(branches.len(), 2);
    assert!(fragment.to_construct_query().contains("  UNION\n"));

    let Some(Type::Union(scalar)) = model.root("Scalar") else { panic!("Scalar is not a union root") };
    assert!(scalar.sparql_fragment(&model, "value", &mut Vec::new()).is_empty());
}
