//! Builds a [`TypeModel`] from an [`AstForest`].
//!
//! Object types and properties are memoized by AST identifier. An object's
//! arena slot is reserved before anything it references is built, so cycles
//! through inline properties and parents resolve to the same instance.
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use once_cell::unsync::OnceCell;

use crate::ast::{AstForest, AstId, AstNode, AstObjectType, AstProperty, MintingStrategy};
use crate::config::GeneratorConfig;
use crate::error::ModelError;
use crate::model::{
    IdentifierDeclaration, IdentifierProperty, IdentifierType, ListType, LiteralType, NativeType,
    ObjectType, ObjectTypeId, OptionType, Property, SetType, ShaclProperty, Type,
    TypeDiscriminatorProperty, TypeModel, UnionType,
};
use crate::rdf::NodeKind;

const UUID_IRI_PREFIX: &str = "urn:uuid:";

pub struct TypeFactory<'a> {
    ast: &'a AstForest,
    config: &'a GeneratorConfig,
    object_ids: HashMap<AstId, ObjectTypeId>,
    slots: Vec<Option<ObjectType>>,
    properties: HashMap<AstId, Rc<ShaclProperty>>,
    /// Non-object nodes currently being built; revisiting one means the
    /// schema describes an infinitely nested value.
    in_progress: Vec<AstId>,
}

/// Compile `ast` in one pass.
pub fn build(ast: &AstForest, config: &GeneratorConfig) -> Result<TypeModel, ModelError> {
    TypeFactory::new(ast, config).build()
}

impl<'a> TypeFactory<'a> {
    pub fn new(ast: &'a AstForest, config: &'a GeneratorConfig) -> Self {
        Self {
            ast,
            config,
            object_ids: HashMap::new(),
            slots: Vec::new(),
            properties: HashMap::new(),
            in_progress: Vec::new(),
        }
    }

    pub fn build(mut self) -> Result<TypeModel, ModelError> {
        let mut roots = Vec::new();
        for id in self.ast.root_ids() {
            roots.push(self.create_type_from_ast_type(&id)?);
        }
        let object_types = self
            .slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.ok_or_else(|| ModelError::configuration(format!("#{index}"), "object type was never completed"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(object_types = object_types.len(), roots = roots.len(), "built type model");
        TypeModel::new(self.config.clone(), object_types, roots)
    }

    pub fn create_type_from_ast_type(&mut self, id: &str) -> Result<Type, ModelError> {
        let ast = self.ast;
        let node = ast.node(id)?;
        if let AstNode::Object(object) = node {
            if object.list_item.is_none() {
                return Ok(Type::Object(self.create_object_type(id)?));
            }
        }

        if self.in_progress.iter().any(|pending| pending == id) {
            return Err(ModelError::configuration(id, "type contains itself without an object in between"));
        }
        self.in_progress.push(id.to_string());
        let created = self.create_value_type(id, node);
        self.in_progress.pop();
        created
    }

    fn create_value_type(&mut self, id: &str, node: &AstNode) -> Result<Type, ModelError> {
        Ok(match node {
            AstNode::Identifier(ast) => Type::Identifier(IdentifierType::from_ast(ast)),
            AstNode::Literal(ast) => Type::Literal(LiteralType::from_ast(id, ast)),
            AstNode::Native(ast) => Type::Native(NativeType { name: ast.name.clone() }),
            AstNode::Object(object) => {
                let Some(item) = &object.list_item else {
                    return Ok(Type::Object(self.create_object_type(id)?));
                };
                Type::List(ListType {
                    name: Some(object.name.clone()),
                    item: Box::new(self.create_type_from_ast_type(item)?),
                    mutable: false,
                })
            }
            AstNode::Union(composite) => {
                let members = composite
                    .members
                    .iter()
                    .map(|member| self.create_type_from_ast_type(member))
                    .collect::<Result<Vec<_>, _>>()?;
                Type::Union(Box::new(UnionType::new(composite.name.clone(), members)))
            }
            AstNode::Intersection(composite) => {
                return Err(ModelError::configuration(
                    composite.name.as_deref().unwrap_or(id),
                    "intersection types are not supported",
                ));
            }
            AstNode::List(list) => Type::List(ListType {
                name: list.name.clone(),
                item: Box::new(self.create_type_from_ast_type(&list.item)?),
                mutable: list.mutable,
            }),
            AstNode::Option(option) => Type::Option(OptionType {
                item: Box::new(self.create_type_from_ast_type(&option.item)?),
            }),
            AstNode::Set(set) => Type::Set(SetType {
                item: Box::new(self.create_type_from_ast_type(&set.item)?),
                min_count: set.min_count,
            }),
        })
    }

    // ---- Properties ---- //

    fn create_property(&mut self, id: &str) -> Result<Rc<ShaclProperty>, ModelError> {
        if let Some(existing) = self.properties.get(id) {
            tracing::trace!(property = id, "property cache hit");
            return Ok(Rc::clone(existing));
        }
        let ast = self.ast.property(id)?;
        let value_type = self.reference_type(&ast.value_type, ast.inline)?;
        let property = Rc::new(ShaclProperty {
            name: ast.name.clone(),
            path: ast.path.clone(),
            type_: wrap_cardinality(value_type, ast),
            visibility: ast.visibility,
            mutable: ast.mutable,
            comment: ast.comment.clone(),
        });
        self.properties.insert(id.to_string(), Rc::clone(&property));
        Ok(property)
    }

    /// A non-inline reference to an object (or a union of objects) carries
    /// only the object's identifier.
    fn reference_type(&mut self, id: &str, inline: bool) -> Result<Type, ModelError> {
        if inline {
            return self.create_type_from_ast_type(id);
        }
        let ast = self.ast;
        match ast.node(id)? {
            AstNode::Object(object) if object.list_item.is_none() => {
                Ok(Type::Identifier(IdentifierType::new(self.root_node_kinds(id, object)?)))
            }
            AstNode::Union(composite) if !composite.members.is_empty() => {
                let mut node_kinds = BTreeSet::new();
                for member in &composite.members {
                    match ast.node(member)? {
                        AstNode::Object(object) if object.list_item.is_none() => {
                            node_kinds.extend(self.root_node_kinds(member, object)?);
                        }
                        _ => return self.create_type_from_ast_type(id),
                    }
                }
                Ok(Type::Identifier(IdentifierType::new(node_kinds)))
            }
            AstNode::Option(option) => Ok(Type::Option(OptionType {
                item: Box::new(self.reference_type(&option.item, false)?),
            })),
            AstNode::Set(set) => Ok(Type::Set(SetType {
                item: Box::new(self.reference_type(&set.item, false)?),
                min_count: set.min_count,
            })),
            _ => self.create_type_from_ast_type(id),
        }
    }

    // ---- Object types ---- //

    fn create_object_type(&mut self, id: &str) -> Result<ObjectTypeId, ModelError> {
        if let Some(existing) = self.object_ids.get(id) {
            tracing::trace!(object_type = id, "object type cache hit");
            return Ok(*existing);
        }
        let ast = self.ast;
        let object = ast.object(id)?;
        let object_id = ObjectTypeId(self.slots.len());
        self.slots.push(None);
        self.object_ids.insert(id.to_string(), object_id);

        let ancestors = ast.ancestors(id)?;
        let descendants = ast.descendants(id);
        let parent = match ancestors.first() {
            Some(parent) => Some(self.create_object_type(parent)?),
            None => None,
        };

        let identifier_type = IdentifierType::new(self.root_node_kinds(id, object)?);
        let identifier_property = Rc::new(self.identifier_property(object, &ancestors, &descendants, &identifier_type)?);
        let discriminator_property = self.discriminator_property(object, &ancestors, &descendants)?.map(Rc::new);

        let mut properties = vec![Property::Identifier(Rc::clone(&identifier_property))];
        if let Some(discriminator) = &discriminator_property {
            properties.push(Property::TypeDiscriminator(Rc::clone(discriminator)));
        }
        for property_id in &object.properties {
            properties.push(Property::Shacl(self.create_property(property_id)?));
        }
        properties.sort_by(|a, b| a.name().cmp(b.name()));
        if let Some(pair) = properties.windows(2).find(|pair| pair[0].name() == pair[1].name()) {
            return Err(ModelError::configuration(
                &object.name,
                format!("more than one property named `{}`", pair[0].name()),
            ));
        }

        self.slots[object_id.0] = Some(ObjectType {
            id: object_id,
            name: object.name.clone(),
            comment: object.comment.clone(),
            abstract_: object.abstract_,
            export: object.export,
            extern_: object.extern_,
            declaration_type: object.declaration_type.unwrap_or(self.config.declaration_type),
            parent,
            properties,
            identifier_property,
            identifier_type,
            discriminator_property,
            discriminator_value: object.discriminator_value().to_string(),
            from_rdf_type: object.from_rdf_type.clone(),
            to_rdf_types: object.to_rdf_types.clone(),
            features: object.features.clone().unwrap_or_else(|| self.config.features.clone()),
            ancestors: OnceCell::new(),
            children: OnceCell::new(),
            descendants: OnceCell::new(),
            mutable: OnceCell::new(),
        });

        // Subtypes take part in polymorphic dispatch even when nothing
        // references them directly.
        for descendant in &descendants {
            self.create_object_type(descendant)?;
        }
        Ok(object_id)
    }

    /// The hierarchy root decides which node kinds identify instances.
    fn root_node_kinds(&self, id: &str, object: &AstObjectType) -> Result<BTreeSet<NodeKind>, ModelError> {
        match self.ast.ancestors(id)?.last() {
            Some(root) => Ok(self.ast.object(root)?.identifier_node_kinds.clone()),
            None => Ok(object.identifier_node_kinds.clone()),
        }
    }

    /// First `Some` along self then ancestors, nearest first.
    fn inherited<T>(
        &self,
        object: &AstObjectType,
        ancestors: &[AstId],
        pick: impl Fn(&AstObjectType) -> Option<T>,
    ) -> Result<Option<T>, ModelError> {
        if let Some(found) = pick(object) {
            return Ok(Some(found));
        }
        for ancestor in ancestors {
            if let Some(found) = pick(self.ast.object(ancestor)?) {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    fn any_concrete(&self, ids: &[AstId]) -> Result<bool, ModelError> {
        for id in ids {
            if !self.ast.object(id)?.abstract_ {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn identifier_property(
        &self,
        object: &AstObjectType,
        ancestors: &[AstId],
        descendants: &[AstId],
        identifier_type: &IdentifierType,
    ) -> Result<IdentifierProperty, ModelError> {
        // The hierarchy root owns the identifier. Subtypes may restate its
        // settings but not change them.
        let root = match ancestors.last() {
            Some(root) => self.ast.object(root)?,
            None => object,
        };
        let node_kinds = identifier_type.node_kinds();
        let minting_strategy = match root.identifier_minting_strategy {
            Some(strategy) => strategy,
            None if node_kinds.contains(&NodeKind::BlankNode) => MintingStrategy::Random,
            None => MintingStrategy::ExternallySupplied,
        };
        let required = match minting_strategy {
            MintingStrategy::Random => Some(NodeKind::BlankNode),
            MintingStrategy::ContentHash | MintingStrategy::SequentialRandom => Some(NodeKind::Iri),
            MintingStrategy::ExternallySupplied => None,
        };
        if let Some(required) = required {
            if !node_kinds.contains(&required) {
                return Err(ModelError::configuration(
                    &object.name,
                    format!("{minting_strategy:?} minting needs {required:?} identifiers, which the type does not allow"),
                ));
            }
        }
        let name = root
            .identifier_property_name
            .clone()
            .unwrap_or_else(|| self.config.identifier_property_name.clone());

        let mut subtypes = Vec::new();
        if let Some((_, between)) = ancestors.split_last() {
            subtypes.push(object);
            for ancestor in between {
                subtypes.push(self.ast.object(ancestor)?);
            }
        }
        for subtype in subtypes {
            let conflict = if subtype.identifier_minting_strategy.is_some_and(|s| s != minting_strategy) {
                Some("identifierMintingStrategy")
            } else if subtype.identifier_prefix.is_some() && subtype.identifier_prefix != root.identifier_prefix {
                Some("identifierPrefix")
            } else if subtype.identifier_property_name.as_ref().is_some_and(|n| *n != name) {
                Some("identifierPropertyName")
            } else {
                None
            };
            if let Some(setting) = conflict {
                return Err(ModelError::configuration(
                    &object.name,
                    format!("{setting} of `{}` differs from hierarchy root `{}`", subtype.name, root.name),
                ));
            }
        }

        let mint_prefix = match minting_strategy {
            MintingStrategy::ContentHash => root
                .identifier_prefix
                .clone()
                .unwrap_or_else(|| self.config.content_hash_iri_prefix.clone()),
            MintingStrategy::SequentialRandom => {
                root.identifier_prefix.clone().unwrap_or_else(|| UUID_IRI_PREFIX.to_string())
            }
            MintingStrategy::Random | MintingStrategy::ExternallySupplied => String::new(),
        };

        let declaration = if object.abstract_ {
            IdentifierDeclaration::Abstract
        } else if self.any_concrete(ancestors)? {
            IdentifierDeclaration::Inherited
        } else if self.any_concrete(descendants)? {
            IdentifierDeclaration::Protected
        } else {
            IdentifierDeclaration::Private
        };

        Ok(IdentifierProperty {
            name,
            type_: Type::Identifier(identifier_type.clone()),
            declaration,
            minting_strategy,
            mint_prefix,
        })
    }

    /// Only types that can have instances, directly or through a subtype,
    /// get a discriminator.
    fn discriminator_property(
        &self,
        object: &AstObjectType,
        ancestors: &[AstId],
        descendants: &[AstId],
    ) -> Result<Option<TypeDiscriminatorProperty>, ModelError> {
        let mut values = Vec::new();
        if !object.abstract_ {
            values.push(object.discriminator_value().to_string());
        }
        for descendant in descendants {
            let descendant = self.ast.object(descendant)?;
            if !descendant.abstract_ {
                values.push(descendant.discriminator_value().to_string());
            }
        }
        if values.is_empty() {
            return Ok(None);
        }
        let name = self
            .inherited(object, ancestors, |o| o.discriminator_property_name.clone())?
            .unwrap_or_else(|| self.config.discriminator_property_name.clone());
        let value = (!object.abstract_).then(|| object.discriminator_value().to_string());
        Ok(Some(TypeDiscriminatorProperty::new(name, value, values)))
    }
}

/// `[1,1]` is the bare value, `[0,1]` an option unless a default fills the
/// gap, anything else a set. Explicit wrapper nodes are left alone.
fn wrap_cardinality(value_type: Type, ast: &AstProperty) -> Type {
    if matches!(value_type, Type::Option(_) | Type::Set(_)) {
        return value_type;
    }
    match (ast.min_count, ast.max_count) {
        (min, Some(1)) if min >= 1 => value_type,
        (_, Some(1)) if value_type.has_default() => value_type,
        (_, Some(1)) => Type::Option(OptionType { item: Box::new(value_type) }),
        (min, _) => Type::Set(SetType { item: Box::new(value_type), min_count: min }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PrimitiveKind;
    use serde_json::json;

    fn pets() -> serde_json::Value {
        json!({
            "nodes": {
                "string": {"kind": "literal", "datatype": "http://www.w3.org/2001/XMLSchema#string"},
                "Pet": {"kind": "object", "name": "Pet", "abstract": true, "properties": ["Pet.name"]},
                "Dog": {"kind": "object", "name": "Dog", "parents": ["Pet"], "properties": ["Dog.owner"]},
                "Cat": {"kind": "object", "name": "Cat", "parents": ["Pet"]},
                "Person": {"kind": "object", "name": "Person", "identifierNodeKinds": ["iri"]}
            },
            "properties": {
                "Pet.name": {"name": "name", "path": "http://example.com/name", "type": "string", "minCount": 1, "maxCount": 1},
                "Dog.owner": {"name": "owner", "path": "http://example.com/owner", "type": "Person", "maxCount": 1}
            }
        })
    }

    fn model(input: serde_json::Value) -> Result<TypeModel, ModelError> {
        build(&AstForest::from_json_value(input)?, &GeneratorConfig::default())
    }

    #[test]
    fn discriminator_values_close_over_hierarchy() {
        let model = model(pets()).unwrap();
        let pet = model.object_type_by_name("Pet").unwrap();
        let discriminator = pet.discriminator(&model).unwrap();
        assert_eq!(discriminator.name, "type");
        assert_eq!(discriminator.values, vec!["Dog".to_string(), "Cat".to_string()]);
        let dog = model.object_type_by_name("Dog").unwrap();
        assert_eq!(dog.discriminator(&model).unwrap().values, vec!["Dog".to_string()]);
    }

    #[test]
    fn identifier_declarations_follow_hierarchy() {
        let model = model(pets()).unwrap();
        let declaration = |name: &str| model.object_type_by_name(name).unwrap().identifier_property().declaration();
        assert_eq!(declaration("Pet"), IdentifierDeclaration::Abstract);
        assert_eq!(declaration("Dog"), IdentifierDeclaration::Private);
        assert_eq!(declaration("Person"), IdentifierDeclaration::Private);
    }

    #[test]
    fn references_become_identifiers_and_cardinality_wraps() {
        let model = model(pets()).unwrap();
        let dog = model.object_type_by_name("Dog").unwrap();
        let owner = dog.properties().iter().find(|p| p.name() == "owner").unwrap();
        let Type::Option(option) = owner.type_() else { panic!("expected option, got {:?}", owner.type_()) };
        let Type::Identifier(identifier) = option.item() else { panic!("expected identifier") };
        assert_eq!(identifier.name(), "NamedNode");

        let pet = model.object_type_by_name("Pet").unwrap();
        let name = pet.properties().iter().find(|p| p.name() == "name").unwrap();
        let Type::Literal(literal) = name.type_() else { panic!("expected literal") };
        assert_eq!(literal.primitive_kind(), Some(PrimitiveKind::String));
    }

    #[test]
    fn subtypes_own_only_declared_properties() {
        let model = model(pets()).unwrap();
        let dog = model.object_type_by_name("Dog").unwrap();
        let own: Vec<_> = dog.own_properties().iter().map(|p| p.name().to_string()).collect();
        assert_eq!(own, vec!["owner".to_string()]);
        let pet = model.object_type_by_name("Pet").unwrap();
        let own: Vec<_> = pet.own_properties().iter().map(|p| p.name().to_string()).collect();
        assert_eq!(own, vec!["identifier".to_string(), "name".to_string(), "type".to_string()]);
    }

    #[test]
    fn multiple_parents_rejected() {
        let mut input = pets();
        input["nodes"]["Dog"]["parents"] = json!(["Pet", "Person"]);
        let error = model(input).unwrap_err();
        assert!(matches!(error, ModelError::Configuration { ref subject, .. } if subject == "Dog"), "{error}");
    }

    #[test]
    fn duplicate_property_names_rejected() {
        let mut input = pets();
        input["properties"]["Cat.name"] =
            json!({"name": "name", "path": "http://example.com/other", "type": "string"});
        input["properties"]["Cat.name2"] =
            json!({"name": "name", "path": "http://example.com/other2", "type": "string"});
        input["nodes"]["Cat"]["properties"] = json!(["Cat.name", "Cat.name2"]);
        let error = model(input).unwrap_err();
        assert!(error.to_string().contains("more than one property named `name`"), "{error}");
    }

    #[test]
    fn intersection_rejected() {
        let mut input = pets();
        input["nodes"]["Both"] = json!({"kind": "intersection", "name": "Both", "members": ["Dog", "Cat"]});
        input["roots"] = json!(["Both"]);
        assert!(matches!(model(input), Err(ModelError::Configuration { .. })));
    }

    #[test]
    fn minting_strategy_must_fit_node_kinds() {
        let mut input = pets();
        input["nodes"]["Person"]["identifierMintingStrategy"] = json!("blankNode");
        let error = model(input).unwrap_err();
        assert!(error.to_string().contains("Person"), "{error}");
    }

    #[test]
    fn subtypes_cannot_change_the_root_identifier() {
        let mut input = pets();
        input["nodes"]["Dog"]["identifierMintingStrategy"] = json!("contentHash");
        let error = model(input).unwrap_err();
        assert!(matches!(error, ModelError::Configuration { ref subject, .. } if subject == "Dog"), "{error}");

        let mut input = pets();
        input["nodes"]["Cat"]["identifierPrefix"] = json!("urn:cat:");
        assert!(matches!(model(input), Err(ModelError::Configuration { .. })));

        let mut input = pets();
        input["nodes"]["Pet"]["identifierNodeKinds"] = json!(["iri"]);
        input["nodes"]["Pet"]["identifierMintingStrategy"] = json!("contentHash");
        input["nodes"]["Dog"]["identifierMintingStrategy"] = json!("contentHash");
        let model = model(input).unwrap();
        let cat = model.object_type_by_name("Cat").unwrap().identifier_property();
        assert_eq!(cat.minting_strategy(), MintingStrategy::ContentHash);
        assert_eq!(cat.mint_prefix(), GeneratorConfig::default().content_hash_iri_prefix);
    }

    #[test]
    fn dangling_reference_reported() {
        let mut input = pets();
        input["nodes"]["Cat"]["properties"] = json!(["Cat.missing"]);
        assert!(matches!(model(input), Err(ModelError::UnknownNode { kind: "property", .. })));
    }

    #[test]
    fn cyclic_inline_references_share_one_instance() {
        let input = json!({
            "nodes": {
                "Node": {"kind": "object", "name": "Node", "properties": ["Node.next"]}
            },
            "properties": {
                "Node.next": {"name": "next", "path": "http://example.com/next", "type": "Node", "inline": true, "maxCount": 1}
            }
        });
        let model = model(input).unwrap();
        assert_eq!(model.object_types().len(), 1);
        let node = model.object_type_by_name("Node").unwrap();
        let next = node.properties().iter().find(|p| p.name() == "next").unwrap();
        let Type::Option(option) = next.type_() else { panic!("expected option") };
        assert!(matches!(option.item(), Type::Object(id) if *id == node.id()));
    }
}
