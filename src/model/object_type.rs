//! Object types: single-inheritance classes and interfaces.
//!
//! The hierarchy is stored as parent pointers only. Ancestors, children,
//! descendants and mutability are derived on first access.
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::rc::Rc;

use once_cell::unsync::OnceCell;
use serde::Serialize;

use crate::config::{Concern, DeclarationType};
use crate::error::ModelError;
use crate::fragment::{Conversion, EqualsOp, HashOp, JsonOp, ObjectFragment, PropertyFragment, RdfOp};
use crate::model::property::PropertyDeclaration;
use crate::model::{
    DiscriminatorProperty, IdentifierProperty, IdentifierType, Import, ObjectTypeId, Property,
    TypeDiscriminatorProperty, TypeModel,
};
use crate::ast::MintingStrategy;
use crate::rdf::{Iri, NodeKind};
use crate::sparql::{Pattern, SparqlFragment, TriplePattern, VariableScope};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// What kind of graph node identifies instances of a hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceKind {
    BlankNode,
    NamedNode,
    BlankOrNamedNode,
}

#[derive(Debug)]
pub struct ObjectType {
    pub(crate) id: ObjectTypeId,
    pub(crate) name: String,
    pub(crate) comment: Option<String>,
    pub(crate) abstract_: bool,
    pub(crate) export: bool,
    pub(crate) extern_: bool,
    pub(crate) declaration_type: DeclarationType,
    pub(crate) parent: Option<ObjectTypeId>,
    /// Sorted by name, unique by name. Includes the identifier and, when
    /// present, the discriminator.
    pub(crate) properties: Vec<Property>,
    pub(crate) identifier_property: Rc<IdentifierProperty>,
    pub(crate) identifier_type: IdentifierType,
    pub(crate) discriminator_property: Option<Rc<TypeDiscriminatorProperty>>,
    pub(crate) discriminator_value: String,
    pub(crate) from_rdf_type: Option<Iri>,
    pub(crate) to_rdf_types: Vec<Iri>,
    pub(crate) features: BTreeSet<Concern>,
    pub(crate) ancestors: OnceCell<Vec<ObjectTypeId>>,
    pub(crate) children: OnceCell<Vec<ObjectTypeId>>,
    pub(crate) descendants: OnceCell<Vec<ObjectTypeId>>,
    pub(crate) mutable: OnceCell<bool>,
}

/// One constructor parameter and the conversions it accepts.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstructorParameter {
    pub name: String,
    pub conversions: Vec<Conversion>,
}

/// Everything an emitter needs to print one object type.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectTypeDeclaration {
    pub name: String,
    pub declaration_type: DeclarationType,
    #[serde(rename = "abstract")]
    pub abstract_: bool,
    pub export: bool,
    #[serde(rename = "extern")]
    pub extern_: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub parent: Option<String>,
    pub ancestors: Vec<String>,
    pub children: Vec<String>,
    pub descendants: Vec<String>,
    pub mutable: bool,
    pub resource_kind: ResourceKind,
    pub discriminator_value: String,
    pub discriminator: Option<DiscriminatorProperty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_rdf_type: Option<Iri>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub to_rdf_types: Vec<Iri>,
    pub imports: BTreeSet<Import>,
    pub properties: Vec<PropertyDeclaration>,
    pub constructor: Vec<ConstructorParameter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equals: Option<ObjectFragment<EqualsOp>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<ObjectFragment<HashOp>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json: Option<ObjectFragment<JsonOp>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rdf: Option<ObjectFragment<RdfOp>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sparql: Option<SparqlFragment>,
}

// ————————————————————————————————————————————————————————————————————————————
// HIERARCHY
// ————————————————————————————————————————————————————————————————————————————

impl ObjectType {
    pub fn id(&self) -> ObjectTypeId { self.id }
    pub fn name(&self) -> &str { &self.name }
    pub fn comment(&self) -> Option<&str> { self.comment.as_deref() }
    pub fn abstract_(&self) -> bool { self.abstract_ }
    pub fn extern_(&self) -> bool { self.extern_ }
    pub fn export(&self) -> bool { self.export }
    pub fn declaration_type(&self) -> DeclarationType { self.declaration_type }
    pub fn parent_id(&self) -> Option<ObjectTypeId> { self.parent }
    pub fn properties(&self) -> &[Property] { &self.properties }
    pub fn identifier_property(&self) -> &IdentifierProperty { &self.identifier_property }
    pub fn identifier_type(&self) -> &IdentifierType { &self.identifier_type }
    pub fn discriminator_value(&self) -> &str { &self.discriminator_value }
    pub fn from_rdf_type(&self) -> Option<&Iri> { self.from_rdf_type.as_ref() }
    pub fn to_rdf_types(&self) -> &[Iri] { &self.to_rdf_types }
    pub fn features(&self) -> &BTreeSet<Concern> { &self.features }

    pub fn discriminator_type_property(&self) -> Option<&TypeDiscriminatorProperty> {
        self.discriminator_property.as_deref()
    }

    pub fn parent<'m>(&self, model: &'m TypeModel) -> Option<&'m ObjectType> {
        self.parent.map(|id| model.object_type(id))
    }

    /// Nearest first.
    pub fn ancestors(&self, model: &TypeModel) -> &[ObjectTypeId] {
        self.ancestors.get_or_init(|| {
            let mut out = Vec::new();
            let mut seen = HashSet::from([self.id]);
            let mut cursor = self.parent;
            while let Some(id) = cursor {
                if !seen.insert(id) {
                    break;
                }
                out.push(id);
                cursor = model.object_type(id).parent;
            }
            out
        })
    }

    pub fn children(&self, model: &TypeModel) -> &[ObjectTypeId] {
        self.children.get_or_init(|| {
            model
                .object_types()
                .iter()
                .filter(|candidate| candidate.parent == Some(self.id))
                .map(ObjectType::id)
                .collect()
        })
    }

    /// Breadth first.
    pub fn descendants(&self, model: &TypeModel) -> &[ObjectTypeId] {
        self.descendants.get_or_init(|| {
            let mut out = Vec::new();
            let mut queue: VecDeque<ObjectTypeId> = self.children(model).iter().copied().collect();
            while let Some(id) = queue.pop_front() {
                if id == self.id || out.contains(&id) {
                    continue;
                }
                queue.extend(model.object_type(id).children(model).iter().copied());
                out.push(id);
            }
            out
        })
    }

    /// Non-abstract descendants, deepest first. Decoders try these before
    /// the type itself so the most specific match wins.
    pub fn concrete_descendants(&self, model: &TypeModel) -> Vec<ObjectTypeId> {
        let mut out: Vec<ObjectTypeId> = self
            .descendants(model)
            .iter()
            .copied()
            .filter(|id| !model.object_type(*id).abstract_)
            .collect();
        out.reverse();
        out
    }

    pub fn is_root(&self) -> bool { self.parent.is_none() }

    pub fn root<'m>(&'m self, model: &'m TypeModel) -> &'m ObjectType {
        match self.ancestors(model).last() {
            Some(id) => model.object_type(*id),
            None => self,
        }
    }

    /// True if `self` is `other` or one of its descendants.
    pub fn is_a(&self, other: ObjectTypeId, model: &TypeModel) -> bool {
        self.id == other || self.ancestors(model).contains(&other)
    }

    /// The root owns identifier and discriminator for its whole tree, so a
    /// subtype's own properties are just the ones declared in the schema.
    pub fn own_properties(&self) -> Vec<&Property> {
        self.properties
            .iter()
            .filter(|p| self.is_root() || matches!(p, Property::Shacl(_)))
            .collect()
    }

    /// Own properties of every type on the chain, root first.
    pub fn chain_properties<'m>(&'m self, model: &'m TypeModel) -> Vec<&'m Property> {
        let mut out = Vec::new();
        for ancestor in self.ancestors(model).iter().rev() {
            out.extend(model.object_type(*ancestor).own_properties());
        }
        out.extend(self.own_properties());
        out
    }

    pub fn resource_kind(&self, model: &TypeModel) -> ResourceKind {
        let kinds = self.root(model).identifier_type.node_kinds();
        match (kinds.contains(&NodeKind::BlankNode), kinds.contains(&NodeKind::Iri)) {
            (true, false) => ResourceKind::BlankNode,
            (false, true) => ResourceKind::NamedNode,
            _ => ResourceKind::BlankOrNamedNode,
        }
    }

    pub fn discriminator(&self, _model: &TypeModel) -> Option<DiscriminatorProperty> {
        self.discriminator_property.as_ref().map(|p| DiscriminatorProperty {
            name: p.name.clone(),
            values: p.values.clone(),
        })
    }

    /// Like [`Self::discriminator`] but an abstract type with no concrete
    /// descendants has nothing to dispatch on, which is an error.
    pub fn discriminator_property(&self, model: &TypeModel) -> Result<DiscriminatorProperty, ModelError> {
        self.discriminator(model).ok_or_else(|| {
            ModelError::configuration(
                &self.name,
                "abstract type with no concrete descendants has no discriminator",
            )
        })
    }

    pub fn mutable(&self, model: &TypeModel) -> bool {
        *self.mutable.get_or_init(|| self.compute_mutable(model, &mut HashSet::new()))
    }

    pub(crate) fn mutable_visiting(&self, model: &TypeModel, visiting: &mut HashSet<ObjectTypeId>) -> bool {
        if let Some(mutable) = self.mutable.get() {
            return *mutable;
        }
        self.compute_mutable(model, visiting)
    }

    // Only the outermost call caches; an inner call cut short by `visiting`
    // may under-report.
    fn compute_mutable(&self, model: &TypeModel, visiting: &mut HashSet<ObjectTypeId>) -> bool {
        if !visiting.insert(self.id) {
            return false;
        }
        let own = self
            .properties
            .iter()
            .any(|p| p.mutable() || p.type_().mutable_visiting(model, visiting));
        own || self.parent(model).is_some_and(|parent| parent.mutable_visiting(model, visiting))
    }

    pub(crate) fn validate(&self, model: &TypeModel) -> Result<(), ModelError> {
        for property in &self.properties {
            property.type_().validate(model)?;
            // Nested objects are decoded by dispatching on their discriminator.
            if self.features.contains(&Concern::Json) {
                if let Some(nested) = property.type_().item_object(model) {
                    nested.discriminator_property(model)?;
                }
            }
        }
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// CONCERNS
// ————————————————————————————————————————————————————————————————————————————

impl ObjectType {
    fn object_fragment<Op>(
        &self,
        model: &TypeModel,
        build: impl Fn(&Property) -> Option<PropertyFragment<Op>>,
    ) -> ObjectFragment<Op> {
        ObjectFragment {
            type_name: self.name.clone(),
            parent: self.parent(model).map(|p| p.name.clone()),
            properties: self.own_properties().into_iter().filter_map(build).collect(),
        }
    }

    pub fn equals_fragment(&self, model: &TypeModel) -> ObjectFragment<EqualsOp> {
        self.object_fragment(model, |p| Some(p.equals_fragment(model)))
    }

    pub fn hash_fragment(&self, model: &TypeModel) -> ObjectFragment<HashOp> {
        self.object_fragment(model, |p| Some(p.hash_fragment(model)))
    }

    pub fn json_fragment(&self, model: &TypeModel) -> ObjectFragment<JsonOp> {
        self.object_fragment(model, |p| Some(p.json_fragment(model)))
    }

    pub fn rdf_fragment(&self, model: &TypeModel) -> ObjectFragment<RdfOp> {
        self.object_fragment(model, |p| p.rdf_fragment(model))
    }

    /// `?variable rdf:type <fromRdfType>` plus one pattern per property on
    /// the chain. Already-visited types contribute nothing.
    pub fn sparql_fragment(
        &self,
        model: &TypeModel,
        variable: &str,
        visiting: &mut Vec<ObjectTypeId>,
    ) -> SparqlFragment {
        if visiting.contains(&self.id) {
            return SparqlFragment::default();
        }
        visiting.push(self.id);

        let mut out = SparqlFragment::default();
        if let Some(class) = &self.from_rdf_type {
            let triple = TriplePattern::rdf_type(variable, class);
            out.construct_template.push(triple.clone());
            out.where_patterns.push(Pattern::Triple(triple));
        }
        let mut scope = VariableScope::new(variable);
        for property in self.chain_properties(model) {
            out.extend(property.sparql_fragment(model, variable, &mut scope, visiting));
        }

        visiting.pop();
        out
    }

    /// Every property on the chain except the discriminator, which the
    /// constructor fills in itself.
    pub fn constructor_parameters(&self, model: &TypeModel) -> Vec<ConstructorParameter> {
        self.chain_properties(model)
            .into_iter()
            .filter(|p| !matches!(p, Property::TypeDiscriminator(_)))
            .map(|p| ConstructorParameter { name: p.name().to_string(), conversions: p.conversions(model) })
            .collect()
    }

    pub fn imports(&self, model: &TypeModel) -> BTreeSet<Import> {
        let mut out: BTreeSet<Import> =
            self.own_properties().iter().flat_map(|p| p.type_().imports(model)).collect();
        for concern in &self.features {
            match concern {
                Concern::Equals => {}
                Concern::Hash => {
                    out.insert(Import::Hasher);
                }
                Concern::Json => {
                    out.insert(Import::Json);
                }
                Concern::Rdf => {
                    out.insert(Import::Rdf);
                }
                Concern::Sparql => {
                    out.insert(Import::Sparql);
                }
            }
        }
        match self.identifier_property.minting_strategy {
            MintingStrategy::ContentHash => {
                out.insert(Import::Digest);
            }
            MintingStrategy::SequentialRandom => {
                out.insert(Import::Uuid);
            }
            MintingStrategy::ExternallySupplied | MintingStrategy::Random => {}
        }
        out
    }

    fn enabled(&self, concerns: &BTreeSet<Concern>, concern: Concern) -> bool {
        concerns.contains(&concern) && self.features.contains(&concern)
    }

    pub fn declaration(&self, model: &TypeModel, concerns: &BTreeSet<Concern>) -> ObjectTypeDeclaration {
        let names = |ids: &[ObjectTypeId]| -> Vec<String> {
            ids.iter().map(|id| model.object_type(*id).name.clone()).collect()
        };
        ObjectTypeDeclaration {
            name: self.name.clone(),
            declaration_type: self.declaration_type,
            abstract_: self.abstract_,
            export: self.export,
            extern_: self.extern_,
            comment: self.comment.clone(),
            parent: self.parent(model).map(|p| p.name.clone()),
            ancestors: names(self.ancestors(model)),
            children: names(self.children(model)),
            descendants: names(self.descendants(model)),
            mutable: self.mutable(model),
            resource_kind: self.resource_kind(model),
            discriminator_value: self.discriminator_value.clone(),
            discriminator: self.discriminator(model),
            from_rdf_type: self.from_rdf_type.clone(),
            to_rdf_types: self.to_rdf_types.clone(),
            imports: self.imports(model),
            properties: self.properties.iter().map(|p| p.declaration(self, model)).collect(),
            constructor: self.constructor_parameters(model),
            equals: self.enabled(concerns, Concern::Equals).then(|| self.equals_fragment(model)),
            hash: self.enabled(concerns, Concern::Hash).then(|| self.hash_fragment(model)),
            json: self.enabled(concerns, Concern::Json).then(|| self.json_fragment(model)),
            rdf: self.enabled(concerns, Concern::Rdf).then(|| self.rdf_fragment(model)),
            sparql: self
                .enabled(concerns, Concern::Sparql)
                .then(|| self.sparql_fragment(model, "subject", &mut Vec::new())),
        }
    }
}
