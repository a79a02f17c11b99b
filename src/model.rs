//! The type model: an arena of object types plus the `Type` values that
//! reference them.
//!
//! Object types refer to each other by [`ObjectTypeId`]; properties are shared
//! `Rc`s so one schema property reached twice is one instance. Everything derived
//! from the hierarchy (ancestors, children, descendants, mutability) is
//! computed on first access and memoized, so construction order never matters.
pub mod collection;
pub mod factory;
pub mod literal;
pub mod object_type;
pub mod property;
pub mod union_type;

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::Serialize;

use crate::config::{Concern, GeneratorConfig};
use crate::error::ModelError;
use crate::fragment::{Conversion, EqualsOp, Fragment, HashOp, JsonOp, RdfOp, SourceCheck};
use crate::sparql::SparqlFragment;

pub use collection::{ListType, OptionType, SetType};
pub use factory::TypeFactory;
pub use literal::{IdentifierType, LiteralKind, LiteralType, NativeType, PrimitiveKind};
pub use object_type::{ConstructorParameter, ObjectType, ObjectTypeDeclaration, ResourceKind};
pub use property::{
    IdentifierDeclaration, IdentifierProperty, Property, ShaclProperty, TypeDiscriminatorProperty,
};
pub use union_type::{SYNTHETIC_TAG_PROPERTY, UnionType, UnionTypeDeclaration, synthetic_tag};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ObjectTypeId(pub(crate) usize);

#[derive(Debug, Clone)]
pub enum Type {
    Identifier(IdentifierType),
    Literal(LiteralType),
    Native(NativeType),
    Object(ObjectTypeId),
    Union(Box<UnionType>),
    List(ListType),
    Set(SetType),
    Option(OptionType),
}

/// The discriminator a type exposes for polymorphic dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscriminatorProperty {
    pub name: String,
    pub values: Vec<String>,
}

/// Runtime capabilities a declaration depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Import {
    DateTime,
    Digest,
    Hasher,
    Json,
    Rdf,
    Sparql,
    Uuid,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Declaration {
    Object(ObjectTypeDeclaration),
    Union(UnionTypeDeclaration),
}

/// Output of one compilation run.
#[derive(Debug)]
pub struct TypeModel {
    pub(crate) config: GeneratorConfig,
    pub(crate) object_types: Vec<ObjectType>,
    pub(crate) roots: Vec<Type>,
    by_name: HashMap<String, ObjectTypeId>,
}

// ————————————————————————————————————————————————————————————————————————————
// TYPE MODEL
// ————————————————————————————————————————————————————————————————————————————

impl TypeModel {
    pub(crate) fn new(
        config: GeneratorConfig,
        object_types: Vec<ObjectType>,
        roots: Vec<Type>,
    ) -> Result<Self, ModelError> {
        let mut by_name = HashMap::new();
        for object_type in &object_types {
            if by_name.insert(object_type.name().to_string(), object_type.id()).is_some() {
                return Err(ModelError::configuration(
                    object_type.name(),
                    "two object types share this name",
                ));
            }
        }
        let model = Self { config, object_types, roots, by_name };
        model.validate()?;
        Ok(model)
    }

    /// Forces every lazily computed fact that can fail, so schema errors
    /// surface at construction rather than at first use by an emitter.
    fn validate(&self) -> Result<(), ModelError> {
        for object_type in &self.object_types {
            object_type.validate(self)?;
        }
        for root in &self.roots {
            root.validate(self)?;
        }
        Ok(())
    }

    /// Shorthand for [`factory::build`].
    pub fn from_ast(ast: &crate::ast::AstForest, config: &GeneratorConfig) -> Result<Self, ModelError> {
        factory::build(ast, config)
    }

    pub fn config(&self) -> &GeneratorConfig { &self.config }
    pub fn roots(&self) -> &[Type] { &self.roots }
    pub fn object_types(&self) -> &[ObjectType] { &self.object_types }

    pub fn object_type(&self, id: ObjectTypeId) -> &ObjectType { &self.object_types[id.0] }

    pub fn object_type_by_name(&self, name: &str) -> Option<&ObjectType> {
        self.by_name.get(name).map(|id| self.object_type(*id))
    }

    /// Root type with the given display name.
    pub fn root(&self, name: &str) -> Option<&Type> {
        self.roots.iter().find(|ty| ty.name(self) == name)
    }

    /// Declarations of every root, with fragments for `concerns` that the
    /// type has enabled.
    pub fn declarations(&self, concerns: &BTreeSet<Concern>) -> Vec<Declaration> {
        self.roots
            .iter()
            .filter_map(|root| match root {
                Type::Object(id) => {
                    Some(Declaration::Object(self.object_type(*id).declaration(self, concerns)))
                }
                Type::Union(union) => Some(Declaration::Union(union.declaration(self, concerns))),
                _ => None,
            })
            .collect()
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TYPE
// ————————————————————————————————————————————————————————————————————————————

impl Type {
    pub fn name(&self, model: &TypeModel) -> String {
        match self {
            Self::Identifier(ty) => ty.name(),
            Self::Literal(ty) => ty.name(),
            Self::Native(ty) => ty.name(),
            Self::Object(id) => model.object_type(*id).name().to_string(),
            Self::Union(ty) => ty.name(model),
            Self::List(ty) => ty.name(model),
            Self::Set(ty) => ty.name(model),
            Self::Option(ty) => ty.name(model),
        }
    }

    /// True if any property reachable from this type is mutable.
    pub fn mutable(&self, model: &TypeModel) -> bool {
        self.mutable_visiting(model, &mut HashSet::new())
    }

    pub(crate) fn mutable_visiting(&self, model: &TypeModel, visiting: &mut HashSet<ObjectTypeId>) -> bool {
        match self {
            Self::Identifier(_) | Self::Literal(_) | Self::Native(_) => false,
            Self::Object(id) => model.object_type(*id).mutable_visiting(model, visiting),
            Self::Union(ty) => ty.members().iter().any(|m| m.mutable_visiting(model, visiting)),
            Self::List(ty) => ty.mutable || ty.item.mutable_visiting(model, visiting),
            Self::Set(ty) => ty.item.mutable_visiting(model, visiting),
            Self::Option(ty) => ty.item.mutable_visiting(model, visiting),
        }
    }

    pub fn discriminator_property(&self, model: &TypeModel) -> Option<DiscriminatorProperty> {
        match self {
            Self::Object(id) => model.object_type(*id).discriminator(model),
            Self::Union(ty) => Some(ty.discriminator_property(model)),
            _ => None,
        }
    }

    /// True when a missing value is filled by a default conversion.
    pub fn has_default(&self) -> bool {
        match self {
            Self::Literal(ty) => ty.default_value.is_some(),
            Self::Identifier(ty) => ty.default_value.is_some(),
            _ => false,
        }
    }

    pub fn conversions(&self, model: &TypeModel) -> Vec<Conversion> {
        match self {
            Self::Identifier(ty) => ty.conversions(),
            Self::Literal(ty) => ty.conversions(),
            Self::Native(ty) => ty.conversions(),
            Self::Object(id) => {
                let name = model.object_type(*id).name().to_string();
                vec![Conversion::identity(&name, SourceCheck::Object { type_name: name.clone() })]
            }
            Self::Union(ty) => ty.conversions(model),
            Self::List(ty) => ty.conversions(model),
            Self::Set(ty) => ty.conversions(model),
            Self::Option(ty) => ty.conversions(model),
        }
    }

    pub fn equals_fragment(&self, model: &TypeModel) -> Fragment<EqualsOp> {
        match self {
            Self::Identifier(ty) => ty.equals_fragment(),
            Self::Literal(ty) => ty.equals_fragment(),
            Self::Native(_) => Fragment::leaf(EqualsOp::Native),
            Self::Object(id) => object_fragment(model, *id),
            Self::Union(ty) => ty.fragment(model, |m| m.equals_fragment(model)),
            Self::List(ty) => Fragment::List { item: Box::new(ty.item.equals_fragment(model)) },
            Self::Set(ty) => ty.wrap(ty.item.equals_fragment(model)),
            Self::Option(ty) => Fragment::Option { item: Box::new(ty.item.equals_fragment(model)) },
        }
    }

    pub fn hash_fragment(&self, model: &TypeModel) -> Fragment<HashOp> {
        match self {
            Self::Identifier(ty) => ty.hash_fragment(),
            Self::Literal(ty) => ty.hash_fragment(),
            Self::Native(_) => Fragment::leaf(HashOp::Native),
            Self::Object(id) => object_fragment(model, *id),
            Self::Union(ty) => ty.fragment(model, |m| m.hash_fragment(model)),
            Self::List(ty) => Fragment::List { item: Box::new(ty.item.hash_fragment(model)) },
            Self::Set(ty) => ty.wrap(ty.item.hash_fragment(model)),
            Self::Option(ty) => Fragment::Option { item: Box::new(ty.item.hash_fragment(model)) },
        }
    }

    pub fn json_fragment(&self, model: &TypeModel) -> Fragment<JsonOp> {
        match self {
            Self::Identifier(ty) => ty.json_fragment(),
            Self::Literal(ty) => ty.json_fragment(),
            Self::Native(_) => Fragment::leaf(JsonOp::Native),
            Self::Object(id) => object_fragment(model, *id),
            Self::Union(ty) => ty.fragment(model, |m| m.json_fragment(model)),
            Self::List(ty) => Fragment::List { item: Box::new(ty.item.json_fragment(model)) },
            Self::Set(ty) => ty.wrap(ty.item.json_fragment(model)),
            Self::Option(ty) => Fragment::Option { item: Box::new(ty.item.json_fragment(model)) },
        }
    }

    pub fn rdf_fragment(&self, model: &TypeModel) -> Fragment<RdfOp> {
        match self {
            Self::Identifier(ty) => ty.rdf_fragment(),
            Self::Literal(ty) => ty.rdf_fragment(),
            Self::Native(_) => Fragment::leaf(RdfOp::Native),
            Self::Object(id) => object_fragment(model, *id),
            Self::Union(ty) => ty.fragment(model, |m| m.rdf_fragment(model)),
            Self::List(ty) => Fragment::List { item: Box::new(ty.item.rdf_fragment(model)) },
            Self::Set(ty) => ty.wrap(ty.item.rdf_fragment(model)),
            Self::Option(ty) => Fragment::Option { item: Box::new(ty.item.rdf_fragment(model)) },
        }
    }

    /// Query fragment binding `variable` to values of this type. Object types
    /// already on `visiting` contribute nothing, which stops recursion through
    /// self-referencing inline properties.
    pub fn sparql_fragment(
        &self,
        model: &TypeModel,
        variable: &str,
        visiting: &mut Vec<ObjectTypeId>,
    ) -> SparqlFragment {
        match self {
            Self::Identifier(_) | Self::Literal(_) | Self::Native(_) => SparqlFragment::default(),
            Self::Object(id) => model.object_type(*id).sparql_fragment(model, variable, visiting),
            Self::Union(ty) => ty.sparql_fragment(model, variable, visiting),
            Self::List(ty) => ty.sparql_fragment(model, variable, visiting),
            Self::Set(ty) => ty.item.sparql_fragment(model, variable, visiting),
            Self::Option(ty) => ty.item.sparql_fragment(model, variable, visiting),
        }
    }

    pub fn imports(&self, model: &TypeModel) -> BTreeSet<Import> {
        match self {
            Self::Literal(ty) if ty.primitive_kind() == Some(PrimitiveKind::DateTime) => {
                BTreeSet::from([Import::DateTime])
            }
            Self::Identifier(_) | Self::Literal(_) => BTreeSet::from([Import::Rdf]),
            Self::Native(_) => BTreeSet::from([Import::Json]),
            Self::Object(_) => BTreeSet::new(),
            Self::Union(ty) => ty.members().iter().flat_map(|m| m.imports(model)).collect(),
            Self::List(ty) => ty.item.imports(model),
            Self::Set(ty) => ty.item.imports(model),
            Self::Option(ty) => ty.item.imports(model),
        }
    }

    pub(crate) fn validate(&self, model: &TypeModel) -> Result<(), ModelError> {
        match self {
            Self::Union(ty) => {
                ty.validate(model)?;
                ty.members().iter().try_for_each(|m| m.validate(model))
            }
            Self::List(ty) => ty.item.validate(model),
            Self::Set(ty) => ty.item.validate(model),
            Self::Option(ty) => ty.item.validate(model),
            _ => Ok(()),
        }
    }

    /// The object type held by a value of this type, looking through
    /// option, set and list wrappers.
    pub fn item_object<'m>(&self, model: &'m TypeModel) -> Option<&'m ObjectType> {
        match self {
            Self::Object(id) => Some(model.object_type(*id)),
            Self::List(ty) => ty.item.item_object(model),
            Self::Set(ty) => ty.item.item_object(model),
            Self::Option(ty) => ty.item.item_object(model),
            _ => None,
        }
    }

    pub fn as_object<'m>(&self, model: &'m TypeModel) -> Option<&'m ObjectType> {
        match self {
            Self::Object(id) => Some(model.object_type(*id)),
            _ => None,
        }
    }
}

fn object_fragment<Op>(model: &TypeModel, id: ObjectTypeId) -> Fragment<Op> {
    Fragment::Object { type_name: model.object_type(id).name().to_string() }
}
