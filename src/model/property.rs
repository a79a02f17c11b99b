//! The property family: identifier, type discriminator and ordinary
//! (schema-declared) properties.
//!
//! A property composes a [`Type`] for its value and scopes that type's
//! per-concern fragments to "this property of the containing type".
use std::rc::Rc;

use serde::Serialize;

use crate::ast::{MintingStrategy, Visibility};
use crate::fragment::{
    Conversion, EqualsOp, Fragment, HashOp, JsonOp, PropertyFragment, PropertyRole, RdfOp,
    SourceCheck,
};
use crate::model::{
    IdentifierType, LiteralKind, LiteralType, ObjectType, ObjectTypeId, PrimitiveKind, Type,
    TypeModel,
};
use crate::rdf::{Iri, xsd};
use crate::sparql::{
    Pattern, PropertyPath, SparqlFragment, TermPattern, TriplePattern, VariableScope,
};
use crate::value::Value;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// Cheap to clone; instances are shared, so the same schema property reached
/// from two object types is the same `Rc`.
#[derive(Debug, Clone)]
pub enum Property {
    Identifier(Rc<IdentifierProperty>),
    TypeDiscriminator(Rc<TypeDiscriminatorProperty>),
    Shacl(Rc<ShaclProperty>),
}

/// Where the identifier's storage lives in a hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum IdentifierDeclaration {
    /// Abstract type: declared, no storage.
    Abstract,
    /// A non-abstract ancestor owns the storage.
    Inherited,
    /// Owns the storage and shares it with non-abstract descendants.
    Protected,
    /// Owns the storage; no non-abstract descendants.
    Private,
}

#[derive(Debug, Clone)]
pub struct IdentifierProperty {
    pub(crate) name: String,
    pub(crate) type_: Type,
    pub(crate) declaration: IdentifierDeclaration,
    pub(crate) minting_strategy: MintingStrategy,
    pub(crate) mint_prefix: String,
}

#[derive(Debug, Clone)]
pub struct TypeDiscriminatorProperty {
    pub(crate) name: String,
    pub(crate) type_: Type,
    /// Tag of the declaring type; `None` when it is abstract.
    pub(crate) value: Option<String>,
    /// Every tag legal at the declaring type.
    pub(crate) values: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ShaclProperty {
    pub(crate) name: String,
    pub(crate) path: Iri,
    pub(crate) type_: Type,
    pub(crate) visibility: Visibility,
    pub(crate) mutable: bool,
    pub(crate) comment: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDeclaration {
    pub name: String,
    pub type_name: String,
    pub visibility: Visibility,
    pub mutable: bool,
    #[serde(rename = "abstract")]
    pub abstract_: bool,
    #[serde(rename = "override")]
    pub override_: bool,
    pub role: PropertyRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declaration: Option<IdentifierDeclaration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minting_strategy: Option<MintingStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl IdentifierProperty {
    pub fn declaration(&self) -> IdentifierDeclaration { self.declaration }
    pub fn minting_strategy(&self) -> MintingStrategy { self.minting_strategy }
    pub fn mint_prefix(&self) -> &str { &self.mint_prefix }

    pub fn identifier_type(&self) -> Option<&IdentifierType> {
        match &self.type_ {
            Type::Identifier(ty) => Some(ty),
            _ => None,
        }
    }

    /// A minted identifier may be cached unless it is derived from the
    /// content of a mutable instance.
    pub fn memoizes(&self, owner_mutable: bool) -> bool {
        !(self.minting_strategy == MintingStrategy::ContentHash && owner_mutable)
    }

    fn visibility(&self) -> Visibility {
        match self.declaration {
            IdentifierDeclaration::Abstract => Visibility::Public,
            IdentifierDeclaration::Inherited | IdentifierDeclaration::Protected => Visibility::Protected,
            IdentifierDeclaration::Private => Visibility::Private,
        }
    }
}

impl TypeDiscriminatorProperty {
    pub(crate) fn new(name: String, value: Option<String>, values: Vec<String>) -> Self {
        let type_ = Type::Literal(LiteralType {
            kind: LiteralKind::Primitive { kind: PrimitiveKind::String, datatype: Iri::new(xsd::STRING) },
            default_value: None,
            in_: values.iter().cloned().map(Value::String).collect(),
            has_values: Vec::new(),
        });
        Self { name, type_, value, values }
    }

    pub fn value(&self) -> Option<&str> { self.value.as_deref() }
    pub fn values(&self) -> &[String] { &self.values }
}

impl ShaclProperty {
    pub fn path(&self) -> &Iri { &self.path }
    pub fn comment(&self) -> Option<&str> { self.comment.as_deref() }

    /// Zero matches are acceptable when the value is optional, an
    /// unconstrained set, or defaulted.
    fn optional(&self) -> bool {
        match &self.type_ {
            Type::Option(_) => true,
            Type::Set(set) => set.min_count() == 0,
            ty => ty.has_default(),
        }
    }

    fn sparql_fragment(
        &self,
        model: &TypeModel,
        subject: &str,
        scope: &mut VariableScope,
        visiting: &mut Vec<ObjectTypeId>,
    ) -> SparqlFragment {
        let variable = scope.property_variable(subject, &self.name);
        let triple = TriplePattern::new(
            TermPattern::variable(subject),
            PropertyPath::Iri(self.path.clone()),
            TermPattern::variable(&variable),
        );
        let nested = self.type_.sparql_fragment(model, &variable, visiting);

        let mut construct_template = vec![triple.clone()];
        construct_template.extend(nested.construct_template);
        let mut where_patterns = vec![Pattern::Triple(triple)];
        where_patterns.extend(nested.where_patterns);
        if self.optional() {
            where_patterns = vec![Pattern::Optional(where_patterns)];
        }
        SparqlFragment { construct_template, where_patterns }
    }
}

impl Property {
    pub fn name(&self) -> &str {
        match self {
            Self::Identifier(p) => &p.name,
            Self::TypeDiscriminator(p) => &p.name,
            Self::Shacl(p) => &p.name,
        }
    }

    pub fn type_(&self) -> &Type {
        match self {
            Self::Identifier(p) => &p.type_,
            Self::TypeDiscriminator(p) => &p.type_,
            Self::Shacl(p) => &p.type_,
        }
    }

    pub fn visibility(&self) -> Visibility {
        match self {
            Self::Identifier(p) => p.visibility(),
            Self::TypeDiscriminator(_) => Visibility::Public,
            Self::Shacl(p) => p.visibility,
        }
    }

    pub fn mutable(&self) -> bool {
        match self {
            Self::Shacl(p) => p.mutable,
            Self::Identifier(_) | Self::TypeDiscriminator(_) => false,
        }
    }

    pub fn abstract_(&self) -> bool {
        match self {
            Self::Identifier(p) => p.declaration == IdentifierDeclaration::Abstract,
            Self::TypeDiscriminator(p) => p.value.is_none(),
            Self::Shacl(_) => false,
        }
    }

    /// True when an ancestor of `owner` already declares this name.
    pub fn is_override(&self, owner: &ObjectType, model: &TypeModel) -> bool {
        owner.ancestors(model).iter().any(|ancestor| {
            model
                .object_type(*ancestor)
                .properties()
                .iter()
                .any(|p| p.name() == self.name())
        })
    }

    pub fn role(&self) -> PropertyRole {
        match self {
            Self::Identifier(_) => PropertyRole::Identifier,
            Self::TypeDiscriminator(p) => PropertyRole::Discriminator { values: p.values.clone() },
            Self::Shacl(p) => PropertyRole::Shacl { path: p.path.clone() },
        }
    }

    pub fn as_identifier(&self) -> Option<&IdentifierProperty> {
        match self {
            Self::Identifier(p) => Some(p.as_ref()),
            _ => None,
        }
    }

    pub fn as_discriminator(&self) -> Option<&TypeDiscriminatorProperty> {
        match self {
            Self::TypeDiscriminator(p) => Some(p.as_ref()),
            _ => None,
        }
    }

    /// Ordered conversion chain for constructor parameters.
    pub fn conversions(&self, model: &TypeModel) -> Vec<Conversion> {
        match self {
            Self::Identifier(p) if p.minting_strategy != MintingStrategy::ExternallySupplied => {
                // Left absent; the getter mints on first read.
                let mut out = vec![Conversion::identity("undefined", SourceCheck::Absent)];
                out.extend(p.type_.conversions(model));
                out
            }
            Self::TypeDiscriminator(_) => {
                vec![Conversion::identity("string", SourceCheck::String)]
            }
            _ => self.type_().conversions(model),
        }
    }

    fn scoped<Op>(&self, fragment: Fragment<Op>) -> PropertyFragment<Op> {
        PropertyFragment { name: self.name().to_string(), role: self.role(), fragment }
    }

    /// Discriminators compare by strict tag match, never structurally.
    pub fn equals_fragment(&self, model: &TypeModel) -> PropertyFragment<EqualsOp> {
        match self {
            Self::TypeDiscriminator(_) => self.scoped(Fragment::leaf(EqualsOp::Strict)),
            _ => self.scoped(self.type_().equals_fragment(model)),
        }
    }

    pub fn hash_fragment(&self, model: &TypeModel) -> PropertyFragment<HashOp> {
        match self {
            Self::TypeDiscriminator(_) => self.scoped(Fragment::leaf(HashOp::Primitive(PrimitiveKind::String))),
            _ => self.scoped(self.type_().hash_fragment(model)),
        }
    }

    pub fn json_fragment(&self, model: &TypeModel) -> PropertyFragment<JsonOp> {
        match self {
            Self::TypeDiscriminator(_) => self.scoped(Fragment::leaf(JsonOp::Primitive(PrimitiveKind::String))),
            _ => self.scoped(self.type_().json_fragment(model)),
        }
    }

    /// `None` for the discriminator, which has no graph representation; the
    /// concrete type shows up as `rdf:type` instead.
    pub fn rdf_fragment(&self, model: &TypeModel) -> Option<PropertyFragment<RdfOp>> {
        match self {
            Self::TypeDiscriminator(_) => None,
            _ => Some(self.scoped(self.type_().rdf_fragment(model))),
        }
    }

    pub fn sparql_fragment(
        &self,
        model: &TypeModel,
        subject: &str,
        scope: &mut VariableScope,
        visiting: &mut Vec<ObjectTypeId>,
    ) -> SparqlFragment {
        match self {
            Self::Shacl(p) => p.sparql_fragment(model, subject, scope, visiting),
            Self::Identifier(_) | Self::TypeDiscriminator(_) => SparqlFragment::default(),
        }
    }

    pub fn declaration(&self, owner: &ObjectType, model: &TypeModel) -> PropertyDeclaration {
        PropertyDeclaration {
            name: self.name().to_string(),
            type_name: self.type_().name(model),
            visibility: self.visibility(),
            mutable: self.mutable(),
            abstract_: self.abstract_(),
            override_: self.is_override(owner, model),
            role: self.role(),
            declaration: self.as_identifier().map(IdentifierProperty::declaration),
            minting_strategy: self.as_identifier().map(IdentifierProperty::minting_strategy),
            value: self.as_discriminator().and_then(|p| p.value.clone()),
            comment: match self {
                Self::Shacl(p) => p.comment.clone(),
                _ => None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::NodeKind;

    fn identifier(strategy: MintingStrategy) -> IdentifierProperty {
        IdentifierProperty {
            name: "identifier".into(),
            type_: Type::Identifier(IdentifierType::new([NodeKind::Iri].into_iter().collect())),
            declaration: IdentifierDeclaration::Private,
            minting_strategy: strategy,
            mint_prefix: "urn:test:".into(),
        }
    }

    #[test]
    fn content_hash_on_mutable_owner_is_not_memoized() {
        assert!(!identifier(MintingStrategy::ContentHash).memoizes(true));
        assert!(identifier(MintingStrategy::ContentHash).memoizes(false));
        assert!(identifier(MintingStrategy::SequentialRandom).memoizes(true));
        assert!(identifier(MintingStrategy::Random).memoizes(true));
    }

    #[test]
    fn identifier_visibility_follows_declaration() {
        let mut property = identifier(MintingStrategy::ContentHash);
        assert_eq!(Property::Identifier(Rc::new(property.clone())).visibility(), Visibility::Private);
        property.declaration = IdentifierDeclaration::Protected;
        assert_eq!(Property::Identifier(Rc::new(property.clone())).visibility(), Visibility::Protected);
        property.declaration = IdentifierDeclaration::Abstract;
        let property = Property::Identifier(Rc::new(property));
        assert_eq!(property.visibility(), Visibility::Public);
        assert!(property.abstract_());
    }

    #[test]
    fn discriminator_is_abstract_without_own_value() {
        let property = Property::TypeDiscriminator(Rc::new(TypeDiscriminatorProperty::new(
            "type".into(),
            None,
            vec!["Dog".into()],
        )));
        assert!(property.abstract_());
        assert_eq!(property.role(), PropertyRole::Discriminator { values: vec!["Dog".into()] });
    }
}
