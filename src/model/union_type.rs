//! Tagged unions.
//!
//! A union either reuses a discriminator field its members already share, or
//! wraps values in a synthetic `{tag, value}` envelope.
use std::collections::BTreeSet;

use once_cell::unsync::OnceCell;
use serde::Serialize;

use crate::config::{Concern, DeclarationType};
use crate::error::ModelError;
use crate::fragment::{
    Conversion, EqualsOp, Fragment, HashOp, JsonOp, RdfOp, SourceCheck, UnionArm, UnionDiscriminator,
    UnionFragment,
};
use crate::model::{DiscriminatorProperty, Import, ObjectTypeId, Type, TypeModel};
use crate::sparql::{Pattern, SparqlFragment};

/// Field holding the tag of a synthetic envelope.
pub const SYNTHETIC_TAG_PROPERTY: &str = "tag";

#[derive(Debug, Clone)]
pub struct UnionType {
    pub(crate) name: Option<String>,
    pub(crate) members: Vec<Type>,
    pub(crate) discriminator: OnceCell<UnionDiscriminator>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnionTypeDeclaration {
    pub name: String,
    pub declaration_type: DeclarationType,
    pub members: Vec<String>,
    pub discriminator: DiscriminatorProperty,
    pub synthetic: bool,
    pub imports: BTreeSet<Import>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equals: Option<Fragment<EqualsOp>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<Fragment<HashOp>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json: Option<Fragment<JsonOp>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rdf: Option<Fragment<RdfOp>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sparql: Option<SparqlFragment>,
}

/// `"<index>-<memberName>"`.
pub fn synthetic_tag(index: usize, member_name: &str) -> String {
    format!("{index}-{member_name}")
}

/// A member's discriminator, if it is one a union can share: object types
/// and unions that themselves share a field. Synthetic envelopes never nest
/// as a shared field.
fn shareable_discriminator(member: &Type, model: &TypeModel) -> Option<DiscriminatorProperty> {
    match member {
        Type::Object(id) => model.object_type(*id).discriminator(model),
        Type::Union(union) => match union.discriminator(model) {
            UnionDiscriminator::Shared { .. } => Some(union.discriminator_property(model)),
            UnionDiscriminator::Synthetic => None,
        },
        _ => None,
    }
}

impl UnionType {
    pub(crate) fn new(name: Option<String>, members: Vec<Type>) -> Self {
        Self { name, members, discriminator: OnceCell::new() }
    }

    pub fn members(&self) -> &[Type] { &self.members }

    pub fn name(&self, model: &TypeModel) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self.members.iter().map(|m| m.name(model)).collect::<Vec<_>>().join(" | "),
        }
    }

    pub fn discriminator(&self, model: &TypeModel) -> &UnionDiscriminator {
        self.discriminator.get_or_init(|| {
            let mut names = self
                .members
                .iter()
                .map(|m| shareable_discriminator(m, model).map(|d| d.name));
            let Some(Some(first)) = names.next() else {
                return UnionDiscriminator::Synthetic;
            };
            if names.all(|name| name.as_deref() == Some(first.as_str())) {
                UnionDiscriminator::Shared { property_name: first }
            } else {
                UnionDiscriminator::Synthetic
            }
        })
    }

    pub fn is_synthetic(&self, model: &TypeModel) -> bool {
        matches!(self.discriminator(model), UnionDiscriminator::Synthetic)
    }

    /// Discriminator values selecting each member, in member order.
    pub fn member_values(&self, model: &TypeModel) -> Vec<Vec<String>> {
        self.members
            .iter()
            .enumerate()
            .map(|(index, member)| match self.discriminator(model) {
                UnionDiscriminator::Shared { .. } => {
                    shareable_discriminator(member, model).map(|d| d.values).unwrap_or_default()
                }
                UnionDiscriminator::Synthetic => vec![synthetic_tag(index, &member.name(model))],
            })
            .collect()
    }

    pub fn discriminator_property(&self, model: &TypeModel) -> DiscriminatorProperty {
        let name = match self.discriminator(model) {
            UnionDiscriminator::Shared { property_name } => property_name.clone(),
            UnionDiscriminator::Synthetic => SYNTHETIC_TAG_PROPERTY.to_string(),
        };
        let mut values: Vec<String> = Vec::new();
        for value in self.member_values(model).into_iter().flatten() {
            if !values.contains(&value) {
                values.push(value);
            }
        }
        DiscriminatorProperty { name, values }
    }

    /// Shared unions accept whatever a member accepts, first member first.
    /// Synthetic unions only accept an already tagged envelope.
    pub fn conversions(&self, model: &TypeModel) -> Vec<Conversion> {
        if self.is_synthetic(model) {
            return vec![Conversion::identity(self.name(model), SourceCheck::Tagged)];
        }
        let mut out: Vec<Conversion> = Vec::new();
        for conversion in self.members.iter().flat_map(|m| m.conversions(model)) {
            if !out.iter().any(|c| c.source_check == conversion.source_check) {
                out.push(conversion);
            }
        }
        out
    }

    pub(crate) fn fragment<Op>(&self, model: &TypeModel, build: impl Fn(&Type) -> Fragment<Op>) -> Fragment<Op> {
        let members = self
            .members
            .iter()
            .zip(self.member_values(model))
            .map(|(member, values)| UnionArm {
                member_type_name: member.name(model),
                values,
                fragment: build(member),
            })
            .collect();
        Fragment::Union(UnionFragment { discriminator: self.discriminator(model).clone(), members })
    }

    /// One `UNION` branch per member. Identical branches collapse, and a
    /// single remaining branch is inlined.
    pub fn sparql_fragment(
        &self,
        model: &TypeModel,
        variable: &str,
        visiting: &mut Vec<ObjectTypeId>,
    ) -> SparqlFragment {
        let mut out = SparqlFragment::default();
        let mut branches: Vec<Vec<Pattern>> = Vec::new();
        for member in &self.members {
            let fragment = member.sparql_fragment(model, variable, visiting);
            for triple in fragment.construct_template {
                if !out.construct_template.contains(&triple) {
                    out.construct_template.push(triple);
                }
            }
            if !branches.contains(&fragment.where_patterns) {
                branches.push(fragment.where_patterns);
            }
        }
        match branches.len() {
            0 => {}
            1 => out.where_patterns = branches.remove(0),
            _ => out.where_patterns.push(Pattern::Union(branches)),
        }
        out
    }

    pub fn declaration_type(&self, model: &TypeModel) -> DeclarationType {
        self.members
            .iter()
            .find_map(|m| m.as_object(model).map(|o| o.declaration_type()))
            .unwrap_or(model.config().declaration_type)
    }

    pub(crate) fn validate(&self, model: &TypeModel) -> Result<(), ModelError> {
        let name = self.name(model);
        if self.members.is_empty() {
            return Err(ModelError::configuration(&name, "union has no members"));
        }
        for member in &self.members {
            if let Some(object) = member.as_object(model) {
                object.discriminator_property(model)?;
            }
        }
        let mut declaration_types =
            self.members.iter().filter_map(|m| m.as_object(model)).map(|o| o.declaration_type());
        let first = declaration_types.next();
        if declaration_types.any(|ty| Some(ty) != first) {
            return Err(ModelError::configuration(
                &name,
                "object members mix class and interface declarations",
            ));
        }

        // Decoding takes the first member that accepts a value, so a member
        // whose JSON shape repeats an earlier one can never be selected.
        let fragments: Vec<_> = self.members.iter().map(|m| m.json_fragment(model)).collect();
        for (index, fragment) in fragments.iter().enumerate() {
            if let Some(earlier) = fragments[..index].iter().position(|f| f == fragment) {
                tracing::warn!(
                    union = %name,
                    member = %self.members[index].name(model),
                    shadowed_by = %self.members[earlier].name(model),
                    "union member is unreachable when decoding"
                );
            }
        }
        Ok(())
    }

    pub fn imports(&self, model: &TypeModel) -> BTreeSet<Import> {
        self.members.iter().flat_map(|m| m.imports(model)).collect()
    }

    pub fn declaration(&self, model: &TypeModel, concerns: &BTreeSet<Concern>) -> UnionTypeDeclaration {
        let enabled = |concern| concerns.contains(&concern) && model.config().features.contains(&concern);
        UnionTypeDeclaration {
            name: self.name(model),
            declaration_type: self.declaration_type(model),
            members: self.members.iter().map(|m| m.name(model)).collect(),
            discriminator: self.discriminator_property(model),
            synthetic: self.is_synthetic(model),
            imports: self.imports(model),
            equals: enabled(Concern::Equals).then(|| self.fragment(model, |m| m.equals_fragment(model))),
            hash: enabled(Concern::Hash).then(|| self.fragment(model, |m| m.hash_fragment(model))),
            json: enabled(Concern::Json).then(|| self.fragment(model, |m| m.json_fragment(model))),
            rdf: enabled(Concern::Rdf).then(|| self.fragment(model, |m| m.rdf_fragment(model))),
            sparql: enabled(Concern::Sparql).then(|| self.sparql_fragment(model, "subject", &mut Vec::new())),
        }
    }
}
