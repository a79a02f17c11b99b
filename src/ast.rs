//! Abstract input tree handed over by the shape-graph parser.
//!
//! Nodes live in an arena keyed by stable identifier and reference each other
//! by identifier, so cyclic and diamond-shaped schemas need no special
//! encoding. Properties live in their own table for the same reason.
use std::collections::{BTreeSet, HashSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::config::{Concern, DeclarationType};
use crate::error::ModelError;
use crate::rdf::{Iri, NodeKind, rdf, xsd};

pub type AstId = String;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AstForest {
    /// Nodes to compile. Empty means every object and union node.
    #[serde(default)]
    pub roots: Vec<AstId>,
    #[serde(default)]
    pub nodes: IndexMap<AstId, AstNode>,
    #[serde(default)]
    pub properties: IndexMap<AstId, AstProperty>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AstNode {
    Identifier(AstIdentifierType),
    Literal(AstLiteralType),
    Native(AstNativeType),
    Object(AstObjectType),
    Union(AstCompositeType),
    Intersection(AstCompositeType),
    List(AstListType),
    Option(AstOptionType),
    Set(AstSetType),
}

impl AstNode {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Identifier(_) => "identifier",
            Self::Literal(_) => "literal",
            Self::Native(_) => "native",
            Self::Object(_) => "object",
            Self::Union(_) => "union",
            Self::Intersection(_) => "intersection",
            Self::List(_) => "list",
            Self::Option(_) => "option",
            Self::Set(_) => "set",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AstIdentifierType {
    #[serde(default = "all_node_kinds")]
    pub node_kinds: BTreeSet<NodeKind>,
    #[serde(default, rename = "in")]
    pub in_: Vec<Iri>,
    #[serde(default)]
    pub default_value: Option<Iri>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AstLiteralType {
    #[serde(default)]
    pub datatype: Option<Iri>,
    #[serde(default)]
    pub default_value: Option<AstLiteral>,
    #[serde(default, rename = "in")]
    pub in_: Vec<AstLiteral>,
    #[serde(default)]
    pub has_values: Vec<AstLiteral>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AstNativeType {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AstObjectType {
    pub name: String,
    #[serde(default, rename = "abstract")]
    pub abstract_: bool,
    #[serde(default = "yes")]
    pub export: bool,
    #[serde(default, rename = "extern")]
    pub extern_: bool,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub declaration_type: Option<DeclarationType>,
    #[serde(default)]
    pub parents: Vec<AstId>,
    #[serde(default)]
    pub properties: Vec<AstId>,
    #[serde(default)]
    pub identifier_minting_strategy: Option<MintingStrategy>,
    #[serde(default = "all_node_kinds")]
    pub identifier_node_kinds: BTreeSet<NodeKind>,
    #[serde(default)]
    pub identifier_prefix: Option<String>,
    #[serde(default)]
    pub identifier_property_name: Option<String>,
    #[serde(default)]
    pub discriminator_property_name: Option<String>,
    #[serde(default)]
    pub discriminator_value: Option<String>,
    #[serde(default)]
    pub from_rdf_type: Option<Iri>,
    #[serde(default)]
    pub to_rdf_types: Vec<Iri>,
    /// Set when the shape describes an RDF list rather than a resource.
    #[serde(default)]
    pub list_item: Option<AstId>,
    #[serde(default)]
    pub features: Option<BTreeSet<Concern>>,
}

impl AstObjectType {
    pub fn discriminator_value(&self) -> &str {
        self.discriminator_value.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AstCompositeType {
    #[serde(default)]
    pub name: Option<String>,
    pub members: Vec<AstId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AstListType {
    #[serde(default)]
    pub name: Option<String>,
    pub item: AstId,
    #[serde(default)]
    pub mutable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AstOptionType {
    pub item: AstId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AstSetType {
    pub item: AstId,
    #[serde(default)]
    pub min_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Private,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AstProperty {
    pub name: String,
    pub path: Iri,
    #[serde(rename = "type")]
    pub value_type: AstId,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub min_count: u32,
    #[serde(default)]
    pub max_count: Option<u32>,
    /// Embed the referenced object instead of carrying its identifier.
    #[serde(default)]
    pub inline: bool,
    #[serde(default)]
    pub mutable: bool,
    #[serde(default)]
    pub comment: Option<String>,
}

/// How instances obtain an identifier when the caller supplies none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MintingStrategy {
    ExternallySupplied,
    #[serde(alias = "blankNode")]
    Random,
    #[serde(alias = "sha256")]
    ContentHash,
    #[serde(alias = "uuidv4")]
    SequentialRandom,
}

/// A literal as written in the input: either a bare JSON scalar or an
/// explicit `{value, datatype, language}` triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "AstLiteralInput")]
pub struct AstLiteral {
    pub value: String,
    pub datatype: Option<Iri>,
    pub language: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AstLiteralInput {
    Explicit {
        value: String,
        #[serde(default)]
        datatype: Option<Iri>,
        #[serde(default)]
        language: Option<String>,
    },
    Boolean(bool),
    Number(serde_json::Number),
    String(String),
}

impl From<AstLiteralInput> for AstLiteral {
    fn from(input: AstLiteralInput) -> Self {
        match input {
            AstLiteralInput::Explicit { value, datatype, language } => {
                Self { value, datatype, language }
            }
            AstLiteralInput::Boolean(b) => Self::typed(b.to_string(), xsd::BOOLEAN),
            AstLiteralInput::Number(n) if n.is_f64() => Self::typed(n.to_string(), xsd::DOUBLE),
            AstLiteralInput::Number(n) => Self::typed(n.to_string(), xsd::INTEGER),
            AstLiteralInput::String(s) => Self { value: s, datatype: None, language: None },
        }
    }
}

impl AstLiteral {
    fn typed(value: String, datatype: &str) -> Self {
        Self { value, datatype: Some(Iri::new(datatype)), language: None }
    }

    /// Datatype after RDF 1.1 defaulting: language-tagged strings are
    /// `rdf:langString`, untyped ones `xsd:string`.
    pub fn effective_datatype(&self) -> Iri {
        match (&self.datatype, &self.language) {
            (Some(datatype), _) => datatype.clone(),
            (None, Some(_)) => Iri::new(rdf::LANG_STRING),
            (None, None) => Iri::new(xsd::STRING),
        }
    }
}

fn all_node_kinds() -> BTreeSet<NodeKind> {
    [NodeKind::BlankNode, NodeKind::Iri].into_iter().collect()
}

fn yes() -> bool { true }

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl AstForest {
    pub fn from_json_str(source: &str) -> Result<Self, ModelError> {
        crate::path_de::from_str_with_path(source)
    }

    pub fn from_json_value(value: serde_json::Value) -> Result<Self, ModelError> {
        crate::path_de::from_value_with_path(value)
    }

    /// Fold another forest into this one. Later definitions of the same
    /// identifier replace earlier ones.
    pub fn merge(&mut self, other: AstForest) {
        self.roots.extend(other.roots);
        self.nodes.extend(other.nodes);
        self.properties.extend(other.properties);
    }

    pub fn node(&self, id: &str) -> Result<&AstNode, ModelError> {
        self.nodes.get(id).ok_or_else(|| ModelError::unknown("node", id))
    }

    pub fn object(&self, id: &str) -> Result<&AstObjectType, ModelError> {
        match self.node(id)? {
            AstNode::Object(object) => Ok(object),
            other => Err(ModelError::configuration(
                id,
                format!("expected an object node, found a {} node", other.kind_name()),
            )),
        }
    }

    pub fn property(&self, id: &str) -> Result<&AstProperty, ModelError> {
        self.properties.get(id).ok_or_else(|| ModelError::unknown("property", id))
    }

    /// Root identifiers to compile.
    pub fn root_ids(&self) -> Vec<AstId> {
        if !self.roots.is_empty() {
            return self.roots.clone();
        }
        self.nodes
            .iter()
            .filter(|(_, node)| match node {
                AstNode::Object(object) => object.list_item.is_none(),
                AstNode::Union(composite) => composite.name.is_some(),
                _ => false,
            })
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// The single declared parent of an object node, if any.
    pub fn parent(&self, id: &str) -> Result<Option<&AstId>, ModelError> {
        let object = self.object(id)?;
        match object.parents.as_slice() {
            [] => Ok(None),
            [parent] => Ok(Some(parent)),
            parents => Err(ModelError::configuration(
                &object.name,
                format!(
                    "declares {} parents ({}); only single inheritance is supported",
                    parents.len(),
                    parents.join(", ")
                ),
            )),
        }
    }

    /// Ancestors nearest-first. Fails on multiple parents and on cycles.
    pub fn ancestors(&self, id: &str) -> Result<Vec<AstId>, ModelError> {
        let mut out = Vec::new();
        let mut seen = HashSet::from([id.to_string()]);
        let mut cursor = self.parent(id)?.cloned();
        while let Some(parent) = cursor {
            if !seen.insert(parent.clone()) {
                return Err(ModelError::configuration(
                    &self.object(id)?.name,
                    format!("inheritance cycle through `{parent}`"),
                ));
            }
            cursor = self.parent(&parent)?.cloned();
            out.push(parent);
        }
        Ok(out)
    }

    pub fn children(&self, id: &str) -> Vec<AstId> {
        self.nodes
            .iter()
            .filter(|(_, node)| {
                matches!(node, AstNode::Object(object) if object.parents.iter().any(|p| p == id))
            })
            .map(|(child, _)| child.clone())
            .collect()
    }

    /// Descendants breadth-first.
    pub fn descendants(&self, id: &str) -> Vec<AstId> {
        let mut out: Vec<AstId> = Vec::new();
        let mut queue = self.children(id);
        while !queue.is_empty() {
            let next = queue.remove(0);
            if next == id || out.contains(&next) {
                continue;
            }
            queue.extend(self.children(&next));
            out.push(next);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn forest() -> AstForest {
        AstForest::from_json_value(json!({
            "nodes": {
                "A": {"kind": "object", "name": "A", "abstract": true},
                "B": {"kind": "object", "name": "B", "parents": ["A"]},
                "C": {"kind": "object", "name": "C", "parents": ["B"]},
                "D": {"kind": "object", "name": "D", "parents": ["A", "B"]},
                "L": {"kind": "literal", "defaultValue": 3}
            }
        }))
        .unwrap()
    }

    #[test]
    fn ancestors_and_descendants() {
        let forest = forest();
        assert_eq!(forest.ancestors("C").unwrap(), vec!["B".to_string(), "A".to_string()]);
        let descendants = forest.descendants("A");
        assert!(descendants.contains(&"B".to_string()));
        assert!(descendants.contains(&"C".to_string()));
    }

    #[test]
    fn multiple_parents_rejected() {
        let error = forest().ancestors("D").unwrap_err();
        assert!(matches!(error, ModelError::Configuration { .. }), "{error}");
    }

    #[test]
    fn bare_literals_get_datatypes() {
        let forest = forest();
        let AstNode::Literal(literal) = forest.node("L").unwrap() else { panic!("literal") };
        let default = literal.default_value.as_ref().unwrap();
        assert_eq!(default.effective_datatype().as_str(), xsd::INTEGER);
        assert_eq!(default.value, "3");
    }

    #[test]
    fn inheritance_cycle_rejected() {
        let forest = AstForest::from_json_value(json!({
            "nodes": {
                "X": {"kind": "object", "name": "X", "parents": ["Y"]},
                "Y": {"kind": "object", "name": "Y", "parents": ["X"]}
            }
        }))
        .unwrap();
        assert!(forest.ancestors("X").is_err());
    }
}
