//! Generator settings shared by every type in one compilation run.
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// A code-generation concern a type can emit fragments for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "camelCase")]
pub enum Concern {
    Equals,
    Hash,
    Json,
    Rdf,
    Sparql,
}

impl Concern {
    pub const ALL: [Concern; 5] = [Self::Equals, Self::Hash, Self::Json, Self::Rdf, Self::Sparql];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum DeclarationType {
    #[default]
    Class,
    Interface,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GeneratorConfig {
    /// Concerns enabled for types that do not declare their own.
    pub features: BTreeSet<Concern>,
    pub identifier_property_name: String,
    pub discriminator_property_name: String,
    /// Prefix of IRIs minted by the content-hash strategy.
    pub content_hash_iri_prefix: String,
    pub declaration_type: DeclarationType,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            features: Concern::ALL.into_iter().collect(),
            identifier_property_name: "identifier".to_string(),
            discriminator_property_name: "type".to_string(),
            content_hash_iri_prefix: "urn:blake3:".to_string(),
            declaration_type: DeclarationType::Class,
        }
    }
}

impl GeneratorConfig {
    pub fn from_json_str(source: &str) -> Result<Self, ModelError> {
        crate::path_de::from_str_with_path(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config = GeneratorConfig::from_json_str(r#"{"discriminatorPropertyName": "kind"}"#)
            .unwrap();
        assert_eq!(config.discriminator_property_name, "kind");
        assert_eq!(config.identifier_property_name, "identifier");
        assert_eq!(config.features.len(), Concern::ALL.len());
    }

    #[test]
    fn unknown_concern_reports_path() {
        let error = GeneratorConfig::from_json_str(r#"{"features": ["equals", "xml"]}"#)
            .unwrap_err();
        match error {
            ModelError::Input { path, .. } => assert_eq!(path, "features[1]"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
