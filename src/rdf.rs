//! Minimal RDF term model: IRIs, blank nodes, literals and an in-memory
//! triple graph. Enough for identifiers, datatypes and graph encoding.
use std::collections::HashMap;
use std::fmt;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

// ————————————————————————————————————————————————————————————————————————————
// VOCABULARY
// ————————————————————————————————————————————————————————————————————————————

pub mod xsd {
    pub const NS: &str = "http://www.w3.org/2001/XMLSchema#";

    pub const ANY_URI: &str = "http://www.w3.org/2001/XMLSchema#anyURI";
    pub const BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
    pub const BYTE: &str = "http://www.w3.org/2001/XMLSchema#byte";
    pub const DATE: &str = "http://www.w3.org/2001/XMLSchema#date";
    pub const DATE_TIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";
    pub const DECIMAL: &str = "http://www.w3.org/2001/XMLSchema#decimal";
    pub const DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";
    pub const FLOAT: &str = "http://www.w3.org/2001/XMLSchema#float";
    pub const INT: &str = "http://www.w3.org/2001/XMLSchema#int";
    pub const INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
    pub const LONG: &str = "http://www.w3.org/2001/XMLSchema#long";
    pub const NEGATIVE_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#negativeInteger";
    pub const NON_NEGATIVE_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#nonNegativeInteger";
    pub const NON_POSITIVE_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#nonPositiveInteger";
    pub const NORMALIZED_STRING: &str = "http://www.w3.org/2001/XMLSchema#normalizedString";
    pub const POSITIVE_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#positiveInteger";
    pub const SHORT: &str = "http://www.w3.org/2001/XMLSchema#short";
    pub const STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
    pub const TOKEN: &str = "http://www.w3.org/2001/XMLSchema#token";
    pub const UNSIGNED_BYTE: &str = "http://www.w3.org/2001/XMLSchema#unsignedByte";
    pub const UNSIGNED_INT: &str = "http://www.w3.org/2001/XMLSchema#unsignedInt";
    pub const UNSIGNED_LONG: &str = "http://www.w3.org/2001/XMLSchema#unsignedLong";
    pub const UNSIGNED_SHORT: &str = "http://www.w3.org/2001/XMLSchema#unsignedShort";
}

pub mod rdf {
    pub const FIRST: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#first";
    pub const HTML: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#HTML";
    pub const JSON: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#JSON";
    pub const LANG_STRING: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";
    pub const NIL: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#nil";
    pub const REST: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#rest";
    pub const TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
    pub const XML_LITERAL: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#XMLLiteral";
}

// ————————————————————————————————————————————————————————————————————————————
// TERMS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Iri(String);

impl Iri {
    pub fn new(value: impl Into<String>) -> Self { Self(value.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Iri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.0)
    }
}

/// SHACL node kinds an identifier may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    BlankNode,
    Iri,
}

/// Subject-position term: the identity of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Identifier {
    BlankNode(String),
    Iri(Iri),
}

impl Identifier {
    /// `_:label` is a blank node, anything else an IRI.
    pub fn parse(value: &str) -> Self {
        match value.strip_prefix("_:") {
            Some(label) => Self::BlankNode(label.to_string()),
            None => Self::Iri(Iri::new(value)),
        }
    }

    pub fn node_kind(&self) -> NodeKind {
        match self {
            Self::BlankNode(_) => NodeKind::BlankNode,
            Self::Iri(_) => NodeKind::Iri,
        }
    }

    /// Compact string form used in JSON (`_:b0` or the bare IRI).
    pub fn to_json_string(&self) -> String {
        match self {
            Self::BlankNode(label) => format!("_:{label}"),
            Self::Iri(iri) => iri.as_str().to_string(),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BlankNode(label) => write!(f, "_:{label}"),
            Self::Iri(iri) => write!(f, "{iri}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Literal {
    pub lexical: String,
    pub datatype: Iri,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl Literal {
    pub fn typed(lexical: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self { lexical: lexical.into(), datatype: Iri::new(datatype), language: None }
    }

    pub fn string(lexical: impl Into<String>) -> Self {
        Self::typed(lexical, xsd::STRING)
    }

    pub fn lang_string(lexical: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            lexical: lexical.into(),
            datatype: Iri::new(rdf::LANG_STRING),
            language: Some(language.into()),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.lexical)?;
        match &self.language {
            Some(language) => write!(f, "@{language}"),
            None if self.datatype.as_str() == xsd::STRING => Ok(()),
            None => write!(f, "^^{}", self.datatype),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Term {
    Identifier(Identifier),
    Literal(Literal),
}

impl Term {
    pub fn iri(value: &str) -> Self { Self::Identifier(Identifier::Iri(Iri::new(value))) }

    pub fn as_identifier(&self) -> Option<&Identifier> {
        match self {
            Self::Identifier(identifier) => Some(identifier),
            Self::Literal(_) => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Self::Literal(literal) => Some(literal),
            Self::Identifier(_) => None,
        }
    }
}

impl From<Identifier> for Term {
    fn from(identifier: Identifier) -> Self { Self::Identifier(identifier) }
}

impl From<Literal> for Term {
    fn from(literal: Literal) -> Self { Self::Literal(literal) }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identifier(identifier) => write!(f, "{identifier}"),
            Self::Literal(literal) => write!(f, "{literal}"),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// GRAPH
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub subject: Identifier,
    pub predicate: Iri,
    pub object: Term,
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} .", self.subject, self.predicate, self.object)
    }
}

/// Insertion-ordered set of triples, indexed by subject and predicate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Triple>", into = "Vec<Triple>")]
pub struct Graph {
    triples: IndexSet<Triple>,
    by_subject_predicate: HashMap<(Identifier, Iri), Vec<usize>>,
}

impl Graph {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&mut self, subject: Identifier, predicate: Iri, object: Term) {
        let key = (subject, predicate);
        let triple = Triple { subject: key.0.clone(), predicate: key.1.clone(), object };
        let (index, inserted) = self.triples.insert_full(triple);
        if inserted {
            self.by_subject_predicate.entry(key).or_default().push(index);
        }
    }

    pub fn objects(&self, subject: &Identifier, predicate: &Iri) -> Vec<Term> {
        let Some(indices) = self.by_subject_predicate.get(&(subject.clone(), predicate.clone())) else {
            return Vec::new();
        };
        indices
            .iter()
            .filter_map(|index| self.triples.get_index(*index))
            .map(|t| t.object.clone())
            .collect()
    }

    pub fn has_type(&self, subject: &Identifier, class: &Iri) -> bool {
        let triple = Triple {
            subject: subject.clone(),
            predicate: Iri::new(rdf::TYPE),
            object: Term::Identifier(Identifier::Iri(class.clone())),
        };
        self.triples.contains(&triple)
    }

    pub fn triples(&self) -> impl Iterator<Item = &Triple> { self.triples.iter() }
    pub fn len(&self) -> usize { self.triples.len() }
    pub fn is_empty(&self) -> bool { self.triples.is_empty() }
}

impl FromIterator<Triple> for Graph {
    fn from_iter<I: IntoIterator<Item = Triple>>(iter: I) -> Self {
        let mut graph = Self::new();
        for Triple { subject, predicate, object } in iter {
            graph.insert(subject, predicate, object);
        }
        graph
    }
}

impl From<Vec<Triple>> for Graph {
    fn from(triples: Vec<Triple>) -> Self { triples.into_iter().collect() }
}

impl From<Graph> for Vec<Triple> {
    fn from(graph: Graph) -> Self { graph.triples.into_iter().collect() }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for triple in &self.triples {
            writeln!(f, "{triple}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_parse_distinguishes_blank_nodes() {
        assert_eq!(Identifier::parse("_:b0"), Identifier::BlankNode("b0".into()));
        assert_eq!(
            Identifier::parse("http://example.com/x"),
            Identifier::Iri(Iri::new("http://example.com/x"))
        );
        assert_eq!(Identifier::parse("_:b0").to_json_string(), "_:b0");
    }

    #[test]
    fn graph_insert_is_idempotent() {
        let mut graph = Graph::new();
        let subject = Identifier::parse("http://example.com/s");
        let predicate = Iri::new("http://example.com/p");
        graph.insert(subject.clone(), predicate.clone(), Literal::string("x").into());
        graph.insert(subject.clone(), predicate.clone(), Literal::string("x").into());
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.objects(&subject, &predicate), vec![Term::Literal(Literal::string("x"))]);
    }

    #[test]
    fn lookups_keep_insertion_order() {
        let subject = Identifier::parse("_:s");
        let predicate = Iri::new("http://example.com/p");
        let graph: Graph = vec![
            Triple { subject: subject.clone(), predicate: predicate.clone(), object: Literal::string("b").into() },
            Triple { subject: subject.clone(), predicate: Iri::new(rdf::TYPE), object: Term::iri("http://example.com/C") },
            Triple { subject: subject.clone(), predicate: predicate.clone(), object: Literal::string("a").into() },
            Triple { subject: subject.clone(), predicate: predicate.clone(), object: Literal::string("b").into() },
        ]
        .into();
        assert_eq!(graph.len(), 3);
        assert_eq!(
            graph.objects(&subject, &predicate),
            vec![Term::Literal(Literal::string("b")), Term::Literal(Literal::string("a"))]
        );
        assert!(graph.has_type(&subject, &Iri::new("http://example.com/C")));
        assert!(!graph.has_type(&Identifier::parse("_:other"), &Iri::new("http://example.com/C")));
        assert!(graph.objects(&Identifier::parse("_:other"), &predicate).is_empty());
    }

    #[test]
    fn literal_display_omits_xsd_string() {
        assert_eq!(Literal::string("a").to_string(), "\"a\"");
        assert_eq!(
            Literal::typed("1", xsd::INTEGER).to_string(),
            format!("\"1\"^^<{}>", xsd::INTEGER)
        );
        assert_eq!(Literal::lang_string("a", "en").to_string(), "\"a\"@en");
    }
}
