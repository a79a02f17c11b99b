//! Query fragments: CONSTRUCT template triples and WHERE graph patterns.
use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::rdf::{Iri, Literal, rdf};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TermPattern {
    Variable(String),
    Iri(Iri),
    Literal(Literal),
}

impl TermPattern {
    pub fn variable(name: impl Into<String>) -> Self { Self::Variable(name.into()) }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PropertyPath {
    Iri(Iri),
    Sequence(Vec<PropertyPath>),
    ZeroOrMore(Box<PropertyPath>),
}

impl PropertyPath {
    pub fn iri(value: &str) -> Self { Self::Iri(Iri::new(value)) }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriplePattern {
    pub subject: TermPattern,
    pub predicate: PropertyPath,
    pub object: TermPattern,
}

impl TriplePattern {
    pub fn new(subject: TermPattern, predicate: PropertyPath, object: TermPattern) -> Self {
        Self { subject, predicate, object }
    }

    pub fn rdf_type(variable: &str, class: &Iri) -> Self {
        Self::new(
            TermPattern::variable(variable),
            PropertyPath::iri(rdf::TYPE),
            TermPattern::Iri(class.clone()),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", content = "patterns", rename_all = "camelCase")]
pub enum Pattern {
    Triple(TriplePattern),
    Optional(Vec<Pattern>),
    /// Alternatives, one group per branch.
    Union(Vec<Vec<Pattern>>),
}

/// Query fragment for one variable bound to values of one type.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SparqlFragment {
    pub construct_template: Vec<TriplePattern>,
    pub where_patterns: Vec<Pattern>,
}

impl SparqlFragment {
    pub fn is_empty(&self) -> bool {
        self.construct_template.is_empty() && self.where_patterns.is_empty()
    }

    pub fn extend(&mut self, other: SparqlFragment) {
        for triple in other.construct_template {
            if !self.construct_template.contains(&triple) {
                self.construct_template.push(triple);
            }
        }
        self.where_patterns.extend(other.where_patterns);
    }

    /// `CONSTRUCT { ... } WHERE { ... }` text.
    pub fn to_construct_query(&self) -> String {
        let mut out = String::from("CONSTRUCT {\n");
        for triple in &self.construct_template {
            out.push_str(&format!("  {triple}\n"));
        }
        out.push_str("} WHERE {\n");
        for pattern in &self.where_patterns {
            write_pattern(&mut out, pattern, 1);
        }
        out.push('}');
        out
    }
}

/// `subjectName` style variable for a property of `subject`. Characters a
/// SPARQL variable cannot hold split the name into camel-cased words.
pub fn property_variable(subject: &str, property_name: &str) -> String {
    let mut out = subject.to_string();
    for word in property_name.split(|c: char| !(c.is_alphanumeric() || c == '_')) {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

/// Variables already bound under one subject. Property names that map to
/// the same variable get a numeric suffix.
#[derive(Debug, Default)]
pub struct VariableScope {
    taken: HashSet<String>,
}

impl VariableScope {
    pub fn new(subject: &str) -> Self {
        Self { taken: HashSet::from([subject.to_string()]) }
    }

    pub fn property_variable(&mut self, subject: &str, property_name: &str) -> String {
        let base = property_variable(subject, property_name);
        let mut variable = base.clone();
        let mut suffix = 1;
        while !self.taken.insert(variable.clone()) {
            suffix += 1;
            variable = format!("{base}{suffix}");
        }
        variable
    }
}

// ------------------------------- Display ---------------------------------- //

impl fmt::Display for TermPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Variable(name) => write!(f, "?{name}"),
            Self::Iri(iri) => write!(f, "{iri}"),
            Self::Literal(literal) => write!(f, "{literal}"),
        }
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Iri(iri) => write!(f, "{iri}"),
            Self::Sequence(steps) => {
                let steps = steps.iter().map(|s| s.to_string()).collect::<Vec<_>>();
                write!(f, "{}", steps.join("/"))
            }
            Self::ZeroOrMore(inner) => write!(f, "({inner})*"),
        }
    }
}

impl fmt::Display for TriplePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} .", self.subject, self.predicate, self.object)
    }
}

fn write_pattern(out: &mut String, pattern: &Pattern, depth: usize) {
    let indent = "  ".repeat(depth);
    match pattern {
        Pattern::Triple(triple) => out.push_str(&format!("{indent}{triple}\n")),
        Pattern::Optional(patterns) => {
            out.push_str(&format!("{indent}OPTIONAL {{\n"));
            for p in patterns {
                write_pattern(out, p, depth + 1);
            }
            out.push_str(&format!("{indent}}}\n"));
        }
        Pattern::Union(branches) => {
            for (i, branch) in branches.iter().enumerate() {
                if i > 0 {
                    out.push_str(&format!("{indent}UNION\n"));
                }
                out.push_str(&format!("{indent}{{\n"));
                for p in branch {
                    write_pattern(out, p, depth + 1);
                }
                out.push_str(&format!("{indent}}}\n"));
            }
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        write_pattern(&mut out, self, 0);
        write!(f, "{}", out.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_variables_are_camel_cased() {
        assert_eq!(property_variable("dog", "name"), "dogName");
        assert_eq!(property_variable("dog", "date-of-birth"), "dogDateOfBirth");
        assert_eq!(property_variable("dog", "owner.name"), "dogOwnerName");
        assert_eq!(property_variable("dog", "snake_case"), "dogSnake_case");
        assert_eq!(property_variable("dog", ""), "dog");
    }

    #[test]
    fn colliding_property_variables_get_suffixes() {
        let mut scope = VariableScope::new("dog");
        assert_eq!(scope.property_variable("dog", "name"), "dogName");
        assert_eq!(scope.property_variable("dog", "Name"), "dogName2");
        assert_eq!(scope.property_variable("dog", "na-me"), "dogNaMe");
        assert_eq!(scope.property_variable("dog", ""), "dog2");
    }

    #[test]
    fn optional_renders_nested_block() {
        let triple = TriplePattern::new(
            TermPattern::variable("s"),
            PropertyPath::iri("http://example.com/p"),
            TermPattern::variable("o"),
        );
        let rendered = Pattern::Optional(vec![Pattern::Triple(triple)]).to_string();
        assert_eq!(rendered, "OPTIONAL {\n  ?s <http://example.com/p> ?o .\n}");
    }

    #[test]
    fn list_path_renders_with_star() {
        let path = PropertyPath::Sequence(vec![
            PropertyPath::ZeroOrMore(Box::new(PropertyPath::iri(rdf::REST))),
            PropertyPath::iri(rdf::FIRST),
        ]);
        assert_eq!(path.to_string(), format!("(<{}>)*/<{}>", rdf::REST, rdf::FIRST));
    }
}
