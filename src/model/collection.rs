use crate::fragment::{Conversion, ConversionExpr, Fragment, SourceCheck};
use crate::model::{ObjectTypeId, Type, TypeModel};
use crate::rdf::rdf;
use crate::sparql::{Pattern, PropertyPath, SparqlFragment, TermPattern, TriplePattern};

/// An RDF list. Produced for object shapes that declare a list item type.
#[derive(Debug, Clone)]
pub struct ListType {
    pub(crate) name: Option<String>,
    pub(crate) item: Box<Type>,
    pub(crate) mutable: bool,
}

/// Zero or more values, one triple each.
#[derive(Debug, Clone)]
pub struct SetType {
    pub(crate) item: Box<Type>,
    pub(crate) min_count: u32,
}

/// Zero or one value.
#[derive(Debug, Clone)]
pub struct OptionType {
    pub(crate) item: Box<Type>,
}

impl ListType {
    pub fn item(&self) -> &Type { &self.item }

    pub fn name(&self, model: &TypeModel) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("List<{}>", self.item.name(model)),
        }
    }

    pub fn conversions(&self, _model: &TypeModel) -> Vec<Conversion> {
        vec![
            Conversion::identity("array", SourceCheck::Array),
            Conversion::new("undefined", SourceCheck::Absent, ConversionExpr::EmptyList),
        ]
    }

    /// `?list rdf:rest*` walks every cell; each cell contributes its
    /// `rdf:first` / `rdf:rest` pair to the template.
    pub fn sparql_fragment(
        &self,
        model: &TypeModel,
        variable: &str,
        visiting: &mut Vec<ObjectTypeId>,
    ) -> SparqlFragment {
        let cell = format!("{variable}Cell");
        let item = format!("{variable}Item");
        let rest = format!("{variable}Rest");
        let first_triple = TriplePattern::new(
            TermPattern::variable(&cell),
            PropertyPath::iri(rdf::FIRST),
            TermPattern::variable(&item),
        );
        let rest_triple = TriplePattern::new(
            TermPattern::variable(&cell),
            PropertyPath::iri(rdf::REST),
            TermPattern::variable(&rest),
        );

        let mut out = SparqlFragment {
            construct_template: vec![first_triple.clone(), rest_triple.clone()],
            where_patterns: vec![
                Pattern::Triple(TriplePattern::new(
                    TermPattern::variable(variable),
                    PropertyPath::ZeroOrMore(Box::new(PropertyPath::iri(rdf::REST))),
                    TermPattern::variable(&cell),
                )),
                Pattern::Triple(first_triple),
                Pattern::Triple(rest_triple),
            ],
        };
        out.extend(self.item.sparql_fragment(model, &item, visiting));
        out
    }
}

impl SetType {
    pub fn item(&self) -> &Type { &self.item }
    pub fn min_count(&self) -> u32 { self.min_count }

    pub fn name(&self, model: &TypeModel) -> String {
        format!("Set<{}>", self.item.name(model))
    }

    pub fn conversions(&self, _model: &TypeModel) -> Vec<Conversion> {
        let mut out = vec![Conversion::identity("array", SourceCheck::Array)];
        if self.min_count == 0 {
            out.push(Conversion::new("undefined", SourceCheck::Absent, ConversionExpr::EmptyList));
        }
        out
    }

    pub(crate) fn wrap<Op>(&self, item: Fragment<Op>) -> Fragment<Op> {
        Fragment::Set { item: Box::new(item), min_count: self.min_count }
    }
}

impl OptionType {
    pub fn item(&self) -> &Type { &self.item }

    pub fn name(&self, model: &TypeModel) -> String {
        format!("Option<{}>", self.item.name(model))
    }

    /// Absent passes through; anything else goes through the item's chain.
    pub fn conversions(&self, model: &TypeModel) -> Vec<Conversion> {
        let mut out = vec![Conversion::identity("undefined", SourceCheck::Absent)];
        out.extend(
            self.item
                .conversions(model)
                .into_iter()
                .filter(|c| c.source_check != SourceCheck::Absent),
        );
        out
    }
}
