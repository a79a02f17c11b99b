//! Type model for a shape-driven schema compiler.
//!
//! An [`ast::AstForest`] of node and property shapes is lowered by
//! [`model::factory`] into a [`model::TypeModel`]. Every type in the model
//! answers the same questions for each code-generation concern (equality,
//! hashing, JSON, RDF, SPARQL) as [`fragment`]s; [`runtime`] executes those
//! fragments over dynamic values.
pub mod ast;
pub mod cli;
pub mod config;
pub mod error;
pub mod fragment;
pub mod model;
pub mod path_de;
pub mod rdf;
pub mod runtime;
pub mod sparql;
pub mod value;

pub use config::{Concern, GeneratorConfig};
pub use error::ModelError;
pub use model::TypeModel;
pub use runtime::{EvalError, Evaluator};
