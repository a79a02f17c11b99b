//! Minimal CLI: shapes → (model | fragments | check)
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;

use crate::ast::AstForest;
use crate::config::{Concern, DeclarationType, GeneratorConfig};
use crate::model::{Declaration, Type, TypeModel};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// build a type model from node/property shape trees and print its
/// declarations or per-concern fragments
#[derive(Parser, Debug)]
#[command(name = "shape-typemodel", version)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// print declaration metadata as JSON
    Model(ModelOut),
    /// print per-concern fragments as JSON
    Fragments(FragmentsOut),
    /// build the model and print a summary
    Check(CheckOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// One or more shape tree files. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,

    /// generator configuration (JSON); flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// concerns enabled for types that do not declare their own
    #[arg(long, value_enum, num_args = 1..)]
    features: Option<Vec<Concern>>,

    #[arg(long)]
    identifier_property_name: Option<String>,

    #[arg(long)]
    discriminator_property_name: Option<String>,

    /// prefix of IRIs minted from content hashes
    #[arg(long)]
    content_hash_iri_prefix: Option<String>,

    #[arg(long, value_enum)]
    declaration_type: Option<DeclarationType>,
}

#[derive(clap::Parser, Debug)]
struct ModelOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct FragmentsOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// concerns to print (all if omitted)
    #[arg(long, value_enum, num_args = 1..)]
    concern: Vec<Concern>,

    /// print SPARQL CONSTRUCT queries instead of JSON
    #[arg(long)]
    query: bool,

    /// output file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct CheckOut {
    #[command(flatten)]
    input_settings: InputSettings,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn load_config(&self) -> anyhow::Result<GeneratorConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let source = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config file {}", path.display()))?;
                GeneratorConfig::from_json_str(&source)
                    .with_context(|| format!("invalid config file {}", path.display()))?
            }
            None => GeneratorConfig::default(),
        };
        if let Some(features) = &self.features {
            config.features = features.iter().copied().collect();
        }
        if let Some(name) = &self.identifier_property_name {
            config.identifier_property_name = name.clone();
        }
        if let Some(name) = &self.discriminator_property_name {
            config.discriminator_property_name = name.clone();
        }
        if let Some(prefix) = &self.content_hash_iri_prefix {
            config.content_hash_iri_prefix = prefix.clone();
        }
        if let Some(declaration_type) = self.declaration_type {
            config.declaration_type = declaration_type;
        }
        Ok(config)
    }

    /// Every input merged into one forest, in argument order.
    fn load_forest(&self) -> anyhow::Result<AstForest> {
        let source_paths = resolve_file_path_patterns(&self.input)?;
        let mut forest = AstForest::default();
        for source_path in source_paths {
            let source = std::fs::read_to_string(&source_path)
                .with_context(|| format!("failed to read source file {}", source_path.display()))?;
            let part = AstForest::from_json_str(&source)
                .with_context(|| format!("failed to parse shape tree {}", source_path.display()))?;
            tracing::debug!(path = %source_path.display(), nodes = part.nodes.len(), "loaded shape tree");
            forest.merge(part);
        }
        Ok(forest)
    }

    fn load_model(&self) -> anyhow::Result<TypeModel> {
        let config = self.load_config()?;
        let forest = self.load_forest()?;
        TypeModel::from_ast(&forest, &config).context("failed to build the type model")
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> anyhow::Result<()> {
        match &self.cmd {
            Command::Model(target) => {
                let model = target.input_settings.load_model()?;
                let declarations = model.declarations(&BTreeSet::new());
                let source = serde_json::to_string_pretty(&declarations)?;
                write_output(target.out.as_deref(), &source)
            }
            Command::Fragments(target) => {
                let model = target.input_settings.load_model()?;
                let concerns: BTreeSet<Concern> = if target.concern.is_empty() {
                    Concern::ALL.into_iter().collect()
                } else {
                    target.concern.iter().copied().collect()
                };
                let source = if target.query {
                    sparql_queries(&model)
                } else {
                    let fragments = model
                        .declarations(&concerns)
                        .iter()
                        .map(|declaration| fragments_only(declaration, &concerns))
                        .collect::<Result<Vec<_>, _>>()?;
                    serde_json::to_string_pretty(&fragments)?
                };
                write_output(target.out.as_deref(), &source)
            }
            Command::Check(target) => {
                let model = target.input_settings.load_model()?;
                print_summary(&model);
                Ok(())
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

/// The declaration's name and its fragment entries, nothing else.
fn fragments_only(declaration: &Declaration, concerns: &BTreeSet<Concern>) -> anyhow::Result<serde_json::Value> {
    let serde_json::Value::Object(full) = serde_json::to_value(declaration)? else {
        bail!("declaration did not serialize to an object");
    };
    let concern_keys: BTreeSet<String> = concerns.iter().map(|c| format!("{c:?}").to_lowercase()).collect();
    let keep = |key: &str| key == "name" || key == "kind" || concern_keys.contains(key);
    Ok(serde_json::Value::Object(full.into_iter().filter(|(key, _)| keep(key)).collect()))
}

fn sparql_queries(model: &TypeModel) -> String {
    let mut out = String::new();
    for object_type in model.object_types() {
        if !object_type.features().contains(&Concern::Sparql) {
            continue;
        }
        let fragment = object_type.sparql_fragment(model, "subject", &mut Vec::new());
        out.push_str(&format!("# {}\n{}\n\n", object_type.name(), fragment.to_construct_query()));
    }
    out
}

fn print_summary(model: &TypeModel) {
    let unions = model.roots().iter().filter(|root| matches!(root, Type::Union(_))).count();
    println!(
        "{} {} object types, {} unions",
        "ok".green().bold(),
        model.object_types().len(),
        unions,
    );
    for object_type in model.object_types() {
        let mut flags = Vec::new();
        if object_type.abstract_() {
            flags.push("abstract".yellow().to_string());
        }
        if object_type.mutable(model) {
            flags.push("mutable".cyan().to_string());
        }
        if object_type.extern_() {
            flags.push("extern".dimmed().to_string());
        }
        let parent = object_type
            .parent(model)
            .map(|parent| format!(" : {}", parent.name()))
            .unwrap_or_default();
        println!("  {}{} {}", object_type.name().bold(), parent, flags.join(" "));
    }
}

fn write_output(out: Option<&Path>, source: &str) -> anyhow::Result<()> {
    match out {
        Some(out) => {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            std::fs::write(out, source).with_context(|| format!("failed to write {}", out.display()))
        }
        None => {
            println!("{source}");
            Ok(())
        }
    }
}

fn resolve_file_path_patterns<I>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_the_config_file() {
        let cli = CommandLineInterface::try_parse_from([
            "shape-typemodel",
            "check",
            "-i",
            "shapes.json",
            "--discriminator-property-name",
            "kind",
            "--features",
            "equals",
            "json",
        ])
        .unwrap();
        let Command::Check(target) = cli.cmd else { panic!("expected the check command") };
        let config = target.input_settings.load_config().unwrap();
        assert_eq!(config.discriminator_property_name, "kind");
        assert_eq!(config.features, BTreeSet::from([Concern::Equals, Concern::Json]));
        assert_eq!(config.identifier_property_name, "identifier");
    }

    #[test]
    fn unmatched_glob_is_an_error() {
        assert!(resolve_file_path_patterns(["/definitely/not/here/*.json"]).is_err());
        assert_eq!(resolve_file_path_patterns(["a.json"]).unwrap(), vec![PathBuf::from("a.json")]);
    }
}
