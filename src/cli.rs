//! A thin CLI that wires the pipeline (parse → fold → check → evaluate)
//! end to end for manual smoke-testing. It is not the deliverable: a real
//! host embeds the library directly and supplies its own `PackageLoader`/
//! `OrchestratorClient` backed by real provider plugins and a real
//! orchestrator RPC connection.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use colored::Colorize;

use yamlrt::diagnostics::Diagnostics;
use yamlrt::eval::{run_template, EvalOptions, MapConfigSource, MockOrchestrator};
use yamlrt::graph::{build_graph, topological_order};
use yamlrt::schema::{Package, PackageError, PackageLoader, TypeHint};
use yamlrt::syntax::parse_document;
use yamlrt::types::{check_template, SchemaLookup, Type};
use yamlrt::ast::fold_template;

/// A permissive package that accepts any resource/function token verbatim
/// and types everything `any` — good enough to smoke-test the pipeline
/// against a template without hand-writing a schema fixture, but never a
/// stand-in for a real provider's structural types.
struct DemoPackage {
    name: String,
}

#[async_trait]
impl Package for DemoPackage {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        "0.0.0"
    }

    fn resolve_resource(&self, token: &str) -> Result<String, PackageError> {
        Ok(token.to_string())
    }

    fn resolve_function(&self, token: &str) -> Result<String, PackageError> {
        Ok(token.to_string())
    }

    fn resource_type_hint(&self, _canonical_token: &str) -> Result<TypeHint, PackageError> {
        Ok(TypeHint { inputs: Type::Any, outputs: Type::Any })
    }

    fn function_type_hint(&self, _canonical_token: &str) -> Result<TypeHint, PackageError> {
        Ok(TypeHint { inputs: Type::Any, outputs: Type::Any })
    }

    fn is_component(&self, _canonical_token: &str) -> bool {
        false
    }

    fn is_resource_property_secret(&self, _canonical_token: &str, _property: &str) -> bool {
        false
    }

    fn resource_constants(&self, _canonical_token: &str) -> HashMap<String, serde_json::Value> {
        HashMap::new()
    }
}

struct DemoPackageLoader;

#[async_trait]
impl PackageLoader for DemoPackageLoader {
    async fn load(&self, package_name: &str, _version: Option<&str>) -> Result<Arc<dyn Package>, PackageError> {
        Ok(Arc::new(DemoPackage { name: package_name.to_string() }))
    }
}

/// Adapts a resolved `Package` into the synchronous lookup the type
/// checker wants, resolving every token to the package's blanket `any`
/// hint rather than a real structural schema.
struct PackageSchemaLookup<'a>(&'a dyn Package);

impl SchemaLookup for PackageSchemaLookup<'_> {
    fn resource_input_type(&self, type_token: &str) -> Option<Type> {
        let canonical = self.0.resolve_resource(type_token).ok()?;
        self.0.resource_type_hint(&canonical).ok().map(|h| h.inputs)
    }

    fn resource_output_type(&self, type_token: &str) -> Option<Type> {
        let canonical = self.0.resolve_resource(type_token).ok()?;
        self.0.resource_type_hint(&canonical).ok().map(|h| h.outputs)
    }
}

/// Parses, folds, type-checks, and graph-validates `path` (name collisions,
/// dependency cycles), printing diagnostics. Returns `true` if no errors
/// were found. Does not evaluate or register anything — see [`run`] for that.
pub async fn check(path: &Path) -> anyhow::Result<bool> {
    let source = std::fs::read_to_string(path)?;
    let file_name = path.to_string_lossy().to_string();
    let (doc, parse_diags) = parse_document(&source, &file_name);
    let (template, fold_diags) = fold_template(&doc, &file_name);

    let package_name = template
        .resources
        .first()
        .map(|(_, r)| yamlrt::schema::package_name_of(&r.type_token).to_string())
        .unwrap_or_else(|| template.name.clone());
    let package = DemoPackageLoader.load(&package_name, None).await?;

    let mut diags = Diagnostics::new();
    diags.extend(parse_diags);
    diags.extend(fold_diags);
    diags.extend(check_template(&template, &PackageSchemaLookup(package.as_ref())));

    let built = build_graph(&template);
    let graph_diags = built.diagnostics.clone();
    diags.extend(graph_diags);
    if let Err(cycle_diags) = topological_order(&built) {
        diags.extend(cycle_diags);
    }

    print_diagnostics(&diags, &file_name);
    Ok(!diags.has_errors())
}

/// Runs the full evaluator over `path` against an in-memory orchestrator,
/// printing every export. `preview` mirrors the preview/apply distinction
/// for config resolution and resource registration.
pub async fn run(path: &Path, preview: bool, config: Vec<(String, String)>) -> anyhow::Result<bool> {
    let source = std::fs::read_to_string(path)?;
    let file_name = path.to_string_lossy().to_string();
    let (doc, parse_diags) = parse_document(&source, &file_name);
    let (template, fold_diags) = fold_template(&doc, &file_name);

    let package_name = template
        .resources
        .first()
        .map(|(_, r)| yamlrt::schema::package_name_of(&r.type_token).to_string())
        .unwrap_or_else(|| template.name.clone());
    let package = DemoPackageLoader.load(&package_name, None).await?;

    let mut config_source = MapConfigSource::new();
    for (k, v) in config {
        config_source = config_source.with(k, v);
    }
    let orchestrator = MockOrchestrator::new();
    let cwd = path.parent().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));

    let outcome = run_template(
        &template,
        package,
        &orchestrator,
        &config_source,
        EvalOptions { preview, cwd, allow_external_paths: false },
    )
    .await;

    let mut diags = Diagnostics::new();
    diags.extend(parse_diags);
    diags.extend(fold_diags);
    diags.extend(outcome.diagnostics);
    print_diagnostics(&diags, &file_name);

    for (name, value) in &outcome.exports {
        println!("{} {} = {}", "export".green().bold(), name, value.to_json());
    }

    Ok(!diags.has_errors())
}

fn print_diagnostics(diags: &Diagnostics, file_name: &str) {
    if diags.is_empty() {
        return;
    }
    for d in diags {
        let label = if d.is_error() { "error".red().bold() } else { "warning".yellow().bold() };
        match &d.range {
            Some(r) if !r.file.is_empty() => println!("{}: {}:{}:{}: {}", label, r.file, r.start_line, r.start_col, d.summary),
            _ => println!("{}: {}: {}", label, file_name, d.summary),
        }
        if let Some(detail) = &d.detail {
            println!("  {}", detail);
        }
    }
}
