//! Whole-pipeline scenarios: parse -> fold -> check -> evaluate against an
//! in-memory package and orchestrator, with no real provider or RPC
//! connection involved.

use std::sync::Arc;

use yamlrt::ast::fold_template;
use yamlrt::diagnostics::Diagnostics;
use yamlrt::eval::{run_template, EvalOptions, MapConfigSource, MockOrchestrator, Value};
use yamlrt::schema::testing::{MockPackage, MockPackageLoader};
use yamlrt::schema::{Package, PackageLoader};
use yamlrt::syntax::parse_document;
use yamlrt::types::{check_template, SchemaLookup, Type};

/// Adapts a resolved `Package` into the checker's synchronous lookup,
/// same shape as the demonstration CLI's own adapter.
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

async fn parse_and_check(source: &str, package: &dyn Package) -> (yamlrt::ast::Template, Diagnostics) {
    let (doc, parse_diags) = parse_document(source, "test.yaml");
    let (template, fold_diags) = fold_template(&doc, "test.yaml");
    let mut diags = Diagnostics::new();
    diags.extend(parse_diags);
    diags.extend(fold_diags);
    diags.extend(check_template(&template, &PackageSchemaLookup(package)));
    (template, diags)
}

fn any_typed_package(name: &str) -> MockPackage {
    MockPackage::new(name, "1.0.0").with_resource("test:resource:t", Type::Any, Type::Any)
}

#[tokio::test]
async fn scenario_1_property_access_exports_resolved_value() {
    let source = r#"
name: test-program
resources:
  r:
    type: test:resource:t
    properties:
      foo: oof
outputs:
  o: ${r.bar}
"#;
    let package = any_typed_package("test");
    let (template, diags) = parse_and_check(source, &package).await;
    assert!(!diags.has_errors(), "unexpected diagnostics: {:?}", diags);

    let orchestrator =
        MockOrchestrator::new().with_resource_outputs("r", vec![("bar".to_string(), Value::String("oof".to_string()))]);
    let config = MapConfigSource::new();
    let outcome = run_template(
        &template,
        Arc::new(package) as Arc<dyn Package>,
        &orchestrator,
        &config,
        EvalOptions::default(),
    )
    .await;

    assert!(!outcome.diagnostics.has_errors(), "unexpected diagnostics: {:?}", outcome.diagnostics);
    assert_eq!(outcome.exports, vec![("o".to_string(), Value::String("oof".to_string()))]);
}

#[tokio::test]
async fn scenario_2_config_and_resource_name_collision_is_a_single_error() {
    let source = r#"
name: test-program
config:
  foo:
    type: string
resources:
  foo:
    type: test:resource:t
    properties: {}
"#;
    let package = any_typed_package("test");
    let (_, diags) = parse_and_check(source, &package).await;

    let errors: Vec<&str> = diags.iter().filter(|d| d.is_error()).map(|d| d.summary.as_str()).collect();
    assert_eq!(errors.len(), 1, "expected exactly one collision error, got {:?}", errors);
    assert!(errors[0].contains("foo"));
}

#[tokio::test]
async fn scenario_5_nested_list_index_then_property_resolves() {
    let source = r#"
name: test-program
resources:
  resA:
    type: test:resource:t
    properties: {}
outputs:
  o: ${resA.outList[0].value}
"#;
    let package = any_typed_package("test");
    let (template, diags) = parse_and_check(source, &package).await;
    assert!(!diags.has_errors(), "unexpected diagnostics: {:?}", diags);

    let out_list = Value::List(vec![
        Value::Map(vec![("value".to_string(), Value::Number(42.0))]),
        Value::Map(vec![("value".to_string(), Value::Number(24.0))]),
    ]);
    let orchestrator = MockOrchestrator::new().with_resource_outputs("resA", vec![("outList".to_string(), out_list)]);
    let config = MapConfigSource::new();
    let outcome = run_template(
        &template,
        Arc::new(package) as Arc<dyn Package>,
        &orchestrator,
        &config,
        EvalOptions::default(),
    )
    .await;

    assert!(!outcome.diagnostics.has_errors(), "unexpected diagnostics: {:?}", outcome.diagnostics);
    assert_eq!(outcome.exports, vec![("o".to_string(), Value::Number(42.0))]);
}

#[tokio::test]
async fn scenario_6_from_base64_rejects_invalid_utf8() {
    use base64::Engine;
    let encoded = base64::engine::general_purpose::STANDARD.encode([0xc3, 0x28]);
    let source = format!(
        r#"
name: test-program
outputs:
  o:
    fn::fromBase64: "{encoded}"
"#
    );
    let package = any_typed_package("test");
    let (template, diags) = parse_and_check(&source, &package).await;
    assert!(!diags.has_errors(), "unexpected diagnostics: {:?}", diags);

    let orchestrator = MockOrchestrator::new();
    let config = MapConfigSource::new();
    let outcome = run_template(
        &template,
        Arc::new(package) as Arc<dyn Package>,
        &orchestrator,
        &config,
        EvalOptions::default(),
    )
    .await;

    assert!(outcome.diagnostics.has_errors());
    assert!(outcome.exports.is_empty());
}

#[tokio::test]
async fn dependency_cycle_between_variables_is_rejected() {
    let source = r#"
name: test-program
variables:
  a: ${b}
  b: ${a}
"#;
    let package = any_typed_package("test");
    let (template, _diags) = parse_and_check(source, &package).await;

    let orchestrator = MockOrchestrator::new();
    let config = MapConfigSource::new();
    let outcome = run_template(
        &template,
        Arc::new(package) as Arc<dyn Package>,
        &orchestrator,
        &config,
        EvalOptions::default(),
    )
    .await;

    assert!(outcome.diagnostics.has_errors());
}

#[tokio::test]
async fn unknown_resource_property_reports_fuzzy_suggestion() {
    let source = r#"
name: test-program
resources:
  r:
    type: test:typed:Thing
    properties:
      nam: hello
"#;
    let package = MockPackage::new("test", "1.0.0").with_resource(
        "test:typed:Thing",
        Type::Object(vec![yamlrt::types::Property { name: "name".to_string(), type_: Type::String, required: true }]),
        Type::Any,
    );
    let (_, diags) = parse_and_check(source, &package).await;

    let errors: Vec<&str> = diags.iter().filter(|d| d.is_error()).map(|d| d.summary.as_str()).collect();
    assert!(errors.iter().any(|e| e.contains("nam")), "expected an unknown-property error, got {:?}", errors);
}

#[tokio::test]
async fn loading_package_through_loader_resolves_legacy_token_forms() {
    let loader = MockPackageLoader::new().with_package(any_typed_package("test"));
    let package = loader.load("test", None).await.expect("package should load");
    assert_eq!(package.name(), "test");
    assert!(package.resolve_resource("test:resource:t").is_ok());
}
