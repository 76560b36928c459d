//! A small in-memory `PackageLoader`/`Package` used by checker and evaluator
//! tests (and by the demonstration CLI when no real provider plugin is
//! configured). Mirrors the read-only package lookup surface without any of
//! the discovery/download machinery a real plugin-backed loader would need.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::types::Type;

use super::{Package, PackageError, PackageLoader, TypeHint};

/// A single resource or function schema entry.
#[derive(Debug, Clone, Default)]
pub struct SchemaEntry {
    pub inputs: Option<Type>,
    pub outputs: Option<Type>,
    pub is_component: bool,
    pub secret_properties: Vec<String>,
    pub constants: HashMap<String, serde_json::Value>,
}

/// A package assembled in-memory for tests: a fixed set of resource and
/// function tokens with their schemas, no I/O involved.
#[derive(Debug, Clone, Default)]
pub struct MockPackage {
    pub name: String,
    pub version: String,
    pub resources: HashMap<String, SchemaEntry>,
    pub functions: HashMap<String, SchemaEntry>,
}

impl MockPackage {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            resources: HashMap::new(),
            functions: HashMap::new(),
        }
    }

    pub fn with_resource(mut self, token: impl Into<String>, inputs: Type, outputs: Type) -> Self {
        self.resources.insert(
            token.into(),
            SchemaEntry {
                inputs: Some(inputs),
                outputs: Some(outputs),
                ..Default::default()
            },
        );
        self
    }

    pub fn with_function(mut self, token: impl Into<String>, inputs: Type, outputs: Type) -> Self {
        self.functions.insert(
            token.into(),
            SchemaEntry {
                inputs: Some(inputs),
                outputs: Some(outputs),
                ..Default::default()
            },
        );
        self
    }

    pub fn with_secret_property(mut self, token: impl Into<String>, property: impl Into<String>) -> Self {
        self.resources
            .entry(token.into())
            .or_default()
            .secret_properties
            .push(property.into());
        self
    }
}

/// Resolves a token written in a template against the three forms a package
/// may export it under: verbatim, `pkg:index:Name`, and the legacy
/// `pkg:mod/lowerName:Name` form.
fn resolve_token<'a>(table: &'a HashMap<String, SchemaEntry>, pkg: &str, token: &str) -> Option<(&'a str, &'a SchemaEntry)> {
    if let Some((k, v)) = table.get_key_value(token) {
        return Some((k.as_str(), v));
    }
    let parts: Vec<&str> = token.split(':').collect();
    if parts.len() == 2 {
        let index_form = format!("{}:index:{}", pkg, parts[1]);
        if let Some((k, v)) = table.get_key_value(index_form.as_str()) {
            return Some((k.as_str(), v));
        }
    }
    if parts.len() == 3 {
        let legacy = format!("{}:{}/{}:{}", pkg, parts[1], parts[2].to_lowercase(), parts[2]);
        if let Some((k, v)) = table.get_key_value(legacy.as_str()) {
            return Some((k.as_str(), v));
        }
    }
    None
}

#[async_trait]
impl Package for MockPackage {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn resolve_resource(&self, token: &str) -> Result<String, PackageError> {
        if token == format!("pulumi:providers:{}", self.name) {
            return Ok(token.to_string());
        }
        resolve_token(&self.resources, &self.name, token)
            .map(|(k, _)| k.to_string())
            .ok_or_else(|| PackageError::UnknownResource(token.to_string()))
    }

    fn resolve_function(&self, token: &str) -> Result<String, PackageError> {
        resolve_token(&self.functions, &self.name, token)
            .map(|(k, _)| k.to_string())
            .ok_or_else(|| PackageError::UnknownFunction(token.to_string()))
    }

    fn resource_type_hint(&self, canonical_token: &str) -> Result<TypeHint, PackageError> {
        let entry = self
            .resources
            .get(canonical_token)
            .ok_or_else(|| PackageError::UnknownResource(canonical_token.to_string()))?;
        Ok(TypeHint {
            inputs: entry.inputs.clone().unwrap_or(Type::Any),
            outputs: entry.outputs.clone().unwrap_or(Type::Any),
        })
    }

    fn function_type_hint(&self, canonical_token: &str) -> Result<TypeHint, PackageError> {
        let entry = self
            .functions
            .get(canonical_token)
            .ok_or_else(|| PackageError::UnknownFunction(canonical_token.to_string()))?;
        Ok(TypeHint {
            inputs: entry.inputs.clone().unwrap_or(Type::Any),
            outputs: entry.outputs.clone().unwrap_or(Type::Any),
        })
    }

    fn is_component(&self, canonical_token: &str) -> bool {
        self.resources.get(canonical_token).map(|e| e.is_component).unwrap_or(false)
    }

    fn is_resource_property_secret(&self, canonical_token: &str, property: &str) -> bool {
        self.resources
            .get(canonical_token)
            .map(|e| e.secret_properties.iter().any(|p| p == property))
            .unwrap_or(false)
    }

    fn resource_constants(&self, canonical_token: &str) -> HashMap<String, serde_json::Value> {
        self.resources
            .get(canonical_token)
            .map(|e| e.constants.clone())
            .unwrap_or_default()
    }
}

/// A `PackageLoader` backed by a fixed set of in-memory packages, keyed by
/// name. Never touches the filesystem or network.
#[derive(Default)]
pub struct MockPackageLoader {
    packages: HashMap<String, Arc<MockPackage>>,
}

impl MockPackageLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_package(mut self, pkg: MockPackage) -> Self {
        self.packages.insert(pkg.name.clone(), Arc::new(pkg));
        self
    }
}

#[async_trait]
impl PackageLoader for MockPackageLoader {
    async fn load(&self, package_name: &str, _version: Option<&str>) -> Result<Arc<dyn Package>, PackageError> {
        self.packages
            .get(package_name)
            .cloned()
            .map(|p| p as Arc<dyn Package>)
            .ok_or_else(|| PackageError::UnknownResource(package_name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loads_registered_package() {
        let loader = MockPackageLoader::new().with_package(MockPackage::new("test", "1.0.0"));
        let pkg = loader.load("test", None).await.unwrap();
        assert_eq!(pkg.name(), "test");
    }

    #[test]
    fn resolve_resource_tries_index_form() {
        let pkg = MockPackage::new("aws", "1.0.0").with_resource("aws:index:Bucket", Type::Any, Type::Any);
        assert_eq!(pkg.resolve_resource("aws:Bucket").unwrap(), "aws:index:Bucket");
    }

    #[test]
    fn resolve_resource_unknown_is_error() {
        let pkg = MockPackage::new("aws", "1.0.0");
        assert!(pkg.resolve_resource("aws:s3:Bucket").is_err());
    }
}
