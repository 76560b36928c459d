//! The package interface (spec component C): a structural description of a
//! provider's resources and functions, consumed by the type checker and the
//! evaluator. Discovering, downloading, and caching real provider plugins is
//! out of scope — this module only describes the read-only lookup surface a
//! loaded package exposes, modeled on the lock/cache shape of
//! `provider::manager::ProviderManager` in the engine this crate grew out
//! of, reduced to what the checker and evaluator actually need.

pub mod testing;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use tracing::debug;

use crate::types::Type;

/// A structural description of a resource's inputs and outputs, or a
/// function's arguments and return value.
#[derive(Debug, Clone)]
pub struct TypeHint {
    pub inputs: Type,
    pub outputs: Type,
}

/// Errors a package can report while resolving a token or schema.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PackageError {
    #[error("unknown resource type `{0}`")]
    UnknownResource(String),
    #[error("unknown function `{0}`")]
    UnknownFunction(String),
}

/// A loaded provider package: name, version, and the structural schema of
/// every resource/function token it exports.
#[async_trait]
pub trait Package: Send + Sync {
    fn name(&self) -> &str;
    fn version(&self) -> &str;

    /// Resolves a type token written in a template to its canonical form,
    /// trying the token verbatim, then `pkg:index:Name`, then the legacy
    /// `pkg:mod/lowerName:Name` form. `pulumi:providers:pkg` is always a
    /// valid resource token (the provider resource itself).
    fn resolve_resource(&self, token: &str) -> Result<String, PackageError>;

    /// Analogous resolution for invoke function tokens.
    fn resolve_function(&self, token: &str) -> Result<String, PackageError>;

    fn resource_type_hint(&self, canonical_token: &str) -> Result<TypeHint, PackageError>;
    fn function_type_hint(&self, canonical_token: &str) -> Result<TypeHint, PackageError>;

    fn is_component(&self, canonical_token: &str) -> bool;
    fn is_resource_property_secret(&self, canonical_token: &str, property: &str) -> bool;

    /// Provider-injected constant inputs merged into every instance of a
    /// resource type (e.g. a region baked into a provider's own schema).
    fn resource_constants(&self, canonical_token: &str) -> HashMap<String, serde_json::Value>;
}

/// Resolves the package that owns a `pkg:mod:Name` token and hands back a
/// `Package` to query. A real implementation would spawn/attach to a
/// provider plugin; this crate only defines the seam.
#[async_trait]
pub trait PackageLoader: Send + Sync {
    async fn load(&self, package_name: &str, version: Option<&str>) -> Result<Arc<dyn Package>, PackageError>;
}

/// A `PackageLoader` that caches loaded packages behind a concurrent map,
/// keyed by `name@version`, mirroring `ProviderManager::schemas`'s
/// lock-guarded `HashMap` cache but using `dashmap` instead of a
/// `Mutex<HashMap>` since lookups here are read-mostly and never block on
/// network I/O once a package is resolved once.
pub struct CachingPackageLoader<L: PackageLoader> {
    inner: L,
    cache: DashMap<String, Arc<dyn Package>>,
}

impl<L: PackageLoader> CachingPackageLoader<L> {
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            cache: DashMap::new(),
        }
    }

    fn cache_key(name: &str, version: Option<&str>) -> String {
        match version {
            Some(v) => format!("{}@{}", name, v),
            None => name.to_string(),
        }
    }
}

#[async_trait]
impl<L: PackageLoader> PackageLoader for CachingPackageLoader<L> {
    async fn load(&self, package_name: &str, version: Option<&str>) -> Result<Arc<dyn Package>, PackageError> {
        let key = Self::cache_key(package_name, version);
        if let Some(pkg) = self.cache.get(&key) {
            debug!(package = %key, "Package schema cache hit");
            return Ok(pkg.clone());
        }
        debug!(package = %key, "Loading package schema");
        let pkg = self.inner.load(package_name, version).await?;
        self.cache.insert(key, pkg.clone());
        Ok(pkg)
    }
}

/// Splits a type token `pkg:mod:Name` (or the shorthand `pkg:Name`) into its
/// package name and the remainder, used by resolvers to find which package
/// owns a token before asking that package to resolve it fully.
pub fn package_name_of(token: &str) -> &str {
    token.split(':').next().unwrap_or(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_name_of_splits_on_colon() {
        assert_eq!(package_name_of("aws:s3:Bucket"), "aws");
        assert_eq!(package_name_of("random"), "random");
    }
}
