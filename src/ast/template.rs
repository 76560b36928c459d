//! The decl tree (spec component B, declaration half): `Template`,
//! `ConfigParam`, `Resource`, `ResourceOptions`.

use crate::ast::expr::Expr;
use crate::diagnostics::SourceRange;

/// The closed set of declarable config types.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigType {
    String,
    Integer,
    Number,
    Boolean,
    Array(Box<ConfigType>),
}

impl ConfigType {
    pub fn parse(s: &str) -> Option<ConfigType> {
        if let Some(inner) = s.strip_prefix("array<").and_then(|s| s.strip_suffix('>')) {
            return Some(ConfigType::Array(Box::new(ConfigType::parse(inner)?)));
        }
        match s {
            "string" => Some(ConfigType::String),
            "integer" => Some(ConfigType::Integer),
            "number" => Some(ConfigType::Number),
            "boolean" => Some(ConfigType::Boolean),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigParam {
    pub key: String,
    pub logical_name: Option<String>,
    pub type_: Option<ConfigType>,
    pub secret: Option<bool>,
    pub default: Option<Expr>,
    pub items: Option<Box<ConfigParam>>,
    pub range: SourceRange,
}

impl ConfigParam {
    /// The name resources see when they reference this config entry: the
    /// logical name override if present, otherwise the declared key.
    pub fn exported_name(&self) -> &str {
        self.logical_name.as_deref().unwrap_or(&self.key)
    }
}

#[derive(Debug, Clone)]
pub struct CustomTimeouts {
    pub create: Option<String>,
    pub update: Option<String>,
    pub delete: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ResourceOptions {
    pub additional_secret_outputs: Vec<String>,
    pub aliases: Vec<Expr>,
    pub custom_timeouts: Option<CustomTimeouts>,
    pub delete_before_replace: Option<bool>,
    pub depends_on: Vec<Expr>,
    pub ignore_changes: Vec<String>,
    pub import: Option<Expr>,
    pub parent: Option<Expr>,
    pub protect: Option<Expr>,
    pub provider: Option<Expr>,
    pub providers: Vec<(String, Expr)>,
    pub version: Option<String>,
    pub plugin_download_url: Option<String>,
    pub replace_on_changes: Vec<String>,
    pub retain_on_delete: Option<bool>,
    pub deleted_with: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct GetBlock {
    pub id: Expr,
    pub state: Vec<(String, Expr)>,
}

#[derive(Debug, Clone)]
pub enum ResourceProperties {
    Map(Vec<(String, Expr)>),
    Expr(Expr),
}

#[derive(Debug, Clone)]
pub struct Resource {
    pub type_token: String,
    pub logical_name: Option<String>,
    pub properties: ResourceProperties,
    pub options: ResourceOptions,
    pub get: Option<GetBlock>,
    pub range: SourceRange,
}

impl Resource {
    pub fn exported_name(&self, declared_key: &str) -> String {
        self.logical_name.clone().unwrap_or_else(|| declared_key.to_string())
    }
}

/// The top-level program.
#[derive(Debug, Clone, Default)]
pub struct Template {
    pub name: String,
    pub namespace: Option<String>,
    pub description: Option<String>,
    pub runtime: Option<String>,
    pub config: Vec<(String, ConfigParam)>,
    pub variables: Vec<(String, Expr)>,
    pub resources: Vec<(String, Resource)>,
    pub outputs: Vec<(String, Expr)>,
    pub sdks: Vec<String>,
}
