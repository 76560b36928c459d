//! The structural type system (spec component D): the type universe,
//! assignability rules, property-access typing, and the checker pass that
//! drives both against a decl tree.

mod assign;
mod checker;
mod propaccess;

pub use assign::{is_assignable, Reason};
pub use checker::{check_template, SchemaLookup};
pub use propaccess::resolve_access;

use crate::ast::ConfigType;

/// An object property: name, declared type, and whether it is required.
#[derive(Debug, Clone)]
pub struct Property {
    pub name: String,
    pub type_: Type,
    pub required: bool,
}

/// The type universe the checker reasons over.
#[derive(Debug, Clone)]
pub enum Type {
    String,
    Integer,
    Number,
    Boolean,
    Any,
    Asset,
    Archive,
    Array(Box<Type>),
    Map(Box<Type>),
    /// Ordered properties — order matters for diagnostic rendering, not for
    /// assignability itself.
    Object(Vec<Property>),
    Union(Vec<Type>),
    Resource {
        token: String,
        properties: Vec<Property>,
    },
    Enum {
        element: Box<Type>,
        values: Vec<serde_json::Value>,
    },
    Token {
        token: String,
        underlying: Option<Box<Type>>,
    },
    /// `T` where absence (a missing property, an unset config value) is
    /// tolerated. Indistinguishable from `T` for assignability.
    Optional(Box<Type>),
    /// A type that could not be determined; carries no diagnostics itself —
    /// the diagnostic was already recorded at the point of failure, this is
    /// just a sentinel so downstream checks don't cascade new errors.
    Invalid,
}

impl Type {
    /// Strips any number of `Optional` wrappers.
    pub fn unwrap_optional(&self) -> &Type {
        match self {
            Type::Optional(inner) => inner.unwrap_optional(),
            other => other,
        }
    }

    /// The special "any resource" token used by `to`-side resource types
    /// that accept a reference to any resource at all.
    pub const ANY_RESOURCE_TOKEN: &'static str = "";

    pub fn any_resource() -> Type {
        Type::Resource {
            token: Type::ANY_RESOURCE_TOKEN.to_string(),
            properties: Vec::new(),
        }
    }
}

/// Converts a config param's declared type (the closed scalar/array set from
/// `ast::template::ConfigType`) into the richer checker type universe.
pub fn from_config_type(ct: &ConfigType) -> Type {
    match ct {
        ConfigType::String => Type::String,
        ConfigType::Integer => Type::Integer,
        ConfigType::Number => Type::Number,
        ConfigType::Boolean => Type::Boolean,
        ConfigType::Array(inner) => Type::Array(Box::new(from_config_type(inner))),
    }
}
