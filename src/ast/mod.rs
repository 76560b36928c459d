//! The typed program tree (spec component B): expressions, declarations,
//! and the folding pass that builds them out of the untyped syntax tree
//! (component A).

pub mod expr;
pub mod fold;
pub mod template;

pub use expr::{Accessor, Builtin, Expr, IndexKey, InterpPart, PropertyAccess};
pub use fold::fold_template;
pub use template::{
    ConfigParam, ConfigType, CustomTimeouts, GetBlock, Resource, ResourceOptions,
    ResourceProperties, Template,
};
