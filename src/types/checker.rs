//! The structural type checker pass: walks the decl tree, resolving each
//! resource's properties against its package-declared input schema and
//! flagging both unknown keys and assignability failures.

use std::collections::HashMap;

use crate::ast::{Expr, Resource, ResourceProperties, Template};
use crate::diagnostics::{best_suggestion, Diagnostics};

use super::{from_config_type, is_assignable, resolve_access, Property, Type};

/// The read-only schema surface the checker needs. A real implementation is
/// backed by `schema::Package`, resolved once (asynchronously, off this
/// module) before the checker runs — this module itself stays synchronous.
pub trait SchemaLookup {
    fn resource_input_type(&self, type_token: &str) -> Option<Type>;
    fn resource_output_type(&self, type_token: &str) -> Option<Type>;
}

/// Infers a best-effort static type for an expression against a symbol
/// environment (config/resource/variable name → type). References that
/// can't be resolved to anything more specific fall back to `any` rather
/// than failing the whole pass — this is advisory typing to catch obvious
/// mistakes, not a full literal-value evaluator.
pub fn infer_expr_type(expr: &Expr, env: &HashMap<String, Type>) -> Type {
    match expr {
        Expr::Null(_) => Type::Any,
        Expr::Bool(_, _) => Type::Boolean,
        Expr::Number(n, _) => {
            if n.fract() == 0.0 {
                Type::Integer
            } else {
                Type::Number
            }
        }
        Expr::String(_, _) => Type::String,
        Expr::Interpolate(_, _) => Type::String,
        Expr::Symbol(access, _) => {
            let root = env.get(&access.root).cloned().unwrap_or(Type::Any);
            resolve_access(&root, &access.accessors).unwrap_or(Type::Invalid)
        }
        Expr::List(items, _) => {
            let elem = items
                .first()
                .map(|i| infer_expr_type(i, env))
                .unwrap_or(Type::Any);
            Type::Array(Box::new(elem))
        }
        Expr::Object(entries, _) => Type::Object(
            entries
                .iter()
                .map(|(k, v)| Property {
                    name: k.clone(),
                    type_: infer_expr_type(v, env),
                    required: true,
                })
                .collect(),
        ),
        Expr::Builtin(b, _) => infer_builtin_type(b, env),
    }
}

fn infer_builtin_type(b: &crate::ast::Builtin, env: &HashMap<String, Type>) -> Type {
    use crate::ast::Builtin;
    match b {
        Builtin::Join(_, _) => Type::String,
        Builtin::Split(_, _) => Type::Array(Box::new(Type::String)),
        Builtin::Select(_, values) => match infer_expr_type(values, env) {
            Type::Array(elem) => *elem,
            _ => Type::Any,
        },
        Builtin::ToJson(_) => Type::String,
        Builtin::ToBase64(_) => Type::String,
        Builtin::FromBase64(_) => Type::String,
        Builtin::Secret(inner) => infer_expr_type(inner, env),
        Builtin::ReadFile(_) => Type::String,
        Builtin::Invoke { .. } => Type::Any,
        Builtin::StringAsset(_) | Builtin::FileAsset(_) | Builtin::RemoteAsset(_) => Type::Asset,
        Builtin::AssetArchive(_) | Builtin::FileArchive(_) | Builtin::RemoteArchive(_) => Type::Archive,
    }
}

/// Checks every resource, config default, and variable in `template`
/// against `lookup`, returning every diagnostic raised.
pub fn check_template(template: &Template, lookup: &dyn SchemaLookup) -> Diagnostics {
    let mut diags = Diagnostics::new();
    let mut env: HashMap<String, Type> = HashMap::new();

    for (name, param) in &template.config {
        let declared = param.type_.as_ref().map(from_config_type);
        let inferred_default = param.default.as_ref().map(|e| infer_expr_type(e, &env));
        let resolved = match (&declared, &inferred_default) {
            (Some(d), Some(inf)) => match is_assignable(&inf, d) {
                Ok(()) => d.clone(),
                Err(reason) => {
                    diags.error(
                        Some(param.range.clone()),
                        format!("config `{}` default does not match its declared type", name),
                        reason.render(),
                    );
                    Type::Invalid
                }
            },
            (Some(d), None) => d.clone(),
            (None, Some(inf)) => inf,
            (None, None) => {
                diags.error(Some(param.range.clone()), "either default or type is required", "");
                Type::Invalid
            }
        };
        env.insert(param.exported_name().to_string(), resolved);
    }

    for (name, resource) in &template.resources {
        let exported = resource.exported_name(name);
        match lookup.resource_output_type(&resource.type_token) {
            Some(t) => {
                env.insert(exported, t);
            }
            None => {
                diags.error(
                    Some(resource.range.clone()),
                    format!("unknown resource type `{}`", resource.type_token),
                    "",
                );
                env.insert(exported, Type::Invalid);
            }
        }
    }

    for resource in template.resources.iter().map(|(_, r)| r) {
        check_resource_properties(resource, lookup, &env, &mut diags);
    }

    for (name, expr) in &template.variables {
        let t = infer_expr_type(expr, &env);
        env.insert(name.clone(), t);
    }

    for (_, expr) in &template.outputs {
        let _ = infer_expr_type(expr, &env);
    }

    diags
}

fn check_resource_properties(
    resource: &Resource,
    lookup: &dyn SchemaLookup,
    env: &HashMap<String, Type>,
    diags: &mut Diagnostics,
) {
    let input_type = match lookup.resource_input_type(&resource.type_token) {
        Some(t) => t,
        None => return,
    };
    let props = match input_type.unwrap_optional() {
        Type::Object(props) => props.clone(),
        _ => return,
    };

    let entries = match &resource.properties {
        ResourceProperties::Map(entries) => entries,
        ResourceProperties::Expr(_) => return,
    };

    for (key, expr) in entries {
        match props.iter().find(|p| p.name == *key) {
            Some(prop) => {
                let actual = infer_expr_type(expr, env);
                if let Err(reason) = is_assignable(&actual, &prop.type_) {
                    diags.error(
                        Some(expr.range().clone()),
                        format!("property `{}` is not assignable to its declared type", key),
                        reason.render(),
                    );
                }
            }
            None => {
                let candidates: Vec<String> = props.iter().map(|p| p.name.clone()).collect();
                let detail = best_suggestion(&candidates, key)
                    .map(|s| format!("did you mean `{}`?", s))
                    .unwrap_or_default();
                diags.error(Some(expr.range().clone()), format!("unknown property `{}`", key), detail);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::fold_template;
    use crate::syntax::parse_yaml;

    struct FixedLookup;
    impl SchemaLookup for FixedLookup {
        fn resource_input_type(&self, type_token: &str) -> Option<Type> {
            if type_token == "test:resource:t" {
                Some(Type::Object(vec![Property { name: "foo".to_string(), type_: Type::String, required: true }]))
            } else {
                None
            }
        }
        fn resource_output_type(&self, type_token: &str) -> Option<Type> {
            self.resource_input_type(type_token)
        }
    }

    fn parse(src: &str) -> Template {
        let (doc, _) = parse_yaml(src, "Pulumi.yaml");
        let (t, _) = fold_template(&doc, "Pulumi.yaml");
        t
    }

    #[test]
    fn unknown_property_is_flagged_with_suggestion() {
        let t = parse(
            r#"
name: test
resources:
  r:
    type: test:resource:t
    properties:
      fooo: "x"
"#,
        );
        let diags = check_template(&t, &FixedLookup);
        assert!(diags.has_errors());
        assert!(diags.iter().any(|d| d.summary.contains("fooo")));
    }

    #[test]
    fn known_property_with_matching_type_is_clean() {
        let t = parse(
            r#"
name: test
resources:
  r:
    type: test:resource:t
    properties:
      foo: "x"
"#,
        );
        let diags = check_template(&t, &FixedLookup);
        assert!(!diags.has_errors());
    }

    #[test]
    fn integer_config_default_with_float_value_is_an_error() {
        let t = parse(
            r#"
name: test
config:
  count:
    type: integer
    default: 42.2
"#,
        );
        let diags = check_template(&t, &FixedLookup);
        assert!(diags.has_errors());
    }
}
