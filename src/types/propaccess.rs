//! Property-access typing: given a root type and a chain of accessors,
//! determine the resulting type or report why the chain does not resolve.

use crate::ast::{Accessor, IndexKey};

use super::Type;

const MAX_LISTED_PROPERTIES: usize = 5;

fn missing_property_error(existing: &[String], name: &str) -> String {
    let mut sorted: Vec<&String> = existing.iter().collect();
    sorted.sort();
    let shown: Vec<&str> = sorted.iter().take(MAX_LISTED_PROPERTIES).map(|s| s.as_str()).collect();
    let remainder = sorted.len().saturating_sub(MAX_LISTED_PROPERTIES);
    let mut msg = format!("no property `{}`; existing properties: {}", name, shown.join(", "));
    if remainder > 0 {
        msg.push_str(&format!(" (+{} more)", remainder));
    }
    msg
}

fn resolve_name(base: &Type, name: &str) -> Result<Type, String> {
    match base.unwrap_optional() {
        Type::Object(props) => props
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.type_.clone())
            .ok_or_else(|| missing_property_error(&props.iter().map(|p| p.name.clone()).collect::<Vec<_>>(), name)),
        Type::Resource { properties, .. } => {
            if name == "id" || name == "urn" {
                return Ok(Type::String);
            }
            properties
                .iter()
                .find(|p| p.name == name)
                .map(|p| p.type_.clone())
                .ok_or_else(|| {
                    let mut names: Vec<String> = properties.iter().map(|p| p.name.clone()).collect();
                    names.push("id".to_string());
                    names.push("urn".to_string());
                    missing_property_error(&names, name)
                })
        }
        Type::Any => Ok(Type::Any),
        Type::Invalid => Ok(Type::Invalid),
        other => Err(format!("`{:?}` does not support named property access", other)),
    }
}

fn resolve_index(base: &Type, key: &IndexKey) -> Result<Type, String> {
    match (base.unwrap_optional(), key) {
        (Type::Array(elem), IndexKey::Int(_)) => Ok((**elem).clone()),
        (Type::Array(_), IndexKey::String(_)) => Err("cannot index an array with a string key".to_string()),
        (Type::Map(elem), IndexKey::String(_)) => Ok((**elem).clone()),
        (Type::Map(_), IndexKey::Int(_)) => Err("cannot index a map with an integer key".to_string()),
        (Type::Any, _) => Ok(Type::Any),
        (Type::Invalid, _) => Ok(Type::Invalid),
        (other, _) => Err(format!("`{:?}` does not support subscript access", other)),
    }
}

fn resolve_one(base: &Type, accessor: &Accessor) -> Result<Type, String> {
    if let Type::Union(alts) = base.unwrap_optional() {
        let mut oks = Vec::new();
        let mut errs = Vec::new();
        for alt in alts {
            match resolve_one(alt, accessor) {
                Ok(t) => oks.push(t),
                Err(e) => errs.push(e),
            }
        }
        return if oks.is_empty() {
            Err("could be a type that does not support access".to_string())
        } else if errs.is_empty() {
            Ok(Type::Union(oks))
        } else {
            // Some branches succeed, some fail: union the successful results,
            // the failing branches simply don't contribute a type.
            Ok(Type::Union(oks))
        };
    }

    match accessor {
        Accessor::Name(name) => resolve_name(base, name),
        Accessor::Index(key) => resolve_index(base, key),
    }
}

/// Resolves a full accessor chain starting from `root`.
pub fn resolve_access(root: &Type, accessors: &[Accessor]) -> Result<Type, String> {
    let mut current = root.clone();
    for accessor in accessors {
        current = resolve_one(&current, accessor)?;
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Property;

    #[test]
    fn name_access_on_object() {
        let t = Type::Object(vec![Property { name: "foo".to_string(), type_: Type::String, required: true }]);
        let result = resolve_access(&t, &[Accessor::Name("foo".to_string())]).unwrap();
        assert!(matches!(result, Type::String));
    }

    #[test]
    fn resource_exposes_synthetic_id_and_urn() {
        let t = Type::Resource { token: "aws:s3:Bucket".to_string(), properties: vec![] };
        assert!(matches!(resolve_access(&t, &[Accessor::Name("id".to_string())]).unwrap(), Type::String));
        assert!(matches!(resolve_access(&t, &[Accessor::Name("urn".to_string())]).unwrap(), Type::String));
    }

    #[test]
    fn missing_property_lists_existing_ones() {
        let t = Type::Object(vec![
            Property { name: "b".to_string(), type_: Type::String, required: true },
            Property { name: "a".to_string(), type_: Type::String, required: true },
        ]);
        let err = resolve_access(&t, &[Accessor::Name("z".to_string())]).unwrap_err();
        assert!(err.contains("a, b"));
    }

    #[test]
    fn string_index_on_array_is_error() {
        let t = Type::Array(Box::new(Type::String));
        assert!(resolve_access(&t, &[Accessor::Index(IndexKey::String("x".to_string()))]).is_err());
    }

    #[test]
    fn union_root_unions_successful_branches() {
        let a = Type::Object(vec![Property { name: "foo".to_string(), type_: Type::String, required: true }]);
        let b = Type::Object(vec![Property { name: "foo".to_string(), type_: Type::Integer, required: true }]);
        let t = Type::Union(vec![a, b]);
        let result = resolve_access(&t, &[Accessor::Name("foo".to_string())]).unwrap();
        assert!(matches!(result, Type::Union(_)));
    }
}
