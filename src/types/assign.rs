//! Assignability between two types.

use super::Type;

/// A nested "because" explanation for an assignability failure, rendered
/// depth-first with indenting.
#[derive(Debug, Clone)]
pub enum Reason {
    Leaf(String),
    Because(String, Vec<Reason>),
}

impl Reason {
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out, 0);
        out
    }

    fn render_into(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        match self {
            Reason::Leaf(msg) => out.push_str(&format!("{}{}", indent, msg)),
            Reason::Because(msg, children) => {
                out.push_str(&format!("{}{}", indent, msg));
                for child in children {
                    out.push('\n');
                    child.render_into(out, depth + 1);
                }
            }
        }
    }
}

fn describe(t: &Type) -> String {
    match t {
        Type::String => "string".to_string(),
        Type::Integer => "integer".to_string(),
        Type::Number => "number".to_string(),
        Type::Boolean => "boolean".to_string(),
        Type::Any => "any".to_string(),
        Type::Asset => "asset".to_string(),
        Type::Archive => "archive".to_string(),
        Type::Array(t) => format!("array<{}>", describe(t)),
        Type::Map(t) => format!("map<{}>", describe(t)),
        Type::Object(_) => "object".to_string(),
        Type::Union(alts) => alts.iter().map(describe).collect::<Vec<_>>().join(" | "),
        Type::Resource { token, .. } if token.is_empty() => "resource".to_string(),
        Type::Resource { token, .. } => token.clone(),
        Type::Enum { element, .. } => format!("enum<{}>", describe(element)),
        Type::Token { token, .. } => token.clone(),
        Type::Optional(t) => describe(t),
        Type::Invalid => "<invalid>".to_string(),
    }
}

/// Is a value of type `from` assignable to a property/parameter declared as
/// `to`? Both sides have their `Optional` wrapper stripped first, per spec:
/// "optional T is indistinguishable from T for assignability except that
/// absence is tolerated."
pub fn is_assignable(from: &Type, to: &Type) -> Result<(), Reason> {
    let from = from.unwrap_optional();
    let to = to.unwrap_optional();

    if matches!(to, Type::Any) || matches!(from, Type::Invalid) || matches!(to, Type::Invalid) {
        return Ok(());
    }

    if let Type::Union(alts) = from {
        // Union on the `from` side: every alternative must be assignable.
        let mut reasons = Vec::new();
        for alt in alts {
            if let Err(r) = is_assignable(alt, to) {
                reasons.push(r);
            }
        }
        return if reasons.is_empty() {
            Ok(())
        } else {
            Err(Reason::Because(
                format!("not every alternative of `{}` is assignable to `{}`", describe(from), describe(to)),
                reasons,
            ))
        };
    }

    if let Type::Union(alts) = to {
        // Union on the `to` side: some alternative must accept `from`.
        for alt in alts {
            if is_assignable(from, alt).is_ok() {
                return Ok(());
            }
        }
        return Err(Reason::Leaf(format!(
            "`{}` is not assignable to any alternative of `{}`",
            describe(from),
            describe(to)
        )));
    }

    match (from, to) {
        (Type::Integer, Type::Integer) => Ok(()),
        (Type::Integer, Type::Number) => Ok(()),
        (Type::Number, Type::Number) => Ok(()),
        (Type::Number, Type::Integer) => Err(Reason::Leaf(
            "a floating-point `number` is not assignable to `integer`".to_string(),
        )),

        (_, Type::String)
            if matches!(from, Type::String | Type::Number | Type::Integer | Type::Boolean | Type::Resource { .. }) =>
        {
            Ok(())
        }

        (Type::Asset, Type::Asset) | (Type::Archive, Type::Asset) => Ok(()),
        (Type::Asset, Type::Archive) => Err(Reason::Leaf("`asset` is not assignable to `archive`".to_string())),
        (Type::Archive, Type::Archive) => Ok(()),

        (Type::Array(f), Type::Array(t)) => is_assignable(f, t).map_err(|r| {
            Reason::Because(format!("array element of `{}` is not assignable to `{}`", describe(from), describe(to)), vec![r])
        }),

        (Type::Map(f), Type::Map(t)) => is_assignable(f, t).map_err(|r| {
            Reason::Because(format!("map element of `{}` is not assignable to `{}`", describe(from), describe(to)), vec![r])
        }),
        (Type::Object(props), Type::Map(t)) => {
            let mut reasons = Vec::new();
            for p in props {
                if let Err(r) = is_assignable(&p.type_, t) {
                    reasons.push(Reason::Because(format!("property `{}`", p.name), vec![r]));
                }
            }
            if reasons.is_empty() {
                Ok(())
            } else {
                Err(Reason::Because(format!("not every property is assignable to `{}`", describe(to)), reasons))
            }
        }

        (Type::Object(from_props), Type::Object(to_props)) => {
            let mut reasons = Vec::new();
            for target in to_props {
                if !target.required {
                    continue;
                }
                match from_props.iter().find(|p| p.name == target.name) {
                    Some(source) => {
                        if let Err(r) = is_assignable(&source.type_, &target.type_) {
                            reasons.push(Reason::Because(format!("property `{}`", target.name), vec![r]));
                        }
                    }
                    None => reasons.push(Reason::Leaf(format!("missing required property `{}`", target.name))),
                }
            }
            if reasons.is_empty() {
                Ok(())
            } else {
                Err(Reason::Because(
                    format!("`{}` is not structurally assignable to `{}`", describe(from), describe(to)),
                    reasons,
                ))
            }
        }

        (Type::Resource { token: ft, .. }, Type::Resource { token: tt, .. }) => {
            if tt.is_empty() || ft == tt {
                Ok(())
            } else {
                Err(Reason::Leaf(format!("resource type `{}` is not `{}`", ft, tt)))
            }
        }

        (Type::Enum { element: fe, .. }, Type::Enum { element: te, .. }) => is_assignable(fe, te),
        (other, Type::Enum { element, .. }) => is_assignable(other, element),

        (Type::Token { underlying: fu, .. }, Type::Token { underlying: tu, .. }) => {
            match (fu, tu) {
                (Some(fu), Some(tu)) => is_assignable(fu, tu),
                _ => Ok(()),
            }
        }
        (other, Type::Token { underlying: Some(u), .. }) => is_assignable(other, u),
        (Type::Token { underlying: Some(u), .. }, other) => is_assignable(u, other),

        (a, b) if std::mem::discriminant(a) == std::mem::discriminant(b) => Ok(()),

        _ => Err(Reason::Leaf(format!("`{}` is not assignable to `{}`", describe(from), describe(to)))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_not_assignable_to_integer_from_number() {
        assert!(is_assignable(&Type::Number, &Type::Integer).is_err());
        assert!(is_assignable(&Type::Integer, &Type::Number).is_ok());
    }

    #[test]
    fn string_accepts_resource_reference() {
        let r = Type::Resource { token: "aws:s3:Bucket".to_string(), properties: vec![] };
        assert!(is_assignable(&r, &Type::String).is_ok());
    }

    #[test]
    fn object_missing_required_property_fails() {
        let to = Type::Object(vec![super::Property {
            name: "name".to_string(),
            type_: Type::String,
            required: true,
        }]);
        let from = Type::Object(vec![]);
        assert!(is_assignable(&from, &to).is_err());
    }

    #[test]
    fn empty_object_assignable_to_map() {
        let from = Type::Object(vec![]);
        let to = Type::Map(Box::new(Type::String));
        assert!(is_assignable(&from, &to).is_ok());
    }

    #[test]
    fn union_from_requires_every_alternative() {
        let from = Type::Union(vec![Type::String, Type::Boolean]);
        assert!(is_assignable(&from, &Type::String).is_err());
        assert!(is_assignable(&from, &Type::Union(vec![Type::String, Type::Boolean])).is_ok());
    }

    #[test]
    fn union_to_accepts_matching_alternative() {
        let to = Type::Union(vec![Type::String, Type::Integer]);
        assert!(is_assignable(&Type::Integer, &to).is_ok());
    }

    #[test]
    fn optional_is_transparent_to_assignability() {
        let to = Type::Optional(Box::new(Type::String));
        assert!(is_assignable(&Type::String, &to).is_ok());
    }
}
