//! The evaluator's value domain: a tagged record `{known, secret, deps,
//! value}` composed over a small plain-value universe. Every built-in and
//! every expression evaluation step is a pure function over this record;
//! concurrency lives one layer up in `eval::engine`.

use std::collections::BTreeSet;

/// A concrete, already-known value. Assets/archives are data constructors
/// with no further evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<Value>),
    /// Entries preserve source order, matching the object types they are
    /// built from (`fn::toJSON` depends on this).
    Map(Vec<(String, Value)>),
    Asset(Asset),
    Archive(Archive),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Asset {
    String(String),
    File(String),
    Remote(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Archive {
    File(String),
    Remote(String),
    Assets(Vec<(String, Value)>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(String, Value)]> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::List(_) => "array",
            Value::Map(_) => "object",
            Value::Asset(_) => "asset",
            Value::Archive(_) => "archive",
        }
    }

    /// Canonical JSON encoding used by `fn::toJSON`: object keys keep their
    /// source order rather than being sorted lexicographically.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(entries) => {
                let mut map = serde_json::Map::new();
                for (k, v) in entries {
                    map.insert(k.clone(), v.to_json());
                }
                serde_json::Value::Object(map)
            }
            Value::Asset(_) | Value::Archive(_) => serde_json::Value::Null,
        }
    }

    pub fn from_json(value: &serde_json::Value) -> Value {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => Value::List(items.iter().map(Value::from_json).collect()),
            serde_json::Value::Object(map) => Value::Map(map.iter().map(|(k, v)| (k.clone(), Value::from_json(v))).collect()),
        }
    }
}

/// Integers render without a decimal point so `fn::toJSON` output matches
/// `{"one":1,"two":[1,2]}` rather than `1.0`.
fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        serde_json::Value::Number((n as i64).into())
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

/// A reference to a resource by its declared (logical) name — the unit that
/// dependency tracking is expressed in terms of.
pub type ResourceRef = String;

/// The universal evaluator value: a plain value known now, or a value
/// pending orchestrator resolution. Plain and eventual values compose
/// freely; any operation with an eventual input yields an eventual output.
#[derive(Debug, Clone)]
pub struct Eventual {
    /// `None` when unresolved (unknown during preview) or poisoned.
    pub value: Option<Value>,
    /// `false` during preview for values that won't be known until apply.
    pub known: bool,
    pub secret: bool,
    /// A distinguished sentinel: the expression that produced this value
    /// failed. Downstream consumers become poisoned in turn without
    /// re-reporting the diagnostic that was already raised at the point of
    /// failure.
    pub poisoned: bool,
    pub deps: BTreeSet<ResourceRef>,
}

impl Eventual {
    pub fn known(value: Value) -> Self {
        Self { value: Some(value), known: true, secret: false, poisoned: false, deps: BTreeSet::new() }
    }

    pub fn known_with_deps(value: Value, deps: BTreeSet<ResourceRef>) -> Self {
        Self { value: Some(value), known: true, secret: false, poisoned: false, deps }
    }

    pub fn unknown(deps: BTreeSet<ResourceRef>) -> Self {
        Self { value: None, known: false, secret: false, poisoned: false, deps }
    }

    pub fn poison() -> Self {
        Self { value: None, known: false, secret: false, poisoned: true, deps: BTreeSet::new() }
    }

    pub fn is_eventual(&self) -> bool {
        !self.known || !self.deps.is_empty() || self.secret
    }

    pub fn with_secret(mut self, secret: bool) -> Self {
        self.secret = self.secret || secret;
        self
    }

    pub fn with_deps(mut self, extra: &BTreeSet<ResourceRef>) -> Self {
        self.deps.extend(extra.iter().cloned());
        self
    }

    /// Combines the dependency/known/secret/poison state of several inputs,
    /// the way every built-in and interpolation does before computing its
    /// own result value: any operation whose inputs contain an eventual
    /// produces an eventual.
    pub fn combine(inputs: &[&Eventual]) -> (bool, bool, bool, BTreeSet<ResourceRef>) {
        let mut known = true;
        let mut secret = false;
        let mut poisoned = false;
        let mut deps = BTreeSet::new();
        for i in inputs {
            known &= i.known;
            secret |= i.secret;
            poisoned |= i.poisoned;
            deps.extend(i.deps.iter().cloned());
        }
        (known, secret, poisoned, deps)
    }

    /// Propagates poison/unknown from `inputs`, calling `f` to compute the
    /// concrete value only when every input is known and none is poisoned.
    pub fn map<F: FnOnce(Vec<&Value>) -> Value>(inputs: &[&Eventual], f: F) -> Eventual {
        let (known, secret, poisoned, deps) = Eventual::combine(inputs);
        if poisoned {
            return Eventual { value: None, known: false, secret, poisoned: true, deps };
        }
        if !known {
            return Eventual { value: None, known: false, secret, poisoned: false, deps };
        }
        let values: Vec<&Value> = inputs.iter().map(|i| i.value.as_ref().expect("known implies Some")).collect();
        Eventual { value: Some(f(values)), known: true, secret, poisoned: false, deps }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poison_propagates_through_combine() {
        let a = Eventual::known(Value::String("x".into()));
        let b = Eventual::poison();
        let result = Eventual::map(&[&a, &b], |_| Value::Null);
        assert!(result.poisoned);
        assert!(result.value.is_none());
    }

    #[test]
    fn unknown_propagates_without_poison() {
        let a = Eventual::known(Value::String("x".into()));
        let b = Eventual::unknown(BTreeSet::new());
        let result = Eventual::map(&[&a, &b], |_| Value::Null);
        assert!(!result.known);
        assert!(!result.poisoned);
    }

    #[test]
    fn json_integers_render_without_decimal_point() {
        let v = Value::Map(vec![
            ("one".to_string(), Value::Number(1.0)),
            ("two".to_string(), Value::List(vec![Value::Number(1.0), Value::Number(2.0)])),
        ]);
        assert_eq!(v.to_json().to_string(), r#"{"one":1,"two":[1,2]}"#);
    }
}
