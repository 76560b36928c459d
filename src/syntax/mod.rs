//! The syntax tree (spec component A): an untyped document tree with
//! location metadata, produced from either YAML or JSON source text.
//!
//! `serde_yaml`/`serde_json` give us a `Value` tree but no positions, so this
//! module walks the raw text alongside the decoded value to recover
//! best-effort source ranges for scalars and keys — exact for anything that
//! appears verbatim in the document, falling back to the enclosing
//! document's start position when a value has no unique textual match (for
//! instance a bare `null` that appears many times).

use crate::diagnostics::{Diagnostics, SourceRange};

/// A scalar leaf value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

/// A node of the untyped syntax tree. Object keys retain their original
/// casing and document order; case-insensitive matching happens in the
/// folding pass (component B).
#[derive(Debug, Clone)]
pub enum SyntaxNode {
    Scalar(Scalar, SourceRange),
    List(Vec<SyntaxNode>, SourceRange),
    Object(Vec<(String, SyntaxNode)>, SourceRange),
}

impl SyntaxNode {
    pub fn range(&self) -> &SourceRange {
        match self {
            SyntaxNode::Scalar(_, r) => r,
            SyntaxNode::List(_, r) => r,
            SyntaxNode::Object(_, r) => r,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SyntaxNode::Scalar(Scalar::String(s), _) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&[(String, SyntaxNode)]> {
        match self {
            SyntaxNode::Object(entries, _) => Some(entries),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[SyntaxNode]> {
        match self {
            SyntaxNode::List(items, _) => Some(items),
            _ => None,
        }
    }

    /// Looks up a key in an object node case-insensitively, returning the
    /// original key and the value.
    pub fn get_ci(&self, key: &str) -> Option<(&str, &SyntaxNode)> {
        self.as_object()?
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(k, v)| (k.as_str(), v))
    }
}

/// Parses YAML source into a syntax tree. Parser errors are recoverable:
/// malformed documents still produce a best-effort `Null` node plus a
/// diagnostic, so downstream passes never see a hard failure from this
/// layer.
pub fn parse_yaml(source: &str, file: &str) -> (SyntaxNode, Diagnostics) {
    let mut diags = Diagnostics::new();
    match serde_yaml::from_str::<serde_yaml::Value>(source) {
        Ok(value) => {
            let locator = Locator::new(source, file);
            (from_yaml_value(&value, &locator), diags)
        }
        Err(err) => {
            let range = err
                .location()
                .map(|l| SourceRange::new(file, l.line() as u32, l.column() as u32, l.line() as u32, l.column() as u32))
                .unwrap_or_else(SourceRange::unknown);
            diags.error(Some(range), format!("malformed YAML: {}", err), "");
            (SyntaxNode::Scalar(Scalar::Null, SourceRange::unknown()), diags)
        }
    }
}

/// Parses JSON source into a syntax tree.
pub fn parse_json(source: &str, file: &str) -> (SyntaxNode, Diagnostics) {
    let mut diags = Diagnostics::new();
    match serde_json::from_str::<serde_json::Value>(source) {
        Ok(value) => {
            let locator = Locator::new(source, file);
            (from_json_value(&value, &locator), diags)
        }
        Err(err) => {
            let range = SourceRange::new(file, err.line() as u32, err.column() as u32, err.line() as u32, err.column() as u32);
            diags.error(Some(range), format!("malformed JSON: {}", err), "");
            (SyntaxNode::Scalar(Scalar::Null, SourceRange::unknown()), diags)
        }
    }
}

/// Parses either format, dispatching on the file extension. Falls back to
/// YAML (a superset of JSON for our purposes) for unrecognised extensions.
pub fn parse_document(source: &str, file: &str) -> (SyntaxNode, Diagnostics) {
    if file.ends_with(".json") {
        parse_json(source, file)
    } else {
        parse_yaml(source, file)
    }
}

/// Finds the best-effort line/column of a scalar's textual representation
/// within the raw source, so the syntax tree can carry real positions
/// without depending on a positional YAML/JSON parser.
struct Locator<'a> {
    file: &'a str,
    lines: Vec<&'a str>,
}

impl<'a> Locator<'a> {
    fn new(source: &'a str, file: &'a str) -> Self {
        Self {
            file,
            lines: source.lines().collect(),
        }
    }

    fn find(&self, needle: &str) -> SourceRange {
        if !needle.is_empty() {
            for (i, line) in self.lines.iter().enumerate() {
                if let Some(col) = line.find(needle) {
                    let start_line = i as u32 + 1;
                    let start_col = col as u32 + 1;
                    return SourceRange::new(
                        self.file,
                        start_line,
                        start_col,
                        start_line,
                        start_col + needle.chars().count() as u32,
                    );
                }
            }
        }
        self.doc_start()
    }

    fn doc_start(&self) -> SourceRange {
        SourceRange::new(self.file, 1, 1, 1, 1)
    }
}

fn from_yaml_value(value: &serde_yaml::Value, locator: &Locator<'_>) -> SyntaxNode {
    use serde_yaml::Value;
    match value {
        Value::Null => SyntaxNode::Scalar(Scalar::Null, locator.doc_start()),
        Value::Bool(b) => SyntaxNode::Scalar(Scalar::Bool(*b), locator.find(&b.to_string())),
        Value::Number(n) => scalar_number(n.as_i64(), n.as_f64(), locator),
        Value::String(s) => SyntaxNode::Scalar(Scalar::String(s.clone()), locator.find(s)),
        Value::Sequence(items) => {
            let nodes: Vec<SyntaxNode> = items.iter().map(|v| from_yaml_value(v, locator)).collect();
            let range = nodes.first().map(|n| n.range().clone()).unwrap_or_else(|| locator.doc_start());
            SyntaxNode::List(nodes, range)
        }
        Value::Mapping(map) => {
            let entries: Vec<(String, SyntaxNode)> = map
                .iter()
                .map(|(k, v)| {
                    let key = k.as_str().map(|s| s.to_string()).unwrap_or_else(|| format!("{:?}", k));
                    (key, from_yaml_value(v, locator))
                })
                .collect();
            let range = entries
                .first()
                .map(|(k, _)| locator.find(k))
                .unwrap_or_else(|| locator.doc_start());
            SyntaxNode::Object(entries, range)
        }
        Value::Tagged(tagged) => from_yaml_value(&tagged.value, locator),
    }
}

fn from_json_value(value: &serde_json::Value, locator: &Locator<'_>) -> SyntaxNode {
    use serde_json::Value;
    match value {
        Value::Null => SyntaxNode::Scalar(Scalar::Null, locator.doc_start()),
        Value::Bool(b) => SyntaxNode::Scalar(Scalar::Bool(*b), locator.find(&b.to_string())),
        Value::Number(n) => scalar_number(n.as_i64(), n.as_f64(), locator),
        Value::String(s) => SyntaxNode::Scalar(Scalar::String(s.clone()), locator.find(s)),
        Value::Array(items) => {
            let nodes: Vec<SyntaxNode> = items.iter().map(|v| from_json_value(v, locator)).collect();
            let range = nodes.first().map(|n| n.range().clone()).unwrap_or_else(|| locator.doc_start());
            SyntaxNode::List(nodes, range)
        }
        Value::Object(map) => {
            let entries: Vec<(String, SyntaxNode)> = map
                .iter()
                .map(|(k, v)| (k.clone(), from_json_value(v, locator)))
                .collect();
            let range = entries
                .first()
                .map(|(k, _)| locator.find(k))
                .unwrap_or_else(|| locator.doc_start());
            SyntaxNode::Object(entries, range)
        }
    }
}

fn scalar_number(as_i64: Option<i64>, as_f64: Option<f64>, locator: &Locator<'_>) -> SyntaxNode {
    if let Some(i) = as_i64 {
        SyntaxNode::Scalar(Scalar::Int(i), locator.find(&i.to_string()))
    } else if let Some(f) = as_f64 {
        SyntaxNode::Scalar(Scalar::Float(f), locator.find(&f.to_string()))
    } else {
        SyntaxNode::Scalar(Scalar::Null, locator.doc_start())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_mapping() {
        let (tree, diags) = parse_yaml("name: demo\nversion: 1\n", "Pulumi.yaml");
        assert!(!diags.has_errors());
        let entries = tree.as_object().unwrap();
        assert_eq!(entries[0].0, "name");
        assert_eq!(entries[0].1.as_str(), Some("demo"));
    }

    #[test]
    fn malformed_yaml_is_recoverable() {
        let (tree, diags) = parse_yaml("name: [unclosed\n", "bad.yaml");
        assert!(diags.has_errors());
        // Still produces a node so downstream passes don't panic.
        matches!(tree, SyntaxNode::Scalar(Scalar::Null, _));
    }

    #[test]
    fn object_preserves_key_order() {
        let (tree, _) = parse_yaml("two: 2\none: 1\n", "x.yaml");
        let entries = tree.as_object().unwrap();
        assert_eq!(entries[0].0, "two");
        assert_eq!(entries[1].0, "one");
    }

    #[test]
    fn case_insensitive_lookup_preserves_original_casing() {
        let (tree, _) = parse_yaml("Name: demo\n", "x.yaml");
        let (orig_key, value) = tree.get_ci("name").unwrap();
        assert_eq!(orig_key, "Name");
        assert_eq!(value.as_str(), Some("demo"));
    }
}
