//! Folds the untyped syntax tree (component A) into the typed decl/expr
//! tree (component B).
//!
//! Field binding is case-insensitive; the original casing is preserved for
//! "unexpected casing" warnings and unknown fields get a fuzzy-matched
//! suggestion rather than a silent drop. Per DESIGN.md this uses a static
//! per-decl field table instead of reflection.

use crate::ast::expr::{Accessor, Builtin, Expr, IndexKey, InterpPart, PropertyAccess};
use crate::ast::template::{
    ConfigParam, ConfigType, CustomTimeouts, GetBlock, Resource, ResourceOptions,
    ResourceProperties, Template,
};
use crate::diagnostics::{best_suggestion, Diagnostics, SourceRange};
use crate::syntax::{Scalar, SyntaxNode};
use tracing::warn;

const TEMPLATE_FIELDS: &[&str] = &[
    "name",
    "namespace",
    "description",
    "runtime",
    "configuration",
    "config",
    "variables",
    "resources",
    "outputs",
    "sdks",
    "components",
];

const CONFIG_FIELDS: &[&str] = &["type", "name", "secret", "default", "items"];
const RESOURCE_FIELDS: &[&str] = &["type", "name", "properties", "options", "get"];
const OPTIONS_FIELDS: &[&str] = &[
    "additionalsecretoutputs",
    "aliases",
    "customtimeouts",
    "deletebeforereplace",
    "dependson",
    "ignorechanges",
    "import",
    "parent",
    "protect",
    "provider",
    "providers",
    "version",
    "plugindownloadurl",
    "replaceonchanges",
    "retainondelete",
    "deletedwith",
];

fn warn_unknown_field(diags: &mut Diagnostics, range: &SourceRange, key: &str, known: &[&str]) {
    let candidates: Vec<String> = known.iter().map(|s| s.to_string()).collect();
    let suggestion = best_suggestion(&candidates, &key.to_lowercase());
    let detail = match suggestion {
        Some(s) => format!("did you mean `{}`?", s),
        None => String::new(),
    };
    diags.warning(Some(range.clone()), format!("unrecognized field `{}`", key), detail);
}

fn warn_noncanonical_casing(diags: &mut Diagnostics, range: &SourceRange, key: &str, canonical: &str) {
    if key != canonical {
        diags.warning(
            Some(range.clone()),
            format!("unexpected casing: `{}`, did you mean `{}`?", key, canonical),
            "",
        );
    }
}

/// Folds a parsed document into a `Template`.
pub fn fold_template(doc: &SyntaxNode, file: &str) -> (Template, Diagnostics) {
    let mut diags = Diagnostics::new();
    let mut template = Template::default();

    let entries = match doc.as_object() {
        Some(e) => e,
        None => {
            diags.error(Some(doc.range().clone()), "expected a top-level mapping", "");
            return (template, diags);
        }
    };

    let mut config_entries: Option<&SyntaxNode> = None;
    let mut configuration_entries: Option<&SyntaxNode> = None;

    for (key, value) in entries {
        let lower = key.to_lowercase();
        if !TEMPLATE_FIELDS.contains(&lower.as_str()) {
            warn_unknown_field(&mut diags, value.range(), key, TEMPLATE_FIELDS);
            continue;
        }
        match lower.as_str() {
            "name" => {
                warn_noncanonical_casing(&mut diags, value.range(), key, "name");
                template.name = value.as_str().unwrap_or_default().to_string();
            }
            "namespace" => template.namespace = value.as_str().map(str::to_string),
            "description" => template.description = value.as_str().map(str::to_string),
            "runtime" => template.runtime = value.as_str().map(str::to_string),
            "config" => config_entries = Some(value),
            "configuration" => configuration_entries = Some(value),
            "variables" => {
                template.variables = fold_named_exprs(value, file, &mut diags);
            }
            "resources" => {
                template.resources = fold_resources(value, file, &mut diags);
            }
            "outputs" => {
                template.outputs = fold_named_exprs(value, file, &mut diags);
            }
            "sdks" => {
                template.sdks = value
                    .as_list()
                    .map(|items| items.iter().filter_map(|n| n.as_str().map(str::to_string)).collect())
                    .unwrap_or_default();
            }
            "components" => { /* parsed but not evaluated by this core */ }
            _ => unreachable!(),
        }
    }

    if config_entries.is_some() && configuration_entries.is_some() {
        diags.warning(
            Some(doc.range().clone()),
            "both `config` and `configuration` given; `config` takes precedence",
            "",
        );
    }
    let chosen_config = config_entries.or(configuration_entries);
    if let Some(node) = chosen_config {
        template.config = fold_config_map(node, file, &mut diags);
    }

    if template.name.is_empty() {
        diags.error(Some(doc.range().clone()), "template is missing required field `name`", "");
    }

    (template, diags)
}

fn fold_config_map(node: &SyntaxNode, file: &str, diags: &mut Diagnostics) -> Vec<(String, ConfigParam)> {
    let entries = match node.as_object() {
        Some(e) => e,
        None => {
            diags.error(Some(node.range().clone()), "`config` must be a mapping", "");
            return Vec::new();
        }
    };
    entries
        .iter()
        .map(|(key, value)| (key.clone(), fold_config_param(key, value, file, diags)))
        .collect()
}

fn fold_config_param(key: &str, node: &SyntaxNode, file: &str, diags: &mut Diagnostics) -> ConfigParam {
    let range = node.range().clone();

    // Shorthand: a bare scalar type name, e.g. `region: string`.
    if let Some(s) = node.as_str() {
        return ConfigParam {
            key: key.to_string(),
            logical_name: None,
            type_: parse_config_type(s, &range, diags),
            secret: None,
            default: None,
            items: None,
            range,
        };
    }

    let mut param = ConfigParam {
        key: key.to_string(),
        logical_name: None,
        type_: None,
        secret: None,
        default: None,
        items: None,
        range: range.clone(),
    };

    if let Some(entries) = node.as_object() {
        for (k, v) in entries {
            let lower = k.to_lowercase();
            if !CONFIG_FIELDS.contains(&lower.as_str()) {
                warn_unknown_field(diags, v.range(), k, CONFIG_FIELDS);
                continue;
            }
            match lower.as_str() {
                "type" => {
                    if let Some(s) = v.as_str() {
                        param.type_ = parse_config_type(s, v.range(), diags);
                    }
                }
                "name" => param.logical_name = v.as_str().map(str::to_string),
                "secret" => {
                    param.secret = match v {
                        SyntaxNode::Scalar(Scalar::Bool(b), _) => Some(*b),
                        _ => None,
                    }
                }
                "default" => param.default = Some(fold_expr(v, file, diags)),
                "items" => param.items = Some(Box::new(fold_config_param(key, v, file, diags))),
                _ => unreachable!(),
            }
        }
    }

    if param.default.is_none() && param.type_.is_none() {
        diags.error(Some(range.clone()), "either default or type is required", "");
    }

    param
}

fn parse_config_type(s: &str, range: &SourceRange, diags: &mut Diagnostics) -> Option<ConfigType> {
    match ConfigType::parse(s) {
        Some(t) => Some(t),
        None => {
            diags.error(Some(range.clone()), format!("unknown config type `{}`", s), "");
            None
        }
    }
}

fn fold_named_exprs(node: &SyntaxNode, file: &str, diags: &mut Diagnostics) -> Vec<(String, Expr)> {
    match node.as_object() {
        Some(entries) => entries
            .iter()
            .map(|(k, v)| (k.clone(), fold_expr(v, file, diags)))
            .collect(),
        None => {
            diags.error(Some(node.range().clone()), "expected a mapping of names to values", "");
            Vec::new()
        }
    }
}

fn fold_resources(node: &SyntaxNode, file: &str, diags: &mut Diagnostics) -> Vec<(String, Resource)> {
    let entries = match node.as_object() {
        Some(e) => e,
        None => {
            diags.error(Some(node.range().clone()), "`resources` must be a mapping", "");
            return Vec::new();
        }
    };
    entries
        .iter()
        .map(|(key, value)| (key.clone(), fold_resource(value, file, diags)))
        .collect()
}

fn fold_resource(node: &SyntaxNode, file: &str, diags: &mut Diagnostics) -> Resource {
    let range = node.range().clone();
    let mut type_token = String::new();
    let mut logical_name = None;
    let mut properties: Option<ResourceProperties> = None;
    let mut options = ResourceOptions::default();
    let mut get = None;

    let empty: Vec<(String, SyntaxNode)> = Vec::new();
    let entries = match node.as_object() {
        Some(e) => e,
        None => {
            diags.error(Some(range.clone()), "a resource must be a mapping", "");
            empty.as_slice()
        }
    };

    for (key, value) in entries {
        let lower = key.to_lowercase();
        if !RESOURCE_FIELDS.contains(&lower.as_str()) {
            warn_unknown_field(diags, value.range(), key, RESOURCE_FIELDS);
            continue;
        }
        match lower.as_str() {
            "type" => type_token = value.as_str().unwrap_or_default().to_string(),
            "name" => logical_name = value.as_str().map(str::to_string),
            "properties" => {
                properties = Some(match value.as_object() {
                    Some(entries) => ResourceProperties::Map(
                        entries.iter().map(|(k, v)| (k.clone(), fold_expr(v, file, diags))).collect(),
                    ),
                    None => ResourceProperties::Expr(fold_expr(value, file, diags)),
                });
            }
            "options" => options = fold_options(value, file, diags),
            "get" => get = Some(fold_get(value, file, diags)),
            _ => unreachable!(),
        }
    }

    if type_token.is_empty() {
        diags.error(Some(range.clone()), "resource is missing required field `type`", "");
    }

    let properties = properties.unwrap_or_else(|| ResourceProperties::Map(Vec::new()));
    if matches!(&properties, ResourceProperties::Map(m) if !m.is_empty()) && get.is_some() {
        if let Some(g) = &get {
            if !g.state.is_empty() {
                diags.error(Some(range.clone()), "`properties` and `get.state` are mutually exclusive", "");
            }
        }
    }

    Resource {
        type_token,
        logical_name,
        properties,
        options,
        get,
        range,
    }
}

fn fold_get(node: &SyntaxNode, file: &str, diags: &mut Diagnostics) -> GetBlock {
    let mut id = Expr::Null(node.range().clone());
    let mut state = Vec::new();
    if let Some(entries) = node.as_object() {
        for (k, v) in entries {
            match k.to_lowercase().as_str() {
                "id" => id = fold_expr(v, file, diags),
                "state" => {
                    if let Some(entries) = v.as_object() {
                        state = entries.iter().map(|(k, v)| (k.clone(), fold_expr(v, file, diags))).collect();
                    }
                }
                other => warn_unknown_field(diags, v.range(), other, &["id", "state"]),
            }
        }
    }
    GetBlock { id, state }
}

fn fold_options(node: &SyntaxNode, file: &str, diags: &mut Diagnostics) -> ResourceOptions {
    let mut options = ResourceOptions::default();
    let entries = match node.as_object() {
        Some(e) => e,
        None => return options,
    };
    for (key, value) in entries {
        let lower = key.to_lowercase().replace('_', "");
        if !OPTIONS_FIELDS.contains(&lower.as_str()) {
            warn_unknown_field(diags, value.range(), key, OPTIONS_FIELDS);
            continue;
        }
        match lower.as_str() {
            "additionalsecretoutputs" => {
                options.additional_secret_outputs = string_list(value);
            }
            "aliases" => {
                options.aliases = value
                    .as_list()
                    .map(|items| items.iter().map(|i| fold_expr(i, file, diags)).collect())
                    .unwrap_or_default();
            }
            "customtimeouts" => options.custom_timeouts = fold_custom_timeouts(value),
            "deletebeforereplace" => options.delete_before_replace = bool_scalar(value),
            "dependson" => {
                options.depends_on = value
                    .as_list()
                    .map(|items| items.iter().map(|i| fold_expr(i, file, diags)).collect())
                    .unwrap_or_else(|| vec![fold_expr(value, file, diags)]);
            }
            "ignorechanges" => options.ignore_changes = string_list(value),
            "import" => options.import = Some(fold_expr(value, file, diags)),
            "parent" => options.parent = Some(fold_expr(value, file, diags)),
            "protect" => options.protect = Some(fold_expr(value, file, diags)),
            "provider" => options.provider = Some(fold_expr(value, file, diags)),
            "providers" => {
                options.providers = value
                    .as_object()
                    .map(|entries| entries.iter().map(|(k, v)| (k.clone(), fold_expr(v, file, diags))).collect())
                    .unwrap_or_default();
            }
            "version" => options.version = value.as_str().map(str::to_string),
            "plugindownloadurl" => options.plugin_download_url = value.as_str().map(str::to_string),
            "replaceonchanges" => options.replace_on_changes = string_list(value),
            "retainondelete" => options.retain_on_delete = bool_scalar(value),
            "deletedwith" => options.deleted_with = Some(fold_expr(value, file, diags)),
            _ => unreachable!(),
        }
    }
    options
}

fn fold_custom_timeouts(node: &SyntaxNode) -> Option<CustomTimeouts> {
    let entries = node.as_object()?;
    let mut ct = CustomTimeouts { create: None, update: None, delete: None };
    for (k, v) in entries {
        match k.to_lowercase().as_str() {
            "create" => ct.create = v.as_str().map(str::to_string),
            "update" => ct.update = v.as_str().map(str::to_string),
            "delete" => ct.delete = v.as_str().map(str::to_string),
            _ => {}
        }
    }
    Some(ct)
}

fn bool_scalar(node: &SyntaxNode) -> Option<bool> {
    match node {
        SyntaxNode::Scalar(Scalar::Bool(b), _) => Some(*b),
        _ => None,
    }
}

fn string_list(node: &SyntaxNode) -> Vec<String> {
    node.as_list()
        .map(|items| items.iter().filter_map(|i| i.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

// ─── Expression folding ─────────────────────────────────────────────────────

const BUILTIN_KEYS: &[&str] = &[
    "fn::join",
    "fn::split",
    "fn::select",
    "fn::tojson",
    "fn::tobase64",
    "fn::frombase64",
    "fn::secret",
    "fn::readfile",
    "fn::invoke",
    "fn::stringasset",
    "fn::fileasset",
    "fn::remoteasset",
    "fn::assetarchive",
    "fn::filearchive",
    "fn::remotearchive",
];

/// Folds a single syntax node into an expression.
pub fn fold_expr(node: &SyntaxNode, file: &str, diags: &mut Diagnostics) -> Expr {
    let range = node.range().clone();
    match node {
        SyntaxNode::Scalar(Scalar::Null, _) => Expr::Null(range),
        SyntaxNode::Scalar(Scalar::Bool(b), _) => Expr::Bool(*b, range),
        SyntaxNode::Scalar(Scalar::Int(i), _) => Expr::Number(*i as f64, range),
        SyntaxNode::Scalar(Scalar::Float(f), _) => Expr::Number(*f, range),
        SyntaxNode::Scalar(Scalar::String(s), _) => fold_string_expr(s, range, diags),
        SyntaxNode::List(items, _) => {
            Expr::List(items.iter().map(|i| fold_expr(i, file, diags)).collect(), range)
        }
        SyntaxNode::Object(entries, _) => {
            if entries.len() == 1 && BUILTIN_KEYS.contains(&entries[0].0.to_lowercase().as_str()) {
                fold_builtin(&entries[0].0, &entries[0].1, file, range, diags)
            } else {
                Expr::Object(
                    entries.iter().map(|(k, v)| (k.clone(), fold_expr(v, file, diags))).collect(),
                    range,
                )
            }
        }
    }
}

fn fold_builtin(key: &str, args_node: &SyntaxNode, file: &str, range: SourceRange, diags: &mut Diagnostics) -> Expr {
    let lower = key.to_lowercase();
    let items = args_node.as_list();
    let nth = |i: usize| items.and_then(|l| l.get(i)).map(|n| fold_expr(n, file, diags));

    let builtin = match lower.as_str() {
        "fn::join" => match (nth(0), nth(1)) {
            (Some(a), Some(b)) => Some(Builtin::Join(Box::new(a), Box::new(b))),
            _ => {
                diags.error(Some(range.clone()), "fn::join requires [delimiter, values]", "");
                None
            }
        },
        "fn::split" => match (nth(0), nth(1)) {
            (Some(a), Some(b)) => Some(Builtin::Split(Box::new(a), Box::new(b))),
            _ => {
                diags.error(Some(range.clone()), "fn::split requires [delimiter, source]", "");
                None
            }
        },
        "fn::select" => match (nth(0), nth(1)) {
            (Some(a), Some(b)) => Some(Builtin::Select(Box::new(a), Box::new(b))),
            _ => {
                diags.error(Some(range.clone()), "fn::select requires [index, values]", "");
                None
            }
        },
        "fn::tojson" => Some(Builtin::ToJson(Box::new(fold_expr(args_node, file, diags)))),
        "fn::tobase64" => Some(Builtin::ToBase64(Box::new(fold_expr(args_node, file, diags)))),
        "fn::frombase64" => Some(Builtin::FromBase64(Box::new(fold_expr(args_node, file, diags)))),
        "fn::secret" => Some(Builtin::Secret(Box::new(fold_expr(args_node, file, diags)))),
        "fn::readfile" => Some(Builtin::ReadFile(Box::new(fold_expr(args_node, file, diags)))),
        "fn::stringasset" => Some(Builtin::StringAsset(Box::new(fold_expr(args_node, file, diags)))),
        "fn::fileasset" => Some(Builtin::FileAsset(Box::new(fold_expr(args_node, file, diags)))),
        "fn::remoteasset" => Some(Builtin::RemoteAsset(Box::new(fold_expr(args_node, file, diags)))),
        "fn::filearchive" => Some(Builtin::FileArchive(Box::new(fold_expr(args_node, file, diags)))),
        "fn::remotearchive" => Some(Builtin::RemoteArchive(Box::new(fold_expr(args_node, file, diags)))),
        "fn::assetarchive" => {
            let entries = args_node
                .as_object()
                .map(|entries| entries.iter().map(|(k, v)| (k.clone(), fold_expr(v, file, diags))).collect())
                .unwrap_or_default();
            Some(Builtin::AssetArchive(entries))
        }
        "fn::invoke" => {
            let entries = args_node.as_object();
            let function = entries
                .and_then(|e| e.iter().find(|(k, _)| k.eq_ignore_ascii_case("function")))
                .map(|(_, v)| fold_expr(v, file, diags))
                .unwrap_or_else(|| {
                    diags.error(Some(range.clone()), "fn::invoke requires a `function` field", "");
                    Expr::Null(range.clone())
                });
            let args = entries
                .and_then(|e| e.iter().find(|(k, _)| k.eq_ignore_ascii_case("arguments")))
                .map(|(_, v)| Box::new(fold_expr(v, file, diags)));
            let return_ = entries
                .and_then(|e| e.iter().find(|(k, _)| k.eq_ignore_ascii_case("return")))
                .and_then(|(_, v)| v.as_str().map(str::to_string));
            Some(Builtin::Invoke { function: Box::new(function), args, return_ })
        }
        _ => None,
    };

    match builtin {
        Some(b) => Expr::Builtin(b, range),
        None => {
            warn!(builtin = %lower, "Malformed builtin arguments, falling back to null");
            Expr::Null(range)
        }
    }
}

/// Parses a scalar string for `${…}` interpolation. A string consisting of
/// exactly one interpolation and nothing else folds to a bare `Symbol`
/// expression; otherwise literal and access segments alternate in an
/// `Interpolate` expression. `$${x}` is the literal-dollar escape.
fn fold_string_expr(s: &str, range: SourceRange, diags: &mut Diagnostics) -> Expr {
    let mut parts: Vec<InterpPart> = Vec::new();
    let mut literal = String::new();
    let chars: Vec<char> = s.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '$' && chars.get(i + 1) == Some(&'$') && chars.get(i + 2) == Some(&'{') {
            // `$${` escapes to a literal `${`.
            literal.push_str("${");
            i += 3;
            continue;
        }
        if chars[i] == '$' && chars.get(i + 1) == Some(&'{') {
            let content_start = i + 2;
            if let Some(end) = find_matching_brace(&chars, content_start) {
                let content: String = chars[content_start..end].iter().collect();
                if !literal.is_empty() {
                    parts.push(InterpPart::Literal(std::mem::take(&mut literal)));
                }
                if content.trim().is_empty() {
                    diags.error(Some(range.clone()), "empty `${}` interpolation", "");
                } else {
                    match parse_property_access(&content) {
                        Ok(access) => parts.push(InterpPart::Access(access)),
                        Err(e) => diags.error(Some(range.clone()), format!("invalid interpolation: {}", e), ""),
                    }
                }
                i = end + 1;
                continue;
            } else {
                diags.error(Some(range.clone()), "unterminated `${` interpolation", "");
                literal.push(chars[i]);
                i += 1;
                continue;
            }
        }
        literal.push(chars[i]);
        i += 1;
    }
    if !literal.is_empty() {
        parts.push(InterpPart::Literal(literal));
    }

    match parts.as_slice() {
        [] => Expr::String(String::new(), range),
        [InterpPart::Access(access)] => Expr::Symbol(access.clone(), range),
        [InterpPart::Literal(_)] => Expr::String(s.to_string(), range),
        _ => Expr::Interpolate(parts, range),
    }
}

fn find_matching_brace(chars: &[char], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_quote = false;
    let mut i = start;
    while i < chars.len() {
        match chars[i] {
            '"' => in_quote = !in_quote,
            '\\' if in_quote => i += 1,
            '[' if !in_quote => depth += 1,
            ']' if !in_quote => depth = depth.saturating_sub(1),
            '}' if !in_quote => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

/// Parses `a.b[0]["c"]` into a `PropertyAccess`.
fn parse_property_access(s: &str) -> Result<PropertyAccess, String> {
    let chars: Vec<char> = s.chars().collect();
    let mut i = 0;
    let root = take_name(&chars, &mut i)?;
    if root.is_empty() {
        return Err("expected a name".to_string());
    }
    let mut accessors = Vec::new();
    while i < chars.len() {
        match chars[i] {
            '.' => {
                i += 1;
                let name = take_name(&chars, &mut i)?;
                accessors.push(Accessor::Name(name));
            }
            '[' => {
                i += 1;
                let key = take_index(&chars, &mut i)?;
                if chars.get(i) != Some(&']') {
                    return Err("expected `]`".to_string());
                }
                i += 1;
                accessors.push(Accessor::Index(key));
            }
            c => return Err(format!("unexpected character `{}`", c)),
        }
    }
    Ok(PropertyAccess { root, accessors })
}

fn take_name(chars: &[char], i: &mut usize) -> Result<String, String> {
    let start = *i;
    while *i < chars.len() && !matches!(chars[*i], '.' | '[' | ']') {
        *i += 1;
    }
    Ok(chars[start..*i].iter().collect())
}

fn take_index(chars: &[char], i: &mut usize) -> Result<IndexKey, String> {
    if chars.get(*i) == Some(&'"') {
        *i += 1;
        let mut out = String::new();
        while *i < chars.len() && chars[*i] != '"' {
            if chars[*i] == '\\' && chars.get(*i + 1) == Some(&'u') {
                let hex: String = chars[*i + 2..*i + 6].iter().collect();
                let code = u32::from_str_radix(&hex, 16).map_err(|_| "invalid \\u escape".to_string())?;
                out.push(char::from_u32(code).ok_or("invalid \\u escape")?);
                *i += 6;
            } else {
                out.push(chars[*i]);
                *i += 1;
            }
        }
        if chars.get(*i) != Some(&'"') {
            return Err("unterminated quoted index".to_string());
        }
        *i += 1;
        Ok(IndexKey::String(out))
    } else {
        let start = *i;
        if chars.get(*i) == Some(&'-') {
            *i += 1;
        }
        while *i < chars.len() && chars[*i].is_ascii_digit() {
            *i += 1;
        }
        let text: String = chars[start..*i].iter().collect();
        text.parse::<i64>().map(IndexKey::Int).map_err(|_| "expected an integer index".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_yaml;

    fn fold(src: &str) -> (Template, Diagnostics) {
        let (doc, mut diags) = parse_yaml(src, "Pulumi.yaml");
        let (t, d2) = fold_template(&doc, "Pulumi.yaml");
        diags.extend(d2);
        (t, diags)
    }

    #[test]
    fn bare_interpolation_becomes_symbol() {
        let (t, diags) = fold(
            r#"
name: test
outputs:
  o: ${r.bar}
"#,
        );
        assert!(!diags.has_errors());
        match &t.outputs[0].1 {
            Expr::Symbol(access, _) => {
                assert_eq!(access.root, "r");
                assert_eq!(access.accessors, vec![Accessor::Name("bar".to_string())]);
            }
            other => panic!("expected Symbol, got {:?}", other),
        }
    }

    #[test]
    fn indexed_and_named_accessors_combine() {
        let (t, _) = fold(
            r#"
name: test
outputs:
  o: ${resA.outList[0].value}
"#,
        );
        match &t.outputs[0].1 {
            Expr::Symbol(access, _) => {
                assert_eq!(access.root, "resA");
                assert_eq!(
                    access.accessors,
                    vec![
                        Accessor::Name("outList".to_string()),
                        Accessor::Index(IndexKey::Int(0)),
                        Accessor::Name("value".to_string()),
                    ]
                );
            }
            other => panic!("expected Symbol, got {:?}", other),
        }
    }

    #[test]
    fn escaped_dollar_is_literal() {
        let (t, diags) = fold(
            r#"
name: test
outputs:
  o: "$${x}"
"#,
        );
        assert!(!diags.has_errors());
        match &t.outputs[0].1 {
            Expr::String(s, _) => assert_eq!(s, "${x}"),
            other => panic!("expected String, got {:?}", other),
        }
    }

    #[test]
    fn empty_interpolation_is_diagnostic() {
        let (_, diags) = fold(
            r#"
name: test
outputs:
  o: "${}"
"#,
        );
        assert!(diags.has_errors());
    }

    #[test]
    fn unknown_top_level_field_warns_with_suggestion() {
        let (_, diags) = fold(
            r#"
name: test
resourcess: {}
"#,
        );
        let msgs: Vec<String> = diags.iter().map(|d| d.summary.clone()).collect();
        assert!(msgs.iter().any(|m| m.contains("resourcess")));
    }

    #[test]
    fn resource_fn_join_builtin_parses() {
        let (t, diags) = fold(
            r#"
name: test
resources:
  r:
    type: test:resource:t
    properties:
      foo:
        fn::join: [",", ["a", "b", "c"]]
"#,
        );
        assert!(!diags.has_errors());
        let (_, resource) = &t.resources[0];
        match &resource.properties {
            ResourceProperties::Map(props) => match &props[0].1 {
                Expr::Builtin(Builtin::Join(_, _), _) => {}
                other => panic!("expected Builtin::Join, got {:?}", other),
            },
            other => panic!("expected Map properties, got {:?}", other),
        }
    }
}
