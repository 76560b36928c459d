//! The evaluator (spec component F): walks a `Template` in dependency
//! order, turning its declarations into `Eventual` values and dispatching
//! resource registration/reads and function invocation through an
//! `OrchestratorClient`.
//!
//! Each expression evaluates to `(Eventual, Diagnostics)` returned by
//! value rather than threaded through a shared mutable accumulator — the
//! same shape `types::checker::infer_expr_type` uses for its own
//! best-effort walk, generalized here to also carry the resolved value.
//! Recursion goes through `futures::future::BoxFuture` since `Expr` is
//! self-referential and `async fn` cannot recurse directly.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, info};

use crate::ast::{
    Accessor, Builtin, ConfigParam, Expr, IndexKey, InterpPart, Resource, ResourceProperties, Template,
};
use crate::diagnostics::{Diagnostics, SourceRange};
use crate::graph::{build_graph, topological_order, NodeKind};
use crate::schema::{package_name_of, Package, PackageError, PackageLoader};

use super::builtins;
use super::config_source::ConfigSource;
use super::orchestrator::{
    CallRequest, OrchestratorClient, ReadResourceRequest, RegisterResourceOptions, RegisterResourceRequest,
};
use super::value::{Eventual, Value};

/// The read-only collaborators an evaluation run needs, bundled so
/// `eval_expr` doesn't grow an ever-longer parameter list as new builtins
/// are added.
#[derive(Clone, Copy)]
pub struct EvalCtx<'a> {
    pub orchestrator: &'a dyn OrchestratorClient,
    pub package: &'a dyn Package,
    pub config_source: &'a dyn ConfigSource,
    /// During preview, a missing (non-defaulted) config value or an
    /// unresolved `get.id` becomes unknown rather than an error.
    pub preview: bool,
    pub cwd: &'a Path,
    pub allow_external_paths: bool,
}

#[derive(Debug, Clone)]
pub struct EvalOptions {
    pub preview: bool,
    pub cwd: PathBuf,
    pub allow_external_paths: bool,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self { preview: false, cwd: PathBuf::from("."), allow_external_paths: false }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EvalOutcome {
    pub diagnostics: Diagnostics,
    /// Every exported output, in declaration order, regardless of
    /// poison/secret state — a poisoned export still appears so a caller
    /// can see which outputs did not resolve.
    pub exports: Vec<(String, Value)>,
}

/// Evaluates `template` end to end: builds the dependency graph, walks it
/// in topological order, and exports every output via `orchestrator`.
///
/// Evaluation dispatches strictly in the flat topological order rather
/// than per-level concurrently — a deliberate simplification over the
/// engine's `DagWalker`-style concurrent dispatch, documented in
/// DESIGN.md. A node whose own evaluation raises a diagnostic does not
/// stop sibling nodes from being attempted; only a graph-level error
/// (a name collision or a cycle) aborts the whole run before anything is
/// evaluated.
pub async fn run_template(
    template: &Template,
    package: Arc<dyn Package>,
    orchestrator: &dyn OrchestratorClient,
    config_source: &dyn ConfigSource,
    options: EvalOptions,
) -> EvalOutcome {
    info!(
        template = %template.name,
        config = template.config.len(),
        variables = template.variables.len(),
        resources = template.resources.len(),
        outputs = template.outputs.len(),
        preview = options.preview,
        "Evaluating template",
    );
    let built = build_graph(template);
    if built.diagnostics.has_errors() {
        info!(template = %template.name, "Graph build failed, aborting before evaluation");
        return EvalOutcome { diagnostics: built.diagnostics, exports: Vec::new() };
    }
    let order = match topological_order(&built) {
        Ok(order) => order,
        Err(diags) => {
            info!(template = %template.name, "Topological ordering failed, aborting before evaluation");
            return EvalOutcome { diagnostics: diags, exports: Vec::new() };
        }
    };
    debug!(nodes = order.len(), "Topological order computed");

    let mut diags = built.diagnostics;
    let mut env: HashMap<String, Eventual> = HashMap::new();
    let mut exports = Vec::new();

    let config_by_name: HashMap<&str, &ConfigParam> =
        template.config.iter().map(|(_, p)| (p.exported_name(), p)).collect();
    let resource_by_name: HashMap<String, &Resource> = template
        .resources
        .iter()
        .map(|(name, r)| (r.exported_name(name), r))
        .collect();
    let variable_by_name: HashMap<&str, &Expr> = template.variables.iter().map(|(n, e)| (n.as_str(), e)).collect();
    let output_by_name: HashMap<&str, &Expr> = template.outputs.iter().map(|(n, e)| (n.as_str(), e)).collect();

    let ctx = EvalCtx {
        orchestrator,
        package: package.as_ref(),
        config_source,
        preview: options.preview,
        cwd: &options.cwd,
        allow_external_paths: options.allow_external_paths,
    };

    for idx in order {
        let node = &built.graph[idx];
        match node.kind {
            NodeKind::Config => {
                if let Some(param) = config_by_name.get(node.name.as_str()) {
                    let (value, d) = eval_config(param, &env, ctx).await;
                    diags.extend(d);
                    env.insert(node.name.clone(), value);
                }
            }
            NodeKind::Variable => {
                if let Some(expr) = variable_by_name.get(node.name.as_str()) {
                    let (value, d) = eval_expr(expr, &env, ctx).await;
                    diags.extend(d);
                    env.insert(node.name.clone(), value);
                }
            }
            NodeKind::Resource => {
                if let Some(resource) = resource_by_name.get(&node.name) {
                    let (value, d) = eval_resource(&node.name, resource, &env, ctx).await;
                    diags.extend(d);
                    env.insert(node.name.clone(), value);
                }
            }
            NodeKind::Output => {
                if let Some(expr) = output_by_name.get(node.name.as_str()) {
                    let (value, d) = eval_expr(expr, &env, ctx).await;
                    diags.extend(d);
                    if !value.poisoned {
                        if let Some(v) = &value.value {
                            orchestrator.export(&node.name, v).await;
                            exports.push((node.name.clone(), v.clone()));
                        } else {
                            // unknown (preview) output: nothing concrete to export yet.
                        }
                    }
                    env.insert(node.name.clone(), value);
                }
            }
        }
    }

    info!(
        template = %template.name,
        exports = exports.len(),
        errors = diags.has_errors(),
        "Template evaluation finished",
    );
    EvalOutcome { diagnostics: diags, exports }
}

/// Evaluates a config parameter: its `default` expression if present,
/// otherwise the configured value from `ConfigSource`, parsed against its
/// declared type. A value that fails to parse against its declared type
/// (e.g. a float default for an integer parameter) gets both a diagnostic
/// and a poisoned result — poison is the universal short-circuit, not a
/// special config-only path.
async fn eval_config(param: &ConfigParam, env: &HashMap<String, Eventual>, ctx: EvalCtx<'_>) -> (Eventual, Diagnostics) {
    let mut diags = Diagnostics::new();
    if let Some(default) = &param.default {
        let (value, d) = eval_expr(default, env, ctx).await;
        diags.extend(d);
        if let (Some(ty), Some(v)) = (&param.type_, &value.value) {
            if !value_matches_config_type(v, ty) {
                diags.error(
                    Some(param.range.clone()),
                    format!("config `{}`: default value does not match declared type", param.exported_name()),
                    "",
                );
                return (Eventual::poison(), diags);
            }
        }
        return (value, diags);
    }

    let raw = ctx.config_source.get(param.exported_name());
    match raw {
        Some(raw) => match parse_config_value(&raw, param.type_.as_ref()) {
            Ok(v) => (Eventual::known(v).with_secret(param.secret.unwrap_or(false)), diags),
            Err(msg) => {
                diags.error(Some(param.range.clone()), format!("config `{}`: {}", param.exported_name(), msg), "");
                (Eventual::poison(), diags)
            }
        },
        None if ctx.preview => (Eventual::unknown(BTreeSet::new()).with_secret(param.secret.unwrap_or(false)), diags),
        None => {
            diags.error(
                Some(param.range.clone()),
                format!("missing required configuration value `{}`", param.exported_name()),
                "",
            );
            (Eventual::poison(), diags)
        }
    }
}

fn value_matches_config_type(v: &Value, ty: &crate::ast::ConfigType) -> bool {
    use crate::ast::ConfigType;
    match (ty, v) {
        (ConfigType::String, Value::String(_)) => true,
        (ConfigType::Boolean, Value::Bool(_)) => true,
        (ConfigType::Number, Value::Number(_)) => true,
        (ConfigType::Integer, Value::Number(n)) => n.fract() == 0.0,
        (ConfigType::Array(inner), Value::List(items)) => items.iter().all(|i| value_matches_config_type(i, inner)),
        _ => false,
    }
}

/// Parses a raw config string against its declared type. No declared type
/// means the value stays a string, matching the engine's own leniency
/// when a config entry omits `type:`.
fn parse_config_value(raw: &str, ty: Option<&crate::ast::ConfigType>) -> Result<Value, String> {
    use crate::ast::ConfigType;
    match ty {
        None | Some(ConfigType::String) => Ok(Value::String(raw.to_string())),
        Some(ConfigType::Boolean) => raw.parse::<bool>().map(Value::Bool).map_err(|_| format!("`{}` is not a boolean", raw)),
        Some(ConfigType::Number) => raw.parse::<f64>().map(Value::Number).map_err(|_| format!("`{}` is not a number", raw)),
        Some(ConfigType::Integer) => raw
            .parse::<i64>()
            .map(|n| Value::Number(n as f64))
            .map_err(|_| format!("`{}` is not an integer", raw)),
        Some(ConfigType::Array(inner)) => {
            let parsed: serde_json::Value = serde_json::from_str(raw).map_err(|_| format!("`{}` is not valid JSON", raw))?;
            let items = parsed.as_array().ok_or_else(|| format!("`{}` is not an array", raw))?;
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                let as_str = match item {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                out.push(parse_config_value(&as_str, Some(inner))?);
            }
            Ok(Value::List(out))
        }
    }
}

pub fn eval_expr<'a>(
    expr: &'a Expr,
    env: &'a HashMap<String, Eventual>,
    ctx: EvalCtx<'a>,
) -> BoxFuture<'a, (Eventual, Diagnostics)> {
    async move {
        let mut diags = Diagnostics::new();
        let value = match expr {
            Expr::Null(_) => Eventual::known(Value::Null),
            Expr::Bool(b, _) => Eventual::known(Value::Bool(*b)),
            Expr::Number(n, _) => Eventual::known(Value::Number(*n)),
            Expr::String(s, _) => Eventual::known(Value::String(s.clone())),
            Expr::Interpolate(parts, range) => {
                let mut rendered = String::new();
                let mut known = true;
                let mut secret = false;
                let mut poisoned = false;
                let mut deps = BTreeSet::new();
                for part in parts {
                    match part {
                        InterpPart::Literal(text) => rendered.push_str(text),
                        InterpPart::Access(access) => {
                            let (v, d) = eval_property_access(access, range, env, ctx).await;
                            diags.extend(d);
                            known &= v.known;
                            secret |= v.secret;
                            poisoned |= v.poisoned;
                            deps.extend(v.deps.iter().cloned());
                            if let Some(value) = &v.value {
                                rendered.push_str(&interp_render(value));
                            }
                        }
                    }
                }
                if poisoned {
                    Eventual { value: None, known: false, secret, poisoned: true, deps }
                } else if !known {
                    Eventual { value: None, known: false, secret, poisoned: false, deps }
                } else {
                    Eventual { value: Some(Value::String(rendered)), known: true, secret, poisoned: false, deps }
                }
            }
            Expr::Symbol(access, range) => {
                let (v, d) = eval_property_access(access, range, env, ctx).await;
                diags.extend(d);
                v
            }
            Expr::List(items, _) => {
                let mut values = Vec::with_capacity(items.len());
                let mut refs: Vec<Eventual> = Vec::with_capacity(items.len());
                for item in items {
                    let (v, d) = eval_expr(item, env, ctx).await;
                    diags.extend(d);
                    refs.push(v);
                }
                let borrowed: Vec<&Eventual> = refs.iter().collect();
                let (known, secret, poisoned, deps) = Eventual::combine(&borrowed);
                if poisoned {
                    Eventual { value: None, known: false, secret, poisoned: true, deps }
                } else if !known {
                    Eventual { value: None, known: false, secret, poisoned: false, deps }
                } else {
                    for r in &refs {
                        values.push(r.value.clone().expect("known implies Some"));
                    }
                    Eventual { value: Some(Value::List(values)), known: true, secret, poisoned: false, deps }
                }
            }
            Expr::Object(entries, _) => {
                let mut refs: Vec<(String, Eventual)> = Vec::with_capacity(entries.len());
                for (k, v_expr) in entries {
                    let (v, d) = eval_expr(v_expr, env, ctx).await;
                    diags.extend(d);
                    refs.push((k.clone(), v));
                }
                let borrowed: Vec<&Eventual> = refs.iter().map(|(_, v)| v).collect();
                let (known, secret, poisoned, deps) = Eventual::combine(&borrowed);
                if poisoned {
                    Eventual { value: None, known: false, secret, poisoned: true, deps }
                } else if !known {
                    Eventual { value: None, known: false, secret, poisoned: false, deps }
                } else {
                    let values: Vec<(String, Value)> = refs
                        .into_iter()
                        .map(|(k, v)| (k, v.value.expect("known implies Some")))
                        .collect();
                    Eventual { value: Some(Value::Map(values)), known: true, secret, poisoned: false, deps }
                }
            }
            Expr::Builtin(b, range) => {
                let (v, d) = eval_builtin(b, range, env, ctx).await;
                diags.extend(d);
                v
            }
        };
        (value, diags)
    }
    .boxed()
}

/// Renders a `Value` for substitution into an interpolated string.
/// Scalars render plainly; composite values fall back to their JSON form
/// rather than failing, matching how the evaluator elsewhere prefers a
/// best-effort result with a diagnostic over a hard stop.
fn interp_render(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if n.fract() == 0.0 && n.abs() < 9.0e15 {
                (*n as i64).to_string()
            } else {
                n.to_string()
            }
        }
        Value::String(s) => s.clone(),
        other => other.to_json().to_string(),
    }
}

async fn eval_property_access<'a>(
    access: &'a crate::ast::PropertyAccess,
    range: &SourceRange,
    env: &'a HashMap<String, Eventual>,
    ctx: EvalCtx<'a>,
) -> (Eventual, Diagnostics) {
    let mut diags = Diagnostics::new();
    let Some(root) = env.get(access.root_name()) else {
        diags.error(Some(range.clone()), format!("reference to undefined symbol `{}`", access.root_name()), "");
        return (Eventual::poison(), diags);
    };
    if root.poisoned {
        return (Eventual::poison(), diags);
    }
    if !root.known {
        return (Eventual::unknown(root.deps.clone()).with_secret(root.secret), diags);
    }
    let mut current = root.value.clone();
    for accessor in &access.accessors {
        let Some(value) = current else { break };
        match walk_accessor(&value, accessor, access, range, &mut diags) {
            Some(next) => current = Some(next),
            None => {
                return (Eventual { value: None, known: false, secret: root.secret, poisoned: true, deps: root.deps.clone() }, diags);
            }
        }
    }
    (
        Eventual {
            value: current,
            known: true,
            secret: root.secret,
            poisoned: false,
            deps: root.deps.clone(),
        },
        diags,
    )
}

fn walk_accessor(
    value: &Value,
    accessor: &Accessor,
    access: &crate::ast::PropertyAccess,
    range: &SourceRange,
    diags: &mut Diagnostics,
) -> Option<Value> {
    match accessor {
        Accessor::Name(name) => match value.as_map() {
            Some(entries) => match entries.iter().find(|(k, _)| k == name) {
                Some((_, v)) => Some(v.clone()),
                None => {
                    diags.error(Some(range.clone()), format!("no property `{}` on `{}`", name, access.root_name()), "");
                    None
                }
            },
            None => {
                diags.error(
                    Some(range.clone()),
                    format!("cannot access property `{}` on {} `{}`", name, value.type_name(), access.root_name()),
                    "",
                );
                None
            }
        },
        Accessor::Index(IndexKey::Int(i)) => match value.as_list() {
            Some(items) => {
                if *i < 0 || *i as usize >= items.len() {
                    diags.error(Some(range.clone()), format!("index {} out of range on `{}`", i, access.root_name()), "");
                    None
                } else {
                    Some(items[*i as usize].clone())
                }
            }
            None => {
                diags.error(
                    Some(range.clone()),
                    format!("cannot index into {} `{}`", value.type_name(), access.root_name()),
                    "",
                );
                None
            }
        },
        Accessor::Index(IndexKey::String(key)) => match value.as_map() {
            Some(entries) => match entries.iter().find(|(k, _)| k == key) {
                Some((_, v)) => Some(v.clone()),
                None => {
                    diags.error(Some(range.clone()), format!("no property `{}` on `{}`", key, access.root_name()), "");
                    None
                }
            },
            None => {
                diags.error(
                    Some(range.clone()),
                    format!("cannot access property `{}` on {} `{}`", key, value.type_name(), access.root_name()),
                    "",
                );
                None
            }
        },
    }
}

fn eval_builtin<'a>(
    b: &'a Builtin,
    range: &'a SourceRange,
    env: &'a HashMap<String, Eventual>,
    ctx: EvalCtx<'a>,
) -> BoxFuture<'a, (Eventual, Diagnostics)> {
    async move {
        let mut diags = Diagnostics::new();
        let value = match b {
            Builtin::Join(delim, values) => {
                let (d, dd) = eval_expr(delim, env, ctx).await;
                diags.extend(dd);
                let (v, dv) = eval_expr(values, env, ctx).await;
                diags.extend(dv);
                builtins::join(&d, &v, range, &mut diags)
            }
            Builtin::Split(delim, source) => {
                let (d, dd) = eval_expr(delim, env, ctx).await;
                diags.extend(dd);
                let (s, ds) = eval_expr(source, env, ctx).await;
                diags.extend(ds);
                builtins::split(&d, &s, range, &mut diags)
            }
            Builtin::Select(index, values) => {
                let (i, di) = eval_expr(index, env, ctx).await;
                diags.extend(di);
                let (v, dv) = eval_expr(values, env, ctx).await;
                diags.extend(dv);
                builtins::select(&i, &v, range, &mut diags)
            }
            Builtin::ToJson(inner) => {
                let (v, d) = eval_expr(inner, env, ctx).await;
                diags.extend(d);
                builtins::to_json(&v)
            }
            Builtin::ToBase64(inner) => {
                let (v, d) = eval_expr(inner, env, ctx).await;
                diags.extend(d);
                builtins::to_base64(&v, range, &mut diags)
            }
            Builtin::FromBase64(inner) => {
                let (v, d) = eval_expr(inner, env, ctx).await;
                diags.extend(d);
                builtins::from_base64(&v, range, &mut diags)
            }
            Builtin::Secret(inner) => {
                let (v, d) = eval_expr(inner, env, ctx).await;
                diags.extend(d);
                builtins::secret(&v)
            }
            Builtin::ReadFile(inner) => {
                let (v, d) = eval_expr(inner, env, ctx).await;
                diags.extend(d);
                builtins::read_file(&v, ctx.cwd, ctx.allow_external_paths, range, &mut diags)
            }
            Builtin::StringAsset(inner) => {
                let (v, d) = eval_expr(inner, env, ctx).await;
                diags.extend(d);
                builtins::string_asset(&v, range, &mut diags)
            }
            Builtin::FileAsset(inner) => {
                let (v, d) = eval_expr(inner, env, ctx).await;
                diags.extend(d);
                builtins::file_asset(&v, range, &mut diags)
            }
            Builtin::RemoteAsset(inner) => {
                let (v, d) = eval_expr(inner, env, ctx).await;
                diags.extend(d);
                builtins::remote_asset(&v, range, &mut diags)
            }
            Builtin::FileArchive(inner) => {
                let (v, d) = eval_expr(inner, env, ctx).await;
                diags.extend(d);
                builtins::file_archive(&v, range, &mut diags)
            }
            Builtin::RemoteArchive(inner) => {
                let (v, d) = eval_expr(inner, env, ctx).await;
                diags.extend(d);
                builtins::remote_archive(&v, range, &mut diags)
            }
            Builtin::AssetArchive(entries) => {
                let mut refs = Vec::with_capacity(entries.len());
                for (k, e) in entries {
                    let (v, d) = eval_expr(e, env, ctx).await;
                    diags.extend(d);
                    refs.push((k.clone(), v));
                }
                builtins::asset_archive(&refs)
            }
            Builtin::Invoke { function, args, return_ } => {
                let (v, d) = eval_invoke(function, args.as_deref(), return_.as_deref(), range, env, ctx).await;
                diags.extend(d);
                v
            }
        };
        (value, diags)
    }
    .boxed()
}

async fn eval_invoke<'a>(
    function: &'a Expr,
    args: Option<&'a Expr>,
    return_: Option<&'a str>,
    range: &'a SourceRange,
    env: &'a HashMap<String, Eventual>,
    ctx: EvalCtx<'a>,
) -> (Eventual, Diagnostics) {
    let mut diags = Diagnostics::new();
    let (func_val, d) = eval_expr(function, env, ctx).await;
    diags.extend(d);

    let (args_val, d) = match args {
        Some(a) => eval_expr(a, env, ctx).await,
        None => (Eventual::known(Value::Map(Vec::new())), Diagnostics::new()),
    };
    diags.extend(d);

    let (known, secret, poisoned, deps) = Eventual::combine(&[&func_val, &args_val]);
    if poisoned {
        return (Eventual { value: None, known: false, secret, poisoned: true, deps }, diags);
    }
    if !known {
        // invoke with an unknown argument does not call out; result is unknown.
        return (Eventual { value: None, known: false, secret, poisoned: false, deps }, diags);
    }

    let token = match func_val.value.as_ref().and_then(Value::as_str) {
        Some(s) => s,
        None => {
            diags.error(Some(range.clone()), "fn::invoke function token must be a string", "");
            return (Eventual { value: None, known: false, secret, poisoned: true, deps }, diags);
        }
    };
    let canonical = match ctx.package.resolve_function(token) {
        Ok(t) => t,
        Err(PackageError::UnknownFunction(t)) => {
            diags.error(Some(range.clone()), format!("unknown function `{}`", t), "");
            return (Eventual { value: None, known: false, secret, poisoned: true, deps }, diags);
        }
        Err(e) => {
            diags.error(Some(range.clone()), e.to_string(), "");
            return (Eventual { value: None, known: false, secret, poisoned: true, deps }, diags);
        }
    };
    let arg_entries = args_val.value.as_ref().and_then(Value::as_map).unwrap_or(&[]).to_vec();

    debug!(function = %canonical, "Invoking function");
    let result = ctx
        .orchestrator
        .call(CallRequest { token: canonical, args: arg_entries })
        .await;

    match result {
        Ok(outputs) => {
            let value = match return_ {
                Some(field) => outputs
                    .iter()
                    .find(|(k, _)| k == field)
                    .map(|(_, v)| v.clone())
                    .unwrap_or(Value::Null),
                None => Value::Map(outputs),
            };
            (Eventual { value: Some(value), known: true, secret, poisoned: false, deps }, diags)
        }
        Err(e) => {
            diags.error(Some(range.clone()), format!("fn::invoke: {}", e), "");
            (Eventual { value: None, known: false, secret, poisoned: true, deps }, diags)
        }
    }
}

/// Evaluates a resource declaration: either a `get` (read an existing
/// resource) or a registration of a new one.
async fn eval_resource<'a>(
    logical_name: &str,
    resource: &'a Resource,
    env: &'a HashMap<String, Eventual>,
    ctx: EvalCtx<'a>,
) -> (Eventual, Diagnostics) {
    let mut diags = Diagnostics::new();
    let canonical = match ctx.package.resolve_resource(&resource.type_token) {
        Ok(t) => t,
        Err(e) => {
            diags.error(Some(resource.range.clone()), e.to_string(), "");
            return (Eventual::poison(), diags);
        }
    };

    if let Some(get) = &resource.get {
        let (id_val, d) = eval_expr(&get.id, env, ctx).await;
        diags.extend(d);
        if id_val.poisoned {
            return (Eventual::poison(), diags);
        }
        if !id_val.known {
            let mut deps = id_val.deps.clone();
            deps.insert(logical_name.to_string());
            return (Eventual::unknown(deps), diags);
        }
        let id = match id_val.value.as_ref().and_then(Value::as_str) {
            Some(s) => s.to_string(),
            None => {
                diags.error(Some(get.id.range().clone()), "resource `get.id` must be a string", "");
                return (Eventual::poison(), diags);
            }
        };

        let mut state = Vec::with_capacity(get.state.len());
        for (k, expr) in &get.state {
            let (v, d) = eval_expr(expr, env, ctx).await;
            diags.extend(d);
            if let Some(value) = v.value {
                state.push((k.clone(), value));
            }
        }

        debug!(name = logical_name, type_token = %canonical, id = %id, "Reading resource");
        let response = ctx
            .orchestrator
            .read_resource(ReadResourceRequest {
                type_token: canonical.clone(),
                name: logical_name.to_string(),
                id: id.clone(),
                state,
            })
            .await;

        return match response {
            Ok(outputs) => {
                let secret = is_secret_bag(ctx.package, &canonical, &resource.options.additional_secret_outputs, &outputs);
                let bag = build_output_bag(outputs, Some(id), &canonical, resource.exported_name(logical_name).as_str());
                let mut deps = BTreeSet::new();
                deps.insert(logical_name.to_string());
                info!(name = logical_name, type_token = %canonical, "Resource read");
                (Eventual { value: Some(bag), known: true, secret, poisoned: false, deps }, diags)
            }
            Err(e) => {
                diags.error(Some(resource.range.clone()), format!("reading resource `{}`: {}", logical_name, e), "");
                (Eventual::poison(), diags)
            }
        };
    }

    let mut input_refs: Vec<(String, Eventual)> = Vec::new();
    match &resource.properties {
        ResourceProperties::Map(entries) => {
            for (k, expr) in entries {
                let (v, d) = eval_expr(expr, env, ctx).await;
                diags.extend(d);
                input_refs.push((k.clone(), v));
            }
        }
        ResourceProperties::Expr(expr) => {
            let (v, d) = eval_expr(expr, env, ctx).await;
            diags.extend(d);
            if v.poisoned {
                return (Eventual::poison(), diags);
            }
            if !v.known {
                let mut deps = v.deps.clone();
                deps.insert(logical_name.to_string());
                return (Eventual::unknown(deps), diags);
            }
            match v.value.as_ref().and_then(Value::as_map) {
                Some(entries) => {
                    for (k, value) in entries {
                        input_refs.push((k.clone(), Eventual::known(value.clone()).with_secret(v.secret)));
                    }
                }
                None => {
                    diags.error(Some(expr.range().clone()), "resource properties must evaluate to an object", "");
                    return (Eventual::poison(), diags);
                }
            }
        }
    }

    let borrowed: Vec<&Eventual> = input_refs.iter().map(|(_, v)| v).collect();
    let (known, input_secret, poisoned, mut deps) = Eventual::combine(&borrowed);
    deps.insert(logical_name.to_string());
    if poisoned {
        return (Eventual::poison(), diags);
    }
    if !known {
        return (Eventual::unknown(deps), diags);
    }

    let (options, d) = build_register_options(&resource.options, env, ctx).await;
    diags.extend(d);

    let mut inputs: Vec<(String, Value)> = input_refs
        .into_iter()
        .map(|(k, v)| (k, v.value.expect("known implies Some")))
        .collect();
    for (k, constant) in ctx.package.resource_constants(&canonical) {
        if !inputs.iter().any(|(name, _)| name == &k) {
            inputs.push((k, Value::from_json(&constant)));
        }
    }

    let mut explicit_deps = BTreeSet::new();
    for dep_expr in &resource.options.depends_on {
        let (v, d) = eval_expr(dep_expr, env, ctx).await;
        diags.extend(d);
        explicit_deps.extend(v.deps);
    }
    deps.extend(explicit_deps.iter().cloned());

    debug!(name = logical_name, type_token = %canonical, inputs = inputs.len(), "Registering resource");
    let response = ctx
        .orchestrator
        .register_resource(RegisterResourceRequest {
            type_token: canonical.clone(),
            name: logical_name.to_string(),
            custom: true,
            inputs,
            options,
            dependencies: deps.clone(),
        })
        .await;

    match response {
        Ok(resp) => {
            let secret =
                input_secret || is_secret_bag(ctx.package, &canonical, &resource.options.additional_secret_outputs, &resp.outputs);
            let id = resp.id.clone().unwrap_or_default();
            let bag = build_output_bag(resp.outputs, resp.id, &canonical, resource.exported_name(logical_name).as_str());
            info!(name = logical_name, type_token = %canonical, id = %id, "Resource registered");
            (Eventual { value: Some(bag), known: true, secret, poisoned: false, deps }, diags)
        }
        Err(e) => {
            diags.error(Some(resource.range.clone()), format!("registering resource `{}`: {}", logical_name, e), "");
            (Eventual::poison(), diags)
        }
    }
}

/// The "union-union" secret flag is the union of
/// `additionalSecretOutputs` and every package-schema-declared secret
/// property, applied at the granularity `Eventual` supports — one flag
/// for the whole output bag rather than per field.
fn is_secret_bag(package: &dyn Package, canonical_token: &str, additional_secret_outputs: &[String], outputs: &[(String, Value)]) -> bool {
    outputs.iter().any(|(name, _)| {
        additional_secret_outputs.iter().any(|n| n == name) || package.is_resource_property_secret(canonical_token, name)
    })
}

/// Appends synthetic `id`/`urn` entries to a resource's raw outputs if the
/// provider response didn't already supply them.
fn build_output_bag(outputs: Vec<(String, Value)>, id: Option<String>, canonical_token: &str, exported_name: &str) -> Value {
    let mut entries = outputs;
    if !entries.iter().any(|(k, _)| k == "id") {
        if let Some(id) = &id {
            entries.push(("id".to_string(), Value::String(id.clone())));
        }
    }
    if !entries.iter().any(|(k, _)| k == "urn") {
        let urn = format!("urn:pulumi:stack::project::{}::{}", canonical_token, exported_name);
        entries.push(("urn".to_string(), Value::String(urn)));
    }
    Value::Map(entries)
}

async fn build_register_options<'a>(
    options: &'a crate::ast::ResourceOptions,
    env: &'a HashMap<String, Eventual>,
    ctx: EvalCtx<'a>,
) -> (RegisterResourceOptions, Diagnostics) {
    let mut diags = Diagnostics::new();
    let mut out = RegisterResourceOptions {
        additional_secret_outputs: options.additional_secret_outputs.clone(),
        ignore_changes: options.ignore_changes.clone(),
        replace_on_changes: options.replace_on_changes.clone(),
        delete_before_replace: options.delete_before_replace,
        retain_on_delete: options.retain_on_delete,
        version: options.version.clone(),
        plugin_download_url: options.plugin_download_url.clone(),
        ..Default::default()
    };

    if let Some(protect) = &options.protect {
        let (v, d) = eval_expr(protect, env, ctx).await;
        diags.extend(d);
        if let Some(Value::Bool(b)) = v.value {
            out.protect = b;
        }
    }
    if let Some(parent) = &options.parent {
        let (v, d) = eval_expr(parent, env, ctx).await;
        diags.extend(d);
        out.parent = resolve_urn(&v);
    }
    if let Some(provider) = &options.provider {
        let (v, d) = eval_expr(provider, env, ctx).await;
        diags.extend(d);
        out.provider = resolve_urn(&v).or_else(|| v.value.as_ref().and_then(Value::as_str).map(str::to_string));
    }
    for (pkg, provider_expr) in &options.providers {
        let (v, d) = eval_expr(provider_expr, env, ctx).await;
        diags.extend(d);
        if let Some(resolved) = resolve_urn(&v).or_else(|| v.value.as_ref().and_then(Value::as_str).map(str::to_string)) {
            out.providers.push((pkg.clone(), resolved));
        }
    }
    for alias_expr in &options.aliases {
        let (v, d) = eval_expr(alias_expr, env, ctx).await;
        diags.extend(d);
        if let Some(s) = v.value.as_ref().and_then(Value::as_str) {
            out.aliases.push(s.to_string());
        }
    }
    if let Some(import) = &options.import {
        let (v, d) = eval_expr(import, env, ctx).await;
        diags.extend(d);
        out.import = v.value.as_ref().and_then(Value::as_str).map(str::to_string);
    }
    if let Some(deleted_with) = &options.deleted_with {
        let (v, d) = eval_expr(deleted_with, env, ctx).await;
        diags.extend(d);
        out.deleted_with = resolve_urn(&v);
    }
    if let Some(timeouts) = &options.custom_timeouts {
        out.custom_timeouts = HashMap::new();
        if let Some(c) = &timeouts.create {
            out.custom_timeouts.insert("create".to_string(), c.clone());
        }
        if let Some(u) = &timeouts.update {
            out.custom_timeouts.insert("update".to_string(), u.clone());
        }
        if let Some(d) = &timeouts.delete {
            out.custom_timeouts.insert("delete".to_string(), d.clone());
        }
    }

    (out, diags)
}

/// A parent/provider/deletedWith reference resolves to the referenced
/// resource's own `urn` field when its output bag has one, falling back
/// to the whole rendered value otherwise.
fn resolve_urn(v: &Eventual) -> Option<String> {
    match &v.value {
        Some(Value::Map(entries)) => entries
            .iter()
            .find(|(k, _)| k == "urn")
            .and_then(|(_, v)| v.as_str())
            .map(str::to_string),
        Some(Value::String(s)) => Some(s.clone()),
        _ => None,
    }
}

/// Resolves the package that owns `template`'s resource/function tokens
/// via `loader`, using the first resource's (or, failing that, the
/// template's declared SDK) token to determine which package to load —
/// mirroring how the checker's `SchemaLookup` is wired up by a caller
/// rather than by the checker itself.
pub async fn load_template_package(
    template: &Template,
    loader: &dyn PackageLoader,
) -> Result<Arc<dyn Package>, PackageError> {
    let package_name = template
        .resources
        .iter()
        .map(|(_, r)| package_name_of(&r.type_token).to_string())
        .next()
        .or_else(|| template.sdks.first().cloned())
        .unwrap_or_else(|| template.name.clone());
    loader.load(&package_name, None).await
}
