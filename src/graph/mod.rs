//! The dependency graph and runner (spec component E): discovers the
//! reference edges between config/variable/resource/output nodes and
//! produces a topological order — plus, as a supplement, a leveled grouping
//! an executor can use to dispatch a whole level concurrently.
//!
//! Built on `petgraph::graph::DiGraph` and `petgraph::algo::toposort`, the
//! same crate and cycle-detection idiom as the engine's
//! `dag::resource_graph::build_resource_dag`, generalized from resource-only
//! nodes to the four node kinds this spec names.

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use tracing::{debug, warn};

use crate::ast::{Resource, ResourceProperties, Template};
use crate::diagnostics::{Diagnostics, SourceRange};

/// The four participating node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NodeKind {
    Config,
    Variable,
    Resource,
    Output,
}

impl NodeKind {
    fn namespace(&self) -> &'static str {
        match self {
            NodeKind::Config => "config",
            NodeKind::Variable => "variable",
            NodeKind::Resource => "resource",
            NodeKind::Output => "output",
        }
    }
}

/// A single node: its kind and declared (logical) name — the key the graph
/// indexes nodes by and the name other expressions reference.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct NodeRef {
    pub kind: NodeKind,
    pub name: String,
}

impl std::fmt::Display for NodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind.namespace(), self.name)
    }
}

/// The dependency graph: nodes keyed by declared name, edges recording that
/// the target must be evaluated before the source (i.e. an edge `a -> b`
/// means `a` depends on `b`). With that edge direction,
/// `petgraph::algo::toposort` yields dependents before dependencies (`a`
/// before `b`) — the reverse of evaluation order — so `topological_order`
/// reverses the returned order to get dependencies-first, the relationship
/// described conceptually as "referent → dependency".
pub type Graph = DiGraph<NodeRef, ()>;

/// The result of building the graph: the graph itself, a lookup from
/// declared name to its node index (first occurrence wins on duplicates —
/// duplicates themselves are reported as diagnostics), and any diagnostics
/// raised while discovering edges.
pub struct BuiltGraph {
    pub graph: Graph,
    pub index_of: HashMap<String, NodeIndex>,
    pub diagnostics: Diagnostics,
}

/// Builds the dependency graph for `template`: one node per config entry,
/// variable, resource, and output, edges for every symbol reference plus
/// `dependsOn`/`parent` resource options.
///
/// Name collisions across namespaces, and duplicate keys within a single
/// namespace, are fatal — reported as diagnostics rather than as a
/// `Result` error so the caller can still inspect the partially-built graph.
pub fn build_graph(template: &Template) -> BuiltGraph {
    let mut diags = Diagnostics::new();
    let mut graph = Graph::new();
    let mut index_of: HashMap<String, NodeIndex> = HashMap::new();
    let mut owner: HashMap<String, NodeKind> = HashMap::new();
    let mut seen_in_namespace: HashMap<(NodeKind, String), usize> = HashMap::new();

    let mut add_node = |kind: NodeKind, name: &str, range: &SourceRange, diags: &mut Diagnostics| -> NodeIndex {
        let count = seen_in_namespace.entry((kind, name.to_string())).or_insert(0);
        *count += 1;
        if *count > 1 {
            diags.error(
                Some(range.clone()),
                format!("duplicate {} `{}`", kind.namespace(), name),
                "",
            );
        }
        if let Some(existing_kind) = owner.get(name) {
            if *existing_kind != kind && *count == 1 {
                diags.error(
                    Some(range.clone()),
                    format!("{} `{}` cannot have the same name as {} `{}`", kind.namespace(), name, existing_kind.namespace(), name),
                    "",
                );
            }
        } else {
            owner.insert(name.to_string(), kind);
        }

        if let Some(&idx) = index_of.get(name) {
            idx
        } else {
            let idx = graph.add_node(NodeRef { kind, name: name.to_string() });
            index_of.insert(name.to_string(), idx);
            idx
        }
    };

    for (name, param) in &template.config {
        add_node(NodeKind::Config, param.exported_name(), &param.range, &mut diags);
        let _ = name;
    }
    for (name, expr) in &template.variables {
        add_node(NodeKind::Variable, name, expr.range(), &mut diags);
    }
    for (name, resource) in &template.resources {
        let exported = resource.exported_name(name);
        add_node(NodeKind::Resource, &exported, &resource.range, &mut diags);
    }
    for (name, expr) in &template.outputs {
        add_node(NodeKind::Output, name, expr.range(), &mut diags);
    }

    // Second pass: edges. Re-resolve names since add_node above may have
    // inserted duplicates under the same key (last one wins for the index,
    // matching "the parser records every entry so duplicates are visible"
    // — the graph itself only needs one node per name to compute order).
    for (name, param) in &template.config {
        let exported = param.exported_name();
        if let (Some(&from), Some(default)) = (index_of.get(exported), param.default.as_ref()) {
            add_edges_for_expr(&mut graph, from, default, &index_of);
        }
        let _ = name;
    }
    for (name, expr) in &template.variables {
        if let Some(&from) = index_of.get(name.as_str()) {
            add_edges_for_expr(&mut graph, from, expr, &index_of);
        }
    }
    for (name, resource) in &template.resources {
        let exported = resource.exported_name(name);
        let Some(&from) = index_of.get(exported.as_str()) else { continue };
        add_edges_for_resource(&mut graph, from, resource, &index_of);
    }
    for (name, expr) in &template.outputs {
        if let Some(&from) = index_of.get(name.as_str()) {
            add_edges_for_expr(&mut graph, from, expr, &index_of);
        }
    }

    BuiltGraph { graph, index_of, diagnostics: diags }
}

fn add_edge_by_name(graph: &mut Graph, from: NodeIndex, root: &str, index_of: &HashMap<String, NodeIndex>) {
    if let Some(&to) = index_of.get(root) {
        if to != from {
            graph.update_edge(from, to, ());
        }
    }
    // Unresolved roots are left for the checker/evaluator to report as a
    // reference error; the graph itself only wires up what it can resolve.
}

fn add_edges_for_expr(graph: &mut Graph, from: NodeIndex, expr: &crate::ast::Expr, index_of: &HashMap<String, NodeIndex>) {
    let mut roots = Vec::new();
    expr.collect_root_refs(&mut roots);
    for root in roots {
        add_edge_by_name(graph, from, &root, index_of);
    }
}

fn add_edges_for_resource(graph: &mut Graph, from: NodeIndex, resource: &Resource, index_of: &HashMap<String, NodeIndex>) {
    match &resource.properties {
        ResourceProperties::Map(entries) => {
            for (_, expr) in entries {
                add_edges_for_expr(graph, from, expr, index_of);
            }
        }
        ResourceProperties::Expr(expr) => add_edges_for_expr(graph, from, expr, index_of),
    }
    if let Some(get) = &resource.get {
        add_edges_for_expr(graph, from, &get.id, index_of);
        for (_, expr) in &get.state {
            add_edges_for_expr(graph, from, expr, index_of);
        }
    }
    for dep in &resource.options.depends_on {
        add_edges_for_expr(graph, from, dep, index_of);
    }
    if let Some(parent) = &resource.options.parent {
        add_edges_for_expr(graph, from, parent, index_of);
    }
    if let Some(provider) = &resource.options.provider {
        add_edges_for_expr(graph, from, provider, index_of);
    }
    for (_, provider) in &resource.options.providers {
        add_edges_for_expr(graph, from, provider, index_of);
    }
}

/// A flat topological order, dependencies before dependents. On a cycle,
/// reports the participating node names in a single diagnostic and returns
/// `None` rather than a partial order.
pub fn topological_order(built: &BuiltGraph) -> Result<Vec<NodeIndex>, Diagnostics> {
    match petgraph::algo::toposort(&built.graph, None) {
        Ok(mut order) => {
            order.reverse();
            debug!(nodes = order.len(), "Dependency graph sorted into evaluation order");
            Ok(order)
        }
        Err(cycle) => {
            let mut diags = Diagnostics::new();
            let participants = find_cycle_participants(&built.graph, cycle.node_id());
            let names: Vec<String> = participants.iter().map(|n| built.graph[*n].to_string()).collect();
            warn!(cycle = %names.join(" -> "), "Circular dependency detected");
            diags.error(None, format!("circular dependency: {}", names.join(" -> ")), "");
            Err(diags)
        }
    }
}

/// Walks forward from a node known to be on a cycle (as reported by
/// `petgraph::algo::toposort`) to recover the cycle's members for the
/// diagnostic message.
fn find_cycle_participants(graph: &Graph, start: NodeIndex) -> Vec<NodeIndex> {
    let mut path = vec![start];
    let mut current = start;
    loop {
        let next = graph.edges(current).map(|e| e.target()).find(|_| true);
        match next {
            Some(n) if n == start => {
                path.push(n);
                break;
            }
            Some(n) if !path.contains(&n) => {
                path.push(n);
                current = n;
            }
            _ => break,
        }
    }
    path
}

/// Topological levels: level 0 has no dependencies; level N has all
/// dependencies in levels < N. Nodes within a level are sorted by name for
/// determinism. This is a supplement to `topological_order` for
/// callers that want to dispatch a whole level concurrently; a flat order
/// remains valid on its own.
pub fn topological_levels(built: &BuiltGraph) -> Result<Vec<Vec<NodeIndex>>, Diagnostics> {
    let order = topological_order(built)?;
    let mut level_of: HashMap<NodeIndex, usize> = HashMap::new();
    for &idx in &order {
        let level = built
            .graph
            .edges(idx)
            .map(|e| level_of.get(&e.target()).copied().unwrap_or(0) + 1)
            .max()
            .unwrap_or(0);
        level_of.insert(idx, level);
    }
    let max_level = level_of.values().copied().max().unwrap_or(0);
    let mut levels: Vec<Vec<NodeIndex>> = vec![Vec::new(); max_level + 1];
    for (idx, level) in &level_of {
        levels[*level].push(*idx);
    }
    for level in &mut levels {
        level.sort_by(|a, b| built.graph[*a].name.cmp(&built.graph[*b].name));
    }
    Ok(levels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::fold_template;
    use crate::syntax::parse_yaml;

    fn build(src: &str) -> BuiltGraph {
        let (doc, _) = parse_yaml(src, "Pulumi.yaml");
        let (t, _) = fold_template(&doc, "Pulumi.yaml");
        build_graph(&t)
    }

    #[test]
    fn dependency_ordered_before_dependent() {
        let built = build(
            r#"
name: test
resources:
  r:
    type: test:resource:t
    properties:
      foo: oof
outputs:
  o: ${r.bar}
"#,
        );
        assert!(!built.diagnostics.has_errors());
        let order = topological_order(&built).unwrap();
        let r_idx = built.index_of["r"];
        let o_idx = built.index_of["o"];
        let r_pos = order.iter().position(|&i| i == r_idx).unwrap();
        let o_pos = order.iter().position(|&i| i == o_idx).unwrap();
        assert!(r_pos < o_pos);
    }

    #[test]
    fn cycle_is_detected() {
        let built = build(
            r#"
name: test
variables:
  a: ${b}
  b: ${a}
"#,
        );
        assert!(topological_order(&built).is_err());
    }

    #[test]
    fn config_resource_name_collision_is_fatal() {
        let built = build(
            r#"
name: test
config:
  foo:
    type: string
resources:
  foo:
    type: test:resource:t
"#,
        );
        assert!(built.diagnostics.has_errors());
    }

    #[test]
    fn duplicate_resource_key_is_fatal() {
        // Folding a YAML mapping collapses literal duplicate keys, so this
        // exercises the same-name-via-`name:` override path instead.
        let built = build(
            r#"
name: test
resources:
  r1:
    type: test:resource:t
    name: shared
  r2:
    type: test:resource:t
    name: shared
"#,
        );
        assert!(built.diagnostics.has_errors());
    }

    #[test]
    fn levels_group_independent_nodes_together() {
        let built = build(
            r#"
name: test
resources:
  a:
    type: test:resource:t
  b:
    type: test:resource:t
  c:
    type: test:resource:t
    options:
      dependsOn:
        - ${a}
        - ${b}
"#,
        );
        let levels = topological_levels(&built).unwrap();
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0].len(), 2);
        assert_eq!(levels[1].len(), 1);
    }
}
