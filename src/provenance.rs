// src/provenance.rs

//! Requested-by provenance for dependency graphs
//!
//! Collectors hand over a raw adjacency mapping (parent id to child ids) taken
//! from whatever their package manager reports: a dependency tree, a JSON
//! graph, a lock file. This module turns it into requested-by chains: for
//! every dependency, each path by which it entered the build, from the
//! immediate parent up to the module id.
//!
//! Cycle policy: a chain never contains the dependency's own id. An edge that
//! would close a cycle is dropped, even when the ecosystem graph legitimately
//! contains one (optional or peer dependencies).

use crate::entities::{Dependency, Manifest};
use crate::error::Result;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

/// Cap on requested-by chains per dependency in exported manifests
pub const MAX_REQUESTED_BY: usize = 15;

/// Hard recursion limit when following cached sub-manifests
pub const MAX_NESTED_DEPTH: usize = 10;

/// Adjacency mapping between dependency ids
pub type Graph = BTreeMap<String, Vec<String>>;

/// Invert parent→children into child→parents, parents deduplicated
pub fn invert(graph: &Graph) -> Graph {
    let mut reverse = Graph::new();
    for (parent, children) in graph {
        for child in children {
            let parents = reverse.entry(child.clone()).or_default();
            if !parents.contains(parent) {
                parents.push(parent.clone());
            }
        }
    }
    reverse
}

/// All chains from `id` up to `root` in an inverted graph
///
/// A dependency not reachable from the root gets no chains.
pub fn chains_to_root(reverse: &Graph, root: &str, id: &str) -> Vec<Vec<String>> {
    let mut chains = Vec::new();
    if id != root {
        walk_up(reverse, root, vec![id.to_string()], &mut chains);
    }
    chains
}

/// `path` runs from the dependency itself (first) to the current node (last)
fn walk_up(reverse: &Graph, root: &str, path: Vec<String>, chains: &mut Vec<Vec<String>>) {
    let Some(node) = path.last() else {
        return;
    };
    if node == root {
        let chain = path[1..].to_vec();
        if !chains.contains(&chain) {
            chains.push(chain);
        }
        return;
    }
    let Some(parents) = reverse.get(node) else {
        return;
    };
    for parent in parents {
        if path.contains(parent) {
            debug!("Dropping cyclic edge {} -> {}", parent, node);
            continue;
        }
        let mut next = path.clone();
        next.push(parent.clone());
        walk_up(reverse, root, next, chains);
    }
}

/// Attach requested-by chains to `deps` from a parent→children graph rooted at
/// the module id `root`
pub fn attach_requested_by(root: &str, graph: &Graph, deps: &mut [Dependency]) {
    let reverse = invert(graph);
    for dep in deps.iter_mut() {
        for chain in chains_to_root(&reverse, root, &dep.id) {
            if !dep.requested_by.contains(&chain) {
                dep.requested_by.push(chain);
            }
        }
        if dep.requested_by.is_empty() && dep.id != root {
            warn!("Dependency {} is not reachable from {}", dep.id, root);
        }
    }
}

/// Recompute a child's chains after its parent's chains changed.
///
/// Chains that start with `parent_id` are stale and dropped; every current
/// parent chain, prefixed with `parent_id`, replaces them. A parent without
/// chains is the module itself and contributes `[parent_id]`.
pub fn propagate(child: &mut Dependency, parent_id: &str, parent_chains: &[Vec<String>]) {
    let mut updated: Vec<Vec<String>> = child
        .requested_by
        .iter()
        .filter(|chain| chain.first().map(String::as_str) != Some(parent_id))
        .cloned()
        .collect();

    let root_chain = [Vec::new()];
    let parent_chains = if parent_chains.is_empty() {
        &root_chain[..]
    } else {
        parent_chains
    };

    for parent_chain in parent_chains {
        let mut chain = Vec::with_capacity(parent_chain.len() + 1);
        chain.push(parent_id.to_string());
        chain.extend(parent_chain.iter().cloned());
        if chain.contains(&child.id) {
            continue;
        }
        if !updated.contains(&chain) {
            updated.push(chain);
        }
    }

    child.requested_by = updated;
}

/// Re-thread chains below `changed_id` after its own chains changed
///
/// Walks the graph downwards from `changed_id`, propagating each parent's
/// chains into its children.
pub fn refresh_requested_by(graph: &Graph, deps: &mut [Dependency], changed_id: &str) {
    let index: HashMap<String, usize> = deps
        .iter()
        .enumerate()
        .map(|(i, d)| (d.id.clone(), i))
        .collect();

    let mut queue = vec![changed_id.to_string()];
    let mut refreshed = HashSet::new();

    while let Some(parent_id) = queue.pop() {
        if !refreshed.insert(parent_id.clone()) {
            continue;
        }
        let parent_chains = index
            .get(&parent_id)
            .map(|&i| deps[i].requested_by.clone())
            .unwrap_or_default();

        for child_id in graph.get(&parent_id).into_iter().flatten() {
            if let Some(&i) = index.get(child_id) {
                propagate(&mut deps[i], &parent_id, &parent_chains);
                queue.push(child_id.clone());
            }
        }
    }
}

/// Source of dependencies for cached sub-manifests
///
/// Implemented by collectors that resolve transitive dependencies from a local
/// package cache, e.g. chart dependencies of chart dependencies.
pub trait NestedSource {
    /// Direct dependencies of `id`, or `None` when nothing is cached for it
    fn dependencies(&self, id: &str) -> Result<Option<Vec<Dependency>>>;
}

impl NestedSource for Graph {
    fn dependencies(&self, id: &str) -> Result<Option<Vec<Dependency>>> {
        Ok(self
            .get(id)
            .map(|children| children.iter().map(Dependency::new).collect()))
    }
}

/// Discover every dependency reachable from `root`, with requested-by chains
///
/// Recursion stops at `max_depth` levels below the root regardless of the
/// cycle check.
pub fn collect_nested(
    root: &str,
    source: &dyn NestedSource,
    max_depth: usize,
) -> Result<Vec<Dependency>> {
    let mut collected = Vec::new();
    let mut seen = HashMap::new();
    walk_down(source, root, Vec::new(), 0, max_depth, &mut seen, &mut collected)?;
    Ok(collected)
}

/// Attach chains to `deps` by walking `graph` top-down from `root`
pub fn populate_requested_by(root: &str, graph: &Graph, deps: &mut [Dependency]) -> Result<()> {
    let collected = collect_nested(root, graph, usize::MAX)?;
    let chains: HashMap<&str, &Vec<Vec<String>>> = collected
        .iter()
        .map(|d| (d.id.as_str(), &d.requested_by))
        .collect();

    for dep in deps.iter_mut() {
        if let Some(found) = chains.get(dep.id.as_str()) {
            for chain in found.iter() {
                if !dep.requested_by.contains(chain) {
                    dep.requested_by.push(chain.clone());
                }
            }
        }
    }
    Ok(())
}

/// `visited` is this node's own chain (parent up to root), owned per call so
/// sibling branches never see each other's paths. `seen` is shared across the
/// whole walk and indexes the collected records for dedup.
fn walk_down(
    source: &dyn NestedSource,
    node: &str,
    visited: Vec<String>,
    depth: usize,
    max_depth: usize,
    seen: &mut HashMap<String, usize>,
    collected: &mut Vec<Dependency>,
) -> Result<()> {
    if depth >= max_depth {
        debug!("Depth limit {} reached below {}", max_depth, node);
        return Ok(());
    }
    let Some(children) = source.dependencies(node)? else {
        return Ok(());
    };

    let mut chain = Vec::with_capacity(visited.len() + 1);
    chain.push(node.to_string());
    chain.extend(visited);

    for mut child in children {
        if chain.contains(&child.id) {
            debug!("Dropping cyclic edge {} -> {}", node, child.id);
            continue;
        }

        match seen.get(&child.id) {
            Some(&i) => {
                if !collected[i].requested_by.contains(&chain) {
                    collected[i].requested_by.push(chain.clone());
                }
            }
            None => {
                child.requested_by = vec![chain.clone()];
                seen.insert(child.id.clone(), collected.len());
                collected.push(child.clone());
            }
        }

        walk_down(source, &child.id, chain.clone(), depth + 1, max_depth, seen, collected)?;
    }
    Ok(())
}

/// Cut every dependency's chains down to [`MAX_REQUESTED_BY`]
pub fn truncate_requested_by(manifest: &mut Manifest) {
    for module in &mut manifest.modules {
        for dep in &mut module.dependencies {
            if dep.requested_by.len() > MAX_REQUESTED_BY {
                debug!(
                    "Truncating requested-by of {} from {} chains",
                    dep.id,
                    dep.requested_by.len()
                );
                dep.requested_by.truncate(MAX_REQUESTED_BY);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Module, ModuleType};

    fn graph(edges: &[(&str, &[&str])]) -> Graph {
        edges
            .iter()
            .map(|(p, c)| (p.to_string(), c.iter().map(|s| s.to_string()).collect()))
            .collect()
    }

    fn chain(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_invert_dedupes_parents() {
        let g = graph(&[("root", &["a", "b"]), ("a", &["c", "c"]), ("b", &["c"])]);
        let reverse = invert(&g);
        assert_eq!(reverse["c"], vec!["a", "b"]);
        assert_eq!(reverse["a"], vec!["root"]);
    }

    #[test]
    fn test_diamond_fan_in() {
        let g = graph(&[("root", &["a", "b"]), ("a", &["c"]), ("b", &["c"])]);
        let mut deps = vec![Dependency::new("a"), Dependency::new("b"), Dependency::new("c")];
        attach_requested_by("root", &g, &mut deps);

        assert_eq!(deps[0].requested_by, vec![chain(&["root"])]);
        assert_eq!(deps[2].requested_by, vec![chain(&["a", "root"]), chain(&["b", "root"])]);
    }

    #[test]
    fn test_cycle_terminates_without_self_reference() {
        let g = graph(&[("root", &["a"]), ("a", &["b"]), ("b", &["a", "c"]), ("c", &["b"])]);
        let mut deps = vec![Dependency::new("a"), Dependency::new("b"), Dependency::new("c")];
        attach_requested_by("root", &g, &mut deps);

        for dep in &deps {
            assert!(!dep.requested_by.is_empty());
            for c in &dep.requested_by {
                assert!(!c.contains(&dep.id), "{} found in its own chain {:?}", dep.id, c);
            }
        }
        assert_eq!(deps[2].requested_by, vec![chain(&["b", "a", "root"])]);
    }

    #[test]
    fn test_populate_top_down_matches_inverted() {
        let g = graph(&[("root", &["a", "b"]), ("a", &["c"]), ("b", &["c"]), ("c", &["a"])]);
        let mut top_down = vec![Dependency::new("a"), Dependency::new("b"), Dependency::new("c")];
        let mut bottom_up = top_down.clone();

        populate_requested_by("root", &g, &mut top_down).unwrap();
        attach_requested_by("root", &g, &mut bottom_up);

        for (t, b) in top_down.iter().zip(&bottom_up) {
            let mut t_chains = t.requested_by.clone();
            let mut b_chains = b.requested_by.clone();
            t_chains.sort();
            b_chains.sort();
            assert_eq!(t_chains, b_chains, "chains differ for {}", t.id);
        }
    }

    #[test]
    fn test_propagate_replaces_stale_chains() {
        let mut child = Dependency::new("c")
            .with_requested_by(chain(&["p", "old", "root"]))
            .with_requested_by(chain(&["q", "root"]));
        let parent_chains = vec![chain(&["x", "root"]), chain(&["y", "root"])];

        propagate(&mut child, "p", &parent_chains);

        assert_eq!(
            child.requested_by,
            vec![chain(&["q", "root"]), chain(&["p", "x", "root"]), chain(&["p", "y", "root"])]
        );
    }

    #[test]
    fn test_propagate_from_root() {
        let mut child = Dependency::new("c");
        propagate(&mut child, "root", &[]);
        assert_eq!(child.requested_by, vec![chain(&["root"])]);
    }

    #[test]
    fn test_propagate_skips_self_reference() {
        let mut child = Dependency::new("c");
        propagate(&mut child, "p", &[chain(&["c", "root"])]);
        assert!(child.requested_by.is_empty());
    }

    #[test]
    fn test_refresh_requested_by() {
        let g = graph(&[("a", &["b"]), ("b", &["c"])]);
        let mut deps = vec![
            Dependency::new("a").with_requested_by(chain(&["new", "root"])),
            Dependency::new("b").with_requested_by(chain(&["a", "root"])),
            Dependency::new("c").with_requested_by(chain(&["b", "a", "root"])),
        ];

        refresh_requested_by(&g, &mut deps, "a");

        assert_eq!(deps[1].requested_by, vec![chain(&["a", "new", "root"])]);
        assert_eq!(deps[2].requested_by, vec![chain(&["b", "a", "new", "root"])]);
    }

    #[test]
    fn test_collect_nested_depth_cap() {
        // A chain of 20 charts: chart0 -> chart1 -> ... -> chart19
        let mut g = Graph::new();
        for i in 0..19 {
            g.insert(format!("chart{}", i), vec![format!("chart{}", i + 1)]);
        }

        let collected = collect_nested("chart0", &g, MAX_NESTED_DEPTH).unwrap();
        assert_eq!(collected.len(), MAX_NESTED_DEPTH);
        assert_eq!(collected[0].requested_by, vec![chain(&["chart0"])]);
    }

    #[test]
    fn test_collect_nested_dedupes_seen() {
        let g = graph(&[("root", &["a", "b"]), ("a", &["shared"]), ("b", &["shared"])]);
        let collected = collect_nested("root", &g, MAX_NESTED_DEPTH).unwrap();

        assert_eq!(collected.len(), 3);
        let shared = collected.iter().find(|d| d.id == "shared").unwrap();
        assert_eq!(shared.requested_by.len(), 2);
    }

    #[test]
    fn test_truncate_only_on_export() {
        let mut dep = Dependency::new("d");
        for i in 0..20 {
            dep = dep.with_requested_by(chain(&[&format!("p{}", i), "root"]));
        }
        let mut manifest = Manifest::default();
        manifest
            .modules
            .push(Module::new("root", ModuleType::Npm).with_dependencies(vec![dep]));

        let exported = manifest.for_export();
        assert_eq!(exported.modules[0].dependencies[0].requested_by.len(), MAX_REQUESTED_BY);
        assert_eq!(manifest.modules[0].dependencies[0].requested_by.len(), 20);
    }
}
