// src/merge.rs

//! Merge engine for build manifests
//!
//! Successive build phases (e.g. `install` then `deploy`) each produce a
//! partial module. Merging folds them into one manifest:
//!
//! - Modules are matched by exact id
//! - Artifacts are matched by checksum, then by the "same logical artifact"
//!   rule (a rebuilt file supersedes the older record)
//! - Dependencies are matched by id *and* checksum; matched records union
//!   their scopes and requested-by chains
//!
//! Merging is total and idempotent: merging a manifest into a copy of itself
//! changes nothing.

use crate::entities::{AffectedIssue, Artifact, Dependency, Issues, Manifest, Module, Vcs};
use tracing::debug;

/// Merge `source` modules into `target`
pub fn merge_modules(source: &[Module], target: &mut Vec<Module>) {
    for incoming in source {
        match target.iter_mut().find(|m| m.id == incoming.id) {
            Some(existing) => merge_module(incoming, existing),
            None => {
                debug!("Adding module {} ({})", incoming.id, incoming.module_type);
                target.push(incoming.clone());
            }
        }
    }
}

/// Merge one module's content into an existing module with the same id
fn merge_module(source: &Module, target: &mut Module) {
    merge_artifacts(&source.artifacts, &mut target.artifacts);
    merge_artifacts(&source.excluded_artifacts, &mut target.excluded_artifacts);
    merge_dependencies(&source.dependencies, &mut target.dependencies);

    if target.properties.is_absent() {
        target.properties = source.properties.clone();
    }
    if target.checksum.is_empty() {
        target.checksum = source.checksum.clone();
    }
    if target.parent.is_none() {
        target.parent = source.parent.clone();
    }
}

/// Merge `source` artifacts into `target`
///
/// For each incoming artifact, in priority order:
/// 1. an existing artifact with the same non-empty checksum wins, the incoming
///    one is dropped
/// 2. an existing artifact that is the same logical artifact is replaced by the
///    incoming one
/// 3. otherwise the incoming artifact is appended
pub fn merge_artifacts(source: &[Artifact], target: &mut Vec<Artifact>) {
    for incoming in source {
        if target.iter().any(|a| a == incoming) {
            continue;
        }

        if !incoming.checksum.is_empty()
            && target.iter().any(|a| a.checksum == incoming.checksum)
        {
            debug!("Artifact {} already present with identical checksum", incoming.name);
            continue;
        }

        // Prefer a same-directory match over a repository match
        let replace_at = target
            .iter()
            .position(|a| a.name == incoming.name && a.directory() == incoming.directory())
            .or_else(|| target.iter().position(|a| a.same_logical(incoming)));

        match replace_at {
            Some(index) => {
                debug!("Replacing rebuilt artifact {} at {}", incoming.name, incoming.path);
                target[index] = incoming.clone();
            }
            None => target.push(incoming.clone()),
        }
    }
}

/// Merge `source` dependencies into `target`
///
/// Records with equal id and checksum are combined; anything else is a
/// distinct dependency and is appended.
pub fn merge_dependencies(source: &[Dependency], target: &mut Vec<Dependency>) {
    for incoming in source {
        match target.iter_mut().find(|d| d.same_identity(incoming)) {
            Some(existing) => {
                merge_scopes(&incoming.scopes, &mut existing.scopes);
                merge_requested_by(&incoming.requested_by, &mut existing.requested_by);
                if existing.dep_type.is_empty() {
                    existing.dep_type = incoming.dep_type.clone();
                }
            }
            None => target.push(incoming.clone()),
        }
    }
}

/// Set union preserving first-seen order
pub fn merge_scopes(source: &[String], target: &mut Vec<String>) {
    for scope in source {
        if !target.contains(scope) {
            target.push(scope.clone());
        }
    }
}

/// List union of chains; chains are equal only when equal element by element
pub fn merge_requested_by(source: &[Vec<String>], target: &mut Vec<Vec<String>>) {
    for chain in source {
        if !target.contains(chain) {
            target.push(chain.clone());
        }
    }
}

fn merge_vcs(source: &[Vcs], target: &mut Vec<Vcs>) {
    for incoming in source {
        let exists = target.iter().any(|v| {
            v.url == incoming.url && v.revision == incoming.revision && v.branch == incoming.branch
        });
        if !exists {
            target.push(incoming.clone());
        }
    }
}

fn merge_issues(source: &Issues, target: &mut Issues) {
    if target.tracker.is_none() {
        target.tracker = source.tracker.clone();
    }
    target.aggregate_build_issues |= source.aggregate_build_issues;
    if target.aggregation_build_status.is_empty() {
        target.aggregation_build_status = source.aggregation_build_status.clone();
    }
    for issue in &source.affected_issues {
        if !target.affected_issues.iter().any(|i: &AffectedIssue| i.key == issue.key) {
            target.affected_issues.push(issue.clone());
        }
    }
}

fn fill_if_empty(target: &mut String, source: &str) {
    if target.is_empty() {
        target.push_str(source);
    }
}

impl Manifest {
    /// Merge another manifest into this one
    ///
    /// Modules, VCS entries and affected issues are unioned. Environment
    /// properties already present keep their value. Scalar metadata is only
    /// filled in where this manifest has none.
    pub fn append(&mut self, other: &Manifest) {
        merge_modules(&other.modules, &mut self.modules);
        merge_vcs(&other.vcs_list, &mut self.vcs_list);

        if let Some(ref issues) = other.issues {
            merge_issues(issues, self.issues.get_or_insert_with(Issues::default));
        }

        for (key, value) in &other.properties {
            self.properties
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }

        fill_if_empty(&mut self.name, &other.name);
        fill_if_empty(&mut self.number, &other.number);
        fill_if_empty(&mut self.started, &other.started);
        fill_if_empty(&mut self.principal, &other.principal);
        fill_if_empty(&mut self.build_url, &other.build_url);
        fill_if_empty(&mut self.plugin_version, &other.plugin_version);
        if self.agent.is_none() {
            self.agent = other.agent.clone();
        }
        if self.build_agent.is_none() {
            self.build_agent = other.build_agent.clone();
        }
    }

    /// Merge one build phase's module into this manifest
    pub fn add_module(&mut self, module: Module) {
        merge_modules(std::slice::from_ref(&module), &mut self.modules);
    }
}
