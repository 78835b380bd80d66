// src/collect.rs

//! Boundary between ecosystem collectors and the core
//!
//! A collector (npm, Maven, Go, pip, ...) shells out to its package manager
//! and reports what it found as a [`CollectorOutput`]: the module id, the
//! dependency records and, when the tool exposes one, the raw dependency
//! graph. The core turns that into a [`Module`] with requested-by chains.
//!
//! [`run_callbacks`] lets a caller inspect every resolved dependency, on a
//! bounded worker pool, to drop it or fill in its checksum.

use crate::cache::DependencyCache;
use crate::entities::{Artifact, Dependency, Module, ModuleType};
use crate::error::{Error, Result};
use crate::merge::{merge_artifacts, merge_dependencies};
use crate::provenance::{Graph, attach_requested_by};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// What a collector reports for one project
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectorOutput {
    pub module_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_type: Option<ModuleType>,

    #[serde(default)]
    pub dependencies: Vec<Dependency>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,

    /// Parent id to child ids, rooted at `module_id`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph: Option<Graph>,
}

impl CollectorOutput {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read collector output from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Reject output the provenance engine cannot make sense of
    pub fn validate(&self) -> Result<()> {
        if self.module_id.is_empty() {
            return Err(Error::Graph("collector output has no moduleId".to_string()));
        }
        if let Some(dep) = self.dependencies.iter().find(|d| d.id.is_empty()) {
            return Err(Error::Graph(format!(
                "dependency without an id: {}",
                serde_json::to_string(dep)?
            )));
        }

        if let Some(ref graph) = self.graph {
            let known = |id: &str| id == self.module_id || self.dependencies.iter().any(|d| d.id == id);
            for (parent, children) in graph {
                if !known(parent) {
                    return Err(Error::Graph(format!(
                        "graph node '{}' is neither the module nor a reported dependency",
                        parent
                    )));
                }
                if let Some(child) = children.iter().find(|c| !known(c)) {
                    return Err(Error::Graph(format!(
                        "graph edge '{}' -> '{}' points to an unreported dependency",
                        parent, child
                    )));
                }
            }
        }
        Ok(())
    }

    /// Build the module this output describes
    ///
    /// `default_type` applies when the collector did not name a module type.
    /// Duplicate records reported by the collector are merged.
    pub fn into_module(self, default_type: ModuleType) -> Result<Module> {
        self.validate()?;

        let mut dependencies = self.dependencies;
        if let Some(ref graph) = self.graph {
            attach_requested_by(&self.module_id, graph, &mut dependencies);
        }

        let mut module = Module::new(self.module_id, self.module_type.unwrap_or(default_type));
        merge_dependencies(&dependencies, &mut module.dependencies);
        merge_artifacts(&self.artifacts, &mut module.artifacts);

        debug!(
            "Collected module {} with {} dependencies and {} artifacts",
            module.id,
            module.dependencies.len(),
            module.artifacts.len()
        );
        Ok(module)
    }
}

/// Run `callback` once per dependency and keep those it accepts
///
/// The callback may fill in missing checksums. With more than one thread the
/// calls run in parallel; the first error reported wins and the rest are
/// discarded. Work the callback already did (e.g. cache updates) is not
/// undone, so an error means the returned set would have been incomplete.
pub fn run_callbacks<F>(deps: Vec<Dependency>, threads: usize, callback: F) -> Result<Vec<Dependency>>
where
    F: Fn(&mut Dependency) -> Result<bool> + Send + Sync,
{
    let kept = if threads <= 1 {
        let mut kept = Vec::with_capacity(deps.len());
        for mut dep in deps {
            if callback(&mut dep)? {
                kept.push(dep);
            }
        }
        kept
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| Error::ThreadPool(e.to_string()))?;

        let first_error: Mutex<Option<Error>> = Mutex::new(None);
        let kept: Vec<Dependency> = pool.install(|| {
            deps.into_par_iter()
                .filter_map(|mut dep| match callback(&mut dep) {
                    Ok(true) => Some(dep),
                    Ok(false) => None,
                    Err(e) => {
                        let mut slot = first_error.lock().unwrap_or_else(|p| p.into_inner());
                        if slot.is_none() {
                            *slot = Some(e);
                        } else {
                            debug!("Discarding callback error for {}: {}", dep.id, e);
                        }
                        None
                    }
                })
                .collect()
        });

        let first_error = first_error.into_inner().unwrap_or_else(|p| p.into_inner());
        if let Some(e) = first_error {
            return Err(e);
        }
        kept
    };

    for dep in kept.iter().filter(|d| d.checksum.is_empty()) {
        warn!("No checksum found for dependency {}", dep.id);
    }
    Ok(kept)
}

/// Fill missing checksums from `cache`, then remember what is now known
pub fn enrich_from_cache(
    deps: Vec<Dependency>,
    cache: &mut DependencyCache,
    threads: usize,
) -> Result<Vec<Dependency>> {
    let before = deps.iter().filter(|d| d.checksum.is_empty()).count();

    let enriched = {
        let cache = &*cache;
        run_callbacks(deps, threads, |dep| {
            if dep.checksum.is_empty() {
                if let Some(checksum) = cache.checksum(&dep.id) {
                    dep.checksum = checksum.clone();
                }
            }
            Ok(true)
        })?
    };

    let after = enriched.iter().filter(|d| d.checksum.is_empty()).count();
    info!("Filled {} checksums from the dependency cache", before - after);

    cache.update(&enriched);
    Ok(enriched)
}
