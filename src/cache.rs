// src/cache.rs

//! Per-project dependency checksum cache
//!
//! Collectors remember the checksums they resolved for a project so the next
//! run does not have to look every package up again. The cache is a single
//! JSON file in a directory chosen by the caller, stamped with a format version
//! and the time of the last update.
//!
//! A cache that is missing, older than its validity window, written by a
//! different format version, or unreadable is treated as empty. Cache problems
//! never fail a build.

use crate::checksum::Checksum;
use crate::entities::Dependency;
use crate::error::Result;
use crate::persist::write_atomic;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Bumped whenever the on-disk layout changes
pub const CACHE_VERSION: u32 = 1;

/// Name of the cache file inside the cache directory
pub const CACHE_FILE: &str = "deps.cache.json";

/// Directory created inside a project for its cache
pub const PROJECT_CACHE_DIR: &str = ".buildinfo";

/// How long a cache stays valid by default
pub fn default_validity() -> Duration {
    Duration::hours(24)
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    updated: DateTime<Utc>,
    dependencies: BTreeMap<String, Dependency>,
}

/// Dependency checksum cache bound to one directory
#[derive(Debug)]
pub struct DependencyCache {
    path: PathBuf,
    validity: Duration,
    entries: BTreeMap<String, Dependency>,
}

impl DependencyCache {
    /// Create an empty cache stored in `dir`
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(CACHE_FILE),
            validity: default_validity(),
            entries: BTreeMap::new(),
        }
    }

    /// Cache for a project working directory
    pub fn for_project(project_dir: &Path) -> Self {
        Self::load(&project_dir.join(PROJECT_CACHE_DIR), default_validity())
    }

    /// Load the cache in `dir`, falling back to an empty cache
    pub fn load(dir: &Path, validity: Duration) -> Self {
        Self::load_at(dir, validity, Utc::now())
    }

    /// Load the cache as seen at time `now`
    pub fn load_at(dir: &Path, validity: Duration, now: DateTime<Utc>) -> Self {
        let mut cache = Self::new(dir);
        cache.validity = validity;

        let content = match std::fs::read_to_string(&cache.path) {
            Ok(content) => content,
            Err(e) => {
                debug!("No dependency cache at {}: {}", cache.path.display(), e);
                return cache;
            }
        };

        let file: CacheFile = match serde_json::from_str(&content) {
            Ok(file) => file,
            Err(e) => {
                warn!("Ignoring corrupt dependency cache {}: {}", cache.path.display(), e);
                return cache;
            }
        };

        if file.version != CACHE_VERSION {
            info!(
                "Ignoring dependency cache {} (version {}, expected {})",
                cache.path.display(),
                file.version,
                CACHE_VERSION
            );
            return cache;
        }

        if now - file.updated > validity {
            info!("Dependency cache {} expired", cache.path.display());
            return cache;
        }

        debug!("Loaded {} cached dependencies", file.dependencies.len());
        cache.entries = file.dependencies;
        cache
    }

    /// Location of the cache file
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Dependency> {
        self.entries.get(id)
    }

    /// Cached checksum for a dependency id, if one is known
    pub fn checksum(&self, id: &str) -> Option<&Checksum> {
        self.entries
            .get(id)
            .map(|d| &d.checksum)
            .filter(|c| !c.is_empty())
    }

    /// Remember dependencies that carry a checksum
    pub fn update(&mut self, dependencies: &[Dependency]) {
        for dep in dependencies.iter().filter(|d| !d.checksum.is_empty()) {
            self.entries.insert(dep.id.clone(), dep.clone());
        }
    }

    /// Write the cache, stamping it with the current time
    pub fn save(&self) -> Result<()> {
        let file = CacheFile {
            version: CACHE_VERSION,
            updated: Utc::now(),
            dependencies: self.entries.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        write_atomic(&self.path, json.as_bytes())
    }
}
