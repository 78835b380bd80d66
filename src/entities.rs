// src/entities.rs

//! Build manifest data model
//!
//! A [`Manifest`] describes one build run. It holds [`Module`]s, one per
//! ecosystem project that took part in the build, and each module lists the
//! [`Artifact`]s it produced and the [`Dependency`] records it consumed.
//!
//! The serialized form is the build-info JSON document consumed by artifact
//! registries: camelCase field names, every empty field omitted, checksum
//! digests flattened into the owning record.

use crate::checksum::Checksum;
use crate::error::{Error, Result};
use crate::persist::write_atomic;
use chrono::{DateTime, Local, TimeZone};
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Name reported in the `agent` field of every manifest this crate creates
pub const AGENT_NAME: &str = "buildinfo";

/// Build agent reported when no ecosystem tool identified itself
pub const DEFAULT_BUILD_AGENT: &str = "GENERIC";

/// `strftime` layout of the `started` field, e.g. `2024-01-01T00:00:00.000+0000`
pub const STARTED_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

/// Ecosystem tag of a module
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleType {
    #[default]
    Generic,
    Maven,
    Gradle,
    Docker,
    Npm,
    Nuget,
    Go,
    Python,
    Terraform,
    Cargo,
    Conan,
    Helm,
    /// Aggregate of other manifests
    Build,
}

impl ModuleType {
    /// Get the wire name of this module type
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::Maven => "maven",
            Self::Gradle => "gradle",
            Self::Docker => "docker",
            Self::Npm => "npm",
            Self::Nuget => "nuget",
            Self::Go => "go",
            Self::Python => "python",
            Self::Terraform => "terraform",
            Self::Cargo => "cargo",
            Self::Conan => "conan",
            Self::Helm => "helm",
            Self::Build => "build",
        }
    }
}

impl fmt::Display for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.to_lowercase().as_str() {
            "generic" => Self::Generic,
            "maven" => Self::Maven,
            "gradle" => Self::Gradle,
            "docker" => Self::Docker,
            "npm" => Self::Npm,
            "nuget" => Self::Nuget,
            "go" => Self::Go,
            "python" => Self::Python,
            "terraform" => Self::Terraform,
            "cargo" => Self::Cargo,
            "conan" => Self::Conan,
            "helm" => Self::Helm,
            "build" => Self::Build,
            _ => return Err(Error::UnknownModuleType(s.to_string())),
        })
    }
}

/// Free-form module metadata
///
/// Collectors attach either a flat string map (e.g. docker image properties)
/// or an arbitrary JSON object. Both round-trip unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ModuleProperties {
    #[default]
    Absent,
    Map(BTreeMap<String, String>),
    Record(serde_json::Map<String, serde_json::Value>),
}

impl ModuleProperties {
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

impl Serialize for ModuleProperties {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Absent => serializer.serialize_none(),
            Self::Map(map) => map.serialize(serializer),
            Self::Record(record) => record.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ModuleProperties {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        use serde_json::Value;

        match Value::deserialize(deserializer)? {
            Value::Null => Ok(Self::Absent),
            Value::Object(record) => {
                if record.values().all(Value::is_string) {
                    let map = record
                        .into_iter()
                        .filter_map(|(k, v)| match v {
                            Value::String(s) => Some((k, s)),
                            _ => None,
                        })
                        .collect();
                    Ok(Self::Map(map))
                } else {
                    Ok(Self::Record(record))
                }
            }
            other => Err(serde::de::Error::custom(format!(
                "module properties must be an object, got {}",
                other
            ))),
        }
    }
}

/// A consumed package
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    /// Ecosystem identity, usually `name:version` or `group:name:version`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    /// Ecosystem tag such as `npm`, `jar` or `conan`
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub dep_type: String,

    /// Why the dependency applies; ordered, no duplicates
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,

    /// Chains from the immediate parent up to the module id
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requested_by: Vec<Vec<String>>,

    #[serde(flatten)]
    pub checksum: Checksum,
}

impl Dependency {
    /// Create a dependency with only an id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_type(mut self, dep_type: impl Into<String>) -> Self {
        self.dep_type = dep_type.into();
        self
    }

    /// Add a scope, ignoring duplicates
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        let scope = scope.into();
        if !self.scopes.contains(&scope) {
            self.scopes.push(scope);
        }
        self
    }

    pub fn with_checksum(mut self, checksum: Checksum) -> Self {
        self.checksum = checksum;
        self
    }

    /// Add a requested-by chain, ignoring duplicates
    pub fn with_requested_by(mut self, chain: Vec<String>) -> Self {
        if !self.requested_by.contains(&chain) {
            self.requested_by.push(chain);
        }
        self
    }

    /// Merge identity: id and checksum must both be equal
    pub fn same_identity(&self, other: &Dependency) -> bool {
        self.id == other.id && self.checksum == other.checksum
    }
}

/// A produced file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub artifact_type: String,

    /// Repository-relative location, `/`-separated
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,

    /// Repository the artifact was deployed to (informational)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub original_deployment_repo: String,

    #[serde(flatten)]
    pub checksum: Checksum,
}

impl Artifact {
    /// Create an artifact with a name and repository path
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    /// Describe a file on disk, computing its checksum.
    ///
    /// The artifact type is the file extension; `repo_path` is where the file
    /// lives (or will live) in the repository.
    pub fn from_file(file: &Path, repo_path: impl Into<String>) -> Result<Self> {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let artifact_type = file
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            name,
            artifact_type,
            path: repo_path.into(),
            original_deployment_repo: String::new(),
            checksum: Checksum::from_file(file)?,
        })
    }

    pub fn with_type(mut self, artifact_type: impl Into<String>) -> Self {
        self.artifact_type = artifact_type.into();
        self
    }

    pub fn with_repo(mut self, repo: impl Into<String>) -> Self {
        self.original_deployment_repo = repo.into();
        self
    }

    pub fn with_checksum(mut self, checksum: Checksum) -> Self {
        self.checksum = checksum;
        self
    }

    /// Containing directory: everything before the final `/` of the path
    pub fn directory(&self) -> &str {
        self.path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
    }

    /// Whether both records describe the same logical artifact, possibly rebuilt.
    ///
    /// Requires equal names, and then either the same containing directory or
    /// compatible deployment repositories (an empty repository matches any).
    pub fn same_logical(&self, other: &Artifact) -> bool {
        if self.name != other.name {
            return false;
        }
        let same_repo = self.original_deployment_repo.is_empty()
            || other.original_deployment_repo.is_empty()
            || self.original_deployment_repo == other.original_deployment_repo;
        self.directory() == other.directory() || same_repo
    }
}

/// One logical build unit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    #[serde(rename = "type", default)]
    pub module_type: ModuleType,

    #[serde(default, skip_serializing_if = "ModuleProperties::is_absent")]
    pub properties: ModuleProperties,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_artifacts: Vec<Artifact>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,

    /// Parent module in multi-module projects; never serialized
    #[serde(skip)]
    pub parent: Option<String>,

    /// Set when the module references another manifest in an aggregate build
    #[serde(flatten)]
    pub checksum: Checksum,
}

impl Module {
    pub fn new(id: impl Into<String>, module_type: ModuleType) -> Self {
        Self {
            id: id.into(),
            module_type,
            ..Default::default()
        }
    }

    pub fn with_dependencies(mut self, dependencies: Vec<Dependency>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn with_artifacts(mut self, artifacts: Vec<Artifact>) -> Self {
        self.artifacts = artifacts;
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// True for modules that aggregate other manifests
    pub fn is_aggregate(&self) -> bool {
        self.module_type == ModuleType::Build
    }
}

/// Tool identity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
}

impl Agent {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Version control state of the build's sources
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vcs {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub revision: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub branch: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

/// Issue tracker metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issues {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracker: Option<Tracker>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub aggregate_build_issues: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub aggregation_build_status: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub affected_issues: Vec<AffectedIssue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tracker {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffectedIssue {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub aggregated: bool,
}

/// Top-level build record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub number: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<Agent>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_agent: Option<Agent>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modules: Vec<Module>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub started: String,

    /// Captured environment, keys prefixed with [`crate::env::ENV_PREFIX`]
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,

    #[serde(rename = "artifactoryPrincipal", default, skip_serializing_if = "String::is_empty")]
    pub principal: String,

    #[serde(rename = "url", default, skip_serializing_if = "String::is_empty")]
    pub build_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issues: Option<Issues>,

    #[serde(rename = "artifactoryPluginVersion", default, skip_serializing_if = "String::is_empty")]
    pub plugin_version: String,

    #[serde(rename = "vcs", default, skip_serializing_if = "Vec::is_empty")]
    pub vcs_list: Vec<Vcs>,
}

impl Manifest {
    /// Create a manifest for a new build run, started now
    pub fn new(name: impl Into<String>, number: impl Into<String>) -> Self {
        let version = env!("CARGO_PKG_VERSION");
        let mut manifest = Self {
            name: name.into(),
            number: number.into(),
            agent: Some(Agent::new(AGENT_NAME, version)),
            build_agent: Some(Agent::new(DEFAULT_BUILD_AGENT, version)),
            ..Default::default()
        };
        manifest.set_started(Local::now());
        manifest
    }

    /// Set the start timestamp in the fixed `started` layout
    pub fn set_started<Tz: TimeZone>(&mut self, started: DateTime<Tz>)
    where
        Tz::Offset: fmt::Display,
    {
        self.started = started.format(STARTED_FORMAT).to_string();
    }

    pub fn set_build_agent(&mut self, name: impl Into<String>, version: impl Into<String>) {
        self.build_agent = Some(Agent::new(name, version));
    }

    /// Find a module by exact id
    pub fn module(&self, id: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.id == id)
    }

    /// Copy of this manifest prepared for output.
    ///
    /// Requested-by chains are truncated to
    /// [`crate::provenance::MAX_REQUESTED_BY`] per dependency. The in-memory
    /// manifest keeps every chain.
    pub fn for_export(&self) -> Manifest {
        let mut exported = self.clone();
        crate::provenance::truncate_requested_by(&mut exported);
        exported
    }

    /// Serialize with 2-space indentation
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a manifest from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Write the manifest as JSON, replacing the file atomically
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        write_atomic(path, json.as_bytes())
    }
}
