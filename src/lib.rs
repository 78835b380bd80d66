// src/lib.rs

//! Build provenance manifests
//!
//! Records what a build produced and what it consumed, across package
//! ecosystems (npm, Maven, Gradle, Go, NuGet, pip, ...), and keeps enough
//! provenance to answer "why is this dependency in my build?".
//!
//! # Architecture
//!
//! - Entities: manifests hold modules; modules hold artifacts and dependencies
//! - Merge: idempotent union of manifests, modules and their records
//! - Provenance: requested-by chains computed from a raw dependency graph
//! - Matching: multiset comparison with regex wildcards for verification
//! - SBOM: deterministic CycloneDX 1.5 export (JSON and XML)
//!
//! Ecosystem collectors live outside the crate and hand their results over as
//! [`CollectorOutput`].

pub mod cache;
pub mod checksum;
pub mod collect;
pub mod entities;
pub mod env;
mod error;
pub mod matching;
pub mod merge;
mod persist;
pub mod provenance;
pub mod sbom;

pub use cache::DependencyCache;
pub use checksum::Checksum;
pub use collect::{CollectorOutput, enrich_from_cache, run_callbacks};
pub use entities::{
    AffectedIssue, Agent, Artifact, Dependency, Issues, Manifest, Module, ModuleProperties,
    ModuleType, Tracker, Vcs,
};
pub use error::{Error, Result};
pub use matching::{Verification, field_matches, verify_modules};
pub use provenance::Graph;
pub use sbom::{PackageId, SbomFormat};
