// src/cli.rs
//! CLI definitions for buildinfo
//!
//! This module contains all command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.
//!
//! Ecosystem commands (`go`, `mvn`, `npm`, ...) read what a collector reported
//! for one project and turn it into a manifest. The remaining commands work on
//! manifests that already exist.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "buildinfo")]
#[command(author = "buildinfo Contributors")]
#[command(version)]
#[command(about = "Build provenance manifests: collect, merge, verify and export", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Options shared by every ecosystem command
#[derive(Args, Debug, Clone)]
pub struct CollectArgs {
    /// Collector output file (JSON)
    pub input: PathBuf,

    /// Build name recorded in the manifest
    #[arg(long, default_value = "")]
    pub build_name: String,

    /// Build number recorded in the manifest
    #[arg(long, default_value = "")]
    pub build_number: String,

    /// Override the module id reported by the collector
    #[arg(long)]
    pub module: Option<String>,

    /// Output format: cyclonedx/xml or cyclonedx/json (default: manifest JSON)
    #[arg(long)]
    pub format: Option<String>,

    /// Write output to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Merge into this existing manifest and write it back
    #[arg(long)]
    pub merge_into: Option<PathBuf>,

    /// Record the build environment in the manifest properties
    #[arg(long)]
    pub capture_env: bool,

    /// Environment variables to keep (`;`-separated wildcards)
    #[arg(long, default_value = "")]
    pub env_include: String,

    /// Environment variables to drop (`;`-separated wildcards)
    #[arg(long, default_value = buildinfo::env::DEFAULT_ENV_EXCLUDE)]
    pub env_exclude: String,

    /// Directory of the dependency checksum cache
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Hours a dependency cache stays valid (1 to 87600)
    #[arg(long, default_value = "24", value_parser = clap::value_parser!(i64).range(1..=87_600))]
    pub cache_hours: i64,

    /// Worker threads for dependency callbacks
    #[arg(short = 'j', long, default_value = "3")]
    pub threads: usize,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record a Go module build
    Go(CollectArgs),

    /// Record a Maven build
    Mvn(CollectArgs),

    /// Record a Gradle build
    Gradle(CollectArgs),

    /// Record an npm build
    Npm(CollectArgs),

    /// Record a NuGet build
    Nuget(CollectArgs),

    /// Record a .NET CLI build
    Dotnet(CollectArgs),

    /// Record a Yarn build
    Yarn(CollectArgs),

    /// Record a pip install
    Pip(CollectArgs),

    /// Record a pipenv install
    Pipenv(CollectArgs),

    /// Record a Twine upload
    Twine(CollectArgs),

    /// Merge several manifests into one
    ///
    /// The first manifest supplies the build name and number; modules,
    /// artifacts and dependencies from the rest are merged in order.
    Merge {
        /// Manifest files to merge
        #[arg(required = true, num_args = 1..)]
        manifests: Vec<PathBuf>,

        /// Write the merged manifest to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Verify a manifest against an expected fixture
    ///
    /// Fields of the expected manifest that identify records (ids, names,
    /// paths, checksums) are regular expressions; empty fields match anything.
    Verify {
        /// Manifest produced by the build
        actual: PathBuf,

        /// Expected manifest
        expected: PathBuf,
    },

    /// Export a manifest as a CycloneDX SBOM
    Export {
        /// Manifest file
        manifest: PathBuf,

        /// Output format: cyclonedx/xml or cyclonedx/json
        #[arg(long, default_value = "cyclonedx/json")]
        format: String,

        /// Write the SBOM to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}
