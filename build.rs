// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

const ECOSYSTEMS: &[(&str, &str)] = &[
    ("go", "Record a Go module build"),
    ("mvn", "Record a Maven build"),
    ("gradle", "Record a Gradle build"),
    ("npm", "Record an npm build"),
    ("nuget", "Record a NuGet build"),
    ("dotnet", "Record a .NET CLI build"),
    ("yarn", "Record a Yarn build"),
    ("pip", "Record a pip install"),
    ("pipenv", "Record a pipenv install"),
    ("twine", "Record a Twine upload"),
];

/// Common argument: output file
fn output_arg() -> Arg {
    Arg::new("output")
        .short('o')
        .long("output")
        .value_name("PATH")
        .help("Write output to this file instead of stdout")
}

fn collect_command(name: &'static str, about: &'static str) -> Command {
    Command::new(name)
        .about(about)
        .arg(Arg::new("input").required(true).help("Collector output file (JSON)"))
        .arg(Arg::new("build_name").long("build-name").help("Build name recorded in the manifest"))
        .arg(Arg::new("build_number").long("build-number").help("Build number recorded in the manifest"))
        .arg(Arg::new("module").long("module").help("Override the module id reported by the collector"))
        .arg(
            Arg::new("format")
                .long("format")
                .help("Output format: cyclonedx/xml or cyclonedx/json (default: manifest JSON)"),
        )
        .arg(output_arg())
        .arg(Arg::new("merge_into").long("merge-into").help("Merge into this existing manifest and write it back"))
        .arg(
            Arg::new("capture_env")
                .long("capture-env")
                .action(ArgAction::SetTrue)
                .help("Record the build environment in the manifest properties"),
        )
        .arg(Arg::new("env_include").long("env-include").help("Environment variables to keep (;-separated wildcards)"))
        .arg(Arg::new("env_exclude").long("env-exclude").help("Environment variables to drop (;-separated wildcards)"))
        .arg(Arg::new("cache_dir").long("cache-dir").help("Directory of the dependency checksum cache"))
        .arg(
            Arg::new("cache_hours")
                .long("cache-hours")
                .default_value("24")
                .help("Hours a dependency cache stays valid (1 to 87600)"),
        )
        .arg(
            Arg::new("threads")
                .short('j')
                .long("threads")
                .default_value("3")
                .help("Worker threads for dependency callbacks"),
        )
}

fn build_cli() -> Command {
    let mut cmd = Command::new("buildinfo")
        .version(env!("CARGO_PKG_VERSION"))
        .author("buildinfo Contributors")
        .about("Build provenance manifests: collect, merge, verify and export")
        .subcommand_required(false);

    for &(name, about) in ECOSYSTEMS {
        cmd = cmd.subcommand(collect_command(name, about));
    }

    cmd.subcommand(
        Command::new("merge")
            .about("Merge several manifests into one")
            .arg(Arg::new("manifests").required(true).num_args(1..).help("Manifest files to merge"))
            .arg(output_arg()),
    )
    .subcommand(
        Command::new("verify")
            .about("Verify a manifest against an expected fixture")
            .arg(Arg::new("actual").required(true).help("Manifest produced by the build"))
            .arg(Arg::new("expected").required(true).help("Expected manifest")),
    )
    .subcommand(
        Command::new("export")
            .about("Export a manifest as a CycloneDX SBOM")
            .arg(Arg::new("manifest").required(true).help("Manifest file"))
            .arg(
                Arg::new("format")
                    .long("format")
                    .default_value("cyclonedx/json")
                    .help("Output format: cyclonedx/xml or cyclonedx/json"),
            )
            .arg(output_arg()),
    )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("buildinfo.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
