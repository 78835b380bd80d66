// src/commands.rs
//! Command implementations for the buildinfo CLI

use anyhow::{Context, Result};
use buildinfo::cache::DependencyCache;
use buildinfo::{
    CollectorOutput, Manifest, ModuleType, SbomFormat, enrich_from_cache, sbom, verify_modules,
};
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

use crate::cli::CollectArgs;

/// Module type recorded for each ecosystem command
pub fn module_type_for(ecosystem: &str) -> ModuleType {
    match ecosystem {
        "go" => ModuleType::Go,
        "mvn" => ModuleType::Maven,
        "gradle" => ModuleType::Gradle,
        "npm" | "yarn" => ModuleType::Npm,
        "nuget" | "dotnet" => ModuleType::Nuget,
        "pip" | "pipenv" | "twine" => ModuleType::Python,
        _ => ModuleType::Generic,
    }
}

/// Print to stdout, or write to `output` when given
fn write_output(output: Option<&Path>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Output written to {}", path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}

fn render(manifest: &Manifest, format: Option<SbomFormat>) -> Result<String> {
    Ok(match format {
        Some(format) => sbom::render(manifest, format)?,
        None => manifest.for_export().to_json()?,
    })
}

/// Turn a collector's output into a manifest
pub fn cmd_collect(ecosystem: &str, args: &CollectArgs) -> Result<()> {
    let format = args
        .format
        .as_deref()
        .map(SbomFormat::from_str)
        .transpose()?;

    info!("Recording {} build from {}", ecosystem, args.input.display());
    let mut output = CollectorOutput::load(&args.input)
        .with_context(|| format!("Failed to read collector output {}", args.input.display()))?;
    if let Some(ref module_id) = args.module {
        output.module_id = module_id.clone();
    }

    if let Some(ref dir) = args.cache_dir {
        let validity = chrono::Duration::try_hours(args.cache_hours)
            .with_context(|| format!("Cache validity of {} hours is out of range", args.cache_hours))?;
        let mut cache = DependencyCache::load(dir, validity);
        let dependencies = std::mem::take(&mut output.dependencies);
        output.dependencies = enrich_from_cache(dependencies, &mut cache, args.threads)?;
        if let Err(e) = cache.save() {
            warn!("Failed to save dependency cache {}: {}", cache.path().display(), e);
        }
    }

    let module = output.into_module(module_type_for(ecosystem))?;

    let mut manifest = match args.merge_into {
        Some(ref path) if path.exists() => Manifest::load(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?,
        _ => Manifest::new(args.build_name.clone(), args.build_number.clone()),
    };
    if manifest.name.is_empty() {
        manifest.name = args.build_name.clone();
    }
    if manifest.number.is_empty() {
        manifest.number = args.build_number.clone();
    }
    manifest.add_module(module);

    if args.capture_env {
        manifest.capture_env();
        manifest.include_env(&args.env_include)?;
        manifest.exclude_env(&args.env_exclude)?;
    }

    if let Some(ref path) = args.merge_into {
        manifest
            .for_export()
            .save(path)
            .with_context(|| format!("Failed to write manifest {}", path.display()))?;
        info!("Manifest {} updated", path.display());
    }

    write_output(args.output.as_deref(), &render(&manifest, format)?)
}

/// Merge manifest files in order
pub fn cmd_merge(manifests: &[impl AsRef<Path>], output: Option<&Path>) -> Result<()> {
    let mut merged = Manifest::default();
    for path in manifests {
        let path = path.as_ref();
        let manifest = Manifest::load(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        info!("Merging {} ({} modules)", path.display(), manifest.modules.len());
        merged.append(&manifest);
    }
    write_output(output, &merged.for_export().to_json()?)
}

/// Compare a manifest with an expected fixture
pub fn cmd_verify(actual: &Path, expected: &Path) -> Result<()> {
    let actual = Manifest::load(actual)
        .with_context(|| format!("Failed to read manifest {}", actual.display()))?;
    let expected = Manifest::load(expected)
        .with_context(|| format!("Failed to read expected manifest {}", expected.display()))?;

    let verification = verify_modules(&actual.modules, &expected.modules)?;
    if verification.passed() {
        println!("Manifest matches: {} modules verified", actual.modules.len());
        return Ok(());
    }

    for mismatch in &verification.mismatches {
        println!("  {}", mismatch);
    }
    Err(anyhow::anyhow!(
        "Verification failed with {} mismatches",
        verification.mismatches.len()
    ))
}

/// Export a manifest file as an SBOM
pub fn cmd_export(manifest: &Path, format: &str, output: Option<&Path>) -> Result<()> {
    let format = SbomFormat::from_str(format)?;
    let loaded = Manifest::load(manifest)
        .with_context(|| format!("Failed to read manifest {}", manifest.display()))?;
    info!("Exporting {} as {}", manifest.display(), format);
    write_output(output, &sbom::render(&loaded, format)?)
}
