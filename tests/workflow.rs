// tests/workflow.rs

//! End-to-end flows: collector output to manifest, persistence, verification
//! and SBOM export.

mod common;

use buildinfo::cache::{DependencyCache, default_validity};
use buildinfo::provenance::MAX_REQUESTED_BY;
use buildinfo::sbom;
use buildinfo::{
    Checksum, CollectorOutput, Dependency, Manifest, Module, ModuleType, SbomFormat,
    enrich_from_cache, verify_modules,
};
use common::{NPM_COLLECTOR_OUTPUT, maven_manifest, write_file};

#[test]
fn test_collector_output_to_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(dir.path(), "collector.json", NPM_COLLECTOR_OUTPUT);

    let output = CollectorOutput::load(&input).unwrap();
    let module = output.into_module(ModuleType::Generic).unwrap();
    assert_eq!(module.module_type, ModuleType::Npm);

    let c = module.dependencies.iter().find(|d| d.id == "c:1").unwrap();
    assert_eq!(c.requested_by.len(), 2);
    assert!(c.requested_by.iter().all(|chain| chain.last().map(String::as_str) == Some("web:1.0.0")));

    let mut manifest = Manifest::new("web", "1");
    manifest.add_module(module);
    let path = dir.path().join("build-info.json");
    manifest.save(&path).unwrap();

    let loaded = Manifest::load(&path).unwrap();
    assert_eq!(loaded, manifest);
}

#[test]
fn test_cache_fills_missing_checksums_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let cache_dir = dir.path().join(".buildinfo");

    // First run knows b:1's checksum and stores it
    let mut cache = DependencyCache::load(&cache_dir, default_validity());
    let first_run = vec![Dependency::new("b:1").with_checksum(Checksum::new("b-sha1", "", ""))];
    enrich_from_cache(first_run, &mut cache, 1).unwrap();
    std::fs::create_dir_all(&cache_dir).unwrap();
    cache.save().unwrap();

    // Second run reports b:1 without a checksum
    let mut output = CollectorOutput::from_json(NPM_COLLECTOR_OUTPUT).unwrap();
    let mut cache = DependencyCache::load(&cache_dir, default_validity());
    assert_eq!(cache.len(), 1);

    let dependencies = std::mem::take(&mut output.dependencies);
    output.dependencies = enrich_from_cache(dependencies, &mut cache, 4).unwrap();
    let module = output.into_module(ModuleType::Npm).unwrap();

    let b = module.dependencies.iter().find(|d| d.id == "b:1").unwrap();
    assert_eq!(b.checksum.sha1, "b-sha1");
    assert_eq!(cache.len(), 3);
}

#[test]
fn test_verify_against_wildcard_fixture() {
    let actual = maven_manifest();
    let expected = Manifest::from_json(
        r#"{
            "modules": [{
                "type": "maven",
                "id": "org:app:1\\.0",
                "artifacts": [{"type": "jar", "name": "app-.*\\.jar", "path": ".*/app-1\\.0\\.jar", "sha1": ".+"}],
                "dependencies": [
                    {"id": "org:util:.*", "type": "jar", "scopes": ["compile"], "sha256": ".+",
                     "requestedBy": [["org:lib:2.0", "org:app:1.0"]]},
                    {"id": "org:lib:.*", "type": "jar", "scopes": ["compile"],
                     "requestedBy": [["org:app:1.0"]]}
                ]
            }]
        }"#,
    )
    .unwrap();

    let verification = verify_modules(&actual.modules, &expected.modules).unwrap();
    assert!(verification.passed(), "{:?}", verification.mismatches);

    let mut drifted = actual.clone();
    drifted.modules[0].dependencies[0].checksum = Checksum::default();
    drifted.modules[0].dependencies[1].checksum.sha256.clear();
    let verification = verify_modules(&drifted.modules, &expected.modules).unwrap();
    assert!(!verification.passed());
}

#[test]
fn test_manifest_export_caps_chains_but_sbom_keeps_edges() {
    let chains: Vec<Vec<String>> = (0..20)
        .map(|i| vec![format!("p:{}", i), "root:1".to_string()])
        .collect();
    let mut dep = Dependency::new("leaf:1");
    for chain in chains {
        dep = dep.with_requested_by(chain);
    }

    let mut manifest = Manifest::new("b", "1");
    manifest.add_module(Module::new("root:1", ModuleType::Go).with_dependencies(vec![dep]));

    assert_eq!(manifest.modules[0].dependencies[0].requested_by.len(), 20);
    let exported = manifest.for_export();
    assert_eq!(exported.modules[0].dependencies[0].requested_by.len(), MAX_REQUESTED_BY);
    assert_eq!(manifest.modules[0].dependencies[0].requested_by.len(), 20);

    let json = sbom::render(&manifest, SbomFormat::CycloneDxJson).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    let edges = value["dependencies"].as_array().unwrap();
    assert_eq!(edges.len(), 20);
    assert!(edges.iter().any(|e| e["ref"] == "p:19" && e["dependsOn"][0] == "leaf:1"));
}

#[test]
fn test_merge_manifests_from_two_phases() {
    let mut install = Manifest::new("build", "2");
    install.add_module(
        Module::new("web:1.0.0", ModuleType::Npm)
            .with_dependencies(vec![Dependency::new("a:1").with_scope("prod")]),
    );

    let mut publish = Manifest::new("build", "2");
    publish.add_module(
        Module::new("web:1.0.0", ModuleType::Npm)
            .with_dependencies(vec![Dependency::new("a:1").with_scope("dev")]),
    );

    install.append(&publish);
    assert_eq!(install.modules.len(), 1);
    assert_eq!(install.modules[0].dependencies.len(), 1);
    assert_eq!(install.modules[0].dependencies[0].scopes, vec!["prod", "dev"]);
}
