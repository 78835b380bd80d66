// tests/common/mod.rs

//! Shared fixtures for integration tests.

#![allow(dead_code)]

use buildinfo::{Artifact, Checksum, Dependency, Graph, Manifest, Module, ModuleType};
use std::path::{Path, PathBuf};

pub fn chain(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

/// Build a graph from `(parent, children)` pairs.
pub fn graph(edges: &[(&str, &[&str])]) -> Graph {
    edges
        .iter()
        .map(|(parent, children)| (parent.to_string(), chain(children)))
        .collect()
}

/// A Maven build with one jar and a small dependency tree.
///
/// `org:app:1.0` -> `org:lib:2.0` -> `org:util:1.1`
pub fn maven_manifest() -> Manifest {
    let mut manifest = Manifest::new("maven-build", "7");
    manifest.modules.push(
        Module::new("org:app:1.0", ModuleType::Maven)
            .with_artifacts(vec![
                Artifact::new("app-1.0.jar", "org/app/1.0/app-1.0.jar")
                    .with_type("jar")
                    .with_repo("libs-release")
                    .with_checksum(Checksum::new("a1", "a2", "a3")),
            ])
            .with_dependencies(vec![
                Dependency::new("org:lib:2.0")
                    .with_type("jar")
                    .with_scope("compile")
                    .with_checksum(Checksum::new("l1", "l2", "l3"))
                    .with_requested_by(chain(&["org:app:1.0"])),
                Dependency::new("org:util:1.1")
                    .with_type("jar")
                    .with_scope("compile")
                    .with_checksum(Checksum::new("u1", "u2", "u3"))
                    .with_requested_by(chain(&["org:lib:2.0", "org:app:1.0"])),
            ]),
    );
    manifest
}

/// Collector output for an npm project with a diamond in its graph.
///
/// `web:1.0.0` -> {`a:1`, `b:1`} -> `c:1`
pub const NPM_COLLECTOR_OUTPUT: &str = r#"{
    "moduleId": "web:1.0.0",
    "moduleType": "npm",
    "dependencies": [
        {"id": "a:1", "scopes": ["prod"], "sha1": "a-sha1"},
        {"id": "b:1", "scopes": ["prod"]},
        {"id": "c:1", "scopes": ["prod"], "sha1": "c-sha1", "sha256": "c-sha256"}
    ],
    "graph": {
        "web:1.0.0": ["a:1", "b:1"],
        "a:1": ["c:1"],
        "b:1": ["c:1"]
    }
}"#;

/// Write `content` to `name` under `dir` and return the path.
pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}
