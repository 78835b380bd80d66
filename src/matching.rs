// src/matching.rs

//! Structural comparison of manifests against an expected fixture
//!
//! Collections are compared as multisets: every actual element must pair with
//! exactly one expected element and vice versa. The expected side may use
//! regular expressions in the fields that identify an element (ids, names,
//! paths, checksum digests), so a fixture can say "any non-empty sha1" with
//! `.+` instead of pinning a digest that changes on every build.
//!
//! Type fields, scopes and requested-by chains are always compared exactly.

use crate::checksum::Checksum;
use crate::entities::{Artifact, Dependency, Module};
use crate::error::{Error, Result};
use regex::Regex;
use std::collections::BTreeSet;

/// Match `actual` against an expected pattern.
///
/// An empty pattern accepts any value. Otherwise the pattern must match the
/// whole of `actual`.
pub fn field_matches(pattern: &str, actual: &str) -> Result<bool> {
    if pattern.is_empty() {
        return Ok(true);
    }
    let anchored = format!("^(?:{})$", pattern);
    let regex = Regex::new(&anchored).map_err(|source| Error::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })?;
    Ok(regex.is_match(actual))
}

/// Element-level comparison used by the multiset matcher
trait Matchable {
    fn matches(&self, expected: &Self) -> Result<bool>;
    fn describe(&self) -> String;
}

impl Matchable for Dependency {
    fn matches(&self, expected: &Self) -> Result<bool> {
        if self.dep_type != expected.dep_type {
            return Ok(false);
        }
        let scopes: BTreeSet<&String> = self.scopes.iter().collect();
        let expected_scopes: BTreeSet<&String> = expected.scopes.iter().collect();
        if scopes != expected_scopes || self.requested_by != expected.requested_by {
            return Ok(false);
        }
        Ok(field_matches(&expected.id, &self.id)? && self.checksum.matches(&expected.checksum)?)
    }

    fn describe(&self) -> String {
        format!("dependency {}", self.id)
    }
}

impl Matchable for Artifact {
    fn matches(&self, expected: &Self) -> Result<bool> {
        if self.artifact_type != expected.artifact_type {
            return Ok(false);
        }
        Ok(field_matches(&expected.name, &self.name)?
            && field_matches(&expected.path, &self.path)?
            && self.checksum.matches(&expected.checksum)?)
    }

    fn describe(&self) -> String {
        format!("artifact {} ({})", self.name, self.path)
    }
}

impl Matchable for Module {
    fn matches(&self, expected: &Self) -> Result<bool> {
        if self.module_type != expected.module_type {
            return Ok(false);
        }
        Ok(field_matches(&expected.id, &self.id)?
            && self.checksum.matches(&expected.checksum)?
            && match_artifacts(&self.artifacts, &expected.artifacts)?
            && match_artifacts(&self.excluded_artifacts, &expected.excluded_artifacts)?
            && match_dependencies(&self.dependencies, &expected.dependencies)?)
    }

    fn describe(&self) -> String {
        format!("module {} ({})", self.id, self.module_type)
    }
}

/// Pair every actual element with an unconsumed expected element.
///
/// Returns the actual elements that found no partner.
fn unmatched<'a, T: Matchable>(actual: &'a [T], expected: &[T]) -> Result<Vec<&'a T>> {
    let mut consumed = vec![false; expected.len()];
    let mut missing = Vec::new();

    for item in actual {
        let mut found = None;
        for (i, candidate) in expected.iter().enumerate() {
            if !consumed[i] && item.matches(candidate)? {
                found = Some(i);
                break;
            }
        }
        match found {
            Some(i) => consumed[i] = true,
            None => missing.push(item),
        }
    }
    Ok(missing)
}

fn multiset_matches<T: Matchable>(actual: &[T], expected: &[T]) -> Result<bool> {
    if actual.len() != expected.len() {
        return Ok(false);
    }
    Ok(unmatched(actual, expected)?.is_empty())
}

/// Compare two module collections as multisets
pub fn match_modules(actual: &[Module], expected: &[Module]) -> Result<bool> {
    multiset_matches(actual, expected)
}

/// Compare two dependency collections as multisets
pub fn match_dependencies(actual: &[Dependency], expected: &[Dependency]) -> Result<bool> {
    multiset_matches(actual, expected)
}

/// Compare two artifact collections as multisets
pub fn match_artifacts(actual: &[Artifact], expected: &[Artifact]) -> Result<bool> {
    multiset_matches(actual, expected)
}

/// Compare a single checksum against an expected pattern checksum
pub fn match_checksum(actual: &Checksum, expected: &Checksum) -> Result<bool> {
    actual.matches(expected)
}

/// Outcome of verifying a manifest against an expectation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Verification {
    /// Human-readable reasons for failure; empty when the manifests match
    pub mismatches: Vec<String>,
}

impl Verification {
    pub fn passed(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Verify modules and explain what did not match
pub fn verify_modules(actual: &[Module], expected: &[Module]) -> Result<Verification> {
    let mut mismatches = Vec::new();

    if actual.len() != expected.len() {
        mismatches.push(format!(
            "expected {} modules, found {}",
            expected.len(),
            actual.len()
        ));
    }

    for module in unmatched(actual, expected)? {
        let mut candidate = None;
        for e in expected {
            if field_matches(&e.id, &module.id)? {
                candidate = Some(e);
                break;
            }
        }
        let reason = match candidate {
            Some(candidate) => explain_module(module, candidate)?,
            None => "no expected module with a matching id".to_string(),
        };
        mismatches.push(format!("{}: {}", module.describe(), reason));
    }

    Ok(Verification { mismatches })
}

fn explain_module(actual: &Module, expected: &Module) -> Result<String> {
    if actual.module_type != expected.module_type {
        return Ok(format!(
            "type {} does not match expected {}",
            actual.module_type, expected.module_type
        ));
    }
    if !actual.checksum.matches(&expected.checksum)? {
        return Ok("module checksum does not match".to_string());
    }

    let mut reasons = Vec::new();
    describe_differences("artifacts", &actual.artifacts, &expected.artifacts, &mut reasons)?;
    describe_differences(
        "excluded artifacts",
        &actual.excluded_artifacts,
        &expected.excluded_artifacts,
        &mut reasons,
    )?;
    describe_differences("dependencies", &actual.dependencies, &expected.dependencies, &mut reasons)?;
    Ok(reasons.join("; "))
}

fn describe_differences<T: Matchable>(
    label: &str,
    actual: &[T],
    expected: &[T],
    reasons: &mut Vec<String>,
) -> Result<()> {
    if actual.len() != expected.len() {
        reasons.push(format!(
            "expected {} {}, found {}",
            expected.len(),
            label,
            actual.len()
        ));
    }
    for item in unmatched(actual, expected)? {
        reasons.push(format!("unexpected {}", item.describe()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::ModuleType;

    #[test]
    fn test_field_matches() {
        assert!(field_matches("", "anything").unwrap());
        assert!(field_matches("", "").unwrap());
        assert!(field_matches(".+", "x").unwrap());
        assert!(!field_matches(".+", "").unwrap());
        assert!(field_matches("a:1\\.0", "a:1.0").unwrap());
        assert!(!field_matches("a:1", "a:1.0").unwrap());
    }

    #[test]
    fn test_invalid_pattern() {
        let err = field_matches("(unclosed", "x").unwrap_err();
        assert!(matches!(err, Error::InvalidPattern { .. }));
        assert!(err.to_string().contains("(unclosed"));
    }

    #[test]
    fn test_wildcard_dependency() {
        let expected = Dependency::new("sha256__.*").with_checksum(Checksum::new(".+", "", ""));
        let actual =
            Dependency::new("sha256__abcdef").with_checksum(Checksum::new("deadbeef", "", ""));
        assert!(match_dependencies(&[actual.clone()], &[expected.clone()]).unwrap());

        let mut no_sha1 = actual;
        no_sha1.checksum.sha1.clear();
        assert!(!match_dependencies(&[no_sha1], &[expected]).unwrap());
    }

    #[test]
    fn test_scopes_order_insensitive_chains_order_sensitive() {
        let actual = Dependency::new("d")
            .with_scope("a")
            .with_scope("b")
            .with_requested_by(vec!["x".to_string(), "root".to_string()]);
        let reordered_scopes = Dependency::new("d")
            .with_scope("b")
            .with_scope("a")
            .with_requested_by(vec!["x".to_string(), "root".to_string()]);
        let reordered_chain = Dependency::new("d")
            .with_scope("a")
            .with_scope("b")
            .with_requested_by(vec!["root".to_string(), "x".to_string()]);

        assert!(match_dependencies(&[actual.clone()], &[reordered_scopes]).unwrap());
        assert!(!match_dependencies(&[actual], &[reordered_chain]).unwrap());
    }

    #[test]
    fn test_expected_element_consumed_once() {
        let wildcard = Dependency::new(".*");
        let exact = Dependency::new("b");
        let actual = vec![Dependency::new("a"), Dependency::new("a")];

        assert!(!match_dependencies(&actual, &[wildcard.clone(), exact]).unwrap());
        assert!(match_dependencies(&actual, &[wildcard.clone(), wildcard]).unwrap());
    }

    #[test]
    fn test_size_mismatch() {
        let actual = vec![Dependency::new("a")];
        assert!(!match_dependencies(&actual, &[]).unwrap());
        assert!(!match_dependencies(&[], &actual).unwrap());
    }

    #[test]
    fn test_artifact_type_exact() {
        let actual = Artifact::new("app.jar", "libs/app.jar").with_type("jar");
        let expected = Artifact::new("app\\..*", "libs/.*").with_type("jar");
        let wrong_type = Artifact::new("app\\..*", "libs/.*").with_type("ja.");
        assert!(match_artifacts(&[actual.clone()], &[expected]).unwrap());
        assert!(!match_artifacts(&[actual], &[wrong_type]).unwrap());
    }

    #[test]
    fn test_verify_modules_reports_unexpected_dependency() {
        let actual = vec![
            Module::new("app", ModuleType::Npm)
                .with_dependencies(vec![Dependency::new("left:1"), Dependency::new("extra:1")]),
        ];
        let expected = vec![
            Module::new("app", ModuleType::Npm).with_dependencies(vec![Dependency::new("left:1")]),
        ];

        let verification = verify_modules(&actual, &expected).unwrap();
        assert!(!verification.passed());
        assert!(verification.mismatches[0].contains("extra:1"));

        let ok = verify_modules(&expected, &expected).unwrap();
        assert!(ok.passed());
        assert!(match_modules(&expected, &expected).unwrap());
    }

    #[test]
    fn test_verify_modules_reports_type() {
        let actual = vec![Module::new("app", ModuleType::Go)];
        let expected = vec![Module::new("app", ModuleType::Npm)];
        let verification = verify_modules(&actual, &expected).unwrap();
        assert!(verification.mismatches[0].contains("type go"));
    }

    #[test]
    fn test_verify_modules_propagates_invalid_id_pattern() {
        // Types differ, so only the diagnosis step reads the id pattern
        let actual = vec![Module::new("app", ModuleType::Go)];
        let expected = vec![Module::new("(unclosed", ModuleType::Npm)];
        let err = verify_modules(&actual, &expected).unwrap_err();
        assert!(matches!(err, Error::InvalidPattern { .. }));
    }
}
