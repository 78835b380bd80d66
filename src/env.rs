// src/env.rs

//! Build environment capture
//!
//! Environment variables are stored in the manifest's `properties` with the
//! [`ENV_PREFIX`] prepended. Include and exclude filters take `;`-separated
//! wildcard patterns matched case-insensitively against the variable name
//! with the prefix stripped.

use crate::entities::Manifest;
use crate::error::{Error, Result};
use glob::{MatchOptions, Pattern};
use std::collections::BTreeMap;
use tracing::debug;

/// Prefix of every captured environment property
pub const ENV_PREFIX: &str = "buildInfo.env.";

/// Variables dropped unless the caller overrides the exclusion list
pub const DEFAULT_ENV_EXCLUDE: &str = "*password*;*psw*;*secret*;*key*;*token*;*auth*";

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Prefix variable names for storage in manifest properties
pub fn capture<I>(vars: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (String, String)>,
{
    vars.into_iter()
        .map(|(key, value)| (format!("{}{}", ENV_PREFIX, key), value))
        .collect()
}

fn compile(patterns: &str) -> Result<Vec<Pattern>> {
    patterns
        .split(';')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            Pattern::new(p).map_err(|source| Error::InvalidWildcard {
                pattern: p.to_string(),
                source,
            })
        })
        .collect()
}

fn key_matches(key: &str, patterns: &[Pattern]) -> bool {
    let name = key.strip_prefix(ENV_PREFIX).unwrap_or(key);
    patterns.iter().any(|p| p.matches_with(name, MATCH_OPTIONS))
}

impl Manifest {
    /// Capture the current process environment into `properties`
    pub fn capture_env(&mut self) {
        let captured = capture(std::env::vars());
        debug!("Captured {} environment variables", captured.len());
        self.properties.extend(captured);
    }

    /// Keep only environment properties matching one of `patterns`
    ///
    /// An empty pattern list keeps everything.
    pub fn include_env(&mut self, patterns: &str) -> Result<()> {
        let patterns = compile(patterns)?;
        if patterns.is_empty() {
            return Ok(());
        }
        self.properties.retain(|key, _| {
            !key.starts_with(ENV_PREFIX) || key_matches(key, &patterns)
        });
        Ok(())
    }

    /// Drop environment properties matching any of `patterns`
    pub fn exclude_env(&mut self, patterns: &str) -> Result<()> {
        let patterns = compile(patterns)?;
        self.properties.retain(|key, _| {
            !key.starts_with(ENV_PREFIX) || !key_matches(key, &patterns)
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest_with_env(vars: &[(&str, &str)]) -> Manifest {
        let mut manifest = Manifest::default();
        manifest.properties = capture(
            vars.iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        );
        manifest
    }

    #[test]
    fn test_capture_prefixes_keys() {
        let captured = capture(vec![("PATH".to_string(), "/bin".to_string())]);
        assert_eq!(captured["buildInfo.env.PATH"], "/bin");
    }

    #[test]
    fn test_default_exclusion_is_case_insensitive() {
        let mut manifest = manifest_with_env(&[
            ("PATH", "/bin"),
            ("DB_PASSWORD", "hunter2"),
            ("Api_Token", "t"),
            ("AWS_SECRET_ACCESS_KEY", "s"),
            ("HOME", "/root"),
        ]);
        manifest.exclude_env(DEFAULT_ENV_EXCLUDE).unwrap();

        let keys: Vec<_> = manifest.properties.keys().cloned().collect();
        assert_eq!(keys, vec!["buildInfo.env.HOME", "buildInfo.env.PATH"]);
    }

    #[test]
    fn test_include_env() {
        let mut manifest = manifest_with_env(&[("CI_JOB", "1"), ("ci_stage", "2"), ("HOME", "/root")]);
        manifest.include_env("ci_*").unwrap();

        assert_eq!(manifest.properties.len(), 2);
        assert!(manifest.properties.contains_key("buildInfo.env.CI_JOB"));
        assert!(manifest.properties.contains_key("buildInfo.env.ci_stage"));
    }

    #[test]
    fn test_include_empty_keeps_all() {
        let mut manifest = manifest_with_env(&[("A", "1"), ("B", "2")]);
        manifest.include_env("").unwrap();
        assert_eq!(manifest.properties.len(), 2);
    }

    #[test]
    fn test_invalid_wildcard() {
        let mut manifest = manifest_with_env(&[("A", "1")]);
        assert!(matches!(
            manifest.exclude_env("[unclosed"),
            Err(Error::InvalidWildcard { .. })
        ));
    }
}
