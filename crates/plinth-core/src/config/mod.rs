//! Project configuration (`plinth.yaml`)
//!
//! The file declares global variables, global default overrides, an optional
//! registry URL and the profiles available to `plinth new`. Installed
//! packages contribute further profiles.

use crate::profile::{Profile, ProfileMerger};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// Name of the profile used when none is given
pub const DEFAULT_PROFILE: &str = "default";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScaffoldConfig {
    /// Registry URL, overridden by the product's environment variable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,

    /// Global variables, layered under every profile's own
    #[serde(default)]
    pub variables: Map<String, Value>,

    /// Global default overrides, layered under every profile's own
    #[serde(default)]
    pub defaults: Map<String, Value>,

    #[serde(default)]
    pub profiles: Vec<Profile>,
}

impl ScaffoldConfig {
    pub const FILE_NAME: &'static str = "plinth.yaml";

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse scaffold configuration")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("Invalid config in {}", path.display()))
    }

    /// Load `path` if it exists, otherwise fall back to [`ScaffoldConfig::builtin`].
    pub fn load_or_builtin(path: &Path) -> Result<Self> {
        if path.exists() {
            tracing::debug!(path = %path.display(), "loading configuration");
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no configuration file, using built-in profile");
            Ok(Self::builtin())
        }
    }

    /// Configuration used when no file is present: a single `default` profile.
    pub fn builtin() -> Self {
        let mut profile = Profile::new(DEFAULT_PROFILE);
        profile.description = Some("Minimal project with a README and a license".to_string());
        profile.configurators = vec!["project".into(), "license".into()];
        profile.generators = vec!["readme".into(), "license-file".into()];
        Self {
            profiles: vec![profile],
            ..Self::default()
        }
    }

    /// Add profiles from an installed package. Profiles already defined win.
    pub fn add_profiles(&mut self, source: &str, profiles: impl IntoIterator<Item = Profile>) {
        for profile in profiles {
            if self.profile(&profile.name).is_some() {
                tracing::warn!(
                    profile = %profile.name,
                    package = source,
                    "profile already defined, skipping"
                );
                continue;
            }
            self.profiles.push(profile);
        }
    }

    pub fn profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// A merger over every known profile with the global layers applied.
    pub fn merger(&self) -> ProfileMerger<'_> {
        ProfileMerger::new(&self.profiles)
            .with_variables(self.variables.clone())
            .with_defaults(self.defaults.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLE: &str = r#"
registry: https://example.com/registry
variables:
  org: acme
defaults:
  license: MIT
profiles:
  - name: base
    configurators: [project]
    generators: [readme]
  - name: lib
    description: Library
    imports: [base]
    defaults:
      name: "@variables.org"
"#;

    #[test]
    fn test_parse_config() {
        let config = ScaffoldConfig::from_yaml(SAMPLE).unwrap();
        assert_eq!(
            config.registry.as_deref(),
            Some("https://example.com/registry")
        );
        assert_eq!(config.variables["org"], json!("acme"));
        assert_eq!(config.profiles.len(), 2);

        let lib = config.profile("lib").unwrap();
        assert_eq!(lib.imports, vec!["base"]);
        assert!(lib.generators.is_empty());
        assert_eq!(lib.defaults["name"], json!("@variables.org"));
    }

    #[test]
    fn test_merger_applies_global_layers() {
        let config = ScaffoldConfig::from_yaml(SAMPLE).unwrap();
        let merged = config.merger().merge("lib").unwrap();
        assert_eq!(merged.generators, vec!["readme"]);
        assert_eq!(
            Value::Object(merged.defaults),
            json!({"license": "MIT", "name": "@variables.org"})
        );
        assert_eq!(merged.variables["org"], json!("acme"));
    }

    #[test]
    fn test_missing_file_uses_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let config = ScaffoldConfig::load_or_builtin(&dir.path().join("plinth.yaml")).unwrap();
        assert!(config.profile(DEFAULT_PROFILE).is_some());
    }

    #[test]
    fn test_load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plinth.yaml");
        std::fs::write(&path, "profiles: {not: a list}").unwrap();
        let err = ScaffoldConfig::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("plinth.yaml"));
    }

    #[test]
    fn test_package_profiles_do_not_replace_existing() {
        let mut config = ScaffoldConfig::from_yaml(SAMPLE).unwrap();
        let mut shadow = Profile::new("base");
        shadow.generators = vec!["other".into()];
        config.add_profiles("pkg", vec![shadow, Profile::new("extra")]);

        assert_eq!(config.profiles.len(), 3);
        assert_eq!(config.profile("base").unwrap().generators, vec!["readme"]);
        assert!(config.profile("extra").is_some());
    }
}
