//! Registry and package manifest types

use crate::profile::Profile;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path};

/// A file from the registry root that gets bundled into every package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedFile {
    /// Source path relative to the registry directory
    pub source: String,

    /// Destination path inside each package (defaults to source)
    #[serde(default)]
    pub dest: Option<String>,
}

impl SharedFile {
    pub fn destination(&self) -> &str {
        self.dest.as_deref().unwrap_or(&self.source)
    }
}

/// Root registry manifest (`registry.yaml`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryManifest {
    /// Package directory names
    pub packages: Vec<String>,

    #[serde(default)]
    pub shared_files: Vec<SharedFile>,
}

impl RegistryManifest {
    pub const FILE_NAME: &'static str = "registry.yaml";

    pub fn contains(&self, package: &str) -> bool {
        self.packages.iter().any(|p| p == package)
    }
}

/// Per-package manifest (`<package>/package.yaml`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageManifest {
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Package version
    pub version: String,

    /// Oldest CLI version able to use this package
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_cli_version: Option<String>,

    /// Files shipped with the package, relative to its directory
    #[serde(default)]
    pub files: Vec<String>,

    /// Profiles the package makes available once installed
    #[serde(default)]
    pub profiles: Vec<Profile>,
}

impl PackageManifest {
    pub const FILE_NAME: &'static str = "package.yaml";

    /// Files whose path would escape the package directory.
    pub fn unsafe_files(&self) -> Vec<&str> {
        self.files
            .iter()
            .map(String::as_str)
            .filter(|f| !is_contained(f))
            .collect()
    }

    /// Fail when any listed file would escape the package directory.
    pub fn ensure_contained(&self, package: &str) -> Result<()> {
        let unsafe_files = self.unsafe_files();
        if !unsafe_files.is_empty() {
            anyhow::bail!(
                "Package '{}' lists files outside its directory: {}",
                package,
                unsafe_files.join(", ")
            );
        }
        Ok(())
    }
}

/// Fail unless `name` is a single plain path component.
pub fn ensure_package_name(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    let single = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !single || !is_contained(name) || name.contains(['/', '\\']) {
        anyhow::bail!("Invalid package name: '{}'", name);
    }
    Ok(())
}

/// Whether `path` is relative and stays below its base directory.
pub fn is_contained(path: &str) -> bool {
    let path = Path::new(path);
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_manifest_with_profiles() {
        let manifest: PackageManifest = serde_yaml::from_str(
            r#"
name: rust-lib
description: Rust library skeleton
version: 1.2.0
files: [Cargo.toml, src/lib.rs]
profiles:
  - name: rust-lib
    imports: [default]
    generators: [package-files]
"#,
        )
        .unwrap();

        assert_eq!(manifest.files, vec!["Cargo.toml", "src/lib.rs"]);
        assert_eq!(manifest.min_cli_version, None);
        assert_eq!(manifest.profiles[0].imports, vec!["default"]);
    }

    #[test]
    fn test_contained_paths() {
        assert!(is_contained("src/lib.rs"));
        assert!(is_contained("./README.md"));
        assert!(!is_contained("../escape"));
        assert!(!is_contained("src/../../escape"));
        assert!(!is_contained("/etc/passwd"));
        assert!(!is_contained(""));
    }

    #[test]
    fn test_package_names() {
        assert!(ensure_package_name("rust-bin").is_ok());
        for bad in ["", ".", "..", "a/b", "../x", "/abs", "a\\b", "./a"] {
            assert!(ensure_package_name(bad).is_err(), "{bad:?} accepted");
        }
    }

    #[test]
    fn test_ensure_contained_names_offenders() {
        let manifest: PackageManifest =
            serde_yaml::from_str("name: evil\nversion: 0.1.0\nfiles: [ok.txt, ../x, /etc/y]\n")
                .unwrap();
        let err = manifest.ensure_contained("evil").unwrap_err().to_string();
        assert!(err.contains("../x, /etc/y"), "{err}");
    }

    #[test]
    fn test_shared_file_destination() {
        let plain = SharedFile {
            source: "LICENSE".into(),
            dest: None,
        };
        let renamed = SharedFile {
            source: "gitignore".into(),
            dest: Some(".gitignore".into()),
        };
        assert_eq!(plain.destination(), "LICENSE");
        assert_eq!(renamed.destination(), ".gitignore");
    }
}
