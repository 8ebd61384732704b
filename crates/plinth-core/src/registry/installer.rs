//! Installing packages and discovering installed ones

use super::fetcher::PackageFetcher;
use super::manifest::{ensure_package_name, PackageManifest};
use crate::config::ScaffoldConfig;
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use walkdir::WalkDir;

/// Variable injected into package profiles so generators can find their files
pub const PACKAGE_VARIABLE: &str = "package";

#[derive(Debug, Clone, PartialEq)]
pub struct InstalledPackage {
    pub name: String,
    pub path: PathBuf,
    pub manifest: PackageManifest,
}

impl InstalledPackage {
    /// Files shipped by the package, excluding its manifest.
    pub fn files(&self) -> impl Iterator<Item = (&str, PathBuf)> {
        self.manifest
            .files
            .iter()
            .filter(|f| f.as_str() != PackageManifest::FILE_NAME)
            .map(|f| (f.as_str(), self.path.join(f)))
    }
}

/// Fetch a package and write it to `<packages_dir>/<name>/`, replacing any
/// previous installation.
pub async fn install_package(
    fetcher: &mut PackageFetcher,
    name: &str,
    packages_dir: &Path,
) -> Result<InstalledPackage> {
    ensure_package_name(name)?;
    let archive = fetcher.fetch_package(name).await?;
    let target = packages_dir.join(name);

    if fs::try_exists(&target).await.unwrap_or(false) {
        tracing::info!(package = name, path = %target.display(), "replacing installed package");
        fs::remove_dir_all(&target)
            .await
            .with_context(|| format!("Failed to remove {}", target.display()))?;
    }
    fs::create_dir_all(&target)
        .await
        .with_context(|| format!("Failed to create directory: {}", target.display()))?;

    for (file_path, contents) in &archive.files {
        let target_path = target.join(file_path);
        if let Some(parent) = target_path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        fs::write(&target_path, contents)
            .await
            .with_context(|| format!("Failed to write file: {}", target_path.display()))?;
    }

    tracing::info!(package = name, files = archive.files.len(), "package installed");
    Ok(InstalledPackage {
        name: name.to_string(),
        path: target,
        manifest: archive.manifest.clone(),
    })
}

/// List packages found under `packages_dir`, sorted by name.
pub fn installed_packages(packages_dir: &Path) -> Result<Vec<InstalledPackage>> {
    if !packages_dir.exists() {
        return Ok(Vec::new());
    }

    let mut packages = Vec::new();
    for entry in WalkDir::new(packages_dir)
        .min_depth(2)
        .max_depth(2)
        .sort_by_file_name()
    {
        let entry = entry.with_context(|| format!("Failed to scan {}", packages_dir.display()))?;
        if !entry.file_type().is_file() || entry.file_name() != PackageManifest::FILE_NAME {
            continue;
        }
        let Some(package_dir) = entry.path().parent() else {
            continue;
        };
        let content = std::fs::read_to_string(entry.path())
            .with_context(|| format!("Failed to read {}", entry.path().display()))?;
        let manifest: PackageManifest = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", entry.path().display()))?;
        let name = package_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| manifest.name.clone());
        manifest.ensure_contained(&name)?;

        packages.push(InstalledPackage {
            name,
            path: package_dir.to_path_buf(),
            manifest,
        });
    }
    Ok(packages)
}

/// Add the profiles of every installed package to `config`.
///
/// Each profile gets a `package` variable naming the package it came from
/// unless it sets one itself.
pub fn register_installed(
    config: &mut ScaffoldConfig,
    packages_dir: &Path,
) -> Result<Vec<InstalledPackage>> {
    let packages = installed_packages(packages_dir)?;
    for package in &packages {
        let profiles = package.manifest.profiles.iter().cloned().map(|mut profile| {
            profile
                .variables
                .entry(PACKAGE_VARIABLE)
                .or_insert_with(|| Value::String(package.name.clone()));
            profile
        });
        config.add_profiles(&package.name, profiles);
    }
    Ok(packages)
}

/// Find an installed package by name.
pub fn find_installed(packages_dir: &Path, name: &str) -> Result<Option<InstalledPackage>> {
    ensure_package_name(name)?;
    let dir = packages_dir.join(name);
    if !dir.join(PackageManifest::FILE_NAME).exists() {
        return Ok(None);
    }
    Ok(installed_packages(packages_dir)?
        .into_iter()
        .find(|package| package.name == name))
}
