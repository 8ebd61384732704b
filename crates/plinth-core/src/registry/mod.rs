//! Package registry: fetching, installing and publishing packages
//!
//! This module provides:
//! - Registry and package manifest types (`registry.yaml`, `package.yaml`)
//! - Package fetching from a remote URL or a local registry directory
//! - Installation into the product's packages directory and discovery
//! - Version compatibility checking

pub mod fetcher;
pub mod installer;
pub mod manifest;
pub mod version;

use crate::product::ProductConfig;
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};

pub use fetcher::{read_registry_manifest, PackageArchive, PackageFetcher, RegistrySource};
pub use installer::{
    find_installed, install_package, installed_packages, register_installed, InstalledPackage,
    PACKAGE_VARIABLE,
};
pub use manifest::{PackageManifest, RegistryManifest, SharedFile};
pub use version::check_compatibility;

/// Build `<package>.zip` for every package of a local registry.
///
/// Returns the zip files written.
pub fn build_zips<C: ProductConfig>(config: &C, registry_dir: &Path) -> Result<Vec<PathBuf>> {
    if !registry_dir.exists() {
        anyhow::bail!("Registry directory not found: {}", registry_dir.display());
    }
    let registry = read_registry_manifest(registry_dir)?;

    println!(
        "{}",
        format!("Building {} package zips...", config.display_name())
            .cyan()
            .bold()
    );
    println!();

    let mut built = Vec::new();
    for package in &registry.packages {
        let package_path = registry_dir.join(package);
        if !package_path.exists() {
            eprintln!(
                "{} Package directory not found: {}",
                "Warning:".yellow(),
                package_path.display()
            );
            continue;
        }

        print!("  {} {}...", "->".blue(), package);

        match PackageFetcher::build_local_zip(registry_dir, package, &registry.shared_files) {
            Ok(zip_bytes) => {
                let zip_path = registry_dir.join(format!("{}.zip", package));
                std::fs::write(&zip_path, &zip_bytes)
                    .with_context(|| format!("Failed to write {}", zip_path.display()))?;
                println!(" {} ({} bytes)", "done".green(), zip_bytes.len());
                built.push(zip_path);
            }
            Err(e) => {
                println!(" {}", "failed".red());
                eprintln!("    Error: {:#}", e);
            }
        }
    }

    println!();
    println!(
        "{} {} package zip(s) in {}",
        "Built".green().bold(),
        built.len(),
        registry_dir.display()
    );

    Ok(built)
}
