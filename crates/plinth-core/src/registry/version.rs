//! Version checks between the CLI and installed packages

use super::manifest::PackageManifest;
use anyhow::Result;
use semver::Version;

/// Warn when the running CLI is older than a package requires.
///
/// Versions that cannot be parsed are not compared.
pub fn check_compatibility(
    cli_version: &str,
    package: &PackageManifest,
    upgrade_command: &str,
) -> Option<String> {
    let required = package.min_cli_version.as_deref()?;
    let cli = parse_version(cli_version).ok()?;
    let minimum = parse_version(required).ok()?;

    (cli < minimum).then(|| {
        format!(
            "Package '{}' needs CLI version {} or newer; you are running {}.\n\
             Consider updating: {}",
            package.name, required, cli_version, upgrade_command
        )
    })
}

/// Parse a version, accepting a leading `v`
pub fn parse_version(version_str: &str) -> Result<Version> {
    let cleaned = version_str.strip_prefix('v').unwrap_or(version_str);
    Version::parse(cleaned).map_err(|e| anyhow::anyhow!("Invalid version '{}': {}", version_str, e))
}
