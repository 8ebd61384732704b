//! Product configuration trait for CLI binaries
//!
//! A binary built on plinth-core implements this trait to tell the library
//! where its package registry lives and where installed packages go.

use std::path::PathBuf;

/// Configuration trait for a scaffolding binary
///
/// Each binary implements this trait to define:
/// - Product identity (name, display name)
/// - Package registry location and its environment override
/// - Where installed packages and the project config live
pub trait ProductConfig: Clone + Send + Sync + 'static {
    /// Internal product name (used for CLI command, env vars)
    fn name(&self) -> &'static str;

    /// Human-readable display name
    fn display_name(&self) -> &'static str;

    /// Default URL of the package registry
    fn default_registry_url(&self) -> &'static str;

    /// Environment variable name for overriding the registry URL
    fn registry_url_env(&self) -> &'static str;

    /// Project configuration file looked up in the working directory
    fn config_file(&self) -> &'static str {
        crate::config::ScaffoldConfig::FILE_NAME
    }

    /// Directory that installed packages are written into
    fn packages_dir(&self) -> PathBuf;

    /// Upgrade/install command shown in version warnings
    fn upgrade_command(&self) -> &'static str;

    /// User agent string for HTTP requests
    fn user_agent(&self) -> &'static str {
        self.name()
    }
}
