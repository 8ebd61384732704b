//! Package fetching from a remote registry or a local registry directory
//!
//! Both sources go through zip archives:
//! - Remote: downloads the pre-built `<package>.zip` next to `registry.yaml`
//! - Local: builds the zip from the package folder on the fly
//!
//! so that installing from a checkout behaves exactly like installing from
//! the published registry.

use super::manifest::{
    ensure_package_name, is_contained, PackageManifest, RegistryManifest, SharedFile,
};
use crate::product::ProductConfig;
use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use url::Url;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

/// Where packages come from
#[derive(Debug, Clone, PartialEq)]
pub enum RegistrySource {
    Remote(Url),
    Local(PathBuf),
}

impl RegistrySource {
    /// Pick the registry URL: environment override, then the configured
    /// URL, then the product default.
    pub fn resolve<C: ProductConfig>(config: &C, configured: Option<&str>) -> Result<Self> {
        let url_str = std::env::var(config.registry_url_env())
            .ok()
            .or_else(|| configured.map(str::to_string))
            .unwrap_or_else(|| config.default_registry_url().to_string());
        let url =
            Url::parse(&url_str).with_context(|| format!("Invalid registry URL: {}", url_str))?;
        Ok(Self::Remote(url))
    }

    pub fn local(path: PathBuf) -> Self {
        Self::Local(path)
    }
}

/// A package extracted from its zip
#[derive(Debug, Clone)]
pub struct PackageArchive {
    pub manifest: PackageManifest,
    /// Relative path -> contents, including `package.yaml`
    pub files: BTreeMap<String, Vec<u8>>,
}

/// Retrieves packages and keeps the extracted archives in memory
pub struct PackageFetcher {
    source: RegistrySource,
    client: reqwest::Client,
    cache: HashMap<String, PackageArchive>,
}

impl PackageFetcher {
    pub fn new(source: RegistrySource, user_agent: &str) -> Self {
        Self {
            source,
            client: reqwest::Client::builder()
                .user_agent(user_agent)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            cache: HashMap::new(),
        }
    }

    /// Fetcher for the product's remote registry
    pub fn from_config<C: ProductConfig>(config: &C, configured: Option<&str>) -> Result<Self> {
        let source = RegistrySource::resolve(config, configured)?;
        Ok(Self::new(source, config.user_agent()))
    }

    pub fn from_local(path: PathBuf, user_agent: &str) -> Self {
        Self::new(RegistrySource::local(path), user_agent)
    }

    pub fn source(&self) -> &RegistrySource {
        &self.source
    }

    /// Append a path segment, preserving query parameters
    fn build_url(base: &Url, path_segment: &str) -> Result<Url> {
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("URL cannot have path segments: {}", base))?
            .pop_if_empty()
            .push(path_segment);
        Ok(url)
    }

    async fn get(&self, url: Url, what: &str) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("Failed to fetch {} from {}", what, url))?;

        if !response.status().is_success() {
            anyhow::bail!(
                "Failed to fetch {} from {}: HTTP {}",
                what,
                url,
                response.status()
            );
        }
        Ok(response)
    }

    /// Fetch `registry.yaml`
    pub async fn fetch_registry_manifest(&self) -> Result<RegistryManifest> {
        match &self.source {
            RegistrySource::Remote(base_url) => {
                let url = Self::build_url(base_url, RegistryManifest::FILE_NAME)?;
                let content = self.get(url, "registry manifest").await?.text().await?;
                serde_yaml::from_str(&content).context("Failed to parse registry manifest")
            }
            RegistrySource::Local(path) => read_registry_manifest(path),
        }
    }

    /// Download or build a package and return its extracted archive.
    pub async fn fetch_package(&mut self, name: &str) -> Result<&PackageArchive> {
        ensure_package_name(name)?;
        if !self.cache.contains_key(name) {
            let zip_bytes = match &self.source {
                RegistrySource::Remote(base_url) => {
                    let url = Self::build_url(base_url, &format!("{}.zip", name))?;
                    tracing::debug!(package = name, %url, "downloading package");
                    self.get(url, &format!("package '{}'", name))
                        .await?
                        .bytes()
                        .await?
                        .to_vec()
                }
                RegistrySource::Local(path) => {
                    let registry = read_registry_manifest(path)?;
                    tracing::debug!(package = name, dir = %path.display(), "building local package");
                    Self::build_local_zip(path, name, &registry.shared_files)?
                }
            };
            let archive = Self::extract_zip(&zip_bytes, name)?;
            self.cache.insert(name.to_string(), archive);
        }

        self.cache
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("Package '{}' not found in cache", name))
    }

    /// Zip a local package folder, listing shared files in its manifest.
    pub fn build_local_zip(
        registry_dir: &Path,
        package_name: &str,
        shared_files: &[SharedFile],
    ) -> Result<Vec<u8>> {
        let package_path = registry_dir.join(package_name);
        let manifest_path = package_path.join(PackageManifest::FILE_NAME);

        let manifest_content = std::fs::read_to_string(&manifest_path)
            .with_context(|| format!("Failed to read {}", manifest_path.display()))?;
        let mut manifest: PackageManifest = serde_yaml::from_str(&manifest_content)
            .with_context(|| format!("Failed to parse package '{}' manifest", package_name))?;

        manifest.ensure_contained(package_name)?;

        let own_files = manifest.files.clone();
        for shared in shared_files {
            let dest = shared.destination().to_string();
            if !manifest.files.contains(&dest) {
                manifest.files.push(dest);
            }
        }
        let manifest_content =
            serde_yaml::to_string(&manifest).context("Failed to serialize package manifest")?;

        let mut zip_buffer = Vec::new();
        {
            let mut zip = ZipWriter::new(Cursor::new(&mut zip_buffer));
            let options =
                SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

            let entry = format!("{}/{}", package_name, PackageManifest::FILE_NAME);
            zip.start_file(&entry, options)?;
            zip.write_all(manifest_content.as_bytes())?;

            for shared in shared_files {
                let source_path = registry_dir.join(&shared.source);
                if !source_path.exists() {
                    tracing::warn!(
                        file = %shared.source,
                        registry = %registry_dir.display(),
                        "shared file not found"
                    );
                    continue;
                }
                let content = std::fs::read(&source_path).with_context(|| {
                    format!("Failed to read shared file {}", source_path.display())
                })?;
                let entry = format!("{}/{}", package_name, shared.destination());
                zip.start_file(&entry, options)?;
                zip.write_all(&content)?;
            }

            let shared_dests: std::collections::HashSet<_> =
                shared_files.iter().map(|s| s.destination()).collect();
            for file_path in own_files
                .iter()
                .filter(|f| !shared_dests.contains(f.as_str()))
            {
                let full_path = package_path.join(file_path);
                if !full_path.exists() {
                    tracing::warn!(
                        file = %full_path.display(),
                        manifest = %manifest_path.display(),
                        "listed file not found"
                    );
                    continue;
                }
                let content = std::fs::read(&full_path)
                    .with_context(|| format!("Failed to read {}", full_path.display()))?;
                let entry = format!("{}/{}", package_name, file_path);
                zip.start_file(&entry, options)?;
                zip.write_all(&content)?;
            }

            zip.finish()?;
        }

        Ok(zip_buffer)
    }

    /// Unpack a package zip, stripping the `<package>/` prefix.
    fn extract_zip(zip_bytes: &[u8], package_name: &str) -> Result<PackageArchive> {
        let mut archive = ZipArchive::new(Cursor::new(zip_bytes))
            .with_context(|| format!("Failed to read zip archive for package '{}'", package_name))?;

        let prefix = format!("{}/", package_name);
        let mut files = BTreeMap::new();
        let mut manifest: Option<PackageManifest> = None;

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }

            let full_path = file.name().to_string();
            let relative_path = full_path
                .strip_prefix(&prefix)
                .unwrap_or(full_path.as_str())
                .to_string();
            if !is_contained(&relative_path) {
                anyhow::bail!(
                    "Package '{}' contains an unsafe path: {}",
                    package_name,
                    full_path
                );
            }

            let mut contents = Vec::new();
            file.read_to_end(&mut contents)?;

            if relative_path == PackageManifest::FILE_NAME {
                let text = String::from_utf8_lossy(&contents);
                manifest = Some(serde_yaml::from_str(&text).with_context(|| {
                    format!("Failed to parse package '{}' manifest", package_name)
                })?);
            }
            files.insert(relative_path, contents);
        }

        let manifest = manifest.ok_or_else(|| {
            anyhow::anyhow!(
                "Package '{}' zip missing {}",
                package_name,
                PackageManifest::FILE_NAME
            )
        })?;
        manifest.ensure_contained(package_name)?;
        Ok(PackageArchive { manifest, files })
    }
}

/// Read `registry.yaml` from a local registry directory
pub fn read_registry_manifest(dir: &Path) -> Result<RegistryManifest> {
    let manifest_path = dir.join(RegistryManifest::FILE_NAME);
    let content = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("Failed to read {}", manifest_path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", manifest_path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::fixtures::sample_registry;

    #[test]
    fn test_build_url_keeps_query() {
        let base = Url::parse("https://example.com/registry/?ref=main").unwrap();
        let url = PackageFetcher::build_url(&base, "starter.zip").unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.com/registry/starter.zip?ref=main"
        );
    }

    #[test]
    fn test_local_zip_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        sample_registry(dir.path());

        let registry = read_registry_manifest(dir.path()).unwrap();
        let bytes =
            PackageFetcher::build_local_zip(dir.path(), "starter", &registry.shared_files).unwrap();
        let archive = PackageFetcher::extract_zip(&bytes, "starter").unwrap();

        assert_eq!(
            archive.files.keys().map(String::as_str).collect::<Vec<_>>(),
            vec![".gitignore", "package.yaml", "src/main.rs"]
        );
        assert!(archive.manifest.files.contains(&".gitignore".to_string()));
        assert_eq!(archive.manifest.profiles[0].name, "starter");
    }

    #[test]
    fn test_rejects_escaping_files() {
        let dir = tempfile::tempdir().unwrap();
        let pkg = dir.path().join("evil");
        std::fs::create_dir_all(&pkg).unwrap();
        std::fs::write(
            pkg.join("package.yaml"),
            "name: evil\nversion: 0.1.0\nfiles: [../secret]\n",
        )
        .unwrap();

        let err = PackageFetcher::build_local_zip(dir.path(), "evil", &[]).unwrap_err();
        assert!(err.to_string().contains("../secret"));
    }

    fn zip_of(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut buffer = Vec::new();
        {
            let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
            for (name, content) in entries {
                zip.start_file(*name, SimpleFileOptions::default()).unwrap();
                zip.write_all(content.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buffer
    }

    #[test]
    fn test_extract_rejects_manifest_listing_escaping_files() {
        let bytes = zip_of(&[(
            "evil/package.yaml",
            "name: evil\nversion: 0.1.0\nfiles: [../evil/payload.txt]\n",
        )]);
        let err = PackageFetcher::extract_zip(&bytes, "evil").unwrap_err();
        assert!(err.to_string().contains("../evil/payload.txt"));
    }

    #[tokio::test]
    async fn test_fetch_rejects_path_like_names() {
        let dir = tempfile::tempdir().unwrap();
        sample_registry(dir.path());
        let mut fetcher = PackageFetcher::from_local(dir.path().to_path_buf(), "plinth-test");
        let err = fetcher.fetch_package("..").await.unwrap_err();
        assert!(err.to_string().contains("Invalid package name"));
    }

    #[tokio::test]
    async fn test_fetch_local_package_is_cached() {
        let dir = tempfile::tempdir().unwrap();
        sample_registry(dir.path());

        let mut fetcher = PackageFetcher::from_local(dir.path().to_path_buf(), "plinth-test");
        assert!(fetcher.fetch_registry_manifest().await.unwrap().contains("starter"));

        let files = fetcher.fetch_package("starter").await.unwrap().files.len();
        std::fs::remove_dir_all(dir.path().join("starter")).unwrap();
        assert_eq!(fetcher.fetch_package("starter").await.unwrap().files.len(), files);
    }
}
