//! Subcommand implementations

use crate::plugins::Builtins;
use crate::{InstallArgs, NewArgs, CLI_VERSION};
use anyhow::{Context, Result};
use colored::Colorize;
use plinth_core::config::DEFAULT_PROFILE;
use plinth_core::expr::BasicEvaluator;
use plinth_core::registry::{self, PackageFetcher};
use plinth_core::tui::{select_directory, select_profile};
use plinth_core::{
    AnswersCommunicator, Communicator, DefaultsCommunicator, InteractiveCommunicator,
    PrefilledCommunicator, ProductConfig, ProjectRunner, RecoveryCache, ScaffoldConfig,
};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Load the project configuration and the profiles of installed packages.
///
/// An explicitly given file must exist; the default location falls back to
/// the built-in profile.
pub fn load_config<C: ProductConfig>(product: &C, path: Option<&Path>) -> Result<ScaffoldConfig> {
    let mut config = match path {
        Some(path) => ScaffoldConfig::load(path)?,
        None => ScaffoldConfig::load_or_builtin(Path::new(product.config_file()))?,
    };
    registry::register_installed(&mut config, &product.packages_dir())?;
    Ok(config)
}

/// Variables every built-in configurator may refer to.
fn seed_variables(config: &mut ScaffoldConfig, directory: &Path) {
    let name = directory
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".to_string());
    config
        .variables
        .entry("directory")
        .or_insert(Value::String(name));
    config.variables.entry("author").or_insert(Value::Null);
}

/// Parse `KEY=VALUE` overrides; values that are not valid JSON are strings.
pub fn parse_overrides(pairs: &[String]) -> Result<Map<String, Value>> {
    let mut overrides = Map::new();
    for pair in pairs {
        let (key, raw) = pair
            .split_once('=')
            .with_context(|| format!("Expected KEY=VALUE, got '{}'", pair))?;
        let value =
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        overrides.insert(key.trim().to_string(), value);
    }
    Ok(overrides)
}

/// Create a new project interactively or from defaults/answers.
pub fn new_project<C: ProductConfig>(
    product: &C,
    config_path: Option<&Path>,
    args: NewArgs,
) -> Result<()> {
    cliclack::intro(product.display_name())?;

    let mut config = load_config(product, config_path)?;
    let unattended = args.yes || args.answers.is_some();
    let directory = select_directory(args.directory.as_deref(), unattended)?;
    let cache_path = RecoveryCache::path_in(&directory);

    let cache = if args.resume {
        let cache = RecoveryCache::load(&cache_path)?
            .with_context(|| format!("No interrupted run found in {}", directory.display()))?;
        cliclack::log::info(format!(
            "Resuming profile '{}' with {} saved answer(s)",
            cache.profile,
            cache.answers.len()
        ))?;
        Some(cache)
    } else {
        None
    };

    let profile_name = match (&cache, args.profile) {
        (Some(cache), _) => cache.profile.clone(),
        (None, Some(name)) => name,
        (None, None) if unattended => {
            if config.profile(DEFAULT_PROFILE).is_none() {
                anyhow::bail!("No '{}' profile configured; pass a profile name.", DEFAULT_PROFILE);
            }
            DEFAULT_PROFILE.to_string()
        }
        (None, None) => select_profile(&config.profiles, None)?,
    };
    let overrides = match &cache {
        Some(cache) => cache.defaults.clone(),
        None => parse_overrides(&args.set)?,
    };
    let skip_optional = cache
        .as_ref()
        .map_or(args.skip_optional || args.yes, |cache| cache.skip_optional);

    seed_variables(&mut config, &directory);
    let builtins = Builtins::new(product.packages_dir());
    let mut profile = config
        .merger()
        .resolve(&profile_name, &builtins, &builtins)?;
    profile.defaults.extend(overrides.clone());
    tracing::info!(profile = ?profile, "profile resolved");

    let base: Box<dyn Communicator> = match &args.answers {
        Some(path) => Box::new(AnswersCommunicator::from_path(path)?),
        None if args.yes => Box::new(DefaultsCommunicator),
        None => Box::new(InteractiveCommunicator::new()),
    };
    let replay = cache.map(|cache| cache.answers).unwrap_or_default();
    let mut communicator = PrefilledCommunicator::new(replay, base);

    let runner = ProjectRunner::new(&profile, &BasicEvaluator);
    let collected = match runner.collect(&mut communicator, skip_optional) {
        Ok(collected) => collected,
        Err(interrupted) => {
            std::fs::create_dir_all(&directory)
                .with_context(|| format!("Failed to create directory: {}", directory.display()))?;
            RecoveryCache {
                profile: profile_name,
                defaults: overrides,
                skip_optional,
                answers: interrupted.answers.clone(),
            }
            .save(&cache_path)?;
            cliclack::log::error(interrupted.source.to_string())?;
            cliclack::log::warning(format!(
                "Answers saved to {}; rerun with --resume to continue",
                cache_path.display()
            ))?;
            return Err(interrupted.into());
        }
    };

    let spinner = cliclack::spinner();
    spinner.start("Generating project...");
    std::fs::create_dir_all(&directory)
        .with_context(|| format!("Failed to create directory: {}", directory.display()))?;
    let files = match runner.generate(&collected, &directory) {
        Ok(files) => files,
        Err(e) => {
            spinner.stop("Generation failed");
            return Err(e);
        }
    };
    RecoveryCache::clear(&cache_path)?;
    spinner.stop(format!(
        "Created {} files in {}",
        files.len(),
        directory.display()
    ));

    for file in &files {
        let shown = file.strip_prefix(&directory).unwrap_or(file);
        println!("  {} {}", "+".green(), shown.display());
    }
    cliclack::outro("Happy coding!")?;
    Ok(())
}

/// Print a profile's plugin order and its answers when every question takes its default.
pub fn show_profile<C: ProductConfig>(
    product: &C,
    config_path: Option<&Path>,
    name: &str,
) -> Result<()> {
    let mut config = load_config(product, config_path)?;
    let current_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    seed_variables(&mut config, &current_dir);

    let builtins = Builtins::new(product.packages_dir());
    let profile = config.merger().resolve(name, &builtins, &builtins)?;

    let configurators: Vec<_> = profile.configurators.iter().map(|c| c.id()).collect();
    let generators: Vec<_> = profile.generators.iter().map(|g| g.id()).collect();
    println!("{}", format!("Profile {}", name).cyan().bold());
    println!("  {} {}", "configurators:".blue(), configurators.join(" -> "));
    println!("  {} {}", "generators:".blue(), generators.join(" -> "));
    println!();

    let runner = ProjectRunner::new(&profile, &BasicEvaluator);
    let collected = runner.collect(&mut DefaultsCommunicator, true)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&Value::Object(collected.answers))?
    );
    Ok(())
}

pub fn list_profiles<C: ProductConfig>(product: &C, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(product, config_path)?;
    if config.profiles.is_empty() {
        println!("{}", "No profiles configured.".yellow());
        return Ok(());
    }

    println!("{}", "Available profiles".cyan().bold());
    println!();
    for profile in &config.profiles {
        let mut line = format!("  {}", profile.name.green().bold());
        if let Some(description) = &profile.description {
            line.push_str(&format!("  {}", description));
        }
        if !profile.imports.is_empty() {
            line.push_str(&format!(
                "  {}",
                format!("(imports {})", profile.imports.join(", ")).dimmed()
            ));
        }
        println!("{}", line);
    }
    Ok(())
}

/// Install a package from the remote registry or a local registry directory.
pub async fn install<C: ProductConfig>(
    product: &C,
    config_path: Option<&Path>,
    args: InstallArgs,
) -> Result<()> {
    cliclack::intro(product.display_name())?;

    let mut fetcher = match args.registry_dir {
        Some(dir) => {
            cliclack::log::info(format!("Using local registry from {}", dir.display()))?;
            PackageFetcher::from_local(dir, product.user_agent())
        }
        None => {
            let config = match config_path {
                Some(path) => ScaffoldConfig::load(path)?,
                None => ScaffoldConfig::load_or_builtin(Path::new(product.config_file()))?,
            };
            cliclack::log::info("Using remote registry")?;
            PackageFetcher::from_config(product, config.registry.as_deref())?
        }
    };

    let spinner = cliclack::spinner();
    spinner.start("Loading registry...");
    let manifest = fetcher.fetch_registry_manifest().await?;
    if !manifest.contains(&args.package) {
        spinner.stop("Failed to load registry");
        anyhow::bail!(
            "Package '{}' not found. Available packages: {}",
            args.package,
            manifest.packages.join(", ")
        );
    }
    spinner.stop("Registry loaded");

    let spinner = cliclack::spinner();
    spinner.start(format!("Installing {}...", args.package));
    let installed =
        registry::install_package(&mut fetcher, &args.package, &product.packages_dir()).await?;
    spinner.stop(format!(
        "Installed {} {} into {}",
        installed.name,
        installed.manifest.version,
        installed.path.display()
    ));

    if let Some(warning) = registry::check_compatibility(
        CLI_VERSION,
        &installed.manifest,
        product.upgrade_command(),
    ) {
        cliclack::log::warning(warning)?;
    }

    let profiles: Vec<_> = installed
        .manifest
        .profiles
        .iter()
        .map(|p| p.name.as_str())
        .collect();
    if profiles.is_empty() {
        cliclack::log::info("The package provides no profiles")?;
    } else {
        cliclack::log::success(format!("Profiles available: {}", profiles.join(", ")))?;
    }
    cliclack::outro("Done")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Clone)]
    struct TestProduct {
        packages_dir: PathBuf,
    }

    impl ProductConfig for TestProduct {
        fn name(&self) -> &'static str {
            "plinth-test"
        }
        fn display_name(&self) -> &'static str {
            "plinth test"
        }
        fn default_registry_url(&self) -> &'static str {
            "https://example.com/registry"
        }
        fn registry_url_env(&self) -> &'static str {
            "PLINTH_TEST_REGISTRY_URL"
        }
        fn packages_dir(&self) -> PathBuf {
            self.packages_dir.clone()
        }
        fn upgrade_command(&self) -> &'static str {
            "cargo install plinth-cli --force"
        }
    }

    #[test]
    fn test_parse_overrides() {
        let overrides = parse_overrides(&[
            "license=None".to_string(),
            "public=true".to_string(),
            "tags=[\"a\"]".to_string(),
            "note=a=b".to_string(),
        ])
        .unwrap();
        assert_eq!(
            Value::Object(overrides),
            json!({"license": "None", "public": true, "tags": ["a"], "note": "a=b"})
        );
        assert!(parse_overrides(&["novalue".to_string()]).is_err());
    }

    #[test]
    fn test_seed_variables_keeps_configured_values() {
        let mut config = ScaffoldConfig::builtin();
        config.variables.insert("author".into(), json!("Sam"));
        seed_variables(&mut config, Path::new("/work/my-app"));
        assert_eq!(config.variables["directory"], json!("my-app"));
        assert_eq!(config.variables["author"], json!("Sam"));
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let product = TestProduct {
            packages_dir: dir.path().join("packages"),
        };
        assert!(load_config(&product, Some(&dir.path().join("missing.yaml"))).is_err());

        let path = dir.path().join("plinth.yaml");
        std::fs::write(&path, "profiles:\n  - name: only\n").unwrap();
        let config = load_config(&product, Some(&path)).unwrap();
        assert_eq!(config.profiles.len(), 1);
    }
}
