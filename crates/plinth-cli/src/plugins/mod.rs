//! Built-in plugins and the factory that instantiates them by id

pub mod configurators;
pub mod generators;

use configurators::{
    LicenseConfigurator, PackageConfigurator, ProjectConfigurator, VcsConfigurator,
};
use generators::{
    AnswersFileGenerator, GitignoreGenerator, LicenseFileGenerator, PackageFilesGenerator,
    ReadmeGenerator,
};
use plinth_core::{Configurator, Generator, PluginFactory, Result, ScaffoldError};
use std::path::PathBuf;

pub const CONFIGURATORS: [&str; 4] = ["project", "license", "vcs", "package"];
pub const GENERATORS: [&str; 5] = [
    "readme",
    "license-file",
    "gitignore",
    "answers-file",
    "package-files",
];

/// Creates the built-in configurators and generators
#[derive(Debug, Clone)]
pub struct Builtins {
    packages_dir: PathBuf,
}

impl Builtins {
    pub fn new(packages_dir: PathBuf) -> Self {
        Self { packages_dir }
    }
}

impl PluginFactory<dyn Configurator> for Builtins {
    fn create(&self, id: &str) -> Result<Box<dyn Configurator>> {
        Ok(match id {
            "project" => Box::new(ProjectConfigurator),
            "license" => Box::new(LicenseConfigurator),
            "vcs" => Box::new(VcsConfigurator),
            "package" => Box::new(PackageConfigurator),
            other => return Err(ScaffoldError::UnknownPlugin(other.to_string())),
        })
    }
}

impl PluginFactory<dyn Generator> for Builtins {
    fn create(&self, id: &str) -> Result<Box<dyn Generator>> {
        Ok(match id {
            "readme" => Box::new(ReadmeGenerator),
            "license-file" => Box::new(LicenseFileGenerator),
            "gitignore" => Box::new(GitignoreGenerator),
            "answers-file" => Box::new(AnswersFileGenerator),
            "package-files" => Box::new(PackageFilesGenerator {
                packages_dir: self.packages_dir.clone(),
            }),
            other => return Err(ScaffoldError::UnknownPlugin(other.to_string())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plinth_core::{Plugin, Profile, ProfileMerger};

    #[test]
    fn test_every_builtin_has_matching_id() {
        let builtins = Builtins::new(PathBuf::from("/nonexistent"));
        for id in CONFIGURATORS {
            let plugin = PluginFactory::<dyn Configurator>::create(&builtins, id).unwrap();
            assert_eq!(plugin.id(), id);
        }
        for id in GENERATORS {
            let plugin = PluginFactory::<dyn Generator>::create(&builtins, id).unwrap();
            assert_eq!(plugin.id(), id);
        }
    }

    #[test]
    fn test_unknown_plugin() {
        let builtins = Builtins::new(PathBuf::from("/nonexistent"));
        let Err(err) = PluginFactory::<dyn Generator>::create(&builtins, "nope") else {
            panic!("unknown generator was created");
        };
        assert!(matches!(err, ScaffoldError::UnknownPlugin(ref id) if id == "nope"));
        let Err(err) = PluginFactory::<dyn Configurator>::create(&builtins, "nope") else {
            panic!("unknown configurator was created");
        };
        assert!(matches!(err, ScaffoldError::UnknownPlugin(ref id) if id == "nope"));
    }

    #[test]
    fn test_builtin_ordering() {
        let mut profile = Profile::new("full");
        profile.generators = vec![
            "answers-file".into(),
            "license-file".into(),
            "gitignore".into(),
            "readme".into(),
        ];
        let profiles = [profile];
        let builtins = Builtins::new(PathBuf::from("/nonexistent"));

        let resolved = ProfileMerger::new(&profiles)
            .resolve("full", &builtins, &builtins)
            .unwrap();

        let generators: Vec<_> = resolved.generators.iter().map(|g| g.id()).collect();
        assert_eq!(
            generators,
            vec!["license-file", "gitignore", "readme", "answers-file"]
        );
        // dependents run after every prioritized configurator
        let configurators: Vec<_> = resolved.configurators.iter().map(|c| c.id()).collect();
        assert_eq!(configurators, vec!["project", "vcs", "license"]);
    }
}
