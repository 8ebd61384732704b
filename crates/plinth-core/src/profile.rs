//! Profiles: named, inheritable bundles of plugins, variables and defaults.

use crate::error::{Result, ScaffoldError};
use crate::ordering::DependencyOrderer;
use crate::plugin::{Configurator, Generator, PluginFactory};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A profile as declared in configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub generators: Vec<String>,

    #[serde(default)]
    pub configurators: Vec<String>,

    /// Profiles merged in before this one, in order
    #[serde(default)]
    pub imports: Vec<String>,

    #[serde(default)]
    pub variables: Map<String, Value>,

    /// Question name -> default override (literal or `@` expression)
    #[serde(default)]
    pub defaults: Map<String, Value>,
}

impl Profile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A profile with its imports flattened, still referring to plugins by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedProfile {
    pub name: String,
    pub generators: Vec<String>,
    pub configurators: Vec<String>,
    pub variables: Map<String, Value>,
    pub defaults: Map<String, Value>,
}

/// A merged profile with instantiated, ordered plugins.
pub struct ResolvedProfile {
    pub name: String,
    pub generators: Vec<Box<dyn Generator>>,
    pub configurators: Vec<Box<dyn Configurator>>,
    pub variables: Map<String, Value>,
    pub defaults: Map<String, Value>,
}

impl fmt::Debug for ResolvedProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedProfile")
            .field("name", &self.name)
            .field(
                "generators",
                &self.generators.iter().map(|g| g.id()).collect::<Vec<_>>(),
            )
            .field(
                "configurators",
                &self.configurators.iter().map(|c| c.id()).collect::<Vec<_>>(),
            )
            .field("variables", &self.variables)
            .field("defaults", &self.defaults)
            .finish()
    }
}

/// Flattens profiles and their imports.
///
/// Global variables and defaults seed every merge; imported profiles are
/// merged depth-first in declaration order, then the profile's own entries
/// override them.
pub struct ProfileMerger<'p> {
    profiles: &'p [Profile],
    variables: Map<String, Value>,
    defaults: Map<String, Value>,
}

impl<'p> ProfileMerger<'p> {
    pub fn new(profiles: &'p [Profile]) -> Self {
        Self {
            profiles,
            variables: Map::new(),
            defaults: Map::new(),
        }
    }

    pub fn with_variables(mut self, variables: Map<String, Value>) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_defaults(mut self, defaults: Map<String, Value>) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn profiles(&self) -> &'p [Profile] {
        self.profiles
    }

    pub fn get(&self, name: &str) -> Result<&'p Profile> {
        self.profiles
            .iter()
            .find(|profile| profile.name == name)
            .ok_or_else(|| ScaffoldError::UnregisteredProfile {
                name: name.to_string(),
            })
    }

    /// Flatten `name` and everything it imports.
    pub fn merge(&self, name: &str) -> Result<MergedProfile> {
        let profile = self.get(name)?;
        let mut merged = MergedProfile {
            name: name.to_string(),
            variables: self.variables.clone(),
            defaults: self.defaults.clone(),
            ..MergedProfile::default()
        };
        let mut loading = vec![name.to_string()];
        self.merge_into(profile, &mut merged, &mut loading)?;
        tracing::debug!(
            profile = name,
            generators = ?merged.generators,
            configurators = ?merged.configurators,
            "profile merged"
        );
        Ok(merged)
    }

    /// Merge `name` and instantiate its plugins in execution order.
    ///
    /// Configurators required by the resolved generators join the
    /// profile's own configurators before ordering.
    pub fn resolve(
        &self,
        name: &str,
        generator_factory: &dyn PluginFactory<dyn Generator>,
        configurator_factory: &dyn PluginFactory<dyn Configurator>,
    ) -> Result<ResolvedProfile> {
        let merged = self.merge(name)?;

        let mut generators = DependencyOrderer::new(generator_factory);
        for id in &merged.generators {
            generators.add_id(id)?;
        }
        let generators = generators.into_instances()?;

        let mut configurators = DependencyOrderer::new(configurator_factory);
        for id in &merged.configurators {
            configurators.add_id(id)?;
        }
        for generator in &generators {
            for id in generator.required_configurators() {
                configurators.add_id(&id)?;
            }
        }
        let configurators = configurators.into_instances()?;

        Ok(ResolvedProfile {
            name: merged.name,
            generators,
            configurators,
            variables: merged.variables,
            defaults: merged.defaults,
        })
    }

    fn merge_into(
        &self,
        profile: &Profile,
        merged: &mut MergedProfile,
        loading: &mut Vec<String>,
    ) -> Result<()> {
        for import in &profile.imports {
            if loading.contains(import) {
                let mut chain = loading.clone();
                chain.push(import.clone());
                return Err(ScaffoldError::AlreadyImporting { chain });
            }
            let imported = self.get(import)?;
            loading.push(import.clone());
            self.merge_into(imported, merged, loading)?;
            loading.pop();
        }

        extend_unique(&mut merged.generators, &profile.generators);
        extend_unique(&mut merged.configurators, &profile.configurators);
        for (key, value) in &profile.variables {
            merged.variables.insert(key.clone(), value.clone());
        }
        for (key, value) in &profile.defaults {
            merged.defaults.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}

fn extend_unique(target: &mut Vec<String>, items: &[String]) {
    for item in items {
        if !target.contains(item) {
            target.push(item.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::QuestionFlow;
    use crate::plugin::{GenerationContext, Plugin};
    use serde_json::json;
    use std::path::PathBuf;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn profile(name: &str, generators: &[&str], imports: &[&str]) -> Profile {
        Profile {
            generators: generators.iter().map(|s| s.to_string()).collect(),
            imports: imports.iter().map(|s| s.to_string()).collect(),
            ..Profile::new(name)
        }
    }

    #[test]
    fn test_own_defaults_override_imported_ones() {
        let mut first = profile("first", &[], &["second"]);
        first.defaults = object(json!({"last": "we", "name": "who"}));
        let mut second = profile("second", &[], &[]);
        second.defaults = object(json!({"name": "doc", "age": 999}));
        let profiles = vec![first, second];

        let merged = ProfileMerger::new(&profiles)
            .with_defaults(object(json!({"he": "you"})))
            .merge("first")
            .unwrap();

        assert_eq!(
            Value::Object(merged.defaults),
            json!({"name": "who", "last": "we", "age": 999, "he": "you"})
        );
    }

    #[test]
    fn test_imported_generators_come_first_without_duplicates() {
        let profiles = vec![
            profile("A", &["g1"], &["B"]),
            profile("B", &["g2", "g1"], &[]),
        ];
        let merged = ProfileMerger::new(&profiles).merge("A").unwrap();
        assert_eq!(merged.generators, vec!["g2", "g1"]);
    }

    #[test]
    fn test_import_cycle_reports_full_chain() {
        let profiles = vec![
            profile("A", &[], &["B"]),
            profile("B", &[], &["C"]),
            profile("C", &[], &["A"]),
        ];
        let err = ProfileMerger::new(&profiles).merge("A").unwrap_err();
        assert!(matches!(err, ScaffoldError::AlreadyImporting { .. }));
        assert_eq!(
            err.to_string(),
            r#"profile import cycle detected: "A" -> "B" -> "C" -> "A""#
        );
    }

    #[test]
    fn test_self_import_is_a_cycle() {
        let profiles = vec![profile("solo", &[], &["solo"])];
        let err = ProfileMerger::new(&profiles).merge("solo").unwrap_err();
        assert!(matches!(err, ScaffoldError::AlreadyImporting { ref chain } if chain.len() == 2));
    }

    #[test]
    fn test_diamond_imports_are_not_cycles() {
        let profiles = vec![
            profile("top", &["t"], &["left", "right"]),
            profile("left", &["l"], &["base"]),
            profile("right", &["r"], &["base"]),
            profile("base", &["b"], &[]),
        ];
        let merged = ProfileMerger::new(&profiles).merge("top").unwrap();
        assert_eq!(merged.generators, vec!["b", "l", "r", "t"]);
    }

    #[test]
    fn test_unknown_profiles() {
        let profiles = vec![profile("A", &[], &["ghost"])];
        let merger = ProfileMerger::new(&profiles);
        assert!(matches!(
            merger.merge("nope"),
            Err(ScaffoldError::UnregisteredProfile { ref name }) if name == "nope"
        ));
        assert!(matches!(
            merger.merge("A"),
            Err(ScaffoldError::UnregisteredProfile { ref name }) if name == "ghost"
        ));
    }

    #[test]
    fn test_variables_layer_over_globals() {
        let mut base = profile("base", &[], &[]);
        base.variables = object(json!({"org": "base-org", "ci": "github"}));
        let mut child = profile("child", &[], &["base"]);
        child.variables = object(json!({"org": "child-org"}));
        let profiles = vec![base, child];

        let merged = ProfileMerger::new(&profiles)
            .with_variables(object(json!({"org": "global", "year": 2024})))
            .merge("child")
            .unwrap();
        assert_eq!(
            Value::Object(merged.variables),
            json!({"org": "child-org", "year": 2024, "ci": "github"})
        );
    }

    struct Named(&'static str, Vec<String>);

    impl Plugin for Named {
        fn id(&self) -> &str {
            self.0
        }
    }

    impl Generator for Named {
        fn required_configurators(&self) -> Vec<String> {
            self.1.clone()
        }
        fn generate(&self, _ctx: &GenerationContext<'_>) -> anyhow::Result<Vec<PathBuf>> {
            Ok(Vec::new())
        }
    }

    impl Configurator for Named {
        fn configure(&self, _flow: &mut QuestionFlow<'_>) -> crate::Result<()> {
            Ok(())
        }
    }

    fn generators(id: &str) -> crate::Result<Box<dyn Generator>> {
        match id {
            "readme" => Ok(Box::new(Named("readme", vec!["project".into()]))),
            "license" => Ok(Box::new(Named("license", vec!["legal".into(), "project".into()]))),
            other => Err(ScaffoldError::UnknownPlugin(other.into())),
        }
    }

    fn configurators(id: &str) -> crate::Result<Box<dyn Configurator>> {
        match id {
            "project" => Ok(Box::new(Named("project", Vec::new()))),
            "legal" => Ok(Box::new(Named("legal", Vec::new()))),
            "extra" => Ok(Box::new(Named("extra", Vec::new()))),
            other => Err(ScaffoldError::UnknownPlugin(other.into())),
        }
    }

    #[test]
    fn test_resolve_seeds_configurators_from_generators() {
        let mut app = profile("app", &["readme", "license"], &[]);
        app.configurators = vec!["extra".into()];
        let profiles = vec![app];

        let resolved = ProfileMerger::new(&profiles)
            .resolve("app", &generators, &configurators)
            .unwrap();
        let generator_ids: Vec<_> = resolved.generators.iter().map(|g| g.id()).collect();
        let configurator_ids: Vec<_> = resolved.configurators.iter().map(|c| c.id()).collect();
        assert_eq!(generator_ids, vec!["readme", "license"]);
        assert_eq!(configurator_ids, vec!["extra", "project", "legal"]);
    }

    #[test]
    fn test_resolve_surfaces_unknown_plugins() {
        let profiles = vec![profile("app", &["nope"], &[])];
        let Err(err) = ProfileMerger::new(&profiles).resolve("app", &generators, &configurators)
        else {
            panic!("resolved a profile with an unknown plugin");
        };
        assert!(matches!(err, ScaffoldError::UnknownPlugin(ref id) if id == "nope"));
    }
}
