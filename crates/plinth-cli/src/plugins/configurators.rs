//! Built-in configurators

use plinth_core::expr::slugify;
use plinth_core::registry::version::parse_version;
use plinth_core::{Configurator, Plugin, Question, QuestionFlow, Result};
use serde_json::{json, Map, Value};

pub const LICENSES: [&str; 4] = ["MIT", "Apache-2.0", "BSD-3-Clause", "None"];

/// Project identity: name, description, author.
pub struct ProjectConfigurator;

impl Plugin for ProjectConfigurator {
    fn id(&self) -> &str {
        "project"
    }
}

impl Configurator for ProjectConfigurator {
    fn configure(&self, flow: &mut QuestionFlow<'_>) -> Result<()> {
        flow.communicate(
            Some("name"),
            Question::text("Project name")
                .with_default(json!("@variables.directory"))
                .with_validator(|value| {
                    let name = value.as_str().map(str::trim).unwrap_or_default();
                    if name.is_empty() {
                        Err("the project name cannot be empty".to_string())
                    } else if name.contains(['/', '\\']) {
                        Err("the project name cannot contain path separators".to_string())
                    } else {
                        Ok(Value::String(name.to_string()))
                    }
                }),
        )?;
        flow.communicate(
            Some("description"),
            Question::text("Description").optional(),
        )?;
        flow.communicate(
            Some("author"),
            Question::text("Author")
                .with_default(json!("@variables.author"))
                .optional(),
        )?;
        Ok(())
    }

    fn finalize(&self, answers: &mut Map<String, Value>) -> Result<()> {
        let slug = answers
            .get("name")
            .and_then(Value::as_str)
            .map(slugify)
            .unwrap_or_default();
        answers.entry("slug").or_insert(Value::String(slug));
        Ok(())
    }
}

/// License choice and copyright holder.
pub struct LicenseConfigurator;

impl Plugin for LicenseConfigurator {
    fn id(&self) -> &str {
        "license"
    }

    fn dependencies(&self) -> Option<Vec<String>> {
        Some(vec!["project".to_string()])
    }
}

impl Configurator for LicenseConfigurator {
    fn configure(&self, flow: &mut QuestionFlow<'_>) -> Result<()> {
        let license = flow.communicate(
            Some("license"),
            Question::choice("License", LICENSES).with_default(json!("MIT")),
        )?;
        if license != json!("None") {
            flow.communicate(
                Some("copyright_holder"),
                Question::text("Copyright holder")
                    .with_default(json!("@answers.author ? answers.author : answers.name")),
            )?;
        }
        Ok(())
    }
}

/// Version control setup. Runs after plain configurators.
pub struct VcsConfigurator;

impl Plugin for VcsConfigurator {
    fn id(&self) -> &str {
        "vcs"
    }

    fn priority(&self) -> Option<i32> {
        Some(5)
    }
}

impl Configurator for VcsConfigurator {
    fn configure(&self, flow: &mut QuestionFlow<'_>) -> Result<()> {
        let vcs = flow.communicate(
            Some("vcs"),
            Question::choice("Version control", ["git", "none"]).with_default(json!("git")),
        )?;
        if vcs == json!("git") {
            flow.communicate(
                Some("initial_branch"),
                Question::text("Initial branch")
                    .with_default(json!("main"))
                    .optional(),
            )?;
        }
        Ok(())
    }
}

/// Package metadata used by installed package templates.
pub struct PackageConfigurator;

impl Plugin for PackageConfigurator {
    fn id(&self) -> &str {
        "package"
    }

    fn dependencies(&self) -> Option<Vec<String>> {
        Some(vec!["project".to_string()])
    }
}

impl Configurator for PackageConfigurator {
    fn configure(&self, flow: &mut QuestionFlow<'_>) -> Result<()> {
        flow.communicate(
            Some("package_name"),
            Question::text("Package name")
                .with_default(json!("@slug(answers.name)"))
                .with_normalizer(|value| match value.as_str() {
                    Some(text) => Value::String(slugify(text)),
                    None => value,
                }),
        )?;
        flow.communicate(
            Some("version"),
            Question::text("Initial version")
                .with_default(json!("0.1.0"))
                .with_validator(|value| {
                    let text = value.as_str().unwrap_or_default();
                    parse_version(text)
                        .map(|v| Value::String(v.to_string()))
                        .map_err(|e| e.to_string())
                }),
        )?;
        Ok(())
    }
}
