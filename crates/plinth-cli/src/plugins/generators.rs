//! Built-in generators

use anyhow::{Context, Result};
use handlebars::{no_escape, Handlebars};
use plinth_core::registry::manifest::is_contained;
use plinth_core::registry::{find_installed, PACKAGE_VARIABLE};
use plinth_core::{GenerationContext, Generator, Plugin};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// File the answers-file generator writes
pub const ANSWERS_FILE: &str = ".plinth-answers.json";

fn write_file(ctx: &GenerationContext<'_>, relative: &str, content: &str) -> Result<PathBuf> {
    let path = ctx.target_dir.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write file: {}", path.display()))?;
    tracing::debug!(path = %path.display(), "file written");
    Ok(path)
}

/// Handlebars registry for package files.
///
/// Unknown placeholders render empty and nothing is HTML-escaped.
pub fn renderer() -> Handlebars<'static> {
    let mut handlebars = Handlebars::new();
    handlebars.set_strict_mode(false);
    handlebars.register_escape_fn(no_escape);
    handlebars
}

/// Fill `{{answer}}` placeholders in `template`.
pub fn render(
    handlebars: &Handlebars<'_>,
    template: &str,
    answers: &serde_json::Map<String, Value>,
) -> Result<String> {
    handlebars
        .render_template(template, answers)
        .context("Failed to render template")
}

pub struct ReadmeGenerator;

impl Plugin for ReadmeGenerator {
    fn id(&self) -> &str {
        "readme"
    }
}

impl Generator for ReadmeGenerator {
    fn required_configurators(&self) -> Vec<String> {
        vec!["project".to_string()]
    }

    fn generate(&self, ctx: &GenerationContext<'_>) -> Result<Vec<PathBuf>> {
        let mut readme = format!("# {}\n", ctx.text("name", "Project"));
        let description = ctx.text("description", "");
        if !description.is_empty() {
            readme.push_str(&format!("\n{}\n", description));
        }
        match ctx.text("license", "None") {
            "None" => {}
            license => readme.push_str(&format!("\n## License\n\n{}\n", license)),
        }
        Ok(vec![write_file(ctx, "README.md", &readme)?])
    }
}

pub struct LicenseFileGenerator;

impl Plugin for LicenseFileGenerator {
    fn id(&self) -> &str {
        "license-file"
    }
}

impl Generator for LicenseFileGenerator {
    fn required_configurators(&self) -> Vec<String> {
        vec!["license".to_string()]
    }

    fn generate(&self, ctx: &GenerationContext<'_>) -> Result<Vec<PathBuf>> {
        let holder = ctx.text("copyright_holder", "");
        let text = match ctx.text("license", "None") {
            "None" => return Ok(Vec::new()),
            "MIT" => format!("MIT License\n\nCopyright (c) {}\n\n{}", holder, MIT_BODY),
            "Apache-2.0" => format!(
                "Copyright {}\n\nLicensed under the Apache License, Version 2.0 (the \"License\");\n\
                 you may not use this file except in compliance with the License.\n\
                 You may obtain a copy of the License at\n\n    \
                 http://www.apache.org/licenses/LICENSE-2.0\n",
                holder
            ),
            "BSD-3-Clause" => format!(
                "BSD 3-Clause License\n\nCopyright (c) {}\nAll rights reserved.\n\n\
                 See https://opensource.org/licenses/BSD-3-Clause for the full terms.\n",
                holder
            ),
            other => anyhow::bail!("Unsupported license: {}", other),
        };
        Ok(vec![write_file(ctx, "LICENSE", &text)?])
    }
}

const MIT_BODY: &str = "\
Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files (the \"Software\"), to deal
in the Software without restriction, including without limitation the rights
to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:

The above copyright notice and this permission notice shall be included in all
copies or substantial portions of the Software.

THE SOFTWARE IS PROVIDED \"AS IS\", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
SOFTWARE.
";

pub struct GitignoreGenerator;

impl Plugin for GitignoreGenerator {
    fn id(&self) -> &str {
        "gitignore"
    }
}

impl Generator for GitignoreGenerator {
    fn required_configurators(&self) -> Vec<String> {
        vec!["vcs".to_string()]
    }

    fn generate(&self, ctx: &GenerationContext<'_>) -> Result<Vec<PathBuf>> {
        if ctx.text("vcs", "none") != "git" || ctx.target_dir.join(".gitignore").exists() {
            return Ok(Vec::new());
        }
        Ok(vec![write_file(ctx, ".gitignore", "/target\n.env\n")?])
    }
}

/// Records the answers so the project can be regenerated later.
pub struct AnswersFileGenerator;

impl Plugin for AnswersFileGenerator {
    fn id(&self) -> &str {
        "answers-file"
    }

    fn priority(&self) -> Option<i32> {
        Some(10)
    }
}

impl Generator for AnswersFileGenerator {
    fn generate(&self, ctx: &GenerationContext<'_>) -> Result<Vec<PathBuf>> {
        let content = serde_json::to_string_pretty(ctx.answers)
            .context("Failed to serialize answers")?;
        Ok(vec![write_file(ctx, ANSWERS_FILE, &format!("{}\n", content))?])
    }
}

/// Copies the files of the installed package named by the `package` variable,
/// filling `{{answer}}` placeholders.
pub struct PackageFilesGenerator {
    pub packages_dir: PathBuf,
}

impl Plugin for PackageFilesGenerator {
    fn id(&self) -> &str {
        "package-files"
    }
}

impl Generator for PackageFilesGenerator {
    fn required_configurators(&self) -> Vec<String> {
        vec!["package".to_string()]
    }

    fn generate(&self, ctx: &GenerationContext<'_>) -> Result<Vec<PathBuf>> {
        let name = ctx
            .variables
            .get(PACKAGE_VARIABLE)
            .and_then(Value::as_str)
            .context("package-files needs a 'package' variable naming an installed package")?;
        let package = find_installed(&self.packages_dir, name)?
            .with_context(|| format!("Package '{}' is not installed", name))?;

        let handlebars = renderer();
        let mut written = Vec::new();
        for (relative, source) in package.files() {
            written.push(copy_rendered(ctx, &handlebars, relative, &source)?);
        }
        Ok(written)
    }
}

fn copy_rendered(
    ctx: &GenerationContext<'_>,
    handlebars: &Handlebars<'_>,
    relative: &str,
    source: &Path,
) -> Result<PathBuf> {
    if !is_contained(relative) {
        anyhow::bail!("Refusing to write outside the project directory: {}", relative);
    }
    let bytes =
        std::fs::read(source).with_context(|| format!("Failed to read {}", source.display()))?;
    match String::from_utf8(bytes) {
        Ok(text) => {
            let rendered = render(handlebars, &text, ctx.answers)
                .with_context(|| format!("Failed to render {}", relative))?;
            write_file(ctx, relative, &rendered)
        }
        Err(err) => {
            let path = ctx.target_dir.join(relative);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, err.into_bytes())
                .with_context(|| format!("Failed to write file: {}", path.display()))?;
            Ok(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn answers(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_render_placeholders() {
        let answers = answers(json!({"name": "demo", "version": "1.0.0", "public": true}));
        assert_eq!(
            render(
                &renderer(),
                "{{name}} v{{version}} {{public}} [{{unknown}}]",
                &answers
            )
            .unwrap(),
            "demo v1.0.0 true []"
        );
    }

    #[test]
    fn test_render_does_not_rescan_answer_values() {
        let answers = answers(json!({"name": "{{version}}", "version": "1.0"}));
        assert_eq!(
            render(&renderer(), "name={{name}}", &answers).unwrap(),
            "name={{version}}"
        );
    }

    #[test]
    fn test_render_does_not_escape_html() {
        let answers = answers(json!({"description": "a <b> & \"c\""}));
        assert_eq!(
            render(&renderer(), "{{description}}", &answers).unwrap(),
            "a <b> & \"c\""
        );
    }

    #[test]
    fn test_readme_and_license() {
        let dir = tempfile::tempdir().unwrap();
        let answers = answers(json!({
            "name": "demo",
            "description": "A demo",
            "license": "MIT",
            "copyright_holder": "Jo",
        }));
        let variables = Map::new();
        let ctx = GenerationContext {
            target_dir: dir.path(),
            answers: &answers,
            variables: &variables,
        };

        ReadmeGenerator.generate(&ctx).unwrap();
        let readme = std::fs::read_to_string(dir.path().join("README.md")).unwrap();
        assert_eq!(readme, "# demo\n\nA demo\n\n## License\n\nMIT\n");

        LicenseFileGenerator.generate(&ctx).unwrap();
        let license = std::fs::read_to_string(dir.path().join("LICENSE")).unwrap();
        assert!(license.starts_with("MIT License\n\nCopyright (c) Jo\n"));
    }

    #[test]
    fn test_no_license_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let answers = answers(json!({"license": "None"}));
        let variables = Map::new();
        let ctx = GenerationContext {
            target_dir: dir.path(),
            answers: &answers,
            variables: &variables,
        };
        assert!(LicenseFileGenerator.generate(&ctx).unwrap().is_empty());
        assert!(!dir.path().join("LICENSE").exists());
    }

    #[test]
    fn test_package_files_require_installed_package() {
        let dir = tempfile::tempdir().unwrap();
        let answers = Map::new();
        let variables = answers_with_package("ghost");
        let ctx = GenerationContext {
            target_dir: dir.path(),
            answers: &answers,
            variables: &variables,
        };
        let generator = PackageFilesGenerator {
            packages_dir: dir.path().join("packages"),
        };
        let err = generator.generate(&ctx).unwrap_err();
        assert!(err.to_string().contains("'ghost' is not installed"));
    }

    #[test]
    fn test_package_files_copied_and_rendered() {
        let packages = tempfile::tempdir().unwrap();
        let pkg = packages.path().join("starter");
        std::fs::create_dir_all(pkg.join("src")).unwrap();
        std::fs::write(
            pkg.join("package.yaml"),
            "name: starter\nversion: 0.1.0\nfiles: [package.yaml, Cargo.toml]\n",
        )
        .unwrap();
        std::fs::write(
            pkg.join("Cargo.toml"),
            "[package]\nname = \"{{package_name}}\"\nversion = \"{{version}}\"\n",
        )
        .unwrap();

        let target = tempfile::tempdir().unwrap();
        let answers = answers(json!({"package_name": "demo", "version": "0.2.0"}));
        let variables = answers_with_package("starter");
        let ctx = GenerationContext {
            target_dir: target.path(),
            answers: &answers,
            variables: &variables,
        };
        let generator = PackageFilesGenerator {
            packages_dir: packages.path().to_path_buf(),
        };

        let written = generator.generate(&ctx).unwrap();
        assert_eq!(written, vec![target.path().join("Cargo.toml")]);
        assert_eq!(
            std::fs::read_to_string(target.path().join("Cargo.toml")).unwrap(),
            "[package]\nname = \"demo\"\nversion = \"0.2.0\"\n"
        );
    }

    #[test]
    fn test_package_files_never_escape_target_dir() {
        let root = tempfile::tempdir().unwrap();
        let packages = root.path().join("packages");
        let pkg = packages.join("evil");
        std::fs::create_dir_all(&pkg).unwrap();
        std::fs::write(
            pkg.join("package.yaml"),
            "name: evil\nversion: 0.1.0\nfiles: [../evil/payload.txt]\n",
        )
        .unwrap();
        std::fs::write(packages.join("payload.txt"), "boom").unwrap();

        let target = root.path().join("project");
        std::fs::create_dir_all(&target).unwrap();
        let answers = Map::new();
        let variables = answers_with_package("evil");
        let ctx = GenerationContext {
            target_dir: &target,
            answers: &answers,
            variables: &variables,
        };
        let generator = PackageFilesGenerator {
            packages_dir: packages.clone(),
        };

        assert!(generator.generate(&ctx).is_err());
        assert!(!root.path().join("evil/payload.txt").exists());

        let err = copy_rendered(
            &ctx,
            &renderer(),
            "../evil/payload.txt",
            &packages.join("payload.txt"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("outside the project directory"));
        assert!(!root.path().join("evil/payload.txt").exists());
    }

    fn answers_with_package(name: &str) -> Map<String, Value> {
        let mut variables = Map::new();
        variables.insert(PACKAGE_VARIABLE.to_string(), json!(name));
        variables
    }
}
