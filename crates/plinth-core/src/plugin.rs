//! Configurator and generator plugin traits.
//!
//! Plugins are identified by stable string ids. Ordering is expressed through
//! [`Plugin::priority`] or [`Plugin::dependencies`] (never both) and resolved
//! by [`DependencyOrderer`](crate::ordering::DependencyOrderer).

use crate::error::Result;
use crate::flow::QuestionFlow;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Lowest accepted priority.
pub const MIN_PRIORITY: i32 = -10;
/// Highest accepted priority.
pub const MAX_PRIORITY: i32 = 10;

/// Common identity and ordering metadata.
pub trait Plugin {
    /// Stable identifier, also used as the dependency key.
    fn id(&self) -> &str;

    /// Position among prioritized plugins, in `[-10, 10]`; lower runs first.
    fn priority(&self) -> Option<i32> {
        None
    }

    /// Ids of the plugins that must run before this one.
    fn dependencies(&self) -> Option<Vec<String>> {
        None
    }
}

/// Creates plugin instances on demand, e.g. for declared dependencies.
pub trait PluginFactory<P: ?Sized> {
    fn create(&self, id: &str) -> Result<Box<P>>;
}

impl<P: ?Sized, F> PluginFactory<P> for F
where
    F: Fn(&str) -> Result<Box<P>>,
{
    fn create(&self, id: &str) -> Result<Box<P>> {
        self(id)
    }
}

/// A plugin that asks questions.
pub trait Configurator: Plugin {
    /// Ask this configurator's questions through `flow`.
    fn configure(&self, flow: &mut QuestionFlow<'_>) -> Result<()>;

    /// Adjust the final answer map once every configurator has run.
    fn finalize(&self, _answers: &mut Map<String, Value>) -> Result<()> {
        Ok(())
    }
}

/// Everything a generator gets to work with.
#[derive(Debug, Clone, Copy)]
pub struct GenerationContext<'a> {
    pub target_dir: &'a Path,
    pub answers: &'a Map<String, Value>,
    pub variables: &'a Map<String, Value>,
}

impl GenerationContext<'_> {
    /// String answer, or `fallback` when missing or not a string.
    pub fn text<'v>(&'v self, name: &str, fallback: &'v str) -> &'v str {
        self.answers
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or(fallback)
    }

    /// Boolean answer, `false` when missing.
    pub fn flag(&self, name: &str) -> bool {
        self.answers
            .get(name)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// A plugin that materializes output from the final answers.
pub trait Generator: Plugin {
    /// Configurators whose answers this generator needs.
    fn required_configurators(&self) -> Vec<String> {
        Vec::new()
    }

    /// Write output under `ctx.target_dir`; returns the files written.
    fn generate(&self, ctx: &GenerationContext<'_>) -> anyhow::Result<Vec<PathBuf>>;
}
