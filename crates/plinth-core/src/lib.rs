//! Plinth Core - profile-driven project scaffolding engine
//!
//! A project is created by resolving a *profile* (a named, inheritable bundle
//! of plugin ids, variables and default overrides), asking the questions of
//! its configurators, then running its generators against the answers.
//!
//! # Architecture
//!
//! The library is organized into layers:
//!
//! - **Layer 1: Engine** - answers, default resolution with `@` expressions,
//!   the question flow, dependency ordering and profile merging
//! - **Layer 2: Workflow** - `ProjectRunner`, recovery cache, configuration
//!   loading and the package registry used to install extra profiles
//! - **Layer 3: CLI/TUI Interface** - Optional cliclack-based prompts (feature-gated)
//!
//! # Feature Flags
//!
//! - `tui` (default): Enables the cliclack-based interactive communicator
//!
//! # Example Usage (without TUI)
//!
//! ```ignore
//! use plinth_core::{DefaultsCommunicator, ProjectRunner, ScaffoldConfig, expr::BasicEvaluator};
//!
//! let config = ScaffoldConfig::load_or_builtin(Path::new("plinth.yaml"))?;
//! let profile = config.merger().resolve("default", &generators, &configurators)?;
//! let runner = ProjectRunner::new(&profile, &BasicEvaluator);
//! let collected = runner.collect(&mut DefaultsCommunicator, true)?;
//! runner.generate(&collected, Path::new("my-project"))?;
//! ```

pub mod answers;
pub mod cache;
pub mod communicator;
pub mod config;
pub mod defaults;
pub mod error;
pub mod expr;
pub mod flow;
pub mod ordering;
pub mod plugin;
pub mod product;
pub mod profile;
pub mod question;
pub mod registry;
pub mod runner;

#[cfg(feature = "tui")]
pub mod tui;

// Re-export main types for convenience
pub use answers::AnswerStore;
pub use cache::RecoveryCache;
pub use communicator::{
    AnswersCommunicator, Communicator, DefaultsCommunicator, PrefilledCommunicator,
};
pub use config::ScaffoldConfig;
pub use defaults::{DefaultSpec, DefaultValueResolver, ExpressionEvaluator, VariablesProvider};
pub use error::{Result, ScaffoldError};
pub use flow::QuestionFlow;
pub use ordering::DependencyOrderer;
pub use plugin::{Configurator, GenerationContext, Generator, Plugin, PluginFactory};
pub use product::ProductConfig;
pub use profile::{MergedProfile, Profile, ProfileMerger, ResolvedProfile};
pub use question::{Prompt, Question, QuestionKind};
pub use runner::{Collected, Interrupted, ProjectRunner};

#[cfg(feature = "tui")]
pub use tui::InteractiveCommunicator;

/// CLI version - used for package compatibility checking
/// Each binary should define its own version, but this provides a fallback
pub const DEFAULT_CLI_VERSION: &str = "0.1.0";
