//! Runs a resolved profile: configurators first, then generators.

use crate::communicator::Communicator;
use crate::defaults::{DefaultValueResolver, ExpressionEvaluator, VariablesProvider};
use crate::error::ScaffoldError;
use crate::flow::QuestionFlow;
use crate::plugin::GenerationContext;
use crate::profile::ResolvedProfile;
use anyhow::Context;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Answers and variables produced by the configurators.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collected {
    pub answers: Map<String, Value>,
    pub variables: Map<String, Value>,
}

/// A run that stopped before every question was answered.
///
/// `answers` holds the raw answers recorded so far so the run can be resumed.
#[derive(Debug, thiserror::Error)]
#[error("{source}")]
pub struct Interrupted {
    pub answers: Map<String, Value>,
    #[source]
    pub source: ScaffoldError,
}

pub struct ProjectRunner<'a> {
    profile: &'a ResolvedProfile,
    evaluator: &'a dyn ExpressionEvaluator,
}

impl<'a> ProjectRunner<'a> {
    pub fn new(profile: &'a ResolvedProfile, evaluator: &'a dyn ExpressionEvaluator) -> Self {
        Self { profile, evaluator }
    }

    /// Drive every configurator through one question flow.
    pub fn collect(
        &self,
        communicator: &mut dyn Communicator,
        skip_optional: bool,
    ) -> Result<Collected, Interrupted> {
        let variables = VariablesProvider::new(self.profile.variables.clone());
        let resolver = DefaultValueResolver::new(self.evaluator, &variables);
        let mut flow = QuestionFlow::new(
            resolver,
            communicator,
            &self.profile.defaults,
            skip_optional,
        );

        for configurator in &self.profile.configurators {
            tracing::info!(configurator = configurator.id(), "running configurator");
            flow.enter_configurator(configurator.id());
            if let Err(err) = configurator.configure(&mut flow) {
                return Err(Interrupted {
                    answers: flow.answers().raw_snapshot(),
                    source: err.with_configurator(configurator.id()),
                });
            }
            flow.leave_configurator();
        }

        let interrupted = |source: ScaffoldError, flow: &QuestionFlow<'_>| Interrupted {
            answers: flow.answers().raw_snapshot(),
            source,
        };

        let resolved_variables = flow
            .resolver()
            .resolve_all(flow.answers())
            .map_err(|err| interrupted(err, &flow))?;

        let mut answers = flow.answers().snapshot();
        for configurator in &self.profile.configurators {
            configurator
                .finalize(&mut answers)
                .map_err(|err| interrupted(err.with_configurator(configurator.id()), &flow))?;
        }

        Ok(Collected {
            answers,
            variables: resolved_variables,
        })
    }

    /// Run every generator against the collected answers.
    pub fn generate(&self, collected: &Collected, target_dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
        let ctx = GenerationContext {
            target_dir,
            answers: &collected.answers,
            variables: &collected.variables,
        };

        let mut written = Vec::new();
        for generator in &self.profile.generators {
            tracing::info!(generator = generator.id(), "running generator");
            let files = generator
                .generate(&ctx)
                .with_context(|| format!("Generator '{}' failed", generator.id()))?;
            written.extend(files);
        }
        Ok(written)
    }
}
