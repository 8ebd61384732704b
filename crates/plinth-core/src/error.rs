//! Error types raised by the answer-resolution and ordering engine.

use thiserror::Error;

/// Result alias for engine operations.
pub type Result<T, E = ScaffoldError> = std::result::Result<T, E>;

/// Errors raised while resolving answers, defaults, plugin order or profiles.
#[derive(Debug, Error)]
pub enum ScaffoldError {
    /// A question name was written twice during one flow.
    #[error("an answer for \"{name}\" has already been recorded")]
    DuplicateAnswer { name: String },

    /// A validator rejected the raw value supplied for a question.
    #[error("invalid answer for \"{question}\"{}: {message}", in_configurator(.configurator))]
    Validation {
        question: String,
        configurator: Option<String>,
        message: String,
    },

    /// A variable referenced itself through a chain of other variables.
    #[error("circular reference while resolving variable \"{key}\": {}", trail(.path))]
    CircularReference { key: String, path: Vec<String> },

    /// A profile imports itself, directly or through other profiles.
    #[error("profile import cycle detected: {}", trail(.chain))]
    AlreadyImporting { chain: Vec<String> },

    /// Dependent plugins that can never be scheduled.
    #[error("circular dependency between plugins: {}", .plugins.join(", "))]
    CircularDependency { plugins: Vec<String> },

    #[error("profile \"{name}\" is not registered")]
    UnregisteredProfile { name: String },

    #[error("answers[\"{name}\"] is not defined yet")]
    UndefinedAnswer { name: String },

    #[error("variables[\"{name}\"] is not defined")]
    UndefinedVariable { name: String },

    /// A pre-recorded answer set has no value for a question.
    #[error("no answer provided for \"{name}\"")]
    MissingAnswer { name: String },

    /// The expression evaluator failed on a default or variable.
    #[error("invalid expression `{expression}`: {message}")]
    InvalidExpression { expression: String, message: String },

    /// A plugin declaration is malformed.
    #[error("invalid plugin configuration for \"{plugin}\": {reason}")]
    InvalidConfiguration { plugin: String, reason: String },

    /// A plugin factory does not know the requested identifier.
    #[error("unknown plugin \"{0}\"")]
    UnknownPlugin(String),

    /// The communicator backend could not read an answer.
    #[error("prompt failed: {0}")]
    Prompt(#[from] std::io::Error),
}

impl ScaffoldError {
    /// Attach the configurator that was running when a validation failed.
    pub fn with_configurator(self, id: &str) -> Self {
        match self {
            ScaffoldError::Validation {
                question,
                configurator: None,
                message,
            } => ScaffoldError::Validation {
                question,
                configurator: Some(id.to_string()),
                message,
            },
            other => other,
        }
    }

    /// Whether the error is one of the cycle-detection failures.
    pub fn is_cycle(&self) -> bool {
        matches!(
            self,
            ScaffoldError::CircularReference { .. }
                | ScaffoldError::AlreadyImporting { .. }
                | ScaffoldError::CircularDependency { .. }
        )
    }
}

/// Render a chain of names as `"a" -> "b" -> "c"`.
pub fn trail(names: &[String]) -> String {
    names
        .iter()
        .map(|name| format!("\"{}\"", name))
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn in_configurator(configurator: &Option<String>) -> String {
    configurator
        .as_deref()
        .map(|id| format!(" (configurator \"{}\")", id))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trail_quotes_each_name() {
        let chain = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        assert_eq!(trail(&chain), r#""A" -> "B" -> "C""#);
    }

    #[test]
    fn test_validation_message_names_configurator() {
        let err = ScaffoldError::Validation {
            question: "name".into(),
            configurator: None,
            message: "must not be empty".into(),
        }
        .with_configurator("project");
        assert_eq!(
            err.to_string(),
            "invalid answer for \"name\" (configurator \"project\"): must not be empty"
        );
    }

    #[test]
    fn test_with_configurator_keeps_first_context() {
        let err = ScaffoldError::Validation {
            question: "name".into(),
            configurator: Some("inner".into()),
            message: "bad".into(),
        }
        .with_configurator("outer");
        assert!(err.to_string().contains("\"inner\""));
    }

    #[test]
    fn test_cycle_errors_are_flagged() {
        let err = ScaffoldError::CircularDependency {
            plugins: vec!["x".into()],
        };
        assert!(err.is_cycle());
        assert!(!ScaffoldError::UnknownPlugin("x".into()).is_cycle());
    }
}
