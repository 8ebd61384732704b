//! Default value specifications and their lazy resolution.
//!
//! A default is either a literal, a deferred computation over the answers
//! recorded so far, or an expression. Expressions see two namespaces:
//! `variables[...]`, which resolves other variables on demand through the same
//! resolver, and `answers[...]`, a read-only view of the [`AnswerStore`].

use crate::answers::AnswerStore;
use crate::error::{Result, ScaffoldError};
use serde_json::{Map, Value};
use std::fmt;

/// Strings at least this long starting with `@` are expressions.
const EXPRESSION_MIN_LEN: usize = 3;

/// Computation run against `(answers, raw_answers)` when a default is needed.
pub type DeferredFn = Box<dyn Fn(&Map<String, Value>, &Map<String, Value>) -> Value>;

/// How a default value is obtained.
pub enum DefaultSpec {
    Literal(Value),
    Deferred(DeferredFn),
    Expression(String),
}

impl DefaultSpec {
    /// Interpret a raw configuration value.
    ///
    /// `"@expr"` becomes an expression, `"@@text"` the literal `"@text"`, and
    /// anything else (including strings shorter than three characters) is
    /// kept as is. Length counts characters, not bytes.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::String(text) => Self::from_text(text),
            other => DefaultSpec::Literal(other),
        }
    }

    fn from_text(text: String) -> Self {
        if text.chars().count() >= EXPRESSION_MIN_LEN {
            if let Some(rest) = text.strip_prefix('@') {
                if rest.starts_with('@') {
                    return DefaultSpec::Literal(Value::String(rest.to_string()));
                }
                return DefaultSpec::Expression(rest.to_string());
            }
        }
        DefaultSpec::Literal(Value::String(text))
    }

    pub fn deferred<F>(compute: F) -> Self
    where
        F: Fn(&Map<String, Value>, &Map<String, Value>) -> Value + 'static,
    {
        DefaultSpec::Deferred(Box::new(compute))
    }
}

impl Default for DefaultSpec {
    fn default() -> Self {
        DefaultSpec::Literal(Value::Null)
    }
}

impl From<Value> for DefaultSpec {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

impl fmt::Debug for DefaultSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultSpec::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            DefaultSpec::Deferred(_) => f.write_str("Deferred(..)"),
            DefaultSpec::Expression(text) => f.debug_tuple("Expression").field(text).finish(),
        }
    }
}

/// Failure reported by an [`ExpressionEvaluator`].
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("{0}")]
    Runtime(String),
    /// A namespace lookup failed; forwarded to the caller unchanged.
    #[error(transparent)]
    Scope(#[from] ScaffoldError),
}

/// Namespaces visible to an expression.
pub trait ExpressionScope {
    /// `variables[key]`, resolved lazily.
    fn variable(&mut self, key: &str) -> Result<Value>;

    /// `answers[key]`; fails when the question has not been answered.
    fn answer(&self, key: &str) -> Result<Value>;
}

/// Evaluates expression text against a scope.
pub trait ExpressionEvaluator {
    fn evaluate(&self, expression: &str, scope: &mut dyn ExpressionScope)
        -> Result<Value, EvalError>;
}

/// Named variable specifications (literals or `@` expressions).
#[derive(Debug, Clone, Default)]
pub struct VariablesProvider {
    specs: Map<String, Value>,
}

impl VariablesProvider {
    pub fn new(specs: Map<String, Value>) -> Self {
        Self { specs }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.specs.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.specs.contains_key(key)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.specs.keys().map(String::as_str)
    }
}

/// Turns default specifications into concrete values.
pub struct DefaultValueResolver<'a> {
    evaluator: &'a dyn ExpressionEvaluator,
    variables: &'a VariablesProvider,
}

impl<'a> DefaultValueResolver<'a> {
    pub fn new(evaluator: &'a dyn ExpressionEvaluator, variables: &'a VariablesProvider) -> Self {
        Self {
            evaluator,
            variables,
        }
    }

    pub fn variables(&self) -> &VariablesProvider {
        self.variables
    }

    /// Resolve a default specification against the answers recorded so far.
    pub fn resolve(&self, spec: &DefaultSpec, answers: &AnswerStore) -> Result<Value> {
        let mut trail = Vec::new();
        self.resolve_spec(spec, answers, &mut trail)
    }

    /// Resolve a raw configuration value (see [`DefaultSpec::from_value`]).
    pub fn resolve_value(&self, raw: &Value, answers: &AnswerStore) -> Result<Value> {
        self.resolve(&DefaultSpec::from_value(raw.clone()), answers)
    }

    /// Resolve a single variable by name.
    pub fn variable(&self, key: &str, answers: &AnswerStore) -> Result<Value> {
        let mut trail = Vec::new();
        self.load_variable(key, answers, &mut trail)
    }

    /// Resolve every variable, in declaration order.
    pub fn resolve_all(&self, answers: &AnswerStore) -> Result<Map<String, Value>> {
        let mut resolved = Map::new();
        for key in self.variables.names() {
            resolved.insert(key.to_string(), self.variable(key, answers)?);
        }
        Ok(resolved)
    }

    fn resolve_spec(
        &self,
        spec: &DefaultSpec,
        answers: &AnswerStore,
        trail: &mut Vec<String>,
    ) -> Result<Value> {
        match spec {
            DefaultSpec::Literal(value) => Ok(value.clone()),
            DefaultSpec::Deferred(compute) => {
                Ok(compute(&answers.snapshot(), &answers.raw_snapshot()))
            }
            DefaultSpec::Expression(expression) => self.evaluate(expression, answers, trail),
        }
    }

    fn evaluate(
        &self,
        expression: &str,
        answers: &AnswerStore,
        trail: &mut Vec<String>,
    ) -> Result<Value> {
        tracing::debug!(expression, "evaluating expression");
        let mut scope = ResolutionScope {
            resolver: self,
            answers,
            trail,
        };
        self.evaluator
            .evaluate(expression, &mut scope)
            .map_err(|err| match err {
                EvalError::Scope(inner) => inner,
                EvalError::Syntax(message) | EvalError::Runtime(message) => {
                    ScaffoldError::InvalidExpression {
                        expression: expression.to_string(),
                        message,
                    }
                }
            })
    }

    fn load_variable(
        &self,
        key: &str,
        answers: &AnswerStore,
        trail: &mut Vec<String>,
    ) -> Result<Value> {
        if trail.iter().any(|loading| loading == key) {
            let mut path = trail.clone();
            path.push(key.to_string());
            return Err(ScaffoldError::CircularReference {
                key: key.to_string(),
                path,
            });
        }

        let raw = self
            .variables
            .get(key)
            .ok_or_else(|| ScaffoldError::UndefinedVariable {
                name: key.to_string(),
            })?;
        let spec = DefaultSpec::from_value(raw.clone());

        trail.push(key.to_string());
        let resolved = self.resolve_spec(&spec, answers, trail);
        trail.pop();
        resolved
    }
}

/// Scope handed to the evaluator for one resolution.
struct ResolutionScope<'r, 'a> {
    resolver: &'r DefaultValueResolver<'a>,
    answers: &'r AnswerStore,
    trail: &'r mut Vec<String>,
}

impl ExpressionScope for ResolutionScope<'_, '_> {
    fn variable(&mut self, key: &str) -> Result<Value> {
        self.resolver.load_variable(key, self.answers, self.trail)
    }

    fn answer(&self, key: &str) -> Result<Value> {
        self.answers
            .lookup(key)
            .map(|answer| answer.stored.clone())
            .ok_or_else(|| ScaffoldError::UndefinedAnswer {
                name: key.to_string(),
            })
    }
}
