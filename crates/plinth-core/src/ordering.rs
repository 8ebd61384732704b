//! Execution ordering for plugins.
//!
//! Prioritized plugins (plain ones count as priority 0) are stable-sorted by
//! priority. Dependent plugins are sequenced topologically after them. The two
//! groups are concatenated rather than merged into one order, so a dependent
//! plugin always runs after every non-dependent one.

use crate::error::{Result, ScaffoldError};
use crate::plugin::{Plugin, PluginFactory, MAX_PRIORITY, MIN_PRIORITY};
use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap};

/// Validated ordering preference of one plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Style {
    Plain,
    Prioritized(i32),
    Dependent(Vec<String>),
}

fn classify<P: Plugin + ?Sized>(plugin: &P) -> Result<Style> {
    let invalid = |reason: String| ScaffoldError::InvalidConfiguration {
        plugin: plugin.id().to_string(),
        reason,
    };

    match (plugin.priority(), plugin.dependencies()) {
        (Some(_), Some(_)) => Err(invalid(
            "a plugin cannot declare both a priority and dependencies".into(),
        )),
        (Some(priority), None) if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) => {
            Err(invalid(format!(
                "priority {} is outside [{}, {}]",
                priority, MIN_PRIORITY, MAX_PRIORITY
            )))
        }
        (Some(priority), None) => Ok(Style::Prioritized(priority)),
        (None, Some(deps)) if deps.is_empty() => {
            Err(invalid("the dependency list is empty".into()))
        }
        (None, Some(deps)) if deps.iter().any(|dep| dep == plugin.id()) => {
            Err(invalid("a plugin cannot depend on itself".into()))
        }
        (None, Some(deps)) => Ok(Style::Dependent(deps)),
        (None, None) => Ok(Style::Plain),
    }
}

/// Collects plugin instances and produces their execution order.
///
/// The working set is closed under dependencies: adding a dependent plugin
/// instantiates any missing dependency through the factory. Instances are
/// de-duplicated by id.
pub struct DependencyOrderer<'f, P: ?Sized> {
    factory: &'f dyn PluginFactory<P>,
    plugins: Vec<(Box<P>, Style)>,
}

impl<'f, P: Plugin + ?Sized> DependencyOrderer<'f, P> {
    pub fn new(factory: &'f dyn PluginFactory<P>) -> Self {
        Self {
            factory,
            plugins: Vec::new(),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.plugins.iter().any(|(plugin, _)| plugin.id() == id)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Instantiate `id` through the factory unless already present.
    pub fn add_id(&mut self, id: &str) -> Result<()> {
        if self.contains(id) {
            return Ok(());
        }
        let plugin = self.factory.create(id)?;
        if plugin.id() != id {
            return Err(ScaffoldError::InvalidConfiguration {
                plugin: id.to_string(),
                reason: format!("factory returned plugin \"{}\" instead", plugin.id()),
            });
        }
        self.add(plugin)
    }

    /// Add an instance, pulling in its dependencies.
    pub fn add(&mut self, plugin: Box<P>) -> Result<()> {
        if self.contains(plugin.id()) {
            return Ok(());
        }
        let style = classify(&*plugin)?;
        let dependencies = match &style {
            Style::Dependent(deps) => deps.clone(),
            _ => Vec::new(),
        };
        tracing::trace!(plugin = plugin.id(), ?style, "plugin added");
        self.plugins.push((plugin, style));

        for dependency in &dependencies {
            self.add_id(dependency)?;
        }
        Ok(())
    }

    /// Consume the orderer and return the plugins in execution order.
    pub fn into_instances(self) -> Result<Vec<Box<P>>> {
        let mut prioritized = Vec::new();
        let mut dependent = Vec::new();
        for (plugin, style) in self.plugins {
            match style {
                Style::Plain => prioritized.push((0, plugin)),
                Style::Prioritized(priority) => prioritized.push((priority, plugin)),
                Style::Dependent(deps) => dependent.push((plugin, deps)),
            }
        }

        // Stable: equal priorities keep insertion order
        prioritized.sort_by_key(|(priority, _)| *priority);

        let sequence = sequence_dependents(&dependent)?;
        let mut slots: Vec<Option<Box<P>>> =
            dependent.into_iter().map(|(plugin, _)| Some(plugin)).collect();

        let mut ordered: Vec<Box<P>> = prioritized.into_iter().map(|(_, p)| p).collect();
        ordered.extend(sequence.into_iter().filter_map(|index| slots[index].take()));

        tracing::debug!(
            order = ?ordered.iter().map(|p| p.id()).collect::<Vec<_>>(),
            "plugins ordered"
        );
        Ok(ordered)
    }
}

/// Kahn's algorithm over dependent plugins; the earliest-added ready plugin
/// goes first. Dependencies on non-dependent plugins are already satisfied.
///
/// Graph edges point from a dependency to the plugin that needs it.
fn sequence_dependents<P: Plugin + ?Sized>(
    dependent: &[(Box<P>, Vec<String>)],
) -> Result<Vec<usize>> {
    let index: HashMap<&str, usize> = dependent
        .iter()
        .enumerate()
        .map(|(i, (plugin, _))| (plugin.id(), i))
        .collect();

    let mut graph: DiGraphMap<usize, ()> =
        DiGraphMap::with_capacity(dependent.len(), dependent.len());
    for (i, (_, deps)) in dependent.iter().enumerate() {
        graph.add_node(i);
        for dep in deps {
            if let Some(&j) = index.get(dep.as_str()) {
                graph.add_edge(j, i, ());
            }
        }
    }

    let mut pending: Vec<usize> = (0..dependent.len())
        .map(|i| graph.neighbors_directed(i, Direction::Incoming).count())
        .collect();
    let mut ready: BTreeSet<usize> = (0..dependent.len())
        .filter(|&i| pending[i] == 0)
        .collect();

    let mut sequence = Vec::with_capacity(dependent.len());
    while let Some(i) = ready.pop_first() {
        sequence.push(i);
        for next in graph.neighbors_directed(i, Direction::Outgoing) {
            pending[next] -= 1;
            if pending[next] == 0 {
                ready.insert(next);
            }
        }
    }

    if sequence.len() < dependent.len() {
        let plugins = pending
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > 0)
            .map(|(i, _)| dependent[i].0.id().to_string())
            .collect();
        return Err(ScaffoldError::CircularDependency { plugins });
    }

    Ok(sequence)
}
