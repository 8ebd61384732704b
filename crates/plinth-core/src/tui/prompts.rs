//! Charm-style question prompts using cliclack

use crate::communicator::Communicator;
use crate::error::Result;
use crate::profile::Profile;
use crate::question::{Prompt, QuestionKind};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Asks every question on the terminal.
///
/// Answers failing the question's validation are reported and asked again,
/// so the flow only ever sees values the question accepts.
#[derive(Debug, Default)]
pub struct InteractiveCommunicator;

impl InteractiveCommunicator {
    pub fn new() -> Self {
        Self
    }

    fn read(&self, prompt: &Prompt<'_>) -> std::io::Result<Value> {
        let question = prompt.question;
        match question.kind {
            QuestionKind::Text => {
                let mut input = cliclack::input(&question.label);
                if let Some(default) = prompt.default_text() {
                    input = input.placeholder(&default).default_input(&default);
                }
                let text: String = input.interact()?;
                if text.is_empty() && question.optional {
                    Ok(Value::Null)
                } else {
                    Ok(Value::String(text))
                }
            }
            QuestionKind::Confirm => {
                let initial = prompt.default.as_bool().unwrap_or(false);
                let answer = cliclack::confirm(&question.label)
                    .initial_value(initial)
                    .interact()?;
                Ok(Value::Bool(answer))
            }
            QuestionKind::Choice => {
                let mut select = cliclack::select(&question.label);
                for (idx, choice) in question.choices.iter().enumerate() {
                    select = select.item(idx, choice, "");
                }
                if let Some(initial) = prompt
                    .default
                    .as_str()
                    .and_then(|d| question.choices.iter().position(|c| c == d))
                {
                    select = select.initial_value(initial);
                }
                let idx: usize = select.interact()?;
                Ok(Value::String(question.choices[idx].clone()))
            }
            QuestionKind::MultiChoice => {
                let defaults = prompt.default_choices();
                let mut multi = cliclack::multiselect(&question.label);
                for (idx, choice) in question.choices.iter().enumerate() {
                    multi = multi.item(idx, choice, "");
                }
                let initial: Vec<usize> = question
                    .choices
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| defaults.contains(c))
                    .map(|(idx, _)| idx)
                    .collect();
                let selected: Vec<usize> = multi
                    .initial_values(initial)
                    .required(!question.optional)
                    .interact()?;
                Ok(Value::Array(
                    selected
                        .into_iter()
                        .map(|idx| Value::String(question.choices[idx].clone()))
                        .collect(),
                ))
            }
        }
    }
}

impl Communicator for InteractiveCommunicator {
    fn ask(&mut self, prompt: &Prompt<'_>, _name: Option<&str>) -> Result<Value> {
        if let Some(help) = &prompt.question.help {
            cliclack::log::remark(help)?;
        }
        loop {
            let raw = self.read(prompt)?;
            match prompt.question.validate(&raw) {
                Ok(_) => return Ok(raw),
                Err(message) => cliclack::log::error(message)?,
            }
        }
    }
}

/// Pick a profile, using `specified` when given.
pub fn select_profile(profiles: &[Profile], specified: Option<&str>) -> anyhow::Result<String> {
    if let Some(name) = specified {
        return Ok(name.to_string());
    }

    match profiles {
        [] => anyhow::bail!("No profiles configured."),
        [only] => {
            cliclack::log::info(format!("Using profile: {}", only.name))?;
            Ok(only.name.clone())
        }
        _ => {
            let mut select = cliclack::select("Select a profile");
            for (idx, profile) in profiles.iter().enumerate() {
                select = select.item(
                    idx,
                    &profile.name,
                    profile.description.as_deref().unwrap_or(""),
                );
            }
            let idx: usize = select.interact()?;
            Ok(profiles[idx].name.clone())
        }
    }
}

/// Resolve the project directory, asking when none was given.
///
/// A non-empty existing directory needs confirmation unless `yes` is set.
pub fn select_directory(specified: Option<&Path>, yes: bool) -> anyhow::Result<PathBuf> {
    let current_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    let path = if let Some(dir) = specified {
        let p = current_dir.join(dir);
        cliclack::log::info(format!("Using directory: {}", p.display()))?;
        p
    } else if yes {
        current_dir
    } else {
        let input: String = cliclack::input("Project directory")
            .placeholder(".")
            .default_input(".")
            .interact()?;
        if input.is_empty() || input == "." {
            current_dir
        } else {
            current_dir.join(input)
        }
    };

    if let Some(parent) = path.parent() {
        if !parent.exists() && parent != Path::new("") {
            anyhow::bail!("Parent directory does not exist: {}", parent.display());
        }
    }

    if path.is_dir() {
        let count = std::fs::read_dir(&path).map(|entries| entries.count()).unwrap_or(0);
        if count > 0 {
            cliclack::log::warning(format!("Directory has {} existing items", count))?;
            let confirm = yes
                || cliclack::confirm("Continue anyway?")
                    .initial_value(true)
                    .interact()?;
            if !confirm {
                anyhow::bail!("Setup cancelled.");
            }
        }
    }

    Ok(path)
}
