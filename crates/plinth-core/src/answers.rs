//! Write-once, insertion-ordered answer storage.

use crate::error::{Result, ScaffoldError};
use serde_json::{Map, Value};

/// A single recorded answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    /// Value as returned by the communicator, before validation.
    pub raw: Value,
    /// Value after validation and normalization.
    pub stored: Value,
}

/// Ordered question name -> answer mapping for one question flow.
///
/// Every name can be written exactly once; a second write fails with
/// [`ScaffoldError::DuplicateAnswer`].
#[derive(Debug, Clone, Default)]
pub struct AnswerStore {
    entries: Vec<(String, Answer)>,
}

impl AnswerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an answer and return the stored value.
    pub fn set(&mut self, name: &str, raw: Value, stored: Value) -> Result<Value> {
        if self.has(name) {
            return Err(ScaffoldError::DuplicateAnswer {
                name: name.to_string(),
            });
        }
        tracing::trace!(question = name, value = %stored, "answer recorded");
        self.entries.push((
            name.to_string(),
            Answer {
                raw,
                stored: stored.clone(),
            },
        ));
        Ok(stored)
    }

    /// Stored value for `name`, or `default` when nothing was recorded.
    pub fn get(&self, name: &str, default: Value) -> Value {
        self.lookup(name).map(|a| a.stored.clone()).unwrap_or(default)
    }

    pub fn has(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Full answer record for `name`.
    pub fn lookup(&self, name: &str) -> Option<&Answer> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, answer)| answer)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names in the order they were answered.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    /// Ordered name -> stored value mapping.
    pub fn snapshot(&self) -> Map<String, Value> {
        self.entries
            .iter()
            .map(|(key, answer)| (key.clone(), answer.stored.clone()))
            .collect()
    }

    /// Ordered name -> raw answer mapping.
    pub fn raw_snapshot(&self) -> Map<String, Value> {
        self.entries
            .iter()
            .map(|(key, answer)| (key.clone(), answer.raw.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_second_write_fails_regardless_of_values() {
        let mut store = AnswerStore::new();
        store.set("name", json!("a"), json!("A")).unwrap();

        let err = store.set("name", json!("b"), json!("B")).unwrap_err();
        assert!(matches!(err, ScaffoldError::DuplicateAnswer { ref name } if name == "name"));
        // The original answer survives the failed write
        assert_eq!(store.get("name", Value::Null), json!("A"));
    }

    #[test]
    fn test_get_falls_back_to_default() {
        let store = AnswerStore::new();
        assert_eq!(store.get("missing", json!(42)), json!(42));
        assert!(!store.has("missing"));
    }

    #[test]
    fn test_snapshots_keep_insertion_order() {
        let mut store = AnswerStore::new();
        store.set("zeta", json!(" Z "), json!("z")).unwrap();
        store.set("alpha", json!("yes"), json!(true)).unwrap();
        store.set("mid", json!(1), json!(1)).unwrap();

        let keys: Vec<_> = store.snapshot().keys().cloned().collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
        assert_eq!(store.snapshot()["zeta"], json!("z"));
        assert_eq!(store.raw_snapshot()["zeta"], json!(" Z "));
        assert_eq!(store.raw_snapshot()["alpha"], json!("yes"));
        assert_eq!(store.names().collect::<Vec<_>>(), vec!["zeta", "alpha", "mid"]);
    }
}
