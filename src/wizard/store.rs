//! Draft and result storage for a single wizard instance.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Uncommitted field values, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Draft {
    fields: BTreeMap<String, Value>,
}

impl Draft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_field(key, value);
        self
    }

    /// Shallow merge: the value under `key` is replaced wholesale.
    pub fn set_field(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Decode a field into a typed value; `None` when missing or mistyped.
    pub fn parse<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.fields
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Array field as strings, skipping non-string entries.
    pub fn text_list(&self, key: &str) -> Vec<String> {
        match self.fields.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(&self.fields).unwrap_or(Value::Null)
    }
}

/// Draft plus the last committed result.
///
/// The result is only ever replaced as a whole, and only from inside the crate.
///
/// It is kept together with the draft it was generated from; the live draft may
/// have moved on since.
#[derive(Debug, Clone)]
pub struct Store<O> {
    initial: Draft,
    draft: Draft,
    result: Option<(Draft, O)>,
}

impl<O> Store<O> {
    pub fn new(initial: Draft) -> Self {
        Self {
            draft: initial.clone(),
            initial,
            result: None,
        }
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn result(&self) -> Option<&O> {
        self.result.as_ref().map(|(_, r)| r)
    }

    /// Draft snapshot the current result was produced from.
    pub fn result_source(&self) -> Option<&Draft> {
        self.result.as_ref().map(|(d, _)| d)
    }

    pub fn set_field(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.draft.set_field(key, value);
    }

    /// Fold a generation output into a fresh result using the draft it was produced from.
    pub(crate) fn commit_draft_to_result<G>(
        &mut self,
        snapshot: &Draft,
        generated: G,
        mapper: impl FnOnce(&Draft, G) -> O,
    ) -> &O {
        let output = mapper(snapshot, generated);
        &self.result.insert((snapshot.clone(), output)).1
    }

    pub(crate) fn reset(&mut self) {
        self.draft = self.initial.clone();
        self.result = None;
    }
}
