//! crates/personnel_core/src/filter.rs
//!
//! The filter composer. Turns user-entered filter criteria into the query
//! parameters of a list request and decides when a criterion change should
//! trigger a refetch.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde_json::Value;
use tracing::warn;

//=========================================================================================
// Query Parameters
//=========================================================================================

/// Normalized outgoing query parameters. Keys are never present with an empty value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(BTreeMap<String, String>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter, dropping it if the value is blank.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        if !value.trim().is_empty() {
            self.0.insert(key.into(), value);
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

//=========================================================================================
// Filter Criteria
//=========================================================================================

/// One filter value as entered by the user.
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    Empty,
    Text(String),
    Date(NaiveDate),
    Flag(bool),
}

impl Criterion {
    /// The wire form, or `None` when the criterion must be omitted.
    pub fn to_param(&self) -> Option<String> {
        match self {
            Criterion::Empty => None,
            Criterion::Text(text) if text.trim().is_empty() => None,
            Criterion::Text(text) => Some(text.clone()),
            Criterion::Date(date) => Some(date.format("%Y-%m-%d").to_string()),
            Criterion::Flag(flag) => Some(flag.to_string()),
        }
    }
}

impl From<&str> for Criterion {
    fn from(value: &str) -> Self {
        Criterion::Text(value.to_string())
    }
}

impl From<String> for Criterion {
    fn from(value: String) -> Self {
        Criterion::Text(value)
    }
}

impl From<NaiveDate> for Criterion {
    fn from(value: NaiveDate) -> Self {
        Criterion::Date(value)
    }
}

impl From<bool> for Criterion {
    fn from(value: bool) -> Self {
        Criterion::Flag(value)
    }
}

impl<T: Into<Criterion>> From<Option<T>> for Criterion {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Criterion::Empty)
    }
}

impl From<&Value> for Criterion {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Criterion::Empty,
            Value::Bool(flag) => Criterion::Flag(*flag),
            Value::String(text) => Criterion::Text(text.clone()),
            other => Criterion::Text(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterCriteria {
    entries: BTreeMap<String, Criterion>,
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds criteria from a JSON object; non-object input yields no criteria.
    pub fn from_json(value: &Value) -> Self {
        let mut criteria = Self::new();
        if let Value::Object(map) = value {
            for (key, value) in map {
                criteria.set(key.clone(), value);
            }
        }
        criteria
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Criterion>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Criterion> {
        self.entries.get(key)
    }

    pub fn clear(&mut self, key: &str) {
        self.entries.remove(key);
    }

    /// Drops every empty criterion. Start/end date bounds pass through unchecked.
    pub fn normalize(&self) -> QueryParams {
        warn_on_inverted_range(self);
        let mut params = QueryParams::new();
        for (key, criterion) in &self.entries {
            if let Some(value) = criterion.to_param() {
                params.insert(key.clone(), value);
            }
        }
        params
    }
}

fn warn_on_inverted_range(criteria: &FilterCriteria) {
    if let (Some(Criterion::Date(start)), Some(Criterion::Date(end))) =
        (criteria.get("start_date"), criteria.get("end_date"))
    {
        if start > end {
            warn!(%start, %end, "Date filter range is inverted; sending as entered.");
        }
    }
}

//=========================================================================================
// Reactive Filter State
//=========================================================================================

/// What the view should do after a filter edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefetchDecision {
    /// The applied query changed; refetch now.
    Refetch,
    /// Free-text input buffered until the explicit search action.
    Deferred,
    /// The normalized query is unchanged.
    Unchanged,
}

/// Applied criteria plus buffered free-text input for one list view.
#[derive(Debug, Clone, Default)]
pub struct FilterState {
    applied: FilterCriteria,
    pending_text: BTreeMap<String, String>,
    text_keys: BTreeSet<String>,
}

impl FilterState {
    pub fn new(text_keys: &[&str]) -> Self {
        Self {
            applied: FilterCriteria::new(),
            pending_text: BTreeMap::new(),
            text_keys: text_keys.iter().map(|k| k.to_string()).collect(),
        }
    }

    pub fn is_text_key(&self, key: &str) -> bool {
        self.text_keys.contains(key)
    }

    /// Records an edit. Structured criteria apply immediately; free-text keys wait.
    pub fn set(&mut self, key: &str, value: impl Into<Criterion>) -> RefetchDecision {
        let value = value.into();
        if self.is_text_key(key) {
            self.pending_text
                .insert(key.to_string(), value.to_param().unwrap_or_default());
            return RefetchDecision::Deferred;
        }
        let before = self.applied.normalize();
        self.applied.set(key, value);
        if self.applied.normalize() == before {
            RefetchDecision::Unchanged
        } else {
            RefetchDecision::Refetch
        }
    }

    /// The explicit search action: applies every buffered free-text value.
    pub fn submit_search(&mut self) -> RefetchDecision {
        let before = self.applied.normalize();
        for (key, text) in std::mem::take(&mut self.pending_text) {
            self.applied.set(key, text);
        }
        if self.applied.normalize() == before {
            RefetchDecision::Unchanged
        } else {
            RefetchDecision::Refetch
        }
    }

    /// Replaces the applied criteria wholesale, dropping buffered text.
    pub fn replace(&mut self, criteria: FilterCriteria) {
        self.applied = criteria;
        self.pending_text.clear();
    }

    pub fn pending_text(&self, key: &str) -> Option<&str> {
        self.pending_text.get(key).map(String::as_str)
    }

    pub fn query(&self) -> QueryParams {
        self.applied.normalize()
    }
}
