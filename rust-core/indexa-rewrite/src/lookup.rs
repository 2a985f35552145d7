// SPDX-License-Identifier: PMPL-1.0-or-later
//! Index lookup results.
//!
//! An [`IndexLookupMap`] is the snapshot an inverted-index scan hands to the
//! expander: which fields hold the term, and which values matched per field.
//! Both levels can overflow a threshold, after which the values are dropped
//! and only the overflow flag is kept.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::RewriteError;

/// Values discovered for one field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValueSet {
    values: BTreeSet<String>,
    threshold: Option<usize>,
    threshold_exceeded: bool,
}

impl ValueSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// A set that overflows once it would hold more than `threshold` values.
    pub fn with_threshold(threshold: usize) -> Self {
        Self {
            threshold: Some(threshold),
            ..Self::default()
        }
    }

    /// Add a value. Returns false if the value was already present or the set
    /// has overflowed.
    pub fn insert(&mut self, value: impl Into<String>) -> bool {
        if self.threshold_exceeded {
            return false;
        }
        let added = self.values.insert(value.into());
        if let Some(limit) = self.threshold {
            if self.values.len() > limit {
                self.mark_exceeded();
                return false;
            }
        }
        added
    }

    /// Absorb every value of `other`, inheriting its overflow.
    pub fn union(&mut self, other: &ValueSet) {
        if other.threshold_exceeded {
            self.mark_exceeded();
            return;
        }
        for value in &other.values {
            self.insert(value.clone());
        }
    }

    /// Drop all values and flag the set as overflowed.
    pub fn mark_exceeded(&mut self) {
        self.threshold_exceeded = true;
        self.values.clear();
    }

    pub fn is_threshold_exceeded(&self) -> bool {
        self.threshold_exceeded
    }

    pub fn remove(&mut self, value: &str) -> bool {
        self.values.remove(value)
    }

    pub fn contains(&self, value: &str) -> bool {
        self.values.contains(value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Values in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for ValueSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = ValueSet::new();
        for value in iter {
            set.insert(value);
        }
        set
    }
}

/// Field to value-set mapping produced by an index lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexLookupMap {
    fields: BTreeMap<String, ValueSet>,
    key_threshold: Option<usize>,
    value_threshold: Option<usize>,
    key_threshold_exceeded: bool,
    patterns: Vec<String>,
}

impl IndexLookupMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// A map limited to `key_threshold` fields and `value_threshold` values
    /// per field.
    pub fn with_thresholds(key_threshold: Option<usize>, value_threshold: Option<usize>) -> Self {
        Self {
            key_threshold,
            value_threshold,
            ..Self::default()
        }
    }

    /// Load a lookup snapshot.
    pub fn from_json(json: &str) -> Result<Self, RewriteError> {
        serde_json::from_str(json).map_err(RewriteError::Serialization)
    }

    fn new_value_set(&self) -> ValueSet {
        match self.value_threshold {
            Some(limit) => ValueSet::with_threshold(limit),
            None => ValueSet::new(),
        }
    }

    /// Make room for `field`, returning false if the key threshold tripped.
    fn admit(&mut self, field: &str) -> bool {
        if self.key_threshold_exceeded {
            return false;
        }
        if self.fields.contains_key(field) {
            return true;
        }
        if let Some(limit) = self.key_threshold {
            if self.fields.len() >= limit {
                debug!(field, limit, "Index lookup exceeded key threshold");
                self.mark_key_threshold_exceeded();
                return false;
            }
        }
        let set = self.new_value_set();
        self.fields.insert(field.to_string(), set);
        true
    }

    /// Record that `value` was found in `field`.
    pub fn put(&mut self, field: &str, value: impl Into<String>) {
        if !self.admit(field) {
            return;
        }
        if let Some(set) = self.fields.get_mut(field) {
            set.insert(value);
        }
    }

    /// Merge a whole value set into `field`.
    pub fn insert_set(&mut self, field: &str, values: &ValueSet) {
        if !self.admit(field) {
            return;
        }
        if let Some(set) = self.fields.get_mut(field) {
            set.union(values);
        }
    }

    /// Flag one field's values as overflowed.
    pub fn mark_value_threshold_exceeded(&mut self, field: &str) {
        if !self.admit(field) {
            return;
        }
        if let Some(set) = self.fields.get_mut(field) {
            set.mark_exceeded();
        }
    }

    /// Drop every field and flag the lookup as overflowed.
    pub fn mark_key_threshold_exceeded(&mut self) {
        self.key_threshold_exceeded = true;
        self.fields.clear();
    }

    pub fn is_key_threshold_exceeded(&self) -> bool {
        self.key_threshold_exceeded
    }

    pub fn get(&self, field: &str) -> Option<&ValueSet> {
        self.fields.get(field)
    }

    /// Field names in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ValueSet)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Remove one (field, value) pair. The field itself stays, possibly empty.
    pub fn remove_value(&mut self, field: &str, value: &str) -> bool {
        self.fields
            .get_mut(field)
            .map(|set| set.remove(value))
            .unwrap_or(false)
    }

    /// Patterns to fall back on when a field's values overflowed.
    pub fn fallback_patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn set_patterns<I, S>(&mut self, patterns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.patterns = patterns.into_iter().map(Into::into).collect();
    }

    pub fn add_pattern(&mut self, pattern: impl Into<String>) {
        self.patterns.push(pattern.into());
    }

    /// Every field's values merged into one set.
    pub fn union_all(&self) -> ValueSet {
        let mut merged = ValueSet::new();
        for set in self.fields.values() {
            merged.union(set);
        }
        merged
    }

    /// A map holding `values` under each of `fields`, keeping this map's
    /// patterns and overflow state.
    pub fn rekeyed<I, S>(&self, values: &ValueSet, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut map = IndexLookupMap {
            fields: BTreeMap::new(),
            key_threshold: None,
            value_threshold: None,
            key_threshold_exceeded: self.key_threshold_exceeded,
            patterns: self.patterns.clone(),
        };
        if !map.key_threshold_exceeded {
            for field in fields {
                map.fields.insert(field.as_ref().to_string(), values.clone());
            }
        }
        map
    }

    pub fn clear(&mut self) {
        self.fields.clear();
        self.key_threshold_exceeded = false;
    }
}
