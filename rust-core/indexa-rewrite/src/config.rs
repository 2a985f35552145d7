// SPDX-License-Identifier: PMPL-1.0-or-later
//! Rewrite configuration.
//!
//! Defaults:
//! - any_field: `_ANYFIELD_`
//! - expand_fields / expand_values: true
//! - keep_original: false
//! - delayed sub-trees are skipped during range decomposition

use serde::{Deserialize, Serialize};

use crate::error::RewriteError;

/// Placeholder identifier standing in for an unresolved field.
pub const DEFAULT_ANY_FIELD: &str = "_ANYFIELD_";

/// Controls how an unfielded term is expanded against an index lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionConfig {
    /// Identifier renamed to the concrete field when values are not expanded.
    pub any_field: String,
    /// Emit one clause per discovered field.
    pub expand_fields: bool,
    /// Emit one clause per discovered value.
    pub expand_values: bool,
    /// Keep the original clause alongside the expansion.
    pub keep_original: bool,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            any_field: DEFAULT_ANY_FIELD.to_string(),
            expand_fields: true,
            expand_values: true,
            keep_original: false,
        }
    }
}

/// Controls how conjunctions are searched for mergeable bound comparisons.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeConfig {
    /// Descend into delayed markers as well.
    pub include_delayed: bool,
    /// Maximum nesting depth to search; `None` means unlimited.
    pub max_depth: Option<usize>,
}

/// Top-level configuration for the rewriter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriteConfig {
    pub expansion: ExpansionConfig,
    pub ranges: RangeConfig,
}

impl RewriteConfig {
    /// Load a configuration snapshot and validate it.
    pub fn from_json(json: &str) -> Result<Self, RewriteError> {
        let config: RewriteConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the rewriter cannot honour.
    pub fn validate(&self) -> Result<(), RewriteError> {
        if self.expansion.any_field.trim().is_empty() {
            return Err(RewriteError::InvalidConfig(
                "any_field must not be empty".to_string(),
            ));
        }
        if self.ranges.max_depth == Some(0) {
            return Err(RewriteError::InvalidConfig(
                "max_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
