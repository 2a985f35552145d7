// SPDX-License-Identifier: PMPL-1.0-or-later
//! Field/value expansion: rewrites an unfielded comparison using the fields
//! and values an index lookup found for it.

use tracing::{debug, trace, warn};

use crate::builder::{
    build_comparison, build_like_original, combine, deconstruct_identifier, identifier_name,
};
use crate::config::ExpansionConfig;
use crate::error::RewriteError;
use crate::lookup::IndexLookupMap;
use crate::marker::{create_marker, MarkerType};
use crate::node::{CompareOp, FieldValue, Node};
use crate::ContainerType;

/// The field/value expander.
///
/// Turns a comparison such as `_ANYFIELD_ == 'x'` into the concrete clauses
/// the index lookup supports, e.g. `(A == 'x' || B == 'x')`:
/// 1. Optionally collapse all discovered fields onto the original identifiers
/// 2. Optionally keep the original clause, dropping lookups it already covers
/// 3. Build one replacement per field (a comparison per value, or a marker
///    when the field's values overflowed)
/// 4. Join the replacements under the requested connective
pub struct Expander {
    config: ExpansionConfig,
}

impl Expander {
    /// Create a new expander with the given configuration.
    pub fn new(config: ExpansionConfig) -> Self {
        Self { config }
    }

    /// Get a reference to the current configuration.
    pub fn config(&self) -> &ExpansionConfig {
        &self.config
    }

    /// Rewrite `original` against the lookup snapshot.
    ///
    /// `negated` means `original` sits under a negation; it flips the
    /// generated comparisons to `!=` and changes what an empty expansion
    /// collapses to.
    pub fn expand(
        &self,
        container: ContainerType,
        negated: bool,
        original: &Node,
        mut lookup: IndexLookupMap,
    ) -> Result<Node, RewriteError> {
        if !self.config.expand_fields && !self.config.expand_values {
            trace!("Field and value expansion disabled; keeping original");
            return Ok(original.clone());
        }

        if lookup.is_key_threshold_exceeded() {
            warn!(original = %original, "Index lookup exceeded the key threshold");
            return Err(RewriteError::KeyThresholdExceeded);
        }

        debug!(
            container = %container,
            negated,
            fields = lookup.len(),
            keep_original = self.config.keep_original,
            "Expanding unfielded term"
        );

        // 1. Collapse every field's values onto the identifiers already present
        if !self.config.expand_fields {
            let merged = lookup.union_all();
            let names: Vec<String> = original
                .identifier_names()
                .iter()
                .map(|name| deconstruct_identifier(name))
                .collect();
            lookup = lookup.rekeyed(&merged, &names);
        }

        let mut children = Vec::with_capacity(lookup.len() + 1);

        // 2. Keep the original and drop the lookups it already satisfies
        if self.config.keep_original {
            children.push(original.clone());
            let names = original.identifier_names();
            for literal in original.literal_values() {
                let Some(value) = literal.as_text() else {
                    continue;
                };
                for name in &names {
                    let field = deconstruct_identifier(name);
                    if lookup.remove_value(&field, value) {
                        debug!(field = %field, value, "Dropped lookup covered by original");
                    }
                }
            }
        }

        // 3. One replacement per field, in field order
        let fields: Vec<String> = lookup.keys().map(str::to_string).collect();
        for field in &fields {
            if let Some(child) = self.expand_field(field, &lookup, original, container, negated)? {
                children.push(child);
            }
        }

        // 4. Reduce
        match children.len() {
            0 if negated => {
                debug!("Negated term matched nothing; keeping original");
                Ok(original.clone())
            }
            0 => {
                debug!("Term matched nothing; pruning to false");
                Ok(Node::falsy())
            }
            1 => children.pop().ok_or(RewriteError::EmptyJunction),
            _ => combine(container, children),
        }
    }

    /// Build the replacement for a single field, or `None` if nothing is left
    /// to match for it.
    pub fn expand_field(
        &self,
        field: &str,
        lookup: &IndexLookupMap,
        original: &Node,
        container: ContainerType,
        negated: bool,
    ) -> Result<Option<Node>, RewriteError> {
        if !self.config.expand_values {
            let mut copy = original.clone();
            copy.rename_identifiers(&self.config.any_field, &identifier_name(field));
            return Ok(Some(copy));
        }

        let Some(values) = lookup.get(field) else {
            return Ok(None);
        };

        if values.is_threshold_exceeded() {
            return self.exceeded_fallback(field, lookup, original, container).map(Some);
        }

        let op = if negated { CompareOp::Ne } else { CompareOp::Eq };
        let mut nodes = values
            .iter()
            .map(|value| build_comparison(op, field, FieldValue::from(value)))
            .collect::<Result<Vec<_>, _>>()?;

        trace!(field, values = nodes.len(), "Expanded field values");
        match nodes.len() {
            0 => Ok(None),
            1 => Ok(nodes.pop()),
            _ => combine(container, nodes).map(Some),
        }
    }

    fn exceeded_fallback(
        &self,
        field: &str,
        lookup: &IndexLookupMap,
        original: &Node,
        container: ContainerType,
    ) -> Result<Node, RewriteError> {
        let patterns = lookup.fallback_patterns();
        debug!(
            field,
            patterns = patterns.len(),
            "Value threshold exceeded; marking field for evaluation"
        );

        match patterns {
            [] => {
                let copy = build_like_original(original, field, None)?;
                Ok(create_marker(copy, MarkerType::ExceededValue))
            }
            [pattern] => {
                let copy = build_like_original(original, field, Some(pattern.into()))?;
                Ok(create_marker(copy, MarkerType::ExceededValue))
            }
            many => {
                let markers = many
                    .iter()
                    .map(|pattern| {
                        build_like_original(original, field, Some(pattern.into()))
                            .map(|copy| create_marker(copy, MarkerType::ExceededValue))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                combine(container, markers)
            }
        }
    }
}

/// Expand `original` against `lookup` with explicit flags.
///
/// Uses the default `_ANYFIELD_` placeholder.
pub fn expand(
    container: ContainerType,
    negated: bool,
    original: &Node,
    lookup: IndexLookupMap,
    expand_fields: bool,
    expand_values: bool,
    keep_original: bool,
) -> Result<Node, RewriteError> {
    let config = ExpansionConfig {
        expand_fields,
        expand_values,
        keep_original,
        ..ExpansionConfig::default()
    };
    Expander::new(config).expand(container, negated, original, lookup)
}

/// Replacement for one field with explicit flags.
pub fn expand_field(
    field: &str,
    lookup: &IndexLookupMap,
    original: &Node,
    container: ContainerType,
    expand_values: bool,
    negated: bool,
) -> Result<Option<Node>, RewriteError> {
    let config = ExpansionConfig {
        expand_values,
        ..ExpansionConfig::default()
    };
    Expander::new(config).expand_field(field, lookup, original, container, negated)
}
