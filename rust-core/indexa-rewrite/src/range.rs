// SPDX-License-Identifier: PMPL-1.0-or-later
//! Literal range accumulator.
//!
//! Folds a stream of bound comparisons on one field into a single interval.
//! Under `And` the bounds intersect (each update may only tighten), under `Or`
//! they union (each update may only loosen). On equal values the tie goes to
//! the exclusive bound when tightening and to the inclusive one when loosening.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::node::{CompareOp, Node};
use crate::ContainerType;

/// An `f64` with a total order, for decimal range bounds.
///
/// `-0.0` and `0.0` are the same key, so a tie between them goes through the
/// inclusive/exclusive rules like any other equal pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FloatKey(pub f64);

impl FloatKey {
    /// A key with negative zero folded into positive zero.
    pub fn new(value: f64) -> Self {
        FloatKey(value + 0.0)
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl From<f64> for FloatKey {
    fn from(value: f64) -> Self {
        FloatKey::new(value)
    }
}

impl PartialEq for FloatKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FloatKey {}

impl PartialOrd for FloatKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloatKey {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.0 == other.0 {
            Ordering::Equal
        } else {
            self.0.total_cmp(&other.0)
        }
    }
}

impl fmt::Display for FloatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One field's merged interval.
#[derive(Debug, Clone, PartialEq)]
pub struct LiteralRange<T> {
    field_name: Option<String>,
    lower: Option<T>,
    lower_inclusive: Option<bool>,
    lower_provenance: Option<Node>,
    upper: Option<T>,
    upper_inclusive: Option<bool>,
    upper_provenance: Option<Node>,
    combine_policy: ContainerType,
}

impl<T: Ord + Clone> LiteralRange<T> {
    /// An empty range with no field.
    pub fn new(combine_policy: ContainerType) -> Self {
        Self {
            field_name: None,
            lower: None,
            lower_inclusive: None,
            lower_provenance: None,
            upper: None,
            upper_inclusive: None,
            upper_provenance: None,
            combine_policy,
        }
    }

    /// An empty range for `field`.
    pub fn for_field(field: impl Into<String>, combine_policy: ContainerType) -> Self {
        let mut range = Self::new(combine_policy);
        range.field_name = Some(field.into());
        range
    }

    pub fn field_name(&self) -> Option<&str> {
        self.field_name.as_deref()
    }

    pub fn set_field_name(&mut self, field: impl Into<String>) {
        self.field_name = Some(field.into());
    }

    pub fn lower(&self) -> Option<&T> {
        self.lower.as_ref()
    }

    pub fn is_lower_inclusive(&self) -> Option<bool> {
        self.lower_inclusive
    }

    /// The comparison the current lower bound came from.
    pub fn lower_provenance(&self) -> Option<&Node> {
        self.lower_provenance.as_ref()
    }

    pub fn upper(&self) -> Option<&T> {
        self.upper.as_ref()
    }

    pub fn is_upper_inclusive(&self) -> Option<bool> {
        self.upper_inclusive
    }

    pub fn upper_provenance(&self) -> Option<&Node> {
        self.upper_provenance.as_ref()
    }

    pub fn combine_policy(&self) -> ContainerType {
        self.combine_policy
    }

    /// Offer a lower bound. Returns true if it was adopted.
    pub fn update_lower(&mut self, candidate: T, inclusive: bool, provenance: Option<Node>) -> bool {
        let adopt = match (&self.lower, self.lower_inclusive) {
            (Some(current), current_inclusive) => {
                let current_inclusive = current_inclusive.unwrap_or(false);
                match (self.combine_policy, current.cmp(&candidate)) {
                    (ContainerType::And, Ordering::Less) => true,
                    (ContainerType::And, Ordering::Equal) => current_inclusive && !inclusive,
                    (ContainerType::Or, Ordering::Greater) => true,
                    (ContainerType::Or, Ordering::Equal) => !current_inclusive && inclusive,
                    _ => false,
                }
            }
            (None, _) => true,
        };
        if adopt {
            self.lower = Some(candidate);
            self.lower_inclusive = Some(inclusive);
            self.lower_provenance = provenance;
        }
        adopt
    }

    /// Offer an upper bound. Returns true if it was adopted.
    pub fn update_upper(&mut self, candidate: T, inclusive: bool, provenance: Option<Node>) -> bool {
        let adopt = match (&self.upper, self.upper_inclusive) {
            (Some(current), current_inclusive) => {
                let current_inclusive = current_inclusive.unwrap_or(false);
                match (self.combine_policy, current.cmp(&candidate)) {
                    (ContainerType::And, Ordering::Greater) => true,
                    (ContainerType::And, Ordering::Equal) => current_inclusive && !inclusive,
                    (ContainerType::Or, Ordering::Less) => true,
                    (ContainerType::Or, Ordering::Equal) => !current_inclusive && inclusive,
                    _ => false,
                }
            }
            (None, _) => true,
        };
        if adopt {
            self.upper = Some(candidate);
            self.upper_inclusive = Some(inclusive);
            self.upper_provenance = provenance;
        }
        adopt
    }

    /// Route a bound comparison to the matching side.
    ///
    /// Returns false without changing anything for non-range operators.
    pub fn update(&mut self, op: CompareOp, value: T, provenance: Option<Node>) -> bool {
        if !op.is_range() {
            return false;
        }
        let adopted = if op.is_upper_bound() {
            self.update_upper(value, op.is_inclusive(), provenance)
        } else {
            self.update_lower(value, op.is_inclusive(), provenance)
        };
        trace!(
            field = self.field_name.as_deref().unwrap_or(""),
            op = %op,
            adopted,
            "Folded range bound"
        );
        adopted
    }

    /// Fold the bounds of `other` into this range under this range's policy.
    pub fn merge(&mut self, other: &LiteralRange<T>) {
        if self.field_name.is_none() {
            self.field_name = other.field_name.clone();
        }
        if let Some(lower) = &other.lower {
            self.update_lower(
                lower.clone(),
                other.lower_inclusive.unwrap_or(false),
                other.lower_provenance.clone(),
            );
        }
        if let Some(upper) = &other.upper {
            self.update_upper(
                upper.clone(),
                other.upper_inclusive.unwrap_or(false),
                other.upper_provenance.clone(),
            );
        }
    }

    /// True once both bounds and the field are known.
    pub fn is_bounded(&self) -> bool {
        self.lower.is_some() && self.upper.is_some() && self.field_name.is_some()
    }

    /// Whether `value` lies within both recorded bounds.
    pub fn contains(&self, value: &T) -> bool {
        let (Some(lower), Some(upper)) = (&self.lower, &self.upper) else {
            return false;
        };
        let above = match value.cmp(lower) {
            Ordering::Greater => true,
            Ordering::Equal => self.lower_inclusive.unwrap_or(false),
            Ordering::Less => false,
        };
        let below = match value.cmp(upper) {
            Ordering::Less => true,
            Ordering::Equal => self.upper_inclusive.unwrap_or(false),
            Ordering::Greater => false,
        };
        above && below
    }
}

impl<T: fmt::Display> fmt::Display for LiteralRange<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(field) = &self.field_name {
            write!(f, "{field}:")?;
        }
        let open = if self.lower.is_some() && self.lower_inclusive == Some(true) {
            '['
        } else {
            '('
        };
        let close = if self.upper.is_some() && self.upper_inclusive == Some(true) {
            ']'
        } else {
            ')'
        };
        write!(f, "{open}")?;
        match &self.lower {
            Some(lower) => write!(f, "{lower}")?,
            None => f.write_str("-inf")?,
        }
        f.write_str(", ")?;
        match &self.upper {
            Some(upper) => write!(f, "{upper}")?,
            None => f.write_str("+inf")?,
        }
        write!(f, "{close}")
    }
}
