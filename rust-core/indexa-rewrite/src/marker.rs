// SPDX-License-Identifier: PMPL-1.0-or-later
//! Query property markers.
//!
//! A marker tags a sub-tree with a property the executor must honour, using
//! the shape `((label = true) && (source))`. The marker survives rendering to
//! text and parsing back, so no side channel is needed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::builder::create_expression;
use crate::error::RewriteError;
use crate::node::{Literal, Node};

/// The properties a marker can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerType {
    /// Too many values matched; evaluate the source against the field instead.
    ExceededValue,
    /// Too many terms matched.
    ExceededTerm,
    /// Too many alternatives in a disjunction.
    ExceededOr,
    /// Evaluate after the index lookup.
    Delayed,
    /// Never use the index for this sub-tree.
    EvaluationOnly,
    /// The index has no coverage for this sub-tree.
    IndexHole,
    /// Merged lower and upper bound on one field.
    BoundedRange,
}

impl MarkerType {
    pub const ALL: [MarkerType; 7] = [
        MarkerType::ExceededValue,
        MarkerType::ExceededTerm,
        MarkerType::ExceededOr,
        MarkerType::Delayed,
        MarkerType::EvaluationOnly,
        MarkerType::IndexHole,
        MarkerType::BoundedRange,
    ];

    /// Identifier the marker assigns to.
    pub fn label(self) -> &'static str {
        match self {
            MarkerType::ExceededValue => "_Value_",
            MarkerType::ExceededTerm => "_Term_",
            MarkerType::ExceededOr => "_List_",
            MarkerType::Delayed => "_Delayed_",
            MarkerType::EvaluationOnly => "_Eval_",
            MarkerType::IndexHole => "_Hole_",
            MarkerType::BoundedRange => "_Bounded_",
        }
    }

    /// Whether the marked sub-tree is kept out of index planning.
    pub fn is_delayed(self) -> bool {
        !matches!(self, MarkerType::BoundedRange)
    }
}

impl fmt::Display for MarkerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for MarkerType {
    type Err = RewriteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MarkerType::ALL
            .into_iter()
            .find(|m| m.label() == s)
            .ok_or_else(|| RewriteError::UnsupportedShape(format!("unknown marker label {s}")))
    }
}

/// Tag `source` with `marker`.
///
/// A source already tagged with the same marker is returned as-is.
pub fn create_marker(source: Node, marker: MarkerType) -> Node {
    if matches!(find_marker(&source), Some((existing, _)) if existing == marker) {
        return source;
    }
    let label = Node::Assignment {
        identifier: marker.label().to_string(),
        value: Box::new(Node::boolean(true)),
    };
    Node::group(Node::And(vec![
        create_expression(label),
        create_expression(source),
    ]))
}

/// Recognize a marker, returning its type and the tagged source.
pub fn find_marker(node: &Node) -> Option<(MarkerType, &Node)> {
    let Node::And(children) = node.dereference() else {
        return None;
    };
    let [label, source] = children.as_slice() else {
        return None;
    };
    match label.dereference() {
        Node::Assignment { identifier, value }
            if matches!(value.as_ref(), Node::Literal(Literal::Bool(true))) =>
        {
            let marker = identifier.parse::<MarkerType>().ok()?;
            Some((marker, source.dereference()))
        }
        _ => None,
    }
}

pub fn is_marker(node: &Node) -> bool {
    find_marker(node).is_some()
}

/// Whether `node` is a marker of type `marker`.
pub fn is_marked(node: &Node, marker: MarkerType) -> bool {
    matches!(find_marker(node), Some((found, _)) if found == marker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{build_eq, create_and};

    #[test]
    fn test_marker_rendering() {
        let node = create_marker(build_eq("A", "x"), MarkerType::ExceededValue);
        assert_eq!(node.to_string(), "((_Value_ = true) && (A == 'x'))");
    }

    #[test]
    fn test_find_marker_returns_source() {
        let source = create_and(vec![build_eq("A", "x"), build_eq("B", "y")]);
        let node = create_marker(source.clone(), MarkerType::Delayed);
        let (marker, found) = find_marker(&node).unwrap();
        assert_eq!(marker, MarkerType::Delayed);
        assert_eq!(found, &source);
    }

    #[test]
    fn test_marking_is_idempotent() {
        let once = create_marker(build_eq("A", "x"), MarkerType::IndexHole);
        let twice = create_marker(once.clone(), MarkerType::IndexHole);
        assert_eq!(once, twice);

        let nested = create_marker(once.clone(), MarkerType::Delayed);
        assert_ne!(nested, once);
        assert!(is_marked(&nested, MarkerType::Delayed));
    }

    #[test]
    fn test_plain_conjunction_is_not_marker() {
        let node = create_and(vec![build_eq("A", "x"), build_eq("B", "y")]);
        assert!(!is_marker(&node));
        assert!(!is_marker(&build_eq("A", "x")));
    }

    #[test]
    fn test_delayed_classification() {
        for marker in MarkerType::ALL {
            assert_eq!(marker.is_delayed(), marker != MarkerType::BoundedRange);
        }
    }

    #[test]
    fn test_label_roundtrip() {
        for marker in MarkerType::ALL {
            assert_eq!(marker.to_string().parse::<MarkerType>().unwrap(), marker);
        }
        assert!("_Nope_".parse::<MarkerType>().is_err());
    }
}
