// SPDX-License-Identifier: PMPL-1.0-or-later
//! Indexa Rewrite
//!
//! Index-driven query rewriting for Indexa.
//! Expands comparisons against unresolved fields into concrete boolean trees
//! using the fields and values an inverted-index lookup discovered, and folds
//! bound comparisons on the same field into scan ranges.

pub mod bounded;
pub mod builder;
pub mod config;
pub mod error;
pub mod expand;
pub mod lookup;
pub mod marker;
pub mod node;
pub mod range;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use bounded::{BoundedRange, RangeDecomposition, RangeFinder, RangeKind, TypedRange};
pub use builder::NodeShape;
pub use config::{ExpansionConfig, RangeConfig, RewriteConfig};
pub use error::RewriteError;
pub use expand::Expander;
pub use lookup::{IndexLookupMap, ValueSet};
pub use marker::MarkerType;
pub use node::{CompareOp, FieldValue, Literal, Node, NumberKind, NumberLiteral, NumberValue};
pub use range::{FloatKey, LiteralRange};

/// The boolean connective used to hold several generated clauses.
///
/// Also selects the merge policy of a [`LiteralRange`]: `And` intersects bounds,
/// `Or` unions them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerType {
    And,
    Or,
}

impl ContainerType {
    pub const ALL: [ContainerType; 2] = [ContainerType::And, ContainerType::Or];

    /// Build a connective of this type over `children` without grouping it.
    pub fn connective(self, children: Vec<Node>) -> Node {
        match self {
            ContainerType::And => Node::And(children),
            ContainerType::Or => Node::Or(children),
        }
    }

    /// Whether `node` is a connective of this type.
    pub fn matches(self, node: &Node) -> bool {
        matches!(
            (self, node),
            (ContainerType::And, Node::And(_)) | (ContainerType::Or, Node::Or(_))
        )
    }

    /// The dual connective.
    pub fn flip(self) -> ContainerType {
        match self {
            ContainerType::And => ContainerType::Or,
            ContainerType::Or => ContainerType::And,
        }
    }
}

impl fmt::Display for ContainerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerType::And => write!(f, "and"),
            ContainerType::Or => write!(f, "or"),
        }
    }
}

impl FromStr for ContainerType {
    type Err = RewriteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "and" | "&&" => Ok(ContainerType::And),
            "or" | "||" => Ok(ContainerType::Or),
            _ => Err(RewriteError::UnknownContainer(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_display_roundtrip() {
        for ct in ContainerType::ALL {
            let s = ct.to_string();
            let parsed: ContainerType = s.parse().unwrap();
            assert_eq!(ct, parsed);
        }
    }

    #[test]
    fn test_container_parse_operators() {
        assert_eq!("AND".parse::<ContainerType>().unwrap(), ContainerType::And);
        assert_eq!("||".parse::<ContainerType>().unwrap(), ContainerType::Or);
    }

    #[test]
    fn test_unknown_container_error() {
        assert!(matches!(
            "xor".parse::<ContainerType>(),
            Err(RewriteError::UnknownContainer(_))
        ));
    }

    #[test]
    fn test_container_serde_roundtrip() {
        for ct in ContainerType::ALL {
            let json = serde_json::to_string(&ct).unwrap();
            let parsed: ContainerType = serde_json::from_str(&json).unwrap();
            assert_eq!(ct, parsed);
        }
        assert_eq!(serde_json::to_string(&ContainerType::Or).unwrap(), "\"or\"");
    }

    #[test]
    fn test_connective_matches() {
        let node = ContainerType::Or.connective(vec![Node::boolean(true)]);
        assert!(ContainerType::Or.matches(&node));
        assert!(!ContainerType::And.matches(&node));
        assert_eq!(ContainerType::And.flip(), ContainerType::Or);
    }
}
