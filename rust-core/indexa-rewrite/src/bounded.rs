// SPDX-License-Identifier: PMPL-1.0-or-later
//! Range decomposition.
//!
//! Pulls bound comparisons (`<`, `<=`, `>`, `>=`) out of a conjunction and
//! folds them per field into scan ranges. A field gets a [`BoundedRange`] only
//! when both ends are known; half-open bounds are handed back untouched with
//! the rest of the conjunction.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, warn};

use crate::builder::{build_comparison, combine, create_expression};
use crate::config::RangeConfig;
use crate::error::RewriteError;
use crate::marker::{create_marker, find_marker, MarkerType};
use crate::node::{CompareOp, FieldValue, Literal, Node, NumberKind, NumberLiteral, NumberValue};
use crate::range::{FloatKey, LiteralRange};
use crate::ContainerType;

/// How a range's bound values are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RangeKind {
    Text,
    Integer,
    Decimal,
}

/// A literal range over one of the orderable literal kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedRange {
    Text(LiteralRange<String>),
    Integer(LiteralRange<i64>),
    Decimal(LiteralRange<FloatKey>),
}

/// A bound value extracted from a literal.
#[derive(Debug, Clone)]
enum BoundValue {
    Text(String),
    Integer(i64),
    Decimal(FloatKey),
}

impl BoundValue {
    fn from_literal(literal: &Literal) -> Result<Self, RewriteError> {
        match literal {
            Literal::String(s) => Ok(BoundValue::Text(s.clone())),
            Literal::Number(n) => match (n.kind(), n.as_i64(), n.as_f64()) {
                (NumberKind::Integer, Some(i), _) => Ok(BoundValue::Integer(i)),
                (_, _, Some(f)) if f.is_finite() => Ok(BoundValue::Decimal(FloatKey::new(f))),
                _ => Err(RewriteError::NumericLiteral(n.text().to_string())),
            },
            other => Err(RewriteError::UnsupportedLiteral(other.to_string())),
        }
    }

    fn kind(&self) -> RangeKind {
        match self {
            BoundValue::Text(_) => RangeKind::Text,
            BoundValue::Integer(_) => RangeKind::Integer,
            BoundValue::Decimal(_) => RangeKind::Decimal,
        }
    }
}

impl TypedRange {
    fn empty(field: &str, kind: RangeKind, policy: ContainerType) -> Self {
        match kind {
            RangeKind::Text => TypedRange::Text(LiteralRange::for_field(field, policy)),
            RangeKind::Integer => TypedRange::Integer(LiteralRange::for_field(field, policy)),
            RangeKind::Decimal => TypedRange::Decimal(LiteralRange::for_field(field, policy)),
        }
    }

    fn update(&mut self, op: CompareOp, value: BoundValue, provenance: Node) -> bool {
        match (self, value) {
            (TypedRange::Text(r), BoundValue::Text(v)) => r.update(op, v, Some(provenance)),
            (TypedRange::Integer(r), BoundValue::Integer(v)) => r.update(op, v, Some(provenance)),
            (TypedRange::Decimal(r), BoundValue::Decimal(v)) => r.update(op, v, Some(provenance)),
            _ => false,
        }
    }

    pub fn kind(&self) -> RangeKind {
        match self {
            TypedRange::Text(_) => RangeKind::Text,
            TypedRange::Integer(_) => RangeKind::Integer,
            TypedRange::Decimal(_) => RangeKind::Decimal,
        }
    }

    pub fn field_name(&self) -> Option<&str> {
        match self {
            TypedRange::Text(r) => r.field_name(),
            TypedRange::Integer(r) => r.field_name(),
            TypedRange::Decimal(r) => r.field_name(),
        }
    }

    pub fn is_bounded(&self) -> bool {
        match self {
            TypedRange::Text(r) => r.is_bounded(),
            TypedRange::Integer(r) => r.is_bounded(),
            TypedRange::Decimal(r) => r.is_bounded(),
        }
    }

    /// Fold `other` into this range. Returns false if the kinds differ.
    pub fn merge(&mut self, other: &TypedRange) -> bool {
        match (self, other) {
            (TypedRange::Text(a), TypedRange::Text(b)) => a.merge(b),
            (TypedRange::Integer(a), TypedRange::Integer(b)) => a.merge(b),
            (TypedRange::Decimal(a), TypedRange::Decimal(b)) => a.merge(b),
            _ => return false,
        }
        true
    }

    /// The same bounds, re-tagged with a different combine policy.
    fn with_policy(&self, policy: ContainerType) -> TypedRange {
        let mut fresh = match self.field_name() {
            Some(field) => TypedRange::empty(field, self.kind(), policy),
            None => match self.kind() {
                RangeKind::Text => TypedRange::Text(LiteralRange::new(policy)),
                RangeKind::Integer => TypedRange::Integer(LiteralRange::new(policy)),
                RangeKind::Decimal => TypedRange::Decimal(LiteralRange::new(policy)),
            },
        };
        fresh.merge(self);
        fresh
    }

    /// Operator and literal of the lower and upper bounds, if set.
    ///
    /// The literal is taken from the source comparison when there is one, so
    /// numbers keep the text they were written with.
    fn bound_nodes(&self) -> Result<[Option<(CompareOp, Node)>; 2], RewriteError> {
        fn side<T>(
            value: Option<&T>,
            inclusive: Option<bool>,
            provenance: Option<&Node>,
            ops: (CompareOp, CompareOp),
            encode: impl Fn(&T) -> Result<Node, RewriteError>,
        ) -> Result<Option<(CompareOp, Node)>, RewriteError> {
            let Some(value) = value else {
                return Ok(None);
            };
            let op = if inclusive.unwrap_or(false) { ops.0 } else { ops.1 };
            let literal = match provenance.and_then(Node::literal) {
                Some(lit) => Node::Literal(lit.clone()),
                None => encode(value)?,
            };
            Ok(Some((op, literal)))
        }

        let lower_ops = (CompareOp::Ge, CompareOp::Gt);
        let upper_ops = (CompareOp::Le, CompareOp::Lt);
        Ok(match self {
            TypedRange::Text(r) => {
                let encode =
                    |v: &String| -> Result<Node, RewriteError> { Ok(Node::string(v.clone())) };
                [
                    side(r.lower(), r.is_lower_inclusive(), r.lower_provenance(), lower_ops, encode)?,
                    side(r.upper(), r.is_upper_inclusive(), r.upper_provenance(), upper_ops, encode)?,
                ]
            }
            TypedRange::Integer(r) => {
                let encode = |v: &i64| -> Result<Node, RewriteError> {
                    NumberLiteral::from_value(NumberValue::Integer(*v)).map(Node::number)
                };
                [
                    side(r.lower(), r.is_lower_inclusive(), r.lower_provenance(), lower_ops, encode)?,
                    side(r.upper(), r.is_upper_inclusive(), r.upper_provenance(), upper_ops, encode)?,
                ]
            }
            TypedRange::Decimal(r) => {
                let encode = |v: &FloatKey| -> Result<Node, RewriteError> {
                    NumberLiteral::from_value(NumberValue::Float(v.value())).map(Node::number)
                };
                [
                    side(r.lower(), r.is_lower_inclusive(), r.lower_provenance(), lower_ops, encode)?,
                    side(r.upper(), r.is_upper_inclusive(), r.upper_provenance(), upper_ops, encode)?,
                ]
            }
        })
    }
}

impl fmt::Display for TypedRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedRange::Text(r) => write!(f, "{r}"),
            TypedRange::Integer(r) => write!(f, "{r}"),
            TypedRange::Decimal(r) => write!(f, "{r}"),
        }
    }
}

/// A field interval with both ends known, plus the comparisons it replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundedRange {
    range: TypedRange,
    nodes: Vec<Node>,
}

impl BoundedRange {
    pub fn range(&self) -> &TypedRange {
        &self.range
    }

    /// The source comparisons folded into this range, in tree order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn field_name(&self) -> Option<&str> {
        self.range.field_name()
    }

    /// Render the range as `((_Bounded_ = true) && ((F >= lo) && (F <= hi)))`.
    pub fn to_node(&self) -> Result<Node, RewriteError> {
        let field = self.range.field_name().ok_or_else(|| {
            RewriteError::UnsupportedShape("bounded range has no field".to_string())
        })?;
        let mut bounds = Vec::with_capacity(2);
        for (op, literal) in self.range.bound_nodes()?.into_iter().flatten() {
            let cmp = build_comparison(op, field, FieldValue::Node(Box::new(literal)))?;
            bounds.push(create_expression(cmp));
        }
        let source = combine(ContainerType::And, bounds)?;
        Ok(create_marker(source, MarkerType::BoundedRange))
    }
}

/// Result of splitting a conjunction into scan ranges and everything else.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeDecomposition {
    pub ranges: Vec<BoundedRange>,
    pub other_nodes: Vec<Node>,
}

/// A range comparison waiting to be folded.
struct Candidate {
    seq: usize,
    op: CompareOp,
    value: BoundValue,
    node: Node,
}

/// Conjuncts gathered by one decomposition, numbered in tree order.
#[derive(Default)]
struct Collected {
    groups: BTreeMap<(String, RangeKind), Vec<Candidate>>,
    others: Vec<(usize, Node)>,
    next: usize,
}

impl Collected {
    fn bump(&mut self) -> usize {
        let seq = self.next;
        self.next += 1;
        seq
    }

    fn other(&mut self, node: &Node) {
        let seq = self.bump();
        self.others.push((seq, node.clone()));
    }

    fn candidate(&mut self, field: &str, op: CompareOp, value: BoundValue, node: &Node) {
        let seq = self.bump();
        self.groups
            .entry((field.to_string(), value.kind()))
            .or_default()
            .push(Candidate {
                seq,
                op,
                value,
                node: node.clone(),
            });
    }
}

/// Finds mergeable bound comparisons in a predicate tree.
pub struct RangeFinder {
    config: RangeConfig,
}

impl RangeFinder {
    pub fn new(config: RangeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RangeConfig {
        &self.config
    }

    /// Split the conjunction at `root` into bounded ranges and other nodes.
    ///
    /// A root that is not a conjunction is treated as a conjunction of one.
    /// `other_nodes` keeps the tree order of the conjuncts it holds, including
    /// comparisons whose range stayed open on one side.
    pub fn decompose(&self, root: &Node) -> Result<RangeDecomposition, RewriteError> {
        let mut collected = Collected::default();

        match root.dereference() {
            Node::And(children) if find_marker(root).is_none() => {
                self.collect(children, 1, &mut collected)?
            }
            _ => self.collect(std::slice::from_ref(root), 1, &mut collected)?,
        }

        let Collected {
            groups,
            mut others,
            ..
        } = collected;

        let mut ranges = Vec::new();
        for ((field, kind), candidates) in groups {
            let mut range = TypedRange::empty(&field, kind, ContainerType::And);
            for candidate in &candidates {
                range.update(candidate.op, candidate.value.clone(), candidate.node.clone());
            }
            if range.is_bounded() {
                debug!(
                    field = %field,
                    range = %range,
                    nodes = candidates.len(),
                    "Folded bounded range"
                );
                let nodes = candidates.into_iter().map(|c| c.node).collect();
                ranges.push(BoundedRange { range, nodes });
            } else {
                debug!(field = %field, "Range is open on one side; leaving comparisons in place");
                others.extend(candidates.into_iter().map(|c| (c.seq, c.node)));
            }
        }

        others.sort_by_key(|(seq, _)| *seq);
        Ok(RangeDecomposition {
            ranges,
            other_nodes: others.into_iter().map(|(_, node)| node).collect(),
        })
    }

    fn depth_allows(&self, depth: usize) -> bool {
        self.config.max_depth.map_or(true, |max| depth < max)
    }

    fn collect(
        &self,
        children: &[Node],
        depth: usize,
        collected: &mut Collected,
    ) -> Result<(), RewriteError> {
        for child in children {
            if let Some((marker, source)) = find_marker(child) {
                if marker.is_delayed() && self.config.include_delayed && self.depth_allows(depth) {
                    let inner = match source {
                        Node::And(grand) => grand.as_slice(),
                        _ => std::slice::from_ref(source),
                    };
                    self.collect(inner, depth + 1, collected)?;
                } else {
                    collected.other(child);
                }
                continue;
            }

            match child.dereference() {
                Node::And(grand) if self.depth_allows(depth) => {
                    self.collect(grand, depth + 1, collected)?;
                }
                Node::Comparison { op, lhs, rhs } if op.is_range() => {
                    match (lhs.dereference(), rhs.dereference()) {
                        (Node::Identifier(field), Node::Literal(literal)) => {
                            let value = BoundValue::from_literal(literal).map_err(|err| {
                                warn!(
                                    field = %field,
                                    literal = %literal,
                                    "Range literal cannot be ordered"
                                );
                                err
                            })?;
                            collected.candidate(field, *op, value, child);
                        }
                        _ => collected.other(child),
                    }
                }
                _ => collected.other(child),
            }
        }
        Ok(())
    }

    /// Merge a disjunction of bounded ranges on one field into a covering range.
    ///
    /// Returns `None` unless every disjunct is exactly one bounded range on the
    /// same field and of the same kind.
    pub fn covering_range(&self, root: &Node) -> Result<Option<TypedRange>, RewriteError> {
        let Node::Or(disjuncts) = root.dereference() else {
            return Ok(None);
        };

        let mut cover: Option<TypedRange> = None;
        for disjunct in disjuncts {
            let decomposition = self.decompose(disjunct)?;
            if !decomposition.other_nodes.is_empty() || decomposition.ranges.len() != 1 {
                return Ok(None);
            }
            let Some(bounded) = decomposition.ranges.into_iter().next() else {
                return Ok(None);
            };
            match cover.as_mut() {
                None => cover = Some(bounded.range.with_policy(ContainerType::Or)),
                Some(current) => {
                    if current.field_name() != bounded.range.field_name()
                        || !current.merge(&bounded.range)
                    {
                        return Ok(None);
                    }
                }
            }
        }
        Ok(cover)
    }
}
