// SPDX-License-Identifier: PMPL-1.0-or-later
//! Node builder.
//!
//! Stateless functions that build, copy and combine nodes. Every multi-child
//! connective handed back to a caller as an operand is wrapped in a `Group`,
//! so precedence survives when the tree is rendered back to text.

use tracing::trace;

use crate::error::RewriteError;
use crate::marker;
use crate::node::{CompareOp, FieldValue, Literal, Node, NumberLiteral};
use crate::ContainerType;

/// Prefix marking an identifier whose name would not otherwise parse.
pub const IDENTIFIER_PREFIX: char = '$';

// ---------------------------------------------------------------------------
// Shallow copies
// ---------------------------------------------------------------------------

/// A node variant with its payload but without its children.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeShape {
    Identifier(String),
    Literal(Literal),
    Comparison(CompareOp),
    And,
    Or,
    Not,
    Group,
    Function { namespace: String, name: String },
    Assignment { identifier: String },
    Script,
}

impl NodeShape {
    /// Capture the variant and payload of `node`.
    pub fn of(node: &Node) -> Self {
        match node {
            Node::Identifier(name) => NodeShape::Identifier(name.clone()),
            Node::Literal(lit) => NodeShape::Literal(lit.clone()),
            Node::Comparison { op, .. } => NodeShape::Comparison(*op),
            Node::And(_) => NodeShape::And,
            Node::Or(_) => NodeShape::Or,
            Node::Not(_) => NodeShape::Not,
            Node::Group(_) => NodeShape::Group,
            Node::Function {
                namespace, name, ..
            } => NodeShape::Function {
                namespace: namespace.clone(),
                name: name.clone(),
            },
            Node::Assignment { identifier, .. } => NodeShape::Assignment {
                identifier: identifier.clone(),
            },
            Node::Script(_) => NodeShape::Script,
        }
    }

    /// Re-attach children, rejecting a count the variant cannot hold.
    pub fn with_children(self, children: Vec<Node>) -> Result<Node, RewriteError> {
        let arity_error = |shape: &str, expected: &str, got: usize| {
            RewriteError::UnsupportedShape(format!(
                "{shape} takes {expected} children, got {got}"
            ))
        };

        match self {
            NodeShape::Identifier(name) if children.is_empty() => Ok(Node::Identifier(name)),
            NodeShape::Literal(lit) if children.is_empty() => Ok(Node::Literal(lit)),
            NodeShape::Identifier(_) => Err(arity_error("identifier", "no", children.len())),
            NodeShape::Literal(_) => Err(arity_error("literal", "no", children.len())),
            NodeShape::Comparison(op) => {
                let got = children.len();
                let [lhs, rhs]: [Node; 2] = children
                    .try_into()
                    .map_err(|_| arity_error("comparison", "exactly 2", got))?;
                Ok(Node::comparison(op, lhs, rhs))
            }
            NodeShape::And => Ok(Node::And(children)),
            NodeShape::Or => Ok(Node::Or(children)),
            NodeShape::Function { namespace, name } => Ok(Node::Function {
                namespace,
                name,
                args: children,
            }),
            NodeShape::Not => single_child(children, "not").map(Node::negation),
            NodeShape::Group => single_child(children, "group").map(Node::group),
            NodeShape::Script => {
                single_child(children, "script").map(|child| Node::Script(Box::new(child)))
            }
            NodeShape::Assignment { identifier } => {
                single_child(children, "assignment").map(|value| Node::Assignment {
                    identifier,
                    value: Box::new(value),
                })
            }
        }
    }
}

fn single_child(children: Vec<Node>, shape: &str) -> Result<Node, RewriteError> {
    let got = children.len();
    let [child]: [Node; 1] = children.try_into().map_err(|_| {
        RewriteError::UnsupportedShape(format!("{shape} takes exactly 1 child, got {got}"))
    })?;
    Ok(child)
}

/// Childless copy of `node`.
pub fn shallow_copy(node: &Node) -> NodeShape {
    NodeShape::of(node)
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Normalize a field name into a valid identifier name.
///
/// Grouping context (`NAME.1.2`) is dropped and names that cannot start an
/// identifier are prefixed with `$`.
pub fn identifier_name(field: &str) -> String {
    if field.chars().count() <= 1 {
        return field.to_string();
    }
    let base = match field.split_once('.') {
        Some((head, _)) if !head.is_empty() => head,
        _ => field,
    };
    match base.chars().next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == IDENTIFIER_PREFIX || c == '@' => {
            base.to_string()
        }
        Some(_) if base.chars().count() > 1 => format!("{IDENTIFIER_PREFIX}{base}"),
        _ => base.to_string(),
    }
}

/// Identifier node for `field`.
pub fn identifier(field: &str) -> Node {
    Node::Identifier(identifier_name(field))
}

/// Inverse of [`identifier_name`]'s prefixing: the bare field name.
pub fn deconstruct_identifier(name: &str) -> String {
    match name.strip_prefix(IDENTIFIER_PREFIX) {
        Some(rest) if !rest.is_empty() => rest.to_string(),
        _ => name.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Comparisons
// ---------------------------------------------------------------------------

fn value_node(value: FieldValue) -> Result<Node, RewriteError> {
    Ok(match value {
        FieldValue::String(s) => Node::string(s),
        FieldValue::Number(n) => Node::number(NumberLiteral::from_value(n)?),
        FieldValue::Bool(b) => Node::boolean(b),
        FieldValue::Null => Node::null(),
        FieldValue::Node(node) => *node,
    })
}

/// Build `field <op> value`, encoding the value by its runtime type.
pub fn build_comparison(
    op: CompareOp,
    field: &str,
    value: impl Into<FieldValue>,
) -> Result<Node, RewriteError> {
    let rhs = value_node(value.into())?;
    Ok(Node::comparison(op, identifier(field), rhs))
}

pub fn build_eq(field: &str, value: &str) -> Node {
    Node::comparison(CompareOp::Eq, identifier(field), Node::string(value))
}

pub fn build_ne(field: &str, value: &str) -> Node {
    Node::comparison(CompareOp::Ne, identifier(field), Node::string(value))
}

pub fn build_er(field: &str, pattern: &str) -> Node {
    Node::comparison(CompareOp::Er, identifier(field), Node::string(pattern))
}

pub fn build_nr(field: &str, pattern: &str) -> Node {
    Node::comparison(CompareOp::Nr, identifier(field), Node::string(pattern))
}

/// Rebuild `original` against `field`, optionally substituting a new value.
///
/// With a value, `original` must be a comparison (possibly parenthesized).
/// Without one, connectives and wrappers are rebuilt child by child, and each
/// comparison leaf keeps its existing value operand.
pub fn build_like_original(
    original: &Node,
    field: &str,
    value: Option<FieldValue>,
) -> Result<Node, RewriteError> {
    match value {
        Some(value) => match original.dereference() {
            Node::Comparison { op, .. } => build_comparison(*op, field, value),
            other => Err(RewriteError::UnsupportedShape(format!(
                "cannot substitute a value into {}",
                other.kind_name()
            ))),
        },
        None => rebuild_for_field(original, field),
    }
}

/// Rebuild `original` with every comparison's field replaced by `field`.
///
/// Connectives, negations, groups, scripts and assignments are rebuilt around
/// their rebuilt children. Identifiers and the `true` constant pass through.
fn rebuild_for_field(original: &Node, field: &str) -> Result<Node, RewriteError> {
    match original {
        Node::And(children) | Node::Or(children) => {
            let rebuilt = children
                .iter()
                .map(|child| rebuild_for_field(child, field))
                .collect::<Result<Vec<_>, _>>()?;
            NodeShape::of(original).with_children(rebuilt)
        }
        Node::Not(child) | Node::Group(child) | Node::Script(child) => {
            NodeShape::of(original).with_children(vec![rebuild_for_field(child, field)?])
        }
        Node::Assignment { identifier, value } => Ok(Node::Assignment {
            identifier: identifier.clone(),
            value: Box::new(rebuild_for_field(value, field)?),
        }),
        Node::Identifier(_) | Node::Literal(Literal::Bool(true)) => Ok(original.clone()),
        Node::Comparison { op, rhs, .. } => {
            let value = unwrap_single_groups(rhs);
            match value {
                Node::Identifier(_) | Node::Literal(_) => {
                    Ok(Node::comparison(*op, identifier(field), value.clone()))
                }
                other => Err(RewriteError::UnsupportedShape(format!(
                    "cannot handle compound value operand: {other}"
                ))),
            }
        }
        other => Err(RewriteError::UnsupportedShape(format!(
            "no field substitution rule for {}",
            other.kind_name()
        ))),
    }
}

fn unwrap_single_groups(node: &Node) -> &Node {
    let mut node = node;
    while let Node::Group(child) = node {
        node = child.as_ref();
    }
    node
}

/// Shallow copy of `original` holding the two given operands.
pub fn build_binary(original: &Node, lhs: Node, rhs: Node) -> Result<Node, RewriteError> {
    NodeShape::of(original).with_children(vec![lhs, rhs])
}

// ---------------------------------------------------------------------------
// Connectives
// ---------------------------------------------------------------------------

/// Parenthesize a multi-child connective; anything else passes through.
pub fn wrap(node: Node) -> Node {
    match &node {
        Node::And(children) | Node::Or(children) if children.len() > 1 => Node::group(node),
        _ => node,
    }
}

/// Join `children` under a connective of type `container`.
///
/// A single child is returned as-is. Children that are already connectives of
/// the same type are spliced in, so repeated combining yields one flat level.
/// Property markers are never spliced.
pub fn combine(container: ContainerType, children: Vec<Node>) -> Result<Node, RewriteError> {
    match children.len() {
        0 => Err(RewriteError::EmptyJunction),
        1 => children.into_iter().next().ok_or(RewriteError::EmptyJunction),
        n => {
            let mut flat = Vec::with_capacity(n);
            for child in children {
                if marker::is_marker(&child) || !container.matches(child.dereference()) {
                    flat.push(child);
                    continue;
                }
                match child.into_dereferenced() {
                    Node::And(inner) | Node::Or(inner) => flat.extend(inner),
                    other => flat.push(other),
                }
            }
            trace!(container = %container, children = flat.len(), "Combined children");
            Ok(wrap(container.connective(flat)))
        }
    }
}

/// Unwrapped conjunction.
pub fn create_and(children: Vec<Node>) -> Node {
    Node::And(children)
}

/// Unwrapped disjunction.
pub fn create_or(children: Vec<Node>) -> Node {
    Node::Or(children)
}

/// Parenthesize `node` unless it already is a group.
pub fn create_expression(node: Node) -> Node {
    match node {
        Node::Group(_) => node,
        other => Node::group(other),
    }
}

pub fn create_script(node: Node) -> Node {
    Node::Script(Box::new(wrap(node)))
}

/// `identifier = value` for a boolean or string value.
pub fn create_assignment(
    identifier: &str,
    value: impl Into<FieldValue>,
) -> Result<Node, RewriteError> {
    let value = match value.into() {
        FieldValue::Bool(b) => Node::boolean(b),
        FieldValue::String(s) => Node::string(s),
        other => {
            return Err(RewriteError::UnsupportedShape(format!(
                "assignments hold booleans or strings, got {other:?}"
            )))
        }
    };
    Ok(Node::Assignment {
        identifier: identifier.to_string(),
        value: Box::new(value),
    })
}

/// `namespace:name(field, 'arg', ...)`.
pub fn build_function(namespace: &str, name: &str, field: &str, args: &[&str]) -> Node {
    let mut children = Vec::with_capacity(args.len() + 1);
    children.push(identifier(field));
    children.extend(args.iter().map(|arg| wrap(Node::string(*arg))));
    Node::Function {
        namespace: namespace.to_string(),
        name: name.to_string(),
        args: children,
    }
}

/// One copy of `original` per field, each comparing against `value`.
pub fn create_tree_from_field_names<S: AsRef<str>>(
    container: ContainerType,
    original: &Node,
    value: FieldValue,
    fields: &[S],
) -> Result<Node, RewriteError> {
    let children = fields
        .iter()
        .map(|field| build_like_original(original, field.as_ref(), Some(value.clone())))
        .collect::<Result<Vec<_>, _>>()?;
    combine(container, children)
}

/// One copy of `original` against `field` per value.
///
/// With no values, `original` is simply rebuilt against `field`.
pub fn create_tree_from_field_values(
    container: ContainerType,
    original: &Node,
    field: &str,
    values: &[FieldValue],
) -> Result<Node, RewriteError> {
    if values.is_empty() {
        return build_like_original(original, field, None);
    }
    let children = values
        .iter()
        .map(|value| build_like_original(original, field, Some(value.clone())))
        .collect::<Result<Vec<_>, _>>()?;
    combine(container, children)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::{create_marker, MarkerType};
    use crate::node::NumberValue;

    #[test]
    fn test_identifier_rules() {
        assert_eq!(identifier_name("FOO"), "FOO");
        assert_eq!(identifier_name("FOO.1.2"), "FOO");
        assert_eq!(identifier_name("1ST_FIELD"), "$1ST_FIELD");
        assert_eq!(identifier_name("_ANYFIELD_"), "_ANYFIELD_");
        assert_eq!(identifier_name("@ATTR"), "@ATTR");
        assert_eq!(identifier_name("9"), "9");
        assert_eq!(deconstruct_identifier("$1ST_FIELD"), "1ST_FIELD");
        assert_eq!(deconstruct_identifier("FOO"), "FOO");
    }

    #[test]
    fn test_build_comparison_encodes_by_type() {
        let s = build_comparison(CompareOp::Eq, "A", "x").unwrap();
        assert_eq!(s.to_string(), "A == 'x'");

        let n = build_comparison(CompareOp::Ge, "AGE", 21i64).unwrap();
        assert_eq!(n.to_string(), "AGE >= 21");

        let b = build_comparison(CompareOp::Ne, "FLAG", true).unwrap();
        assert_eq!(b.to_string(), "FLAG != true");

        let null = build_comparison(CompareOp::Eq, "X", FieldValue::Null).unwrap();
        assert_eq!(null.to_string(), "X == null");
    }

    #[test]
    fn test_build_comparison_rejects_non_finite() {
        let infinite = FieldValue::Number(NumberValue::Float(f64::INFINITY));
        let err = build_comparison(CompareOp::Lt, "X", infinite).unwrap_err();
        assert!(matches!(err, RewriteError::NumericLiteral(_)));
    }

    #[test]
    fn test_build_like_original_substitutes_value() {
        let original = build_er("_ANYFIELD_", "ba.*");
        let node = build_like_original(&original, "TITLE", Some("bar".into())).unwrap();
        assert_eq!(node.to_string(), "TITLE =~ 'bar'");
    }

    #[test]
    fn test_build_like_original_keeps_value_operand() {
        let original = Node::comparison(
            CompareOp::Nr,
            Node::identifier("_ANYFIELD_"),
            Node::group(Node::group(Node::string("x.*"))),
        );
        let node = build_like_original(&original, "BODY", None).unwrap();
        assert_eq!(node.to_string(), "BODY !~ 'x.*'");
    }

    #[test]
    fn test_build_like_original_recurses_structurally() {
        let original = Node::group(create_and(vec![build_eq("A", "x"), build_ne("B", "y")]));
        let node = build_like_original(&original, "C", None).unwrap();
        assert_eq!(node.to_string(), "(C == 'x' && C != 'y')");
    }

    #[test]
    fn test_build_like_original_rebuilds_negation() {
        let original = Node::negation(Node::group(build_eq("_ANYFIELD_", "x")));
        let node = build_like_original(&original, "B", None).unwrap();
        assert_eq!(node.to_string(), "!(B == 'x')");
        assert_eq!(node, Node::negation(Node::group(build_eq("B", "x"))));
    }

    #[test]
    fn test_build_like_original_rebuilds_range_comparisons() {
        let lower = build_comparison(CompareOp::Gt, "_ANYFIELD_", 5i64).unwrap();
        let node = build_like_original(&lower, "F", None).unwrap();
        assert_eq!(node.to_string(), "F > 5");

        let between = Node::group(create_and(vec![
            build_comparison(CompareOp::Ge, "_ANYFIELD_", "a").unwrap(),
            build_comparison(CompareOp::Le, "_ANYFIELD_", "m").unwrap(),
        ]));
        let node = build_like_original(&between, "F", None).unwrap();
        assert_eq!(node.to_string(), "(F >= 'a' && F <= 'm')");
    }

    #[test]
    fn test_build_like_original_boolean_constants() {
        let script = create_script(create_assignment("flag", true).unwrap());
        let node = build_like_original(&script, "F", None).unwrap();
        assert_eq!(node, script);

        let falsy = Node::group(Node::boolean(false));
        assert!(matches!(
            build_like_original(&falsy, "F", None),
            Err(RewriteError::UnsupportedShape(_))
        ));
    }

    #[test]
    fn test_build_like_original_rejects_unsupported() {
        let compound = Node::comparison(
            CompareOp::Eq,
            Node::identifier("A"),
            create_or(vec![Node::string("x"), Node::string("y")]),
        );
        assert!(build_like_original(&compound, "B", None).is_err());

        let func = build_function("filter", "isNull", "A", &[]);
        assert!(build_like_original(&func, "B", Some("x".into())).is_err());
    }

    #[test]
    fn test_shallow_copy_arity() {
        let cmp = build_eq("A", "x");
        let shape = shallow_copy(&cmp);
        assert!(shape.clone().with_children(vec![Node::identifier("A")]).is_err());
        let rebuilt = shape
            .with_children(vec![Node::identifier("B"), Node::string("y")])
            .unwrap();
        assert_eq!(rebuilt.to_string(), "B == 'y'");

        let group = shallow_copy(&Node::group(Node::boolean(true)));
        assert!(group.with_children(vec![]).is_err());
    }

    #[test]
    fn test_build_binary() {
        let original = build_comparison(CompareOp::Lt, "N", 5i64).unwrap();
        let node = build_binary(&original, identifier("M"), Node::string("7")).unwrap();
        assert_eq!(node.to_string(), "M < '7'");
    }

    #[test]
    fn test_wrap_only_multi_child_connectives() {
        let single = create_or(vec![build_eq("A", "x")]);
        assert_eq!(wrap(single.clone()), single);

        let multi = create_or(vec![build_eq("A", "x"), build_eq("B", "y")]);
        assert_eq!(wrap(multi.clone()), Node::group(multi));

        let leaf = build_eq("A", "x");
        assert_eq!(wrap(leaf.clone()), leaf);
    }

    #[test]
    fn test_combine_cases() {
        assert!(matches!(
            combine(ContainerType::And, vec![]),
            Err(RewriteError::EmptyJunction)
        ));

        let leaf = build_eq("A", "x");
        assert_eq!(combine(ContainerType::And, vec![leaf.clone()]).unwrap(), leaf);

        let node = combine(
            ContainerType::Or,
            vec![build_eq("A", "x"), build_eq("B", "y")],
        )
        .unwrap();
        assert_eq!(node.to_string(), "(A == 'x' || B == 'y')");
    }

    #[test]
    fn test_combine_flattens_same_connective() {
        let inner = combine(
            ContainerType::Or,
            vec![build_eq("B", "x"), build_eq("B", "y")],
        )
        .unwrap();
        let node = combine(ContainerType::Or, vec![build_eq("A", "x"), inner]).unwrap();
        assert_eq!(node.to_string(), "(A == 'x' || B == 'x' || B == 'y')");

        let other = combine(
            ContainerType::And,
            vec![build_eq("B", "x"), build_eq("C", "y")],
        )
        .unwrap();
        let mixed = combine(ContainerType::Or, vec![build_eq("A", "x"), other]).unwrap();
        assert_eq!(mixed.to_string(), "(A == 'x' || (B == 'x' && C == 'y'))");
    }

    #[test]
    fn test_combine_keeps_markers_intact() {
        let marked = create_marker(build_eq("A", "x"), MarkerType::ExceededValue);
        let node = combine(ContainerType::And, vec![marked.clone(), build_eq("B", "y")]).unwrap();
        match node.dereference() {
            Node::And(children) => {
                assert_eq!(children.len(), 2);
                assert_eq!(children[0], marked);
            }
            other => panic!("expected conjunction, got {other}"),
        }
    }

    #[test]
    fn test_create_helpers() {
        assert_eq!(
            create_expression(build_eq("A", "x")).to_string(),
            "(A == 'x')"
        );
        let grouped = Node::group(build_eq("A", "x"));
        assert_eq!(create_expression(grouped.clone()), grouped);

        let script = create_script(create_and(vec![build_eq("A", "x"), build_eq("B", "y")]));
        assert_eq!(script.to_string(), "(A == 'x' && B == 'y')");

        let assign = create_assignment("_Value_", true).unwrap();
        assert_eq!(assign.to_string(), "_Value_ = true");
        assert!(create_assignment("X", 3i64).is_err());
    }

    #[test]
    fn test_build_function() {
        let node = build_function("filter", "includeRegex", "1FIELD", &["ba.*"]);
        assert_eq!(node.to_string(), "filter:includeRegex($1FIELD, 'ba.*')");
        let names: Vec<String> = node.identifier_names().into_iter().collect();
        assert_eq!(names, vec!["$1FIELD".to_string()]);
    }

    #[test]
    fn test_create_tree_from_field_names() {
        let original = build_eq("_ANYFIELD_", "x");
        let node = create_tree_from_field_names(
            ContainerType::Or,
            &original,
            "x".into(),
            &["A", "B"],
        )
        .unwrap();
        assert_eq!(node.to_string(), "(A == 'x' || B == 'x')");
    }

    #[test]
    fn test_create_tree_from_field_values() {
        let original = build_ne("_ANYFIELD_", "x");
        let node = create_tree_from_field_values(
            ContainerType::And,
            &original,
            "A",
            &["x".into(), "y".into()],
        )
        .unwrap();
        assert_eq!(node.to_string(), "(A != 'x' && A != 'y')");

        let rebuilt =
            create_tree_from_field_values(ContainerType::And, &original, "A", &[]).unwrap();
        assert_eq!(rebuilt.to_string(), "A != 'x'");
    }
}
