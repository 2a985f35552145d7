// SPDX-License-Identifier: PMPL-1.0-or-later
//! Expression node model.
//!
//! A predicate tree is a strictly owned recursive enum: every parent owns its
//! children and no node points back at its parent. Algorithms that need the
//! enclosing context carry it as an explicit argument during their pass.
//!
//! The [`fmt::Display`] impl renders a tree in the query language's textual
//! form, e.g. `(A == 'x' || B =~ 'ba.*') && !(C != null)`.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RewriteError;

// ---------------------------------------------------------------------------
// Comparison operators
// ---------------------------------------------------------------------------

/// Operator of a `field <op> value` comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `=~` (matches regex)
    Er,
    /// `!~` (does not match regex)
    Nr,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl CompareOp {
    /// All operators in canonical order.
    pub const ALL: [CompareOp; 8] = [
        CompareOp::Eq,
        CompareOp::Ne,
        CompareOp::Er,
        CompareOp::Nr,
        CompareOp::Lt,
        CompareOp::Le,
        CompareOp::Gt,
        CompareOp::Ge,
    ];

    /// Textual operator symbol.
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Er => "=~",
            CompareOp::Nr => "!~",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }

    /// True for the four bound operators `<`, `<=`, `>`, `>=`.
    pub fn is_range(self) -> bool {
        matches!(self, CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge)
    }

    /// True for `<=` and `>=`.
    pub fn is_inclusive(self) -> bool {
        matches!(self, CompareOp::Le | CompareOp::Ge)
    }

    /// True for `<` and `<=`, which constrain the upper end of an interval.
    pub fn is_upper_bound(self) -> bool {
        matches!(self, CompareOp::Lt | CompareOp::Le)
    }

    /// The operator of the logically negated comparison.
    pub fn negate(self) -> CompareOp {
        match self {
            CompareOp::Eq => CompareOp::Ne,
            CompareOp::Ne => CompareOp::Eq,
            CompareOp::Er => CompareOp::Nr,
            CompareOp::Nr => CompareOp::Er,
            CompareOp::Lt => CompareOp::Ge,
            CompareOp::Le => CompareOp::Gt,
            CompareOp::Gt => CompareOp::Le,
            CompareOp::Ge => CompareOp::Lt,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

// ---------------------------------------------------------------------------
// Literals
// ---------------------------------------------------------------------------

/// Whether a number literal was written as an integer or a decimal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumberKind {
    Integer,
    Float,
}

/// A number literal, keeping the text it was written with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NumberLiteral {
    text: String,
    kind: NumberKind,
}

impl NumberLiteral {
    /// Parse a number literal from its textual form.
    ///
    /// Integers that fit an `i64` are kept as integers; anything else must be a
    /// finite decimal.
    pub fn parse(text: &str) -> Result<Self, RewriteError> {
        let trimmed = text.trim();
        if trimmed.parse::<i64>().is_ok() {
            return Ok(Self {
                text: trimmed.to_string(),
                kind: NumberKind::Integer,
            });
        }
        match trimmed.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Self {
                text: trimmed.to_string(),
                kind: NumberKind::Float,
            }),
            _ => Err(RewriteError::NumericLiteral(text.to_string())),
        }
    }

    /// Encode a runtime number as a literal.
    pub fn from_value(value: NumberValue) -> Result<Self, RewriteError> {
        match value {
            NumberValue::Integer(i) => Ok(Self {
                text: i.to_string(),
                kind: NumberKind::Integer,
            }),
            NumberValue::Float(f) if f.is_finite() => Ok(Self {
                // Debug formatting keeps the decimal point on whole floats.
                text: format!("{f:?}"),
                kind: NumberKind::Float,
            }),
            NumberValue::Float(f) => Err(RewriteError::NumericLiteral(f.to_string())),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn kind(&self) -> NumberKind {
        self.kind
    }

    /// The integer value, if this literal is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self.kind {
            NumberKind::Integer => self.text.parse().ok(),
            NumberKind::Float => None,
        }
    }

    /// The value as a float, for either kind.
    pub fn as_f64(&self) -> Option<f64> {
        self.text.parse().ok()
    }
}

impl fmt::Display for NumberLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Payload of a literal node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    String(String),
    Number(NumberLiteral),
    Bool(bool),
    Null,
}

impl Literal {
    /// Textual payload used when matching literals against index values.
    ///
    /// Booleans and null have no index representation.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Literal::String(s) => Some(s),
            Literal::Number(n) => Some(n.text()),
            Literal::Bool(_) | Literal::Null => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => {
                f.write_str("'")?;
                for c in s.chars() {
                    if c == '\'' || c == '\\' {
                        f.write_str("\\")?;
                    }
                    write!(f, "{c}")?;
                }
                f.write_str("'")
            }
            Literal::Number(n) => write!(f, "{n}"),
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Null => f.write_str("null"),
        }
    }
}

// ---------------------------------------------------------------------------
// Runtime values
// ---------------------------------------------------------------------------

/// A runtime number handed to the builder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumberValue {
    Integer(i64),
    Float(f64),
}

/// A value to place on the right-hand side of a generated comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    String(String),
    Number(NumberValue),
    Bool(bool),
    Null,
    /// An already-built operand, attached as-is.
    Node(Box<Node>),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<&String> for FieldValue {
    fn from(value: &String) -> Self {
        FieldValue::String(value.clone())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(NumberValue::Integer(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(NumberValue::Float(value))
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<Node> for FieldValue {
    fn from(value: Node) -> Self {
        FieldValue::Node(Box::new(value))
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// A node of a predicate tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    /// A field reference.
    Identifier(String),
    /// A constant.
    Literal(Literal),
    /// `lhs <op> rhs`; by convention `lhs` is the field identifier.
    Comparison {
        op: CompareOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    And(Vec<Node>),
    Or(Vec<Node>),
    Not(Box<Node>),
    /// Explicit parenthesization, kept so precedence survives re-serialization.
    Group(Box<Node>),
    /// `namespace:name(args...)`.
    Function {
        namespace: String,
        name: String,
        args: Vec<Node>,
    },
    /// `identifier = value`.
    Assignment {
        identifier: String,
        value: Box<Node>,
    },
    /// Root of a parsed query.
    Script(Box<Node>),
}

impl Node {
    pub fn identifier(name: impl Into<String>) -> Self {
        Node::Identifier(name.into())
    }

    pub fn string(value: impl Into<String>) -> Self {
        Node::Literal(Literal::String(value.into()))
    }

    pub fn number(value: NumberLiteral) -> Self {
        Node::Literal(Literal::Number(value))
    }

    pub fn boolean(value: bool) -> Self {
        Node::Literal(Literal::Bool(value))
    }

    pub fn null() -> Self {
        Node::Literal(Literal::Null)
    }

    /// The constant used to prune a clause that can never match.
    pub fn falsy() -> Self {
        Node::boolean(false)
    }

    pub fn comparison(op: CompareOp, lhs: Node, rhs: Node) -> Self {
        Node::Comparison {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn group(child: Node) -> Self {
        Node::Group(Box::new(child))
    }

    pub fn negation(child: Node) -> Self {
        Node::Not(Box::new(child))
    }

    /// Load a node tree from its JSON snapshot.
    pub fn from_json(json: &str) -> Result<Self, RewriteError> {
        serde_json::from_str(json).map_err(RewriteError::Serialization)
    }

    /// Short name of the variant, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Identifier(_) => "identifier",
            Node::Literal(_) => "literal",
            Node::Comparison { .. } => "comparison",
            Node::And(_) => "and",
            Node::Or(_) => "or",
            Node::Not(_) => "not",
            Node::Group(_) => "group",
            Node::Function { .. } => "function",
            Node::Assignment { .. } => "assignment",
            Node::Script(_) => "script",
        }
    }

    /// Number of child nodes, counting identifier and literal operands.
    pub fn child_count(&self) -> usize {
        match self {
            Node::Identifier(_) | Node::Literal(_) => 0,
            Node::Comparison { .. } => 2,
            Node::And(children) | Node::Or(children) => children.len(),
            Node::Function { args, .. } => args.len(),
            Node::Not(_) | Node::Group(_) | Node::Script(_) | Node::Assignment { .. } => 1,
        }
    }

    /// True for `And` and `Or`.
    pub fn is_connective(&self) -> bool {
        matches!(self, Node::And(_) | Node::Or(_))
    }

    /// True for a literal, including true/false/null.
    pub fn is_literal(&self) -> bool {
        matches!(self, Node::Literal(_))
    }

    /// Strip any `Group`/`Script` wrappers.
    pub fn dereference(&self) -> &Node {
        let mut node = self;
        while let Node::Group(child) | Node::Script(child) = node {
            node = child.as_ref();
        }
        node
    }

    /// Consume the node, stripping any `Group`/`Script` wrappers.
    pub fn into_dereferenced(self) -> Node {
        let mut node = self;
        while let Node::Group(child) | Node::Script(child) = node {
            node = *child;
        }
        node
    }

    /// The literal payload of a literal node, or of a comparison's value operand.
    pub fn literal(&self) -> Option<&Literal> {
        match self.dereference() {
            Node::Literal(lit) => Some(lit),
            Node::Comparison { lhs, rhs, .. } => match (rhs.dereference(), lhs.dereference()) {
                (Node::Literal(lit), _) | (_, Node::Literal(lit)) => Some(lit),
                _ => None,
            },
            _ => None,
        }
    }

    /// The identifier operand of a comparison, or the name of an identifier node.
    pub fn field_name(&self) -> Option<&str> {
        match self.dereference() {
            Node::Identifier(name) => Some(name),
            Node::Comparison { lhs, rhs, .. } => match (lhs.dereference(), rhs.dereference()) {
                (Node::Identifier(name), _) | (_, Node::Identifier(name)) => Some(name),
                _ => None,
            },
            _ => None,
        }
    }

    /// Names of every identifier in the tree.
    ///
    /// Inside a function only the arguments are searched; the namespace and
    /// function name are not identifiers.
    pub fn identifier_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.visit(&mut |node| {
            if let Node::Identifier(name) = node {
                names.insert(name.clone());
            }
        });
        names
    }

    /// Every literal payload in the tree, in tree order.
    pub fn literal_values(&self) -> Vec<&Literal> {
        let mut out = Vec::new();
        collect_literals(self, &mut out);
        out
    }

    /// Rename, in place, every identifier called `from` to `to`.
    ///
    /// Returns how many identifiers were renamed.
    pub fn rename_identifiers(&mut self, from: &str, to: &str) -> usize {
        let mut renamed = 0;
        self.visit_mut(&mut |node| {
            if let Node::Identifier(name) = node {
                if name.as_str() == from {
                    *name = to.to_string();
                    renamed += 1;
                }
            }
        });
        renamed
    }

    /// Pre-order traversal.
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a Node)) {
        f(self);
        match self {
            Node::Identifier(_) | Node::Literal(_) => {}
            Node::Comparison { lhs, rhs, .. } => {
                lhs.visit(f);
                rhs.visit(f);
            }
            Node::And(children) | Node::Or(children) => {
                for child in children {
                    child.visit(f);
                }
            }
            Node::Function { args, .. } => {
                for arg in args {
                    arg.visit(f);
                }
            }
            Node::Not(child) | Node::Group(child) | Node::Script(child) => child.visit(f),
            Node::Assignment { value, .. } => value.visit(f),
        }
    }

    /// Pre-order mutable traversal.
    pub fn visit_mut(&mut self, f: &mut impl FnMut(&mut Node)) {
        f(self);
        match self {
            Node::Identifier(_) | Node::Literal(_) => {}
            Node::Comparison { lhs, rhs, .. } => {
                lhs.visit_mut(f);
                rhs.visit_mut(f);
            }
            Node::And(children) | Node::Or(children) => {
                for child in children {
                    child.visit_mut(f);
                }
            }
            Node::Function { args, .. } => {
                for arg in args {
                    arg.visit_mut(f);
                }
            }
            Node::Not(child) | Node::Group(child) | Node::Script(child) => child.visit_mut(f),
            Node::Assignment { value, .. } => value.visit_mut(f),
        }
    }
}

fn collect_literals<'a>(node: &'a Node, out: &mut Vec<&'a Literal>) {
    node.visit(&mut |n| {
        if let Node::Literal(lit) = n {
            out.push(lit);
        }
    });
}

fn write_joined(f: &mut fmt::Formatter<'_>, children: &[Node], sep: &str) -> fmt::Result {
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{child}")?;
    }
    Ok(())
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Identifier(name) => f.write_str(name),
            Node::Literal(lit) => write!(f, "{lit}"),
            Node::Comparison { op, lhs, rhs } => write!(f, "{lhs} {op} {rhs}"),
            Node::And(children) => write_joined(f, children, " && "),
            Node::Or(children) => write_joined(f, children, " || "),
            Node::Not(child) => write!(f, "!{child}"),
            Node::Group(child) => write!(f, "({child})"),
            Node::Function {
                namespace,
                name,
                args,
            } => {
                write!(f, "{namespace}:{name}(")?;
                write_joined(f, args, ", ")?;
                f.write_str(")")
            }
            Node::Assignment { identifier, value } => write!(f, "{identifier} = {value}"),
            Node::Script(child) => write!(f, "{child}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eq(field: &str, value: &str) -> Node {
        Node::comparison(CompareOp::Eq, Node::identifier(field), Node::string(value))
    }

    #[test]
    fn test_display_connectives_and_groups() {
        let tree = Node::And(vec![
            Node::group(Node::Or(vec![eq("A", "x"), eq("B", "y")])),
            Node::negation(Node::group(eq("C", "z"))),
        ]);
        assert_eq!(tree.to_string(), "(A == 'x' || B == 'y') && !(C == 'z')");
    }

    #[test]
    fn test_display_escapes_string_literals() {
        let node = eq("NAME", "o'brien\\");
        assert_eq!(node.to_string(), "NAME == 'o\\'brien\\\\'");
    }

    #[test]
    fn test_display_function_and_assignment() {
        let func = Node::Function {
            namespace: "filter".to_string(),
            name: "includeRegex".to_string(),
            args: vec![Node::identifier("FOO"), Node::string("ba.*")],
        };
        assert_eq!(func.to_string(), "filter:includeRegex(FOO, 'ba.*')");

        let assign = Node::Assignment {
            identifier: "_Value_".to_string(),
            value: Box::new(Node::boolean(true)),
        };
        assert_eq!(assign.to_string(), "_Value_ = true");
    }

    #[test]
    fn test_number_literal_parse() {
        let int = NumberLiteral::parse("42").unwrap();
        assert_eq!(int.kind(), NumberKind::Integer);
        assert_eq!(int.as_i64(), Some(42));

        let float = NumberLiteral::parse("2.5").unwrap();
        assert_eq!(float.kind(), NumberKind::Float);
        assert_eq!(float.as_i64(), None);
        assert_eq!(float.as_f64(), Some(2.5));

        assert!(NumberLiteral::parse("abc").is_err());
        assert!(NumberLiteral::parse("NaN").is_err());
        assert!(NumberLiteral::parse("inf").is_err());
    }

    #[test]
    fn test_number_literal_from_value() {
        let whole = NumberLiteral::from_value(NumberValue::Float(5.0)).unwrap();
        assert_eq!(whole.text(), "5.0");
        assert_eq!(whole.kind(), NumberKind::Float);

        let err = NumberLiteral::from_value(NumberValue::Float(f64::NAN)).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_identifier_names_skip_function_names() {
        let tree = Node::And(vec![
            eq("A", "x"),
            Node::Function {
                namespace: "content".to_string(),
                name: "phrase".to_string(),
                args: vec![Node::identifier("BODY"), Node::string("quick fox")],
            },
        ]);
        let names: Vec<String> = tree.identifier_names().into_iter().collect();
        assert_eq!(names, vec!["A".to_string(), "BODY".to_string()]);
    }

    #[test]
    fn test_literal_values_in_order() {
        let tree = Node::Or(vec![eq("A", "x"), eq("B", "y")]);
        let values: Vec<&str> = tree
            .literal_values()
            .into_iter()
            .filter_map(Literal::as_text)
            .collect();
        assert_eq!(values, vec!["x", "y"]);
    }

    #[test]
    fn test_rename_identifiers() {
        let mut tree = Node::Or(vec![eq("_ANYFIELD_", "x"), eq("B", "y")]);
        assert_eq!(tree.rename_identifiers("_ANYFIELD_", "TITLE"), 1);
        assert_eq!(tree.to_string(), "TITLE == 'x' || B == 'y'");
    }

    #[test]
    fn test_dereference_and_accessors() {
        let node = Node::Script(Box::new(Node::group(eq("A", "x"))));
        assert_eq!(node.dereference(), &eq("A", "x"));
        assert_eq!(node.field_name(), Some("A"));
        assert_eq!(node.literal(), Some(&Literal::String("x".to_string())));
    }

    #[test]
    fn test_node_json_roundtrip() {
        let tree = Node::And(vec![eq("A", "x"), Node::negation(eq("B", "y"))]);
        let json = serde_json::to_string(&tree).unwrap();
        let parsed = Node::from_json(&json).unwrap();
        assert_eq!(parsed, tree);
    }

    #[test]
    fn test_compare_op_negate_is_involution() {
        for op in CompareOp::ALL {
            assert_eq!(op.negate().negate(), op);
        }
    }
}
