//! Borrowed, uniform view over the three node kinds of a filter tree.

use crate::arithmetic::ArithmeticNode;
use crate::comparison::ComparisonNode;
use crate::logical::LogicalNode;
use std::fmt::Write;

#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Logical(&'a LogicalNode),
    Comparison(&'a ComparisonNode),
    Arithmetic(&'a ArithmeticNode),
}

impl<'a> NodeRef<'a> {
    pub fn kind(&self) -> &'static str {
        match self {
            NodeRef::Logical(_) => "logical",
            NodeRef::Comparison(_) => "comparison",
            NodeRef::Arithmetic(_) => "arithmetic",
        }
    }

    pub fn raw_text(&self) -> &'a str {
        match *self {
            NodeRef::Logical(n) => n.raw_text(),
            NodeRef::Comparison(n) => n.raw_text(),
            NodeRef::Arithmetic(n) => n.raw_text(),
        }
    }

    /// operator token, `None` for leaves
    pub fn operation(&self) -> Option<&'static str> {
        match *self {
            NodeRef::Logical(n) => n.operation().map(|op| op.keyword()),
            NodeRef::Comparison(n) => Some(n.effective_op().symbol()),
            NodeRef::Arithmetic(n) => n.operation().map(|op| op.symbol()),
        }
    }

    pub fn children(&self) -> Vec<NodeRef<'a>> {
        match *self {
            NodeRef::Logical(n) => n.children().into_iter().map(NodeRef::from).collect(),
            NodeRef::Comparison(n) => n
                .operands()
                .map(|(l, r)| vec![NodeRef::Arithmetic(l), NodeRef::Arithmetic(r)])
                .unwrap_or_default(),
            NodeRef::Arithmetic(n) => n
                .children()
                .map(|(l, r)| vec![NodeRef::Arithmetic(l), NodeRef::Arithmetic(r)])
                .unwrap_or_default(),
        }
    }

    pub fn complexity(&self) -> usize {
        match *self {
            NodeRef::Logical(n) => n.complexity(),
            NodeRef::Comparison(n) => n.complexity(),
            NodeRef::Arithmetic(n) => n.complexity(),
        }
    }
}

impl<'a> From<&'a LogicalNode> for NodeRef<'a> {
    // comparison leaves are presented as the comparison itself
    fn from(n: &'a LogicalNode) -> Self {
        match n.comparison() {
            Some(c) => NodeRef::Comparison(c),
            None => NodeRef::Logical(n),
        }
    }
}

/// Indented multi-line dump of the tree rooted at `node`.
pub fn describe(node: NodeRef<'_>) -> String {
    let mut out = String::new();
    describe_into(&mut out, node, 0);
    out
}

fn describe_into(out: &mut String, node: NodeRef<'_>, depth: usize) {
    let indent = "  ".repeat(depth);
    let _ = match node.operation() {
        Some(op) => writeln!(
            out,
            "{indent}{} [{op}] complexity={}: {}",
            node.kind(),
            node.complexity(),
            node.raw_text()
        ),
        None => writeln!(
            out,
            "{indent}{} complexity={}: {}",
            node.kind(),
            node.complexity(),
            node.raw_text()
        ),
    };
    for child in node.children() {
        describe_into(out, child, depth + 1);
    }
}

#[cfg(test)]
mod tests_node {
    use super::*;
    use streamhub_common::FieldSchema;

    #[test]
    fn walks_all_three_kinds() {
        let root = LogicalNode::parse("result * 2 > 4 AND thing = 'a'", &FieldSchema::default()).unwrap();
        let view = NodeRef::from(&root);
        assert_eq!(view.kind(), "logical");
        assert_eq!(view.operation(), Some("AND"));
        let children = view.children();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].kind(), "comparison");
        assert_eq!(children[0].operation(), Some(">"));
        assert_eq!(children[0].children()[0].operation(), Some("*"));
        assert!(children[1].children().is_empty());
    }

    #[test]
    fn describe_indents_children() {
        let root = LogicalNode::parse("NOT result > 4", &FieldSchema::default()).unwrap();
        let dump = describe(NodeRef::from(&root));
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines[0], "logical [NOT] complexity=2: NOT result > 4");
        assert_eq!(lines[1], "  comparison [>] complexity=1: result > 4");
        assert_eq!(lines[2], "    arithmetic complexity=0: result");
        assert_eq!(lines.len(), 4);
    }
}
