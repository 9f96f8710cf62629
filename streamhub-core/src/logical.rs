use crate::comparison::ComparisonNode;
use crate::scanner;
use std::fmt;
use streamhub_common::{FieldSchema, Record, Result, StreamHubError};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Xor,
    Not,
}

impl LogicalOp {
    pub fn keyword(self) -> &'static str {
        match self {
            LogicalOp::And => "AND",
            LogicalOp::Or => "OR",
            LogicalOp::Xor => "XOR",
            LogicalOp::Not => "NOT",
        }
    }

    fn apply(self, l: bool, r: bool) -> bool {
        match self {
            LogicalOp::And => l && r,
            LogicalOp::Or => l || r,
            LogicalOp::Xor => l ^ r,
            LogicalOp::Not => !l,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(bool),
    Not(Box<LogicalNode>),
    Binary {
        op: LogicalOp,
        left: Box<LogicalNode>,
        right: Box<LogicalNode>,
    },
    Comparison(ComparisonNode),
}

/// Boolean combination of comparisons; the root of every filter tree.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalNode {
    raw: String,
    expr: Expr,
    complexity: usize,
}

impl LogicalNode {
    pub fn parse(expr: &str, schema: &FieldSchema) -> Result<Self> {
        let raw = scanner::strip_parens(scanner::balance(expr)?);
        if raw.is_empty() {
            return Err(StreamHubError::syntax("empty logical expression", expr.trim()));
        }
        match raw {
            "TRUE" => return Ok(Self::literal(raw, true)),
            "FALSE" => return Ok(Self::literal(raw, false)),
            _ => {}
        }

        if let Some((idx, op)) = split_point(raw) {
            let (lhs, rhs) = (&raw[..idx], &raw[idx + op.keyword().len()..]);
            if lhs.trim().is_empty() || rhs.trim().is_empty() {
                return Err(StreamHubError::syntax(
                    format!("missing operand for '{}'", op.keyword()),
                    raw,
                ));
            }
            let left = Self::parse(lhs, schema)?;
            let right = Self::parse(rhs, schema)?;
            let complexity = left.complexity.max(right.complexity) + 1;
            debug!(expr = raw, op = op.keyword(), "logical split");
            return Ok(Self {
                raw: raw.to_string(),
                expr: Expr::Binary { op, left: Box::new(left), right: Box::new(right) },
                complexity,
            });
        }

        if let Some(rest) = strip_not(raw) {
            if rest.trim().is_empty() {
                return Err(StreamHubError::syntax("missing operand for 'NOT'", raw));
            }
            let child = Self::parse(rest, schema)?;
            let complexity = child.complexity + 1;
            debug!(expr = raw, "logical negation");
            return Ok(Self { raw: raw.to_string(), expr: Expr::Not(Box::new(child)), complexity });
        }

        let cmp = ComparisonNode::parse(raw, schema)?;
        let complexity = cmp.complexity();
        Ok(Self { raw: raw.to_string(), expr: Expr::Comparison(cmp), complexity })
    }

    fn literal(raw: &str, value: bool) -> Self {
        Self { raw: raw.to_string(), expr: Expr::Literal(value), complexity: 1 }
    }

    /// Both operands of a connective are always evaluated, so a field error on
    /// either side surfaces regardless of the other side's value.
    pub fn evaluate(&self, record: &Record) -> Result<bool> {
        let v = match &self.expr {
            Expr::Literal(b) => *b,
            Expr::Comparison(c) => c.value(record)?,
            Expr::Not(child) => !child.evaluate(record)?,
            Expr::Binary { op, left, right } => {
                let l = left.evaluate(record)?;
                let r = right.evaluate(record)?;
                op.apply(l, r)
            }
        };
        trace!(expr = %self.raw, value = v, "logical value");
        Ok(v)
    }

    pub fn raw_text(&self) -> &str {
        &self.raw
    }

    pub fn operation(&self) -> Option<LogicalOp> {
        match &self.expr {
            Expr::Not(_) => Some(LogicalOp::Not),
            Expr::Binary { op, .. } => Some(*op),
            _ => None,
        }
    }

    pub fn children(&self) -> Vec<&LogicalNode> {
        match &self.expr {
            Expr::Not(child) => vec![&**child],
            Expr::Binary { left, right, .. } => vec![&**left, &**right],
            _ => Vec::new(),
        }
    }

    /// the wrapped comparison when this node is a comparison leaf
    pub fn comparison(&self) -> Option<&ComparisonNode> {
        match &self.expr {
            Expr::Comparison(c) => Some(c),
            _ => None,
        }
    }

    pub fn literal_value(&self) -> Option<bool> {
        match &self.expr {
            Expr::Literal(b) => Some(*b),
            _ => None,
        }
    }

    pub fn complexity(&self) -> usize {
        self.complexity
    }
}

impl fmt::Display for LogicalNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.expr {
            Expr::Literal(true) => f.write_str("TRUE"),
            Expr::Literal(false) => f.write_str("FALSE"),
            Expr::Not(child) => write!(f, "(NOT {child})"),
            Expr::Binary { op, left, right } => write!(f, "({left} {} {right})", op.keyword()),
            Expr::Comparison(c) => write!(f, "{c}"),
        }
    }
}

/// rightmost top-level OR/XOR, else rightmost top-level AND
fn split_point(raw: &str) -> Option<(usize, LogicalOp)> {
    let or = scanner::find_keyword(raw, "OR").map(|i| (i, LogicalOp::Or));
    let xor = scanner::find_keyword(raw, "XOR").map(|i| (i, LogicalOp::Xor));
    let weakest = match (or, xor) {
        (Some(a), Some(b)) => Some(if a.0 > b.0 { a } else { b }),
        (a, b) => a.or(b),
    };
    weakest.or_else(|| scanner::find_keyword(raw, "AND").map(|i| (i, LogicalOp::And)))
}

fn strip_not(raw: &str) -> Option<&str> {
    let rest = raw.strip_prefix("NOT")?;
    match rest.bytes().next() {
        None => Some(rest),
        Some(b) if b.is_ascii_alphanumeric() || b == b'_' => None,
        Some(_) => Some(rest),
    }
}
