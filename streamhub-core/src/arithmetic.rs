use crate::scanner;
use std::fmt;
use streamhub_common::{FieldSchema, Record, Result, StreamHubError};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

impl ArithOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Rem => "%",
            ArithOp::Pow => "^",
        }
    }

    fn from_byte(b: u8) -> Option<Self> {
        match b {
            b'+' => Some(ArithOp::Add),
            b'-' => Some(ArithOp::Sub),
            b'*' => Some(ArithOp::Mul),
            b'/' => Some(ArithOp::Div),
            b'%' => Some(ArithOp::Rem),
            b'^' => Some(ArithOp::Pow),
            _ => None,
        }
    }

    /// plain IEEE-754 semantics: division or remainder by zero yields inf/NaN
    pub fn apply(self, l: f64, r: f64) -> f64 {
        match self {
            ArithOp::Add => l + r,
            ArithOp::Sub => l - r,
            ArithOp::Mul => l * r,
            ArithOp::Div => l / r,
            ArithOp::Rem => l % r,
            ArithOp::Pow => l.powf(r),
        }
    }
}

// lowest precedence first
const TIERS: [&[u8]; 3] = [b"+-", b"*/%", b"^"];

#[derive(Debug, Clone, PartialEq)]
enum Term {
    Number(f64),
    Field(String),
    Binary {
        op: ArithOp,
        left: Box<ArithmeticNode>,
        right: Box<ArithmeticNode>,
    },
}

/// Numeric sub-expression over literals and the schema's numeric field.
#[derive(Debug, Clone, PartialEq)]
pub struct ArithmeticNode {
    raw: String,
    term: Term,
    complexity: usize,
}

impl ArithmeticNode {
    pub fn parse(expr: &str, schema: &FieldSchema) -> Result<Self> {
        let raw = scanner::strip_parens(scanner::balance(expr)?);
        if raw.is_empty() {
            return Err(StreamHubError::syntax("empty arithmetic expression", expr.trim()));
        }
        if let Some((idx, op)) = split_point(raw) {
            let (lhs, rhs) = (&raw[..idx], &raw[idx + 1..]);
            if lhs.trim().is_empty() || rhs.trim().is_empty() {
                return Err(StreamHubError::syntax(
                    format!("missing operand for '{}'", op.symbol()),
                    raw,
                ));
            }
            let left = Self::parse(lhs, schema)?;
            let right = Self::parse(rhs, schema)?;
            let complexity = left.complexity.max(right.complexity) + 1;
            debug!(expr = raw, op = op.symbol(), "arithmetic split");
            return Ok(Self {
                raw: raw.to_string(),
                term: Term::Binary { op, left: Box::new(left), right: Box::new(right) },
                complexity,
            });
        }
        let term = if schema.is_numeric(raw) {
            Term::Field(raw.to_string())
        } else if schema.is_allowed(raw) {
            return Err(StreamHubError::syntax(
                format!("field '{raw}' is not numeric and cannot be used in arithmetic"),
                raw,
            ));
        } else {
            let n = raw
                .parse::<f64>()
                .map_err(|_| StreamHubError::syntax("not a number", raw))?;
            Term::Number(n)
        };
        Ok(Self { raw: raw.to_string(), term, complexity: 0 })
    }

    pub fn value(&self, record: &Record) -> Result<f64> {
        let v = match &self.term {
            Term::Number(n) => *n,
            Term::Field(f) => record.get_f64(f)?,
            Term::Binary { op, left, right } => op.apply(left.value(record)?, right.value(record)?),
        };
        trace!(expr = %self.raw, value = v, "arithmetic value");
        Ok(v)
    }

    pub fn raw_text(&self) -> &str {
        &self.raw
    }

    pub fn operation(&self) -> Option<ArithOp> {
        match &self.term {
            Term::Binary { op, .. } => Some(*op),
            _ => None,
        }
    }

    pub fn children(&self) -> Option<(&ArithmeticNode, &ArithmeticNode)> {
        match &self.term {
            Term::Binary { left, right, .. } => Some((left, right)),
            _ => None,
        }
    }

    pub fn complexity(&self) -> usize {
        self.complexity
    }

    /// true when the sub-tree reads the numeric field
    pub fn references_field(&self) -> bool {
        match &self.term {
            Term::Number(_) => false,
            Term::Field(_) => true,
            Term::Binary { left, right, .. } => left.references_field() || right.references_field(),
        }
    }
}

impl fmt::Display for ArithmeticNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.term {
            Term::Binary { op, left, right } => write!(f, "({left} {} {right})", op.symbol()),
            _ => f.write_str(&self.raw),
        }
    }
}

/// Rightmost top-level operator of the lowest tier present. Splitting there
/// and recursing left keeps `-` and `/` left-associative.
fn split_point(raw: &str) -> Option<(usize, ArithOp)> {
    let masked = scanner::mask_nested(raw);
    for tier in TIERS {
        let found = (0..masked.len()).rev().find(|&i| {
            let b = masked[i];
            tier.contains(&b) && (!matches!(b, b'+' | b'-') || is_binary_sign(&masked, i))
        });
        if let Some(i) = found {
            return ArithOp::from_byte(masked[i]).map(|op| (i, op));
        }
    }
    None
}

/// a `+`/`-` is binary when an operand precedes it and it is not an exponent sign
fn is_binary_sign(m: &[u8], i: usize) -> bool {
    let prev = m[..i].iter().rev().find(|b| !b.is_ascii_whitespace());
    match prev {
        None => false,
        Some(p) if b"+-*/%^".contains(p) => false,
        Some(_) => !is_exponent_sign(m, i),
    }
}

fn is_exponent_sign(m: &[u8], i: usize) -> bool {
    if i < 2 || !matches!(m[i - 1], b'e' | b'E') {
        return false;
    }
    let mut j = i - 1;
    let mut digits = 0;
    while j > 0 && (m[j - 1].is_ascii_digit() || m[j - 1] == b'.') {
        j -= 1;
        digits += 1;
    }
    digits > 0 && (j == 0 || !(m[j - 1].is_ascii_alphanumeric() || m[j - 1] == b'_'))
}

#[cfg(test)]
mod tests_arithmetic {
    use super::*;

    fn eval(expr: &str) -> f64 {
        ArithmeticNode::parse(expr, &FieldSchema::default())
            .unwrap()
            .value(&Record::new())
            .unwrap()
    }

    fn parse_err(expr: &str) -> StreamHubError {
        ArithmeticNode::parse(expr, &FieldSchema::default()).unwrap_err()
    }

    #[test] fn literal() { assert_eq!(eval("2"), 2.0); }
    #[test] fn product() { assert_eq!(eval("2*3"), 6.0); }
    #[test] fn product_minus() { assert_eq!(eval("2*3-1"), 5.0); }
    #[test] fn products_differ() { assert_eq!(eval("2*3-1*100"), -94.0); }
    #[test] fn grouped() { assert_eq!(eval("2*(3-1)*100"), 400.0); }
    #[test] fn power_binds_tightest() { assert_eq!(eval("2*(3-1)^4"), 32.0); }
    #[test] fn remainder() { assert_eq!(eval("100 % 13"), 9.0); }
    #[test] fn redundant_parens() { assert_eq!(eval("((100 ) % 13 ) "), 9.0); }
    #[test] fn rounding() { assert!((eval("2*3.1") - 6.2).abs() < 1e-6); }
    #[test] fn left_to_right() { assert!((eval("10+1+5-2-2+5-3*3.1") - 7.7).abs() < 1e-6); }
    #[test] fn division_is_left_assoc() { assert_eq!(eval("100/10/5"), 2.0); }
    #[test] fn unary_minus() { assert_eq!(eval("-3.99"), -3.99); assert_eq!(eval("2*-3"), -6.0); assert_eq!(eval("4 - -1"), 5.0); }
    #[test] fn exponent_literal() { assert!((eval("1e-7 + 1") - 1.0000001).abs() < 1e-12); }
    #[test] fn small_power() { assert!((eval("0.4^10") - 0.4f64.powi(10)).abs() < 1e-15); }

    #[test]
    fn division_by_zero_passes_through() {
        assert!(eval("1/0").is_infinite());
        assert!(eval("1 % 0").is_nan());
    }

    #[test]
    fn degree_of_the_tree() {
        let schema = FieldSchema::default();
        assert_eq!(ArithmeticNode::parse("2*(3-1)*100", &schema).unwrap().complexity(), 3);
        assert_eq!(ArithmeticNode::parse("42", &schema).unwrap().complexity(), 0);
        assert_eq!(ArithmeticNode::parse("10^10 % 13", &schema).unwrap().complexity(), 2);
    }

    #[test]
    fn reads_numeric_field() {
        let mut r = Record::new();
        r.insert("result", 12.3);
        let node = ArithmeticNode::parse("(result - 12.3)^2", &FieldSchema::default()).unwrap();
        assert!(node.references_field());
        assert!(node.value(&r).unwrap().abs() < 1e-12);
        assert_eq!(node.operation(), Some(ArithOp::Pow));
        assert_eq!(node.to_string(), "((result - 12.3) ^ 2)");
    }

    #[test]
    fn missing_field_is_field_type_error() {
        let node = ArithmeticNode::parse("result + 1", &FieldSchema::default()).unwrap();
        assert!(node.value(&Record::new()).unwrap_err().is_field_type());
        let mut r = Record::new();
        r.insert("result", "warm");
        assert!(node.value(&r).unwrap_err().is_field_type());
    }

    #[test]
    fn rejects_malformed() {
        assert!(parse_err("30asdf").is_syntax());
        assert!(parse_err("10 # pi").is_syntax());
        assert!(parse_err("2*").is_syntax());
        assert!(parse_err("").is_syntax());
        assert!(parse_err("thing + 1").is_syntax());
    }
}
