use crate::arithmetic::ArithmeticNode;
use crate::scanner;
use std::cmp::Ordering;
use std::fmt;
use streamhub_common::{FieldSchema, Record, Result, StreamHubError};
use tracing::{debug, trace};

/// tolerance for numeric `=` and `<>`
pub const EPSILON: f64 = 1e-7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl CmpOp {
    // two-character operators first so `<` never matches inside `<=` or `<>`
    const PROBE_ORDER: [CmpOp; 6] = [CmpOp::Le, CmpOp::Ge, CmpOp::Ne, CmpOp::Eq, CmpOp::Lt, CmpOp::Gt];

    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "<>",
            CmpOp::Lt => "<",
            CmpOp::Gt => ">",
            CmpOp::Le => "<=",
            CmpOp::Ge => ">=",
        }
    }

    /// operator for the same relation with its operands exchanged
    pub fn mirrored(self) -> Self {
        match self {
            CmpOp::Lt => CmpOp::Gt,
            CmpOp::Gt => CmpOp::Lt,
            CmpOp::Le => CmpOp::Ge,
            CmpOp::Ge => CmpOp::Le,
            op => op,
        }
    }

    fn holds(self, ord: Ordering) -> bool {
        match self {
            CmpOp::Eq => ord == Ordering::Equal,
            CmpOp::Ne => ord != Ordering::Equal,
            CmpOp::Lt => ord == Ordering::Less,
            CmpOp::Gt => ord == Ordering::Greater,
            CmpOp::Le => ord != Ordering::Greater,
            CmpOp::Ge => ord != Ordering::Less,
        }
    }

    fn holds_numeric(self, l: f64, r: f64) -> bool {
        match self {
            CmpOp::Eq => (l - r).abs() < EPSILON,
            CmpOp::Ne => !((l - r).abs() < EPSILON),
            CmpOp::Lt => l < r,
            CmpOp::Gt => l > r,
            CmpOp::Le => l <= r,
            CmpOp::Ge => l >= r,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Operands {
    Numeric { left: ArithmeticNode, right: ArithmeticNode },
    Text { field: String, literal: String },
}

/// Binary relation between the field-bearing operand (kept on the left) and
/// either an arithmetic expression or a string literal.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonNode {
    raw: String,
    op: CmpOp,
    operands: Operands,
    swapped: bool,
    complexity: usize,
}

impl ComparisonNode {
    pub fn parse(expr: &str, schema: &FieldSchema) -> Result<Self> {
        let raw = scanner::strip_parens(scanner::balance(expr)?);
        if raw.is_empty() {
            return Err(StreamHubError::syntax("empty comparison", expr.trim()));
        }
        let span = scanner::outer_span(raw)?;
        sanity_check(&span, raw, schema)?;
        if !references_field(raw, schema) {
            return Err(StreamHubError::syntax(
                format!("the expression does not contain a key of {:?}", schema.allowed),
                raw,
            ));
        }

        let (op, idx) = CmpOp::PROBE_ORDER
            .iter()
            .find_map(|op| scanner::safe_split_index(raw, op.symbol()).map(|i| (*op, i)))
            .ok_or_else(|| StreamHubError::syntax("couldn't find a comparison operator", raw))?;
        let mut left = raw[..idx].trim();
        let mut right = raw[idx + op.symbol().len()..].trim();
        if left.is_empty() || right.is_empty() {
            return Err(StreamHubError::syntax(
                format!("missing operand for '{}'", op.symbol()),
                raw,
            ));
        }
        let swapped = !references_field(left, schema);
        if swapped {
            std::mem::swap(&mut left, &mut right);
        }

        let operands = if scanner::contains_keyword(left, &schema.numeric) {
            let left = ArithmeticNode::parse(left, schema)?;
            let right = ArithmeticNode::parse(right, schema)?;
            Operands::Numeric { left, right }
        } else {
            let field = scanner::strip_parens(left);
            if !schema.is_allowed(field) {
                return Err(StreamHubError::syntax(
                    "a string comparison needs a bare field name on one side",
                    raw,
                ));
            }
            Operands::Text { field: field.to_string(), literal: parse_literal(right, raw)? }
        };
        let complexity = match &operands {
            Operands::Numeric { left, right } => left.complexity().max(right.complexity()) + 1,
            Operands::Text { .. } => 1,
        };
        debug!(expr = raw, op = op.symbol(), swapped, "comparison parsed");
        Ok(Self { raw: raw.to_string(), op, operands, swapped, complexity })
    }

    pub fn value(&self, record: &Record) -> Result<bool> {
        let op = self.effective_op();
        let holds = match &self.operands {
            Operands::Text { field, literal } => {
                let data = record.get_str(field)?;
                let data: &str = &data;
                op.holds(data.cmp(literal.as_str()))
            }
            Operands::Numeric { left, right } => {
                op.holds_numeric(left.value(record)?, right.value(record)?)
            }
        };
        trace!(expr = %self.raw, holds, "comparison value");
        Ok(holds)
    }

    pub fn raw_text(&self) -> &str {
        &self.raw
    }

    /// the operator as written
    pub fn operation(&self) -> CmpOp {
        self.op
    }

    /// the operator applied to (field side, other side)
    pub fn effective_op(&self) -> CmpOp {
        if self.swapped {
            self.op.mirrored()
        } else {
            self.op
        }
    }

    pub fn is_swapped(&self) -> bool {
        self.swapped
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.operands, Operands::Numeric { .. })
    }

    pub fn operands(&self) -> Option<(&ArithmeticNode, &ArithmeticNode)> {
        match &self.operands {
            Operands::Numeric { left, right } => Some((left, right)),
            Operands::Text { .. } => None,
        }
    }

    pub fn complexity(&self) -> usize {
        self.complexity
    }
}

impl fmt::Display for ComparisonNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = self.effective_op().symbol();
        match &self.operands {
            Operands::Numeric { left, right } => write!(f, "({left} {op} {right})"),
            Operands::Text { field, literal } => {
                write!(f, "({field} {op} '{}')", literal.replace('\'', "''"))
            }
        }
    }
}

fn references_field(expr: &str, schema: &FieldSchema) -> bool {
    schema.allowed.iter().any(|f| scanner::contains_keyword(expr, f))
}

/// Strip every allowed field name, quoted content, digits and whitespace from
/// the top-level span. More than three leftover characters means some operand
/// is an unknown name.
fn sanity_check(span: &str, raw: &str, schema: &FieldSchema) -> Result<()> {
    let mut rest = span.to_string();
    for key in &schema.allowed {
        rest = rest.replace(key.as_str(), "");
    }
    let mut in_quotes = false;
    let residue: String = rest
        .chars()
        .filter(|&c| {
            if c == '\'' {
                in_quotes = !in_quotes;
            }
            !in_quotes
        })
        .filter(|c| !(c.is_ascii_digit() || *c == '.' || c.is_whitespace()))
        .collect();
    if residue.chars().count() > 3 {
        return Err(StreamHubError::syntax(
            format!("the sanity check fails, the key must be one of {:?}", schema.allowed),
            raw,
        ));
    }
    Ok(())
}

/// single-quoted literal with `''` as the escaped quote
fn parse_literal(s: &str, raw: &str) -> Result<String> {
    let inner = s
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
        .ok_or_else(|| {
            StreamHubError::syntax("expected a quoted string literal opposite the field", raw)
        })?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\'' {
            if chars.peek() != Some(&'\'') {
                return Err(StreamHubError::syntax("unescaped quote inside string literal", raw));
            }
            chars.next();
        }
        out.push(c);
    }
    Ok(out)
}

#[cfg(test)]
mod tests_comparison {
    use super::*;

    fn record() -> Record {
        Record::from_json_str(r#"{"quantity":"temperature","thing":"Station_1","result":12.3}"#)
            .unwrap()
    }

    fn check(expr: &str) -> bool {
        ComparisonNode::parse(expr, &FieldSchema::default())
            .unwrap()
            .value(&record())
            .unwrap()
    }

    fn parse_err(expr: &str) -> String {
        let err = ComparisonNode::parse(expr, &FieldSchema::default()).unwrap_err();
        assert!(err.is_syntax(), "{err}");
        err.to_string()
    }

    #[test]
    fn string_equality() {
        assert!(check("thing = 'Station_1'"));
        assert!(!check("quantity <> 'temperature'"));
        assert!(check("quantity<>'temperature_123'"));
        assert!(!check("'trickyquantity' = quantity"));
    }

    #[test]
    fn string_ordering_respects_swap() {
        assert!(check("thing > 'Station_0'"));
        assert!(check("'Station_2' > thing"));
        assert!(!check("'Station_0' > thing"));
        assert!(check("'Station_1' >= thing"));
    }

    #[test]
    fn numeric_relations() {
        assert!(check("result < 30"));
        assert!(check("result < 3*10"));
        assert!(!check("result < 100 % 13"));
        assert!(check("result - 5 < 10"));
        assert!(check("result <= 12.3"));
        assert!(check("(result - 12.3)^2 = 0"));
        assert!(check("result <> 12"));
        assert!(!check("result <> 12.3"));
    }

    #[test]
    fn epsilon_equality_is_symmetric() {
        assert!(!check("result = 13"));
        assert!(!check("13 = result"));
        assert!(check("result = 12.30000001"));
    }

    #[test]
    fn swap_matches_written_direction() {
        let schema = FieldSchema::default();
        let swapped = ComparisonNode::parse("30 > result", &schema).unwrap();
        let plain = ComparisonNode::parse("result < 30", &schema).unwrap();
        assert!(swapped.is_swapped());
        assert_eq!(swapped.effective_op(), CmpOp::Lt);
        for v in [0.0, 29.9, 30.0, 30.1, -5.0] {
            let mut r = Record::new();
            r.insert("result", v);
            assert_eq!(swapped.value(&r).unwrap(), plain.value(&r).unwrap(), "result = {v}");
        }
    }

    #[test]
    fn literals_hide_operators() {
        assert!(!check("'trickyq<uantity' = quantity"));
        assert!(!check("quantity = 'tricky>AND<for_=_quantity'"));
        assert!(check("quantity <> 'a<=b'"));
    }

    #[test]
    fn escaped_quote_in_literal() {
        let mut r = Record::new();
        r.insert("thing", "Tom's car");
        let node = ComparisonNode::parse("thing = 'Tom''s car'", &FieldSchema::default()).unwrap();
        assert!(node.value(&r).unwrap());
        assert_eq!(node.to_string(), "(thing = 'Tom''s car')");
    }

    #[test]
    fn complexity_of_leaves() {
        let schema = FieldSchema::default();
        assert_eq!(ComparisonNode::parse("thing = 'x'", &schema).unwrap().complexity(), 1);
        assert_eq!(ComparisonNode::parse("result > 4", &schema).unwrap().complexity(), 1);
        assert_eq!(ComparisonNode::parse("result < 10^10 % 13", &schema).unwrap().complexity(), 3);
    }

    #[test]
    fn rejects_unknown_field() {
        let msg = parse_err("bad_Quantity = 'wrong keyword'");
        assert!(msg.contains("sanity check"), "{msg}");
        assert!(msg.contains("bad_Quantity = 'wrong keyword'"));
        assert!(parse_err("bad_field = 'x'").contains("bad_field = 'x'"));
        parse_err("6 = 'another beer'");
        parse_err("BAD_TRUE");
    }

    #[test]
    fn rejects_bad_operator_and_literals() {
        assert!(parse_err("result ~ 30").contains("couldn't find a comparison operator"));
        parse_err("result = 30'asdf'");
        parse_err("result = 30asdf");
        parse_err("result = 10 # pi");
        parse_err("quantity = temperature");
        parse_err("quantity = 'stranger's quantity'");
        parse_err("thing = result");
        parse_err("result =");
    }

    #[test]
    fn wrong_record_types_fail_per_record() {
        let node = ComparisonNode::parse("result > 4", &FieldSchema::default()).unwrap();
        let mut r = Record::new();
        r.insert("result", "warm");
        assert!(node.value(&r).unwrap_err().is_field_type());
        let node = ComparisonNode::parse("thing = 'x'", &FieldSchema::default()).unwrap();
        assert!(node.value(&Record::new()).unwrap_err().is_field_type());
    }
}
