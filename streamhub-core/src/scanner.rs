//! Quote- and parenthesis-aware string analysis.
//!
//! Every node constructor splits only at positions certified by these helpers,
//! so operator tokens inside string literals or nested groups are never taken
//! as structure. All indices are byte offsets; the characters that drive the
//! scan are ASCII, so every returned index lies on a char boundary.

use streamhub_common::{Result, StreamHubError};

/// placeholder for masked bytes; neither an operator, a word character nor whitespace
const MASK: u8 = 0;

fn is_word(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
}

/// Copy of `s` with quoted literals masked out, and with everything inside
/// parentheses masked when `nested` is set. A doubled single quote inside a
/// single-quoted literal is an escaped quote.
fn mask(s: &str, nested: bool) -> Vec<u8> {
    let bytes = s.as_bytes();
    let mut out = bytes.to_vec();
    let mut depth: i32 = 0;
    let (mut single, mut double) = (false, false);
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if single {
            out[i] = MASK;
            if b == b'\'' {
                if bytes.get(i + 1) == Some(&b'\'') {
                    out[i + 1] = MASK;
                    i += 2;
                    continue;
                }
                single = false;
            }
        } else if double {
            out[i] = MASK;
            if b == b'"' {
                double = false;
            }
        } else {
            match b {
                b'\'' => {
                    single = true;
                    out[i] = MASK;
                }
                b'"' => {
                    double = true;
                    out[i] = MASK;
                }
                b'(' if nested => {
                    depth += 1;
                    out[i] = MASK;
                }
                b')' if nested => {
                    if depth > 0 {
                        out[i] = MASK;
                    }
                    depth -= 1;
                }
                _ if nested && depth > 0 => out[i] = MASK,
                _ => {}
            }
        }
        i += 1;
    }
    out
}

/// mask of `s` where only depth-0 bytes outside literals survive
pub(crate) fn mask_nested(s: &str) -> Vec<u8> {
    mask(s, true)
}

/// final depth and whether the depth ever went negative, ignoring quoted parentheses
fn paren_depth(s: &str) -> (i32, bool) {
    let mut depth = 0;
    let mut dipped = false;
    for b in mask(s, false) {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                dipped |= depth < 0;
            }
            _ => {}
        }
    }
    (depth, dipped)
}

fn occurrences<'a>(hay: &'a [u8], needle: &'a [u8]) -> impl DoubleEndedIterator<Item = usize> + 'a {
    let width = needle.len().max(1);
    hay.windows(width)
        .enumerate()
        .filter(move |(_, w)| !needle.is_empty() && *w == needle)
        .map(|(i, _)| i)
}

fn word_bounded(hay: &[u8], at: usize, len: usize) -> bool {
    let before = at == 0 || !is_word(hay[at - 1]);
    let after = at + len >= hay.len() || !is_word(hay[at + len]);
    before && after
}

/// Trim unmatched parentheses one at a time from the unbalanced side until the
/// text balances. Fails when no trim resolves it.
pub fn balance(s: &str) -> Result<&str> {
    let mut t = s.trim();
    loop {
        let (depth, dipped) = paren_depth(t);
        if depth == 0 && !dipped {
            return Ok(t);
        }
        if depth > 0 && t.starts_with('(') {
            t = t[1..].trim();
        } else if depth < 0 && t.ends_with(')') {
            t = t[..t.len() - 1].trim();
        } else {
            return Err(StreamHubError::syntax("parentheses are not closing", s.trim()));
        }
    }
}

/// Characters of `s` at parenthesis depth zero, after repairing the
/// parenthesization. A string with no top-level content is unwrapped one level
/// and retried.
pub fn outer_span(s: &str) -> Result<String> {
    let t = balance(s)?;
    let bytes = t.as_bytes();
    let mut depth = 0usize;
    let mut span = Vec::with_capacity(bytes.len());
    for (i, m) in mask(t, false).into_iter().enumerate() {
        match m {
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => span.push(bytes[i]),
            _ => {}
        }
    }
    let span = String::from_utf8_lossy(&span).into_owned();
    if !span.trim().is_empty() {
        return Ok(span);
    }
    if t.len() >= 2 && t.starts_with('(') && t.ends_with(')') {
        return outer_span(&t[1..t.len() - 1]);
    }
    Err(StreamHubError::syntax("query is invalid", s.trim()))
}

/// First index of `token` in `s` that is at depth zero and outside quoted literals.
pub fn safe_split_index(s: &str, token: &str) -> Option<usize> {
    let masked = mask(s, true);
    let found = occurrences(&masked, token.as_bytes()).next();
    found
}

/// Rightmost top-level, word-bounded occurrence of `keyword` outside literals.
pub fn find_keyword(s: &str, keyword: &str) -> Option<usize> {
    let masked = mask(s, true);
    let found = occurrences(&masked, keyword.as_bytes())
        .rev()
        .find(|&i| word_bounded(&masked, i, keyword.len()));
    found
}

/// Whether `keyword` occurs as a whole word outside quoted literals, at any depth.
pub fn contains_keyword(s: &str, keyword: &str) -> bool {
    let masked = mask(s, false);
    let found = occurrences(&masked, keyword.as_bytes()).any(|i| word_bounded(&masked, i, keyword.len()));
    found
}

/// Remove parentheses that wrap the whole (trimmed) expression, recursively.
pub fn strip_parens(s: &str) -> &str {
    let t = s.trim();
    if t.len() >= 2 && t.starts_with('(') && t.ends_with(')') {
        let inner = &t[1..t.len() - 1];
        let mut depth = 0i32;
        for b in mask(inner, false) {
            match b {
                b'(' => depth += 1,
                b')' => depth -= 1,
                _ => {}
            }
            if depth < 0 {
                return t;
            }
        }
        return strip_parens(inner);
    }
    t
}

#[cfg(test)]
mod tests_scanner {
    use super::*;

    #[test]
    fn strip_removes_only_wrapping_parens() {
        assert_eq!(strip_parens("  ((a = 1))  "), "a = 1");
        assert_eq!(strip_parens("(a) AND (b)"), "(a) AND (b)");
        assert_eq!(strip_parens("((100 ) % 13 ) "), "(100 ) % 13");
        assert_eq!(strip_parens("x"), "x");
        assert_eq!(strip_parens("()"), "");
    }

    #[test]
    fn strip_ignores_quoted_parens() {
        assert_eq!(strip_parens("(thing = ')')"), "thing = ')'");
    }

    #[test]
    fn outer_span_drops_nested_groups() {
        assert_eq!(outer_span("(a OR b) AND c").unwrap(), " AND c");
        assert_eq!(outer_span("(result - 12.3)^2 = 0").unwrap(), "^2 = 0");
    }

    #[test]
    fn outer_span_unwraps_fully_grouped() {
        assert_eq!(outer_span("((a AND b))").unwrap(), "a AND b");
    }

    #[test]
    fn outer_span_repairs_unmatched() {
        assert_eq!(outer_span("(result < 30").unwrap(), "result < 30");
        assert_eq!(outer_span("result < 30)").unwrap(), "result < 30");
        assert_eq!(balance("((result < 30)").unwrap(), "(result < 30)");
    }

    #[test]
    fn outer_span_rejects_unfixable() {
        let err = outer_span("(result < 30)))) AND result > 4)").unwrap_err();
        assert!(err.is_syntax());
        assert!(outer_span(")a(").unwrap_err().is_syntax());
        assert!(outer_span("(a)(b)").unwrap_err().is_syntax());
    }

    #[test]
    fn split_index_skips_literals_and_groups() {
        let s = "(quantity = 'a=b') AND quantity = 'x'";
        assert_eq!(safe_split_index(s, "="), Some(32));
        assert_eq!(safe_split_index("thing = 'it''s = odd'", "="), Some(6));
        assert_eq!(safe_split_index("thing = \"a<b\"", "<"), None);
        assert_eq!(safe_split_index("abc", ""), None);
        assert_eq!(safe_split_index("a ~ b", "="), None);
    }

    #[test]
    fn keyword_is_word_bounded() {
        let s = "quantity = 'q' XORG result < 30";
        assert_eq!(find_keyword(s, "XOR"), None);
        assert_eq!(find_keyword(s, "OR"), None);
        let s = "a = 'x OR y' OR b = 1 OR c = 2";
        assert_eq!(find_keyword(s, "OR"), Some(22));
        assert_eq!(find_keyword("(a OR b)", "OR"), None);
        assert_eq!(find_keyword("(a)OR(b)", "OR"), Some(3));
    }

    #[test]
    fn contains_keyword_sees_inside_groups_not_literals() {
        assert!(contains_keyword("(result - 12.3)^2", "result"));
        assert!(!contains_keyword("'result' = 1", "result"));
        assert!(!contains_keyword("results = 1", "result"));
        assert!(contains_keyword("result-5", "result"));
    }

    #[test]
    fn non_ascii_literals_keep_offsets() {
        let s = "thing = 'Größe' AND result > 1";
        let idx = find_keyword(s, "AND").unwrap();
        assert_eq!(&s[idx..idx + 3], "AND");
    }
}
