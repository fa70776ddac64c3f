use super::ast::{BinOp, ExprNode, UnaryOp};
use super::Error;
use crate::error;
use crate::mach::Function;
use log::warn;

type Result<T> = std::result::Result<T, Error>;

/// Compile expression text into a reusable [`ExprNode`].
///
/// A malformed expression never aborts the caller: it degrades to a
/// constant zero node and leaves a diagnostic in the log. Statement
/// classification calls this once per source occurrence; evaluation
/// re-walks the cached node from then on.
pub fn compile(expr: &str) -> ExprNode {
    let expr = expr.trim();
    if expr.is_empty() {
        return ExprNode::Number(0.0);
    }
    match parse_expr(expr) {
        Ok(node) => node,
        Err(e) => {
            warn!("expression degraded to 0: {:?} ({})", expr, e);
            ExprNode::Number(0.0)
        }
    }
}

fn parse_expr(s: &str) -> Result<ExprNode> {
    parse_or(s)
}

/// Paren depth and string-literal membership for every byte, computed
/// once so the right-to-left operator scans can index it directly.
struct Scan {
    depth: Vec<i32>,
    in_str: Vec<bool>,
}

impl Scan {
    fn new(s: &str) -> Scan {
        let bytes = s.as_bytes();
        let mut depth = vec![0; bytes.len()];
        let mut in_str = vec![false; bytes.len()];
        let mut cur = 0;
        let mut quoted = false;
        for (i, &b) in bytes.iter().enumerate() {
            if b == b'"' {
                in_str[i] = true;
                quoted = !quoted;
                depth[i] = cur;
                continue;
            }
            in_str[i] = quoted;
            if quoted {
                depth[i] = cur;
            } else if b == b'(' {
                depth[i] = cur;
                cur += 1;
            } else if b == b')' {
                cur -= 1;
                depth[i] = cur;
            } else {
                depth[i] = cur;
            }
        }
        Scan { depth, in_str }
    }

    fn top(&self, i: usize) -> bool {
        self.depth[i] == 0 && !self.in_str[i]
    }
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b == b'.'
}

/// Rightmost top-level occurrence of a word operator (`OR`, `AND`,
/// `MOD`, ...) with proper boundaries on both sides.
fn find_word_op(s: &str, word: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let n = word.len();
    if bytes.len() < n + 2 {
        return None;
    }
    let scan = Scan::new(s);
    for i in (1..=bytes.len() - n).rev() {
        if !scan.top(i) {
            continue;
        }
        if !bytes[i..i + n].eq_ignore_ascii_case(word.as_bytes()) {
            continue;
        }
        if is_word_byte(bytes[i - 1]) {
            continue;
        }
        if i + n < bytes.len() && is_word_byte(bytes[i + n]) {
            continue;
        }
        return Some(i);
    }
    None
}

fn parse_or(s: &str) -> Result<ExprNode> {
    if let Some(i) = find_word_op(s, "OR") {
        let lhs = parse_or(s[..i].trim())?;
        let rhs = parse_and(s[i + 2..].trim())?;
        return Ok(ExprNode::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs)));
    }
    parse_and(s)
}

fn parse_and(s: &str) -> Result<ExprNode> {
    if let Some(i) = find_word_op(s, "AND") {
        let lhs = parse_and(s[..i].trim())?;
        let rhs = parse_comparison(s[i + 3..].trim())?;
        return Ok(ExprNode::Binary(BinOp::And, Box::new(lhs), Box::new(rhs)));
    }
    parse_comparison(s)
}

fn parse_comparison(s: &str) -> Result<ExprNode> {
    let bytes = s.as_bytes();
    let scan = Scan::new(s);
    let mut split = None;
    for i in (0..bytes.len()).rev() {
        if !scan.top(i) {
            continue;
        }
        // Two-character operators claim their position before the
        // single-character prefixes can.
        match bytes[i] {
            b'=' if i > 0 && bytes[i - 1] == b'>' => {
                split = Some((i - 1, i + 1, BinOp::GreaterEqual));
            }
            b'=' if i > 0 && bytes[i - 1] == b'<' => {
                split = Some((i - 1, i + 1, BinOp::LessEqual));
            }
            b'>' if i > 0 && bytes[i - 1] == b'<' => {
                split = Some((i - 1, i + 1, BinOp::NotEqual));
            }
            b'>' if i + 1 >= bytes.len() || bytes[i + 1] != b'=' => {
                split = Some((i, i + 1, BinOp::Greater));
            }
            b'<' if i + 1 >= bytes.len() || (bytes[i + 1] != b'=' && bytes[i + 1] != b'>') => {
                split = Some((i, i + 1, BinOp::Less));
            }
            b'=' => {
                split = Some((i, i + 1, BinOp::Equal));
            }
            _ => continue,
        }
        break;
    }
    if let Some((start, end, op)) = split {
        let lhs = parse_addsub(s[..start].trim())?;
        let rhs = parse_addsub(s[end..].trim())?;
        return Ok(ExprNode::Binary(op, Box::new(lhs), Box::new(rhs)));
    }
    parse_addsub(s)
}

/// True when the sign at `i` is part of a scientific-notation literal
/// such as `1e-5`, which must stay inside one operand.
fn is_exponent_sign(bytes: &[u8], i: usize) -> bool {
    i >= 2
        && (bytes[i - 1] == b'e' || bytes[i - 1] == b'E')
        && (bytes[i - 2].is_ascii_digit() || bytes[i - 2] == b'.')
}

/// The word ending just before `i` (skipping spaces), uppercased, when
/// it is one of the operator keywords. A `-` after `MOD` is unary.
fn trailing_word_op(bytes: &[u8], i: usize) -> bool {
    let mut j = i;
    while j > 0 && bytes[j - 1] == b' ' {
        j -= 1;
    }
    let end = j;
    while j > 0 && bytes[j - 1].is_ascii_alphabetic() {
        j -= 1;
    }
    let word = std::str::from_utf8(&bytes[j..end]).unwrap_or("").to_ascii_uppercase();
    matches!(word.as_str(), "MOD" | "AND" | "OR" | "NOT")
}

/// The preceding non-space byte marks this sign as unary rather than
/// binary: another operator, an open paren, or nothing at all.
fn sign_is_unary(bytes: &[u8], i: usize) -> bool {
    let mut j = i;
    while j > 0 && bytes[j - 1] == b' ' {
        j -= 1;
    }
    if j == 0 {
        return true;
    }
    if matches!(bytes[j - 1], b'+' | b'-' | b'*' | b'/' | b'^' | b'<' | b'>' | b'=' | b'(') {
        return true;
    }
    trailing_word_op(bytes, i)
}

fn parse_addsub(s: &str) -> Result<ExprNode> {
    let bytes = s.as_bytes();
    let scan = Scan::new(s);
    for i in (1..bytes.len()).rev() {
        if !scan.top(i) {
            continue;
        }
        let op = match bytes[i] {
            b'+' => BinOp::Add,
            b'-' => BinOp::Subtract,
            _ => continue,
        };
        if is_exponent_sign(bytes, i) || sign_is_unary(bytes, i) {
            continue;
        }
        let lhs = parse_addsub(s[..i].trim())?;
        let rhs = parse_muldiv(s[i + 1..].trim())?;
        return Ok(ExprNode::Binary(op, Box::new(lhs), Box::new(rhs)));
    }
    parse_muldiv(s)
}

fn parse_muldiv(s: &str) -> Result<ExprNode> {
    let bytes = s.as_bytes();
    let scan = Scan::new(s);
    for i in (0..bytes.len()).rev() {
        if !scan.top(i) {
            continue;
        }
        match bytes[i] {
            b'*' | b'/' if i > 0 => {
                let op = if bytes[i] == b'*' {
                    BinOp::Multiply
                } else {
                    BinOp::Divide
                };
                let lhs = parse_muldiv(s[..i].trim())?;
                let rhs = parse_power(s[i + 1..].trim())?;
                return Ok(ExprNode::Binary(op, Box::new(lhs), Box::new(rhs)));
            }
            b'D' | b'd' if i >= 3 && bytes[i - 2..=i].eq_ignore_ascii_case(b"MOD") => {
                if is_word_byte(bytes[i - 3]) {
                    continue;
                }
                if i + 1 < bytes.len() && is_word_byte(bytes[i + 1]) {
                    continue;
                }
                let lhs = parse_muldiv(s[..i - 2].trim())?;
                let rhs = parse_power(s[i + 1..].trim())?;
                return Ok(ExprNode::Binary(
                    BinOp::Modulo,
                    Box::new(lhs),
                    Box::new(rhs),
                ));
            }
            _ => {}
        }
    }
    parse_power(s)
}

fn parse_power(s: &str) -> Result<ExprNode> {
    let bytes = s.as_bytes();
    let scan = Scan::new(s);
    for i in (1..bytes.len()).rev() {
        if scan.top(i) && bytes[i] == b'^' {
            let lhs = parse_power(s[..i].trim())?;
            let rhs = parse_unary(s[i + 1..].trim())?;
            return Ok(ExprNode::Binary(
                BinOp::Power,
                Box::new(lhs),
                Box::new(rhs),
            ));
        }
    }
    parse_unary(s)
}

fn parse_unary(s: &str) -> Result<ExprNode> {
    let s = s.trim();
    if let Some(rest) = s.strip_prefix('-') {
        let operand = parse_unary(rest)?;
        return Ok(ExprNode::Unary(UnaryOp::Negate, Box::new(operand)));
    }
    if let Some(rest) = s.strip_prefix('+') {
        return parse_unary(rest);
    }
    if s.len() > 3 && s.as_bytes()[..3].eq_ignore_ascii_case(b"NOT") && !is_word_byte(s.as_bytes()[3]) {
        let operand = parse_unary(&s[3..])?;
        return Ok(ExprNode::Unary(UnaryOp::Not, Box::new(operand)));
    }
    parse_primary(s)
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.')
}

fn find_matching(s: &str, open: usize) -> Option<usize> {
    let scan = Scan::new(s);
    let bytes = s.as_bytes();
    let mut depth = 0;
    for i in open..bytes.len() {
        if scan.in_str[i] {
            continue;
        }
        if bytes[i] == b'(' {
            depth += 1;
        } else if bytes[i] == b')' {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

const ZERO_ARG: [&str; 5] = ["RND", "INKEY$", "TIMER", "TIME$", "DATE$"];

fn parse_primary(s: &str) -> Result<ExprNode> {
    let s = s.trim();
    if s.is_empty() {
        return Err(error!(SyntaxError; "MISSING OPERAND"));
    }
    let bytes = s.as_bytes();

    if bytes[0] == b'(' {
        match find_matching(s, 0) {
            Some(close) if close == bytes.len() - 1 => return parse_expr(&s[1..close]),
            _ => return Err(error!(SyntaxError; "UNBALANCED PARENTHESES")),
        }
    }

    if bytes[0] == b'"' {
        let inner = &s[1..];
        let inner = inner.strip_suffix('"').unwrap_or(inner);
        return Ok(ExprNode::Str(inner.to_string()));
    }

    // FN NAME(args) applies a user-defined function.
    if s.len() > 3 && bytes[..2].eq_ignore_ascii_case(b"FN") && bytes[2] == b' ' {
        if let Some(paren) = s.find('(') {
            if find_matching(s, paren) == Some(bytes.len() - 1) {
                let name = s[2..paren].trim();
                if is_identifier(name) {
                    let args = parse_args(&s[paren + 1..bytes.len() - 1])?;
                    return Ok(ExprNode::UserCall(name.to_ascii_uppercase(), args));
                }
            }
        }
    }

    if let Some(paren) = s.find('(') {
        if paren > 0 && find_matching(s, paren) == Some(bytes.len() - 1) {
            let name = s[..paren].trim();
            if !is_identifier(name) {
                return Err(error!(SyntaxError; "EXPECTED NAME"));
            }
            let name = name.to_ascii_uppercase();
            let args = parse_args(&s[paren + 1..bytes.len() - 1])?;
            // Anything with a paren list that is not a known function
            // must be an array element.
            if Function::is_builtin(&name) {
                return Ok(ExprNode::Function(name, args));
            }
            return Ok(ExprNode::ArrayAccess(name, args));
        }
    }

    if s.len() > 2 && bytes[..2].eq_ignore_ascii_case(b"0x") {
        return match i64::from_str_radix(&s[2..], 16) {
            Ok(v) => Ok(ExprNode::Number(v as f64)),
            Err(_) => Ok(ExprNode::Number(0.0)),
        };
    }

    if bytes[0].is_ascii_digit() || bytes[0] == b'.' {
        return match s.parse::<f64>() {
            Ok(v) => Ok(ExprNode::Number(v)),
            Err(_) => Err(error!(SyntaxError; "BAD NUMBER")),
        };
    }

    let upper = s.to_ascii_uppercase();
    if ZERO_ARG.contains(&upper.as_str()) {
        return Ok(ExprNode::Function(upper, vec![]));
    }
    if is_identifier(s) {
        return Ok(ExprNode::Variable(upper));
    }
    Err(error!(SyntaxError; "EXPECTED EXPRESSION"))
}

fn parse_args(inner: &str) -> Result<Vec<ExprNode>> {
    if inner.trim().is_empty() {
        return Ok(vec![]);
    }
    let scan = Scan::new(inner);
    let mut args = vec![];
    let mut start = 0;
    for (i, &b) in inner.as_bytes().iter().enumerate() {
        if b == b',' && scan.top(i) {
            args.push(parse_expr(inner[start..i].trim())?);
            start = i + 1;
        }
    }
    args.push(parse_expr(inner[start..].trim())?);
    Ok(args)
}
