use super::ast::ExprNode;
use super::expr::compile;
use super::lex::tokenize;
use super::token::{reassemble, Operator, Token};

/// One program line classified into its executable form. Classification
/// happens once, at load time; the run loop dispatches on the variant
/// and re-evaluates the cached expression nodes inside it.
#[derive(Debug, PartialEq, Clone)]
pub enum Stmt {
    Print { items: Vec<PrintItem>, newline: bool },
    Let { target: Target, expr: ExprNode },
    Input { prompt: Option<String>, targets: Vec<Target> },
    Goto(String),
    Gosub(String),
    Return,
    If { cond: ExprNode, then_arm: Vec<Stmt>, else_arm: Vec<Stmt> },
    For { var: String, from: ExprNode, to: ExprNode, step: Option<ExprNode> },
    Next,
    While(ExprNode),
    Wend,
    Select(ExprNode),
    Case(ExprNode),
    CaseElse,
    EndSelect,
    Read(Vec<Target>),
    Data,
    Dim(Vec<(String, ExprNode)>),
    DefFn { name: String, params: Vec<String>, body: ExprNode },
    Wait(ExprNode),
    Rem,
    End,
    /// Kept verbatim; becomes a fatal error only if the line executes.
    Unknown(String),
}

#[derive(Debug, PartialEq, Clone)]
pub enum Target {
    Var(String),
    Element(String, ExprNode),
}

#[derive(Debug, PartialEq, Clone)]
pub enum PrintItem {
    Expr(ExprNode),
    Tab,
}

pub fn is_keyword(word: &str) -> bool {
    matches!(
        word.to_ascii_uppercase().as_str(),
        "PRINT"
            | "LET"
            | "INPUT"
            | "GOTO"
            | "GOSUB"
            | "RETURN"
            | "IF"
            | "THEN"
            | "ELSE"
            | "FOR"
            | "TO"
            | "STEP"
            | "NEXT"
            | "WHILE"
            | "WEND"
            | "DATA"
            | "READ"
            | "DIM"
            | "END"
            | "REM"
            | "SELECT"
            | "CASE"
            | "DEF"
            | "FN"
            | "WAIT"
            | "SLEEP"
    )
}

/// Classify one statement's text. Never fails; text that fits no form
/// becomes [`Stmt::Unknown`] and is only reported if it ever runs.
pub fn classify(text: &str) -> Stmt {
    let text = text.trim();
    if text.is_empty() {
        return Stmt::Rem;
    }
    let tokens = tokenize(text);
    let keyword = match tokens.first() {
        Some(Token::Word(w)) => w.to_ascii_uppercase(),
        _ => String::new(),
    };
    match keyword.as_str() {
        "REM" => Stmt::Rem,
        "DATA" => Stmt::Data,
        "RETURN" => Stmt::Return,
        "NEXT" => Stmt::Next,
        "WEND" => Stmt::Wend,
        "END" => match tokens.get(1) {
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("SELECT") => Stmt::EndSelect,
            _ => Stmt::End,
        },
        "PRINT" => print_stmt(&tokens[1..]),
        "GOTO" => jump_stmt(text, &tokens, Stmt::Goto),
        "GOSUB" => jump_stmt(text, &tokens, Stmt::Gosub),
        "IF" => if_stmt(text),
        "FOR" => for_stmt(text, &tokens[1..]),
        "WHILE" => Stmt::While(compile(rest_of(text, "WHILE"))),
        "SELECT" => match tokens.get(1) {
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("CASE") => {
                Stmt::Select(compile(&reassemble(&tokens[2..])))
            }
            _ => Stmt::Unknown(text.to_string()),
        },
        "CASE" => match tokens.get(1) {
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("ELSE") => Stmt::CaseElse,
            Some(_) => Stmt::Case(compile(&reassemble(&tokens[1..]))),
            None => Stmt::Unknown(text.to_string()),
        },
        "READ" => Stmt::Read(var_list(&tokens[1..])),
        "INPUT" => input_stmt(&tokens[1..]),
        "DIM" => dim_stmt(text, &tokens[1..]),
        "LET" => let_stmt(text, rest_of(text, "LET")),
        "DEF" => def_fn(text),
        "WAIT" | "SLEEP" => Stmt::Wait(compile(rest_of(text, &keyword))),
        _ => {
            if top_level_equal(text).is_some() {
                let_stmt(text, text)
            } else {
                Stmt::Unknown(text.to_string())
            }
        }
    }
}

/// Text after the leading keyword.
fn rest_of<'a>(text: &'a str, keyword: &str) -> &'a str {
    text[keyword.len()..].trim()
}

fn jump_stmt(text: &str, tokens: &[Token], make: fn(String) -> Stmt) -> Stmt {
    match tokens.get(1) {
        Some(Token::Word(target)) => make(target.clone()),
        _ => Stmt::Unknown(text.to_string()),
    }
}

fn print_stmt(tokens: &[Token]) -> Stmt {
    let mut items = vec![];
    let mut buf: Vec<Token> = vec![];
    fn flush(buf: &mut Vec<Token>, items: &mut Vec<PrintItem>) {
        if !buf.is_empty() {
            items.push(PrintItem::Expr(compile(&reassemble(buf))));
            buf.clear();
        }
    }
    let mut depth = 0;
    for token in tokens {
        match token {
            // Separators only separate outside paren lists; a comma
            // inside INSTR(...) belongs to the call.
            Token::Comma if depth == 0 => {
                flush(&mut buf, &mut items);
                items.push(PrintItem::Tab);
            }
            Token::Semicolon if depth == 0 => flush(&mut buf, &mut items),
            Token::Colon if depth == 0 => break,
            _ => {
                match token {
                    Token::LParen => depth += 1,
                    Token::RParen => depth -= 1,
                    _ => {}
                }
                if depth == 0 && breaks_item(buf.last(), token) {
                    flush(&mut buf, &mut items);
                }
                buf.push(token.clone());
            }
        }
    }
    flush(&mut buf, &mut items);
    let newline = !matches!(tokens.last(), Some(Token::Comma) | Some(Token::Semicolon));
    Stmt::Print { items, newline }
}

/// Two adjacent operands with no operator between them start a new
/// print item, so `PRINT "X=" X` emits both. Word operators and `FN`
/// glue their neighbors together instead.
fn breaks_item(prev: Option<&Token>, cur: &Token) -> bool {
    fn operand(t: &Token) -> bool {
        match t {
            Token::Str(_) | Token::RParen => true,
            Token::Word(w) => !joins(w),
            _ => false,
        }
    }
    fn joins(w: &str) -> bool {
        matches!(
            w.to_ascii_uppercase().as_str(),
            "MOD" | "AND" | "OR" | "NOT" | "FN"
        )
    }
    let prev = match prev {
        Some(t) => t,
        None => return false,
    };
    let cur_operand = match cur {
        Token::Str(_) => true,
        Token::Word(w) => !joins(w),
        _ => false,
    };
    operand(prev) && cur_operand
}

fn var_list(tokens: &[Token]) -> Vec<Target> {
    tokens
        .iter()
        .filter_map(|t| match t {
            Token::Word(w) => Some(Target::Var(w.to_ascii_uppercase())),
            _ => None,
        })
        .collect()
}

fn input_stmt(tokens: &[Token]) -> Stmt {
    let mut rest = tokens;
    let mut prompt = None;
    if let Some(Token::Str(p)) = rest.first() {
        prompt = Some(p.clone());
        rest = &rest[1..];
        if matches!(rest.first(), Some(Token::Comma) | Some(Token::Semicolon)) {
            rest = &rest[1..];
        }
    }
    Stmt::Input {
        prompt,
        targets: var_list(rest),
    }
}

fn dim_stmt(text: &str, tokens: &[Token]) -> Stmt {
    let mut entries = vec![];
    let mut i = 0;
    while i < tokens.len() {
        let name = match &tokens[i] {
            Token::Word(w) => w.to_ascii_uppercase(),
            _ => return Stmt::Unknown(text.to_string()),
        };
        if !matches!(tokens.get(i + 1), Some(Token::LParen)) {
            return Stmt::Unknown(text.to_string());
        }
        let mut depth = 1;
        let mut j = i + 2;
        while j < tokens.len() && depth > 0 {
            match tokens[j] {
                Token::LParen => depth += 1,
                Token::RParen => depth -= 1,
                _ => {}
            }
            j += 1;
        }
        if depth != 0 {
            return Stmt::Unknown(text.to_string());
        }
        let bound = compile(&reassemble(&tokens[i + 2..j - 1]));
        entries.push((name, bound));
        i = j;
        if matches!(tokens.get(i), Some(Token::Comma)) {
            i += 1;
        } else {
            break;
        }
    }
    if entries.is_empty() {
        return Stmt::Unknown(text.to_string());
    }
    Stmt::Dim(entries)
}

fn for_stmt(text: &str, tokens: &[Token]) -> Stmt {
    let var = match tokens.first() {
        Some(Token::Word(w)) => w.to_ascii_uppercase(),
        _ => return Stmt::Unknown(text.to_string()),
    };
    if !matches!(tokens.get(1), Some(Token::Operator(Operator::Equal))) {
        return Stmt::Unknown(text.to_string());
    }
    let mut split_to = None;
    let mut split_step = None;
    let mut depth = 0;
    for (i, token) in tokens.iter().enumerate().skip(2) {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => depth -= 1,
            Token::Word(w) if depth == 0 && w.eq_ignore_ascii_case("TO") && split_to.is_none() => {
                split_to = Some(i);
            }
            Token::Word(w) if depth == 0 && w.eq_ignore_ascii_case("STEP") => {
                split_step = Some(i);
            }
            _ => {}
        }
    }
    let to_at = match split_to {
        Some(i) => i,
        None => return Stmt::Unknown(text.to_string()),
    };
    let from = compile(&reassemble(&tokens[2..to_at]));
    let (to, step) = match split_step {
        Some(s) if s > to_at => (
            compile(&reassemble(&tokens[to_at + 1..s])),
            Some(compile(&reassemble(&tokens[s + 1..]))),
        ),
        _ => (compile(&reassemble(&tokens[to_at + 1..])), None),
    };
    Stmt::For { var, from, to, step }
}

/// Byte index of the first top-level `=` that is an assignment rather
/// than part of a comparison operator.
fn top_level_equal(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0;
    let mut quoted = false;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'"' => quoted = !quoted,
            b'(' if !quoted => depth += 1,
            b')' if !quoted => depth -= 1,
            b'=' if !quoted && depth == 0 => {
                if i > 0 && matches!(bytes[i - 1], b'<' | b'>') {
                    return None;
                }
                return Some(i);
            }
            b'<' | b'>' if !quoted && depth == 0 => return None,
            _ => {}
        }
    }
    None
}

fn let_stmt(original: &str, assign: &str) -> Stmt {
    let eq = match top_level_equal(assign) {
        Some(i) => i,
        None => return Stmt::Unknown(original.to_string()),
    };
    let lhs = assign[..eq].trim();
    let expr = compile(assign[eq + 1..].trim());
    let target = match parse_target(lhs) {
        Some(t) => t,
        None => return Stmt::Unknown(original.to_string()),
    };
    Stmt::Let { target, expr }
}

fn parse_target(lhs: &str) -> Option<Target> {
    if let Some(paren) = lhs.find('(') {
        if !lhs.ends_with(')') {
            return None;
        }
        let name = lhs[..paren].trim();
        if !is_name(name) {
            return None;
        }
        let index = compile(&lhs[paren + 1..lhs.len() - 1]);
        return Some(Target::Element(name.to_ascii_uppercase(), index));
    }
    if is_name(lhs) {
        return Some(Target::Var(lhs.to_ascii_uppercase()));
    }
    None
}

fn is_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.')
}

/// Case-insensitive word search outside string literals. Returns the
/// byte index of the first match.
fn find_bare_word(text: &str, word: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let n = word.len();
    if bytes.len() < n {
        return None;
    }
    let mut quoted = false;
    for i in 0..=bytes.len() - n {
        if bytes[i] == b'"' {
            quoted = !quoted;
            continue;
        }
        if quoted {
            continue;
        }
        if !bytes[i..i + n].eq_ignore_ascii_case(word.as_bytes()) {
            continue;
        }
        if i > 0 && bytes[i - 1].is_ascii_alphanumeric() {
            continue;
        }
        if i + n < bytes.len() && bytes[i + n].is_ascii_alphanumeric() {
            continue;
        }
        return Some(i);
    }
    None
}

fn if_stmt(text: &str) -> Stmt {
    let then_at = match find_bare_word(text, "THEN") {
        Some(i) => i,
        None => return Stmt::Unknown(text.to_string()),
    };
    let cond = compile(text[2..then_at].trim());
    let rest = &text[then_at + 4..];
    let (then_text, else_text) = match find_bare_word(rest, "ELSE") {
        Some(i) => (&rest[..i], Some(&rest[i + 4..])),
        None => (rest, None),
    };
    Stmt::If {
        cond,
        then_arm: arm_stmts(then_text),
        else_arm: else_text.map(arm_stmts).unwrap_or_default(),
    }
}

/// An IF arm is a colon-separated statement list, except that a lone
/// word which is not a keyword reads as a jump target.
fn arm_stmts(text: &str) -> Vec<Stmt> {
    split_statements(text)
        .into_iter()
        .map(|piece| {
            let tokens = tokenize(&piece);
            match (tokens.len(), tokens.first()) {
                (1, Some(Token::Word(w))) if !is_keyword(w) => Stmt::Goto(w.clone()),
                _ => classify(&piece),
            }
        })
        .collect()
}

fn split_statements(text: &str) -> Vec<String> {
    let mut pieces = vec![];
    let mut current = String::new();
    let mut quoted = false;
    for c in text.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            ':' if !quoted => {
                pieces.push(current.trim().to_string());
                current = String::new();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        pieces.push(current.trim().to_string());
    }
    pieces.retain(|p| !p.is_empty());
    pieces
}

fn def_fn(text: &str) -> Stmt {
    let eq = match top_level_equal(text) {
        Some(i) => i,
        None => return Stmt::Unknown(text.to_string()),
    };
    let head = text[3..eq].trim();
    let head = match head.len() >= 2 && head.as_bytes()[..2].eq_ignore_ascii_case(b"FN") {
        true => head[2..].trim(),
        false => return Stmt::Unknown(text.to_string()),
    };
    let paren = match head.find('(') {
        Some(p) => p,
        None => return Stmt::Unknown(text.to_string()),
    };
    let name = head[..paren].trim().to_ascii_uppercase();
    if name.is_empty() || !head.ends_with(')') {
        return Stmt::Unknown(text.to_string());
    }
    let params: Vec<String> = head[paren + 1..head.len() - 1]
        .split(',')
        .map(|p| p.trim().to_ascii_uppercase())
        .filter(|p| !p.is_empty())
        .collect();
    let body = compile(text[eq + 1..].trim());
    Stmt::DefFn { name, params, body }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::ast::BinOp;

    #[test]
    fn test_classify_let_forms() {
        let explicit = classify("LET X = 5");
        let implicit = classify("X = 5");
        assert_eq!(explicit, implicit);
        assert!(matches!(
            classify("A(3) = 1"),
            Stmt::Let { target: Target::Element(..), .. }
        ));
    }

    #[test]
    fn test_classify_if_with_jump_arm() {
        match classify("IF X > 2 THEN 100 ELSE PRINT X") {
            Stmt::If { then_arm, else_arm, .. } => {
                assert_eq!(then_arm, vec![Stmt::Goto("100".to_string())]);
                assert!(matches!(else_arm[0], Stmt::Print { .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_classify_for_with_step() {
        match classify("FOR I=5 TO 1 STEP -1") {
            Stmt::For { var, step, .. } => {
                assert_eq!(var, "I");
                assert!(step.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_print_items_split_between_operands() {
        match classify(r#"PRINT "X=" X"#) {
            Stmt::Print { items, newline } => {
                assert_eq!(items.len(), 2);
                assert!(newline);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_print_keeps_mod_expression_whole() {
        match classify("PRINT 1 MOD 0") {
            Stmt::Print { items, .. } => {
                assert_eq!(items.len(), 1);
                match &items[0] {
                    PrintItem::Expr(ExprNode::Binary(BinOp::Modulo, ..)) => {}
                    other => panic!("unexpected item {:?}", other),
                }
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_end_select_vs_end() {
        assert_eq!(classify("END SELECT"), Stmt::EndSelect);
        assert_eq!(classify("END"), Stmt::End);
    }

    #[test]
    fn test_unknown_statement_is_preserved() {
        assert_eq!(
            classify("FROB 1,2"),
            Stmt::Unknown("FROB 1,2".to_string())
        );
    }
}
