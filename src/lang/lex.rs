use super::token::{Operator, Token};

/// Split one statement's text into tokens.
///
/// Whitespace separates words and is dropped; commas and semicolons are
/// kept as separator tokens because PRINT formatting needs them. Text
/// between double quotes is one token, and an unclosed quote quietly
/// consumes the rest of the line. The lexer itself never fails.
pub fn tokenize(line: &str) -> Vec<Token> {
    let mut tokens: Vec<Token> = vec![];
    let mut chars = line.chars().peekable();
    while let Some(&ch) = chars.peek() {
        match ch {
            ' ' | '\t' => {
                chars.next();
            }
            '"' => {
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some('"') | None => break,
                        Some(c) => s.push(c),
                    }
                }
                tokens.push(Token::Str(s));
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            ';' => {
                chars.next();
                tokens.push(Token::Semicolon);
            }
            ':' => {
                chars.next();
                tokens.push(Token::Colon);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '=' => {
                chars.next();
                tokens.push(Token::Operator(Operator::Equal));
            }
            '<' => {
                chars.next();
                tokens.push(Token::Operator(Operator::Less));
            }
            '>' => {
                chars.next();
                tokens.push(Token::Operator(Operator::Greater));
            }
            '+' => {
                chars.next();
                tokens.push(Token::Operator(Operator::Plus));
            }
            '-' => {
                chars.next();
                tokens.push(Token::Operator(Operator::Minus));
            }
            '*' => {
                chars.next();
                tokens.push(Token::Operator(Operator::Multiply));
            }
            '/' => {
                chars.next();
                tokens.push(Token::Operator(Operator::Divide));
            }
            '^' => {
                chars.next();
                tokens.push(Token::Operator(Operator::Caret));
            }
            _ => {
                let mut s = String::new();
                while let Some(&c) = chars.peek() {
                    if is_separator(c) {
                        break;
                    }
                    s.push(c);
                    chars.next();
                }
                tokens.push(Token::Word(s));
            }
        }
    }
    collapse_pairs(&mut tokens);
    tokens
}

fn is_separator(c: char) -> bool {
    matches!(
        c,
        ' ' | '\t' | '"' | ',' | ';' | ':' | '(' | ')' | '=' | '<' | '>' | '+' | '-' | '*' | '/'
            | '^'
    )
}

/// `<=`, `>=` and `<>` come out of the scanner as two tokens; fold each
/// pair back into one before the single-character forms can be misread.
fn collapse_pairs(tokens: &mut Vec<Token>) {
    use Operator::*;
    let mut locs: Vec<(usize, Token)> = vec![];
    let mut iter = tokens.windows(2).enumerate();
    while let Some((index, tt)) = iter.next() {
        let pair = match (&tt[0], &tt[1]) {
            (Token::Operator(Less), Token::Operator(Equal)) => Some(LessEqual),
            (Token::Operator(Greater), Token::Operator(Equal)) => Some(GreaterEqual),
            (Token::Operator(Less), Token::Operator(Greater)) => Some(NotEqual),
            _ => None,
        };
        if let Some(op) = pair {
            locs.push((index, Token::Operator(op)));
            iter.next();
        }
    }
    while let Some((index, token)) = locs.pop() {
        tokens.splice(index..index + 2, Some(token));
    }
}
