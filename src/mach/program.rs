use crate::error;
use crate::lang::{is_keyword, Error, LineNumber};
use std::collections::{BTreeMap, HashMap};

type Result<T> = std::result::Result<T, Error>;

/// Synthetic numbering step for unnumbered statements and labels.
const AUTO_STEP: LineNumber = 10;

/// ## Program memory
///
/// Ordered line-number → statement-text storage plus the label table.
/// Labels are aliases for the synthetic number of the line that follows
/// them; the table is rebuilt on every load and frozen during a run.
#[derive(Debug, Default)]
pub struct Program {
    lines: BTreeMap<LineNumber, String>,
    labels: HashMap<String, LineNumber>,
    auto_line: LineNumber,
}

impl Program {
    pub fn new() -> Program {
        Program {
            lines: BTreeMap::new(),
            labels: HashMap::new(),
            auto_line: AUTO_STEP,
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.labels.clear();
        self.auto_line = AUTO_STEP;
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LineNumber, &String)> {
        self.lines.iter()
    }

    /// Parse a whole source text. Three line forms are recognized:
    /// `<number> <statement>`, a label (`@name ...` or `name: ...`)
    /// which records the label at the next synthetic number, and a bare
    /// statement which is auto-numbered. Nothing here ever fails;
    /// unusable lines load as statements and complain at run time.
    pub fn load(&mut self, source: &str) {
        self.clear();
        for raw in source.lines() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(rest) = line.strip_prefix('@') {
                let rest = rest.trim();
                let (name, stmt) = match rest.find(char::is_whitespace) {
                    Some(at) => (&rest[..at], rest[at..].trim()),
                    None => (rest, ""),
                };
                if !name.is_empty() {
                    self.labels.insert(name.to_ascii_uppercase(), self.auto_line);
                }
                if !stmt.is_empty() {
                    self.lines.insert(self.auto_line, stmt.to_string());
                    self.auto_line += AUTO_STEP;
                }
                continue;
            }
            if let Some(colon) = line.find(':') {
                let prefix = line[..colon].trim();
                if is_label(prefix) {
                    self.labels.insert(prefix.to_ascii_uppercase(), self.auto_line);
                    let stmt = line[colon + 1..].trim();
                    if !stmt.is_empty() {
                        self.lines.insert(self.auto_line, stmt.to_string());
                        self.auto_line += AUTO_STEP;
                    }
                    continue;
                }
            }
            self.enter(line);
        }
        log::debug!(
            "loaded {} lines, {} labels",
            self.lines.len(),
            self.labels.len()
        );
    }

    /// One line in editing form: an explicit number stores (or, with an
    /// empty statement, deletes) that line; anything else is appended
    /// with the next synthetic number.
    fn enter(&mut self, line: &str) {
        let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
        if digits > 0 {
            if let Ok(number) = line[..digits].parse::<LineNumber>() {
                let stmt = line[digits..].trim();
                if stmt.is_empty() {
                    self.lines.remove(&number);
                } else if line.as_bytes()[digits].is_ascii_whitespace() {
                    self.lines.insert(number, stmt.to_string());
                } else {
                    // No separator after the digits: the whole thing is
                    // a statement, not a numbered line.
                    self.auto_insert(line);
                }
                if number >= self.auto_line {
                    self.auto_line = number + AUTO_STEP;
                }
                return;
            }
        }
        self.auto_insert(line);
    }

    fn auto_insert(&mut self, stmt: &str) {
        self.lines.insert(self.auto_line, stmt.to_string());
        self.auto_line += AUTO_STEP;
    }

    /// Label lookup first (case-insensitive), then a literal line
    /// number. `None` is an answer, not an error.
    pub fn try_resolve(&self, target: &str) -> Option<LineNumber> {
        let target = target.trim();
        if let Some(&line) = self.labels.get(&target.to_ascii_uppercase()) {
            return Some(line);
        }
        target.parse::<LineNumber>().ok()
    }

    pub fn resolve(&self, target: &str) -> Result<LineNumber> {
        self.try_resolve(target)
            .ok_or_else(|| error!(UndefinedLine; "UNKNOWN LABEL OR LINE"))
    }

    /// `"<line> <statement>"` per line, ascending.
    pub fn list(&self) -> String {
        let mut s = String::new();
        for (number, stmt) in &self.lines {
            s.push_str(&format!("{} {}\n", number, stmt));
        }
        s
    }
}

/// A line prefix counts as a label only when it looks like a name:
/// `loop:` yes, `10:` no, `PRINT:` no, `IF A THEN B: C` no.
fn is_label(prefix: &str) -> bool {
    let mut chars = prefix.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return false;
    }
    !is_keyword(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_line_forms() {
        let mut p = Program::new();
        p.load("100 PRINT 1\n@loop\nPRINT 2\nagain: PRINT 3");
        assert_eq!(p.try_resolve("LOOP"), Some(110));
        assert_eq!(p.try_resolve("again"), Some(120));
        assert_eq!(p.try_resolve("100"), Some(100));
        assert_eq!(p.try_resolve("nowhere"), None);
        assert_eq!(p.list(), "100 PRINT 1\n110 PRINT 2\n120 PRINT 3\n");
    }

    #[test]
    fn test_auto_numbering_steps_by_ten() {
        let mut p = Program::new();
        p.load("PRINT 1\nPRINT 2");
        assert_eq!(p.list(), "10 PRINT 1\n20 PRINT 2\n");
    }

    #[test]
    fn test_numbered_line_with_empty_statement_deletes() {
        let mut p = Program::new();
        p.load("10 PRINT 1\n20 PRINT 2\n10");
        assert_eq!(p.list(), "20 PRINT 2\n");
    }

    #[test]
    fn test_keyword_prefix_is_not_a_label() {
        let mut p = Program::new();
        p.load("IF X THEN PRINT 1: PRINT 2");
        assert_eq!(p.try_resolve("IF X THEN PRINT 1"), None);
        assert_eq!(p.list(), "10 IF X THEN PRINT 1: PRINT 2\n");
    }
}
