use super::val::Value;
use crate::lang::Error;
use chrono::{Local, Timelike};
use log::warn;

type Result<T> = std::result::Result<T, Error>;

/// ## Built-in functions
///
/// The name set is fixed; anything else followed by a paren list is an
/// array access. `RND` and `INKEY$` need interpreter state and are
/// applied by the evaluator itself.
pub struct Function {}

impl Function {
    pub fn is_builtin(name: &str) -> bool {
        matches!(
            name,
            "SIN" | "COS" | "TAN" | "ATN" | "SQR" | "ABS" | "INT" | "SGN" | "LOG" | "EXP"
                | "RND" | "LEN" | "ASC" | "VAL" | "INSTR" | "CHR$" | "STR$" | "LEFT$" | "RIGHT$"
                | "MID$" | "UPPER$" | "LOWER$" | "TRIM$" | "REPLACE$" | "REVERSE$" | "INKEY$"
                | "TIMER" | "TIME$" | "DATE$"
        )
    }

    /// Apply a stateless built-in. Missing arguments read as zero or
    /// empty text rather than failing.
    pub fn call(name: &str, args: &[Value]) -> Result<Value> {
        let num = |i: usize| args.get(i).map(Value::as_number).unwrap_or(0.0);
        let text = |i: usize| args.get(i).map(Value::as_text).unwrap_or_default();
        let value = match name {
            "SIN" => Value::Number(num(0).sin()),
            "COS" => Value::Number(num(0).cos()),
            "TAN" => Value::Number(num(0).tan()),
            "ATN" => Value::Number(num(0).atan()),
            "SQR" => Value::Number(num(0).sqrt()),
            "ABS" => Value::Number(num(0).abs()),
            "INT" => Value::Number(num(0).floor()),
            "SGN" => Value::Number(match num(0) {
                n if n > 0.0 => 1.0,
                n if n < 0.0 => -1.0,
                _ => 0.0,
            }),
            "LOG" => Value::Number(num(0).ln()),
            "EXP" => Value::Number(num(0).exp()),
            "LEN" => Value::Number(text(0).chars().count() as f64),
            "ASC" => Value::Number(text(0).chars().next().map(|c| c as u32 as f64).unwrap_or(0.0)),
            "VAL" => Value::Number(text(0).trim().parse::<f64>().unwrap_or(0.0)),
            "INSTR" => Value::Number(Function::instr(&text(0), &text(1))),
            "CHR$" => Value::Str(
                char::from_u32(num(0) as u32).map(String::from).unwrap_or_default(),
            ),
            "STR$" => Value::Str(Value::Number(num(0)).to_string()),
            "LEFT$" => Value::Str(Function::left(&text(0), num(1) as i64)),
            "RIGHT$" => Value::Str(Function::right(&text(0), num(1) as i64)),
            "MID$" => {
                let s = text(0);
                let count = if args.len() > 2 { num(2) as i64 } else { i64::MAX };
                Value::Str(Function::mid(&s, num(1) as i64, count))
            }
            "UPPER$" => Value::Str(text(0).to_uppercase()),
            "LOWER$" => Value::Str(text(0).to_lowercase()),
            "TRIM$" => Value::Str(text(0).trim().to_string()),
            "REPLACE$" => Value::Str(text(0).replace(&text(1), &text(2))),
            "REVERSE$" => Value::Str(text(0).chars().rev().collect()),
            "TIMER" => Value::Number(Function::seconds_since_midnight()),
            "TIME$" => Value::Str(Local::now().format("%H:%M:%S").to_string()),
            "DATE$" => Value::Str(Local::now().format("%m-%d-%Y").to_string()),
            _ => {
                warn!("unknown function {}", name);
                Value::Number(0.0)
            }
        };
        Ok(value)
    }

    fn seconds_since_midnight() -> f64 {
        let now = Local::now();
        now.num_seconds_from_midnight() as f64 + now.nanosecond() as f64 / 1e9
    }

    fn left(s: &str, count: i64) -> String {
        let count = count.max(0) as usize;
        s.chars().take(count).collect()
    }

    fn right(s: &str, count: i64) -> String {
        let count = count.max(0) as usize;
        let len = s.chars().count();
        s.chars().skip(len.saturating_sub(count)).collect()
    }

    /// 1-based start, like every BASIC that came before it.
    fn mid(s: &str, start: i64, count: i64) -> String {
        let start = (start.max(1) - 1) as usize;
        let count = count.max(0);
        s.chars()
            .skip(start)
            .take(count.min(usize::MAX as i64) as usize)
            .collect()
    }

    /// 1-based position of the needle, 0 when absent.
    fn instr(haystack: &str, needle: &str) -> f64 {
        match haystack.find(needle) {
            Some(byte_pos) => (haystack[..byte_pos].chars().count() + 1) as f64,
            None => 0.0,
        }
    }
}
