use super::val::{TypedValue, Value, VarKind};
use crate::error;
use crate::lang::Error;
use std::collections::HashMap;

type Result<T> = std::result::Result<T, Error>;

/// ## Variable and array memory
///
/// Names are normalized to uppercase; the storage class comes from the
/// name suffix at every access. Reading a name that was never written
/// yields its kind's zero value.
#[derive(Debug, Default)]
pub struct Var {
    vars: HashMap<String, TypedValue>,
    arrays: HashMap<String, Array>,
}

#[derive(Debug)]
struct Array {
    kind: VarKind,
    cells: Vec<TypedValue>,
}

impl Var {
    pub fn new() -> Var {
        Var::default()
    }

    pub fn clear(&mut self) {
        self.vars.clear();
        self.arrays.clear();
    }

    fn normalize(name: &str) -> String {
        name.to_ascii_uppercase()
    }

    pub fn fetch(&self, name: &str) -> Value {
        let key = Var::normalize(name);
        match self.vars.get(&key) {
            Some(tv) => tv.value(),
            None => VarKind::of(&key).zero(),
        }
    }

    /// `None` until the variable has been assigned at least once.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.vars.get(&Var::normalize(name)).map(|tv| tv.value())
    }

    pub fn store(&mut self, name: &str, value: &Value) -> Result<()> {
        if self.vars.len() > u16::MAX as usize {
            return Err(error!(OutOfMemory; "TOO MANY VARIABLES"));
        }
        let key = Var::normalize(name);
        let kind = VarKind::of(&key);
        self.vars.insert(key, TypedValue::coerce(kind, value));
        Ok(())
    }

    /// Raw cell snapshot, used to save and restore the parameter slots
    /// around a user-function application.
    pub fn snapshot(&self, name: &str) -> Option<TypedValue> {
        self.vars.get(&Var::normalize(name)).cloned()
    }

    pub fn restore(&mut self, name: &str, cell: Option<TypedValue>) {
        let key = Var::normalize(name);
        match cell {
            Some(tv) => {
                self.vars.insert(key, tv);
            }
            None => {
                self.vars.remove(&key);
            }
        }
    }

    /// Allocate `size` zero-initialized cells. A second DIM of the same
    /// name replaces the old array outright.
    pub fn dimension(&mut self, name: &str, size: usize) -> Result<()> {
        if size > u16::MAX as usize {
            return Err(error!(OutOfMemory; "ARRAY TOO LARGE"));
        }
        let key = Var::normalize(name);
        let kind = VarKind::of(&key);
        let zero = TypedValue::coerce(kind, &kind.zero());
        self.arrays.insert(
            key,
            Array {
                kind,
                cells: vec![zero; size],
            },
        );
        Ok(())
    }

    /// Out-of-range reads are not an error: they yield the kind's zero,
    /// the same as an undimensioned name.
    pub fn fetch_element(&self, name: &str, index: i64) -> Value {
        let key = Var::normalize(name);
        match self.arrays.get(&key) {
            Some(array) if index >= 0 && (index as usize) < array.cells.len() => {
                array.cells[index as usize].value()
            }
            _ => VarKind::of(&key).zero(),
        }
    }

    /// Writes are held to the declared bound.
    pub fn store_element(&mut self, name: &str, index: i64, value: &Value) -> Result<()> {
        let key = Var::normalize(name);
        let array = match self.arrays.get_mut(&key) {
            Some(a) => a,
            None => return Err(error!(SubscriptOutOfRange; "ARRAY NOT DIMENSIONED")),
        };
        if index < 0 || index as usize >= array.cells.len() {
            return Err(error!(SubscriptOutOfRange));
        }
        array.cells[index as usize] = TypedValue::coerce(array.kind, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unassigned_reads_zero() {
        let vars = Var::new();
        assert_eq!(vars.fetch("X"), Value::Number(0.0));
        assert_eq!(vars.fetch("X$"), Value::Str(String::new()));
        assert_eq!(vars.get("X"), None);
    }

    #[test]
    fn test_store_clamps_by_suffix() {
        let mut vars = Var::new();
        vars.store("HITS.B", &Value::Number(200.0)).unwrap();
        assert_eq!(vars.fetch("hits.b"), Value::Number(127.0));
    }

    #[test]
    fn test_array_read_leniency_write_strictness() {
        let mut vars = Var::new();
        vars.dimension("A", 11).unwrap();
        assert_eq!(vars.fetch_element("A", 10), Value::Number(0.0));
        assert_eq!(vars.fetch_element("A", 99), Value::Number(0.0));
        vars.store_element("A", 10, &Value::Number(7.0)).unwrap();
        assert_eq!(vars.fetch_element("A", 10), Value::Number(7.0));
        assert!(vars.store_element("A", 11, &Value::Number(1.0)).is_err());
        assert!(vars.store_element("B", 0, &Value::Number(1.0)).is_err());
    }
}
