use super::function::Function;
use super::host::Host;
use super::val::Value;
use super::var::Var;
use crate::error;
use crate::lang::{BinOp, Error, ExprNode, UnaryOp};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

type Result<T> = std::result::Result<T, Error>;

/// Numeric equality tolerance. Comparisons drift after a few float
/// operations; anything closer than this counts as equal.
pub const EPSILON: f64 = 1e-6;

/// A user-defined function: parameter names plus a compiled body.
#[derive(Debug, Clone)]
pub struct UserFunction {
    pub params: Vec<String>,
    pub body: ExprNode,
}

/// Mutable interpreter state the evaluator reads and writes: variable
/// and array memory, the function table, the instance-owned random
/// source, and the host for `INKEY$`. Two programs never share one.
pub struct Context {
    pub vars: Var,
    pub funcs: HashMap<String, UserFunction>,
    pub rng: StdRng,
    pub host: Box<dyn Host>,
}

impl Context {
    pub fn new(host: Box<dyn Host>) -> Context {
        Context {
            vars: Var::new(),
            funcs: HashMap::new(),
            rng: StdRng::from_entropy(),
            host,
        }
    }

    pub fn clear(&mut self) {
        self.vars.clear();
        self.funcs.clear();
    }

    /// Deterministic RND for tests and replays.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }
}

/// Walk a compiled expression against the current context. Pure in the
/// node and the context state; the same node with the same memory
/// always produces the same value.
pub fn eval(node: &ExprNode, ctx: &mut Context) -> Result<Value> {
    match node {
        ExprNode::Number(n) => Ok(Value::Number(*n)),
        ExprNode::Str(s) => Ok(Value::Str(s.clone())),
        ExprNode::Variable(name) => Ok(ctx.vars.fetch(name)),
        ExprNode::ArrayAccess(name, indices) => {
            let index = match indices.first() {
                Some(node) => eval(node, ctx)?.as_number() as i64,
                None => return Ok(Value::Number(0.0)),
            };
            Ok(ctx.vars.fetch_element(name, index))
        }
        ExprNode::Unary(op, operand) => {
            let v = eval(operand, ctx)?;
            Ok(match op {
                UnaryOp::Negate => Value::Number(-v.as_number()),
                UnaryOp::Not => Value::Number(if v.is_true() { 0.0 } else { 1.0 }),
            })
        }
        ExprNode::Binary(op, lhs, rhs) => {
            let l = eval(lhs, ctx)?;
            let r = eval(rhs, ctx)?;
            binary(*op, l, r)
        }
        ExprNode::Function(name, args) => match name.as_str() {
            "RND" => {
                let roll: f64 = ctx.rng.gen();
                match args.first() {
                    Some(node) => {
                        let max = eval(node, ctx)?.as_number();
                        Ok(Value::Number(roll * max))
                    }
                    None => Ok(Value::Number(roll)),
                }
            }
            "INKEY$" => Ok(Value::Str(ctx.host.last_key().unwrap_or_default())),
            _ => {
                let mut argv = Vec::with_capacity(args.len());
                for arg in args {
                    argv.push(eval(arg, ctx)?);
                }
                Function::call(name, &argv)
            }
        },
        ExprNode::UserCall(name, args) => {
            let func = match ctx.funcs.get(name) {
                Some(f) => f.clone(),
                None => return Err(error!(UndefinedUserFunction)),
            };
            let mut argv = Vec::with_capacity(args.len());
            for arg in args {
                argv.push(eval(arg, ctx)?);
            }
            // Parameters borrow ordinary variable slots for the call;
            // the previous cells come back afterward.
            let saved: Vec<_> = func.params.iter().map(|p| ctx.vars.snapshot(p)).collect();
            for (param, value) in func.params.iter().zip(argv.iter()) {
                ctx.vars.store(param, value)?;
            }
            let result = eval(&func.body, ctx);
            for (param, cell) in func.params.iter().zip(saved) {
                ctx.vars.restore(param, cell);
            }
            result
        }
    }
}

/// Equality used by `=`/`<>` and SELECT CASE matching: exact for two
/// strings, within [`EPSILON`] for numbers.
pub fn values_equal(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Str(a), Value::Str(b)) => a == b,
        _ => (l.as_number() - r.as_number()).abs() < EPSILON,
    }
}

fn binary(op: BinOp, l: Value, r: Value) -> Result<Value> {
    use BinOp::*;
    if let (Value::Str(a), Value::Str(b)) = (&l, &r) {
        let v = match op {
            Add => Value::Str(format!("{}{}", a, b)),
            Equal => truth(a == b),
            NotEqual => truth(a != b),
            Less => truth(a < b),
            LessEqual => truth(a <= b),
            Greater => truth(a > b),
            GreaterEqual => truth(a >= b),
            And => truth(l.is_true() && r.is_true()),
            Or => truth(l.is_true() || r.is_true()),
            _ => Value::Number(0.0),
        };
        return Ok(v);
    }
    // One string operand still concatenates; everything else goes
    // through the numeric reading.
    if matches!(op, Add) && (matches!(l, Value::Str(_)) || matches!(r, Value::Str(_))) {
        return Ok(Value::Str(format!("{}{}", l, r)));
    }
    let (a, b) = (l.as_number(), r.as_number());
    let v = match op {
        Add => Value::Number(a + b),
        Subtract => Value::Number(a - b),
        Multiply => Value::Number(a * b),
        // Division by zero reads as zero. MOD by zero does not: the
        // asymmetry is long-standing observed behavior and callers
        // depend on the quiet division.
        Divide => Value::Number(if b == 0.0 { 0.0 } else { a / b }),
        Modulo => {
            if b == 0.0 {
                return Err(error!(DivisionByZero; "MOD WITH ZERO DIVISOR"));
            }
            Value::Number(a % b)
        }
        Power => Value::Number(a.powf(b)),
        Equal => truth((a - b).abs() < EPSILON),
        NotEqual => truth((a - b).abs() >= EPSILON),
        Less => truth(a < b),
        LessEqual => truth(a <= b),
        Greater => truth(a > b),
        GreaterEqual => truth(a >= b),
        And => truth(a != 0.0 && b != 0.0),
        Or => truth(a != 0.0 || b != 0.0),
    };
    Ok(v)
}

fn truth(b: bool) -> Value {
    Value::Number(if b { 1.0 } else { 0.0 })
}
