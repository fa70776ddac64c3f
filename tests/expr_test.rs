mod common;
use basic::mach::Value;
use common::Session;

fn eval(expr: &str) -> Value {
    Session::new().interpreter.evaluate(expr)
}

#[test]
fn test_precedence() {
    assert_eq!(eval("2+3*4"), Value::Number(14.0));
    assert_eq!(eval("(2+3)*4"), Value::Number(20.0));
    assert_eq!(eval("2*3^2"), Value::Number(18.0));
    assert_eq!(eval("10-4-3"), Value::Number(3.0));
    assert_eq!(eval("2^3^2"), Value::Number(64.0));
}

#[test]
fn test_comparisons_and_logic() {
    assert_eq!(eval("1<2"), Value::Number(1.0));
    assert_eq!(eval("2<=2"), Value::Number(1.0));
    assert_eq!(eval("3<>3"), Value::Number(0.0));
    assert_eq!(eval("1<2 AND 2<3"), Value::Number(1.0));
    assert_eq!(eval("1>2 OR 2<3"), Value::Number(1.0));
    assert_eq!(eval("NOT 0"), Value::Number(1.0));
    assert_eq!(eval("NOT 5"), Value::Number(0.0));
}

#[test]
fn test_unary_minus() {
    assert_eq!(eval("-3+5"), Value::Number(2.0));
    assert_eq!(eval("2*-3"), Value::Number(-6.0));
    assert_eq!(eval("-(2+3)"), Value::Number(-5.0));
}

#[test]
fn test_hex_and_scientific_literals() {
    assert_eq!(eval("0x10"), Value::Number(16.0));
    assert_eq!(eval("0xFF+1"), Value::Number(256.0));
    assert_eq!(eval("1e2"), Value::Number(100.0));
    assert_eq!(eval("1e-2"), Value::Number(0.01));
}

#[test]
fn test_mod_operator() {
    assert_eq!(eval("5 MOD 3"), Value::Number(2.0));
    assert_eq!(eval("10 MOD 2"), Value::Number(0.0));
}

#[test]
fn test_division_by_zero_reads_zero() {
    assert_eq!(eval("1/0"), Value::Number(0.0));
    assert_eq!(eval("5+1/0"), Value::Number(5.0));
}

#[test]
fn test_string_expressions() {
    assert_eq!(eval(r#""AB"+"CD""#), Value::Str("ABCD".to_string()));
    assert_eq!(eval(r#""ABC"="ABC""#), Value::Number(1.0));
    assert_eq!(eval(r#""ABC"<"ABD""#), Value::Number(1.0));
    assert_eq!(eval(r#"LEN("HELLO")"#), Value::Number(5.0));
}

#[test]
fn test_builtin_math() {
    assert_eq!(eval("ABS(-4)"), Value::Number(4.0));
    assert_eq!(eval("INT(2.7)"), Value::Number(2.0));
    assert_eq!(eval("SGN(-9)"), Value::Number(-1.0));
    assert_eq!(eval("SQR(16)"), Value::Number(4.0));
}

#[test]
fn test_epsilon_equality() {
    assert_eq!(eval("0.1+0.2=0.3"), Value::Number(1.0));
}

#[test]
fn test_malformed_expression_degrades_to_zero() {
    assert_eq!(eval("???"), Value::Number(0.0));
    assert_eq!(eval("1 + + *"), Value::Number(0.0));
}

#[test]
fn test_variables_in_expressions() {
    let mut session = Session::new();
    session.interpreter.set_variable("X", &Value::Number(3.0));
    assert_eq!(session.interpreter.evaluate("X*X+1"), Value::Number(10.0));
    assert_eq!(session.interpreter.evaluate("x*2"), Value::Number(6.0));
}

#[test]
fn test_rnd_is_reseedable_per_instance() {
    let mut a = Session::new();
    let mut b = Session::new();
    a.interpreter.reseed(7);
    b.interpreter.reseed(7);
    let x = a.interpreter.evaluate("RND");
    let y = b.interpreter.evaluate("RND");
    assert_eq!(x, y);
    let z = a.interpreter.evaluate("RND");
    assert_ne!(x, z);
}
