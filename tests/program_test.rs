mod common;
use basic::mach::{Dialect, Interpreter, NullHost, Value};
use common::{Session, TestHost};

#[test]
fn test_list_program_is_ordered() {
    let mut session = Session::new();
    session
        .interpreter
        .load_program("10 PRINT 1\n5 PRINT 0\nPRINT 2");
    assert_eq!(
        session.interpreter.list_program(),
        "5 PRINT 0\n10 PRINT 1\n20 PRINT 2\n"
    );
}

#[test]
fn test_labels_serialize_as_synthetic_lines() {
    let mut session = Session::new();
    session.interpreter.load_program("@top\nPRINT 1\nGOTO top");
    assert_eq!(session.interpreter.list_program(), "10 PRINT 1\n20 GOTO top\n");
}

#[test]
fn test_numbered_line_edit_deletes() {
    let mut session = Session::new();
    session.interpreter.load_program("10 PRINT 1\n20 PRINT 2\n20");
    assert_eq!(session.interpreter.list_program(), "10 PRINT 1\n");
}

#[test]
fn test_load_clears_runtime_state() {
    let mut session = Session::new();
    session.interpreter.load_program("X=7");
    session.interpreter.run();
    assert_eq!(
        session.interpreter.get_variable("X"),
        Some(Value::Number(7.0))
    );
    session.interpreter.load_program("PRINT 1");
    assert_eq!(session.interpreter.get_variable("X"), None);
}

#[test]
fn test_malformed_source_loads_silently() {
    let mut session = Session::new();
    session.interpreter.load_program("\n\n   \n");
    session.interpreter.run();
    assert_eq!(session.output(), "");
    assert_eq!(session.errors(), "");
}

#[test]
fn test_get_and_set_variable() {
    let mut session = Session::new();
    session
        .interpreter
        .set_variable("SCORE", &Value::Number(12.0));
    assert_eq!(
        session.interpreter.get_variable("score"),
        Some(Value::Number(12.0))
    );
    assert_eq!(session.interpreter.get_variable("OTHER"), None);
    session
        .interpreter
        .set_variable("HITS.B", &Value::Number(500.0));
    assert_eq!(
        session.interpreter.get_variable("HITS.B"),
        Some(Value::Number(127.0))
    );
}

#[test]
fn test_step_executes_one_statement_at_a_time() {
    let mut session = Session::new();
    session.interpreter.load_program("PRINT 1\nPRINT 2");
    assert!(session.interpreter.step());
    assert_eq!(session.output(), "1\n");
    assert!(session.interpreter.step());
    assert_eq!(session.output(), "1\n2\n");
    assert!(!session.interpreter.step());
}

#[test]
fn test_stop_from_another_thread() {
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    let (tx, rx) = mpsc::channel();
    let handle = thread::spawn(move || {
        let mut session = Session::new();
        session
            .interpreter
            .load_program("@loop\nX=X+1\nGOTO loop");
        tx.send(session.interpreter.remote()).unwrap();
        session.interpreter.run();
        session
            .interpreter
            .get_variable("X")
            .map(|v| v.as_number())
            .unwrap_or(0.0)
    });
    let remote = rx.recv().unwrap();
    thread::sleep(Duration::from_millis(50));
    assert!(remote.is_running());
    remote.stop();
    let iterations = handle.join().unwrap();
    assert!(iterations > 0.0);
}

#[test]
fn test_pause_and_remote_step() {
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    let (tx, rx) = mpsc::channel();
    let (out_tx, out_rx) = mpsc::channel();
    let handle = thread::spawn(move || {
        let host = TestHost::default();
        let out = host.out.clone();
        let mut basic = Interpreter::new(Box::new(host));
        basic.load_program("PRINT 1\nPRINT 2\nPRINT 3");
        basic.pause();
        tx.send(basic.remote()).unwrap();
        basic.run();
        out_tx.send(out.borrow().clone()).unwrap();
    });
    let remote = rx.recv().unwrap();
    thread::sleep(Duration::from_millis(20));
    remote.step();
    thread::sleep(Duration::from_millis(20));
    remote.resume();
    handle.join().unwrap();
    assert_eq!(out_rx.recv().unwrap(), "1\n2\n3\n");
}

#[test]
fn test_classic_dialect_runs_for_loops() {
    let host = TestHost::default();
    let out = host.out.clone();
    let mut basic = Interpreter::with_dialect(Box::new(host), Dialect::Classic);
    basic.load_program("FOR I=1 TO 3\nPRINT I;\nNEXT");
    basic.run();
    assert_eq!(out.borrow().as_str(), "123");
}

#[test]
fn test_two_instances_are_independent() {
    let mut a = Interpreter::new(Box::new(NullHost));
    let mut b = Interpreter::new(Box::new(NullHost));
    a.load_program("X=1");
    b.load_program("X=2");
    a.run();
    b.run();
    assert_eq!(a.get_variable("X"), Some(Value::Number(1.0)));
    assert_eq!(b.get_variable("X"), Some(Value::Number(2.0)));
}
