use basic::mach::{Host, Interpreter};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Recording host: captures PRINT and error output, feeds canned INPUT
/// lines and key presses.
#[derive(Default)]
pub struct TestHost {
    pub out: Rc<RefCell<String>>,
    pub errors: Rc<RefCell<String>>,
    pub input: Rc<RefCell<VecDeque<String>>>,
    pub keys: Rc<RefCell<VecDeque<String>>>,
}

impl Host for TestHost {
    fn write(&mut self, text: &str) {
        self.out.borrow_mut().push_str(text);
    }

    fn write_error(&mut self, text: &str) {
        self.errors.borrow_mut().push_str(text);
        self.errors.borrow_mut().push('\n');
    }

    fn read_line(&mut self) -> String {
        self.input.borrow_mut().pop_front().unwrap_or_default()
    }

    fn last_key(&mut self) -> Option<String> {
        self.keys.borrow_mut().pop_front()
    }
}

pub struct Session {
    pub interpreter: Interpreter,
    pub out: Rc<RefCell<String>>,
    pub errors: Rc<RefCell<String>>,
    pub input: Rc<RefCell<VecDeque<String>>>,
    pub keys: Rc<RefCell<VecDeque<String>>>,
}

impl Session {
    pub fn new() -> Session {
        let host = TestHost::default();
        let out = host.out.clone();
        let errors = host.errors.clone();
        let input = host.input.clone();
        let keys = host.keys.clone();
        Session {
            interpreter: Interpreter::new(Box::new(host)),
            out,
            errors,
            input,
            keys,
        }
    }

    pub fn output(&self) -> String {
        self.out.borrow().clone()
    }

    pub fn errors(&self) -> String {
        self.errors.borrow().clone()
    }
}

/// Load and run a program, returning its PRINT output.
pub fn run_source(source: &str) -> String {
    let mut session = Session::new();
    session.interpreter.load_program(source);
    session.interpreter.run();
    session.output()
}

/// Load and run a program, returning (output, errors).
pub fn run_source_checked(source: &str) -> (String, String) {
    let mut session = Session::new();
    session.interpreter.load_program(source);
    session.interpreter.run();
    (session.output(), session.errors())
}
