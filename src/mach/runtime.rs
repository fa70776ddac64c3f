use super::eval::{eval, values_equal, Context, UserFunction};
use super::host::Host;
use super::program::Program;
use super::stack::Stack;
use super::val::Value;
use crate::error;
use crate::lang::{classify, compile, Error, ExprNode, LineNumber, PrintItem, Stmt, Target};
use log::{trace, warn};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

type Result<T> = std::result::Result<T, Error>;

/// Compatibility mode, selected at load time. The dialects disagree on
/// where NEXT re-enters the loop body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// NEXT jumps to the line after the FOR header, so statements
    /// sharing the header's line run only once.
    #[default]
    Current,
    /// NEXT jumps back to the FOR line itself; a FOR that finds its own
    /// live context on the stack re-enters instead of re-initializing.
    Classic,
}

/// Saved state of one active FOR loop.
#[derive(Debug)]
struct ForContext {
    var: String,
    end: f64,
    step: f64,
    for_line: LineNumber,
}

/// Saved state of one active WHILE loop. The condition tree lives in
/// the classified WHILE statement at `start_line`.
#[derive(Debug)]
struct WhileContext {
    start_line: LineNumber,
}

/// What one dispatched statement asks of the run loop.
enum Flow {
    Next,
    Jump(LineNumber),
    End,
}

/// Thread-safe handle for cooperative control. A UI or test harness on
/// another thread stops, pauses, and single-steps through this; the
/// run loop honors it at the next statement boundary.
#[derive(Clone)]
pub struct Remote {
    running: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    step: Arc<AtomicBool>,
}

impl Remote {
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    /// Let exactly one statement through while paused.
    pub fn step(&self) {
        self.step.store(true, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// ## The interpreter
///
/// One instance owns everything a running program touches: program and
/// label memory, classified statements, variable and array tables, the
/// three control stacks, and the DATA queue. Nothing is global; two
/// programs need two instances.
pub struct Interpreter {
    program: Program,
    stmts: HashMap<LineNumber, Rc<Stmt>>,
    order: Vec<LineNumber>,
    slots: HashMap<LineNumber, usize>,
    ctx: Context,
    gosub: Stack<LineNumber>,
    fors: Stack<ForContext>,
    whiles: Stack<WhileContext>,
    data: VecDeque<String>,
    pc: usize,
    current: LineNumber,
    prepared: bool,
    dialect: Dialect,
    running: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    step_signal: Arc<AtomicBool>,
}

impl Interpreter {
    pub fn new(host: Box<dyn Host>) -> Interpreter {
        Interpreter::with_dialect(host, Dialect::default())
    }

    pub fn with_dialect(host: Box<dyn Host>, dialect: Dialect) -> Interpreter {
        Interpreter {
            program: Program::new(),
            stmts: HashMap::new(),
            order: vec![],
            slots: HashMap::new(),
            ctx: Context::new(host),
            gosub: Stack::new("GOSUB STACK"),
            fors: Stack::new("FOR STACK"),
            whiles: Stack::new("WHILE STACK"),
            data: VecDeque::new(),
            pc: 0,
            current: 0,
            prepared: false,
            dialect,
            running: Arc::new(AtomicBool::new(false)),
            paused: Arc::new(AtomicBool::new(false)),
            step_signal: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn remote(&self) -> Remote {
        Remote {
            running: self.running.clone(),
            paused: self.paused.clone(),
            step: self.step_signal.clone(),
        }
    }

    /// Replace the program. Every trace of the previous run goes with
    /// it: variables, arrays, user functions, stacks, and the DATA
    /// queue. Classification happens here, once per line; the run loop
    /// only ever dispatches on the cached variants.
    pub fn load_program(&mut self, source: &str) {
        self.program.load(source);
        self.ctx.clear();
        self.gosub.clear();
        self.fors.clear();
        self.whiles.clear();
        self.data.clear();
        self.stmts.clear();
        self.order.clear();
        self.slots.clear();
        for (&number, text) in self.program.iter() {
            self.stmts.insert(number, Rc::new(classify(text)));
            self.slots.insert(number, self.order.len());
            self.order.push(number);
        }
        self.pc = 0;
        self.prepared = false;
        self.running.store(false, Ordering::SeqCst);
    }

    /// Run until a terminal state or cooperative cancellation. Fatal
    /// errors stop the run and go through the host's error channel
    /// exactly once, tagged with the line that raised them.
    pub fn run(&mut self) {
        self.prepare();
        while self.running.load(Ordering::SeqCst) {
            if self.paused.load(Ordering::SeqCst) {
                if self.step_signal.swap(false, Ordering::SeqCst) {
                    if !self.step_once() {
                        break;
                    }
                } else {
                    std::thread::sleep(Duration::from_millis(1));
                }
                continue;
            }
            if !self.step_once() {
                break;
            }
        }
        self.running.store(false, Ordering::SeqCst);
        self.ctx.host.invalidate();
    }

    /// Request cancellation; takes effect at the next statement
    /// boundary. Safe to call from the host side mid-run via
    /// [`Interpreter::remote`].
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    /// Execute exactly one statement. Drives paused sessions and
    /// debugger-style manual stepping without a run loop.
    pub fn step(&mut self) -> bool {
        if !self.prepared {
            self.prepare();
        }
        if !self.running.load(Ordering::SeqCst) {
            return false;
        }
        self.step_once()
    }

    /// One-shot expression evaluation against current state, for
    /// debuggers and the direct prompt. Failures degrade to zero.
    pub fn evaluate(&mut self, expr: &str) -> Value {
        let node = compile(expr);
        match eval(&node, &mut self.ctx) {
            Ok(v) => v,
            Err(e) => {
                warn!("direct evaluation failed: {}", e);
                Value::Number(0.0)
            }
        }
    }

    pub fn get_variable(&self, name: &str) -> Option<Value> {
        self.ctx.vars.get(name)
    }

    pub fn set_variable(&mut self, name: &str, value: &Value) {
        if let Err(e) = self.ctx.vars.store(name, value) {
            warn!("set_variable failed: {}", e);
        }
    }

    pub fn list_program(&self) -> String {
        self.program.list()
    }

    /// Deterministic RND for tests and replays.
    pub fn reseed(&mut self, seed: u64) {
        self.ctx.reseed(seed);
    }

    /// Reset the run position and scan DATA statements into the queue.
    /// Variables survive; load_program is what clears memory.
    fn prepare(&mut self) {
        self.gosub.clear();
        self.fors.clear();
        self.whiles.clear();
        self.data.clear();
        for (_, text) in self.program.iter() {
            let trimmed = text.trim();
            if trimmed.len() < 4 || !trimmed.as_bytes()[..4].eq_ignore_ascii_case(b"DATA") {
                continue;
            }
            if trimmed.len() > 4 && !trimmed.as_bytes()[4].is_ascii_whitespace() {
                continue;
            }
            let rest = trimmed[4..].trim();
            if rest.is_empty() {
                continue;
            }
            for item in rest.split(',') {
                self.data.push_back(item.trim().to_string());
            }
        }
        self.pc = 0;
        self.prepared = true;
        self.running.store(true, Ordering::SeqCst);
    }

    fn step_once(&mut self) -> bool {
        let line = match self.order.get(self.pc) {
            Some(&line) => line,
            None => {
                self.running.store(false, Ordering::SeqCst);
                return false;
            }
        };
        self.current = line;
        let stmt = match self.stmts.get(&line) {
            Some(stmt) => stmt.clone(),
            None => {
                self.fail(error!(InternalError, line));
                return false;
            }
        };
        trace!("line {}: {:?}", line, stmt);
        match self.exec(&stmt) {
            Ok(Flow::Next) => {
                self.pc += 1;
                true
            }
            Ok(Flow::Jump(target)) => match self.slots.get(&target) {
                Some(&slot) => {
                    self.pc = slot;
                    true
                }
                None => {
                    self.fail(error!(UndefinedLine, line));
                    false
                }
            },
            Ok(Flow::End) => {
                self.running.store(false, Ordering::SeqCst);
                false
            }
            Err(e) => {
                let e = match e.line_number() {
                    Some(_) => e,
                    None => e.in_line_number(line),
                };
                self.fail(e);
                false
            }
        }
    }

    fn fail(&mut self, e: Error) {
        self.running.store(false, Ordering::SeqCst);
        self.ctx.host.write_error(&e.to_string());
    }

    fn exec(&mut self, stmt: &Stmt) -> Result<Flow> {
        match stmt {
            Stmt::Rem | Stmt::Data | Stmt::EndSelect => Ok(Flow::Next),
            Stmt::End => Ok(Flow::End),
            Stmt::Print { items, newline } => self.exec_print(items, *newline),
            Stmt::Let { target, expr } => {
                let value = eval(expr, &mut self.ctx)?;
                self.assign(target, &value)?;
                Ok(Flow::Next)
            }
            Stmt::Input { prompt, targets } => self.exec_input(prompt.as_deref(), targets),
            Stmt::Goto(target) => Ok(Flow::Jump(self.program.resolve(target)?)),
            Stmt::Gosub(target) => {
                self.gosub.push(self.current)?;
                Ok(Flow::Jump(self.program.resolve(target)?))
            }
            Stmt::Return => {
                let origin = match self.gosub.pop() {
                    Some(line) => line,
                    None => return Err(error!(ReturnWithoutGosub)),
                };
                // Resume after the origin line in program order, not at
                // the jump target.
                match self.slots.get(&origin) {
                    Some(&slot) if slot + 1 < self.order.len() => {
                        Ok(Flow::Jump(self.order[slot + 1]))
                    }
                    _ => Ok(Flow::End),
                }
            }
            Stmt::If {
                cond,
                then_arm,
                else_arm,
            } => {
                let arm = if eval(cond, &mut self.ctx)?.is_true() {
                    then_arm
                } else {
                    else_arm
                };
                for s in arm {
                    match self.exec(s)? {
                        Flow::Next => {}
                        flow => return Ok(flow),
                    }
                }
                Ok(Flow::Next)
            }
            Stmt::For {
                var,
                from,
                to,
                step,
            } => self.exec_for(var, from, to, step.as_ref()),
            Stmt::Next => self.exec_next(),
            Stmt::While(cond) => self.exec_while(cond),
            Stmt::Wend => self.exec_wend(),
            Stmt::Select(selector) => self.exec_select(selector),
            Stmt::Case(_) | Stmt::CaseElse => {
                // Reached by sequential execution: the selected block is
                // done, skip to the end of the construct.
                let end = self.find_end_select(self.pc + 1)?;
                Ok(Flow::Jump(self.order[end]))
            }
            Stmt::Read(targets) => self.exec_read(targets),
            Stmt::Dim(entries) => {
                for (name, bound) in entries {
                    let size = eval(bound, &mut self.ctx)?.as_number();
                    if !size.is_finite() || size < 0.0 {
                        return Err(error!(IllegalFunctionCall; "BAD ARRAY BOUND"));
                    }
                    self.ctx.vars.dimension(name, size as usize + 1)?;
                }
                Ok(Flow::Next)
            }
            Stmt::DefFn { name, params, body } => {
                self.ctx.funcs.insert(
                    name.clone(),
                    UserFunction {
                        params: params.clone(),
                        body: body.clone(),
                    },
                );
                Ok(Flow::Next)
            }
            Stmt::Wait(expr) => {
                let ms = eval(expr, &mut self.ctx)?.as_number().max(0.0) as u64;
                self.sleep(ms);
                Ok(Flow::Next)
            }
            Stmt::Unknown(_) => Err(error!(SyntaxError; "UNKNOWN STATEMENT")),
        }
    }

    fn assign(&mut self, target: &Target, value: &Value) -> Result<()> {
        match target {
            Target::Var(name) => self.ctx.vars.store(name, value),
            Target::Element(name, index) => {
                let index = eval(index, &mut self.ctx)?.as_number() as i64;
                self.ctx.vars.store_element(name, index, value)
            }
        }
    }

    fn exec_print(&mut self, items: &[PrintItem], newline: bool) -> Result<Flow> {
        let mut out = String::new();
        for item in items {
            match item {
                PrintItem::Tab => out.push('\t'),
                PrintItem::Expr(node) => {
                    let value = eval(node, &mut self.ctx)?;
                    out.push_str(&value.to_string());
                }
            }
        }
        if newline {
            out.push('\n');
        }
        self.ctx.host.write(&out);
        self.ctx.host.invalidate();
        Ok(Flow::Next)
    }

    fn exec_input(&mut self, prompt: Option<&str>, targets: &[Target]) -> Result<Flow> {
        if let Some(p) = prompt {
            self.ctx.host.write(p);
        }
        self.ctx.host.write("? ");
        let reply = self.ctx.host.read_line();
        let mut fields = reply.split(',');
        for target in targets {
            let field = fields.next().unwrap_or("").trim();
            let value = self.parse_field(target, field);
            self.assign(target, &value)?;
        }
        Ok(Flow::Next)
    }

    /// Typed reading of one INPUT field. A number that does not parse
    /// reads as zero; INPUT mistakes are not fatal.
    fn parse_field(&self, target: &Target, field: &str) -> Value {
        let name = match target {
            Target::Var(name) | Target::Element(name, _) => name,
        };
        if name.ends_with('$') {
            Value::Str(field.to_string())
        } else {
            Value::Number(field.parse::<f64>().unwrap_or(0.0))
        }
    }

    fn exec_for(
        &mut self,
        var: &str,
        from: &ExprNode,
        to: &ExprNode,
        step: Option<&ExprNode>,
    ) -> Result<Flow> {
        if self.dialect == Dialect::Classic {
            if let Some(top) = self.fors.last() {
                if top.for_line == self.current {
                    return Ok(Flow::Next);
                }
            }
        }
        let start = eval(from, &mut self.ctx)?;
        let end = eval(to, &mut self.ctx)?.as_number();
        let step = match step {
            Some(node) => eval(node, &mut self.ctx)?.as_number(),
            None => 1.0,
        };
        self.ctx.vars.store(var, &start)?;
        self.fors.push(ForContext {
            var: var.to_string(),
            end,
            step,
            for_line: self.current,
        })?;
        Ok(Flow::Next)
    }

    fn exec_next(&mut self) -> Result<Flow> {
        let (var, end, step, for_line) = match self.fors.last() {
            Some(ctx) => (ctx.var.clone(), ctx.end, ctx.step, ctx.for_line),
            None => return Err(error!(NextWithoutFor)),
        };
        let value = self.ctx.vars.fetch(&var).as_number() + step;
        self.ctx.vars.store(&var, &Value::Number(value))?;
        let done = (step > 0.0 && value > end) || (step < 0.0 && value < end);
        if done {
            self.fors.pop();
            return Ok(Flow::Next);
        }
        match self.dialect {
            Dialect::Classic => Ok(Flow::Jump(for_line)),
            Dialect::Current => {
                // Back to the line after the FOR header; the header
                // itself runs only once per loop.
                match self.slots.get(&for_line) {
                    Some(&slot) if slot + 1 < self.order.len() => {
                        Ok(Flow::Jump(self.order[slot + 1]))
                    }
                    _ => Ok(Flow::Next),
                }
            }
        }
    }

    fn exec_while(&mut self, cond: &ExprNode) -> Result<Flow> {
        let reentry = matches!(self.whiles.last(), Some(top) if top.start_line == self.current);
        if !reentry {
            self.whiles.push(WhileContext {
                start_line: self.current,
            })?;
        }
        if eval(cond, &mut self.ctx)?.is_true() {
            return Ok(Flow::Next);
        }
        // False on entry: the body is skipped entirely, nesting
        // respected.
        self.whiles.pop();
        let mut depth = 0;
        for slot in self.pc + 1..self.order.len() {
            match self.stmt_at(slot).as_ref() {
                Stmt::While(_) => depth += 1,
                Stmt::Wend => {
                    if depth == 0 {
                        return Ok(if slot + 1 < self.order.len() {
                            Flow::Jump(self.order[slot + 1])
                        } else {
                            Flow::End
                        });
                    }
                    depth -= 1;
                }
                _ => {}
            }
        }
        Err(error!(WhileWithoutWend))
    }

    fn exec_wend(&mut self) -> Result<Flow> {
        let start_line = match self.whiles.last() {
            Some(ctx) => ctx.start_line,
            None => return Err(error!(WendWithoutWhile)),
        };
        let header = match self.stmts.get(&start_line) {
            Some(stmt) => stmt.clone(),
            None => return Err(error!(InternalError; "LOST WHILE HEADER")),
        };
        let cond = match header.as_ref() {
            Stmt::While(cond) => cond,
            _ => return Err(error!(InternalError; "LOST WHILE HEADER")),
        };
        if eval(cond, &mut self.ctx)?.is_true() {
            Ok(Flow::Jump(start_line))
        } else {
            self.whiles.pop();
            Ok(Flow::Next)
        }
    }

    fn exec_select(&mut self, selector: &ExprNode) -> Result<Flow> {
        let selected = eval(selector, &mut self.ctx)?;
        let mut depth = 0;
        let mut case_else = None;
        for slot in self.pc + 1..self.order.len() {
            match self.stmt_at(slot).as_ref() {
                Stmt::Select(_) => depth += 1,
                Stmt::EndSelect => {
                    if depth == 0 {
                        // No case matched: fall into CASE ELSE when one
                        // exists, otherwise resume past the construct.
                        let target = match case_else {
                            Some(else_slot) if else_slot + 1 < self.order.len() => else_slot + 1,
                            _ => slot,
                        };
                        return Ok(Flow::Jump(self.order[target]));
                    }
                    depth -= 1;
                }
                Stmt::Case(value) if depth == 0 => {
                    let case_value = eval(value, &mut self.ctx)?;
                    if values_equal(&selected, &case_value) {
                        return Ok(if slot + 1 < self.order.len() {
                            Flow::Jump(self.order[slot + 1])
                        } else {
                            Flow::End
                        });
                    }
                }
                Stmt::CaseElse if depth == 0 => {
                    if case_else.is_none() {
                        case_else = Some(slot);
                    }
                }
                _ => {}
            }
        }
        Err(error!(SelectWithoutEnd))
    }

    fn find_end_select(&self, from: usize) -> Result<usize> {
        let mut depth = 0;
        for slot in from..self.order.len() {
            match self.stmt_at(slot).as_ref() {
                Stmt::Select(_) => depth += 1,
                Stmt::EndSelect => {
                    if depth == 0 {
                        return Ok(slot);
                    }
                    depth -= 1;
                }
                _ => {}
            }
        }
        Err(error!(SelectWithoutEnd))
    }

    fn exec_read(&mut self, targets: &[Target]) -> Result<Flow> {
        for target in targets {
            let item = match self.data.pop_front() {
                Some(item) => item,
                None => return Err(error!(OutOfData)),
            };
            let name = match target {
                Target::Var(name) | Target::Element(name, _) => name.clone(),
            };
            let value = if name.ends_with('$') {
                Value::Str(unquote(&item).to_string())
            } else {
                match unquote(&item).trim().parse::<f64>() {
                    Ok(n) => Value::Number(n),
                    Err(_) => return Err(error!(TypeMismatch; "UNREADABLE DATA")),
                }
            };
            self.assign(target, &value)?;
        }
        Ok(Flow::Next)
    }

    fn stmt_at(&self, slot: usize) -> Rc<Stmt> {
        self.stmts
            .get(&self.order[slot])
            .cloned()
            .unwrap_or_else(|| Rc::new(Stmt::Rem))
    }

    /// Cancellation-aware sleep for WAIT: never blocks past a stop
    /// request for more than one slice.
    fn sleep(&self, ms: u64) {
        let mut remaining = ms;
        while remaining > 0 && self.running.load(Ordering::SeqCst) {
            let slice = remaining.min(10);
            std::thread::sleep(Duration::from_millis(slice));
            remaining -= slice;
        }
    }
}

fn unquote(s: &str) -> &str {
    let s = s.trim();
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        &s[1..s.len() - 1]
    } else {
        s
    }
}
