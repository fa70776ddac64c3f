//! # Typed BASIC
//!
//! A line-oriented BASIC with typed variable suffixes, `@label` jump
//! targets, and an interpreter core that compiles every expression to a
//! reusable tree the first time it is seen.
//!
//! ```no_run
//! use basic::mach::{ConsoleHost, Interpreter};
//!
//! let mut basic = Interpreter::new(Box::new(ConsoleHost::new()));
//! basic.load_program("FOR I=1 TO 3\nPRINT I*I\nNEXT");
//! basic.run();
//! ```
//!
//! The editor, renderers, and sound live outside this crate; they talk to
//! the interpreter through [`mach::Host`].

pub mod lang;
pub mod mach;
