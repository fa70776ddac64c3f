use ansi_term::Colour::Red;
use std::io::{BufRead, Write as _};

/// What the interpreter needs from the outside world. The editor, the
/// renderers, and the sound engine all live behind this seam.
pub trait Host {
    /// PRINT output without a trailing newline.
    fn write(&mut self, text: &str);

    fn write_line(&mut self, text: &str) {
        self.write(text);
        self.write("\n");
    }

    /// Fatal errors arrive here exactly once, already formatted.
    fn write_error(&mut self, text: &str);

    /// Blocking line input for INPUT.
    fn read_line(&mut self) -> String;

    /// Most recent key press, cleared by the read. `INKEY$` polls this.
    fn last_key(&mut self) -> Option<String>;

    /// Something observable changed; a display host should schedule a
    /// redraw. Called after output-producing statements and when a run
    /// ends, never continuously.
    fn invalidate(&mut self) {}
}

/// Terminal-backed host for the command-line front end.
#[derive(Default)]
pub struct ConsoleHost {}

impl ConsoleHost {
    pub fn new() -> ConsoleHost {
        ConsoleHost::default()
    }
}

impl Host for ConsoleHost {
    fn write(&mut self, text: &str) {
        let mut out = std::io::stdout();
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }

    fn write_error(&mut self, text: &str) {
        eprintln!("{}", Red.paint(text));
    }

    fn read_line(&mut self) -> String {
        let mut line = String::new();
        let _ = std::io::stdin().lock().read_line(&mut line);
        line.trim_end_matches(['\n', '\r']).to_string()
    }

    fn last_key(&mut self) -> Option<String> {
        // A line-buffered terminal has no key events to report.
        None
    }
}

/// Host that swallows everything. Handy for expression-only use.
pub struct NullHost;

impl Host for NullHost {
    fn write(&mut self, _text: &str) {}
    fn write_error(&mut self, _text: &str) {}
    fn read_line(&mut self) -> String {
        String::new()
    }
    fn last_key(&mut self) -> Option<String> {
        None
    }
}
