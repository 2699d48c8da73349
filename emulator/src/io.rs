pub mod keyboard;

use std::io::{stdout, Write};
use std::sync::Mutex;

/// Sink for the system-call opcode's formatted output.
pub trait Console: Send + Sync {
    fn put(&self, text: &str);
}

////////////////////////////////////////////////////////////////////////////////

/// Writes straight to the hosting terminal.
#[derive(Default, Clone, Copy)]
pub struct StdConsole;

impl Console for StdConsole {
    fn put(&self, text: &str) {
        let mut out = stdout().lock();
        out.write_all(text.as_bytes()).unwrap();
        out.flush().unwrap();
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Captures output in memory so tests can assert on it.
#[derive(Default)]
pub struct PipeConsole {
    buf: Mutex<String>,
}

impl PipeConsole {
    pub fn take_output(&self) -> String {
        std::mem::take(&mut *self.buf.lock().unwrap())
    }

    pub fn is_empty(&self) -> bool {
        self.buf.lock().unwrap().is_empty()
    }
}

impl Console for PipeConsole {
    fn put(&self, text: &str) {
        self.buf.lock().unwrap().push_str(text);
    }
}
