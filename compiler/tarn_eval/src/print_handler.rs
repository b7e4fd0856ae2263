//! Output sinks for `print` and `println`.
//!
//! Enum dispatch rather than a trait object: the set of sinks is closed
//! and printing sits on the evaluator's hot path.

use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;

/// Writes straight to the process' stdout.
#[derive(Default)]
pub struct StdoutPrintHandler;

impl StdoutPrintHandler {
    pub fn write(&self, text: &str) {
        let mut out = std::io::stdout().lock();
        // A closed stdout is not the program's error.
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }
}

/// Collects everything printed, for embedding hosts and tests.
#[derive(Default)]
pub struct BufferPrintHandler {
    buffer: Mutex<String>,
}

impl BufferPrintHandler {
    pub fn new() -> Self {
        BufferPrintHandler::default()
    }

    pub fn write(&self, text: &str) {
        self.buffer.lock().push_str(text);
    }

    pub fn output(&self) -> String {
        self.buffer.lock().clone()
    }

    pub fn clear(&self) {
        self.buffer.lock().clear();
    }
}

pub enum PrintHandlerImpl {
    Stdout(StdoutPrintHandler),
    Buffer(BufferPrintHandler),
    /// Drops all output.
    Silent,
}

impl PrintHandlerImpl {
    pub fn print(&self, text: &str) {
        match self {
            Self::Stdout(h) => h.write(text),
            Self::Buffer(h) => h.write(text),
            Self::Silent => {}
        }
    }

    pub fn println(&self, text: &str) {
        match self {
            Self::Stdout(h) => h.write(&format!("{text}\n")),
            Self::Buffer(h) => {
                h.write(text);
                h.write("\n");
            }
            Self::Silent => {}
        }
    }

    /// Captured output; empty for sinks that do not capture.
    pub fn output(&self) -> String {
        match self {
            Self::Buffer(h) => h.output(),
            Self::Stdout(_) | Self::Silent => String::new(),
        }
    }

    pub fn clear(&self) {
        if let Self::Buffer(h) = self {
            h.clear();
        }
    }
}

pub type SharedPrintHandler = Arc<PrintHandlerImpl>;

pub fn stdout_handler() -> SharedPrintHandler {
    Arc::new(PrintHandlerImpl::Stdout(StdoutPrintHandler))
}

pub fn buffer_handler() -> SharedPrintHandler {
    Arc::new(PrintHandlerImpl::Buffer(BufferPrintHandler::new()))
}

pub fn silent_handler() -> SharedPrintHandler {
    Arc::new(PrintHandlerImpl::Silent)
}

#[cfg(test)]
mod tests;
