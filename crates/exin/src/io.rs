//! Host-facing IO: print output, line input, and module loading.
//!
//! The interpreter never talks to stdout, stdin or the file system directly.
//! It goes through the three traits in this module, so embedders and tests
//! can substitute in-memory implementations.

use std::{
    collections::VecDeque,
    io::{self, BufRead as _, Write as _},
};

use ahash::AHashMap;

/// Destination for output produced by the `print` statement.
///
/// `stdout_write` receives the text of a single printed field, without
/// separators or terminators; separators (spaces) and the final newline are
/// emitted via `stdout_push`.
pub trait PrintWriter {
    /// Write the formatted text of one printed field.
    fn stdout_write(&mut self, output: &str);

    /// Write a single separator or terminator character.
    fn stdout_push(&mut self, end: char);

    /// Flush buffered output, e.g. before blocking on input.
    fn stdout_flush(&mut self) {}
}

/// Default writer: buffers into a string and flushes to stdout.
///
/// Buffering keeps stderr trace output readable when both streams go to a
/// terminal; the buffer is flushed on `stdout_flush` and on drop.
#[derive(Debug, Default)]
pub struct StdPrint {
    buffer: String,
}

impl StdPrint {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl PrintWriter for StdPrint {
    fn stdout_write(&mut self, output: &str) {
        self.buffer.push_str(output);
    }

    fn stdout_push(&mut self, end: char) {
        self.buffer.push(end);
    }

    fn stdout_flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let _ = io::stdout().write_all(self.buffer.as_bytes());
        let _ = io::stdout().flush();
        self.buffer.clear();
    }
}

impl Drop for StdPrint {
    fn drop(&mut self) {
        self.stdout_flush();
    }
}

/// A `PrintWriter` that collects all output into a string.
///
/// Useful for testing or capturing print output programmatically.
#[derive(Debug, Default)]
pub struct CollectStringPrint(String);

impl CollectStringPrint {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The collected output so far.
    #[must_use]
    pub fn output(&self) -> &str {
        &self.0
    }

    /// Consumes the writer and returns the collected output.
    #[must_use]
    pub fn into_output(self) -> String {
        self.0
    }
}

impl PrintWriter for CollectStringPrint {
    fn stdout_write(&mut self, output: &str) {
        self.0.push_str(output);
    }

    fn stdout_push(&mut self, end: char) {
        self.0.push(end);
    }
}

/// A `PrintWriter` that discards all output.
#[derive(Debug, Default)]
pub struct NoPrint;

impl PrintWriter for NoPrint {
    fn stdout_write(&mut self, _output: &str) {}

    fn stdout_push(&mut self, _end: char) {}
}

/// Source of lines for the `input` statement.
///
/// `read_line` returns the next line without its trailing newline; end of
/// input yields an empty string.
pub trait InputSource {
    fn read_line(&mut self) -> String;
}

/// Reads lines from stdin.
#[derive(Debug, Default)]
pub struct StdinInput;

impl InputSource for StdinInput {
    fn read_line(&mut self) -> String {
        let mut line = String::new();
        let _ = io::stdin().lock().read_line(&mut line);
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        line
    }
}

/// Serves lines from a queue; used by tests and embedders.
#[derive(Debug, Default)]
pub struct QueueInput {
    lines: VecDeque<String>,
}

impl QueueInput {
    #[must_use]
    pub fn new(lines: Vec<String>) -> Self {
        Self {
            lines: lines.into(),
        }
    }
}

impl InputSource for QueueInput {
    fn read_line(&mut self) -> String {
        self.lines.pop_front().unwrap_or_default()
    }
}

/// Capability for obtaining module source by name.
///
/// Path resolution is entirely the loader's responsibility; the interpreter
/// passes the module name through literally.
pub trait ModuleLoader {
    fn load(&mut self, name: &str) -> io::Result<Vec<u8>>;
}

/// Loads modules from the file system, treating the name as a path.
#[derive(Debug, Default)]
pub struct FsLoader;

impl ModuleLoader for FsLoader {
    fn load(&mut self, name: &str) -> io::Result<Vec<u8>> {
        std::fs::read(name)
    }
}

/// Serves modules from an in-memory map; used by tests and embedders.
#[derive(Debug, Default)]
pub struct MemLoader {
    sources: AHashMap<String, String>,
}

impl MemLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a module source under `name`.
    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.sources.insert(name.into(), source.into());
    }
}

impl ModuleLoader for MemLoader {
    fn load(&mut self, name: &str) -> io::Result<Vec<u8>> {
        self.sources
            .get(name)
            .map(|source| source.clone().into_bytes())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no module named {name}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_string_print_collects() {
        let mut out = CollectStringPrint::new();
        out.stdout_write("a");
        out.stdout_push(' ');
        out.stdout_write("b");
        out.stdout_push('\n');
        assert_eq!(out.output(), "a b\n");
    }

    #[test]
    fn queue_input_drains_then_returns_empty() {
        let mut input = QueueInput::new(vec!["one".to_owned()]);
        assert_eq!(input.read_line(), "one");
        assert_eq!(input.read_line(), "");
    }

    #[test]
    fn mem_loader_misses_report_not_found() {
        let mut loader = MemLoader::new();
        loader.insert("a", "print 1\n");
        assert!(loader.load("a").is_ok());
        assert_eq!(loader.load("b").unwrap_err().kind(), io::ErrorKind::NotFound);
    }
}
