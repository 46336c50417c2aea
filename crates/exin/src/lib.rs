//! EXIN is a small, indentation-structured, dynamically-typed scripting
//! language. Programs are executed by a token-stream-walking interpreter:
//! a recursive-descent parser evaluates tokens as it reads them, and loops
//! and function calls are realized by saving and restoring the position of
//! the reader and scanner instead of building a syntax tree.
//!
//! The crate exposes a single entry point, [`Interpreter`], which is
//! parameterized over a [`ModuleLoader`] (how module source is obtained),
//! a [`PrintWriter`] (where `print` output goes) and an [`InputSource`]
//! (where `input` reads from). The defaults run against the file system,
//! stdout and stdin; tests and embedders substitute in-memory versions.
//!
//! ```
//! use exin::{CollectStringPrint, Config, Interpreter, MemLoader, QueueInput};
//!
//! let mut loader = MemLoader::new();
//! loader.insert("main", "print 6 * 7\n");
//! let mut interpreter = Interpreter::with_loader(Config::default(), loader);
//! let mut out = CollectStringPrint::new();
//! let mut input = QueueInput::new(vec![]);
//! let status = interpreter.run_with("main", &mut out, &mut input).unwrap();
//! assert_eq!(status, 0);
//! assert_eq!(out.output(), "42\n");
//! ```

mod builtins;
mod config;
mod error;
mod expression;
mod heap;
mod io;
mod module;
mod parser;
mod reader;
mod run;
mod scanner;
mod scope;
mod trace;
mod value;

pub use crate::{
    config::{Config, VERSION},
    error::{ErrorKind, Exception},
    heap::HeapStats,
    io::{
        CollectStringPrint, FsLoader, InputSource, MemLoader, ModuleLoader, NoPrint, PrintWriter, QueueInput,
        StdPrint, StdinInput,
    },
    run::{Interpreter, RunReport},
    trace::{TRACE_ALLOC, TRACE_BLOCK, TRACE_DUMP, TRACE_SCAN_ONLY, TRACE_TOKEN},
};
