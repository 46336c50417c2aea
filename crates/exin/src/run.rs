//! Interpreter state and the public interface for running programs.

use std::rc::Rc;

use crate::{
    config::Config,
    error::{Exception, RunError, RunResult},
    heap::{Heap, HeapId},
    io::{FsLoader, InputSource, ModuleLoader, PrintWriter, StdPrint, StdinInput},
    module::{ModuleId, Modules},
    reader::Reader,
    scanner::{Scanner, Token},
    scope::ScopeStack,
    trace::TRACE_DUMP,
    value::{HeapData, PositionData, Value},
};

/// A saved spot in the token stream: reader cursor plus scanner state.
/// Loops and call returns jump back to one of these.
#[derive(Debug)]
pub(crate) struct Mark {
    module: ModuleId,
    pos: usize,
    bol: usize,
    scanner: Scanner,
}

/// The whole interpreter state for one run: reader, scanner, heap, scopes
/// and the host interfaces. Everything the original kept in process-wide
/// singletons lives here and is passed through execution as one value.
pub(crate) struct Interp<'h> {
    pub(crate) config: Config,
    pub(crate) modules: Modules,
    pub(crate) reader: Reader,
    pub(crate) scanner: Scanner,
    pub(crate) heap: Heap,
    pub(crate) scopes: ScopeStack,
    pub(crate) loader: &'h mut dyn ModuleLoader,
    pub(crate) out: &'h mut dyn PrintWriter,
    pub(crate) input: &'h mut dyn InputSource,
}

impl<'h> Interp<'h> {
    pub fn new(
        config: Config,
        loader: &'h mut dyn ModuleLoader,
        out: &'h mut dyn PrintWriter,
        input: &'h mut dyn InputSource,
    ) -> Self {
        Self {
            heap: Heap::new(config.heap_limit, config.debug),
            scopes: ScopeStack::new(),
            modules: Modules::new(),
            reader: Reader::new(),
            scanner: Scanner::new(),
            config,
            loader,
            out,
            input,
        }
    }

    /// Reads the next token into the scanner.
    pub fn next_token(&mut self) -> RunResult<Token> {
        let Self {
            scanner,
            reader,
            scopes,
            config,
            ..
        } = self;
        scanner.next(reader, scopes.indents_mut(), config)
    }

    /// One token of look-ahead.
    pub fn peek_token(&mut self) -> RunResult<Token> {
        let Self {
            scanner,
            reader,
            scopes,
            config,
            ..
        } = self;
        scanner.peek(reader, scopes.indents_mut(), config)
    }

    /// Consumes the current token if it matches.
    pub fn accept(&mut self, token: Token) -> RunResult<bool> {
        if self.scanner.token == token {
            self.next_token()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// The current token must match; anything else is a syntax error.
    pub fn expect(&mut self, token: Token) -> RunResult<()> {
        if self.accept(token)? {
            Ok(())
        } else {
            Err(RunError::syntax_error(format!(
                "expected {token} instead of {}",
                self.scanner.token
            )))
        }
    }

    /// Captures the current reader and scanner state.
    pub fn mark(&self) -> RunResult<Mark> {
        let module = self.current_module()?;
        Ok(Mark {
            module,
            pos: self.reader.pos(),
            bol: self.reader.bol(),
            scanner: self.scanner.clone(),
        })
    }

    /// Restores a previously captured state.
    pub fn jump_mark(&mut self, mark: &Mark) {
        let src = self.modules.source(mark.module).clone();
        self.reader.restore(mark.module, src, mark.pos, mark.bol);
        self.scanner = mark.scanner.clone();
    }

    /// Captures the current state as a first-class position value.
    pub fn save_position(&mut self) -> RunResult<Value> {
        let module = self.current_module()?;
        let data = PositionData {
            module,
            pos: self.reader.pos(),
            bol: self.reader.bol(),
            scanner: self.scanner.clone(),
        };
        self.heap.allocate(HeapData::Position(data))
    }

    /// Restores reader and scanner from a position value.
    pub fn jump_position(&mut self, id: HeapId) -> RunResult<()> {
        let (module, pos, bol, scanner) = match self.heap.get(id) {
            HeapData::Position(p) => (p.module, p.pos, p.bol, p.scanner.clone()),
            other => {
                return Err(RunError::system_error(format!(
                    "call target is a {} instead of a position",
                    other.kind()
                )));
            }
        };
        let src = self.modules.source(module).clone();
        self.reader.restore(module, src, pos, bol);
        self.scanner = scanner;
        Ok(())
    }

    fn current_module(&self) -> RunResult<ModuleId> {
        self.reader
            .module()
            .ok_or_else(|| RunError::system_error("no module is being read"))
    }

    /// Points the reader at the start of a module and reinitializes the
    /// scanner.
    fn set_current_module(&mut self, id: ModuleId) {
        let src: Rc<str> = self.modules.source(id).clone();
        self.reader.restore(id, src, 0, 0);
        self.scanner.reset();
    }

    /// Back to the start of the current module.
    pub fn reset_reader(&mut self) -> RunResult<()> {
        let id = self.current_module()?;
        self.set_current_module(id);
        Ok(())
    }

    /// Imports a module by name: loads and runs it if it was not seen
    /// before, otherwise does nothing. Returns the module's status value.
    pub fn import_module(&mut self, name: &str) -> RunResult<i64> {
        if self.modules.lookup(name).is_some() {
            return Ok(0);
        }
        let bytes = self
            .loader
            .load(name)
            .map_err(|err| RunError::system_error(format!("error importing {name}: {err}")))?;
        let id = self.modules.register(name, &bytes);
        self.set_current_module(id);
        self.run_parser()
    }

    /// End-of-run teardown: drop any remaining scope frames, dump state if
    /// requested, release the globals and flush output.
    pub fn finish(&mut self) {
        while self.scopes.has_locals() {
            self.scopes.pop_level(&mut self.heap);
        }
        if self.config.debug & TRACE_DUMP != 0 {
            self.scopes.dump(&self.heap);
            self.heap.dump();
        }
        self.scopes.clear_global(&mut self.heap);
        self.out.stdout_flush();
    }

    /// Annotates an error with the line the reader is currently on.
    pub fn into_exception(&mut self, err: RunError) -> Exception {
        self.out.stdout_flush();
        let context = self.reader.module().map(|id| {
            (
                self.modules.name(id).to_owned(),
                self.reader.line_number(),
                self.reader.current_line(),
            )
        });
        Exception::from_run(err, context)
    }
}

/// Outcome of a run, including heap accounting for leak checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// The program's integer status: the value of the top-level `return`,
    /// or 0.
    pub status: i64,
    /// Values still alive after teardown. A program that terminated
    /// normally leaves none.
    pub live_values: usize,
}

/// The interpreter: configuration plus a module loader.
///
/// One `Interpreter` can run several programs; each run starts from a
/// fresh heap and scope. See the crate docs for an example.
#[derive(Debug)]
pub struct Interpreter<L = FsLoader> {
    config: Config,
    loader: L,
}

impl Interpreter<FsLoader> {
    /// An interpreter that loads modules from the file system.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self::with_loader(config, FsLoader)
    }
}

impl<L: ModuleLoader> Interpreter<L> {
    /// An interpreter with a custom module loader.
    pub fn with_loader(config: Config, loader: L) -> Self {
        Self { config, loader }
    }

    /// Runs a module against stdout and stdin. Returns the program's
    /// integer status, or the exception that aborted it.
    pub fn run(&mut self, module: &str) -> Result<i64, Exception> {
        let mut out = StdPrint::new();
        let mut input = StdinInput;
        self.run_with(module, &mut out, &mut input)
    }

    /// Runs a module against the given print writer and input source.
    pub fn run_with(
        &mut self,
        module: &str,
        out: &mut dyn PrintWriter,
        input: &mut dyn InputSource,
    ) -> Result<i64, Exception> {
        self.run_report(module, out, input).map(|report| report.status)
    }

    /// Like [`run_with`](Self::run_with), also reporting heap accounting
    /// after teardown.
    pub fn run_report(
        &mut self,
        module: &str,
        out: &mut dyn PrintWriter,
        input: &mut dyn InputSource,
    ) -> Result<RunReport, Exception> {
        let mut interp = Interp::new(self.config, &mut self.loader, out, input);
        match interp.import_module(module) {
            Ok(status) => {
                interp.finish();
                Ok(RunReport {
                    status,
                    live_values: interp.heap.live_values(),
                })
            }
            Err(err) => Err(interp.into_exception(err)),
        }
    }
}
