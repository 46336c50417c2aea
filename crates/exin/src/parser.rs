//! Statement parser and executor.
//!
//! Statements are executed as they are parsed. Control flow that has to
//! unwind through blocks — `break`, `continue`, `return` — is signalled by
//! the [`Flow`] value every statement returns; loops and function calls
//! consume the flow that belongs to them and pass the rest on.
//!
//! Loops and calls re-execute source regions by saving a [`Mark`] of the
//! reader and scanner and jumping back to it; a function body is entered
//! by jumping to the position value its identifier was bound to during the
//! pre-scan.

use std::collections::VecDeque;

use crate::{
    error::{RunError, RunResult},
    run::Interp,
    scanner::Token,
    trace::{TRACE_SCAN_ONLY, TRACE_TOKEN, Trace},
    value::{self, Value, ValueKind},
};

/// How a statement finished.
#[derive(Debug)]
pub(crate) enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

impl Interp<'_> {
    /// Runs the current module from the top: pre-scan the function
    /// declarations, then execute statements until end of input or a
    /// top-level `return`. Returns the module's integer status.
    pub(crate) fn run_parser(&mut self) -> RunResult<i64> {
        self.predeclare_functions()?;
        self.next_token()?;
        loop {
            let flow = self.statement()?;
            if let Flow::Return(value) = flow {
                let status = if value::is_number(&self.heap, &value) {
                    value::as_int(&self.heap, &value)?
                } else {
                    0
                };
                value.release(&mut self.heap);
                return Ok(status);
            }
            if self.accept(Token::EndMarker)? {
                return Ok(0);
            }
        }
    }

    /// Scans the module start to end once, binding every `def name(` to a
    /// position value so that forward references work. Function bodies are
    /// skipped by matching indents. Trace output is suppressed while
    /// scanning unless scan tracing was explicitly requested.
    fn predeclare_functions(&mut self) -> RunResult<()> {
        self.reset_reader()?;
        let saved = self.config.debug;
        self.config.debug = if saved & TRACE_SCAN_ONLY != 0 { TRACE_TOKEN } else { 0 };
        self.heap.set_trace_mask(self.config.debug);
        let result = self.scan_for_functions();
        self.config.debug = saved;
        self.heap.set_trace_mask(saved);
        result?;
        Trace::new(self.config.debug).block("Start execution");
        self.reset_reader()
    }

    fn scan_for_functions(&mut self) -> RunResult<()> {
        loop {
            if self.accept(Token::Def)? {
                if self.scanner.token != Token::Identifier {
                    return Err(RunError::syntax_error("missing identifier after function definition"));
                }
                let name = self.scanner.text.clone();
                if !self.scopes.declare(&mut self.heap, &name) {
                    return Err(RunError::name_error(format!("{name} is already declared")));
                }
                let position = self.save_position()?;
                self.scopes.bind(&mut self.heap, &name, position);
                self.skip_function()?;
            } else {
                self.next_token()?;
            }
            if self.scanner.token == Token::EndMarker {
                return Ok(());
            }
        }
    }

    /// Executes one statement.
    ///
    /// in:  token = first token of the statement
    /// out: token = first token after the statement
    pub(crate) fn statement(&mut self) -> RunResult<Flow> {
        if self.accept(Token::DefChar)? {
            self.variable_declaration(ValueKind::Char)?;
        } else if self.accept(Token::DefInt)? {
            self.variable_declaration(ValueKind::Int)?;
        } else if self.accept(Token::DefFloat)? {
            self.variable_declaration(ValueKind::Float)?;
        } else if self.accept(Token::DefStr)? {
            self.variable_declaration(ValueKind::Str)?;
        } else if self.accept(Token::DefList)? {
            self.variable_declaration(ValueKind::List)?;
        } else if self.accept(Token::Def)? {
            // declarations were collected by the pre-scan
            self.skip_function()?;
        } else if self.accept(Token::For)? {
            return self.for_stmnt();
        } else if self.accept(Token::Do)? {
            return self.do_stmnt();
        } else if self.accept(Token::If)? {
            return self.if_stmnt();
        } else if self.accept(Token::Import)? {
            self.import_stmnt()?;
        } else if self.accept(Token::Input)? {
            self.input_stmnt()?;
        } else if self.accept(Token::Pass)? {
            self.expect(Token::Newline)?;
        } else if self.accept(Token::Print)? {
            self.print_stmnt()?;
        } else if self.accept(Token::Return)? || self.accept(Token::Dedent)? {
            // a dedent here is the implicit return at the end of a body
            return self.return_stmnt();
        } else if self.accept(Token::While)? {
            return self.while_stmnt();
        } else if self.accept(Token::Break)? {
            return Ok(Flow::Break);
        } else if self.accept(Token::Continue)? {
            return Ok(Flow::Continue);
        } else if self.accept(Token::EndMarker)? {
        } else {
            self.expression_stmnt()?;
        }
        Ok(Flow::Normal)
    }

    /// Executes a statement block: `NEWLINE INDENT statement+ DEDENT`.
    ///
    /// in:  token = NEWLINE
    /// out: token = DEDENT
    pub(crate) fn block(&mut self) -> RunResult<Flow> {
        let trace = Trace::new(self.config.debug);
        trace.block("Start block");
        self.expect(Token::Newline)?;
        self.expect(Token::Indent)?;
        let flow = loop {
            let flow = self.statement()?;
            match flow {
                Flow::Normal => {
                    if matches!(self.scanner.token, Token::Dedent | Token::EndMarker) {
                        break Flow::Normal;
                    }
                }
                Flow::Break | Flow::Continue | Flow::Return(_) => {
                    self.skip_to_dedent()?;
                    break flow;
                }
            }
        };
        trace.block("End block");
        Ok(flow)
    }

    /// Skips forward to the dedent closing the current block, honoring
    /// nested blocks. No-op when the scanner already sits on it.
    fn skip_to_dedent(&mut self) -> RunResult<()> {
        let mut level = 1u32;
        loop {
            match self.scanner.token {
                Token::Indent => level += 1,
                Token::Dedent => {
                    level -= 1;
                    if level == 0 {
                        return Ok(());
                    }
                }
                Token::EndMarker => return Ok(()),
                _ => {}
            }
            self.next_token()?;
        }
    }

    /// Skips a block without executing it, leaving the scanner on the
    /// first token after the closing dedent.
    ///
    /// in:  token = NEWLINE
    /// out: token = first token after DEDENT
    fn skip_block(&mut self) -> RunResult<()> {
        let trace = Trace::new(self.config.debug);
        trace.block("Skip block");
        self.expect(Token::Newline)?;
        self.expect(Token::Indent)?;
        let mut level = 1u32;
        loop {
            self.next_token()?;
            match self.scanner.token {
                Token::Indent => level += 1,
                Token::Dedent => level -= 1,
                Token::EndMarker => break,
                _ => {}
            }
            if level == 0 {
                break;
            }
        }
        trace.block("End skip block");
        self.next_token()?;
        Ok(())
    }

    /// Skips a function definition: name, parameter list, body.
    ///
    /// in:  token = the function's IDENTIFIER
    /// out: token = first token after the body's DEDENT
    fn skip_function(&mut self) -> RunResult<()> {
        Trace::new(self.config.debug).block(format!("Skip function {}", self.scanner.text));
        self.expect(Token::Identifier)?;
        self.expect(Token::Lpar)?;
        while !matches!(self.scanner.token, Token::Newline | Token::EndMarker) {
            self.next_token()?;
        }
        self.skip_block()
    }

    /// An expression used as a statement; the value is discarded.
    fn expression_stmnt(&mut self) -> RunResult<()> {
        let v = self.comma_expr()?;
        v.release(&mut self.heap);
        self.expect(Token::Newline)
    }

    /// `type name ('=' expr)? (',' name ('=' expr)?)* NEWLINE`
    ///
    /// Declares one or more variables of a kind, each optionally assigned
    /// an initial value (converted to the declared kind).
    fn variable_declaration(&mut self, kind: ValueKind) -> RunResult<()> {
        loop {
            if self.scanner.token != Token::Identifier {
                return Err(RunError::syntax_error(format!(
                    "expected identifier instead of {}",
                    self.scanner.token
                )));
            }
            let name = self.scanner.text.clone();
            if !self.scopes.declare(&mut self.heap, &name) {
                return Err(RunError::name_error(format!("identifier {name} already declared")));
            }
            let obj = self.heap.alloc_default(kind)?;
            let handle = obj.clone_ref(&self.heap);
            self.scopes.bind(&mut self.heap, &name, obj);
            self.next_token()?;
            if self.accept(Token::Equal)? {
                let v = self.assignment_expr()?;
                let r = value::assign(&mut self.heap, &handle, &v);
                v.release(&mut self.heap);
                r?;
            }
            handle.release(&mut self.heap);
            if self.accept(Token::Newline)? {
                return Ok(());
            }
            self.expect(Token::Comma)?;
        }
    }

    /// Evaluates an expression as a truth value.
    fn condition(&mut self) -> RunResult<bool> {
        let v = self.comma_expr()?;
        let truth = value::as_bool(&self.heap, &v);
        v.release(&mut self.heap);
        truth
    }

    /// `if expr block ('else' block)?`
    fn if_stmnt(&mut self) -> RunResult<Flow> {
        if self.condition()? {
            let flow = self.block()?;
            self.expect(Token::Dedent)?;
            if self.accept(Token::Else)? {
                self.skip_block()?;
            }
            Ok(flow)
        } else {
            self.skip_block()?;
            if self.accept(Token::Else)? {
                let flow = self.block()?;
                self.expect(Token::Dedent)?;
                Ok(flow)
            } else {
                Ok(Flow::Normal)
            }
        }
    }

    /// `while expr block`
    ///
    /// The condition is saved and re-evaluated on every pass, including
    /// the pass that observes a `break` or `return` from the body.
    fn while_stmnt(&mut self) -> RunResult<Flow> {
        let mark = self.mark()?;
        let mut result = Flow::Normal;
        let mut stopped = false;
        loop {
            let truth = self.condition()?;
            if !truth || stopped {
                break;
            }
            match self.block()? {
                Flow::Break => stopped = true,
                Flow::Return(value) => {
                    result = Flow::Return(value);
                    stopped = true;
                }
                Flow::Normal | Flow::Continue => {}
            }
            self.jump_mark(&mark);
        }
        self.skip_block()?;
        Ok(result)
    }

    /// `do block 'while' expr NEWLINE`
    ///
    /// The body runs before the condition; the condition is still
    /// evaluated after a `break` or `return` pass.
    fn do_stmnt(&mut self) -> RunResult<Flow> {
        if self.scanner.token != Token::Newline {
            return Err(RunError::syntax_error("expected newline after do"));
        }
        let mark = self.mark()?;
        let mut result = Flow::Normal;
        let mut stopped = false;
        loop {
            self.jump_mark(&mark);
            match self.block()? {
                Flow::Break => stopped = true,
                Flow::Return(value) => {
                    result = Flow::Return(value);
                    stopped = true;
                }
                Flow::Normal | Flow::Continue => {}
            }
            self.expect(Token::Dedent)?;
            self.expect(Token::While)?;
            let truth = self.condition()?;
            if !truth || stopped {
                break;
            }
        }
        self.expect(Token::Newline)?;
        Ok(result)
    }

    /// `for name in expr NEWLINE block`
    ///
    /// The sequence is evaluated once. The iteration variable is created
    /// if absent and keeps its last value after the loop; list items are
    /// bound as listnode references, so writing to the variable writes
    /// into the list.
    fn for_stmnt(&mut self) -> RunResult<Flow> {
        let mut name = None;
        if self.scanner.token == Token::Identifier {
            let text = self.scanner.text.clone();
            if self.scopes.search(&text).is_none() {
                self.scopes.declare(&mut self.heap, &text);
            }
            name = Some(text);
        }
        self.expect(Token::Identifier)?;
        self.expect(Token::In)?;
        let sequence = self.comma_expr()?;
        let len = match value::length(&self.heap, &sequence) {
            Ok(len) => len,
            Err(err) => {
                sequence.release(&mut self.heap);
                return Err(err);
            }
        };
        if self.scanner.token != Token::Newline {
            sequence.release(&mut self.heap);
            return Err(RunError::syntax_error("expected newline"));
        }
        let name = name.unwrap_or_default();
        let mark = self.mark()?;
        let mut result = Flow::Normal;
        let mut stopped = false;
        let mut index = 0;
        while index < len && !stopped {
            let item = match value::item(&mut self.heap, &sequence, index) {
                Ok(item) => item,
                Err(err) => {
                    sequence.release(&mut self.heap);
                    return Err(err);
                }
            };
            if let Err(item) = self.scopes.rebind(&mut self.heap, &name, item) {
                item.release(&mut self.heap);
                sequence.release(&mut self.heap);
                return Err(RunError::name_error(format!("identifier {name} is not defined")));
            }
            match self.block()? {
                Flow::Break => stopped = true,
                Flow::Return(value) => {
                    result = Flow::Return(value);
                    stopped = true;
                }
                Flow::Normal | Flow::Continue => {}
            }
            self.jump_mark(&mark);
            index += 1;
        }
        self.skip_block()?;
        sequence.release(&mut self.heap);
        Ok(result)
    }

    /// `import expr (',' expr)* NEWLINE`
    ///
    /// Loads and runs each named module; a module already loaded is
    /// skipped. Execution resumes here afterwards.
    fn import_stmnt(&mut self) -> RunResult<()> {
        loop {
            let v = self.assignment_expr()?;
            let name = value::as_str(&self.heap, &v);
            let mark = self.mark()?;
            self.import_module(&name)?;
            self.jump_mark(&mark);
            v.release(&mut self.heap);
            if !self.accept(Token::Comma)? {
                break;
            }
        }
        self.expect(Token::Newline)
    }

    /// `print '-raw'? (expr (',' expr)*)? NEWLINE`
    ///
    /// Fields are separated by one space and terminated by a newline; the
    /// `-raw` flag suppresses both.
    fn print_stmnt(&mut self) -> RunResult<()> {
        let mut raw = false;
        if self.scanner.token == Token::Minus
            && self.peek_token()? == Token::Identifier
            && self.scanner.text == "raw"
        {
            self.next_token()?;
            self.next_token()?;
            raw = true;
        }
        let mut first = true;
        if self.scanner.token != Token::Newline {
            loop {
                let v = self.assignment_expr()?;
                if first {
                    first = false;
                } else if !raw {
                    self.out.stdout_push(' ');
                }
                let text = value::display(&self.heap, &v);
                self.out.stdout_write(&text);
                v.release(&mut self.heap);
                if !self.accept(Token::Comma)? {
                    break;
                }
            }
        }
        if !raw {
            self.out.stdout_push('\n');
        }
        self.expect(Token::Newline)
    }

    /// `input string? name (',' string? name)* NEWLINE`
    ///
    /// An optional string is printed as a prompt; the line read is
    /// converted to the current kind of the named variable.
    fn input_stmnt(&mut self) -> RunResult<()> {
        loop {
            if self.scanner.token == Token::StrLit {
                let prompt = self.scanner.text.clone();
                self.out.stdout_write(&prompt);
                self.out.stdout_flush();
                self.next_token()?;
            }
            if self.scanner.token != Token::Identifier {
                return Err(RunError::syntax_error(format!(
                    "expected identifier instead of {}",
                    self.scanner.token
                )));
            }
            let name = self.scanner.text.clone();
            let Some(bound) = self.scopes.search(&name) else {
                return Err(RunError::name_error(format!("identifier {name} undeclared")));
            };
            let kind = self.heap.kind(bound.id());
            let line = self.input.read_line();
            let v = value::scan_input(&mut self.heap, kind, &line)?;
            if let Err(v) = self.scopes.rebind(&mut self.heap, &name, v) {
                v.release(&mut self.heap);
                return Err(RunError::name_error(format!("identifier {name} undeclared")));
            }
            self.accept(Token::Identifier)?;
            if !self.accept(Token::Comma)? {
                break;
            }
        }
        self.expect(Token::Newline)
    }

    /// `return expr? NEWLINE` — also entered for the implicit return at
    /// the end of a function body.
    fn return_stmnt(&mut self) -> RunResult<Flow> {
        let value = if self.scanner.token == Token::Newline {
            self.heap.allocate(crate::value::HeapData::Int(0))?
        } else {
            self.comma_expr()?
        };
        self.expect(Token::Newline)?;
        Ok(Flow::Return(value))
    }

    /// Calls the function whose definition starts at `target` (a position
    /// value bound during the pre-scan).
    ///
    /// in:  token = LPAR of the call's argument list
    /// out: token = first token after the call's RPAR
    pub(crate) fn function_call(&mut self, target: crate::heap::HeapId) -> RunResult<Value> {
        let trace = Trace::new(self.config.debug);
        trace.block("Start function");

        // actual arguments, deep-copied, evaluated in the caller's scope
        self.expect(Token::Lpar)?;
        let mut args: VecDeque<Value> = VecDeque::new();
        while self.scanner.token != Token::Rpar {
            let v = self.assignment_expr()?;
            let copy = value::deep_copy(&mut self.heap, &v);
            v.release(&mut self.heap);
            args.push_back(copy?);
            if self.scanner.token != Token::Rpar {
                self.expect(Token::Comma)?;
            }
        }

        self.scopes.push_level();
        let return_mark = self.mark()?;
        self.jump_position(target)?;

        // formal parameters take the queued arguments in order
        self.expect(Token::Identifier)?;
        self.expect(Token::Lpar)?;
        while self.scanner.token != Token::Rpar {
            if self.scanner.token != Token::Identifier {
                return Err(RunError::syntax_error(format!(
                    "expected identifier instead of {}",
                    self.scanner.token
                )));
            }
            let name = self.scanner.text.clone();
            if !self.scopes.declare(&mut self.heap, &name) {
                return Err(RunError::name_error(format!("identifier {name} already declared")));
            }
            let Some(v) = args.pop_front() else {
                return Err(RunError::syntax_error(format!("no argument on stack to assign to {name}")));
            };
            self.scopes.bind(&mut self.heap, &name, v);
            self.expect(Token::Identifier)?;
            self.accept(Token::Comma)?;
        }
        self.expect(Token::Rpar)?;

        let flow = self.block()?;
        let result = match flow {
            Flow::Return(value) => value,
            _ => self.heap.allocate(crate::value::HeapData::Int(0))?,
        };
        // surplus arguments are dropped
        for leftover in args {
            leftover.release(&mut self.heap);
        }

        self.jump_mark(&return_mark);
        self.accept(Token::Rpar)?;
        self.scopes.pop_level(&mut self.heap);
        trace.block("End function");
        Ok(result)
    }
}
