//! Expression evaluator.
//!
//! Recursive descent over the token stream, evaluating as it parses. The
//! comments on each method state the scanner position at entry and exit,
//! since that is the contract that matters here: every method is entered
//! with the current token being the first token of its production and
//! leaves the first token after it in the scanner.
//!
//! Precedence, loosest first: comma, assignment, `or`, `and`, equality
//! (`== != <> in`), relational (`< <= > >=`), additive, multiplicative,
//! unary, primary with trailers.

use crate::{
    builtins,
    error::{RunError, RunResult},
    run::Interp,
    scanner::Token,
    value::{self, BinOp, HeapData, List, Value, ValueKind},
};

impl Interp<'_> {
    /// Evaluates an expression and converts the result to an integer; used
    /// wherever subscript indices are read.
    fn int_expression(&mut self) -> RunResult<i64> {
        let v = self.logical_or_expr()?;
        let i = value::as_int(&self.heap, &v);
        v.release(&mut self.heap);
        i
    }

    /// Decodes subscripts `[index]` and `[start:end]`, chained until no
    /// further `[` follows. The opening `[` has already been read.
    ///
    /// An index into a list yields a listnode reference so that assignment
    /// through the subscript writes into the cell; a slice is always a
    /// fresh deep copy.
    fn subscript(&mut self, sequence: &Value) -> RunResult<Value> {
        if !value::is_sequence(&self.heap, sequence) {
            let kind = self.heap.kind(value::resolve_id(&self.heap, sequence));
            return Err(RunError::type_error(format!("{kind} is not subscriptable")));
        }
        let mut current: Option<Value> = None;
        loop {
            let mut is_slice = false;
            let mut index = 0;
            let mut start = 0;
            if self.accept(Token::Colon)? {
                is_slice = true;
            } else {
                index = self.int_expression()?;
                start = index;
            }
            if self.accept(Token::Colon)? {
                is_slice = true;
            }
            let mut end = i64::MAX;
            if !self.accept(Token::Rsqb)? {
                end = self.int_expression()?;
                self.expect(Token::Rsqb)?;
            }
            let target = current.as_ref().unwrap_or(sequence);
            let lvalue = if is_slice {
                value::slice(&mut self.heap, target, start, end)
            } else {
                value::item(&mut self.heap, target, index)
            };
            if let Some(previous) = current.take() {
                previous.release(&mut self.heap);
            }
            let lvalue = lvalue?;
            if self.accept(Token::Lsqb)? {
                current = Some(lvalue);
            } else {
                return Ok(lvalue);
            }
        }
    }

    /// Method calls: `list.append`, `list.insert`, `list.remove`,
    /// `seq.len` and `.type`. The `.` has already been read.
    fn method(&mut self, object: &Value) -> RunResult<Value> {
        let target = value::resolve_id(&self.heap, object);
        let kind = self.heap.kind(target);
        if self.scanner.token != Token::Identifier {
            return Err(RunError::syntax_error(format!("expected method for type {kind}")));
        }
        let name = self.scanner.text.clone();
        match (kind, name.as_str()) {
            (ValueKind::List, "append") => {
                self.expect(Token::Identifier)?;
                self.expect(Token::Lpar)?;
                let v = self.logical_or_expr()?;
                let copy = value::deep_copy(&mut self.heap, &v);
                v.release(&mut self.heap);
                value::list_append(&mut self.heap, target, copy?)?;
                self.expect(Token::Rpar)?;
                Ok(self.heap.none_ref())
            }
            (ValueKind::List, "insert") => {
                self.expect(Token::Identifier)?;
                self.expect(Token::Lpar)?;
                let index = self.int_expression()?;
                self.expect(Token::Comma)?;
                let v = self.logical_or_expr()?;
                let copy = value::deep_copy(&mut self.heap, &v);
                v.release(&mut self.heap);
                value::list_insert(&mut self.heap, target, index, copy?)?;
                self.expect(Token::Rpar)?;
                Ok(self.heap.none_ref())
            }
            (ValueKind::List, "remove") => {
                self.expect(Token::Identifier)?;
                self.expect(Token::Lpar)?;
                let index = self.int_expression()?;
                let removed = value::list_remove(&mut self.heap, target, index)?;
                self.expect(Token::Rpar)?;
                Ok(removed)
            }
            (ValueKind::List | ValueKind::Str, "len") => {
                self.expect(Token::Identifier)?;
                let len = value::length(&self.heap, object)?;
                self.heap.allocate(HeapData::Int(len))
            }
            (_, "type") => {
                self.expect(Token::Identifier)?;
                self.heap.allocate(HeapData::Str(kind.to_string()))
            }
            _ => Err(RunError::syntax_error(format!("unknown method {name} for type {kind}"))),
        }
    }

    /// The part of an expression after an identifier, call or constant:
    /// subscripts, then optionally a method. Methods may follow
    /// subscripts, e.g. `"abc"[:].len`.
    fn trailer(&mut self, obj: Value) -> RunResult<Value> {
        let mut obj = obj;
        if self.accept(Token::Lsqb)? {
            let rv = self.subscript(&obj);
            obj.release(&mut self.heap);
            obj = rv?;
        }
        if self.accept(Token::Dot)? {
            let rv = self.method(&obj);
            obj.release(&mut self.heap);
            obj = rv?;
        }
        Ok(obj)
    }

    /// Constants, list displays, identifiers (variable reference or
    /// function call), built-in calls, and parenthesized expressions.
    fn primary_expr(&mut self) -> RunResult<Value> {
        let obj = match self.scanner.token {
            Token::CharLit => {
                let c = self.scanner.text.as_bytes().first().copied().unwrap_or(0);
                self.expect(Token::CharLit)?;
                self.heap.allocate(HeapData::Char(c))?
            }
            Token::IntLit => {
                let text = self.scanner.text.clone();
                let i: i64 = text
                    .parse()
                    .map_err(|_| RunError::value_error(format!("cannot convert {text} to int")))?;
                self.expect(Token::IntLit)?;
                self.heap.allocate(HeapData::Int(i))?
            }
            Token::FloatLit => {
                let text = self.scanner.text.clone();
                let f: f64 = text
                    .parse()
                    .map_err(|_| RunError::value_error(format!("cannot convert {text} to float")))?;
                self.expect(Token::FloatLit)?;
                self.heap.allocate(HeapData::Float(f))?
            }
            Token::StrLit => {
                let text = self.scanner.text.clone();
                self.expect(Token::StrLit)?;
                self.heap.allocate(HeapData::Str(text))?
            }
            Token::Lsqb => {
                let list = self.heap.allocate(HeapData::List(List::default()))?;
                self.expect(Token::Lsqb)?;
                while !self.accept(Token::Rsqb)? {
                    loop {
                        let v = self.assignment_expr()?;
                        let copy = value::deep_copy(&mut self.heap, &v);
                        v.release(&mut self.heap);
                        value::list_append(&mut self.heap, list.id(), copy?)?;
                        if !self.accept(Token::Comma)? {
                            break;
                        }
                    }
                }
                list
            }
            Token::Identifier => {
                let name = self.scanner.text.clone();
                let found = self.scopes.search(&name).map(Value::id);
                if let Some(id) = found {
                    let is_function = matches!(self.heap.get(id), HeapData::Position(_));
                    self.expect(Token::Identifier)?;
                    if is_function {
                        self.function_call(id)?
                    } else {
                        self.heap.inc_ref(id);
                        Value::new(id)
                    }
                } else if let Some(builtin) = builtins::lookup(&name) {
                    self.expect(Token::Identifier)?;
                    builtin(self)?
                } else {
                    return Err(RunError::name_error(format!("identifier {name} is not defined")));
                }
            }
            Token::Lpar => {
                self.expect(Token::Lpar)?;
                let v = self.comma_expr()?;
                self.expect(Token::Rpar)?;
                v
            }
            _ => return Err(RunError::syntax_error("expression expected")),
        };
        self.trailer(obj)
    }

    /// Unary `+`, `-` and `!`.
    fn unary_expr(&mut self) -> RunResult<Value> {
        if self.accept(Token::Not)? {
            let v = self.primary_expr()?;
            let r = value::negate(&mut self.heap, &v);
            v.release(&mut self.heap);
            r
        } else if self.accept(Token::Minus)? {
            let v = self.primary_expr()?;
            let r = value::invert(&mut self.heap, &v);
            v.release(&mut self.heap);
            r
        } else {
            self.accept(Token::Plus)?;
            self.primary_expr()
        }
    }

    fn binary_level(
        &mut self,
        operand: fn(&mut Self) -> RunResult<Value>,
        select: fn(Token) -> Option<BinOp>,
    ) -> RunResult<Value> {
        let mut lvalue = operand(self)?;
        loop {
            let Some(op) = select(self.scanner.token) else {
                return Ok(lvalue);
            };
            self.next_token()?;
            let rvalue = operand(self)?;
            let result = value::binary(&mut self.heap, op, &lvalue, &rvalue);
            lvalue.release(&mut self.heap);
            rvalue.release(&mut self.heap);
            lvalue = result?;
        }
    }

    /// `* / %`, left-associative.
    fn mult_expr(&mut self) -> RunResult<Value> {
        self.binary_level(Self::unary_expr, |token| match token {
            Token::Star => Some(BinOp::Mul),
            Token::Slash => Some(BinOp::Div),
            Token::Percent => Some(BinOp::Mod),
            _ => None,
        })
    }

    /// `+ -`, left-associative.
    fn additive_expr(&mut self) -> RunResult<Value> {
        self.binary_level(Self::mult_expr, |token| match token {
            Token::Plus => Some(BinOp::Add),
            Token::Minus => Some(BinOp::Sub),
            _ => None,
        })
    }

    /// `< <= > >=`, left-associative.
    fn relational_expr(&mut self) -> RunResult<Value> {
        self.binary_level(Self::additive_expr, |token| match token {
            Token::Less => Some(BinOp::Lt),
            Token::LessEqual => Some(BinOp::Le),
            Token::Greater => Some(BinOp::Gt),
            Token::GreaterEqual => Some(BinOp::Ge),
            _ => None,
        })
    }

    /// `== != <> in`, left-associative. `<>` scans as `!=`.
    fn equality_expr(&mut self) -> RunResult<Value> {
        self.binary_level(Self::relational_expr, |token| match token {
            Token::EqEqual => Some(BinOp::Eq),
            Token::NotEqual => Some(BinOp::Ne),
            Token::In => Some(BinOp::In),
            _ => None,
        })
    }

    /// `and`. Both operands are always evaluated.
    fn logical_and_expr(&mut self) -> RunResult<Value> {
        self.binary_level(Self::equality_expr, |token| match token {
            Token::And => Some(BinOp::And),
            _ => None,
        })
    }

    /// `or`. Both operands are always evaluated.
    pub(crate) fn logical_or_expr(&mut self) -> RunResult<Value> {
        self.binary_level(Self::logical_and_expr, |token| match token {
            Token::Or => Some(BinOp::Or),
            _ => None,
        })
    }

    /// `=` and the compound assignments. `=` is right-associative; the
    /// right side of a compound assignment is read at `or` precedence.
    /// Assignment writes through the evaluated target object and yields
    /// the target.
    pub(crate) fn assignment_expr(&mut self) -> RunResult<Value> {
        let lvalue = self.logical_or_expr()?;
        loop {
            if self.accept(Token::Equal)? {
                let rvalue = self.assignment_expr()?;
                let r = value::assign(&mut self.heap, &lvalue, &rvalue);
                rvalue.release(&mut self.heap);
                r?;
            } else {
                let op = match self.scanner.token {
                    Token::PlusEqual => Some(BinOp::Add),
                    Token::MinusEqual => Some(BinOp::Sub),
                    Token::StarEqual => Some(BinOp::Mul),
                    Token::SlashEqual => Some(BinOp::Div),
                    Token::PercentEqual => Some(BinOp::Mod),
                    _ => None,
                };
                let Some(op) = op else {
                    return Ok(lvalue);
                };
                self.next_token()?;
                let rvalue = self.logical_or_expr()?;
                let result = value::binary(&mut self.heap, op, &lvalue, &rvalue);
                rvalue.release(&mut self.heap);
                let result = result?;
                let r = value::assign(&mut self.heap, &lvalue, &result);
                result.release(&mut self.heap);
                r?;
            }
        }
    }

    /// Comma-separated expressions; yields the last one.
    pub(crate) fn comma_expr(&mut self) -> RunResult<Value> {
        let mut lvalue = self.assignment_expr()?;
        while self.accept(Token::Comma)? {
            lvalue.release(&mut self.heap);
            lvalue = self.assignment_expr()?;
        }
        Ok(lvalue)
    }
}
