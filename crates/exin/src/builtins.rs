//! Built-in functions, looked up by name when an identifier is not bound.
//!
//! A built-in parses its own argument list, so the table is the extension
//! point for new built-ins: add a handler and keep the names sorted.

use crate::{
    error::RunResult,
    run::Interp,
    scanner::Token,
    value::{HeapData, Value},
};

pub(crate) type BuiltinFn = for<'h> fn(&mut Interp<'h>) -> RunResult<Value>;

/// Table of built-in function names; entries must stay sorted for the
/// binary search.
static BUILTINS: &[(&str, BuiltinFn)] = &[("chr", chr), ("type", type_of)];

pub(crate) fn lookup(name: &str) -> Option<BuiltinFn> {
    BUILTINS
        .binary_search_by(|probe| probe.0.cmp(name))
        .ok()
        .map(|index| BUILTINS[index].1)
}

/// `chr(i)`: the single-character string of code point `i`.
fn chr(interp: &mut Interp<'_>) -> RunResult<Value> {
    interp.expect(Token::Lpar)?;
    let arg = interp.comma_expr()?;
    interp.expect(Token::Rpar)?;
    let code = crate::value::as_int(&interp.heap, &arg);
    arg.release(&mut interp.heap);
    let byte = code? as u8;
    interp.heap.allocate(HeapData::Str((byte as char).to_string()))
}

/// `type(x)`: the type name of `x` as a string.
fn type_of(interp: &mut Interp<'_>) -> RunResult<Value> {
    interp.expect(Token::Lpar)?;
    let arg = interp.comma_expr()?;
    interp.expect(Token::Rpar)?;
    let name = interp.heap.kind(arg.id()).to_string();
    arg.release(&mut interp.heap);
    interp.heap.allocate(HeapData::Str(name))
}
