//! Error kinds, internal runtime errors, and the public exception type.
//!
//! A runtime failure is fatal: it unwinds through the interpreter as a
//! [`RunError`], is annotated with the current source location, and is
//! surfaced to the host as an [`Exception`]. The numeric code of the error
//! kind doubles as the process exit code.

use std::fmt;

use strum::{Display, IntoStaticStr};

/// Result type alias for operations that can raise a runtime error.
pub(crate) type RunResult<T> = Result<T, RunError>;

/// The fixed set of error kinds.
///
/// The string representation matches the variant name exactly (e.g.
/// `ValueError` -> "ValueError"); `code()` is the numeric exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
pub enum ErrorKind {
    /// Use/declare conflicts on identifiers.
    NameError,
    /// An operator applied to an unsupported type mix.
    TypeError,
    /// Unexpected token, bad indentation, bad escape.
    SyntaxError,
    /// Numeric parse failure, bad escape value, bad conversion.
    ValueError,
    /// Module load failure or a broken internal invariant.
    SystemError,
    /// Sequence index out of range.
    IndexError,
    /// Allocation beyond the configured heap limit.
    OutOfMemoryError,
    /// `%` applied to a float.
    ModNotAllowedError,
    /// `/` or `%` with a zero right operand.
    DivisionByZeroError,
}

impl ErrorKind {
    /// Numeric code of this kind, used as the process exit code.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::NameError => 1,
            Self::TypeError => 2,
            Self::SyntaxError => 3,
            Self::ValueError => 4,
            Self::SystemError => 5,
            Self::IndexError => 6,
            Self::OutOfMemoryError => 7,
            Self::ModNotAllowedError => 8,
            Self::DivisionByZeroError => 9,
        }
    }

    /// Kinds whose message is a fixed text carry no per-site detail.
    fn carries_detail(self) -> bool {
        !matches!(
            self,
            Self::IndexError | Self::OutOfMemoryError | Self::DivisionByZeroError
        )
    }

    /// The message printed when no detail applies.
    fn description(self) -> &'static str {
        match self {
            Self::IndexError => "IndexError: index out of range",
            Self::OutOfMemoryError => "Out of memory",
            Self::DivisionByZeroError => "DivisionByZeroError: division by zero",
            other => other.into(),
        }
    }
}

/// Internal error value raised deep inside the interpreter, before any
/// source location is known.
#[derive(Debug, Clone)]
pub(crate) struct RunError {
    pub kind: ErrorKind,
    pub detail: Option<String>,
}

impl RunError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: Some(detail.into()),
        }
    }

    pub fn plain(kind: ErrorKind) -> Self {
        Self { kind, detail: None }
    }

    pub fn name_error(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::NameError, detail)
    }

    pub fn type_error(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeError, detail)
    }

    pub fn syntax_error(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::SyntaxError, detail)
    }

    pub fn value_error(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValueError, detail)
    }

    pub fn system_error(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::SystemError, detail)
    }

    pub fn mod_not_allowed(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::ModNotAllowedError, detail)
    }

    pub fn index_error() -> Self {
        Self::plain(ErrorKind::IndexError)
    }

    pub fn division_by_zero() -> Self {
        Self::plain(ErrorKind::DivisionByZeroError)
    }

    pub fn out_of_memory() -> Self {
        Self::plain(ErrorKind::OutOfMemoryError)
    }
}

/// A runtime error annotated with the source location it was raised at.
///
/// Rendered as:
///
/// ```text
/// File <module>, line <n>
/// <source line>
/// <ErrorKind>[: detail]
/// ```
///
/// The location lines are omitted when no module was active yet.
#[derive(Debug, Clone)]
pub struct Exception {
    kind: ErrorKind,
    detail: Option<String>,
    module: Option<String>,
    line: Option<usize>,
    source_line: Option<String>,
}

impl Exception {
    pub(crate) fn from_run(err: RunError, context: Option<(String, usize, String)>) -> Self {
        let (module, line, source_line) = match context {
            Some((module, line, source_line)) => (Some(module), Some(line), Some(source_line)),
            None => (None, None, None),
        };
        Self {
            kind: err.kind,
            detail: err.detail,
            module,
            line,
            source_line,
        }
    }

    /// The kind of error that was raised.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The process exit code for this exception.
    #[must_use]
    pub fn code(&self) -> i32 {
        self.kind.code()
    }

    /// Additional detail, when the error site supplied one.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(module) = &self.module {
            write!(f, "File {module}")?;
            if let Some(line) = self.line {
                write!(f, ", line {line}")?;
            }
            writeln!(f)?;
            if let Some(source_line) = &self.source_line {
                writeln!(f, "{source_line}")?;
            }
        }
        match &self.detail {
            Some(detail) if self.kind.carries_detail() => writeln!(f, "{}: {detail}", self.kind),
            _ => writeln!(f, "{}", self.kind.description()),
        }
    }
}

impl std::error::Error for Exception {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_the_documented_exit_codes() {
        assert_eq!(ErrorKind::NameError.code(), 1);
        assert_eq!(ErrorKind::TypeError.code(), 2);
        assert_eq!(ErrorKind::SyntaxError.code(), 3);
        assert_eq!(ErrorKind::ValueError.code(), 4);
        assert_eq!(ErrorKind::SystemError.code(), 5);
        assert_eq!(ErrorKind::IndexError.code(), 6);
        assert_eq!(ErrorKind::OutOfMemoryError.code(), 7);
        assert_eq!(ErrorKind::ModNotAllowedError.code(), 8);
        assert_eq!(ErrorKind::DivisionByZeroError.code(), 9);
    }

    #[test]
    fn display_with_location_and_detail() {
        let exc = Exception::from_run(
            RunError::type_error("unsupported operand type(s) for operation +: list and int"),
            Some(("main".to_owned(), 3, "print xs + 1".to_owned())),
        );
        assert_eq!(
            exc.to_string(),
            "File main, line 3\nprint xs + 1\nTypeError: unsupported operand type(s) for operation +: list and int\n"
        );
    }

    #[test]
    fn display_fixed_texts() {
        let exc = Exception::from_run(RunError::division_by_zero(), None);
        assert_eq!(exc.to_string(), "DivisionByZeroError: division by zero\n");
        let exc = Exception::from_run(RunError::index_error(), None);
        assert_eq!(exc.to_string(), "IndexError: index out of range\n");
        let exc = Exception::from_run(RunError::out_of_memory(), None);
        assert_eq!(exc.to_string(), "Out of memory\n");
    }
}
