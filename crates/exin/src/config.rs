//! Runtime configuration.

/// Crate version, surfaced by the command-line front-end.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default number of columns a tab advances to when counting indentation.
pub(crate) const DEFAULT_TABSIZE: i64 = 4;

/// Maximum nesting depth of the indentation stack per scope.
pub(crate) const MAX_INDENT: usize = 132;

/// Interpreter configuration.
///
/// `debug` is a bitmask of the `TRACE_*` constants; all trace output goes to
/// stderr. `heap_limit` caps the number of simultaneously live values; an
/// allocation beyond the cap raises `OutOfMemoryError`.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Columns per tab stop when counting indentation. Must be >= 1.
    pub tabsize: i64,
    /// Debug trace bitmask, see the `TRACE_*` constants.
    pub debug: u32,
    /// Optional cap on the number of live heap values.
    pub heap_limit: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tabsize: DEFAULT_TABSIZE,
            debug: 0,
            heap_limit: None,
        }
    }
}

impl Config {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}
