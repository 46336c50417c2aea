//! Token scanner.
//!
//! The scanner pulls bytes from the [`Reader`] and produces tokens. At the
//! beginning of a line it compares the indentation column against the
//! current scope's indentation stack and emits `Indent`/`Dedent` layout
//! tokens; several `Dedent`s are produced one call at a time by rewinding
//! the cursor to the beginning of the line until the column matches.
//!
//! After `next()` returns, `token` holds the token just read and `text`
//! holds its text when the token is an identifier or literal (and is empty
//! otherwise). A single token of look-ahead is available through `peek()`;
//! note that peeking already fills the text buffer.
//!
//! The whole scanner state is a plain value: saving and restoring it (for
//! loops, function calls and position values) is a `clone`.

use smallvec::{SmallVec, smallvec};
use strum::Display;

use crate::{
    config::{Config, MAX_INDENT},
    error::{RunError, RunResult},
    reader::Reader,
    trace::Trace,
};

/// All tokens of the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub(crate) enum Token {
    #[strum(serialize = "UNKNOWN TOKEN")]
    Unknown,
    #[strum(serialize = "CHARACTER LITERAL")]
    CharLit,
    #[strum(serialize = "INTEGER LITERAL")]
    IntLit,
    #[strum(serialize = "FLOAT LITERAL")]
    FloatLit,
    #[strum(serialize = "STRING LITERAL")]
    StrLit,
    #[strum(serialize = "IDENTIFIER")]
    Identifier,
    #[strum(serialize = "STAR")]
    Star,
    #[strum(serialize = "SLASH")]
    Slash,
    #[strum(serialize = "PERCENT")]
    Percent,
    #[strum(serialize = "PLUS")]
    Plus,
    #[strum(serialize = "MINUS")]
    Minus,
    #[strum(serialize = "EQEQUAL")]
    EqEqual,
    #[strum(serialize = "NOTEQUAL")]
    NotEqual,
    #[strum(serialize = "LESS")]
    Less,
    #[strum(serialize = "LESSEQUAL")]
    LessEqual,
    #[strum(serialize = "GREATER")]
    Greater,
    #[strum(serialize = "GREATEREQUAL")]
    GreaterEqual,
    #[strum(serialize = "EQUAL")]
    Equal,
    #[strum(serialize = "PLUSEQUAL")]
    PlusEqual,
    #[strum(serialize = "MINUSEQUAL")]
    MinusEqual,
    #[strum(serialize = "STAREQUAL")]
    StarEqual,
    #[strum(serialize = "SLASHEQUAL")]
    SlashEqual,
    #[strum(serialize = "PERCENTEQUAL")]
    PercentEqual,
    #[strum(serialize = "NOT")]
    Not,
    #[strum(serialize = "LPAR")]
    Lpar,
    #[strum(serialize = "RPAR")]
    Rpar,
    #[strum(serialize = "LSQB")]
    Lsqb,
    #[strum(serialize = "RSQB")]
    Rsqb,
    #[strum(serialize = "COMMA")]
    Comma,
    #[strum(serialize = "DOT")]
    Dot,
    #[strum(serialize = "COLON")]
    Colon,
    #[strum(serialize = "AND")]
    And,
    #[strum(serialize = "OR")]
    Or,
    #[strum(serialize = "IN")]
    In,
    #[strum(serialize = "IF")]
    If,
    #[strum(serialize = "ELSE")]
    Else,
    #[strum(serialize = "WHILE")]
    While,
    #[strum(serialize = "DO")]
    Do,
    #[strum(serialize = "FOR")]
    For,
    #[strum(serialize = "BREAK")]
    Break,
    #[strum(serialize = "CONTINUE")]
    Continue,
    #[strum(serialize = "PASS")]
    Pass,
    #[strum(serialize = "RETURN")]
    Return,
    #[strum(serialize = "DEF")]
    Def,
    #[strum(serialize = "IMPORT")]
    Import,
    #[strum(serialize = "INPUT")]
    Input,
    #[strum(serialize = "PRINT")]
    Print,
    #[strum(serialize = "DEFCHAR")]
    DefChar,
    #[strum(serialize = "DEFINT")]
    DefInt,
    #[strum(serialize = "DEFFLOAT")]
    DefFloat,
    #[strum(serialize = "DEFSTR")]
    DefStr,
    #[strum(serialize = "DEFLIST")]
    DefList,
    #[strum(serialize = "NEWLINE")]
    Newline,
    #[strum(serialize = "INDENT")]
    Indent,
    #[strum(serialize = "DEDENT")]
    Dedent,
    #[strum(serialize = "ENDMARKER")]
    EndMarker,
}

/// Keyword table; entries must stay sorted for the binary search.
static KEYWORDS: &[(&str, Token)] = &[
    ("and", Token::And),
    ("break", Token::Break),
    ("char", Token::DefChar),
    ("continue", Token::Continue),
    ("def", Token::Def),
    ("do", Token::Do),
    ("else", Token::Else),
    ("float", Token::DefFloat),
    ("for", Token::For),
    ("if", Token::If),
    ("import", Token::Import),
    ("in", Token::In),
    ("input", Token::Input),
    ("int", Token::DefInt),
    ("list", Token::DefList),
    ("or", Token::Or),
    ("pass", Token::Pass),
    ("print", Token::Print),
    ("return", Token::Return),
    ("str", Token::DefStr),
    ("while", Token::While),
];

/// Indentation columns currently open, innermost last.
///
/// Each scope frame owns one of these; a fresh stack starts at column 0 and
/// the columns are strictly increasing bottom to top.
#[derive(Debug, Clone)]
pub(crate) struct IndentStack(SmallVec<[i64; 16]>);

impl IndentStack {
    pub fn new() -> Self {
        Self(smallvec![0])
    }

    pub fn top(&self) -> i64 {
        self.0.last().copied().unwrap_or(0)
    }

    fn push(&mut self, col: i64) -> RunResult<()> {
        if self.0.len() >= MAX_INDENT {
            return Err(RunError::syntax_error("max indentation level reached"));
        }
        self.0.push(col);
        Ok(())
    }

    fn pop(&mut self) -> RunResult<()> {
        if self.0.len() <= 1 {
            return Err(RunError::syntax_error(
                "inconsistent use of tabs and spaces in indentation",
            ));
        }
        self.0.pop();
        Ok(())
    }
}

/// The scanner state: current token, one slot of look-ahead, the
/// beginning-of-line flag, and the text of the last identifier or literal.
#[derive(Debug, Clone)]
pub(crate) struct Scanner {
    pub token: Token,
    peeked: Option<Token>,
    at_bol: bool,
    pub text: String,
}

impl Scanner {
    pub fn new() -> Self {
        Self {
            token: Token::Unknown,
            peeked: None,
            at_bol: true,
            text: String::new(),
        }
    }

    /// Resets to the state expected at the start of a module.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Reads the next token; a pending peeked token is consumed first.
    pub fn next(&mut self, reader: &mut Reader, indents: &mut IndentStack, config: &Config) -> RunResult<Token> {
        self.token = match self.peeked.take() {
            Some(token) => token,
            None => self.read_token(reader, indents, config)?,
        };
        Trace::new(config.debug).token(self.token, &self.text);
        Ok(self.token)
    }

    /// Looks one token ahead without consuming it. Only a single token of
    /// look-ahead is available.
    pub fn peek(&mut self, reader: &mut Reader, indents: &mut IndentStack, config: &Config) -> RunResult<Token> {
        if self.peeked.is_none() {
            self.peeked = Some(self.read_token(reader, indents, config)?);
        }
        Ok(self.peeked.unwrap_or(Token::Unknown))
    }

    fn read_token(&mut self, reader: &mut Reader, indents: &mut IndentStack, config: &Config) -> RunResult<Token> {
        self.text.clear();

        // Determine the indentation level at the beginning of a line and
        // emit Indent/Dedent when it changed. Blank lines and comment-only
        // lines produce no layout tokens at all.
        while self.at_bol {
            self.at_bol = false;
            let mut col: i64 = 0;
            let mut ch = loop {
                match reader.next_ch() {
                    Some(b' ') => col += 1,
                    Some(b'\t') => col = (col / config.tabsize + 1) * config.tabsize,
                    other => break other,
                }
            };
            if ch == Some(b'#') {
                while !matches!(ch, Some(b'\n') | None) {
                    ch = reader.next_ch();
                }
            }
            match ch {
                Some(b'\n') => {
                    self.at_bol = true;
                    continue;
                }
                None => {
                    col = 0;
                    if col == indents.top() {
                        return Ok(Token::EndMarker);
                    }
                }
                Some(c) => reader.push_ch(c),
            }
            if col == indents.top() {
                break;
            }
            if col > indents.top() {
                indents.push(col)?;
                return Ok(Token::Indent);
            }
            indents.pop()?;
            if col != indents.top() {
                // not yet at a previously open level, emit more dedents
                self.at_bol = true;
                reader.to_bol();
            }
            return Ok(Token::Dedent);
        }

        let mut ch = loop {
            match reader.next_ch() {
                Some(b' ' | b'\t') => {}
                other => break other,
            }
        };
        if ch == Some(b'#') {
            while !matches!(ch, Some(b'\n') | None) {
                ch = reader.next_ch();
            }
        }

        let Some(c) = ch else {
            return Ok(Token::EndMarker);
        };
        if c == b'\n' {
            self.at_bol = true;
            return Ok(Token::Newline);
        }
        if c.is_ascii_digit() {
            reader.push_ch(c);
            return self.read_number(reader);
        }
        if c.is_ascii_alphabetic() {
            reader.push_ch(c);
            return Ok(self.read_identifier(reader));
        }
        match c {
            b'\'' => self.read_character(reader),
            b'"' => Ok(self.read_string(reader)),
            b'(' => Ok(Token::Lpar),
            b')' => Ok(Token::Rpar),
            b'[' => Ok(Token::Lsqb),
            b']' => Ok(Token::Rsqb),
            b',' => Ok(Token::Comma),
            b'.' => Ok(Token::Dot),
            b':' => Ok(Token::Colon),
            b'*' => Ok(eq_follows(reader, Token::StarEqual, Token::Star)),
            b'%' => Ok(eq_follows(reader, Token::PercentEqual, Token::Percent)),
            b'+' => Ok(eq_follows(reader, Token::PlusEqual, Token::Plus)),
            b'-' => Ok(eq_follows(reader, Token::MinusEqual, Token::Minus)),
            b'/' => Ok(eq_follows(reader, Token::SlashEqual, Token::Slash)),
            b'!' => Ok(eq_follows(reader, Token::NotEqual, Token::Not)),
            b'=' => Ok(eq_follows(reader, Token::EqEqual, Token::Equal)),
            b'<' => {
                if reader.peek_ch() == Some(b'=') {
                    reader.next_ch();
                    Ok(Token::LessEqual)
                } else if reader.peek_ch() == Some(b'>') {
                    reader.next_ch();
                    Ok(Token::NotEqual)
                } else {
                    Ok(Token::Less)
                }
            }
            b'>' => Ok(eq_follows(reader, Token::GreaterEqual, Token::Greater)),
            _ => Ok(Token::Unknown),
        }
    }

    /// Reads an integer or floating point number. Scientific notation is
    /// recognized, e.g. `2`, `2.`, `0.2`, `1E+2`, `0.1e-2`.
    fn read_number(&mut self, reader: &mut Reader) -> RunResult<Token> {
        let mut dots = 0;
        let mut has_exponent = false;
        loop {
            match reader.next_ch() {
                Some(c) if c.is_ascii_digit() || c == b'.' => {
                    if c == b'.' {
                        dots += 1;
                        if dots > 1 {
                            return Err(RunError::value_error("multiple decimal points"));
                        }
                    }
                    self.text.push(c as char);
                }
                Some(c @ (b'e' | b'E')) => {
                    has_exponent = true;
                    self.text.push(c as char);
                    let mut ch = reader.next_ch();
                    if let Some(sign @ (b'-' | b'+')) = ch {
                        self.text.push(sign as char);
                        ch = reader.next_ch();
                    }
                    if !matches!(ch, Some(c) if c.is_ascii_digit()) {
                        return Err(RunError::value_error("missing exponent"));
                    }
                    while let Some(digit) = ch {
                        if !digit.is_ascii_digit() {
                            break;
                        }
                        self.text.push(digit as char);
                        ch = reader.next_ch();
                    }
                    if let Some(c) = ch {
                        reader.push_ch(c);
                    }
                    break;
                }
                other => {
                    if let Some(c) = other {
                        reader.push_ch(c);
                    }
                    break;
                }
            }
        }
        Ok(if dots == 1 || has_exponent {
            Token::FloatLit
        } else {
            Token::IntLit
        })
    }

    /// Reads a name and decides keyword versus identifier via the sorted
    /// keyword table.
    fn read_identifier(&mut self, reader: &mut Reader) -> Token {
        loop {
            match reader.next_ch() {
                Some(c) if c.is_ascii_alphanumeric() || c == b'_' => self.text.push(c as char),
                Some(c) => {
                    reader.push_ch(c);
                    break;
                }
                None => break,
            }
        }
        match KEYWORDS.binary_search_by(|probe| probe.0.cmp(self.text.as_str())) {
            Ok(index) => {
                self.text.clear();
                KEYWORDS[index].1
            }
            Err(_) => Token::Identifier,
        }
    }

    /// Reads a double-quoted string; escape sequences are decoded, an
    /// unknown escape keeps its backslash.
    fn read_string(&mut self, reader: &mut Reader) -> Token {
        loop {
            match reader.next_ch() {
                None | Some(b'"') => break,
                Some(b'\\') => match reader.peek_ch().and_then(decode_escape) {
                    Some(decoded) => {
                        reader.next_ch();
                        self.text.push(decoded as char);
                    }
                    None => self.text.push('\\'),
                },
                Some(c) => self.text.push(c as char),
            }
        }
        Token::StrLit
    }

    /// Reads a single-quoted character constant, e.g. `'a'` or `'\n'`.
    fn read_character(&mut self, reader: &mut Reader) -> RunResult<Token> {
        let decoded = match reader.next_ch() {
            Some(b'\\') => match reader.next_ch() {
                Some(c) => decode_escape(c).ok_or_else(|| {
                    RunError::syntax_error(format!("unknown escape sequence: {}", c as char))
                })?,
                None => return Err(RunError::syntax_error("empty character constant")),
            },
            Some(b'\'') | None => return Err(RunError::syntax_error("empty character constant")),
            Some(c) => c,
        };
        if reader.next_ch() != Some(b'\'') {
            return Err(RunError::syntax_error("too many characters in character constant"));
        }
        self.text.push(decoded as char);
        Ok(Token::CharLit)
    }
}

pub(crate) fn decode_escape(c: u8) -> Option<u8> {
    match c {
        b'0' => Some(0),
        b'a' => Some(0x07),
        b'b' => Some(0x08),
        b't' => Some(b'\t'),
        b'n' => Some(b'\n'),
        b'v' => Some(0x0b),
        b'f' => Some(0x0c),
        b'r' => Some(b'\r'),
        b'"' => Some(b'"'),
        b'\'' => Some(b'\''),
        b'\\' => Some(b'\\'),
        _ => None,
    }
}

fn eq_follows(reader: &mut Reader, with_equal: Token, without: Token) -> Token {
    if reader.peek_ch() == Some(b'=') {
        reader.next_ch();
        with_equal
    } else {
        without
    }
}
