//! Formula error types
//!
//! Lex and parse errors abort before evaluation and carry a byte offset into
//! the expression. Resolve and eval errors become [`EvalError`] values so one
//! bad reference never takes down unrelated records.

use std::fmt;
use thiserror::Error;

/// Result type for parse-level formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Result type used while evaluating
pub type EvalResult<T> = std::result::Result<T, EvalError>;

/// Any error produced by the engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Eval(#[from] EvalError),
}

impl FormulaError {
    /// Byte offset into the expression, when known
    pub fn offset(&self) -> Option<usize> {
        match self {
            FormulaError::Lex(e) => Some(e.offset),
            FormulaError::Parse(e) => Some(e.offset),
            FormulaError::Resolve(_) => None,
            FormulaError::Eval(e) => e.offset,
        }
    }
}

/// Lexer failure kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexErrorKind {
    UnterminatedString,
    UnterminatedReference,
    InvalidCharacter(char),
}

impl fmt::Display for LexErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexErrorKind::UnterminatedString => f.write_str("unterminated string literal"),
            LexErrorKind::UnterminatedReference => f.write_str("unterminated field reference"),
            LexErrorKind::InvalidCharacter(c) => write!(f, "invalid character '{}'", c),
        }
    }
}

/// Lexer error with the offset of the first offending byte
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Lex error: {kind} at offset {offset}")]
pub struct LexError {
    pub kind: LexErrorKind,
    pub offset: usize,
}

impl LexError {
    pub fn new(kind: LexErrorKind, offset: usize) -> Self {
        Self { kind, offset }
    }
}

/// Parser failure kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    UnexpectedToken,
    UnexpectedEnd,
    UnbalancedParens,
    UnknownOperator,
    /// Expression nests deeper than the parser allows
    NestingTooDeep,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParseErrorKind::UnexpectedToken => "unexpected token",
            ParseErrorKind::UnexpectedEnd => "unexpected end of expression",
            ParseErrorKind::UnbalancedParens => "unbalanced parentheses",
            ParseErrorKind::UnknownOperator => "unknown operator",
            ParseErrorKind::NestingTooDeep => "expression nested too deeply",
        };
        f.write_str(s)
    }
}

/// Parse error carrying the offending token and its offset
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Parse error: {kind} '{token}' at offset {offset}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub token: String,
    pub offset: usize,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, token: impl Into<String>, offset: usize) -> Self {
        Self {
            kind,
            token: token.into(),
            offset,
        }
    }
}

/// Binding failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// Field names along the offending chain, first and last entries equal
    #[error("Circular reference: {}", .0.join(" -> "))]
    CircularReference(Vec<String>),
}

impl ResolveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResolveError::UnknownField(_) => ErrorKind::UnknownField,
            ResolveError::UnknownFunction(_) => ErrorKind::UnknownFunction,
            ResolveError::CircularReference(_) => ErrorKind::CircularReference,
        }
    }
}

/// Kind tag of an error value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // Binding
    UnknownField,
    UnknownFunction,
    CircularReference,
    /// A referenced Formula field's own expression does not parse
    InvalidFormula,

    // Evaluation
    ArityMismatch,
    TypeMismatch,
    NotANumber,
    DivisionByZero,
    InvalidDateArgument,
    OptionNotFound,
    /// Depth or node budget exhausted
    LimitExceeded,
}

impl ErrorKind {
    /// Short badge shown in place of a value
    pub fn badge(&self) -> &'static str {
        match self {
            ErrorKind::UnknownField | ErrorKind::UnknownFunction => "#NAME?",
            ErrorKind::CircularReference => "#CIRCULAR!",
            ErrorKind::DivisionByZero => "#DIV/0!",
            ErrorKind::NotANumber => "#NUM!",
            ErrorKind::InvalidFormula
            | ErrorKind::ArityMismatch
            | ErrorKind::TypeMismatch
            | ErrorKind::InvalidDateArgument
            | ErrorKind::OptionNotFound
            | ErrorKind::LimitExceeded => "#VALUE!",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// An error captured as a value: kind, message and the node offset that produced it
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: {message}")]
pub struct EvalError {
    pub kind: ErrorKind,
    pub message: String,
    pub offset: Option<usize>,
}

impl EvalError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            offset: None,
        }
    }

    /// Attach a source offset unless a deeper node already did
    pub fn at(mut self, offset: usize) -> Self {
        if self.offset.is_none() {
            self.offset = Some(offset);
        }
        self
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeMismatch, message)
    }

    pub fn not_a_number(text: &str) -> Self {
        Self::new(
            ErrorKind::NotANumber,
            format!("cannot convert \"{}\" to a number", text),
        )
    }

    pub fn invalid_date(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidDateArgument, message)
    }

    pub fn division_by_zero() -> Self {
        Self::new(ErrorKind::DivisionByZero, "division by zero")
    }
}

impl From<ResolveError> for EvalError {
    fn from(err: ResolveError) -> Self {
        EvalError::new(err.kind(), err.to_string())
    }
}
