//! pairlisp - a small Lisp interpreter over mutable cons pairs
//!
//! This crate provides a compact Lisp-family interpreter: a lexer with a string
//! side table, an s-expression reader, a printer, chained lexical environments and
//! a trampolined evaluator that runs tail calls in constant native stack.
//!
//! ```scheme
//! (define (loop n) (if (= n 0) 0 (loop (- n 1))))
//! (loop 100000)                      ; => 0, tail calls do not grow the stack
//! (let ((x 2) (y 3)) (+ x y))        ; => 5
//! (cond ((= 1 2) 'no) (else 'yes))   ; => yes
//! ```
//!
//! ## Semantics
//!
//! - Code is data: programs are read into the same mutable pair structure that
//!   `cons`, `set-car!` and `set-cdr!` operate on, so aliasing is observable.
//! - Truth is symbolic: only the symbol `false` is false, every other value is true.
//! - `define` overwrites an existing binding wherever it is found in the chain and
//!   otherwise binds in the root frame.
//! - Console output, file reads and the clock go through an injected [`host::Host`].
//!
//! ## Modules
//!
//! - `lexer`: source text to a token stream with a string side table
//! - `reader`: token stream to [`ast::Value`] trees
//! - `printer`: values back to text, readable or display form
//! - `evaluator`: the interpreter, environments and derived-form rewriting
//! - `builtinops`: the registry of primitive procedures
//! - `host`: console, file and clock capabilities used by primitives

use std::fmt;

/// Maximum nesting depth accepted by the reader
/// Deeper input is rejected instead of exhausting the native stack
pub const MAX_PARSE_DEPTH: usize = 128;

/// Default maximum depth of nested (non-tail) evaluation
/// The native stack grows on demand below this; tail calls run in the
/// trampoline and do not count against it
pub const MAX_EVAL_DEPTH: usize = 10_000;

/// Categorizes the different kinds of parsing errors.
#[derive(Debug, PartialEq, Clone)]
pub enum ParseErrorKind {
    /// Unexpected token, such as a stray `)` or a misplaced `.`
    InvalidSyntax,
    /// Input ended before the expression was complete (unclosed list, unterminated string)
    Incomplete,
    /// Expression nesting exceeded [`MAX_PARSE_DEPTH`]
    TooDeeplyNested,
}

/// A structured error describing a lexing or reading failure.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// The offending token, if one was identified
    pub found: Option<String>,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, message: impl Into<String>, found: Option<String>) -> Self {
        ParseError {
            kind,
            message: message.into(),
            found,
        }
    }

    /// Create a ParseError with a kind and message but no offending token
    pub fn from_message(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, None)
    }
}

/// Error types for the interpreter
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    ParseError(ParseError),
    /// Evaluation aborted by the interpreter itself (depth limit)
    EvalError(String),
    TypeError(String),
    UnboundVariable(String),
    ArityError {
        expected: usize,
        got: usize,
        expression: Option<String>, // operator the arguments were supplied to
    },
    /// Malformed special form, unknown expression type or unknown procedure type
    FormError(String),
    /// Raised by the `error` primitive
    UserError {
        message: String,
        irritants: Vec<String>,
    },
    /// A host capability (console, file system) failed
    HostError(String),
}

impl Error {
    /// Create an ArityError without expression context
    pub fn arity_error(expected: usize, got: usize) -> Self {
        Error::ArityError {
            expected,
            got,
            expression: None,
        }
    }

    /// Create an ArityError with expression context
    pub fn arity_error_with_expr(expected: usize, got: usize, expression: String) -> Self {
        Error::ArityError {
            expected,
            got,
            expression: Some(expression),
        }
    }

    /// Attach an operator to an arity error that has none yet; other errors pass through
    pub(crate) fn with_operator(self, operator: &ast::Value) -> Self {
        match self {
            Error::ArityError {
                expected,
                got,
                expression: None,
            } => Error::arity_error_with_expr(expected, got, operator.to_string()),
            other => other,
        }
    }

    pub(crate) fn parse(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Error::ParseError(ParseError::from_message(kind, message))
    }

    /// True for an arity error where more arguments were supplied than accepted
    pub fn is_too_many(&self) -> bool {
        matches!(self, Error::ArityError { expected, got, .. } if got > expected)
    }

    /// True for an arity error where fewer arguments were supplied than required
    pub fn is_too_few(&self) -> bool {
        matches!(self, Error::ArityError { expected, got, .. } if got < expected)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ParseError(e) => {
                write!(f, "ParseError: {}", e.message)?;
                if let Some(found) = &e.found {
                    write!(f, "\nFound: {found}")?;
                }
                Ok(())
            }
            Error::EvalError(msg) => write!(f, "EvaluationError: {msg}"),
            Error::TypeError(msg) => write!(f, "Type error: {msg}"),
            Error::UnboundVariable(var) => write!(f, "Unbound variable: {var}"),
            Error::ArityError {
                expected,
                got,
                expression,
            } => {
                let problem = if got > expected {
                    "too many arguments"
                } else {
                    "too few arguments"
                };
                match expression {
                    Some(expr) => write!(
                        f,
                        "ArityError: {problem} supplied to {expr}: expected {expected}, got {got}"
                    ),
                    None => write!(
                        f,
                        "ArityError: {problem} supplied: expected {expected}, got {got}"
                    ),
                }
            }
            Error::FormError(msg) => write!(f, "Form error: {msg}"),
            Error::UserError { message, .. } => write!(f, "Error: {message}"),
            Error::HostError(msg) => write!(f, "Host error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

pub mod ast;
pub mod builtinops;
pub mod evaluator;
pub mod host;
pub mod lexer;
pub mod printer;
pub mod reader;

pub use ast::Value;
pub use evaluator::{EnvRef, Interpreter};
