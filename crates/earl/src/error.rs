//! The interpreter's error taxonomy.
//!
//! Every failure path in the interpreter — lexing, parsing, and evaluation —
//! produces an [`EarlError`] tagged with one of the [`ErrorKind`] variants from
//! `spec.md` §7. There is no `try`/`catch` exposed to EARL programs: every error
//! is terminal and propagates to the top level.

use std::fmt;

use crate::token::SourceLoc;

/// Result alias used throughout the crate.
pub type EarlResult<T> = Result<T, EarlError>;

/// The error taxonomy from `spec.md` §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum ErrorKind {
    /// Raised by the lexer or parser.
    Syntax,
    /// Bounded indexing, division by zero, failed `assert`.
    Runtime,
    /// Operator/operand mismatch, mutate across incompatible variants.
    Types,
    /// Duplicate name in a scope.
    Redeclared,
    /// Identifier lookup miss.
    Undeclared,
    /// Invariant violation — a bug in the interpreter itself.
    Fatal,
    /// Unimplemented stub.
    Todo,
}

/// A terminal interpreter error.
///
/// `loc` is `None` only for errors synthesized far from any source token
/// (e.g. I/O failures while resolving an `import`).
#[derive(Debug, Clone)]
pub struct EarlError {
    pub kind: ErrorKind,
    pub message: String,
    pub loc: Option<SourceLoc>,
}

impl EarlError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, loc: Option<SourceLoc>) -> Self {
        Self {
            kind,
            message: message.into(),
            loc,
        }
    }

    pub fn syntax(message: impl Into<String>, loc: SourceLoc) -> Self {
        Self::new(ErrorKind::Syntax, message, Some(loc))
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Runtime, message, None)
    }

    pub fn types(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Types, message, None)
    }

    pub fn redeclared(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Redeclared, message, None)
    }

    pub fn undeclared(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Undeclared, message, None)
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Fatal, message, None)
    }

    pub fn todo(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Todo, message, None)
    }

    /// Attaches a source location, unless one is already present.
    ///
    /// Used by the expression evaluator to attribute binop/intrinsic errors to
    /// the operator or call-site token per `spec.md` §4.1/§4.6, without every
    /// value-level operation needing to carry a `SourceLoc` of its own.
    #[must_use]
    pub fn with_loc(mut self, loc: SourceLoc) -> Self {
        if self.loc.is_none() {
            self.loc = Some(loc);
        }
        self
    }
}

impl fmt::Display for EarlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.loc {
            Some(loc) => write!(f, "{}: {} at {}:{}", self.kind, self.message, loc.line, loc.col),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for EarlError {}
