//! Compiler error type.
//!
//! A single error kind carries a human-readable message and a source
//! location; there is no recovery or resynchronization anywhere in this
//! crate, so the first error reported aborts the whole translation unit.

use std::fmt;

use crate::location::SourceLocation;

/// Coarse classification of where an error came from, matching the
/// taxonomy observed across the test suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unexpected token kind or value.
    Syntax,
    /// Multiple/empty/invalid type specifier sets, duplicate qualifiers,
    /// multiple storage classes, tag-kind mismatch, tag redefinition.
    TypeSpec,
    /// Unknown name, redefinition in the same scope.
    Lookup,
    /// Expected lvalue, type mismatch across an operator, argument-count
    /// mismatch, non-returning non-void function.
    Semantics,
    /// Recognized but not (yet) lowered by the code generator.
    Unimplemented,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Syntax => "syntax error",
            ErrorKind::TypeSpec => "type specifier error",
            ErrorKind::Lookup => "lookup error",
            ErrorKind::Semantics => "semantic error",
            ErrorKind::Unimplemented => "unimplemented",
        };
        f.write_str(s)
    }
}

/// The single error type produced by this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerError {
    pub kind: ErrorKind,
    pub message: String,
    pub loc: SourceLocation,
}

impl CompilerError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, loc: SourceLocation) -> Self {
        CompilerError {
            kind,
            message: message.into(),
            loc,
        }
    }

    pub fn syntax(message: impl Into<String>, loc: SourceLocation) -> Self {
        Self::new(ErrorKind::Syntax, message, loc)
    }

    pub fn type_spec(message: impl Into<String>, loc: SourceLocation) -> Self {
        Self::new(ErrorKind::TypeSpec, message, loc)
    }

    pub fn lookup(message: impl Into<String>, loc: SourceLocation) -> Self {
        Self::new(ErrorKind::Lookup, message, loc)
    }

    pub fn semantics(message: impl Into<String>, loc: SourceLocation) -> Self {
        Self::new(ErrorKind::Semantics, message, loc)
    }

    pub fn unimplemented(message: impl Into<String>, loc: SourceLocation) -> Self {
        Self::new(ErrorKind::Unimplemented, message, loc)
    }
}

impl fmt::Display for CompilerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}: {}", self.kind, self.loc, self.message)
    }
}

impl std::error::Error for CompilerError {}

pub type Result<T> = std::result::Result<T, CompilerError>;
