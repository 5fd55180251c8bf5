//! Fatal error channel of the engine
//!
//! Compile-time `break`/`continue`/`give` never travel through here; see
//! [`Flow`](crate::prerun::Flow).

use thiserror::Error;

use crate::diagnostic::{Diagnostic, ErrorCode};
use crate::span::FileRange;

/// A failure that stops the current compilation.
#[derive(Debug, Error)]
pub enum CompileError {
    /// A user-facing diagnostic with its source range
    #[error("{}", .0.message())]
    Fatal(Box<Diagnostic>),

    /// An engine invariant did not hold
    #[error("internal compiler error: {message}")]
    Internal { message: String },
}

impl CompileError {
    pub fn fatal(diagnostic: Diagnostic) -> Self {
        CompileError::Fatal(Box::new(diagnostic))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        CompileError::Internal {
            message: message.into(),
        }
    }

    /// Shorthand for a fatal diagnostic with a code and a primary range
    pub fn at(code: ErrorCode, message: impl Into<String>, range: FileRange) -> Self {
        let message = message.into();
        Self::fatal(
            Diagnostic::error(message)
                .with_code(code)
                .with_primary_label(range, ""),
        )
    }

    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            CompileError::Fatal(diag) => Some(diag),
            CompileError::Internal { .. } => None,
        }
    }

    pub fn code(&self) -> Option<ErrorCode> {
        self.diagnostic().and_then(|d| d.code())
    }
}

impl From<Diagnostic> for CompileError {
    fn from(diagnostic: Diagnostic) -> Self {
        CompileError::fatal(diagnostic)
    }
}

pub type CompileResult<T> = Result<T, CompileError>;

/// Error codes used across the engine
pub mod codes {
    use crate::diagnostic::ErrorCode;

    pub const DUPLICATE_NAME: ErrorCode = ErrorCode("E1001");
    pub const NOT_FOUND: ErrorCode = ErrorCode("E1002");
    pub const NOT_ACCESSIBLE: ErrorCode = ErrorCode("E1003");
    pub const BRING_UNRESOLVED: ErrorCode = ErrorCode("E1004");
    pub const INVALID_PATH: ErrorCode = ErrorCode("E1005");

    pub const TYPE_MISMATCH: ErrorCode = ErrorCode("E2001");
    pub const BITWIDTH_MISMATCH: ErrorCode = ErrorCode("E2002");
    pub const UNSUPPORTED_OPERATOR: ErrorCode = ErrorCode("E2003");
    pub const NOT_SIZED: ErrorCode = ErrorCode("E2004");
    pub const ARGUMENT_COUNT: ErrorCode = ErrorCode("E2005");
    pub const ARGUMENT_TYPE: ErrorCode = ErrorCode("E2006");
    pub const MISSING_CONSTRUCTOR: ErrorCode = ErrorCode("E2007");
    pub const DUPLICATE_VARIANT: ErrorCode = ErrorCode("E2008");
    pub const INVALID_VARIANT: ErrorCode = ErrorCode("E2009");
    pub const NOT_PRERUN: ErrorCode = ErrorCode("E2010");
    pub const PRERUN_FAILURE: ErrorCode = ErrorCode("E2011");
    pub const MISSING_GIVE: ErrorCode = ErrorCode("E2012");
    pub const INVALID_CAST: ErrorCode = ErrorCode("E2013");
    pub const NOT_CALLABLE: ErrorCode = ErrorCode("E2014");
    pub const NO_MEMBER: ErrorCode = ErrorCode("E2015");
    pub const CONTROL_FLOW: ErrorCode = ErrorCode("E2016");
    pub const INVALID_EXPRESSION: ErrorCode = ErrorCode("E2017");
    pub const DUPLICATE_FIELD: ErrorCode = ErrorCode("E2018");

    pub const NOT_VARIABLE: ErrorCode = ErrorCode("E3001");
    pub const NON_TRIVIAL_COPY: ErrorCode = ErrorCode("E3002");
    pub const VARIABILITY_WIDENED: ErrorCode = ErrorCode("E3003");
    pub const NOT_ADDRESSABLE: ErrorCode = ErrorCode("E3004");
    pub const MEMBER_ARGUMENT: ErrorCode = ErrorCode("E3005");
    pub const MISSING_VALUE: ErrorCode = ErrorCode("E3006");

    pub const UNRESOLVED_DEPENDENCY: ErrorCode = ErrorCode("E4001");
    pub const ENTITY_NOT_READY: ErrorCode = ErrorCode("E4002");

    pub const META_TODO: ErrorCode = ErrorCode("E5001");

    pub const TRIVIAL_MOVE: ErrorCode = ErrorCode("W0001");
    pub const MAYBE_UNUSABLE: ErrorCode = ErrorCode("W0002");
    pub const TODO_WARNING: ErrorCode = ErrorCode("W0003");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::FileId;

    #[test]
    fn test_fatal_carries_message_and_code() {
        let err = CompileError::at(codes::NOT_FOUND, "missing", FileRange::new(FileId(0), 1, 2));
        assert_eq!(err.to_string(), "missing");
        assert_eq!(err.code(), Some(codes::NOT_FOUND));
    }

    #[test]
    fn test_internal_has_no_diagnostic() {
        let err = CompileError::internal("broken");
        assert!(err.diagnostic().is_none());
        assert!(err.to_string().contains("broken"));
    }
}
