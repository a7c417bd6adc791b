// This module defines the error type shared by every stage of aotc using the thiserror crate.
// Error is a single enum whose variants follow the pipeline: Unimplemented is produced only by
// the topology-validation gate of the compiler, Lowering by canonicalization and code
// generation, Execution by running a loaded executable, Transfer by moving values between host
// and device memory, InvalidArgument by option and argument validation, and Parse by the two
// reference IR front-ends. Each variant carries a human readable reason. ErrorKind is a flat,
// copyable classification so callers can match on the kind without destructuring, the way a
// status code is checked. Result<T> is the crate-wide alias.

//! Error types for aotc.
//!
//! Using thiserror for idiomatic error handling.

use thiserror::Error;

/// Main error type for compiling, loading and running programs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The topology-validation gate rejected the request.
    #[error("Unimplemented: {reason}")]
    Unimplemented { reason: String },

    #[error("Lowering failed: {reason}")]
    Lowering { reason: String },

    #[error("Execution failed: {reason}")]
    Execution { reason: String },

    #[error("Transfer failed: {reason}")]
    Transfer { reason: String },

    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("Parse error at {line}:{column}: {message}")]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },
}

/// Classification of an [`Error`] without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unimplemented,
    LoweringFailure,
    ExecutionFailure,
    TransferFailure,
    InvalidArgument,
    Parse,
}

impl Error {
    /// Kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Unimplemented { .. } => ErrorKind::Unimplemented,
            Error::Lowering { .. } => ErrorKind::LoweringFailure,
            Error::Execution { .. } => ErrorKind::ExecutionFailure,
            Error::Transfer { .. } => ErrorKind::TransferFailure,
            Error::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Error::Parse { .. } => ErrorKind::Parse,
        }
    }

    pub fn unimplemented(reason: impl Into<String>) -> Self {
        Error::Unimplemented { reason: reason.into() }
    }

    pub fn lowering(reason: impl Into<String>) -> Self {
        Error::Lowering { reason: reason.into() }
    }

    pub fn execution(reason: impl Into<String>) -> Self {
        Error::Execution { reason: reason.into() }
    }

    pub fn transfer(reason: impl Into<String>) -> Self {
        Error::Transfer { reason: reason.into() }
    }

    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Error::InvalidArgument { reason: reason.into() }
    }
}

/// Result type alias for aotc operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(Error::unimplemented("x").kind(), ErrorKind::Unimplemented);
        assert_eq!(Error::lowering("x").kind(), ErrorKind::LoweringFailure);
        assert_eq!(Error::execution("x").kind(), ErrorKind::ExecutionFailure);
        assert_eq!(Error::transfer("x").kind(), ErrorKind::TransferFailure);
        assert_eq!(Error::invalid_argument("x").kind(), ErrorKind::InvalidArgument);
        let parse = Error::Parse { line: 3, column: 7, message: "bad".into() };
        assert_eq!(parse.kind(), ErrorKind::Parse);
        assert_eq!(parse.to_string(), "Parse error at 3:7: bad");
    }
}
