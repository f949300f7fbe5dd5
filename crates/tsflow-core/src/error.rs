use std::fmt;

use thiserror::Error;

/// Canonical result for core.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse error category, used by callers that branch on the kind of failure
/// rather than on the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Code {
    FailedPrecondition,
    Unimplemented,
    Internal,
    Invalid,
    NotFound,
    ResourceExhausted,
    Eval,
    Config,
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Code::FailedPrecondition => "failed precondition",
            Code::Unimplemented => "unimplemented",
            Code::Internal => "internal error",
            Code::Invalid => "invalid",
            Code::NotFound => "not found",
            Code::ResourceExhausted => "resource exhausted",
            Code::Eval => "evaluation error",
            Code::Config => "invalid configuration",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// The input does not have the shape the operator requires.
    #[error("failed precondition: {0}")]
    FailedPrecondition(String),

    #[error("unimplemented: {0}")]
    Unimplemented(String),

    /// Engine-level invariant violated; unreachable under correct scheduling.
    #[error("internal invariant failed: {0}")]
    Internal(String),

    #[error("invalid: {0}")]
    Invalid(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Raised by a row function while evaluating a pair of rows.
    #[error("evaluation error: {0}")]
    Eval(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn code(&self) -> Code {
        match self {
            Error::FailedPrecondition(_) => Code::FailedPrecondition,
            Error::Unimplemented(_) => Code::Unimplemented,
            Error::Internal(_) => Code::Internal,
            Error::Invalid(_) => Code::Invalid,
            Error::NotFound(_) => Code::NotFound,
            Error::ResourceExhausted(_) => Code::ResourceExhausted,
            Error::Eval(_) => Code::Eval,
            Error::Config(_) => Code::Config,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Internal(format!("serialization: {}", e))
    }
}
