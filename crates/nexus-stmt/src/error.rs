//! Statement layer error types.
//!
//! `StmtError` is what a caller of a statement command sees. The engine
//! absorbs stale metadata, engine fallback and the one-time type mismatch
//! reprepare internally; everything else surfaces here with its originating
//! condition.

use nexus_common::{Condition, ErrorCode, StatementId};
use nexus_wire::{FieldType, WireError};
use thiserror::Error;

use crate::sink::SinkError;

/// Result type for statement operations.
pub type StmtResult<T> = Result<T, StmtError>;

/// Classification of an execution failure reported by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvokeErrorKind {
    /// Referenced metadata changed since the plan was compiled.
    StaleMetadata,
    /// The plan's engine cannot run it; another engine should be tried.
    AlternateEngine,
    /// Lock wait timed out.
    LockWait,
    /// Deadlock detected.
    Deadlock,
    /// Data conversion or range failure.
    Data,
    /// Constraint violation.
    Constraint,
    /// Memory allocation failed.
    OutOfMemory,
    /// Result sink rejected output.
    Sink,
    /// Anything else.
    Internal,
}

/// Execution failure reported by the external executor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct InvokeError {
    /// Failure class.
    pub kind: InvokeErrorKind,
    /// Message for the client.
    pub message: String,
    /// The client may retry the statement or transaction.
    pub retryable: bool,
    /// The plan must be rebuilt before another attempt.
    pub requires_reprepare: bool,
    /// Another engine should be tried.
    pub alternate_engine: bool,
}

impl InvokeError {
    /// Creates an error of the given kind with default tags.
    pub fn new(kind: InvokeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable: matches!(kind, InvokeErrorKind::LockWait | InvokeErrorKind::Deadlock),
            requires_reprepare: kind == InvokeErrorKind::StaleMetadata,
            alternate_engine: kind == InvokeErrorKind::AlternateEngine,
        }
    }

    /// Stale metadata; the plan must be rebuilt.
    pub fn stale(message: impl Into<String>) -> Self {
        Self::new(InvokeErrorKind::StaleMetadata, message)
    }

    /// Ask the engine to try the other execution engine.
    pub fn alternate_engine(message: impl Into<String>) -> Self {
        Self::new(InvokeErrorKind::AlternateEngine, message)
    }

    /// Memory allocation failure.
    pub fn out_of_memory(message: impl Into<String>) -> Self {
        Self::new(InvokeErrorKind::OutOfMemory, message)
    }

    /// Internal failure.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(InvokeErrorKind::Internal, message)
    }

    /// Returns the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self.kind {
            InvokeErrorKind::StaleMetadata => ErrorCode::StaleMetadata,
            InvokeErrorKind::LockWait => ErrorCode::LockFailed,
            InvokeErrorKind::Deadlock => ErrorCode::Deadlock,
            InvokeErrorKind::OutOfMemory => ErrorCode::OutOfMemory,
            InvokeErrorKind::Sink => ErrorCode::SinkFailed,
            InvokeErrorKind::AlternateEngine
            | InvokeErrorKind::Data
            | InvokeErrorKind::Constraint
            | InvokeErrorKind::Internal => ErrorCode::ExecutionFailed,
        }
    }
}

impl From<SinkError> for InvokeError {
    fn from(err: SinkError) -> Self {
        match err {
            SinkError::OutOfMemory => Self::out_of_memory(err.to_string()),
            other => Self::new(InvokeErrorKind::Sink, other.to_string()),
        }
    }
}

/// Compilation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// Statement text could not be parsed.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// Statement references an object that does not exist.
    #[error("unknown object '{0}'")]
    UnknownObject(String),

    /// Statement uses an unsupported construct.
    #[error("not supported: {0}")]
    Unsupported(String),

    /// A reprepare produced a different number of placeholders.
    #[error("parameter count changed from {before} to {after} during reprepare")]
    ParamCountChanged { before: usize, after: usize },

    /// Statement has more placeholders than the protocol can carry.
    #[error("statement has {count} parameters, maximum is {max}")]
    TooManyParams { count: usize, max: usize },

    /// Metadata locks for the statement's dependencies could not be taken.
    #[error("metadata lock failed: {0}")]
    Lock(String),
}

/// Errors surfaced by statement commands.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StmtError {
    /// Fewer (or, for strict callers, more) values than placeholders.
    #[error("incorrect arguments to EXECUTE: expected {expected} parameters, got {actual}")]
    ParamCountMismatch { expected: usize, actual: usize },

    /// A parameter value could not be decoded.
    #[error("invalid value for parameter {index}: {reason}")]
    ParamTypeInvalid { index: usize, reason: String },

    /// Long data was streamed to a parameter then bound with a non-string type.
    #[error("parameter {index} received long data but was bound as {field_type}")]
    TypeIncompatibleWithStreamedData { index: usize, field_type: FieldType },

    /// An earlier long data append failed.
    #[error("long data for parameter {index} rejected: {reason}")]
    LongData { index: usize, reason: String },

    /// Metadata changed and the statement kind does not allow a retry.
    #[error("table definition has changed, please retry transaction")]
    StaleMetadata,

    /// Metadata kept changing across every allowed reprepare.
    #[error("statement metadata changed during {attempts} consecutive reprepares")]
    ReprepareExhausted { attempts: u32 },

    /// Compilation failed.
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// Execution failed.
    #[error("execution failed: {0}")]
    Execution(InvokeError),

    /// Cursor command in the wrong cursor state.
    #[error("cursor error: {0}")]
    CursorState(String),

    /// Memory allocation failed.
    #[error("out of memory: {0}")]
    OutOfMemory(String),

    /// No statement with this id in the session.
    #[error("unknown prepared statement handler ({0})")]
    UnknownStatement(StatementId),

    /// No statement with this name in the session.
    #[error("unknown prepared statement '{0}'")]
    UnknownStatementName(String),

    /// The statement is already executing.
    #[error("prepared statement {0} is already in use")]
    StatementInUse(StatementId),

    /// The session holds its maximum number of statements.
    #[error("can't create more than {0} prepared statements")]
    TooManyStatements(usize),

    /// Command not valid in the statement's lifecycle state.
    #[error("invalid statement state: {0}")]
    InvalidState(String),

    /// Session policy refused execution.
    #[error("{0}")]
    PolicyRejected(String),

    /// A kill request interrupted execution.
    #[error("query execution was interrupted")]
    Interrupted,

    /// The result sink rejected output.
    #[error(transparent)]
    Sink(#[from] SinkError),
}

impl From<InvokeError> for StmtError {
    fn from(err: InvokeError) -> Self {
        match err.kind {
            InvokeErrorKind::OutOfMemory => Self::OutOfMemory(err.message),
            _ => Self::Execution(err),
        }
    }
}

impl From<WireError> for StmtError {
    fn from(err: WireError) -> Self {
        Self::Sink(SinkError::Encode(err))
    }
}

impl StmtError {
    /// Creates a cursor state error.
    pub fn cursor(message: impl Into<String>) -> Self {
        Self::CursorState(message.into())
    }

    /// Creates an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// Returns the error code for this error.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ParamCountMismatch { .. } => ErrorCode::ParamCountMismatch,
            Self::ParamTypeInvalid { .. } => ErrorCode::ParamTypeInvalid,
            Self::TypeIncompatibleWithStreamedData { .. } => ErrorCode::StreamedDataIncompatible,
            Self::LongData { .. } => ErrorCode::LongDataFailed,
            Self::StaleMetadata => ErrorCode::StaleMetadata,
            Self::ReprepareExhausted { .. } => ErrorCode::ReprepareExhausted,
            Self::Compile(CompileError::Lock(_)) => ErrorCode::LockFailed,
            Self::Compile(_) => ErrorCode::CompileFailed,
            Self::Execution(err) => err.code(),
            Self::CursorState(_) => ErrorCode::CursorNotOpen,
            Self::OutOfMemory(_) => ErrorCode::OutOfMemory,
            Self::UnknownStatement(_) | Self::UnknownStatementName(_) => {
                ErrorCode::UnknownStatement
            }
            Self::StatementInUse(_) => ErrorCode::StatementInUse,
            Self::TooManyStatements(_) => ErrorCode::TooManyStatements,
            Self::InvalidState(_) => ErrorCode::InvalidState,
            Self::PolicyRejected(_) => ErrorCode::PolicyRejected,
            Self::Interrupted => ErrorCode::Interrupted,
            Self::Sink(_) => ErrorCode::SinkFailed,
        }
    }

    /// Returns true if the session cannot continue after this error.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::OutOfMemory(_))
    }

    /// Returns true if the client may retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Execution(err) => err.retryable,
            Self::StaleMetadata => true,
            _ => false,
        }
    }

    /// Converts this error into a diagnostic condition.
    #[must_use]
    pub fn to_condition(&self) -> Condition {
        Condition::error(self.code(), self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invoke_error_tags() {
        let stale = InvokeError::stale("t changed");
        assert!(stale.requires_reprepare);
        assert!(!stale.alternate_engine);
        assert!(!stale.retryable);

        let deadlock = InvokeError::new(InvokeErrorKind::Deadlock, "victim");
        assert!(deadlock.retryable);
        assert_eq!(deadlock.code(), ErrorCode::Deadlock);

        assert!(InvokeError::alternate_engine("offload").alternate_engine);
    }

    #[test]
    fn test_out_of_memory_is_fatal() {
        let err: StmtError = InvokeError::out_of_memory("arena").into();
        assert!(matches!(err, StmtError::OutOfMemory(_)));
        assert!(err.is_fatal());
        assert!(!StmtError::Interrupted.is_fatal());
    }

    #[test]
    fn test_retryable() {
        let err: StmtError = InvokeError::new(InvokeErrorKind::LockWait, "timeout").into();
        assert!(err.is_retryable());
        assert!(!StmtError::ReprepareExhausted { attempts: 3 }.is_retryable());
    }

    #[test]
    fn test_codes() {
        assert_eq!(
            StmtError::ParamCountMismatch {
                expected: 2,
                actual: 1
            }
            .code(),
            ErrorCode::ParamCountMismatch
        );
        assert_eq!(
            StmtError::Compile(CompileError::Lock("busy".into())).code(),
            ErrorCode::LockFailed
        );
        assert_eq!(
            StmtError::Compile(CompileError::Syntax("near FROM".into())).code(),
            ErrorCode::CompileFailed
        );
        assert_eq!(StmtError::cursor("closed").code(), ErrorCode::CursorNotOpen);
    }

    #[test]
    fn test_to_condition() {
        let cond = StmtError::UnknownStatement(StatementId::new(9)).to_condition();
        assert!(cond.is_error());
        assert_eq!(cond.code, ErrorCode::UnknownStatement);
        assert_eq!(cond.message, "unknown prepared statement handler (9)");
    }
}
