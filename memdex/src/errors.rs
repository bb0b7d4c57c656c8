use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;

/// Error kinds for memdex operations.
///
/// Each kind describes a specific category of failure, enabling precise
/// error handling at the call site.
///
/// # Examples
///
/// ```rust,ignore
/// use memdex::errors::{MemdexError, ErrorKind, MemdexResult};
///
/// fn example() -> MemdexResult<()> {
///     Err(MemdexError::new("item not found", ErrorKind::NotFound))
/// }
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    /// A unique constraint was violated while adding or refreshing an object.
    UniqueConstraintViolation,
    /// A null key was produced for an index that does not allow nulls.
    NullKeyNotAllowed,
    /// The requested object was not found in the collection.
    NotFound,
    /// The operation is not valid in the current context (e.g. an
    /// unsupported plan or condition variant reached the executor).
    InvalidOperation,
    /// Two values of incompatible kinds were compared in a predicate.
    TypeMismatch,
    /// Error during predicate evaluation other than a type mismatch.
    FilterError,
    /// The predicate string could not be parsed.
    ParseError,
    /// Invalid configuration or data (bad index key, unknown attribute).
    ValidationError,
    /// Internal error (usually indicates a bug).
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::UniqueConstraintViolation => write!(f, "Unique constraint violation"),
            ErrorKind::NullKeyNotAllowed => write!(f, "Null key not allowed"),
            ErrorKind::NotFound => write!(f, "Not found"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
            ErrorKind::TypeMismatch => write!(f, "Type mismatch"),
            ErrorKind::FilterError => write!(f, "Filter error"),
            ErrorKind::ParseError => write!(f, "Parse error"),
            ErrorKind::ValidationError => write!(f, "Validation error"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Custom memdex error type.
///
/// `MemdexError` encapsulates the error message, kind, and optional cause.
/// It supports error chaining and captures a backtrace at construction for
/// debugging.
///
/// The `MemdexResult<T>` type alias is equivalent to `Result<T, MemdexError>`
/// and is used throughout the codebase for operations that can fail.
#[derive(Clone)]
pub struct MemdexError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<MemdexError>>,
    backtrace: Backtrace,
}

impl MemdexError {
    /// Creates a new `MemdexError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        MemdexError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: Backtrace::new(),
        }
    }

    /// Creates a new `MemdexError` with a cause error.
    ///
    /// This creates an error chain where the cause error is preserved for
    /// debugging.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: MemdexError) -> Self {
        MemdexError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: Backtrace::new(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&MemdexError> {
        self.cause.as_deref()
    }
}

impl Display for MemdexError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for MemdexError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // print error message with stack trace followed by cause
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => write!(f, "{}\n{:?}", self.message, self.backtrace),
        }
    }
}

impl Error for MemdexError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// A result type alias for memdex operations.
///
/// `MemdexResult<T>` is shorthand for `Result<T, MemdexError>`. All fallible
/// memdex operations return this type.
pub type MemdexResult<T> = Result<T, MemdexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_creates_error() {
        let error = MemdexError::new("item not found", ErrorKind::NotFound);
        assert_eq!(error.message(), "item not found");
        assert_eq!(error.kind(), &ErrorKind::NotFound);
        assert!(error.cause().is_none());
    }

    #[test]
    fn test_new_with_cause_creates_error_chain() {
        let cause = MemdexError::new("bad key", ErrorKind::ValidationError);
        let error =
            MemdexError::new_with_cause("index update failed", ErrorKind::InternalError, cause);
        assert_eq!(error.message(), "index update failed");
        assert_eq!(error.kind(), &ErrorKind::InternalError);
        assert!(error.cause().is_some());
        assert_eq!(
            error.cause().map(|c| c.kind().clone()),
            Some(ErrorKind::ValidationError)
        );
    }

    #[test]
    fn test_display_shows_message_only() {
        let error = MemdexError::new("parse failure at 3", ErrorKind::ParseError);
        assert_eq!(format!("{}", error), "parse failure at 3");
    }

    #[test]
    fn test_source_exposes_cause() {
        let cause = MemdexError::new("inner", ErrorKind::TypeMismatch);
        let error = MemdexError::new_with_cause("outer", ErrorKind::FilterError, cause);
        let source = Error::source(&error).expect("source should be present");
        assert_eq!(source.to_string(), "inner");
    }

    #[test]
    fn test_error_kind_display() {
        assert_eq!(
            ErrorKind::UniqueConstraintViolation.to_string(),
            "Unique constraint violation"
        );
        assert_eq!(ErrorKind::ParseError.to_string(), "Parse error");
    }
}
