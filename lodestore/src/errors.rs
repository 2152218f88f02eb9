use backtrace::Backtrace;
use serde::{de, ser};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;

use crate::common::{atomic, Atomic};

/// Error kinds for datastore operations.
///
/// Every failure surfaced by the engine carries one of these kinds so that callers can
/// react to the category of failure (a uniqueness conflict, a malformed query, a broken
/// datafile) without parsing messages.
///
/// # Examples
///
/// ```rust,ignore
/// use lodestore::errors::{ErrorKind, LodeError, LodeResult};
///
/// fn example() -> LodeResult<()> {
///     Err(LodeError::new("Unknown operator $foo", ErrorKind::BadQuery))
/// }
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    /// A unique index already holds the key for another document.
    UniqueViolation {
        /// Canonical name of the index that rejected the key
        field_name: String,
        /// Printable form of the conflicting key
        key: String,
    },
    /// A document breaks the naming rules or tries to change its `_id`
    DocumentValidation,
    /// Malformed query or projection
    BadQuery,
    /// Malformed update expression or unsupported update target
    BadUpdate,
    /// Index options are invalid
    InvalidIndexSpec,
    /// The index does not exist
    IndexNotFound,
    /// Replaying the datafile failed
    LoadFailure,

    /// Generic IO error
    IOError,
    /// The file was not found
    FileNotFound,
    /// Permission denied for file operation
    PermissionDenied,
    /// Error encoding or decoding a log line
    EncodingError,

    /// The datastore worker has been shut down
    StoreClosed,
    /// Invalid builder or configuration value
    InvalidConfiguration,
    /// Error in event processing
    EventError,
    /// Internal error (usually indicates a bug)
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::UniqueViolation { field_name, key } => {
                write!(f, "Unique violation on '{}' for key {}", field_name, key)
            }
            ErrorKind::DocumentValidation => write!(f, "Document validation error"),
            ErrorKind::BadQuery => write!(f, "Bad query"),
            ErrorKind::BadUpdate => write!(f, "Bad update"),
            ErrorKind::InvalidIndexSpec => write!(f, "Invalid index specification"),
            ErrorKind::IndexNotFound => write!(f, "Index not found"),
            ErrorKind::LoadFailure => write!(f, "Load failure"),
            ErrorKind::IOError => write!(f, "IO error"),
            ErrorKind::FileNotFound => write!(f, "File not found"),
            ErrorKind::PermissionDenied => write!(f, "Permission denied"),
            ErrorKind::EncodingError => write!(f, "Encoding error"),
            ErrorKind::StoreClosed => write!(f, "Store closed"),
            ErrorKind::InvalidConfiguration => write!(f, "Invalid configuration"),
            ErrorKind::EventError => write!(f, "Event error"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Custom datastore error type.
///
/// `LodeError` carries a message, an [ErrorKind], an optional cause and the backtrace
/// captured where it was raised.
///
/// # Examples
///
/// ```rust,ignore
/// use lodestore::errors::{ErrorKind, LodeError};
///
/// let cause = LodeError::new("Unique violation", ErrorKind::DocumentValidation);
/// let err = LodeError::new_with_cause("Load failed", ErrorKind::LoadFailure, cause);
/// assert!(err.cause().is_some());
/// ```
#[derive(Clone)]
pub struct LodeError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<LodeError>>,
    backtrace: Atomic<Backtrace>,
}

impl LodeError {
    /// Creates a new `LodeError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        LodeError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: atomic(Backtrace::new_unresolved()),
        }
    }

    /// Creates a new `LodeError` wrapping an underlying cause.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: LodeError) -> Self {
        LodeError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: atomic(Backtrace::new_unresolved()),
        }
    }

    /// Shorthand for a [ErrorKind::UniqueViolation] error.
    pub fn unique_violation(field_name: &str, key: &str) -> Self {
        LodeError::new(
            &format!(
                "Can't insert key {}, it violates the unique constraint on '{}'",
                key, field_name
            ),
            ErrorKind::UniqueViolation {
                field_name: field_name.to_string(),
                key: key.to_string(),
            },
        )
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&LodeError> {
        self.cause.as_deref()
    }

    /// Walks the cause chain and returns the innermost error.
    pub fn root_cause(&self) -> &LodeError {
        let mut current = self;
        while let Some(cause) = current.cause() {
            current = cause;
        }
        current
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self.error_kind, ErrorKind::UniqueViolation { .. })
    }
}

impl Display for LodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for LodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => {
                let mut backtrace = self.backtrace.write();
                backtrace.resolve();
                write!(f, "{}\n{:?}", self.message, backtrace)
            }
        }
    }
}

impl Error for LodeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// A result type alias for datastore operations.
pub type LodeResult<T> = Result<T, LodeError>;

impl de::Error for LodeError {
    fn custom<T: Display>(msg: T) -> Self {
        LodeError::new(&msg.to_string(), ErrorKind::EncodingError)
    }
}

impl ser::Error for LodeError {
    fn custom<T: Display>(msg: T) -> Self {
        LodeError::new(&msg.to_string(), ErrorKind::EncodingError)
    }
}

impl From<std::io::Error> for LodeError {
    fn from(err: std::io::Error) -> Self {
        let error_kind = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::FileNotFound,
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            _ => ErrorKind::IOError,
        };
        LodeError::new(&format!("IO error: {}", err), error_kind)
    }
}

impl From<serde_json::Error> for LodeError {
    fn from(err: serde_json::Error) -> Self {
        LodeError::new(&format!("JSON error: {}", err), ErrorKind::EncodingError)
    }
}

impl From<regex::Error> for LodeError {
    fn from(err: regex::Error) -> Self {
        LodeError::new(&format!("Invalid regular expression: {}", err), ErrorKind::BadQuery)
    }
}

impl From<std::string::FromUtf8Error> for LodeError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        LodeError::new(
            &format!("UTF-8 encoding error: {}", err),
            ErrorKind::EncodingError,
        )
    }
}

impl From<String> for LodeError {
    fn from(msg: String) -> Self {
        LodeError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for LodeError {
    fn from(msg: &str) -> Self {
        LodeError::new(msg, ErrorKind::InternalError)
    }
}
