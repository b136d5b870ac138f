//! Exceptions raised by the runtime.
//!
//! Every fallible runtime call returns `Result<T, Exception>`. The class
//! of an exception is what callers branch on; the message is for humans.

use std::fmt;
use std::io;
use thiserror::Error;

/// The class of a runtime exception.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ExceptionClass {
    /// The path does not exist.
    FileNotFound,
    /// The caller may not access the path.
    AccessControl,
    /// The path is already taken.
    FileAlreadyExists,
    /// The filesystem failed to read, write or flush.
    Io,
    /// The remote filesystem could not be reached.
    Connect,
    /// The authority could not be resolved.
    UnknownHost,
    /// An argument was malformed.
    IllegalArgument,
    /// The object is not in a state that allows the call.
    IllegalState,
    /// The object does not support the call at all.
    UnsupportedOperation,
    /// The reference was released, never existed or belongs to another thread.
    InvalidReference,
    /// The reference points to an object of another kind.
    ClassCast,
    /// Anything else.
    Internal,
}

impl ExceptionClass {
    /// Short name, used in messages and logs.
    pub const fn name(self) -> &'static str {
        match self {
            Self::FileNotFound => "FileNotFoundException",
            Self::AccessControl => "AccessControlException",
            Self::FileAlreadyExists => "FileAlreadyExistsException",
            Self::Io => "IOException",
            Self::Connect => "ConnectException",
            Self::UnknownHost => "UnknownHostException",
            Self::IllegalArgument => "IllegalArgumentException",
            Self::IllegalState => "IllegalStateException",
            Self::UnsupportedOperation => "UnsupportedOperationException",
            Self::InvalidReference => "InvalidReferenceException",
            Self::ClassCast => "ClassCastException",
            Self::Internal => "InternalError",
        }
    }
}

impl fmt::Display for ExceptionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A thrown exception.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
#[error("{class}: {message}")]
pub struct Exception {
    class: ExceptionClass,
    message: String,
}

pub type Result<T, E = Exception> = std::result::Result<T, E>;

impl Exception {
    pub fn new(class: ExceptionClass, message: impl Into<String>) -> Self {
        Self {
            class,
            message: message.into(),
        }
    }

    pub fn class(&self) -> ExceptionClass {
        self.class
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn file_not_found(path: impl fmt::Display) -> Self {
        Self::new(ExceptionClass::FileNotFound, format!("{path} does not exist"))
    }

    pub fn already_exists(path: impl fmt::Display) -> Self {
        Self::new(ExceptionClass::FileAlreadyExists, format!("{path} already exists"))
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ExceptionClass::Io, message)
    }

    pub fn illegal_argument(message: impl Into<String>) -> Self {
        Self::new(ExceptionClass::IllegalArgument, message)
    }

    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::new(ExceptionClass::IllegalState, message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(ExceptionClass::UnsupportedOperation, message)
    }

    pub fn invalid_reference(message: impl Into<String>) -> Self {
        Self::new(ExceptionClass::InvalidReference, message)
    }

    pub fn class_cast(expected: &str, found: &str) -> Self {
        Self::new(
            ExceptionClass::ClassCast,
            format!("{found} cannot be cast to {expected}"),
        )
    }

    pub fn connect(authority: &str) -> Self {
        Self::new(
            ExceptionClass::Connect,
            format!("call to {authority} failed on connection exception: connection refused"),
        )
    }

    /// Attach the path an `io::Error` happened on.
    pub fn from_io(error: io::Error, path: impl fmt::Display) -> Self {
        let class = Self::from(error.kind()).class;
        Self::new(class, format!("{path}: {error}"))
    }
}

impl From<io::ErrorKind> for Exception {
    fn from(kind: io::ErrorKind) -> Self {
        let class = match kind {
            io::ErrorKind::NotFound => ExceptionClass::FileNotFound,
            io::ErrorKind::PermissionDenied => ExceptionClass::AccessControl,
            io::ErrorKind::AlreadyExists => ExceptionClass::FileAlreadyExists,
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::AddrNotAvailable => ExceptionClass::Connect,
            io::ErrorKind::InvalidInput => ExceptionClass::IllegalArgument,
            io::ErrorKind::Unsupported => ExceptionClass::UnsupportedOperation,
            _ => ExceptionClass::Io,
        };
        Self::new(class, kind.to_string())
    }
}

impl From<io::Error> for Exception {
    fn from(error: io::Error) -> Self {
        let class = Self::from(error.kind()).class;
        Self::new(class, error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn io_errors_keep_their_meaning() {
        let not_found = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert_eq!(Exception::from(not_found).class(), ExceptionClass::FileNotFound);

        let denied = Exception::from_io(io::ErrorKind::PermissionDenied.into(), "/secret");
        assert_eq!(denied.class(), ExceptionClass::AccessControl);
        assert!(denied.message().starts_with("/secret: "));

        let other = io::Error::other("disk on fire");
        assert_eq!(Exception::from(other).class(), ExceptionClass::Io);
    }

    #[test]
    fn display_names_the_class() {
        let e = Exception::file_not_found("/a/b");
        assert_eq!(e.to_string(), "FileNotFoundException: /a/b does not exist");
    }
}
