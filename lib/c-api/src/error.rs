//! Utilities to record and read errors.
//!
//! Only one error is recorded per thread at a time. Errors are recorded
//! by Rust only, when an entry point fails, and are read by C through
//! [`hdfsGetLastError`], [`hdfsGetLastErrorLength`] and
//! [`hdfsGetLastErrorMessage`]. Reading does not clear the error, and
//! neither does a later successful call.
//!
//! Recording an error also sets `errno`, so C code written against the
//! original library keeps working.
//!
//! # Example
//!
//! ```c
//! hdfsFileInfo *info = hdfsGetPathInfo(fs, "/does/not/exist");
//! if (info == NULL) {
//!     int length = hdfsGetLastErrorLength();
//!     char *message = malloc(length);
//!     hdfsGetLastErrorMessage(message, length);
//!     fprintf(stderr, "%d: %s\n", hdfsGetLastError(), message);
//!     free(message);
//! }
//! ```

use hdfs_runtime::{Exception, ExceptionClass};
use libc::{c_char, c_int};
use std::cell::RefCell;
use std::ptr::{self, NonNull};
use std::slice;
use thiserror::Error;

/// `errno` value for failures that have no better match.
pub const EINTERNAL: c_int = 255;

/// The kind of the last failure on a thread.
#[allow(non_camel_case_types)]
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum hdfsErrorKind {
    /// The filesystem could not be reached.
    ConnectionFailure = 1,
    /// The handle was closed, disconnected, released or never valid.
    InvalidHandle = 2,
    /// The handle is in the wrong state, e.g. writing to a read-only file.
    InvalidState = 3,
    /// Reading, writing, seeking or flushing failed.
    IOFailure = 4,
    /// The path does not exist.
    NotFound = 5,
    /// The caller may not access the path.
    PermissionDenied = 6,
    /// The path is already taken.
    AlreadyExists = 7,
    /// An argument was malformed: a NULL pointer, bad flags, a negative size.
    InvalidArgument = 8,
    /// Anything else.
    InternalError = 255,
}

impl hdfsErrorKind {
    pub fn code(self) -> c_int {
        self as c_int
    }

    /// The `errno` value set alongside this kind.
    pub fn errno(self) -> c_int {
        match self {
            Self::ConnectionFailure => libc::ECONNREFUSED,
            Self::InvalidHandle => libc::EBADF,
            Self::InvalidState | Self::InvalidArgument => libc::EINVAL,
            Self::IOFailure => libc::EIO,
            Self::NotFound => libc::ENOENT,
            Self::PermissionDenied => libc::EACCES,
            Self::AlreadyExists => libc::EEXIST,
            Self::InternalError => EINTERNAL,
        }
    }
}

impl From<ExceptionClass> for hdfsErrorKind {
    fn from(class: ExceptionClass) -> Self {
        match class {
            ExceptionClass::Connect | ExceptionClass::UnknownHost => Self::ConnectionFailure,
            ExceptionClass::InvalidReference | ExceptionClass::ClassCast => Self::InvalidHandle,
            ExceptionClass::IllegalState | ExceptionClass::UnsupportedOperation => {
                Self::InvalidState
            }
            ExceptionClass::Io => Self::IOFailure,
            ExceptionClass::FileNotFound => Self::NotFound,
            ExceptionClass::AccessControl => Self::PermissionDenied,
            ExceptionClass::FileAlreadyExists => Self::AlreadyExists,
            ExceptionClass::IllegalArgument => Self::InvalidArgument,
            ExceptionClass::Internal => Self::InternalError,
        }
    }
}

/// A failed bridge call, as recorded for the calling thread.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
#[error("{message}")]
pub struct BridgeError {
    pub kind: hdfsErrorKind,
    pub message: String,
}

impl BridgeError {
    pub fn new(kind: hdfsErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_handle(message: impl Into<String>) -> Self {
        Self::new(hdfsErrorKind::InvalidHandle, message)
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(hdfsErrorKind::InvalidState, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(hdfsErrorKind::InvalidArgument, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(hdfsErrorKind::InternalError, message)
    }
}

impl From<Exception> for BridgeError {
    fn from(exception: Exception) -> Self {
        Self::new(exception.class().into(), exception.to_string())
    }
}

thread_local! {
    static LAST_ERROR: RefCell<Option<BridgeError>> = const { RefCell::new(None) };
}

/// Record `err` as the calling thread's last error and set `errno`.
pub fn update_last_error(err: impl Into<BridgeError>) {
    let err = err.into();
    set_errno(err.kind.errno());
    LAST_ERROR.with(|prev| {
        *prev.borrow_mut() = Some(err);
    });
}

/// The calling thread's last error, if any.
pub fn last_error() -> Option<BridgeError> {
    LAST_ERROR.with(|prev| prev.borrow().clone())
}

/// Retrieve the most recent error, clearing it in the process.
pub fn take_last_error() -> Option<BridgeError> {
    LAST_ERROR.with(|prev| prev.borrow_mut().take())
}

cfg_if::cfg_if! {
    if #[cfg(any(target_os = "linux", target_os = "android", target_os = "emscripten"))] {
        fn set_errno(value: c_int) {
            // SAFETY: `__errno_location` always returns the calling thread's errno slot.
            unsafe { *libc::__errno_location() = value };
        }
    } else if #[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))] {
        fn set_errno(value: c_int) {
            // SAFETY: `__error` always returns the calling thread's errno slot.
            unsafe { *libc::__error() = value };
        }
    } else {
        fn set_errno(_value: c_int) {}
    }
}

/// The [`hdfsErrorKind`] code of the last failure on this thread, 0 if
/// there was none.
#[unsafe(no_mangle)]
pub extern "C" fn hdfsGetLastError() -> c_int {
    LAST_ERROR.with(|prev| match *prev.borrow() {
        Some(ref err) => err.kind.code(),
        None => 0,
    })
}

/// Gets the length in bytes of the last error message if any, zero
/// otherwise. This includes the NUL terminator byte.
///
/// This can be used to dynamically allocate a buffer with the correct
/// number of bytes needed to store the message.
#[unsafe(no_mangle)]
pub extern "C" fn hdfsGetLastErrorLength() -> c_int {
    LAST_ERROR.with(|prev| match *prev.borrow() {
        Some(ref err) => c_int::try_from(err.message.len() + 1).unwrap_or(c_int::MAX),
        None => 0,
    })
}

/// Copies the last error message into `buffer`, which holds `length`
/// bytes.
///
/// Returns the number of bytes written including the trailing NUL, 0 if
/// there is no error, or -1 if `buffer` is NULL or too small. The error
/// stays recorded.
///
/// # Safety
///
/// `buffer` must be NULL or valid for writes of `length` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hdfsGetLastErrorMessage(
    buffer: Option<NonNull<c_char>>,
    length: c_int,
) -> c_int {
    let Some(buffer) = buffer else {
        return -1;
    };
    let Some(error_message) = last_error().map(|err| err.message) else {
        return 0;
    };
    let Ok(length) = usize::try_from(length) else {
        return -1;
    };
    if error_message.len() >= length {
        // buffer is too small to hold the error message
        return -1;
    }

    // SAFETY: the caller guarantees `length` writable bytes.
    let buffer = unsafe { slice::from_raw_parts_mut(buffer.cast::<u8>().as_ptr(), length) };
    // SAFETY: `error_message.len() < length`, both regions are valid and distinct.
    unsafe {
        ptr::copy_nonoverlapping(
            error_message.as_ptr(),
            buffer.as_mut_ptr(),
            error_message.len(),
        );
    }
    buffer[error_message.len()] = 0;

    c_int::try_from(error_message.len() + 1).unwrap_or(c_int::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::ffi::CStr;

    #[test]
    fn every_exception_class_has_one_kind() {
        let cases = [
            (ExceptionClass::FileNotFound, hdfsErrorKind::NotFound, libc::ENOENT),
            (ExceptionClass::AccessControl, hdfsErrorKind::PermissionDenied, libc::EACCES),
            (ExceptionClass::FileAlreadyExists, hdfsErrorKind::AlreadyExists, libc::EEXIST),
            (ExceptionClass::Io, hdfsErrorKind::IOFailure, libc::EIO),
            (ExceptionClass::Connect, hdfsErrorKind::ConnectionFailure, libc::ECONNREFUSED),
            (ExceptionClass::UnknownHost, hdfsErrorKind::ConnectionFailure, libc::ECONNREFUSED),
            (ExceptionClass::IllegalArgument, hdfsErrorKind::InvalidArgument, libc::EINVAL),
            (ExceptionClass::IllegalState, hdfsErrorKind::InvalidState, libc::EINVAL),
            (ExceptionClass::UnsupportedOperation, hdfsErrorKind::InvalidState, libc::EINVAL),
            (ExceptionClass::InvalidReference, hdfsErrorKind::InvalidHandle, libc::EBADF),
            (ExceptionClass::ClassCast, hdfsErrorKind::InvalidHandle, libc::EBADF),
            (ExceptionClass::Internal, hdfsErrorKind::InternalError, EINTERNAL),
        ];
        for (class, kind, errno) in cases {
            let err = BridgeError::from(Exception::new(class, "boom"));
            assert_eq!(err.kind, kind, "{class}");
            assert_eq!(err.kind.errno(), errno, "{class}");
        }
    }

    #[test]
    fn messages_are_read_without_clearing() {
        assert_eq!(hdfsGetLastError(), 0);
        assert_eq!(hdfsGetLastErrorLength(), 0);

        update_last_error(Exception::file_not_found("/x"));
        let length = hdfsGetLastErrorLength();
        assert_eq!(hdfsGetLastError(), hdfsErrorKind::NotFound.code());

        let mut buffer = vec![0 as c_char; length as usize];
        let written = unsafe { hdfsGetLastErrorMessage(NonNull::new(buffer.as_mut_ptr()), length) };
        assert_eq!(written, length);
        let message = unsafe { CStr::from_ptr(buffer.as_ptr()) };
        assert_eq!(message.to_str().unwrap(), "FileNotFoundException: /x does not exist");

        // Too small, and NULL.
        assert_eq!(
            unsafe { hdfsGetLastErrorMessage(NonNull::new(buffer.as_mut_ptr()), length - 1) },
            -1
        );
        assert_eq!(unsafe { hdfsGetLastErrorMessage(None, length) }, -1);

        assert_eq!(hdfsGetLastError(), hdfsErrorKind::NotFound.code());
        assert_eq!(take_last_error().unwrap().kind, hdfsErrorKind::NotFound);
        assert_eq!(hdfsGetLastError(), 0);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn errno_follows_the_last_error() {
        update_last_error(BridgeError::invalid_handle("closed"));
        assert_eq!(std::io::Error::last_os_error().raw_os_error(), Some(libc::EBADF));
    }
}
