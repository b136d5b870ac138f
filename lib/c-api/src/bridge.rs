//! The one path every entry point takes into the runtime.

use crate::error::BridgeError;
use crate::types::hdfsFS;
use hdfs_runtime::{Env, Reference, Runtime};
use libc::c_char;
use std::any::Any;
use std::ffi::CStr;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

/// Locals a single call is expected to create.
const LOCAL_FRAME_CAPACITY: usize = 16;

/// Run `f` against the global runtime inside a fresh local frame.
///
/// Every local created by `f` is released when it returns. Exceptions
/// become [`BridgeError`]s and panics become internal errors; failures
/// are logged under `op` but not recorded, that is the caller's `c_try!`.
pub(crate) fn call<T>(
    op: &'static str,
    f: impl FnOnce(&Env<'_>) -> Result<T, BridgeError>,
) -> Result<T, BridgeError> {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let env = Runtime::global().attach();
        env.with_local_frame(LOCAL_FRAME_CAPACITY, |env| Ok(f(env)))
            .map_err(BridgeError::from)
            .and_then(|result| result)
    }))
    .unwrap_or_else(|payload| {
        Err(BridgeError::internal(format!(
            "{op} panicked: {}",
            panic_message(payload.as_ref())
        )))
    });
    if let Err(err) = &result {
        tracing::debug!(op, kind = ?err.kind, error = %err, "call failed");
    }
    result
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic payload"
    }
}

/// The global reference behind a filesystem handle.
pub(crate) fn fs_ref(fs: hdfsFS) -> Result<Reference, BridgeError> {
    match Reference::from_raw(fs) {
        Some(reference) if reference.is_global() => Ok(reference),
        Some(_) => Err(BridgeError::invalid_handle("hdfsFS is not a connected filesystem")),
        None => Err(BridgeError::invalid_handle("hdfsFS is NULL")),
    }
}

/// Borrow a path argument.
///
/// # Safety
///
/// `path` must be NULL or a NUL-terminated string that outlives the call.
pub(crate) unsafe fn path_arg<'a>(path: *const c_char, what: &str) -> Result<&'a Path, BridgeError> {
    if path.is_null() {
        return Err(BridgeError::invalid_argument(format!("{what} is NULL")));
    }
    // SAFETY: non-null and NUL-terminated per the caller's contract.
    let path = unsafe { CStr::from_ptr(path) };
    path.to_str()
        .map(Path::new)
        .map_err(|_| BridgeError::invalid_argument(format!("{what} is not valid UTF-8")))
}
