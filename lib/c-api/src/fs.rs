//! Connections and namespace operations.

use crate::bridge::{self, fs_ref, path_arg};
use crate::c_try;
use crate::error::{BridgeError, hdfsErrorKind};
use crate::types::{hdfsFS, tOffset, tPort};
use hdfs_runtime::Env;
use hdfs_runtime::fs::{FileSystem, Target};
use libc::{c_char, c_int, c_short, size_t};
use std::ffi::CStr;
use std::ptr;
use std::sync::Arc;

/// Host name meaning "the configured default filesystem".
const DEFAULT_HOST: &str = "default";

/// # Safety
///
/// `host` must be NULL or a NUL-terminated string.
unsafe fn target(host: *const c_char, port: tPort) -> Result<Target, BridgeError> {
    if host.is_null() {
        return Ok(Target::Local);
    }
    // SAFETY: non-null, NUL-terminated per the contract above.
    let host = unsafe { CStr::from_ptr(host) }
        .to_str()
        .map_err(|_| BridgeError::invalid_argument("host is not valid UTF-8"))?;
    match (host, port) {
        (DEFAULT_HOST, 0) => Ok(Target::Default),
        (DEFAULT_HOST, port) => Err(BridgeError::new(
            hdfsErrorKind::ConnectionFailure,
            format!("the default filesystem takes port 0, not {port}"),
        )),
        (host, port) => Ok(Target::Remote {
            host: host.to_string(),
            port,
        }),
    }
}

fn file_system(env: &Env<'_>, fs: hdfsFS) -> Result<Arc<dyn FileSystem>, BridgeError> {
    Ok(env.file_system(fs_ref(fs)?)?)
}

fn offset(value: u64) -> Result<tOffset, BridgeError> {
    tOffset::try_from(value).map_err(|_| BridgeError::internal(format!("{value} overflows tOffset")))
}

/// Connect to a filesystem.
///
/// `host` is NULL for the local filesystem, `"default"` (with `port` 0)
/// for the configured `fs.default.name`, or the name of a cluster.
/// Returns NULL on error.
///
/// # Safety
///
/// `host` must be NULL or a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hdfsConnect(host: *const c_char, port: tPort) -> hdfsFS {
    let fs = c_try!(bridge::call("hdfsConnect", |env| {
        // SAFETY: forwarded from the caller.
        let target = unsafe { target(host, port) }?;
        let local = env.get_file_system(&target)?;
        let global = env.promote(local)?;
        tracing::debug!(%target, "connected");
        Ok(global)
    }); otherwise ptr::null_mut());
    fs.into_raw()
}

/// Disconnect. The handle is invalid afterwards, whatever is returned.
#[unsafe(no_mangle)]
pub extern "C" fn hdfsDisconnect(fs: hdfsFS) -> c_int {
    c_try!(bridge::call("hdfsDisconnect", |env| {
        let reference = fs_ref(fs)?;
        let closed = env.file_system(reference)?.close();
        env.delete_global(reference)?;
        Ok(closed?)
    }); otherwise -1);
    0
}

/// Copy a file or directory tree, possibly between filesystems.
///
/// # Safety
///
/// `src` and `dst` must be NULL or NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hdfsCopy(
    srcFS: hdfsFS,
    src: *const c_char,
    dstFS: hdfsFS,
    dst: *const c_char,
) -> c_int {
    // SAFETY: forwarded from the caller.
    unsafe { copy("hdfsCopy", srcFS, src, dstFS, dst, false) }
}

/// Copy, then delete the source.
///
/// # Safety
///
/// `src` and `dst` must be NULL or NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hdfsMove(
    srcFS: hdfsFS,
    src: *const c_char,
    dstFS: hdfsFS,
    dst: *const c_char,
) -> c_int {
    // SAFETY: forwarded from the caller.
    unsafe { copy("hdfsMove", srcFS, src, dstFS, dst, true) }
}

unsafe fn copy(
    op: &'static str,
    src_fs: hdfsFS,
    src: *const c_char,
    dst_fs: hdfsFS,
    dst: *const c_char,
    delete_source: bool,
) -> c_int {
    c_try!(bridge::call(op, |env| {
        let src_fs = file_system(env, src_fs)?;
        let dst_fs = file_system(env, dst_fs)?;
        // SAFETY: forwarded from the caller.
        let (src, dst) = unsafe { (path_arg(src, "src")?, path_arg(dst, "dst")?) };
        let conf = env.runtime().configuration();
        Ok(hdfs_runtime::fs::copy(
            src_fs.as_ref(),
            src,
            dst_fs.as_ref(),
            dst,
            delete_source,
            &conf,
        )?)
    }); otherwise -1);
    0
}

/// Run a one-path namespace operation, returning 0 or -1.
unsafe fn with_path(
    op: &'static str,
    fs: hdfsFS,
    path: *const c_char,
    f: impl FnOnce(&dyn FileSystem, &std::path::Path) -> Result<(), BridgeError>,
) -> c_int {
    c_try!(bridge::call(op, |env| {
        let fs = file_system(env, fs)?;
        // SAFETY: forwarded from the caller.
        let path = unsafe { path_arg(path, "path")? };
        f(fs.as_ref(), path)
    }); otherwise -1);
    0
}

/// Delete a file, or a directory and everything below it.
///
/// # Safety
///
/// `path` must be NULL or a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hdfsDelete(fs: hdfsFS, path: *const c_char) -> c_int {
    // SAFETY: forwarded from the caller.
    unsafe { with_path("hdfsDelete", fs, path, |fs, path| Ok(fs.delete(path)?)) }
}

/// Rename within one filesystem. The destination must not exist.
///
/// # Safety
///
/// `oldPath` and `newPath` must be NULL or NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hdfsRename(
    fs: hdfsFS,
    oldPath: *const c_char,
    newPath: *const c_char,
) -> c_int {
    c_try!(bridge::call("hdfsRename", |env| {
        let fs = file_system(env, fs)?;
        // SAFETY: forwarded from the caller.
        let (from, to) = unsafe { (path_arg(oldPath, "oldPath")?, path_arg(newPath, "newPath")?) };
        Ok(fs.rename(from, to)?)
    }); otherwise -1);
    0
}

/// 0 if `path` exists, -1 (with `NotFound`) if it does not.
///
/// # Safety
///
/// `path` must be NULL or a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hdfsExists(fs: hdfsFS, path: *const c_char) -> c_int {
    // SAFETY: forwarded from the caller.
    unsafe {
        with_path("hdfsExists", fs, path, |fs, path| {
            if fs.exists(path)? {
                Ok(())
            } else {
                Err(BridgeError::new(
                    hdfsErrorKind::NotFound,
                    format!("{} does not exist", path.display()),
                ))
            }
        })
    }
}

/// Take an advisory lock, shared if `shared` is non-zero.
///
/// # Safety
///
/// `path` must be NULL or a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hdfsLock(fs: hdfsFS, path: *const c_char, shared: c_int) -> c_int {
    // SAFETY: forwarded from the caller.
    unsafe { with_path("hdfsLock", fs, path, |fs, path| Ok(fs.lock(path, shared != 0)?)) }
}

/// Release one holder of the lock on `path`.
///
/// # Safety
///
/// `path` must be NULL or a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hdfsReleaseLock(fs: hdfsFS, path: *const c_char) -> c_int {
    // SAFETY: forwarded from the caller.
    unsafe { with_path("hdfsReleaseLock", fs, path, |fs, path| Ok(fs.release(path)?)) }
}

/// Copy the working directory into `buffer`. Returns `buffer`, or NULL
/// if it is NULL or shorter than the path and its NUL.
///
/// # Safety
///
/// `buffer` must be NULL or valid for writes of `bufferSize` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hdfsGetWorkingDirectory(
    fs: hdfsFS,
    buffer: *mut c_char,
    bufferSize: size_t,
) -> *mut c_char {
    c_try!(bridge::call("hdfsGetWorkingDirectory", |env| {
        if buffer.is_null() {
            return Err(BridgeError::invalid_argument("buffer is NULL"));
        }
        let cwd = file_system(env, fs)?.working_directory();
        let cwd = cwd.to_string_lossy();
        if cwd.len() >= bufferSize {
            return Err(BridgeError::invalid_argument(format!(
                "working directory needs {} bytes, the buffer holds {bufferSize}",
                cwd.len() + 1
            )));
        }
        // SAFETY: `buffer` holds `bufferSize > cwd.len()` bytes.
        unsafe {
            ptr::copy_nonoverlapping(cwd.as_ptr(), buffer.cast::<u8>(), cwd.len());
            *buffer.add(cwd.len()) = 0;
        }
        Ok(())
    }); otherwise ptr::null_mut());
    buffer
}

/// Relative paths resolve against `path` from now on.
///
/// # Safety
///
/// `path` must be NULL or a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hdfsSetWorkingDirectory(fs: hdfsFS, path: *const c_char) -> c_int {
    // SAFETY: forwarded from the caller.
    unsafe {
        with_path("hdfsSetWorkingDirectory", fs, path, |fs, path| {
            Ok(fs.set_working_directory(path)?)
        })
    }
}

/// `mkdir -p`.
///
/// # Safety
///
/// `path` must be NULL or a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hdfsCreateDirectory(fs: hdfsFS, path: *const c_char) -> c_int {
    // SAFETY: forwarded from the caller.
    unsafe { with_path("hdfsCreateDirectory", fs, path, |fs, path| Ok(fs.create_dir_all(path)?)) }
}

/// Change the replica count of a file.
///
/// # Safety
///
/// `path` must be NULL or a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hdfsSetReplication(
    fs: hdfsFS,
    path: *const c_char,
    replication: c_short,
) -> c_int {
    // SAFETY: forwarded from the caller.
    unsafe {
        with_path("hdfsSetReplication", fs, path, |fs, path| {
            let replication = u16::try_from(replication)
                .ok()
                .filter(|r| *r > 0)
                .ok_or_else(|| {
                    BridgeError::invalid_argument(format!("replication {replication} is not positive"))
                })?;
            Ok(fs.set_replication(path, replication)?)
        })
    }
}

/// Block size of new files when none is given, -1 on error.
#[unsafe(no_mangle)]
pub extern "C" fn hdfsGetDefaultBlockSize(fs: hdfsFS) -> tOffset {
    c_try!(bridge::call("hdfsGetDefaultBlockSize", |env| {
        offset(file_system(env, fs)?.default_block_size())
    }); otherwise -1)
}

/// Raw capacity in bytes, -1 on error.
#[unsafe(no_mangle)]
pub extern "C" fn hdfsGetCapacity(fs: hdfsFS) -> tOffset {
    c_try!(bridge::call("hdfsGetCapacity", |env| {
        offset(file_system(env, fs)?.capacity()?)
    }); otherwise -1)
}

/// Raw bytes used, replicas included, -1 on error.
#[unsafe(no_mangle)]
pub extern "C" fn hdfsGetUsed(fs: hdfsFS) -> tOffset {
    c_try!(bridge::call("hdfsGetUsed", |env| {
        offset(file_system(env, fs)?.used()?)
    }); otherwise -1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::last_error;
    use hdfs_runtime::Runtime;
    use hdfs_runtime::fs::MemoryCluster;
    use pretty_assertions::assert_eq;
    use std::ffi::CString;

    #[test]
    fn connect_targets() {
        assert_eq!(unsafe { target(ptr::null(), 1234) }.unwrap(), Target::Local);
        assert_eq!(unsafe { target(c"default".as_ptr(), 0) }.unwrap(), Target::Default);
        assert_eq!(
            unsafe { target(c"default".as_ptr(), 8020) }.unwrap_err().kind,
            hdfsErrorKind::ConnectionFailure
        );
        assert_eq!(
            unsafe { target(c"nn".as_ptr(), 8020) }.unwrap(),
            Target::Remote {
                host: "nn".into(),
                port: 8020
            }
        );
    }

    #[test]
    fn disconnected_handles_are_invalid() {
        let fs = unsafe { hdfsConnect(ptr::null(), 0) };
        assert!(!fs.is_null());
        assert_eq!(hdfsDisconnect(fs), 0);
        assert_eq!(hdfsGetDefaultBlockSize(fs), -1);
        assert_eq!(last_error().unwrap().kind, hdfsErrorKind::InvalidHandle);
        assert_eq!(hdfsDisconnect(fs), -1);
    }

    #[test]
    fn unreachable_clusters_refuse_connections() {
        assert!(unsafe { hdfsConnect(c"no-such-namenode".as_ptr(), 1) }.is_null());
        assert_eq!(last_error().unwrap().kind, hdfsErrorKind::ConnectionFailure);
    }

    #[test]
    fn working_directory_round_trip() {
        let cluster = MemoryCluster::builder("fs-unit:8020").build();
        Runtime::global().register_file_system("fs-unit:8020", Arc::new(cluster));
        let fs = unsafe { hdfsConnect(c"fs-unit".as_ptr(), 8020) };
        assert!(!fs.is_null());

        let mut buffer = [0 as c_char; 64];
        let cwd = unsafe { hdfsGetWorkingDirectory(fs, buffer.as_mut_ptr(), buffer.len()) };
        assert_eq!(unsafe { CStr::from_ptr(cwd) }.to_str().unwrap(), "/");

        let dir = CString::new("/user/someone").unwrap();
        assert_eq!(unsafe { hdfsCreateDirectory(fs, dir.as_ptr()) }, 0);
        assert_eq!(unsafe { hdfsSetWorkingDirectory(fs, dir.as_ptr()) }, 0);
        let cwd = unsafe { hdfsGetWorkingDirectory(fs, buffer.as_mut_ptr(), buffer.len()) };
        assert_eq!(unsafe { CStr::from_ptr(cwd) }.to_str().unwrap(), "/user/someone");

        assert!(unsafe { hdfsGetWorkingDirectory(fs, buffer.as_mut_ptr(), 5) }.is_null());
        assert_eq!(last_error().unwrap().kind, hdfsErrorKind::InvalidArgument);

        assert_eq!(unsafe { hdfsExists(fs, c"/user".as_ptr()) }, 0);
        assert_eq!(unsafe { hdfsExists(fs, c"missing".as_ptr()) }, -1);
        assert_eq!(last_error().unwrap().kind, hdfsErrorKind::NotFound);

        assert_eq!(hdfsGetDefaultBlockSize(fs), 64 * 1024 * 1024);
        assert_eq!(hdfsGetUsed(fs), 0);
        assert!(hdfsGetCapacity(fs) > 0);
        assert_eq!(hdfsDisconnect(fs), 0);
    }
}
