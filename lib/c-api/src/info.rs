//! Metadata copied out of the runtime into caller-owned C structures.
//!
//! Everything returned here is allocated by Rust and must go back through
//! the matching free function: [`hdfsFreeFileInfo`] for file info arrays,
//! [`hdfsFreeHosts`] for host listings.

use crate::bridge::{self, fs_ref, path_arg};
use crate::c_try;
use crate::error::BridgeError;
use crate::types::{hdfsFS, hdfsFileInfo, tObjectKind, tOffset, tTime};
use hdfs_runtime::fs::{BlockLocation, FileKind, FileStatus};
use libc::{c_char, c_int};
use std::ffi::CString;
use std::ptr;

fn c_string(s: &str) -> Result<CString, BridgeError> {
    CString::new(s).map_err(|_| BridgeError::internal(format!("{s:?} contains a NUL byte")))
}

impl hdfsFileInfo {
    fn from_status(status: &FileStatus) -> Result<Self, BridgeError> {
        let name = c_string(&status.path.to_string_lossy())?;
        Ok(Self {
            mKind: match status.kind {
                FileKind::File => tObjectKind::kObjectKindFile,
                FileKind::Directory => tObjectKind::kObjectKindDirectory,
            },
            mName: name.into_raw(),
            mCreationTime: status.modification_time as tTime,
            mSize: tOffset::try_from(status.len).unwrap_or(tOffset::MAX),
            replicaCount: c_int::from(status.replication),
        })
    }
}

impl Drop for hdfsFileInfo {
    fn drop(&mut self) {
        if !self.mName.is_null() {
            // SAFETY: `mName` came from `CString::into_raw` in `from_status`.
            drop(unsafe { CString::from_raw(self.mName) });
            self.mName = ptr::null_mut();
        }
    }
}

/// Copy `statuses` into one heap array; the caller frees it with
/// [`hdfsFreeFileInfo`] and `statuses.len()`.
fn file_info_array(statuses: &[FileStatus]) -> Result<*mut hdfsFileInfo, BridgeError> {
    // A half-built array drops its names on the way out.
    let infos = statuses
        .iter()
        .map(hdfsFileInfo::from_status)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Box::into_raw(infos.into_boxed_slice()).cast::<hdfsFileInfo>())
}

/// Metadata of one path, as an array of one. NULL on error.
///
/// # Safety
///
/// `path` must be NULL or a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hdfsGetPathInfo(fs: hdfsFS, path: *const c_char) -> *mut hdfsFileInfo {
    c_try!(bridge::call("hdfsGetPathInfo", |env| {
        let fs = fs_ref(fs)?;
        // SAFETY: forwarded from the caller.
        let path = unsafe { path_arg(path, "path")? };
        let status = env.file_status(env.stat(fs, path)?)?;
        file_info_array(std::slice::from_ref(&status))
    }); otherwise ptr::null_mut())
}

/// The entries of a directory sorted by name, or the file itself.
///
/// The number of entries is stored in `*numEntries`. An empty directory
/// gives NULL and 0 entries without recording an error.
///
/// # Safety
///
/// `path` must be NULL or a NUL-terminated string, `numEntries` NULL or
/// valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hdfsListDirectory(
    fs: hdfsFS,
    path: *const c_char,
    numEntries: *mut c_int,
) -> *mut hdfsFileInfo {
    c_try!(bridge::call("hdfsListDirectory", |env| {
        if numEntries.is_null() {
            return Err(BridgeError::invalid_argument("numEntries is NULL"));
        }
        // SAFETY: non-null, writable per the caller's contract.
        unsafe { *numEntries = 0 };
        let fs = fs_ref(fs)?;
        // SAFETY: forwarded from the caller.
        let path = unsafe { path_arg(path, "path")? };
        let statuses = env.file_statuses(env.list_status(fs, path)?)?;
        if statuses.is_empty() {
            return Ok(ptr::null_mut());
        }
        let count = c_int::try_from(statuses.len())
            .map_err(|_| BridgeError::internal("too many directory entries"))?;
        let infos = file_info_array(&statuses)?;
        // SAFETY: as above.
        unsafe { *numEntries = count };
        Ok(infos)
    }); otherwise ptr::null_mut())
}

/// Free an array returned by [`hdfsGetPathInfo`] (with `numEntries` 1)
/// or [`hdfsListDirectory`], names included. NULL is ignored.
///
/// # Safety
///
/// `infos` must be NULL or an array from this library that has not
/// been freed, and `numEntries` its length.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hdfsFreeFileInfo(infos: *mut hdfsFileInfo, numEntries: c_int) {
    if infos.is_null() {
        return;
    }
    let Ok(len) = usize::try_from(numEntries) else {
        tracing::warn!(numEntries, "hdfsFreeFileInfo with a negative count, leaking the array");
        return;
    };
    // SAFETY: the array was a boxed slice of exactly `len` entries.
    drop(unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(infos, len)) });
}

/// Turn a list of rows into a NULL-terminated `char**` per row, inside a
/// NULL-terminated outer array.
fn host_matrix(blocks: &[BlockLocation]) -> Result<*mut *mut *mut c_char, BridgeError> {
    let mut rows: Vec<*mut *mut c_char> = Vec::with_capacity(blocks.len() + 1);
    for block in blocks {
        let names = block
            .hosts
            .iter()
            .map(|host| c_string(host))
            .collect::<Result<Vec<_>, _>>();
        match names {
            Ok(names) => {
                let row: Vec<*mut c_char> = names
                    .into_iter()
                    .map(CString::into_raw)
                    .chain(std::iter::once(ptr::null_mut()))
                    .collect();
                rows.push(Box::into_raw(row.into_boxed_slice()).cast());
            }
            Err(e) => {
                rows.push(ptr::null_mut());
                // SAFETY: `rows` is NULL-terminated and built by this function.
                unsafe { free_hosts(Box::into_raw(rows.into_boxed_slice()).cast()) };
                return Err(e);
            }
        }
    }
    rows.push(ptr::null_mut());
    Ok(Box::into_raw(rows.into_boxed_slice()).cast())
}

/// Length of a NULL-terminated array, terminator excluded.
unsafe fn null_terminated_len<T>(array: *const *mut T) -> usize {
    let mut len = 0;
    // SAFETY: the caller guarantees a NULL terminator.
    while unsafe { !(*array.add(len)).is_null() } {
        len += 1;
    }
    len
}

unsafe fn free_hosts(hosts: *mut *mut *mut c_char) {
    // SAFETY: per `hdfsFreeHosts`.
    unsafe {
        let rows = null_terminated_len(hosts);
        for r in 0..rows {
            let row = *hosts.add(r);
            let len = null_terminated_len(row);
            for h in 0..len {
                drop(CString::from_raw(*row.add(h)));
            }
            drop(Box::from_raw(ptr::slice_from_raw_parts_mut(row, len + 1)));
        }
        drop(Box::from_raw(ptr::slice_from_raw_parts_mut(hosts, rows + 1)));
    }
}

/// The hosts holding each block of `path` that overlaps
/// `[start, start + length)`.
///
/// Rows and the outer array are NULL-terminated. A range past the end of
/// the file gives an outer array holding only the terminator. Returns NULL
/// on error.
///
/// # Safety
///
/// `path` must be NULL or a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hdfsGetHosts(
    fs: hdfsFS,
    path: *const c_char,
    start: tOffset,
    length: tOffset,
) -> *mut *mut *mut c_char {
    c_try!(bridge::call("hdfsGetHosts", |env| {
        let fs = fs_ref(fs)?;
        // SAFETY: forwarded from the caller.
        let path = unsafe { path_arg(path, "path")? };
        let start = u64::try_from(start)
            .map_err(|_| BridgeError::invalid_argument("start is negative"))?;
        let length = u64::try_from(length)
            .map_err(|_| BridgeError::invalid_argument("length is negative"))?;
        let blocks = env.block_location_array(env.block_locations(fs, path, start, length)?)?;
        host_matrix(&blocks)
    }); otherwise ptr::null_mut())
}

/// Free a listing returned by [`hdfsGetHosts`]. NULL is ignored.
///
/// # Safety
///
/// `hosts` must be NULL or a listing from this library that has not been
/// freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hdfsFreeHosts(hosts: *mut *mut *mut c_char) {
    if hosts.is_null() {
        return;
    }
    // SAFETY: forwarded from the caller.
    unsafe { free_hosts(hosts) }
}
