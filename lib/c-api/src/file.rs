//! Open files: one stream, fixed to reading or writing when opened.
//!
//! A handle goes `UNINITIALIZED -> INPUT | OUTPUT -> closed`. Calls in the
//! wrong direction and calls on a closed handle fail before the stream is
//! touched.

use crate::bridge::{self, fs_ref, path_arg};
use crate::c_try;
use crate::error::BridgeError;
use crate::handles;
use crate::types::{O_RDONLY, O_WRONLY, hdfsFS, hdfsFile, hdfsStreamType, tOffset, tSize};
use hdfs_runtime::fs::CreateOptions;
use hdfs_runtime::{Env, Reference};
use libc::{c_char, c_int, c_short, c_void};
use std::ptr;
use std::slice;

/// The stream behind `file`, checked to be open in direction `expected`.
fn stream(
    env: &Env<'_>,
    op: &str,
    fs: hdfsFS,
    file: hdfsFile,
    expected: hdfsStreamType,
) -> Result<Reference, BridgeError> {
    // SAFETY: `lookup` only dereferences live handles.
    let (stream, kind) = unsafe { handles::lookup(file)? };
    if kind != expected {
        return Err(BridgeError::invalid_state(format!(
            "{op} needs a file open for {expected}, this one is open for {kind}"
        )));
    }
    env.file_system(fs_ref(fs)?)?;
    Ok(stream)
}

fn non_negative<T, U: TryFrom<T>>(value: T, what: &str) -> Result<U, BridgeError> {
    U::try_from(value).map_err(|_| BridgeError::invalid_argument(format!("{what} is negative")))
}

fn to_size(n: usize) -> Result<tSize, BridgeError> {
    tSize::try_from(n).map_err(|_| BridgeError::internal(format!("{n} overflows tSize")))
}

/// Open `path` for reading (`O_RDONLY`) or writing (`O_WRONLY`).
///
/// Zero `bufferSize`, `replication` or `blocksize` mean the configured
/// default. Opening for writing creates the file, and any missing parent
/// directories, replacing what was there. Returns NULL on error.
///
/// # Safety
///
/// `path` must be NULL or a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hdfsOpenFile(
    fs: hdfsFS,
    path: *const c_char,
    flags: c_int,
    bufferSize: c_int,
    replication: c_short,
    blocksize: tSize,
) -> hdfsFile {
    c_try!(bridge::call("hdfsOpenFile", |env| {
        let fs = fs_ref(fs)?;
        // SAFETY: forwarded from the caller.
        let path = unsafe { path_arg(path, "path")? };
        let buffer_size: usize = non_negative(bufferSize, "bufferSize")?;
        let replication: u16 = non_negative(replication, "replication")?;
        let block_size: u64 = non_negative(blocksize, "blocksize")?;

        let (local, kind) = match (flags & O_RDONLY != 0, flags & O_WRONLY != 0) {
            (true, false) => (env.open(fs, path, buffer_size)?, hdfsStreamType::INPUT),
            (false, true) => {
                let options = CreateOptions::new()
                    .buffer_size(buffer_size)
                    .replication(replication)
                    .block_size(block_size);
                (env.create(fs, path, &options)?, hdfsStreamType::OUTPUT)
            }
            _ => {
                return Err(BridgeError::invalid_argument(format!(
                    "flags {flags:#x} must hold exactly one of O_RDONLY and O_WRONLY"
                )));
            }
        };
        let stream = env.promote(local)?;
        tracing::debug!(path = %path.display(), %kind, "opened");
        Ok(handles::register(stream, kind))
    }); otherwise ptr::null_mut())
}

/// Flush (when writing) and close `file`, then free the handle.
///
/// The handle is gone afterwards even when -1 is returned because the
/// flush or close failed.
#[unsafe(no_mangle)]
pub extern "C" fn hdfsCloseFile(fs: hdfsFS, file: hdfsFile) -> c_int {
    let _ = fs;
    c_try!(bridge::call("hdfsCloseFile", |env| {
        // SAFETY: `unregister` only frees live handles, and only once.
        let internal = unsafe { handles::unregister(file)? };
        let stream = Reference::from_raw(internal.file)
            .ok_or_else(|| BridgeError::invalid_handle("hdfsFile has no stream"))?;
        let closed = match internal.r#type {
            hdfsStreamType::INPUT => env.input_stream(stream).and_then(|s| {
                let mut s = s.lock();
                s.close()
            }),
            hdfsStreamType::OUTPUT => env.output_stream(stream).and_then(|s| {
                let mut s = s.lock();
                let flushed = s.flush();
                let closed = s.close();
                flushed.and(closed)
            }),
            hdfsStreamType::UNINITIALIZED => Ok(()),
        };
        let released = env.delete_global(stream);
        if let Err(e) = &closed {
            tracing::warn!(error = %e, "closing a file failed, the handle is released anyway");
        }
        Ok(closed.and(released)?)
    }); otherwise -1);
    0
}

/// Read up to `length` bytes into `buffer`.
///
/// Returns the number of bytes read, which may be less than `length`,
/// 0 at end of file, -1 on error.
///
/// # Safety
///
/// `buffer` must be valid for writes of `length` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hdfsRead(
    fs: hdfsFS,
    file: hdfsFile,
    buffer: *mut c_void,
    length: tSize,
) -> tSize {
    c_try!(bridge::call("hdfsRead", |env| {
        let stream = stream(env, "hdfsRead", fs, file, hdfsStreamType::INPUT)?;
        let length: usize = non_negative(length, "length")?;
        if length == 0 {
            return Ok(0);
        }
        if buffer.is_null() {
            return Err(BridgeError::invalid_argument("buffer is NULL"));
        }
        // SAFETY: the caller guarantees `length` writable bytes.
        let buffer = unsafe { slice::from_raw_parts_mut(buffer.cast::<u8>(), length) };
        let read = env.input_stream(stream)?.lock().read(buffer)?;
        to_size(read)
    }); otherwise -1)
}

/// Read up to `length` bytes at `position` without moving the file offset.
///
/// # Safety
///
/// `buffer` must be valid for writes of `length` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hdfsPread(
    fs: hdfsFS,
    file: hdfsFile,
    position: tOffset,
    buffer: *mut c_void,
    length: tSize,
) -> tSize {
    c_try!(bridge::call("hdfsPread", |env| {
        let stream = stream(env, "hdfsPread", fs, file, hdfsStreamType::INPUT)?;
        let position: u64 = non_negative(position, "position")?;
        let length: usize = non_negative(length, "length")?;
        if length == 0 {
            return Ok(0);
        }
        if buffer.is_null() {
            return Err(BridgeError::invalid_argument("buffer is NULL"));
        }
        // SAFETY: the caller guarantees `length` writable bytes.
        let buffer = unsafe { slice::from_raw_parts_mut(buffer.cast::<u8>(), length) };
        let read = env.input_stream(stream)?.lock().read_at(position, buffer)?;
        to_size(read)
    }); otherwise -1)
}

/// Write `length` bytes from `buffer`. Returns the number of bytes
/// written, -1 on error.
///
/// # Safety
///
/// `buffer` must be valid for reads of `length` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hdfsWrite(
    fs: hdfsFS,
    file: hdfsFile,
    buffer: *const c_void,
    length: tSize,
) -> tSize {
    c_try!(bridge::call("hdfsWrite", |env| {
        let stream = stream(env, "hdfsWrite", fs, file, hdfsStreamType::OUTPUT)?;
        let length: usize = non_negative(length, "length")?;
        if length == 0 {
            return Ok(0);
        }
        if buffer.is_null() {
            return Err(BridgeError::invalid_argument("buffer is NULL"));
        }
        // SAFETY: the caller guarantees `length` readable bytes.
        let buffer = unsafe { slice::from_raw_parts(buffer.cast::<u8>(), length) };
        let written = env.output_stream(stream)?.lock().write(buffer)?;
        to_size(written)
    }); otherwise -1)
}

/// Seek to `desiredPos`. Only files open for reading can seek.
#[unsafe(no_mangle)]
pub extern "C" fn hdfsSeek(fs: hdfsFS, file: hdfsFile, desiredPos: tOffset) -> c_int {
    c_try!(bridge::call("hdfsSeek", |env| {
        let stream = stream(env, "hdfsSeek", fs, file, hdfsStreamType::INPUT)?;
        let position: u64 = non_negative(desiredPos, "desiredPos")?;
        Ok(env.input_stream(stream)?.lock().seek(position)?)
    }); otherwise -1);
    0
}

/// The current offset of a file open for reading, -1 on error.
#[unsafe(no_mangle)]
pub extern "C" fn hdfsTell(fs: hdfsFS, file: hdfsFile) -> tOffset {
    c_try!(bridge::call("hdfsTell", |env| {
        let stream = stream(env, "hdfsTell", fs, file, hdfsStreamType::INPUT)?;
        let position = env.input_stream(stream)?.lock().position();
        tOffset::try_from(position)
            .map_err(|_| BridgeError::internal(format!("{position} overflows tOffset")))
    }); otherwise -1)
}

/// Push buffered bytes of a file open for writing down to the filesystem.
#[unsafe(no_mangle)]
pub extern "C" fn hdfsFlush(fs: hdfsFS, file: hdfsFile) -> c_int {
    c_try!(bridge::call("hdfsFlush", |env| {
        let stream = stream(env, "hdfsFlush", fs, file, hdfsStreamType::OUTPUT)?;
        Ok(env.output_stream(stream)?.lock().flush()?)
    }); otherwise -1);
    0
}

/// Bytes that can be read without blocking, -1 on error.
#[unsafe(no_mangle)]
pub extern "C" fn hdfsAvailable(fs: hdfsFS, file: hdfsFile) -> c_int {
    c_try!(bridge::call("hdfsAvailable", |env| {
        let stream = stream(env, "hdfsAvailable", fs, file, hdfsStreamType::INPUT)?;
        let available = env.input_stream(stream)?.lock().available()?;
        Ok(c_int::try_from(available).unwrap_or(c_int::MAX))
    }); otherwise -1)
}
