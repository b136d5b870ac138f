//! libhdfs C API.
//!
//! This crate builds `libhdfs`, a C library exposing the filesystem
//! clients of [`hdfs_runtime`] through the classic `hdfs.h` interface:
//! connect, open, read, write, seek, list, query block hosts.
//!
//! Handles handed to C are references into the runtime heap. A filesystem
//! handle (`hdfsFS`) is an encoded global reference; a file handle
//! (`hdfsFile`) is a small heap structure holding the global reference to
//! its stream and its direction. Both stay valid, on any thread, until
//! they are disconnected or closed. After that every use is reported as
//! an invalid handle.
//!
//! Every entry point runs in its own local frame on the calling thread,
//! and reports failures the same way: it returns `-1` or `NULL` and
//! records an [`hdfsErrorKind`](error::hdfsErrorKind) and message that
//! [`hdfsGetLastError`](error::hdfsGetLastError) and friends read back.
//! The generated header lands in `$OUT_DIR/hdfs.h`.

// C names for C functions.
#![allow(non_snake_case)]
#![deny(
    dead_code,
    unused_imports,
    unused_unsafe,
    unreachable_patterns
)]

mod bridge;
pub mod error;
pub mod file;
pub mod fs;
mod handles;
pub mod info;
pub mod logging;
mod macros;
pub mod refs;
pub mod types;

pub use crate::handles::live_files;
