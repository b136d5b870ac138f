//! C types of the libhdfs API.

#![allow(non_camel_case_types, non_snake_case, non_upper_case_globals)]

use libc::{c_char, c_int, c_void};
use std::fmt;

/// Size of data for read/write io ops.
pub type tSize = i32;
/// Time type, seconds since the Unix epoch.
pub type tTime = libc::time_t;
/// Offset within a file.
pub type tOffset = i64;
/// Port.
pub type tPort = u16;

/// Open for reading.
pub const O_RDONLY: c_int = 1;
/// Open for writing.
pub const O_WRONLY: c_int = 2;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum tObjectKind {
    /// `'F'`
    kObjectKindFile = 0x46,
    /// `'D'`
    kObjectKindDirectory = 0x44,
}

/// A reference into the runtime heap.
pub type jobject = *mut c_void;

/// A connected filesystem: an encoded global reference to the client.
pub type hdfsFS = *mut c_void;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum hdfsStreamType {
    UNINITIALIZED = 0,
    INPUT = 1,
    OUTPUT = 2,
}

impl fmt::Display for hdfsStreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::UNINITIALIZED => "nothing",
            Self::INPUT => "reading",
            Self::OUTPUT => "writing",
        })
    }
}

/// An open file. `file` is an encoded global reference to the stream.
#[repr(C)]
#[derive(Debug)]
pub struct hdfsFile_internal {
    pub file: *mut c_void,
    pub r#type: hdfsStreamType,
}

pub type hdfsFile = *mut hdfsFile_internal;

/// Metadata of one path, owned by the caller until `hdfsFreeFileInfo`.
#[repr(C)]
#[derive(Debug)]
pub struct hdfsFileInfo {
    /// File or directory.
    pub mKind: tObjectKind,
    /// Absolute path of the entry.
    pub mName: *mut c_char,
    /// Last modification time.
    pub mCreationTime: tTime,
    /// Size in bytes, 0 for directories.
    pub mSize: tOffset,
    /// Replicas per block, 0 for directories.
    pub replicaCount: c_int,
}
