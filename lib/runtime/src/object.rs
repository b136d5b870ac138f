//! Objects living in the runtime heap.

use crate::fs::{BlockLocation, FileStatus, FileSystem, InputStream, OutputStream};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// A heap object. Its lifetime is governed by the references pointing at
/// it, never by the code that created it.
pub enum Object {
    FileSystem(Arc<dyn FileSystem>),
    InputStream(Arc<Mutex<Box<dyn InputStream>>>),
    OutputStream(Arc<Mutex<Box<dyn OutputStream>>>),
    FileStatus(FileStatus),
    FileStatusArray(Vec<FileStatus>),
    BlockLocations(Vec<BlockLocation>),
}

impl Object {
    pub fn class_name(&self) -> &'static str {
        match self {
            Object::FileSystem(_) => "FileSystem",
            Object::InputStream(_) => "InputStream",
            Object::OutputStream(_) => "OutputStream",
            Object::FileStatus(_) => "FileStatus",
            Object::FileStatusArray(_) => "FileStatus[]",
            Object::BlockLocations(_) => "BlockLocation[]",
        }
    }

    pub fn input_stream(stream: Box<dyn InputStream>) -> Self {
        Object::InputStream(Arc::new(Mutex::new(stream)))
    }

    pub fn output_stream(stream: Box<dyn OutputStream>) -> Self {
        Object::OutputStream(Arc::new(Mutex::new(stream)))
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::FileSystem(fs) => f.debug_tuple("FileSystem").field(&fs.uri()).finish(),
            Object::FileStatus(status) => f.debug_tuple("FileStatus").field(status).finish(),
            Object::FileStatusArray(statuses) => {
                f.debug_tuple("FileStatusArray").field(&statuses.len()).finish()
            }
            Object::BlockLocations(blocks) => {
                f.debug_tuple("BlockLocations").field(&blocks.len()).finish()
            }
            other => f.write_str(other.class_name()),
        }
    }
}
