//! Live `hdfsFile` handles.
//!
//! A file handle is a heap pointer owned by C. Before it is dereferenced
//! its address is looked up here, so a closed (freed) handle is reported
//! as invalid instead of being read.

use crate::error::BridgeError;
use crate::types::{hdfsFile, hdfsFile_internal, hdfsStreamType};
use hdfs_runtime::Reference;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashSet;

static LIVE_FILES: Lazy<Mutex<HashSet<usize>>> = Lazy::new(Default::default);

/// Hand out a new file handle for the promoted `stream`.
pub(crate) fn register(stream: Reference, kind: hdfsStreamType) -> hdfsFile {
    let file = Box::into_raw(Box::new(hdfsFile_internal {
        file: stream.into_raw(),
        r#type: kind,
    }));
    LIVE_FILES.lock().insert(file as usize);
    file
}

/// The stream reference and direction of a live handle.
///
/// # Safety
///
/// `file` may be any value; only addresses handed out by [`register`]
/// and not yet unregistered are dereferenced.
pub(crate) unsafe fn lookup(file: hdfsFile) -> Result<(Reference, hdfsStreamType), BridgeError> {
    if file.is_null() {
        return Err(BridgeError::invalid_handle("hdfsFile is NULL"));
    }
    let live = LIVE_FILES.lock();
    if !live.contains(&(file as usize)) {
        return Err(BridgeError::invalid_handle("hdfsFile is closed or was never opened"));
    }
    // SAFETY: registered handles stay allocated until unregistered, which
    // needs the lock we hold.
    let internal = unsafe { &*file };
    let stream = Reference::from_raw(internal.file)
        .ok_or_else(|| BridgeError::invalid_handle("hdfsFile has no stream"))?;
    Ok((stream, internal.r#type))
}

/// Take ownership of a live handle back, so it can be freed.
///
/// # Safety
///
/// Same as [`lookup`].
pub(crate) unsafe fn unregister(file: hdfsFile) -> Result<Box<hdfsFile_internal>, BridgeError> {
    if file.is_null() {
        return Err(BridgeError::invalid_handle("hdfsFile is NULL"));
    }
    if !LIVE_FILES.lock().remove(&(file as usize)) {
        return Err(BridgeError::invalid_handle("hdfsFile is closed or was never opened"));
    }
    // SAFETY: the address came from `Box::into_raw` in `register` and was
    // live until the removal above, which only one caller can win.
    Ok(unsafe { Box::from_raw(file) })
}

/// Number of open file handles in the process.
pub fn live_files() -> usize {
    LIVE_FILES.lock().len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::hdfsErrorKind;
    use hdfs_runtime::{Object, Runtime};
    use hdfs_runtime::fs::FileStatus;
    use pretty_assertions::assert_eq;

    #[test]
    fn handles_are_unusable_once_unregistered() {
        let env = Runtime::global().attach();
        let local = env
            .new_local(Object::FileStatus(FileStatus::directory("/".into(), 0)))
            .unwrap();
        let stream = env.promote(local).unwrap();

        let file = register(stream, hdfsStreamType::INPUT);
        assert_eq!(unsafe { lookup(file) }.unwrap(), (stream, hdfsStreamType::INPUT));

        let internal = unsafe { unregister(file) }.unwrap();
        assert_eq!(internal.r#type, hdfsStreamType::INPUT);
        drop(internal);

        assert_eq!(
            unsafe { lookup(file) }.unwrap_err().kind,
            hdfsErrorKind::InvalidHandle
        );
        assert_eq!(
            unsafe { unregister(file) }.unwrap_err().kind,
            hdfsErrorKind::InvalidHandle
        );
        env.delete_global(stream).unwrap();
    }
}
