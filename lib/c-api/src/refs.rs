//! Promotion and release of runtime references.

use crate::bridge;
use crate::c_try;
use crate::error::BridgeError;
use crate::types::jobject;
use hdfs_runtime::Reference;
use std::ptr;

/// Promote a local reference of the calling thread to a global one.
///
/// On success the local reference is deleted and the returned global
/// reference stays valid, on any thread, until
/// [`hdfsDeleteGlobalRef`]. On failure NULL is returned and the local
/// reference is left alone.
#[unsafe(no_mangle)]
pub extern "C" fn hdfsConvertToGlobalRef(localRef: jobject) -> jobject {
    let global = c_try!(bridge::call("hdfsConvertToGlobalRef", |env| {
        let local = Reference::from_raw(localRef)
            .ok_or_else(|| BridgeError::invalid_handle("reference is NULL"))?;
        Ok(env.promote(local)?)
    }); otherwise ptr::null_mut());
    global.into_raw()
}

/// Release a global reference.
///
/// Releasing a reference twice, or one that was never global, is a bug in
/// the caller; it is detected, logged and recorded as an invalid handle.
#[unsafe(no_mangle)]
pub extern "C" fn hdfsDeleteGlobalRef(globalRef: jobject) {
    c_try!(bridge::call("hdfsDeleteGlobalRef", |env| {
        let global = Reference::from_raw(globalRef)
            .ok_or_else(|| BridgeError::invalid_handle("reference is NULL"))?;
        Ok(env.delete_global(global)?)
    }); otherwise ());
}
