//! Per-thread access to the runtime.
//!
//! Local references live in a table owned by the calling thread and are
//! grouped into frames. The bottom frame is never popped: locals created
//! outside any explicit frame stay there until deleted or promoted.

use crate::error::{Exception, ExceptionClass, Result};
use crate::fs::{
    BlockLocation, CreateOptions, FileStatus, FileSystem, InputStream, OutputStream, Target,
};
use crate::object::Object;
use crate::reference::{RefTable, Reference, Scope};
use crate::runtime::Runtime;
use parking_lot::Mutex;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;

struct LocalFrames {
    table: RefTable,
    frames: Vec<Vec<Reference>>,
}

impl LocalFrames {
    fn new() -> Self {
        Self {
            table: RefTable::new(Scope::Local),
            frames: vec![Vec::new()],
        }
    }

    fn insert(&mut self, object: Arc<Object>) -> Result<Reference> {
        let reference = self
            .table
            .insert(object)
            .ok_or_else(|| Exception::new(ExceptionClass::Internal, "local reference table is full"))?;
        if let Some(frame) = self.frames.last_mut() {
            frame.push(reference);
        }
        Ok(reference)
    }

    fn remove(&mut self, reference: Reference) -> Option<Arc<Object>> {
        let object = self.table.remove(reference)?;
        for frame in self.frames.iter_mut().rev() {
            if let Some(at) = frame.iter().rposition(|r| *r == reference) {
                frame.swap_remove(at);
                break;
            }
        }
        Some(object)
    }
}

struct FrameGuard<'a, 'rt>(&'a Env<'rt>);

impl Drop for FrameGuard<'_, '_> {
    fn drop(&mut self) {
        if let Err(e) = self.0.pop_local_frame(None) {
            tracing::warn!(error = %e, "local frame was already popped");
        }
    }
}

thread_local! {
    static LOCALS: RefCell<LocalFrames> = RefCell::new(LocalFrames::new());
}

/// A thread's view of a [`Runtime`]. Not `Send`: local references only
/// mean something on the thread that created them.
pub struct Env<'rt> {
    runtime: &'rt Runtime,
    _not_send: PhantomData<*const ()>,
}

impl<'rt> Env<'rt> {
    pub(crate) fn new(runtime: &'rt Runtime) -> Self {
        Self {
            runtime,
            _not_send: PhantomData,
        }
    }

    pub fn runtime(&self) -> &'rt Runtime {
        self.runtime
    }

    /// Put `object` on the heap and return a local reference to it.
    pub fn new_local(&self, object: Object) -> Result<Reference> {
        self.new_local_arc(Arc::new(object))
    }

    fn new_local_arc(&self, object: Arc<Object>) -> Result<Reference> {
        LOCALS.with(|locals| locals.borrow_mut().insert(object))
    }

    /// The object behind a local or global reference.
    pub fn resolve(&self, reference: Reference) -> Result<Arc<Object>> {
        let object = match reference.scope() {
            Scope::Local => LOCALS.with(|locals| locals.borrow().table.get(reference).cloned()),
            Scope::Global => self.runtime.globals().get(reference).cloned(),
        };
        object.ok_or_else(|| {
            Exception::invalid_reference(format!("{reference:?} is not a live reference"))
        })
    }

    pub fn delete_local(&self, reference: Reference) -> Result<()> {
        if reference.is_global() {
            return Err(Exception::invalid_reference(format!(
                "{reference:?} is not a local reference"
            )));
        }
        match LOCALS.with(|locals| locals.borrow_mut().remove(reference)) {
            Some(_) => Ok(()),
            None => Err(Exception::invalid_reference(format!(
                "{reference:?} is not a live local reference"
            ))),
        }
    }

    /// A new global reference to the object behind `reference`.
    pub fn new_global(&self, reference: Reference) -> Result<Reference> {
        let object = self.resolve(reference)?;
        let global = self
            .runtime
            .globals()
            .insert(object)
            .ok_or_else(|| Exception::new(ExceptionClass::Internal, "global reference table is full"))?;
        tracing::trace!(from = ?reference, to = ?global, "new global reference");
        Ok(global)
    }

    /// Turn a local reference into a global one, retiring the local.
    /// On failure the local is left alone.
    pub fn promote(&self, local: Reference) -> Result<Reference> {
        if local.is_global() {
            return Err(Exception::invalid_reference(format!(
                "{local:?} is already global"
            )));
        }
        let global = self.new_global(local)?;
        self.delete_local(local)?;
        Ok(global)
    }

    pub fn delete_global(&self, reference: Reference) -> Result<()> {
        let removed = reference.is_global() && self.runtime.globals().remove(reference).is_some();
        if !removed {
            tracing::warn!(reference = ?reference, "release of a reference that is not a live global");
            return Err(Exception::invalid_reference(format!(
                "{reference:?} is not a live global reference"
            )));
        }
        tracing::trace!(reference = ?reference, "deleted global reference");
        Ok(())
    }

    pub fn push_local_frame(&self, capacity: usize) {
        LOCALS.with(|locals| locals.borrow_mut().frames.push(Vec::with_capacity(capacity)));
    }

    /// Pop the top frame, deleting its locals. If `result` is one of
    /// them, a fresh local to the same object is returned in the frame
    /// below.
    pub fn pop_local_frame(&self, result: Option<Reference>) -> Result<Option<Reference>> {
        let kept = result.map(|r| self.resolve(r)).transpose()?;
        LOCALS.with(|locals| {
            let mut locals = locals.borrow_mut();
            if locals.frames.len() < 2 {
                return Err(Exception::illegal_state("no local frame to pop"));
            }
            if let Some(frame) = locals.frames.pop() {
                for reference in frame {
                    locals.table.remove(reference);
                }
            }
            kept.map(|object| locals.insert(object)).transpose()
        })
    }

    /// Run `f` in a fresh local frame, popped whatever `f` returns,
    /// including when it unwinds.
    pub fn with_local_frame<T>(
        &self,
        capacity: usize,
        f: impl FnOnce(&Self) -> Result<T>,
    ) -> Result<T> {
        self.push_local_frame(capacity);
        let _frame = FrameGuard(self);
        f(self)
    }

    /// Number of live locals on this thread.
    pub fn live_locals(&self) -> usize {
        LOCALS.with(|locals| locals.borrow().table.live())
    }

    pub fn file_system(&self, reference: Reference) -> Result<Arc<dyn FileSystem>> {
        match &*self.resolve(reference)? {
            Object::FileSystem(fs) => Ok(fs.clone()),
            other => Err(Exception::class_cast("FileSystem", other.class_name())),
        }
    }

    pub fn input_stream(&self, reference: Reference) -> Result<Arc<Mutex<Box<dyn InputStream>>>> {
        match &*self.resolve(reference)? {
            Object::InputStream(stream) => Ok(stream.clone()),
            other => Err(Exception::class_cast("InputStream", other.class_name())),
        }
    }

    pub fn output_stream(&self, reference: Reference) -> Result<Arc<Mutex<Box<dyn OutputStream>>>> {
        match &*self.resolve(reference)? {
            Object::OutputStream(stream) => Ok(stream.clone()),
            other => Err(Exception::class_cast("OutputStream", other.class_name())),
        }
    }

    pub fn file_status(&self, reference: Reference) -> Result<FileStatus> {
        match &*self.resolve(reference)? {
            Object::FileStatus(status) => Ok(status.clone()),
            other => Err(Exception::class_cast("FileStatus", other.class_name())),
        }
    }

    pub fn file_statuses(&self, reference: Reference) -> Result<Vec<FileStatus>> {
        match &*self.resolve(reference)? {
            Object::FileStatusArray(statuses) => Ok(statuses.clone()),
            other => Err(Exception::class_cast("FileStatus[]", other.class_name())),
        }
    }

    pub fn block_location_array(&self, reference: Reference) -> Result<Vec<BlockLocation>> {
        match &*self.resolve(reference)? {
            Object::BlockLocations(blocks) => Ok(blocks.clone()),
            other => Err(Exception::class_cast("BlockLocation[]", other.class_name())),
        }
    }

    /// Connect to `target`, returning a local reference to the client.
    pub fn get_file_system(&self, target: &Target) -> Result<Reference> {
        let fs = self.runtime.connect(target)?;
        self.new_local(Object::FileSystem(fs))
    }

    pub fn open(&self, fs: Reference, path: &Path, buffer_size: usize) -> Result<Reference> {
        let stream = self.file_system(fs)?.open(path, buffer_size)?;
        self.new_local(Object::input_stream(stream))
    }

    pub fn create(&self, fs: Reference, path: &Path, options: &CreateOptions) -> Result<Reference> {
        let stream = self.file_system(fs)?.create(path, options)?;
        self.new_local(Object::output_stream(stream))
    }

    pub fn stat(&self, fs: Reference, path: &Path) -> Result<Reference> {
        let status = self.file_system(fs)?.status(path)?;
        self.new_local(Object::FileStatus(status))
    }

    pub fn list_status(&self, fs: Reference, path: &Path) -> Result<Reference> {
        let statuses = self.file_system(fs)?.list_status(path)?;
        self.new_local(Object::FileStatusArray(statuses))
    }

    pub fn block_locations(
        &self,
        fs: Reference,
        path: &Path,
        start: u64,
        len: u64,
    ) -> Result<Reference> {
        let blocks = self.file_system(fs)?.block_locations(path, start, len)?;
        self.new_local(Object::BlockLocations(blocks))
    }
}
