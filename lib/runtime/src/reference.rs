//! References into the object heap.
//!
//! A [`Reference`] is a pointer-sized value that encodes which table it
//! lives in (the calling thread's local table or the process-wide global
//! table), a slot index and the slot's generation at the time the
//! reference was handed out. Releasing a slot bumps its generation, so a
//! stale reference stops resolving instead of aliasing whatever object
//! reuses the slot.
//!
//! Layout, least significant bit first:
//!
//! ```text
//! | global (1) | generation (GENERATION_BITS) | index + 1 (INDEX_BITS) |
//! ```

use crate::object::Object;
use std::ffi::c_void;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;

const INDEX_BITS: u32 = usize::BITS / 2;
const GENERATION_BITS: u32 = usize::BITS / 2 - 1;
const GENERATION_MASK: usize = (1 << GENERATION_BITS) - 1;
const MAX_SLOTS: usize = (1 << INDEX_BITS) - 1;

/// Which table a reference lives in.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Valid on the creating thread until its frame is popped or it is deleted.
    Local,
    /// Valid on any thread until explicitly deleted.
    Global,
}

/// An encoded, non-null reference.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Reference(NonZeroUsize);

impl Reference {
    pub(crate) fn new(scope: Scope, index: usize, generation: usize) -> Self {
        debug_assert!(index < MAX_SLOTS);
        let raw = ((index + 1) << (GENERATION_BITS + 1))
            | ((generation & GENERATION_MASK) << 1)
            | matches!(scope, Scope::Global) as usize;
        // `index + 1` is never zero, so neither is `raw`.
        Self(NonZeroUsize::new(raw).unwrap_or(NonZeroUsize::MIN))
    }

    pub fn scope(self) -> Scope {
        if self.0.get() & 1 == 1 {
            Scope::Global
        } else {
            Scope::Local
        }
    }

    pub fn is_global(self) -> bool {
        self.scope() == Scope::Global
    }

    pub(crate) fn index(self) -> Option<usize> {
        (self.0.get() >> (GENERATION_BITS + 1)).checked_sub(1)
    }

    pub(crate) fn generation(self) -> usize {
        (self.0.get() >> 1) & GENERATION_MASK
    }

    /// Reinterpret a raw handle received over the C boundary.
    pub fn from_raw(raw: *mut c_void) -> Option<Self> {
        NonZeroUsize::new(raw as usize).map(Self)
    }

    /// The raw handle handed over the C boundary.
    pub fn into_raw(self) -> *mut c_void {
        self.0.get() as *mut c_void
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Reference({:?}, #{}, gen {})",
            self.scope(),
            self.index().unwrap_or_default(),
            self.generation()
        )
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: usize,
    object: Option<Arc<Object>>,
}

/// A generation-checked slab of object references.
#[derive(Debug)]
pub(crate) struct RefTable {
    scope: Scope,
    slots: Vec<Slot>,
    free: Vec<usize>,
    live: usize,
}

impl RefTable {
    pub(crate) fn new(scope: Scope) -> Self {
        Self {
            scope,
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    pub(crate) fn insert(&mut self, object: Arc<Object>) -> Option<Reference> {
        let index = match self.free.pop() {
            Some(index) => index,
            None if self.slots.len() < MAX_SLOTS => {
                self.slots.push(Slot::default());
                self.slots.len() - 1
            }
            None => return None,
        };
        let slot = &mut self.slots[index];
        slot.object = Some(object);
        self.live += 1;
        Some(Reference::new(self.scope, index, slot.generation))
    }

    fn slot(&self, reference: Reference) -> Option<&Slot> {
        if reference.scope() != self.scope {
            return None;
        }
        let slot = self.slots.get(reference.index()?)?;
        (slot.generation == reference.generation() && slot.object.is_some()).then_some(slot)
    }

    pub(crate) fn get(&self, reference: Reference) -> Option<&Arc<Object>> {
        self.slot(reference)?.object.as_ref()
    }

    pub(crate) fn contains(&self, reference: Reference) -> bool {
        self.slot(reference).is_some()
    }

    pub(crate) fn remove(&mut self, reference: Reference) -> Option<Arc<Object>> {
        self.slot(reference)?;
        let index = reference.index()?;
        let slot = &mut self.slots[index];
        let object = slot.object.take();
        slot.generation = (slot.generation + 1) & GENERATION_MASK;
        self.free.push(index);
        self.live -= 1;
        object
    }

    pub(crate) fn live(&self) -> usize {
        self.live
    }
}
