use crate::error::{Exception, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Held {
    Shared(usize),
    Exclusive,
}

/// Advisory shared/exclusive path locks.
///
/// Locks are not tied to the stream or client that took them; `release`
/// drops one holder.
#[derive(Debug, Default)]
pub struct LockTable {
    held: Mutex<HashMap<PathBuf, Held>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self, path: &Path, shared: bool) -> Result<()> {
        let mut held = self.held.lock();
        let next = match (held.get(path).copied(), shared) {
            (None, true) => Held::Shared(1),
            (None, false) => Held::Exclusive,
            (Some(Held::Shared(holders)), true) => Held::Shared(holders + 1),
            (Some(_), _) => {
                return Err(Exception::io(format!(
                    "{}: lock is already held",
                    path.display()
                )));
            }
        };
        held.insert(path.to_path_buf(), next);
        tracing::trace!(path = %path.display(), shared, "lock acquired");
        Ok(())
    }

    pub fn release(&self, path: &Path) -> Result<()> {
        let mut held = self.held.lock();
        match held.get(path).copied() {
            Some(Held::Shared(holders)) if holders > 1 => {
                held.insert(path.to_path_buf(), Held::Shared(holders - 1));
            }
            Some(_) => {
                held.remove(path);
            }
            None => {
                return Err(Exception::illegal_state(format!(
                    "{}: not locked",
                    path.display()
                )));
            }
        }
        tracing::trace!(path = %path.display(), "lock released");
        Ok(())
    }

    pub fn is_locked(&self, path: &Path) -> bool {
        self.held.lock().contains_key(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExceptionClass;

    #[test]
    fn shared_locks_stack_and_exclusive_locks_conflict() {
        let locks = LockTable::new();
        let path = Path::new("/data");

        locks.lock(path, true).unwrap();
        locks.lock(path, true).unwrap();
        assert_eq!(locks.lock(path, false).unwrap_err().class(), ExceptionClass::Io);

        locks.release(path).unwrap();
        assert!(locks.is_locked(path));
        locks.release(path).unwrap();
        assert!(!locks.is_locked(path));

        locks.lock(path, false).unwrap();
        assert_eq!(locks.lock(path, true).unwrap_err().class(), ExceptionClass::Io);
        locks.release(path).unwrap();
        assert_eq!(
            locks.release(path).unwrap_err().class(),
            ExceptionClass::IllegalState
        );
    }
}
