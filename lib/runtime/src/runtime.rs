use crate::conf::Configuration;
use crate::env::Env;
use crate::error::{Exception, Result};
use crate::fs::{FileSystem, FileSystemFactory, LocalFileSystem, Target};
use crate::reference::{RefTable, Scope};
use once_cell::sync::Lazy;
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

static RUNTIME: Lazy<Runtime> = Lazy::new(|| Runtime::new(Configuration::from_env()));

/// The managed runtime: configuration, the global reference table and
/// the filesystem factories known by authority.
pub struct Runtime {
    conf: RwLock<Configuration>,
    globals: Mutex<RefTable>,
    factories: RwLock<HashMap<String, Arc<dyn FileSystemFactory>>>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut authorities: Vec<String> = self.factories.read().keys().cloned().collect();
        authorities.sort();
        f.debug_struct("Runtime")
            .field("conf", &*self.conf.read())
            .field("live_globals", &self.live_globals())
            .field("authorities", &authorities)
            .finish()
    }
}

impl Runtime {
    pub fn new(conf: Configuration) -> Self {
        Self {
            conf: RwLock::new(conf),
            globals: Mutex::new(RefTable::new(Scope::Global)),
            factories: RwLock::new(HashMap::new()),
        }
    }

    /// The process-wide runtime, started on first use.
    pub fn global() -> &'static Runtime {
        &RUNTIME
    }

    /// An environment for the calling thread.
    pub fn attach(&self) -> Env<'_> {
        Env::new(self)
    }

    pub(crate) fn globals(&self) -> MutexGuard<'_, RefTable> {
        self.globals.lock()
    }

    pub fn live_globals(&self) -> usize {
        self.globals.lock().live()
    }

    pub fn configuration(&self) -> Configuration {
        self.conf.read().clone()
    }

    pub fn set_configuration(&self, conf: Configuration) {
        *self.conf.write() = conf;
    }

    /// Make `authority` (`host:port`) reachable. Returns the factory it replaces.
    pub fn register_file_system(
        &self,
        authority: impl Into<String>,
        factory: Arc<dyn FileSystemFactory>,
    ) -> Option<Arc<dyn FileSystemFactory>> {
        let authority = authority.into();
        tracing::debug!(%authority, "registered filesystem factory");
        self.factories.write().insert(authority, factory)
    }

    pub fn unregister_file_system(&self, authority: &str) -> Option<Arc<dyn FileSystemFactory>> {
        self.factories.write().remove(authority)
    }

    /// Produce a new client for `target`.
    pub fn connect(&self, target: &Target) -> Result<Arc<dyn FileSystem>> {
        let conf = self.configuration();
        match target {
            Target::Local => Ok(Arc::new(LocalFileSystem::new(&conf)?)),
            Target::Default => self.connect(&Target::from_default_name(&conf.default_name)?),
            Target::Remote { host, port } => {
                let authority = format!("{host}:{port}");
                let factory = self.factories.read().get(&authority).cloned();
                match factory {
                    Some(factory) => factory.connect(&authority, &conf),
                    None => Err(Exception::connect(&authority)),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExceptionClass;
    use crate::fs::MemoryCluster;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_target_follows_the_configuration() {
        let runtime = Runtime::new(Configuration::default());
        assert_eq!(runtime.connect(&Target::Default).unwrap().uri(), "file:///");

        runtime.register_file_system("nn:9000", Arc::new(MemoryCluster::builder("nn:9000").build()));
        runtime.set_configuration(Configuration {
            default_name: "hdfs://nn:9000".into(),
            ..Configuration::default()
        });
        assert_eq!(runtime.connect(&Target::Default).unwrap().uri(), "hdfs://nn:9000");

        runtime.set_configuration(Configuration {
            default_name: "default".into(),
            ..Configuration::default()
        });
        assert_eq!(
            runtime.connect(&Target::Default).unwrap_err().class(),
            ExceptionClass::UnknownHost
        );
    }

    #[test]
    fn unregistered_authorities_are_unreachable() {
        let runtime = Runtime::new(Configuration::default());
        let target = Target::Remote {
            host: "nowhere".into(),
            port: 1,
        };
        assert_eq!(
            runtime.connect(&target).unwrap_err().class(),
            ExceptionClass::Connect
        );

        runtime.register_file_system("nowhere:1", Arc::new(MemoryCluster::builder("nowhere:1").build()));
        assert!(runtime.connect(&target).is_ok());
        assert!(runtime.unregister_file_system("nowhere:1").is_some());
        assert!(runtime.connect(&target).is_err());
    }
}
