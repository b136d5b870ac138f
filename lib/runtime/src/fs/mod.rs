//! Filesystem client classes.
//!
//! A [`FileSystem`] is the client object the bridge connects to. Streams
//! opened through it are [`InputStream`]s and [`OutputStream`]s. Concrete
//! clients are produced by a [`FileSystemFactory`] registered with the
//! [`Runtime`](crate::Runtime) under an authority.

mod local;
mod lock;
mod memory;
mod util;

pub use local::LocalFileSystem;
pub use lock::LockTable;
pub use memory::{MemoryCluster, MemoryClusterBuilder};
pub use util::copy;

use crate::conf::Configuration;
use crate::error::{Exception, ExceptionClass, Result};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// A connected filesystem client.
///
/// Relative paths are resolved against the client's working directory.
pub trait FileSystem: fmt::Debug + Send + Sync {
    /// `file:///` for the local disk, `hdfs://host:port` for clusters.
    fn uri(&self) -> String;

    fn working_directory(&self) -> PathBuf;

    fn set_working_directory(&self, path: &Path) -> Result<()>;

    /// Open `path` for reading. `buffer_size == 0` means the configured default.
    fn open(&self, path: &Path, buffer_size: usize) -> Result<Box<dyn InputStream>>;

    /// Create `path` for writing, creating missing parents.
    fn create(&self, path: &Path, options: &CreateOptions) -> Result<Box<dyn OutputStream>>;

    /// Delete a file, or a directory and everything below it.
    fn delete(&self, path: &Path) -> Result<()>;

    fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    fn exists(&self, path: &Path) -> Result<bool> {
        match self.status(path) {
            Ok(_) => Ok(true),
            Err(e) if e.class() == ExceptionClass::FileNotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// `mkdir -p`.
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    fn status(&self, path: &Path) -> Result<FileStatus>;

    /// Entries of a directory sorted by name, or the file itself.
    fn list_status(&self, path: &Path) -> Result<Vec<FileStatus>>;

    /// Blocks overlapping `[start, start + len)`, in file order.
    fn block_locations(&self, path: &Path, start: u64, len: u64) -> Result<Vec<BlockLocation>>;

    fn set_replication(&self, path: &Path, replication: u16) -> Result<()>;

    fn default_block_size(&self) -> u64;

    fn default_replication(&self) -> u16;

    /// Raw capacity in bytes.
    fn capacity(&self) -> Result<u64>;

    /// Raw bytes used, replicas included.
    fn used(&self) -> Result<u64>;

    fn lock(&self, path: &Path, shared: bool) -> Result<()>;

    fn release(&self, path: &Path) -> Result<()>;

    /// Called once when the last handle to the client is disconnected.
    fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// A stream opened for reading.
pub trait InputStream: fmt::Debug + Send {
    /// Read into `buf`, returning 0 at end of stream.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Read at `position` without moving the stream offset.
    fn read_at(&mut self, position: u64, buf: &mut [u8]) -> Result<usize>;

    /// Move the stream offset. Seeking past the end is an error.
    fn seek(&mut self, position: u64) -> Result<()>;

    fn position(&self) -> u64;

    /// Bytes readable without another round trip.
    fn available(&mut self) -> Result<usize>;

    fn close(&mut self) -> Result<()>;
}

/// A stream opened for writing.
pub trait OutputStream: fmt::Debug + Send {
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Push buffered bytes down to the filesystem.
    fn flush(&mut self) -> Result<()>;

    fn position(&self) -> u64;

    /// Flush and release the file.
    fn close(&mut self) -> Result<()>;
}

/// Hints for [`FileSystem::create`]. Zero means "configured default".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CreateOptions {
    pub overwrite: bool,
    pub buffer_size: usize,
    pub replication: u16,
    pub block_size: u64,
}

impl CreateOptions {
    pub fn new() -> Self {
        Self {
            overwrite: true,
            ..Default::default()
        }
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn replication(mut self, replication: u16) -> Self {
        self.replication = replication;
        self
    }

    pub fn block_size(mut self, block_size: u64) -> Self {
        self.block_size = block_size;
        self
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
}

/// Metadata snapshot of one path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileStatus {
    pub path: PathBuf,
    pub kind: FileKind,
    pub len: u64,
    /// Seconds since the Unix epoch.
    pub modification_time: i64,
    pub replication: u16,
    pub block_size: u64,
}

impl FileStatus {
    pub fn file(
        path: PathBuf,
        len: u64,
        modification_time: i64,
        replication: u16,
        block_size: u64,
    ) -> Self {
        Self {
            path,
            kind: FileKind::File,
            len,
            modification_time,
            replication,
            block_size,
        }
    }

    pub fn directory(path: PathBuf, modification_time: i64) -> Self {
        Self {
            path,
            kind: FileKind::Directory,
            len: 0,
            modification_time,
            replication: 0,
            block_size: 0,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }
}

/// The hosts holding replicas of one block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockLocation {
    pub offset: u64,
    pub len: u64,
    pub hosts: Vec<String>,
}

/// What `connect` should resolve to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    /// The local disk.
    Local,
    /// Whatever `fs.default.name` names.
    Default,
    /// A cluster reachable at `host:port`.
    Remote { host: String, port: u16 },
}

impl Target {
    /// Parse an `fs.default.name` value: `local` or `host:port`.
    pub fn from_default_name(name: &str) -> Result<Self> {
        let name = name.trim();
        let name = name.strip_prefix("hdfs://").unwrap_or(name);
        let name = name.trim_end_matches('/');
        if name.is_empty() || name == "local" || name == "file:" || name == "file://" {
            return Ok(Target::Local);
        }
        let (host, port) = name.rsplit_once(':').ok_or_else(|| {
            Exception::new(
                ExceptionClass::UnknownHost,
                format!("`{name}` is not of the form host:port"),
            )
        })?;
        let port = port.parse().map_err(|_| {
            Exception::new(ExceptionClass::UnknownHost, format!("bad port in `{name}`"))
        })?;
        Ok(Target::Remote {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Local => f.write_str("file:///"),
            Target::Default => f.write_str("default"),
            Target::Remote { host, port } => write!(f, "hdfs://{host}:{port}"),
        }
    }
}

/// Produces filesystem clients for one authority.
pub trait FileSystemFactory: Send + Sync {
    fn connect(&self, authority: &str, conf: &Configuration) -> Result<Arc<dyn FileSystem>>;
}

impl<F> FileSystemFactory for F
where
    F: Fn(&str, &Configuration) -> Result<Arc<dyn FileSystem>> + Send + Sync,
{
    fn connect(&self, authority: &str, conf: &Configuration) -> Result<Arc<dyn FileSystem>> {
        self(authority, conf)
    }
}

// Adapted from cargo's `paths::normalize_path`.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components = path.components().peekable();
    let mut ret = if let Some(c @ Component::Prefix(..)) = components.peek().cloned() {
        components.next();
        PathBuf::from(c.as_os_str())
    } else {
        PathBuf::new()
    };

    for component in components {
        match component {
            Component::Prefix(..) => {}
            Component::RootDir => {
                ret.push(component.as_os_str());
            }
            Component::CurDir => {}
            Component::ParentDir => {
                ret.pop();
            }
            Component::Normal(c) => {
                ret.push(c);
            }
        }
    }
    ret
}

/// Make `path` absolute against `working_directory` and normalize it.
pub fn resolve(working_directory: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize_path(path)
    } else {
        normalize_path(&working_directory.join(path))
    }
}

pub(crate) fn unix_seconds(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    }
}

pub(crate) fn now() -> i64 {
    unix_seconds(SystemTime::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_names() {
        assert_eq!(Target::from_default_name("local").unwrap(), Target::Local);
        assert_eq!(
            Target::from_default_name("hdfs://nn.example.com:8020/").unwrap(),
            Target::Remote {
                host: "nn.example.com".into(),
                port: 8020
            }
        );
        assert_eq!(
            Target::from_default_name("nn").unwrap_err().class(),
            ExceptionClass::UnknownHost
        );
    }

    #[test]
    fn relative_paths_resolve_against_the_working_directory() {
        let cwd = Path::new("/user/alice");
        assert_eq!(resolve(cwd, Path::new("data/../x")), PathBuf::from("/user/alice/x"));
        assert_eq!(resolve(cwd, Path::new("/tmp/./y")), PathBuf::from("/tmp/y"));
        assert_eq!(resolve(cwd, Path::new("/..")), PathBuf::from("/"));
    }
}
