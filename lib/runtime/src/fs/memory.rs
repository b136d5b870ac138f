//! An in-process cluster.
//!
//! One namespace shared by every client connected to the cluster's
//! authority, with file contents split into blocks and each block
//! replicated onto a set of datanode hosts. Clients only see the
//! [`FileSystem`] interface; how blocks are placed is private.

use super::{
    BlockLocation, CreateOptions, FileStatus, FileSystem, InputStream, LockTable, OutputStream,
    now, resolve,
};
use crate::conf::Configuration;
use crate::error::{Exception, Result};
use bytes::{Bytes, BytesMut};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

const DEFAULT_DATANODE_CAPACITY: u64 = 1 << 40;

#[derive(Debug)]
struct Block {
    data: Bytes,
    hosts: Vec<String>,
}

#[derive(Debug)]
struct FileNode {
    blocks: Vec<Block>,
    replication: u16,
    block_size: u64,
    modification_time: i64,
    under_construction: bool,
}

impl FileNode {
    fn len(&self) -> u64 {
        self.blocks.iter().map(|b| b.data.len() as u64).sum()
    }
}

#[derive(Debug)]
enum INode {
    Directory { modification_time: i64 },
    File(FileNode),
}

#[derive(Debug)]
struct ClusterInner {
    authority: String,
    conf: Configuration,
    datanodes: Vec<String>,
    datanode_capacity: u64,
    namespace: RwLock<BTreeMap<PathBuf, INode>>,
    locks: LockTable,
    placement_cursor: AtomicUsize,
}

impl ClusterInner {
    /// Pick `replication` distinct hosts, rotating the starting node.
    fn place(&self, replication: u16, exclude: &[String]) -> Vec<String> {
        let candidates: Vec<&String> = self
            .datanodes
            .iter()
            .filter(|host| !exclude.contains(host))
            .collect();
        if candidates.is_empty() {
            return Vec::new();
        }
        let start = self.placement_cursor.fetch_add(1, Ordering::Relaxed);
        (0..usize::from(replication).min(candidates.len()))
            .map(|i| candidates[(start + i) % candidates.len()].clone())
            .collect()
    }

    fn status_of(path: &Path, node: &INode) -> FileStatus {
        match node {
            INode::Directory { modification_time } => {
                FileStatus::directory(path.to_path_buf(), *modification_time)
            }
            INode::File(file) => FileStatus::file(
                path.to_path_buf(),
                file.len(),
                file.modification_time,
                file.replication,
                file.block_size,
            ),
        }
    }

    /// Append `data` to the file at `path`, filling the last block first.
    fn append(&self, path: &Path, mut data: &[u8]) -> Result<()> {
        let mut namespace = self.namespace.write();
        let file = match namespace.get_mut(path) {
            Some(INode::File(file)) if file.under_construction => file,
            _ => {
                return Err(Exception::file_not_found(format!(
                    "{} (no lease, the file was removed while open)",
                    path.display()
                )));
            }
        };
        let block_size = usize::try_from(file.block_size).unwrap_or(usize::MAX).max(1);
        while !data.is_empty() {
            match file.blocks.last_mut() {
                Some(last) if last.data.len() < block_size => {
                    let take = data.len().min(block_size - last.data.len());
                    let mut grown = BytesMut::with_capacity(last.data.len() + take);
                    grown.extend_from_slice(&last.data);
                    grown.extend_from_slice(&data[..take]);
                    last.data = grown.freeze();
                    data = &data[take..];
                }
                _ => {
                    let take = data.len().min(block_size);
                    let hosts = self.place(file.replication, &[]);
                    file.blocks.push(Block {
                        data: Bytes::copy_from_slice(&data[..take]),
                        hosts,
                    });
                    data = &data[take..];
                }
            }
        }
        file.modification_time = now();
        Ok(())
    }

    fn read_at(&self, path: &Path, position: u64, buf: &mut [u8]) -> Result<usize> {
        let namespace = self.namespace.read();
        let file = match namespace.get(path) {
            Some(INode::File(file)) => file,
            Some(INode::Directory { .. }) => {
                return Err(Exception::io(format!("{} is a directory", path.display())));
            }
            None => return Err(Exception::file_not_found(path.display())),
        };
        let mut offset = 0u64;
        for block in &file.blocks {
            let len = block.data.len() as u64;
            if position < offset + len {
                let start = (position - offset) as usize;
                let n = buf.len().min(block.data.len() - start);
                buf[..n].copy_from_slice(&block.data[start..start + n]);
                return Ok(n);
            }
            offset += len;
        }
        Ok(0)
    }

    /// Bytes left in the block containing `position`.
    fn remaining_in_block(&self, path: &Path, position: u64) -> Result<usize> {
        let namespace = self.namespace.read();
        let Some(INode::File(file)) = namespace.get(path) else {
            return Err(Exception::file_not_found(path.display()));
        };
        let mut offset = 0u64;
        for block in &file.blocks {
            let len = block.data.len() as u64;
            if position < offset + len {
                return Ok((offset + len - position) as usize);
            }
            offset += len;
        }
        Ok(0)
    }

    fn len_of(&self, path: &Path) -> Result<u64> {
        match self.namespace.read().get(path) {
            Some(INode::File(file)) => Ok(file.len()),
            _ => Err(Exception::file_not_found(path.display())),
        }
    }

    fn complete(&self, path: &Path) {
        if let Some(INode::File(file)) = self.namespace.write().get_mut(path) {
            file.under_construction = false;
        }
    }
}

fn descendants<'a>(
    namespace: &'a BTreeMap<PathBuf, INode>,
    root: &'a Path,
) -> impl Iterator<Item = &'a PathBuf> + 'a {
    namespace
        .range(root.to_path_buf()..)
        .map(|(path, _)| path)
        .take_while(move |path| path.starts_with(root))
}

/// Builder for [`MemoryCluster`].
#[derive(Debug)]
pub struct MemoryClusterBuilder {
    authority: String,
    conf: Configuration,
    datanodes: Vec<String>,
    datanode_capacity: u64,
}

impl MemoryClusterBuilder {
    pub fn datanodes<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.datanodes = hosts.into_iter().map(Into::into).collect();
        self
    }

    pub fn datanode_capacity(mut self, bytes: u64) -> Self {
        self.datanode_capacity = bytes;
        self
    }

    pub fn configuration(mut self, conf: Configuration) -> Self {
        self.conf = conf;
        self
    }

    pub fn build(self) -> MemoryCluster {
        let mut namespace = BTreeMap::new();
        namespace.insert(
            PathBuf::from("/"),
            INode::Directory {
                modification_time: now(),
            },
        );
        MemoryCluster {
            inner: Arc::new(ClusterInner {
                authority: self.authority,
                conf: self.conf,
                datanodes: self.datanodes,
                datanode_capacity: self.datanode_capacity,
                namespace: RwLock::new(namespace),
                locks: LockTable::new(),
                placement_cursor: AtomicUsize::new(0),
            }),
        }
    }
}

/// A cluster living in this process. Cloning shares the cluster.
#[derive(Clone, Debug)]
pub struct MemoryCluster {
    inner: Arc<ClusterInner>,
}

impl MemoryCluster {
    /// A cluster reachable as `authority` (`host:port`).
    pub fn builder(authority: impl Into<String>) -> MemoryClusterBuilder {
        MemoryClusterBuilder {
            authority: authority.into(),
            conf: Configuration::default(),
            datanodes: vec!["localhost".to_string()],
            datanode_capacity: DEFAULT_DATANODE_CAPACITY,
        }
    }

    pub fn authority(&self) -> &str {
        &self.inner.authority
    }

    /// A fresh client with its own working directory.
    pub fn client(&self) -> Arc<dyn FileSystem> {
        Arc::new(ClusterClient {
            cluster: self.inner.clone(),
            working_directory: RwLock::new(PathBuf::from("/")),
        })
    }
}

impl super::FileSystemFactory for MemoryCluster {
    fn connect(&self, authority: &str, _conf: &Configuration) -> Result<Arc<dyn FileSystem>> {
        if authority != self.inner.authority {
            return Err(Exception::connect(authority));
        }
        Ok(self.client())
    }
}

#[derive(Debug)]
struct ClusterClient {
    cluster: Arc<ClusterInner>,
    working_directory: RwLock<PathBuf>,
}

impl ClusterClient {
    fn path(&self, path: &Path) -> PathBuf {
        resolve(&self.working_directory.read(), path)
    }

    fn mkdirs(namespace: &mut BTreeMap<PathBuf, INode>, path: &Path) -> Result<()> {
        let mut ancestors: Vec<&Path> = path.ancestors().collect();
        ancestors.reverse();
        for dir in ancestors {
            match namespace.get(dir) {
                Some(INode::Directory { .. }) => {}
                Some(INode::File(_)) => return Err(Exception::already_exists(dir.display())),
                None => {
                    namespace.insert(
                        dir.to_path_buf(),
                        INode::Directory {
                            modification_time: now(),
                        },
                    );
                }
            }
        }
        Ok(())
    }
}

impl FileSystem for ClusterClient {
    fn uri(&self) -> String {
        format!("hdfs://{}", self.cluster.authority)
    }

    fn working_directory(&self) -> PathBuf {
        self.working_directory.read().clone()
    }

    fn set_working_directory(&self, path: &Path) -> Result<()> {
        let path = self.path(path);
        *self.working_directory.write() = path;
        Ok(())
    }

    fn open(&self, path: &Path, buffer_size: usize) -> Result<Box<dyn InputStream>> {
        let path = self.path(path);
        match self.cluster.namespace.read().get(&path) {
            Some(INode::File(_)) => {}
            Some(INode::Directory { .. }) => {
                return Err(Exception::io(format!("{} is a directory", path.display())));
            }
            None => return Err(Exception::file_not_found(path.display())),
        }
        Ok(Box::new(ClusterInputStream {
            cluster: self.cluster.clone(),
            path,
            position: 0,
            buffer_size: self.cluster.conf.buffer_size_or_default(buffer_size),
        }))
    }

    fn create(&self, path: &Path, options: &CreateOptions) -> Result<Box<dyn OutputStream>> {
        let path = self.path(path);
        let conf = &self.cluster.conf;
        let replication = conf.replication_or_default(options.replication);
        let block_size = conf.block_size_or_default(options.block_size);
        {
            let mut namespace = self.cluster.namespace.write();
            match namespace.get(&path) {
                Some(INode::Directory { .. }) => {
                    return Err(Exception::already_exists(path.display()));
                }
                Some(INode::File(file)) if file.under_construction => {
                    return Err(Exception::already_exists(format!(
                        "{} (being created by another client)",
                        path.display()
                    )));
                }
                Some(INode::File(_)) if !options.overwrite => {
                    return Err(Exception::already_exists(path.display()));
                }
                _ => {}
            }
            if let Some(parent) = path.parent() {
                Self::mkdirs(&mut namespace, parent)?;
            }
            namespace.insert(
                path.clone(),
                INode::File(FileNode {
                    blocks: Vec::new(),
                    replication,
                    block_size,
                    modification_time: now(),
                    under_construction: true,
                }),
            );
        }
        tracing::debug!(path = %path.display(), replication, block_size, "created file");
        Ok(Box::new(ClusterOutputStream {
            cluster: self.cluster.clone(),
            path,
            buffer: Vec::new(),
            buffer_size: conf.buffer_size_or_default(options.buffer_size),
            position: 0,
            closed: false,
        }))
    }

    fn delete(&self, path: &Path) -> Result<()> {
        let path = self.path(path);
        if path.parent().is_none() {
            return Err(Exception::illegal_argument("cannot delete the root directory"));
        }
        let mut namespace = self.cluster.namespace.write();
        if !namespace.contains_key(&path) {
            return Err(Exception::file_not_found(path.display()));
        }
        let doomed: Vec<PathBuf> = descendants(&namespace, &path).cloned().collect();
        for victim in doomed {
            namespace.remove(&victim);
        }
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let (from, to) = (self.path(from), self.path(to));
        let mut namespace = self.cluster.namespace.write();
        if !namespace.contains_key(&from) {
            return Err(Exception::file_not_found(from.display()));
        }
        if namespace.contains_key(&to) {
            return Err(Exception::already_exists(to.display()));
        }
        if to.starts_with(&from) {
            return Err(Exception::illegal_argument(format!(
                "cannot move {} below itself",
                from.display()
            )));
        }
        match to.parent().and_then(|parent| namespace.get(parent)) {
            Some(INode::Directory { .. }) => {}
            _ => {
                return Err(Exception::file_not_found(format!(
                    "parent of {}",
                    to.display()
                )));
            }
        }
        let moved: Vec<PathBuf> = descendants(&namespace, &from).cloned().collect();
        for old in moved {
            if let Some(node) = namespace.remove(&old) {
                let suffix = old.strip_prefix(&from).unwrap_or(Path::new(""));
                let new = if suffix.as_os_str().is_empty() {
                    to.clone()
                } else {
                    to.join(suffix)
                };
                namespace.insert(new, node);
            }
        }
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let path = self.path(path);
        Self::mkdirs(&mut self.cluster.namespace.write(), &path)
    }

    fn status(&self, path: &Path) -> Result<FileStatus> {
        let path = self.path(path);
        let namespace = self.cluster.namespace.read();
        let node = namespace
            .get(&path)
            .ok_or_else(|| Exception::file_not_found(path.display()))?;
        Ok(ClusterInner::status_of(&path, node))
    }

    fn list_status(&self, path: &Path) -> Result<Vec<FileStatus>> {
        let path = self.path(path);
        let namespace = self.cluster.namespace.read();
        match namespace.get(&path) {
            None => Err(Exception::file_not_found(path.display())),
            Some(node @ INode::File(_)) => Ok(vec![ClusterInner::status_of(&path, node)]),
            Some(INode::Directory { .. }) => Ok(descendants(&namespace, &path)
                .filter(|child| child.parent() == Some(path.as_path()))
                .filter_map(|child| {
                    namespace
                        .get(child)
                        .map(|node| ClusterInner::status_of(child, node))
                })
                .collect()),
        }
    }

    fn block_locations(&self, path: &Path, start: u64, len: u64) -> Result<Vec<BlockLocation>> {
        let path = self.path(path);
        let namespace = self.cluster.namespace.read();
        let file = match namespace.get(&path) {
            Some(INode::File(file)) => file,
            Some(INode::Directory { .. }) => return Ok(Vec::new()),
            None => return Err(Exception::file_not_found(path.display())),
        };
        if len == 0 {
            return Ok(Vec::new());
        }
        let end = start.saturating_add(len);
        let mut offset = 0u64;
        let mut locations = Vec::new();
        for block in &file.blocks {
            let block_len = block.data.len() as u64;
            if offset < end && start < offset + block_len {
                locations.push(BlockLocation {
                    offset,
                    len: block_len,
                    hosts: block.hosts.clone(),
                });
            }
            offset += block_len;
        }
        Ok(locations)
    }

    fn set_replication(&self, path: &Path, replication: u16) -> Result<()> {
        if replication == 0 {
            return Err(Exception::illegal_argument("replication must be positive"));
        }
        let path = self.path(path);
        let mut namespace = self.cluster.namespace.write();
        let file = match namespace.get_mut(&path) {
            Some(INode::File(file)) => file,
            Some(INode::Directory { .. }) => {
                return Err(Exception::io(format!("{} is a directory", path.display())));
            }
            None => return Err(Exception::file_not_found(path.display())),
        };
        file.replication = replication;
        let wanted = usize::from(replication);
        for block in &mut file.blocks {
            if block.hosts.len() > wanted {
                block.hosts.truncate(wanted);
            } else if block.hosts.len() < wanted {
                let missing = u16::try_from(wanted - block.hosts.len()).unwrap_or(u16::MAX);
                let extra = self.cluster.place(missing, &block.hosts);
                block.hosts.extend(extra);
            }
        }
        Ok(())
    }

    fn default_block_size(&self) -> u64 {
        self.cluster.conf.block_size
    }

    fn default_replication(&self) -> u16 {
        self.cluster.conf.replication
    }

    fn capacity(&self) -> Result<u64> {
        Ok(self.cluster.datanode_capacity * self.cluster.datanodes.len() as u64)
    }

    fn used(&self) -> Result<u64> {
        let namespace = self.cluster.namespace.read();
        let used = namespace
            .values()
            .filter_map(|node| match node {
                INode::File(file) => Some(&file.blocks),
                INode::Directory { .. } => None,
            })
            .flatten()
            .map(|block| block.data.len() as u64 * block.hosts.len() as u64)
            .sum();
        Ok(used)
    }

    fn lock(&self, path: &Path, shared: bool) -> Result<()> {
        let path = self.path(path);
        if !self.cluster.namespace.read().contains_key(&path) {
            return Err(Exception::file_not_found(path.display()));
        }
        self.cluster.locks.lock(&path, shared)
    }

    fn release(&self, path: &Path) -> Result<()> {
        self.cluster.locks.release(&self.path(path))
    }
}

#[derive(Debug)]
struct ClusterInputStream {
    cluster: Arc<ClusterInner>,
    path: PathBuf,
    position: u64,
    buffer_size: usize,
}

impl InputStream for ClusterInputStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        // At most one buffer's worth from one block per call.
        let limit = buf.len().min(self.buffer_size.max(1));
        let read = self
            .cluster
            .read_at(&self.path, self.position, &mut buf[..limit])?;
        self.position += read as u64;
        Ok(read)
    }

    fn read_at(&mut self, position: u64, buf: &mut [u8]) -> Result<usize> {
        self.cluster.read_at(&self.path, position, buf)
    }

    fn seek(&mut self, position: u64) -> Result<()> {
        if position > self.cluster.len_of(&self.path)? {
            return Err(Exception::io(format!(
                "{}: cannot seek to {position}, past end of file",
                self.path.display()
            )));
        }
        self.position = position;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn available(&mut self) -> Result<usize> {
        self.cluster.remaining_in_block(&self.path, self.position)
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug)]
struct ClusterOutputStream {
    cluster: Arc<ClusterInner>,
    path: PathBuf,
    buffer: Vec<u8>,
    buffer_size: usize,
    position: u64,
    closed: bool,
}

impl ClusterOutputStream {
    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Exception::illegal_state(format!(
                "{} is closed",
                self.path.display()
            )));
        }
        Ok(())
    }
}

impl OutputStream for ClusterOutputStream {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.ensure_open()?;
        let pending = self.buffer.len();
        self.buffer.extend_from_slice(buf);
        if self.buffer.len() >= self.buffer_size {
            if let Err(e) = self.flush() {
                self.buffer.truncate(pending);
                return Err(e);
            }
        }
        self.position += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.cluster.append(&self.path, &self.buffer)?;
        self.buffer.clear();
        Ok(())
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let flushed = self.flush();
        self.closed = true;
        self.cluster.complete(&self.path);
        flushed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExceptionClass;
    use crate::fs::FileSystemFactory;
    use pretty_assertions::assert_eq;

    fn cluster() -> MemoryCluster {
        MemoryCluster::builder("nn:8020")
            .datanodes(["dn1", "dn2", "dn3", "dn4"])
            .datanode_capacity(1000)
            .configuration(Configuration {
                block_size: 8,
                replication: 3,
                ..Configuration::default()
            })
            .build()
    }

    fn write(fs: &dyn FileSystem, path: &str, data: &[u8]) {
        let mut out = fs.create(Path::new(path), &CreateOptions::new()).unwrap();
        out.write(data).unwrap();
        out.close().unwrap();
    }

    #[test]
    fn data_is_split_into_replicated_blocks() {
        let fs = cluster().client();
        write(fs.as_ref(), "/a/b/file", b"0123456789abcdefXYZ");

        let status = fs.status(Path::new("/a/b/file")).unwrap();
        assert_eq!(status.len, 19);
        assert_eq!(status.block_size, 8);
        assert!(fs.status(Path::new("/a/b")).unwrap().is_dir());

        let blocks = fs.block_locations(Path::new("/a/b/file"), 0, 19).unwrap();
        assert_eq!(
            blocks.iter().map(|b| (b.offset, b.len)).collect::<Vec<_>>(),
            [(0, 8), (8, 8), (16, 3)]
        );
        for block in &blocks {
            assert_eq!(block.hosts.len(), 3);
            let mut distinct = block.hosts.clone();
            distinct.sort();
            distinct.dedup();
            assert_eq!(distinct.len(), 3);
        }
        assert_eq!(fs.used().unwrap(), 19 * 3);
        assert_eq!(fs.capacity().unwrap(), 4000);

        let tail = fs.block_locations(Path::new("/a/b/file"), 9, 1).unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].offset, 8);
        assert!(fs.block_locations(Path::new("/a/b/file"), 19, 5).unwrap().is_empty());
    }

    #[test]
    fn empty_ranges_have_no_blocks() {
        let fs = cluster().client();
        write(fs.as_ref(), "/f", b"0123456789abcdefXYZ");
        assert!(fs.block_locations(Path::new("/f"), 10, 0).unwrap().is_empty());
        assert!(fs.block_locations(Path::new("/f"), 0, 0).unwrap().is_empty());
        assert_eq!(fs.block_locations(Path::new("/f"), 10, 1).unwrap().len(), 1);
    }

    #[test]
    fn failed_flush_leaves_position_alone() {
        let fs = cluster().client();
        let options = CreateOptions::new().buffer_size(4);
        let mut out = fs.create(Path::new("/gone"), &options).unwrap();
        assert_eq!(out.write(b"ab").unwrap(), 2);
        fs.delete(Path::new("/gone")).unwrap();

        let err = out.write(b"cdef").unwrap_err();
        assert_eq!(err.class(), ExceptionClass::FileNotFound);
        assert_eq!(out.position(), 2);
    }

    #[test]
    fn reads_stop_at_block_boundaries() {
        let fs = cluster().client();
        write(fs.as_ref(), "/f", b"0123456789");
        let mut input = fs.open(Path::new("/f"), 0).unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(input.available().unwrap(), 8);
        assert_eq!(input.read(&mut buf).unwrap(), 8);
        assert_eq!(input.available().unwrap(), 2);
        assert_eq!(input.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"89");
        assert_eq!(input.read(&mut buf).unwrap(), 0);

        input.seek(3).unwrap();
        assert_eq!(input.position(), 3);
        assert_eq!(input.read_at(8, &mut buf).unwrap(), 2);
        assert_eq!(input.position(), 3);
        assert_eq!(input.seek(11).unwrap_err().class(), ExceptionClass::Io);
    }

    #[test]
    fn flushed_bytes_become_visible_before_close() {
        let fs = cluster().client();
        let mut out = fs.create(Path::new("/log"), &CreateOptions::new()).unwrap();
        out.write(b"abc").unwrap();
        assert_eq!(fs.status(Path::new("/log")).unwrap().len, 0);
        out.flush().unwrap();
        assert_eq!(fs.status(Path::new("/log")).unwrap().len, 3);

        let second = fs.create(Path::new("/log"), &CreateOptions::new());
        assert_eq!(
            second.unwrap_err().class(),
            ExceptionClass::FileAlreadyExists
        );
        out.close().unwrap();
        assert_eq!(out.write(b"x").unwrap_err().class(), ExceptionClass::IllegalState);
    }

    #[test]
    fn namespace_operations() {
        let cluster = cluster();
        let fs = cluster.client();
        write(fs.as_ref(), "/d/x", b"x");
        write(fs.as_ref(), "/d/y", b"y");
        fs.create_dir_all(Path::new("/d/sub/deeper")).unwrap();

        let names: Vec<_> = fs
            .list_status(Path::new("/d"))
            .unwrap()
            .into_iter()
            .map(|s| s.path)
            .collect();
        assert_eq!(
            names,
            [
                PathBuf::from("/d/sub"),
                PathBuf::from("/d/x"),
                PathBuf::from("/d/y")
            ]
        );

        fs.rename(Path::new("/d"), Path::new("/e")).unwrap();
        assert!(fs.exists(Path::new("/e/sub/deeper")).unwrap());
        assert!(!fs.exists(Path::new("/d")).unwrap());
        assert_eq!(
            fs.rename(Path::new("/e/x"), Path::new("/e/y")).unwrap_err().class(),
            ExceptionClass::FileAlreadyExists
        );

        // Another client of the same cluster sees the same namespace.
        let other = cluster.connect("nn:8020", &Configuration::default()).unwrap();
        other.set_working_directory(Path::new("/e")).unwrap();
        assert_eq!(other.status(Path::new("x")).unwrap().len, 1);

        fs.delete(Path::new("/e")).unwrap();
        assert!(!other.exists(Path::new("/e/x")).unwrap());
        assert_eq!(
            fs.delete(Path::new("/e")).unwrap_err().class(),
            ExceptionClass::FileNotFound
        );
    }

    #[test]
    fn replication_changes_move_replicas() {
        let fs = cluster().client();
        write(fs.as_ref(), "/r", b"0123456789");
        fs.set_replication(Path::new("/r"), 1).unwrap();
        let blocks = fs.block_locations(Path::new("/r"), 0, 10).unwrap();
        assert!(blocks.iter().all(|b| b.hosts.len() == 1));

        fs.set_replication(Path::new("/r"), 4).unwrap();
        let blocks = fs.block_locations(Path::new("/r"), 0, 10).unwrap();
        assert!(blocks.iter().all(|b| b.hosts.len() == 4));
        assert_eq!(fs.status(Path::new("/r")).unwrap().replication, 4);
    }

    #[test]
    fn unknown_authorities_are_refused() {
        let err = cluster()
            .connect("elsewhere:1", &Configuration::default())
            .unwrap_err();
        assert_eq!(err.class(), ExceptionClass::Connect);
    }
}
