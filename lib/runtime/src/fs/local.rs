use super::{
    BlockLocation, CreateOptions, FileStatus, FileSystem, InputStream, LockTable, OutputStream,
    resolve, unix_seconds,
};
use crate::conf::Configuration;
use crate::error::{Exception, Result};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::fs::{self, File, Metadata};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

// Locks on the local disk are visible to every client in the process.
static LOCAL_LOCKS: Lazy<LockTable> = Lazy::new(LockTable::new);

const LOCAL_HOST: &str = "localhost";

/// The local disk, seen through the filesystem client interface.
#[derive(Debug)]
pub struct LocalFileSystem {
    conf: Configuration,
    working_directory: RwLock<PathBuf>,
}

impl LocalFileSystem {
    pub fn new(conf: &Configuration) -> Result<Self> {
        let cwd = std::env::current_dir()?;
        Ok(Self {
            conf: conf.clone(),
            working_directory: RwLock::new(super::normalize_path(&cwd)),
        })
    }

    fn path(&self, path: &Path) -> PathBuf {
        resolve(&self.working_directory.read(), path)
    }

    fn metadata(path: &Path) -> Result<Metadata> {
        fs::metadata(path).map_err(|e| Exception::from_io(e, path.display()))
    }

    fn to_status(&self, path: PathBuf, metadata: &Metadata) -> FileStatus {
        let modified = metadata.modified().map(unix_seconds).unwrap_or_default();
        if metadata.is_dir() {
            FileStatus::directory(path, modified)
        } else {
            FileStatus::file(path, metadata.len(), modified, 1, self.conf.local_block_size)
        }
    }

    fn disk_usage(&self) -> Result<DiskUsage> {
        let dir = self.working_directory.read().clone();
        disk_usage(&dir).map_err(|e| Exception::from_io(e, dir.display()))
    }
}

#[derive(Debug, Clone, Copy)]
struct DiskUsage {
    capacity: u64,
    used: u64,
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        fn disk_usage(dir: &Path) -> std::io::Result<DiskUsage> {
            use std::ffi::CString;
            use std::os::unix::ffi::OsStrExt;

            let c_path = CString::new(dir.as_os_str().as_bytes())
                .map_err(|_| std::io::Error::from(std::io::ErrorKind::InvalidInput))?;
            let mut stat = std::mem::MaybeUninit::<libc::statvfs>::uninit();
            // SAFETY: `c_path` is NUL-terminated and `stat` is a valid out pointer.
            let rc = unsafe { libc::statvfs(c_path.as_ptr(), stat.as_mut_ptr()) };
            if rc != 0 {
                return Err(std::io::Error::last_os_error());
            }
            // SAFETY: statvfs succeeded and filled the struct.
            let stat = unsafe { stat.assume_init() };
            let frsize = stat.f_frsize as u64;
            Ok(DiskUsage {
                capacity: stat.f_blocks as u64 * frsize,
                used: (stat.f_blocks as u64).saturating_sub(stat.f_bfree as u64) * frsize,
            })
        }

        fn read_at(file: &File, buf: &mut [u8], position: u64) -> std::io::Result<usize> {
            use std::os::unix::fs::FileExt;
            file.read_at(buf, position)
        }
    } else if #[cfg(windows)] {
        fn disk_usage(_dir: &Path) -> std::io::Result<DiskUsage> {
            Err(std::io::ErrorKind::Unsupported.into())
        }

        // Moves the OS cursor; the caller restores it.
        fn read_at(file: &File, buf: &mut [u8], position: u64) -> std::io::Result<usize> {
            use std::os::windows::fs::FileExt;
            file.seek_read(buf, position)
        }
    } else {
        fn disk_usage(_dir: &Path) -> std::io::Result<DiskUsage> {
            Err(std::io::ErrorKind::Unsupported.into())
        }

        fn read_at(_file: &File, _buf: &mut [u8], _position: u64) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::Unsupported.into())
        }
    }
}

impl FileSystem for LocalFileSystem {
    fn uri(&self) -> String {
        "file:///".to_string()
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
        if Self::metadata(&path)?.is_dir() {
            return Err(Exception::io(format!("{} is a directory", path.display())));
        }
        let file = File::open(&path).map_err(|e| Exception::from_io(e, path.display()))?;
        let capacity = self.conf.buffer_size_or_default(buffer_size);
        Ok(Box::new(LocalInputStream {
            reader: BufReader::with_capacity(capacity, file),
            path,
            position: 0,
        }))
    }

    fn create(&self, path: &Path, options: &CreateOptions) -> Result<Box<dyn OutputStream>> {
        let path = self.path(path);
        match fs::metadata(&path) {
            Ok(metadata) if metadata.is_dir() || !options.overwrite => {
                return Err(Exception::already_exists(path.display()));
            }
            _ => {}
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Exception::from_io(e, parent.display()))?;
        }
        let file = File::create(&path).map_err(|e| Exception::from_io(e, path.display()))?;
        let capacity = self.conf.buffer_size_or_default(options.buffer_size);
        Ok(Box::new(LocalOutputStream {
            writer: Some(BufWriter::with_capacity(capacity, file)),
            path,
            position: 0,
        }))
    }

    fn delete(&self, path: &Path) -> Result<()> {
        let path = self.path(path);
        let result = if Self::metadata(&path)?.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        result.map_err(|e| Exception::from_io(e, path.display()))
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let (from, to) = (self.path(from), self.path(to));
        Self::metadata(&from)?;
        if to.exists() {
            return Err(Exception::already_exists(to.display()));
        }
        fs::rename(&from, &to).map_err(|e| Exception::from_io(e, from.display()))
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let path = self.path(path);
        match fs::metadata(&path) {
            Ok(metadata) if metadata.is_dir() => Ok(()),
            Ok(_) => Err(Exception::already_exists(path.display())),
            Err(_) => fs::create_dir_all(&path).map_err(|e| Exception::from_io(e, path.display())),
        }
    }

    fn status(&self, path: &Path) -> Result<FileStatus> {
        let path = self.path(path);
        let metadata = Self::metadata(&path)?;
        Ok(self.to_status(path, &metadata))
    }

    fn list_status(&self, path: &Path) -> Result<Vec<FileStatus>> {
        let path = self.path(path);
        let metadata = Self::metadata(&path)?;
        if !metadata.is_dir() {
            return Ok(vec![self.to_status(path, &metadata)]);
        }
        let mut entries = fs::read_dir(&path)
            .map_err(|e| Exception::from_io(e, path.display()))?
            .map(|entry| {
                let entry = entry?;
                let metadata = entry.metadata()?;
                Ok(self.to_status(entry.path(), &metadata))
            })
            .collect::<Result<Vec<_>, std::io::Error>>()
            .map_err(|e| Exception::from_io(e, path.display()))?;
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    fn block_locations(&self, path: &Path, start: u64, len: u64) -> Result<Vec<BlockLocation>> {
        let status = self.status(path)?;
        if status.is_dir() || len == 0 || start >= status.len {
            return Ok(Vec::new());
        }
        let block_size = self.conf.local_block_size.max(1);
        let end = start.saturating_add(len).min(status.len);
        let blocks = (start / block_size..end.div_ceil(block_size))
            .map(|index| {
                let offset = index * block_size;
                BlockLocation {
                    offset,
                    len: block_size.min(status.len - offset),
                    hosts: vec![LOCAL_HOST.to_string()],
                }
            })
            .collect();
        Ok(blocks)
    }

    fn set_replication(&self, path: &Path, _replication: u16) -> Result<()> {
        // A local file has exactly one copy whatever is asked for.
        let status = self.status(path)?;
        if status.is_dir() {
            return Err(Exception::io(format!(
                "{} is a directory",
                status.path.display()
            )));
        }
        Ok(())
    }

    fn default_block_size(&self) -> u64 {
        self.conf.local_block_size
    }

    fn default_replication(&self) -> u16 {
        1
    }

    fn capacity(&self) -> Result<u64> {
        Ok(self.disk_usage()?.capacity)
    }

    fn used(&self) -> Result<u64> {
        Ok(self.disk_usage()?.used)
    }

    fn lock(&self, path: &Path, shared: bool) -> Result<()> {
        let path = self.path(path);
        Self::metadata(&path)?;
        LOCAL_LOCKS.lock(&path, shared)
    }

    fn release(&self, path: &Path) -> Result<()> {
        LOCAL_LOCKS.release(&self.path(path))
    }
}

#[derive(Debug)]
struct LocalInputStream {
    reader: BufReader<File>,
    path: PathBuf,
    position: u64,
}

impl LocalInputStream {
    fn len(&self) -> Result<u64> {
        let metadata = self
            .reader
            .get_ref()
            .metadata()
            .map_err(|e| Exception::from_io(e, self.path.display()))?;
        Ok(metadata.len())
    }
}

impl InputStream for LocalInputStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let read = self
            .reader
            .read(buf)
            .map_err(|e| Exception::from_io(e, self.path.display()))?;
        self.position += read as u64;
        Ok(read)
    }

    fn read_at(&mut self, position: u64, buf: &mut [u8]) -> Result<usize> {
        let read = read_at(self.reader.get_ref(), buf, position)
            .map_err(|e| Exception::from_io(e, self.path.display()))?;
        if cfg!(not(unix)) {
            self.reader
                .seek(SeekFrom::Start(self.position))
                .map_err(|e| Exception::from_io(e, self.path.display()))?;
        }
        Ok(read)
    }

    fn seek(&mut self, position: u64) -> Result<()> {
        if position > self.len()? {
            return Err(Exception::io(format!(
                "{}: cannot seek to {position}, past end of file",
                self.path.display()
            )));
        }
        self.reader
            .seek(SeekFrom::Start(position))
            .map_err(|e| Exception::from_io(e, self.path.display()))?;
        self.position = position;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn available(&mut self) -> Result<usize> {
        let remaining = self.len()?.saturating_sub(self.position);
        Ok(usize::try_from(remaining).unwrap_or(usize::MAX))
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug)]
struct LocalOutputStream {
    writer: Option<BufWriter<File>>,
    path: PathBuf,
    position: u64,
}

impl LocalOutputStream {
    fn writer(&mut self) -> Result<&mut BufWriter<File>> {
        self.writer
            .as_mut()
            .ok_or_else(|| Exception::illegal_state(format!("{} is closed", self.path.display())))
    }
}

impl OutputStream for LocalOutputStream {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let path = self.path.display().to_string();
        self.writer()?
            .write_all(buf)
            .map_err(|e| Exception::from_io(e, path))?;
        self.position += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<()> {
        let path = self.path.display().to_string();
        self.writer()?
            .flush()
            .map_err(|e| Exception::from_io(e, path))
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn close(&mut self) -> Result<()> {
        match self.writer.take() {
            Some(mut writer) => writer
                .flush()
                .map_err(|e| Exception::from_io(e, self.path.display())),
            None => Ok(()),
        }
    }
}
