//! The C entry points against in-process clusters.
//!
//! Every test registers its own authority, so tests can run in parallel.

use hdfs::error::{hdfsErrorKind, last_error};
use hdfs::fs::*;
use hdfs::file::*;
use hdfs::info::*;
use hdfs::types::*;
use hdfs_runtime::Runtime;
use hdfs_runtime::fs::MemoryCluster;
use libc::c_char;
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::ffi::{CStr, CString};
use std::ptr;
use std::sync::Arc;

fn start_cluster(host: &str, port: u16, datanodes: &[&str]) -> hdfsFS {
    let authority = format!("{host}:{port}");
    let cluster = MemoryCluster::builder(authority.as_str())
        .datanodes(datanodes.iter().copied())
        .build();
    Runtime::global().register_file_system(authority, Arc::new(cluster));
    let host = CString::new(host).unwrap();
    let fs = unsafe { hdfsConnect(host.as_ptr(), port) };
    assert!(!fs.is_null(), "{:?}", last_error());
    fs
}

fn write_file(fs: hdfsFS, path: &CStr, data: &[u8], replication: i16, block_size: i32) {
    let out = unsafe { hdfsOpenFile(fs, path.as_ptr(), O_WRONLY, 0, replication, block_size) };
    assert!(!out.is_null(), "{:?}", last_error());
    let len = data.len() as tSize;
    assert_eq!(unsafe { hdfsWrite(fs, out, data.as_ptr().cast(), len) }, len);
    assert_eq!(hdfsCloseFile(fs, out), 0);
}

fn read_file(fs: hdfsFS, path: &CStr) -> Vec<u8> {
    let input = unsafe { hdfsOpenFile(fs, path.as_ptr(), O_RDONLY, 0, 0, 0) };
    assert!(!input.is_null(), "{:?}", last_error());
    let mut contents = Vec::new();
    let mut buffer = [0u8; 7];
    loop {
        let n = unsafe { hdfsRead(fs, input, buffer.as_mut_ptr().cast(), buffer.len() as tSize) };
        assert!(n >= 0, "{:?}", last_error());
        if n == 0 {
            break;
        }
        contents.extend_from_slice(&buffer[..n as usize]);
    }
    assert_eq!(hdfsCloseFile(fs, input), 0);
    contents
}

unsafe fn host_rows(hosts: *mut *mut *mut c_char) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    unsafe {
        let mut r = 0;
        while !(*hosts.add(r)).is_null() {
            let row = *hosts.add(r);
            let mut names = Vec::new();
            let mut h = 0;
            while !(*row.add(h)).is_null() {
                names.push(CStr::from_ptr(*row.add(h)).to_str().unwrap().to_string());
                h += 1;
            }
            rows.push(names);
            r += 1;
        }
    }
    rows
}

#[test]
fn blocks_are_replicated_on_distinct_hosts() {
    let fs = start_cluster("hosts-test", 8020, &["dn1", "dn2", "dn3", "dn4"]);
    let data: Vec<u8> = (0..40u8).collect();
    write_file(fs, c"/data/blocks", &data, 3, 16);

    let hosts = unsafe { hdfsGetHosts(fs, c"/data/blocks".as_ptr(), 0, 40) };
    assert!(!hosts.is_null());
    let rows = unsafe { host_rows(hosts) };
    unsafe { hdfsFreeHosts(hosts) };
    assert_eq!(rows.len(), 3);
    for row in &rows {
        assert_eq!(row.len(), 3);
        assert_eq!(row.iter().collect::<HashSet<_>>().len(), 3, "{row:?}");
    }

    let hosts = unsafe { hdfsGetHosts(fs, c"/data/blocks".as_ptr(), 20, 1) };
    assert_eq!(unsafe { host_rows(hosts) }.len(), 1);
    unsafe { hdfsFreeHosts(hosts) };

    let hosts = unsafe { hdfsGetHosts(fs, c"/data/blocks".as_ptr(), 20, 0) };
    assert!(!hosts.is_null());
    assert!(unsafe { host_rows(hosts) }.is_empty());
    unsafe { hdfsFreeHosts(hosts) };

    let info = unsafe { hdfsGetPathInfo(fs, c"/data/blocks".as_ptr()) };
    assert!(!info.is_null());
    assert_eq!(unsafe { (*info).replicaCount }, 3);
    assert_eq!(unsafe { (*info).mSize }, 40);
    unsafe { hdfsFreeFileInfo(info, 1) };

    assert_eq!(read_file(fs, c"/data/blocks"), data);
    assert_eq!(hdfsGetUsed(fs), 40 * 3);

    assert_eq!(unsafe { hdfsSetReplication(fs, c"/data/blocks".as_ptr(), 2) }, 0);
    let hosts = unsafe { hdfsGetHosts(fs, c"/data/blocks".as_ptr(), 0, 40) };
    assert!(unsafe { host_rows(hosts) }.iter().all(|row| row.len() == 2));
    unsafe { hdfsFreeHosts(hosts) };
    assert_eq!(unsafe { hdfsSetReplication(fs, c"/data/blocks".as_ptr(), 0) }, -1);
    assert_eq!(last_error().unwrap().kind, hdfsErrorKind::InvalidArgument);

    assert_eq!(hdfsDisconnect(fs), 0);
}

#[test]
fn copy_and_move_between_local_and_cluster() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("source"), b"local bytes").unwrap();
    let source = CString::new(dir.path().join("source").to_str().unwrap()).unwrap();
    let back = CString::new(dir.path().join("back").to_str().unwrap()).unwrap();

    let local = unsafe { hdfsConnect(ptr::null(), 0) };
    let cluster = start_cluster("copy-test", 9000, &["dn1", "dn2"]);

    assert_eq!(unsafe { hdfsCopy(local, source.as_ptr(), cluster, c"/copied".as_ptr()) }, 0);
    assert_eq!(read_file(cluster, c"/copied"), b"local bytes");
    assert!(dir.path().join("source").exists());

    assert_eq!(unsafe { hdfsCopy(local, source.as_ptr(), cluster, c"/copied".as_ptr()) }, -1);
    assert_eq!(last_error().unwrap().kind, hdfsErrorKind::AlreadyExists);

    assert_eq!(unsafe { hdfsMove(cluster, c"/copied".as_ptr(), local, back.as_ptr()) }, 0);
    assert_eq!(std::fs::read(dir.path().join("back")).unwrap(), b"local bytes");
    assert_eq!(unsafe { hdfsExists(cluster, c"/copied".as_ptr()) }, -1);
    assert_eq!(last_error().unwrap().kind, hdfsErrorKind::NotFound);

    assert_eq!(hdfsDisconnect(cluster), 0);
    assert_eq!(hdfsDisconnect(local), 0);
}

#[test]
fn directories_cannot_be_copied_into_themselves() {
    let fs = start_cluster("self-copy-test", 8020, &["dn1"]);
    write_file(fs, c"/a/file", b"payload", 0, 0);

    for dst in [c"/a", c"/a/b", c"/a/file/deeper"] {
        assert_eq!(unsafe { hdfsCopy(fs, c"/a".as_ptr(), fs, dst.as_ptr()) }, -1);
        assert_eq!(last_error().unwrap().kind, hdfsErrorKind::InvalidArgument);
    }
    assert_eq!(unsafe { hdfsMove(fs, c"/a".as_ptr(), fs, c"/a/b".as_ptr()) }, -1);
    assert_eq!(last_error().unwrap().kind, hdfsErrorKind::InvalidArgument);
    assert_eq!(unsafe { hdfsExists(fs, c"/a/b".as_ptr()) }, -1);
    assert_eq!(read_file(fs, c"/a/file"), b"payload");

    assert_eq!(unsafe { hdfsCopy(fs, c"/a".as_ptr(), fs, c"/ab".as_ptr()) }, 0);
    assert_eq!(read_file(fs, c"/ab/file"), b"payload");

    assert_eq!(hdfsDisconnect(fs), 0);
}

#[test]
fn locks_conflict_unless_shared() {
    let fs = start_cluster("lock-test", 8020, &["dn1"]);
    write_file(fs, c"/locked", b"x", 0, 0);

    assert_eq!(unsafe { hdfsLock(fs, c"/locked".as_ptr(), 0) }, 0);
    assert_eq!(unsafe { hdfsLock(fs, c"/locked".as_ptr(), 0) }, -1);
    assert_eq!(last_error().unwrap().kind, hdfsErrorKind::IOFailure);
    assert_eq!(unsafe { hdfsLock(fs, c"/locked".as_ptr(), 1) }, -1);
    assert_eq!(unsafe { hdfsReleaseLock(fs, c"/locked".as_ptr()) }, 0);

    assert_eq!(unsafe { hdfsLock(fs, c"/locked".as_ptr(), 1) }, 0);
    assert_eq!(unsafe { hdfsLock(fs, c"/locked".as_ptr(), 1) }, 0);
    assert_eq!(unsafe { hdfsReleaseLock(fs, c"/locked".as_ptr()) }, 0);
    assert_eq!(unsafe { hdfsReleaseLock(fs, c"/locked".as_ptr()) }, 0);

    assert_eq!(unsafe { hdfsReleaseLock(fs, c"/locked".as_ptr()) }, -1);
    assert_eq!(last_error().unwrap().kind, hdfsErrorKind::InvalidState);

    assert_eq!(hdfsDisconnect(fs), 0);
}

#[test]
fn writers_exclude_each_other() {
    let fs = start_cluster("writer-test", 8020, &["dn1"]);

    let first = unsafe { hdfsOpenFile(fs, c"/busy".as_ptr(), O_WRONLY, 0, 0, 0) };
    assert!(!first.is_null());
    assert!(unsafe { hdfsOpenFile(fs, c"/busy".as_ptr(), O_WRONLY, 0, 0, 0) }.is_null());
    assert_eq!(last_error().unwrap().kind, hdfsErrorKind::AlreadyExists);
    assert_eq!(hdfsCloseFile(fs, first), 0);

    assert_eq!(unsafe { hdfsDelete(fs, c"/".as_ptr()) }, -1);
    assert_eq!(last_error().unwrap().kind, hdfsErrorKind::InvalidArgument);

    assert_eq!(hdfsDisconnect(fs), 0);
}

#[test]
fn default_target_follows_configuration() {
    let runtime = Runtime::global();
    let original = runtime.configuration();
    assert_eq!(original.default_name, "local");

    let fs = unsafe { hdfsConnect(c"default".as_ptr(), 0) };
    assert!(!fs.is_null());
    assert_eq!(hdfsGetDefaultBlockSize(fs), original.local_block_size as tOffset);
    assert_eq!(hdfsDisconnect(fs), 0);

    assert!(unsafe { hdfsConnect(c"default".as_ptr(), 8020) }.is_null());
    assert_eq!(last_error().unwrap().kind, hdfsErrorKind::ConnectionFailure);

    let cluster = MemoryCluster::builder("default-test:8020").build();
    runtime.register_file_system("default-test:8020", Arc::new(cluster));
    let mut conf = original.clone();
    conf.default_name = "default-test:8020".to_string();
    runtime.set_configuration(conf);

    let fs = unsafe { hdfsConnect(c"default".as_ptr(), 0) };
    runtime.set_configuration(original);
    assert!(!fs.is_null(), "{:?}", last_error());
    let mut buffer = [0 as c_char; 16];
    let cwd = unsafe { hdfsGetWorkingDirectory(fs, buffer.as_mut_ptr(), buffer.len()) };
    assert_eq!(unsafe { CStr::from_ptr(cwd) }.to_str().unwrap(), "/");
    assert_eq!(hdfsGetDefaultBlockSize(fs), 64 * 1024 * 1024);
    assert_eq!(hdfsDisconnect(fs), 0);
}
