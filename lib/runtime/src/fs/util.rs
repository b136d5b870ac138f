use super::{CreateOptions, FileSystem, resolve};
use crate::conf::Configuration;
use crate::error::{Exception, Result};
use std::path::Path;

/// Copy `src` on `src_fs` to `dst` on `dst_fs`, recursively for
/// directories. With `delete_source` the source is removed once every
/// byte has been written, which makes this a move across filesystems.
pub fn copy(
    src_fs: &dyn FileSystem,
    src: &Path,
    dst_fs: &dyn FileSystem,
    dst: &Path,
    delete_source: bool,
    conf: &Configuration,
) -> Result<()> {
    if src_fs.uri() == dst_fs.uri() {
        let from = resolve(&src_fs.working_directory(), src);
        let to = resolve(&dst_fs.working_directory(), dst);
        if to.starts_with(&from) {
            return Err(Exception::illegal_argument(format!(
                "cannot copy {} into itself ({})",
                from.display(),
                to.display()
            )));
        }
    }
    if dst_fs.exists(dst)? {
        return Err(Exception::already_exists(dst.display()));
    }
    copy_tree(src_fs, src, dst_fs, dst, conf)?;
    if delete_source {
        src_fs.delete(src)?;
    }
    tracing::debug!(
        from = %format!("{}{}", src_fs.uri(), src.display()),
        to = %format!("{}{}", dst_fs.uri(), dst.display()),
        delete_source,
        "copied"
    );
    Ok(())
}

fn copy_tree(
    src_fs: &dyn FileSystem,
    src: &Path,
    dst_fs: &dyn FileSystem,
    dst: &Path,
    conf: &Configuration,
) -> Result<()> {
    let status = src_fs.status(src)?;
    if status.is_dir() {
        let children = src_fs.list_status(src)?;
        dst_fs.create_dir_all(dst)?;
        for child in children {
            let Some(name) = child.path.file_name() else {
                continue;
            };
            copy_tree(src_fs, &child.path, dst_fs, &dst.join(name), conf)?;
        }
        return Ok(());
    }

    let mut input = src_fs.open(src, conf.buffer_size)?;
    let options = CreateOptions::new()
        .overwrite(false)
        .buffer_size(conf.buffer_size)
        .replication(dst_fs.default_replication())
        .block_size(dst_fs.default_block_size());
    let mut output = dst_fs.create(dst, &options)?;
    let mut buf = vec![0u8; conf.buffer_size.max(1)];
    let copied = loop {
        let read = match input.read(&mut buf) {
            Ok(0) => break Ok(()),
            Ok(read) => read,
            Err(e) => break Err(e),
        };
        if let Err(e) = output.write(&buf[..read]) {
            break Err(e);
        }
    };
    // Both streams are closed even when the copy failed half way.
    let closed_out = output.close();
    let closed_in = input.close();
    copied.and(closed_out).and(closed_in)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExceptionClass;
    use crate::fs::{LocalFileSystem, MemoryCluster};
    use pretty_assertions::assert_eq;
    use std::fs;

    #[test]
    fn copies_trees_between_filesystems() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/inner")).unwrap();
        fs::write(dir.path().join("src/top"), b"top").unwrap();
        fs::write(dir.path().join("src/inner/leaf"), vec![9u8; 10_000]).unwrap();

        let conf = Configuration::default();
        let local = LocalFileSystem::new(&conf).unwrap();
        let cluster = MemoryCluster::builder("nn:1").build().client();

        copy(&local, &dir.path().join("src"), cluster.as_ref(), Path::new("/dst"), false, &conf)
            .unwrap();
        assert_eq!(cluster.status(Path::new("/dst/top")).unwrap().len, 3);
        assert_eq!(cluster.status(Path::new("/dst/inner/leaf")).unwrap().len, 10_000);
        assert!(dir.path().join("src").exists());

        let err = copy(&local, &dir.path().join("src"), cluster.as_ref(), Path::new("/dst"), false, &conf)
            .unwrap_err();
        assert_eq!(err.class(), ExceptionClass::FileAlreadyExists);

        copy(cluster.as_ref(), Path::new("/dst"), &local, &dir.path().join("back"), true, &conf)
            .unwrap();
        assert!(!cluster.exists(Path::new("/dst")).unwrap());
        assert_eq!(fs::read(dir.path().join("back/top")).unwrap(), b"top");
        assert_eq!(fs::read(dir.path().join("back/inner/leaf")).unwrap().len(), 10_000);
    }

    #[test]
    fn refuses_to_copy_a_directory_into_itself() {
        let conf = Configuration::default();
        let cluster = MemoryCluster::builder("nn:2").build().client();
        cluster.create_dir_all(Path::new("/a/inner")).unwrap();

        for dst in ["/a", "/a/b", "/a/inner/deeper"] {
            let err = copy(cluster.as_ref(), Path::new("/a"), cluster.as_ref(), Path::new(dst), false, &conf)
                .unwrap_err();
            assert_eq!(err.class(), ExceptionClass::IllegalArgument, "{dst}");
        }
        assert!(!cluster.exists(Path::new("/a/b")).unwrap());

        cluster.set_working_directory(Path::new("/a")).unwrap();
        let err = copy(cluster.as_ref(), Path::new("."), cluster.as_ref(), Path::new("sub"), true, &conf)
            .unwrap_err();
        assert_eq!(err.class(), ExceptionClass::IllegalArgument);

        copy(cluster.as_ref(), Path::new("/a"), cluster.as_ref(), Path::new("/ab"), false, &conf).unwrap();
        assert!(cluster.status(Path::new("/ab/inner")).unwrap().is_dir());
    }
}
