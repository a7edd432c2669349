//! `getattr`/`setattr` (spec.md §4.5).
//!
//! Grounded in the teacher's `fetch_and_cache_attributes` cache-miss
//! strategy (check root, check attribute cache, else resolve from the
//! backing store) but resolving against the [`DocumentStore`] instead of
//! an ad hoc REST listing, and keying the cache by path instead of inode
//! (spec.md §4.2).

use super::prelude::*;
use crate::document::Entry;
use crate::error::FsResult;

pub(crate) fn fetch_entry(fs: &mut RemoteFs, path: &str) -> FsResult<Entry> {
    let kind_hint = fs
        .path_to_inode
        .get(path)
        .and_then(|ino| fs.inode_to_kind.get(ino))
        .copied();

    fs.runtime.block_on(async {
        match kind_hint {
            Some(FileType::Directory) => fs.store.get_folder(path).await.map(Entry::Folder),
            Some(FileType::RegularFile) => fs.store.get_file(path).await.map(Entry::File),
            _ => match fs.store.get_folder(path).await {
                Ok(folder) => Ok(Entry::Folder(folder)),
                Err(_) => fs.store.get_file(path).await.map(Entry::File),
            },
        }
    })
}

/// Resolves attributes for `ino`, consulting the path-keyed attribute
/// cache before falling through to the Document Store Client.
pub(crate) fn fetch_and_cache_attributes(fs: &mut RemoteFs, ino: u64) -> Option<FileAttr> {
    if ino == ROOT_INO {
        return Some(ROOT_DIR_ATTR);
    }

    let path = fs.path_of(ino)?;
    if let Some(attr) = fs.attr_cache.get(&path) {
        return Some(attr);
    }

    let entry = fetch_entry(fs, &path).ok()?;
    let kind = if entry.is_dir() { FileType::Directory } else { FileType::RegularFile };
    fs.inode_to_kind.insert(ino, kind);
    let attr = entry_to_attr(ino, &entry);
    fs.attr_cache.add(path, attr);
    Some(attr)
}

pub fn getattr(fs: &mut RemoteFs, _req: &Request, ino: u64, reply: ReplyAttr) {
    match fetch_and_cache_attributes(fs, ino) {
        Some(attr) => reply.attr(&kernel_ttl(fs), &attr),
        None => reply.error(FsError::NotFound.errno()),
    }
}

/// Only `size` (truncate) is honored against the backing store; every
/// other field (`mode`/`uid`/`gid`/time stamps) is a silent no-op, matching
/// the original `couchmount.py`'s `chmod`/`chown`/`utime` stubs.
#[allow(clippy::too_many_arguments)]
pub fn setattr(
    fs: &mut RemoteFs,
    _req: &Request<'_>,
    ino: u64,
    _mode: Option<u32>,
    _uid: Option<u32>,
    _gid: Option<u32>,
    size: Option<u64>,
    _atime: Option<TimeOrNow>,
    _mtime: Option<TimeOrNow>,
    _ctime: Option<SystemTime>,
    _fh: Option<u64>,
    _crtime: Option<SystemTime>,
    _chgtime: Option<SystemTime>,
    _bkuptime: Option<SystemTime>,
    _flags: Option<u32>,
    reply: ReplyAttr,
) {
    let path = match fs.path_of(ino) {
        Some(p) => p,
        None => {
            reply.error(FsError::NotFound.errno());
            return;
        }
    };

    if let Some(new_size) = size {
        if let Err(err) = truncate(fs, &path, new_size) {
            reply.error(reply_errno("setattr(truncate)", &err));
            return;
        }
    }

    fs.invalidate(&path);

    match fetch_and_cache_attributes(fs, ino) {
        Some(attr) => reply.attr(&kernel_ttl(fs), &attr),
        None => reply.error(FsError::NotFound.errno()),
    }
}

fn truncate(fs: &mut RemoteFs, path: &str, new_size: u64) -> FsResult<()> {
    let cache_file = fs.runtime.block_on(fs.binary_cache.cache_file_for(&mut fs.store, path))?;
    let file = std::fs::OpenOptions::new().write(true).open(&cache_file)?;
    file.set_len(new_size)?;
    fs.runtime.block_on(fs.binary_cache.update_size(&mut fs.store, path))?;
    Ok(())
}
