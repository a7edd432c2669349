//! `create`/`mknod`/`mkdir` (spec.md §4.5).
//!
//! `mknod`'s two-phase shape is grounded in `original_source/cozyfuse`'s
//! document model: an empty `Binary` document is created first, then a
//! `File` document referencing it, then the binary cache is primed with a
//! zero-length local file so the subsequent `open`/`write` sequence a
//! `touch`/editor performs has somewhere to land.

use bytes::Bytes;

use super::prelude::*;
use crate::document::{guess_mime, FileDoc, FolderDoc};
use crate::error::FsResult;

fn mknod_file(fs: &mut RemoteFs, parent_path: &str, name: &str) -> FsResult<(FileDoc, u64)> {
    let full_path = crate::path::join(parent_path, name);
    fs.runtime.block_on(async {
        let binary_id = fs.store.create_binary().await?;
        let doc = FileDoc::new(parent_path, name, &binary_id);
        let created = fs.store.create_file(doc).await?;

        fs.binary_cache.add(&mut fs.store, &full_path, Some(Bytes::new())).await?;
        if let Some(mime) = guess_mime(name) {
            let _ = fs.store.put_attachment(&binary_id, &mime, Vec::new()).await;
        }
        fs.store.touch_folder(parent_path).await?;
        Ok(created)
    }).map(|doc| {
        let ino = fs.inode_for(&full_path, FileType::RegularFile);
        (doc, ino)
    })
}

pub fn create(
    fs: &mut RemoteFs,
    _req: &Request<'_>,
    parent: u64,
    name: &OsStr,
    _mode: u32,
    _umask: u32,
    _flags: i32,
    reply: ReplyCreate,
) {
    let parent_path = match fs.path_of(parent) {
        Some(p) => p,
        None => {
            reply.error(FsError::NotFound.errno());
            return;
        }
    };
    let Some(name_str) = name.to_str() else {
        reply.error(FsError::Invalid("non-UTF8 name".to_string()).errno());
        return;
    };

    match mknod_file(fs, &parent_path, name_str) {
        Ok((doc, ino)) => {
            let full_path = doc.full_path();
            let attr = entry_to_attr(ino, &crate::document::Entry::File(doc));
            fs.attr_cache.add(full_path.clone(), attr);
            fs.name_cache.remove(&parent_path);

            let cache_file = match fs.runtime.block_on(fs.binary_cache.cache_file_for(&mut fs.store, &full_path)) {
                Ok(p) => p,
                Err(err) => {
                    reply.error(reply_errno("create", &err));
                    return;
                }
            };
            let file = match std::fs::OpenOptions::new().read(true).write(true).open(&cache_file) {
                Ok(f) => f,
                Err(err) => {
                    reply.error(reply_errno("create", &err.into()));
                    return;
                }
            };
            fs.fd_cache.insert(full_path.clone(), OpenHandle { file, refcount: 1, dirty: false });
            let fh = fs.next_fh();
            fs.fh_to_path.insert(fh, full_path);

            reply.created(&kernel_entry_ttl(fs), &attr, 0, fh, 0);
        }
        Err(err) => reply.error(reply_errno("create", &err)),
    }
}

/// `mknod` without `O_CREAT`'s implicit open (e.g. `mkfifo`-style calls the
/// kernel occasionally issues before a regular `open`); same document-store
/// side effects as `create`, no file handle returned.
pub fn mknod(
    fs: &mut RemoteFs,
    _req: &Request<'_>,
    parent: u64,
    name: &OsStr,
    _mode: u32,
    _umask: u32,
    _rdev: u32,
    reply: ReplyEntry,
) {
    let parent_path = match fs.path_of(parent) {
        Some(p) => p,
        None => {
            reply.error(FsError::NotFound.errno());
            return;
        }
    };
    let Some(name_str) = name.to_str() else {
        reply.error(FsError::Invalid("non-UTF8 name".to_string()).errno());
        return;
    };

    match mknod_file(fs, &parent_path, name_str) {
        Ok((doc, ino)) => {
            let attr = entry_to_attr(ino, &crate::document::Entry::File(doc.clone()));
            fs.attr_cache.add(doc.full_path(), attr);
            fs.name_cache.remove(&parent_path);
            reply.entry(&kernel_entry_ttl(fs), &attr, 0);
        }
        Err(err) => reply.error(reply_errno("mknod", &err)),
    }
}

pub fn mkdir(fs: &mut RemoteFs, _req: &Request<'_>, parent: u64, name: &OsStr, _mode: u32, _umask: u32, reply: ReplyEntry) {
    let parent_path = match fs.path_of(parent) {
        Some(p) => p,
        None => {
            reply.error(FsError::NotFound.errno());
            return;
        }
    };
    let Some(name_str) = name.to_str() else {
        reply.error(FsError::Invalid("non-UTF8 name".to_string()).errno());
        return;
    };

    let doc = FolderDoc::new(&parent_path, name_str);
    let full_path = doc.full_path();
    let result = fs.runtime.block_on(async {
        let created = fs.store.create_folder(doc).await?;
        fs.store.touch_folder(&parent_path).await?;
        Ok(created)
    });
    match result {
        Ok(created) => {
            let ino = fs.inode_for(&full_path, FileType::Directory);
            let attr = entry_to_attr(ino, &crate::document::Entry::Folder(created));
            fs.attr_cache.add(full_path, attr);
            fs.name_cache.remove(&parent_path);
            reply.entry(&kernel_entry_ttl(fs), &attr, 0);
        }
        Err(err) => reply.error(reply_errno("mkdir", &err)),
    }
}
