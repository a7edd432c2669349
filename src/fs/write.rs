//! `write`/`release`/`flush` (spec.md §4.4/§4.5).
//!
//! Writes land directly on the binary cache file via the open-FD cache's
//! positioned `write_at`, replacing the teacher's buffer-then-whole-file
//! `PUT` strategy. `release` drops the shared handle's refcount and, for a
//! handle that took writes, re-measures the file and pushes the new size
//! to the Document Store Client (`BinaryCache::update_size`).

use std::os::unix::fs::FileExt;

use super::prelude::*;

pub fn write(
    fs: &mut RemoteFs,
    _req: &Request<'_>,
    _ino: u64,
    fh: u64,
    offset: i64,
    data: &[u8],
    _write_flags: u32,
    _flags: i32,
    _lock_owner: Option<u64>,
    reply: ReplyWrite,
) {
    let Some(path) = fs.fh_to_path.get(&fh).cloned() else {
        reply.error(EBADF);
        return;
    };
    let Some(handle) = fs.fd_cache.get_mut(&path) else {
        reply.error(EBADF);
        return;
    };

    match handle.file.write_at(data, offset as u64) {
        Ok(n) => {
            handle.dirty = true;
            reply.written(n as u32);
        }
        Err(err) => reply.error(reply_errno("write", &err.into())),
    }
}

pub fn release(
    fs: &mut RemoteFs,
    _req: &Request<'_>,
    _ino: u64,
    fh: u64,
    _flags: i32,
    _lock_owner: Option<u64>,
    _flush: bool,
    reply: ReplyEmpty,
) {
    let Some(path) = fs.fh_to_path.remove(&fh) else {
        reply.ok();
        return;
    };

    let was_dirty = fs.fd_cache.get(&path).map(|h| h.dirty).unwrap_or(false);

    if let Some(handle) = fs.fd_cache.get_mut(&path) {
        handle.refcount = handle.refcount.saturating_sub(1);
        if handle.refcount == 0 {
            fs.fd_cache.remove(&path);
        }
    }

    if was_dirty {
        if let Err(err) = fs.runtime.block_on(fs.binary_cache.update_size(&mut fs.store, &path)) {
            reply.error(reply_errno("release", &err));
            return;
        }
        fs.invalidate(&path);
    }

    reply.ok();
}

pub fn flush(_fs: &mut RemoteFs, _req: &Request<'_>, _ino: u64, _fh: u64, _lock_owner: u64, reply: ReplyEmpty) {
    reply.ok();
}
