//! `unlink`/`rmdir` (spec.md §4.5).
//!
//! REDESIGN: the teacher's `unlink` walked and deleted a directory's
//! entire subtree itself. The kernel already refuses `rmdir` on a
//! non-empty directory before this driver ever sees the call, so
//! `rmdir` here only needs to delete the (already-empty) folder document
//! — no client-side recursive descent, matching `couchmount.py`'s
//! `rmdir`, which just calls `dbutils.delete_folder`.

use super::prelude::*;

pub fn unlink(fs: &mut RemoteFs, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
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
    let full_path = crate::path::join(&parent_path, name_str);

    let remove_result = fs.runtime.block_on(async {
        fs.binary_cache.remove(&mut fs.store, &full_path).await?;
        fs.store.delete_file(&full_path).await?;
        fs.store.touch_folder(&parent_path).await
    });

    if let Err(err) = remove_result {
        reply.error(reply_errno("unlink", &err));
        return;
    }

    fs.forget_path(&full_path);
    fs.name_cache.remove(&parent_path);
    reply.ok();
}

pub fn rmdir(fs: &mut RemoteFs, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
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
    let full_path = crate::path::join(&parent_path, name_str);

    match fs.runtime.block_on(fs.store.delete_folder(&full_path)) {
        Ok(()) => {
            fs.forget_path(&full_path);
            fs.name_cache.remove(&parent_path);
            reply.ok();
        }
        Err(err) => reply.error(reply_errno("rmdir", &err)),
    }
}
