//! Extended attributes (spec.md §4.5): the remote document model has no
//! concept of xattrs, so every call here is a denial or a no-op, matching
//! `couchmount.py`, which never implements `getxattr`/`setxattr` at all
//! and lets the kernel default to "unsupported".

use super::prelude::*;

/// Always reports "no such attribute" — macOS's Finder probes
/// `com.apple.FinderInfo`/`com.apple.quarantine` on every file; telling it
/// there's no special metadata is the expected, quiet answer.
pub fn getxattr(_fs: &mut RemoteFs, _req: &Request, _ino: u64, _name: &OsStr, _size: u32, reply: ReplyXattr) {
    #[cfg(target_os = "macos")]
    reply.error(ENOATTR);

    #[cfg(not(target_os = "macos"))]
    reply.error(ENODATA);
}

/// Reports success without persisting anything remotely, so tools that
/// write an xattr before checking its return value (Finder tagging,
/// quarantine flags) don't surface a spurious I/O error.
pub fn setxattr(
    _fs: &mut RemoteFs,
    _req: &Request,
    _ino: u64,
    _name: &OsStr,
    _value: &[u8],
    _flags: i32,
    _position: u32,
    reply: ReplyEmpty,
) {
    reply.ok();
}

pub fn listxattr(_fs: &mut RemoteFs, _req: &Request, _ino: u64, size: u32, reply: ReplyXattr) {
    if size == 0 {
        reply.size(0);
    } else {
        reply.data(&[]);
    }
}

pub fn removexattr(_fs: &mut RemoteFs, _req: &Request, _ino: u64, _name: &OsStr, reply: ReplyEmpty) {
    reply.ok();
}