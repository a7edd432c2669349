//! Shared imports for the `fs` module's sub-files, avoiding repetitive
//! `use` blocks in `attr.rs`/`read.rs`/`write.rs`/etc.

pub use fuser::{
    FileAttr, FileType, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory, ReplyEmpty, ReplyEntry,
    ReplyOpen, ReplyStatfs, ReplyWrite, ReplyXattr, Request, TimeOrNow,
};

pub use libc::{EBADF, EIO, ENOENT, ENOTEMPTY};
#[cfg(not(target_os = "macos"))]
pub use libc::ENODATA;
#[cfg(target_os = "macos")]
pub use libc::ENOATTR;

pub use std::ffi::OsStr;
pub use std::time::{Duration, SystemTime};

pub use crate::error::{reply_errno, FsError};

pub use super::{entry_to_attr, OpenHandle, RemoteFs, ROOT_DIR_ATTR, ROOT_INO};

/// Kernel attribute/entry cache TTL handed back with every reply; distinct
/// from the driver's own (longer-lived) attribute cache TTL.
pub fn kernel_ttl(fs: &RemoteFs) -> Duration {
    Duration::from_secs(fs.config.kernel_attr_timeout_seconds)
}

pub fn kernel_entry_ttl(fs: &RemoteFs) -> Duration {
    Duration::from_secs(fs.config.kernel_entry_timeout_seconds)
}
