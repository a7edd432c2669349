//! Root of the FUSE filesystem implementation (spec.md §4.5: Filesystem
//! Driver).
//!
//! Defines the `RemoteFs` state struct — the three caches it exclusively
//! owns (attribute, name/listing, open-FD), the inode bookkeeping FUSE
//! requires, and the Tokio runtime every async Document Store Client /
//! Binary Cache call is driven through via `block_on`. `FsWrapper` is the
//! single-threaded dispatcher, grounded directly in the teacher's
//! `Arc<Mutex<RemoteFS>>` pattern: every kernel callback locks the driver
//! once and forwards to a sibling module.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs::File;
use std::sync::{Arc, Mutex};
use std::time::{Duration, UNIX_EPOCH};

use fuser::{
    FileAttr, FileType, Filesystem, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory, ReplyEmpty,
    ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite, ReplyXattr, Request,
};

use crate::binary_cache::BinaryCache;
use crate::cache::TtlCache;
use crate::config::{Config, DeviceConfig};
use crate::document::{DocumentStore, Entry};

pub mod prelude;
mod attr;
mod create;
mod delete;
mod read;
mod rename;
mod statfs;
mod write;
mod xattr;

pub const ROOT_INO: u64 = 1;

/// Static attributes for the root directory, which has no backing
/// `FolderDoc` of its own (spec.md §3: root is the empty-string path).
pub const ROOT_DIR_ATTR: FileAttr = FileAttr {
    ino: ROOT_INO,
    size: 0,
    blocks: 0,
    atime: UNIX_EPOCH,
    mtime: UNIX_EPOCH,
    ctime: UNIX_EPOCH,
    crtime: UNIX_EPOCH,
    kind: FileType::Directory,
    perm: 0o775,
    nlink: 2,
    uid: 0,
    gid: 0,
    rdev: 0,
    flags: 0,
    blksize: 4096,
};

/// One locally-open file: a handle into the binary cache file, shared by
/// refcount across every `open()` of the same path, per spec.md §4.5's
/// open-FD cache ("maps path to an OS file descriptor").
pub(crate) struct OpenHandle {
    pub(crate) file: File,
    pub(crate) refcount: u32,
    pub(crate) dirty: bool,
}

pub struct RemoteFs {
    pub(crate) runtime: tokio::runtime::Runtime,
    pub(crate) store: DocumentStore,
    pub(crate) binary_cache: BinaryCache,
    pub(crate) device: DeviceConfig,
    pub(crate) config: Config,

    pub(crate) inode_to_path: HashMap<u64, String>,
    pub(crate) path_to_inode: HashMap<String, u64>,
    pub(crate) inode_to_kind: HashMap<u64, FileType>,
    next_inode: u64,

    /// TTL'd attribute cache, keyed by normalized path (spec.md §4.2).
    pub(crate) attr_cache: TtlCache<String, FileAttr>,
    /// Name/listing cache: normalized parent path -> sorted child names.
    /// No TTL; invalidated explicitly on create/delete/rename.
    pub(crate) name_cache: TtlCache<String, Vec<String>>,

    pub(crate) fd_cache: HashMap<String, OpenHandle>,
    pub(crate) fh_to_path: HashMap<u64, String>,
    next_fh: u64,
}

impl RemoteFs {
    pub fn new(config: Config, device: DeviceConfig, store: DocumentStore, binary_cache: BinaryCache) -> Self {
        let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build().expect("build tokio runtime");

        let mut inode_to_path = HashMap::new();
        let mut path_to_inode = HashMap::new();
        let mut inode_to_kind = HashMap::new();
        inode_to_path.insert(ROOT_INO, String::new());
        path_to_inode.insert(String::new(), ROOT_INO);
        inode_to_kind.insert(ROOT_INO, FileType::Directory);

        let ttl = Duration::from_secs(config.cache_ttl_seconds);
        let mut attr_cache = match config.cache_strategy {
            crate::config::CacheStrategy::Lru => {
                TtlCache::with_lru_capacity(config.cache_lru_capacity, Some(ttl))
            }
            crate::config::CacheStrategy::Ttl => TtlCache::with_ttl(ttl),
            crate::config::CacheStrategy::None => TtlCache::unbounded(),
        };
        attr_cache.add(String::new(), ROOT_DIR_ATTR);

        Self {
            runtime,
            store,
            binary_cache,
            device,
            config,
            inode_to_path,
            path_to_inode,
            inode_to_kind,
            next_inode: 2,
            attr_cache,
            name_cache: TtlCache::unbounded(),
            fd_cache: HashMap::new(),
            fh_to_path: HashMap::new(),
            next_fh: 1,
        }
    }

    /// Returns the inode for `path`, minting a fresh one (and recording
    /// its kind) if this is the first time the driver has seen it.
    pub(crate) fn inode_for(&mut self, path: &str, kind: FileType) -> u64 {
        if let Some(&ino) = self.path_to_inode.get(path) {
            self.inode_to_kind.insert(ino, kind);
            return ino;
        }
        let ino = self.next_inode;
        self.next_inode += 1;
        self.path_to_inode.insert(path.to_string(), ino);
        self.inode_to_path.insert(ino, path.to_string());
        self.inode_to_kind.insert(ino, kind);
        ino
    }

    pub(crate) fn path_of(&self, ino: u64) -> Option<String> {
        self.inode_to_path.get(&ino).cloned()
    }

    /// Invalidates every cache entry that depends on `path`, as well as
    /// its parent's listing — used after create/delete/setattr.
    pub(crate) fn invalidate(&mut self, path: &str) {
        self.attr_cache.remove(&path.to_string());
        self.binary_cache.invalidate(path);
        let (parent, _) = crate::path::split(path);
        self.name_cache.remove(&parent);
    }

    pub(crate) fn next_fh(&mut self) -> u64 {
        let fh = self.next_fh;
        self.next_fh += 1;
        fh
    }

    /// Drops every trace of `path` after a successful `unlink`/`rmdir`:
    /// its inode mapping, its attribute cache entry, and any lingering
    /// open-FD cache entry (the kernel will not issue `release` for an
    /// already-unlinked handle on every platform).
    pub(crate) fn forget_path(&mut self, path: &str) {
        if let Some(ino) = self.path_to_inode.remove(path) {
            self.inode_to_path.remove(&ino);
            self.inode_to_kind.remove(&ino);
        }
        self.attr_cache.remove(&path.to_string());
        self.fd_cache.remove(path);
    }
}

#[derive(Clone)]
pub struct FsWrapper(pub Arc<Mutex<RemoteFs>>);

impl Filesystem for FsWrapper {
    fn getattr(&mut self, req: &Request, ino: u64, reply: ReplyAttr) {
        let mut fs = self.0.lock().unwrap();
        attr::getattr(&mut fs, req, ino, reply);
    }

    #[allow(clippy::too_many_arguments)]
    fn setattr(
        &mut self,
        req: &Request<'_>,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        atime: Option<fuser::TimeOrNow>,
        mtime: Option<fuser::TimeOrNow>,
        ctime: Option<std::time::SystemTime>,
        fh: Option<u64>,
        crtime: Option<std::time::SystemTime>,
        chgtime: Option<std::time::SystemTime>,
        bkuptime: Option<std::time::SystemTime>,
        flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let mut fs = self.0.lock().unwrap();
        attr::setattr(
            &mut fs, req, ino, mode, uid, gid, size, atime, mtime, ctime, fh, crtime, chgtime, bkuptime, flags, reply,
        );
    }

    fn lookup(&mut self, req: &Request, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let mut fs = self.0.lock().unwrap();
        read::lookup(&mut fs, req, parent, name, reply);
    }

    fn readdir(&mut self, req: &Request, ino: u64, fh: u64, offset: i64, reply: ReplyDirectory) {
        let mut fs = self.0.lock().unwrap();
        read::readdir(&mut fs, req, ino, fh, offset, reply);
    }

    fn read(
        &mut self,
        req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        flags: i32,
        lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let mut fs = self.0.lock().unwrap();
        read::read(&mut fs, req, ino, fh, offset, size, flags, lock_owner, reply);
    }

    fn open(&mut self, req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        let mut fs = self.0.lock().unwrap();
        read::open(&mut fs, req, ino, flags, reply);
    }

    #[allow(clippy::too_many_arguments)]
    fn write(
        &mut self,
        req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        write_flags: u32,
        flags: i32,
        lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let mut fs = self.0.lock().unwrap();
        write::write(&mut fs, req, ino, fh, offset, data, write_flags, flags, lock_owner, reply);
    }

    fn release(
        &mut self,
        req: &Request<'_>,
        ino: u64,
        fh: u64,
        flags: i32,
        lock_owner: Option<u64>,
        flush: bool,
        reply: ReplyEmpty,
    ) {
        let mut fs = self.0.lock().unwrap();
        write::release(&mut fs, req, ino, fh, flags, lock_owner, flush, reply);
    }

    fn flush(&mut self, req: &Request<'_>, ino: u64, fh: u64, lock_owner: u64, reply: ReplyEmpty) {
        let mut fs = self.0.lock().unwrap();
        write::flush(&mut fs, req, ino, fh, lock_owner, reply);
    }

    fn create(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        umask: u32,
        flags: i32,
        reply: ReplyCreate,
    ) {
        let mut fs = self.0.lock().unwrap();
        create::create(&mut fs, req, parent, name, mode, umask, flags, reply);
    }

    fn mknod(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        umask: u32,
        rdev: u32,
        reply: ReplyEntry,
    ) {
        let mut fs = self.0.lock().unwrap();
        create::mknod(&mut fs, req, parent, name, mode, umask, rdev, reply);
    }

    fn mkdir(&mut self, req: &Request<'_>, parent: u64, name: &OsStr, mode: u32, umask: u32, reply: ReplyEntry) {
        let mut fs = self.0.lock().unwrap();
        create::mkdir(&mut fs, req, parent, name, mode, umask, reply);
    }

    fn unlink(&mut self, req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let mut fs = self.0.lock().unwrap();
        delete::unlink(&mut fs, req, parent, name, reply);
    }

    fn rmdir(&mut self, req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let mut fs = self.0.lock().unwrap();
        delete::rmdir(&mut fs, req, parent, name, reply);
    }

    fn rename(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        flags: u32,
        reply: ReplyEmpty,
    ) {
        let mut fs = self.0.lock().unwrap();
        rename::rename(&mut fs, req, parent, name, newparent, newname, flags, reply);
    }

    fn statfs(&mut self, req: &Request<'_>, ino: u64, reply: ReplyStatfs) {
        let mut fs = self.0.lock().unwrap();
        statfs::statfs(&mut fs, req, ino, reply);
    }

    fn getxattr(&mut self, req: &Request, ino: u64, name: &OsStr, size: u32, reply: ReplyXattr) {
        let mut fs = self.0.lock().unwrap();
        xattr::getxattr(&mut fs, req, ino, name, size, reply);
    }

    fn setxattr(
        &mut self,
        req: &Request,
        ino: u64,
        name: &OsStr,
        value: &[u8],
        flags: i32,
        position: u32,
        reply: ReplyEmpty,
    ) {
        let mut fs = self.0.lock().unwrap();
        xattr::setxattr(&mut fs, req, ino, name, value, flags, position, reply);
    }

    fn listxattr(&mut self, req: &Request, ino: u64, size: u32, reply: ReplyXattr) {
        let mut fs = self.0.lock().unwrap();
        xattr::listxattr(&mut fs, req, ino, size, reply);
    }

    fn removexattr(&mut self, req: &Request, ino: u64, name: &OsStr, reply: ReplyEmpty) {
        let mut fs = self.0.lock().unwrap();
        xattr::removexattr(&mut fs, req, ino, name, reply);
    }
}

/// Converts a document-store [`Entry`] into the `FileAttr` the kernel
/// wants, parsing its timestamp fields via `document::timestamp`.
pub(crate) fn entry_to_attr(ino: u64, entry: &Entry) -> FileAttr {
    let mtime_secs = crate::document::timestamp::parse_timestamp(entry.last_modification()).unwrap_or(0);
    let mtime = UNIX_EPOCH + Duration::from_secs(mtime_secs.max(0) as u64);

    match entry {
        Entry::Folder(_) => FileAttr {
            ino,
            size: 0,
            blocks: 0,
            atime: mtime,
            mtime,
            ctime: mtime,
            crtime: mtime,
            kind: FileType::Directory,
            perm: 0o775,
            nlink: 2,
            uid: 0,
            gid: 0,
            rdev: 0,
            flags: 0,
            blksize: 4096,
        },
        Entry::File(file) => FileAttr {
            ino,
            size: file.size,
            blocks: file.size.div_ceil(512),
            atime: mtime,
            mtime,
            ctime: mtime,
            crtime: mtime,
            kind: FileType::RegularFile,
            perm: 0o664,
            nlink: 1,
            uid: 0,
            gid: 0,
            rdev: 0,
            flags: 0,
            blksize: 4096,
        },
    }
}
