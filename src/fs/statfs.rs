//! `statfs` (spec.md §4.5), grounded in `couchmount.py`'s `statfs`/
//! `dbutils.get_disk_space`: a live remote `disk-space` endpoint is tried
//! first and its result memoized onto the Device record; if the endpoint
//! is unavailable, the last memoized value is used; if neither exists,
//! an arbitrary minimal valid result (spec.md §7) keeps `df` from failing.
//! Figures come back in megabytes and are converted here into 1000-byte
//! blocks the same way the original does.

use super::prelude::*;
use crate::document::{DiskSpace, DocumentStore};

const BLOCK_SIZE: u32 = 1000;

pub fn statfs(fs: &mut RemoteFs, _req: &Request<'_>, _ino: u64, reply: ReplyStatfs) {
    let device_name = fs.device.name.clone();

    let disk_space: DiskSpace = fs.runtime.block_on(async {
        match fs.store.fetch_disk_space().await {
            Ok(fetched) => {
                if let Err(err) = fs.store.update_device_disk_space(&device_name, fetched.clone()).await {
                    tracing::warn!(error = %err, "failed to memoize disk space on device record");
                }
                fetched
            }
            Err(err) => {
                tracing::warn!(error = %err, "remote disk-space endpoint unavailable, falling back to memoized value");
                match fs.store.get_device(&device_name).await {
                    Ok(doc) => doc.disk_space.unwrap_or_else(DocumentStore::fallback_disk_space),
                    Err(_) => DocumentStore::fallback_disk_space(),
                }
            }
        }
    });

    let blocks = disk_space.total_disk_space * 1000;
    let blocks_free = disk_space.free_disk_space * 1000;

    reply.statfs(blocks, blocks_free, blocks_free, 0, 0, BLOCK_SIZE, 255, BLOCK_SIZE);
}
