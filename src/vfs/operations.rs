//! Filesystem operations - the main interface.

use crate::codec::LsbCodec;
use crate::config::{CLUSTER_DATA, CLUSTER_SIZE, FILESIZE_MAX};
use crate::error::{Error, Result};
use crate::vfs::cluster::{size_to_clusters, Cluster};
use crate::vfs::dir::{DirIter, EntryRef};
use std::fmt::Write as _;
use std::time::SystemTime;
use tracing::warn;

/// A mounted steganographic filesystem.
///
/// All operations are synchronous and must be serialized by the caller;
/// there is no internal locking. Writes are buffered in the cluster cache
/// until [`StegoFs::sync`] or [`StegoFs::unmount`].
pub struct StegoFs {
    pub(crate) codec: LsbCodec,
    pub(crate) cluster_count: u16,
    /// Lazily populated cluster cache, indexed by cluster number. Entries
    /// stay resident until unmount.
    pub(crate) clusters: Vec<Option<Box<Cluster>>>,
    pub(crate) free_clusters: u16,
    pub(crate) uid: u32,
    pub(crate) gid: u32,
    pub(crate) mount_time: SystemTime,
}

/// Handle to an open file.
pub struct FileHandle {
    pub(crate) entry: EntryRef,
}

/// Handle to an open directory, iterated with [`StegoFs::next_entry`].
pub struct DirHandle {
    cluster: u16,
    iter: Option<DirIter>,
}

/// Attributes of a file or directory, shaped for a stat-style caller.
#[derive(Debug, Clone)]
pub struct FileAttr {
    pub is_dir: bool,
    /// Byte length for files; one cluster for directories.
    pub size: u64,
    /// 512-byte blocks covered by `size`.
    pub blocks: u64,
    pub uid: u32,
    pub gid: u32,
    /// All time fields report the mount time.
    pub mtime: SystemTime,
    /// Owner permission bits: `rw` for files, `rwx` for directories.
    pub perm: u16,
    pub nlink: u32,
}

/// Filesystem-level statistics.
#[derive(Debug, Clone)]
pub struct FsStats {
    pub block_size: u32,
    pub fragment_size: u32,
    pub blocks: u64,
    pub blocks_free: u64,
    pub blocks_avail: u64,
    pub name_max: u32,
}

impl StegoFs {
    /// Create an empty file at `path`.
    pub fn create(&mut self, path: &str) -> Result<()> {
        self.create_entry(path, false)?;
        Ok(())
    }

    /// Create a directory at `path`.
    pub fn mkdir(&mut self, path: &str) -> Result<()> {
        self.create_entry(path, true)?;
        Ok(())
    }

    /// Remove the file at `path`.
    pub fn unlink(&mut self, path: &str) -> Result<()> {
        self.remove_entry(path, false)
    }

    /// Remove the empty directory at `path`.
    pub fn rmdir(&mut self, path: &str) -> Result<()> {
        self.remove_entry(path, true)
    }

    /// Resize the file at `path`, zero-filling on growth.
    pub fn truncate(&mut self, path: &str, new_size: i64) -> Result<()> {
        let link = self.lookup(path, false)?;
        self.do_truncate(&link, new_size)
    }

    /// Move the file at `path` to `new_path`, replacing an existing file.
    ///
    /// Directories cannot be renamed.
    pub fn rename(&mut self, path: &str, new_path: &str) -> Result<()> {
        let old_ref = self.lookup(path, false)?;
        if old_ref == EntryRef::Root {
            return Err(Error::Invalid("cannot rename root".to_string()));
        }

        let old_entry = self.entry_at(&old_ref)?;
        if old_entry.is_dir() {
            return Err(Error::IsADirectory);
        }

        match self.remove_entry(new_path, false) {
            Ok(()) | Err(Error::NotFound) => {}
            Err(e) => return Err(e),
        }

        let new_ref = self.create_entry(new_path, false)?;

        // carry the data over to the new entry
        let mut new_entry = self.entry_at(&new_ref)?;
        new_entry.set_size(old_entry.size(), false);
        new_entry.cluster = old_entry.cluster;
        self.set_entry_at(&new_ref, &new_entry)?;

        // drop the old name
        let mut old_entry = self.entry_at(&old_ref)?;
        old_entry.clear_name();
        self.set_entry_at(&old_ref, &old_entry)
    }

    /// Open the file at `path`.
    pub fn open(&mut self, path: &str) -> Result<FileHandle> {
        let entry = self.lookup(path, false)?;
        if self.entry_at(&entry)?.is_dir() {
            return Err(Error::IsADirectory);
        }
        Ok(FileHandle { entry })
    }

    /// Release a file handle. Handles hold no carrier resources.
    pub fn release(&mut self, handle: FileHandle) {
        let _ = handle;
    }

    /// Read from an open file into `buf`, returning the number of bytes
    /// read. Reads past the end of the file return 0.
    pub fn read(&mut self, handle: &FileHandle, buf: &mut [u8], offset: i64) -> Result<usize> {
        if offset < 0 {
            return Err(Error::Invalid("negative offset".to_string()));
        }
        let offset = offset as u64;
        offset
            .checked_add(buf.len() as u64)
            .filter(|&end| end <= i64::MAX as u64)
            .ok_or(Error::Overflow)?;

        let entry = self.entry_at(&handle.entry)?;
        let size = entry.size() as u64;
        if offset > size {
            return Ok(0);
        }

        let len = (buf.len() as u64).min(size - offset) as usize;
        if len == 0 {
            return Ok(0);
        }

        let mut nr = self.chain_at(entry.cluster, (offset / CLUSTER_DATA as u64) as u32)?;
        let mut pos = (offset % CLUSTER_DATA as u64) as usize;
        let mut done = 0usize;

        loop {
            let n = (len - done).min(CLUSTER_DATA - pos);
            let c = self.cluster(nr)?;
            buf[done..done + n].copy_from_slice(&c.payload()[pos..pos + n]);
            let next = c.next();

            done += n;
            pos = 0;
            if done == len {
                break;
            }
            if next == 0 {
                warn!("cluster missing, bad filesystem");
                return Err(Error::Corrupt("cluster chain ends early"));
            }
            nr = next;
        }

        Ok(done)
    }

    /// Write `buf` to an open file, growing it as needed. Returns the
    /// number of bytes written.
    pub fn write(&mut self, handle: &FileHandle, buf: &[u8], offset: i64) -> Result<usize> {
        if offset < 0 {
            return Err(Error::Invalid("negative offset".to_string()));
        }
        let offset = offset as u64;
        let end = offset
            .checked_add(buf.len() as u64)
            .filter(|&end| end <= i64::MAX as u64)
            .ok_or(Error::Overflow)?;

        if buf.is_empty() {
            return Ok(0);
        }

        let mut entry = self.entry_at(&handle.entry)?;
        if (entry.size() as u64) < end {
            self.do_truncate(&handle.entry, end as i64)?;
            entry = self.entry_at(&handle.entry)?;
        }

        let mut nr = self.chain_at(entry.cluster, (offset / CLUSTER_DATA as u64) as u32)?;
        let mut pos = (offset % CLUSTER_DATA as u64) as usize;
        let mut done = 0usize;

        loop {
            let n = (buf.len() - done).min(CLUSTER_DATA - pos);
            let c = self.cluster(nr)?;
            c.payload_mut()[pos..pos + n].copy_from_slice(&buf[done..done + n]);
            c.mark();
            let next = c.next();

            done += n;
            pos = 0;
            if done == buf.len() {
                break;
            }
            if next == 0 {
                warn!("cluster missing, bad filesystem");
                return Err(Error::Corrupt("cluster chain ends early"));
            }
            nr = next;
        }

        Ok(done)
    }

    /// Resize the file behind `link` to `new_size` bytes.
    pub(crate) fn do_truncate(&mut self, link: &EntryRef, new_size: i64) -> Result<()> {
        if new_size < 0 {
            return Err(Error::Invalid("negative size".to_string()));
        }
        if new_size > FILESIZE_MAX as i64 {
            return Err(Error::TooLarge);
        }
        let new_size = new_size as u32;

        let mut entry = self.entry_at(link)?;
        if entry.is_dir() {
            return Err(Error::IsADirectory);
        }
        let old_size = entry.size();

        // clusters shared by the old and new layout
        let keep = size_to_clusters(old_size.min(new_size));

        let mut tail: Option<u16> = None;
        let mut next = entry.cluster;
        if keep > 0 {
            let t = self.chain_at(entry.cluster, keep - 1)?;
            next = self.cluster(t)?.next();
            tail = Some(t);
        }

        if new_size > old_size {
            // growth reveals the slack of the final cluster, zero it
            let used = old_size as usize % CLUSTER_DATA;
            if let (Some(t), true) = (tail, used > 0) {
                let c = self.cluster(t)?;
                c.payload_mut()[used..].fill(0);
                c.mark();
            }

            let alloc = size_to_clusters(new_size) - keep;
            if alloc > 0 {
                let first = self.alloc_chain(alloc, true)?;
                match tail {
                    Some(t) => {
                        let c = self.cluster(t)?;
                        c.set_next(first);
                        c.mark();
                    }
                    None => entry.cluster = first,
                }
            }
        } else if new_size < old_size {
            if next != 0 {
                if let Some(t) = tail {
                    let c = self.cluster(t)?;
                    c.set_next(0);
                    c.mark();
                }
                self.free_chain(next)?;
            }
            if new_size == 0 {
                entry.cluster = 0;
            }
        }

        entry.set_size(new_size, false);
        self.set_entry_at(link, &entry)
    }

    /// Open the directory at `path` for iteration.
    pub fn opendir(&mut self, path: &str) -> Result<DirHandle> {
        let r = self.lookup(path, false)?;
        let entry = self.entry_at(&r)?;
        if !entry.is_dir() {
            return Err(Error::NotADirectory);
        }
        Ok(DirHandle {
            cluster: entry.cluster,
            iter: None,
        })
    }

    /// The next used entry name in the directory, or `None` at the end.
    pub fn next_entry(&mut self, handle: &mut DirHandle) -> Result<Option<String>> {
        if handle.iter.is_none() {
            let it = self.dir_iter(handle.cluster)?;
            let entry = self.iter_entry(&it)?;
            handle.iter = Some(it);
            if entry.used() {
                return Ok(Some(
                    String::from_utf8_lossy(entry.name_bytes()).into_owned(),
                ));
            }
        }

        let it = handle.iter.as_mut().unwrap();
        match self.iter_next_used(it) {
            Ok(()) => {
                let it = *it;
                let entry = self.iter_entry(&it)?;
                Ok(Some(
                    String::from_utf8_lossy(entry.name_bytes()).into_owned(),
                ))
            }
            Err(Error::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Release a directory handle.
    pub fn closedir(&mut self, handle: DirHandle) {
        let _ = handle;
    }

    /// Attributes of the file or directory at `path`.
    pub fn getattr(&mut self, path: &str) -> Result<FileAttr> {
        let r = self.lookup(path, false)?;
        let entry = self.entry_at(&r)?;

        let is_dir = entry.is_dir();
        let size = if is_dir {
            CLUSTER_SIZE as u64
        } else {
            entry.size() as u64
        };

        Ok(FileAttr {
            is_dir,
            size,
            blocks: size / 512 + u64::from(size % 512 != 0),
            uid: self.uid,
            gid: self.gid,
            mtime: self.mount_time,
            // the mounting user owns everything, read-write only
            perm: if is_dir { 0o700 } else { 0o600 },
            nlink: 1,
        })
    }

    /// Filesystem statistics for a statvfs-style caller.
    pub fn statvfs(&self) -> FsStats {
        FsStats {
            block_size: CLUSTER_SIZE as u32,
            fragment_size: CLUSTER_SIZE as u32,
            blocks: self.cluster_count as u64,
            blocks_free: self.free_clusters as u64,
            blocks_avail: self.free_clusters as u64,
            name_max: crate::config::FILENAME_MAX as u32,
        }
    }

    /// Total clusters in the filesystem.
    pub fn cluster_count(&self) -> u16 {
        self.cluster_count
    }

    /// Clusters currently unused.
    pub fn free_cluster_count(&self) -> u16 {
        self.free_clusters
    }

    /// Render the whole directory tree, one line per entry: directories as
    /// `path/`, files as `path {size}`.
    pub fn tree(&mut self) -> Result<String> {
        let mut out = String::new();
        self.tree_dir(0, "", &mut out)?;
        Ok(out)
    }

    fn tree_dir(&mut self, cluster_nr: u16, parent: &str, out: &mut String) -> Result<()> {
        let mut it = self.dir_iter(cluster_nr)?;

        loop {
            let entry = self.iter_entry(&it)?;
            if entry.used() {
                let path = format!("{parent}/{}", String::from_utf8_lossy(entry.name_bytes()));
                if entry.is_dir() {
                    let _ = writeln!(out, "{path}/");
                    self.tree_dir(entry.cluster, &path, out)?;
                } else {
                    let _ = writeln!(out, "{path} {{{}}}", entry.size());
                }
            }

            match self.iter_next_used(&mut it) {
                Ok(()) => {}
                Err(Error::NotFound) => break,
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }
}
