//! Superblock layout, format and integrity.
//!
//! The logical byte stream starts with a 16-byte MD5 digest of the header
//! and cluster 0, then the u16 cluster count, then the clusters. Only the
//! header and root cluster are digest-protected; damage elsewhere surfaces
//! as chain anomalies at the earliest.

use crate::codec::LsbCodec;
use crate::config::{CLUSTER_DIRENTS, CLUSTER_SIZE, DIGEST_SIZE, DIR_ENTRY_SIZE, MAX_CLUSTERS, SUPERBLOCK_SIZE};
use crate::error::{Error, Result};
use crate::vfs::cluster::Cluster;
use crate::vfs::operations::StegoFs;
use md5::{Digest, Md5};
use std::time::SystemTime;
use tracing::{debug, warn};

/// MD5 over the header bytes followed by cluster 0.
fn compute_digest(cluster_count: u16, cluster0: &Cluster) -> [u8; DIGEST_SIZE] {
    let mut md5 = Md5::new();
    md5.update(cluster_count.to_le_bytes());
    md5.update(cluster0.raw());
    md5.finalize().into()
}

fn cluster_offset(nr: u16) -> u64 {
    SUPERBLOCK_SIZE + nr as u64 * CLUSTER_SIZE as u64
}

/// Load one cluster straight from the codec, bypassing any cache.
fn read_raw_cluster(codec: &mut LsbCodec, nr: u16) -> Result<Cluster> {
    let mut c = Cluster::new_zeroed();
    codec.read_at(c.raw_mut(), cluster_offset(nr))?;
    c.scrub();
    Ok(c)
}

fn write_raw_cluster(codec: &mut LsbCodec, nr: u16, c: &Cluster) -> Result<()> {
    codec.write_at(c.raw(), cluster_offset(nr))
}

/// Write the digest, header and root cluster.
fn write_header(codec: &mut LsbCodec, cluster_count: u16, cluster0: &Cluster) -> Result<()> {
    let digest = compute_digest(cluster_count, cluster0);
    codec.write_at(&digest, 0)?;
    codec.write_at(&cluster_count.to_le_bytes(), DIGEST_SIZE as u64)?;
    write_raw_cluster(codec, 0, cluster0)
}

impl StegoFs {
    /// Create a fresh, empty filesystem on the carrier behind `codec`.
    ///
    /// Existing hidden data is destroyed: every cluster's `used` flag is
    /// cleared so stale chains cannot resurface after the next mount.
    pub fn format(codec: &mut LsbCodec) -> Result<()> {
        if codec.capacity() < SUPERBLOCK_SIZE + CLUSTER_SIZE as u64 {
            return Err(Error::NoSpace);
        }

        let mut count = (codec.capacity() - SUPERBLOCK_SIZE) / CLUSTER_SIZE as u64;
        if count > MAX_CLUSTERS {
            warn!(available = count, using = MAX_CLUSTERS, "capping cluster count");
            count = MAX_CLUSTERS;
        }
        let cluster_count = count as u16;

        let mut cluster0 = read_raw_cluster(codec, 0)?;
        cluster0.set_next(0);
        cluster0.set_used(true);
        for slot in 0..CLUSTER_DIRENTS {
            // an entry is empty iff its first filename byte is NUL
            cluster0.payload_mut()[slot * DIR_ENTRY_SIZE] = 0;
        }

        write_header(codec, cluster_count, &cluster0)?;

        for nr in 1..cluster_count {
            let mut c = read_raw_cluster(codec, nr)?;
            c.set_used(false);
            write_raw_cluster(codec, nr, &c)?;
        }

        debug!(cluster_count, "formatted carrier");
        Ok(())
    }

    /// Mount the filesystem on the carrier behind `codec`, verifying the
    /// superblock digest and counting free clusters.
    pub fn mount(mut codec: LsbCodec) -> Result<Self> {
        let mut digest = [0u8; DIGEST_SIZE];
        codec.read_at(&mut digest, 0)?;

        let mut header = [0u8; 2];
        codec.read_at(&mut header, DIGEST_SIZE as u64)?;
        let cluster_count = u16::from_le_bytes(header);

        let cluster0 = read_raw_cluster(&mut codec, 0)?;
        if compute_digest(cluster_count, &cluster0) != digest {
            return Err(Error::Corrupt("superblock digest mismatch"));
        }

        let mut clusters: Vec<Option<Box<Cluster>>> = Vec::new();
        clusters.resize_with(cluster_count as usize, || None);
        clusters[0] = Some(Box::new(cluster0));

        let mut fs = Self {
            codec,
            cluster_count,
            clusters,
            free_clusters: 0,
            uid: unsafe { libc::getuid() },
            gid: unsafe { libc::getgid() },
            mount_time: SystemTime::now(),
        };

        for nr in 1..fs.cluster_count {
            if !fs.cluster(nr)?.used() {
                fs.free_clusters += 1;
            }
        }

        debug!(
            cluster_count = fs.cluster_count,
            free = fs.free_clusters,
            "mounted filesystem"
        );
        Ok(fs)
    }

    /// Persist the superblock and every dirty cached cluster.
    pub fn sync(&mut self) -> Result<()> {
        self.cluster(0)?;

        let digest = {
            let c0 = self.clusters[0].as_ref().unwrap();
            compute_digest(self.cluster_count, c0)
        };
        self.codec.write_at(&digest, 0)?;
        self.codec
            .write_at(&self.cluster_count.to_le_bytes(), DIGEST_SIZE as u64)?;
        self.flush_cluster(0)?;

        for nr in 1..self.cluster_count {
            let dirty = matches!(&self.clusters[nr as usize], Some(c) if c.is_dirty());
            if dirty {
                self.flush_cluster(nr)?;
            }
        }

        debug!("synced filesystem");
        Ok(())
    }

    /// Sync and tear the mount down.
    pub fn unmount(mut self) -> Result<()> {
        self.sync()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carrier::testutil::{write_bmp, write_wav};

    #[test]
    fn test_format_requires_one_cluster() {
        // one byte short of superblock + one cluster
        let f = write_wav(((SUPERBLOCK_SIZE + CLUSTER_SIZE as u64 - 1) * 8) as u32);
        let mut codec = LsbCodec::open(f.path()).unwrap();

        assert!(matches!(StegoFs::format(&mut codec), Err(Error::NoSpace)));
    }

    #[test]
    fn test_single_cluster_filesystem() {
        let f = write_wav(((SUPERBLOCK_SIZE + CLUSTER_SIZE as u64) * 8) as u32);
        let mut codec = LsbCodec::open(f.path()).unwrap();

        StegoFs::format(&mut codec).unwrap();
        let mut fs = StegoFs::mount(codec).unwrap();

        assert_eq!(fs.cluster_count(), 1);
        assert_eq!(fs.free_cluster_count(), 0);

        // the root can hold entries but no file can ever get a cluster
        assert!(matches!(fs.mkdir("/d"), Err(Error::NoSpace)));
    }

    #[test]
    fn test_mount_unformatted_carrier_is_corrupt() {
        let f = write_bmp(128, 128);
        let codec = LsbCodec::open(f.path()).unwrap();

        assert!(matches!(StegoFs::mount(codec), Err(Error::Corrupt(_))));
    }

    #[test]
    fn test_format_clears_stale_state() {
        let f = write_wav(((SUPERBLOCK_SIZE + 4 * CLUSTER_SIZE as u64) * 8) as u32);

        let mut codec = LsbCodec::open(f.path()).unwrap();
        StegoFs::format(&mut codec).unwrap();
        let mut fs = StegoFs::mount(codec).unwrap();
        fs.create("/junk").unwrap();
        let h = fs.open("/junk").unwrap();
        fs.write(&h, &[9u8; 5000], 0).unwrap();
        fs.release(h);
        fs.unmount().unwrap();

        // a second format must erase everything
        let mut codec = LsbCodec::open(f.path()).unwrap();
        StegoFs::format(&mut codec).unwrap();
        let mut fs = StegoFs::mount(codec).unwrap();

        assert_eq!(fs.free_cluster_count(), 3);
        assert!(matches!(fs.open("/junk"), Err(Error::NotFound)));
        fs.unmount().unwrap();
    }

    #[test]
    fn test_digest_covers_header_and_root() {
        let f = write_wav(((SUPERBLOCK_SIZE + 2 * CLUSTER_SIZE as u64) * 8) as u32);

        let mut codec = LsbCodec::open(f.path()).unwrap();
        StegoFs::format(&mut codec).unwrap();

        // flip one hidden byte inside cluster 0
        let mut byte = [0u8; 1];
        codec.read_at(&mut byte, SUPERBLOCK_SIZE + 100).unwrap();
        byte[0] ^= 0x01;
        codec.write_at(&byte, SUPERBLOCK_SIZE + 100).unwrap();

        assert!(matches!(StegoFs::mount(codec), Err(Error::Corrupt(_))));
    }
}
