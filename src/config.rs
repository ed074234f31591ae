//! On-disk layout constants for the stegofs format.

/// Size of one cluster including its trailer.
pub const CLUSTER_SIZE: usize = 4096;

/// Payload bytes per cluster (cluster minus the 4-byte trailer).
pub const CLUSTER_DATA: usize = 4092;

/// Directory entries per cluster (66 * 62 bytes = 4092).
pub const CLUSTER_DIRENTS: usize = 66;

/// Size of one packed directory entry.
pub const DIR_ENTRY_SIZE: usize = 62;

/// Bytes reserved for a filename, including the terminating NUL.
pub const FILENAME_SIZE: usize = 56;

/// Longest permitted filename.
pub const FILENAME_MAX: usize = FILENAME_SIZE - 1;

/// Largest representable file size. The high bit of the on-disk size field
/// is the directory flag.
pub const FILESIZE_MAX: u32 = 0x7FFF_FFFF;

/// Directory flag bit within the size field.
pub const DIR_FLAG: u32 = 0x8000_0000;

/// Size of the MD5 digest prefix.
pub const DIGEST_SIZE: usize = 16;

/// Size of the header following the digest (the u16 cluster count).
pub const HEADER_SIZE: usize = 2;

/// Byte offset of cluster 0 within the logical stream: digest + header.
pub const SUPERBLOCK_SIZE: u64 = (DIGEST_SIZE + HEADER_SIZE) as u64;

/// Maximum clusters addressable by the u16 cluster index.
pub const MAX_CLUSTERS: u64 = 0xFFFF;
