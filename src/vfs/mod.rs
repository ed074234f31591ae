//! Cluster filesystem stored in the hidden byte stream of a carrier.
//!
//! Provides a hierarchical directory tree, file allocation and I/O over
//! the flat byte space exposed by [`crate::codec::LsbCodec`].

mod cluster;
mod dir;
mod operations;
mod superblock;

pub use operations::{DirHandle, FileAttr, FileHandle, FsStats, StegoFs};
